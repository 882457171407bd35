use clap::Parser;

/// Command line configuration of the `partyline` server.
#[derive(Parser, Debug, Clone)]
#[command(name = "partyline", about = "Real-time party/room server with Fireproof sync")]
pub struct Config {
    /// HTTP listen address.
    #[arg(long = "http.addr", default_value = "0.0.0.0:8178")]
    pub http_addr: String,

    /// Path prefix in front of `/{party}/{room}`.
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Log filter, e.g. `info` or `partyline=debug`.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["partyline"]).unwrap();
        assert_eq!(config.http_addr, "0.0.0.0:8178");
        assert_eq!(config.prefix, "");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "partyline",
            "--http.addr",
            "127.0.0.1:9000",
            "--prefix",
            "/parties",
            "--log-level",
            "partyline=debug",
        ])
        .unwrap();
        assert_eq!(config.http_addr, "127.0.0.1:9000");
        assert_eq!(config.prefix, "/parties");
        assert_eq!(config.log_level, "partyline=debug");
    }
}
