use axum::{
    Router,
    routing::any,
    extract::{ws::WebSocketUpgrade, FromRequestParts, Path, Query, Request, State},
    response::{IntoResponse, Response},
    http::{header, HeaderMap, Uri},
};
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection;
use crate::error::RouteError;
use crate::service::Service;

/// Query parameter carrying the client-chosen connection id.
const CONNECTION_ID_PARAM: &str = "_pk";

/// HTTP front of a [`Service`]: routes `{prefix}/{party}/{room}` to rooms.
///
/// # Flexible mounting
/// ```no_run
/// use partyline::{PartyServer, Service};
/// use axum::Router;
///
/// // Option 1: rooms at /{party}/{room}
/// let app = PartyServer::new(Service::new()).into_router();
///
/// // Option 2: rooms behind a fixed prefix
/// let app = PartyServer::new(Service::new()).with_prefix("/parties").into_router();
///
/// // Option 3: compose with other routes
/// let server = PartyServer::new(Service::new());
/// let handle = server.handle();
/// let app = Router::new()
///     .merge(server.into_router())
///     .route("/api/alarm/{party}/{room}", axum::routing::post(
///         move |axum::extract::Path((party, room)): axum::extract::Path<(String, String)>| {
///             let h = handle.clone();
///             async move { h.alarm(&party, &room).await.to_string() }
///         }));
/// ```
#[derive(Clone)]
pub struct PartyServer {
    service: Arc<Service>,
    prefix: String,
}

/// Handle for interacting with live rooms from other HTTP handlers.
///
/// None of these operations create a room.
#[derive(Clone)]
pub struct Handle {
    service: Arc<Service>,
}

impl Handle {
    /// Broadcast a message to every connection of a room. Returns false if the room is not live.
    pub async fn broadcast(&self, party: &str, room: &str, message: impl Into<Bytes>) -> bool {
        match self.service.existing(party, room).await {
            Some(live) => {
                live.room().broadcast(message.into()).await;
                true
            }
            None => false,
        }
    }

    /// Fire the room's alarm callback. Returns false if the room is not live.
    pub async fn alarm(&self, party: &str, room: &str) -> bool {
        match self.service.existing(party, room).await {
            Some(live) => live.alarm().await.is_ok(),
            None => false,
        }
    }

    /// Number of connections currently registered in a room.
    pub async fn connection_count(&self, party: &str, room: &str) -> usize {
        self.service.existing(party, room).await.map_or(0, |live| live.room().len())
    }
}

impl PartyServer {
    pub fn new(service: Service) -> Self {
        Self { service: Arc::new(service), prefix: String::new() }
    }

    /// Serve rooms under `prefix` instead of the root.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    /// Get a handle for use in other HTTP handlers
    pub fn handle(&self) -> Handle {
        Handle { service: Arc::clone(&self.service) }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Route pattern rooms are mounted at.
    pub fn route_path(&self) -> String {
        format!("{}/{{party}}/{{room}}", self.prefix)
    }

    /// Get router with the room route
    pub fn into_router(self) -> Router {
        let path = self.route_path();
        Router::new()
            .route(&path, any(room_handler))
            .with_state(self)
    }

    /// Start the server on the given address
    pub async fn serve(self, addr: &str) -> io::Result<()> {
        let app = self.into_router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await
    }

    /// Resolve the room for `(party, room)` and hand it the request.
    ///
    /// Requests carrying `Upgrade: websocket` become a live connection, any
    /// other request goes to the room server's `on_request`.
    pub async fn dispatch(&self, party: &str, room: &str, request: Request) -> Response {
        if !is_websocket_upgrade(request.headers()) {
            let live = match self.service.room(party, room).await {
                Ok(live) => live,
                Err(err) => {
                    warn!(party, room, "rejected request: {err}");
                    return err.into_response();
                }
            };
            return live.request(request).await;
        }

        let Some(connection_id) = connection_id(request.uri()) else {
            warn!(party, room, "rejected websocket upgrade without {CONNECTION_ID_PARAM}");
            return RouteError::MissingConnectionId.into_response();
        };
        let (mut parts, _body) = request.into_parts();
        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                warn!(party, room, "websocket upgrade failed: {rejection}");
                return rejection.into_response();
            }
        };
        let live = match self.service.room(party, room).await {
            Ok(live) => live,
            Err(err) => {
                warn!(party, room, "rejected websocket upgrade: {err}");
                return err.into_response();
            }
        };

        debug!(party, room, connection = %connection_id, "upgrading websocket");
        upgrade.on_upgrade(move |socket| connection::serve(socket, connection_id, live))
    }
}

async fn room_handler(
    State(server): State<PartyServer>,
    Path((party, room)): Path<(String, String)>,
    request: Request,
) -> Response {
    server.dispatch(&party, &room, request).await
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

fn connection_id(uri: &Uri) -> Option<String> {
    query_param(uri, CONNECTION_ID_PARAM)
}

/// First non-empty value of query parameter `name`.
///
/// Repeated keys are allowed; later occurrences are ignored.
pub(crate) fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    pairs.into_iter().find(|(key, value)| key == name && !value.is_empty()).map(|(_, value)| value)
}
