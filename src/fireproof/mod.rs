//! Fireproof sync server.
//!
//! Keeps the clock head of a room, relays CRDT entries between its
//! connections and stores CAR blobs on request:
//!
//! | request                | effect                                             |
//! |------------------------|----------------------------------------------------|
//! | `GET`                  | current clock head as a JSON array                 |
//! | `PUT` + JSON entries   | merge and broadcast, as if sent by `server`        |
//! | `DELETE`               | clear the clock head and save it under `main`      |
//! | `PUT ?car=<id>` + body | store the blob under `car-<id>`                    |
//! | `GET ?car=<id>`        | the stored blob, 404 if absent or empty            |
//! | `DELETE ?car=<id>`     | remove the blob, 404 if it did not exist           |
//! | `OPTIONS`              | 204                                                |
//!
//! Every response carries permissive CORS headers.

mod clock;
mod http;

pub use clock::{ClockHead, CrdtEntry};
pub use http::Res;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::party::query_param;
use crate::room::Room;
use crate::server::{
    OnAlarmPayload, OnClosePayload, OnConnectPayload, OnErrorPayload, OnMessagePayload, OnRequestPayload,
    OnStartPayload, Server,
};
use http::with_cors;

/// Storage key of the saved clock head.
pub const MAIN_KEY: &str = "main";

/// Sender id used for entries submitted over HTTP.
pub const SERVER_SENDER: &str = "server";

/// Default cap on request bodies, see [`Fireproof::with_body_limit`].
pub const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Storage key of a CAR blob.
pub fn car_key(id: &str) -> String {
    format!("car-{id}")
}

#[derive(Debug)]
pub struct Fireproof {
    clock: ClockHead,
    body_limit: usize,
}

impl Default for Fireproof {
    fn default() -> Self {
        Self { clock: ClockHead::new(), body_limit: DEFAULT_BODY_LIMIT }
    }
}

impl Fireproof {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest request body (JSON batch or CAR blob) accepted, in bytes.
    /// Larger bodies are answered with 500 like any other read failure.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn clock_head(&self) -> &ClockHead {
        &self.clock
    }

    /// Merge a raw batch of entries and relay it to everyone but `sender`.
    ///
    /// Nothing is merged or relayed if the batch does not decode.
    async fn apply(&mut self, room: &Room, message: Bytes, sender: &str) -> Result<(), serde_json::Error> {
        let entries: Vec<CrdtEntry> = serde_json::from_slice(&message)?;
        debug!(room = %room.id(), sender, entries = entries.len(), "merging entries");
        self.clock.merge_all(entries);
        room.broadcast_except(message, &[sender]).await;
        Ok(())
    }

    async fn route(&mut self, room: &Room, request: Request) -> Response {
        if request.method() == Method::OPTIONS {
            return StatusCode::NO_CONTENT.into_response();
        }
        match car_id(request.uri()) {
            Some(car) => self.data(room, &car, request).await,
            None => self.meta(room, request).await,
        }
    }

    async fn meta(&mut self, room: &Room, request: Request) -> Response {
        let method = request.method().clone();
        match method {
            Method::GET => {
                let heads: Vec<&CrdtEntry> = self.clock.entries().collect();
                (StatusCode::OK, Json(heads)).into_response()
            }
            Method::PUT => {
                let body = match to_bytes(request.into_body(), self.body_limit).await {
                    Ok(body) => body,
                    Err(err) => {
                        error!(room = %room.id(), "error reading request body: {err}");
                        return Res::err(StatusCode::INTERNAL_SERVER_ERROR, "error reading request body");
                    }
                };
                if let Err(err) = self.apply(room, body, SERVER_SENDER).await {
                    warn!(room = %room.id(), "error parsing request body: {err}");
                    return Res::err(StatusCode::INTERNAL_SERVER_ERROR, "error parsing request body");
                }
                Res::ok(StatusCode::OK)
            }
            Method::DELETE => {
                self.clock.clear();
                let saved = match serde_json::to_vec(&self.clock) {
                    Ok(saved) => saved,
                    Err(err) => {
                        error!(room = %room.id(), "error marshaling clock head: {err}");
                        return Res::err(StatusCode::INTERNAL_SERVER_ERROR, "error marshaling clockhead");
                    }
                };
                if let Err(err) = room.storage().put(MAIN_KEY, saved.into()).await {
                    error!(room = %room.id(), "error putting to room storage: {err}");
                    return Res::err(StatusCode::INTERNAL_SERVER_ERROR, "error putting to room storage");
                }
                Res::ok(StatusCode::OK)
            }
            _ => {
                warn!(room = %room.id(), %method, "method not allowed");
                Res::err(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
            }
        }
    }

    async fn data(&mut self, room: &Room, car: &str, request: Request) -> Response {
        let key = car_key(car);
        let method = request.method().clone();
        match method {
            Method::PUT => {
                let body = match to_bytes(request.into_body(), self.body_limit).await {
                    Ok(body) => body,
                    Err(err) => {
                        error!(room = %room.id(), car, "error reading request body: {err}");
                        return Res::err(StatusCode::INTERNAL_SERVER_ERROR, "error reading request body");
                    }
                };
                if let Err(err) = room.storage().put(&key, body).await {
                    error!(room = %room.id(), car, "error putting to room storage: {err}");
                    return Res::err(StatusCode::INTERNAL_SERVER_ERROR, "error putting to room storage");
                }
                Res::ok(StatusCode::CREATED)
            }
            Method::GET => match room.storage().get(&key).await {
                Ok(Some(blob)) if !blob.is_empty() => {
                    (StatusCode::OK, [(header::CONTENT_TYPE, "application/octet-stream")], blob).into_response()
                }
                Ok(_) => Res::err(StatusCode::NOT_FOUND, "CAR not found"),
                Err(err) => {
                    error!(room = %room.id(), car, "error getting from room storage: {err}");
                    Res::err(StatusCode::INTERNAL_SERVER_ERROR, "error getting from room storage")
                }
            },
            Method::DELETE => match room.storage().delete(&key).await {
                Ok(true) => Res::ok(StatusCode::CREATED),
                Ok(false) => Res::err(StatusCode::NOT_FOUND, "CAR not found"),
                Err(err) => {
                    error!(room = %room.id(), car, "error deleting from room storage: {err}");
                    Res::err(StatusCode::INTERNAL_SERVER_ERROR, "error deleting from room storage")
                }
            },
            _ => {
                warn!(room = %room.id(), %method, "method not allowed");
                Res::err(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
            }
        }
    }
}

fn car_id(uri: &Uri) -> Option<String> {
    query_param(uri, "car")
}

#[async_trait]
impl Server for Fireproof {
    async fn on_start(&mut self, p: OnStartPayload<'_>) {
        match p.room.storage().get(MAIN_KEY).await {
            Ok(Some(saved)) => match serde_json::from_slice::<ClockHead>(&saved) {
                Ok(clock) => {
                    info!(room = %p.room.id(), heads = clock.len(), "restored clock head");
                    self.clock = clock;
                }
                Err(err) => error!(room = %p.room.id(), "error unmarshaling saved clock head: {err}"),
            },
            Ok(None) => info!(room = %p.room.id(), "fireproof started"),
            Err(err) => error!(room = %p.room.id(), "error getting main from storage: {err}"),
        }
    }

    async fn on_connect(&mut self, p: OnConnectPayload<'_>) {
        debug!(room = %p.room.id(), id = p.connection.id(), heads = self.clock.len(), "fireproof connected");
        for entry in self.clock.entries() {
            let encoded = match serde_json::to_vec(entry) {
                Ok(encoded) => encoded,
                Err(err) => {
                    error!(room = %p.room.id(), "error marshaling crdt entry: {err}");
                    return;
                }
            };
            if p.connection.send(encoded).await.is_err() {
                debug!(room = %p.room.id(), id = p.connection.id(), "connection closed during sync");
                return;
            }
        }
    }

    async fn on_message(&mut self, p: OnMessagePayload<'_>) {
        if let Err(err) = self.apply(p.room, p.message, p.sender.id()).await {
            warn!(room = %p.room.id(), from = p.sender.id(), "dropping undecodable message: {err}");
        }
    }

    async fn on_close(&mut self, p: OnClosePayload<'_>) {
        debug!(room = %p.room.id(), id = p.connection.id(), "fireproof closed");
    }

    async fn on_error(&mut self, p: OnErrorPayload<'_>) {
        warn!(room = %p.room.id(), id = p.connection.id(), "fireproof error: {}", p.error);
    }

    async fn on_request(&mut self, p: OnRequestPayload<'_>) -> Response {
        debug!(room = %p.room.id(), url = %p.request.uri(), method = %p.request.method(), "fireproof request");
        with_cors(self.route(p.room, p.request).await)
    }

    async fn on_alarm(&mut self, p: OnAlarmPayload<'_>) {
        debug!(room = %p.room.id(), "fireproof alarm");
    }
}
