use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use kameo::actor::ActorRef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::actor::{Single, Start, Connect, Incoming, Disconnect, Fault, HttpRequest, Alarm};
use crate::connection::Connection;
use crate::error::{ConnectionError, RouteError};
use crate::storage::Storage;

/// Identity of a room: the party it belongs to and its name within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId {
    party: String,
    name: String,
}

impl RoomId {
    pub fn new(party: impl Into<String>, name: impl Into<String>) -> Self {
        Self { party: party.into(), name: name.into() }
    }

    pub fn party(&self) -> &str {
        &self.party
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.party, self.name)
    }
}

/// Unit of group communication.
///
/// Participants talk over their websocket connections and share one server
/// and one private storage, both fixed for the room's lifetime. The
/// connection set is only mutated by the room actor while it handles
/// connects and disconnects.
pub struct Room {
    id: RoomId,
    storage: Arc<dyn Storage>,
    connections: RwLock<HashMap<Arc<str>, Connection>>,
}

impl Room {
    pub fn new(id: RoomId, storage: Arc<dyn Storage>) -> Self {
        Self { id, storage, connections: RwLock::new(HashMap::new()) }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn party(&self) -> &str {
        self.id.party()
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Register a connection. A connection already holding the same id is
    /// replaced and returned.
    pub fn add(&self, connection: Connection) -> Option<Connection> {
        self.connections.write().insert(connection.id_arc(), connection)
    }

    /// Unregister `connection`. A newer connection that took over the same
    /// id is left in place.
    pub fn remove(&self, connection: &Connection) -> bool {
        let mut connections = self.connections.write();
        match connections.get(connection.id()) {
            Some(current) if current.same_connection(connection) => {
                connections.remove(connection.id());
                true
            }
            _ => false,
        }
    }

    pub fn connection(&self, id: &str) -> Option<Connection> {
        self.connections.read().get(id).cloned()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.connections.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub async fn broadcast(&self, message: Bytes) {
        self.broadcast_except(message, &[]).await
    }

    /// Send `message` once to every connection whose id is not in `except`.
    ///
    /// Blocks while a receiver's outbound queue is full.
    pub async fn broadcast_except(&self, message: Bytes, except: &[&str]) {
        let targets: Vec<Connection> = self
            .connections
            .read()
            .values()
            .filter(|c| !except.iter().any(|ex| *ex == c.id()))
            .cloned()
            .collect();
        for connection in targets {
            if connection.send(message.clone()).await.is_err() {
                debug!(room = %self.id, connection = connection.id(), "skipping closed connection");
            }
        }
    }
}

/// A room together with the actor that serializes its server.
#[derive(Clone)]
pub struct LiveRoom {
    room: Arc<Room>,
    single: ActorRef<Single>,
}

impl LiveRoom {
    pub(crate) fn new(room: Arc<Room>, single: ActorRef<Single>) -> Self {
        Self { room, single }
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    fn unavailable(&self) -> RouteError {
        warn!(room = %self.room.id(), "room actor is not running");
        RouteError::RoomUnavailable(self.room.id().to_string())
    }

    pub(crate) async fn start(&self) -> Result<(), RouteError> {
        self.single.ask(Start).send().await.map_err(|_| self.unavailable())
    }

    /// Add `connection` to the room and run the server's `on_connect`.
    pub async fn connect(&self, connection: Connection) -> Result<(), RouteError> {
        self.single.ask(Connect(connection)).send().await.map_err(|_| self.unavailable())
    }

    /// Deliver one inbound frame; returns once the server has handled it.
    pub async fn message(&self, sender: Connection, message: Bytes) -> Result<(), RouteError> {
        self.single.ask(Incoming { sender, message }).send().await.map_err(|_| self.unavailable())
    }

    /// Remove `connection` from the room and run the server's `on_close`.
    pub async fn disconnect(&self, connection: Connection) -> Result<(), RouteError> {
        self.single.ask(Disconnect(connection)).send().await.map_err(|_| self.unavailable())
    }

    pub async fn fault(&self, connection: Connection, error: ConnectionError) -> Result<(), RouteError> {
        self.single.ask(Fault { connection, error }).send().await.map_err(|_| self.unavailable())
    }

    pub async fn request(&self, request: Request) -> Response {
        match self.single.ask(HttpRequest(request)).send().await {
            Ok(response) => response.0,
            Err(_) => self.unavailable().into_response(),
        }
    }

    pub async fn alarm(&self) -> Result<(), RouteError> {
        self.single.ask(Alarm).send().await.map_err(|_| self.unavailable())
    }
}
