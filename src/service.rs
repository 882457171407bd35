use kameo::actor::Spawn;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::actor::{Single, SingleArgs};
use crate::error::RouteError;
use crate::logger::Logger;
use crate::room::{LiveRoom, Room, RoomId};
use crate::server::Server;
use crate::storage::{MemoryStorage, Storage};

/// Builds the server for a newly created room.
pub type ServerConstructor = Arc<dyn Fn(&RoomId) -> Box<dyn Server> + Send + Sync>;

/// Builds the private storage for a newly created room.
pub type StorageConstructor = Arc<dyn Fn(&RoomId) -> Arc<dyn Storage> + Send + Sync>;

/// Registry of live rooms and of the servers backing each party.
///
/// Rooms are created on first access and live as long as the service.
/// Parties without a registered server get the default server, the
/// [`Logger`] unless [`without_default_server`](Self::without_default_server)
/// was called, in which case they are rejected.
pub struct Service {
    rooms: RwLock<HashMap<RoomId, LiveRoom>>,
    servers: HashMap<String, ServerConstructor>,
    default_server: Option<ServerConstructor>,
    storage: StorageConstructor,
}

impl Service {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            servers: HashMap::new(),
            default_server: Some(Arc::new(|_: &RoomId| Box::new(Logger) as Box<dyn Server>)),
            storage: Arc::new(|_: &RoomId| Arc::new(MemoryStorage::new()) as Arc<dyn Storage>),
        }
    }

    /// Serve rooms of `party` with servers built by `constructor`.
    pub fn register_server<F, S>(&mut self, party: impl Into<String>, constructor: F)
    where
        F: Fn(&RoomId) -> S + Send + Sync + 'static,
        S: Server,
    {
        let constructor: ServerConstructor = Arc::new(move |id: &RoomId| Box::new(constructor(id)) as Box<dyn Server>);
        self.servers.insert(party.into(), constructor);
    }

    /// Reject parties that have no registered server.
    pub fn without_default_server(mut self) -> Self {
        self.default_server = None;
        self
    }

    /// Replace the per-room in-memory storage.
    pub fn with_storage<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&RoomId) -> Arc<dyn Storage> + Send + Sync + 'static,
    {
        self.storage = Arc::new(constructor);
        self
    }

    /// Get the room `(party, room)`, creating and starting it on first access.
    ///
    /// Concurrent first accesses collapse onto one room: the server is built
    /// and its `on_start` runs exactly once, before the room becomes visible.
    pub async fn room(&self, party: &str, room: &str) -> Result<LiveRoom, RouteError> {
        let id = RoomId::new(party, room);

        if let Some(live) = self.rooms.read().await.get(&id) {
            return Ok(live.clone());
        }

        let mut rooms = self.rooms.write().await;
        if let Some(live) = rooms.get(&id) {
            return Ok(live.clone());
        }

        let constructor = self
            .servers
            .get(party)
            .or(self.default_server.as_ref())
            .ok_or_else(|| RouteError::UnknownParty(party.to_string()))?;

        let server = constructor(&id);
        let room = Arc::new(Room::new(id.clone(), (self.storage)(&id)));
        let single = Single::spawn(SingleArgs { room: Arc::clone(&room), server });
        let live = LiveRoom::new(room, single);
        live.start().await?;

        info!(room = %id, "room started");
        rooms.insert(id, live.clone());
        Ok(live)
    }

    /// Get the room `(party, room)` only if it already exists.
    pub async fn existing(&self, party: &str, room: &str) -> Option<LiveRoom> {
        self.rooms.read().await.get(&RoomId::new(party, room)).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for Service { fn default() -> Self { Self::new() } }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Recorder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_first_access_creates_one_room() {
        let recorder = Recorder::default();
        let storages = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&storages);
        let service = Arc::new(recorder.service("rec").with_storage(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            Arc::new(MemoryStorage::new()) as Arc<dyn Storage>
        }));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let service = Arc::clone(&service);
            tasks.push(tokio::spawn(async move { service.room("rec", "hot").await.unwrap() }));
        }
        let mut rooms = Vec::new();
        for task in tasks {
            rooms.push(task.await.unwrap());
        }

        assert_eq!(recorder.count("start"), 1);
        assert_eq!(storages.load(Ordering::SeqCst), 1);
        assert!(rooms.iter().all(|live| Arc::ptr_eq(live.room(), rooms[0].room())));
        assert_eq!(service.room_count().await, 1);
    }

    #[tokio::test]
    async fn rooms_are_keyed_by_party_and_name() {
        let recorder = Recorder::default();
        let service = recorder.service("rec");

        let a = service.room("rec", "a").await.unwrap();
        let b = service.room("rec", "b").await.unwrap();
        let other = service.room("other", "a").await.unwrap();

        assert!(!Arc::ptr_eq(a.room(), b.room()));
        assert!(!Arc::ptr_eq(a.room(), other.room()));
        assert_eq!(service.room_count().await, 3);
        // "other" has no registered server and falls back to the logger
        assert_eq!(recorder.events(), vec!["start rec/a", "start rec/b"]);
    }

    #[tokio::test]
    async fn strict_service_rejects_unknown_parties() {
        let service = Service::new().without_default_server();
        let err = service.room("ghost", "r").await.err().unwrap();
        assert!(matches!(err, RouteError::UnknownParty(party) if party == "ghost"));
        assert_eq!(service.room_count().await, 0);
    }

    #[tokio::test]
    async fn existing_does_not_create_rooms() {
        let service = Service::new();
        assert!(service.existing("p", "r").await.is_none());
        service.room("p", "r").await.unwrap();
        assert!(service.existing("p", "r").await.is_some());
    }

    #[tokio::test]
    async fn each_room_gets_its_own_storage() {
        let service = Service::new();
        let a = service.room("p", "a").await.unwrap();
        let b = service.room("p", "b").await.unwrap();

        a.room().storage().put("k", bytes::Bytes::from_static(b"v")).await.unwrap();
        assert!(b.room().storage().get("k").await.unwrap().is_none());
    }
}
