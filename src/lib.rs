//! # Partyline
//!
//! Multi-tenant real-time room server. Clients open websockets into rooms
//! grouped under parties, and a pluggable [`Server`] per room reacts to
//! connects, messages, HTTP requests, disconnects and alarms. Every room
//! runs its server on its own actor, so callbacks of one room never overlap.
//!
//! ## Quick Start
//!
//! ```no_run
//! use partyline::{PartyServer, Service};
//!
//! #[tokio::main]
//! async fn main() {
//!     // every party gets the logging server
//!     PartyServer::new(Service::new())
//!         .serve("0.0.0.0:8178")
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Fireproof Party
//!
//! ```no_run
//! use partyline::{Fireproof, PartyServer, RoomId, Service};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = Service::new();
//!     service.register_server("fireproof", |_: &RoomId| Fireproof::new());
//!
//!     // ws://host:8178/fireproof/<room>?_pk=<connection id>
//!     PartyServer::new(service).serve("0.0.0.0:8178").await.unwrap();
//! }
//! ```
//!
//! ## Custom Server
//!
//! ```no_run
//! use partyline::{Server, OnMessagePayload, PartyServer, RoomId, Service};
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Server for Echo {
//!     async fn on_message(&mut self, p: OnMessagePayload<'_>) {
//!         p.room.broadcast_except(p.message, &[p.sender.id()]).await;
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = Service::new();
//!     service.register_server("echo", |_: &RoomId| Echo);
//!     PartyServer::new(service).serve("0.0.0.0:8178").await.unwrap();
//! }
//! ```
//!
//! ## Composing with Axum
//!
//! ```no_run
//! use partyline::{PartyServer, Service};
//! use axum::{Router, routing::get};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = PartyServer::new(Service::new()).with_prefix("/parties");
//!     let handle = server.handle();
//!
//!     let app = Router::new()
//!         .merge(server.into_router())
//!         .route("/health", get(|| async { "ok" }));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8178").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod actor;
mod config;
mod connection;
mod error;
mod logger;
mod party;
mod room;
mod server;
mod service;
mod storage;
pub mod fireproof;

#[cfg(test)]
mod testing;

// Public API
pub use config::Config;
pub use connection::{Connection, OUTBOUND_CAPACITY};
pub use error::{ConnectionError, RouteError, StorageError};
pub use fireproof::Fireproof;
pub use logger::Logger;
pub use party::{PartyServer, Handle};
pub use room::{LiveRoom, Room, RoomId};
pub use server::{
    Server,
    OnStartPayload, OnConnectPayload, OnMessagePayload, OnClosePayload,
    OnErrorPayload, OnRequestPayload, OnAlarmPayload,
};
pub use service::{Service, ServerConstructor, StorageConstructor};
pub use storage::{Storage, MemoryStorage};

pub use axum;
pub use async_trait::async_trait;
