use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::connection::Connection;
use crate::error::ConnectionError;
use crate::room::Room;

// ============================================================================
// Payloads
// ============================================================================

pub struct OnStartPayload<'a> {
    pub room: &'a Room,
}

pub struct OnConnectPayload<'a> {
    pub room: &'a Room,
    pub connection: &'a Connection,
}

pub struct OnMessagePayload<'a> {
    pub room: &'a Room,
    pub sender: &'a Connection,
    /// Raw frame payload as received.
    pub message: Bytes,
}

pub struct OnClosePayload<'a> {
    pub room: &'a Room,
    pub connection: &'a Connection,
}

pub struct OnErrorPayload<'a> {
    pub room: &'a Room,
    pub connection: &'a Connection,
    pub error: &'a ConnectionError,
}

/// Payload for a plain (non-upgrade) HTTP request routed to the room.
pub struct OnRequestPayload<'a> {
    pub room: &'a Room,
    pub request: Request,
}

pub struct OnAlarmPayload<'a> {
    pub room: &'a Room,
}

// ============================================================================
// Server Trait
// ============================================================================

/// Logic backing one room.
///
/// The engine only ever calls a server through its room actor, so calls on
/// one instance never overlap and arrive in the order the room received
/// them. Rooms run independently of each other.
#[async_trait]
pub trait Server: Send + 'static {
    /// Called once when the room is created, before any connection is accepted.
    async fn on_start(&mut self, _payload: OnStartPayload<'_>) {}

    /// Called after a connection has been added to the room.
    async fn on_connect(&mut self, _payload: OnConnectPayload<'_>) {}

    /// Called for every inbound frame.
    async fn on_message(&mut self, _payload: OnMessagePayload<'_>) {}

    /// Called after a connection has been removed from the room.
    async fn on_close(&mut self, _payload: OnClosePayload<'_>) {}

    /// Called when a connection faults, before it is closed.
    async fn on_error(&mut self, _payload: OnErrorPayload<'_>) {}

    /// Produce the full response (status, headers, body) for an HTTP request.
    async fn on_request(&mut self, _payload: OnRequestPayload<'_>) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }

    /// Called by an external timer.
    async fn on_alarm(&mut self, _payload: OnAlarmPayload<'_>) {}
}
