use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use crate::server::{
    OnAlarmPayload, OnClosePayload, OnConnectPayload, OnErrorPayload, OnMessagePayload, OnRequestPayload,
    OnStartPayload, Server,
};

/// Default server for parties without one of their own: logs every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger;

#[async_trait]
impl Server for Logger {
    async fn on_start(&mut self, p: OnStartPayload<'_>) {
        info!(room = %p.room.id(), "started");
    }

    async fn on_connect(&mut self, p: OnConnectPayload<'_>) {
        info!(room = %p.room.id(), id = p.connection.id(), "connected");
    }

    async fn on_message(&mut self, p: OnMessagePayload<'_>) {
        info!(room = %p.room.id(), from = p.sender.id(), message = %String::from_utf8_lossy(&p.message), "received");
    }

    async fn on_close(&mut self, p: OnClosePayload<'_>) {
        info!(room = %p.room.id(), id = p.connection.id(), "closed");
    }

    async fn on_error(&mut self, p: OnErrorPayload<'_>) {
        error!(room = %p.room.id(), id = p.connection.id(), err = %p.error, "error");
    }

    async fn on_request(&mut self, p: OnRequestPayload<'_>) -> Response {
        info!(room = %p.room.id(), url = %p.request.uri(), method = %p.request.method(), "request");
        StatusCode::NO_CONTENT.into_response()
    }

    async fn on_alarm(&mut self, p: OnAlarmPayload<'_>) {
        info!(room = %p.room.id(), "alarm");
    }
}
