//! Server that records every callback, for tests.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::room::RoomId;
use crate::server::{
    OnAlarmPayload, OnClosePayload, OnConnectPayload, OnErrorPayload, OnMessagePayload, OnRequestPayload,
    OnStartPayload, Server,
};
use crate::service::Service;

#[derive(Clone, Default)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.events.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub(crate) fn server(&self) -> RecordingServer {
        RecordingServer { events: Arc::clone(&self.events) }
    }

    /// A service whose `party` records into this recorder.
    pub(crate) fn service(&self, party: &str) -> Service {
        let recorder = self.clone();
        let mut service = Service::new();
        service.register_server(party, move |_: &RoomId| recorder.server());
        service
    }
}

pub(crate) struct RecordingServer {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingServer {
    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl Server for RecordingServer {
    async fn on_start(&mut self, p: OnStartPayload<'_>) {
        self.push(format!("start {}", p.room.id()));
    }

    async fn on_connect(&mut self, p: OnConnectPayload<'_>) {
        self.push(format!("connect {}", p.connection.id()));
    }

    async fn on_message(&mut self, p: OnMessagePayload<'_>) {
        self.push(format!("message {} {}", p.sender.id(), String::from_utf8_lossy(&p.message)));
    }

    async fn on_close(&mut self, p: OnClosePayload<'_>) {
        self.push(format!("close {}", p.connection.id()));
    }

    async fn on_error(&mut self, p: OnErrorPayload<'_>) {
        self.push(format!("error {} {}", p.connection.id(), p.error));
    }

    async fn on_request(&mut self, p: OnRequestPayload<'_>) -> Response {
        self.push(format!("request {}", p.request.method()));
        StatusCode::OK.into_response()
    }

    async fn on_alarm(&mut self, _p: OnAlarmPayload<'_>) {
        self.push("alarm".to_string());
    }
}
