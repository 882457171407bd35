use axum::extract::Request;
use axum::response::Response;
use bytes::Bytes;
use kameo::error::Infallible;
use kameo::reply::{Reply, ReplyError};

use crate::connection::Connection;
use crate::error::ConnectionError;

pub struct Start;

pub struct Connect(pub Connection);

pub struct Incoming {
    pub sender: Connection,
    pub message: Bytes,
}

pub struct Disconnect(pub Connection);

pub struct Fault {
    pub connection: Connection,
    pub error: ConnectionError,
}

pub struct HttpRequest(pub Request);

pub struct Alarm;

/// Newtype wrapper around an axum `Response` that implements kameo's `Reply` trait.
pub struct RoomResponse(pub Response);

impl Reply for RoomResponse {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> { Ok(self) }
    fn into_any_err(self) -> Option<Box<dyn ReplyError>> { None }
    fn into_value(self) -> Self::Value { self }
}
