use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET, PUT, POST, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Accept, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization";

/// JSON envelope of every non-payload response.
#[derive(Debug, Serialize)]
pub struct Res {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Res {
    pub fn ok(status: StatusCode) -> Response {
        (status, Json(Res { ok: true, error: None })).into_response()
    }

    pub fn err(status: StatusCode, error: &str) -> Response {
        (status, Json(Res { ok: false, error: Some(error.to_string()) })).into_response()
    }
}

pub fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    response
}
