use bytes::Bytes;
use hyper::{header, StatusCode};
use serde::Serialize;

use crate::{prelude::*, util::ByteBody};
use super::Response;


fn plain(status: StatusCode, body: &'static str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=UTF-8")
        .body(ByteBody::new(Bytes::from_static(body.as_bytes())))
        .expect("bug: failed to build response")
}

pub(super) fn json(status: StatusCode, value: &impl Serialize) -> Response {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize JSON response: {e}");
            return internal_server_error();
        }
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(ByteBody::new(body.into()))
        .expect("bug: failed to build response")
}

pub(super) fn no_content() -> Response {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(ByteBody::new(Bytes::new()))
        .expect("bug: failed to build response")
}

pub(super) fn bad_request(msg: impl Into<String>) -> Response {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header(header::CONTENT_TYPE, "text/plain; charset=UTF-8")
        .body(ByteBody::new(msg.into().into()))
        .expect("bug: failed to build response")
}

pub(super) fn not_found() -> Response {
    plain(StatusCode::NOT_FOUND, "Not found")
}

pub(super) fn method_not_allowed() -> Response {
    plain(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed")
}

pub(super) fn service_unavailable() -> Response {
    plain(
        StatusCode::SERVICE_UNAVAILABLE,
        "Server error: service unavailable. Potentially try again later.",
    )
}

pub(crate) fn internal_server_error() -> Response {
    plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
