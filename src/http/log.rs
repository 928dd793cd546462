//! Small inline modules so that request logging can be filtered separately
//! via `log.filters`, e.g. `"coursecast::http::log::headers" = "off"`.

use hyper::{body::Incoming, Request};
use crate::prelude::*;

pub(super) mod req {
    use super::*;

    pub(in crate::http) fn log(req: &Request<Incoming>) {
        trace!(
            method = ?req.method(),
            path = req.uri().path_and_query().map_or("", |pq| pq.as_str()),
            "Incoming HTTP request",
        );
    }
}

pub(super) mod headers {
    use super::*;

    pub(in crate::http) fn log(req: &Request<Incoming>) {
        if tracing::enabled!(tracing::Level::TRACE) {
            let out = req.headers().iter()
                .map(|(name, value)| {
                    format!("\n  {name}: {}", String::from_utf8_lossy(value.as_bytes()))
                })
                .collect::<String>();
            trace!("HTTP headers: {out}");
        }
    }
}

pub(super) mod resp {
    use hyper::{Method, StatusCode};
    use std::time::Duration;
    use super::*;

    pub(in crate::http) fn log(method: &Method, path: &str, status: StatusCode, took: Duration) {
        debug!("{method} {path} -> {status} ({took:.2?})");
    }
}
