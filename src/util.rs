use bytes::Bytes;
use http_body_util::BodyExt;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

use crate::prelude::*;


/// Characters that are not percent-encoded: the "unreserved" set of RFC 3986.
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Body type of all requests we send and responses we produce.
pub(crate) type ByteBody = http_body_util::Full<Bytes>;

pub(crate) type HttpClient = Client<HttpsConnector<HttpConnector>, ByteBody>;

/// Returns an HTTP client that can also speak HTTPS. HTTPS is _not_ enforced!
pub(crate) fn http_client() -> Result<HttpClient> {
    let https = HttpsConnectorBuilder::new()
        .with_native_roots()
        .context("failed to load native certificate roots")?
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    Ok(Client::builder(TokioExecutor::new()).build(https))
}

/// Downloads the whole body into memory.
pub(crate) async fn download_body<B>(body: B) -> Result<Bytes>
where
    B: hyper::body::Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .context("failed to download HTTP body")
}
