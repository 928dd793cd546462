//! The HTTP server, handler and routes.
//!
//! This file only sets up the `hyper` server and catches panics. The routes
//! are in `handlers.rs`.

use deadpool_postgres::Pool;
use hyper::{body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use std::{
    convert::Infallible,
    future::Future,
    net::{IpAddr, SocketAddr},
    panic::AssertUnwindSafe,
    sync::Arc,
};
use tokio::net::TcpListener;

use crate::{
    cleanup::CourseCleanup,
    config::Config,
    db::DbMappingStore,
    events::EventBus,
    opencast::OcBridge,
    prelude::*,
    util::ByteBody,
};

mod handlers;
mod log;
mod response;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(default = 3090)]
    pub(crate) port: u16,

    /// The bind address to listen on. The API is meant to be called by the
    /// host LMS only, so this should usually stay a local address.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,
}


type Response<T = ByteBody> = hyper::Response<T>;
type Request<T = Incoming> = hyper::Request<T>;


/// Context that the request handler has access to.
struct Context {
    config: Config,
    store: DbMappingStore,

    /// One per configured Opencast instance, in config order.
    bridges: Vec<OcBridge>,
    events: EventBus,
}

impl Context {
    fn new(config: Config, db: Pool) -> Result<Self> {
        let store = DbMappingStore::new(db);
        let bridges = OcBridge::for_all_instances(&config.opencast, &store)?;

        let mut events = EventBus::new();
        let cleanup = CourseCleanup::from_config(&config.opencast, store.clone())?;
        events.subscribe(Arc::new(cleanup));

        Ok(Self { config, store, bridges, events })
    }
}


/// Starts the HTTP server and runs it until Ctrl+C is pressed.
pub(crate) async fn serve(config: Config, db: Pool) -> Result<()> {
    let addr = SocketAddr::new(config.http.address, config.http.port);
    let ctx = Arc::new(Context::new(config, db)?);

    let listener = TcpListener::bind(addr).await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(v) => v,
                Err(e) => {
                    warn!("Failed to accept connection: {e}");
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down HTTP server");
                return Ok(());
            }
        };

        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                handle_internal_errors(handlers::handle(req, Arc::clone(&ctx)))
            });

            let builder = auto::Builder::new(TokioExecutor::new());
            if let Err(e) = builder.serve_connection(TokioIo::new(stream), service).await {
                debug!("Error serving connection from {peer}: {e}");
            }
        });
    }
}

/// Wraps the handler future and catches all panics while polling it, so that
/// we answer with `500` instead of just closing the connection.
async fn handle_internal_errors(
    future: impl Future<Output = Response>,
) -> Result<Response, Infallible> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(panic) => {
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().copied());

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{msg}'"),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            Ok(response::internal_server_error())
        }
    }
}
