//! HTTP server implementation
//!
//! Thin operator surface over the aggregation engine. Uses hyper http1 with
//! TokioIo for async handling; all routing is a method/path match.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::aggregation::{AggregationScheduler, StatsReader};
use crate::config::Args;
use crate::db::MongoClient;
use crate::routes;
use crate::types::TallyError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    /// The one scheduler instance for this process
    pub scheduler: Arc<AggregationScheduler>,
    /// Read-only backlog and ranking introspection
    pub stats: Arc<StatsReader>,
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), TallyError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Tallyhouse listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|q| q.to_string());

    debug!("[{}] {} {}", addr, method, path);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state)).await
        }
        (&Method::GET, "/ready") | (&Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }
        (&Method::GET, "/status") => routes::status_check(Arc::clone(&state)).await,

        (&Method::GET, "/aggregation/status") => {
            routes::handle_scheduler_status(Arc::clone(&state)).await
        }
        (&Method::POST, "/aggregation/drain") => {
            routes::handle_drain(Arc::clone(&state), query.as_deref()).await
        }
        (&Method::GET, "/aggregation/enabled") => {
            routes::handle_enabled_get(Arc::clone(&state))
        }
        (&Method::PUT, "/aggregation/enabled") => {
            let body = req.into_body().collect().await?.to_bytes();
            routes::handle_enabled_put(Arc::clone(&state), &body)
        }
        (&Method::POST, "/aggregation/timer/start") => {
            routes::handle_timer_start(Arc::clone(&state)).await
        }
        (&Method::POST, "/aggregation/timer/stop") => {
            routes::handle_timer_stop(Arc::clone(&state)).await
        }
        (&Method::GET, "/aggregation/backlog") => {
            routes::handle_backlog(Arc::clone(&state), query.as_deref()).await
        }

        (&Method::GET, _) if path.starts_with("/rankings/") => {
            routes::handle_rankings(Arc::clone(&state), &path, query.as_deref()).await
        }

        _ => routes::not_found(&path),
    };

    Ok(response)
}
