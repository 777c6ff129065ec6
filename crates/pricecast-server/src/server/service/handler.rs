//! HTTP surface of the price streaming service.
//!
//! This module defines [`PriceService`], the shared state behind every route,
//! and [`router`], which mounts:
//!
//! - `GET /` - the static landing page.
//! - `GET /crypto-price` - an unbounded `text/event-stream` of `price-update`
//!   records, one per tick, until the client disconnects.
//! - `GET /healthz` - `SERVING` until shutdown begins, then `NOT_SERVING`.
//!
//! Each `/crypto-price` request gets its own generator and writer (see
//! [`open_session`]). The service itself only holds the configuration, the
//! shutdown token every session token derives from, and a session counter.

use crate::server::{
    config::ServerConfig,
    streaming::session::{SessionTracker, open_session},
    telemetry::increment_requests,
};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use core::time::Duration;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

const INDEX_HTML: &str = include_str!("../../../static/index.html");

#[derive(Clone)]
pub struct PriceService {
    config: ServerConfig,
    shutdown_token: CancellationToken,
    sessions: Arc<SessionTracker>,
    serving: Arc<AtomicBool>,
}

impl PriceService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            shutdown_token: CancellationToken::new(),
            sessions: Arc::new(SessionTracker::default()),
            serving: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Number of `/crypto-price` sessions still running.
    pub fn streams_inflight(&self) -> usize {
        self.sessions.inflight()
    }

    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    /// Resolves once [`Self::shutdown`] has cancelled every session.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFutureOwned {
        self.shutdown_token.clone().cancelled_owned()
    }

    /// Stops the service in three phases:
    ///
    /// 1. Health flips to `NOT_SERVING`.
    /// 2. Open streams get up to `shutdown_timeout` to end on their own.
    /// 3. The shutdown token is cancelled, which stops every remaining
    ///    generator and lets its response body end.
    pub async fn shutdown(&self) {
        tracing::info!("Marking service as not serving");
        self.serving.store(false, Ordering::Release);

        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );
        let drained = timeout(self.config.shutdown_timeout, async {
            while self.streams_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight streams drained"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.streams_inflight()
            ),
        }

        tracing::debug!("Cancelling remaining streams via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Builds the application router with permissive CORS.
pub fn router(service: PriceService) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/crypto-price", get(crypto_price))
        .route("/healthz", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(service)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(service): State<PriceService>) -> (StatusCode, &'static str) {
    if service.is_serving() {
        (StatusCode::OK, "SERVING")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_SERVING")
    }
}

/// Starts a price stream for this request.
///
/// Headers are fixed before the first byte of the body exists, so the client
/// always sees `text/event-stream` even if the stream ends immediately.
#[tracing::instrument(skip_all)]
async fn crypto_price(State(service): State<PriceService>) -> Response {
    tracing::info!("Request received for price stream");
    increment_requests();

    let body = open_session(
        &service.config,
        &service.shutdown_token,
        Arc::clone(&service.sessions),
    );

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
