use super::{generator::generate_prices, writer::forward_updates};
use crate::server::{
    config::ServerConfig,
    telemetry::{
        decrement_streams_inflight, increment_stream_errors, increment_streams_inflight,
        record_stream_duration,
    },
};
use axum::body::Body;
use core::pin::Pin;
use core::task::{Context, Poll};
use futures::Stream;
use pin_project_lite::pin_project;
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};
use pricecast_core::{Error, PRICE_UPDATE_EVENT, Price};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::{
    io::ReaderStream,
    sync::{CancellationToken, DropGuard},
};
use tracing::Instrument;

/// Counts open streaming sessions and hands out session ids.
#[derive(Debug, Default)]
pub struct SessionTracker {
    inflight: AtomicUsize,
    next_id: AtomicU64,
}

impl SessionTracker {
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    fn begin(&self) -> u64 {
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn end(&self) {
        self.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
    }
}

pin_project! {
    /// Response body stream that cancels its session when dropped.
    ///
    /// hyper drops the body as soon as the client disconnects, so the
    /// generator hears about it right away instead of on the next failed
    /// write.
    pub struct SessionBody<S> {
        #[pin]
        inner: S,
        _cancel_on_drop: DropGuard,
    }
}

impl<S: Stream> Stream for SessionBody<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Opens one streaming session and returns the response body feeding it.
///
/// A session owns:
/// - a generator task producing one [`Price`] per tick,
/// - a capacity-1 handoff channel between the generator and the writer,
/// - a writer task formatting each price as a `price-update` record into an
///   in-memory pipe whose read half is the returned [`Body`],
/// - a [`CancellationToken`], child of `shutdown`, cancelled when the body is
///   dropped, when the writer stops, or when the server shuts down.
///
/// Nothing here is shared with other sessions apart from `tracker`.
pub fn open_session(
    config: &ServerConfig,
    shutdown: &CancellationToken,
    tracker: Arc<SessionTracker>,
) -> Body {
    let session_id = tracker.begin();
    let cancel = shutdown.child_token();

    let (price_tx, price_rx) = mpsc::channel::<Price>(1);
    let (reader, mut writer) = tokio::io::duplex(config.write_buffer_bytes);

    let span = tracing::info_span!("session", id = session_id);

    tokio::spawn(
        generate_prices(cancel.clone(), price_tx, config.tick_interval).instrument(span.clone()),
    );

    let writer_cancel = cancel.clone();
    let shutdown = shutdown.clone();
    let fut = async move {
        let start = std::time::Instant::now();
        tracing::info!("Price stream started");

        // Stop the generator whichever way the writer exits.
        let _guard = writer_cancel.drop_guard();

        match forward_updates(price_rx, &mut writer, PRICE_UPDATE_EVENT).await {
            Ok(sent) if shutdown.is_cancelled() => {
                tracing::info!(sent, "Finished sending price updates (server shutting down)");
            }
            Ok(sent) => {
                tracing::info!(sent, "Finished sending price updates (client disconnected)");
            }
            Err(e @ Error::Transport(_)) => {
                tracing::info!("Client gone: {e}");
                increment_stream_errors();
            }
            Err(e) => {
                tracing::error!("Dropping price stream: {e}");
                increment_stream_errors();
            }
        }

        let elapsed = start.elapsed();
        record_stream_duration(elapsed.as_secs_f64() * 1_000.0);
        tracing::debug!(?elapsed, "Session closed");
        tracker.end();
    };

    tokio::spawn(fut.instrument(span));

    Body::from_stream(SessionBody {
        inner: ReaderStream::new(reader),
        _cancel_on_drop: cancel.drop_guard(),
    })
}
