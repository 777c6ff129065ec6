use crate::server::telemetry::increment_events_sent;
use pricecast_core::{Result, format_server_sent_event};
use serde::Serialize;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

/// Forwards every value received on `rx` to `writer` as an SSE record named
/// `event`.
///
/// Each record is fully encoded before any of its bytes are written, then
/// written and flushed on its own so the client sees it without buffering
/// delay.
///
/// Returns the number of records written once `rx` is closed.
///
/// # Errors
///
/// Stops at the first failure without retrying:
/// - [`pricecast_core::Error::Encoding`] (or `InvalidEventName`) if a value
///   cannot be formatted. Nothing from that record reaches `writer`.
/// - [`pricecast_core::Error::Transport`] if a write or flush fails, which
///   means the client is gone.
pub async fn forward_updates<T, W>(
    mut rx: mpsc::Receiver<T>,
    writer: &mut W,
    event: &str,
) -> Result<u64>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut written = 0;

    while let Some(value) = rx.recv().await {
        let record = format_server_sent_event(event, &value)?;

        writer.write_all(record.as_bytes()).await?;
        writer.flush().await?;

        written += 1;
        increment_events_sent();
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::pin::Pin;
    use core::task::{Context, Poll};
    use pricecast_core::{Error, PRICE_UPDATE_EVENT, Price};
    use serde::Serializer;
    use std::io;
    use tokio::io::AsyncReadExt;

    /// Accepts `budget` successful writes, then fails like a closed socket.
    struct FlakyWriter {
        budget: usize,
        written: Vec<u8>,
        flushes: usize,
    }

    impl AsyncWrite for FlakyWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.budget == 0 {
                return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
            }
            self.budget -= 1;
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.flushes += 1;
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Serializes normally unless `fail` is set.
    struct Payload {
        value: u8,
        fail: bool,
    }

    impl Serialize for Payload {
        fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            if self.fail {
                return Err(serde::ser::Error::custom("unserializable payload"));
            }
            serializer.serialize_u8(self.value)
        }
    }

    fn price(v: u8) -> Price {
        Price::new(v).unwrap()
    }

    #[tokio::test]
    async fn writes_records_in_generation_order() {
        let (tx, rx) = mpsc::channel(1);
        let (mut client, mut server) = tokio::io::duplex(1024);

        let producer = tokio::spawn(async move {
            for v in [17, 3, 99] {
                tx.send(price(v)).await.unwrap();
            }
        });

        let written = forward_updates(rx, &mut server, PRICE_UPDATE_EVENT)
            .await
            .unwrap();
        producer.await.unwrap();
        drop(server);

        let mut body = String::new();
        client.read_to_string(&mut body).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(
            body,
            "event: price-update\ndata: {\"data\":17}\n\n\
             event: price-update\ndata: {\"data\":3}\n\n\
             event: price-update\ndata: {\"data\":99}\n\n"
        );
    }

    #[tokio::test]
    async fn flushes_after_every_record() {
        let (tx, rx) = mpsc::channel(1);
        let mut writer = FlakyWriter {
            budget: usize::MAX,
            written: Vec::new(),
            flushes: 0,
        };

        tokio::spawn(async move {
            for v in 0..4 {
                tx.send(price(v)).await.unwrap();
            }
        });

        let written = forward_updates(rx, &mut writer, PRICE_UPDATE_EVENT)
            .await
            .unwrap();
        assert_eq!(written, 4);
        assert_eq!(writer.flushes, 4);
    }

    #[tokio::test]
    async fn closed_channel_without_values_writes_nothing() {
        let (tx, rx) = mpsc::channel::<Price>(1);
        drop(tx);

        let mut out = Vec::new();
        let written = forward_updates(rx, &mut out, PRICE_UPDATE_EVENT)
            .await
            .unwrap();
        assert_eq!(written, 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn stops_on_transport_error() {
        let (tx, rx) = mpsc::channel(1);
        let mut writer = FlakyWriter {
            budget: 1,
            written: Vec::new(),
            flushes: 0,
        };

        tokio::spawn(async move {
            for v in 0..10 {
                if tx.send(price(v)).await.is_err() {
                    break;
                }
            }
        });

        let err = forward_updates(rx, &mut writer, PRICE_UPDATE_EVENT)
            .await
            .unwrap_err();
        assert!(err.is_client_gone(), "got {err:?}");
        assert_eq!(writer.written, b"event: price-update\ndata: {\"data\":0}\n\n");
    }

    #[tokio::test]
    async fn encoding_error_writes_no_partial_record() {
        let (tx, rx) = mpsc::channel(1);
        let mut out = Vec::new();

        tokio::spawn(async move {
            let _ = tx.send(Payload { value: 5, fail: false }).await;
            let _ = tx.send(Payload { value: 6, fail: true }).await;
            let _ = tx.send(Payload { value: 7, fail: false }).await;
        });

        let err = forward_updates(rx, &mut out, PRICE_UPDATE_EVENT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)), "got {err:?}");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "event: price-update\ndata: {\"data\":5}\n\n"
        );
    }

    #[tokio::test]
    async fn writer_failure_releases_the_producer() {
        let (tx, rx) = mpsc::channel(1);
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        tx.send(price(1)).await.unwrap();
        let err = forward_updates(rx, &mut server, PRICE_UPDATE_EVENT)
            .await
            .unwrap_err();

        assert!(err.is_client_gone(), "got {err:?}");
        assert!(tx.is_closed());
    }
}
