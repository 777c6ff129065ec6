use core::time::Duration;
use pricecast_core::Price;
use rand::{SeedableRng, rngs::StdRng};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

/// Produces one [`Price`] per `period` on `price_tx` until `cancel` fires or
/// the receiver goes away.
///
/// The first price is drawn one full `period` after the task starts. Each send
/// waits for a free slot in the channel, so with a capacity-1 channel the
/// generator never runs more than one value ahead of the writer.
///
/// # Cancellation
///
/// Cancellation is checked before every tick and raced against every blocked
/// send (cancellation wins ties). A price whose send did not complete is
/// dropped, never half-delivered. On every exit path the interval and
/// `price_tx` are dropped, which closes the channel: that is the only
/// completion signal the writer gets.
pub async fn generate_prices(
    cancel: CancellationToken,
    price_tx: mpsc::Sender<Price>,
    period: Duration,
) {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(?period, "Generator started");
    let mut sent = 0_u64;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let price = Price::sample(&mut rng);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            res = price_tx.send(price) => {
                if res.is_err() {
                    tracing::debug!("Price receiver dropped");
                    break;
                }
                sent += 1;
                tracing::trace!(%price, "Generated price");
            }
        }
    }

    tracing::debug!(sent, "Finished generating prices");
}
