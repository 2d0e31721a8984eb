use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{interval, MissedTickBehavior};

use crate::lifecycle::{Manager, Store};

/// Cancels expired transactions every `period`, forever.
///
/// A failed sweep is logged and retried on the next tick.
pub async fn run<S: Store>(manager: &Manager<S>, period: Duration) {
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(?period, "expired transactions sweeper started");

    loop {
        interval.tick().await;

        match manager.sweep_expired(OffsetDateTime::now_utc()).await {
            Ok(canceled) if canceled.is_empty() => {
                tracing::debug!("no expired transactions");
            }
            Ok(canceled) => tracing::info!(
                count = canceled.len(),
                "canceled expired transactions",
            ),
            Err(e) => tracing::error!("expired transactions sweep failed: {e}"),
        }
    }
}
