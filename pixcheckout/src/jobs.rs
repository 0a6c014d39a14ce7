//! Periodic maintenance jobs.
//!
//! Each job is a plain async function callable from an admin endpoint, plus a `run_*` loop that
//! repeats it on an interval until the shutdown token is cancelled.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    db::handlers::Orders,
    errors::{Error, Result},
};

/// Expire every pending order past its deadline. Returns how many orders were expired.
#[instrument(skip(pool), err)]
pub async fn expire_orders(pool: &PgPool) -> Result<u64> {
    let mut tx = pool.begin().await.map_err(|e| Error::Database(e.into()))?;
    let expired = Orders::new(&mut tx).expire_overdue().await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if !expired.is_empty() {
        info!(count = expired.len(), "Expired overdue orders");
        metrics::counter!("pixcheckout_orders_expired_total").increment(expired.len() as u64);
    }
    Ok(expired.len() as u64)
}

/// Run [`expire_orders`] every `interval` until cancelled.
pub async fn run_order_expiry(pool: PgPool, interval: Duration, shutdown: CancellationToken) {
    info!(interval = ?interval, "Starting order expiry sweeper");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = expire_orders(&pool).await {
                    tracing::error!(error = %e, "Order expiry sweep failed");
                }
            }
            _ = shutdown.cancelled() => {
                info!("Order expiry sweeper stopped");
                return;
            }
        }
    }
}
