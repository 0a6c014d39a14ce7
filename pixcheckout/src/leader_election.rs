use sqlx::PgPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Background task for leader election.
///
/// Only the leader runs the order expiry sweeper and the report scheduler, so that several
/// replicas behind a load balancer do not send the same scheduled report twice.
///
/// PostgreSQL advisory locks are session-based, so we hold a dedicated connection for as long
/// as we want to keep the lock.
#[instrument(skip(pool, is_leader, shutdown, on_gain_leadership, on_lose_leadership))]
pub async fn leader_election_task<F1, F2, Fut1, Fut2>(
    pool: PgPool,
    is_leader: Arc<AtomicBool>,
    lock_id: i64,
    check_interval: Duration,
    shutdown: CancellationToken,
    on_gain_leadership: F1,
    on_lose_leadership: F2,
) where
    F1: Fn() -> Fut1 + Send + 'static,
    F2: Fn() -> Fut2 + Send + 'static,
    Fut1: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    Fut2: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut interval = tokio::time::interval(check_interval);
    let mut leader_conn: Option<sqlx::pool::PoolConnection<sqlx::Postgres>> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.cancelled() => {
                if is_leader.swap(false, Ordering::Relaxed) {
                    info!("Shutting down, releasing leadership");
                    if let Err(e) = on_lose_leadership().await {
                        tracing::error!("Failed to execute on_lose_leadership callback: {}", e);
                    }
                }
                return;
            }
        }

        if !is_leader.load(Ordering::Relaxed) {
            let mut conn = match pool.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!("Failed to acquire connection for leader election: {}", e);
                    continue;
                }
            };

            match sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
                .bind(lock_id)
                .fetch_one(&mut *conn)
                .await
            {
                Ok(true) => {
                    info!("Gained leadership");
                    is_leader.store(true, Ordering::Relaxed);
                    leader_conn = Some(conn);

                    if let Err(e) = on_gain_leadership().await {
                        tracing::error!("Failed to execute on_gain_leadership callback: {}", e);
                    }
                }
                Ok(false) => debug!("Following - will retry"),
                Err(e) => tracing::error!("Failed to check leader lock: {}", e),
            }
        } else if let Some(conn) = leader_conn.as_mut() {
            // The lock lives as long as this connection does
            if let Err(e) = sqlx::query("SELECT 1").execute(&mut **conn).await {
                tracing::warn!("Lost leadership (connection died): {}", e);
                is_leader.store(false, Ordering::Relaxed);
                leader_conn = None;

                if let Err(e) = on_lose_leadership().await {
                    tracing::error!("Failed to execute on_lose_leadership callback: {}", e);
                }
            } else {
                debug!("Leadership renewed");
            }
        } else {
            tracing::error!("Inconsistent state: is_leader=true but no connection");
            is_leader.store(false, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[sqlx::test]
    #[test_log::test]
    async fn test_single_replica_gains_leadership_and_releases_on_shutdown(pool: PgPool) {
        let is_leader = Arc::new(AtomicBool::new(false));
        let gained = Arc::new(AtomicUsize::new(0));
        let lost = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let task = {
            let (gained, lost) = (gained.clone(), lost.clone());
            tokio::spawn(leader_election_task(
                pool.clone(),
                is_leader.clone(),
                42,
                Duration::from_millis(20),
                shutdown.clone(),
                move || {
                    let gained = gained.clone();
                    async move {
                        gained.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
                move || {
                    let lost = lost.clone();
                    async move {
                        lost.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            ))
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(is_leader.load(Ordering::Relaxed));
        assert_eq!(gained.load(Ordering::SeqCst), 1);

        // A second contender cannot take the lock while it is held
        let mut other = pool.acquire().await.unwrap();
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock(42)")
            .fetch_one(&mut *other)
            .await
            .unwrap();
        assert!(!acquired);

        shutdown.cancel();
        task.await.unwrap();
        assert!(!is_leader.load(Ordering::Relaxed));
        assert_eq!(lost.load(Ordering::SeqCst), 1);
    }
}
