//! Background sweeper for expired tokens.
//!
//! A [`Janitor`] owns one tokio task that calls
//! [`TokenStore::delete_expired`] on a fixed interval. The loop is serial:
//! a sweep finishes (or is abandoned on stop) before the next tick is
//! awaited, so sweeps never overlap.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokenauth_store::{Janitor, JanitorConfig, MemoryTokenStore, TokenStore};
//!
//! # async fn example() {
//! let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
//! let janitor = Janitor::start(Arc::clone(&store), JanitorConfig::default());
//! // ...
//! janitor.stop().await;
//! # }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{config::JanitorConfig, store::TokenStore};

#[derive(Debug, Default)]
struct JanitorCounters {
    sweeps: AtomicU64,
    failures: AtomicU64,
    removed: AtomicU64,
}

/// Handle to a running expiry sweeper.
///
/// [`stop`](Self::stop) consumes the handle, so a janitor can be stopped
/// exactly once. Dropping a running janitor cancels its task without
/// waiting for it.
#[derive(Debug)]
pub struct Janitor {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    counters: Arc<JanitorCounters>,
}

impl Janitor {
    /// Spawns the sweep task.
    ///
    /// The first sweep runs one full interval after start.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    #[must_use]
    pub fn start(store: Arc<dyn TokenStore>, config: JanitorConfig) -> Self {
        let cancel = CancellationToken::new();
        let counters = Arc::new(JanitorCounters::default());
        let interval = config.interval();

        let token = cancel.clone();
        let task_counters = Arc::clone(&counters);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; consume it so we start
            // with a full interval wait.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {},
                }
                tokio::select! {
                    () = token.cancelled() => {
                        tracing::debug!("sweep abandoned on stop");
                        break;
                    },
                    result = store.delete_expired() => match result {
                        Ok(stats) => {
                            let removed = u64::try_from(stats.removed).unwrap_or(u64::MAX);
                            task_counters.removed.fetch_add(removed, Ordering::Relaxed);
                            if stats.removed > 0 || stats.skipped > 0 {
                                tracing::debug!(
                                    scanned = stats.scanned,
                                    removed = stats.removed,
                                    skipped = stats.skipped,
                                    "janitor sweep finished"
                                );
                            }
                        },
                        Err(e) => {
                            task_counters.failures.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(error = %e, "janitor sweep failed");
                        },
                    },
                }
                task_counters.sweeps.fetch_add(1, Ordering::Relaxed);
            }
            tracing::info!("janitor shutting down");
        });

        tracing::info!(interval = ?interval, "janitor started");
        Self { cancel, handle: Some(handle), counters }
    }

    /// Signals the task to stop and waits for it to exit.
    ///
    /// Returns promptly whether the task is idle awaiting its next tick or
    /// in the middle of a sweep.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "janitor task ended abnormally");
            }
        }
    }

    /// Number of sweeps attempted so far, failed ones included.
    #[must_use]
    pub fn sweep_count(&self) -> u64 {
        self.counters.sweeps.load(Ordering::Relaxed)
    }

    /// Number of sweeps that returned an error.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.counters.failures.load(Ordering::Relaxed)
    }

    /// Total tokens removed across all sweeps.
    #[must_use]
    pub fn removed_count(&self) -> u64 {
        self.counters.removed.load(Ordering::Relaxed)
    }

    /// Returns `true` until the task has been cancelled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        Audience, MemoryTokenStore, StoreConfig, StoreError, StoreResult, SweepStats, Token,
        testutil::{audience_with_period, unix_now},
    };

    /// Delegates to a memory store, with a configurable sweep.
    struct ScriptedStore {
        inner: MemoryTokenStore,
        fail: bool,
        sweep_delay: Duration,
    }

    impl ScriptedStore {
        fn new(fail: bool, sweep_delay: Duration) -> Self {
            Self { inner: MemoryTokenStore::new(), fail, sweep_delay }
        }
    }

    #[async_trait]
    impl TokenStore for ScriptedStore {
        async fn open(&self, config: &StoreConfig) -> StoreResult<()> {
            self.inner.open(config).await
        }

        async fn close(&self) -> StoreResult<()> {
            self.inner.close().await
        }

        async fn save_audience(&self, audience: &Audience) -> StoreResult<()> {
            self.inner.save_audience(audience).await
        }

        async fn delete_audience(&self, id: &str) -> StoreResult<()> {
            self.inner.delete_audience(id).await
        }

        async fn get_audience(&self, id: &str) -> StoreResult<Option<Audience>> {
            self.inner.get_audience(id).await
        }

        async fn save_token(&self, token: &Token) -> StoreResult<()> {
            self.inner.save_token(token).await
        }

        async fn delete_token(&self, value: &str) -> StoreResult<()> {
            self.inner.delete_token(value).await
        }

        async fn get_token(&self, value: &str) -> StoreResult<Option<Token>> {
            self.inner.get_token(value).await
        }

        async fn list_audience_tokens(&self, id: &str) -> StoreResult<Vec<Token>> {
            self.inner.list_audience_tokens(id).await
        }

        async fn delete_expired(&self) -> StoreResult<SweepStats> {
            tokio::time::sleep(self.sweep_delay).await;
            if self.fail {
                return Err(StoreError::storage("simulated outage"));
            }
            self.inner.delete_expired().await
        }
    }

    fn fast() -> JanitorConfig {
        JanitorConfig::builder().interval(Duration::from_millis(50)).build().unwrap()
    }

    #[tokio::test]
    async fn test_janitor_sweeps_periodically() {
        let store = Arc::new(MemoryTokenStore::new());
        let janitor = Janitor::start(Arc::clone(&store) as Arc<dyn TokenStore>, fast());

        tokio::time::sleep(Duration::from_millis(180)).await;

        assert!(janitor.sweep_count() >= 2, "expected repeated sweeps");
        assert_eq!(janitor.failure_count(), 0);
        janitor.stop().await;
    }

    #[tokio::test]
    async fn test_janitor_removes_expired_tokens() {
        let store = Arc::new(MemoryTokenStore::new());
        let audience = audience_with_period("jan", 2);
        store.save_audience(&audience).await.unwrap();
        let token = Token::for_audience(&audience, "short-lived", unix_now());
        store.save_token(&token).await.unwrap();

        let janitor = Janitor::start(Arc::clone(&store) as Arc<dyn TokenStore>, fast());
        tokio::time::sleep(Duration::from_millis(2_300)).await;

        assert!(store.get_token("short-lived").await.unwrap().is_none());
        assert_eq!(janitor.removed_count(), 1);
        janitor.stop().await;
    }

    #[tokio::test]
    async fn test_janitor_stops_on_stop() {
        let store = Arc::new(MemoryTokenStore::new());
        let janitor = Janitor::start(store, fast());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(janitor.is_running());

        let counters = Arc::clone(&janitor.counters);
        janitor.stop().await;
        let before = counters.sweeps.load(Ordering::Relaxed);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(counters.sweeps.load(Ordering::Relaxed), before, "no sweeps after stop");
    }

    #[tokio::test]
    async fn test_stop_while_idle_returns_promptly() {
        let store = Arc::new(MemoryTokenStore::new());
        let config = JanitorConfig::builder().interval(Duration::from_secs(3600)).build().unwrap();
        let janitor = Janitor::start(store, config);

        tokio::time::timeout(Duration::from_secs(1), janitor.stop())
            .await
            .expect("stop should not wait for the next tick");
    }

    #[tokio::test]
    async fn test_stop_abandons_sweep_in_flight() {
        let store = Arc::new(ScriptedStore::new(false, Duration::from_secs(30)));
        let janitor = Janitor::start(store, fast());
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(Duration::from_secs(1), janitor.stop())
            .await
            .expect("stop should abandon the running sweep");
    }

    #[tokio::test]
    async fn test_failed_sweeps_do_not_stop_the_loop() {
        let store = Arc::new(ScriptedStore::new(true, Duration::ZERO));
        let janitor = Janitor::start(store, fast());

        tokio::time::sleep(Duration::from_millis(180)).await;

        assert!(janitor.failure_count() >= 2, "janitor should keep sweeping after failures");
        janitor.stop().await;
    }

    #[tokio::test]
    async fn test_drop_cancels_task() {
        let store = Arc::new(MemoryTokenStore::new());
        let janitor = Janitor::start(store, fast());
        let cancel = janitor.cancel.clone();
        drop(janitor);
        assert!(cancel.is_cancelled());
    }
}
