//! Request throttling and upload concurrency control.
//!
//! [`RateLimiter`] is a fixed-window counter keyed by an arbitrary string (the checkout flow
//! uses `"{ip}_order"`). [`UploadLimiter`] bounds how many multipart uploads are streamed to
//! disk at the same time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{FileLimitsConfig, LimitsConfig};
use crate::errors::{Error, Result};

/// Container for all resource limiters.
#[derive(Debug, Clone)]
pub struct Limiters {
    /// Per-IP order creation throttle
    pub checkout: Arc<RateLimiter>,
    /// Limiter for concurrent file uploads. None means unlimited.
    pub file_uploads: Option<Arc<UploadLimiter>>,
}

impl Limiters {
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            checkout: Arc::new(RateLimiter::default()),
            file_uploads: UploadLimiter::new(&config.files).map(Arc::new),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window attempt counter.
///
/// The first call for a key opens a window with a count of one. Further calls inside the
/// window are allowed until the count reaches `limit`. The first call after the window has
/// elapsed clears the record and is allowed without opening a new window, so the next call
/// starts counting again from one.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    /// Returns `true` if the attempt is allowed.
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> bool {
        self.check_at(key, limit, window, Instant::now())
    }

    fn check_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> bool {
        if let Some(entry) = self.windows.get(key)
            && now.saturating_duration_since(entry.started) > window
        {
            drop(entry);
            self.windows.remove(key);
            return true;
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window { count: 0, started: now });
        if entry.count >= limit {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drop windows older than `window`. Returns the number of records removed.
    pub fn purge_expired(&self, window: Duration) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) <= window);
        before - self.windows.len()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Controls concurrent file upload capacity.
///
/// Bounded queue with configurable concurrency, waiting capacity and timeout. When limits are
/// exceeded, requests receive HTTP 429.
#[derive(Debug)]
pub struct UploadLimiter {
    semaphore: Arc<Semaphore>,
    waiting_count: AtomicUsize,
    /// None = unlimited
    max_waiting: Option<usize>,
    max_wait: Duration,
}

impl UploadLimiter {
    /// Returns `None` when `max_concurrent_uploads` is 0 (unlimited).
    pub fn new(config: &FileLimitsConfig) -> Option<Self> {
        if config.max_concurrent_uploads == 0 {
            return None;
        }

        Some(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_uploads)),
            waiting_count: AtomicUsize::new(0),
            max_waiting: (config.max_waiting_uploads != 0).then_some(config.max_waiting_uploads),
            max_wait: Duration::from_secs(config.max_upload_wait_secs),
        })
    }

    fn busy() -> Error {
        Error::TooManyRequests {
            message: "Too many file uploads in progress. Please retry later.".to_string(),
        }
    }

    pub async fn acquire(&self) -> Result<UploadPermit> {
        if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
            return Ok(UploadPermit { _permit: permit });
        }

        let current_waiting = self.waiting_count.fetch_add(1, Ordering::SeqCst);
        if let Some(max_waiting) = self.max_waiting
            && current_waiting >= max_waiting
        {
            self.waiting_count.fetch_sub(1, Ordering::SeqCst);
            return Err(Self::busy());
        }

        let result = if self.max_wait.is_zero() {
            self.semaphore.clone().try_acquire_owned().map_err(|_| Self::busy())
        } else {
            match tokio::time::timeout(self.max_wait, self.semaphore.clone().acquire_owned()).await {
                Ok(Ok(permit)) => Ok(permit),
                Ok(Err(_)) => Err(Error::TooManyRequests {
                    message: "Upload service temporarily unavailable.".to_string(),
                }),
                Err(_) => Err(Error::TooManyRequests {
                    message: "Timed out waiting for upload slot. Please retry later.".to_string(),
                }),
            }
        };

        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        result.map(|permit| UploadPermit { _permit: permit })
    }
}

/// Releases the upload slot when dropped.
#[must_use]
pub struct UploadPermit {
    _permit: OwnedSemaphorePermit,
}
