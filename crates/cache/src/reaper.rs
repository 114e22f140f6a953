//! Background expiry sweeps
//!
//! The reaper owns one named thread that calls
//! [`CacheStore::purge_expired`] every `interval`. Stopping wakes the thread
//! immediately instead of waiting out the interval, so teardown is fast even
//! with the default two-minute period.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::store::CacheStore;

/// Periodic remover of expired entries
///
/// # Example
///
/// ```
/// use pokedex_cache::{CacheConfig, CacheStore, ExpiryReaper};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = Arc::new(CacheStore::new(CacheConfig::default()));
/// let mut reaper = ExpiryReaper::start(store, Duration::from_secs(120)).unwrap();
/// assert!(reaper.is_running());
///
/// reaper.stop();
/// reaper.stop(); // no-op
/// assert!(!reaper.is_running());
/// ```
#[derive(Debug)]
pub struct ExpiryReaper {
    interval: Duration,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ExpiryReaper {
    /// Spawn the reaper thread.
    ///
    /// # Errors
    /// Returns [`CacheError::ZeroInterval`] for a zero `interval` and
    /// [`CacheError::ReaperSpawn`] if the OS refuses to create the thread.
    pub fn start(store: Arc<CacheStore>, interval: Duration) -> Result<Self, CacheError> {
        if interval.is_zero() {
            return Err(CacheError::ZeroInterval);
        }

        let (shutdown, signal) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("cache-expiry-reaper".to_string())
            .spawn(move || {
                loop {
                    match signal.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            sweep(&store);
                        }
                        // Explicit stop or the handle was dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        info!(?interval, "expiry reaper started");

        Ok(Self {
            interval,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the reaper thread is still active
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the reaper and wait for its thread to exit.
    ///
    /// Calling this more than once is a no-op.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // A send error only means the thread already exited
            let _ = shutdown.send(());
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("expiry reaper thread panicked");
            } else {
                info!("expiry reaper stopped");
            }
        }
    }
}

/// One expiry pass over `store`
fn sweep(store: &CacheStore) -> usize {
    let removed = store.purge_expired();
    debug!(removed, remaining = store.len(), "expiry sweep finished");
    removed
}

impl Drop for ExpiryReaper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use crate::store::SetOptions;
    use parking_lot::Mutex;
    use std::io;
    use std::time::Instant;

    // In-memory log sink for the fmt subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reaper_removes_expired_entries() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(CacheStore::with_clock(CacheConfig::default(), clock.clone()));
        let short = SetOptions::default().with_ttl(Duration::from_secs(1));
        store.set_with("A", "1", "v", short);
        store.set_with("A", "2", "v", short);
        store.set("A", "3", "v");

        clock.advance(Duration::from_secs(2));

        let mut reaper = ExpiryReaper::start(store.clone(), Duration::from_millis(10)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while store.len() > 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        reaper.stop();

        assert_eq!(store.len(), 1);
        assert!(store.has("A", "3"));
        assert_eq!(store.stats().expirations, 2);
    }

    #[test]
    fn test_stop_is_idempotent_and_prompt() {
        let store = Arc::new(CacheStore::default());
        let mut reaper = ExpiryReaper::start(store, Duration::from_secs(3600)).unwrap();
        assert!(reaper.is_running());
        assert_eq!(reaper.interval(), Duration::from_secs(3600));

        let started = Instant::now();
        reaper.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!reaper.is_running());

        reaper.stop();
        assert!(!reaper.is_running());
    }

    #[test]
    fn test_drop_stops_thread() {
        let store = Arc::new(CacheStore::default());
        let reaper = ExpiryReaper::start(store.clone(), Duration::from_secs(3600)).unwrap();
        drop(reaper);

        // The thread held the only other reference to the store
        assert_eq!(Arc::strong_count(&store), 1);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let store = Arc::new(CacheStore::default());
        let result = ExpiryReaper::start(store.clone(), Duration::ZERO);

        assert!(matches!(result, Err(CacheError::ZeroInterval)));
        assert_eq!(Arc::strong_count(&store), 1);
    }

    #[test]
    fn test_every_sweep_is_logged() {
        let clock = Arc::new(ManualClock::new());
        let store = CacheStore::with_clock(CacheConfig::default(), clock.clone());
        store.set_with("A", "stale", "v", SetOptions::default().with_ttl(Duration::from_secs(1)));
        store.set("A", "fresh", "v");
        clock.advance(Duration::from_secs(2));

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let removed = tracing::subscriber::with_default(subscriber, || (sweep(&store), sweep(&store)));
        assert_eq!(removed, (1, 0));

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert_eq!(output.matches("expiry sweep finished").count(), 2);
        assert!(output.contains("removed=1"));
        assert!(output.contains("removed=0"));
    }
}
