//! Operation profiler
//!
//! Wraps calls with timing and keeps exact per-operation aggregates plus a
//! bounded buffer of slow-call samples. The wrapped call runs outside the
//! profiler lock; only the bookkeeping after it is serialized.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use pokedex_cache::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Longest argument summary kept on a slow sample, in characters
pub const ARGS_SUMMARY_LIMIT: usize = 100;

/// Profiler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilerConfig {
    /// Calls taking longer than this are sampled
    pub slow_threshold: Duration,
    /// Maximum number of slow samples kept
    pub slow_sample_cap: usize,
    /// Samples kept after the buffer overflows
    pub slow_sample_retain: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_millis(100),
            slow_sample_cap: 50,
            slow_sample_retain: 30,
        }
    }
}

impl ProfilerConfig {
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Set the buffer cap and the number of samples kept when it overflows.
    /// `retain` is clamped to `cap`.
    pub fn with_slow_samples(mut self, cap: usize, retain: usize) -> Self {
        self.slow_sample_cap = cap;
        self.slow_sample_retain = retain.min(cap);
        self
    }
}

/// How a measured call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// Aggregated timings of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OperationRecord {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
    successes: u64,
    errors: u64,
}

impl OperationRecord {
    fn new() -> Self {
        Self {
            count: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            successes: 0,
            errors: 0,
        }
    }

    fn record(&mut self, duration: Duration, outcome: Outcome) {
        self.count += 1;
        self.total = self.total.saturating_add(duration);
        self.min = self.min.min(duration);
        self.max = self.max.max(duration);
        match outcome {
            Outcome::Success => self.successes += 1,
            Outcome::Error => self.errors += 1,
        }
    }

    fn snapshot(&self, name: &str) -> OperationStats {
        let avg = if self.count == 0 {
            Duration::ZERO
        } else {
            // Exact mean; count never exceeds u32::MAX in practice, fall back to
            // nanosecond division otherwise.
            match u32::try_from(self.count) {
                Ok(count) => self.total / count,
                Err(_) => Duration::from_nanos((self.total.as_nanos() / u128::from(self.count)) as u64),
            }
        };

        OperationStats {
            name: name.to_string(),
            count: self.count,
            total: self.total,
            min: if self.count == 0 { Duration::ZERO } else { self.min },
            max: self.max,
            avg,
            successes: self.successes,
            errors: self.errors,
        }
    }
}

/// Snapshot of one operation's aggregates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStats {
    pub name: String,
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
    /// Always `total / count`
    pub avg: Duration,
    pub successes: u64,
    pub errors: u64,
}

impl OperationStats {
    pub fn error_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.errors as f64 / self.count as f64
        }
    }
}

/// One call that exceeded the slow threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowOperationSample {
    pub operation: String,
    pub duration: Duration,
    pub timestamp: SystemTime,
    pub outcome: Outcome,
    /// Truncated `Debug` rendering of the call's arguments
    pub args: Option<String>,
}

/// Ring buffer of slow samples, oldest first
#[derive(Debug)]
struct SlowSampleBuffer {
    samples: VecDeque<SlowOperationSample>,
    cap: usize,
    retain: usize,
}

impl SlowSampleBuffer {
    fn new(cap: usize, retain: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap.saturating_add(1)),
            cap,
            retain: retain.min(cap),
        }
    }

    fn push(&mut self, sample: SlowOperationSample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.cap {
            let drop = self.samples.len() - self.retain;
            self.samples.drain(..drop);
        }
    }

    /// The most recent `limit` samples, oldest first
    fn recent(&self, limit: usize) -> Vec<SlowOperationSample> {
        let skip = self.samples.len().saturating_sub(limit);
        self.samples.iter().skip(skip).cloned().collect()
    }
}

#[derive(Debug)]
struct ProfilerState {
    records: HashMap<String, OperationRecord>,
    slow: SlowSampleBuffer,
}

/// Thread-safe operation profiler
///
/// # Example
///
/// ```
/// use pokedex_perf::OperationProfiler;
///
/// let profiler = OperationProfiler::default();
///
/// let parsed: Result<u32, std::num::ParseIntError> =
///     profiler.measure("parse_dex_number", || "25".parse::<u32>());
/// assert_eq!(parsed, Ok(25));
///
/// let failed = profiler.measure("parse_dex_number", || "pikachu".parse::<u32>());
/// assert!(failed.is_err());
///
/// let stats = profiler.operation("parse_dex_number").unwrap();
/// assert_eq!(stats.count, 2);
/// assert_eq!(stats.successes, 1);
/// assert_eq!(stats.errors, 1);
/// ```
#[derive(Debug)]
pub struct OperationProfiler {
    config: ProfilerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<ProfilerState>,
}

impl OperationProfiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a profiler stamping slow samples with `clock`
    pub fn with_clock(config: ProfilerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(ProfilerState {
                records: HashMap::new(),
                slow: SlowSampleBuffer::new(config.slow_sample_cap, config.slow_sample_retain),
            }),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Time a fallible call.
    ///
    /// The duration is recorded whether `f` succeeds or fails; its error is
    /// returned unchanged.
    pub fn measure<T, E, F>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.run(name, None, f)
    }

    /// Like [`measure`](Self::measure), keeping a summary of `args` on slow samples.
    pub fn measure_with_args<A, T, E, F>(&self, name: &str, args: &A, f: F) -> Result<T, E>
    where
        A: fmt::Debug + ?Sized,
        F: FnOnce() -> Result<T, E>,
    {
        self.run(name, Some(summarize_args(args)), f)
    }

    /// Time an infallible call.
    pub fn time<T, F>(&self, name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let mut guard = MeasureGuard::new(self, name, None);
        let value = f();
        guard.finish(Outcome::Success);
        value
    }

    /// Time a fallible future from first poll to completion.
    pub async fn measure_async<T, E, Fut>(&self, name: &str, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let mut guard = MeasureGuard::new(self, name, None);
        let result = fut.await;
        guard.finish(outcome_of(&result));
        result
    }

    fn run<T, E, F>(&self, name: &str, args: Option<String>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut guard = MeasureGuard::new(self, name, args);
        let result = f();
        guard.finish(outcome_of(&result));
        result
    }

    /// Record a call timed elsewhere
    pub fn record(&self, name: &str, duration: Duration, outcome: Outcome) {
        self.record_inner(name, duration, outcome, None);
    }

    fn record_inner(&self, name: &str, duration: Duration, outcome: Outcome, args: Option<String>) {
        let slow = duration > self.config.slow_threshold;
        let timestamp = if slow { Some(self.clock.now()) } else { None };

        let mut state = self.state.lock();
        state
            .records
            .entry(name.to_string())
            .or_insert_with(OperationRecord::new)
            .record(duration, outcome);

        if let Some(timestamp) = timestamp {
            state.slow.push(SlowOperationSample {
                operation: name.to_string(),
                duration,
                timestamp,
                outcome,
                args,
            });
            drop(state);
            debug!(operation = name, ?duration, ?outcome, "slow operation");
        }
    }

    /// Aggregates of one operation
    pub fn operation(&self, name: &str) -> Option<OperationStats> {
        let state = self.state.lock();
        state.records.get(name).map(|record| record.snapshot(name))
    }

    /// Aggregates of every operation, in no particular order
    pub fn operations(&self) -> Vec<OperationStats> {
        let state = self.state.lock();
        state
            .records
            .iter()
            .map(|(name, record)| record.snapshot(name))
            .collect()
    }

    /// The `limit` most frequently invoked operations, highest count first
    pub fn top_operations(&self, limit: usize) -> Vec<OperationStats> {
        let mut operations = self.operations();
        operations.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        operations.truncate(limit);
        operations
    }

    /// The `limit` most recent slow samples, oldest first
    pub fn slow_operations(&self, limit: usize) -> Vec<SlowOperationSample> {
        self.state.lock().slow.recent(limit)
    }

    /// Slow samples stamped within `window` of now
    pub fn recent_slow_operations(&self, window: Duration) -> Vec<SlowOperationSample> {
        let now = self.clock.now();
        let state = self.state.lock();
        state
            .slow
            .samples
            .iter()
            .filter(|sample| within_window(sample.timestamp, now, window))
            .cloned()
            .collect()
    }

    /// Number of slow samples currently buffered
    pub fn slow_sample_count(&self) -> usize {
        self.state.lock().slow.samples.len()
    }

    /// Drop all records and samples
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.slow.samples.clear();
    }
}

impl Default for OperationProfiler {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

/// Whether `timestamp` lies no further than `window` before `now`.
/// Timestamps after `now` count as recent.
pub(crate) fn within_window(timestamp: SystemTime, now: SystemTime, window: Duration) -> bool {
    match now.duration_since(timestamp) {
        Ok(age) => age <= window,
        Err(_) => true,
    }
}

fn outcome_of<T, E>(result: &Result<T, E>) -> Outcome {
    if result.is_ok() {
        Outcome::Success
    } else {
        Outcome::Error
    }
}

fn summarize_args<A: fmt::Debug + ?Sized>(args: &A) -> String {
    let rendered = format!("{:?}", args);
    match rendered.char_indices().nth(ARGS_SUMMARY_LIMIT) {
        Some((cut, _)) => format!("{}...", &rendered[..cut]),
        None => rendered,
    }
}

/// Records the elapsed time when dropped, so a panicking call is still
/// counted (as an error) while the panic unwinds.
struct MeasureGuard<'a> {
    profiler: &'a OperationProfiler,
    name: &'a str,
    args: Option<String>,
    started: Instant,
    outcome: Option<Outcome>,
}

impl<'a> MeasureGuard<'a> {
    fn new(profiler: &'a OperationProfiler, name: &'a str, args: Option<String>) -> Self {
        Self {
            profiler,
            name,
            args,
            started: Instant::now(),
            outcome: None,
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for MeasureGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let outcome = self.outcome.unwrap_or(Outcome::Error);
        self.profiler
            .record_inner(self.name, elapsed, outcome, self.args.take());
    }
}
