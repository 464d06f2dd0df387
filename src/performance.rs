//! Performance measurements from a benchmark run.

use crate::accumulated_time::AccumulatedTime;
use bytesize::ByteSize;
use log::info;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// The kinds of benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkKind {
    /// Store new random objects.
    Upload,
    /// Fetch existing objects and verify their checksums.
    Fetch,
    /// Delete all objects and the container.
    Cleanup,
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Upload => "Uploaded",
            Self::Fetch => "Fetched",
            Self::Cleanup => "Deleted",
        };
        write!(f, "{}", verb)
    }
}

/// The kinds of clocks we have.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Clock {
    /// Time spent in calls to the object store.
    Transfer,

    /// Time spent computing checksums.
    Checksum,

    /// Time spent sleeping between attempts.
    Wait,
}

/// Counters shared by all workers of a run.
#[derive(Debug, Default)]
pub struct Tally {
    completed: AtomicU64,
    mismatches: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    bytes: AtomicU64,
}

impl Tally {
    /// Count an operation that finished, moving `bytes` of content.
    pub fn complete(&self, bytes: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count a checksum mismatch.
    pub fn mismatch(&self) {
        self.mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an operation that failed.
    pub fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an attempt that is being retried.
    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of completed operations so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Turn the counts into the result of a finished run.
    pub fn finish(
        self,
        kind: BenchmarkKind,
        container: &str,
        operation_count: u64,
        elapsed: Duration,
        time: &AccumulatedTime<Clock>,
    ) -> BenchmarkResult {
        BenchmarkResult {
            kind,
            container: container.to_string(),
            operation_count,
            elapsed,
            mismatch_count: self.mismatches.into_inner(),
            failure_count: self.failures.into_inner(),
            retry_count: self.retries.into_inner(),
            bytes: self.bytes.into_inner(),
            transfer_time: time.duration(Clock::Transfer),
            checksum_time: time.duration(Clock::Checksum),
            wait_time: time.duration(Clock::Wait),
        }
    }
}

/// Measurements of one finished benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    kind: BenchmarkKind,
    container: String,
    operation_count: u64,
    elapsed: Duration,
    mismatch_count: u64,
    failure_count: u64,
    retry_count: u64,
    bytes: u64,
    transfer_time: Duration,
    checksum_time: Duration,
    wait_time: Duration,
}

impl BenchmarkResult {
    /// Which benchmark was run.
    pub fn kind(&self) -> BenchmarkKind {
        self.kind
    }

    /// Container the benchmark used.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Number of operations the run was asked to do.
    pub fn operation_count(&self) -> u64 {
        self.operation_count
    }

    /// Wall clock time of the run.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Elapsed time in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Number of checksum mismatches.
    pub fn mismatch_count(&self) -> u64 {
        self.mismatch_count
    }

    /// Number of operations that failed.
    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Number of attempts that were retried.
    pub fn retry_count(&self) -> u64 {
        self.retry_count
    }

    /// Bytes of object content moved.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Operations per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed_seconds();
        if secs > 0.0 {
            self.operation_count as f64 / secs
        } else {
            0.0
        }
    }

    /// One line summary of the run.
    pub fn summary(&self) -> String {
        format!(
            "{} {} objects in {} seconds, {} objects per second",
            self.kind,
            self.operation_count,
            self.elapsed_seconds(),
            self.throughput()
        )
    }

    /// Log all measurements to the log file.
    pub fn log(&self) {
        info!("{}", self.summary());
        if self.kind == BenchmarkKind::Fetch || self.mismatch_count > 0 {
            info!("{} mismatched checksums.", self.mismatch_count);
        }
        if self.failure_count > 0 {
            info!("{} failed operations.", self.failure_count);
        }
        if self.retry_count > 0 {
            info!("{} retried attempts.", self.retry_count);
        }
        if self.bytes > 0 {
            let per_sec = if self.elapsed_seconds() > 0.0 {
                (self.bytes as f64 / self.elapsed_seconds()) as u64
            } else {
                0
            };
            info!(
                "Moved {} of content, {}/s",
                ByteSize::b(self.bytes),
                ByteSize::b(per_sec)
            );
        }
        info!(
            "Time in store calls (seconds): {}",
            self.transfer_time.as_secs_f64()
        );
        info!(
            "Time computing checksums (seconds): {}",
            self.checksum_time.as_secs_f64()
        );
        info!("Time waiting (seconds): {}", self.wait_time.as_secs_f64());
    }
}
