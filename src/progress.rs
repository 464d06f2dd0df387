//! Report what a benchmark run is doing.
//!
//! The benchmark driver doesn't log directly. It is given a
//! [`Reporter`] and tells it about everything that happens, so the
//! caller decides where the reports go.

use crate::checksummer::Checksum;
use crate::objectstore::StorageError;
use crate::performance::{BenchmarkKind, BenchmarkResult};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::time::Duration;

/// Something that happened during a benchmark run.
#[derive(Debug)]
pub enum Event<'a> {
    /// A benchmark is starting.
    Started {
        /// Which benchmark.
        kind: BenchmarkKind,
        /// Container it uses.
        container: &'a str,
        /// How many operations it will do.
        total: u64,
    },

    /// An object was uploaded.
    Stored {
        /// Name of the object.
        name: &'a str,
        /// Size of the object.
        bytes: u64,
    },

    /// An object was fetched and its checksum verified.
    Fetched {
        /// Name of the object.
        name: &'a str,
        /// Size of the object.
        bytes: u64,
        /// Did the checksum match?
        matched: bool,
    },

    /// A checksum computed locally differs from the store's.
    Mismatch {
        /// Name of the object.
        name: &'a str,
        /// Checksum computed locally.
        local: &'a Checksum,
        /// Checksum reported by the store.
        remote: &'a Checksum,
    },

    /// An operation on an object failed and will not be retried.
    Failed {
        /// Name of the object.
        name: &'a str,
        /// What went wrong.
        error: &'a StorageError,
    },

    /// An operation on an object failed and will be tried again.
    Retrying {
        /// Name of the object.
        name: &'a str,
        /// Number of the retry, starting from one.
        attempt: u32,
        /// How long until the retry.
        delay: Duration,
        /// What went wrong.
        error: &'a StorageError,
    },

    /// An object was deleted.
    Deleted {
        /// Name of the object.
        name: &'a str,
        /// Size of the object.
        bytes: u64,
    },

    /// Deleted objects are still listed; waiting before looking again.
    Waiting {
        /// Number of objects still listed.
        remaining: usize,
        /// How long until the next look.
        delay: Duration,
    },

    /// Creating or deleting a test container failed.
    ConnectionFailed {
        /// Name of the test container.
        container: &'a str,
        /// What went wrong.
        error: &'a StorageError,
    },

    /// A benchmark finished.
    Finished(&'a BenchmarkResult),
}

/// Receiver of benchmark events.
pub trait Reporter: Sync {
    /// Handle an event.
    fn report(&self, event: &Event<'_>);
}

/// Report events to the log.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: &Event<'_>) {
        match event {
            Event::Started {
                kind,
                container,
                total,
            } => debug!("starting {:?} of {} objects in {}", kind, total, container),
            Event::Stored { name, bytes } => debug!("Uploaded: {} ({} bytes)", name, bytes),
            Event::Fetched { name, matched, .. } => {
                let result = if *matched { "Matched" } else { "Mismatch!" };
                info!("Fetched: {} Chksum: {}", name, result);
            }
            Event::Mismatch {
                name,
                local,
                remote,
            } => error!(
                "Checksum Mismatch! object {}: local {}, store {}",
                name, local, remote
            ),
            Event::Failed { name, error } => error!("{} failed: {}", name, error),
            Event::Retrying {
                name,
                attempt,
                delay,
                error,
            } => warn!(
                "{} failed, retry {} in {:?}: {}",
                name, attempt, delay, error
            ),
            Event::Deleted { name, bytes } => debug!("Deleted: {} ({} bytes)", name, bytes),
            Event::Waiting { remaining, delay } => debug!(
                "{} objects still listed, looking again in {:?}",
                remaining, delay
            ),
            Event::ConnectionFailed { container, error } => {
                error!("Connection test with container {} failed: {}", container, error)
            }
            Event::Finished(result) => result.log(),
        }
    }
}

/// Show a progress bar in the terminal, and report events to the log.
pub struct ProgressReporter {
    progress: ProgressBar,
    log: LogReporter,
}

impl ProgressReporter {
    /// Create a new reporter. A hidden one only logs.
    pub fn new(visible: bool) -> Self {
        let progress = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        let parts = vec![
            "{wide_bar}",
            "elapsed: {elapsed}",
            "objects: {pos}/{len}",
            "{wide_msg}",
            "{spinner}",
        ];
        progress.set_style(ProgressStyle::default_bar().template(&parts.join("\n")));
        progress.enable_steady_tick(100);

        Self {
            progress,
            log: LogReporter,
        }
    }
}

impl Reporter for ProgressReporter {
    fn report(&self, event: &Event<'_>) {
        match event {
            Event::Started {
                kind,
                container,
                total,
            } => {
                self.progress.set_length(*total);
                self.progress.set_position(0);
                self.progress
                    .set_message(format!("{:?} in {}", kind, container));
            }
            Event::Stored { .. }
            | Event::Fetched { .. }
            | Event::Failed { .. }
            | Event::Deleted { .. } => self.progress.inc(1),
            Event::Waiting { remaining, .. } => self
                .progress
                .set_message(format!("waiting for {} deleted objects", remaining)),
            Event::Finished(_) => self.progress.finish_and_clear(),
            _ => (),
        }
        self.log.report(event);
    }
}
