//! Run benchmarks against an object store.
//!
//! Each benchmark is a counted loop of store operations. The loop runs
//! on the calling thread, or spread over a pool of worker threads when
//! more than one worker is asked for. Either way the counts in the
//! result are the same.

use crate::accumulated_time::AccumulatedTime;
use crate::backoff::Backoff;
use crate::checksummer::{verify, Checksum, Checksummer};
use crate::error::BenchError;
use crate::objectstore::{ErrorKind, ObjectMeta, ObjectStore, StorageError};
use crate::payload::PayloadGenerator;
use crate::performance::{BenchmarkKind, BenchmarkResult, Clock, Tally};
use crate::progress::{Event, Reporter};
use crate::workqueue::WorkQueue;

use bytesize::ByteSize;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

/// How benchmarks are run.
#[derive(Debug, Clone)]
pub struct BenchSettings {
    /// Number of worker threads. One means everything runs on the
    /// calling thread.
    pub workers: usize,

    /// Seed for generating payloads and names. A random one is picked
    /// if not set.
    pub seed: Option<u64>,

    /// Stop at the first failed operation instead of counting it.
    pub abort_on_error: bool,

    /// Allow non-ASCII characters in object names.
    pub unicode_names: bool,

    /// How many times to retry a fetch that failed transiently.
    pub fetch_retries: u32,

    /// Delays between fetch retries.
    pub retry: Backoff,

    /// Delays between looking at a container being emptied.
    pub poll: Backoff,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            seed: None,
            abort_on_error: false,
            unicode_names: false,
            fetch_retries: 5,
            retry: Backoff::default(),
            poll: Backoff::default(),
        }
    }
}

/// Benchmarks against one object store.
pub struct Benchmark<'a> {
    store: &'a dyn ObjectStore,
    reporter: &'a dyn Reporter,
    settings: BenchSettings,
    seed: u64,
}

impl<'a> Benchmark<'a> {
    /// Prepare to run benchmarks.
    pub fn new(
        store: &'a dyn ObjectStore,
        reporter: &'a dyn Reporter,
        settings: BenchSettings,
    ) -> Self {
        let seed = settings.seed.unwrap_or_else(rand::random);
        info!("random seed: {}", seed);
        debug!("benchmark settings: {:#?}", settings);
        Self {
            store,
            reporter,
            settings,
            seed,
        }
    }

    /// The seed used for generating data. Passing it in the settings
    /// of a later run repeats the same payloads and names.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Check that the store works by creating and deleting a container.
    ///
    /// Failures are reported, but don't stop the benchmark from being
    /// attempted. Returns true if both steps succeeded.
    pub fn connection_test(&self) -> bool {
        let mut gen = PayloadGenerator::seeded(!self.seed);
        let container = gen.name(true);
        info!("testing connection with container {}", container);

        let mut ok = true;
        if let Err(error) = self.store.create_container(&container) {
            self.reporter.report(&Event::ConnectionFailed {
                container: &container,
                error: &error,
            });
            ok = false;
        }
        if let Err(error) = self.store.delete_container(&container) {
            self.reporter.report(&Event::ConnectionFailed {
                container: &container,
                error: &error,
            });
            ok = false;
        }
        ok
    }

    /// Upload `count` new random objects of `object_length` bytes each.
    pub fn upload(
        &self,
        container: &str,
        object_length: usize,
        count: u64,
    ) -> Result<BenchmarkResult, BenchError> {
        info!(
            "Uploading {} objects sized {} to {}",
            count,
            ByteSize::b(object_length as u64),
            container
        );

        let tally = Tally::default();
        let time = AccumulatedTime::new();
        let started = Instant::now();

        time.measure(Clock::Transfer, || self.store.create_container(container))?;
        self.reporter.report(&Event::Started {
            kind: BenchmarkKind::Upload,
            container,
            total: count,
        });

        self.drive(count, |gen| {
            let name = gen.name(!self.settings.unicode_names);
            let data = gen.payload(object_length);
            let bytes = data.len() as u64;
            let local = time.measure(Clock::Checksum, || Checksum::md5(&data));

            let stored = time.measure(Clock::Transfer, || {
                self.store.store_object(container, &name, data, &local)
            });
            match stored {
                Ok(meta) => {
                    tally.complete(bytes);
                    let remote = meta.checksum();
                    if !verify(&local, &remote) {
                        tally.mismatch();
                        self.reporter.report(&Event::Mismatch {
                            name: &name,
                            local: &local,
                            remote: &remote,
                        });
                    }
                    self.reporter.report(&Event::Stored { name: &name, bytes });
                    Ok(())
                }
                Err(error) if error.kind() == ErrorKind::ChecksumMismatch => {
                    // The store refused the content it got.
                    tally.mismatch();
                    self.reporter.report(&Event::Failed {
                        name: &name,
                        error: &error,
                    });
                    Ok(())
                }
                Err(error) => self.failed(&tally, &name, error),
            }
        })?;

        Ok(self.finish(tally, BenchmarkKind::Upload, container, count, started, &time))
    }

    /// Fetch `count` randomly picked objects, `chunk_size` bytes at a
    /// time, and verify their checksums.
    pub fn fetch(
        &self,
        container: &str,
        count: u64,
        chunk_size: usize,
    ) -> Result<BenchmarkResult, BenchError> {
        info!(
            "Fetching {} objects from {} in chunks of {}",
            count,
            container,
            ByteSize::b(chunk_size as u64)
        );

        let tally = Tally::default();
        let time = AccumulatedTime::new();
        let started = Instant::now();

        let objects = time.measure(Clock::Transfer, || self.store.list_objects(container))?;
        if objects.is_empty() {
            return Err(BenchError::EmptyContainer(container.to_string()));
        }
        debug!("{} objects to pick from", objects.len());
        self.reporter.report(&Event::Started {
            kind: BenchmarkKind::Fetch,
            container,
            total: count,
        });

        self.drive(count, |gen| {
            let index = gen
                .index(objects.len())
                .ok_or_else(|| BenchError::EmptyContainer(container.to_string()))?;
            self.fetch_one(container, &objects[index], chunk_size, &tally, &time)
        })?;

        Ok(self.finish(tally, BenchmarkKind::Fetch, container, count, started, &time))
    }

    /// Delete every object in a container, wait for the store to agree
    /// the container is empty, then delete the container.
    pub fn cleanup(&self, container: &str) -> Result<BenchmarkResult, BenchError> {
        info!("Deleting all objects and container {}", container);

        let tally = Tally::default();
        let time = AccumulatedTime::new();
        let started = Instant::now();

        time.measure(Clock::Transfer, || self.store.get_container(container))?;
        let objects = time.measure(Clock::Transfer, || self.store.list_objects(container))?;
        let total = objects.len() as u64;
        self.reporter.report(&Event::Started {
            kind: BenchmarkKind::Cleanup,
            container,
            total,
        });

        if self.settings.workers > 1 {
            self.delete_each(container, &objects, &tally, &time)?;
        } else {
            time.measure(Clock::Transfer, || self.store.delete_all_objects(container))?;
            for object in objects.iter() {
                tally.complete(object.bytes);
                self.reporter.report(&Event::Deleted {
                    name: &object.name,
                    bytes: object.bytes,
                });
            }
        }

        self.wait_until_empty(container, &time)?;
        time.measure(Clock::Transfer, || self.store.delete_container(container))?;
        info!("deleted container {}", container);

        Ok(self.finish(tally, BenchmarkKind::Cleanup, container, total, started, &time))
    }

    fn fetch_one(
        &self,
        container: &str,
        object: &ObjectMeta,
        chunk_size: usize,
        tally: &Tally,
        time: &AccumulatedTime<Clock>,
    ) -> Result<(), BenchError> {
        let mut delays = self.settings.retry.delays();
        let mut attempt = 0;
        loop {
            match self.fetch_content(container, &object.name, chunk_size, time) {
                Ok(summer) => {
                    let bytes = summer.bytes();
                    let local = time.measure(Clock::Checksum, || summer.finish());
                    let remote = object.checksum();
                    let matched = verify(&local, &remote);
                    tally.complete(bytes);
                    if !matched {
                        tally.mismatch();
                        self.reporter.report(&Event::Mismatch {
                            name: &object.name,
                            local: &local,
                            remote: &remote,
                        });
                    }
                    self.reporter.report(&Event::Fetched {
                        name: &object.name,
                        bytes,
                        matched,
                    });
                    return Ok(());
                }
                Err(error @ StorageError::ContainerNotFound(_)) => return Err(error.into()),
                Err(error) => {
                    let delay = if error.is_transient() && attempt < self.settings.fetch_retries {
                        delays.next()
                    } else {
                        None
                    };
                    match delay {
                        Some(delay) => {
                            attempt += 1;
                            tally.retry();
                            self.reporter.report(&Event::Retrying {
                                name: &object.name,
                                attempt,
                                delay,
                                error: &error,
                            });
                            time.measure(Clock::Wait, || thread::sleep(delay));
                        }
                        None => return self.failed(tally, &object.name, error),
                    }
                }
            }
        }
    }

    fn fetch_content(
        &self,
        container: &str,
        name: &str,
        chunk_size: usize,
        time: &AccumulatedTime<Clock>,
    ) -> Result<Checksummer, StorageError> {
        let mut chunks = time.measure(Clock::Transfer, || {
            self.store.fetch_object(container, name, chunk_size)
        })?;
        let mut summer = Checksummer::new();
        while let Some(chunk) = time.measure(Clock::Transfer, || chunks.next()) {
            let chunk = chunk?;
            time.measure(Clock::Checksum, || summer.update(&chunk));
        }
        Ok(summer)
    }

    fn delete_each(
        &self,
        container: &str,
        objects: &[ObjectMeta],
        tally: &Tally,
        time: &AccumulatedTime<Clock>,
    ) -> Result<(), BenchError> {
        let mut queue = WorkQueue::new();
        for object in objects.iter() {
            queue.push(object);
        }
        queue.close();

        self.run_workers(&queue, |_, object| {
            match time.measure(Clock::Transfer, || {
                self.store.delete_object(container, &object.name)
            }) {
                Ok(()) | Err(StorageError::ObjectNotFound(_, _)) => {
                    tally.complete(object.bytes);
                    self.reporter.report(&Event::Deleted {
                        name: &object.name,
                        bytes: object.bytes,
                    });
                    Ok(())
                }
                Err(error) => Err(error.into()),
            }
        })
    }

    fn wait_until_empty(
        &self,
        container: &str,
        time: &AccumulatedTime<Clock>,
    ) -> Result<(), BenchError> {
        let mut delays = self.settings.poll.delays();
        loop {
            let remaining = time
                .measure(Clock::Transfer, || self.store.list_objects(container))?
                .len();
            if remaining == 0 {
                return Ok(());
            }
            match delays.next() {
                Some(delay) => {
                    self.reporter.report(&Event::Waiting { remaining, delay });
                    time.measure(Clock::Wait, || thread::sleep(delay));
                }
                None => {
                    return Err(BenchError::Timeout {
                        container: container.to_string(),
                        waited: time.duration(Clock::Wait),
                    })
                }
            }
        }
    }

    // Count and report an operation that failed for good. The run goes
    // on unless told to stop at the first failure.
    fn failed(&self, tally: &Tally, name: &str, error: StorageError) -> Result<(), BenchError> {
        tally.failure();
        self.reporter.report(&Event::Failed {
            name,
            error: &error,
        });
        if self.settings.abort_on_error {
            Err(error.into())
        } else {
            Ok(())
        }
    }

    fn finish(
        &self,
        tally: Tally,
        kind: BenchmarkKind,
        container: &str,
        count: u64,
        started: Instant,
        time: &AccumulatedTime<Clock>,
    ) -> BenchmarkResult {
        let result = tally.finish(kind, container, count, started.elapsed(), time);
        self.reporter.report(&Event::Finished(&result));
        result
    }

    // Run `op` `count` times, each time with the payload generator of
    // the worker doing it.
    fn drive<F>(&self, count: u64, op: F) -> Result<(), BenchError>
    where
        F: Fn(&mut PayloadGenerator) -> Result<(), BenchError> + Sync,
    {
        if self.settings.workers <= 1 {
            let mut gen = self.generator(0);
            for _ in 0..count {
                op(&mut gen)?;
            }
            return Ok(());
        }

        let mut queue = WorkQueue::new();
        for ticket in 0..count {
            queue.push(ticket);
        }
        queue.close();
        self.run_workers(&queue, |gen, _| op(gen))
    }

    // Process every item in a closed queue with a pool of worker
    // threads. The first error stops all workers and is returned.
    fn run_workers<T, F>(&self, queue: &WorkQueue<T>, op: F) -> Result<(), BenchError>
    where
        T: Send,
        F: Fn(&mut PayloadGenerator, T) -> Result<(), BenchError> + Sync,
    {
        let stop = AtomicBool::new(false);
        let first_error: Mutex<Option<BenchError>> = Mutex::new(None);

        thread::scope(|scope| {
            for n in 0..self.settings.workers.max(1) {
                let worker = queue.worker();
                let mut gen = self.generator(n);
                let (op, stop, first_error) = (&op, &stop, &first_error);
                scope.spawn(move || {
                    while let Some(item) = worker.next() {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(error) = op(&mut gen, item) {
                            stop.store(true, Ordering::Relaxed);
                            first_error.lock().unwrap().get_or_insert(error);
                            break;
                        }
                    }
                });
            }
        });

        match first_error.into_inner().unwrap() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn generator(&self, worker: usize) -> PayloadGenerator {
        PayloadGenerator::seeded(self.seed.wrapping_add(worker as u64))
    }
}

#[cfg(test)]
mod test {
    use super::{BenchSettings, Benchmark};
    use crate::backoff::Backoff;
    use crate::checksummer::Checksum;
    use crate::error::BenchError;
    use crate::memstore::MemoryStore;
    use crate::objectstore::{
        ContainerInfo, ObjectChunks, ObjectMeta, ObjectStore, StorageError,
    };
    use crate::progress::{Event, Reporter};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    // A store in memory that can be told to misbehave.
    #[derive(Default)]
    struct MockStore {
        inner: MemoryStore,
        // Fetch number (from zero) whose content gets corrupted.
        corrupt_fetch: Option<u64>,
        fetches: AtomicU64,
        // Number of fetches that fail with a transient error first.
        flaky_fetches: AtomicU64,
        // Number of times an empty container is still listed as having
        // an object.
        stale_listings: AtomicU64,
        fail_stores: bool,
    }

    impl MockStore {
        fn new() -> Self {
            Self::default()
        }

        fn count(&self, container: &str) -> usize {
            self.inner.list_objects(container).unwrap().len()
        }
    }

    fn take_one(counter: &AtomicU64) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    impl ObjectStore for MockStore {
        fn create_container(&self, name: &str) -> Result<ContainerInfo, StorageError> {
            self.inner.create_container(name)
        }

        fn delete_container(&self, name: &str) -> Result<(), StorageError> {
            self.inner.delete_container(name)
        }

        fn get_container(&self, name: &str) -> Result<ContainerInfo, StorageError> {
            self.inner.get_container(name)
        }

        fn list_objects(&self, container: &str) -> Result<Vec<ObjectMeta>, StorageError> {
            let objects = self.inner.list_objects(container)?;
            if objects.is_empty() && take_one(&self.stale_listings) {
                Ok(vec![ObjectMeta {
                    name: "ghost".into(),
                    etag: "d41d8cd98f00b204e9800998ecf8427e".into(),
                    bytes: 0,
                }])
            } else {
                Ok(objects)
            }
        }

        fn store_object(
            &self,
            container: &str,
            name: &str,
            data: Vec<u8>,
            etag: &Checksum,
        ) -> Result<ObjectMeta, StorageError> {
            if self.fail_stores {
                return Err(StorageError::Status(
                    "PUT".into(),
                    StatusCode::INTERNAL_SERVER_ERROR,
                ));
            }
            self.inner.store_object(container, name, data, etag)
        }

        fn fetch_object(
            &self,
            container: &str,
            name: &str,
            chunk_size: usize,
        ) -> Result<ObjectChunks<'_>, StorageError> {
            if take_one(&self.flaky_fetches) {
                return Err(StorageError::Status(
                    "GET".into(),
                    StatusCode::SERVICE_UNAVAILABLE,
                ));
            }
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            let chunks = self.inner.fetch_object(container, name, chunk_size)?;
            if Some(n) == self.corrupt_fetch {
                let mut first = true;
                Ok(Box::new(chunks.map(move |chunk| {
                    let mut chunk = chunk?;
                    if first {
                        chunk[0] ^= 0xff;
                        first = false;
                    }
                    Ok(chunk)
                })))
            } else {
                Ok(chunks)
            }
        }

        fn delete_all_objects(&self, container: &str) -> Result<(), StorageError> {
            self.inner.delete_all_objects(container)
        }

        fn delete_object(&self, container: &str, name: &str) -> Result<(), StorageError> {
            self.inner.delete_object(container, name)
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        fn count(&self, prefix: &str) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.starts_with(prefix))
                .count()
        }
    }

    impl Reporter for RecordingReporter {
        fn report(&self, event: &Event<'_>) {
            let name = match event {
                Event::Started { .. } => "started",
                Event::Stored { .. } => "stored",
                Event::Fetched { matched: true, .. } => "fetched matched",
                Event::Fetched { matched: false, .. } => "fetched mismatch",
                Event::Mismatch { .. } => "mismatch",
                Event::Failed { .. } => "failed",
                Event::Retrying { .. } => "retrying",
                Event::Deleted { .. } => "deleted",
                Event::Waiting { .. } => "waiting",
                Event::ConnectionFailed { .. } => "connection failed",
                Event::Finished(_) => "finished",
            };
            self.events.lock().unwrap().push(name.to_string());
        }
    }

    fn settings() -> BenchSettings {
        let fast = Backoff::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(20),
        );
        BenchSettings {
            seed: Some(42),
            retry: fast,
            poll: fast,
            ..BenchSettings::default()
        }
    }

    fn workers(n: usize) -> BenchSettings {
        BenchSettings {
            workers: n,
            ..settings()
        }
    }

    fn fill(store: &MockStore, container: &str, count: u64) {
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(store, &reporter, settings());
        bench.upload(container, 100, count).unwrap();
    }

    #[test]
    fn upload_stores_every_object() {
        let store = MockStore::new();
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        let result = bench.upload("bench1", 819200, 5).unwrap();

        assert_eq!(store.count("bench1"), 5);
        assert_eq!(result.operation_count(), 5);
        assert_eq!(result.bytes(), 5 * 819200);
        assert_eq!(result.mismatch_count(), 0);
        assert!(result.elapsed_seconds() > 0.0);
        assert_eq!(result.throughput(), 5.0 / result.elapsed_seconds());
        assert_eq!(reporter.count("stored"), 5);
        assert_eq!(reporter.count("finished"), 1);
    }

    #[test]
    fn upload_with_unicode_names() {
        let store = MockStore::new();
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(
            &store,
            &reporter,
            BenchSettings {
                unicode_names: true,
                ..settings()
            },
        );
        bench.upload("c", 10, 20).unwrap();
        let names = store.inner.list_objects("c").unwrap();
        assert!(names.iter().any(|o| !o.name.is_ascii()));
    }

    #[test]
    fn same_seed_gives_same_names() {
        let names = |store: &MockStore| -> Vec<String> {
            let reporter = RecordingReporter::default();
            Benchmark::new(store, &reporter, settings())
                .upload("c", 10, 3)
                .unwrap();
            store
                .inner
                .list_objects("c")
                .unwrap()
                .into_iter()
                .map(|o| o.name)
                .collect()
        };
        assert_eq!(names(&MockStore::new()), names(&MockStore::new()));
    }

    #[test]
    fn upload_counts_failures_and_continues() {
        let store = MockStore {
            fail_stores: true,
            ..MockStore::default()
        };
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        let result = bench.upload("c", 10, 3).unwrap();
        assert_eq!(result.failure_count(), 3);
        assert_eq!(reporter.count("failed"), 3);
        assert_eq!(store.count("c"), 0);
    }

    #[test]
    fn upload_aborts_on_error_when_asked() {
        let store = MockStore {
            fail_stores: true,
            ..MockStore::default()
        };
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(
            &store,
            &reporter,
            BenchSettings {
                abort_on_error: true,
                ..settings()
            },
        );
        assert!(matches!(
            bench.upload("c", 10, 3),
            Err(BenchError::Storage(StorageError::Status(_, _)))
        ));
        assert_eq!(reporter.count("failed"), 1);
    }

    #[test]
    fn upload_with_workers_stores_every_object() {
        let store = MockStore::new();
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, workers(4));
        let result = bench.upload("c", 1000, 40).unwrap();
        assert_eq!(result.operation_count(), 40);
        assert_eq!(result.bytes(), 40 * 1000);
        assert_eq!(store.count("c"), 40);
        assert_eq!(reporter.count("stored"), 40);
    }

    #[test]
    fn fetch_verifies_every_object() {
        let store = MockStore::new();
        fill(&store, "c", 10);
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        let result = bench.fetch("c", 10, 7).unwrap();
        assert_eq!(result.operation_count(), 10);
        assert_eq!(result.mismatch_count(), 0);
        assert_eq!(result.bytes(), 10 * 100);
        assert_eq!(reporter.count("fetched matched"), 10);
    }

    #[test]
    fn fetch_counts_corrupted_object() {
        let store = MockStore {
            corrupt_fetch: Some(3),
            ..MockStore::default()
        };
        fill(&store, "c", 10);
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        let result = bench.fetch("c", 10, 8192).unwrap();
        assert_eq!(result.operation_count(), 10);
        assert_eq!(result.mismatch_count(), 1);
        assert_eq!(reporter.count("fetched mismatch"), 1);
        assert_eq!(reporter.count("mismatch"), 1);
    }

    #[test]
    fn fetch_with_workers_counts_corrupted_object() {
        let store = MockStore {
            corrupt_fetch: Some(3),
            ..MockStore::default()
        };
        fill(&store, "c", 10);
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, workers(4));
        let result = bench.fetch("c", 10, 8192).unwrap();
        assert_eq!(result.operation_count(), 10);
        assert_eq!(result.mismatch_count(), 1);
        assert_eq!(reporter.count("fetched"), 10);
    }

    #[test]
    fn fetch_from_empty_container_fails() {
        let store = MockStore::new();
        store.create_container("c").unwrap();
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        assert!(matches!(
            bench.fetch("c", 10, 8192),
            Err(BenchError::EmptyContainer(_))
        ));
    }

    #[test]
    fn fetch_from_missing_container_fails() {
        let store = MockStore::new();
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        assert!(matches!(
            bench.fetch("nope", 10, 8192),
            Err(BenchError::Storage(StorageError::ContainerNotFound(_)))
        ));
    }

    #[test]
    fn fetch_retries_transient_errors() {
        let store = MockStore {
            flaky_fetches: AtomicU64::new(3),
            ..MockStore::default()
        };
        fill(&store, "c", 2);
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        let result = bench.fetch("c", 4, 8192).unwrap();
        assert_eq!(result.operation_count(), 4);
        assert_eq!(result.retry_count(), 3);
        assert_eq!(result.failure_count(), 0);
        assert_eq!(reporter.count("fetched"), 4);
        assert_eq!(reporter.count("retrying"), 3);
    }

    #[test]
    fn fetch_gives_up_after_retries() {
        let store = MockStore {
            flaky_fetches: AtomicU64::new(3),
            ..MockStore::default()
        };
        fill(&store, "c", 1);
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(
            &store,
            &reporter,
            BenchSettings {
                fetch_retries: 1,
                ..settings()
            },
        );
        let result = bench.fetch("c", 2, 8192).unwrap();
        assert_eq!(result.failure_count(), 1);
        assert_eq!(result.retry_count(), 2);
        assert_eq!(reporter.count("fetched"), 1);
    }

    #[test]
    fn cleanup_deletes_everything() {
        let store = MockStore::new();
        fill(&store, "c", 7);
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        let result = bench.cleanup("c").unwrap();
        assert_eq!(result.operation_count(), 7);
        assert_eq!(reporter.count("deleted"), 7);
        assert!(store.inner.container_names().is_empty());

        assert!(matches!(
            bench.cleanup("c"),
            Err(BenchError::Storage(StorageError::ContainerNotFound(_)))
        ));
    }

    #[test]
    fn cleanup_with_workers_deletes_everything() {
        let store = MockStore::new();
        fill(&store, "c", 7);
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, workers(3));
        let result = bench.cleanup("c").unwrap();
        assert_eq!(result.operation_count(), 7);
        assert_eq!(result.bytes(), 700);
        assert_eq!(reporter.count("deleted"), 7);
        assert!(store.inner.container_names().is_empty());
    }

    #[test]
    fn cleanup_waits_for_deletions_to_show() {
        let store = MockStore {
            stale_listings: AtomicU64::new(2),
            ..MockStore::default()
        };
        fill(&store, "c", 3);
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        bench.cleanup("c").unwrap();
        assert_eq!(reporter.count("waiting"), 2);
        assert!(store.inner.container_names().is_empty());
    }

    #[test]
    fn cleanup_times_out() {
        let store = MockStore {
            stale_listings: AtomicU64::new(u64::MAX),
            ..MockStore::default()
        };
        store.create_container("c").unwrap();
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        assert!(matches!(
            bench.cleanup("c"),
            Err(BenchError::Timeout { .. })
        ));
        assert_eq!(store.inner.container_names(), vec!["c".to_string()]);
    }

    #[test]
    fn connection_test_leaves_nothing_behind() {
        let store = MockStore::new();
        let reporter = RecordingReporter::default();
        let bench = Benchmark::new(&store, &reporter, settings());
        assert!(bench.connection_test());
        assert!(store.inner.container_names().is_empty());
        assert_eq!(reporter.count("connection failed"), 0);
    }
}
