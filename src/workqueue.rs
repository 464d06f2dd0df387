//! A queue of work for the benchmark workers.

/// A queue of work items.
///
/// One thread puts work items into the queue, any number of worker
/// threads take them out. Each item goes to exactly one worker. Once
/// the queue has been closed and drained, workers get `None`.
///
/// The work items need to be abstracted as a type, and that type is
/// given as a type parameter.
pub struct WorkQueue<T: Send> {
    tx: Option<spmc::Sender<T>>,
    rx: spmc::Receiver<T>,
}

impl<T: Send> WorkQueue<T> {
    /// Create a new, empty work queue.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let (tx, rx) = spmc::channel();
        Self { tx: Some(tx), rx }
    }

    /// Add an item of work to the queue.
    ///
    /// Items pushed after the queue is closed are dropped.
    pub fn push(&mut self, item: T) {
        if let Some(tx) = self.tx.as_mut() {
            // Can't fail: we hold a receiver ourselves.
            let _ = tx.send(item);
        }
    }

    /// Signal that no more work items will be added to the queue.
    ///
    /// You **must** call this, as otherwise workers will wait
    /// indefinitely for more work once the queue is empty.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Get a handle for a worker to take items from the queue.
    pub fn worker(&self) -> Worker<T> {
        Worker {
            rx: self.rx.clone(),
        }
    }
}

/// The consuming end of a [`WorkQueue`], for one worker.
pub struct Worker<T: Send> {
    rx: spmc::Receiver<T>,
}

impl<T: Send> Worker<T> {
    /// Get the oldest work item not yet taken, if any.
    pub fn next(&self) -> Option<T> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod test {
    use super::WorkQueue;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn single_worker_gets_items_in_order() {
        let mut q = WorkQueue::new();
        for i in 0..5 {
            q.push(i);
        }
        q.close();
        let worker = q.worker();
        let mut got = vec![];
        while let Some(i) = worker.next() {
            got.push(i);
        }
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn every_item_goes_to_exactly_one_worker() {
        const N: u64 = 1000;
        let mut q = WorkQueue::new();
        for i in 0..N {
            q.push(i);
        }
        q.close();

        let count = AtomicU64::new(0);
        let sum = AtomicU64::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                let worker = q.worker();
                let (count, sum) = (&count, &sum);
                s.spawn(move || {
                    while let Some(i) = worker.next() {
                        count.fetch_add(1, Ordering::Relaxed);
                        sum.fetch_add(i, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(count.into_inner(), N);
        assert_eq!(sum.into_inner(), N * (N - 1) / 2);
    }

    #[test]
    fn push_after_close_is_dropped() {
        let mut q = WorkQueue::new();
        q.push(1);
        q.close();
        q.push(2);
        let worker = q.worker();
        assert_eq!(worker.next(), Some(1));
        assert_eq!(worker.next(), None);
    }
}
