//! Bounded request pool.
//!
//! At most `capacity` tasks run at once; extra submissions wait in FIFO
//! order for a free slot. The elapsed time reported for a task starts
//! at submission, so time spent queued counts toward it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::trace;

/// Result of a pooled task together with its submit-to-finish time.
#[derive(Debug)]
pub struct Timed<T> {
    pub result: T,
    pub elapsed: Duration,
}

/// Concurrency limiter shared by every session that uploads through it.
///
/// Cloning is cheap; clones share the same slots.
#[derive(Clone)]
pub struct RequestPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    // tokio's semaphore is fair, which gives FIFO admission.
    permits: Semaphore,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl RequestPool {
    /// Creates a pool that runs at most `capacity` tasks at once.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                permits: Semaphore::new(capacity),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    /// Waits for a slot, runs `task`, and returns its result with the
    /// elapsed time measured from this call.
    ///
    /// The slot is released when the task finishes or when the returned
    /// future is dropped.
    pub async fn submit<F, T, E>(&self, task: F) -> Timed<Result<T, E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let submitted = Instant::now();
        let slot = self.acquire().await;
        let result = task.await;
        if result.is_err() {
            self.inner.failed.fetch_add(1, Ordering::Relaxed);
        }
        drop(slot);
        Timed {
            result,
            elapsed: submitted.elapsed(),
        }
    }

    async fn acquire(&self) -> Slot<'_> {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = self.inner.permits.acquire().await.ok();
        let now = self.inner.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(now, Ordering::AcqRel);
        trace!(in_flight = now, capacity = self.inner.capacity, "pool slot acquired");
        Slot {
            pool: &self.inner,
            _permit: permit,
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Tasks currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Highest number of tasks ever observed holding a slot at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }

    /// Tasks that ran to completion (successfully or not).
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Tasks whose result was an error.
    pub fn failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }
}

impl Default for RequestPool {
    fn default() -> Self {
        Self::new(crate::DEFAULT_POOL_SIZE)
    }
}

impl std::fmt::Debug for RequestPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPool")
            .field("capacity", &self.capacity())
            .field("in_flight", &self.in_flight())
            .field("peak", &self.peak())
            .finish()
    }
}

/// A held pool slot. The in-flight count drops before the permit is
/// returned, so `in_flight` never exceeds capacity.
struct Slot<'a> {
    pool: &'a PoolInner,
    _permit: Option<SemaphorePermit<'a>>,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.pool.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.pool.completed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn burst_never_exceeds_capacity() {
        let pool = RequestPool::new(6);
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let elapsed = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..18 {
            let pool = pool.clone();
            let running = Arc::clone(&running);
            let max_seen = Arc::clone(&max_seen);
            let elapsed = Arc::clone(&elapsed);
            handles.push(tokio::spawn(async move {
                let timed = pool
                    .submit(async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, ()>(())
                    })
                    .await;
                assert!(timed.result.is_ok());
                elapsed.lock().unwrap().push(timed.elapsed);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 6);
        assert_eq!(pool.peak(), 6);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.completed(), 18);

        // The last wave waited through two full waves before running.
        let longest = elapsed.lock().unwrap().iter().copied().max().unwrap();
        assert!(longest >= Duration::from_millis(300), "longest = {longest:?}");
    }

    #[tokio::test]
    async fn error_results_release_the_slot() {
        let pool = RequestPool::new(1);
        let timed = pool.submit(async { Err::<(), _>("boom") }).await;
        assert_eq!(timed.result, Err("boom"));
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.failed(), 1);

        let timed = pool.submit(async { Ok::<_, ()>(7) }).await;
        assert_eq!(timed.result, Ok(7));
        assert_eq!(pool.completed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_submission_frees_its_slot() {
        let pool = RequestPool::new(1);
        let blocked = pool.submit(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, ()>(())
        });
        let res = tokio::time::timeout(Duration::from_millis(10), blocked).await;
        assert!(res.is_err());
        assert_eq!(pool.in_flight(), 0);

        let timed = pool.submit(async { Ok::<_, ()>(()) }).await;
        assert!(timed.result.is_ok());
    }

    #[test]
    fn zero_capacity_becomes_one() {
        assert_eq!(RequestPool::new(0).capacity(), 1);
        assert_eq!(RequestPool::default().capacity(), 6);
    }
}
