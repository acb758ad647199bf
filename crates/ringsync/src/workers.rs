//! Thread pool for driving a ring from several producers and consumers.
//!
//! Each worker runs the same closure with a [`WorkerContext`] telling it its
//! role and index. The pool shares one stop flag; workers poll
//! [`WorkerContext::should_stop`] and the closure's return value comes back
//! from [`WorkerPool::join`].

use crate::{Ring, Role, WorkerError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// What a worker knows about itself.
pub struct WorkerContext<T> {
    id: usize,
    role: Role,
    ring: Arc<Ring<T>>,
    stop: Arc<AtomicBool>,
}

impl<T> WorkerContext<T> {
    /// Index of this worker among workers of the same role.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn ring(&self) -> &Arc<Ring<T>> {
        &self.ring
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Ask every worker in the pool to stop.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Output of one worker.
#[derive(Debug)]
pub struct WorkerReport<R> {
    pub role: Role,
    pub id: usize,
    pub output: R,
}

struct Worker<R> {
    role: Role,
    id: usize,
    handle: JoinHandle<R>,
}

/// Running set of producer and consumer threads sharing one ring.
///
/// # Example
///
/// ```
/// use ringsync_rs::{Ring, RingConfig, RingMode, Role, WorkerPool};
/// use std::sync::Arc;
///
/// let ring = Arc::new(Ring::<u64>::new(RingConfig::new(64, RingMode::MPMC)).unwrap());
/// let pool = WorkerPool::launch(&ring, 2, 2, |ctx| match ctx.role() {
///     Role::Producer => {
///         let mut sent = 0u64;
///         while sent < 100 {
///             if ctx.ring().enqueue(sent).is_ok() {
///                 sent += 1;
///             }
///         }
///         sent
///     }
///     Role::Consumer => {
///         let mut got = 0u64;
///         while got < 100 {
///             if ctx.ring().dequeue().is_ok() {
///                 got += 1;
///             }
///         }
///         got
///     }
/// })
/// .unwrap();
///
/// let total: u64 = pool.join().unwrap().iter().map(|r| r.output).sum();
/// assert_eq!(total, 400);
/// ```
pub struct WorkerPool<R> {
    workers: Vec<Worker<R>>,
    stop: Arc<AtomicBool>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Spawn `producers` producer threads then `consumers` consumer threads,
    /// each running `f`.
    ///
    /// If a spawn fails, the workers already started are asked to stop and
    /// joined before the error is returned.
    pub fn launch<T, F>(
        ring: &Arc<Ring<T>>,
        producers: usize,
        consumers: usize,
        f: F,
    ) -> Result<Self, WorkerError>
    where
        T: Send + 'static,
        F: Fn(WorkerContext<T>) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let mut pool = Self {
            workers: Vec::with_capacity(producers + consumers),
            stop: Arc::new(AtomicBool::new(false)),
        };

        let plan = [(Role::Producer, producers), (Role::Consumer, consumers)];
        for (role, count) in plan {
            for id in 0..count {
                let ctx = WorkerContext {
                    id,
                    role,
                    ring: Arc::clone(ring),
                    stop: Arc::clone(&pool.stop),
                };
                let f = Arc::clone(&f);
                let spawned = thread::Builder::new()
                    .name(format!("ring-{role}-{id}"))
                    .spawn(move || {
                        debug!(%role, id, "worker started");
                        let out = f(ctx);
                        debug!(%role, id, "worker finished");
                        out
                    });

                match spawned {
                    Ok(handle) => pool.workers.push(Worker { role, id, handle }),
                    Err(source) => {
                        warn!(%role, id, error = %source, "failed to spawn worker");
                        pool.request_stop();
                        // Best effort; the spawn error is what gets reported
                        let _ = pool.join();
                        return Err(WorkerError::Spawn { role, id, source });
                    }
                }
            }
        }

        debug!(producers, consumers, "worker pool launched");
        Ok(pool)
    }

    /// Number of running workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Set the shared stop flag.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Wait for every worker. Returns their outputs in launch order
    /// (producers first), or the first panic encountered.
    ///
    /// All workers are joined even when one has panicked.
    pub fn join(self) -> Result<Vec<WorkerReport<R>>, WorkerError> {
        let mut reports = Vec::with_capacity(self.workers.len());
        let mut first_panic = None;

        for Worker { role, id, handle } in self.workers {
            match handle.join() {
                Ok(output) => reports.push(WorkerReport { role, id, output }),
                Err(_) => {
                    warn!(%role, id, "worker panicked");
                    if first_panic.is_none() {
                        first_panic = Some(WorkerError::Panicked { role, id });
                    }
                }
            }
        }

        match first_panic {
            Some(err) => Err(err),
            None => Ok(reports),
        }
    }
}
