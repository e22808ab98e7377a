//! Worker pools for running independent trials.
//!
//! The runner only needs "apply this function to indices `0..n` and give me
//! the results in index order". Anything that can do that can host the
//! simulation: a rayon thread pool, or the calling thread.

#[cfg(feature = "parallel")]
use std::sync::Arc;
use std::thread::available_parallelism;

/// Execution backend for trial batches
pub trait WorkerPool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Upper bound on concurrently running tasks
    fn workers(&self) -> usize;

    /// Run `f(i)` for every `i` in `0..count`. Results are returned in index
    /// order no matter which task finished first.
    fn map_indexed<R, F>(&self, count: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync;
}

/// Number of hardware threads, 4 if unknown
pub fn default_workers() -> usize {
    available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Runs everything on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialPool;

impl WorkerPool for SequentialPool {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn workers(&self) -> usize {
        1
    }

    fn map_indexed<R, F>(&self, count: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync,
    {
        (0..count).map(f).collect()
    }
}

/// Dedicated rayon thread pool
#[cfg(feature = "parallel")]
#[derive(Debug, Clone)]
pub struct RayonPool {
    pool: Arc<rayon::ThreadPool>,
}

#[cfg(feature = "parallel")]
impl RayonPool {
    pub fn new(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("goalprob-sim-{i}"))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[cfg(feature = "parallel")]
impl WorkerPool for RayonPool {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn map_indexed<R, F>(&self, count: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync,
    {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};

        self.pool
            .install(|| (0..count).into_par_iter().map(&f).collect())
    }
}

/// The pool a runner actually uses, chosen at construction
#[derive(Debug, Clone)]
pub enum Pool {
    Sequential(SequentialPool),
    #[cfg(feature = "parallel")]
    Rayon(RayonPool),
}

impl Default for Pool {
    fn default() -> Self {
        Pool::build(default_workers())
    }
}

impl Pool {
    /// A parallel pool with `max_workers` threads, or the sequential pool if
    /// only one worker is requested or the thread pool cannot start.
    pub fn build(max_workers: usize) -> Self {
        if max_workers <= 1 {
            return Pool::Sequential(SequentialPool);
        }

        #[cfg(feature = "parallel")]
        {
            match RayonPool::new(max_workers) {
                Ok(pool) => Pool::Rayon(pool),
                Err(err) => {
                    tracing::warn!(
                        max_workers,
                        error = %err,
                        "Worker pool failed to start, running trials sequentially"
                    );
                    Pool::Sequential(SequentialPool)
                }
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            Pool::Sequential(SequentialPool)
        }
    }

    pub fn sequential() -> Self {
        Pool::Sequential(SequentialPool)
    }
}

impl WorkerPool for Pool {
    fn name(&self) -> &'static str {
        match self {
            Pool::Sequential(p) => p.name(),
            #[cfg(feature = "parallel")]
            Pool::Rayon(p) => p.name(),
        }
    }

    fn workers(&self) -> usize {
        match self {
            Pool::Sequential(p) => p.workers(),
            #[cfg(feature = "parallel")]
            Pool::Rayon(p) => p.workers(),
        }
    }

    fn map_indexed<R, F>(&self, count: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync,
    {
        match self {
            Pool::Sequential(p) => p.map_indexed(count, f),
            #[cfg(feature = "parallel")]
            Pool::Rayon(p) => p.map_indexed(count, f),
        }
    }
}
