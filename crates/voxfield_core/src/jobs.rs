use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

/// Worker pool used for chunk generation batches.
pub struct JobSystem {
    pool: ThreadPool,
}

impl JobSystem {
    pub fn new(num_threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(|index| format!("chunk-worker-{index}"))
            .build()?;
        debug!("Started chunk job pool with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` inside the pool and blocks until every job spawned on the
    /// scope has finished.
    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&rayon::Scope<'scope>) -> R + Send,
        R: Send,
    {
        self.pool.scope(op)
    }

    /// Applies `job` to every item, one task per item, and waits for all of them.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], job: F)
    where
        T: Send,
        F: Fn(&mut T) + Sync,
    {
        let job = &job;
        self.scope(|scope| {
            for item in items.iter_mut() {
                scope.spawn(move |_| job(item));
            }
        });
    }
}
