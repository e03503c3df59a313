//! Registry of queue adapters and the read-only queries the dashboard runs against them.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use deadpool_redis::Pool;
use futures::future::join_all;
use log::{debug, error, info};
use redis::{aio::ConnectionLike, Value};

use super::adapter::QueueAdapter;
use crate::models::queue::{JobCounts, JobState, JobSummary, QueueSummary, JOB_FIELDS};
use crate::models::{BoardError, BoardResult};
use crate::redis_utils::query_timeout;

type QueueSet = Arc<Vec<Arc<dyn QueueAdapter>>>;

/// Holds the set of queues shown on the dashboard.
///
/// The set is only ever replaced as a whole, so readers always see a consistent snapshot.
pub struct Board {
    queues: RwLock<QueueSet>,
    command_timeout: Option<Duration>,
}

impl Board {
    /// Creates an empty board. Individual Redis commands are bounded by `command_timeout`.
    pub fn new(command_timeout: Option<Duration>) -> Self {
        Board {
            queues: RwLock::new(Arc::new(Vec::new())),
            command_timeout,
        }
    }

    /// Registers a new set of queues, replacing any previously registered ones.
    pub fn replace_queues(&self, adapters: Vec<Box<dyn QueueAdapter>>) {
        let mut adapters: Vec<Arc<dyn QueueAdapter>> = adapters.into_iter().map(Arc::from).collect();
        adapters.sort_by(|a, b| a.name().cmp(b.name()));
        info!("Registered {} queue(s) with the dashboard", adapters.len());

        let mut queues = match self.queues.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *queues = Arc::new(adapters);
    }

    /// Snapshot of the currently registered queues, sorted by name.
    pub fn queues(&self) -> QueueSet {
        match self.queues.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Looks up a registered queue by name.
    pub fn queue(&self, name: &str) -> BoardResult<Arc<dyn QueueAdapter>> {
        self.queues()
            .iter()
            .find(|q| q.name() == name)
            .cloned()
            .ok_or_else(|| BoardError::NoSuchQueue(name.to_owned()))
    }

    /// Counts jobs in each of the queue's states.
    pub async fn queue_counts<C: ConnectionLike + Send>(
        &self,
        conn: &mut C,
        queue: &dyn QueueAdapter,
    ) -> BoardResult<JobCounts> {
        let states = queue.states();
        let mut pipe = redis::pipe();
        for state in states {
            let key = queue.state_key(*state);
            if state.is_sorted_set() {
                pipe.zcard(key);
            } else {
                pipe.llen(key);
            }
        }

        let counts: Vec<u64> = query_timeout(self.command_timeout, pipe.query_async(conn)).await?;
        Ok(states.iter().copied().zip(counts).collect())
    }

    /// Fetches jobs in the given state, between the `start` and `end` (inclusive) positions.
    ///
    /// Sorted states are returned newest first. Jobs whose hash has disappeared in the meantime
    /// are skipped.
    pub async fn jobs<C: ConnectionLike + Send>(
        &self,
        conn: &mut C,
        queue: &dyn QueueAdapter,
        state: JobState,
        start: isize,
        end: isize,
    ) -> BoardResult<Vec<JobSummary>> {
        if !queue.has_state(state) {
            return Err(BoardError::bad_request(format!(
                "{} queues have no '{}' state",
                queue.kind(),
                state
            )));
        }

        let key = queue.state_key(state);
        let ids_cmd = if state.is_sorted_set() {
            redis::cmd("ZREVRANGE").arg(&key).arg(start).arg(end).clone()
        } else {
            redis::cmd("LRANGE").arg(&key).arg(start).arg(end).clone()
        };
        let ids: Vec<String> = query_timeout(self.command_timeout, ids_cmd.query_async(conn)).await?;
        debug!("[queue:{}] {} {} job(s) in range {}..={}", queue.name(), ids.len(), state, start, end);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.cmd("HMGET").arg(queue.job_key(id)).arg(&JOB_FIELDS[..]);
        }
        let values: Vec<Value> = query_timeout(self.command_timeout, pipe.query_async(conn)).await?;

        let mut jobs = Vec::with_capacity(ids.len());
        for (id, value) in ids.into_iter().zip(values) {
            if let Some(job) = JobSummary::from_fields(id, &value)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Counts for one queue, using a connection from the pool.
    pub async fn summary(&self, pool: &Pool, queue: &dyn QueueAdapter) -> QueueSummary {
        let counts = match pool.get().await {
            Ok(mut conn) => self.queue_counts(&mut conn, queue).await,
            Err(err) => Err(err.into()),
        };

        match counts {
            Ok(counts) => QueueSummary {
                name: queue.name().to_owned(),
                kind: queue.kind(),
                counts: Some(counts),
                error: None,
            },
            Err(err) => {
                error!("[queue:{}] failed to fetch job counts: {}", queue.name(), err);
                QueueSummary {
                    name: queue.name().to_owned(),
                    kind: queue.kind(),
                    counts: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Summaries of all registered queues, fetched concurrently. A queue that can't be read is
    /// reported with an error rather than failing the whole listing.
    pub async fn summaries(&self, pool: &Pool) -> Vec<QueueSummary> {
        let queues = self.queues();
        join_all(queues.iter().map(|q| self.summary(pool, q.as_ref()))).await
    }
}
