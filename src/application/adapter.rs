//! Adapters exposing a queue's Redis keys in the shape the dashboard reads them.
//!
//! Bull and BullMQ share most of their key layout. The adapters only describe that layout; the
//! jobs themselves are never modified.

use crate::models::options::QueueOptions;
use crate::models::queue::{JobState, QueueKind};

/// Key prefix used by both libraries when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "bull";

const BULL_STATES: &[JobState] = &[
    JobState::Active,
    JobState::Waiting,
    JobState::Completed,
    JobState::Failed,
    JobState::Delayed,
    JobState::Paused,
];

const BULLMQ_STATES: &[JobState] = &[
    JobState::Active,
    JobState::Waiting,
    JobState::WaitingChildren,
    JobState::Prioritized,
    JobState::Completed,
    JobState::Failed,
    JobState::Delayed,
    JobState::Paused,
];

/// Wrapper around a discovered queue, registered with the dashboard.
pub trait QueueAdapter: Send + Sync {
    /// Name of the queue.
    fn name(&self) -> &str;

    /// Library the queue belongs to.
    fn kind(&self) -> QueueKind;

    /// Job states this library keeps, in display order.
    fn states(&self) -> &'static [JobState];

    /// Common key prefix for this queue, e.g. `bull:mail`.
    fn key_base(&self) -> &str;

    /// Redis key holding jobs in the given state.
    fn state_key(&self, state: JobState) -> String {
        format!("{}:{}", self.key_base(), state.key_suffix())
    }

    /// Redis key of a single job's hash.
    fn job_key(&self, job_id: &str) -> String {
        format!("{}:{}", self.key_base(), job_id)
    }

    fn has_state(&self, state: JobState) -> bool {
        self.states().contains(&state)
    }
}

fn key_base(name: &str, options: &QueueOptions) -> String {
    let prefix = options.prefix.as_deref().unwrap_or(DEFAULT_KEY_PREFIX);
    format!("{}:{}", prefix, name)
}

/// Adapter for queues created by Bull.
#[derive(Debug)]
pub struct BullAdapter {
    name: String,
    key_base: String,
}

impl BullAdapter {
    pub fn new<S: Into<String>>(name: S, options: &QueueOptions) -> Self {
        let name = name.into();
        let key_base = key_base(&name, options);
        BullAdapter { name, key_base }
    }
}

impl QueueAdapter for BullAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> QueueKind {
        QueueKind::Bull
    }

    fn states(&self) -> &'static [JobState] {
        BULL_STATES
    }

    fn key_base(&self) -> &str {
        &self.key_base
    }
}

/// Adapter for queues created by BullMQ.
#[derive(Debug)]
pub struct BullMqAdapter {
    name: String,
    key_base: String,
}

impl BullMqAdapter {
    pub fn new<S: Into<String>>(name: S, options: &QueueOptions) -> Self {
        let name = name.into();
        let key_base = key_base(&name, options);
        BullMqAdapter { name, key_base }
    }
}

impl QueueAdapter for BullMqAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> QueueKind {
        QueueKind::BullMq
    }

    fn states(&self) -> &'static [JobState] {
        BULLMQ_STATES
    }

    fn key_base(&self) -> &str {
        &self.key_base
    }
}

/// Wraps a queue in the adapter matching its library.
pub fn adapter_for(kind: QueueKind, name: &str, options: &QueueOptions) -> Box<dyn QueueAdapter> {
    match kind {
        QueueKind::Bull => Box::new(BullAdapter::new(name, options)),
        QueueKind::BullMq => Box::new(BullMqAdapter::new(name, options)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::RedisConfig;
    use crate::models::options::RedisOptions;

    fn options(prefix: &str) -> QueueOptions {
        QueueOptions::new(RedisOptions::from_config(&RedisConfig::default()), prefix)
    }

    #[test]
    fn bull_keys() {
        let adapter = adapter_for(QueueKind::Bull, "mail", &options("bull"));
        assert_eq!(adapter.name(), "mail");
        assert_eq!(adapter.kind(), QueueKind::Bull);
        assert_eq!(adapter.state_key(JobState::Waiting), "bull:mail:wait");
        assert_eq!(adapter.state_key(JobState::Failed), "bull:mail:failed");
        assert_eq!(adapter.job_key("17"), "bull:mail:17");
        assert!(!adapter.has_state(JobState::Prioritized));
    }

    #[test]
    fn bullmq_keys() {
        let adapter = adapter_for(QueueKind::BullMq, "video", &options("jobs"));
        assert_eq!(adapter.kind(), QueueKind::BullMq);
        assert_eq!(adapter.state_key(JobState::Prioritized), "jobs:video:prioritized");
        assert_eq!(adapter.state_key(JobState::WaitingChildren), "jobs:video:waiting-children");
        assert!(adapter.has_state(JobState::Prioritized));
    }

    #[test]
    fn default_prefix() {
        let adapter = adapter_for(QueueKind::Bull, "mail", &options(""));
        assert_eq!(adapter.state_key(JobState::Active), "bull:mail:active");
    }
}
