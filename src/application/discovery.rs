//! Finds queues by scanning Redis keys, and constructs a handle for each one.

use std::collections::BTreeSet;
use std::future::Future;

use deadpool_redis::Pool;
use log::{debug, error, info};
use regex::Regex;

use super::adapter::{adapter_for, QueueAdapter};
use super::backoff::Backoff;
use crate::models::options::QueueOptions;
use crate::models::queue::QueueKind;
use crate::models::{BoardError, BoardResult};
use crate::redis_utils::{query_timeout, scan_keys};

/// Builds the regex that extracts a queue name from a key such as `bull:mail:wait`.
///
/// The name is the first segment after the prefix, so per-job keys like `bull:mail:42:lock`
/// belong to `mail`.
fn queue_key_regex(prefix: &str) -> BoardResult<Regex> {
    Regex::new(&format!(r"^{}:([^:]+):", regex::escape(prefix)))
        .map_err(|err| BoardError::Internal(format!("invalid queue key pattern: {}", err)))
}

/// Extracts the unique, sorted queue names from a list of Redis keys.
pub fn queue_names_from_keys<S: AsRef<str>>(prefix: &str, keys: &[S]) -> BoardResult<Vec<String>> {
    let re = queue_key_regex(prefix)?;
    let names: BTreeSet<String> = keys
        .iter()
        .filter_map(|key| re.captures(key.as_ref()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
        .collect();
    Ok(names.into_iter().collect())
}

/// Constructs a handle for each named queue, retrying each construction with `backoff`.
///
/// A queue that still can't be constructed after all attempts is logged and skipped, so one bad
/// queue never prevents the others from being shown.
pub async fn build_queues<F, Fut>(names: Vec<String>, backoff: &Backoff, mut create: F) -> Vec<Box<dyn QueueAdapter>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = BoardResult<Box<dyn QueueAdapter>>>,
{
    let mut queues = Vec::with_capacity(names.len());
    for name in names {
        let what = format!("[queue:{}] construction", name);
        match backoff.retry(&what, || create(name.clone())).await {
            Ok(queue) => {
                debug!("[queue:{}] constructed", name);
                queues.push(queue);
            }
            Err(err) => error!("[queue:{}] giving up after {} attempt(s): {}", name, backoff.attempts.max(1), err),
        }
    }
    queues
}

/// Discovers queues in Redis and constructs an adapter for each.
///
/// Fails only when the key scan itself fails, so callers can tell an unreachable Redis apart from
/// one that holds no queues. Finding no queues is logged and gives an empty set.
pub async fn discover_queues(
    pool: &Pool,
    options: &QueueOptions,
    kind: QueueKind,
    backoff: &Backoff,
) -> BoardResult<Vec<Box<dyn QueueAdapter>>> {
    let prefix = options.prefix.as_deref().unwrap_or(super::adapter::DEFAULT_KEY_PREFIX);
    let pattern = format!("{}:*", prefix);
    let timeout = options.redis.command_timeout;

    let mut conn = pool.get().await?;
    let keys = query_timeout(timeout, scan_keys(&mut conn, &pattern)).await?;
    // construction takes its own connections, the pool may hold only one
    drop(conn);

    let names = queue_names_from_keys(prefix, &keys)?;
    if names.is_empty() {
        error!("No queues found in Redis matching '{}'", pattern);
        return Ok(Vec::new());
    }
    info!("Found {} {} queue(s): {}", names.len(), kind, names.join(", "));

    let queues = build_queues(names, backoff, |name| async move {
        let mut conn = pool.get().await?;
        query_timeout(timeout, redis::cmd("PING").query_async::<_, String>(&mut conn)).await?;
        Ok::<_, BoardError>(adapter_for(kind, &name, options))
    })
    .await;
    Ok(queues)
}
