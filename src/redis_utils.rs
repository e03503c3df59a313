//! Miscellaneous Redis utilities and helper functions.

use std::future::Future;
use std::time::Duration;

use redis::{aio::ConnectionLike, RedisResult};

use crate::models::{BoardError, BoardResult};

/// Runs a Redis future, failing with `BoardError::RedisConnection` if it doesn't complete within
/// `timeout`. Runs without a time limit if `timeout` is `None`.
pub async fn query_timeout<T, F>(timeout: Option<Duration>, fut: F) -> BoardResult<T>
where
    F: Future<Output = RedisResult<T>>,
{
    match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(BoardError::RedisConnection(format!(
                "command timed out after {}",
                humantime::format_duration(timeout)
            ))),
        },
        None => Ok(fut.await?),
    }
}

/// Scans for all keys matching `pattern`, using `SCAN` so the server isn't blocked.
pub async fn scan_keys<C: ConnectionLike + Send>(conn: &mut C, pattern: &str) -> RedisResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(1000)
            .query_async(conn)
            .await?;
        keys.extend(batch);
        if next == 0 {
            return Ok(keys);
        }
        cursor = next;
    }
}
