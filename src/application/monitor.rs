//! Background task that periodically re-discovers queues.
use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::Pool;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use super::{discover_queues, Backoff, Board};
use crate::models::options::QueueOptions;
use crate::models::queue::QueueKind;

/// Re-scans Redis once and replaces the board's queue set with the result.
///
/// If the scan fails the previously registered queues are kept.
pub async fn refresh_once(
    board: &Board,
    pool: &Pool,
    options: &QueueOptions,
    kind: QueueKind,
    backoff: &Backoff,
) {
    debug!("Refreshing queue list");
    match discover_queues(pool, options, kind, backoff).await {
        Ok(queues) => board.replace_queues(queues),
        Err(err) => error!(
            "Queue refresh failed, keeping {} registered queue(s): {}",
            board.queues().len(),
            err
        ),
    }
}

/// Start periodic background task that calls [`refresh_once`] every `check_interval`.
///
/// Returns `None` without starting anything if the interval is zero.
pub fn start_queue_refresh(
    board: Arc<Board>,
    pool: Pool,
    options: QueueOptions,
    kind: QueueKind,
    backoff: Backoff,
    check_interval: Duration,
) -> Option<JoinHandle<()>> {
    if check_interval.is_zero() {
        warn!("Queue refresh interval is zero, not refreshing the queue list");
        return None;
    }
    info!(
        "Refreshing queue list every {}",
        humantime::format_duration(check_interval)
    );
    let handle = actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(check_interval);
        // first tick completes immediately, startup discovery has already run
        interval.tick().await;
        loop {
            interval.tick().await;
            refresh_once(&board, &pool, &options, kind, &backoff).await;
        }
    });
    Some(handle)
}
