//! HTTP handlers for the dashboard pages and their JSON API.

use std::str::FromStr;

use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use log::error;
use serde::Deserialize;

use super::auth::CurrentUser;
use crate::models::queue::{JobState, JobSummary};
use crate::models::{ApplicationState, BoardError, BoardResult};

const DEFAULT_PAGE_SIZE: isize = 50;

#[derive(Deserialize)]
pub struct JobsQuery {
    state: Option<String>,
    start: Option<isize>,
    end: Option<isize>,
}

impl JobsQuery {
    fn state(&self) -> BoardResult<JobState> {
        match &self.state {
            Some(s) => JobState::from_str(s).map_err(|_| BoardError::bad_request(format!("Invalid job state: {}", s))),
            None => Ok(JobState::Waiting),
        }
    }

    fn range(&self) -> (isize, isize) {
        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or_else(|| start.saturating_add(DEFAULT_PAGE_SIZE - 1));
        (start, end)
    }
}

fn logout_page(data: &ApplicationState) -> Option<&str> {
    if data.auth_enabled() {
        Some(&data.config.server.logout_page)
    } else {
        None
    }
}

/// Wraps a rendered page in a response, or a 500 if rendering failed.
pub(super) fn html(page: BoardResult<String>) -> HttpResponse {
    match page {
        Ok(body) => HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body),
        Err(err) => {
            error!("Failed to render page: {}", err);
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}

fn error_response(queue_name: &str, err: BoardError) -> HttpResponse {
    match err {
        BoardError::NoSuchQueue(_) => HttpResponse::NotFound().body(err.to_string()),
        BoardError::BadRequest(msg) => HttpResponse::BadRequest().body(msg),
        BoardError::RedisConnection(msg) => {
            error!("[queue:{}] failed to fetch jobs: {}", queue_name, msg);
            HttpResponse::ServiceUnavailable().body(msg)
        }
        err => {
            error!("[queue:{}] failed to fetch jobs: {}", queue_name, err);
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}

async fn fetch_jobs(
    data: &ApplicationState,
    queue_name: &str,
    query: &JobsQuery,
) -> BoardResult<(Vec<JobState>, JobState, Vec<JobSummary>)> {
    let queue = data.board.queue(queue_name)?;
    let state = query.state()?;
    let (start, end) = query.range();
    let mut conn = data.pool.get().await?;
    let jobs = data.board.jobs(&mut conn, queue.as_ref(), state, start, end).await?;
    Ok((queue.states().to_vec(), state, jobs))
}

/// Handles `GET {home}`, rendering the queue overview.
pub async fn index(_user: CurrentUser, data: web::Data<ApplicationState>) -> impl Responder {
    let summaries = data.board.summaries(&data.pool).await;
    html(data.views.dashboard(
        &data.config.ui,
        &data.config.server.home_page,
        logout_page(&data),
        &summaries,
        Utc::now(),
    ))
}

/// Handles `GET {home}/queues/{queue_name}`, rendering jobs in one state of a queue.
pub async fn queue_page(
    _user: CurrentUser,
    path: web::Path<String>,
    query: web::Query<JobsQuery>,
    data: web::Data<ApplicationState>,
) -> impl Responder {
    let queue_name = path.into_inner();
    match fetch_jobs(&data, &queue_name, &query).await {
        Ok((states, state, jobs)) => html(data.views.queue(
            &data.config.ui,
            &data.config.server.home_page,
            logout_page(&data),
            &queue_name,
            &states,
            state,
            &jobs,
            Utc::now(),
        )),
        Err(err) => error_response(&queue_name, err),
    }
}

/// Handles `GET {home}/api/queues`.
///
/// # Returns
///
/// * 200 - JSON list of queues with their job counts. Queues that couldn't be read carry an
///   `error` field instead of counts.
pub async fn api_queues(_user: CurrentUser, data: web::Data<ApplicationState>) -> impl Responder {
    HttpResponse::Ok().json(data.board.summaries(&data.pool).await)
}

/// Handles `GET {home}/api/queues/{queue_name}`.
///
/// # Returns
///
/// * 200 - JSON summary of the queue
/// * 404 - queue not registered
/// * 503 - unable to read the queue from Redis
pub async fn api_queue(
    _user: CurrentUser,
    path: web::Path<String>,
    data: web::Data<ApplicationState>,
) -> impl Responder {
    let queue_name = path.into_inner();
    let queue = match data.board.queue(&queue_name) {
        Ok(queue) => queue,
        Err(err) => return error_response(&queue_name, err),
    };

    let summary = data.board.summary(&data.pool, queue.as_ref()).await;
    if summary.counts.is_some() {
        HttpResponse::Ok().json(summary)
    } else {
        HttpResponse::ServiceUnavailable().json(summary)
    }
}

/// Handles `GET {home}/api/queues/{queue_name}/jobs?state=&start=&end=`.
///
/// # Returns
///
/// * 200 - JSON list of jobs
/// * 400 - unknown state, or a state this kind of queue doesn't have
/// * 404 - queue not registered
/// * 503 - unable to read the queue from Redis
pub async fn api_jobs(
    _user: CurrentUser,
    path: web::Path<String>,
    query: web::Query<JobsQuery>,
    data: web::Data<ApplicationState>,
) -> impl Responder {
    let queue_name = path.into_inner();
    match fetch_jobs(&data, &queue_name, &query).await {
        Ok((_, _, jobs)) => HttpResponse::Ok().json(jobs),
        Err(err) => error_response(&queue_name, err),
    }
}
