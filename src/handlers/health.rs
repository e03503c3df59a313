//! Defines handlers for health check HTTP endpoints.

use actix_web::{web, HttpResponse, Responder};
use log::warn;
use serde::Serialize;

use crate::models::{ApplicationState, BoardResult};
use crate::redis_utils::query_timeout;

const REDIS_DESCRIPTION: &str = "Based on the Redis PING/PONG system";

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum HealthStatus {
    Ok,
    Error,
}

#[derive(Serialize)]
struct RedisHealth {
    // only reported when Redis is up
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,

    description: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct HealthInfo {
    redis: RedisHealth,
}

#[derive(Serialize)]
struct Health {
    status: HealthStatus,
    info: HealthInfo,
}

impl Health {
    fn new_healthy() -> Self {
        Health {
            status: HealthStatus::Ok,
            info: HealthInfo {
                redis: RedisHealth {
                    status: Some("up"),
                    description: REDIS_DESCRIPTION,
                    error: None,
                },
            },
        }
    }

    fn new_from_error<S: Into<String>>(err: S) -> Self {
        Health {
            status: HealthStatus::Error,
            info: HealthInfo {
                redis: RedisHealth {
                    status: None,
                    description: REDIS_DESCRIPTION,
                    error: Some(err.into()),
                },
            },
        }
    }
}

async fn ping(data: &ApplicationState) -> BoardResult<String> {
    let mut conn = data.pool.get().await?;
    query_timeout(
        data.config.redis.command_timeout,
        redis::cmd("PING").query_async(&mut conn),
    )
    .await
}

/// Always answers 200, reporting Redis reachability in the body.
pub async fn index(data: web::Data<ApplicationState>) -> impl Responder {
    let reply = match ping(&data).await {
        Ok(s) => s,
        Err(err) => {
            warn!("Health check failed: {}", err);
            return HttpResponse::Ok().json(Health::new_from_error(err.to_string()));
        }
    };

    match reply.as_ref() {
        "PONG" => HttpResponse::Ok().json(Health::new_healthy()),
        other => HttpResponse::Ok().json(Health::new_from_error(format!(
            "unexpected PING response from Redis: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialisation() {
        let h = Health::new_healthy();
        assert_eq!(
            serde_json::to_string(&h).unwrap(),
            "{\"status\":\"ok\",\"info\":{\"redis\":{\"status\":\"up\",\"description\":\"Based on the Redis PING/PONG system\"}}}"
        );

        let h = Health::new_from_error("message");
        assert_eq!(
            serde_json::to_string(&h).unwrap(),
            "{\"status\":\"error\",\"info\":{\"redis\":{\"description\":\"Based on the Redis PING/PONG system\",\"error\":\"message\"}}}"
        );
    }
}
