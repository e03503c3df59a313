//! Defines basic error and result types used throughout the application.

use std::{error::Error, fmt};

use redis::RedisError;

/// Result type used throughout the application.
pub type BoardResult<T> = Result<T, BoardError>;

/// Error type used throughout the application.
#[derive(Debug)]
pub enum BoardError {
    /// Error occurred during interaction with Redis.
    Redis(RedisError),

    /// Error occurred while trying to get a pooled connection to Redis, or a command timed out.
    RedisConnection(String),

    /// Configuration value was missing or could not be parsed.
    Config(String),

    /// Operation attempted on a queue that isn't registered with the dashboard.
    NoSuchQueue(String),

    /// Could not complete request with given parameters.
    BadRequest(String),

    /// Internal application error.
    Internal(String),
}

impl BoardError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        BoardError::BadRequest(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        BoardError::Config(msg.into())
    }
}

impl From<RedisError> for BoardError {
    fn from(err: RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            BoardError::RedisConnection(err.to_string())
        } else {
            BoardError::Redis(err)
        }
    }
}

impl From<deadpool_redis::PoolError> for BoardError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        BoardError::RedisConnection(err.to_string())
    }
}

/// Template errors wrap their cause, which carries the useful part of the message.
impl From<tera::Error> for BoardError {
    fn from(err: tera::Error) -> Self {
        let mut msg = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = cause.source();
        }
        BoardError::Internal(msg)
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoardError::Redis(err) => err.fmt(f),
            BoardError::RedisConnection(msg) => write!(f, "Failed to connect to Redis: {}", msg),
            BoardError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            BoardError::NoSuchQueue(queue) => write!(f, "Queue '{}' does not exist", queue),
            BoardError::BadRequest(msg) | BoardError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BoardError::Redis(err) => Some(err),
            _ => None,
        }
    }
}
