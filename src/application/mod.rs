//! Main application logic: connecting to Redis, discovering queues and serving their state.

pub mod adapter;
pub mod auth;
mod backoff;
mod board;
pub mod connection;
mod discovery;
mod monitor;

pub use self::adapter::{adapter_for, BullAdapter, BullMqAdapter, QueueAdapter};
pub use self::auth::{CredentialVerifier, SessionStore, StaticCredentials, User};
pub use self::backoff::Backoff;
pub use self::board::Board;
pub use self::discovery::{build_queues, discover_queues, queue_names_from_keys};
pub use self::monitor::{refresh_once, start_queue_refresh};
