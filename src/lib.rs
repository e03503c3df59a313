//! Web dashboard for Bull and BullMQ job queues stored in Redis.

pub mod application;
pub mod config;
pub mod handlers;
pub mod models;
pub mod redis_utils;
pub mod views;
