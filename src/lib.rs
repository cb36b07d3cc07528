//! Polybot
//!
//! Telegram bot that applies photo filters on demand and hands object
//! detection to an external worker. Jobs go out through S3 and a Redis queue;
//! results come back through PostgreSQL and the `/results` callback, which
//! renders them to the chat that submitted the photo.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
