//! Core plumbing shared by every aimem subsystem: store location, SQLite
//! access through the broker, schemas, configuration and time helpers.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod output;
pub mod schemas;
pub mod store;
pub mod time;
