//! # Enlist
//!
//! Same-origin gateway in front of the remote target platform, plus the bulk registration
//! orchestrator that drives it.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod server;
pub mod telemetry;
