//! streamgate-server: the HTTP side of the gateway.
//!
//! Exposes the router builder so the binary and the integration tests share
//! one wiring of config, state and middleware.

pub mod chat;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod state;
