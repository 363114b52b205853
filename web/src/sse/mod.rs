//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler that accepts long-lived
//! connections. Registry, liveness and dispatch live in the `hub` crate.

pub mod handler;
