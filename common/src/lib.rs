//! Shared building blocks for the workload backend.
//!
//! Configuration, the error taxonomy, wire envelopes, HTTP middleware and the
//! platform data model used by every crate in the workspace.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
