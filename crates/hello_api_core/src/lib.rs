//! Provider-free primitives for the Hello API demo deployment.
//!
//! This crate owns the deployment state model, the names and URLs derived
//! from it, and the route scope semantics. It intentionally excludes AWS SDK
//! and HTTP client concerns so every binary can share it.

pub mod naming;
pub mod scopes;
pub mod state;
