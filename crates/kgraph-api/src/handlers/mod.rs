//! HTTP handlers for kgraph-api.

pub mod system;
pub mod topics;
