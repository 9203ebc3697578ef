//! # kgraph-core
//!
//! Core types, traits, and abstractions for the kgraph topic store.
//!
//! This crate provides the topic data model, input validation, field
//! projection and the [`TopicRepository`] trait that every store backend
//! implements.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod projection;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use projection::FieldSelection;
pub use traits::*;
