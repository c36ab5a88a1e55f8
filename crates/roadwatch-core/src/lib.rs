//! # roadwatch-core
//!
//! Core types, traits, and abstractions for the roadwatch incident pipeline.
//!
//! This crate provides the foundational data structures (tasks, incidents,
//! captured frames) and the trait seams that the storage, inference, and job
//! crates implement.
//!
//! ## Structured logging fields
//!
//! Every crate logs through `tracing` with the same field names so the
//! pipeline can be queried end to end: `subsystem` ("db", "inference",
//! "jobs", "cli"), `component`, `op`, `job_id`, `incident_id`, `model`,
//! `attempt`, and `duration_ms`.

pub mod defaults;
pub mod error;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
