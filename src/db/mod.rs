//! Persistence for takedown batches and URLs.
//!
//! - `model`: row slices written by the batch manager.
//! - `repo`: SQL-only functions that map rows into domain types.
//!
//! Callers import from `takedown_tracker::db`; the repository API is
//! re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::NewBatch;
