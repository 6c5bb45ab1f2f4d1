//! Bookkeeping for DMCA takedown requests: batches of infringing URLs
//! submitted against one platform, and each URL's progress toward removal.

pub mod batches;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod tracker;

pub use error::{Result, TakedownError};
