//! Write-side slices handed to the repository.
//!
//! Read paths return the domain types from `crate::model` directly.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Batch row to insert. `url_count` is taken from the URL rows written with it.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub id: Uuid,
    pub owner: String,
    pub target_platform: String,
    pub created_at: DateTime<Utc>,
}
