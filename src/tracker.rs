//! Per-URL takedown status tracking.
//!
//! A URL moves `pending -> submitted -> removed | failed` and never leaves a
//! terminal state. Writes are compare-and-set on the current status, so two
//! racing updates to the same URL cannot both win.

use crate::db;
use crate::error::{Result, TakedownError};
use crate::model::{RequestUrl, UrlStatus};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Splits a pasted block of URLs on line breaks, trimming each line and
/// dropping blank ones.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trims every entry and discards blanks. Duplicates are kept.
pub fn normalize_urls<S: AsRef<str>>(urls: &[S]) -> Result<Vec<String>> {
    let cleaned: Vec<String> = urls
        .iter()
        .map(|u| u.as_ref().trim())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();
    if cleaned.is_empty() {
        return Err(TakedownError::Validation(
            "at least one non-blank URL is required".into(),
        ));
    }
    Ok(cleaned)
}

/// Builds the URL records for a new batch, all `pending`, numbered 1..N in
/// submission order. Nothing is written here: the batch manager persists
/// them together with their batch.
pub fn create_urls<S: AsRef<str>>(
    batch_id: Uuid,
    created_at: DateTime<Utc>,
    urls: &[S],
) -> Result<Vec<RequestUrl>> {
    let records = normalize_urls(urls)?
        .into_iter()
        .enumerate()
        .map(|(i, url)| RequestUrl {
            id: Uuid::new_v4(),
            batch_id,
            sequence: i as i64 + 1,
            url,
            status: UrlStatus::Pending,
            submitted_at: None,
            removed_at: None,
            created_at,
        })
        .collect();
    Ok(records)
}

#[instrument(skip_all, fields(%url_id))]
pub async fn get_url(pool: &db::Pool, url_id: Uuid) -> Result<RequestUrl> {
    db::fetch_url(pool, url_id)
        .await?
        .ok_or_else(|| TakedownError::not_found("url", url_id))
}

/// Applies one status edge. Stamps `submitted_at` on `-> submitted` and
/// `removed_at` on `-> removed`.
///
/// Fails with `InvalidTransition` for an illegal edge, and also when another
/// writer changed the status between our read and our write; in that case
/// `from` reports the status now stored.
#[instrument(skip_all, fields(%url_id, %next))]
pub async fn transition(pool: &db::Pool, url_id: Uuid, next: UrlStatus) -> Result<RequestUrl> {
    let current = get_url(pool, url_id).await?;
    if !current.status.can_transition_to(next) {
        warn!(from = %current.status, to = %next, "rejected status transition");
        return Err(TakedownError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }

    let now = Utc::now();
    let submitted_at = (next == UrlStatus::Submitted).then_some(now);
    let removed_at = (next == UrlStatus::Removed).then_some(now);

    match db::compare_and_set_status(pool, url_id, current.status, next, submitted_at, removed_at)
        .await?
    {
        Some(updated) => {
            info!(
                batch_id = %updated.batch_id,
                from = %current.status,
                to = %next,
                "url status updated"
            );
            Ok(updated)
        }
        None => {
            let actual = get_url(pool, url_id).await?;
            warn!(
                expected = %current.status,
                actual = %actual.status,
                to = %next,
                "lost status race"
            );
            Err(TakedownError::InvalidTransition {
                from: actual.status,
                to: next,
            })
        }
    }
}

/// URLs of a batch in creation order. Unknown batches are `NotFound`.
#[instrument(skip_all, fields(%batch_id))]
pub async fn list_by_batch(pool: &db::Pool, batch_id: Uuid) -> Result<Vec<RequestUrl>> {
    let urls = db::list_urls_by_batch(pool, batch_id).await?;
    if urls.is_empty() && db::fetch_batch(pool, batch_id).await?.is_none() {
        return Err(TakedownError::not_found("batch", batch_id));
    }
    Ok(urls)
}
