//! Batch creation and aggregate views.
use crate::db::{self, NewBatch};
use crate::error::{Result, TakedownError};
use crate::model::{
    PlatformPolicy, RequestBatch, RequestUrl, StatsScope, StatusCounts, TargetPlatform, UrlStats,
    UrlStatus,
};
use crate::tracker;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Normalizes an owner identifier for every owner-scoped read and write.
/// Surrounding whitespace is dropped; a blank identifier is rejected.
pub fn owner_id(owner: &str) -> Result<&str> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(TakedownError::Validation("owner must be non-empty".into()));
    }
    Ok(owner)
}

/// Creates a batch and its URL rows atomically. Validation failures and
/// storage failures both leave no rows behind.
#[instrument(skip_all, fields(owner = %owner, platform = %platform))]
pub async fn create_batch<S: AsRef<str>>(
    pool: &db::Pool,
    policy: &PlatformPolicy,
    owner: &str,
    platform: &str,
    urls: &[S],
) -> Result<RequestBatch> {
    let owner = owner_id(owner)?;
    let platform = TargetPlatform::parse(platform, policy)?;

    let batch = NewBatch {
        id: Uuid::new_v4(),
        owner: owner.to_string(),
        target_platform: platform.as_str().to_string(),
        created_at: Utc::now(),
    };
    let records = tracker::create_urls(batch.id, batch.created_at, urls)?;
    db::insert_batch_with_urls(pool, &batch, &records).await?;

    info!(
        batch_id = %batch.id,
        urls = records.len(),
        suggested_platform = platform.is_suggested(),
        "created takedown batch"
    );
    Ok(RequestBatch {
        id: batch.id,
        owner: batch.owner,
        target_platform: batch.target_platform,
        url_count: records.len() as i64,
        status: UrlStatus::Pending,
        created_at: batch.created_at,
    })
}

/// Display status of a set of URLs belonging to one batch.
pub fn aggregate_status(urls: &[RequestUrl]) -> UrlStatus {
    StatusCounts::from_statuses(urls.iter().map(|u| u.status)).aggregate()
}

/// Recomputes a stored batch's status from its URLs.
#[instrument(skip_all, fields(%batch_id))]
pub async fn batch_status(pool: &db::Pool, batch_id: Uuid) -> Result<UrlStatus> {
    let counts = db::count_statuses_for_batch(pool, batch_id).await?;
    if counts.total() == 0 && db::fetch_batch(pool, batch_id).await?.is_none() {
        return Err(TakedownError::not_found("batch", batch_id));
    }
    Ok(counts.aggregate())
}

#[instrument(skip_all, fields(%batch_id))]
pub async fn get_batch(pool: &db::Pool, batch_id: Uuid) -> Result<RequestBatch> {
    db::fetch_batch(pool, batch_id)
        .await?
        .ok_or_else(|| TakedownError::not_found("batch", batch_id))
}

pub async fn stats(pool: &db::Pool, scope: &StatsScope) -> Result<UrlStats> {
    let scope = match scope {
        StatsScope::Owner(owner) => StatsScope::Owner(owner_id(owner)?.to_string()),
        StatsScope::Global => StatsScope::Global,
    };
    let counts = db::count_statuses(pool, &scope).await?;
    Ok(UrlStats::from(counts))
}

/// The owner's newest batches first, at most `limit` of them.
pub async fn recent_batches(
    pool: &db::Pool,
    owner: &str,
    limit: usize,
) -> Result<Vec<RequestBatch>> {
    let owner = owner_id(owner)?;
    if limit == 0 {
        return Ok(Vec::new());
    }
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db::list_batches_by_owner(pool, owner, limit).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_with(status: UrlStatus) -> RequestUrl {
        RequestUrl {
            id: Uuid::new_v4(),
            batch_id: Uuid::nil(),
            sequence: 1,
            url: "https://x.example".into(),
            status,
            submitted_at: None,
            removed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_id_trims_and_rejects_blank() {
        assert_eq!(owner_id("  alice\t").unwrap(), "alice");
        assert!(matches!(owner_id(" \n "), Err(TakedownError::Validation(_))));
    }

    #[test]
    fn aggregate_over_records() {
        use UrlStatus::*;
        let urls: Vec<_> = [Submitted, Submitted, Pending].into_iter().map(url_with).collect();
        assert_eq!(aggregate_status(&urls), Pending);
        let urls: Vec<_> = [Removed, Removed, Removed].into_iter().map(url_with).collect();
        assert_eq!(aggregate_status(&urls), Removed);
        let urls: Vec<_> = [Removed, Failed].into_iter().map(url_with).collect();
        assert_eq!(aggregate_status(&urls), Failed);
    }
}
