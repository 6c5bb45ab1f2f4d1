use super::model::NewBatch;
use crate::error::{Result, TakedownError};
use crate::model::{RequestBatch, RequestUrl, StatsScope, StatusCounts, UrlStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

// Batch status is never stored; every batch read carries its URL counts.
const BATCH_SELECT: &str = "SELECT b.id, b.owner, b.target_platform, b.url_count, b.created_at, \
            COALESCE(SUM(u.status = 'pending'), 0) AS n_pending, \
            COALESCE(SUM(u.status = 'submitted'), 0) AS n_submitted, \
            COALESCE(SUM(u.status = 'removed'), 0) AS n_removed, \
            COALESCE(SUM(u.status = 'failed'), 0) AS n_failed \
     FROM request_batches b \
     LEFT JOIN request_urls u ON u.batch_id = b.id";

const URL_COLUMNS: &str =
    "id, batch_id, sequence, url, status, submitted_at, removed_at, created_at";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn decode_err(column: &str, value: &str) -> TakedownError {
    TakedownError::Persistence(sqlx::Error::Decode(
        format!("column {column} holds unexpected value '{value}'").into(),
    ))
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|_| decode_err(column, &raw))
}

fn get_status(row: &SqliteRow, column: &str) -> Result<UrlStatus> {
    let raw: String = row.try_get(column)?;
    UrlStatus::parse_status(&raw).ok_or_else(|| decode_err(column, &raw))
}

fn batch_from_row(row: &SqliteRow) -> Result<RequestBatch> {
    let counts = StatusCounts {
        pending: row.try_get("n_pending")?,
        submitted: row.try_get("n_submitted")?,
        removed: row.try_get("n_removed")?,
        failed: row.try_get("n_failed")?,
    };
    Ok(RequestBatch {
        id: get_uuid(row, "id")?,
        owner: row.try_get("owner")?,
        target_platform: row.try_get("target_platform")?,
        url_count: row.try_get("url_count")?,
        status: counts.aggregate(),
        created_at: row.try_get("created_at")?,
    })
}

fn url_from_row(row: &SqliteRow) -> Result<RequestUrl> {
    Ok(RequestUrl {
        id: get_uuid(row, "id")?,
        batch_id: get_uuid(row, "batch_id")?,
        sequence: row.try_get("sequence")?,
        url: row.try_get("url")?,
        status: get_status(row, "status")?,
        submitted_at: row.try_get::<Option<DateTime<Utc>>, _>("submitted_at")?,
        removed_at: row.try_get::<Option<DateTime<Utc>>, _>("removed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Inserts the batch row and all of its URL rows in one transaction.
/// `url_count` is written as `urls.len()`.
#[instrument(skip_all, fields(batch_id = %batch.id, urls = urls.len()))]
pub async fn insert_batch_with_urls(
    pool: &Pool,
    batch: &NewBatch,
    urls: &[RequestUrl],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO request_batches (id, owner, target_platform, url_count, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(batch.id.to_string())
    .bind(&batch.owner)
    .bind(&batch.target_platform)
    .bind(urls.len() as i64)
    .bind(batch.created_at)
    .execute(&mut *tx)
    .await?;

    for url in urls {
        insert_url_tx(&mut tx, url).await?;
    }

    // Dropping `tx` on an early return above rolls the batch row back.
    tx.commit().await?;
    Ok(())
}

async fn insert_url_tx(tx: &mut Transaction<'_, Sqlite>, url: &RequestUrl) -> Result<()> {
    sqlx::query(
        "INSERT INTO request_urls \
             (id, batch_id, sequence, url, status, submitted_at, removed_at, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(url.id.to_string())
    .bind(url.batch_id.to_string())
    .bind(url.sequence)
    .bind(&url.url)
    .bind(url.status.as_str())
    .bind(url.submitted_at)
    .bind(url.removed_at)
    .bind(url.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[instrument(skip_all, fields(%batch_id))]
pub async fn fetch_batch(pool: &Pool, batch_id: Uuid) -> Result<Option<RequestBatch>> {
    let sql = format!("{BATCH_SELECT} WHERE b.id = ? GROUP BY b.id");
    let row = sqlx::query(&sql)
        .bind(batch_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(batch_from_row).transpose()
}

/// Newest first; ties on `created_at` fall back to insertion order.
#[instrument(skip_all, fields(owner = %owner, limit))]
pub async fn list_batches_by_owner(
    pool: &Pool,
    owner: &str,
    limit: i64,
) -> Result<Vec<RequestBatch>> {
    let sql = format!(
        "{BATCH_SELECT} WHERE b.owner = ? GROUP BY b.id \
         ORDER BY julianday(b.created_at) DESC, b.rowid DESC LIMIT ?"
    );
    let rows = sqlx::query(&sql)
        .bind(owner)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    rows.iter().map(batch_from_row).collect()
}

#[instrument(skip_all, fields(%url_id))]
pub async fn fetch_url(pool: &Pool, url_id: Uuid) -> Result<Option<RequestUrl>> {
    let sql = format!("SELECT {URL_COLUMNS} FROM request_urls WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(url_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(url_from_row).transpose()
}

#[instrument(skip_all, fields(%batch_id))]
pub async fn list_urls_by_batch(pool: &Pool, batch_id: Uuid) -> Result<Vec<RequestUrl>> {
    let sql = format!(
        "SELECT {URL_COLUMNS} FROM request_urls WHERE batch_id = ? \
         ORDER BY julianday(created_at) ASC, sequence ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(batch_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(url_from_row).collect()
}

#[instrument(skip_all, fields(?scope))]
pub async fn count_statuses(pool: &Pool, scope: &StatsScope) -> Result<StatusCounts> {
    let rows = match scope {
        StatsScope::Owner(owner) => {
            sqlx::query(
                "SELECT u.status, COUNT(*) AS n FROM request_urls u \
                 JOIN request_batches b ON b.id = u.batch_id \
                 WHERE b.owner = ? GROUP BY u.status",
            )
            .bind(owner)
            .fetch_all(pool)
            .await?
        }
        StatsScope::Global => {
            sqlx::query("SELECT status, COUNT(*) AS n FROM request_urls GROUP BY status")
                .fetch_all(pool)
                .await?
        }
    };

    let mut counts = StatusCounts::default();
    for row in &rows {
        let status = get_status(row, "status")?;
        let n: i64 = row.try_get("n")?;
        counts.add(status, n);
    }
    Ok(counts)
}

#[instrument(skip_all, fields(%batch_id))]
pub async fn count_statuses_for_batch(pool: &Pool, batch_id: Uuid) -> Result<StatusCounts> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM request_urls WHERE batch_id = ? GROUP BY status",
    )
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;
    let mut counts = StatusCounts::default();
    for row in &rows {
        counts.add(get_status(row, "status")?, row.try_get("n")?);
    }
    Ok(counts)
}

/// Moves a URL from `expected` to `next` only if it is still in `expected`.
/// Timestamps passed as `None` leave the stored column untouched.
/// Returns `None` when the row is missing or its status has moved on.
#[instrument(skip_all, fields(%url_id, %expected, %next))]
pub async fn compare_and_set_status(
    pool: &Pool,
    url_id: Uuid,
    expected: UrlStatus,
    next: UrlStatus,
    submitted_at: Option<DateTime<Utc>>,
    removed_at: Option<DateTime<Utc>>,
) -> Result<Option<RequestUrl>> {
    let sql = format!(
        "UPDATE request_urls SET status = ?, \
             submitted_at = COALESCE(?, submitted_at), \
             removed_at = COALESCE(?, removed_at) \
         WHERE id = ? AND status = ? \
         RETURNING {URL_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(next.as_str())
        .bind(submitted_at)
        .bind(removed_at)
        .bind(url_id.to_string())
        .bind(expected.as_str())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(url_from_row).transpose()
}
