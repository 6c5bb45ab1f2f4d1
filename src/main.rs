use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use takedown_tracker::model::{RequestBatch, RequestUrl, StatsScope, UrlStatus};
use takedown_tracker::{batches, config, db, tracker};
use tokio::io::AsyncReadExt;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(author, version, about = "Track DMCA takedown batches and per-URL status")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Authenticated owner identifier
    #[arg(long, env = "TAKEDOWN_OWNER")]
    owner: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a batch of URLs found on one platform
    Submit {
        #[arg(long)]
        platform: String,
        /// Read newline-separated URLs from a file ("-" for stdin)
        #[arg(long)]
        file: Option<PathBuf>,
        urls: Vec<String>,
    },
    /// List the owner's most recent batches
    Batches {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one batch and its URLs
    Show { batch_id: Uuid },
    /// Record the outcome of a takedown step for one URL
    Mark { url_id: Uuid, status: UrlStatus },
    /// URL counts by status
    Stats {
        /// Count across all owners
        #[arg(long)]
        all: bool,
    },
    /// List suggested target platforms
    Platforms,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    match args.command {
        Command::Submit {
            platform,
            file,
            urls,
        } => {
            let owner = require_owner(&args.owner)?;
            let mut all = urls;
            if let Some(path) = file {
                let text = if path.as_os_str() == "-" {
                    let mut buf = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut buf)
                        .await
                        .context("failed to read stdin")?;
                    buf
                } else {
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?
                };
                all.extend(tracker::parse_url_list(&text));
            }
            let pool = open_pool(&cfg).await?;
            let batch =
                batches::create_batch(&pool, &cfg.platform_policy(), owner, &platform, &all)
                    .await?;
            info!(batch_id = %batch.id, "batch submitted");
            emit(args.json, &batch, print_batch)?;
        }
        Command::Batches { limit } => {
            let owner = require_owner(&args.owner)?;
            let limit = limit.unwrap_or(cfg.app.recent_limit);
            let pool = open_pool(&cfg).await?;
            let list = batches::recent_batches(&pool, owner, limit).await?;
            emit(args.json, &list, |list| list.iter().for_each(print_batch))?;
        }
        Command::Show { batch_id } => {
            let pool = open_pool(&cfg).await?;
            let batch = batches::get_batch(&pool, batch_id).await?;
            let urls = tracker::list_by_batch(&pool, batch_id).await?;
            let view = BatchDetail { batch, urls };
            emit(args.json, &view, |v| {
                print_batch(&v.batch);
                v.urls.iter().for_each(print_url);
            })?;
        }
        Command::Mark { url_id, status } => {
            let pool = open_pool(&cfg).await?;
            let url = tracker::transition(&pool, url_id, status).await?;
            emit(args.json, &url, print_url)?;
        }
        Command::Stats { all } => {
            let scope = if all {
                StatsScope::Global
            } else {
                StatsScope::Owner(require_owner(&args.owner)?.to_string())
            };
            let pool = open_pool(&cfg).await?;
            let stats = batches::stats(&pool, &scope).await?;
            emit(args.json, &stats, |s| {
                println!(
                    "total={} pending={} submitted={} removed={} failed={}",
                    s.total, s.pending, s.submitted, s.removed, s.failed
                );
            })?;
        }
        Command::Platforms => {
            for p in &cfg.platforms.suggested {
                println!("{p}");
            }
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct BatchDetail {
    #[serde(flatten)]
    batch: RequestBatch,
    urls: Vec<RequestUrl>,
}

async fn open_pool(cfg: &config::Config) -> Result<db::Pool> {
    cfg.ensure_dirs()?;
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

fn require_owner(owner: &Option<String>) -> Result<&str> {
    let owner = owner
        .as_deref()
        .context("an owner is required (--owner or TAKEDOWN_OWNER)")?;
    Ok(batches::owner_id(owner)?)
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn print_batch(b: &RequestBatch) {
    println!(
        "{}  {}  {:<10} {:>3} urls  {}",
        b.id,
        b.created_at.format("%Y-%m-%d %H:%M"),
        b.status,
        b.url_count,
        b.target_platform
    );
}

fn print_url(u: &RequestUrl) {
    println!("  {:>3}. {}  {:<10} {}", u.sequence, u.id, u.status, u.url);
}
