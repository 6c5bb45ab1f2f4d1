use futures::future::join_all;
use takedown_tracker::model::{PlatformPolicy, UrlStatus};
use takedown_tracker::{batches, db, tracker, TakedownError};

async fn setup_file_pool(dir: &tempfile::TempDir) -> db::Pool {
    let url = format!("sqlite://{}/takedown.db", dir.path().display());
    let pool = db::init_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_terminal_transitions_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let pool = setup_file_pool(&dir).await;
    let batch = batches::create_batch(
        &pool,
        &PlatformPolicy::default(),
        "owner-a",
        "Google",
        &["https://race.example/1"],
    )
    .await
    .unwrap();
    let url_id = tracker::list_by_batch(&pool, batch.id).await.unwrap()[0].id;
    tracker::transition(&pool, url_id, UrlStatus::Submitted)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        tracker::transition(&pool, url_id, UrlStatus::Removed),
        tracker::transition(&pool, url_id, UrlStatus::Failed),
    );

    let stored = tracker::get_url(&pool, url_id).await.unwrap();
    match (a, b) {
        (Ok(won), Err(TakedownError::InvalidTransition { from, .. }))
        | (Err(TakedownError::InvalidTransition { from, .. }), Ok(won)) => {
            assert_eq!(won.status, stored.status);
            assert_eq!(from, stored.status);
        }
        other => panic!("expected exactly one winner, got {other:?}"),
    }
    assert!(stored.status.is_terminal());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transitions_on_different_urls_do_not_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let pool = setup_file_pool(&dir).await;
    let input: Vec<String> = (0..8).map(|i| format!("https://par.example/{i}")).collect();
    let batch = batches::create_batch(
        &pool,
        &PlatformPolicy::default(),
        "owner-a",
        "Google",
        &input,
    )
    .await
    .unwrap();
    let urls = tracker::list_by_batch(&pool, batch.id).await.unwrap();

    let results = join_all(
        urls.iter()
            .map(|u| tracker::transition(&pool, u.id, UrlStatus::Submitted)),
    )
    .await;
    assert!(results.iter().all(|r| r.is_ok()));

    assert_eq!(
        batches::batch_status(&pool, batch.id).await.unwrap(),
        UrlStatus::Submitted
    );
    let stats = batches::stats(
        &pool,
        &takedown_tracker::model::StatsScope::Owner("owner-a".into()),
    )
    .await
    .unwrap();
    assert_eq!(stats.submitted, 8);
    assert_eq!(stats.total, 8);
}

#[tokio::test]
async fn file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let batch_id = {
        let pool = setup_file_pool(&dir).await;
        let batch = batches::create_batch(
            &pool,
            &PlatformPolicy::default(),
            "owner-a",
            "Other",
            &["https://keep.example/1", "https://keep.example/2"],
        )
        .await
        .unwrap();
        pool.close().await;
        batch.id
    };

    let pool = setup_file_pool(&dir).await;
    let batch = batches::get_batch(&pool, batch_id).await.unwrap();
    assert_eq!(batch.url_count, 2);
    assert_eq!(tracker::list_by_batch(&pool, batch_id).await.unwrap().len(), 2);
}
