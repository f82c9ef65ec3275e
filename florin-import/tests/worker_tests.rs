//! End-to-end worker tests over an in-memory database
//!
//! Each test drives a full import job through the worker and asserts on the
//! terminal job record and the persisted transactions.

use base64::Engine;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use florin_common::events::{EventBus, ImportEvent};
use florin_common::jobs::{ImportJob, JobStatus};
use florin_import::db;
use florin_import::services::job_store::{JobStore, MemoryJobStore, SqliteJobStore};
use florin_import::services::worker::{ImportPayload, ImportWorker};

async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    db::init_tables(&pool).await.expect("Failed to init tables");
    pool
}

fn encode(csv: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(csv)
}

fn payload_for(csv: &str) -> ImportPayload {
    ImportPayload {
        job_id: Uuid::new_v4(),
        file_name: "transactions.csv".to_string(),
        csv_content: encode(csv),
        deduplicate_threshold: 60,
    }
}

async fn worker_with_bus(
    pool: &sqlx::SqlitePool,
    bus: EventBus,
) -> (ImportWorker, Arc<SqliteJobStore>) {
    let store = Arc::new(SqliteJobStore::new(pool.clone(), bus, 3600));
    let worker = ImportWorker::new(pool.clone(), store.clone());
    (worker, store)
}

async fn run_import(
    worker: &ImportWorker,
    store: &Arc<SqliteJobStore>,
    payload: &ImportPayload,
) -> florin_common::jobs::JobStats {
    store
        .insert(&ImportJob::queued(payload.job_id, payload.file_name.clone()))
        .await
        .unwrap();
    worker.run(payload).await.unwrap()
}

#[tokio::test]
async fn duplicate_and_invalid_rows_are_classified() {
    let pool = test_pool().await;
    let (worker, store) = worker_with_bus(&pool, EventBus::new(100)).await;

    let csv = "\
date,name,amount,status,category,type,account
2024-01-05,Coffee Shop,4.50,posted,,regular,Checking
2024-01-05,Coffee Shop,4.50,posted,,regular,Checking
not-a-date,Broken Row,9.99,posted,,regular,Checking
";
    let payload = payload_for(csv);
    let stats = run_import(&worker, &store, &payload).await;

    assert_eq!(stats.created, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.invalid, 1);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].starts_with("Row 4"));

    let job = store.get_status(payload.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.stats.progress, 100);
    assert!(job.started_at.is_some());
    assert!(job.ended_at.is_some());
}

#[tokio::test]
async fn counters_sum_to_total_across_all_outcomes() {
    let pool = test_pool().await;
    let (worker, store) = worker_with_bus(&pool, EventBus::new(100)).await;

    let seed = "\
date,name,amount,status,category,type,account
2024-01-05,Blue Bottle Coffee,4.50,posted,,regular,Checking
2024-01-06,AMAZON MKTPL PMTS,25.00,posted,,regular,Checking
";
    let stats = run_import(&worker, &store, &payload_for(seed)).await;
    assert_eq!(stats.created, 2);

    // Same natural keys back with a category, a fuzzy variant, one genuinely
    // new row, and one broken row
    let second = "\
date,name,amount,status,category,type,account
2024-01-05,Blue Bottle Coffee,4.50,posted,Restaurants,regular,Checking
2024-01-06,AMAZON MARKETPLACE PMTS,25.00,posted,Shopping,regular,Checking
2024-01-07,Fresh Flowers,15.00,posted,Gifts,regular,Checking
bad-date,Broken,1.00,posted,,regular,Checking
";
    let stats = run_import(&worker, &store, &payload_for(second)).await;

    assert_eq!(stats.updated, 1);
    assert_eq!(stats.merged, 1);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.invalid, 1);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.classified(), stats.total);

    // Three distinct records persisted overall; merge kept the longer name
    let account_id = db::accounts::get_or_create_account(&pool, "Checking")
        .await
        .unwrap();
    let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let to = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let persisted = db::transactions::list_account_transactions(&pool, account_id, from, to)
        .await
        .unwrap();
    assert_eq!(persisted.len(), 3);
    assert!(persisted
        .iter()
        .any(|tx| tx.description == "AMAZON MARKETPLACE PMTS"));
    assert!(persisted
        .iter()
        .any(|tx| tx.description == "Blue Bottle Coffee"
            && tx.category.as_deref() == Some("Restaurants")));
}

#[tokio::test]
async fn reimporting_the_same_file_creates_nothing() {
    let pool = test_pool().await;
    let (worker, store) = worker_with_bus(&pool, EventBus::new(100)).await;

    let csv = "\
date,name,amount,status,category,type,account
2024-02-01,Payroll,2500.00,posted,,income,Checking
2024-02-02,Grocery Store,82.17,posted,,regular,Checking
";
    let stats = run_import(&worker, &store, &payload_for(csv)).await;
    assert_eq!(stats.created, 2);

    let stats = run_import(&worker, &store, &payload_for(csv)).await;
    assert_eq!(stats.created, 0);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.total, 2);
}

#[tokio::test]
async fn invalid_rows_are_never_persisted() {
    let pool = test_pool().await;
    let (worker, store) = worker_with_bus(&pool, EventBus::new(100)).await;

    let csv = "\
date,name,amount,status,category,type,account
2024-03-01,Valid Row,10.00,posted,,regular,Checking
2024-03-02,No Amount,,posted,,regular,Checking
bad-date,Bad Date,5.00,posted,,regular,Checking
";
    let stats = run_import(&worker, &store, &payload_for(csv)).await;
    assert_eq!(stats.created, 1);
    assert_eq!(stats.invalid, 2);

    let account_id = db::accounts::get_or_create_account(&pool, "Checking")
        .await
        .unwrap();
    let count = db::transactions::count_account_transactions(&pool, account_id)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn progress_is_monotone_and_completes_at_100() {
    let pool = test_pool().await;
    let bus = EventBus::new(200);
    let mut rx = bus.subscribe();
    let (worker, store) = worker_with_bus(&pool, bus).await;

    let mut csv = String::from("date,name,amount,status,category,type,account\n");
    for day in 1..=30 {
        csv.push_str(&format!(
            "2024-04-{:02},Merchant {},{}.00,posted,,regular,Checking\n",
            day, day, day
        ));
    }
    let payload = payload_for(&csv);
    run_import(&worker, &store, &payload).await;

    let mut progresses = Vec::new();
    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ImportEvent::JobUpdated { job } = event {
            progresses.push(job.stats.progress);
            statuses.push(job.status);
        }
    }

    assert!(progresses.len() >= 2, "expected periodic progress events");
    assert!(progresses.windows(2).all(|w| w[0] <= w[1]));
    let (last, rest) = progresses.split_last().unwrap();
    assert_eq!(*last, 100);
    assert!(rest.iter().all(|p| *p < 100));
    assert_eq!(*statuses.last().unwrap(), JobStatus::Done);
}

#[tokio::test]
async fn undecodable_payload_ends_in_error_state() {
    let pool = test_pool().await;
    let (worker, store) = worker_with_bus(&pool, EventBus::new(100)).await;

    let payload = ImportPayload {
        job_id: Uuid::new_v4(),
        file_name: "broken.csv".to_string(),
        csv_content: "%%% not base64 %%%".to_string(),
        deduplicate_threshold: 60,
    };
    store
        .insert(&ImportJob::queued(payload.job_id, payload.file_name.clone()))
        .await
        .unwrap();

    assert!(worker.run(&payload).await.is_err());

    let job = store.get_status(payload.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.is_some());
    assert!(job.ended_at.is_some());
}

#[tokio::test]
async fn unreachable_store_fails_the_attempt() {
    let pool = test_pool().await;
    let store = Arc::new(MemoryJobStore::new());
    store.set_failing(true);
    let worker = ImportWorker::new(pool, store);

    let csv = "\
date,name,amount,status,category,type,account
2024-05-01,Coffee,4.50,posted,,regular,Checking
";
    let err = worker.run(&payload_for(csv)).await.unwrap_err();
    assert!(err.to_string().contains("unreachable"));
}

#[tokio::test]
async fn second_match_in_one_batch_sees_the_first_update() {
    let pool = test_pool().await;
    let (worker, store) = worker_with_bus(&pool, EventBus::new(100)).await;

    let seed = "\
date,name,amount,status,category,type,account
2024-06-01,Blue Bottle Coffee,4.50,posted,,regular,Checking
";
    run_import(&worker, &store, &payload_for(seed)).await;

    // Both rows carry the category; only the first should count as an update
    let second = "\
date,name,amount,status,category,type,account
2024-06-01,Blue Bottle Coffee,4.50,posted,Restaurants,regular,Checking
2024-06-01,Blue Bottle Coffee,4.50,posted,Restaurants,regular,Checking
";
    let stats = run_import(&worker, &store, &payload_for(second)).await;

    assert_eq!(stats.updated, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.created, 0);
}
