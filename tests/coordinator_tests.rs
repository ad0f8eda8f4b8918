//! Coordinator orchestration: registration, single-flight, concurrent
//! fan-out, wait/poll semantics and health aggregation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pricewatch::application::{CoordinatorError, HealthStatus, ScrapeOutcome};
use pricewatch::domain::agent_job::JobStatus;
use tokio::sync::Mutex;

use common::{listing, CannedAgent, TestStack};

fn store_batch(store: &str) -> Vec<pricewatch::domain::listing::RawListing> {
    vec![
        listing(
            "Elite Force Avalon M4",
            "Elite Force",
            449.99,
            &format!("https://{store}/p/avalon"),
            store,
        ),
        listing(
            "Tokyo Marui Hi-Capa 5.1",
            "TM",
            164.99,
            &format!("https://{store}/p/hicapa"),
            store,
        ),
        // Dropped by validation; must not fail the run.
        listing("", "CYMA", 100.0, &format!("https://{store}/p/bad"), store),
    ]
}

#[tokio::test]
async fn unregistered_store_fails_fast() -> Result<()> {
    let coordinator = TestStack::new().await?.coordinator();
    let result = coordinator.run_scraping("nowhere.example").await;
    assert!(matches!(
        result,
        Err(CoordinatorError::NotRegistered { store }) if store == "nowhere.example"
    ));
    Ok(())
}

#[tokio::test]
async fn completed_run_records_job_and_counters() -> Result<()> {
    let coordinator = TestStack::new().await?.coordinator();
    coordinator
        .register_agent(Arc::new(CannedAgent::serving(
            "shop-a.example",
            store_batch("shop-a.example"),
        )))
        .await;

    let outcome = coordinator.run_scraping("shop-a.example").await?;
    let summary = match outcome {
        ScrapeOutcome::Completed(summary) => summary,
        ScrapeOutcome::AlreadyRunning => panic!("unexpected skip"),
    };
    assert_eq!(summary.items_processed, 2);
    assert_eq!(summary.items_new, 2);
    assert_eq!(summary.errors, 0);

    let ops = coordinator.get_operation_stats(10).await?;
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].status, JobStatus::Completed);
    assert_eq!(ops[0].items_processed, 2);
    assert_eq!(ops[0].target_store, "shop-a.example");

    // The per-store cache holds the latest summary.
    let cached = coordinator.last_result("shop-a.example").await.unwrap();
    assert_eq!(cached.job_id, summary.job_id);
    Ok(())
}

#[tokio::test]
async fn second_concurrent_run_for_same_store_is_skipped() -> Result<()> {
    let coordinator = TestStack::new().await?.coordinator();
    coordinator
        .register_agent(Arc::new(
            CannedAgent::serving("slow.example", store_batch("slow.example"))
                .with_delay(Duration::from_millis(400)),
        ))
        .await;

    let background = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run_scraping("slow.example").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = coordinator.run_scraping("slow.example").await?;
    assert!(matches!(second, ScrapeOutcome::AlreadyRunning));

    let first = background.await.unwrap()?;
    assert!(matches!(first, ScrapeOutcome::Completed(_)));

    // Only the real run produced an operation record.
    let ops = coordinator.get_operation_stats(10).await?;
    assert_eq!(ops.len(), 1);
    Ok(())
}

#[tokio::test]
async fn run_all_isolates_failing_stores() -> Result<()> {
    let coordinator = TestStack::new().await?.coordinator();
    coordinator
        .register_agent(Arc::new(CannedAgent::serving(
            "good.example",
            store_batch("good.example"),
        )))
        .await;
    coordinator
        .register_agent(Arc::new(CannedAgent::failing(
            "broken.example",
            "fetch retries exhausted",
        )))
        .await;

    let results = coordinator.run_all_scrapers().await;
    assert_eq!(results.len(), 2);

    let good = results
        .iter()
        .find(|(store, _)| store == "good.example")
        .unwrap();
    assert!(matches!(good.1, Ok(ScrapeOutcome::Completed(_))));

    let broken = results
        .iter()
        .find(|(store, _)| store == "broken.example")
        .unwrap();
    assert!(matches!(
        broken.1,
        Err(CoordinatorError::RunFailed { .. })
    ));

    // Both terminal states were recorded; the failure carries its message.
    let ops = coordinator.get_operation_stats(10).await?;
    assert_eq!(ops.len(), 2);
    let failed = ops
        .iter()
        .find(|op| op.target_store == "broken.example")
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("fetch retries exhausted"));

    // 1 of 2 operations succeeded: degraded, not critical.
    let health = coordinator.get_system_health().await?;
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.operations_in_window, 2);
    assert_eq!(health.failed_operations, 1);
    Ok(())
}

#[tokio::test]
async fn wait_for_all_operations_times_out_then_succeeds() -> Result<()> {
    let coordinator = TestStack::new().await?.coordinator();
    coordinator
        .register_agent(Arc::new(
            CannedAgent::serving("slow.example", store_batch("slow.example"))
                .with_delay(Duration::from_millis(500)),
        ))
        .await;

    let background = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run_scraping("slow.example").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let timed_out = coordinator
        .wait_for_all_operations(Duration::from_millis(100), Duration::from_millis(20))
        .await;
    assert!(matches!(
        timed_out,
        Err(CoordinatorError::WaitTimeout { still_running: 1, .. })
    ));

    coordinator
        .wait_for_all_operations(Duration::from_secs(5), Duration::from_millis(20))
        .await?;
    background.await.unwrap()?;
    Ok(())
}

#[tokio::test]
async fn health_is_unknown_with_no_operations() -> Result<()> {
    let coordinator = TestStack::new().await?.coordinator();
    let health = coordinator.get_system_health().await?;
    assert_eq!(health.status, HealthStatus::Unknown);
    assert_eq!(health.operations_in_window, 0);
    Ok(())
}

#[tokio::test]
async fn rerun_after_restock_updates_prices_without_duplicates() -> Result<()> {
    let coordinator = TestStack::new().await?.coordinator();

    let first = store_batch("shop-a.example");
    let mut second = store_batch("shop-a.example");
    second[0] = listing(
        "Elite Force Avalon M4",
        "Elite Force",
        429.99,
        "https://shop-a.example/p/avalon",
        "shop-a.example",
    );

    let agent = CannedAgent {
        agent_name: "shop-a-agent".to_string(),
        store: "shop-a.example".to_string(),
        delay: Duration::ZERO,
        batches: Mutex::new(vec![Ok(first), Ok(second)]),
    };
    coordinator.register_agent(Arc::new(agent)).await;

    let first_run = coordinator.run_scraping("shop-a.example").await?;
    let ScrapeOutcome::Completed(first_summary) = first_run else {
        panic!("unexpected skip");
    };
    assert_eq!(first_summary.items_new, 2);

    let second_run = coordinator.run_scraping("shop-a.example").await?;
    let ScrapeOutcome::Completed(second_summary) = second_run else {
        panic!("unexpected skip");
    };
    // Nothing new on the rerun; only the changed price counts as updated.
    assert_eq!(second_summary.items_new, 0);
    assert_eq!(second_summary.items_updated, 1);

    let stats = coordinator.get_database_stats().await?;
    assert_eq!(stats.total_products, 2);
    assert_eq!(stats.total_store_prices, 2);
    Ok(())
}
