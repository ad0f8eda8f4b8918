//! Price reconciliation against real storage: upsert uniqueness and
//! changed-since-last-observation history.

mod common;

use anyhow::Result;
use pricewatch::application::pipeline::DataProcessingPipeline;
use pricewatch::application::reconciler::PriceChange;
use pricewatch::domain::repositories::{CatalogRepository, PriceRepository};
use sqlx::Row;

use common::{listing, TestStack};

async fn cleaned_at_price(
    stack: &TestStack,
    price: f64,
) -> pricewatch::domain::listing::CleanedListing {
    let pipeline = DataProcessingPipeline::new(stack.monitoring.clone());
    pipeline
        .process(
            vec![listing(
                "CYMA AK-47 Sportline",
                "CYMA",
                price,
                "https://shop-a.example/p/ak47",
                "shop-a",
            )],
            "shop-a",
        )
        .await
        .unwrap()
        .remove(0)
}

#[tokio::test]
async fn history_is_appended_only_on_price_change() -> Result<()> {
    let stack = TestStack::new().await?;

    let first = cleaned_at_price(&stack, 129.99).await;
    let (product_id, _, _) = stack
        .matching
        .find_or_create(&first, "shop-a", &first.url)
        .await?;

    // First observation: store price row plus one history entry.
    let change = stack
        .reconciler
        .reconcile(&product_id, &first, "shop-a")
        .await?;
    assert_eq!(change, PriceChange::New);

    // Same price again: upsert only, no history growth.
    let change = stack
        .reconciler
        .reconcile(&product_id, &first, "shop-a")
        .await?;
    assert_eq!(change, PriceChange::Unchanged);
    assert_eq!(stack.prices.history(&product_id, "shop-a", 10).await?.len(), 1);

    // Changed price: history grows by one.
    let second = cleaned_at_price(&stack, 119.99).await;
    let change = stack
        .reconciler
        .reconcile(&product_id, &second, "shop-a")
        .await?;
    assert_eq!(change, PriceChange::Changed { previous: 129.99 });

    let history = stack.prices.history(&product_id, "shop-a", 10).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].price, 119.99);

    // Still exactly one store_prices row for the pair.
    let rows: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM store_prices WHERE product_id = ? AND store_id = 'shop-a'",
    )
    .bind(&product_id)
    .fetch_one(&stack.pool)
    .await?
    .get("n");
    assert_eq!(rows, 1);

    let current = stack
        .prices
        .get_store_price(&product_id, "shop-a")
        .await?
        .unwrap();
    assert_eq!(current.price, 119.99);
    Ok(())
}

#[tokio::test]
async fn stores_track_independent_histories() -> Result<()> {
    let stack = TestStack::new().await?;

    let base = cleaned_at_price(&stack, 129.99).await;
    let (product_id, _, _) = stack
        .matching
        .find_or_create(&base, "shop-a", &base.url)
        .await?;

    stack
        .reconciler
        .reconcile(&product_id, &base, "shop-a")
        .await?;
    stack
        .reconciler
        .reconcile(&product_id, &base, "shop-b")
        .await?;

    assert_eq!(stack.prices.history(&product_id, "shop-a", 10).await?.len(), 1);
    assert_eq!(stack.prices.history(&product_id, "shop-b", 10).await?.len(), 1);

    // A change at one store leaves the other store's history alone.
    let bumped = cleaned_at_price(&stack, 139.99).await;
    stack
        .reconciler
        .reconcile(&product_id, &bumped, "shop-b")
        .await?;
    assert_eq!(stack.prices.history(&product_id, "shop-a", 10).await?.len(), 1);
    assert_eq!(stack.prices.history(&product_id, "shop-b", 10).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn recompute_price_range_tracks_store_prices() -> Result<()> {
    let stack = TestStack::new().await?;

    let base = cleaned_at_price(&stack, 129.99).await;
    let (product_id, _, _) = stack
        .matching
        .find_or_create(&base, "shop-a", &base.url)
        .await?;
    stack
        .reconciler
        .reconcile(&product_id, &base, "shop-a")
        .await?;

    let cheaper = cleaned_at_price(&stack, 99.0).await;
    stack
        .reconciler
        .reconcile(&product_id, &cheaper, "shop-b")
        .await?;

    // Reconcile itself must not widen the product range.
    let before = stack.catalog.find_product(&product_id).await?.unwrap();
    assert_eq!(before.lowest_price, 129.99);

    stack.catalog.recompute_price_range(&product_id).await?;
    let after = stack.catalog.find_product(&product_id).await?.unwrap();
    assert_eq!(after.lowest_price, 99.0);
    assert_eq!(after.highest_price, 129.99);
    Ok(())
}
