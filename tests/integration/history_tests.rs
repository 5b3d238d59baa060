// History store properties: idempotency, ordering, stability, cascade.

use super::*;

use chrono::DateTime;
use el_price_watcher::models::{FailureKind, FetchOutcome, FetchResult, NewProduct, Store};

#[tokio::test]
async fn test_recording_same_attempt_twice_stores_one_row() -> anyhow::Result<()> {
    let db = test_db().await;
    let product = add_product(&db, "https://www.x-kom.pl/p/1.html", Store::XKom, Some("GPU")).await;

    let outcome = price_outcome(&product.id, 1_700_000_000, 199_900);
    db.record(&outcome).await?;
    db.record(&outcome).await?;
    db.record(&outcome).await?;

    assert_eq!(db.series_for(&product.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_same_second_failure_does_not_duplicate_attempt() -> anyhow::Result<()> {
    // Identical attempt key with a different payload still collapses to the
    // first write; history is append-only, never overwritten.
    let db = test_db().await;
    let product = add_product(&db, "https://www.x-kom.pl/p/1.html", Store::XKom, Some("GPU")).await;

    let ts = DateTime::from_timestamp(1_700_000_000, 0).expect("ts");
    db.record(&price_outcome(&product.id, 1_700_000_000, 199_900))
        .await?;
    db.record(&FetchOutcome::failure(
        &product.id,
        ts,
        FailureKind::Network,
        "late duplicate",
    ))
    .await?;

    let series = db.series_for(&product.id).await?;
    assert_eq!(series.len(), 1);
    assert!(series[0].is_success());
    Ok(())
}

#[tokio::test]
async fn test_series_strictly_ascending_for_all_products() -> anyhow::Result<()> {
    let db = test_db().await;
    let a = add_product(&db, "https://www.x-kom.pl/p/1.html", Store::XKom, Some("A")).await;
    let b = add_product(&db, "https://www.morele.net/p-2/", Store::Morele, Some("B")).await;

    // Interleaved, out-of-order writes for two products.
    for (product, ts) in [
        (&a, 1_700_000_500i64),
        (&b, 1_700_000_300),
        (&a, 1_700_000_100),
        (&b, 1_700_000_600),
        (&a, 1_700_000_300),
    ] {
        db.record(&price_outcome(&product.id, ts, 10_000)).await?;
    }

    for product in [&a, &b] {
        let series = db.series_for(&product.id).await?;
        let timestamps: Vec<i64> = series.iter().map(|o| o.attempt_ts()).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_unstable();
        assert_eq!(timestamps, sorted, "series must ascend for {}", product.name);
        assert!(series.iter().all(|o| o.product_id == product.id));
    }
    Ok(())
}

#[tokio::test]
async fn test_series_stable_across_repeated_reads() -> anyhow::Result<()> {
    let db = test_db().await;
    let product = add_product(&db, "https://www.x-kom.pl/p/1.html", Store::XKom, Some("GPU")).await;

    for ts in [1_700_000_100i64, 1_700_000_200, 1_700_000_300] {
        db.record(&price_outcome(&product.id, ts, 10_000)).await?;
    }

    let first = db.series_for(&product.id).await?;
    let second = db.series_for(&product.id).await?;
    let third = db.series_for(&product.id).await?;
    assert_eq!(first, second);
    assert_eq!(second, third);
    Ok(())
}

#[tokio::test]
async fn test_range_query_for_charting() -> anyhow::Result<()> {
    let db = test_db().await;
    let product = add_product(&db, "https://www.x-kom.pl/p/1.html", Store::XKom, Some("GPU")).await;

    for hour in 0..24i64 {
        db.record(&price_outcome(&product.id, 1_700_000_000 + hour * 3600, 200_000 - hour * 100))
            .await?;
    }

    let from = DateTime::from_timestamp(1_700_000_000 + 6 * 3600, 0).expect("ts");
    let to = DateTime::from_timestamp(1_700_000_000 + 12 * 3600, 0).expect("ts");
    let window = db.series_between(&product.id, from, to).await?;

    assert_eq!(window.len(), 7);
    assert!(window.iter().all(|o| {
        let ts = o.ts;
        ts >= from && ts <= to
    }));
    Ok(())
}

#[tokio::test]
async fn test_failure_rows_are_part_of_history() -> anyhow::Result<()> {
    // Failures surface as history rows, exactly like prices.
    let db = test_db().await;
    let product = add_product(&db, "https://www.x-kom.pl/p/1.html", Store::XKom, Some("GPU")).await;

    db.record(&price_outcome(&product.id, 1_700_000_100, 199_900))
        .await?;
    db.record(&FetchOutcome::failure(
        &product.id,
        DateTime::from_timestamp(1_700_000_200, 0).expect("ts"),
        FailureKind::Blocked,
        "blocked (HTTP 403)",
    ))
    .await?;

    let series = db.series_for(&product.id).await?;
    assert_eq!(series.len(), 2);
    assert!(series[0].is_success());
    assert!(matches!(
        series[1].result,
        FetchResult::Failure {
            kind: FailureKind::Blocked,
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_cascade_delete_on_product_removal() -> anyhow::Result<()> {
    let db = test_db().await;
    let keep = add_product(&db, "https://www.x-kom.pl/p/1.html", Store::XKom, Some("Keep")).await;
    let drop = add_product(&db, "https://www.x-kom.pl/p/2.html", Store::XKom, Some("Drop")).await;

    db.record(&price_outcome(&keep.id, 1_700_000_100, 10_000))
        .await?;
    db.record(&price_outcome(&drop.id, 1_700_000_100, 20_000))
        .await?;

    db.remove_product(&drop.id).await?;

    assert_eq!(db.series_for(&keep.id).await?.len(), 1);
    assert!(db.series_for(&drop.id).await?.is_empty());
    assert_eq!(db.all_outcomes().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_latest_all_reflects_most_recent_write() -> anyhow::Result<()> {
    let db = test_db().await;
    let a = add_product(&db, "https://www.x-kom.pl/p/1.html", Store::XKom, Some("A")).await;
    let b = add_product(&db, "https://www.morele.net/p-2/", Store::Morele, Some("B")).await;

    db.record(&price_outcome(&a.id, 1_700_000_100, 10_000)).await?;
    db.record(&price_outcome(&a.id, 1_700_000_200, 11_000)).await?;
    db.record(&price_outcome(&b.id, 1_700_000_150, 20_000)).await?;

    let latest = db.latest_all().await?;
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[&a.id].attempt_ts(), 1_700_000_200);
    assert_eq!(latest[&b.id].attempt_ts(), 1_700_000_150);

    // Reads stay consistent with the most recent committed write.
    db.record(&price_outcome(&b.id, 1_700_000_900, 21_000)).await?;
    let latest = db.latest_all().await?;
    assert_eq!(latest[&b.id].attempt_ts(), 1_700_000_900);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_writers_never_corrupt_history() -> anyhow::Result<()> {
    // Writes from many tasks against distinct products: every row lands,
    // every series stays ordered.
    use tempfile::tempdir;
    use el_price_watcher::config::DatabaseConfig;
    use el_price_watcher::db::Database;

    let dir = tempdir()?;
    let config = DatabaseConfig {
        path: dir.path().join("w.sqlite3").to_string_lossy().into_owned(),
        max_connections: 4,
    };
    let db = Database::connect(&config).await?;

    let mut products = Vec::new();
    for i in 0..4 {
        products.push(
            db.add_product(NewProduct {
                url: format!("https://www.x-kom.pl/p/{i}.html"),
                name: Some(format!("P{i}")),
                store: None,
            })
            .await?,
        );
    }

    let mut handles = Vec::new();
    for product in &products {
        let db = db.clone();
        let id = product.id.clone();
        handles.push(tokio::spawn(async move {
            for step in 0..10i64 {
                db.record(&price_outcome(&id, 1_700_000_000 + step, 10_000 + step))
                    .await
                    .expect("record");
            }
        }));
    }
    for handle in handles {
        handle.await?;
    }

    for product in &products {
        let series = db.series_for(&product.id).await?;
        assert_eq!(series.len(), 10);
        let timestamps: Vec<i64> = series.iter().map(|o| o.attempt_ts()).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_unstable();
        assert_eq!(timestamps, sorted);
    }
    Ok(())
}
