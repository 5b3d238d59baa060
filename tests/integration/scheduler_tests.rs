// Scheduler properties: one outcome per product per cycle, per-product
// failure isolation, interruptible continuous mode, state transitions.

use super::*;

use std::time::Duration;

use el_price_watcher::models::{FailureKind, FetchResult, Store};
use el_price_watcher::scheduler::{PollScheduler, SchedulerState, stop_channel};

#[tokio::test]
async fn test_cycle_records_exactly_one_outcome_per_product() -> anyhow::Result<()> {
    let server = serve_page(PRODUCT_PAGE_1999_PLN).await;
    let db = test_db().await;

    let mut products = Vec::new();
    for i in 0..5 {
        products.push(
            add_product(
                &db,
                &format!("{}/p/{i}.html", server.uri()),
                Store::XKom,
                Some(&format!("P{i}")),
            )
            .await,
        );
    }

    let scheduler = PollScheduler::new(db.clone(), test_pipeline(5), scheduler_config(2));
    let report = scheduler.run_once().await?;

    assert_eq!(report.total, 5);
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.failed, 0);
    for product in &products {
        assert_eq!(
            db.series_for(&product.id).await?.len(),
            1,
            "exactly one outcome for {}",
            product.name
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_one_failing_product_does_not_abort_the_cycle() -> anyhow::Result<()> {
    // Five products; the third points at a dead port. The other four must
    // still get their outcomes, and the third gets a failure row.
    let server = serve_page(PRODUCT_PAGE_1999_PLN).await;
    let db = test_db().await;

    let mut products = Vec::new();
    for i in 0..5 {
        let url = if i == 2 {
            "http://127.0.0.1:1/p/dead.html".to_string()
        } else {
            format!("{}/p/{i}.html", server.uri())
        };
        products.push(add_product(&db, &url, Store::XKom, Some(&format!("P{i}"))).await);
    }

    let scheduler = PollScheduler::new(db.clone(), test_pipeline(2), scheduler_config(2));
    let report = scheduler.run_once().await?;

    assert_eq!(report.total, 5);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);

    for (i, product) in products.iter().enumerate() {
        let series = db.series_for(&product.id).await?;
        assert_eq!(series.len(), 1, "outcome missing for {}", product.name);
        if i == 2 {
            assert!(matches!(
                series[0].result,
                FetchResult::Failure {
                    kind: FailureKind::Network | FailureKind::Timeout,
                    ..
                }
            ));
        } else {
            assert!(series[0].is_success());
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_repeated_cycles_append_to_history() -> anyhow::Result<()> {
    let server = serve_page(PRODUCT_PAGE_1999_PLN).await;
    let db = test_db().await;
    let product = add_product(&db, &page_url(&server), Store::XKom, Some("GPU")).await;

    let scheduler = PollScheduler::new(db.clone(), test_pipeline(5), scheduler_config(1));

    scheduler.run_once().await?;
    // Attempts are keyed by unix second; a later cycle needs a later key.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    scheduler.run_once().await?;

    let series = db.series_for(&product.id).await?;
    assert_eq!(series.len(), 2);
    assert!(series[0].attempt_ts() < series[1].attempt_ts());
    Ok(())
}

#[tokio::test]
async fn test_run_once_returns_to_idle() -> anyhow::Result<()> {
    let db = test_db().await;
    let scheduler = PollScheduler::new(db, test_pipeline(2), scheduler_config(1));

    assert_eq!(scheduler.state(), SchedulerState::Idle);
    scheduler.run_once().await?;
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    Ok(())
}

#[tokio::test]
async fn test_continuous_run_cycles_until_stopped() -> anyhow::Result<()> {
    let server = serve_page(PRODUCT_PAGE_1999_PLN).await;
    let db = test_db().await;
    let product = add_product(&db, &page_url(&server), Store::XKom, Some("GPU")).await;

    let scheduler = std::sync::Arc::new(PollScheduler::new(
        db.clone(),
        test_pipeline(5),
        scheduler_config(1),
    ));

    let (stop_tx, stop_rx) = stop_channel();
    let runner = {
        let scheduler = std::sync::Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(stop_rx).await })
    };

    // Wait for the first cycle's outcome to land, then stop mid-sleep; the
    // stop signal must interrupt the interval wait promptly.
    let mut waited = Duration::ZERO;
    while db.series_for(&product.id).await?.is_empty() {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
        assert!(waited < Duration::from_secs(5), "first cycle never ran");
    }
    stop_tx.send(true)?;

    tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .expect("stop signal did not interrupt the sleep")??;
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(!db.series_for(&product.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stop_signal_sent_before_run_prevents_cycles() -> anyhow::Result<()> {
    let db = test_db().await;
    let product = add_product(
        &db,
        "https://www.x-kom.pl/p/1.html",
        Store::XKom,
        Some("GPU"),
    )
    .await;

    let scheduler = PollScheduler::new(db.clone(), test_pipeline(2), scheduler_config(1));
    let (stop_tx, stop_rx) = stop_channel();
    stop_tx.send(true)?;

    scheduler.run(stop_rx).await?;

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(db.series_for(&product.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_worker_pool_is_bounded() -> anyhow::Result<()> {
    // 6 slow pages, 2 workers: the cycle still completes and records all
    // outcomes; with unbounded fan-out this would finish in one delay span,
    // with a bound of 2 it needs at least three.
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_string(PRODUCT_PAGE_1999_PLN)
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let db = test_db().await;
    for i in 0..6 {
        add_product(
            &db,
            &format!("{}/p/{i}.html", server.uri()),
            Store::XKom,
            Some(&format!("P{i}")),
        )
        .await;
    }

    let scheduler = PollScheduler::new(db.clone(), test_pipeline(5), scheduler_config(2));
    let started = std::time::Instant::now();
    let report = scheduler.run_once().await?;
    let elapsed = started.elapsed();

    assert_eq!(report.succeeded, 6);
    assert!(
        elapsed >= Duration::from_millis(550),
        "6 slow fetches over 2 workers should take at least 3 delay spans, took {elapsed:?}"
    );
    Ok(())
}
