//! 학습 → 캐시 → 증분 예측 통합 테스트 (인메모리 저장소).

mod common;

use chrono::Duration;
use common::{hourly_candles, t0, FakeFeed, Harness};
use forecast_core::{CandleSource, IngestConfig, TimeWindow};
use forecast_ml::{
    build_features_targets, BackfillParams, BoostParams, JobOutcome, ModelStore, MultiOutputRegressor,
    RegressionBundle, TARGET_REG_COLS,
};
use std::sync::Arc;

/// 정렬 후 정확히 480행이 되는 캔들 수.
const CANDLES_FOR_480_ROWS: usize = 491;

async fn trained_harness() -> Harness {
    let harness = Harness::new(hourly_candles(t0(), 0, CANDLES_FOR_480_ROWS));
    let outcome = harness.trainer().train(None).await;
    assert!(outcome.is_ok(), "training failed: {:?}", outcome);
    harness
}

// ============================================================================
// Trainer
// ============================================================================

#[tokio::test]
async fn test_train_480_rows_splits_384_96() {
    let harness = Harness::new(hourly_candles(t0(), 0, CANDLES_FOR_480_ROWS));
    let outcome = harness.trainer().train(None).await;

    let report = outcome.ok().expect("training should succeed");
    assert_eq!(report.samples, 480);
    assert_eq!(report.split, 384);
    assert!(report.mae.is_finite() && report.mape.is_finite() && report.smape.is_finite());
    assert!(report.message.contains("n=480, split=384/480"));

    // 두 아티팩트 모두 같은 학습 시각
    let bundle = harness.models.load_regression_bundle().unwrap();
    let classifier = harness.models.load_classifier().unwrap();
    assert_eq!(bundle.trained_at(), Some(classifier.trained_at));
    assert!(!bundle.is_legacy());

    assert_eq!(harness.job_statuses("train"), vec!["ok"]);
}

#[tokio::test]
async fn test_train_insufficient_data_is_not_fatal() {
    let harness = Harness::new(hourly_candles(t0(), 0, 150));
    let outcome = harness.trainer().train(None).await;

    match outcome {
        JobOutcome::InsufficientData { required, actual } => {
            assert_eq!(required, 200);
            assert_eq!(actual, 139);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(harness.models.load_regression_bundle().is_err());
    assert_eq!(harness.job_statuses("train"), vec!["error"]);
}

#[tokio::test]
async fn test_train_upstream_failure_is_logged() {
    let harness = Harness::new(hourly_candles(t0(), 0, CANDLES_FOR_480_ROWS));
    harness.candles.set_failing(true);

    let outcome = harness.trainer().train(None).await;
    assert_eq!(outcome.status(), "error");

    let records = harness.job_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].job_name, "train");
    assert!(records[0].started_at <= records[0].finished_at);
    assert!(records[0].message.contains("candle source unavailable"));
}

#[tokio::test]
async fn test_metrics_readback() {
    let harness = trained_harness().await;
    let metrics = harness.metrics_reader().latest().await.unwrap().unwrap();

    assert_eq!(metrics.parsed.samples, Some(480));
    assert_eq!(metrics.parsed.split_train, Some(384));
    assert_eq!(metrics.parsed.split_total, Some(480));
    assert!(metrics.parsed.mae.is_some() && metrics.parsed.smape.is_some());

    let candles = harness.candles.load_candles(TimeWindow::All).await.unwrap();
    let frame = build_features_targets(&candles);
    assert_eq!(metrics.validation_start, Some(frame.candles[384].time));
}

#[tokio::test]
async fn test_metrics_survive_candle_source_failure() {
    let harness = trained_harness().await;
    harness.candles.set_failing(true);

    let metrics = harness.metrics_reader().latest().await.unwrap().unwrap();
    assert_eq!(metrics.validation_start, None);
    assert_eq!(metrics.parsed.samples, Some(480));
    assert!(metrics.parsed.mae.is_some() && metrics.parsed.mape.is_some());
}

#[tokio::test]
async fn test_metrics_without_training_is_empty() {
    let harness = Harness::new(hourly_candles(t0(), 0, 50));
    assert!(harness.metrics_reader().latest().await.unwrap().is_none());
}

// ============================================================================
// Series materializer
// ============================================================================

#[tokio::test]
async fn test_materialize_twice_is_idempotent() {
    let harness = trained_harness().await;
    let materializer = harness.materializer();

    let first = materializer.materialize(30).await.ok().cloned().unwrap();
    let snapshot = harness.cache.snapshot();
    let second = materializer.materialize(30).await.ok().cloned().unwrap();

    assert_eq!(first.written, 480);
    assert_eq!(first, second);
    assert_eq!(harness.cache.snapshot(), snapshot);
    assert!(first.with_regression && first.with_classifier);
}

#[tokio::test]
async fn test_overlapping_windows_recompute_shared_rows() {
    let harness = trained_harness().await;
    let materializer = harness.materializer();
    let all = hourly_candles(t0(), 0, CANDLES_FOR_480_ROWS + 48);

    // [a, b]
    materializer.materialize(30).await;
    let last_before = harness.cache.snapshot().last().cloned().unwrap();
    assert!(last_before.err_close_abs.is_none());

    // 48시간 추가 후 [a, c]: 하한이 같도록 구간도 2일 늘림
    harness
        .candles
        .insert_candles(&all[CANDLES_FOR_480_ROWS..])
        .await
        .unwrap();
    harness.set_now(all.last().unwrap().time + Duration::hours(1));
    materializer.materialize(32).await;
    let merged = harness.cache.snapshot();

    // 새 저장소에서 [a, c]를 한 번에 계산한 결과와 같아야 함
    let mut fresh = Harness::new(all);
    fresh.models = harness.models.clone();
    fresh.materializer().materialize(32).await;
    assert_eq!(merged, fresh.cache.snapshot());

    // 이전 마지막 행은 이제 다음 캔들이 있으므로 오차가 채워짐
    let updated = merged.iter().find(|r| r.time == last_before.time).unwrap();
    assert!(updated.err_close_abs.is_some());
}

#[tokio::test]
async fn test_materialize_empty_history_writes_nothing() {
    let harness = Harness::new(Vec::new());
    let report = harness.materializer().materialize(90).await.ok().cloned().unwrap();

    assert_eq!(report.written, 0);
    assert!(harness.cache.snapshot().is_empty());
    assert_eq!(harness.job_statuses("apply"), vec!["ok"]);
}

#[tokio::test]
async fn test_materialize_without_models_keeps_real_values() {
    let harness = Harness::new(hourly_candles(t0(), 0, 60));
    let report = harness.materializer().materialize(30).await.ok().cloned().unwrap();

    assert_eq!(report.written, 49);
    assert!(!report.with_regression && !report.with_classifier);
    for row in harness.cache.snapshot() {
        assert!(row.close.is_some());
        assert!(row.pred_close_next.is_none() && row.cls_dir_next.is_none());
        assert!(row.err_close_abs.is_none());
    }
}

#[tokio::test]
async fn test_corrupt_artifact_degrades_to_null() {
    let harness = trained_harness().await;
    harness.models.set_regression_raw("{\"format\":\"pickle\"}");

    let report = harness.materializer().materialize(30).await.ok().cloned().unwrap();
    assert!(!report.with_regression);
    assert!(report.with_classifier);
    assert!(harness
        .cache
        .snapshot()
        .iter()
        .all(|r| r.pred_close_next.is_none() && r.cls_dir_next.is_some()));

    // 증분 예측은 회귀 모델이 필수
    let latest = harness.candles.latest_time().await.unwrap().unwrap();
    let outcome = harness.futures_updater().update_incremental(&[latest]).await;
    assert!(matches!(outcome, JobOutcome::ModelUnavailable { .. }));
    assert!(harness.futures.snapshot().is_empty());
}

#[tokio::test]
async fn test_legacy_bundle_is_transparent() {
    let harness = Harness::new(hourly_candles(t0(), 0, 120));
    let candles = harness.candles.load_candles(TimeWindow::All).await.unwrap();
    let frame = build_features_targets(&candles);

    let x = frame.feature_matrix();
    let columns: Vec<Vec<f64>> = forecast_ml::RegTarget::ALL
        .iter()
        .map(|t| frame.target_column(*t))
        .collect();
    assert_eq!(columns.len(), TARGET_REG_COLS.len());
    let params = BoostParams::default().with_estimators(10).with_max_depth(2);
    let model = MultiOutputRegressor::fit(&params, &x, &columns, &vec![1.0; x.len()]).unwrap();
    harness
        .models
        .save_regression_bundle(&RegressionBundle::LegacyMultiOutput {
            trained_at: None,
            model,
        })
        .unwrap();

    harness.materializer().materialize(30).await;
    let rows = harness.cache.snapshot();
    assert_eq!(rows.len(), frame.len());
    assert!(rows.iter().all(|r| r.pred_close_next.is_some() && r.pred_amp_next.is_some()));
    assert!(rows.iter().all(|r| r.cls_dir_next.is_none()));
}

#[tokio::test]
async fn test_on_demand_and_cached_series_agree() {
    let harness = trained_harness().await;
    let materializer = harness.materializer();
    let window = TimeWindow::LastDays(30);

    let on_demand = materializer.predict_series(window).await.unwrap();
    materializer.materialize(30).await;
    let cached = materializer.load_cached(Some(window)).await.unwrap();

    assert_eq!(on_demand.len(), 480);
    assert_eq!(on_demand, cached);
    assert!(on_demand.last().unwrap().err.is_none());
    assert!(on_demand[0].err.is_some());
}

#[tokio::test]
async fn test_on_demand_requires_30_candles() {
    let harness = Harness::new(hourly_candles(t0(), 0, 29));
    let points = harness
        .materializer()
        .predict_series(TimeWindow::All)
        .await
        .unwrap();
    assert!(points.is_empty());
}

// ============================================================================
// Incremental predictor (futures)
// ============================================================================

#[tokio::test]
async fn test_update_latest_writes_one_row() {
    let harness = trained_harness().await;
    let latest = harness.candles.latest_time().await.unwrap().unwrap();

    let report = harness.futures_updater().update_latest().await.ok().cloned().unwrap();
    assert_eq!(report.written, 1);

    let points = harness.futures.snapshot();
    assert_eq!(points.len(), 1);
    let p = points[0];
    assert_eq!(p.time, latest);
    assert_eq!(p.err_close, Some((p.pred_close.unwrap() - p.real_close.unwrap()).abs()));
}

#[tokio::test]
async fn test_earliest_retained_candle_writes_nothing() {
    let harness = trained_harness().await;
    let candles = harness.candles.load_candles(TimeWindow::All).await.unwrap();
    let earliest_retained = build_features_targets(&candles).candles[0].time;

    let report = harness
        .futures_updater()
        .update_incremental(&[earliest_retained])
        .await
        .ok()
        .cloned()
        .unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.skipped, 1);
    assert!(harness.futures.snapshot().is_empty());
}

#[tokio::test]
async fn test_source_and_target_keying() {
    let harness = trained_harness().await;
    harness.materializer().materialize(30).await;
    let cache = harness.cache.snapshot();

    // 캐시 행 T_i의 예측은 futures 행 T_{i+1}의 예측과 같음
    let source = &cache[300];
    let target_time = cache[301].time;
    harness
        .futures_updater()
        .update_incremental(&[target_time])
        .await;
    let point = harness.futures.snapshot()[0];

    assert_eq!(point.time, target_time);
    assert_eq!(point.pred_close, source.pred_close_next);
    assert_eq!(point.real_close, cache[301].close);
}

#[tokio::test]
async fn test_futures_window_read() {
    let harness = trained_harness().await;
    let candles = harness.candles.load_candles(TimeWindow::All).await.unwrap();
    let times: Vec<_> = candles[400..410].iter().map(|c| c.time).collect();
    harness.futures_updater().update_incremental(&times).await;

    let window = TimeWindow::Range {
        start: times[2],
        end: times[5],
    };
    let points = harness.futures_updater().load(window).await.unwrap();
    assert_eq!(points.len(), 4);
    assert!(points.windows(2).all(|w| w[0].time < w[1].time));
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_ingest_inserts_and_updates_futures() {
    let harness = trained_harness().await;
    let new = hourly_candles(t0(), CANDLES_FOR_480_ROWS, 5);
    let feed = Arc::new(FakeFeed::new(new.clone(), new.last().unwrap().time));
    harness.set_now(new.last().unwrap().time + Duration::hours(1));

    let report = harness
        .ingestor(feed, IngestConfig::default())
        .ingest()
        .await
        .ok()
        .cloned()
        .unwrap();

    assert_eq!(report.fetched, 5);
    assert_eq!(report.inserted, 5);
    assert_eq!(report.futures_updated, 1);
    assert_eq!(harness.futures.snapshot()[0].time, new[3].time);

    let ingest = harness
        .job_log
        .records()
        .into_iter()
        .find(|r| r.job_name == "ingest")
        .unwrap();
    assert_eq!(ingest.message, "Inserted 5; futures_updated 1");

    // 같은 캔들을 다시 받으면 삽입 0
    let again = harness
        .ingestor(Arc::new(FakeFeed::new(new.clone(), t0())), IngestConfig::default())
        .ingest()
        .await;
    assert_eq!(again.ok().unwrap().inserted, 0);
}

#[tokio::test]
async fn test_backfill_walks_windows() {
    let harness = Harness::new(Vec::new());
    let feed = Arc::new(FakeFeed::new(Vec::new(), chrono::Utc::now()));
    let params = BackfillParams {
        days: Some(1),
        limit: Some(10),
        sleep_ms: Some(0),
        ..Default::default()
    };

    let report = harness
        .ingestor(feed.clone(), IngestConfig::default())
        .backfill(params)
        .await
        .ok()
        .cloned()
        .unwrap();

    assert!((23..=24).contains(&report.fetched));
    assert_eq!(report.inserted as usize, report.fetched);
    assert_eq!(harness.candles.len(), report.fetched);

    let requests = feed.requests();
    assert_eq!(report.calls, requests.len());
    assert!(report.calls >= 3);
    // 다음 요청은 마지막 open time + 1시간
    assert_eq!(requests[1] - requests[0], 10 * 3_600_000);

    let record = harness.job_log.records().pop().unwrap();
    assert_eq!(record.job_name, "backfill");
    assert!(record.message.starts_with("Backfill BTCUSDT 1h 1d: fetched="));
}

#[tokio::test]
async fn test_backfill_rejects_invalid_interval() {
    let harness = Harness::new(Vec::new());
    let feed = Arc::new(FakeFeed::new(Vec::new(), chrono::Utc::now()));
    let params = BackfillParams {
        interval: Some("1x".to_string()),
        ..Default::default()
    };

    let outcome = harness
        .ingestor(feed, IngestConfig::default())
        .backfill(params)
        .await;
    assert_eq!(outcome.status(), "error");
    assert_eq!(harness.job_statuses("backfill"), vec!["error"]);
}
