//! 실제값 × 예측값 시리즈.
//!
//! 보존된 캔들 `i`마다 한 행을 만듭니다 (소스 시각 키).
//!
//! - 실제값: 캔들 `i`의 OHLCV
//! - 예측값: 캔들 `i`의 피처로 예측한 캔들 `i+1`
//! - 오차: 보존된 다음 행이 있을 때만, 실제 다음 캔들 대비
//!
//! 같은 구간을 다시 계산하면 같은 행이 같은 값으로 덮어쓰여집니다.

use crate::error::MlResult;
use crate::features::{build_features_targets, AlignedFrame};
use crate::model_store::ModelStore;
use crate::predictor::Predictor;
use crate::types::{JobOutcome, PredictionRow};
use chrono::Utc;
use forecast_core::{
    finite, finite_opt, CachedSeriesRow, CandleSource, JobLog, JobRecord, SeriesCacheStore, SeriesConfig,
    SeriesPoint, TimeWindow,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// 정렬된 프레임과 예측으로 캐시 행을 만듭니다.
///
/// `predictions`는 `frame`과 같은 길이여야 하며, 짧으면 나머지 행은 예측 없이
/// 실제값만 담습니다.
pub fn build_cache_rows(frame: &AlignedFrame, predictions: &[PredictionRow]) -> Vec<CachedSeriesRow> {
    let n = frame.len();
    (0..n)
        .map(|i| {
            let candle = &frame.candles[i];
            let mut row = CachedSeriesRow {
                time: candle.time,
                open: finite(candle.open),
                high: finite(candle.high),
                low: finite(candle.low),
                close: finite(candle.close),
                volume: finite(candle.volume),
                ..Default::default()
            };

            let prediction = predictions.get(i).copied().unwrap_or_default();
            if let Some(reg) = prediction.regression {
                row.pred_open_next = finite_opt(reg.open_next);
                row.pred_high_next = finite_opt(reg.high_next);
                row.pred_low_next = finite_opt(reg.low_next);
                row.pred_close_next = finite_opt(reg.close_next);
                row.pred_amp_next = finite_opt(reg.amp_next);
            }
            if let Some(dir) = prediction.direction {
                row.cls_dir_next = Some(dir.dir_next);
                row.prob_up = finite_opt(dir.prob_up);
                row.prob_down = finite_opt(dir.prob_down);
            }

            // 마지막 보존 행은 오차 없음
            if let (Some(pred_close), true) = (row.pred_close_next, i + 1 < n) {
                let next = &frame.targets[i];
                row.err_close_abs = finite((pred_close - next.close_next).abs());
                row.err_close_signed = finite(pred_close - next.close_next);
                row.err_amp_abs = row
                    .pred_amp_next
                    .and_then(|amp| finite((amp - next.amp_next).abs()));
            }
            row
        })
        .collect()
}

/// 캐시 재계산 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializeReport {
    pub days: u32,
    pub candles: usize,
    /// upsert한 행 수
    pub written: u64,
    pub with_regression: bool,
    pub with_classifier: bool,
}

/// 시리즈 계산/캐시 서비스.
pub struct SeriesMaterializer {
    candles: Arc<dyn CandleSource>,
    cache: Arc<dyn SeriesCacheStore>,
    models: Arc<dyn ModelStore>,
    job_log: Arc<dyn JobLog>,
    config: SeriesConfig,
}

impl SeriesMaterializer {
    pub fn new(
        candles: Arc<dyn CandleSource>,
        cache: Arc<dyn SeriesCacheStore>,
        models: Arc<dyn ModelStore>,
        job_log: Arc<dyn JobLog>,
        config: SeriesConfig,
    ) -> Self {
        Self {
            candles,
            cache,
            models,
            job_log,
            config,
        }
    }

    /// 최근 `days`일 구간을 다시 계산해 캐시에 upsert 합니다 (`apply` 작업).
    #[instrument(skip(self), fields(job = "apply"))]
    pub async fn materialize(&self, days: u32) -> JobOutcome<MaterializeReport> {
        let started_at = Utc::now();

        match self.run(days).await {
            Ok(report) => {
                info!(
                    candles = report.candles,
                    written = report.written,
                    with_regression = report.with_regression,
                    "Series cache materialized"
                );
                let message = format!("Materialized {}d: candles={}, written={}", days, report.candles, report.written);
                self.record(JobRecord::ok("apply", message, started_at, Utc::now())).await;
                JobOutcome::Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Series materialization failed");
                self.record(JobRecord::error("apply", e.to_string(), started_at, Utc::now()))
                    .await;
                e.into()
            }
        }
    }

    async fn record(&self, record: JobRecord) {
        if let Err(e) = self.job_log.record(&record).await {
            warn!(error = %e, "Failed to write job log");
        }
    }

    async fn run(&self, days: u32) -> MlResult<MaterializeReport> {
        let candles = self.candles.load_candles(TimeWindow::LastDays(days)).await?;
        let mut report = MaterializeReport {
            days,
            candles: candles.len(),
            written: 0,
            with_regression: false,
            with_classifier: false,
        };
        if candles.len() < self.config.min_candles {
            debug!(candles = candles.len(), "Not enough candles to materialize");
            return Ok(report);
        }

        let frame = build_features_targets(&candles);
        if frame.is_empty() {
            return Ok(report);
        }

        let predictor = Predictor::load(self.models.as_ref());
        report.with_regression = predictor.has_regression();
        report.with_classifier = predictor.has_classifier();

        let rows = build_cache_rows(&frame, &predictor.predict(&frame.features));
        report.written = self.cache.upsert_rows(&rows).await?;
        Ok(report)
    }

    /// 캔들에서 바로 계산한 시리즈.
    ///
    /// 캔들이 `on_demand_min_candles`보다 적으면 빈 시리즈입니다.
    #[instrument(skip(self))]
    pub async fn predict_series(&self, window: TimeWindow) -> MlResult<Vec<SeriesPoint>> {
        let candles = self.candles.load_candles(window).await?;
        if candles.len() < self.config.on_demand_min_candles {
            return Ok(Vec::new());
        }

        let frame = build_features_targets(&candles);
        let predictor = Predictor::load(self.models.as_ref());
        let rows = build_cache_rows(&frame, &predictor.predict(&frame.features));
        Ok(rows.iter().map(CachedSeriesRow::to_point).collect())
    }

    /// 캐시된 시리즈. 구간이 없으면 `fallback_days`를 사용합니다.
    #[instrument(skip(self))]
    pub async fn load_cached(&self, window: Option<TimeWindow>) -> MlResult<Vec<SeriesPoint>> {
        let window = window.unwrap_or(TimeWindow::LastDays(self.config.fallback_days));
        let rows = self.cache.load_rows(window).await?;
        Ok(rows.iter().map(CachedSeriesRow::to_point).collect())
    }
}
