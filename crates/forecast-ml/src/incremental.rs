//! 증분 예측 (futures).
//!
//! 요청한 시각 `T`마다, `T` 직전 캔들의 피처로 `close_next`를 예측하고 실제
//! 종가와의 오차를 `T` 키로 저장합니다 (타깃 시각 키). 직전 피처 행이 없는
//! 시각은 건너뜁니다.

use crate::error::MlResult;
use crate::features::{build_features_targets, AlignedFrame};
use crate::model_store::ModelStore;
use crate::predictor::Predictor;
use crate::types::JobOutcome;
use chrono::{DateTime, Duration, Utc};
use forecast_core::{
    finite, CandleSource, FuturesConfig, FuturesPoint, FuturesStore, JobLog, JobRecord, TimeWindow,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// 요청 시각들에 대한 futures 포인트를 만듭니다.
///
/// 시각 `T`가 어떤 행의 "다음 캔들 시각"일 때만 포인트가 생성되며, 예측이
/// 없으면 (모델 없음, 유한하지 않은 값) 그 시각도 건너뜁니다.
pub fn build_futures_points(
    frame: &AlignedFrame,
    times: &[DateTime<Utc>],
    predictor: &Predictor,
) -> Vec<FuturesPoint> {
    let successors = frame.successor_index();

    times
        .iter()
        .filter_map(|time| {
            let k = *successors.get(time)?;
            let pred_close = predictor.predict_close_next(&frame.features[k])?;
            let real_close = frame.targets[k].close_next;
            Some(FuturesPoint {
                time: *time,
                pred_close: Some(pred_close),
                real_close: finite(real_close),
                err_close: finite((pred_close - real_close).abs()),
            })
        })
        .collect()
}

/// 증분 예측 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesReport {
    pub requested: usize,
    pub written: u64,
    /// 직전 피처 행이 없거나 예측이 없어 건너뛴 시각 수
    pub skipped: usize,
}

/// futures 테이블 갱신/조회.
pub struct FuturesUpdater {
    candles: Arc<dyn CandleSource>,
    store: Arc<dyn FuturesStore>,
    models: Arc<dyn ModelStore>,
    job_log: Arc<dyn JobLog>,
    config: FuturesConfig,
}

impl FuturesUpdater {
    pub fn new(
        candles: Arc<dyn CandleSource>,
        store: Arc<dyn FuturesStore>,
        models: Arc<dyn ModelStore>,
        job_log: Arc<dyn JobLog>,
        config: FuturesConfig,
    ) -> Self {
        Self {
            candles,
            store,
            models,
            job_log,
            config,
        }
    }

    /// 주어진 타깃 시각들을 갱신합니다.
    #[instrument(skip(self, times), fields(job = "futures", requested = times.len()))]
    pub async fn update_incremental(&self, times: &[DateTime<Utc>]) -> JobOutcome<FuturesReport> {
        let started_at = Utc::now();

        match self.run(times).await {
            Ok(report) => {
                info!(written = report.written, skipped = report.skipped, "Futures updated");
                let message = format!(
                    "Futures requested={}, written={}, skipped={}",
                    report.requested, report.written, report.skipped
                );
                self.record(JobRecord::ok("futures", message, started_at, Utc::now()))
                    .await;
                JobOutcome::Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Futures update failed");
                self.record(JobRecord::error("futures", e.to_string(), started_at, Utc::now()))
                    .await;
                e.into()
            }
        }
    }

    /// 가장 최근 캔들 시각을 갱신합니다. 캔들이 없으면 0건.
    pub async fn update_latest(&self) -> JobOutcome<FuturesReport> {
        match self.candles.latest_time().await {
            Ok(Some(latest)) => self.update_incremental(&[latest]).await,
            Ok(None) => JobOutcome::Ok(FuturesReport {
                requested: 0,
                written: 0,
                skipped: 0,
            }),
            Err(e) => {
                error!(error = %e, "Failed to read latest candle time");
                JobOutcome::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn record(&self, record: JobRecord) {
        if let Err(e) = self.job_log.record(&record).await {
            warn!(error = %e, "Failed to write job log");
        }
    }

    async fn run(&self, times: &[DateTime<Utc>]) -> MlResult<FuturesReport> {
        let times: Vec<DateTime<Utc>> = times.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let Some(min_time) = times.first().copied() else {
            return Ok(FuturesReport {
                requested: 0,
                written: 0,
                skipped: 0,
            });
        };

        // 회귀 번들이 없으면 예측할 수 없음
        let bundle = self.models.load_regression_bundle()?;
        let predictor = Predictor::new(Some(bundle), None);

        let since = min_time - Duration::days(i64::from(self.config.lookback_days));
        let candles = self.candles.load_candles(TimeWindow::Since(since)).await?;
        let frame = build_features_targets(&candles);
        debug!(candles = candles.len(), rows = frame.len(), "Futures lookback loaded");

        let points = build_futures_points(&frame, &times, &predictor);
        let written = if points.is_empty() {
            0
        } else {
            self.store.upsert_points(&points).await?
        };

        Ok(FuturesReport {
            requested: times.len(),
            written,
            skipped: times.len() - points.len(),
        })
    }

    /// 구간 내 futures 포인트. NaN/Inf는 없는 값으로 바뀝니다.
    pub async fn load(&self, window: TimeWindow) -> MlResult<Vec<FuturesPoint>> {
        let points = self.store.load_points(window).await?;
        Ok(points.into_iter().map(FuturesPoint::sanitized).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::{BoostParams, BoostedRegressor};
    use crate::model_store::RegressionBundle;
    use crate::types::{RegTarget, NUM_FEATURES};
    use chrono::TimeZone;
    use forecast_core::Candle;
    use std::collections::BTreeMap;

    fn candles(n: usize) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 200.0 + (i as f64 * 0.3).sin() * 3.0;
                Candle::new(t0 + Duration::hours(i as i64), c, c + 1.0, c - 1.0, c, 5.0 + i as f64)
            })
            .collect()
    }

    fn predictor(frame: &AlignedFrame) -> Predictor {
        let x: Vec<[f64; NUM_FEATURES]> = frame.feature_matrix();
        let y = frame.target_column(RegTarget::CloseNext);
        let params = BoostParams::default().with_estimators(5).with_max_depth(2);
        let model = BoostedRegressor::fit(&params, &x, &y, &vec![1.0; x.len()]).unwrap();
        let models = BTreeMap::from([(RegTarget::CloseNext, model)]);
        Predictor::new(Some(RegressionBundle::per_target(Utc::now(), models)), None)
    }

    #[test]
    fn test_latest_candle_is_keyed_by_target_time() {
        let candles = candles(40);
        let frame = build_features_targets(&candles);
        let predictor = predictor(&frame);
        let latest = candles.last().unwrap().time;

        let points = build_futures_points(&frame, &[latest], &predictor);
        assert_eq!(points.len(), 1);
        let p = points[0];
        assert_eq!(p.time, latest);
        assert_eq!(p.real_close, Some(candles[39].close));
        assert_eq!(p.err_close, Some((p.pred_close.unwrap() - candles[39].close).abs()));
        // 피처는 직전 캔들에서 계산됨
        assert_eq!(p.pred_close, predictor.predict_close_next(&frame.features[frame.len() - 1]));
    }

    #[test]
    fn test_times_without_predecessor_are_skipped() {
        let candles = candles(40);
        let frame = build_features_targets(&candles);
        let predictor = predictor(&frame);

        // 첫 보존 캔들(10)과 알 수 없는 시각
        let unknown = candles[39].time + Duration::hours(5);
        let points = build_futures_points(&frame, &[candles[10].time, unknown], &predictor);
        assert!(points.is_empty());
    }

    #[test]
    fn test_missing_close_model_skips() {
        let candles = candles(40);
        let frame = build_features_targets(&candles);
        let predictor = Predictor::new(None, None);

        assert!(build_futures_points(&frame, &[candles[20].time], &predictor).is_empty());
    }
}
