//! 모델 학습.
//!
//! ```text
//! load_candles(last N days)
//!        │
//!        ▼
//! build_features_targets ──► temporal_split ──► [0, split) 학습 / [split, n) 검증
//!                                                    │
//!                       exp_sample_weights(split) ◄──┘
//!                                │
//!          ┌─────────────────────┼──────────────────────┐
//!          ▼                     ▼                      ▼
//!   회귀 모델 × 5 (병렬)    방향 분류기        close_next 검증 지표
//!          └──────────┬──────────┘
//!                     ▼
//!            ModelStore (같은 trained_at)
//! ```

use crate::boost::{BoostParams, BoostedClassifier, BoostedRegressor};
use crate::error::{MlError, MlResult};
use crate::features::build_features_targets;
use crate::metrics::{format_training_message, ValidationMetrics};
use crate::model_store::{ClassifierArtifact, ModelStore, RegressionBundle};
use crate::types::{JobOutcome, RegTarget, NUM_FEATURES};
use crate::weights::exp_sample_weights;
use chrono::{DateTime, Utc};
use forecast_core::{CandleSource, JobLog, JobRecord, TimeWindow, TrainingConfig};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// 학습/검증 분할 인덱스.
///
/// `max(floor(train_fraction·n), n − validation_cap)`. 검증 구간은 최대
/// `validation_cap`행입니다.
pub fn temporal_split(n: usize, train_fraction: f64, validation_cap: usize) -> usize {
    let by_fraction = (train_fraction * n as f64).floor() as usize;
    by_fraction.max(n.saturating_sub(validation_cap)).min(n)
}

/// 학습 결과 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trained_at: DateTime<Utc>,
    pub days: u32,
    /// 정렬된 행 수
    pub samples: usize,
    pub split: usize,
    pub mae: f64,
    pub mape: f64,
    pub smape: f64,
    pub message: String,
}

/// 학습 작업 실행기.
pub struct Trainer {
    candles: Arc<dyn CandleSource>,
    models: Arc<dyn ModelStore>,
    job_log: Arc<dyn JobLog>,
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(
        candles: Arc<dyn CandleSource>,
        models: Arc<dyn ModelStore>,
        job_log: Arc<dyn JobLog>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            candles,
            models,
            job_log,
            config,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// 최근 `days`일(기본 `lookback_days`)로 학습합니다.
    ///
    /// 결과는 성공/실패와 관계없이 job log에 `train`으로 기록됩니다.
    #[instrument(skip(self), fields(job = "train"))]
    pub async fn train(&self, days: Option<u32>) -> JobOutcome<TrainingReport> {
        let started_at = Utc::now();
        let days = days.unwrap_or(self.config.lookback_days);

        match self.run(days).await {
            Ok(report) => {
                info!(
                    samples = report.samples,
                    split = report.split,
                    mae = report.mae,
                    mape = report.mape,
                    smape = report.smape,
                    "Training completed"
                );
                self.record(JobRecord::ok("train", &report.message, started_at, Utc::now()))
                    .await;
                JobOutcome::Ok(report)
            }
            Err(e) => {
                if e.is_recoverable() {
                    warn!(error = %e, "Training skipped");
                } else {
                    error!(error = %e, "Training failed");
                }
                self.record(JobRecord::error("train", e.to_string(), started_at, Utc::now()))
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

    async fn run(&self, days: u32) -> MlResult<TrainingReport> {
        let candles = self.candles.load_candles(TimeWindow::LastDays(days)).await?;
        let frame = build_features_targets(&candles);
        let n = frame.len();

        if n < self.config.min_rows {
            return Err(MlError::InsufficientData {
                required: self.config.min_rows,
                actual: n,
            });
        }

        let split = temporal_split(n, self.config.train_fraction, self.config.validation_cap);
        if split == 0 || split >= n {
            return Err(MlError::InsufficientData {
                required: n + 1,
                actual: n,
            });
        }
        info!(candles = candles.len(), samples = n, split, "Training window prepared");

        let x = frame.feature_matrix();
        let x_train: Arc<Vec<[f64; NUM_FEATURES]>> = Arc::new(x[..split].to_vec());
        let weights = Arc::new(exp_sample_weights(split, self.config.alpha_decay));
        let params = BoostParams::from(&self.config.boosting);

        // 타깃별 회귀 모델과 분류기를 병렬로 학습
        let regressors = RegTarget::ALL.into_iter().map(|target| {
            let (x, w, params) = (Arc::clone(&x_train), Arc::clone(&weights), params.clone());
            let y = frame.target_column(target)[..split].to_vec();
            tokio::task::spawn_blocking(move || {
                BoostedRegressor::fit(&params, x.as_slice(), &y, &w).map(|model| (target, model))
            })
        });
        let classifier = {
            let (x, w, params) = (Arc::clone(&x_train), Arc::clone(&weights), params.clone());
            let y = frame.direction_labels()[..split].to_vec();
            tokio::task::spawn_blocking(move || BoostedClassifier::fit(&params, x.as_slice(), &y, &w))
        };

        let fitted = try_join_all(regressors)
            .await
            .map_err(|e| MlError::Training(format!("regression task failed: {}", e)))?;
        let models: BTreeMap<RegTarget, BoostedRegressor> = fitted.into_iter().collect::<MlResult<_>>()?;
        let classifier = classifier
            .await
            .map_err(|e| MlError::Training(format!("classifier task failed: {}", e)))??;

        // close_next 검증
        let close_model = models
            .get(&RegTarget::CloseNext)
            .ok_or_else(|| MlError::Training("close_next model missing".to_string()))?;
        let truth = &frame.target_column(RegTarget::CloseNext)[split..];
        let pred = close_model.predict_many(&x[split..]);
        let metrics = ValidationMetrics::compute(truth, &pred);

        let trained_at = Utc::now();
        self.models
            .save_regression_bundle(&RegressionBundle::per_target(trained_at, models))?;
        self.models
            .save_classifier(&ClassifierArtifact::new(trained_at, classifier))?;

        Ok(TrainingReport {
            trained_at,
            days,
            samples: n,
            split,
            mae: metrics.mae,
            mape: metrics.mape,
            smape: metrics.smape,
            message: format_training_message(days, n, split, &metrics),
        })
    }
}
