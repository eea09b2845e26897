//! 검증 지표와 학습 결과 메시지.
//!
//! 학습 작업은 지표를 job log 메시지 문자열로 남기고, 지표 조회는 마지막 성공
//! 메시지를 다시 파싱합니다.
//!
//! ```text
//! Trained 90d, n=2149, split=1719/2149. Val close_next -> MAE=535.5278, MAPE=0.49%, SMAPE=0.52%
//! ```

use crate::error::MlResult;
use crate::features::build_features_targets;
use crate::trainer::temporal_split;
use chrono::{DateTime, Utc};
use forecast_core::{CandleSource, JobLog, TimeWindow, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 0인 분모 대체값.
const ZERO_DENOMINATOR: f64 = 1e-9;

/// 평균 절대 오차.
pub fn mae(truth: &[f64], pred: &[f64]) -> f64 {
    mean(truth.iter().zip(pred).map(|(t, p)| (t - p).abs()))
}

/// 평균 절대 백분율 오차 (%).
pub fn mape(truth: &[f64], pred: &[f64]) -> f64 {
    mean(truth.iter().zip(pred).map(|(t, p)| {
        let den = if *t == 0.0 { ZERO_DENOMINATOR } else { *t };
        ((t - p) / den).abs()
    })) * 100.0
}

/// 대칭 평균 절대 백분율 오차 (%).
pub fn smape(truth: &[f64], pred: &[f64]) -> f64 {
    mean(truth.iter().zip(pred).map(|(t, p)| {
        let den = t.abs() + p.abs();
        let den = if den == 0.0 { ZERO_DENOMINATOR } else { den };
        2.0 * (p - t).abs() / den
    })) * 100.0
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// `close_next` 검증 지표.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,
    /// 백분율
    pub mape: f64,
    /// 백분율
    pub smape: f64,
}

impl ValidationMetrics {
    pub fn compute(truth: &[f64], pred: &[f64]) -> Self {
        Self {
            mae: mae(truth, pred),
            mape: mape(truth, pred),
            smape: smape(truth, pred),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.mae.is_finite() && self.mape.is_finite() && self.smape.is_finite()
    }
}

/// 학습 작업의 job log 메시지.
pub fn format_training_message(days: u32, n: usize, split: usize, metrics: &ValidationMetrics) -> String {
    format!(
        "Trained {}d, n={}, split={}/{}. Val close_next -> MAE={:.4}, MAPE={:.2}%, SMAPE={:.2}%",
        days, n, split, n, metrics.mae, metrics.mape, metrics.smape
    )
}

/// 메시지에서 파싱한 지표. 찾지 못한 항목은 `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedTrainingMessage {
    pub mae: Option<f64>,
    pub mape: Option<f64>,
    pub smape: Option<f64>,
    pub samples: Option<usize>,
    pub split_train: Option<usize>,
    pub split_total: Option<usize>,
}

/// `key=`로 시작하는 첫 값을 찾습니다. `key` 앞 글자가 영숫자면 건너뜁니다
/// (`MAPE=` 안의 `APE=` 같은 부분 일치 방지).
fn find_value<'a>(msg: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("{}=", key);
    let mut offset = 0;
    while let Some(pos) = msg[offset..].find(&needle) {
        let start = offset + pos;
        let boundary = msg[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_ascii_alphanumeric());
        if boundary {
            let rest = &msg[start + needle.len()..];
            let end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '/'))
                .unwrap_or(rest.len());
            return Some(&rest[..end]);
        }
        offset = start + needle.len();
    }
    None
}

/// 학습 메시지를 파싱합니다. 형식이 맞지 않는 항목은 조용히 건너뜁니다.
pub fn parse_training_message(msg: &str) -> ParsedTrainingMessage {
    let number = |key: &str| find_value(msg, key).and_then(|v| v.trim_end_matches('.').parse::<f64>().ok());
    let split = find_value(msg, "split").and_then(|v| {
        let (train, total) = v.trim_end_matches('.').split_once('/')?;
        Some((train.parse::<usize>().ok()?, total.parse::<usize>().ok()?))
    });

    ParsedTrainingMessage {
        mae: number("MAE"),
        mape: number("MAPE"),
        smape: number("SMAPE"),
        samples: find_value(msg, "n").and_then(|v| v.trim_end_matches('.').parse().ok()),
        split_train: split.map(|s| s.0),
        split_total: split.map(|s| s.1),
    }
}

/// 마지막 성공 학습의 지표.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    #[serde(flatten)]
    pub parsed: ParsedTrainingMessage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 현재 학습 구간에 같은 분할 규칙을 적용한 검증 시작 시각
    pub validation_start: Option<DateTime<Utc>>,
}

/// 학습 지표 조회.
pub struct MetricsReader {
    candles: Arc<dyn CandleSource>,
    job_log: Arc<dyn JobLog>,
    config: TrainingConfig,
}

impl MetricsReader {
    pub fn new(candles: Arc<dyn CandleSource>, job_log: Arc<dyn JobLog>, config: TrainingConfig) -> Self {
        Self {
            candles,
            job_log,
            config,
        }
    }

    /// 성공한 학습이 없으면 `None`.
    #[instrument(skip(self))]
    pub async fn latest(&self) -> MlResult<Option<TrainingMetrics>> {
        let Some(record) = self.job_log.latest_ok("train").await? else {
            debug!("No successful training run recorded");
            return Ok(None);
        };

        // 캔들 조회가 실패해도 기록된 지표는 반환
        let validation_start = match self.validation_start().await {
            Ok(start) => start,
            Err(e) => {
                warn!(error = %e, "Failed to compute validation start");
                None
            }
        };

        Ok(Some(TrainingMetrics {
            parsed: parse_training_message(&record.message),
            started_at: record.started_at,
            finished_at: record.finished_at,
            validation_start,
        }))
    }

    /// 현재 학습 구간의 검증 시작 시각.
    pub async fn validation_start(&self) -> MlResult<Option<DateTime<Utc>>> {
        let candles = self
            .candles
            .load_candles(TimeWindow::LastDays(self.config.lookback_days))
            .await?;
        let frame = build_features_targets(&candles);
        if frame.is_empty() {
            return Ok(None);
        }

        let split = temporal_split(frame.len(), self.config.train_fraction, self.config.validation_cap);
        let idx = split.min(frame.len() - 1);
        Ok(Some(frame.candles[idx].time))
    }
}
