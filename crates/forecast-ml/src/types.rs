//! ML 모듈의 공통 타입.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MlError;

/// 모델 입력 피처 이름 (열 순서).
pub const FEATURE_COLS: [&str; 5] = ["close", "ret", "acc", "amp", "vol_rel"];

/// 피처 개수.
pub const NUM_FEATURES: usize = FEATURE_COLS.len();

/// 회귀 타깃 이름. 레거시 multi-output 모델의 출력 열 순서와 같습니다.
pub const TARGET_REG_COLS: [&str; 5] = ["open_next", "high_next", "low_next", "close_next", "amp_next"];

/// 회귀 타깃.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegTarget {
    OpenNext,
    HighNext,
    LowNext,
    CloseNext,
    AmpNext,
}

impl RegTarget {
    /// `TARGET_REG_COLS` 순서의 전체 타깃.
    pub const ALL: [RegTarget; 5] = [
        RegTarget::OpenNext,
        RegTarget::HighNext,
        RegTarget::LowNext,
        RegTarget::CloseNext,
        RegTarget::AmpNext,
    ];

    /// 레거시 multi-output 모델에서의 열 인덱스.
    pub fn column(&self) -> usize {
        match self {
            RegTarget::OpenNext => 0,
            RegTarget::HighNext => 1,
            RegTarget::LowNext => 2,
            RegTarget::CloseNext => 3,
            RegTarget::AmpNext => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        TARGET_REG_COLS[self.column()]
    }
}

impl fmt::Display for RegTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RegTarget {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegTarget::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| MlError::InvalidInput(format!("unknown regression target: {}", s)))
    }
}

/// 캔들 `i` 시점의 피처 (`i`까지의 정보만 사용).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub close: f64,
    /// 직전 종가 대비 변화율
    pub ret: f64,
    /// `ret`의 변화량
    pub acc: f64,
    /// 고가 - 저가
    pub amp: f64,
    /// 거래량 / 최근 10개 평균 거래량
    pub vol_rel: f64,
}

impl FeatureRow {
    /// `FEATURE_COLS` 순서의 배열.
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [self.close, self.ret, self.acc, self.amp, self.vol_rel]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// 캔들 `i`의 다음 캔들(`i+1`)을 설명하는 타깃.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRow {
    /// 다음 캔들의 시각
    pub next_time: DateTime<Utc>,
    pub open_next: f64,
    pub high_next: f64,
    pub low_next: f64,
    pub close_next: f64,
    pub amp_next: f64,
    /// `close[i+1] > close[i]`이면 1
    pub dir_next: u8,
}

impl TargetRow {
    pub fn get(&self, target: RegTarget) -> f64 {
        match target {
            RegTarget::OpenNext => self.open_next,
            RegTarget::HighNext => self.high_next,
            RegTarget::LowNext => self.low_next,
            RegTarget::CloseNext => self.close_next,
            RegTarget::AmpNext => self.amp_next,
        }
    }

    pub fn is_finite(&self) -> bool {
        RegTarget::ALL.iter().all(|t| self.get(*t).is_finite())
    }
}

/// 한 피처 행에 대한 회귀 예측. 없는 타깃 모델이나 유한하지 않은 값은 `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionPrediction {
    pub open_next: Option<f64>,
    pub high_next: Option<f64>,
    pub low_next: Option<f64>,
    pub close_next: Option<f64>,
    pub amp_next: Option<f64>,
}

impl RegressionPrediction {
    pub fn get(&self, target: RegTarget) -> Option<f64> {
        match target {
            RegTarget::OpenNext => self.open_next,
            RegTarget::HighNext => self.high_next,
            RegTarget::LowNext => self.low_next,
            RegTarget::CloseNext => self.close_next,
            RegTarget::AmpNext => self.amp_next,
        }
    }

    pub fn set(&mut self, target: RegTarget, value: Option<f64>) {
        let slot = match target {
            RegTarget::OpenNext => &mut self.open_next,
            RegTarget::HighNext => &mut self.high_next,
            RegTarget::LowNext => &mut self.low_next,
            RegTarget::CloseNext => &mut self.close_next,
            RegTarget::AmpNext => &mut self.amp_next,
        };
        *slot = value;
    }
}

/// 방향 분류 예측.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionPrediction {
    /// 1 = 상승, 0 = 비상승
    pub dir_next: i32,
    pub prob_up: Option<f64>,
    pub prob_down: Option<f64>,
}

/// 한 피처 행에 대한 전체 예측.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// 회귀 모델이 없으면 `None`
    pub regression: Option<RegressionPrediction>,
    /// 분류기가 없으면 `None`
    pub direction: Option<DirectionPrediction>,
}

/// 작업 결과.
///
/// 예외 대신 명시적 상태로 결과를 돌려주며 `status` 태그로 직렬화됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome<T> {
    /// 정상 완료
    Ok(T),
    /// 데이터 부족 (치명적이지 않음, 0건 처리)
    InsufficientData { required: usize, actual: usize },
    /// 모델 아티팩트 없음/손상 (예측 없이 종료)
    ModelUnavailable { message: String },
    /// 업스트림/학습/저장 실패
    Error { message: String },
}

impl<T> JobOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, JobOutcome::Ok(_))
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            JobOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    /// 상태 태그 문자열.
    pub fn status(&self) -> &'static str {
        match self {
            JobOutcome::Ok(_) => "ok",
            JobOutcome::InsufficientData { .. } => "insufficient_data",
            JobOutcome::ModelUnavailable { .. } => "model_unavailable",
            JobOutcome::Error { .. } => "error",
        }
    }
}

impl<T> From<MlError> for JobOutcome<T> {
    fn from(err: MlError) -> Self {
        match err {
            MlError::InsufficientData { required, actual } => {
                JobOutcome::InsufficientData { required, actual }
            }
            MlError::ModelUnavailable(_) | MlError::CorruptArtifact(_) => JobOutcome::ModelUnavailable {
                message: err.to_string(),
            },
            other => JobOutcome::Error {
                message: other.to_string(),
            },
        }
    }
}
