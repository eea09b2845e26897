//! ML 모듈 에러 타입.

use forecast_core::ForecastError;
use thiserror::Error;

/// 학습/예측/아티팩트 처리에서 발생할 수 있는 에러.
#[derive(Debug, Error)]
pub enum MlError {
    /// 학습/계산을 위한 데이터 부족
    #[error("Insufficient data: need {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// 모델 아티팩트가 아직 없음
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// 아티팩트를 읽을 수 없거나 형식을 알 수 없음
    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// 캔들 소스/저장소 실패
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// 모델 학습 중 에러
    #[error("Training error: {0}")]
    Training(String),

    /// 유효하지 않은 입력 데이터
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 아티팩트 저장 실패
    #[error("Persist error: {0}")]
    Persist(String),
}

/// ML 작업을 위한 Result 타입.
pub type MlResult<T> = Result<T, MlError>;

impl MlError {
    /// 호출자가 빈 결과/null 예측으로 계속 진행할 수 있는 에러인지 확인.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MlError::InsufficientData { .. }
                | MlError::ModelUnavailable(_)
                | MlError::CorruptArtifact(_)
        )
    }

    /// 예측이 null로 대체되어야 하는 에러인지 확인.
    pub fn degrades_to_null(&self) -> bool {
        matches!(self, MlError::ModelUnavailable(_) | MlError::CorruptArtifact(_))
    }
}

impl From<ForecastError> for MlError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::InvalidInput(msg) => MlError::InvalidInput(msg),
            other => MlError::Upstream(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MlError {
    fn from(err: serde_json::Error) -> Self {
        MlError::CorruptArtifact(err.to_string())
    }
}
