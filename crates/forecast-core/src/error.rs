//! 예측 파이프라인의 공통 에러 타입.
//!
//! 저장소 트레이트 경계를 넘나드는 에러는 모두 `ForecastError`로 표현됩니다.

use thiserror::Error;

/// 핵심 파이프라인 에러.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 네트워크 에러 (외부 캔들 소스)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 한도 초과
    #[error("요청 한도 초과: {0}")]
    RateLimit(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),
}

/// 파이프라인 작업을 위한 Result 타입.
pub type ForecastResult<T> = Result<T, ForecastError>;

impl ForecastError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ForecastError::Network(_) | ForecastError::RateLimit(_))
    }

    /// 업스트림(데이터 소스) 실패인지 확인합니다.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ForecastError::Database(_) | ForecastError::Network(_) | ForecastError::RateLimit(_)
        )
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for ForecastError {
    fn from(err: config::ConfigError) -> Self {
        ForecastError::Config(err.to_string())
    }
}
