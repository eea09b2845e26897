//! 데이터 모듈 오류 타입.

use forecast_core::ForecastError;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 데이터 가져오기 오류 (외부 소스)
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 외부 소스 요청 한도 초과 (HTTP 418/429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::FetchError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<DataError> for ForecastError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::FetchError(msg) => ForecastError::Network(msg),
            DataError::RateLimited(msg) => ForecastError::RateLimit(msg),
            DataError::NotFound(msg) => ForecastError::NotFound(msg),
            DataError::SerializationError(msg) | DataError::ParseError(msg) => {
                ForecastError::Serialization(msg)
            }
            DataError::InvalidData(msg) => ForecastError::InvalidInput(msg),
            other => ForecastError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
