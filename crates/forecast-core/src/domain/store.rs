//! 저장소 경계 trait.
//!
//! 파이프라인 컴포넌트는 구체 저장소(PostgreSQL 등)가 아닌 이 trait들에만
//! 의존합니다. 모든 호출은 작업 단위로 캔들과 아티팩트를 새로 읽습니다.

use super::candle::{Candle, TimeWindow};
use super::job::JobRecord;
use super::series::{CachedSeriesRow, FuturesPoint};
use crate::error::ForecastResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ================================================================================================
// Candles
// ================================================================================================

/// 정렬된 캔들 시퀀스를 제공하는 소스.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// 구간 내 캔들을 시간 오름차순으로 반환합니다.
    async fn load_candles(&self, window: TimeWindow) -> ForecastResult<Vec<Candle>>;

    /// 캔들을 삽입합니다. 이미 존재하는 시각은 무시되며 실제 삽입 수를 반환합니다.
    async fn insert_candles(&self, candles: &[Candle]) -> ForecastResult<u64>;

    /// 가장 최근 캔들 시각.
    async fn latest_time(&self) -> ForecastResult<Option<DateTime<Utc>>>;
}

/// 외부 kline 피드 (거래소 공개 API).
#[async_trait]
pub trait CandleFeed: Send + Sync {
    /// 최근 캔들 `limit`개 (시간 오름차순).
    async fn fetch_recent(&self, symbol: &str, interval: &str, limit: u32) -> ForecastResult<Vec<Candle>>;

    /// `start_ms`(open time, 밀리초)부터 최대 `limit`개 (시간 오름차순).
    async fn fetch_window(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        limit: u32,
    ) -> ForecastResult<Vec<Candle>>;
}

// ================================================================================================
// Materialized series
// ================================================================================================

/// `series_cache` 저장소 (소스 시각 키).
#[async_trait]
pub trait SeriesCacheStore: Send + Sync {
    /// 시각 기준으로 insert-or-update 합니다. 처리한 행 수를 반환합니다.
    async fn upsert_rows(&self, rows: &[CachedSeriesRow]) -> ForecastResult<u64>;

    /// 구간 내 행을 시간 오름차순으로 반환합니다.
    async fn load_rows(&self, window: TimeWindow) -> ForecastResult<Vec<CachedSeriesRow>>;
}

/// `futures` 저장소 (타깃 시각 키).
#[async_trait]
pub trait FuturesStore: Send + Sync {
    /// 시각 기준으로 insert-or-update 합니다.
    async fn upsert_points(&self, points: &[FuturesPoint]) -> ForecastResult<u64>;

    /// 구간 내 포인트를 시간 오름차순으로 반환합니다.
    async fn load_points(&self, window: TimeWindow) -> ForecastResult<Vec<FuturesPoint>>;
}

// ================================================================================================
// Job log
// ================================================================================================

/// 작업 감사 로그.
#[async_trait]
pub trait JobLog: Send + Sync {
    /// 레코드를 추가합니다.
    async fn record(&self, record: &JobRecord) -> ForecastResult<()>;

    /// 주어진 작업의 마지막 성공 레코드.
    async fn latest_ok(&self, job_name: &str) -> ForecastResult<Option<JobRecord>>;
}
