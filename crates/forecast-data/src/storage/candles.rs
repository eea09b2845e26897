//! 캔들 저장소.
//!
//! 가격은 `NUMERIC`으로 저장하고 도메인 경계에서 `f64`로 변환합니다.
//! 같은 시각의 재삽입은 `ON CONFLICT DO NOTHING`으로 무시됩니다.

use super::window_bounds;
use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_core::{Candle, CandleSource, ForecastResult, TimeWindow};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, info, instrument, warn};

/// 캔들 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct CandleRecord {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl CandleRecord {
    /// 도메인 캔들로 변환합니다.
    pub fn to_candle(&self) -> Candle {
        Candle {
            time: self.time,
            open: self.open.to_f64().unwrap_or(f64::NAN),
            high: self.high.to_f64().unwrap_or(f64::NAN),
            low: self.low.to_f64().unwrap_or(f64::NAN),
            close: self.close.to_f64().unwrap_or(f64::NAN),
            volume: self.volume.to_f64().unwrap_or(f64::NAN),
        }
    }

    /// 도메인 캔들에서 생성합니다. 유한하지 않은 값이 있으면 `None`.
    pub fn from_candle(candle: &Candle) -> Option<Self> {
        Some(Self {
            time: candle.time,
            open: Decimal::from_f64(candle.open)?,
            high: Decimal::from_f64(candle.high)?,
            low: Decimal::from_f64(candle.low)?,
            close: Decimal::from_f64(candle.close)?,
            volume: Decimal::from_f64(candle.volume)?,
        })
    }
}

/// 캔들 repository.
#[derive(Clone)]
pub struct CandleRepository {
    pool: PgPool,
}

impl CandleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 구간 내 캔들 조회 (시간 오름차순).
    #[instrument(skip(self))]
    pub async fn find(&self, window: TimeWindow) -> Result<Vec<CandleRecord>> {
        let (lower, upper) = window_bounds(window, Utc::now());

        let records = sqlx::query_as::<_, CandleRecord>(
            r#"
            SELECT time, open, high, low, close, volume
            FROM candles
            WHERE ($1::timestamptz IS NULL OR time >= $1)
              AND ($2::timestamptz IS NULL OR time <= $2)
            ORDER BY time
            "#,
        )
        .bind(lower)
        .bind(upper)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        debug!(count = records.len(), "캔들 조회");
        Ok(records)
    }

    /// 캔들 일괄 삽입. 이미 있는 시각은 건너뜁니다.
    #[instrument(skip(self, candles), fields(count = candles.len()))]
    pub async fn insert_many(&self, candles: &[Candle]) -> Result<u64> {
        let records: Vec<CandleRecord> = candles
            .iter()
            .filter_map(|c| {
                let record = CandleRecord::from_candle(c);
                if record.is_none() {
                    warn!(time = %c.time, "유한하지 않은 값이 있는 캔들 건너뜀");
                }
                record
            })
            .collect();

        if records.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0;

        for chunk in records.chunks(500) {
            let times: Vec<DateTime<Utc>> = chunk.iter().map(|r| r.time).collect();
            let opens: Vec<Decimal> = chunk.iter().map(|r| r.open).collect();
            let highs: Vec<Decimal> = chunk.iter().map(|r| r.high).collect();
            let lows: Vec<Decimal> = chunk.iter().map(|r| r.low).collect();
            let closes: Vec<Decimal> = chunk.iter().map(|r| r.close).collect();
            let volumes: Vec<Decimal> = chunk.iter().map(|r| r.volume).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO candles (time, open, high, low, close, volume)
                SELECT * FROM UNNEST(
                    $1::timestamptz[],
                    $2::numeric[], $3::numeric[], $4::numeric[], $5::numeric[], $6::numeric[]
                )
                ON CONFLICT (time) DO NOTHING
                "#,
            )
            .bind(&times)
            .bind(&opens)
            .bind(&highs)
            .bind(&lows)
            .bind(&closes)
            .bind(&volumes)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            inserted += result.rows_affected();
        }

        info!(received = candles.len(), inserted = inserted, "캔들 저장");
        Ok(inserted)
    }

    /// 가장 최근 캔들 시각.
    pub async fn max_time(&self) -> Result<Option<DateTime<Utc>>> {
        let row: (Option<DateTime<Utc>>,) = sqlx::query_as("SELECT MAX(time) FROM candles")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(row.0)
    }
}

#[async_trait]
impl CandleSource for CandleRepository {
    async fn load_candles(&self, window: TimeWindow) -> ForecastResult<Vec<Candle>> {
        let records = self.find(window).await?;
        Ok(records.iter().map(CandleRecord::to_candle).collect())
    }

    async fn insert_candles(&self, candles: &[Candle]) -> ForecastResult<u64> {
        Ok(self.insert_many(candles).await?)
    }

    async fn latest_time(&self) -> ForecastResult<Option<DateTime<Utc>>> {
        Ok(self.max_time().await?)
    }
}
