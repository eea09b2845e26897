//! 재계산된 시리즈 캐시 저장소.
//!
//! 한 행 = 한 캔들 시각. 재계산 시 같은 시각의 행은 통째로 덮어씁니다.

use super::window_bounds;
use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_core::{CachedSeriesRow, ForecastResult, SeriesCacheStore, TimeWindow};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{info, instrument};

/// `series_cache` 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct SeriesCacheRecord {
    pub time: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub pred_open_next: Option<f64>,
    pub pred_high_next: Option<f64>,
    pub pred_low_next: Option<f64>,
    pub pred_close_next: Option<f64>,
    pub pred_amp_next: Option<f64>,
    pub cls_dir_next: Option<i32>,
    pub prob_up: Option<f64>,
    pub prob_down: Option<f64>,
    pub err_close_abs: Option<f64>,
    pub err_close_signed: Option<f64>,
    pub err_amp_abs: Option<f64>,
}

impl From<SeriesCacheRecord> for CachedSeriesRow {
    fn from(r: SeriesCacheRecord) -> Self {
        CachedSeriesRow {
            time: r.time,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
            pred_open_next: r.pred_open_next,
            pred_high_next: r.pred_high_next,
            pred_low_next: r.pred_low_next,
            pred_close_next: r.pred_close_next,
            pred_amp_next: r.pred_amp_next,
            cls_dir_next: r.cls_dir_next,
            prob_up: r.prob_up,
            prob_down: r.prob_down,
            err_close_abs: r.err_close_abs,
            err_close_signed: r.err_close_signed,
            err_amp_abs: r.err_amp_abs,
        }
    }
}

/// 시리즈 캐시 repository.
#[derive(Clone)]
pub struct SeriesCacheRepository {
    pool: PgPool,
}

impl SeriesCacheRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 행 일괄 upsert.
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn upsert_many(&self, rows: &[CachedSeriesRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut affected = 0;

        for chunk in rows.chunks(500) {
            let col = |f: fn(&CachedSeriesRow) -> Option<f64>| -> Vec<Option<f64>> {
                chunk.iter().map(f).collect()
            };
            let times: Vec<DateTime<Utc>> = chunk.iter().map(|r| r.time).collect();
            let cls: Vec<Option<i32>> = chunk.iter().map(|r| r.cls_dir_next).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO series_cache (
                    time, open, high, low, close, volume,
                    pred_open_next, pred_high_next, pred_low_next, pred_close_next, pred_amp_next,
                    cls_dir_next, prob_up, prob_down,
                    err_close_abs, err_close_signed, err_amp_abs
                )
                SELECT * FROM UNNEST(
                    $1::timestamptz[],
                    $2::float8[], $3::float8[], $4::float8[], $5::float8[], $6::float8[],
                    $7::float8[], $8::float8[], $9::float8[], $10::float8[], $11::float8[],
                    $12::int4[], $13::float8[], $14::float8[],
                    $15::float8[], $16::float8[], $17::float8[]
                )
                ON CONFLICT (time) DO UPDATE SET
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume,
                    pred_open_next = EXCLUDED.pred_open_next,
                    pred_high_next = EXCLUDED.pred_high_next,
                    pred_low_next = EXCLUDED.pred_low_next,
                    pred_close_next = EXCLUDED.pred_close_next,
                    pred_amp_next = EXCLUDED.pred_amp_next,
                    cls_dir_next = EXCLUDED.cls_dir_next,
                    prob_up = EXCLUDED.prob_up,
                    prob_down = EXCLUDED.prob_down,
                    err_close_abs = EXCLUDED.err_close_abs,
                    err_close_signed = EXCLUDED.err_close_signed,
                    err_amp_abs = EXCLUDED.err_amp_abs,
                    updated_at = NOW()
                "#,
            )
            .bind(&times)
            .bind(col(|r| r.open))
            .bind(col(|r| r.high))
            .bind(col(|r| r.low))
            .bind(col(|r| r.close))
            .bind(col(|r| r.volume))
            .bind(col(|r| r.pred_open_next))
            .bind(col(|r| r.pred_high_next))
            .bind(col(|r| r.pred_low_next))
            .bind(col(|r| r.pred_close_next))
            .bind(col(|r| r.pred_amp_next))
            .bind(&cls)
            .bind(col(|r| r.prob_up))
            .bind(col(|r| r.prob_down))
            .bind(col(|r| r.err_close_abs))
            .bind(col(|r| r.err_close_signed))
            .bind(col(|r| r.err_amp_abs))
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            affected += result.rows_affected();
        }

        info!(upserted = affected, "시리즈 캐시 저장");
        Ok(affected)
    }

    /// 구간 내 캐시 행 조회.
    #[instrument(skip(self))]
    pub async fn find(&self, window: TimeWindow) -> Result<Vec<SeriesCacheRecord>> {
        let (lower, upper) = window_bounds(window, Utc::now());

        sqlx::query_as::<_, SeriesCacheRecord>(
            r#"
            SELECT time, open, high, low, close, volume,
                   pred_open_next, pred_high_next, pred_low_next, pred_close_next, pred_amp_next,
                   cls_dir_next, prob_up, prob_down,
                   err_close_abs, err_close_signed, err_amp_abs
            FROM series_cache
            WHERE ($1::timestamptz IS NULL OR time >= $1)
              AND ($2::timestamptz IS NULL OR time <= $2)
            ORDER BY time
            "#,
        )
        .bind(lower)
        .bind(upper)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))
    }
}

#[async_trait]
impl SeriesCacheStore for SeriesCacheRepository {
    async fn upsert_rows(&self, rows: &[CachedSeriesRow]) -> ForecastResult<u64> {
        Ok(self.upsert_many(rows).await?)
    }

    async fn load_rows(&self, window: TimeWindow) -> ForecastResult<Vec<CachedSeriesRow>> {
        let records = self.find(window).await?;
        Ok(records.into_iter().map(CachedSeriesRow::from).collect())
    }
}
