//! 증분 예측(futures) 저장소. 키는 예측 대상 캔들의 시각입니다.

use super::window_bounds;
use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_core::{ForecastResult, FuturesPoint, FuturesStore, TimeWindow};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{info, instrument};

/// `futures` 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct FuturesRecord {
    pub time: DateTime<Utc>,
    pub pred_close: Option<f64>,
    pub real_close: Option<f64>,
    pub err_close: Option<f64>,
}

impl FuturesRecord {
    pub fn to_point(&self) -> FuturesPoint {
        FuturesPoint {
            time: self.time,
            pred_close: self.pred_close,
            real_close: self.real_close,
            err_close: self.err_close,
        }
        .sanitized()
    }
}

/// futures repository.
#[derive(Clone)]
pub struct FuturesRepository {
    pool: PgPool,
}

impl FuturesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, points), fields(count = points.len()))]
    pub async fn upsert_many(&self, points: &[FuturesPoint]) -> Result<u64> {
        if points.is_empty() {
            return Ok(0);
        }

        let times: Vec<DateTime<Utc>> = points.iter().map(|p| p.time).collect();
        let preds: Vec<Option<f64>> = points.iter().map(|p| p.pred_close).collect();
        let reals: Vec<Option<f64>> = points.iter().map(|p| p.real_close).collect();
        let errs: Vec<Option<f64>> = points.iter().map(|p| p.err_close).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO futures (time, pred_close, real_close, err_close)
            SELECT * FROM UNNEST($1::timestamptz[], $2::float8[], $3::float8[], $4::float8[])
            ON CONFLICT (time) DO UPDATE SET
                pred_close = EXCLUDED.pred_close,
                real_close = EXCLUDED.real_close,
                err_close = EXCLUDED.err_close,
                updated_at = NOW()
            "#,
        )
        .bind(&times)
        .bind(&preds)
        .bind(&reals)
        .bind(&errs)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(e.to_string()))?;

        info!(upserted = result.rows_affected(), "futures 저장");
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    pub async fn find(&self, window: TimeWindow) -> Result<Vec<FuturesRecord>> {
        let (lower, upper) = window_bounds(window, Utc::now());

        sqlx::query_as::<_, FuturesRecord>(
            r#"
            SELECT time, pred_close, real_close, err_close
            FROM futures
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
impl FuturesStore for FuturesRepository {
    async fn upsert_points(&self, points: &[FuturesPoint]) -> ForecastResult<u64> {
        Ok(self.upsert_many(points).await?)
    }

    async fn load_points(&self, window: TimeWindow) -> ForecastResult<Vec<FuturesPoint>> {
        let records = self.find(window).await?;
        Ok(records.iter().map(FuturesRecord::to_point).collect())
    }
}
