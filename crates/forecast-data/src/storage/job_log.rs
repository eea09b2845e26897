//! 작업 감사 로그 저장소.

use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_core::{ForecastResult, JobLog, JobRecord, JobStatus};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, instrument};

/// `job_logs` 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct JobLogRecord {
    pub id: i64,
    pub job_name: String,
    pub status: String,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobLogRecord {
    pub fn to_job_record(&self) -> Result<JobRecord> {
        let status: JobStatus = self.status.parse().map_err(DataError::InvalidData)?;
        Ok(JobRecord {
            job_name: self.job_name.clone(),
            status,
            message: self.message.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

/// 작업 로그 repository.
#[derive(Clone)]
pub struct JobLogRepository {
    pool: PgPool,
}

impl JobLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, record), fields(job = %record.job_name, status = %record.status))]
    pub async fn insert(&self, record: &JobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_logs (job_name, status, message, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.job_name)
        .bind(record.status.as_str())
        .bind(&record.message)
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(e.to_string()))?;

        debug!("작업 로그 기록");
        Ok(())
    }

    /// 주어진 작업의 마지막 성공 레코드 (id 역순).
    pub async fn find_latest_ok(&self, job_name: &str) -> Result<Option<JobLogRecord>> {
        sqlx::query_as::<_, JobLogRecord>(
            r#"
            SELECT id, job_name, status, message, started_at, finished_at
            FROM job_logs
            WHERE job_name = $1 AND status = 'ok'
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))
    }
}

#[async_trait]
impl JobLog for JobLogRepository {
    async fn record(&self, record: &JobRecord) -> ForecastResult<()> {
        Ok(self.insert(record).await?)
    }

    async fn latest_ok(&self, job_name: &str) -> ForecastResult<Option<JobRecord>> {
        match self.find_latest_ok(job_name).await? {
            Some(record) => Ok(Some(record.to_job_record()?)),
            None => Ok(None),
        }
    }
}
