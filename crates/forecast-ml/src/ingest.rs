//! 캔들 수집 작업.
//!
//! - `ingest`: 최근 캔들을 받아 삽입하고, 마지막으로 마감된 캔들의 futures 갱신
//! - `backfill`: `now - days`부터 현재까지 구간 단위로 반복 수집

use crate::error::{MlError, MlResult};
use crate::incremental::FuturesUpdater;
use crate::types::JobOutcome;
use chrono::{Duration, Utc};
use forecast_core::{interval_to_ms, CandleFeed, CandleSource, IngestConfig, JobLog, JobRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// 거래소 요청당 최대 캔들 수.
pub const MAX_KLINE_LIMIT: u32 = 1000;

/// 최근 캔들 수집 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub fetched: usize,
    pub inserted: u64,
    pub futures_updated: u64,
}

/// 백필 파라미터. 비어 있는 값은 설정 기본값을 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillParams {
    pub days: Option<u32>,
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub sleep_ms: Option<u64>,
    pub limit: Option<u32>,
}

/// 백필 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub symbol: String,
    pub interval: String,
    pub days: u32,
    pub fetched: usize,
    pub inserted: u64,
    /// 거래소 호출 횟수
    pub calls: usize,
}

/// 수집 작업 실행기.
pub struct Ingestor {
    feed: Arc<dyn CandleFeed>,
    candles: Arc<dyn CandleSource>,
    futures: Arc<FuturesUpdater>,
    job_log: Arc<dyn JobLog>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        feed: Arc<dyn CandleFeed>,
        candles: Arc<dyn CandleSource>,
        futures: Arc<FuturesUpdater>,
        job_log: Arc<dyn JobLog>,
        config: IngestConfig,
    ) -> Self {
        Self {
            feed,
            candles,
            futures,
            job_log,
            config,
        }
    }

    async fn record(&self, record: JobRecord) {
        if let Err(e) = self.job_log.record(&record).await {
            warn!(error = %e, "Failed to write job log");
        }
    }

    /// 최근 캔들을 수집합니다.
    #[instrument(skip(self), fields(job = "ingest", symbol = %self.config.symbol))]
    pub async fn ingest(&self) -> JobOutcome<IngestReport> {
        let started_at = Utc::now();

        match self.run_ingest().await {
            Ok(report) => {
                info!(
                    fetched = report.fetched,
                    inserted = report.inserted,
                    futures_updated = report.futures_updated,
                    "Ingest completed"
                );
                let message = format!(
                    "Inserted {}; futures_updated {}",
                    report.inserted, report.futures_updated
                );
                self.record(JobRecord::ok("ingest", message, started_at, Utc::now()))
                    .await;
                JobOutcome::Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Ingest failed");
                self.record(JobRecord::error("ingest", e.to_string(), started_at, Utc::now()))
                    .await;
                e.into()
            }
        }
    }

    async fn run_ingest(&self) -> MlResult<IngestReport> {
        let fetched = self
            .feed
            .fetch_recent(&self.config.symbol, &self.config.interval, self.config.limit)
            .await?;
        let inserted = self.candles.insert_candles(&fetched).await?;

        // 마지막 캔들은 아직 진행 중이므로 그 직전 캔들을 갱신
        let futures_updated = match fetched.len().checked_sub(2).map(|i| fetched[i].time) {
            Some(last_closed) => match self.futures.update_incremental(&[last_closed]).await {
                JobOutcome::Ok(report) => report.written,
                other => {
                    warn!(status = other.status(), "Futures update after ingest produced no rows");
                    0
                }
            },
            None => 0,
        };

        Ok(IngestReport {
            fetched: fetched.len(),
            inserted,
            futures_updated,
        })
    }

    /// 과거 캔들을 백필합니다.
    #[instrument(skip(self), fields(job = "backfill"))]
    pub async fn backfill(&self, params: BackfillParams) -> JobOutcome<BackfillReport> {
        let started_at = Utc::now();

        match self.run_backfill(params).await {
            Ok(report) => {
                info!(
                    fetched = report.fetched,
                    inserted = report.inserted,
                    calls = report.calls,
                    "Backfill completed"
                );
                let message = format!(
                    "Backfill {} {} {}d: fetched={}, inserted={}, calls={}",
                    report.symbol, report.interval, report.days, report.fetched, report.inserted, report.calls
                );
                self.record(JobRecord::ok("backfill", message, started_at, Utc::now()))
                    .await;
                JobOutcome::Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Backfill failed");
                self.record(JobRecord::error("backfill", e.to_string(), started_at, Utc::now()))
                    .await;
                e.into()
            }
        }
    }

    async fn run_backfill(&self, params: BackfillParams) -> MlResult<BackfillReport> {
        let days = params.days.unwrap_or(self.config.backfill_days);
        let symbol = params.symbol.unwrap_or_else(|| self.config.symbol.clone());
        let interval = params.interval.unwrap_or_else(|| self.config.interval.clone());
        let sleep_ms = params.sleep_ms.unwrap_or(self.config.backfill_sleep_ms);
        let limit = params.limit.unwrap_or(self.config.backfill_limit);

        if days == 0 || limit == 0 || limit > MAX_KLINE_LIMIT {
            return Err(MlError::InvalidInput(format!(
                "backfill requires days >= 1 and 1 <= limit <= {} (days={}, limit={})",
                MAX_KLINE_LIMIT, days, limit
            )));
        }
        let interval_ms = interval_to_ms(&interval)?;

        let now_ms = Utc::now().timestamp_millis();
        let mut current_ms = (Utc::now() - Duration::days(i64::from(days))).timestamp_millis();
        let mut report = BackfillReport {
            symbol,
            interval,
            days,
            fetched: 0,
            inserted: 0,
            calls: 0,
        };

        loop {
            let batch = self
                .feed
                .fetch_window(&report.symbol, &report.interval, current_ms, limit)
                .await?;
            report.calls += 1;

            let Some(last) = batch.last() else {
                break;
            };
            let last_open_ms = last.time.timestamp_millis();
            report.inserted += self.candles.insert_candles(&batch).await?;
            report.fetched += batch.len();
            debug!(calls = report.calls, batch = batch.len(), "Backfill window stored");

            let next_ms = last_open_ms + interval_ms;
            if next_ms >= now_ms || next_ms <= current_ms {
                break;
            }
            current_ms = next_ms;

            if sleep_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
            }
        }

        Ok(report)
    }
}
