//! 파이프라인 구성.

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use forecast_core::{
    CandleFeed, CandleSource, ForecastConfig, FuturesStore, JobLog, SeriesCacheStore, TimeWindow,
};
use forecast_data::{
    BinanceKlineClient, CandleRepository, Database, FuturesRepository, JobLogRepository, SeriesCacheRepository,
};
use forecast_ml::{FileModelStore, FuturesUpdater, Ingestor, MetricsReader, ModelStore, SeriesMaterializer, Trainer};
use std::sync::Arc;

/// 설정과 저장소로 조립한 작업 컴포넌트.
pub struct Pipeline {
    pub config: ForecastConfig,
    pub trainer: Trainer,
    pub materializer: SeriesMaterializer,
    pub futures: Arc<FuturesUpdater>,
    pub ingestor: Ingestor,
    pub metrics: MetricsReader,
}

impl Pipeline {
    /// 저장소 구현을 받아 컴포넌트를 생성합니다.
    pub fn build(
        config: ForecastConfig,
        candles: Arc<dyn CandleSource>,
        cache: Arc<dyn SeriesCacheStore>,
        futures_store: Arc<dyn FuturesStore>,
        job_log: Arc<dyn JobLog>,
        models: Arc<dyn ModelStore>,
        feed: Arc<dyn CandleFeed>,
    ) -> Self {
        let trainer = Trainer::new(
            candles.clone(),
            models.clone(),
            job_log.clone(),
            config.training.clone(),
        );
        let materializer = SeriesMaterializer::new(
            candles.clone(),
            cache,
            models.clone(),
            job_log.clone(),
            config.series.clone(),
        );
        let futures = Arc::new(FuturesUpdater::new(
            candles.clone(),
            futures_store,
            models,
            job_log.clone(),
            config.futures.clone(),
        ));
        let ingestor = Ingestor::new(
            feed,
            candles.clone(),
            futures.clone(),
            job_log.clone(),
            config.ingest.clone(),
        );
        let metrics = MetricsReader::new(candles, job_log, config.training.clone());

        Self {
            config,
            trainer,
            materializer,
            futures,
            ingestor,
            metrics,
        }
    }

    /// PostgreSQL 저장소, 파일 모델 저장소, Binance 피드로 구성합니다.
    pub fn postgres(config: ForecastConfig, db: &Database) -> anyhow::Result<Self> {
        let pool = db.pool().clone();
        let feed = BinanceKlineClient::new(&config.ingest).context("failed to build Binance client")?;
        let models = FileModelStore::from_config(&config.models);

        Ok(Self::build(
            config,
            Arc::new(CandleRepository::new(pool.clone())),
            Arc::new(SeriesCacheRepository::new(pool.clone())),
            Arc::new(FuturesRepository::new(pool.clone())),
            Arc::new(JobLogRepository::new(pool)),
            Arc::new(models),
            Arc::new(feed),
        ))
    }

    /// 학습 구간 일수.
    pub fn lookback_days(&self) -> u32 {
        self.config.training.lookback_days
    }
}

/// RFC 3339 또는 `YYYY-MM-DD`(자정, UTC) 시각을 파싱합니다.
pub fn parse_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(t) = date.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }
    bail!("invalid time '{}': expected RFC 3339 or YYYY-MM-DD", value)
}

/// `--start`/`--end` 쌍을 조회 구간으로 변환합니다.
///
/// 둘 다 있으면 `Range`, 둘 다 없으면 `fallback`. 하나만 주어지면 에러입니다.
pub fn window_from_args(
    start: Option<&str>,
    end: Option<&str>,
    fallback: TimeWindow,
) -> anyhow::Result<TimeWindow> {
    match (start, end) {
        (Some(start), Some(end)) => {
            let (start, end) = (parse_time(start)?, parse_time(end)?);
            if start > end {
                bail!("start {} is after end {}", start, end);
            }
            Ok(TimeWindow::Range { start, end })
        }
        (None, None) => Ok(fallback),
        _ => bail!("--start and --end must be given together"),
    }
}

/// 출력용 설정. 비밀 값은 가립니다.
pub fn redacted_config(config: &ForecastConfig) -> ForecastConfig {
    let mut shown = config.clone();
    if shown.ingest.api_key.is_some() {
        shown.ingest.api_key = Some("***".to_string());
    }
    if let (Some(scheme_end), Some(at)) = (shown.database.url.find("://"), shown.database.url.rfind('@')) {
        if scheme_end + 3 < at {
            shown.database.url.replace_range(scheme_end + 3..at, "***");
        }
    }
    shown
}
