//! 통합 테스트 공용 헬퍼.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use forecast_core::{
    BoostingConfig, Candle, CandleFeed, ForecastResult, FuturesConfig, IngestConfig, SeriesConfig, TrainingConfig,
};
use forecast_data::{MemoryCandleStore, MemoryFuturesStore, MemoryJobLog, MemorySeriesCache};
use forecast_ml::{FuturesUpdater, Ingestor, MemoryModelStore, MetricsReader, SeriesMaterializer, Trainer};
use std::sync::{Arc, Mutex};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// 시간봉 캔들. 추세 + 주기 성분으로 결정적입니다.
pub fn hourly_candles(start: DateTime<Utc>, from: usize, count: usize) -> Vec<Candle> {
    (from..from + count)
        .map(|i| {
            let x = i as f64;
            let close = 30_000.0 + x * 2.0 + (x * 0.35).sin() * 120.0 + (x * 0.07).cos() * 60.0;
            let open = close - (x * 0.5).sin() * 15.0;
            let high = open.max(close) + 20.0 + (i % 5) as f64 * 3.0;
            let low = open.min(close) - 18.0 - (i % 3) as f64 * 4.0;
            let volume = 100.0 + (x * 0.9).sin().abs() * 50.0 + (i % 7) as f64;
            Candle::new(start + Duration::hours(i as i64), open, high, low, close, volume)
        })
        .collect()
}

/// 빠른 테스트용 학습 설정.
pub fn training_config() -> TrainingConfig {
    TrainingConfig {
        lookback_days: 30,
        alpha_decay: 0.999,
        boosting: BoostingConfig {
            n_estimators: 20,
            max_depth: 3,
            ..BoostingConfig::default()
        },
        ..TrainingConfig::default()
    }
}

/// 인메모리 저장소로 구성한 파이프라인.
pub struct Harness {
    pub candles: Arc<MemoryCandleStore>,
    pub cache: Arc<MemorySeriesCache>,
    pub futures: Arc<MemoryFuturesStore>,
    pub models: Arc<MemoryModelStore>,
    pub job_log: Arc<MemoryJobLog>,
}

impl Harness {
    /// 마지막 캔들 1시간 뒤를 현재 시각으로 고정합니다.
    pub fn new(candles: Vec<Candle>) -> Self {
        let now = candles.last().map(|c| c.time + Duration::hours(1)).unwrap_or_else(t0);
        let harness = Self {
            candles: Arc::new(MemoryCandleStore::with_candles(candles)),
            cache: Arc::new(MemorySeriesCache::new()),
            futures: Arc::new(MemoryFuturesStore::new()),
            models: Arc::new(MemoryModelStore::new()),
            job_log: Arc::new(MemoryJobLog::new()),
        };
        harness.set_now(now);
        harness
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        self.candles.set_now(now);
        self.cache.set_now(now);
        self.futures.set_now(now);
    }

    pub fn trainer(&self) -> Trainer {
        Trainer::new(
            self.candles.clone(),
            self.models.clone(),
            self.job_log.clone(),
            training_config(),
        )
    }

    pub fn materializer(&self) -> SeriesMaterializer {
        SeriesMaterializer::new(
            self.candles.clone(),
            self.cache.clone(),
            self.models.clone(),
            self.job_log.clone(),
            SeriesConfig::default(),
        )
    }

    pub fn futures_updater(&self) -> FuturesUpdater {
        FuturesUpdater::new(
            self.candles.clone(),
            self.futures.clone(),
            self.models.clone(),
            self.job_log.clone(),
            FuturesConfig::default(),
        )
    }

    pub fn metrics_reader(&self) -> MetricsReader {
        MetricsReader::new(self.candles.clone(), self.job_log.clone(), training_config())
    }

    pub fn ingestor(&self, feed: Arc<dyn CandleFeed>, config: IngestConfig) -> Ingestor {
        Ingestor::new(
            feed,
            self.candles.clone(),
            Arc::new(self.futures_updater()),
            self.job_log.clone(),
            config,
        )
    }

    /// 주어진 작업의 (이름, 상태) 목록.
    pub fn job_statuses(&self, job_name: &str) -> Vec<String> {
        self.job_log
            .records()
            .iter()
            .filter(|r| r.job_name == job_name)
            .map(|r| r.status.to_string())
            .collect()
    }
}

/// 고정 데이터를 돌려주는 kline 피드.
pub struct FakeFeed {
    recent: Vec<Candle>,
    /// 이 시각 이전의 캔들만 생성
    end: DateTime<Utc>,
    pub window_requests: Mutex<Vec<i64>>,
}

impl FakeFeed {
    pub fn new(recent: Vec<Candle>, end: DateTime<Utc>) -> Self {
        Self {
            recent,
            end,
            window_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<i64> {
        self.window_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandleFeed for FakeFeed {
    async fn fetch_recent(&self, _symbol: &str, _interval: &str, limit: u32) -> ForecastResult<Vec<Candle>> {
        let skip = self.recent.len().saturating_sub(limit as usize);
        Ok(self.recent[skip..].to_vec())
    }

    async fn fetch_window(
        &self,
        _symbol: &str,
        _interval: &str,
        start_ms: i64,
        limit: u32,
    ) -> ForecastResult<Vec<Candle>> {
        self.window_requests.lock().unwrap().push(start_ms);
        let end_ms = self.end.timestamp_millis();
        Ok((0..limit as i64)
            .map(|k| start_ms + k * 3_600_000)
            .take_while(|ms| *ms < end_ms)
            .map(|ms| {
                let time = Utc.timestamp_millis_opt(ms).unwrap();
                Candle::new(time, 100.0, 101.0, 99.0, 100.5, 10.0)
            })
            .collect())
    }
}
