//! 인메모리 저장소.
//!
//! PostgreSQL 없이 파이프라인 전체를 실행하기 위한 구현입니다. `LastDays`
//! 구간은 `set_now`로 고정한 시각(기본값: 실제 현재 시각)을 기준으로 계산합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_core::{
    CachedSeriesRow, Candle, CandleSource, ForecastError, ForecastResult, FuturesPoint,
    FuturesStore, JobLog, JobRecord, JobStatus, SeriesCacheStore, TimeWindow,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 고정 가능한 기준 시각.
#[derive(Debug, Default)]
struct Clock(Mutex<Option<DateTime<Utc>>>);

impl Clock {
    fn now(&self) -> DateTime<Utc> {
        (*lock(&self.0)).unwrap_or_else(Utc::now)
    }

    fn set(&self, now: DateTime<Utc>) {
        *lock(&self.0) = Some(now);
    }
}

// ================================================================================================
// Candles
// ================================================================================================

/// 인메모리 캔들 소스.
#[derive(Debug, Default)]
pub struct MemoryCandleStore {
    candles: Mutex<BTreeMap<DateTime<Utc>, Candle>>,
    clock: Clock,
    failing: AtomicBool,
}

impl MemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 캔들로 채운 저장소를 생성합니다.
    pub fn with_candles(candles: impl IntoIterator<Item = Candle>) -> Self {
        let store = Self::new();
        {
            let mut map = lock(&store.candles);
            for candle in candles {
                map.entry(candle.time).or_insert(candle);
            }
        }
        store
    }

    /// `LastDays` 구간의 기준 시각을 고정합니다.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.clock.set(now);
    }

    /// 이후 모든 호출을 업스트림 실패로 만듭니다.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        lock(&self.candles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> ForecastResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ForecastError::Database("candle source unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CandleSource for MemoryCandleStore {
    async fn load_candles(&self, window: TimeWindow) -> ForecastResult<Vec<Candle>> {
        self.check()?;
        let now = self.clock.now();
        Ok(lock(&self.candles)
            .values()
            .filter(|c| window.contains(c.time, now))
            .copied()
            .collect())
    }

    async fn insert_candles(&self, candles: &[Candle]) -> ForecastResult<u64> {
        self.check()?;
        let mut map = lock(&self.candles);
        let mut inserted = 0;
        for candle in candles.iter().filter(|c| c.is_finite()) {
            if !map.contains_key(&candle.time) {
                map.insert(candle.time, *candle);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn latest_time(&self) -> ForecastResult<Option<DateTime<Utc>>> {
        self.check()?;
        Ok(lock(&self.candles).keys().next_back().copied())
    }
}

// ================================================================================================
// Series cache
// ================================================================================================

/// 인메모리 시리즈 캐시.
#[derive(Debug, Default)]
pub struct MemorySeriesCache {
    rows: Mutex<BTreeMap<DateTime<Utc>, CachedSeriesRow>>,
    clock: Clock,
}

impl MemorySeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        self.clock.set(now);
    }

    /// 전체 행의 스냅샷 (시간 오름차순).
    pub fn snapshot(&self) -> Vec<CachedSeriesRow> {
        lock(&self.rows).values().cloned().collect()
    }
}

#[async_trait]
impl SeriesCacheStore for MemorySeriesCache {
    async fn upsert_rows(&self, rows: &[CachedSeriesRow]) -> ForecastResult<u64> {
        let mut map = lock(&self.rows);
        for row in rows {
            map.insert(row.time, row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn load_rows(&self, window: TimeWindow) -> ForecastResult<Vec<CachedSeriesRow>> {
        let now = self.clock.now();
        Ok(lock(&self.rows)
            .values()
            .filter(|r| window.contains(r.time, now))
            .cloned()
            .collect())
    }
}

// ================================================================================================
// Futures
// ================================================================================================

/// 인메모리 futures 저장소.
#[derive(Debug, Default)]
pub struct MemoryFuturesStore {
    points: Mutex<BTreeMap<DateTime<Utc>, FuturesPoint>>,
    clock: Clock,
}

impl MemoryFuturesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        self.clock.set(now);
    }

    pub fn snapshot(&self) -> Vec<FuturesPoint> {
        lock(&self.points).values().copied().collect()
    }
}

#[async_trait]
impl FuturesStore for MemoryFuturesStore {
    async fn upsert_points(&self, points: &[FuturesPoint]) -> ForecastResult<u64> {
        let mut map = lock(&self.points);
        for point in points {
            map.insert(point.time, *point);
        }
        Ok(points.len() as u64)
    }

    async fn load_points(&self, window: TimeWindow) -> ForecastResult<Vec<FuturesPoint>> {
        let now = self.clock.now();
        Ok(lock(&self.points)
            .values()
            .filter(|p| window.contains(p.time, now))
            .map(|p| p.sanitized())
            .collect())
    }
}

// ================================================================================================
// Job log
// ================================================================================================

/// 인메모리 작업 로그.
#[derive(Debug, Default)]
pub struct MemoryJobLog {
    records: Mutex<Vec<JobRecord>>,
}

impl MemoryJobLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록된 모든 레코드 (삽입 순서).
    pub fn records(&self) -> Vec<JobRecord> {
        lock(&self.records).clone()
    }
}

#[async_trait]
impl JobLog for MemoryJobLog {
    async fn record(&self, record: &JobRecord) -> ForecastResult<()> {
        lock(&self.records).push(record.clone());
        Ok(())
    }

    async fn latest_ok(&self, job_name: &str) -> ForecastResult<Option<JobRecord>> {
        Ok(lock(&self.records)
            .iter()
            .rev()
            .find(|r| r.job_name == job_name && r.status == JobStatus::Ok)
            .cloned())
    }
}
