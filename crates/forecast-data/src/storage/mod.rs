//! 저장소 구현.
//!
//! - `postgres`: 연결 풀 및 마이그레이션
//! - `candles`, `series_cache`, `futures`, `job_log`: sqlx repository
//! - `memory`: 인메모리 구현 (테스트/오프라인)

pub mod candles;
pub mod futures;
pub mod job_log;
pub mod memory;
pub mod postgres;
pub mod series_cache;

use chrono::{DateTime, Utc};
use forecast_core::TimeWindow;

/// 구간을 `(하한, 상한)` 바인딩 값으로 변환합니다. `None`은 제한 없음.
pub(crate) fn window_bounds(
    window: TimeWindow,
    now: DateTime<Utc>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    (window.lower_bound(now), window.upper_bound())
}
