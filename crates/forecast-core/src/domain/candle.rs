//! 캔들(OHLCV) 데이터와 조회 구간.
//!
//! - `Candle` - 시간 키를 가진 OHLCV 캔들
//! - `TimeWindow` - 캔들/캐시/futures 조회 구간

use crate::error::{ForecastError, ForecastResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV 캔들.
///
/// `time`은 유일하며 정렬된 시퀀스에서 단조 비감소입니다. 가격은 저장소에서
/// `NUMERIC`으로 보관되고 도메인 경계에서 `f64`로 변환됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn amplitude(&self) -> f64 {
        self.high - self.low
    }

    /// 모든 값이 유한한지 확인합니다.
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// 시간 기준 조회 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeWindow {
    /// `now - days` 이후 (포함)
    LastDays(u32),
    /// `[start, end]` (양 끝 포함)
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// `start` 이후 (포함)
    Since(DateTime<Utc>),
    /// 제한 없음
    All,
}

impl TimeWindow {
    /// `now` 기준 하한 시각을 반환합니다.
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            TimeWindow::LastDays(days) => Some(now - Duration::days(i64::from(days))),
            TimeWindow::Range { start, .. } => Some(start),
            TimeWindow::Since(start) => Some(start),
            TimeWindow::All => None,
        }
    }

    /// 상한 시각을 반환합니다.
    pub fn upper_bound(&self) -> Option<DateTime<Utc>> {
        match *self {
            TimeWindow::Range { end, .. } => Some(end),
            _ => None,
        }
    }

    /// `time`이 구간에 포함되는지 확인합니다.
    pub fn contains(&self, time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let above = self.lower_bound(now).map_or(true, |lo| time >= lo);
        let below = self.upper_bound().map_or(true, |hi| time <= hi);
        above && below
    }
}

/// 간격 문자열(`1m`, `4h`, `1d`, `1w`)을 밀리초로 변환합니다.
pub fn interval_to_ms(interval: &str) -> ForecastResult<i64> {
    let invalid = || ForecastError::InvalidInput(format!("지원하지 않는 간격: {}", interval));

    let unit = interval.chars().last().ok_or_else(invalid)?;
    let value: i64 = interval[..interval.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    let unit_ms = match unit {
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        'w' => 7 * 86_400_000,
        _ => return Err(invalid()),
    };
    if value <= 0 {
        return Err(invalid());
    }
    value.checked_mul(unit_ms).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_amplitude() {
        let candle = Candle::new(at(0), 100.0, 110.0, 95.0, 105.0, 1.0);
        assert_eq!(candle.amplitude(), 15.0);
        assert!(candle.is_finite());
        assert!(!Candle::new(at(0), f64::NAN, 1.0, 1.0, 1.0, 1.0).is_finite());
    }

    #[test]
    fn test_range_is_inclusive() {
        let window = TimeWindow::Range {
            start: at(2),
            end: at(5),
        };
        let now = at(23);
        assert!(window.contains(at(2), now));
        assert!(window.contains(at(5), now));
        assert!(!window.contains(at(1), now));
        assert!(!window.contains(at(6), now));
    }

    #[test]
    fn test_last_days_relative_to_now() {
        let now = at(12);
        let window = TimeWindow::LastDays(1);
        assert!(window.contains(at(12) - Duration::hours(24), now));
        assert!(!window.contains(at(12) - Duration::hours(25), now));
    }

    #[test]
    fn test_interval_to_ms() {
        assert_eq!(interval_to_ms("1m").unwrap(), 60_000);
        assert_eq!(interval_to_ms("15m").unwrap(), 900_000);
        assert_eq!(interval_to_ms("4h").unwrap(), 14_400_000);
        assert_eq!(interval_to_ms("1d").unwrap(), 86_400_000);
        assert_eq!(interval_to_ms("1w").unwrap(), 604_800_000);
        assert!(interval_to_ms("1M").is_err());
        assert!(interval_to_ms("h").is_err());
        assert!(interval_to_ms("").is_err());
        assert!(matches!(
            interval_to_ms("9223372036854775807w"),
            Err(ForecastError::InvalidInput(_))
        ));
    }
}
