//! 실제값 × 예측값 시리즈 타입.
//!
//! - `CachedSeriesRow` - `series_cache` 테이블의 한 행 (소스 시각 키)
//! - `SeriesPoint` - 호출자에게 제공되는 포인트 (real / pred / cls / err)
//! - `FuturesPoint` - `futures` 테이블의 한 행 (타깃 시각 키)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 유한한 값만 통과시킵니다. NaN/Inf는 `None`이 됩니다.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// `Option<f64>` 버전의 [`finite`].
pub fn finite_opt(value: Option<f64>) -> Option<f64> {
    value.and_then(finite)
}

/// `series_cache` 테이블의 한 행.
///
/// `time`의 실제 캔들, `time`의 피처로 만든 다음 캔들 예측, 그리고 다음 캔들이
/// 존재할 때만 채워지는 오차 필드를 담습니다.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CachedSeriesRow {
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

impl CachedSeriesRow {
    /// 저장된 행을 제공용 포인트로 변환합니다.
    ///
    /// `pred`는 `pred_close_next`, `cls`는 `cls_dir_next`, `err`는
    /// `err_close_abs`가 있을 때만 존재합니다.
    pub fn to_point(&self) -> SeriesPoint {
        let real = RealPoint {
            time: self.time,
            open: finite_opt(self.open),
            high: finite_opt(self.high),
            low: finite_opt(self.low),
            close: finite_opt(self.close),
            volume: finite_opt(self.volume),
        };

        let pred = finite_opt(self.pred_close_next).map(|close_next| PredPoint {
            open_next: finite_opt(self.pred_open_next),
            high_next: finite_opt(self.pred_high_next),
            low_next: finite_opt(self.pred_low_next),
            close_next,
            amp_next: finite_opt(self.pred_amp_next),
        });

        let cls = self.cls_dir_next.map(|dir_next| ClsPoint {
            dir_next,
            prob_up: finite_opt(self.prob_up),
            prob_down: finite_opt(self.prob_down),
        });

        let err = finite_opt(self.err_close_abs).map(|close_abs| ErrPoint {
            close_abs,
            close_signed: finite_opt(self.err_close_signed),
            amp_abs: finite_opt(self.err_amp_abs),
        });

        SeriesPoint {
            real,
            pred,
            cls,
            err,
        }
    }
}

/// 실제 캔들 값.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealPoint {
    pub time: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// 다음 캔들에 대한 회귀 예측.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredPoint {
    pub open_next: Option<f64>,
    pub high_next: Option<f64>,
    pub low_next: Option<f64>,
    pub close_next: f64,
    pub amp_next: Option<f64>,
}

/// 방향 분류 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClsPoint {
    /// 1 = 상승, 0 = 비상승
    pub dir_next: i32,
    pub prob_up: Option<f64>,
    pub prob_down: Option<f64>,
}

/// 다음 실제 캔들 대비 오차.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrPoint {
    pub close_abs: f64,
    pub close_signed: Option<f64>,
    pub amp_abs: Option<f64>,
}

/// 시리즈 포인트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub real: RealPoint,
    pub pred: Option<PredPoint>,
    pub cls: Option<ClsPoint>,
    pub err: Option<ErrPoint>,
}

/// `futures` 테이블의 한 행. `time`은 예측 대상 캔들의 시각입니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuturesPoint {
    pub time: DateTime<Utc>,
    pub pred_close: Option<f64>,
    pub real_close: Option<f64>,
    pub err_close: Option<f64>,
}

impl FuturesPoint {
    /// NaN/Inf 값을 제거한 사본을 반환합니다.
    pub fn sanitized(self) -> Self {
        Self {
            time: self.time,
            pred_close: finite_opt(self.pred_close),
            real_close: finite_opt(self.real_close),
            err_close: finite_opt(self.err_close),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row() -> CachedSeriesRow {
        CachedSeriesRow {
            time: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            open: Some(1.0),
            high: Some(2.0),
            low: Some(0.5),
            close: Some(1.5),
            volume: Some(10.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_real_only_row() {
        let point = row().to_point();
        assert_eq!(point.real.close, Some(1.5));
        assert!(point.pred.is_none());
        assert!(point.cls.is_none());
        assert!(point.err.is_none());
    }

    #[test]
    fn test_presence_follows_key_columns() {
        let mut r = row();
        r.pred_open_next = Some(1.1);
        r.cls_dir_next = Some(1);
        r.prob_up = Some(f64::NAN);
        r.err_close_signed = Some(-0.2);
        let point = r.to_point();

        // pred_close_next가 없으면 나머지 예측 필드가 있어도 pred는 없음
        assert!(point.pred.is_none());
        let cls = point.cls.unwrap();
        assert_eq!(cls.dir_next, 1);
        assert_eq!(cls.prob_up, None);
        assert!(point.err.is_none());
    }

    #[test]
    fn test_futures_point_sanitized() {
        let p = FuturesPoint {
            time: Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap(),
            pred_close: Some(f64::INFINITY),
            real_close: Some(3.0),
            err_close: None,
        }
        .sanitized();
        assert_eq!(p.pred_close, None);
        assert_eq!(p.real_close, Some(3.0));
    }
}
