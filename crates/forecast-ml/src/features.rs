//! 피처/타깃 정렬.
//!
//! 정렬된 캔들 시퀀스를 "캔들 `i`까지의 상태로 캔들 `i+1`을 예측"하는
//! (피처, 타깃) 쌍으로 변환합니다.
//!
//! | 피처 | 정의 |
//! |------|------|
//! | `close` | 종가 |
//! | `ret` | `close[i] / close[i-1] - 1` |
//! | `acc` | `ret[i] - ret[i-1]` |
//! | `amp` | `high[i] - low[i]` |
//! | `vol_rel` | `volume[i] / mean(volume[i-9..=i])` |
//!
//! 첫 10개 행(`i < 10`)과 다음 캔들이 없는 마지막 행은 제외됩니다. 피처나 타깃에
//! 유한하지 않은 값이 있는 행도 채우지 않고 제외합니다.

use crate::types::{FeatureRow, RegTarget, TargetRow, NUM_FEATURES};
use chrono::{DateTime, Utc};
use forecast_core::Candle;
use std::collections::HashMap;

/// `vol_rel` 평균 거래량 윈도우.
pub const VOLUME_WINDOW: usize = 10;

/// 첫 유효 피처 행의 인덱스.
pub const FIRST_VALID_INDEX: usize = VOLUME_WINDOW;

/// 한 행이라도 만들기 위해 필요한 최소 캔들 수.
pub const MIN_CANDLES: usize = FIRST_VALID_INDEX + 2;

/// 같은 인덱스 집합을 공유하는 (보존된 캔들, 피처, 타깃).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedFrame {
    /// 보존된 캔들 (행 `k`의 실제 캔들)
    pub candles: Vec<Candle>,
    pub features: Vec<FeatureRow>,
    pub targets: Vec<TargetRow>,
}

impl AlignedFrame {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// 모델 입력 행렬 (`FEATURE_COLS` 순서).
    pub fn feature_matrix(&self) -> Vec<[f64; NUM_FEATURES]> {
        self.features.iter().map(FeatureRow::to_array).collect()
    }

    /// 회귀 타깃 열.
    pub fn target_column(&self, target: RegTarget) -> Vec<f64> {
        self.targets.iter().map(|t| t.get(target)).collect()
    }

    /// 방향 레이블 (0.0 / 1.0).
    pub fn direction_labels(&self) -> Vec<f64> {
        self.targets.iter().map(|t| f64::from(t.dir_next)).collect()
    }

    /// "다음 캔들 시각" → 행 인덱스.
    ///
    /// 타깃 시각 기준 조회(증분 예측)에 사용합니다.
    pub fn successor_index(&self) -> HashMap<DateTime<Utc>, usize> {
        self.targets
            .iter()
            .enumerate()
            .map(|(k, t)| (t.next_time, k))
            .collect()
    }
}

/// 캔들 시퀀스에서 정렬된 피처/타깃을 만듭니다.
///
/// 입력은 시간 오름차순이어야 합니다. 캔들이 `MIN_CANDLES`보다 적으면 빈 프레임을
/// 반환합니다 (데이터 부족, 에러 아님).
pub fn build_features_targets(candles: &[Candle]) -> AlignedFrame {
    let n = candles.len();
    let mut frame = AlignedFrame::default();
    if n < MIN_CANDLES {
        return frame;
    }

    for i in FIRST_VALID_INDEX..n - 1 {
        let cur = &candles[i];
        let prev = &candles[i - 1];
        let prev2 = &candles[i - 2];
        let next = &candles[i + 1];

        let ret = cur.close / prev.close - 1.0;
        let ret_prev = prev.close / prev2.close - 1.0;
        let mean_volume = candles[i + 1 - VOLUME_WINDOW..=i]
            .iter()
            .map(|c| c.volume)
            .sum::<f64>()
            / VOLUME_WINDOW as f64;

        let features = FeatureRow {
            close: cur.close,
            ret,
            acc: ret - ret_prev,
            amp: cur.amplitude(),
            vol_rel: cur.volume / mean_volume,
        };

        let target = TargetRow {
            next_time: next.time,
            open_next: next.open,
            high_next: next.high,
            low_next: next.low,
            close_next: next.close,
            amp_next: next.amplitude(),
            dir_next: u8::from(next.close > cur.close),
        };

        if features.is_finite() && target.is_finite() && cur.is_finite() {
            frame.candles.push(*cur);
            frame.features.push(features);
            frame.targets.push(target);
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn create_test_candles(count: usize) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1;
                Candle::new(
                    t0 + Duration::hours(i as i64),
                    close - 0.3,
                    close + 1.0,
                    close - 1.2,
                    close,
                    50.0 + (i % 7) as f64,
                )
            })
            .collect()
    }

    #[test]
    fn test_row_count() {
        for n in [0, 1, 5, 11] {
            assert!(build_features_targets(&create_test_candles(n)).is_empty());
        }
        assert_eq!(build_features_targets(&create_test_candles(12)).len(), 1);
        assert_eq!(build_features_targets(&create_test_candles(100)).len(), 89);
    }

    #[test]
    fn test_feature_values() {
        let candles = create_test_candles(30);
        let frame = build_features_targets(&candles);

        // 첫 행은 캔들 10
        let row = frame.features[0];
        let c = &candles;
        let ret = c[10].close / c[9].close - 1.0;
        let ret_prev = c[9].close / c[8].close - 1.0;
        let mean_vol: f64 = c[1..=10].iter().map(|x| x.volume).sum::<f64>() / 10.0;

        assert_eq!(frame.candles[0].time, c[10].time);
        assert_eq!(row.close, c[10].close);
        assert!((row.ret - ret).abs() < 1e-12);
        assert!((row.acc - (ret - ret_prev)).abs() < 1e-12);
        assert!((row.amp - 2.2).abs() < 1e-9);
        assert!((row.vol_rel - c[10].volume / mean_vol).abs() < 1e-12);
    }

    #[test]
    fn test_targets_describe_successor() {
        let candles = create_test_candles(40);
        let frame = build_features_targets(&candles);

        for (k, target) in frame.targets.iter().enumerate() {
            let i = k + FIRST_VALID_INDEX;
            assert_eq!(target.next_time, candles[i + 1].time);
            assert_eq!(target.close_next, candles[i + 1].close);
            assert_eq!(target.amp_next, candles[i + 1].high - candles[i + 1].low);
            assert_eq!(target.dir_next == 1, candles[i + 1].close > candles[i].close);
        }
        // 마지막 캔들은 다음 캔들이 없으므로 보존되지 않음
        assert_eq!(frame.candles.last().unwrap().time, candles[38].time);
    }

    #[test]
    fn test_non_finite_rows_dropped() {
        let mut candles = create_test_candles(30);
        // 종가 0 → 다음 행의 ret가 무한대
        candles[15].close = 0.0;
        let frame = build_features_targets(&candles);

        assert!(frame.features.iter().all(|f| f.is_finite()));
        assert!(frame.len() < 19);
        assert!(frame
            .candles
            .iter()
            .all(|c| c.time != candles[16].time && c.time != candles[17].time));
    }

    #[test]
    fn test_successor_index() {
        let candles = create_test_candles(20);
        let frame = build_features_targets(&candles);
        let index = frame.successor_index();

        assert_eq!(index.get(&candles[19].time), Some(&(frame.len() - 1)));
        assert_eq!(index.get(&candles[11].time), Some(&0));
        // 첫 보존 캔들(10)은 어떤 행의 다음 캔들도 아님
        assert!(index.get(&candles[10].time).is_none());
    }
}
