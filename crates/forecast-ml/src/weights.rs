//! 지수 감쇠 샘플 가중치.

/// `weight[t] = alpha^(n-1-t)`.
///
/// 가장 최근 행의 가중치가 1이며, 앞으로 갈수록 `alpha`배씩 줄어듭니다.
/// 학습 구간에만 적용합니다.
pub fn exp_sample_weights(n: usize, alpha: f64) -> Vec<f64> {
    let mut weights = vec![1.0; n];
    for t in (0..n.saturating_sub(1)).rev() {
        weights[t] = alpha * weights[t + 1];
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_case() {
        assert!(exp_sample_weights(0, 0.9).is_empty());
        assert_eq!(exp_sample_weights(1, 0.5), vec![1.0]);
        assert_eq!(exp_sample_weights(3, 0.5), vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_alpha_one_is_uniform() {
        assert!(exp_sample_weights(50, 1.0).iter().all(|w| *w == 1.0));
    }

    proptest! {
        #[test]
        fn prop_last_is_one_and_ratio_is_alpha(n in 1usize..2000, alpha in 0.0001f64..=1.0) {
            let w = exp_sample_weights(n, alpha);
            prop_assert_eq!(w.len(), n);
            prop_assert_eq!(w[n - 1], 1.0);
            for t in 0..n - 1 {
                prop_assert_eq!(w[t], alpha * w[t + 1]);
            }
        }

        #[test]
        fn prop_close_to_closed_form(n in 1usize..300, alpha in 0.9f64..=1.0) {
            let w = exp_sample_weights(n, alpha);
            for (t, wt) in w.iter().enumerate() {
                let expected = alpha.powi((n - 1 - t) as i32);
                prop_assert!((wt - expected).abs() <= 1e-9 * expected.max(1e-300));
            }
        }
    }
}
