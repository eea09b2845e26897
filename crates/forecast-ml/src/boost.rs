//! 가중치 그래디언트 부스팅 트리.
//!
//! 히스토그램 기반 2차(gradient/hessian) 부스팅입니다. 샘플 가중치는 각 행의
//! gradient와 hessian에 곱해집니다.
//!
//! - 리프 값: `-G / (H + lambda)` (학습률 적용 후 저장)
//! - 분할 이득: `GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)`
//! - 분할 규칙: `x[feature] <= threshold` 이면 왼쪽
//!
//! 트리마다 시드 고정 RNG로 행(Bernoulli)과 열을 서브샘플링하므로 같은 입력과
//! 파라미터에 대해 결과가 항상 같습니다.

use crate::error::{MlError, MlResult};
use forecast_core::BoostingConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// 확률 계산 시 margin 클리핑 범위.
const PROB_EPS: f64 = 1e-6;

/// 부스팅 하이퍼파라미터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub colsample: f64,
    pub lambda: f64,
    pub min_child_weight: f64,
    pub max_bins: usize,
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self::from(&BoostingConfig::default())
    }
}

impl From<&BoostingConfig> for BoostParams {
    fn from(c: &BoostingConfig) -> Self {
        Self {
            n_estimators: c.n_estimators,
            learning_rate: c.learning_rate,
            max_depth: c.max_depth,
            subsample: c.subsample,
            colsample: c.colsample,
            lambda: c.lambda,
            min_child_weight: c.min_child_weight,
            max_bins: c.max_bins,
            seed: c.seed,
        }
    }
}

impl BoostParams {
    /// 트리 개수를 설정합니다.
    pub fn with_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// 최대 깊이를 설정합니다.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn validate(&self) -> MlResult<()> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;
        if self.n_estimators == 0
            || self.max_depth == 0
            || self.max_bins < 2
            || self.max_bins > MAX_BINS_LIMIT
            || !in_unit(self.subsample)
            || !in_unit(self.colsample)
            || !(self.learning_rate > 0.0)
            || !(self.lambda > 0.0)
            || self.min_child_weight < 0.0
        {
            return Err(MlError::InvalidInput(format!("invalid boosting params: {:?}", self)));
        }
        Ok(())
    }
}

/// 구간 인덱스는 `u16`으로 저장됩니다.
pub const MAX_BINS_LIMIT: usize = u16::MAX as usize + 1;

// =============================================================================
// Tree
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// 회귀 트리 하나.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// 역직렬화된 트리의 구조를 검증합니다. 자식 인덱스는 항상 부모보다 커야 합니다.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                threshold,
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {} uses feature {} of {}", idx, feature, n_features));
                }
                if *left <= idx || *right <= idx || *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(format!("node {} has invalid children", idx));
                }
                if threshold.is_nan() {
                    return Err(format!("node {} has NaN threshold", idx));
                }
            }
        }
        Ok(())
    }

    fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

// =============================================================================
// Binning
// =============================================================================

/// 피처별 분위수 경계와 행별 구간 인덱스.
struct BinnedMatrix {
    /// `cuts[f]`: 엄격히 증가하는 경계값. 구간 `b`는 `(cuts[b-1], cuts[b]]`.
    cuts: Vec<Vec<f64>>,
    /// `bins[f][row]`
    bins: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    fn build<R: AsRef<[f64]>>(x: &[R], n_features: usize, max_bins: usize) -> Self {
        let mut cuts = Vec::with_capacity(n_features);
        let mut bins = Vec::with_capacity(n_features);

        for f in 0..n_features {
            let column: Vec<f64> = x.iter().map(|row| row.as_ref()[f]).collect();
            let feature_cuts = quantile_cuts(&column, max_bins);
            let feature_bins = column
                .iter()
                .map(|v| feature_cuts.partition_point(|c| c < v) as u16)
                .collect();
            cuts.push(feature_cuts);
            bins.push(feature_bins);
        }

        Self { cuts, bins }
    }
}

fn quantile_cuts(values: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut unique = sorted.clone();
    unique.dedup();
    if unique.len() <= 1 {
        return Vec::new();
    }
    if unique.len() <= max_bins {
        unique.pop();
        return unique;
    }

    let m = sorted.len();
    let max = sorted[m - 1];
    let mut cuts: Vec<f64> = (1..max_bins)
        .map(|k| sorted[(k * m / max_bins).min(m - 1)])
        .filter(|c| *c < max)
        .collect();
    cuts.dedup();
    cuts
}

// =============================================================================
// Boosting core
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Objective {
    SquaredError,
    Logistic,
}

impl Objective {
    fn base_margin(&self, y: &[f64], w: &[f64]) -> f64 {
        let total: f64 = w.iter().sum();
        let mean = y.iter().zip(w).map(|(yi, wi)| yi * wi).sum::<f64>() / total;
        match self {
            Objective::SquaredError => mean,
            Objective::Logistic => {
                let p = mean.clamp(PROB_EPS, 1.0 - PROB_EPS);
                (p / (1.0 - p)).ln()
            }
        }
    }

    fn grad_hess(&self, margin: f64, y: f64) -> (f64, f64) {
        match self {
            Objective::SquaredError => (margin - y, 1.0),
            Objective::Logistic => {
                let p = sigmoid(margin);
                (p - y, (p * (1.0 - p)).max(1e-16))
            }
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct Grower<'a> {
    binned: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    params: &'a BoostParams,
    nodes: Vec<Node>,
}

impl Grower<'_> {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hess[r]).sum();

        let idx = self.nodes.len();
        let value = -g / (h + self.params.lambda) * self.params.learning_rate;
        self.nodes.push(Node::Leaf { value });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }

        let Some(split) = self.best_split(&rows, g, h) else {
            return idx;
        };

        let feature_bins = &self.binned.bins[split.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| usize::from(feature_bins[r]) <= split.bin);

        let threshold = self.binned.cuts[split.feature][split.bin];
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let parent = self.score(g, h);
        let mcw = self.params.min_child_weight;
        let mut best: Option<SplitCandidate> = None;

        for &f in self.features {
            let n_bins = self.binned.cuts[f].len() + 1;
            if n_bins < 2 {
                continue;
            }

            let mut hist_g = vec![0.0; n_bins];
            let mut hist_h = vec![0.0; n_bins];
            let mut hist_n = vec![0usize; n_bins];
            for &r in rows {
                let b = usize::from(self.binned.bins[f][r]);
                hist_g[b] += self.grad[r];
                hist_h[b] += self.hess[r];
                hist_n[b] += 1;
            }

            let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
            for b in 0..n_bins - 1 {
                gl += hist_g[b];
                hl += hist_h[b];
                nl += hist_n[b];
                let (gr, hr, nr) = (g - gl, h - hl, rows.len() - nl);
                if nl == 0 || nr == 0 || hl < mcw || hr < mcw {
                    continue;
                }
                let gain = self.score(gl, hl) + self.score(gr, hr) - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |s| gain > s.gain) {
                    best = Some(SplitCandidate {
                        feature: f,
                        bin: b,
                        gain,
                    });
                }
            }
        }

        best
    }
}

fn check_inputs<R: AsRef<[f64]>>(x: &[R], y: &[f64], w: &[f64]) -> MlResult<usize> {
    if x.is_empty() {
        return Err(MlError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    if x.len() != y.len() || x.len() != w.len() {
        return Err(MlError::InvalidInput(format!(
            "length mismatch: x={}, y={}, w={}",
            x.len(),
            y.len(),
            w.len()
        )));
    }
    let n_features = x[0].as_ref().len();
    if n_features == 0 || x.iter().any(|row| row.as_ref().len() != n_features) {
        return Err(MlError::InvalidInput("ragged or empty feature rows".to_string()));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(MlError::InvalidInput("non-finite target".to_string()));
    }
    if w.iter().any(|v| !v.is_finite() || *v < 0.0) || w.iter().sum::<f64>() <= 0.0 {
        return Err(MlError::InvalidInput("weights must be finite, non-negative, non-zero".to_string()));
    }
    Ok(n_features)
}

struct Ensemble {
    n_features: usize,
    base_margin: f64,
    trees: Vec<Tree>,
}

fn boost<R: AsRef<[f64]>>(
    params: &BoostParams,
    objective: Objective,
    x: &[R],
    y: &[f64],
    w: &[f64],
) -> MlResult<Ensemble> {
    params.validate()?;
    let n_features = check_inputs(x, y, w)?;
    let n = x.len();

    let binned = BinnedMatrix::build(x, n_features, params.max_bins);
    let base_margin = objective.base_margin(y, w);
    let mut margins = vec![base_margin; n];
    let mut grad = vec![0.0; n];
    let mut hess = vec![0.0; n];
    let mut rng = StdRng::seed_from_u64(params.seed);
    let n_cols = ((params.colsample * n_features as f64).round() as usize).clamp(1, n_features);

    let mut trees = Vec::with_capacity(params.n_estimators);
    for _ in 0..params.n_estimators {
        for r in 0..n {
            let (g, h) = objective.grad_hess(margins[r], y[r]);
            grad[r] = g * w[r];
            hess[r] = h * w[r];
        }

        let mut rows: Vec<usize> = (0..n)
            .filter(|_| params.subsample >= 1.0 || rng.gen::<f64>() < params.subsample)
            .collect();
        if rows.is_empty() {
            rows = (0..n).collect();
        }

        let mut features = rand::seq::index::sample(&mut rng, n_features, n_cols).into_vec();
        features.sort_unstable();

        let mut grower = Grower {
            binned: &binned,
            grad: &grad,
            hess: &hess,
            features: &features,
            params,
            nodes: Vec::new(),
        };
        grower.grow(rows, 0);
        let tree = Tree {
            nodes: grower.nodes,
        };

        for (r, row) in x.iter().enumerate() {
            margins[r] += tree.predict(row.as_ref());
        }
        trees.push(tree);
    }

    if margins.iter().any(|m| !m.is_finite()) {
        return Err(MlError::Training("boosting diverged to non-finite margins".to_string()));
    }

    Ok(Ensemble {
        n_features,
        base_margin,
        trees,
    })
}

// =============================================================================
// Public models
// =============================================================================

/// 제곱 오차 부스팅 회귀 모델.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedRegressor {
    n_features: usize,
    base_score: f64,
    trees: Vec<Tree>,
}

impl BoostedRegressor {
    /// 가중치 학습.
    pub fn fit<R: AsRef<[f64]>>(params: &BoostParams, x: &[R], y: &[f64], w: &[f64]) -> MlResult<Self> {
        let ensemble = boost(params, Objective::SquaredError, x, y, w)?;
        Ok(Self {
            n_features: ensemble.n_features,
            base_score: ensemble.base_margin,
            trees: ensemble.trees,
        })
    }

    /// 한 행 예측. 피처 개수가 맞지 않으면 NaN.
    pub fn predict(&self, x: &[f64]) -> f64 {
        if x.len() != self.n_features {
            return f64::NAN;
        }
        self.base_score + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    pub fn predict_many<R: AsRef<[f64]>>(&self, xs: &[R]) -> Vec<f64> {
        xs.iter().map(|x| self.predict(x.as_ref())).collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// 가장 깊은 트리의 깊이.
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    /// 역직렬화된 모델의 구조 검증.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_features == 0 || !self.base_score.is_finite() {
            return Err("invalid regressor header".to_string());
        }
        self.trees.iter().try_for_each(|t| t.validate(self.n_features))
    }
}

/// 로지스틱 손실 부스팅 이진 분류기 (레이블 0/1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedClassifier {
    n_features: usize,
    base_margin: f64,
    trees: Vec<Tree>,
}

impl BoostedClassifier {
    /// 가중치 학습. `y`는 0.0 또는 1.0.
    pub fn fit<R: AsRef<[f64]>>(params: &BoostParams, x: &[R], y: &[f64], w: &[f64]) -> MlResult<Self> {
        if y.iter().any(|v| *v != 0.0 && *v != 1.0) {
            return Err(MlError::InvalidInput("classifier labels must be 0 or 1".to_string()));
        }
        let ensemble = boost(params, Objective::Logistic, x, y, w)?;
        Ok(Self {
            n_features: ensemble.n_features,
            base_margin: ensemble.base_margin,
            trees: ensemble.trees,
        })
    }

    /// 상승(레이블 1) 확률. 피처 개수가 맞지 않으면 NaN.
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        if x.len() != self.n_features {
            return f64::NAN;
        }
        sigmoid(self.base_margin + self.trees.iter().map(|t| t.predict(x)).sum::<f64>())
    }

    /// 레이블 예측 (`prob > 0.5` 이면 1).
    pub fn predict(&self, x: &[f64]) -> i32 {
        i32::from(self.predict_proba(x) > 0.5)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.n_features == 0 || !self.base_margin.is_finite() {
            return Err("invalid classifier header".to_string());
        }
        self.trees.iter().try_for_each(|t| t.validate(self.n_features))
    }
}

/// 출력마다 독립 회귀 모델을 가진 multi-output 회귀 모델.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiOutputRegressor {
    outputs: Vec<BoostedRegressor>,
}

impl MultiOutputRegressor {
    pub fn new(outputs: Vec<BoostedRegressor>) -> Self {
        Self { outputs }
    }

    /// 열마다 하나씩 학습합니다.
    pub fn fit<R: AsRef<[f64]>>(
        params: &BoostParams,
        x: &[R],
        ys: &[Vec<f64>],
        w: &[f64],
    ) -> MlResult<Self> {
        let outputs = ys
            .iter()
            .map(|y| BoostedRegressor::fit(params, x, y, w))
            .collect::<MlResult<Vec<_>>>()?;
        Ok(Self { outputs })
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// 한 출력 열의 예측. 열이 없으면 `None`.
    pub fn predict_column(&self, x: &[f64], column: usize) -> Option<f64> {
        self.outputs.get(column).map(|m| m.predict(x))
    }

    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        self.outputs.iter().map(|m| m.predict(x)).collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.outputs.iter().try_for_each(BoostedRegressor::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> BoostParams {
        BoostParams::default().with_estimators(60).with_max_depth(3)
    }

    fn linear_data(n: usize) -> (Vec<[f64; 2]>, Vec<f64>) {
        let x: Vec<[f64; 2]> = (0..n)
            .map(|i| [i as f64 / n as f64, ((i * 7) % 11) as f64])
            .collect();
        let y = x.iter().map(|r| 10.0 * r[0] + 2.0).collect();
        (x, y)
    }

    fn mae(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(p, t)| (p - t).abs()).sum::<f64>() / a.len() as f64
    }

    #[test]
    fn test_quantile_cuts() {
        assert!(quantile_cuts(&[1.0, 1.0, 1.0], 8).is_empty());
        assert_eq!(quantile_cuts(&[3.0, 1.0, 2.0, 2.0], 8), vec![1.0, 2.0]);

        let many: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let cuts = quantile_cuts(&many, 16);
        assert!(cuts.len() <= 15);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
        assert!(*cuts.last().unwrap() < 999.0);
    }

    #[test]
    fn test_regressor_fits_linear_signal() {
        let (x, y) = linear_data(300);
        let w = vec![1.0; x.len()];
        let model = BoostedRegressor::fit(&small_params(), &x, &y, &w).unwrap();

        let pred = model.predict_many(&x);
        let baseline = vec![y.iter().sum::<f64>() / y.len() as f64; y.len()];
        assert!(mae(&pred, &y) < 0.25 * mae(&baseline, &y));
        assert!(model.max_depth() <= 3);
        assert_eq!(model.n_trees(), 60);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = linear_data(200);
        let w = vec![1.0; x.len()];
        let a = BoostedRegressor::fit(&small_params(), &x, &y, &w).unwrap();
        let b = BoostedRegressor::fit(&small_params(), &x, &y, &w).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_weight_rows_are_ignored() {
        // 앞 절반은 y=100, 뒤 절반은 y=0. 앞 절반 가중치 0 → 예측은 0 근처
        let x: Vec<[f64; 1]> = (0..200).map(|i| [(i % 10) as f64]).collect();
        let y: Vec<f64> = (0..200).map(|i| if i < 100 { 100.0 } else { 0.0 }).collect();
        let w: Vec<f64> = (0..200).map(|i| if i < 100 { 0.0 } else { 1.0 }).collect();

        let model = BoostedRegressor::fit(&small_params(), &x, &y, &w).unwrap();
        assert!(model.predict(&[3.0]).abs() < 1e-6);
    }

    #[test]
    fn test_classifier_separates_classes() {
        let x: Vec<[f64; 1]> = (0..200).map(|i| [i as f64]).collect();
        let y: Vec<f64> = (0..200).map(|i| if i >= 100 { 1.0 } else { 0.0 }).collect();
        let w = vec![1.0; 200];

        let model = BoostedClassifier::fit(&small_params(), &x, &y, &w).unwrap();
        assert!(model.predict_proba(&[180.0]) > 0.8);
        assert!(model.predict_proba(&[20.0]) < 0.2);
        assert_eq!(model.predict(&[180.0]), 1);
        assert_eq!(model.predict(&[20.0]), 0);
    }

    #[test]
    fn test_classifier_rejects_non_binary_labels() {
        let x = vec![[0.0], [1.0]];
        let err = BoostedClassifier::fit(&small_params(), &x, &[0.0, 2.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, MlError::InvalidInput(_)));
    }

    #[test]
    fn test_wrong_feature_count_predicts_nan() {
        let (x, y) = linear_data(50);
        let model = BoostedRegressor::fit(&small_params(), &x, &y, &vec![1.0; 50]).unwrap();
        assert!(model.predict(&[1.0]).is_nan());
    }

    #[test]
    fn test_invalid_inputs() {
        let params = small_params();
        let empty: Vec<[f64; 2]> = Vec::new();
        assert!(matches!(
            BoostedRegressor::fit(&params, &empty, &[], &[]),
            Err(MlError::InsufficientData { .. })
        ));
        assert!(matches!(
            BoostedRegressor::fit(&params, &[[1.0]], &[1.0, 2.0], &[1.0]),
            Err(MlError::InvalidInput(_))
        ));
        assert!(matches!(
            BoostedRegressor::fit(&params, &[[1.0]], &[1.0], &[0.0]),
            Err(MlError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_param_bounds() {
        let (x, y) = linear_data(20);
        let w = vec![1.0; x.len()];

        let zero_lambda = BoostParams {
            lambda: 0.0,
            ..small_params()
        };
        assert!(matches!(
            BoostedRegressor::fit(&zero_lambda, &x, &y, &w),
            Err(MlError::InvalidInput(_))
        ));

        let too_many_bins = BoostParams {
            max_bins: MAX_BINS_LIMIT + 1,
            ..small_params()
        };
        assert!(matches!(
            BoostedRegressor::fit(&too_many_bins, &x, &y, &w),
            Err(MlError::InvalidInput(_))
        ));

        let max_bins = BoostParams {
            max_bins: MAX_BINS_LIMIT,
            ..small_params()
        };
        assert!(BoostedRegressor::fit(&max_bins, &x, &y, &w).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_children() {
        let tree = Tree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 5,
            }],
        };
        let model = BoostedRegressor {
            n_features: 1,
            base_score: 0.0,
            trees: vec![tree],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_multi_output_columns() {
        let (x, y) = linear_data(120);
        let y2: Vec<f64> = y.iter().map(|v| -v).collect();
        let w = vec![1.0; x.len()];
        let model = MultiOutputRegressor::fit(&small_params(), &x, &[y, y2], &w).unwrap();

        let out = model.predict(&x[10]);
        assert_eq!(out.len(), 2);
        assert!((out[0] + out[1]).abs() < 1e-6);
        assert!(model.predict_column(&x[10], 2).is_none());
    }
}
