//! 저장된 모델로 피처 행을 예측하는 predictor.

use crate::error::MlError;
use crate::model_store::{ClassifierArtifact, ModelStore, RegressionBundle};
use crate::types::{FeatureRow, PredictionRow, RegTarget, RegressionPrediction};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// 로드된 회귀 번들과 분류기.
///
/// 두 구성요소는 독립적으로 사라질 수 있습니다. 회귀 번들이 없으면 모든 행의
/// `regression`이 `None`, 분류기가 없으면 `direction`이 `None`입니다.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    regression: Option<RegressionBundle>,
    classifier: Option<ClassifierArtifact>,
}

/// 아티팩트 하나를 로드하고, null로 대체 가능한 에러는 경고로 남깁니다.
fn load_or_degrade<T>(kind: &str, result: Result<T, MlError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            if e.degrades_to_null() {
                warn!(kind, error = %e, "Model artifact unavailable, predictions degrade to null");
            } else {
                warn!(kind, error = %e, "Failed to load model artifact");
            }
            None
        }
    }
}

impl Predictor {
    pub fn new(regression: Option<RegressionBundle>, classifier: Option<ClassifierArtifact>) -> Self {
        Self {
            regression,
            classifier,
        }
    }

    /// 저장소에서 현재 아티팩트를 읽습니다. 호출마다 새로 로드합니다.
    pub fn load(store: &dyn ModelStore) -> Self {
        let regression = load_or_degrade("regression", store.load_regression_bundle());
        let classifier = load_or_degrade("classifier", store.load_classifier());

        if let (Some(reg), Some(cls)) = (&regression, &classifier) {
            if reg.trained_at() != Some(cls.trained_at) {
                warn!(
                    regression_trained_at = ?reg.trained_at(),
                    classifier_trained_at = %cls.trained_at,
                    "Regression and classifier artifacts come from different training runs"
                );
            }
        }

        debug!(
            has_regression = regression.is_some(),
            has_classifier = classifier.is_some(),
            "Predictor loaded"
        );
        Self::new(regression, classifier)
    }

    pub fn has_regression(&self) -> bool {
        self.regression.is_some()
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_regression() && !self.has_classifier()
    }

    /// 회귀 번들의 학습 시각.
    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.regression.as_ref().and_then(RegressionBundle::trained_at)
    }

    /// 한 행 예측.
    pub fn predict_row(&self, features: &FeatureRow) -> PredictionRow {
        let x = features.to_array();

        let regression = self.regression.as_ref().map(|bundle| {
            let mut pred = RegressionPrediction::default();
            for target in RegTarget::ALL {
                pred.set(target, bundle.predict(target, &x));
            }
            pred
        });
        let direction = self.classifier.as_ref().and_then(|cls| cls.predict(&x));

        PredictionRow {
            regression,
            direction,
        }
    }

    /// 입력 행마다 하나의 예측 행.
    pub fn predict(&self, features: &[FeatureRow]) -> Vec<PredictionRow> {
        features.iter().map(|f| self.predict_row(f)).collect()
    }

    /// `close_next`만 예측합니다.
    pub fn predict_close_next(&self, features: &FeatureRow) -> Option<f64> {
        self.regression
            .as_ref()
            .and_then(|bundle| bundle.predict(RegTarget::CloseNext, &features.to_array()))
    }
}
