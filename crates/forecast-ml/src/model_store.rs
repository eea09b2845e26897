//! 모델 아티팩트 저장소.
//!
//! 회귀 번들과 분류기를 각각 고정된 위치에 JSON으로 저장합니다. 회귀 번들은
//! 두 가지 형식을 지원하며, 로드 시점에 결정되어 호출자는 구분할 필요가 없습니다.
//!
//! - `per_target`: 타깃 이름 → 회귀 모델
//! - `legacy_multi_output`: 하나의 multi-output 모델 (`TARGET_REG_COLS` 열 순서)
//!
//! 아티팩트가 없으면 [`MlError::ModelUnavailable`], 읽을 수 없거나 형식을 모르면
//! [`MlError::CorruptArtifact`]를 반환합니다.

use crate::boost::{BoostedClassifier, BoostedRegressor, MultiOutputRegressor};
use crate::error::{MlError, MlResult};
use crate::types::{DirectionPrediction, RegTarget, FEATURE_COLS, NUM_FEATURES, TARGET_REG_COLS};
use chrono::{DateTime, Utc};
use forecast_core::{finite, ModelPathsConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

fn default_feature_cols() -> Vec<String> {
    FEATURE_COLS.iter().map(|s| s.to_string()).collect()
}

fn check_feature_cols(cols: &[String]) -> MlResult<()> {
    if cols.iter().map(String::as_str).ne(FEATURE_COLS.iter().copied()) {
        return Err(MlError::CorruptArtifact(format!(
            "feature columns {:?} do not match {:?}",
            cols, FEATURE_COLS
        )));
    }
    Ok(())
}

// =============================================================================
// Artifacts
// =============================================================================

/// 회귀 모델 번들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum RegressionBundle {
    /// 타깃별 독립 모델
    PerTarget {
        trained_at: DateTime<Utc>,
        #[serde(default = "default_feature_cols")]
        feature_cols: Vec<String>,
        models: BTreeMap<RegTarget, BoostedRegressor>,
    },
    /// 단일 multi-output 모델
    LegacyMultiOutput {
        #[serde(default)]
        trained_at: Option<DateTime<Utc>>,
        model: MultiOutputRegressor,
    },
}

impl RegressionBundle {
    /// 현재 형식의 번들을 생성합니다.
    pub fn per_target(trained_at: DateTime<Utc>, models: BTreeMap<RegTarget, BoostedRegressor>) -> Self {
        RegressionBundle::PerTarget {
            trained_at,
            feature_cols: default_feature_cols(),
            models,
        }
    }

    /// 학습 시각. 레거시 아티팩트에는 없을 수 있습니다.
    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RegressionBundle::PerTarget { trained_at, .. } => Some(*trained_at),
            RegressionBundle::LegacyMultiOutput { trained_at, .. } => *trained_at,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, RegressionBundle::LegacyMultiOutput { .. })
    }

    /// 한 타깃의 예측. 모델이 없거나 값이 유한하지 않으면 `None`.
    pub fn predict(&self, target: RegTarget, x: &[f64; NUM_FEATURES]) -> Option<f64> {
        let value = match self {
            RegressionBundle::PerTarget { models, .. } => models.get(&target)?.predict(x),
            RegressionBundle::LegacyMultiOutput { model, .. } => model.predict_column(x, target.column())?,
        };
        finite(value)
    }

    /// 로드 직후 구조 검증.
    pub fn validate(&self) -> MlResult<()> {
        match self {
            RegressionBundle::PerTarget {
                feature_cols,
                models,
                ..
            } => {
                check_feature_cols(feature_cols)?;
                for (target, model) in models {
                    if model.n_features() != NUM_FEATURES {
                        return Err(MlError::CorruptArtifact(format!(
                            "{} model expects {} features",
                            target,
                            model.n_features()
                        )));
                    }
                    model
                        .validate()
                        .map_err(|e| MlError::CorruptArtifact(format!("{}: {}", target, e)))?;
                }
                Ok(())
            }
            RegressionBundle::LegacyMultiOutput { model, .. } => {
                if model.n_outputs() != TARGET_REG_COLS.len() {
                    return Err(MlError::CorruptArtifact(format!(
                        "legacy model has {} outputs, expected {}",
                        model.n_outputs(),
                        TARGET_REG_COLS.len()
                    )));
                }
                model.validate().map_err(MlError::CorruptArtifact)
            }
        }
    }
}

/// 방향 분류기 아티팩트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub trained_at: DateTime<Utc>,
    #[serde(default = "default_feature_cols")]
    pub feature_cols: Vec<String>,
    pub model: BoostedClassifier,
}

impl ClassifierArtifact {
    pub fn new(trained_at: DateTime<Utc>, model: BoostedClassifier) -> Self {
        Self {
            trained_at,
            feature_cols: default_feature_cols(),
            model,
        }
    }

    /// 방향 예측. 확률이 유한하지 않으면 `None`.
    pub fn predict(&self, x: &[f64; NUM_FEATURES]) -> Option<DirectionPrediction> {
        let prob_up = finite(self.model.predict_proba(x))?;
        Some(DirectionPrediction {
            dir_next: i32::from(prob_up > 0.5),
            prob_up: Some(prob_up),
            prob_down: Some(1.0 - prob_up),
        })
    }

    pub fn validate(&self) -> MlResult<()> {
        check_feature_cols(&self.feature_cols)?;
        self.model.validate().map_err(MlError::CorruptArtifact)
    }
}

// =============================================================================
// Store
// =============================================================================

/// 모델 아티팩트 저장소 trait.
pub trait ModelStore: Send + Sync {
    fn load_regression_bundle(&self) -> MlResult<RegressionBundle>;

    fn load_classifier(&self) -> MlResult<ClassifierArtifact>;

    /// 번들 전체를 교체합니다.
    fn save_regression_bundle(&self, bundle: &RegressionBundle) -> MlResult<()>;

    fn save_classifier(&self, model: &ClassifierArtifact) -> MlResult<()>;
}

fn decode_regression(raw: &str) -> MlResult<RegressionBundle> {
    let bundle: RegressionBundle = serde_json::from_str(raw)?;
    bundle.validate()?;
    Ok(bundle)
}

fn decode_classifier(raw: &str) -> MlResult<ClassifierArtifact> {
    let model: ClassifierArtifact = serde_json::from_str(raw)?;
    model.validate()?;
    Ok(model)
}

fn encode<T: Serialize>(value: &T) -> MlResult<String> {
    serde_json::to_string(value).map_err(|e| MlError::Persist(e.to_string()))
}

/// 파일 시스템 기반 저장소.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    regression_path: PathBuf,
    classifier_path: PathBuf,
}

impl FileModelStore {
    pub fn new(regression_path: impl Into<PathBuf>, classifier_path: impl Into<PathBuf>) -> Self {
        Self {
            regression_path: regression_path.into(),
            classifier_path: classifier_path.into(),
        }
    }

    pub fn from_config(config: &ModelPathsConfig) -> Self {
        Self::new(&config.regression_path, &config.classifier_path)
    }

    pub fn regression_path(&self) -> &Path {
        &self.regression_path
    }

    pub fn classifier_path(&self) -> &Path {
        &self.classifier_path
    }

    fn read(path: &Path, kind: &str) -> MlResult<String> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                debug!(path = %path.display(), kind, "Artifact read");
                Ok(raw)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(MlError::ModelUnavailable(format!(
                "{} artifact not found: {}",
                kind,
                path.display()
            ))),
            Err(e) => Err(MlError::CorruptArtifact(format!(
                "{} artifact unreadable ({}): {}",
                kind,
                path.display(),
                e
            ))),
        }
    }

    /// 임시 파일에 쓴 뒤 rename 합니다. 읽는 쪽은 이전/새 아티팩트 중 하나만 봅니다.
    fn write(path: &Path, contents: &str) -> MlResult<()> {
        let persist = |e: std::io::Error| MlError::Persist(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(persist)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, contents).map_err(persist)?;
        std::fs::rename(&tmp, path).map_err(persist)?;
        info!(path = %path.display(), bytes = contents.len(), "Artifact saved");
        Ok(())
    }
}

impl ModelStore for FileModelStore {
    fn load_regression_bundle(&self) -> MlResult<RegressionBundle> {
        decode_regression(&Self::read(&self.regression_path, "regression")?)
    }

    fn load_classifier(&self) -> MlResult<ClassifierArtifact> {
        decode_classifier(&Self::read(&self.classifier_path, "classifier")?)
    }

    fn save_regression_bundle(&self, bundle: &RegressionBundle) -> MlResult<()> {
        Self::write(&self.regression_path, &encode(bundle)?)
    }

    fn save_classifier(&self, model: &ClassifierArtifact) -> MlResult<()> {
        Self::write(&self.classifier_path, &encode(model)?)
    }
}

/// 메모리 저장소. 직렬화된 JSON을 그대로 보관합니다.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    regression: Mutex<Option<String>>,
    classifier: Mutex<Option<String>>,
}

fn lock(slot: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 원시 회귀 아티팩트를 설정합니다 (레거시/손상 아티팩트 주입용).
    pub fn set_regression_raw(&self, raw: impl Into<String>) {
        *lock(&self.regression) = Some(raw.into());
    }

    pub fn set_classifier_raw(&self, raw: impl Into<String>) {
        *lock(&self.classifier) = Some(raw.into());
    }

    fn read(slot: &Mutex<Option<String>>, kind: &str) -> MlResult<String> {
        lock(slot)
            .clone()
            .ok_or_else(|| MlError::ModelUnavailable(format!("{} artifact not found", kind)))
    }
}

impl ModelStore for MemoryModelStore {
    fn load_regression_bundle(&self) -> MlResult<RegressionBundle> {
        decode_regression(&Self::read(&self.regression, "regression")?)
    }

    fn load_classifier(&self) -> MlResult<ClassifierArtifact> {
        decode_classifier(&Self::read(&self.classifier, "classifier")?)
    }

    fn save_regression_bundle(&self, bundle: &RegressionBundle) -> MlResult<()> {
        self.set_regression_raw(encode(bundle)?);
        Ok(())
    }

    fn save_classifier(&self, model: &ClassifierArtifact) -> MlResult<()> {
        self.set_classifier_raw(encode(model)?);
        Ok(())
    }
}
