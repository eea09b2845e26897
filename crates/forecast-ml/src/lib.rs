//! 캔들 예측 모델과 예측 시리즈.
//!
//! 이 크레이트는 다음을 제공합니다:
//!
//! - **피처/타깃 정렬**: 캔들 `i`의 상태 → 캔들 `i+1` 예측 쌍
//! - **부스팅 모델**: 가중치 회귀 트리 앙상블과 방향 분류기
//! - **학습**: 시간 순 분할, 지수 감쇠 가중치, 검증 지표
//! - **시리즈**: 소스 시각 키 캐시(`series_cache`)와 타깃 시각 키 증분 예측(`futures`)
//! - **수집**: 거래소 kline 수집과 백필
//!
//! # 아키텍처
//!
//! ```text
//! CandleFeed ──► Ingestor ──► CandleSource
//!                                  │
//!                                  ▼
//!                      ┌───────────────────────┐
//!                      │ build_features_targets│
//!                      └───────────┬───────────┘
//!                 ┌────────────────┼─────────────────┐
//!                 ▼                ▼                 ▼
//!           ┌──────────┐   ┌──────────────┐  ┌────────────────┐
//!           │ Trainer  │   │ Series       │  │ FuturesUpdater │
//!           │          │   │ Materializer │  │ (target time)  │
//!           └────┬─────┘   └──────┬───────┘  └───────┬────────┘
//!                │ save           │ load             │ load
//!                ▼                ▼                  ▼
//!           ┌─────────────────────────────────────────────┐
//!           │                 ModelStore                  │
//!           └─────────────────────────────────────────────┘
//! ```
//!
//! # 예제
//!
//! ```ignore
//! use forecast_ml::{SeriesMaterializer, Trainer};
//!
//! let outcome = trainer.train(Some(90)).await;
//! if outcome.is_ok() {
//!     materializer.materialize(90).await;
//! }
//! ```

pub mod boost;
pub mod error;
pub mod features;
pub mod incremental;
pub mod ingest;
pub mod metrics;
pub mod model_store;
pub mod predictor;
pub mod series;
pub mod trainer;
pub mod types;
pub mod weights;

pub use boost::{BoostParams, BoostedClassifier, BoostedRegressor, MultiOutputRegressor};
pub use error::{MlError, MlResult};
pub use features::{build_features_targets, AlignedFrame, FIRST_VALID_INDEX, MIN_CANDLES};
pub use incremental::{build_futures_points, FuturesReport, FuturesUpdater};
pub use ingest::{BackfillParams, BackfillReport, IngestReport, Ingestor};
pub use metrics::{
    format_training_message, parse_training_message, MetricsReader, ParsedTrainingMessage, TrainingMetrics,
    ValidationMetrics,
};
pub use model_store::{ClassifierArtifact, FileModelStore, MemoryModelStore, ModelStore, RegressionBundle};
pub use predictor::Predictor;
pub use series::{build_cache_rows, MaterializeReport, SeriesMaterializer};
pub use trainer::{temporal_split, Trainer, TrainingReport};
pub use types::*;
pub use weights::exp_sample_weights;
