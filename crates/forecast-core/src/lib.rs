//! # Forecast Core
//!
//! 캔들 예측 파이프라인의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - 캔들(OHLCV) 및 조회 구간
//! - 캐시된 시리즈 / futures 포인트 / 작업 로그 레코드
//! - 저장소 경계 트레이트 (`CandleSource`, `SeriesCacheStore`, `FuturesStore`, `JobLog`)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
