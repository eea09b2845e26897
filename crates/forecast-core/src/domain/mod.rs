//! 예측 파이프라인을 위한 도메인 모델.

mod candle;
mod job;
mod series;
mod store;

pub use candle::*;
pub use job::*;
pub use series::*;
pub use store::*;
