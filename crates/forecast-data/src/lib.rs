//! 캔들 및 예측 결과 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - PostgreSQL 저장소 (`candles`, `series_cache`, `futures`, `job_logs`)
//! - 테스트/오프라인 실행용 인메모리 저장소
//! - Binance kline 수집 클라이언트

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use provider::binance::BinanceKlineClient;
pub use storage::candles::{CandleRecord, CandleRepository};
pub use storage::futures::{FuturesRecord, FuturesRepository};
pub use storage::job_log::{JobLogRecord, JobLogRepository};
pub use storage::memory::{MemoryCandleStore, MemoryFuturesStore, MemoryJobLog, MemorySeriesCache};
pub use storage::postgres::Database;
pub use storage::series_cache::{SeriesCacheRecord, SeriesCacheRepository};
