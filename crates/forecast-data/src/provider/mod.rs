//! 외부 캔들 데이터 제공자.

pub mod binance;
