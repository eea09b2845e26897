//! Binance 공개 kline API 클라이언트.
//!
//! `/api/v3/klines`에서 캔들을 가져와 도메인 `Candle`로 정규화합니다.
//! 요청은 타임아웃이 있으며, HTTP 418/429 응답에는 2초 대기 후 한 번만 재시도합니다.

use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_core::{Candle, CandleFeed, ForecastResult, IngestConfig};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// 요청 한도 응답 후 재시도 전 대기 시간.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

/// Binance kline 클라이언트.
#[derive(Debug, Clone)]
pub struct BinanceKlineClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BinanceKlineClient {
    /// 수집 설정으로 클라이언트를 생성합니다.
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataError::FetchError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// 최근 캔들 `limit`개 (시간 오름차순).
    pub async fn fetch_recent(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        self.get_klines(&params).await
    }

    /// `start_ms`부터 최대 `limit`개 (시간 오름차순).
    pub async fn fetch_window(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
            ("startTime", start_ms.to_string()),
        ];
        self.get_klines(&params).await
    }

    async fn get_klines(&self, params: &[(&str, String)]) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        debug!(url = %url, "GET klines");

        let mut response = self.send(&url, params).await?;
        if is_rate_limited(response.status()) {
            warn!(status = %response.status(), "요청 한도 응답, 재시도 대기");
            tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
            response = self.send(&url, params).await?;
        }

        let status = response.status();
        let body = response.text().await?;
        if is_rate_limited(status) {
            return Err(DataError::RateLimited(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        if !status.is_success() {
            return Err(DataError::FetchError(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        normalize_klines(&body)
    }

    async fn send(&self, url: &str, params: &[(&str, String)]) -> Result<reqwest::Response> {
        let mut request = self.client.get(url).query(params);
        if let Some(key) = &self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }
        Ok(request.send().await?)
    }
}

#[async_trait]
impl CandleFeed for BinanceKlineClient {
    async fn fetch_recent(&self, symbol: &str, interval: &str, limit: u32) -> ForecastResult<Vec<Candle>> {
        Ok(BinanceKlineClient::fetch_recent(self, symbol, interval, limit).await?)
    }

    async fn fetch_window(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        limit: u32,
    ) -> ForecastResult<Vec<Candle>> {
        Ok(BinanceKlineClient::fetch_window(self, symbol, interval, start_ms, limit).await?)
    }
}

fn is_rate_limited(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT
}

fn parse_price(field: &str, raw: &str) -> Result<f64> {
    raw.parse::<Decimal>()
        .ok()
        .and_then(|d| d.to_f64())
        .ok_or_else(|| DataError::ParseError(format!("{} 값 파싱 실패: {}", field, raw)))
}

/// kline 응답 본문을 시간 오름차순 캔들로 변환합니다.
pub fn normalize_klines(body: &str) -> Result<Vec<Candle>> {
    let raw: Vec<BinanceKline> = serde_json::from_str(body)?;

    let mut candles = raw
        .into_iter()
        .map(|k| {
            let time: DateTime<Utc> = DateTime::from_timestamp_millis(k.0)
                .ok_or_else(|| DataError::ParseError(format!("잘못된 open time: {}", k.0)))?;
            Ok(Candle {
                time,
                open: parse_price("open", &k.1)?,
                high: parse_price("high", &k.2)?,
                low: parse_price("low", &k.3)?,
                close: parse_price("close", &k.4)?,
                volume: parse_price("volume", &k.5)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    candles.sort_by_key(|c| c.time);
    Ok(candles)
}
