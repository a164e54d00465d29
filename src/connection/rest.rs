// Binance USDⓈ-M futures public REST market data
// Klines, 24h ticker ranking, premium-index mark price, exchangeInfo trading rules
// Unsigned endpoints only

use super::MarketDataGateway;
use crate::config::{BinanceCfg, ScanConfig};
use crate::types::{Candle, SymbolRules, Timeframe};
use crate::utils::{datetime_from_ms, parse_decimal};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Binance caps klines per request at 1500.
pub const MAX_KLINES_PER_REQUEST: usize = 1500;

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    symbol: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    contract_type: String,
    #[serde(default)]
    quote_asset: String,
    #[serde(default)]
    filters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    mark_price: String,
}

/// Which symbols are eligible for the liquidity ranking.
#[derive(Debug, Clone)]
pub struct RankingFilter {
    pub quote_asset: String,
    pub min_quote_volume: f64,
    pub excluded: Vec<String>,
}

impl RankingFilter {
    pub fn from_config(cfg: &ScanConfig) -> Self {
        Self {
            quote_asset: cfg.quote_asset.to_uppercase(),
            min_quote_volume: cfg.min_quote_volume,
            excluded: cfg.excluded_symbols.iter().map(|s| s.to_uppercase()).collect(),
        }
    }

    /// Filter and sort `(symbol, quote_volume)` pairs, most liquid first.
    ///
    /// `tradable`, when known, restricts the result to perpetual contracts in trading status.
    pub fn rank(&self, tickers: Vec<(String, f64)>, tradable: Option<&HashMap<String, SymbolRules>>) -> Vec<String> {
        let mut eligible: Vec<(String, f64)> = tickers
            .into_iter()
            .filter(|(symbol, volume)| {
                symbol.ends_with(&self.quote_asset)
                    && *volume >= self.min_quote_volume
                    && !self.excluded.iter().any(|e| e == symbol)
                    && tradable.map(|t| t.contains_key(symbol)).unwrap_or(true)
            })
            .collect();
        eligible.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        eligible.into_iter().map(|(s, _)| s).collect()
    }
}

pub struct BinanceMarketData {
    http: Client,
    base_url: Url,
    ranking: RankingFilter,
    /// Perpetual contracts in TRADING status with their rules; filled lazily from exchangeInfo
    rules: Arc<RwLock<HashMap<String, SymbolRules>>>,
}

impl BinanceMarketData {
    pub fn new(cfg: &BinanceCfg, scan: &ScanConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("failed to build http client")?;
        let base_url = Url::parse(&cfg.futures_base)
            .with_context(|| format!("invalid binance.futures_base: {}", cfg.futures_base))?;
        Ok(Self {
            http,
            base_url,
            ranking: RankingFilter::from_config(scan),
            rules: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Klines ending at `end_time` (or now), oldest first.
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>> {
        let mut url = self.base_url.join("/fapi/v1/klines")?;
        url.query_pairs_mut()
            .append_pair("symbol", symbol)
            .append_pair("interval", timeframe.as_str())
            .append_pair("limit", &limit.clamp(1, MAX_KLINES_PER_REQUEST).to_string());
        if let Some(end) = end_time {
            url.query_pairs_mut()
                .append_pair("endTime", &end.timestamp_millis().to_string());
        }

        let res = self.http.get(url).send().await?;
        if !res.status().is_success() {
            anyhow::bail!("Klines error for {}: {}", symbol, res.text().await?);
        }

        let raw: Vec<serde_json::Value> = res.json().await?;
        Ok(parse_klines(raw))
    }

    async fn load_exchange_info(&self) -> Result<()> {
        let url = self.base_url.join("/fapi/v1/exchangeInfo")?;
        let response = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<ExchangeInfoResponse>()
            .await
            .context("failed to parse exchange info response")?;

        let mut loaded = HashMap::new();
        for s in response.symbols {
            if s.status != "TRADING" || s.contract_type != "PERPETUAL" {
                continue;
            }
            if !s.quote_asset.eq_ignore_ascii_case(&self.ranking.quote_asset) {
                continue;
            }
            loaded.insert(s.symbol.clone(), parse_rules(&s.filters));
        }
        info!(count = loaded.len(), "CONNECTION: loaded exchange rules");
        *self.rules.write().await = loaded;
        Ok(())
    }

    async fn ensure_rules(&self) -> Result<()> {
        if self.rules.read().await.is_empty() {
            self.load_exchange_info().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataGateway for BinanceMarketData {
    async fn get_candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        self.fetch_klines(symbol, timeframe, limit, None).await
    }

    async fn get_liquidity_ranking(&self) -> Result<Vec<String>> {
        // Rules are optional for ranking; a failed exchangeInfo only loosens the filter.
        if let Err(e) = self.ensure_rules().await {
            debug!(error = %e, "CONNECTION: exchange info unavailable, ranking without contract filter");
        }

        let url = self.base_url.join("/fapi/v1/ticker/24hr")?;
        let tickers = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Ticker24h>>()
            .await
            .context("failed to parse 24h ticker response")?;

        let pairs: Vec<(String, f64)> = tickers
            .into_iter()
            .filter_map(|t| t.quote_volume.parse::<f64>().ok().map(|v| (t.symbol, v)))
            .collect();

        let rules = self.rules.read().await;
        let tradable = if rules.is_empty() { None } else { Some(&*rules) };
        Ok(self.ranking.rank(pairs, tradable))
    }

    async fn get_mark_price(&self, symbol: &str) -> Result<Decimal> {
        let mut url = self.base_url.join("/fapi/v1/premiumIndex")?;
        url.query_pairs_mut().append_pair("symbol", symbol);
        let index = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<PremiumIndex>()
            .await
            .context("failed to parse premium index response")?;
        parse_decimal(&index.mark_price).ok_or_else(|| anyhow!("invalid mark price for {}: {}", symbol, index.mark_price))
    }

    async fn get_symbol_rules(&self, symbol: &str) -> Result<SymbolRules> {
        self.ensure_rules().await?;
        self.rules
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("symbol not found in exchange info: {}", symbol))
    }
}

/// Kline arrays: `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
pub fn parse_klines(raw: Vec<serde_json::Value>) -> Vec<Candle> {
    raw.into_iter()
        .filter_map(|arr| {
            let arr = arr.as_array()?;
            if arr.len() < 6 {
                return None;
            }
            Some(Candle {
                open_time: datetime_from_ms(arr[0].as_i64()?)?,
                open: arr[1].as_str()?.parse().ok()?,
                high: arr[2].as_str()?.parse().ok()?,
                low: arr[3].as_str()?.parse().ok()?,
                close: arr[4].as_str()?.parse().ok()?,
                volume: arr[5].as_str()?.parse().ok()?,
            })
        })
        .collect()
}

fn parse_rules(filters: &[serde_json::Value]) -> SymbolRules {
    let mut rules = SymbolRules::default();
    for filter in filters {
        let field = |name: &str| filter.get(name).and_then(|v| v.as_str()).and_then(parse_decimal);
        match filter.get("filterType").and_then(|v| v.as_str()) {
            Some("LOT_SIZE") => {
                if let Some(step) = field("stepSize") {
                    rules.step_size = step;
                }
                if let Some(min_qty) = field("minQty") {
                    rules.min_qty = min_qty;
                }
            }
            Some("MIN_NOTIONAL") => {
                if let Some(notional) = field("notional") {
                    rules.min_notional = notional;
                }
            }
            _ => {}
        }
    }
    rules
}
