use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use directive_core::{Bar, Frame, MarketDataAdapter, Trade};

/// Historical bar series keyed by symbol, served point-in-time.
///
/// Backtests load full series up front; each fetch returns only bars at or
/// before `now`, so engines never see the future.
#[derive(Debug, Default)]
pub struct ReplayMarketData {
    bars: DashMap<String, Vec<Bar>>,
    trades: DashMap<String, Vec<Trade>>,
}

impl ReplayMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a bar series; must be sorted by timestamp ascending.
    pub fn load_bars(&self, symbol: impl Into<String>, bars: Vec<Bar>) {
        self.bars.insert(symbol.into(), bars);
    }

    pub fn load_trades(&self, symbol: impl Into<String>, trades: Vec<Trade>) {
        self.trades.insert(symbol.into(), trades);
    }

    /// Latest close at or before `now`, if any.
    pub fn price_at(&self, symbol: &str, now: DateTime<Utc>) -> Option<f64> {
        let series = self.bars.get(symbol)?;
        series
            .iter()
            .rev()
            .find(|b| b.timestamp <= now)
            .map(|b| b.close)
    }
}

#[async_trait]
impl MarketDataAdapter for ReplayMarketData {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        lookback_bars: usize,
        now: DateTime<Utc>,
    ) -> Frame<Bar> {
        let Some(series) = self.bars.get(symbol) else {
            return Frame::empty(symbol, now);
        };
        let visible: Vec<Bar> = series
            .iter()
            .filter(|b| b.timestamp <= now)
            .cloned()
            .collect();
        let start = visible.len().saturating_sub(lookback_bars);
        Frame::new(symbol, now, visible[start..].to_vec())
    }

    async fn fetch_trades(
        &self,
        symbol: &str,
        lookback_minutes: i64,
        now: DateTime<Utc>,
    ) -> Frame<Trade> {
        let Some(series) = self.trades.get(symbol) else {
            return Frame::empty(symbol, now);
        };
        let cutoff = now - chrono::Duration::minutes(lookback_minutes);
        let visible: Vec<Trade> = series
            .iter()
            .filter(|t| t.timestamp > cutoff && t.timestamp <= now)
            .cloned()
            .collect();
        Frame::new(symbol, now, visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar(ts: DateTime<Utc>, close: f64) -> Bar {
        Bar {
            timestamp: ts,
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
            vwap: None,
        }
    }

    #[tokio::test]
    async fn replay_never_serves_the_future() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let adapter = ReplayMarketData::new();
        adapter.load_bars(
            "SPY",
            (0..10).map(|i| bar(t0 + Duration::days(i), 100.0 + i as f64)).collect(),
        );

        let mid = t0 + Duration::days(4);
        let frame = adapter.fetch_ohlcv("SPY", 30, mid).await;
        assert_eq!(frame.len(), 5);
        assert!(frame.iter().all(|b| b.timestamp <= mid));
        assert_eq!(adapter.price_at("SPY", mid), Some(104.0));
    }

    #[tokio::test]
    async fn unknown_symbol_degrades_to_empty() {
        let adapter = ReplayMarketData::new();
        let frame = adapter.fetch_ohlcv("QQQ", 30, Utc::now()).await;
        assert!(frame.is_empty());
    }
}
