use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use directive_core::{
    Bar, Frame, MarketDataAdapter, NewsAdapter, NewsItem, OptionContract, OptionRight,
    OptionsChainAdapter, Trade, TradeSide,
};

/// Deterministic OHLCV and trade data centred on a base price.
///
/// Bars drift upward by `drift_per_bar`; trades alternate buy/sell with a
/// configurable buy fraction so order-flow features are controllable.
#[derive(Debug, Clone)]
pub struct StaticMarketData {
    pub base_price: f64,
    pub drift_per_bar: f64,
    pub base_volume: f64,
    /// Fraction of trades printed on the buy side, in [0, 1]
    pub buy_fraction: f64,
}

impl Default for StaticMarketData {
    fn default() -> Self {
        Self {
            base_price: 100.0,
            drift_per_bar: 0.1,
            base_volume: 1000.0,
            buy_fraction: 0.5,
        }
    }
}

#[async_trait]
impl MarketDataAdapter for StaticMarketData {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        lookback_bars: usize,
        now: DateTime<Utc>,
    ) -> Frame<Bar> {
        let mut bars = Vec::with_capacity(lookback_bars);
        for i in 0..lookback_bars {
            // Oldest bar first; the most recent bar lands at `now`.
            let age = (lookback_bars - 1 - i) as i64;
            let close = self.base_price + i as f64 * self.drift_per_bar;
            bars.push(Bar {
                timestamp: now - Duration::days(age),
                open: close - self.drift_per_bar / 2.0,
                high: close + self.drift_per_bar,
                low: close - self.drift_per_bar,
                close,
                volume: self.base_volume + i as f64 * 10.0,
                vwap: None,
            });
        }
        Frame::new(symbol, now, bars)
    }

    async fn fetch_trades(
        &self,
        symbol: &str,
        lookback_minutes: i64,
        now: DateTime<Utc>,
    ) -> Frame<Trade> {
        let count = (lookback_minutes / 5).max(0) as usize;
        let buy_count = (count as f64 * self.buy_fraction).round() as usize;
        let mut trades = Vec::with_capacity(count);
        for i in 0..count {
            let side = if i < buy_count {
                TradeSide::Buy
            } else {
                TradeSide::Sell
            };
            trades.push(Trade {
                timestamp: now - Duration::minutes((count - i) as i64 * 5),
                price: self.base_price + i as f64 * 0.05,
                size: 100.0,
                side,
            });
        }
        Frame::new(symbol, now, trades)
    }
}

/// Synthetic options chain centred around spot.
#[derive(Debug, Clone)]
pub struct StaticOptionsChain {
    pub spot: f64,
    pub gamma_at_money: f64,
    pub gamma_off_money: f64,
    pub vanna: f64,
    pub charm: f64,
    pub open_interest: f64,
}

impl Default for StaticOptionsChain {
    fn default() -> Self {
        Self {
            spot: 100.0,
            gamma_at_money: 0.01,
            gamma_off_money: -0.005,
            vanna: 0.02,
            charm: -0.015,
            open_interest: 500.0,
        }
    }
}

#[async_trait]
impl OptionsChainAdapter for StaticOptionsChain {
    async fn fetch_chain(&self, symbol: &str, now: DateTime<Utc>) -> Frame<OptionContract> {
        let strikes = [0.90, 0.95, 1.00, 1.05, 1.10].map(|m| self.spot * m);
        let expiries = [
            now.date_naive(),
            (now + Duration::days(7)).date_naive(),
            (now + Duration::days(30)).date_naive(),
        ];

        let mut contracts = Vec::with_capacity(strikes.len() * expiries.len());
        for strike in strikes {
            for expiry in expiries {
                let at_money = (strike - self.spot).abs() < self.spot * 0.005;
                let right = if strike >= self.spot {
                    OptionRight::Call
                } else {
                    OptionRight::Put
                };
                let intrinsic = match right {
                    OptionRight::Call => (self.spot - strike).max(0.0),
                    OptionRight::Put => (strike - self.spot).max(0.0),
                };
                let mid = 1.0 + intrinsic / 10.0;
                contracts.push(OptionContract {
                    underlying: symbol.to_string(),
                    expiry,
                    strike,
                    right,
                    bid: mid - 0.05,
                    ask: mid + 0.05,
                    implied_vol: 0.25,
                    delta: if right == OptionRight::Call { 0.5 } else { -0.5 },
                    gamma: if at_money {
                        self.gamma_at_money
                    } else {
                        self.gamma_off_money
                    },
                    vanna: self.vanna,
                    charm: self.charm,
                    vega: 0.10,
                    theta: -0.05,
                    open_interest: self.open_interest,
                    volume: 150.0,
                    underlying_price: self.spot,
                });
            }
        }
        Frame::new(symbol, now, contracts)
    }
}

/// Fixed set of news items replayed for any symbol.
#[derive(Debug, Clone, Default)]
pub struct StaticNews {
    pub items: Vec<NewsItem>,
}

#[async_trait]
impl NewsAdapter for StaticNews {
    async fn fetch_news(
        &self,
        _symbol: &str,
        lookback_hours: i64,
        now: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        let cutoff = now - Duration::hours(lookback_hours);
        self.items
            .iter()
            .filter(|item| item.timestamp >= cutoff && item.timestamp <= now)
            .cloned()
            .collect()
    }
}

/// Adapter set that always reports no data, for degradation paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAdapters;

#[async_trait]
impl MarketDataAdapter for NullAdapters {
    async fn fetch_ohlcv(&self, symbol: &str, _lookback: usize, now: DateTime<Utc>) -> Frame<Bar> {
        Frame::empty(symbol, now)
    }

    async fn fetch_trades(
        &self,
        symbol: &str,
        _lookback_minutes: i64,
        now: DateTime<Utc>,
    ) -> Frame<Trade> {
        Frame::empty(symbol, now)
    }
}

#[async_trait]
impl OptionsChainAdapter for NullAdapters {
    async fn fetch_chain(&self, symbol: &str, now: DateTime<Utc>) -> Frame<OptionContract> {
        Frame::empty(symbol, now)
    }
}

#[async_trait]
impl NewsAdapter for NullAdapters {
    async fn fetch_news(&self, _symbol: &str, _hours: i64, _now: DateTime<Utc>) -> Vec<NewsItem> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_ohlcv_ends_at_now() {
        let adapter = StaticMarketData::default();
        let now = Utc::now();
        let frame = adapter.fetch_ohlcv("SPY", 10, now).await;
        assert_eq!(frame.len(), 10);
        assert_eq!(frame.latest().unwrap().timestamp, now);
        // Monotone upward drift
        let bars = frame.items();
        assert!(bars.first().unwrap().close < bars.last().unwrap().close);
    }

    #[tokio::test]
    async fn buy_fraction_controls_trade_sides() {
        let adapter = StaticMarketData {
            buy_fraction: 1.0,
            ..Default::default()
        };
        let frame = adapter.fetch_trades("SPY", 60, Utc::now()).await;
        assert!(frame.iter().all(|t| t.side == TradeSide::Buy));
    }

    #[tokio::test]
    async fn static_chain_is_centred_on_spot() {
        let adapter = StaticOptionsChain::default();
        let frame = adapter.fetch_chain("SPY", Utc::now()).await;
        assert_eq!(frame.len(), 15);
        assert!(frame.iter().all(|c| c.underlying_price == 100.0));
    }

    #[tokio::test]
    async fn static_news_filters_by_lookback_window() {
        let now = Utc::now();
        let fresh = NewsItem {
            headline: "Shares surge on earnings beat".to_string(),
            body: None,
            source: "wire".to_string(),
            timestamp: now - Duration::hours(2),
            is_press_release: false,
        };
        let stale = NewsItem {
            headline: "Old story".to_string(),
            body: None,
            source: "wire".to_string(),
            timestamp: now - Duration::hours(72),
            is_press_release: true,
        };
        let adapter = StaticNews {
            items: vec![fresh, stale],
        };
        let items = adapter.fetch_news("SPY", 24, now).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].headline, "Shares surge on earnings beat");
    }

    #[tokio::test]
    async fn null_adapters_return_empty() {
        let now = Utc::now();
        let ohlcv = MarketDataAdapter::fetch_ohlcv(&NullAdapters, "SPY", 30, now).await;
        assert!(ohlcv.is_empty());
        let chain = OptionsChainAdapter::fetch_chain(&NullAdapters, "SPY", now).await;
        assert!(chain.is_empty());
    }
}
