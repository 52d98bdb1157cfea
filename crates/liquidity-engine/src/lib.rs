//! Liquidity diagnostics engine.
//!
//! Computes Amihud illiquidity, Kyle's lambda, order-flow imbalance, VWAP
//! magnetism, liquidity voids, a spread proxy, and the path-of-least-
//! resistance bias from OHLCV bars plus intraday trade prints.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directive_core::{
    Bar, Engine, EngineKind, EngineOutput, Frame, LiquidityConfig, MarketDataAdapter, Trade,
    TradeSide,
};
use statrs::statistics::Statistics;

const DEGRADED_REGIME: &str = "degraded";
const EPS: f64 = 1e-9;

pub struct LiquidityEngine {
    adapter: Arc<dyn MarketDataAdapter>,
    config: LiquidityConfig,
}

impl LiquidityEngine {
    pub fn new(adapter: Arc<dyn MarketDataAdapter>, config: LiquidityConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &LiquidityConfig {
        &self.config
    }

    fn compute_features(
        &self,
        ohlcv: &Frame<Bar>,
        trades: &Frame<Trade>,
    ) -> BTreeMap<String, f64> {
        let bars = ohlcv.items();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let price_changes: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        let close = *closes.last().unwrap_or(&0.0);

        let amihud = amihud_illiquidity(bars);
        let kyle_lambda = kyle_lambda(&price_changes, trades.items());
        let ofi = order_flow_imbalance(trades.items());

        let total_volume: f64 = bars.iter().map(|b| b.volume).sum();
        let vwap = bars
            .iter()
            .map(|b| b.close * b.volume)
            .sum::<f64>()
            / total_volume.max(1.0);
        let vwap_magnet = (close - vwap).abs() / close.max(1e-6);

        let liquidity_void = liquidity_void_score(bars);

        let mean_abs_change = if price_changes.is_empty() {
            0.0
        } else {
            price_changes.iter().sum::<f64>() / price_changes.len() as f64
        };
        let spread_bps = mean_abs_change / close.max(1e-6) * 10_000.0;

        // Bounded composite, monotone decreasing in both illiquidity inputs
        let liquidity_score =
            1.0 / (1.0 + amihud / self.config.thin_threshold) * 1.0 / (1.0 + spread_bps / 100.0);

        // POLR: order flow dominates, volume-weighted drift confirms
        let drift = if total_volume > 0.0 && !returns.is_empty() {
            bars[1..]
                .iter()
                .zip(returns.iter())
                .map(|(b, r)| r * b.volume)
                .sum::<f64>()
                / bars[1..].iter().map(|b| b.volume).sum::<f64>().max(1.0)
        } else {
            0.0
        };
        let vol_scale = if returns.len() > 1 {
            returns.iter().copied().std_dev().max(EPS)
        } else {
            EPS
        };
        let drift_vote = (drift / vol_scale).clamp(-1.0, 1.0);
        let polr_direction = (0.7 * ofi + 0.3 * drift_vote).clamp(-1.0, 1.0);
        let polr_strength = polr_direction.abs();

        let mut features = BTreeMap::new();
        features.insert("amihud_illiquidity".to_string(), amihud);
        features.insert("kyle_lambda".to_string(), kyle_lambda);
        features.insert("ofi".to_string(), ofi);
        features.insert("vwap_magnet_score".to_string(), vwap_magnet);
        features.insert("liquidity_void_score".to_string(), liquidity_void);
        features.insert("spread_bps".to_string(), spread_bps);
        features.insert("liquidity_score".to_string(), liquidity_score.clamp(0.0, 1.0));
        features.insert("polr_direction".to_string(), polr_direction);
        features.insert("polr_strength".to_string(), polr_strength.clamp(0.0, 1.0));
        features.insert("mid_price".to_string(), close);
        features
    }

    fn determine_regime(&self, features: &BTreeMap<String, f64>) -> String {
        if features.is_empty() {
            return DEGRADED_REGIME.to_string();
        }
        let ofi = features.get("ofi").copied().unwrap_or(0.0);
        let amihud = features.get("amihud_illiquidity").copied().unwrap_or(0.0);

        if ofi > self.config.one_sided_threshold {
            "one_sided_flow".to_string()
        } else if amihud > self.config.thin_threshold {
            "thin".to_string()
        } else if amihud < self.config.high_threshold {
            "abundant".to_string()
        } else {
            "normal".to_string()
        }
    }
}

/// Mean |return| per unit dollar volume, skipping zero-volume bars.
fn amihud_illiquidity(bars: &[Bar]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for w in bars.windows(2) {
        if w[0].close <= 0.0 {
            continue;
        }
        let ret = (w[1].close - w[0].close) / w[0].close;
        let dollar_volume = w[1].close * w[1].volume;
        if dollar_volume > 0.0 {
            sum += ret.abs() / dollar_volume;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Price impact per unit signed volume.
fn kyle_lambda(price_changes: &[f64], trades: &[Trade]) -> f64 {
    let mean_abs_change = if price_changes.is_empty() {
        0.0
    } else {
        price_changes.iter().sum::<f64>() / price_changes.len() as f64
    };

    let avg_signed_volume = if trades.is_empty() {
        1.0
    } else {
        let mean = trades.iter().map(|t| t.size.abs()).sum::<f64>() / trades.len() as f64;
        if mean > 0.0 {
            mean
        } else {
            1.0
        }
    };

    mean_abs_change / (avg_signed_volume + EPS)
}

/// Normalized buy-minus-sell volume; 0 when no trades printed.
fn order_flow_imbalance(trades: &[Trade]) -> f64 {
    let mut buy_volume = 0.0;
    let mut sell_volume = 0.0;
    for trade in trades {
        match trade.side {
            TradeSide::Buy => buy_volume += trade.size,
            TradeSide::Sell => sell_volume += trade.size,
        }
    }
    let denom = buy_volume + sell_volume;
    if denom > 0.0 {
        (buy_volume - sell_volume) / denom
    } else {
        0.0
    }
}

/// Fraction of bars whose trailing 5-bar volume std exceeds mean volume.
fn liquidity_void_score(bars: &[Bar]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let mean_volume = volumes.iter().sum::<f64>() / volumes.len() as f64;

    let mut exceed = 0usize;
    for i in 0..volumes.len() {
        let start = i.saturating_sub(4);
        let window = &volumes[start..=i];
        let std = if window.len() > 1 {
            window.iter().copied().std_dev()
        } else {
            0.0
        };
        if std > mean_volume {
            exceed += 1;
        }
    }
    exceed as f64 / volumes.len() as f64
}

#[async_trait]
impl Engine for LiquidityEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Liquidity
    }

    async fn run(&self, symbol: &str, now: DateTime<Utc>) -> EngineOutput {
        let ohlcv = self
            .adapter
            .fetch_ohlcv(symbol, self.config.lookback, now)
            .await;
        let trades = self
            .adapter
            .fetch_trades(symbol, self.config.intraday_minutes, now)
            .await;

        if ohlcv.is_empty() {
            return EngineOutput::degraded(
                EngineKind::Liquidity,
                symbol,
                now,
                DEGRADED_REGIME,
                "no_ohlcv",
            );
        }

        let features = self.compute_features(&ohlcv, &trades);
        let regime = self.determine_regime(&features);
        tracing::debug!(symbol, regime = %regime, "liquidity engine tick");

        EngineOutput {
            kind: EngineKind::Liquidity,
            symbol: symbol.to_string(),
            timestamp: now,
            features,
            confidence: 1.0,
            regime: Some(regime),
            metadata: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use market_adapters::{NullAdapters, StaticMarketData};

    fn bar(ts: DateTime<Utc>, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: ts,
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume,
            vwap: None,
        }
    }

    fn trade(side: TradeSide, size: f64) -> Trade {
        Trade {
            timestamp: Utc::now(),
            price: 100.0,
            size,
            side,
        }
    }

    fn engine() -> LiquidityEngine {
        LiquidityEngine::new(Arc::new(NullAdapters), LiquidityConfig::default())
    }

    #[tokio::test]
    async fn empty_ohlcv_degrades() {
        let out = engine().run("SPY", Utc::now()).await;
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.regime.as_deref(), Some("degraded"));
        assert_eq!(out.metadata.get("degraded").map(String::as_str), Some("no_ohlcv"));
    }

    #[test]
    fn ofi_is_zero_without_trades() {
        assert_eq!(order_flow_imbalance(&[]), 0.0);
    }

    #[test]
    fn ofi_is_signed_ratio() {
        let trades = vec![
            trade(TradeSide::Buy, 300.0),
            trade(TradeSide::Sell, 100.0),
        ];
        assert!((order_flow_imbalance(&trades) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn one_sided_flow_wins_regime_ordering() {
        let e = engine();
        let mut features = BTreeMap::new();
        features.insert("ofi".to_string(), 0.8);
        // Thin on Amihud too, but flow dominates
        features.insert("amihud_illiquidity".to_string(), 0.01);
        assert_eq!(e.determine_regime(&features), "one_sided_flow");
    }

    #[test]
    fn amihud_separates_thin_from_abundant() {
        let e = engine();
        let mut features = BTreeMap::new();
        features.insert("ofi".to_string(), 0.0);
        features.insert("amihud_illiquidity".to_string(), 0.01);
        assert_eq!(e.determine_regime(&features), "thin");
        features.insert("amihud_illiquidity".to_string(), 1e-6);
        assert_eq!(e.determine_regime(&features), "abundant");
        features.insert("amihud_illiquidity".to_string(), 5e-4);
        assert_eq!(e.determine_regime(&features), "normal");
    }

    #[test]
    fn amihud_skips_zero_volume_bars() {
        let t0 = Utc::now();
        let bars = vec![
            bar(t0, 100.0, 1000.0),
            bar(t0 + Duration::days(1), 101.0, 0.0),
            bar(t0 + Duration::days(2), 102.0, 1000.0),
        ];
        let amihud = amihud_illiquidity(&bars);
        // Only the last transition counts: |1/101| / (102 * 1000)
        let expected = (1.0f64 / 101.0).abs() / (102.0 * 1000.0);
        assert!((amihud - expected).abs() < 1e-15);
    }

    #[test]
    fn liquidity_score_decreases_with_illiquidity() {
        let e = engine();
        let t0 = Utc::now();
        let calm: Vec<Bar> = (0..30)
            .map(|i| bar(t0 + Duration::days(i), 100.0 + i as f64 * 0.01, 1_000_000.0))
            .collect();
        let choppy: Vec<Bar> = (0..30)
            .map(|i| bar(t0 + Duration::days(i), 100.0 + (i % 2) as f64 * 5.0, 50.0))
            .collect();
        let calm_frame = Frame::new("SPY", t0, calm);
        let choppy_frame = Frame::new("SPY", t0, choppy);
        let empty_trades: Frame<Trade> = Frame::empty("SPY", t0);

        let calm_score = e.compute_features(&calm_frame, &empty_trades)["liquidity_score"];
        let choppy_score = e.compute_features(&choppy_frame, &empty_trades)["liquidity_score"];
        assert!(calm_score > choppy_score);
        assert!((0.0..=1.0).contains(&calm_score));
        assert!((0.0..=1.0).contains(&choppy_score));
    }

    #[tokio::test]
    async fn one_sided_buying_produces_positive_polr() {
        let adapter = StaticMarketData {
            buy_fraction: 1.0,
            ..Default::default()
        };
        let e = LiquidityEngine::new(Arc::new(adapter), LiquidityConfig::default());
        let out = e.run("SPY", Utc::now()).await;
        assert!(out.feature("ofi") > 0.9);
        assert!(out.feature("polr_direction") > 0.5);
        assert_eq!(out.regime.as_deref(), Some("one_sided_flow"));
        assert!(out.feature("polr_strength") <= 1.0);
    }

    #[test]
    fn void_score_flags_volume_bursts() {
        let t0 = Utc::now();
        let mut bars: Vec<Bar> = (0..20)
            .map(|i| bar(t0 + Duration::days(i), 100.0, 1000.0))
            .collect();
        // A burst late in the window spikes the rolling std
        bars[18].volume = 50_000.0;
        let score = liquidity_void_score(&bars);
        assert!(score > 0.0);
        assert!(score <= 1.0);
    }
}
