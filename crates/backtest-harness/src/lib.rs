//! Walk-forward backtest of the composer over historical timestamps.
//!
//! Pure dependency injection: the caller provides a price getter and three
//! engine runners; the harness orchestrates agents and the composer, logs
//! one record per tick, and computes deterministic aggregate metrics.

pub mod metrics;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use composer::ComposerAgent;
use directive_core::{
    ComposerConfig, DirectiveError, EngineOutput, SentimentEnvelope, StandardSnapshot, TradeStyle,
};
use metrics::{
    bucket_accuracy_by_energy, compute_directional_accuracy, compute_max_drawdown,
    compute_naive_pnl, compute_pnl_series, compute_sharpe_ratio, compute_win_rate,
};
use pipeline::build_snapshot;
use primary_agents::{HedgeAgent, LiquidityAgent, PrimaryAgent, SentimentAgent};
use serde::{Deserialize, Serialize};

/// Backtest parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    /// Bars ahead over which realized return is measured
    pub horizon_steps: usize,
    /// Notional exposure per trade
    pub notional: f64,
    /// Minimum |return| that counts as a meaningful move
    pub return_threshold: f64,
    /// Edges for energy-cost stratification
    pub energy_buckets: Vec<f64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            symbol: "SPY".to_string(),
            horizon_steps: 1,
            notional: 1.0,
            return_threshold: 0.0,
            energy_buckets: vec![0.5, 1.0, 2.0, 5.0],
        }
    }
}

/// One walk-forward observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub future_price: f64,
    pub realized_return: f64,
    pub direction: f64,
    pub strength: f64,
    pub confidence: f64,
    pub energy_cost: f64,
    pub trade_style: TradeStyle,
    pub volatility: f64,
}

/// Aggregated result with the full per-tick log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub log: Vec<BacktestRecord>,
    pub directional_accuracy: f64,
    pub naive_pnl: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub energy_bucket_accuracy: BTreeMap<String, f64>,
    pub total_trades: usize,
    pub neutral_count: usize,
}

impl BacktestResult {
    fn empty(config: BacktestConfig) -> Self {
        Self {
            config,
            log: Vec::new(),
            directional_accuracy: 0.0,
            naive_pnl: 0.0,
            sharpe: 0.0,
            max_drawdown: 0.0,
            win_rate: 0.0,
            energy_bucket_accuracy: BTreeMap::new(),
            total_trades: 0,
            neutral_count: 0,
        }
    }

    /// Summary row for logs and reports.
    pub fn summary(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        out.insert("total_trades".to_string(), self.total_trades as f64);
        out.insert("neutral_count".to_string(), self.neutral_count as f64);
        out.insert(
            "directional_accuracy".to_string(),
            self.directional_accuracy,
        );
        out.insert("win_rate".to_string(), self.win_rate);
        out.insert("naive_pnl".to_string(), self.naive_pnl);
        out.insert("sharpe_ratio".to_string(), self.sharpe);
        out.insert("max_drawdown".to_string(), self.max_drawdown);
        out
    }
}

/// Walk-forward replay.
///
/// For each timestamp with a future price inside the horizon: fetch prices,
/// run the injected engine runners, hand results to the agents, compose a
/// directive, and log the observation. Any failure skips the tick.
pub fn run_composer_backtest<P, H, L, S>(
    config: BacktestConfig,
    timestamps: &[DateTime<Utc>],
    price_getter: P,
    hedge_runner: H,
    liquidity_runner: L,
    sentiment_runner: S,
    composer_config: ComposerConfig,
) -> BacktestResult
where
    P: Fn(&str, DateTime<Utc>) -> f64,
    H: Fn(&str, DateTime<Utc>) -> Result<EngineOutput, DirectiveError>,
    L: Fn(&str, DateTime<Utc>) -> Result<EngineOutput, DirectiveError>,
    S: Fn(&str, DateTime<Utc>) -> Result<SentimentEnvelope, DirectiveError>,
{
    let symbol = config.symbol.clone();
    let horizon = config.horizon_steps;
    let action_threshold = composer_config.action_threshold;

    let mut hedge_agent = HedgeAgent::default();
    let mut liquidity_agent = LiquidityAgent::default();
    let mut sentiment_agent = SentimentAgent::default();
    let composer = ComposerAgent::new(composer_config);

    let mut log: Vec<BacktestRecord> = Vec::new();
    let n = timestamps.len();

    for (i, t) in timestamps.iter().enumerate() {
        let j = i + horizon;
        if j >= n {
            break;
        }

        let p_now = price_getter(&symbol, *t);
        let p_future = price_getter(&symbol, timestamps[j]);
        if !p_now.is_finite() || !p_future.is_finite() || p_now <= 0.0 || p_future <= 0.0 {
            continue;
        }
        let realized_return = (p_future - p_now) / p_now;

        let (hedge_out, liquidity_out, envelope) = match (
            hedge_runner(&symbol, *t),
            liquidity_runner(&symbol, *t),
            sentiment_runner(&symbol, *t),
        ) {
            (Ok(h), Ok(l), Ok(s)) => (h, l, s),
            _ => {
                tracing::debug!(symbol = %symbol, ts = %t, "engine runner failed; tick skipped");
                continue;
            }
        };
        let sentiment_out = sentiment_engine_output(&symbol, *t, &envelope);

        hedge_agent.set_engine_output(hedge_out.clone());
        liquidity_agent.set_engine_output(liquidity_out.clone());
        sentiment_agent.set_sentiment_envelope(envelope);

        let directives = match (
            hedge_agent.output(),
            liquidity_agent.output(),
            sentiment_agent.output(),
        ) {
            (Ok(h), Ok(l), Ok(s)) => vec![h, l, s],
            _ => continue,
        };

        let mut snapshot: StandardSnapshot = build_snapshot(
            &symbol,
            *t,
            &hedge_out,
            &liquidity_out,
            &sentiment_out,
            &EngineOutput::degraded(
                directive_core::EngineKind::Elasticity,
                &symbol,
                *t,
                "low_resistance",
                "not_run",
            ),
        );
        snapshot
            .metadata
            .insert("current_price".to_string(), format!("{p_now}"));

        let directive = composer.compose(&snapshot, &directives);

        log.push(BacktestRecord {
            timestamp: *t,
            price: p_now,
            future_price: p_future,
            realized_return,
            direction: directive.direction,
            strength: directive.strength,
            confidence: directive.confidence,
            energy_cost: directive.energy_cost,
            trade_style: directive.trade_style,
            volatility: directive.volatility,
        });
    }

    if log.is_empty() {
        return BacktestResult::empty(config);
    }

    let directions: Vec<i32> = log
        .iter()
        .map(|r| discretize_direction(r.direction, action_threshold))
        .collect();
    let returns: Vec<f64> = log.iter().map(|r| r.realized_return).collect();
    let energies: Vec<f64> = log.iter().map(|r| r.energy_cost).collect();

    let total_trades = directions.iter().filter(|d| **d != 0).count();
    let neutral_count = directions.len() - total_trades;

    let pnl_series = compute_pnl_series(&directions, &returns, config.notional);

    let result = BacktestResult {
        directional_accuracy: compute_directional_accuracy(
            &directions,
            &returns,
            config.return_threshold,
        ),
        naive_pnl: compute_naive_pnl(&directions, &returns, config.notional),
        sharpe: compute_sharpe_ratio(&pnl_series, 0.0),
        max_drawdown: compute_max_drawdown(&pnl_series),
        win_rate: compute_win_rate(&directions, &returns),
        energy_bucket_accuracy: bucket_accuracy_by_energy(
            &directions,
            &returns,
            &energies,
            &config.energy_buckets,
        ),
        total_trades,
        neutral_count,
        log,
        config,
    };

    tracing::info!(
        symbol = %result.config.symbol,
        ticks = result.log.len(),
        accuracy = result.directional_accuracy,
        sharpe = result.sharpe,
        "backtest complete"
    );
    result
}

/// Direction in {-1, 0, 1}: leans inside the action threshold are neutral.
pub fn discretize_direction(direction: f64, action_threshold: f64) -> i32 {
    if direction > action_threshold {
        1
    } else if direction < -action_threshold {
        -1
    } else {
        0
    }
}

fn sentiment_engine_output(
    symbol: &str,
    now: DateTime<Utc>,
    envelope: &SentimentEnvelope,
) -> EngineOutput {
    use directive_core::{EngineKind, SentimentBias};

    let signed = match envelope.bias {
        SentimentBias::Bullish => envelope.strength,
        SentimentBias::Bearish => -envelope.strength,
        SentimentBias::Neutral => 0.0,
    };
    let mut features = BTreeMap::new();
    features.insert("sentiment_score".to_string(), signed);
    features.insert("sentiment_confidence".to_string(), envelope.confidence);
    features.insert("sentiment_energy".to_string(), envelope.energy);

    EngineOutput {
        kind: EngineKind::Sentiment,
        symbol: symbol.to_string(),
        timestamp: now,
        features,
        confidence: envelope.confidence,
        regime: envelope.breadth_regime.clone(),
        metadata: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use directive_core::{EngineKind, SentimentBias};

    fn timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 14, 30, 0).unwrap();
        (0..n).map(|i| t0 + Duration::minutes(i as i64)).collect()
    }

    fn bullish_hedge(symbol: &str, t: DateTime<Utc>) -> Result<EngineOutput, DirectiveError> {
        let mut features = BTreeMap::new();
        features.insert("gamma_pressure".to_string(), -2.0e6);
        features.insert("gamma_sign".to_string(), -1.0);
        features.insert("hedge_regime_energy".to_string(), 2.0e6);
        Ok(EngineOutput {
            kind: EngineKind::Hedge,
            symbol: symbol.to_string(),
            timestamp: t,
            features,
            confidence: 0.9,
            regime: Some("gamma_squeeze".to_string()),
            metadata: BTreeMap::new(),
        })
    }

    fn bullish_liquidity(symbol: &str, t: DateTime<Utc>) -> Result<EngineOutput, DirectiveError> {
        let mut features = BTreeMap::new();
        features.insert("polr_direction".to_string(), 0.8);
        features.insert("polr_strength".to_string(), 0.8);
        features.insert("liquidity_score".to_string(), 0.9);
        features.insert("amihud_illiquidity".to_string(), 1.0e-5);
        features.insert("spread_bps".to_string(), 5.0);
        Ok(EngineOutput {
            kind: EngineKind::Liquidity,
            symbol: symbol.to_string(),
            timestamp: t,
            features,
            confidence: 0.9,
            regime: Some("normal".to_string()),
            metadata: BTreeMap::new(),
        })
    }

    fn bullish_sentiment(
        _symbol: &str,
        _t: DateTime<Utc>,
    ) -> Result<SentimentEnvelope, DirectiveError> {
        Ok(SentimentEnvelope {
            bias: SentimentBias::Bullish,
            strength: 0.7,
            energy: 0.8,
            confidence: 0.8,
            drivers: vec![("flow".to_string(), 0.5)],
            wyckoff_phase: None,
            volatility_regime: None,
            flow_regime: None,
            breadth_regime: None,
        })
    }

    #[test]
    fn monotone_prices_with_bullish_directive_are_perfect() {
        let ts = timestamps(20);
        let result = run_composer_backtest(
            BacktestConfig::default(),
            &ts,
            // Monotonically increasing price
            |_, t| 100.0 + (t.timestamp() % 10_000) as f64 / 60.0,
            bullish_hedge,
            bullish_liquidity,
            bullish_sentiment,
            ComposerConfig::default(),
        );

        assert_eq!(result.log.len(), 19);
        assert_eq!(result.neutral_count, 0);
        assert_eq!(result.directional_accuracy, 1.0);
        assert!(result.naive_pnl > 0.0);
        assert!(result.sharpe > 0.0);
        assert_eq!(result.max_drawdown, 0.0);
        assert_eq!(result.win_rate, 1.0);
    }

    #[test]
    fn bad_prices_are_skipped() {
        let ts = timestamps(10);
        let result = run_composer_backtest(
            BacktestConfig::default(),
            &ts,
            |_, _| f64::NAN,
            bullish_hedge,
            bullish_liquidity,
            bullish_sentiment,
            ComposerConfig::default(),
        );
        assert!(result.log.is_empty());
        assert_eq!(result.directional_accuracy, 0.0);
    }

    #[test]
    fn failing_engine_runner_skips_ticks() {
        let ts = timestamps(10);
        let result = run_composer_backtest(
            BacktestConfig::default(),
            &ts,
            |_, _| 100.0,
            |_, _| Err(DirectiveError::AdapterFault("down".to_string())),
            bullish_liquidity,
            bullish_sentiment,
            ComposerConfig::default(),
        );
        assert!(result.log.is_empty());
    }

    #[test]
    fn discretization_respects_action_threshold() {
        assert_eq!(discretize_direction(0.5, 0.3), 1);
        assert_eq!(discretize_direction(-0.5, 0.3), -1);
        assert_eq!(discretize_direction(0.2, 0.3), 0);
    }

    #[test]
    fn replay_is_deterministic() {
        let ts = timestamps(15);
        let run = || {
            run_composer_backtest(
                BacktestConfig::default(),
                &ts,
                |_, t| 100.0 + (t.timestamp() % 7_000) as f64 / 100.0,
                bullish_hedge,
                bullish_liquidity,
                bullish_sentiment,
                ComposerConfig::default(),
            )
        };
        let a = run();
        let b = run();
        assert_eq!(
            serde_json::to_string(&a.log).unwrap(),
            serde_json::to_string(&b.log).unwrap()
        );
        assert_eq!(a.naive_pnl, b.naive_pnl);
        assert_eq!(a.energy_bucket_accuracy, b.energy_bucket_accuracy);
    }

    #[test]
    fn energy_buckets_cover_the_directive_costs() {
        let ts = timestamps(10);
        let result = run_composer_backtest(
            BacktestConfig::default(),
            &ts,
            |_, t| 100.0 + (t.timestamp() % 10_000) as f64 / 60.0,
            bullish_hedge,
            bullish_liquidity,
            bullish_sentiment,
            ComposerConfig::default(),
        );
        // Directive energy is dominated by the hedge field (~1e6 scale), so
        // everything lands in the open top bucket
        assert_eq!(result.energy_bucket_accuracy["> 5"], 1.0);
    }
}
