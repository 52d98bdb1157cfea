//! Universe-wide opportunity scanner.
//!
//! Runs all four engines per symbol, scores five components, and ranks the
//! universe by composite opportunity quality. Embarrassingly parallel across
//! symbols.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use directive_core::{
    Engine, MarketDataAdapter, OptionsChainAdapter, ScannerConfig, SentimentBias,
};
use elasticity_engine::ElasticityEngine;
use hedge_engine::HedgeEngine;
use liquidity_engine::LiquidityEngine;
use sentiment_engine::SentimentEngine;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

const EPS: f64 = 1e-9;

/// Component weights of the composite score.
const ENERGY_WEIGHT: f64 = 0.30;
const LIQUIDITY_WEIGHT: f64 = 0.25;
const VOLATILITY_WEIGHT: f64 = 0.20;
const SENTIMENT_WEIGHT: f64 = 0.15;
const OPTIONS_WEIGHT: f64 = 0.10;

/// Classified shape of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    Directional,
    Volatility,
    RangeBound,
    GammaSqueeze,
    Mixed,
}

impl OpportunityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityType::Directional => "directional",
            OpportunityType::Volatility => "volatility",
            OpportunityType::RangeBound => "range_bound",
            OpportunityType::GammaSqueeze => "gamma_squeeze",
            OpportunityType::Mixed => "mixed",
        }
    }
}

/// Score card for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityScore {
    pub symbol: String,
    pub score: f64,
    pub rank: usize,
    pub energy_score: f64,
    pub liquidity_score: f64,
    pub volatility_score: f64,
    pub sentiment_score: f64,
    pub options_score: f64,
    pub energy_asymmetry: f64,
    pub movement_energy: f64,
    pub liquidity_quality: f64,
    pub direction: SentimentBias,
    pub confidence: f64,
    pub opportunity_type: OpportunityType,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// Ranked scan output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub opportunities: Vec<OpportunityScore>,
    pub scan_timestamp: DateTime<Utc>,
    pub symbols_scanned: usize,
    pub universe: Vec<String>,
}

pub struct OpportunityScanner {
    market_adapter: Arc<dyn MarketDataAdapter>,
    options_adapter: Arc<dyn OptionsChainAdapter>,
    hedge_engine: Arc<HedgeEngine>,
    liquidity_engine: Arc<LiquidityEngine>,
    sentiment_engine: Arc<SentimentEngine>,
    elasticity_engine: Arc<ElasticityEngine>,
    config: ScannerConfig,
}

impl OpportunityScanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_adapter: Arc<dyn MarketDataAdapter>,
        options_adapter: Arc<dyn OptionsChainAdapter>,
        hedge_engine: Arc<HedgeEngine>,
        liquidity_engine: Arc<LiquidityEngine>,
        sentiment_engine: Arc<SentimentEngine>,
        elasticity_engine: Arc<ElasticityEngine>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            market_adapter,
            options_adapter,
            hedge_engine,
            liquidity_engine,
            sentiment_engine,
            elasticity_engine,
            config,
        }
    }

    /// Scan the universe and return the top-N opportunities by composite
    /// score.
    pub async fn scan(self: &Arc<Self>, universe: &[String], now: DateTime<Utc>) -> ScanResult {
        tracing::info!(symbols = universe.len(), "starting opportunity scan");

        let mut join_set = JoinSet::new();
        for symbol in universe {
            let scanner = Arc::clone(self);
            let symbol = symbol.clone();
            join_set.spawn(async move { scanner.score_symbol(&symbol, now).await });
        }

        let mut opportunities = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some(score)) => opportunities.push(score),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "scan task failed"),
            }
        }

        opportunities.sort_by(|a, b| b.score.total_cmp(&a.score));
        opportunities.truncate(self.config.top_n);
        for (i, opportunity) in opportunities.iter_mut().enumerate() {
            opportunity.rank = i + 1;
        }

        tracing::info!(found = opportunities.len(), "opportunity scan complete");

        ScanResult {
            opportunities,
            scan_timestamp: now,
            symbols_scanned: universe.len(),
            universe: universe.to_vec(),
        }
    }

    /// Price/volume prefilter on the latest bar; adapter failure skips the
    /// symbol.
    async fn passes_prefilter(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        let frame = self.market_adapter.fetch_ohlcv(symbol, 2, now).await;
        let Some(bar) = frame.latest() else {
            tracing::debug!(symbol, "prefilter: no quote data");
            return false;
        };
        if bar.close < self.config.min_price || bar.close > self.config.max_price {
            tracing::debug!(symbol, price = bar.close, "prefilter: price out of bounds");
            return false;
        }
        if bar.volume < self.config.min_volume {
            tracing::debug!(symbol, volume = bar.volume, "prefilter: volume too low");
            return false;
        }
        true
    }

    async fn score_symbol(&self, symbol: &str, now: DateTime<Utc>) -> Option<OpportunityScore> {
        if !self.passes_prefilter(symbol, now).await {
            return None;
        }

        let hedge_out = self.hedge_engine.run(symbol, now).await;
        let liquidity_out = self.liquidity_engine.run(symbol, now).await;
        let sentiment_out = self.sentiment_engine.run(symbol, now).await;
        let elasticity_out = self.elasticity_engine.run(symbol, now).await;

        let gamma_pressure = hedge_out.feature("gamma_pressure");
        let vanna_pressure = hedge_out.feature("vanna_pressure");
        let energy_asymmetry = derive_energy_asymmetry(gamma_pressure, vanna_pressure);
        let movement_energy = hedge_out.feature("hedge_regime_energy") / 1000.0;

        let liquidity_quality = liquidity_out.feature("liquidity_score");
        let sentiment_value = sentiment_out.feature("sentiment_score");
        let sentiment_confidence = sentiment_out.feature("sentiment_confidence");
        let elasticity_up = elasticity_out.feature("elasticity_up");

        let energy_score = score_energy(energy_asymmetry, movement_energy);
        let liquidity_score = liquidity_quality.clamp(0.0, 1.0);
        let volatility_score = score_volatility(hedge_out.feature("gamma_sign"), elasticity_up);
        let sentiment_score = (sentiment_value.abs() * sentiment_confidence).clamp(0.0, 1.0);
        let options_score = self.score_options(symbol, now).await;

        let composite = ENERGY_WEIGHT * energy_score
            + LIQUIDITY_WEIGHT * liquidity_score
            + VOLATILITY_WEIGHT * volatility_score
            + SENTIMENT_WEIGHT * sentiment_score
            + OPTIONS_WEIGHT * options_score;

        let (direction, confidence) = determine_direction(sentiment_value, energy_asymmetry);
        let opportunity_type = classify_opportunity(
            energy_asymmetry,
            movement_energy,
            hedge_out.regime.as_deref().unwrap_or(""),
        );
        let reasoning = build_reasoning(
            opportunity_type,
            energy_asymmetry,
            liquidity_quality,
            sentiment_value,
        );

        tracing::debug!(
            symbol,
            composite,
            kind = opportunity_type.as_str(),
            "scored symbol"
        );

        Some(OpportunityScore {
            symbol: symbol.to_string(),
            score: composite,
            rank: 0,
            energy_score,
            liquidity_score,
            volatility_score,
            sentiment_score,
            options_score,
            energy_asymmetry,
            movement_energy,
            liquidity_quality,
            direction,
            confidence,
            opportunity_type,
            reasoning,
            timestamp: now,
        })
    }

    /// Options activity from mean open interest and volume across the chain.
    async fn score_options(&self, symbol: &str, now: DateTime<Utc>) -> f64 {
        let chain = self.options_adapter.fetch_chain(symbol, now).await;
        if chain.is_empty() {
            return 0.0;
        }
        let n = chain.len() as f64;
        let mean_oi = chain.iter().map(|c| c.open_interest).sum::<f64>() / n;
        let mean_volume = chain.iter().map(|c| c.volume).sum::<f64>() / n;

        0.6 * (mean_oi / 500.0).min(1.0) + 0.4 * (mean_volume / 200.0).min(1.0)
    }
}

/// Signed gap between down- and up-move hedge energies, scaled to +/-20.
///
/// Vanna skews the dealer barrier: one direction fights `|gamma - vanna|`,
/// the other `|gamma + vanna|`.
pub fn derive_energy_asymmetry(gamma_pressure: f64, vanna_pressure: f64) -> f64 {
    let up_energy = (gamma_pressure - vanna_pressure).abs();
    let down_energy = (gamma_pressure + vanna_pressure).abs();
    20.0 * (down_energy - up_energy) / (up_energy + down_energy + EPS)
}

/// 70% asymmetry, 30% raw movement energy.
pub fn score_energy(energy_asymmetry: f64, movement_energy: f64) -> f64 {
    let asymmetry_score = (energy_asymmetry.abs() / 10.0).min(1.0);
    let energy_norm = (movement_energy / 1000.0).min(1.0).max(0.0);
    0.7 * asymmetry_score + 0.3 * energy_norm
}

/// Negative dealer gamma and an easy-to-move tape both add expansion
/// potential.
pub fn score_volatility(gamma_sign: f64, elasticity_up: f64) -> f64 {
    let gamma_score = if gamma_sign < 0.0 { 0.5 } else { 0.2 };
    let elasticity_score = (1.0 - elasticity_up).max(0.0);
    0.6 * gamma_score + 0.4 * elasticity_score
}

/// Direction from sentiment sign; confidence from asymmetry magnitude,
/// boosted when sentiment agrees strongly.
pub fn determine_direction(sentiment_value: f64, energy_asymmetry: f64) -> (SentimentBias, f64) {
    let direction = if sentiment_value > 0.2 {
        SentimentBias::Bullish
    } else if sentiment_value < -0.2 {
        SentimentBias::Bearish
    } else {
        SentimentBias::Neutral
    };

    let mut confidence = (energy_asymmetry.abs() / 15.0).min(1.0);
    if sentiment_value.abs() > 0.3 {
        confidence = (confidence * 1.2).min(1.0);
    }
    (direction, confidence)
}

/// First matching shape wins.
pub fn classify_opportunity(
    energy_asymmetry: f64,
    movement_energy: f64,
    hedge_regime: &str,
) -> OpportunityType {
    let asymmetry = energy_asymmetry.abs();
    if asymmetry > 10.0 {
        OpportunityType::Directional
    } else if movement_energy > 800.0 && asymmetry < 5.0 {
        OpportunityType::Volatility
    } else if movement_energy < 300.0 {
        OpportunityType::RangeBound
    } else if hedge_regime.to_lowercase().contains("squeeze") {
        OpportunityType::GammaSqueeze
    } else {
        OpportunityType::Mixed
    }
}

fn build_reasoning(
    opportunity_type: OpportunityType,
    energy_asymmetry: f64,
    liquidity_quality: f64,
    sentiment_value: f64,
) -> String {
    let mut parts = vec![match opportunity_type {
        OpportunityType::Directional => "Strong directional bias detected".to_string(),
        OpportunityType::Volatility => "Volatility expansion opportunity".to_string(),
        OpportunityType::RangeBound => "Range-bound, premium selling opportunity".to_string(),
        OpportunityType::GammaSqueeze => "Gamma squeeze potential".to_string(),
        OpportunityType::Mixed => "Mixed signals".to_string(),
    }];

    if energy_asymmetry.abs() > 10.0 {
        let side = if energy_asymmetry > 0.0 { "bullish" } else { "bearish" };
        parts.push(format!("High energy asymmetry ({side})"));
    }
    if liquidity_quality > 0.7 {
        parts.push("Excellent liquidity".to_string());
    } else if liquidity_quality < 0.4 {
        parts.push("Lower liquidity (caution)".to_string());
    }
    if sentiment_value > 0.3 {
        parts.push("Strong bullish sentiment".to_string());
    } else if sentiment_value < -0.3 {
        parts.push("Strong bearish sentiment".to_string());
    }

    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use directive_core::{
        ElasticityConfig, HedgeConfig, LiquidityConfig, SentimentConfig,
    };
    use market_adapters::{StaticMarketData, StaticOptionsChain};

    fn scanner_with(market: StaticMarketData, options: StaticOptionsChain) -> Arc<OpportunityScanner> {
        let market: Arc<dyn MarketDataAdapter> = Arc::new(market);
        let options: Arc<dyn OptionsChainAdapter> = Arc::new(options);
        Arc::new(OpportunityScanner::new(
            market.clone(),
            options.clone(),
            Arc::new(HedgeEngine::new(options.clone(), HedgeConfig::default())),
            Arc::new(LiquidityEngine::new(market.clone(), LiquidityConfig::default())),
            Arc::new(SentimentEngine::new(market.clone(), SentimentConfig::default())),
            Arc::new(ElasticityEngine::new(market, ElasticityConfig::default())),
            ScannerConfig::default(),
        ))
    }

    fn liquid_market() -> StaticMarketData {
        StaticMarketData {
            base_price: 100.0,
            drift_per_bar: 0.5,
            base_volume: 5_000_000.0,
            buy_fraction: 0.8,
        }
    }

    #[test]
    fn asymmetry_is_zero_without_vanna() {
        assert_eq!(derive_energy_asymmetry(1.0e6, 0.0), 0.0);
    }

    #[test]
    fn asymmetry_saturates_when_vanna_dominates() {
        // gamma ~ 0: up and down energies are equal, asymmetry vanishes even
        // though vanna is large
        assert!(derive_energy_asymmetry(0.0, 1.0e6).abs() < 1e-6);
        // vanna == gamma: one side cancels entirely
        let asym = derive_energy_asymmetry(1.0e6, 1.0e6);
        assert!((asym - 20.0).abs() < 1e-6);
    }

    #[test]
    fn energy_score_blends_asymmetry_and_movement() {
        let score = score_energy(10.0, 1000.0);
        assert!((score - 1.0).abs() < 1e-12);
        assert_eq!(score_energy(0.0, 0.0), 0.0);
    }

    #[test]
    fn volatility_score_prefers_short_gamma_and_loose_tape() {
        let squeeze_prone = score_volatility(-1.0, 0.2);
        let pinned = score_volatility(1.0, 1.0);
        assert!(squeeze_prone > pinned);
        assert!((squeeze_prone - (0.6 * 0.5 + 0.4 * 0.8)).abs() < 1e-12);
    }

    #[test]
    fn direction_follows_sentiment_sign() {
        let (direction, _) = determine_direction(0.5, 5.0);
        assert_eq!(direction, SentimentBias::Bullish);
        let (direction, _) = determine_direction(-0.5, 5.0);
        assert_eq!(direction, SentimentBias::Bearish);
        let (direction, _) = determine_direction(0.1, 5.0);
        assert_eq!(direction, SentimentBias::Neutral);
    }

    #[test]
    fn strong_sentiment_boosts_confidence() {
        let (_, base) = determine_direction(0.1, 7.5);
        let (_, boosted) = determine_direction(0.5, 7.5);
        assert!((base - 0.5).abs() < 1e-12);
        assert!((boosted - 0.6).abs() < 1e-12);
    }

    #[test]
    fn classification_order_is_stable() {
        assert_eq!(
            classify_opportunity(15.0, 100.0, "neutral"),
            OpportunityType::Directional
        );
        assert_eq!(
            classify_opportunity(2.0, 900.0, "neutral"),
            OpportunityType::Volatility
        );
        assert_eq!(
            classify_opportunity(2.0, 100.0, "neutral"),
            OpportunityType::RangeBound
        );
        assert_eq!(
            classify_opportunity(7.0, 500.0, "gamma_squeeze"),
            OpportunityType::GammaSqueeze
        );
        assert_eq!(
            classify_opportunity(7.0, 500.0, "neutral"),
            OpportunityType::Mixed
        );
    }

    #[tokio::test]
    async fn prefilter_rejects_penny_and_thin_symbols() {
        let penny = scanner_with(
            StaticMarketData {
                base_price: 2.0,
                base_volume: 5_000_000.0,
                ..Default::default()
            },
            StaticOptionsChain::default(),
        );
        assert!(!penny.passes_prefilter("PNNY", Utc::now()).await);

        let thin = scanner_with(
            StaticMarketData {
                base_price: 100.0,
                base_volume: 100.0,
                ..Default::default()
            },
            StaticOptionsChain::default(),
        );
        assert!(!thin.passes_prefilter("THIN", Utc::now()).await);

        let liquid = scanner_with(liquid_market(), StaticOptionsChain::default());
        assert!(liquid.passes_prefilter("SPY", Utc::now()).await);
    }

    #[tokio::test]
    async fn scan_ranks_by_composite_descending() {
        let scanner = scanner_with(liquid_market(), StaticOptionsChain::default());
        let universe: Vec<String> = ["SPY", "QQQ", "IWM"].map(String::from).to_vec();
        let result = scanner.scan(&universe, Utc::now()).await;

        assert_eq!(result.symbols_scanned, 3);
        assert_eq!(result.opportunities.len(), 3);
        for pair in result.opportunities.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for (i, opportunity) in result.opportunities.iter().enumerate() {
            assert_eq!(opportunity.rank, i + 1);
            assert!((0.0..=1.0).contains(&opportunity.score));
            assert!((0.0..=1.0).contains(&opportunity.confidence));
        }
    }

    #[tokio::test]
    async fn top_n_truncates_results() {
        let market: Arc<dyn MarketDataAdapter> = Arc::new(liquid_market());
        let options: Arc<dyn OptionsChainAdapter> = Arc::new(StaticOptionsChain::default());
        let scanner = Arc::new(OpportunityScanner::new(
            market.clone(),
            options.clone(),
            Arc::new(HedgeEngine::new(options.clone(), HedgeConfig::default())),
            Arc::new(LiquidityEngine::new(market.clone(), LiquidityConfig::default())),
            Arc::new(SentimentEngine::new(market.clone(), SentimentConfig::default())),
            Arc::new(ElasticityEngine::new(market, ElasticityConfig::default())),
            ScannerConfig {
                top_n: 2,
                ..Default::default()
            },
        ));
        let universe: Vec<String> = ["SPY", "QQQ", "IWM", "DIA"].map(String::from).to_vec();
        let result = scanner.scan(&universe, Utc::now()).await;
        assert_eq!(result.opportunities.len(), 2);
    }
}
