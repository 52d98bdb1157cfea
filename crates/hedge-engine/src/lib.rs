//! Dealer hedge pressure engine.
//!
//! Aggregates per-contract Greeks weighted by open interest into pressure
//! features, classifies the hedging regime, and scores confidence by chain
//! coverage.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directive_core::{
    Engine, EngineKind, EngineOutput, Frame, HedgeConfig, OptionContract, OptionsChainAdapter,
};

/// Regime label for an empty or unusable chain.
const DEGRADED_REGIME: &str = "illiquid_gamma";

pub struct HedgeEngine {
    adapter: Arc<dyn OptionsChainAdapter>,
    config: HedgeConfig,
}

impl HedgeEngine {
    pub fn new(adapter: Arc<dyn OptionsChainAdapter>, config: HedgeConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &HedgeConfig {
        &self.config
    }

    /// Sum OI-weighted Greeks over the chain, skipping malformed rows.
    ///
    /// Returns an empty map when no contract carries finite Greeks; callers
    /// treat that the same as an empty chain.
    fn compute_features(&self, chain: &Frame<OptionContract>) -> BTreeMap<String, f64> {
        let mut gamma_pressure = 0.0;
        let mut vanna_pressure = 0.0;
        let mut charm_pressure = 0.0;
        let mut valid_rows = 0usize;

        for contract in chain.iter() {
            let row = [
                contract.gamma,
                contract.vanna,
                contract.charm,
                contract.open_interest,
                contract.underlying_price,
            ];
            if row.iter().any(|v| !v.is_finite()) {
                continue;
            }
            gamma_pressure += contract.gamma * contract.open_interest * contract.underlying_price;
            vanna_pressure += contract.vanna * contract.open_interest;
            charm_pressure += contract.charm * contract.open_interest;
            valid_rows += 1;
        }

        if valid_rows == 0 {
            return BTreeMap::new();
        }

        let mut features = BTreeMap::new();
        features.insert("gamma_pressure".to_string(), gamma_pressure);
        features.insert("vanna_pressure".to_string(), vanna_pressure);
        features.insert("charm_pressure".to_string(), charm_pressure);
        features.insert(
            "gamma_sign".to_string(),
            if gamma_pressure >= 0.0 { 1.0 } else { -1.0 },
        );
        features.insert(
            "vanna_sign".to_string(),
            if vanna_pressure >= 0.0 { 1.0 } else { -1.0 },
        );
        features.insert(
            "hedge_regime_energy".to_string(),
            gamma_pressure.abs() + vanna_pressure.abs(),
        );
        if let Some(latest) = chain.latest() {
            if latest.underlying_price.is_finite() && latest.underlying_price > 0.0 {
                features.insert("spot".to_string(), latest.underlying_price);
            }
        }
        features
    }

    /// Ordered classification; first match wins.
    fn determine_regime(&self, features: &BTreeMap<String, f64>) -> String {
        if features.is_empty() {
            return DEGRADED_REGIME.to_string();
        }
        let gamma_pressure = features.get("gamma_pressure").copied().unwrap_or(0.0);
        let vanna_pressure = features.get("vanna_pressure").copied().unwrap_or(0.0);

        if gamma_pressure.abs() > self.config.gamma_squeeze_threshold {
            "gamma_squeeze".to_string()
        } else if vanna_pressure.abs() > self.config.vanna_flow_threshold {
            "vanna_flow".to_string()
        } else if gamma_pressure.abs() < self.config.pin_threshold {
            "pin".to_string()
        } else {
            "neutral".to_string()
        }
    }

    fn compute_confidence(&self, chain_len: usize) -> f64 {
        (chain_len as f64 / self.config.max_chain_size as f64).min(1.0)
    }
}

#[async_trait]
impl Engine for HedgeEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Hedge
    }

    async fn run(&self, symbol: &str, now: DateTime<Utc>) -> EngineOutput {
        let chain = self.adapter.fetch_chain(symbol, now).await;
        if chain.is_empty() {
            return EngineOutput::degraded(
                EngineKind::Hedge,
                symbol,
                now,
                DEGRADED_REGIME,
                "no_data",
            );
        }

        let features = self.compute_features(&chain);
        if features.is_empty() {
            tracing::warn!(symbol, rows = chain.len(), "options chain had no usable rows");
            return EngineOutput::degraded(
                EngineKind::Hedge,
                symbol,
                now,
                DEGRADED_REGIME,
                "malformed_chain",
            );
        }

        let regime = self.determine_regime(&features);
        let confidence = self.compute_confidence(chain.len());
        tracing::debug!(symbol, regime = %regime, confidence, "hedge engine tick");

        EngineOutput {
            kind: EngineKind::Hedge,
            symbol: symbol.to_string(),
            timestamp: now,
            features,
            confidence,
            regime: Some(regime),
            metadata: BTreeMap::new(),
        }
    }
}
