//! Price elasticity engine.
//!
//! Estimates the energy required to move price 1% in either direction from
//! realized volatility and traded volume.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directive_core::{
    ElasticityConfig, Engine, EngineKind, EngineOutput, MarketDataAdapter,
};
use statrs::statistics::Statistics;

const DEGRADED_REGIME: &str = "low_resistance";
const EPS: f64 = 1e-6;

pub struct ElasticityEngine {
    adapter: Arc<dyn MarketDataAdapter>,
    config: ElasticityConfig,
}

impl ElasticityEngine {
    pub fn new(adapter: Arc<dyn MarketDataAdapter>, config: ElasticityConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &ElasticityConfig {
        &self.config
    }
}

#[async_trait]
impl Engine for ElasticityEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Elasticity
    }

    async fn run(&self, symbol: &str, now: DateTime<Utc>) -> EngineOutput {
        let ohlcv = self
            .adapter
            .fetch_ohlcv(symbol, self.config.lookback, now)
            .await;
        if ohlcv.is_empty() {
            return EngineOutput::degraded(
                EngineKind::Elasticity,
                symbol,
                now,
                DEGRADED_REGIME,
                "no_data",
            );
        }

        let closes: Vec<f64> = ohlcv.iter().map(|b| b.close).collect();
        let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let vol = if returns.len() > 1 {
            returns.as_slice().std_dev()
        } else {
            0.0
        };
        let avg_volume = ohlcv.iter().map(|b| b.volume).sum::<f64>() / ohlcv.len() as f64;
        let baseline = self.config.baseline_move_cost;

        // Volume always adds friction, so energy sits strictly above baseline
        let energy = baseline * (1.0 + vol.max(0.0)) * (1.0 + 1.0 / avg_volume.max(1.0));
        let energy_up = energy;
        let energy_down = energy;
        let elasticity_up = 1.0 / energy_up.max(EPS);
        let elasticity_down = 1.0 / energy_down.max(EPS);
        let expected_move_cost = baseline * vol * 100.0;

        let mut features = BTreeMap::new();
        features.insert("energy_to_move_1pct_up".to_string(), energy_up);
        features.insert("energy_to_move_1pct_down".to_string(), energy_down);
        features.insert("elasticity_up".to_string(), elasticity_up);
        features.insert("elasticity_down".to_string(), elasticity_down);
        features.insert("expected_move_cost_1d".to_string(), expected_move_cost);

        let regime = if energy_up > baseline {
            "high_resistance"
        } else {
            "low_resistance"
        };
        let confidence = (avg_volume / 10_000.0).min(1.0);
        tracing::debug!(symbol, regime, confidence, "elasticity engine tick");

        EngineOutput {
            kind: EngineKind::Elasticity,
            symbol: symbol.to_string(),
            timestamp: now,
            features,
            confidence,
            regime: Some(regime.to_string()),
            metadata: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_adapters::{NullAdapters, StaticMarketData};

    #[tokio::test]
    async fn empty_ohlcv_degrades() {
        let engine = ElasticityEngine::new(Arc::new(NullAdapters), ElasticityConfig::default());
        let out = engine.run("SPY", Utc::now()).await;
        assert_eq!(out.confidence, 0.0);
        assert!(out.features.is_empty());
        assert_eq!(out.metadata.get("degraded").map(String::as_str), Some("no_data"));
    }

    #[tokio::test]
    async fn energy_sits_above_baseline_and_inverts_to_elasticity() {
        let engine = ElasticityEngine::new(
            Arc::new(StaticMarketData::default()),
            ElasticityConfig::default(),
        );
        let out = engine.run("SPY", Utc::now()).await;
        let energy_up = out.feature("energy_to_move_1pct_up");
        assert!(energy_up > 1.0);
        assert_eq!(out.regime.as_deref(), Some("high_resistance"));
        assert!((out.feature("elasticity_up") - 1.0 / energy_up).abs() < 1e-12);
        // Symmetric by construction
        assert_eq!(energy_up, out.feature("energy_to_move_1pct_down"));
    }

    #[tokio::test]
    async fn confidence_tracks_average_volume() {
        let thin = ElasticityEngine::new(
            Arc::new(StaticMarketData {
                base_volume: 500.0,
                ..Default::default()
            }),
            ElasticityConfig::default(),
        );
        let out = thin.run("SPY", Utc::now()).await;
        assert!(out.confidence < 0.1);

        let deep = ElasticityEngine::new(
            Arc::new(StaticMarketData {
                base_volume: 1_000_000.0,
                ..Default::default()
            }),
            ElasticityConfig::default(),
        );
        let out = deep.run("SPY", Utc::now()).await;
        assert_eq!(out.confidence, 1.0);
    }

    #[tokio::test]
    async fn expected_move_cost_scales_with_volatility() {
        let calm = ElasticityEngine::new(
            Arc::new(StaticMarketData {
                drift_per_bar: 0.01,
                ..Default::default()
            }),
            ElasticityConfig::default(),
        );
        let wild = ElasticityEngine::new(
            Arc::new(StaticMarketData {
                drift_per_bar: 5.0,
                ..Default::default()
            }),
            ElasticityConfig::default(),
        );
        let calm_cost = calm.run("SPY", Utc::now()).await.feature("expected_move_cost_1d");
        let wild_cost = wild.run("SPY", Utc::now()).await.feature("expected_move_cost_1d");
        assert!(wild_cost >= calm_cost);
    }
}
