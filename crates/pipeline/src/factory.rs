//! Engine factory: builds a configured pipeline from numeric option maps
//! keyed by engine name.

use std::collections::BTreeMap;
use std::sync::Arc;

use composer::ComposerAgent;
use directive_core::{
    ComposerConfig, ConfigMap, DirectiveError, ElasticityConfig, HedgeConfig, LiquidityConfig,
    MarketDataAdapter, OptionsChainAdapter, SentimentConfig,
};
use elasticity_engine::ElasticityEngine;
use hedge_engine::HedgeEngine;
use liquidity_engine::LiquidityEngine;
use sentiment_engine::SentimentEngine;

use crate::PipelineRunner;

/// Option maps keyed by engine name. Unknown engine names and unknown keys
/// inside a map are both rejected at construction.
pub type FactoryConfig = BTreeMap<String, ConfigMap>;

/// Parsed per-engine configuration set.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigs {
    pub hedge: HedgeConfig,
    pub liquidity: LiquidityConfig,
    pub sentiment: SentimentConfig,
    pub elasticity: ElasticityConfig,
    pub composer: ComposerConfig,
}

impl EngineConfigs {
    pub fn from_factory(config: &FactoryConfig) -> Result<Self, DirectiveError> {
        let mut configs = Self::default();
        for (engine, options) in config {
            match engine.as_str() {
                "hedge" => configs.hedge = HedgeConfig::from_map(options)?,
                "liquidity" => configs.liquidity = LiquidityConfig::from_map(options)?,
                "sentiment" => configs.sentiment = SentimentConfig::from_map(options)?,
                "elasticity" => configs.elasticity = ElasticityConfig::from_map(options)?,
                "composer" => configs.composer = ComposerConfig::from_map(options)?,
                _ => {
                    return Err(DirectiveError::InvalidConfig(format!(
                        "unknown engine in factory config: {engine}"
                    )))
                }
            }
        }
        Ok(configs)
    }
}

/// Build a ready-to-run pipeline for one symbol.
pub fn build_pipeline(
    symbol: impl Into<String>,
    market_adapter: Arc<dyn MarketDataAdapter>,
    options_adapter: Arc<dyn OptionsChainAdapter>,
    config: &FactoryConfig,
) -> Result<PipelineRunner, DirectiveError> {
    let configs = EngineConfigs::from_factory(config)?;

    Ok(PipelineRunner::new(
        symbol,
        HedgeEngine::new(options_adapter.clone(), configs.hedge),
        LiquidityEngine::new(market_adapter.clone(), configs.liquidity),
        SentimentEngine::new(market_adapter.clone(), configs.sentiment),
        ElasticityEngine::new(market_adapter, configs.elasticity),
        ComposerAgent::new(configs.composer),
        options_adapter,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_adapters::StaticMarketData;
    use market_adapters::StaticOptionsChain;

    #[test]
    fn empty_factory_config_uses_defaults() {
        let configs = EngineConfigs::from_factory(&FactoryConfig::new()).unwrap();
        assert_eq!(configs.hedge.max_chain_size, 5000);
        assert!((configs.composer.hedge_weight - 0.40).abs() < 1e-12);
    }

    #[test]
    fn per_engine_options_are_applied() {
        let mut config = FactoryConfig::new();
        let mut hedge = ConfigMap::new();
        hedge.insert("gamma_squeeze_threshold".to_string(), 5.0e6);
        config.insert("hedge".to_string(), hedge);
        let mut composer = ConfigMap::new();
        composer.insert("hedge".to_string(), 0.5);
        composer.insert("liquidity".to_string(), 0.3);
        composer.insert("sentiment".to_string(), 0.2);
        config.insert("composer".to_string(), composer);

        let configs = EngineConfigs::from_factory(&config).unwrap();
        assert!((configs.hedge.gamma_squeeze_threshold - 5.0e6).abs() < 1.0);
        assert!((configs.composer.hedge_weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_engine_name_is_rejected() {
        let mut config = FactoryConfig::new();
        config.insert("momentum".to_string(), ConfigMap::new());
        assert!(matches!(
            EngineConfigs::from_factory(&config),
            Err(DirectiveError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_option_inside_engine_map_is_rejected() {
        let mut config = FactoryConfig::new();
        let mut liquidity = ConfigMap::new();
        liquidity.insert("bogus".to_string(), 1.0);
        config.insert("liquidity".to_string(), liquidity);
        assert!(matches!(
            EngineConfigs::from_factory(&config),
            Err(DirectiveError::UnknownConfigKey { .. })
        ));
    }

    #[test]
    fn factory_builds_a_runner() {
        let market: Arc<dyn MarketDataAdapter> = Arc::new(StaticMarketData::default());
        let options: Arc<dyn OptionsChainAdapter> = Arc::new(StaticOptionsChain::default());
        let runner = build_pipeline("SPY", market, options, &FactoryConfig::new()).unwrap();
        assert_eq!(runner.symbol(), "SPY");
    }
}
