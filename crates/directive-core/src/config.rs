use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::DirectiveError;

/// Numeric option map handed to the engine factories.
pub type ConfigMap = BTreeMap<String, f64>;

/// Hedge engine thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeConfig {
    pub gamma_squeeze_threshold: f64,
    pub vanna_flow_threshold: f64,
    pub pin_threshold: f64,
    pub max_chain_size: usize,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            gamma_squeeze_threshold: 1.0e6,
            vanna_flow_threshold: 1.0e6,
            pin_threshold: 1.0e5,
            max_chain_size: 5000,
        }
    }
}

impl HedgeConfig {
    /// Build from a numeric option map; unknown keys are rejected.
    pub fn from_map(map: &ConfigMap) -> Result<Self, DirectiveError> {
        let mut cfg = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "gamma_squeeze_threshold" => cfg.gamma_squeeze_threshold = *value,
                "vanna_flow_threshold" => cfg.vanna_flow_threshold = *value,
                "pin_threshold" => cfg.pin_threshold = *value,
                "max_chain_size" => cfg.max_chain_size = *value as usize,
                _ => {
                    return Err(DirectiveError::UnknownConfigKey {
                        engine: "hedge",
                        key: key.clone(),
                    })
                }
            }
        }
        if cfg.max_chain_size == 0 {
            return Err(DirectiveError::InvalidConfig(
                "hedge max_chain_size must be positive".to_string(),
            ));
        }
        Ok(cfg)
    }
}

/// Liquidity engine lookbacks and regime thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityConfig {
    pub lookback: usize,
    pub intraday_minutes: i64,
    pub thin_threshold: f64,
    pub high_threshold: f64,
    pub one_sided_threshold: f64,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            lookback: 30,
            intraday_minutes: 60,
            thin_threshold: 1.0e-3,
            high_threshold: 1.0e-4,
            one_sided_threshold: 0.6,
        }
    }
}

impl LiquidityConfig {
    pub fn from_map(map: &ConfigMap) -> Result<Self, DirectiveError> {
        let mut cfg = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "lookback" => cfg.lookback = *value as usize,
                "intraday_minutes" => cfg.intraday_minutes = *value as i64,
                "thin_threshold" => cfg.thin_threshold = *value,
                "high_threshold" => cfg.high_threshold = *value,
                "one_sided_threshold" => cfg.one_sided_threshold = *value,
                _ => {
                    return Err(DirectiveError::UnknownConfigKey {
                        engine: "liquidity",
                        key: key.clone(),
                    })
                }
            }
        }
        if cfg.lookback < 2 {
            return Err(DirectiveError::InvalidConfig(
                "liquidity lookback must be at least 2 bars".to_string(),
            ));
        }
        Ok(cfg)
    }
}

/// Elasticity engine options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticityConfig {
    pub lookback: usize,
    pub baseline_move_cost: f64,
}

impl Default for ElasticityConfig {
    fn default() -> Self {
        Self {
            lookback: 30,
            baseline_move_cost: 1.0,
        }
    }
}

impl ElasticityConfig {
    pub fn from_map(map: &ConfigMap) -> Result<Self, DirectiveError> {
        let mut cfg = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "lookback" => cfg.lookback = *value as usize,
                "baseline_move_cost" => cfg.baseline_move_cost = *value,
                _ => {
                    return Err(DirectiveError::UnknownConfigKey {
                        engine: "elasticity",
                        key: key.clone(),
                    })
                }
            }
        }
        if cfg.baseline_move_cost <= 0.0 {
            return Err(DirectiveError::InvalidConfig(
                "elasticity baseline_move_cost must be positive".to_string(),
            ));
        }
        Ok(cfg)
    }
}

/// Sentiment sub-core: per-processor periods plus fusion thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    pub wyckoff_lookback: usize,
    pub rsi_period: usize,
    pub mfi_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub overbought_threshold: f64,
    pub oversold_threshold: f64,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub kc_period: usize,
    pub kc_atr_period: usize,
    pub kc_atr_mult: f64,
    pub orderflow_minutes: i64,
    pub ma_short: usize,
    pub ma_mid: usize,
    pub ma_long: usize,
    pub momentum_window: usize,
    pub coherence_window: usize,
    pub bias_threshold: f64,
    pub required_minimum: usize,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            wyckoff_lookback: 30,
            rsi_period: 14,
            mfi_period: 14,
            stoch_k_period: 14,
            stoch_d_period: 3,
            overbought_threshold: 70.0,
            oversold_threshold: 30.0,
            bb_period: 20,
            bb_std_dev: 2.0,
            kc_period: 20,
            kc_atr_period: 10,
            kc_atr_mult: 1.5,
            orderflow_minutes: 60,
            ma_short: 10,
            ma_mid: 20,
            ma_long: 50,
            momentum_window: 10,
            coherence_window: 5,
            bias_threshold: 0.15,
            required_minimum: 3,
        }
    }
}

impl SentimentConfig {
    pub fn from_map(map: &ConfigMap) -> Result<Self, DirectiveError> {
        let mut cfg = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "wyckoff_lookback" => cfg.wyckoff_lookback = *value as usize,
                "rsi_period" => cfg.rsi_period = *value as usize,
                "mfi_period" => cfg.mfi_period = *value as usize,
                "stoch_k_period" => cfg.stoch_k_period = *value as usize,
                "stoch_d_period" => cfg.stoch_d_period = *value as usize,
                "overbought_threshold" => cfg.overbought_threshold = *value,
                "oversold_threshold" => cfg.oversold_threshold = *value,
                "bb_period" => cfg.bb_period = *value as usize,
                "bb_std_dev" => cfg.bb_std_dev = *value,
                "kc_period" => cfg.kc_period = *value as usize,
                "kc_atr_period" => cfg.kc_atr_period = *value as usize,
                "kc_atr_mult" => cfg.kc_atr_mult = *value,
                "orderflow_minutes" => cfg.orderflow_minutes = *value as i64,
                "ma_short" => cfg.ma_short = *value as usize,
                "ma_mid" => cfg.ma_mid = *value as usize,
                "ma_long" => cfg.ma_long = *value as usize,
                "momentum_window" => cfg.momentum_window = *value as usize,
                "coherence_window" => cfg.coherence_window = *value as usize,
                "bias_threshold" => cfg.bias_threshold = *value,
                "required_minimum" => cfg.required_minimum = *value as usize,
                _ => {
                    return Err(DirectiveError::UnknownConfigKey {
                        engine: "sentiment",
                        key: key.clone(),
                    })
                }
            }
        }
        if cfg.bias_threshold < 0.0 || cfg.bias_threshold > 1.0 {
            return Err(DirectiveError::InvalidConfig(
                "sentiment bias_threshold must be in [0, 1]".to_string(),
            ));
        }
        if cfg.required_minimum == 0 {
            return Err(DirectiveError::InvalidConfig(
                "sentiment required_minimum must be at least 1".to_string(),
            ));
        }
        Ok(cfg)
    }

    /// Longest processor lookback, padded so every indicator warms up.
    pub fn max_lookback(&self) -> usize {
        [
            self.wyckoff_lookback,
            self.rsi_period + 1,
            self.mfi_period + 1,
            self.stoch_k_period + self.stoch_d_period,
            self.bb_period,
            self.kc_period.max(self.kc_atr_period + 1),
            self.ma_long,
            self.momentum_window,
        ]
        .into_iter()
        .max()
        .unwrap_or(30)
            + 10
    }
}

/// Composer weights and action thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    pub hedge_weight: f64,
    pub liquidity_weight: f64,
    pub sentiment_weight: f64,
    pub action_threshold: f64,
    pub confidence_threshold: f64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        // Energy-first priority: hedge barriers dominate, orderflow next,
        // sentiment secondary.
        Self {
            hedge_weight: 0.40,
            liquidity_weight: 0.35,
            sentiment_weight: 0.25,
            action_threshold: 0.3,
            confidence_threshold: 0.5,
        }
    }
}

impl ComposerConfig {
    pub fn from_map(map: &ConfigMap) -> Result<Self, DirectiveError> {
        let mut cfg = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "hedge" | "hedge_weight" => cfg.hedge_weight = *value,
                "liquidity" | "liquidity_weight" => cfg.liquidity_weight = *value,
                "sentiment" | "sentiment_weight" => cfg.sentiment_weight = *value,
                "action_threshold" => cfg.action_threshold = *value,
                "confidence_threshold" => cfg.confidence_threshold = *value,
                _ => {
                    return Err(DirectiveError::UnknownConfigKey {
                        engine: "composer",
                        key: key.clone(),
                    })
                }
            }
        }
        if cfg.hedge_weight < 0.0 || cfg.liquidity_weight < 0.0 || cfg.sentiment_weight < 0.0 {
            return Err(DirectiveError::InvalidConfig(
                "composer weights must be non-negative".to_string(),
            ));
        }
        Ok(cfg)
    }
}

/// Opportunity scanner prefilter bounds and result size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub min_price: f64,
    pub max_price: f64,
    pub min_volume: f64,
    pub top_n: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_price: 10.0,
            max_price: 1000.0,
            min_volume: 1_000_000.0,
            top_n: 25,
        }
    }
}

impl ScannerConfig {
    pub fn from_map(map: &ConfigMap) -> Result<Self, DirectiveError> {
        let mut cfg = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "min_price" => cfg.min_price = *value,
                "max_price" => cfg.max_price = *value,
                "min_volume" => cfg.min_volume = *value,
                "top_n" => cfg.top_n = *value as usize,
                _ => {
                    return Err(DirectiveError::UnknownConfigKey {
                        engine: "scanner",
                        key: key.clone(),
                    })
                }
            }
        }
        if cfg.min_price > cfg.max_price {
            return Err(DirectiveError::InvalidConfig(
                "scanner min_price exceeds max_price".to_string(),
            ));
        }
        Ok(cfg)
    }
}
