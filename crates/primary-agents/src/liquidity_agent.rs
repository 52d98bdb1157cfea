use directive_core::{
    Action, DirectiveError, EngineDirective, EngineOutput, StandardSnapshot, Suggestion,
};

use crate::{namespace_features, suggestion_id, PrimaryAgent};

#[derive(Debug, Clone)]
pub struct LiquidityAgentConfig {
    pub thin_threshold: f64,
    pub one_sided_threshold: f64,
}

impl Default for LiquidityAgentConfig {
    fn default() -> Self {
        Self {
            thin_threshold: 1.0e-3,
            one_sided_threshold: 0.6,
        }
    }
}

/// Interprets liquidity features to determine market stance.
#[derive(Debug, Default)]
pub struct LiquidityAgent {
    config: LiquidityAgentConfig,
    last_engine_output: Option<EngineOutput>,
}

impl LiquidityAgent {
    pub fn new(config: LiquidityAgentConfig) -> Self {
        Self {
            config,
            last_engine_output: None,
        }
    }

    pub fn set_engine_output(&mut self, output: EngineOutput) {
        self.last_engine_output = Some(output);
    }
}

impl PrimaryAgent for LiquidityAgent {
    fn name(&self) -> &'static str {
        "liquidity"
    }

    fn step(&self, snapshot: &StandardSnapshot) -> Suggestion {
        let amihud = snapshot
            .liquidity
            .get("amihud_illiquidity")
            .copied()
            .unwrap_or(0.0);
        let ofi = snapshot.liquidity.get("ofi").copied().unwrap_or(0.0);

        let mut action = Action::Flat;
        let mut confidence = 0.4;
        let mut reasoning = "Normal liquidity".to_string();
        let mut tags = Vec::new();

        if amihud > self.config.thin_threshold {
            action = Action::Spread;
            confidence = 0.6;
            reasoning = "Thin liquidity suggests spreads".to_string();
            tags.push("thin_liquidity".to_string());
        }
        if ofi > self.config.one_sided_threshold {
            action = Action::Long;
            confidence = 0.7;
            reasoning = "Strong buy-side flow".to_string();
            tags.push("one_sided_flow".to_string());
        } else if ofi < -self.config.one_sided_threshold {
            action = Action::Short;
            confidence = 0.7;
            reasoning = "Strong sell-side flow".to_string();
            tags.push("one_sided_flow".to_string());
        }

        Suggestion {
            id: suggestion_id("liquidity", snapshot),
            layer: "primary_liquidity".to_string(),
            symbol: snapshot.symbol.clone(),
            action,
            confidence,
            forecast: Default::default(),
            reasoning,
            tags,
        }
    }

    fn output(&self) -> Result<EngineDirective, DirectiveError> {
        let output = self
            .last_engine_output
            .as_ref()
            .ok_or(DirectiveError::AgentOutputUnavailable("LiquidityAgent"))?;

        // POLR direction is the primary bias; raw order-flow imbalance is the
        // fallback when POLR is flat
        let polr_direction = output.feature("polr_direction");
        let direction = if polr_direction.abs() < 0.1 {
            output.feature("ofi").clamp(-1.0, 1.0)
        } else {
            polr_direction.clamp(-1.0, 1.0)
        };

        let liquidity_score = output.feature("liquidity_score");
        let strength = (output.feature("polr_strength") * liquidity_score).clamp(0.0, 1.0);

        let amihud = output.feature("amihud_illiquidity");
        let spread_bps = output.feature("spread_bps");
        // Friction: what it costs to cross the market, in score units
        let energy = spread_bps / 100.0 + amihud / self.config.thin_threshold;

        let regime = output.regime.clone().unwrap_or_else(|| "normal".to_string());
        let notes = format!(
            "LiquidityAgent | regime={regime} | polr_dir={polr_direction:.2} | score={liquidity_score:.2} | friction={energy:.4}"
        );

        Ok(EngineDirective {
            name: "liquidity".to_string(),
            direction,
            strength,
            confidence: output.confidence,
            regime,
            energy,
            volatility_proxy: amihud * 1.0e6,
            features: namespace_features("liquidity", &output.features),
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use directive_core::EngineKind;
    use std::collections::BTreeMap;

    fn snapshot(ofi: f64, amihud: f64) -> StandardSnapshot {
        let mut liquidity = BTreeMap::new();
        liquidity.insert("ofi".to_string(), ofi);
        liquidity.insert("amihud_illiquidity".to_string(), amihud);
        StandardSnapshot {
            symbol: "SPY".to_string(),
            timestamp: Utc::now(),
            hedge: BTreeMap::new(),
            liquidity,
            sentiment: BTreeMap::new(),
            elasticity: BTreeMap::new(),
            regime: None,
            metadata: BTreeMap::new(),
        }
    }

    fn engine_output(features: &[(&str, f64)]) -> EngineOutput {
        EngineOutput {
            kind: EngineKind::Liquidity,
            symbol: "SPY".to_string(),
            timestamp: Utc::now(),
            features: features
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            confidence: 1.0,
            regime: Some("normal".to_string()),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn strong_buy_flow_suggests_long() {
        let agent = LiquidityAgent::default();
        let suggestion = agent.step(&snapshot(0.8, 0.0));
        assert_eq!(suggestion.action, Action::Long);
        assert!((suggestion.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn strong_sell_flow_suggests_short() {
        let agent = LiquidityAgent::default();
        let suggestion = agent.step(&snapshot(-0.8, 0.0));
        assert_eq!(suggestion.action, Action::Short);
    }

    #[test]
    fn thin_liquidity_suggests_spreads() {
        let agent = LiquidityAgent::default();
        let suggestion = agent.step(&snapshot(0.0, 0.01));
        assert_eq!(suggestion.action, Action::Spread);
        assert!(suggestion.tags.contains(&"thin_liquidity".to_string()));
    }

    #[test]
    fn one_sided_flow_overrides_thin_liquidity() {
        let agent = LiquidityAgent::default();
        let suggestion = agent.step(&snapshot(0.9, 0.01));
        assert_eq!(suggestion.action, Action::Long);
    }

    #[test]
    fn output_before_set_is_fatal() {
        let agent = LiquidityAgent::default();
        assert!(matches!(
            agent.output(),
            Err(DirectiveError::AgentOutputUnavailable("LiquidityAgent"))
        ));
    }

    #[test]
    fn directive_uses_polr_and_scales_strength_by_quality() {
        let mut agent = LiquidityAgent::default();
        agent.set_engine_output(engine_output(&[
            ("polr_direction", 0.6),
            ("polr_strength", 0.6),
            ("liquidity_score", 0.5),
            ("ofi", 0.2),
            ("amihud_illiquidity", 1.0e-4),
            ("spread_bps", 10.0),
        ]));
        let directive = agent.output().unwrap();
        assert!((directive.direction - 0.6).abs() < 1e-12);
        assert!((directive.strength - 0.3).abs() < 1e-12);
        assert!(directive.energy > 0.0);
        assert!(directive.features.keys().all(|k| k.starts_with("liquidity.")));
    }

    #[test]
    fn flat_polr_falls_back_to_ofi() {
        let mut agent = LiquidityAgent::default();
        agent.set_engine_output(engine_output(&[
            ("polr_direction", 0.05),
            ("polr_strength", 0.05),
            ("liquidity_score", 0.9),
            ("ofi", -0.4),
        ]));
        let directive = agent.output().unwrap();
        assert!((directive.direction + 0.4).abs() < 1e-12);
    }
}
