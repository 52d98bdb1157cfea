use directive_core::{
    Action, DirectiveError, EngineDirective, EngineOutput, StandardSnapshot, Suggestion,
};

use crate::{namespace_features, suggestion_id, PrimaryAgent};

#[derive(Debug, Clone)]
pub struct ElasticityAgentConfig {
    /// Energy above this multiple of baseline reads as expensive tape
    pub expensive_multiple: f64,
}

impl Default for ElasticityAgentConfig {
    fn default() -> Self {
        Self {
            expensive_multiple: 2.0,
        }
    }
}

/// Interprets move-energy features. Elasticity is direction-neutral: it
/// shapes style (premium selling vs directional) rather than bias.
#[derive(Debug, Default)]
pub struct ElasticityAgent {
    config: ElasticityAgentConfig,
    last_engine_output: Option<EngineOutput>,
}

impl ElasticityAgent {
    pub fn new(config: ElasticityAgentConfig) -> Self {
        Self {
            config,
            last_engine_output: None,
        }
    }

    pub fn set_engine_output(&mut self, output: EngineOutput) {
        self.last_engine_output = Some(output);
    }
}

impl PrimaryAgent for ElasticityAgent {
    fn name(&self) -> &'static str {
        "elasticity"
    }

    fn step(&self, snapshot: &StandardSnapshot) -> Suggestion {
        let energy_up = snapshot
            .elasticity
            .get("energy_to_move_1pct_up")
            .copied()
            .unwrap_or(1.0);
        let move_cost = snapshot
            .elasticity
            .get("expected_move_cost_1d")
            .copied()
            .unwrap_or(0.0);

        let (action, confidence, reasoning, tags) = if energy_up > self.config.expensive_multiple {
            (
                Action::Spread,
                0.6,
                "High move cost favors defined-risk structures".to_string(),
                vec!["high_resistance".to_string()],
            )
        } else if move_cost > 1.0 {
            (
                Action::Spread,
                0.5,
                "Elevated expected move cost".to_string(),
                vec!["expensive_tape".to_string()],
            )
        } else {
            (
                Action::Flat,
                0.5,
                "Price moves freely".to_string(),
                Vec::new(),
            )
        };

        Suggestion {
            id: suggestion_id("elasticity", snapshot),
            layer: "primary_elasticity".to_string(),
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
            .ok_or(DirectiveError::AgentOutputUnavailable("ElasticityAgent"))?;

        let energy_up = output.feature("energy_to_move_1pct_up");
        let elasticity_up = output.feature("elasticity_up");
        let move_cost = output.feature("expected_move_cost_1d");

        let regime = output
            .regime
            .clone()
            .unwrap_or_else(|| "low_resistance".to_string());
        let notes = format!(
            "ElasticityAgent | regime={regime} | energy_up={energy_up:.4} | move_cost={move_cost:.4}"
        );

        Ok(EngineDirective {
            name: "elasticity".to_string(),
            direction: 0.0,
            // How much the environment resists movement
            strength: (1.0 - elasticity_up.min(1.0)).clamp(0.0, 1.0),
            confidence: output.confidence,
            regime,
            energy: energy_up.max(0.0),
            volatility_proxy: move_cost.max(0.0),
            features: namespace_features("elasticity", &output.features),
            notes,
        })
    }
}
