use directive_core::{
    Action, DirectiveError, EngineDirective, EngineOutput, StandardSnapshot, Suggestion,
};

use crate::{namespace_features, suggestion_id, PrimaryAgent};

/// Thresholds for interpreting dealer gamma positioning.
#[derive(Debug, Clone)]
pub struct HedgeAgentConfig {
    pub short_gamma_threshold: f64,
    pub long_gamma_threshold: f64,
}

impl Default for HedgeAgentConfig {
    fn default() -> Self {
        Self {
            short_gamma_threshold: 1.0e6,
            long_gamma_threshold: 1.0e6,
        }
    }
}

/// Interprets hedge features: short dealer gamma amplifies moves, long
/// dealer gamma pins price.
#[derive(Debug, Default)]
pub struct HedgeAgent {
    config: HedgeAgentConfig,
    last_engine_output: Option<EngineOutput>,
}

impl HedgeAgent {
    pub fn new(config: HedgeAgentConfig) -> Self {
        Self {
            config,
            last_engine_output: None,
        }
    }

    pub fn set_engine_output(&mut self, output: EngineOutput) {
        self.last_engine_output = Some(output);
    }
}

impl PrimaryAgent for HedgeAgent {
    fn name(&self) -> &'static str {
        "hedge"
    }

    fn step(&self, snapshot: &StandardSnapshot) -> Suggestion {
        let gamma_pressure = snapshot.hedge.get("gamma_pressure").copied().unwrap_or(0.0);

        let (action, confidence, reasoning, tags) =
            if gamma_pressure < -self.config.short_gamma_threshold {
                (
                    Action::Long,
                    0.7,
                    "Short gamma regime amplifies moves".to_string(),
                    vec!["short_gamma".to_string()],
                )
            } else if gamma_pressure > self.config.long_gamma_threshold {
                (
                    Action::Flat,
                    0.3,
                    "Long gamma dampens moves".to_string(),
                    vec!["long_gamma".to_string()],
                )
            } else {
                (
                    Action::Flat,
                    0.5,
                    "Neutral hedge field".to_string(),
                    Vec::new(),
                )
            };

        Suggestion {
            id: suggestion_id("hedge", snapshot),
            layer: "primary_hedge".to_string(),
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
            .ok_or(DirectiveError::AgentOutputUnavailable("HedgeAgent"))?;

        let gamma_pressure = output.feature("gamma_pressure");
        let gamma_sign = output.feature("gamma_sign");
        let energy = output.feature("hedge_regime_energy");

        // Short dealer gamma: hedging chases price, so pressure magnitude
        // becomes an upward-amplification bias. Long gamma pins; no push.
        let direction = if gamma_sign < 0.0 {
            (gamma_pressure.abs() / self.config.short_gamma_threshold).min(1.0)
        } else {
            0.0
        };
        let strength = (energy
            / (self.config.short_gamma_threshold + self.config.long_gamma_threshold))
            .min(1.0);

        let regime = output.regime.clone().unwrap_or_else(|| "neutral".to_string());
        let notes = format!(
            "HedgeAgent | regime={regime} | gamma_pressure={gamma_pressure:.3e} | energy={energy:.3e}"
        );

        Ok(EngineDirective {
            name: "hedge".to_string(),
            direction: direction.clamp(-1.0, 1.0),
            strength,
            confidence: output.confidence,
            regime,
            energy,
            volatility_proxy: energy / 1.0e6,
            features: namespace_features("hedge", &output.features),
            notes,
        })
    }
}
