use std::collections::BTreeMap;

use directive_core::{
    Action, DirectiveError, EngineDirective, SentimentBias, SentimentEnvelope, StandardSnapshot,
    Suggestion,
};

use crate::{suggestion_id, PrimaryAgent};

#[derive(Debug, Clone)]
pub struct SentimentAgentConfig {
    pub bullish_threshold: f64,
    pub bearish_threshold: f64,
}

impl Default for SentimentAgentConfig {
    fn default() -> Self {
        Self {
            bullish_threshold: 0.2,
            bearish_threshold: 0.2,
        }
    }
}

/// Interprets the fused sentiment envelope.
#[derive(Debug, Default)]
pub struct SentimentAgent {
    config: SentimentAgentConfig,
    last_envelope: Option<SentimentEnvelope>,
}

impl SentimentAgent {
    pub fn new(config: SentimentAgentConfig) -> Self {
        Self {
            config,
            last_envelope: None,
        }
    }

    pub fn set_sentiment_envelope(&mut self, envelope: SentimentEnvelope) {
        self.last_envelope = Some(envelope);
    }
}

impl PrimaryAgent for SentimentAgent {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    fn step(&self, snapshot: &StandardSnapshot) -> Suggestion {
        let score = snapshot
            .sentiment
            .get("sentiment_score")
            .copied()
            .unwrap_or(0.0);
        let confidence = snapshot
            .sentiment
            .get("sentiment_confidence")
            .copied()
            .unwrap_or(0.0);

        let (action, reasoning, tags) = if score > self.config.bullish_threshold {
            (
                Action::Long,
                "Positive sentiment".to_string(),
                vec!["bullish_sentiment".to_string()],
            )
        } else if score < -self.config.bearish_threshold {
            (
                Action::Short,
                "Negative sentiment".to_string(),
                vec!["bearish_sentiment".to_string()],
            )
        } else {
            (
                Action::Flat,
                "Mixed sentiment".to_string(),
                vec!["mixed_sentiment".to_string()],
            )
        };

        Suggestion {
            id: suggestion_id("sentiment", snapshot),
            layer: "primary_sentiment".to_string(),
            symbol: snapshot.symbol.clone(),
            action,
            confidence: confidence.min(1.0),
            forecast: Default::default(),
            reasoning,
            tags,
        }
    }

    fn output(&self) -> Result<EngineDirective, DirectiveError> {
        let envelope = self
            .last_envelope
            .as_ref()
            .ok_or(DirectiveError::AgentOutputUnavailable("SentimentAgent"))?;

        let direction = match envelope.bias {
            SentimentBias::Bullish => envelope.strength,
            SentimentBias::Bearish => -envelope.strength,
            SentimentBias::Neutral => 0.0,
        };

        let regime = envelope
            .breadth_regime
            .clone()
            .or_else(|| envelope.volatility_regime.clone())
            .or_else(|| envelope.flow_regime.clone())
            .unwrap_or_else(|| "normal".to_string());

        let mut features: BTreeMap<String, f64> = envelope
            .drivers
            .iter()
            .map(|(driver, value)| (format!("sentiment.{driver}"), *value))
            .collect();
        features.insert("sentiment.strength".to_string(), envelope.strength);
        features.insert("sentiment.energy".to_string(), envelope.energy);
        features.insert("sentiment.confidence".to_string(), envelope.confidence);

        let top_drivers: Vec<String> = envelope
            .drivers
            .iter()
            .take(3)
            .map(|(driver, value)| format!("{driver}={value:.2}"))
            .collect();
        let notes = format!(
            "SentimentAgent | bias={} | wyckoff={} | vol_regime={} | top=({})",
            envelope.bias.as_str(),
            envelope.wyckoff_phase.as_deref().unwrap_or("unknown"),
            envelope.volatility_regime.as_deref().unwrap_or("unknown"),
            top_drivers.join(", "),
        );

        Ok(EngineDirective {
            name: "sentiment".to_string(),
            direction: direction.clamp(-1.0, 1.0),
            strength: envelope.strength,
            confidence: envelope.confidence,
            regime,
            energy: envelope.energy,
            volatility_proxy: envelope.energy * 10.0,
            features,
            notes,
        })
    }
}
