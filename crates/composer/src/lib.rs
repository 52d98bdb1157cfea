//! The composer: fuses engine directives into one probabilistic
//! multi-timeframe market directive.
//!
//! Weighting is energy-first: hedge barriers dominate, orderflow is next,
//! sentiment is secondary. Confidence is calibrated by cross-engine
//! agreement and the prevailing regime.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use directive_core::{
    Action, ComposerConfig, CompositeMarketDirective, EngineDirective, RangeForecast,
    StandardSnapshot, Suggestion, TradeStyle,
};

/// Directives quieter than this do not participate in agreement counting.
const AGREEMENT_FLOOR: f64 = 0.1;

/// Base range (fraction of price) and multiplier per timeframe.
const TIMEFRAME_RANGES: &[(&str, f64, f64)] = &[
    ("1m", 0.002, 1.5),
    ("5m", 0.005, 2.0),
    ("15m", 0.008, 2.5),
    ("1h", 0.015, 3.0),
    ("4h", 0.025, 3.5),
    ("1d", 0.035, 4.0),
];

/// Cross-engine agreement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agreement {
    Full,
    Majority,
    Conflict,
    Neutral,
}

impl Agreement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Agreement::Full => "full",
            Agreement::Majority => "majority",
            Agreement::Conflict => "conflict",
            Agreement::Neutral => "neutral",
        }
    }

    fn confidence_multiplier(&self) -> f64 {
        match self {
            Agreement::Full => 1.2,
            Agreement::Majority => 1.0,
            Agreement::Conflict => 0.5,
            Agreement::Neutral => 0.7,
        }
    }
}

pub struct ComposerAgent {
    config: ComposerConfig,
}

impl ComposerAgent {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    fn engine_weight(&self, name: &str) -> f64 {
        match name {
            "hedge" => self.config.hedge_weight,
            "liquidity" => self.config.liquidity_weight,
            "sentiment" => self.config.sentiment_weight,
            _ => 0.0,
        }
    }

    /// Weighted directional consensus and the raw (pre-calibration)
    /// confidence. Missing engines simply contribute nothing.
    fn directional_bias(&self, directives: &[EngineDirective]) -> (f64, f64) {
        let mut weighted_direction = 0.0;
        let mut total_weight = 0.0;

        for directive in directives {
            let weight = self.engine_weight(&directive.name) * directive.confidence;
            weighted_direction += directive.direction * weight;
            total_weight += weight;
        }

        if total_weight > 0.0 {
            (weighted_direction / total_weight, total_weight.min(1.0))
        } else {
            (0.0, 0.0)
        }
    }

    /// Agreement among directives with a meaningful directional lean.
    fn agreement(&self, directives: &[EngineDirective]) -> Agreement {
        let signs: Vec<f64> = directives
            .iter()
            .filter(|d| d.direction.abs() >= AGREEMENT_FLOOR)
            .map(|d| d.direction.signum())
            .collect();

        if signs.is_empty() {
            return Agreement::Neutral;
        }

        let positive = signs.iter().filter(|s| **s > 0.0).count();
        let negative = signs.len() - positive;
        let majority = positive.max(negative);

        if majority == signs.len() {
            Agreement::Full
        } else if majority >= 2 {
            Agreement::Majority
        } else {
            Agreement::Conflict
        }
    }

    /// Fold agreement and regime character into the final confidence.
    fn calibrate_confidence(
        &self,
        raw_confidence: f64,
        agreement: Agreement,
        snapshot: &StandardSnapshot,
    ) -> f64 {
        let mut confidence = raw_confidence * agreement.confidence_multiplier();

        let regime = snapshot.regime.as_deref().unwrap_or("neutral").to_lowercase();
        if regime.contains("volatile") || regime.contains("toxic") {
            confidence *= 0.8;
        }
        if regime.contains("stable") || regime.contains("liquid") {
            confidence *= 1.1;
        }

        confidence.clamp(0.0, 1.0)
    }

    fn determine_action(&self, direction: f64, confidence: f64) -> Action {
        if confidence < self.config.confidence_threshold {
            Action::Flat
        } else if direction > self.config.action_threshold {
            Action::Long
        } else if direction < -self.config.action_threshold {
            Action::Short
        } else {
            Action::Spread
        }
    }

    fn trade_style(action: Action, direction: f64) -> TradeStyle {
        match action {
            Action::Long | Action::Short => TradeStyle::Directional,
            Action::Flat => TradeStyle::Flat,
            Action::Spread | Action::Complex => {
                if direction.abs() < AGREEMENT_FLOOR {
                    TradeStyle::Neutral
                } else {
                    TradeStyle::Spread
                }
            }
        }
    }

    /// Reference price: metadata, then hedge spot, then liquidity mid.
    fn reference_price(snapshot: &StandardSnapshot) -> f64 {
        if let Some(price) = snapshot
            .metadata
            .get("current_price")
            .and_then(|p| p.parse::<f64>().ok())
        {
            if price > 0.0 {
                return price;
            }
        }
        if let Some(spot) = snapshot.hedge.get("spot") {
            if *spot > 0.0 {
                return *spot;
            }
        }
        if let Some(mid) = snapshot.liquidity.get("mid_price") {
            if *mid > 0.0 {
                return *mid;
            }
        }
        100.0
    }

    /// Probabilistic range per timeframe, skewed by the directional bias.
    fn multi_tf_forecast(
        &self,
        current_price: f64,
        direction: f64,
        confidence: f64,
        snapshot: &StandardSnapshot,
    ) -> BTreeMap<String, RangeForecast> {
        // Harder-to-move tape means wider, less certain ranges. No engine
        // publishes `elasticity` into the hedge map today, so until a feed
        // injects it the multiplier stays at its default of 1.
        let elasticity = snapshot.hedge.get("elasticity").copied().unwrap_or(1.0);
        let vol_multiplier = 1.0 + (elasticity - 1.0) * 0.5;
        let in_range_prob = 0.5 + confidence.clamp(0.0, 1.0) * 0.4;

        let mut forecast = BTreeMap::new();
        for (tf, base, multiplier) in TIMEFRAME_RANGES {
            let adjusted_range = (base * vol_multiplier * multiplier).min(0.9);
            let skew = direction * adjusted_range * 0.5;
            let mid = current_price * (1.0 + skew);
            forecast.insert(
                tf.to_string(),
                RangeForecast {
                    low: mid * (1.0 - adjusted_range),
                    mid,
                    high: mid * (1.0 + adjusted_range),
                    prob: in_range_prob,
                },
            );
        }
        forecast
    }

    /// Weighted mean of an engine scalar under the same weight scheme as the
    /// directional consensus.
    fn weighted_scalar<F: Fn(&EngineDirective) -> f64>(
        &self,
        directives: &[EngineDirective],
        extract: F,
    ) -> f64 {
        let mut acc = 0.0;
        let mut total = 0.0;
        for directive in directives {
            let weight = self.engine_weight(&directive.name) * directive.confidence;
            acc += extract(directive) * weight;
            total += weight;
        }
        if total > 0.0 {
            acc / total
        } else {
            0.0
        }
    }

    fn rationale(
        directives: &[EngineDirective],
        direction: f64,
        agreement: Agreement,
        confidence: f64,
    ) -> String {
        let mut parts = vec![match agreement {
            Agreement::Full => "All engines agree".to_string(),
            Agreement::Majority => "Majority agreement".to_string(),
            Agreement::Conflict => "Conflicting signals".to_string(),
            Agreement::Neutral => "Neutral positioning".to_string(),
        }];

        for directive in directives {
            parts.push(format!(
                "{}: {:+.2} ({:.2})",
                directive.name, directive.direction, directive.confidence
            ));
        }

        if direction.abs() > 0.3 {
            let side = if direction > 0.0 { "bullish" } else { "bearish" };
            let grade = if direction.abs() > 0.6 { "strong" } else { "moderate" };
            parts.push(format!("Consensus: {grade} {side} ({direction:+.2})"));
        } else {
            parts.push(format!("Consensus: rangebound ({direction:+.2})"));
        }
        parts.push(format!("Confidence: {confidence:.2}"));

        parts.join(" | ")
    }

    /// Main composition pass.
    pub fn compose(
        &self,
        snapshot: &StandardSnapshot,
        directives: &[EngineDirective],
    ) -> CompositeMarketDirective {
        let (direction, raw_confidence) = self.directional_bias(directives);
        let agreement = self.agreement(directives);
        let confidence = self.calibrate_confidence(raw_confidence, agreement, snapshot);

        let current_price = Self::reference_price(snapshot);
        let forecast = self.multi_tf_forecast(current_price, direction, confidence, snapshot);

        let action = self.determine_action(direction, confidence);
        let trade_style = Self::trade_style(action, direction);

        let energy_cost = self.weighted_scalar(directives, |d| d.energy).max(0.0);
        let volatility = self
            .weighted_scalar(directives, |d| d.volatility_proxy)
            .max(0.0);

        let regime = snapshot
            .regime
            .clone()
            .unwrap_or_else(|| "neutral".to_string());
        let rationale = Self::rationale(directives, direction, agreement, confidence);

        tracing::debug!(
            symbol = %snapshot.symbol,
            direction,
            confidence,
            agreement = agreement.as_str(),
            "composed directive"
        );

        CompositeMarketDirective {
            symbol: snapshot.symbol.clone(),
            timestamp: snapshot.timestamp,
            direction: direction.clamp(-1.0, 1.0),
            strength: direction.abs().min(1.0),
            confidence,
            regime,
            energy_cost,
            trade_style,
            volatility,
            forecast,
            rationale,
        }
    }

    /// Compose and flatten into the pipeline's suggestion form.
    pub fn compose_suggestion(
        &self,
        snapshot: &StandardSnapshot,
        directives: &[EngineDirective],
    ) -> (CompositeMarketDirective, Suggestion) {
        let directive = self.compose(snapshot, directives);
        let action = self.determine_action(directive.direction, directive.confidence);

        let mut forecast = BTreeMap::new();
        for (tf, range) in &directive.forecast {
            forecast.insert(format!("{tf}_low"), range.low);
            forecast.insert(format!("{tf}_mid"), range.mid);
            forecast.insert(format!("{tf}_high"), range.high);
            forecast.insert(format!("{tf}_prob"), range.prob);
        }
        forecast.insert("directional_bias".to_string(), directive.direction);
        forecast.insert(
            "current_price".to_string(),
            Self::reference_price(snapshot),
        );

        let suggestion = Suggestion {
            id: format!(
                "composer-{}-{}",
                snapshot.symbol,
                snapshot.timestamp.timestamp_millis()
            ),
            layer: "composer".to_string(),
            symbol: snapshot.symbol.clone(),
            action,
            confidence: directive.confidence,
            forecast,
            reasoning: directive.rationale.clone(),
            tags: vec!["composer".to_string(), "multi_tf".to_string()],
        };

        (directive, suggestion)
    }
}

impl Default for ComposerAgent {
    fn default() -> Self {
        Self::new(ComposerConfig::default())
    }
}

/// Convenience for building snapshots in tests and demos.
pub fn empty_snapshot(symbol: &str, timestamp: DateTime<Utc>) -> StandardSnapshot {
    StandardSnapshot {
        symbol: symbol.to_string(),
        timestamp,
        hedge: BTreeMap::new(),
        liquidity: BTreeMap::new(),
        sentiment: BTreeMap::new(),
        elasticity: BTreeMap::new(),
        regime: None,
        metadata: BTreeMap::new(),
    }
}
