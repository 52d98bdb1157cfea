//! Sentiment engine: runs all processors and fuses their signals.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directive_core::{
    DarkPoolData, Engine, EngineKind, EngineOutput, MarketDataAdapter, SentimentBias,
    SentimentConfig, SentimentEnvelope, SentimentSignal,
};

use crate::fusion::{apply_graceful_degradation, detect_conflicting_signals, fuse_signals};
use crate::processors::{
    BreadthRegimeProcessor, EnergyProcessor, FlowBiasProcessor, OscillatorProcessor,
    VolatilityProcessor, WyckoffProcessor,
};

const DEGRADED_REGIME: &str = "degraded";
const CONFLICT_THRESHOLD: f64 = 0.7;
const CONFLICT_CONFIDENCE_FACTOR: f64 = 0.7;

pub struct SentimentEngine {
    adapter: Arc<dyn MarketDataAdapter>,
    config: SentimentConfig,
    wyckoff: WyckoffProcessor,
    oscillators: OscillatorProcessor,
    volatility: VolatilityProcessor,
    flow: FlowBiasProcessor,
    breadth: BreadthRegimeProcessor,
    energy: EnergyProcessor,
    /// Optional dark-pool feed, injected when available
    darkpool: Option<DarkPoolData>,
}

impl SentimentEngine {
    pub fn new(adapter: Arc<dyn MarketDataAdapter>, config: SentimentConfig) -> Self {
        Self {
            wyckoff: WyckoffProcessor::from_config(&config),
            oscillators: OscillatorProcessor::from_config(&config),
            volatility: VolatilityProcessor::from_config(&config),
            flow: FlowBiasProcessor,
            breadth: BreadthRegimeProcessor::from_config(&config),
            energy: EnergyProcessor::from_config(&config),
            darkpool: None,
            adapter,
            config,
        }
    }

    pub fn with_darkpool(mut self, darkpool: DarkPoolData) -> Self {
        self.darkpool = Some(darkpool);
        self
    }

    pub fn config(&self) -> &SentimentConfig {
        &self.config
    }

    /// Full processing pass producing the fused envelope.
    pub async fn process(&self, symbol: &str, now: DateTime<Utc>) -> SentimentEnvelope {
        let lookback = self.config.max_lookback();
        let ohlcv = self.adapter.fetch_ohlcv(symbol, lookback, now).await;
        let trades = self
            .adapter
            .fetch_trades(symbol, self.config.orderflow_minutes, now)
            .await;

        if ohlcv.is_empty() {
            return SentimentEnvelope::neutral();
        }
        let bars = ohlcv.items();

        let mut signals: Vec<SentimentSignal> = Vec::with_capacity(6);
        let mut wyckoff_phase = None;
        let mut volatility_regime = None;
        let mut flow_regime = None;
        let mut breadth_regime = None;
        let mut energy_level = 0.0;

        if let Some((signal, phase)) = self.wyckoff.process(bars) {
            wyckoff_phase = Some(phase.as_str().to_string());
            signals.push(signal);
        }
        if let Some(signal) = self.oscillators.process(bars) {
            signals.push(signal);
        }
        if let Some((signal, state)) = self.volatility.process(bars) {
            volatility_regime = Some(state.as_str().to_string());
            signals.push(signal);
        }
        if let Some((signal, regime)) = self.flow.process(trades.items(), self.darkpool) {
            flow_regime = Some(regime);
            signals.push(signal);
        }
        if let Some((signal, regime)) = self.breadth.process(bars) {
            breadth_regime = Some(regime);
            signals.push(signal);
        }
        if let Some((signal, load)) = self.energy.process(bars) {
            energy_level = load;
            signals.push(signal);
        }

        if signals.is_empty() {
            return SentimentEnvelope::neutral();
        }

        let reported = signals.len();
        let signals = apply_graceful_degradation(signals, self.config.required_minimum);
        let has_conflict = detect_conflicting_signals(&signals, CONFLICT_THRESHOLD);

        let mut envelope = fuse_signals(
            &signals,
            energy_level,
            breadth_regime.as_deref(),
            self.config.bias_threshold,
        );

        if has_conflict {
            envelope.confidence *= CONFLICT_CONFIDENCE_FACTOR;
            tracing::debug!(symbol, "conflicting sentiment signals; confidence reduced");
        }
        if reported < self.config.required_minimum {
            tracing::debug!(
                symbol,
                reported,
                required = self.config.required_minimum,
                "sentiment degraded: fewer processors than required"
            );
        }

        envelope.wyckoff_phase = wyckoff_phase;
        envelope.volatility_regime = volatility_regime;
        envelope.flow_regime = flow_regime;
        envelope.breadth_regime = breadth_regime;
        envelope
    }

    /// Flatten an envelope into canonical engine features.
    pub fn envelope_to_output(
        symbol: &str,
        now: DateTime<Utc>,
        envelope: &SentimentEnvelope,
        conflict: bool,
    ) -> EngineOutput {
        let signed = match envelope.bias {
            SentimentBias::Bullish => envelope.strength,
            SentimentBias::Bearish => -envelope.strength,
            SentimentBias::Neutral => 0.0,
        };

        let mut features = BTreeMap::new();
        features.insert("sentiment_score".to_string(), signed);
        features.insert("sentiment_confidence".to_string(), envelope.confidence);
        features.insert("sentiment_energy".to_string(), envelope.energy);
        features.insert("conflict".to_string(), if conflict { 1.0 } else { 0.0 });

        let regime = envelope
            .breadth_regime
            .clone()
            .unwrap_or_else(|| envelope.bias.as_str().to_string());

        EngineOutput {
            kind: EngineKind::Sentiment,
            symbol: symbol.to_string(),
            timestamp: now,
            features,
            confidence: envelope.confidence,
            regime: Some(regime),
            metadata: BTreeMap::new(),
        }
    }

    /// One data pass producing both the envelope (for the sentiment agent)
    /// and the canonical engine output (for the snapshot).
    pub async fn evaluate(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> (SentimentEnvelope, EngineOutput) {
        let envelope = self.process(symbol, now).await;
        if envelope.confidence == 0.0 && envelope.drivers.is_empty() {
            let output = EngineOutput::degraded(
                EngineKind::Sentiment,
                symbol,
                now,
                DEGRADED_REGIME,
                "no_data",
            );
            return (envelope, output);
        }

        // Conflict is already folded into the envelope confidence; surface
        // the flag for downstream consumers.
        let (saw_pos, saw_neg) = envelope
            .drivers
            .iter()
            .filter(|(_, contribution)| contribution.abs() > CONFLICT_THRESHOLD)
            .fold((false, false), |(pos, neg), (_, c)| {
                (pos || *c > 0.0, neg || *c < 0.0)
            });
        let conflict = saw_pos && saw_neg;

        let output = Self::envelope_to_output(symbol, now, &envelope, conflict);
        (envelope, output)
    }
}

#[async_trait]
impl Engine for SentimentEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Sentiment
    }

    async fn run(&self, symbol: &str, now: DateTime<Utc>) -> EngineOutput {
        self.evaluate(symbol, now).await.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_adapters::{NullAdapters, StaticMarketData};

    fn engine(adapter: impl MarketDataAdapter + 'static) -> SentimentEngine {
        SentimentEngine::new(Arc::new(adapter), SentimentConfig::default())
    }

    #[tokio::test]
    async fn empty_ohlcv_degrades() {
        let out = engine(NullAdapters).run("SPY", Utc::now()).await;
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.regime.as_deref(), Some("degraded"));
        assert_eq!(out.metadata.get("degraded").map(String::as_str), Some("no_data"));
    }

    #[tokio::test]
    async fn empty_ohlcv_yields_neutral_envelope() {
        let envelope = engine(NullAdapters).process("SPY", Utc::now()).await;
        assert_eq!(envelope.bias, SentimentBias::Neutral);
        assert_eq!(envelope.strength, 0.0);
        assert_eq!(envelope.confidence, 0.0);
    }

    #[tokio::test]
    async fn uptrend_with_buying_reads_bullish() {
        let adapter = StaticMarketData {
            drift_per_bar: 0.5,
            buy_fraction: 0.9,
            ..Default::default()
        };
        let envelope = engine(adapter).process("SPY", Utc::now()).await;
        // Trend, breadth, flow, and energy all lean long; oscillators lean
        // short from overbought readings, which is exactly the tension the
        // fusion weighting resolves.
        assert!(envelope.confidence > 0.0);
        assert!(!envelope.drivers.is_empty());
        assert_eq!(envelope.breadth_regime.as_deref(), Some("risk_on"));
        assert!(envelope.wyckoff_phase.is_some());
    }

    #[tokio::test]
    async fn engine_output_mirrors_envelope() {
        let adapter = StaticMarketData {
            drift_per_bar: 0.5,
            buy_fraction: 0.9,
            ..Default::default()
        };
        let engine = engine(adapter);
        let now = Utc::now();
        let envelope = engine.process("SPY", now).await;
        let out = engine.run("SPY", now).await;

        assert_eq!(out.confidence, envelope.confidence);
        let score = out.feature("sentiment_score");
        match envelope.bias {
            SentimentBias::Bullish => assert!(score > 0.0),
            SentimentBias::Bearish => assert!(score < 0.0),
            SentimentBias::Neutral => assert_eq!(score, 0.0),
        }
        assert!(out.features.contains_key("sentiment_energy"));
    }

    #[tokio::test]
    async fn darkpool_feed_shifts_flow() {
        let base = StaticMarketData {
            buy_fraction: 0.5,
            ..Default::default()
        };
        let plain = engine(base.clone()).process("SPY", Utc::now()).await;
        let fed = SentimentEngine::new(Arc::new(base), SentimentConfig::default())
            .with_darkpool(DarkPoolData { dix: 0.60, gex: 0.0 })
            .process("SPY", Utc::now())
            .await;

        let plain_flow = plain
            .drivers
            .iter()
            .find(|(d, _)| d == "flow")
            .map(|(_, v)| *v)
            .unwrap_or(0.0);
        let fed_flow = fed
            .drivers
            .iter()
            .find(|(d, _)| d == "flow")
            .map(|(_, v)| *v)
            .unwrap_or(0.0);
        assert!(fed_flow > plain_flow);
    }
}
