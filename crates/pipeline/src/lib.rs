//! Per-tick pipeline orchestration.
//!
//! Fan-out: engines run concurrently, the snapshot is assembled from their
//! joined outputs, agents interpret it, the composer fuses directives, the
//! trade constructor maps the composite into ideas, and a ledger record is
//! appended. Degraded engines never abort a tick; only a missing agent
//! hand-off does.

pub mod factory;
pub mod fleet;
pub mod ledger;
pub mod tracker;

pub use factory::{build_pipeline, EngineConfigs, FactoryConfig};
pub use fleet::PipelineFleet;
pub use ledger::{JsonlLedger, LedgerSink, MemoryLedger};
pub use tracker::{AccuracySummary, LedgerMetrics, PredictionTracker};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use composer::ComposerAgent;
use directive_core::{
    CompositeMarketDirective, DirectiveError, Engine, EngineDirective, EngineOutput, LedgerRecord,
    OptionsChainAdapter, StandardSnapshot, Suggestion, TradeConstructor, TradeIdea,
};
use elasticity_engine::ElasticityEngine;
use hedge_engine::HedgeEngine;
use liquidity_engine::LiquidityEngine;
use primary_agents::{
    ElasticityAgent, HedgeAgent, LiquidityAgent, PrimaryAgent, SentimentAgent,
};
use sentiment_engine::SentimentEngine;

/// Everything produced by one pipeline pass.
#[derive(Debug, Clone)]
pub struct TickResult {
    pub snapshot: StandardSnapshot,
    pub primary_suggestions: Vec<Suggestion>,
    pub composite: CompositeMarketDirective,
    pub composite_suggestion: Suggestion,
    pub trade_ideas: Vec<TradeIdea>,
}

/// Coordinates a single symbol's pipeline.
///
/// Exclusive ownership (`&mut self` per tick) serializes ticks for one
/// symbol; independent runners handle independent symbols.
pub struct PipelineRunner {
    symbol: String,
    hedge_engine: HedgeEngine,
    liquidity_engine: LiquidityEngine,
    sentiment_engine: SentimentEngine,
    elasticity_engine: ElasticityEngine,
    hedge_agent: HedgeAgent,
    liquidity_agent: LiquidityAgent,
    sentiment_agent: SentimentAgent,
    elasticity_agent: ElasticityAgent,
    composer: ComposerAgent,
    options_adapter: Arc<dyn OptionsChainAdapter>,
    trade_constructor: Option<Arc<dyn TradeConstructor>>,
    ledger: Option<Arc<dyn LedgerSink>>,
}

impl PipelineRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        hedge_engine: HedgeEngine,
        liquidity_engine: LiquidityEngine,
        sentiment_engine: SentimentEngine,
        elasticity_engine: ElasticityEngine,
        composer: ComposerAgent,
        options_adapter: Arc<dyn OptionsChainAdapter>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            hedge_engine,
            liquidity_engine,
            sentiment_engine,
            elasticity_engine,
            hedge_agent: HedgeAgent::default(),
            liquidity_agent: LiquidityAgent::default(),
            sentiment_agent: SentimentAgent::default(),
            elasticity_agent: ElasticityAgent::default(),
            composer,
            options_adapter,
            trade_constructor: None,
            ledger: None,
        }
    }

    pub fn with_trade_constructor(mut self, constructor: Arc<dyn TradeConstructor>) -> Self {
        self.trade_constructor = Some(constructor);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerSink>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// One full pipeline pass for `now`.
    pub async fn run_once(&mut self, now: DateTime<Utc>) -> anyhow::Result<TickResult> {
        let symbol = self.symbol.clone();

        // Engines fan out concurrently; the snapshot waits for all of them
        let (hedge_out, liquidity_out, (envelope, sentiment_out), elasticity_out) = tokio::join!(
            self.hedge_engine.run(&symbol, now),
            self.liquidity_engine.run(&symbol, now),
            self.sentiment_engine.evaluate(&symbol, now),
            self.elasticity_engine.run(&symbol, now),
        );

        let snapshot = build_snapshot(
            &symbol,
            now,
            &hedge_out,
            &liquidity_out,
            &sentiment_out,
            &elasticity_out,
        );

        // Degraded engines are absent downstream: their agents are not fed
        // and contribute no directive this tick
        let mut directives: Vec<EngineDirective> = Vec::with_capacity(3);
        if !hedge_out.is_degraded() {
            self.hedge_agent.set_engine_output(hedge_out.clone());
            directives.push(self.hedge_agent.output().map_err(fatal)?);
        }
        if !liquidity_out.is_degraded() {
            self.liquidity_agent.set_engine_output(liquidity_out.clone());
            directives.push(self.liquidity_agent.output().map_err(fatal)?);
        }
        if !sentiment_out.is_degraded() {
            self.sentiment_agent.set_sentiment_envelope(envelope);
            directives.push(self.sentiment_agent.output().map_err(fatal)?);
        }
        if !elasticity_out.is_degraded() {
            self.elasticity_agent.set_engine_output(elasticity_out.clone());
        }

        let primary_suggestions = vec![
            self.hedge_agent.step(&snapshot),
            self.liquidity_agent.step(&snapshot),
            self.sentiment_agent.step(&snapshot),
            self.elasticity_agent.step(&snapshot),
        ];

        let (composite, composite_suggestion) =
            self.composer.compose_suggestion(&snapshot, &directives);

        let trade_ideas = match &self.trade_constructor {
            Some(constructor) => {
                let chain = self.options_adapter.fetch_chain(&symbol, now).await;
                constructor.generate(&composite_suggestion, &chain)
            }
            None => Vec::new(),
        };

        // Ledger append is the last step; a cancelled tick never writes
        if let Some(ledger) = &self.ledger {
            let record = LedgerRecord {
                timestamp: now,
                symbol: symbol.clone(),
                snapshot: snapshot.clone(),
                primary_suggestions: primary_suggestions.clone(),
                composite_suggestion: composite_suggestion.clone(),
                trade_ideas: trade_ideas.clone(),
                realized_pnl: None,
            };
            ledger.append(&record)?;
        }

        tracing::debug!(
            symbol = %symbol,
            direction = composite.direction,
            confidence = composite.confidence,
            ideas = trade_ideas.len(),
            "pipeline tick complete"
        );

        Ok(TickResult {
            snapshot,
            primary_suggestions,
            composite,
            composite_suggestion,
            trade_ideas,
        })
    }
}

fn fatal(err: DirectiveError) -> anyhow::Error {
    anyhow::Error::new(err)
}

/// Assemble the fused snapshot from engine outputs.
///
/// Features from degraded engines are withheld; downstream consumers see
/// empty maps and treat those engines as absent.
pub fn build_snapshot(
    symbol: &str,
    timestamp: DateTime<Utc>,
    hedge: &EngineOutput,
    liquidity: &EngineOutput,
    sentiment: &EngineOutput,
    elasticity: &EngineOutput,
) -> StandardSnapshot {
    fn features(output: &EngineOutput) -> BTreeMap<String, f64> {
        if output.is_degraded() {
            BTreeMap::new()
        } else {
            output.features.clone()
        }
    }

    let mut metadata = BTreeMap::new();
    for output in [hedge, liquidity, sentiment, elasticity] {
        if let Some(reason) = output.metadata.get("degraded") {
            metadata.insert(
                format!("{}_degraded", output.kind.as_str()),
                reason.clone(),
            );
        }
    }

    StandardSnapshot {
        symbol: symbol.to_string(),
        timestamp,
        hedge: features(hedge),
        liquidity: features(liquidity),
        sentiment: features(sentiment),
        elasticity: features(elasticity),
        regime: None,
        metadata,
    }
}
