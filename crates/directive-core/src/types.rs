use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub vwap: Option<f64>,
}

/// Aggressor side of an intraday trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Intraday trade print
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
}

/// Option right (call or put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

/// Per-strike, per-expiry options chain row with dealer Greeks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub right: OptionRight,
    pub bid: f64,
    pub ask: f64,
    pub implied_vol: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vanna: f64,
    pub charm: f64,
    pub vega: f64,
    pub theta: f64,
    pub open_interest: f64,
    pub volume: f64,
    pub underlying_price: f64,
}

impl OptionContract {
    /// Midpoint of bid/ask, falling back to whichever side is set.
    pub fn mid(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            (self.bid + self.ask) / 2.0
        } else {
            self.bid.max(self.ask)
        }
    }
}

/// News headline with optional body text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    #[serde(default)]
    pub body: Option<String>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_press_release: bool,
}

/// Black-box sentiment score for a piece of text.
///
/// The scoring model is an external collaborator; the core only depends on
/// this shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewsScore {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    /// Signed score in [-1, 1]
    pub signed: f64,
}

/// Ordered window of market data for one symbol.
///
/// Logically timestamped by its `asof` query time; an empty frame signals
/// degraded data rather than an error.
#[derive(Debug, Clone)]
pub struct Frame<T> {
    symbol: String,
    asof: DateTime<Utc>,
    items: Vec<T>,
}

impl<T> Frame<T> {
    pub fn new(symbol: impl Into<String>, asof: DateTime<Utc>, items: Vec<T>) -> Self {
        Self {
            symbol: symbol.into(),
            asof,
            items,
        }
    }

    /// Empty frame — the adapters' degraded-data sentinel.
    pub fn empty(symbol: impl Into<String>, asof: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            asof,
            items: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn asof(&self) -> DateTime<Utc> {
        self.asof
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

/// Engine discriminator used in outputs and snapshot assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Hedge,
    Liquidity,
    Sentiment,
    Elasticity,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Hedge => "hedge",
            EngineKind::Liquidity => "liquidity",
            EngineKind::Sentiment => "sentiment",
            EngineKind::Elasticity => "elasticity",
        }
    }
}

/// Canonical output of every engine.
///
/// Confidence 0 means "degraded, ignore features"; the reason is carried in
/// `metadata["degraded"]`. Feature maps are BTreeMaps so serialized records
/// are byte-stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOutput {
    pub kind: EngineKind,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub features: BTreeMap<String, f64>,
    pub confidence: f64,
    pub regime: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl EngineOutput {
    /// Degraded output: no features, confidence 0, reason in metadata.
    pub fn degraded(
        kind: EngineKind,
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        regime: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("degraded".to_string(), reason.into());
        Self {
            kind,
            symbol: symbol.into(),
            timestamp,
            features: BTreeMap::new(),
            confidence: 0.0,
            regime: Some(regime.into()),
            metadata,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.confidence <= 0.0
    }

    pub fn feature(&self, key: &str) -> f64 {
        self.features.get(key).copied().unwrap_or(0.0)
    }
}

/// Fused per-tick view consumed by all primary agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub hedge: BTreeMap<String, f64>,
    pub liquidity: BTreeMap<String, f64>,
    pub sentiment: BTreeMap<String, f64>,
    pub elasticity: BTreeMap<String, f64>,
    pub regime: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Policy-level action emitted by agents and the composer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Long,
    Short,
    Flat,
    Spread,
    Complex,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Long => "long",
            Action::Short => "short",
            Action::Flat => "flat",
            Action::Spread => "spread",
            Action::Complex => "complex",
        }
    }

    /// Directional actions participate in agreement counting.
    pub fn is_directional(&self) -> bool {
        matches!(self, Action::Long | Action::Short)
    }
}

/// A primary agent's verdict for one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub layer: String,
    pub symbol: String,
    pub action: Action,
    pub confidence: f64,
    #[serde(default)]
    pub forecast: BTreeMap<String, f64>,
    pub reasoning: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Normalized per-engine contribution to the composer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDirective {
    pub name: String,
    /// Directional bias in [-1, 1]
    pub direction: f64,
    /// Conviction magnitude in [0, 1]
    pub strength: f64,
    pub confidence: f64,
    pub regime: String,
    /// Energy cost of a move, engine-specific units, >= 0
    pub energy: f64,
    pub volatility_proxy: f64,
    /// Feature map namespaced as `{engine}.{feature}`
    pub features: BTreeMap<String, f64>,
    pub notes: String,
}

/// Trade style implied by a composite directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStyle {
    Directional,
    Spread,
    Neutral,
    Flat,
}

impl TradeStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStyle::Directional => "directional",
            TradeStyle::Spread => "spread",
            TradeStyle::Neutral => "neutral",
            TradeStyle::Flat => "flat",
        }
    }
}

/// Probabilistic price range for one timeframe.
///
/// Invariant: low <= mid <= high, prob in [0.5, 0.9].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RangeForecast {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    pub prob: f64,
}

/// Composer output: the unified market directive for one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeMarketDirective {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub direction: f64,
    pub strength: f64,
    pub confidence: f64,
    pub regime: String,
    pub energy_cost: f64,
    pub trade_style: TradeStyle,
    pub volatility: f64,
    pub forecast: BTreeMap<String, RangeForecast>,
    pub rationale: String,
}

/// Sentiment bias classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBias {
    Bullish,
    Bearish,
    Neutral,
}

impl SentimentBias {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentBias::Bullish => "bullish",
            SentimentBias::Bearish => "bearish",
            SentimentBias::Neutral => "neutral",
        }
    }
}

/// One sentiment processor's contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSignal {
    /// Signed sentiment value in [-1, 1]
    pub value: f64,
    pub confidence: f64,
    /// Fusion weight, > 0
    pub weight: f64,
    /// Processor name ("wyckoff", "oscillators", ...)
    pub driver: String,
}

/// Fused sentiment vector with per-driver attribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentEnvelope {
    pub bias: SentimentBias,
    pub strength: f64,
    pub energy: f64,
    pub confidence: f64,
    /// Driver contributions ordered by absolute magnitude
    pub drivers: Vec<(String, f64)>,
    #[serde(default)]
    pub wyckoff_phase: Option<String>,
    #[serde(default)]
    pub volatility_regime: Option<String>,
    #[serde(default)]
    pub flow_regime: Option<String>,
    #[serde(default)]
    pub breadth_regime: Option<String>,
}

impl SentimentEnvelope {
    /// Neutral envelope emitted when no signals are available.
    pub fn neutral() -> Self {
        Self {
            bias: SentimentBias::Neutral,
            strength: 0.0,
            energy: 0.0,
            confidence: 0.0,
            drivers: Vec::new(),
            wyckoff_phase: None,
            volatility_regime: None,
            flow_regime: None,
            breadth_regime: None,
        }
    }
}

/// Optional dark-pool positioning input for the flow processor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DarkPoolData {
    /// Dark-pool buying indicator, typically around 0.40-0.50
    pub dix: f64,
    /// Dealer gamma exposure estimate
    pub gex: f64,
}

/// Instrument of one trade leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentType {
    #[serde(rename = "C")]
    Call,
    #[serde(rename = "P")]
    Put,
    #[serde(rename = "STOCK")]
    Stock,
}

/// Buy/sell direction of one trade leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegDirection {
    Buy,
    Sell,
}

/// Single leg of a trade idea
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLeg {
    pub instrument_type: InstrumentType,
    pub direction: LegDirection,
    pub qty: i64,
    #[serde(default)]
    pub strike: Option<f64>,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
}

/// Net exposure of a trade idea
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSideLabel {
    Long,
    Short,
    Neutral,
}

/// Concrete trade object produced by the trade constructor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIdea {
    pub id: String,
    pub symbol: String,
    pub strategy_type: String,
    pub side: TradeSideLabel,
    pub legs: Vec<TradeLeg>,
    pub cost_per_unit: f64,
    pub max_loss: f64,
    pub max_profit: Option<f64>,
    pub breakeven_levels: Vec<f64>,
    pub target_exit_price: Option<f64>,
    pub stop_loss_price: Option<f64>,
    pub recommended_units: i64,
    pub confidence: f64,
    pub rationale: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Single ledger entry tracking a full pipeline pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub snapshot: StandardSnapshot,
    pub primary_suggestions: Vec<Suggestion>,
    pub composite_suggestion: Suggestion,
    pub trade_ideas: Vec<TradeIdea>,
    #[serde(default)]
    pub realized_pnl: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_signals_degraded() {
        let frame: Frame<Bar> = Frame::empty("SPY", Utc::now());
        assert!(frame.is_empty());
        assert!(frame.latest().is_none());
        assert_eq!(frame.symbol(), "SPY");
    }

    #[test]
    fn degraded_output_has_reason_and_zero_confidence() {
        let out = EngineOutput::degraded(
            EngineKind::Hedge,
            "SPY",
            Utc::now(),
            "illiquid_gamma",
            "no_data",
        );
        assert!(out.is_degraded());
        assert!(out.features.is_empty());
        assert_eq!(out.metadata.get("degraded").map(String::as_str), Some("no_data"));
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Action::Long).unwrap(), "\"long\"");
        assert_eq!(serde_json::to_string(&Action::Spread).unwrap(), "\"spread\"");
    }

    #[test]
    fn contract_mid_falls_back_to_set_side() {
        let mut c = OptionContract {
            underlying: "SPY".to_string(),
            expiry: NaiveDate::from_ymd_opt(2026, 9, 18).unwrap(),
            strike: 500.0,
            right: OptionRight::Call,
            bid: 1.0,
            ask: 1.2,
            implied_vol: 0.2,
            delta: 0.5,
            gamma: 0.01,
            vanna: 0.0,
            charm: 0.0,
            vega: 0.1,
            theta: -0.05,
            open_interest: 100.0,
            volume: 10.0,
            underlying_price: 500.0,
        };
        assert!((c.mid() - 1.1).abs() < 1e-12);
        c.bid = 0.0;
        assert!((c.mid() - 1.2).abs() < 1e-12);
    }
}
