//! Primary agents: stateless interpreters that turn engine features into
//! suggestions, plus the `output()` translation into normalized directives
//! for the composer.
//!
//! Calling `output()` before the corresponding engine result has been cached
//! is a programmer error and aborts the tick.

pub mod elasticity_agent;
pub mod hedge_agent;
pub mod liquidity_agent;
pub mod sentiment_agent;

pub use elasticity_agent::ElasticityAgent;
pub use hedge_agent::HedgeAgent;
pub use liquidity_agent::LiquidityAgent;
pub use sentiment_agent::SentimentAgent;

use directive_core::{DirectiveError, EngineDirective, StandardSnapshot, Suggestion};

/// Behaviour shared by all primary agents.
pub trait PrimaryAgent: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stateless interpretation of the fused snapshot.
    fn step(&self, snapshot: &StandardSnapshot) -> Suggestion;

    /// Translate the latest cached engine result into the composer's form.
    fn output(&self) -> Result<EngineDirective, DirectiveError>;
}

/// Deterministic suggestion id: agents never mint random identifiers so a
/// replayed pipeline is byte-identical.
pub(crate) fn suggestion_id(layer: &str, snapshot: &StandardSnapshot) -> String {
    format!(
        "{layer}-{}-{}",
        snapshot.symbol,
        snapshot.timestamp.timestamp_millis()
    )
}

/// Namespace a feature map as `{engine}.{key}`.
pub(crate) fn namespace_features(
    engine: &str,
    features: &std::collections::BTreeMap<String, f64>,
) -> std::collections::BTreeMap<String, f64> {
    features
        .iter()
        .map(|(key, value)| (format!("{engine}.{key}"), *value))
        .collect()
}
