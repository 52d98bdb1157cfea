use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectiveError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Adapter fault: {0}")]
    AdapterFault(String),

    #[error("Malformed chain: {0}")]
    MalformedChain(String),

    #[error("Insufficient signals: got {got}, need {need}")]
    InsufficientSignals { got: usize, need: usize },

    #[error("Conflicting signals")]
    ConflictingSignals,

    #[error("Agent output unavailable: {0} — call set_engine_output() first")]
    AgentOutputUnavailable(&'static str),

    #[error("Unknown config key for {engine}: {key}")]
    UnknownConfigKey { engine: &'static str, key: String },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
