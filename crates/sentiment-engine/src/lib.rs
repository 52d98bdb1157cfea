//! Sentiment sub-core: six processors, regime-aware fusion, and the rolling
//! news layer.

pub mod engine;
pub mod fusion;
pub mod indicators;
pub mod news;
pub mod novelty;
pub mod processors;
pub mod rolling;

pub use engine::SentimentEngine;
pub use fusion::{apply_graceful_degradation, detect_conflicting_signals, fuse_signals};
pub use news::{LexiconScorer, NewsPulse, NewsPulseStats};
pub use novelty::{hamming, simhash_64, NoveltyIndex};
pub use processors::{
    BreadthRegimeProcessor, EnergyProcessor, FlowBiasProcessor, OscillatorProcessor,
    VolatilityProcessor, VolatilityState, WyckoffPhase, WyckoffProcessor,
};
pub use rolling::{RollingStats, SentimentPoint};
