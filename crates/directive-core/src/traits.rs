use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Bar, EngineKind, EngineOutput, Frame, NewsItem, NewsScore, OptionContract, Suggestion, Trade,
    TradeIdea,
};

/// Source of OHLCV bars and intraday trade prints.
///
/// Adapters must not fail the pipeline: on any internal error they return an
/// empty frame and let the consuming engine degrade.
#[async_trait]
pub trait MarketDataAdapter: Send + Sync {
    async fn fetch_ohlcv(&self, symbol: &str, lookback_bars: usize, now: DateTime<Utc>)
        -> Frame<Bar>;

    async fn fetch_trades(
        &self,
        symbol: &str,
        lookback_minutes: i64,
        now: DateTime<Utc>,
    ) -> Frame<Trade>;
}

/// Source of options-chain snapshots.
#[async_trait]
pub trait OptionsChainAdapter: Send + Sync {
    async fn fetch_chain(&self, symbol: &str, now: DateTime<Utc>) -> Frame<OptionContract>;
}

/// Source of news items for a symbol.
#[async_trait]
pub trait NewsAdapter: Send + Sync {
    async fn fetch_news(
        &self,
        symbol: &str,
        lookback_hours: i64,
        now: DateTime<Utc>,
    ) -> Vec<NewsItem>;
}

/// Behaviour shared by all feature engines.
///
/// Engines never error out of `run`: data problems produce a degraded
/// `EngineOutput` (confidence 0) so the tick always completes.
#[async_trait]
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    async fn run(&self, symbol: &str, now: DateTime<Utc>) -> EngineOutput;
}

/// Black-box sentiment scorer for free text.
///
/// The NLP model is an external collaborator; only this interface is part of
/// the core.
pub trait NewsScorer: Send + Sync {
    fn score(&self, item: &NewsItem) -> NewsScore;
}

/// Maps a composite suggestion into concrete trade ideas.
pub trait TradeConstructor: Send + Sync {
    fn generate(&self, suggestion: &Suggestion, chain: &Frame<OptionContract>) -> Vec<TradeIdea>;
}
