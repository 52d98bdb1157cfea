//! News scoring and the rolling news pulse.
//!
//! The production scorer is an external NLP model behind the `NewsScorer`
//! trait; `LexiconScorer` is the deterministic reference used by tests,
//! demos, and backtests.

use chrono::{DateTime, Utc};
use directive_core::{NewsItem, NewsScore, NewsScorer};

use crate::novelty::{simhash_64, NoveltyIndex};
use crate::rolling::{RollingStats, SentimentPoint};

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "profit", "growth", "beat", "upgrade", "outperform",
    "strong", "positive", "rise", "increase", "breakthrough", "success", "exceed", "momentum",
    "buy", "optimistic", "record", "advance", "upside", "recovery", "rebound", "expansion",
    "robust", "accelerating", "overweight", "raised", "tailwind",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "loss", "fall", "plunge", "crash", "miss", "downgrade", "underperform",
    "weak", "negative", "drop", "decrease", "concern", "risk", "fail", "disappoint", "slump",
    "sell", "warning", "pessimistic", "retreat", "fear", "trouble", "headwind", "lawsuit",
    "recall", "investigation", "default", "bankruptcy", "layoff", "downside", "underweight",
    "lowered",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't", "won't",
    "wouldn't", "couldn't", "shouldn't", "hardly", "barely", "neither", "nor", "without",
];

const NEGATION_WINDOW: usize = 3;

/// Deterministic lexicon scorer with a negation window.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    fn count_hits(text: &str) -> (usize, usize, usize) {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':'))
            .filter(|w| !w.is_empty())
            .collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| NEGATION_WORDS.contains(w))
            .map(|(i, _)| i)
            .collect();

        let mut positive = 0usize;
        let mut negative = 0usize;
        let mut total = 0usize;

        for (i, word) in words.iter().enumerate() {
            let is_positive = POSITIVE_WORDS.contains(word);
            let is_negative = NEGATIVE_WORDS.contains(word);
            if !is_positive && !is_negative {
                continue;
            }
            total += 1;

            let negated = negation_positions
                .iter()
                .any(|&pos| pos < i && i - pos <= NEGATION_WINDOW);

            match (is_positive, negated) {
                (true, false) | (false, true) => positive += 1,
                _ => negative += 1,
            }
        }
        (positive, negative, total)
    }
}

impl NewsScorer for LexiconScorer {
    fn score(&self, item: &NewsItem) -> NewsScore {
        // Headline carries double weight over the body
        let (mut pos, mut neg, mut total) = Self::count_hits(&item.headline);
        pos *= 2;
        neg *= 2;
        total *= 2;

        if let Some(body) = &item.body {
            let (p, n, t) = Self::count_hits(body);
            pos += p;
            neg += n;
            total += t;
        }

        if total == 0 {
            return NewsScore {
                neg: 0.0,
                neu: 1.0,
                pos: 0.0,
                signed: 0.0,
            };
        }

        let pos_frac = pos as f64 / total as f64;
        let neg_frac = neg as f64 / total as f64;
        let signed = ((pos as f64 - neg as f64) / total as f64).clamp(-1.0, 1.0);

        NewsScore {
            neg: neg_frac,
            neu: (1.0 - pos_frac - neg_frac).max(0.0),
            pos: pos_frac,
            signed,
        }
    }
}

/// Rolling news sentiment layer: scoring, dedup, and windowed statistics.
pub struct NewsPulse<S: NewsScorer> {
    scorer: S,
    rolling: RollingStats,
    novelty: NoveltyIndex,
}

/// Windowed diagnostics of the news tape.
#[derive(Debug, Clone, Copy)]
pub struct NewsPulseStats {
    pub weighted_mean: f64,
    pub weighted_std: f64,
    pub skew: f64,
    pub disagreement: f64,
    pub momentum: f64,
    pub novelty_ratio: f64,
    pub entropy: f64,
    pub item_count: usize,
}

impl<S: NewsScorer> NewsPulse<S> {
    pub fn new(scorer: S) -> Self {
        Self {
            scorer,
            rolling: RollingStats::default(),
            novelty: NoveltyIndex::default(),
        }
    }

    pub fn with_capacity(scorer: S, maxlen: usize, novelty_cache: usize) -> Self {
        Self {
            scorer,
            rolling: RollingStats::new(maxlen),
            novelty: NoveltyIndex::new(6, novelty_cache),
        }
    }

    /// Score and ingest a batch of news items.
    pub fn ingest(&mut self, items: &[NewsItem], now: DateTime<Utc>) {
        for item in items {
            let score = self.scorer.score(item);
            let hash = simhash_64(&item.headline);
            let is_unique = self.novelty.observe(hash);

            let recency = recency_weight(item.timestamp, now);
            let source = if item.is_press_release { 0.6 } else { 1.0 };
            // Duplicates still enter the window but carry a fraction of the weight
            let novelty = if is_unique { 1.0 } else { 0.3 };

            self.rolling.add(SentimentPoint {
                ts: item.timestamp,
                score: score.signed,
                weight: recency * source * novelty,
                is_unique,
                source_weight: source,
            });
        }
    }

    pub fn stats(&self) -> NewsPulseStats {
        let (mean, std, skew) = self.rolling.weighted_mean_std_skew();
        NewsPulseStats {
            weighted_mean: mean,
            weighted_std: std,
            skew,
            disagreement: self.rolling.disagreement(),
            momentum: self.rolling.momentum(20),
            novelty_ratio: self.rolling.novelty_ratio(),
            entropy: self.rolling.entropy(),
            item_count: self.rolling.len(),
        }
    }
}

/// Step decay by news age: fresh 1.0, day-old 0.7, week-old 0.4, stale 0.2.
fn recency_weight(published: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - published).num_hours();
    if age_hours < 24 {
        1.0
    } else if age_hours < 48 {
        0.7
    } else if age_hours < 168 {
        0.4
    } else {
        0.2
    }
}
