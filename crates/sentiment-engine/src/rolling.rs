//! Bounded rolling statistics over weighted sentiment scores.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// One observation in the rolling buffer.
#[derive(Debug, Clone, Copy)]
pub struct SentimentPoint {
    pub ts: DateTime<Utc>,
    /// Sentiment score in [-1, 1]
    pub score: f64,
    /// Combined weight (recency x source x novelty), > 0
    pub weight: f64,
    pub is_unique: bool,
    /// Source-specific weight in [0, 1]
    pub source_weight: f64,
}

/// Bounded FIFO of weighted sentiment observations.
///
/// Single writer, bounded eviction: appending beyond `maxlen` drops the
/// oldest point. All statistics are computed over the current window.
#[derive(Debug, Clone)]
pub struct RollingStats {
    maxlen: usize,
    buf: VecDeque<SentimentPoint>,
}

impl RollingStats {
    pub fn new(maxlen: usize) -> Self {
        Self {
            maxlen: maxlen.max(1),
            buf: VecDeque::with_capacity(maxlen.max(1).min(4096)),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    /// Append a point, evicting the oldest when full.
    pub fn add(&mut self, point: SentimentPoint) {
        if self.buf.len() == self.maxlen {
            self.buf.pop_front();
        }
        self.buf.push_back(point);
    }

    /// Weighted mean, standard deviation, and skewness of scores.
    pub fn weighted_mean_std_skew(&self) -> (f64, f64, f64) {
        let total_weight: f64 = self.buf.iter().map(|p| p.weight).sum();
        if total_weight <= 0.0 {
            return (0.0, 0.0, 0.0);
        }

        let mean = self
            .buf
            .iter()
            .map(|p| p.weight * p.score)
            .sum::<f64>()
            / total_weight;

        let variance = self
            .buf
            .iter()
            .map(|p| p.weight * (p.score - mean).powi(2))
            .sum::<f64>()
            / total_weight;
        let std = variance.max(1e-12).sqrt();

        let skew = if std > 1e-9 {
            self.buf
                .iter()
                .map(|p| p.weight * ((p.score - mean) / std).powi(3))
                .sum::<f64>()
                / total_weight
        } else {
            0.0
        };

        (mean, std, skew)
    }

    /// Imbalance between positive- and negative-weighted mass, in [0, 1].
    pub fn disagreement(&self) -> f64 {
        let pos: f64 = self
            .buf
            .iter()
            .filter(|p| p.score > 0.0)
            .map(|p| p.weight)
            .sum();
        let neg: f64 = self
            .buf
            .iter()
            .filter(|p| p.score < 0.0)
            .map(|p| p.weight)
            .sum();
        let total = pos + neg;
        if total == 0.0 {
            return 0.0;
        }
        (pos / total - neg / total).abs()
    }

    /// EWMA drift of scores relative to the weighted mean.
    pub fn momentum(&self, span: usize) -> f64 {
        if self.buf.len() < 2 {
            return 0.0;
        }
        let alpha = 2.0 / (span as f64 + 1.0);
        let mut ewma = 0.0;
        for point in &self.buf {
            ewma = alpha * point.score + (1.0 - alpha) * ewma;
        }
        let (mean, _, _) = self.weighted_mean_std_skew();
        ewma - mean
    }

    /// Fraction of unique content in the window, in [0, 1].
    pub fn novelty_ratio(&self) -> f64 {
        if self.buf.is_empty() {
            return 1.0;
        }
        let unique = self.buf.iter().filter(|p| p.is_unique).count();
        unique as f64 / self.buf.len() as f64
    }

    /// Mean score weighted only by source credibility.
    pub fn source_weighted_mean(&self) -> f64 {
        let total: f64 = self.buf.iter().map(|p| p.source_weight).sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.buf
            .iter()
            .map(|p| p.source_weight * p.score)
            .sum::<f64>()
            / total
    }

    /// Normalized Shannon entropy of the pos/neu/neg mass split, in [0, 1].
    pub fn entropy(&self) -> f64 {
        let mut pos = 0.0;
        let mut neg = 0.0;
        let mut neu = 0.0;
        for p in &self.buf {
            if p.score > 0.05 {
                pos += p.weight;
            } else if p.score < -0.05 {
                neg += p.weight;
            } else {
                neu += p.weight;
            }
        }
        let total = pos + neg + neu;
        if total <= 0.0 {
            return 0.0;
        }

        let mut entropy = 0.0;
        for mass in [pos, neg, neu] {
            let p = mass / total;
            if p > 1e-12 {
                entropy -= p * p.ln();
            }
        }
        if entropy > 0.0 {
            entropy / 3.0_f64.ln()
        } else {
            0.0
        }
    }

    /// Signal-to-noise ratio of the sentiment drift.
    pub fn sharpe_like(&self, drift_span: usize) -> f64 {
        let (_, std, _) = self.weighted_mean_std_skew();
        if std <= 1e-9 {
            return 0.0;
        }
        self.momentum(drift_span) / std
    }

    /// Z-score of the current mean against a historical baseline.
    pub fn surprise(&self, history_mean: f64, history_std: f64) -> f64 {
        if history_std <= 1e-9 {
            return 0.0;
        }
        let (mean, _, _) = self.weighted_mean_std_skew();
        (mean - history_mean) / history_std
    }
}

impl Default for RollingStats {
    fn default() -> Self {
        Self::new(5000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(score: f64, weight: f64, is_unique: bool) -> SentimentPoint {
        SentimentPoint {
            ts: Utc::now(),
            score,
            weight,
            is_unique,
            source_weight: 1.0,
        }
    }

    #[test]
    fn eviction_keeps_length_bounded() {
        let mut stats = RollingStats::new(3);
        for i in 0..10 {
            stats.add(point(i as f64 / 10.0, 1.0, true));
        }
        assert_eq!(stats.len(), 3);
        // Oldest evicted: only the last three scores remain
        let (mean, _, _) = stats.weighted_mean_std_skew();
        assert!((mean - 0.8).abs() < 1e-12);
    }

    #[test]
    fn weighted_mean_respects_weights() {
        let mut stats = RollingStats::new(100);
        stats.add(point(1.0, 3.0, true));
        stats.add(point(-1.0, 1.0, true));
        let (mean, std, _) = stats.weighted_mean_std_skew();
        assert!((mean - 0.5).abs() < 1e-12);
        assert!(std > 0.0);
    }

    #[test]
    fn empty_buffer_is_neutral() {
        let stats = RollingStats::new(10);
        assert_eq!(stats.weighted_mean_std_skew(), (0.0, 0.0, 0.0));
        assert_eq!(stats.disagreement(), 0.0);
        assert_eq!(stats.novelty_ratio(), 1.0);
    }

    #[test]
    fn disagreement_measures_imbalance() {
        let mut stats = RollingStats::new(10);
        stats.add(point(0.8, 1.0, true));
        stats.add(point(-0.8, 1.0, true));
        assert!(stats.disagreement() < 1e-12);

        let mut one_sided = RollingStats::new(10);
        one_sided.add(point(0.8, 1.0, true));
        one_sided.add(point(0.6, 1.0, true));
        assert!((one_sided.disagreement() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn novelty_ratio_counts_unique_fraction() {
        let mut stats = RollingStats::new(10);
        stats.add(point(0.1, 1.0, true));
        stats.add(point(0.1, 1.0, false));
        stats.add(point(0.1, 1.0, false));
        stats.add(point(0.1, 1.0, false));
        assert!((stats.novelty_ratio() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn entropy_is_zero_for_unanimous_and_high_for_split() {
        let mut unanimous = RollingStats::new(10);
        for _ in 0..5 {
            unanimous.add(point(0.5, 1.0, true));
        }
        assert!(unanimous.entropy() < 1e-9);

        let mut split = RollingStats::new(10);
        split.add(point(0.5, 1.0, true));
        split.add(point(-0.5, 1.0, true));
        split.add(point(0.0, 1.0, true));
        assert!(split.entropy() > 0.9);
    }

    #[test]
    fn momentum_detects_recent_shift() {
        let mut stats = RollingStats::new(100);
        for _ in 0..50 {
            stats.add(point(-0.2, 1.0, true));
        }
        for _ in 0..10 {
            stats.add(point(0.8, 1.0, true));
        }
        assert!(stats.momentum(20) > 0.0);
    }

    #[test]
    fn surprise_is_a_z_score() {
        let mut stats = RollingStats::new(10);
        stats.add(point(0.5, 1.0, true));
        assert!((stats.surprise(0.0, 0.25) - 2.0).abs() < 1e-9);
        assert_eq!(stats.surprise(0.0, 0.0), 0.0);
    }
}
