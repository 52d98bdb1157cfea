//! Prediction tracking: forecasts vs realized prices, per timeframe.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use directive_core::LedgerRecord;
use serde::{Deserialize, Serialize};

/// Outcome of one timeframe of one prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedOutcome {
    pub actual_price: f64,
    pub predicted_low: f64,
    pub predicted_mid: f64,
    pub predicted_high: f64,
    pub in_range: bool,
    pub direction_correct: bool,
    /// Absolute % distance of the actual price from the predicted mid
    pub range_error_pct: f64,
    pub timestamp: DateTime<Utc>,
}

/// A forecast under observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedPrediction {
    pub id: String,
    pub symbol: String,
    /// Flat forecast map: `{tf}_low/mid/high/prob` plus `directional_bias`
    pub forecast: BTreeMap<String, f64>,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub timeframes: Vec<String>,
    pub outcomes: BTreeMap<String, TrackedOutcome>,
}

impl TrackedPrediction {
    fn is_complete(&self) -> bool {
        self.outcomes.len() == self.timeframes.len()
    }
}

/// Aggregate forecast quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub total_outcomes: usize,
    pub range_accuracy: f64,
    pub direction_accuracy: f64,
    pub avg_range_error_pct: f64,
}

impl AccuracySummary {
    fn empty() -> Self {
        Self {
            total_outcomes: 0,
            range_accuracy: 0.0,
            direction_accuracy: 0.0,
            avg_range_error_pct: 0.0,
        }
    }
}

const DEFAULT_TIMEFRAMES: &[&str] = &["1m", "5m", "15m", "1h", "4h", "1d"];

/// Tracks multi-timeframe forecasts until every horizon resolves.
#[derive(Debug, Default)]
pub struct PredictionTracker {
    active: BTreeMap<String, TrackedPrediction>,
    completed: Vec<TrackedPrediction>,
}

impl PredictionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a forecast to track; the flat map must carry
    /// `{tf}_low/mid/high` keys for each tracked timeframe.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        symbol: impl Into<String>,
        forecast: BTreeMap<String, f64>,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) {
        let id = id.into();
        self.active.insert(
            id.clone(),
            TrackedPrediction {
                id,
                symbol: symbol.into(),
                forecast,
                confidence,
                timestamp,
                timeframes: DEFAULT_TIMEFRAMES.iter().map(|s| s.to_string()).collect(),
                outcomes: BTreeMap::new(),
            },
        );
    }

    /// Record the realized price at the end of one timeframe.
    ///
    /// Returns the scored outcome, or None if the prediction is unknown or
    /// carries no forecast for that timeframe.
    pub fn update_outcome(
        &mut self,
        prediction_id: &str,
        timeframe: &str,
        actual_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<TrackedOutcome> {
        let prediction = self.active.get_mut(prediction_id)?;

        let low = *prediction.forecast.get(&format!("{timeframe}_low"))?;
        let mid = *prediction.forecast.get(&format!("{timeframe}_mid"))?;
        let high = *prediction.forecast.get(&format!("{timeframe}_high"))?;
        let bias = prediction
            .forecast
            .get("directional_bias")
            .copied()
            .unwrap_or(0.0);

        let in_range = low <= actual_price && actual_price <= high;
        let direction_correct = (actual_price >= mid && bias > 0.0)
            || (actual_price <= mid && bias < 0.0);
        let range_error_pct = if mid != 0.0 {
            ((actual_price - mid) / mid).abs() * 100.0
        } else {
            100.0
        };

        let outcome = TrackedOutcome {
            actual_price,
            predicted_low: low,
            predicted_mid: mid,
            predicted_high: high,
            in_range,
            direction_correct,
            range_error_pct,
            timestamp,
        };
        prediction
            .outcomes
            .insert(timeframe.to_string(), outcome.clone());

        if prediction.is_complete() {
            let done = self.active.remove(prediction_id).expect("checked above");
            self.completed.push(done);
        }
        Some(outcome)
    }

    pub fn active(&self) -> impl Iterator<Item = &TrackedPrediction> {
        self.active.values()
    }

    /// Completed predictions, most recent first.
    pub fn completed(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<&TrackedPrediction> {
        let mut predictions: Vec<&TrackedPrediction> = self
            .completed
            .iter()
            .filter(|p| since.map_or(true, |s| p.timestamp >= s))
            .collect();
        predictions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            predictions.truncate(limit);
        }
        predictions
    }

    /// Aggregate accuracy across completed predictions, optionally for one
    /// timeframe only.
    pub fn aggregate_accuracy(
        &self,
        timeframe: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> AccuracySummary {
        let mut total = 0usize;
        let mut range_correct = 0usize;
        let mut direction_correct = 0usize;
        let mut total_error = 0.0;

        for prediction in self.completed(since, None) {
            for (tf, outcome) in &prediction.outcomes {
                if let Some(filter) = timeframe {
                    if tf != filter {
                        continue;
                    }
                }
                total += 1;
                if outcome.in_range {
                    range_correct += 1;
                }
                if outcome.direction_correct {
                    direction_correct += 1;
                }
                total_error += outcome.range_error_pct;
            }
        }

        if total == 0 {
            return AccuracySummary::empty();
        }
        AccuracySummary {
            total_outcomes: total,
            range_accuracy: range_correct as f64 / total as f64,
            direction_accuracy: direction_correct as f64 / total as f64,
            avg_range_error_pct: total_error / total as f64,
        }
    }
}

/// Portfolio-level metrics over replayed ledger records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LedgerMetrics {
    pub sharpe: f64,
    pub hit_rate: f64,
    /// Worst running cumulative PnL, as a non-positive value
    pub max_drawdown: f64,
    pub avg_trade_pnl: f64,
}

impl LedgerMetrics {
    pub fn compute(records: &[LedgerRecord]) -> Self {
        let pnls: Vec<f64> = records
            .iter()
            .map(|r| r.realized_pnl.unwrap_or(0.0))
            .collect();
        if pnls.is_empty() {
            return Self {
                sharpe: 0.0,
                hit_rate: 0.0,
                max_drawdown: 0.0,
                avg_trade_pnl: 0.0,
            };
        }

        let n = pnls.len() as f64;
        let avg = pnls.iter().sum::<f64>() / n;
        let variance = pnls.iter().map(|p| (p - avg).powi(2)).sum::<f64>() / n;
        let sharpe = if variance > 0.0 { avg / variance.sqrt() } else { 0.0 };

        let hits = pnls.iter().filter(|p| **p > 0.0).count();

        let mut cumulative = 0.0;
        let mut worst = f64::INFINITY;
        for pnl in &pnls {
            cumulative += pnl;
            if cumulative < worst {
                worst = cumulative;
            }
        }
        let max_drawdown = worst.min(0.0);

        Self {
            sharpe,
            hit_rate: hits as f64 / n,
            max_drawdown,
            avg_trade_pnl: avg,
        }
    }
}
