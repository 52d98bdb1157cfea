//! Pure, deterministic metric functions over backtest records.

use std::collections::BTreeMap;

/// Fraction of non-neutral predictions whose sign matched the realized
/// return, skipping moves smaller than `threshold`.
///
/// `compute_directional_accuracy(&[], &[], 0.0)` is 0.
pub fn compute_directional_accuracy(
    predicted_directions: &[i32],
    realized_returns: &[f64],
    threshold: f64,
) -> f64 {
    debug_assert_eq!(predicted_directions.len(), realized_returns.len());

    let mut wins = 0usize;
    let mut total = 0usize;

    for (direction, ret) in predicted_directions.iter().zip(realized_returns) {
        if ret.abs() <= threshold || *direction == 0 {
            continue;
        }
        total += 1;
        if (*direction > 0 && *ret > 0.0) || (*direction < 0 && *ret < 0.0) {
            wins += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64
    }
}

/// Toy PnL from unit-notional long/short per predicted direction:
/// exactly `sum(notional * direction * return)`.
pub fn compute_naive_pnl(
    predicted_directions: &[i32],
    realized_returns: &[f64],
    notional: f64,
) -> f64 {
    debug_assert_eq!(predicted_directions.len(), realized_returns.len());
    predicted_directions
        .iter()
        .zip(realized_returns)
        .map(|(d, r)| notional * *d as f64 * r)
        .sum()
}

/// Per-period PnL series under the same convention as `compute_naive_pnl`.
pub fn compute_pnl_series(
    predicted_directions: &[i32],
    realized_returns: &[f64],
    notional: f64,
) -> Vec<f64> {
    debug_assert_eq!(predicted_directions.len(), realized_returns.len());
    predicted_directions
        .iter()
        .zip(realized_returns)
        .map(|(d, r)| notional * *d as f64 * r)
        .collect()
}

/// mean(excess) / std(excess); 0 when the series is empty or the variance
/// collapses below 1e-10.
pub fn compute_sharpe_ratio(pnl_series: &[f64], risk_free_rate: f64) -> f64 {
    let n = pnl_series.len();
    if n == 0 {
        return 0.0;
    }

    let excess: Vec<f64> = pnl_series.iter().map(|p| p - risk_free_rate).collect();
    let mean = excess.iter().sum::<f64>() / n as f64;
    let var = excess.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    if var < 1e-10 {
        return 0.0;
    }
    mean / var.sqrt()
}

/// Maximum peak-to-trough decline of cumulative PnL, as a positive value.
pub fn compute_max_drawdown(pnl_series: &[f64]) -> f64 {
    if pnl_series.is_empty() {
        return 0.0;
    }

    let mut cumulative = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown = 0.0;

    for pnl in pnl_series {
        cumulative += pnl;
        if cumulative > peak {
            peak = cumulative;
        }
        let drawdown = peak - cumulative;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }
    }
    max_drawdown
}

/// Fraction of non-neutral predictions that were profitable.
pub fn compute_win_rate(predicted_directions: &[i32], realized_returns: &[f64]) -> f64 {
    debug_assert_eq!(predicted_directions.len(), realized_returns.len());

    let mut wins = 0usize;
    let mut total = 0usize;
    for (direction, ret) in predicted_directions.iter().zip(realized_returns) {
        if *direction == 0 {
            continue;
        }
        total += 1;
        if *direction as f64 * ret > 0.0 {
            wins += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64
    }
}

/// Directional accuracy stratified into energy-cost buckets.
///
/// Bucket edges `[0.5, 1.0]` produce labels `<= 0.5`, `0.5 - 1`, `> 1`.
pub fn bucket_accuracy_by_energy(
    predicted_directions: &[i32],
    realized_returns: &[f64],
    energy_costs: &[f64],
    buckets: &[f64],
) -> BTreeMap<String, f64> {
    debug_assert_eq!(predicted_directions.len(), realized_returns.len());
    debug_assert_eq!(predicted_directions.len(), energy_costs.len());

    // Half-open ranges (low, high]
    let mut ranges: Vec<(f64, f64)> = Vec::with_capacity(buckets.len() + 1);
    let mut last = f64::NEG_INFINITY;
    for edge in buckets {
        ranges.push((last, *edge));
        last = *edge;
    }
    ranges.push((last, f64::INFINITY));

    let label_of = |low: f64, high: f64| {
        if low == f64::NEG_INFINITY {
            format!("<= {high}")
        } else if high == f64::INFINITY {
            format!("> {low}")
        } else {
            format!("{low} - {high}")
        }
    };

    let mut stats: Vec<(String, usize, usize)> = ranges
        .iter()
        .map(|(low, high)| (label_of(*low, *high), 0usize, 0usize))
        .collect();

    for ((direction, ret), energy) in predicted_directions
        .iter()
        .zip(realized_returns)
        .zip(energy_costs)
    {
        if *direction == 0 {
            continue;
        }
        for ((low, high), entry) in ranges.iter().zip(stats.iter_mut()) {
            if *low < *energy && *energy <= *high {
                entry.2 += 1;
                if (*direction > 0 && *ret > 0.0) || (*direction < 0 && *ret < 0.0) {
                    entry.1 += 1;
                }
                break;
            }
        }
    }

    stats
        .into_iter()
        .map(|(label, wins, total)| {
            let accuracy = if total == 0 {
                0.0
            } else {
                wins as f64 / total as f64
            };
            (label, accuracy)
        })
        .collect()
}
