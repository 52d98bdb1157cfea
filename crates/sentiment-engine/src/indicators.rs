//! Point-in-time indicator readings for the sentiment processors.
//!
//! Processors interpret the latest state of the tape, so every kernel here
//! returns the current reading (plus a short width history for the envelope
//! processor) rather than a full series. `None` means the window is too
//! short to say anything.

use directive_core::Bar;

/// Mean of the trailing `period` values.
pub fn trailing_mean(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    Some(values[values.len() - period..].iter().sum::<f64>() / period as f64)
}

/// Mean and population standard deviation of one window.
fn window_stats(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn typical_price(bar: &Bar) -> f64 {
    (bar.high + bar.low + bar.close) / 3.0
}

/// Current RSI under Wilder smoothing.
///
/// Seeds the gain/loss averages from the first `period` deltas, then smooths
/// the remainder. 100 when the window has no losses.
pub fn rsi_latest(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut deltas = closes.windows(2).map(|w| w[1] - w[0]);
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for delta in deltas.by_ref().take(period) {
        if delta >= 0.0 {
            avg_gain += delta / period as f64;
        } else {
            avg_loss -= delta / period as f64;
        }
    }
    let smoothing = (period - 1) as f64;
    for delta in deltas {
        let (gain, loss) = if delta >= 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * smoothing + gain) / period as f64;
        avg_loss = (avg_loss * smoothing + loss) / period as f64;
    }

    if avg_loss <= 0.0 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}

/// Current Money Flow Index: volume-weighted pressure over the trailing
/// `period` typical-price transitions. 50 when no money moved either way.
pub fn mfi_latest(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let mut inflow = 0.0;
    let mut outflow = 0.0;
    for pair in bars[bars.len() - period - 1..].windows(2) {
        let prev = typical_price(&pair[0]);
        let current = typical_price(&pair[1]);
        let flow = current * pair[1].volume;
        if current > prev {
            inflow += flow;
        } else if current < prev {
            outflow += flow;
        }
    }

    if outflow <= 0.0 {
        return Some(if inflow > 0.0 { 100.0 } else { 50.0 });
    }
    Some(100.0 - 100.0 / (1.0 + inflow / outflow))
}

/// Current stochastic reading: (%K, %D).
///
/// %K places the last close inside its `k_period` high/low range; %D is the
/// mean of the trailing `d_period` %K readings (fewer if history is short).
pub fn stochastic_latest(bars: &[Bar], k_period: usize, d_period: usize) -> Option<(f64, f64)> {
    if k_period == 0 || bars.len() < k_period {
        return None;
    }

    let percent_k = |end: usize| {
        let window = &bars[end + 1 - k_period..=end];
        let mut highest = f64::NEG_INFINITY;
        let mut lowest = f64::INFINITY;
        for bar in window {
            highest = highest.max(bar.high);
            lowest = lowest.min(bar.low);
        }
        if highest > lowest {
            100.0 * (bars[end].close - lowest) / (highest - lowest)
        } else {
            50.0
        }
    };

    let last = bars.len() - 1;
    let k = percent_k(last);
    let span = d_period.max(1).min(bars.len() - k_period + 1);
    let d = (0..span).map(|back| percent_k(last - back)).sum::<f64>() / span as f64;
    Some((k, d))
}

/// One envelope reading: lower/mid/upper band levels.
#[derive(Debug, Clone, Copy)]
pub struct BandSnapshot {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

/// Current Bollinger band placement around the rolling mean.
pub fn bollinger_latest(closes: &[f64], period: usize, width_mult: f64) -> Option<BandSnapshot> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let (mean, std) = window_stats(&closes[closes.len() - period..]);
    Some(BandSnapshot {
        upper: mean + width_mult * std,
        mid: mean,
        lower: mean - width_mult * std,
    })
}

/// Relative Bollinger band widths for the trailing `count` readings, oldest
/// first. Shorter history yields fewer entries, never an error.
pub fn bollinger_widths(
    closes: &[f64],
    period: usize,
    width_mult: f64,
    count: usize,
) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }
    let available = closes.len() - period + 1;
    let take = count.min(available);

    (0..take)
        .rev()
        .map(|back| {
            let end = closes.len() - back;
            let (mean, std) = window_stats(&closes[end - period..end]);
            if mean.abs() > f64::EPSILON {
                2.0 * width_mult * std / mean
            } else {
                0.0
            }
        })
        .collect()
}

/// Current exponentially smoothed close, seeded with the first full window.
fn ema_latest(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    for value in &values[period..] {
        ema += alpha * (value - ema);
    }
    Some(ema)
}

/// Current Wilder-smoothed average true range.
fn atr_latest(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let mut true_ranges = bars.windows(2).map(|pair| {
        let (prev, bar) = (&pair[0], &pair[1]);
        (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs())
    });

    let mut atr = true_ranges.by_ref().take(period).sum::<f64>() / period as f64;
    let smoothing = (period - 1) as f64;
    for tr in true_ranges {
        atr = (atr * smoothing + tr) / period as f64;
    }
    Some(atr)
}

/// Current Keltner channel: smoothed close bracketed by ATR multiples.
pub fn keltner_latest(
    bars: &[Bar],
    ema_period: usize,
    atr_period: usize,
    multiplier: f64,
) -> Option<BandSnapshot> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mid = ema_latest(&closes, ema_period)?;
    let atr = atr_latest(bars, atr_period)?;
    Some(BandSnapshot {
        upper: mid + multiplier * atr,
        mid,
        lower: mid - multiplier * atr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
            vwap: None,
        }
    }

    #[test]
    fn trailing_mean_uses_only_the_window() {
        assert_eq!(trailing_mean(&[1.0, 2.0, 3.0, 4.0, 5.0], 3), Some(4.0));
        assert_eq!(trailing_mean(&[1.0, 2.0], 3), None);
        assert_eq!(trailing_mean(&[1.0], 0), None);
    }

    #[test]
    fn rsi_saturates_on_straight_rallies() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi_latest(&closes, 14), Some(100.0));
    }

    #[test]
    fn rsi_reads_low_on_persistent_selling() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let rsi = rsi_latest(&closes, 14).unwrap();
        assert!(rsi < 10.0);
    }

    #[test]
    fn rsi_needs_period_plus_one() {
        assert!(rsi_latest(&[1.0, 2.0], 14).is_none());
    }

    #[test]
    fn mfi_is_bounded_and_neutral_when_flat() {
        let choppy: Vec<Bar> = (0..40)
            .map(|i| bar(100.0 + (i % 7) as f64, 1000.0 + i as f64))
            .collect();
        let mfi = mfi_latest(&choppy, 14).unwrap();
        assert!((0.0..=100.0).contains(&mfi));

        let flat: Vec<Bar> = (0..20).map(|_| bar(100.0, 1000.0)).collect();
        assert_eq!(mfi_latest(&flat, 14), Some(50.0));
    }

    #[test]
    fn stochastic_k_reflects_close_position() {
        let mut bars: Vec<Bar> = (0..20).map(|i| bar(100.0 + i as f64, 1000.0)).collect();
        // Close pinned at the top of its range
        let last = bars.last_mut().unwrap();
        last.close = last.high;
        let (k, d) = stochastic_latest(&bars, 14, 3).unwrap();
        assert!(k > 90.0);
        assert!((0.0..=100.0).contains(&d));
    }

    #[test]
    fn stochastic_is_midscale_on_a_flat_tape() {
        let bars: Vec<Bar> = (0..20).map(|_| bar(100.0, 1000.0)).collect();
        let (k, d) = stochastic_latest(&bars, 14, 3).unwrap();
        // high == low never happens here (bars carry a 1-point range), so
        // the centred close reads mid-scale
        assert!((k - 50.0).abs() < 1.0);
        assert!((d - 50.0).abs() < 1.0);
    }

    #[test]
    fn bollinger_brackets_the_mean() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let bands = bollinger_latest(&closes, 20, 2.0).unwrap();
        assert!(bands.lower < bands.mid);
        assert!(bands.mid < bands.upper);
        assert!(bollinger_latest(&closes[..10], 20, 2.0).is_none());
    }

    #[test]
    fn bollinger_widths_grow_with_dispersion() {
        let calm: Vec<f64> = (0..40).map(|i| 100.0 + (i % 2) as f64 * 0.1).collect();
        let wild: Vec<f64> = (0..40).map(|i| 100.0 + (i % 2) as f64 * 10.0).collect();
        let calm_width = *bollinger_widths(&calm, 20, 2.0, 6).last().unwrap();
        let wild_width = *bollinger_widths(&wild, 20, 2.0, 6).last().unwrap();
        assert!(wild_width > calm_width);
    }

    #[test]
    fn bollinger_widths_are_capped_by_history() {
        let closes: Vec<f64> = (0..22).map(|i| 100.0 + i as f64).collect();
        // Only 3 full windows exist
        assert_eq!(bollinger_widths(&closes, 20, 2.0, 6).len(), 3);
        assert_eq!(bollinger_widths(&closes, 20, 2.0, 2).len(), 2);
    }

    #[test]
    fn keltner_brackets_the_smoothed_close() {
        let bars: Vec<Bar> = (0..40).map(|i| bar(100.0 + (i % 5) as f64, 1000.0)).collect();
        let channel = keltner_latest(&bars, 20, 10, 1.5).unwrap();
        assert!(channel.lower < channel.mid);
        assert!(channel.mid < channel.upper);
    }

    #[test]
    fn keltner_needs_both_windows() {
        let bars: Vec<Bar> = (0..8).map(|i| bar(100.0 + i as f64, 1000.0)).collect();
        assert!(keltner_latest(&bars, 20, 10, 1.5).is_none());
    }
}
