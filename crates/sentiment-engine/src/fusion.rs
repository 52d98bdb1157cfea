//! Multi-signal sentiment fusion.
//!
//! Merges processor signals under regime-aware and energy-aware weighting,
//! with graceful degradation when processors are missing and detection of
//! balanced bull/bear conflicts.

use directive_core::{SentimentBias, SentimentEnvelope, SentimentSignal};

/// Regimes treated as trending for weight adjustment.
const TRENDING_REGIMES: &[&str] = &["bullish_consensus", "bearish_consensus", "risk_on", "risk_off"];

/// Regimes treated as mean-reverting.
const MEAN_REVERT_REGIMES: &[&str] = &["mixed", "neutral", "choppy"];

/// Fuse processor signals into a unified envelope.
pub fn fuse_signals(
    signals: &[SentimentSignal],
    energy_level: f64,
    regime: Option<&str>,
    bias_threshold: f64,
) -> SentimentEnvelope {
    if signals.is_empty() {
        return SentimentEnvelope::neutral();
    }

    let weighted = apply_regime_weights(signals, regime, energy_level);
    let rescaled = apply_energy_rescaling(&weighted, energy_level);

    let total_weight: f64 = rescaled.iter().map(|s| s.weight * s.confidence).sum();
    if total_weight == 0.0 {
        return SentimentEnvelope::neutral();
    }

    let combined_value = rescaled
        .iter()
        .map(|s| s.value * s.weight * s.confidence)
        .sum::<f64>()
        / total_weight;

    let bias = if combined_value > bias_threshold {
        SentimentBias::Bullish
    } else if combined_value < -bias_threshold {
        SentimentBias::Bearish
    } else {
        SentimentBias::Neutral
    };

    let strength = combined_value.abs().min(1.0);
    let confidence = meta_confidence(&rescaled, combined_value);
    let drivers = extract_drivers(&rescaled);
    let energy = aggregate_energy(&rescaled, energy_level);

    SentimentEnvelope {
        bias,
        strength,
        energy,
        confidence,
        drivers,
        wyckoff_phase: None,
        volatility_regime: None,
        flow_regime: None,
        breadth_regime: None,
    }
}

/// Regime- and energy-aware weight adjustment.
///
/// Trending regimes trust structure (wyckoff, energy) over oscillators;
/// mean-reverting regimes invert that. High energy attenuates oscillators
/// and boosts flow; low energy does the opposite.
fn apply_regime_weights(
    signals: &[SentimentSignal],
    regime: Option<&str>,
    energy_level: f64,
) -> Vec<SentimentSignal> {
    signals
        .iter()
        .map(|signal| {
            let mut weight = signal.weight;

            if let Some(regime) = regime {
                if TRENDING_REGIMES.contains(&regime) {
                    match signal.driver.as_str() {
                        "wyckoff" | "energy" => weight *= 1.3,
                        "oscillators" => weight *= 0.8,
                        _ => {}
                    }
                } else if MEAN_REVERT_REGIMES.contains(&regime) {
                    match signal.driver.as_str() {
                        "oscillators" | "volatility" => weight *= 1.3,
                        "wyckoff" => weight *= 0.8,
                        _ => {}
                    }
                }
            }

            if energy_level > 1.5 {
                match signal.driver.as_str() {
                    "oscillators" => weight *= 0.7,
                    "flow" => weight *= 1.2,
                    _ => {}
                }
            } else if energy_level < 0.5 {
                match signal.driver.as_str() {
                    "oscillators" => weight *= 1.2,
                    "energy" => weight *= 0.8,
                    _ => {}
                }
            }

            SentimentSignal {
                weight,
                ..signal.clone()
            }
        })
        .collect()
}

/// Damp extreme values when the market is running hot.
fn apply_energy_rescaling(signals: &[SentimentSignal], energy_level: f64) -> Vec<SentimentSignal> {
    let damping = ((energy_level - 0.5) / 7.5).clamp(0.0, 0.2);

    signals
        .iter()
        .map(|signal| {
            let value = if signal.value.abs() > 0.7 {
                signal.value.signum() * signal.value.abs() * (1.0 - damping)
            } else {
                signal.value
            };
            SentimentSignal {
                value,
                ..signal.clone()
            }
        })
        .collect()
}

/// Agreement, completeness, and dispersion folded into one confidence.
fn meta_confidence(signals: &[SentimentSignal], combined_value: f64) -> f64 {
    if signals.is_empty() {
        return 0.0;
    }
    let n = signals.len() as f64;

    let avg_confidence = signals.iter().map(|s| s.confidence).sum::<f64>() / n;

    let combined_sign = combined_value.signum();
    let agreements = signals
        .iter()
        .filter(|s| s.value.signum() == combined_sign)
        .count();
    let agreement_ratio = agreements as f64 / n;

    let mean_value = signals.iter().map(|s| s.value).sum::<f64>() / n;
    let variance = signals
        .iter()
        .map(|s| (s.value - mean_value).powi(2))
        .sum::<f64>()
        / n;
    let variance_penalty = (variance * 0.5).min(0.3);

    let completeness = (n / 6.0).min(1.0);

    let meta = avg_confidence * 0.4
        + agreement_ratio * 0.3
        + completeness * 0.2
        + (1.0 - variance_penalty) * 0.1;

    meta.clamp(0.0, 1.0)
}

/// Driver contributions ordered by absolute magnitude.
fn extract_drivers(signals: &[SentimentSignal]) -> Vec<(String, f64)> {
    let mut drivers: Vec<(String, f64)> = signals
        .iter()
        .map(|s| (s.driver.clone(), s.value * s.weight * s.confidence))
        .collect();
    drivers.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    drivers
}

/// Aggregate metabolic expenditure of the signal set.
fn aggregate_energy(signals: &[SentimentSignal], energy_level: f64) -> f64 {
    if signals.is_empty() {
        return 0.0;
    }
    let n = signals.len() as f64;
    let avg_strength = signals.iter().map(|s| s.value.abs()).sum::<f64>() / n;
    let mean_value = signals.iter().map(|s| s.value).sum::<f64>() / n;
    let variance = signals
        .iter()
        .map(|s| (s.value - mean_value).powi(2))
        .sum::<f64>()
        / n;

    (avg_strength * 0.4 + energy_level * 0.4 + variance * 0.2).max(0.0)
}

/// Redistribute weight onto survivors when processors are missing.
pub fn apply_graceful_degradation(
    signals: Vec<SentimentSignal>,
    required_minimum: usize,
) -> Vec<SentimentSignal> {
    if signals.len() >= required_minimum {
        return signals;
    }
    let boost = required_minimum as f64 / signals.len().max(1) as f64;

    signals
        .into_iter()
        .map(|s| SentimentSignal {
            confidence: (s.confidence * boost).min(1.0),
            weight: s.weight * boost,
            ..s
        })
        .collect()
}

/// Balanced strong-bull vs strong-bear conflict check.
pub fn detect_conflicting_signals(signals: &[SentimentSignal], conflict_threshold: f64) -> bool {
    if signals.len() < 2 {
        return false;
    }

    let pos_strength: f64 = signals
        .iter()
        .filter(|s| s.value > conflict_threshold)
        .map(|s| s.weight * s.confidence)
        .sum();
    let neg_strength: f64 = signals
        .iter()
        .filter(|s| s.value < -conflict_threshold)
        .map(|s| s.weight * s.confidence)
        .sum();

    if pos_strength > 0.0 && neg_strength > 0.0 {
        pos_strength.min(neg_strength) / pos_strength.max(neg_strength) > 0.7
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(driver: &str, value: f64, confidence: f64, weight: f64) -> SentimentSignal {
        SentimentSignal {
            value,
            confidence,
            weight,
            driver: driver.to_string(),
        }
    }

    #[test]
    fn empty_signal_list_returns_neutral_envelope() {
        let envelope = fuse_signals(&[], 0.0, None, 0.15);
        assert_eq!(envelope.bias, SentimentBias::Neutral);
        assert_eq!(envelope.strength, 0.0);
        assert_eq!(envelope.confidence, 0.0);
        assert!(envelope.drivers.is_empty());
    }

    #[test]
    fn uniform_bullish_signals_fuse_bullish() {
        let signals = vec![
            signal("wyckoff", 0.5, 0.8, 1.0),
            signal("oscillators", 0.4, 0.7, 1.0),
            signal("flow", 0.6, 0.8, 1.0),
        ];
        let envelope = fuse_signals(&signals, 0.5, None, 0.15);
        assert_eq!(envelope.bias, SentimentBias::Bullish);
        assert!(envelope.strength > 0.3);
        assert!(envelope.confidence > 0.5);
    }

    #[test]
    fn trending_regime_boosts_wyckoff_over_oscillators() {
        let signals = vec![
            signal("wyckoff", 0.6, 0.8, 1.0),
            signal("oscillators", -0.6, 0.8, 1.0),
        ];
        let neutral = fuse_signals(&signals, 1.0, None, 0.1);
        let trending = fuse_signals(&signals, 1.0, Some("risk_on"), 0.1);
        // With wyckoff boosted 1.3x and oscillators cut to 0.8x the combined
        // value must tilt further bullish than the unadjusted fusion
        assert!(trending.strength > neutral.strength);
        assert_eq!(trending.bias, SentimentBias::Bullish);
    }

    #[test]
    fn high_energy_damps_extreme_values() {
        let signals = vec![signal("flow", 0.9, 1.0, 1.0)];
        // Energy 2.0 -> damping = 0.2, value 0.9 -> 0.72
        let envelope = fuse_signals(&signals, 2.0, None, 0.15);
        assert!((envelope.strength - 0.72).abs() < 1e-9);
    }

    #[test]
    fn moderate_values_are_not_damped() {
        let signals = vec![signal("flow", 0.5, 1.0, 1.0)];
        let envelope = fuse_signals(&signals, 2.0, None, 0.15);
        assert!((envelope.strength - 0.5).abs() < 1e-9);
    }

    #[test]
    fn meta_confidence_weights_components() {
        // Two perfectly agreeing signals out of six possible
        let signals = vec![
            signal("wyckoff", 0.5, 0.8, 1.0),
            signal("flow", 0.5, 0.8, 1.0),
        ];
        let envelope = fuse_signals(&signals, 0.0, None, 0.15);
        // 0.4*0.8 + 0.3*1.0 + 0.2*(2/6) + 0.1*1.0 = 0.7867
        assert!((envelope.confidence - (0.32 + 0.3 + 2.0 / 30.0 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn drivers_sorted_by_absolute_contribution() {
        let signals = vec![
            signal("wyckoff", 0.1, 1.0, 1.0),
            signal("flow", -0.9, 1.0, 1.0),
            signal("breadth", 0.4, 1.0, 1.0),
        ];
        let envelope = fuse_signals(&signals, 0.0, None, 0.15);
        assert_eq!(envelope.drivers[0].0, "flow");
        assert_eq!(envelope.drivers[2].0, "wyckoff");
    }

    #[test]
    fn degradation_rescales_survivors() {
        let signals = vec![
            signal("wyckoff", 0.5, 0.8, 1.0),
            signal("flow", 0.5, 0.8, 1.0),
        ];
        let boosted = apply_graceful_degradation(signals, 3);
        // Boost factor 3/2
        assert!((boosted[0].weight - 1.5).abs() < 1e-12);
        assert!((boosted[0].confidence - 1.0).abs() < 1e-12); // capped
    }

    #[test]
    fn degradation_leaves_full_sets_alone() {
        let signals = vec![
            signal("wyckoff", 0.5, 0.8, 1.0),
            signal("flow", 0.5, 0.8, 1.0),
            signal("energy", 0.5, 0.8, 1.0),
        ];
        let untouched = apply_graceful_degradation(signals.clone(), 3);
        assert!((untouched[0].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn two_survivors_fuse_bullish_after_degradation() {
        // Two of six processors report; degradation rescales, then fusion
        // still reads the agreement as bullish with depressed confidence
        let signals = apply_graceful_degradation(
            vec![
                signal("wyckoff", 0.5, 0.8, 1.0),
                signal("flow", 0.5, 0.8, 1.0),
            ],
            3,
        );
        let envelope = fuse_signals(&signals, 0.0, None, 0.15);
        assert_eq!(envelope.bias, SentimentBias::Bullish);
        // Completeness term is 2/6; a full set of six at the same agreement
        // and confidence would score 0.13 higher
        let full: Vec<SentimentSignal> = ["wyckoff", "oscillators", "volatility", "flow", "breadth", "energy"]
            .iter()
            .map(|d| signal(d, 0.5, 1.0, 1.5))
            .collect();
        let full_envelope = fuse_signals(&full, 0.0, None, 0.15);
        assert!(envelope.confidence < full_envelope.confidence);
    }

    #[test]
    fn balanced_opposition_is_a_conflict() {
        let signals = vec![
            signal("wyckoff", 0.8, 0.9, 1.0),
            signal("flow", -0.8, 0.85, 1.0),
        ];
        assert!(detect_conflicting_signals(&signals, 0.7));
    }

    #[test]
    fn lopsided_opposition_is_not_a_conflict() {
        let signals = vec![
            signal("wyckoff", 0.8, 0.9, 1.0),
            signal("flow", -0.8, 0.2, 1.0),
        ];
        assert!(!detect_conflicting_signals(&signals, 0.7));
    }

    #[test]
    fn single_signal_cannot_conflict() {
        let signals = vec![signal("wyckoff", 0.9, 0.9, 1.0)];
        assert!(!detect_conflicting_signals(&signals, 0.7));
    }

    #[test]
    fn aggregate_energy_blends_strength_and_level() {
        let signals = vec![signal("flow", 0.5, 1.0, 1.0)];
        let envelope = fuse_signals(&signals, 1.0, None, 0.15);
        // 0.4*0.5 + 0.4*1.0 + 0.2*0 = 0.6
        assert!((envelope.energy - 0.6).abs() < 1e-9);
    }
}
