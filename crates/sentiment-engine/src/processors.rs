//! The six sentiment processors.
//!
//! Each processor is a stateless transform from windowed market data to an
//! optional `SentimentSignal`. `None` means the processor could not produce a
//! reliable reading; fusion treats it as absent and degrades gracefully.

use directive_core::{Bar, DarkPoolData, SentimentConfig, SentimentSignal, Trade, TradeSide};

use crate::indicators::{
    bollinger_latest, bollinger_widths, keltner_latest, mfi_latest, rsi_latest,
    stochastic_latest, trailing_mean,
};

/// Wyckoff structural phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WyckoffPhase {
    Accumulation,
    Markup,
    Distribution,
    Markdown,
    Ranging,
}

impl WyckoffPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WyckoffPhase::Accumulation => "accumulation",
            WyckoffPhase::Markup => "markup",
            WyckoffPhase::Distribution => "distribution",
            WyckoffPhase::Markdown => "markdown",
            WyckoffPhase::Ranging => "ranging",
        }
    }
}

/// Volatility envelope state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityState {
    Squeeze,
    Expansion,
    Compression,
    Normal,
}

impl VolatilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityState::Squeeze => "squeeze",
            VolatilityState::Expansion => "expansion",
            VolatilityState::Compression => "compression",
            VolatilityState::Normal => "normal",
        }
    }
}

/// Phase detection from range compression and volume patterns.
pub struct WyckoffProcessor {
    pub lookback: usize,
}

impl WyckoffProcessor {
    pub fn from_config(config: &SentimentConfig) -> Self {
        Self {
            lookback: config.wyckoff_lookback,
        }
    }

    pub fn process(&self, bars: &[Bar]) -> Option<(SentimentSignal, WyckoffPhase)> {
        if bars.len() < self.lookback.max(6) {
            return None;
        }
        let window = &bars[bars.len() - self.lookback.max(6)..];

        let first_close = window.first()?.close;
        let last_close = window.last()?.close;
        if first_close <= 0.0 {
            return None;
        }
        let price_trend = (last_close - first_close) / first_close;

        let half = window.len() / 2;
        let early_volume: f64 =
            window[..half].iter().map(|b| b.volume).sum::<f64>() / half as f64;
        let late_volume: f64 = window[half..].iter().map(|b| b.volume).sum::<f64>()
            / (window.len() - half) as f64;
        let volume_trend = if early_volume > 0.0 {
            (late_volume - early_volume) / early_volume
        } else {
            0.0
        };

        let window_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let window_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let full_range = window_high - window_low;

        let third = window.len() / 3;
        let recent = &window[window.len() - third.max(2)..];
        let recent_high = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let recent_low = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let compression = if full_range > 0.0 {
            (recent_high - recent_low) / full_range
        } else {
            1.0
        };

        let position = if full_range > 0.0 {
            (last_close - window_low) / full_range
        } else {
            0.5
        };

        let (phase, value) = if compression < 0.4 && volume_trend < 0.0 {
            // Quiet, compressed range: side depends on where price sits
            if position < 0.4 {
                (WyckoffPhase::Accumulation, 0.3)
            } else if position > 0.6 {
                (WyckoffPhase::Distribution, -0.3)
            } else {
                (WyckoffPhase::Ranging, 0.0)
            }
        } else if price_trend > 0.02 && volume_trend > 0.0 {
            (WyckoffPhase::Markup, 0.6)
        } else if price_trend < -0.02 && volume_trend > 0.0 {
            (WyckoffPhase::Markdown, -0.6)
        } else {
            (WyckoffPhase::Ranging, price_trend.clamp(-0.2, 0.2))
        };

        // Clearer structure (tight compression or decisive trend) reads better
        let clarity = (1.0 - compression).max(price_trend.abs() * 10.0).clamp(0.0, 1.0);
        let confidence = (0.4 + 0.4 * clarity).min(0.8);

        Some((
            SentimentSignal {
                value,
                confidence,
                weight: 1.0,
                driver: "wyckoff".to_string(),
            },
            phase,
        ))
    }
}

/// RSI, MFI, and Stochastic votes mapped to a signed mean-reversion reading.
pub struct OscillatorProcessor {
    pub rsi_period: usize,
    pub mfi_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl OscillatorProcessor {
    pub fn from_config(config: &SentimentConfig) -> Self {
        Self {
            rsi_period: config.rsi_period,
            mfi_period: config.mfi_period,
            stoch_k_period: config.stoch_k_period,
            stoch_d_period: config.stoch_d_period,
            overbought: config.overbought_threshold,
            oversold: config.oversold_threshold,
        }
    }

    /// Map an oscillator level to a vote: oversold -> +1, overbought -> -1.
    fn vote(&self, level: f64) -> f64 {
        let span = (50.0 - self.oversold).max(1.0);
        ((50.0 - level) / span).clamp(-1.0, 1.0)
    }

    pub fn process(&self, bars: &[Bar]) -> Option<SentimentSignal> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let levels = [
            rsi_latest(&closes, self.rsi_period),
            mfi_latest(bars, self.mfi_period),
            stochastic_latest(bars, self.stoch_k_period, self.stoch_d_period)
                .map(|(_, percent_d)| percent_d),
        ];

        let mut votes = Vec::new();
        let mut extremes = 0usize;
        for level in levels.into_iter().flatten() {
            votes.push(self.vote(level));
            if level >= self.overbought || level <= self.oversold {
                extremes += 1;
            }
        }

        if votes.is_empty() {
            return None;
        }

        let value = votes.iter().sum::<f64>() / votes.len() as f64;
        let confidence = (0.4 + 0.15 * extremes as f64).min(0.85);

        Some(SentimentSignal {
            value,
            confidence,
            weight: 1.0,
            driver: "oscillators".to_string(),
        })
    }
}

/// Bollinger/Keltner envelope state with a directional lean.
pub struct VolatilityProcessor {
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub kc_period: usize,
    pub kc_atr_period: usize,
    pub kc_atr_mult: f64,
}

impl VolatilityProcessor {
    pub fn from_config(config: &SentimentConfig) -> Self {
        Self {
            bb_period: config.bb_period,
            bb_std_dev: config.bb_std_dev,
            kc_period: config.kc_period,
            kc_atr_period: config.kc_atr_period,
            kc_atr_mult: config.kc_atr_mult,
        }
    }

    pub fn process(&self, bars: &[Bar]) -> Option<(SentimentSignal, VolatilityState)> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let bb = bollinger_latest(&closes, self.bb_period, self.bb_std_dev)?;
        let kc = keltner_latest(bars, self.kc_period, self.kc_atr_period, self.kc_atr_mult)?;
        let close = closes.last().copied()?;

        let squeeze = bb.upper < kc.upper && bb.lower > kc.lower;

        // Band width trend over the trailing few readings
        let widths = bollinger_widths(&closes, self.bb_period, self.bb_std_dev, 6);
        let last_width = *widths.last()?;
        let baseline_width = if widths.len() > 1 {
            widths[..widths.len() - 1].iter().sum::<f64>() / (widths.len() - 1) as f64
        } else {
            last_width
        };

        let state = if squeeze {
            VolatilityState::Squeeze
        } else if baseline_width > 0.0 && last_width > baseline_width * 1.2 {
            VolatilityState::Expansion
        } else if baseline_width > 0.0 && last_width < baseline_width * 0.8 {
            VolatilityState::Compression
        } else {
            VolatilityState::Normal
        };

        // Lean: where the close sits inside the Bollinger band
        let lean = if bb.upper > bb.lower {
            (2.0 * (close - bb.lower) / (bb.upper - bb.lower) - 1.0).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let lean_scale = match state {
            VolatilityState::Expansion => 1.0,
            VolatilityState::Normal => 0.6,
            VolatilityState::Compression => 0.3,
            VolatilityState::Squeeze => 0.2,
        };
        let value = lean * lean_scale;

        let confidence = match state {
            VolatilityState::Squeeze | VolatilityState::Expansion => 0.7,
            _ => 0.5,
        };

        Some((
            SentimentSignal {
                value,
                confidence,
                weight: 1.0,
                driver: "volatility".to_string(),
            },
            state,
        ))
    }
}

/// Order-flow bias with optional dark-pool confirmation.
pub struct FlowBiasProcessor;

impl FlowBiasProcessor {
    pub fn process(
        &self,
        trades: &[Trade],
        darkpool: Option<DarkPoolData>,
    ) -> Option<(SentimentSignal, String)> {
        if trades.is_empty() && darkpool.is_none() {
            return None;
        }

        let ofi = if trades.is_empty() {
            0.0
        } else {
            let mut buy = 0.0;
            let mut sell = 0.0;
            for t in trades {
                match t.side {
                    TradeSide::Buy => buy += t.size,
                    TradeSide::Sell => sell += t.size,
                }
            }
            let denom = buy + sell;
            if denom > 0.0 {
                (buy - sell) / denom
            } else {
                0.0
            }
        };

        let value = match darkpool {
            Some(dp) => {
                // DIX hovers near 0.45; readings above it lean bullish
                let dix_bias = ((dp.dix - 0.45) / 0.10).clamp(-1.0, 1.0);
                (0.7 * ofi + 0.3 * dix_bias).clamp(-1.0, 1.0)
            }
            None => ofi,
        };

        let regime = if value > 0.3 {
            "bullish_flow"
        } else if value < -0.3 {
            "bearish_flow"
        } else {
            "balanced_flow"
        };

        let confidence = if darkpool.is_some() { 0.7 } else { 0.5 };

        Some((
            SentimentSignal {
                value,
                confidence,
                weight: 1.0,
                driver: "flow".to_string(),
            },
            regime.to_string(),
        ))
    }
}

/// Moving-average agreement across periods, with a multi-period regime label.
pub struct BreadthRegimeProcessor {
    pub ma_short: usize,
    pub ma_mid: usize,
    pub ma_long: usize,
}

impl BreadthRegimeProcessor {
    pub fn from_config(config: &SentimentConfig) -> Self {
        Self {
            ma_short: config.ma_short,
            ma_mid: config.ma_mid,
            ma_long: config.ma_long,
        }
    }

    pub fn process(&self, bars: &[Bar]) -> Option<(SentimentSignal, String)> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        if closes.len() < self.ma_long {
            return None;
        }
        let close = *closes.last()?;

        let above = [self.ma_short, self.ma_mid, self.ma_long]
            .iter()
            .filter_map(|period| trailing_mean(&closes, *period))
            .filter(|ma| close > *ma)
            .count();

        let (value, regime) = match above {
            3 => (0.6, "risk_on"),
            0 => (-0.6, "risk_off"),
            _ => (0.0, "mixed"),
        };
        let confidence = if above == 3 || above == 0 { 0.7 } else { 0.4 };

        Some((
            SentimentSignal {
                value,
                confidence,
                weight: 1.0,
                driver: "breadth".to_string(),
            },
            regime.to_string(),
        ))
    }
}

/// Momentum-coherence energy: how hard the tape is working.
pub struct EnergyProcessor {
    pub momentum_window: usize,
    pub coherence_window: usize,
}

impl EnergyProcessor {
    pub fn from_config(config: &SentimentConfig) -> Self {
        Self {
            momentum_window: config.momentum_window,
            coherence_window: config.coherence_window,
        }
    }

    /// Returns the signal plus the raw metabolic load fed to fusion.
    pub fn process(&self, bars: &[Bar]) -> Option<(SentimentSignal, f64)> {
        if bars.len() < self.momentum_window + 1 {
            return None;
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let recent = &returns[returns.len() - self.momentum_window..];

        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let var = recent.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / recent.len() as f64;
        let std = var.sqrt();
        let momentum = if std > 1e-12 { mean.abs() / std } else { 0.0 };

        // Coherence: fraction of sub-windows pushing the same way
        let chunk = self.coherence_window.max(1);
        let mut agreeing = 0usize;
        let mut chunks = 0usize;
        for window in recent.chunks(chunk) {
            let chunk_mean = window.iter().sum::<f64>() / window.len() as f64;
            chunks += 1;
            if chunk_mean.signum() == mean.signum() && chunk_mean != 0.0 {
                agreeing += 1;
            }
        }
        let coherence = if chunks > 0 {
            agreeing as f64 / chunks as f64
        } else {
            0.0
        };

        let metabolic_load = momentum * coherence;
        let value = (mean.signum() * metabolic_load.min(1.0)).clamp(-1.0, 1.0);

        Some((
            SentimentSignal {
                value,
                confidence: 0.5,
                weight: 1.0,
                driver: "energy".to_string(),
            },
            metabolic_load,
        ))
    }
}
