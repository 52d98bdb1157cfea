//! Maps composite suggestions into concrete trade ideas.
//!
//! Only the simple shapes are built here: a stock line and defined-risk
//! vertical spreads. Anything more exotic belongs to an external constructor.

use directive_core::{
    Action, Frame, InstrumentType, LegDirection, OptionContract, OptionRight, Suggestion,
    TradeConstructor, TradeIdea, TradeLeg, TradeSideLabel,
};

const CONTRACT_SIZE: f64 = 100.0;

/// Sizing and gating options for the reference constructor.
#[derive(Debug, Clone)]
pub struct ConstructorConfig {
    /// Suggestions below this confidence produce no ideas
    pub min_confidence: f64,
    /// Notional used for fixed-percent position sizing
    pub notional: f64,
    /// Fraction of notional risked per idea
    pub risk_fraction: f64,
}

impl Default for ConstructorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            notional: 100_000.0,
            risk_fraction: 0.01,
        }
    }
}

/// Reference trade constructor: stock line plus vertical debit spreads.
#[derive(Debug, Clone, Default)]
pub struct OptionsTradeConstructor {
    config: ConstructorConfig,
}

impl OptionsTradeConstructor {
    pub fn new(config: ConstructorConfig) -> Self {
        Self { config }
    }

    /// Spot from the chain, falling back to the composer's forecast price so
    /// a stock idea can still be built when no chain is available.
    fn spot_of(chain: &Frame<OptionContract>, suggestion: &Suggestion) -> Option<f64> {
        chain
            .latest()
            .map(|c| c.underlying_price)
            .or_else(|| suggestion.forecast.get("current_price").copied())
            .filter(|p| *p > 0.0)
    }

    /// Contracts of one right on the farthest expiry, sorted by strike.
    fn leg_candidates(chain: &Frame<OptionContract>, right: OptionRight) -> Vec<OptionContract> {
        let Some(expiry) = chain.iter().map(|c| c.expiry).max() else {
            return Vec::new();
        };
        let mut contracts: Vec<OptionContract> = chain
            .iter()
            .filter(|c| c.right == right && c.expiry == expiry)
            .cloned()
            .collect();
        contracts.sort_by(|a, b| a.strike.total_cmp(&b.strike));
        contracts
    }

    fn units_for_risk(&self, max_loss_per_unit: f64) -> i64 {
        if max_loss_per_unit <= 0.0 {
            return 1;
        }
        let budget = self.config.notional * self.config.risk_fraction;
        ((budget / max_loss_per_unit).floor() as i64).max(1)
    }

    fn stock_trade(&self, suggestion: &Suggestion, spot: f64, short: bool) -> TradeIdea {
        let side = if short {
            TradeSideLabel::Short
        } else {
            TradeSideLabel::Long
        };
        let stop = if short { spot * 1.02 } else { spot * 0.98 };
        let target = if short { spot * 0.96 } else { spot * 1.04 };
        let loss_per_share = (spot - stop).abs();
        let shares = self.units_for_risk(loss_per_share);
        TradeIdea {
            id: format!("stock-{}-{}", suggestion.symbol, suggestion.id),
            symbol: suggestion.symbol.clone(),
            strategy_type: if short { "short_stock" } else { "long_stock" }.to_string(),
            side,
            legs: vec![TradeLeg {
                instrument_type: InstrumentType::Stock,
                direction: if short {
                    LegDirection::Sell
                } else {
                    LegDirection::Buy
                },
                qty: shares,
                strike: None,
                expiry: None,
            }],
            cost_per_unit: spot,
            max_loss: loss_per_share * shares as f64,
            max_profit: None,
            breakeven_levels: vec![spot],
            target_exit_price: Some(target),
            stop_loss_price: Some(stop),
            recommended_units: shares,
            confidence: suggestion.confidence,
            rationale: format!("Stock line from composite: {}", suggestion.reasoning),
            tags: vec!["stock".to_string()],
        }
    }

    /// Buy the at-money strike, sell the next strike out in the direction of
    /// the move. Debit is the max loss; width minus debit caps profit.
    fn debit_spread(
        &self,
        suggestion: &Suggestion,
        chain: &Frame<OptionContract>,
        right: OptionRight,
    ) -> Option<TradeIdea> {
        let spot = Self::spot_of(chain, suggestion)?;
        let candidates = Self::leg_candidates(chain, right);
        if candidates.len() < 2 {
            return None;
        }

        let at_money_idx = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a.strike - spot).abs().total_cmp(&(b.strike - spot).abs())
            })
            .map(|(i, _)| i)?;

        let (long_leg, short_leg) = match right {
            // Calls: sell the strike above the long
            OptionRight::Call => {
                let short_idx = at_money_idx + 1;
                if short_idx >= candidates.len() {
                    return None;
                }
                (&candidates[at_money_idx], &candidates[short_idx])
            }
            // Puts: sell the strike below the long
            OptionRight::Put => {
                if at_money_idx == 0 {
                    return None;
                }
                (&candidates[at_money_idx], &candidates[at_money_idx - 1])
            }
        };

        let debit = (long_leg.mid() - short_leg.mid()).max(0.05) * CONTRACT_SIZE;
        let width = (short_leg.strike - long_leg.strike).abs() * CONTRACT_SIZE;
        let max_profit = (width - debit).max(0.0);
        let breakeven = match right {
            OptionRight::Call => long_leg.strike + debit / CONTRACT_SIZE,
            OptionRight::Put => long_leg.strike - debit / CONTRACT_SIZE,
        };
        let units = self.units_for_risk(debit);
        let (side, name) = match right {
            OptionRight::Call => (TradeSideLabel::Long, "call_debit_spread"),
            OptionRight::Put => (TradeSideLabel::Short, "put_debit_spread"),
        };

        Some(TradeIdea {
            id: format!("{name}-{}-{}", suggestion.symbol, suggestion.id),
            symbol: suggestion.symbol.clone(),
            strategy_type: name.to_string(),
            side,
            legs: vec![
                TradeLeg {
                    instrument_type: match right {
                        OptionRight::Call => InstrumentType::Call,
                        OptionRight::Put => InstrumentType::Put,
                    },
                    direction: LegDirection::Buy,
                    qty: 1,
                    strike: Some(long_leg.strike),
                    expiry: Some(long_leg.expiry),
                },
                TradeLeg {
                    instrument_type: match right {
                        OptionRight::Call => InstrumentType::Call,
                        OptionRight::Put => InstrumentType::Put,
                    },
                    direction: LegDirection::Sell,
                    qty: 1,
                    strike: Some(short_leg.strike),
                    expiry: Some(short_leg.expiry),
                },
            ],
            cost_per_unit: debit,
            max_loss: debit,
            max_profit: Some(max_profit),
            breakeven_levels: vec![breakeven],
            target_exit_price: None,
            stop_loss_price: None,
            recommended_units: units,
            confidence: suggestion.confidence,
            rationale: format!("Defined-risk vertical: {}", suggestion.reasoning),
            tags: vec!["vertical".to_string()],
        })
    }
}

impl TradeConstructor for OptionsTradeConstructor {
    fn generate(&self, suggestion: &Suggestion, chain: &Frame<OptionContract>) -> Vec<TradeIdea> {
        if suggestion.confidence < self.config.min_confidence {
            return Vec::new();
        }
        if suggestion.action == Action::Flat {
            return Vec::new();
        }

        let spot = Self::spot_of(chain, suggestion);
        let mut ideas = Vec::new();

        match suggestion.action {
            Action::Long => {
                if let Some(spot) = spot {
                    ideas.push(self.stock_trade(suggestion, spot, false));
                }
                if let Some(spread) = self.debit_spread(suggestion, chain, OptionRight::Call) {
                    ideas.push(spread);
                }
            }
            Action::Short => {
                if let Some(spot) = spot {
                    ideas.push(self.stock_trade(suggestion, spot, true));
                }
                if let Some(spread) = self.debit_spread(suggestion, chain, OptionRight::Put) {
                    ideas.push(spread);
                }
            }
            Action::Spread | Action::Complex => {
                // Direction-agnostic: offer the defined-risk vertical on
                // whichever side the chain supports.
                if let Some(spread) = self
                    .debit_spread(suggestion, chain, OptionRight::Call)
                    .or_else(|| self.debit_spread(suggestion, chain, OptionRight::Put))
                {
                    ideas.push(spread);
                }
            }
            Action::Flat => {}
        }

        if ideas.is_empty() {
            tracing::debug!(
                symbol = %suggestion.symbol,
                action = suggestion.action.as_str(),
                "no constructible trade for suggestion"
            );
        }
        ideas
    }
}
