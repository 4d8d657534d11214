//! Quote generator — computes bid/ask prices with proper tick/lot alignment.
//!
//! Uses `rust_decimal::Decimal` for deterministic fixed-point arithmetic
//! so that prices and sizes align exactly to exchange tick and lot sizes.

use venue::{Side, BBO};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::mm::position::QuotingContext;
use crate::types::Quote;

/// Generates bid/ask quotes from a fair price, position state, and BBO.
pub struct Quoter {
    /// Minimum price increment (`10^-price_decimals`).
    tick_size: Decimal,
    /// Minimum size increment (`10^-size_decimals`).
    lot_size: Decimal,
    /// Normal-mode spread in basis points.
    spread_bps: Decimal,
    /// Close-mode spread in basis points.
    take_profit_bps: Decimal,
    /// Notional order size in USD (normal mode).
    order_size_usd: Decimal,
}

/// Rounding direction for tick alignment.
enum RoundMode {
    Floor,
    Ceil,
}

impl Quoter {
    /// Create a new quoter from market parameters.
    ///
    /// # Arguments
    ///
    /// * `price_decimals` - Number of decimal places for prices.
    /// * `size_decimals` - Number of decimal places for sizes.
    /// * `spread_bps` - Normal-mode spread in basis points.
    /// * `take_profit_bps` - Close-mode spread in basis points.
    /// * `order_size_usd` - Notional USD size per quote.
    pub fn new(
        price_decimals: u8,
        size_decimals: u8,
        spread_bps: f64,
        take_profit_bps: f64,
        order_size_usd: f64,
    ) -> Self {
        Self {
            tick_size: Decimal::new(1, price_decimals as u32),
            lot_size: Decimal::new(1, size_decimals as u32),
            spread_bps: Decimal::from_f64(spread_bps).unwrap_or(dec!(8)),
            take_profit_bps: Decimal::from_f64(take_profit_bps).unwrap_or(dec!(0.1)),
            order_size_usd: Decimal::from_f64(order_size_usd).unwrap_or(dec!(3000)),
        }
    }

    /// Generate quotes for the given quoting context, clamped to the BBO.
    ///
    /// In normal mode: both bid and ask at `spread_bps` from fair.
    /// In close mode: only the reducing side at `take_profit_bps`.
    pub fn get_quotes(&self, ctx: &QuotingContext, bbo: Option<&BBO>) -> Vec<Quote> {
        let fair = Decimal::from_f64(ctx.fair_price).unwrap_or_default();
        let bps = if ctx.position_state.is_close_mode {
            self.take_profit_bps
        } else {
            self.spread_bps
        };
        let spread_amount = fair * bps / dec!(10000);

        // In close mode: limit size to position size.
        let size = if ctx.position_state.is_close_mode {
            let pos_size =
                Decimal::from_f64(ctx.position_state.size_base.abs()).unwrap_or_default();
            self.align_size(pos_size)
        } else {
            self.usd_to_size(fair)
        };

        if size <= Decimal::ZERO {
            return Vec::new();
        }

        let mut quotes = Vec::with_capacity(2);

        if ctx.allowed_sides.contains(&Side::Bid) {
            let mut bid_price = self.align_price(fair - spread_amount, RoundMode::Floor);

            // Clamp bid below best ask (don't cross spread).
            if let Some(bbo) = bbo {
                let best_ask = Decimal::from_f64(bbo.best_ask).unwrap_or_default();
                if bid_price >= best_ask {
                    bid_price = self.align_price(best_ask - self.tick_size, RoundMode::Floor);
                }
            }

            if bid_price > Decimal::ZERO {
                quotes.push(Quote {
                    side: Side::Bid,
                    price: bid_price,
                    size,
                });
            }
        }

        if ctx.allowed_sides.contains(&Side::Ask) {
            let mut ask_price = self.align_price(fair + spread_amount, RoundMode::Ceil);

            // Clamp ask above best bid (don't cross spread).
            if let Some(bbo) = bbo {
                let best_bid = Decimal::from_f64(bbo.best_bid).unwrap_or_default();
                if ask_price <= best_bid {
                    ask_price = self.align_price(best_bid + self.tick_size, RoundMode::Ceil);
                }
            }

            if ask_price > Decimal::ZERO {
                quotes.push(Quote {
                    side: Side::Ask,
                    price: ask_price,
                    size,
                });
            }
        }

        quotes
    }

    /// Align a price to the tick size.
    fn align_price(&self, price: Decimal, mode: RoundMode) -> Decimal {
        let ticks = price / self.tick_size;
        let aligned = match mode {
            RoundMode::Floor => ticks.floor(),
            RoundMode::Ceil => ticks.ceil(),
        };
        aligned * self.tick_size
    }

    /// Convert a USD notional to base-asset size, aligned to lot size.
    fn usd_to_size(&self, fair_price: Decimal) -> Decimal {
        if fair_price.is_zero() {
            return Decimal::ZERO;
        }
        let raw = self.order_size_usd / fair_price;
        self.align_size(raw)
    }

    /// Align a size to the lot size (always rounds down).
    fn align_size(&self, size: Decimal) -> Decimal {
        let lots = (size / self.lot_size).floor();
        lots * self.lot_size
    }
}
