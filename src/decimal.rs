//! Fixed-point decimal arithmetic for prices and quantities.
//!
//! All monetary math goes through [`rust_decimal::Decimal`]; floating point
//! never appears on the matching path.

use rust_decimal::{Decimal, RoundingStrategy};

/// Declares how many decimal places an instrument's prices and quantities carry.
/// Consulted by [`quote_amount`] and by order validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DecimalScale {
    pub price_scale: u32,
    pub quantity_scale: u32,
}

impl Default for DecimalScale {
    fn default() -> Self {
        Self {
            price_scale: 8,
            quantity_scale: 8,
        }
    }
}

impl DecimalScale {
    pub fn new(price_scale: u32, quantity_scale: u32) -> Self {
        Self {
            price_scale,
            quantity_scale,
        }
    }

    /// True if `value` carries no more fractional digits than `scale` allows.
    pub fn fits_price(&self, value: Decimal) -> bool {
        value.scale() <= self.price_scale
    }

    pub fn fits_quantity(&self, value: Decimal) -> bool {
        value.scale() <= self.quantity_scale
    }
}

/// Computes `base * price`, rounded half-away-from-zero at the instrument's declared
/// price scale. Never emits a negative result for non-negative inputs.
pub fn quote_amount(base: Decimal, price: Decimal, scale: &DecimalScale) -> Decimal {
    let exact = base * price;
    exact.round_dp_with_strategy(scale.price_scale, RoundingStrategy::MidpointAwayFromZero)
}
