//! Raw token amounts and their human-readable rendering.
//!
//! Balances on the ledger are integers in the asset's smallest unit. The UI
//! amount divides by `10^decimals`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A raw balance together with the decimals of its asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TokenAmount {
    pub raw: u64,
    pub decimals: u8,
}

impl TokenAmount {
    #[must_use]
    pub fn new(raw: u64, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// `raw / 10^decimals`, exact.
    #[must_use]
    pub fn ui_amount(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.raw), u32::from(self.decimals)).normalize()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ui_amount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_amount_scales_by_decimals() {
        assert_eq!(TokenAmount::new(100, 6).ui_amount(), Decimal::new(1, 4));
        assert_eq!(TokenAmount::new(100_000, 0).ui_amount(), Decimal::new(100_000, 0));
        assert_eq!(TokenAmount::new(1_500_000, 6).to_string(), "1.5");
    }

    #[test]
    fn zero_amount() {
        let amount = TokenAmount::default();
        assert!(amount.is_zero());
        assert_eq!(amount.ui_amount(), Decimal::ZERO);
    }

    #[test]
    fn serde_roundtrip() {
        let amount = TokenAmount::new(12345, 2);
        let json = serde_json::to_string(&amount).unwrap();
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(amount, back);
    }
}
