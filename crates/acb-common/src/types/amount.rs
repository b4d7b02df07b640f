//! Amount - Minor-unit monetary value (e.g. wei)
//!
//! All ledger arithmetic runs on unsigned integers in the token's smallest
//! unit. Values travel as decimal strings so that JSON clients never see a
//! float. Products that may overflow 128 bits go through a 256-bit
//! intermediate.

use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Decimals of the pool token (ETH-style)
pub const TOKEN_DECIMALS: u32 = 18;

/// One whole token in minor units
pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Unsigned minor-unit amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    #[inline]
    pub const fn new(minor_units: u128) -> Self {
        Self(minor_units)
    }

    /// Whole tokens to minor units
    pub fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * ONE_TOKEN)
    }

    #[inline]
    pub const fn value(&self) -> u128 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, ProtocolError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(ProtocolError::Overflow)
    }

    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, ProtocolError> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount)
            .ok_or(ProtocolError::Overflow)
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// `self * numerator / denominator`, rounded down
    pub fn mul_div_floor(self, numerator: u128, denominator: u128) -> Result<Amount, ProtocolError> {
        mul_div(self.0, numerator, denominator, false).map(Amount)
    }

    /// `self * numerator / denominator`, rounded up
    pub fn mul_div_ceil(self, numerator: u128, denominator: u128) -> Result<Amount, ProtocolError> {
        mul_div(self.0, numerator, denominator, true).map(Amount)
    }

    /// Scale by a basis-point factor (10000 = 100%), rounded down
    pub fn apply_bps(self, bps: u32) -> Result<Amount, ProtocolError> {
        self.mul_div_floor(bps as u128, crate::BPS_DENOMINATOR as u128)
    }

    /// Whole-token view for logs and display fields
    ///
    /// Falls back to the raw minor-unit count when the value exceeds what a
    /// `Decimal` mantissa can carry.
    pub fn to_display(&self) -> String {
        match i128::try_from(self.0)
            .ok()
            .and_then(|v| Decimal::try_from_i128_with_scale(v, TOKEN_DECIMALS).ok())
        {
            Some(d) => d.normalize().to_string(),
            None => format!("{} (minor units)", self.0),
        }
    }
}

/// Floor or ceil of `a * b / c` through a 256-bit product
pub fn mul_div(a: u128, b: u128, c: u128, round_up: bool) -> Result<u128, ProtocolError> {
    if c == 0 {
        return Err(ProtocolError::Overflow);
    }
    let product = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let mut quotient = product / divisor;
    if round_up && !(product % divisor).is_zero() {
        quotient += U256::one();
    }
    if quotient > U256::from(u128::MAX) {
        return Err(ProtocolError::Overflow);
    }
    Ok(quotient.as_u128())
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value as u128)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = ProtocolError;

    /// Accepts only plain ASCII digits; signs, decimal points and exponents
    /// are rejected rather than coerced.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::MalformedAmount(s.to_string()));
        }
        trimmed
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| ProtocolError::MalformedAmount(s.to_string()))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
