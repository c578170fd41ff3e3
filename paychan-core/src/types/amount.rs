//! Money amounts.
//!
//! Amounts are integral base units held in 256-bit integers. On the wire they
//! travel as decimal strings; readers also accept JSON integers and
//! `0x`-prefixed hex strings.

use ethers::types::{I256, U256};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{PaychanError, Result};

/// Parses an unsigned amount from a decimal or `0x` hex string.
pub fn parse_amount(s: &str) -> Result<U256> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(s).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| PaychanError::Config(format!("invalid amount '{}': {}", s, e)))
}

/// Parses a signed price from a decimal or `0x` hex string.
pub fn parse_price(s: &str) -> Result<I256> {
    let s = s.trim();
    let (negative, magnitude) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let abs = parse_amount(magnitude)
        .and_then(price_of)
        .map_err(|e| PaychanError::Config(format!("invalid price '{}': {}", s, e)))?;
    Ok(if negative { -abs } else { abs })
}

fn price_from_i64(n: i64) -> I256 {
    let abs = I256::from_raw(U256::from(n.unsigned_abs()));
    if n < 0 {
        -abs
    } else {
        abs
    }
}

/// Converts an unsigned amount into a price.
pub fn price_of(amount: U256) -> Result<I256> {
    if amount > I256::MAX.into_raw() {
        return Err(PaychanError::Config(format!("amount {} does not fit a price", amount)));
    }
    Ok(I256::from_raw(amount))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Signed(i64),
    Unsigned(u64),
    Text(String),
}

/// Serde adapter for `U256` fields as decimal strings.
pub mod decimal_u256 {
    use super::*;

    /// Serializes as a decimal string.
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserializes from a JSON integer, decimal string, or hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<U256, D::Error> {
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Signed(n) if n < 0 => Err(D::Error::custom(format!("negative amount: {}", n))),
            RawAmount::Signed(n) => Ok(U256::from(n as u64)),
            RawAmount::Unsigned(n) => Ok(U256::from(n)),
            RawAmount::Text(s) => parse_amount(&s).map_err(D::Error::custom),
        }
    }
}

/// Serde adapter for `I256` fields as decimal strings.
pub mod decimal_i256 {
    use super::*;

    /// Serializes as a decimal string.
    pub fn serialize<S: Serializer>(value: &I256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserializes from a JSON integer, decimal string, or hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<I256, D::Error> {
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Signed(n) => Ok(price_from_i64(n)),
            RawAmount::Unsigned(n) => price_of(U256::from(n)).map_err(D::Error::custom),
            RawAmount::Text(s) => parse_price(&s).map_err(D::Error::custom),
        }
    }
}
