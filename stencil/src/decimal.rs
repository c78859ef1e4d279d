//! Conversion between [`rust_decimal::Decimal`] and the 128-bit decimal wire
//! value (IEEE 754-2008 BID encoding).

use crate::{Error, Result};
use mongodb::bson::Decimal128;
use rust_decimal::{Decimal, RoundingStrategy};

const EXPONENT_BIAS: i32 = 6176;
const MAX_SCALE: u32 = 28;
const MAX_COEFFICIENT: u128 = (1 << 96) - 1;
const COMBINATION_MASK: u64 = 0x1_FFFF_FFFF_FFFF;

/// Rounding applied whenever a decimal has to lose precision.
pub const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointNearestEven;

pub fn encode(value: Decimal) -> Decimal128 {
    let coefficient = value.mantissa().unsigned_abs();
    let exponent = EXPONENT_BIAS - i32::try_from(value.scale()).unwrap_or(0);

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let high = (u64::from(value.is_sign_negative()) << 63)
        | ((exponent as u64) << 49)
        | ((coefficient >> 64) as u64 & COMBINATION_MASK);

    #[allow(clippy::cast_possible_truncation)]
    let low = coefficient as u64;

    let mut bytes = [0; 16];
    bytes[..8].copy_from_slice(&low.to_le_bytes());
    bytes[8..].copy_from_slice(&high.to_le_bytes());

    Decimal128::from_bytes(bytes)
}

pub fn decode(value: Decimal128) -> Result<Decimal> {
    let bytes = value.bytes();
    let mut low = [0; 8];
    let mut high = [0; 8];
    low.copy_from_slice(&bytes[..8]);
    high.copy_from_slice(&bytes[8..]);
    let (low, high) = (u64::from_le_bytes(low), u64::from_le_bytes(high));

    let negative = high >> 63 == 1;

    if (high >> 61) & 0b11 == 0b11 {
        return Err(Error::value_error(format!(
            "decimal {value:?} is infinite, NaN or outside the representable range"
        )));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let exponent = ((high >> 49) & 0x3FFF) as i32 - EXPONENT_BIAS;
    let mut coefficient = (u128::from(high & COMBINATION_MASK) << 64) | u128::from(low);
    let mut scale = -exponent;

    while scale < 0 {
        coefficient = coefficient
            .checked_mul(10)
            .filter(|c| *c <= MAX_COEFFICIENT)
            .ok_or_else(|| Error::value_error(format!("decimal {value:?} overflows")))?;
        scale += 1;
    }

    #[allow(clippy::cast_sign_loss)]
    let (coefficient, scale) = fit(coefficient, scale as u32)
        .ok_or_else(|| Error::value_error(format!("decimal {value:?} overflows")))?;

    let mut decimal = Decimal::try_from_i128_with_scale(
        i128::try_from(coefficient).map_err(|e| Error::value_error(e.to_string()))?,
        scale,
    )
    .map_err(|e| Error::value_error(e.to_string()))?;
    decimal.set_sign_negative(negative);

    Ok(decimal)
}

/// Drops trailing digits until the coefficient fits 96 bits with at most 28
/// fractional digits, rounding half to even once.
fn fit(coefficient: u128, scale: u32) -> Option<(u128, u32)> {
    let mut drop = scale.saturating_sub(MAX_SCALE);

    loop {
        if drop > scale {
            return None;
        }

        let divisor = 10u128.checked_pow(drop)?;
        let mut quotient = coefficient / divisor;
        let remainder = coefficient % divisor;
        let half = divisor / 2;

        if drop > 0 && (remainder > half || (remainder == half && quotient % 2 == 1)) {
            quotient += 1;
        }

        if quotient <= MAX_COEFFICIENT {
            return Some((quotient, scale - drop));
        }

        drop += 1;
    }
}

/// Rounds to a fixed number of fractional digits with [`ROUNDING`].
pub fn quantize(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, ROUNDING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn one_has_canonical_encoding() {
        let bytes = encode(Decimal::ONE).bytes();
        assert_eq!(u64::from_le_bytes(bytes[8..].try_into().unwrap()), 0x3040_0000_0000_0000);
        assert_eq!(u64::from_le_bytes(bytes[..8].try_into().unwrap()), 1);
    }

    #[test]
    fn round_trips_sign_and_scale() {
        for text in ["-12.5", "0.0001", "79228162514264337593543950335", "-0.3"] {
            let value = Decimal::from_str(text).unwrap();
            let decoded = decode(encode(value)).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(decoded.scale(), value.scale());
        }
    }

    #[test]
    fn positive_exponent_is_expanded() {
        // 5E+2
        let high = ((EXPONENT_BIAS as u64 + 2) << 49).to_le_bytes();
        let mut bytes = [0; 16];
        bytes[..8].copy_from_slice(&5u64.to_le_bytes());
        bytes[8..].copy_from_slice(&high);
        assert_eq!(decode(Decimal128::from_bytes(bytes)).unwrap(), Decimal::from(500));
    }

    #[test]
    fn excess_precision_rounds_half_even() {
        // 25E-29 rounds to 2E-28, 35E-29 to 4E-28
        for (digits, expected) in [(25u64, 2i64), (35, 4)] {
            let high = ((EXPONENT_BIAS as u64 - 29) << 49).to_le_bytes();
            let mut bytes = [0; 16];
            bytes[..8].copy_from_slice(&digits.to_le_bytes());
            bytes[8..].copy_from_slice(&high);
            let decoded = decode(Decimal128::from_bytes(bytes)).unwrap();
            assert_eq!(decoded, Decimal::new(expected, 28));
        }
    }

    #[test]
    fn infinity_is_rejected() {
        let mut bytes = [0; 16];
        bytes[15] = 0x78;
        assert!(matches!(decode(Decimal128::from_bytes(bytes)), Err(Error::Value(_))));
    }

    #[test]
    fn quantize_uses_bankers_rounding() {
        assert_eq!(
            quantize(Decimal::from_str("2.345").unwrap(), 2),
            Decimal::from_str("2.34").unwrap()
        );
    }
}
