use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest number of decimal places a token may declare.
pub const MAX_SCALE: u8 = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("scale {0} is out of the 0..={MAX_SCALE} range")]
    ScaleOutOfRange(u8),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("rescaling to {0} digits loses precision")]
    PrecisionLoss(u8),

    #[error("invalid decimal literal")]
    Parse,
}

/// A decimal quantity with a fixed number of fractional digits.
///
/// The mantissa holds the quantity multiplied by `10^scale`. All token
/// balances of a given contract share the scale declared by its GENESIS
/// (`de` field), so additions and subtractions stay exact. Values coming
/// from the wire carry their own scale and are realigned on use.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

fn pow10(scale: u8) -> i128 {
    (0..scale).fold(1i128, |acc, _| acc * 10)
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u8) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::ScaleOutOfRange(scale));
        }
        Ok(Self { mantissa, scale })
    }

    pub fn zero(scale: u8) -> Self {
        Self { mantissa: 0, scale }
    }

    pub fn from_integer(value: u64, scale: u8) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::ScaleOutOfRange(scale));
        }
        let mantissa = i128::from(value)
            .checked_mul(pow10(scale))
            .ok_or(DecimalError::Overflow)?;
        Ok(Self { mantissa, scale })
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// True when the value has no fractional part, whatever its scale.
    pub fn is_integral(&self) -> bool {
        self.mantissa % pow10(self.scale) == 0
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, DecimalError> {
        let (a, b, scale) = Self::align(self, other)?;
        let mantissa = a.checked_add(b).ok_or(DecimalError::Overflow)?;
        Ok(Self { mantissa, scale })
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self, DecimalError> {
        let (a, b, scale) = Self::align(self, other)?;
        let mantissa = a.checked_sub(b).ok_or(DecimalError::Overflow)?;
        Ok(Self { mantissa, scale })
    }

    /// Exact scale change. Widening always succeeds (modulo overflow),
    /// narrowing fails when fractional digits would be dropped.
    pub fn rescale(&self, scale: u8) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::ScaleOutOfRange(scale));
        }
        match scale.cmp(&self.scale) {
            Ordering::Equal => Ok(*self),
            Ordering::Greater => {
                let mantissa = self
                    .mantissa
                    .checked_mul(pow10(scale - self.scale))
                    .ok_or(DecimalError::Overflow)?;
                Ok(Self { mantissa, scale })
            }
            Ordering::Less => {
                let factor = pow10(self.scale - scale);
                if self.mantissa % factor != 0 {
                    return Err(DecimalError::PrecisionLoss(scale));
                }
                Ok(Self {
                    mantissa: self.mantissa / factor,
                    scale,
                })
            }
        }
    }

    /// Scale change with half-even rounding, for values read off the wire
    /// before they are bound to a token's declared precision.
    pub fn rescale_lossy(&self, scale: u8) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::ScaleOutOfRange(scale));
        }
        if scale >= self.scale {
            return self.rescale(scale);
        }
        let factor = pow10(self.scale - scale);
        let quot = self.mantissa / factor;
        let rem = self.mantissa % factor;
        let half = factor / 2;
        let round_away = match rem.abs().cmp(&half) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => quot % 2 != 0,
        };
        let mantissa = if round_away {
            quot + self.mantissa.signum()
        } else {
            quot
        };
        Ok(Self { mantissa, scale })
    }

    fn align(a: &Self, b: &Self) -> Result<(i128, i128, u8), DecimalError> {
        let scale = a.scale.max(b.scale);
        let ma = a
            .mantissa
            .checked_mul(pow10(scale - a.scale))
            .ok_or(DecimalError::Overflow)?;
        let mb = b
            .mantissa
            .checked_mul(pow10(scale - b.scale))
            .ok_or(DecimalError::Overflow)?;
        Ok((ma, mb, scale))
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Equal))
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match Self::align(self, other) {
            Ok((a, b, _)) => a.cmp(&b),
            // overflow on alignment: orders of magnitude apart anyway
            Err(_) => self.mantissa.signum().cmp(&other.mantissa.signum()),
        }
    }
}

impl TryFrom<f64> for Decimal {
    type Error = DecimalError;

    /// Reads a wire float at full protocol precision (8 digits).
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(DecimalError::Parse);
        }
        format!("{value:.8}").parse()
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self {
            mantissa: i128::from(value),
            scale: 0,
        }
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DecimalError::Parse);
        }
        let scale = u8::try_from(frac_part.len()).map_err(|_| DecimalError::Parse)?;
        if scale > MAX_SCALE {
            return Err(DecimalError::ScaleOutOfRange(scale));
        }
        let mut mantissa: i128 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            let digit = c.to_digit(10).ok_or(DecimalError::Parse)?;
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit)))
                .ok_or(DecimalError::Overflow)?;
        }
        if negative {
            mantissa = -mantissa;
        }
        Ok(Self { mantissa, scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factor = pow10(self.scale);
        let int = (self.mantissa / factor).abs();
        let frac = (self.mantissa % factor).abs();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        if self.scale == 0 {
            write!(f, "{sign}{int}")
        } else {
            write!(f, "{sign}{int}.{frac:0width$}", width = self.scale as usize)
        }
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
