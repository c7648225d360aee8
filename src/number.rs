// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use serde::ser::Serializer;
use serde::Serialize;

/// Numeric values.
///
/// Integers are kept exact as long as they fit in an `i64`; arithmetic that
/// overflows the integer range falls back to `f64`. Comparisons work across
/// the two representations, so `1 == 1.0` holds.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Some(f as i64)
            }
            Number::Float(_) => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.as_i64().is_some()
    }

    pub fn add(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match a.checked_add(*b) {
                Some(n) => Number::Int(n),
                None => Number::Float(*a as f64 + *b as f64),
            },
            _ => Number::Float(self.as_f64() + other.as_f64()),
        }
    }

    pub fn sub(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match a.checked_sub(*b) {
                Some(n) => Number::Int(n),
                None => Number::Float(*a as f64 - *b as f64),
            },
            _ => Number::Float(self.as_f64() - other.as_f64()),
        }
    }

    pub fn mul(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match a.checked_mul(*b) {
                Some(n) => Number::Int(n),
                None => Number::Float(*a as f64 * *b as f64),
            },
            _ => Number::Float(self.as_f64() * other.as_f64()),
        }
    }

    /// Division is float division; integer operands that divide evenly stay
    /// integers. Returns None when dividing by zero.
    pub fn div(&self, other: &Number) -> Option<Number> {
        if other.as_f64() == 0.0 {
            return None;
        }
        if let (Number::Int(a), Number::Int(b)) = (self, other) {
            if let (Some(0), Some(q)) = (a.checked_rem(*b), a.checked_div(*b)) {
                return Some(Number::Int(q));
            }
        }
        Some(Number::Float(self.as_f64() / other.as_f64()))
    }

    pub fn neg(&self) -> Number {
        match *self {
            Number::Int(i) => match i.checked_neg() {
                Some(n) => Number::Int(n),
                None => Number::Float(-(i as f64)),
            },
            Number::Float(f) => Number::Float(-f),
        }
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(b),
            _ => {
                let (x, y) = (self.as_f64(), other.as_f64());
                // NaN sorts after every number and equal to itself so that
                // Number can key ordered maps.
                x.partial_cmp(&y)
                    .unwrap_or_else(|| x.is_nan().cmp(&y.is_nan()))
            }
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(i) => write!(f, "{i}"),
            // Whole floats print without a fractional part.
            Number::Float(x) => match self.as_i64() {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{x}"),
            },
        }
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Number::Int(i) => serializer.serialize_i64(i),
            Number::Float(x) => match self.as_i64() {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(x),
            },
        }
    }
}

impl FromStr for Number {
    type Err = core::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        Ok(Number::Float(s.parse::<f64>()?))
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => Number::Int(i),
            Err(_) => Number::Float(n as f64),
        }
    }
}

impl From<usize> for Number {
    fn from(n: usize) -> Self {
        match i64::try_from(n) {
            Ok(i) => Number::Int(i),
            Err(_) => Number::Float(n as f64),
        }
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::Float(n)
    }
}
