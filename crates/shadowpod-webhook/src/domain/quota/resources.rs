//! Resource quantities and resource lists used for quota arithmetic.
//!
//! Kubernetes quantities are strings (`500m`, `2Gi`, `1e3`). They are parsed
//! once into [`MilliQuantity`] values, an exact fixed-point representation in
//! thousandths of the canonical unit, so that sums and comparisons never
//! accumulate rounding errors.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;
use std::ops::AddAssign;
use std::ops::Sub;
use std::ops::SubAssign;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::errors::QuotaError;

/// A resource quantity expressed in thousandths of its canonical unit
/// (millicores for cpu, millibytes for memory).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MilliQuantity(i128);

enum Scale {
    Decimal(i32),
    Binary(u32),
}

impl MilliQuantity {
    pub const ZERO: Self = Self(0);
    /// Largest magnitude accepted by [`MilliQuantity::parse`]. Far above any
    /// real capacity, and low enough that summing many values cannot overflow.
    pub const MAX: Self = Self(10_i128.pow(30));

    pub const fn from_milli(milli: i128) -> Self {
        Self(milli)
    }

    pub const fn as_milli(self) -> i128 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Parse a Kubernetes quantity string.
    ///
    /// Sub-milli precision is rounded up, as Kubernetes does when reading the
    /// milli value of a quantity.
    ///
    /// # Errors
    ///
    /// - [`QuotaError::Validation`] if the value is not a valid quantity or its
    ///   magnitude exceeds [`MilliQuantity::MAX`]
    pub fn parse(value: &str) -> Result<Self, Report<QuotaError>> {
        let value = value.trim();
        let invalid = || QuotaError::validation(format!("invalid quantity {value:?}"));

        let (negative, unsigned) = match value.as_bytes().first() {
            Some(b'-') => (true, &value[1..]),
            Some(b'+') => (false, &value[1..]),
            Some(_) => (false, value),
            None => return Err(Report::new(invalid())),
        };

        let number_end = unsigned
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
            return Err(Report::new(invalid()));
        }
        let mantissa = format!("{int_part}{frac_part}")
            .parse::<i128>()
            .change_context_lazy(invalid)?;
        let frac_len = i32::try_from(frac_part.len()).change_context_lazy(invalid)?;

        let scale = match suffix {
            "" => Scale::Decimal(0),
            "n" => Scale::Decimal(-9),
            "u" => Scale::Decimal(-6),
            "m" => Scale::Decimal(-3),
            "k" => Scale::Decimal(3),
            "M" => Scale::Decimal(6),
            "G" => Scale::Decimal(9),
            "T" => Scale::Decimal(12),
            "P" => Scale::Decimal(15),
            "E" => Scale::Decimal(18),
            "Ki" => Scale::Binary(10),
            "Mi" => Scale::Binary(20),
            "Gi" => Scale::Binary(30),
            "Ti" => Scale::Binary(40),
            "Pi" => Scale::Binary(50),
            "Ei" => Scale::Binary(60),
            exponent if exponent.starts_with(['e', 'E']) => {
                Scale::Decimal(exponent[1..].parse::<i32>().change_context_lazy(invalid)?)
            }
            _ => return Err(Report::new(invalid())),
        };

        let milli = match scale {
            Scale::Decimal(exponent) => exponent
                .checked_add(3)
                .and_then(|e| e.checked_sub(frac_len))
                .and_then(|e| scale_by_power_of_ten(mantissa, e)),
            Scale::Binary(shift) => mantissa
                .checked_mul(1_i128 << shift)
                .and_then(|v| v.checked_mul(1000))
                .and_then(|v| Some(div_ceil(v, 10_i128.checked_pow(frac_len.unsigned_abs())?))),
        }
        .filter(|milli| *milli <= Self::MAX.0)
        .ok_or_else(|| Report::new(invalid()).attach_printable("quantity out of range"))?;

        Ok(Self(if negative { -milli } else { milli }))
    }
}

fn scale_by_power_of_ten(mantissa: i128, exponent: i32) -> Option<i128> {
    if exponent >= 0 {
        return mantissa.checked_mul(10_i128.checked_pow(exponent.unsigned_abs())?);
    }
    match 10_i128.checked_pow(exponent.unsigned_abs()) {
        Some(divisor) => Some(div_ceil(mantissa, divisor)),
        // Anything this small rounds up to a single milli unit.
        None => Some(i128::from(mantissa > 0)),
    }
}

fn div_ceil(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    if value % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

impl fmt::Display for MilliQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}", self.0 / 1000)
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

impl Add for MilliQuantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for MilliQuantity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for MilliQuantity {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl SubAssign for MilliQuantity {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

/// A mapping from resource name (`cpu`, `memory`, ...) to quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources(BTreeMap<String, MilliQuantity>);

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a Kubernetes resource list of capacities.
    ///
    /// # Errors
    ///
    /// - [`QuotaError::Validation`] if any quantity is malformed or negative
    pub fn from_quantities(list: &BTreeMap<String, Quantity>) -> Result<Self, Report<QuotaError>> {
        list.iter()
            .map(|(name, quantity)| {
                let parsed = MilliQuantity::parse(&quantity.0)
                    .attach_printable_lazy(|| format!("resource {name}"))?;
                if parsed.is_negative() {
                    return Err(Report::new(QuotaError::validation(format!(
                        "resource {name} must not be negative, got {}",
                        quantity.0
                    ))));
                }
                Ok((name.clone(), parsed))
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<MilliQuantity> {
        self.0.get(name).copied()
    }

    pub fn set(&mut self, name: impl Into<String>, quantity: MilliQuantity) {
        self.0.insert(name.into(), quantity);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, MilliQuantity)> {
        self.0.iter().map(|(name, q)| (name.as_str(), *q))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every quantity of `other` to the matching entry.
    ///
    /// `self` is left untouched on error.
    ///
    /// # Errors
    ///
    /// - [`QuotaError::Validation`] if a sum leaves the representable range
    pub fn add(&mut self, other: &Resources) -> Result<(), Report<QuotaError>> {
        let mut sum = self.0.clone();
        for (name, quantity) in other.iter() {
            let entry = sum.entry(name.to_string()).or_default();
            *entry = entry.checked_add(quantity).ok_or_else(|| {
                Report::new(QuotaError::validation("quantity out of range"))
                    .attach_printable(format!("resource {name}"))
            })?;
        }
        self.0 = sum;
        Ok(())
    }

    /// Subtract every quantity of `other` from the matching entry.
    pub fn subtract(&mut self, other: &Resources) {
        for (name, quantity) in other.iter() {
            *self.0.entry(name.to_string()).or_default() -= quantity;
        }
    }

    /// Element-wise maximum with `other`.
    pub fn max_with(&mut self, other: &Resources) {
        for (name, quantity) in other.iter() {
            let entry = self.0.entry(name.to_string()).or_insert(quantity);
            *entry = (*entry).max(quantity);
        }
    }

    /// Names of the resources whose quantity dropped below zero.
    pub fn negative_resources(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, q)| q.is_negative())
            .map(|(name, _)| name)
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, MilliQuantity)> for Resources {
    fn from_iter<I: IntoIterator<Item = (K, MilliQuantity)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, q)| (k.into(), q)).collect())
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, quantity)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {quantity}")?;
        }
        write!(f, "}}")
    }
}
