//! Money Module
//!
//! Amount well-formedness rules shared by the submission fast-path and the
//! transfer validator, plus `StrictDecimal`, the format-validated decimal used
//! at the API boundary.
//!
//! ## Rules
//! 1. An amount must be present
//! 2. An amount must be strictly positive
//! 3. An amount may carry at most [`MAX_SCALE`] fractional digits (cents).
//!    Scale is taken literally: `"1.100"` has scale 3 and is rejected even
//!    though it equals `1.1`.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of fractional digits allowed in a transfer amount
pub const MAX_SCALE: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Amount validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Amount is required")]
    Missing,

    #[error("Amount must be positive")]
    NotPositive,

    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },
}

// ============================================================================
// Validation
// ============================================================================

/// Check a (possibly absent) amount against the well-formedness rules
///
/// Returns the amount itself when valid so callers can bind it directly.
pub fn check_amount(amount: Option<Decimal>) -> Result<Decimal, MoneyError> {
    let amount = amount.ok_or(MoneyError::Missing)?;

    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }

    if amount.scale() > MAX_SCALE {
        return Err(MoneyError::PrecisionOverflow {
            provided: amount.scale(),
            max: MAX_SCALE,
        });
    }

    Ok(amount)
}

/// Shorthand for `check_amount(Some(amount)).is_ok()`
#[inline]
pub fn is_well_formed(amount: Decimal) -> bool {
    check_amount(Some(amount)).is_ok()
}

/// Check a seed balance: any sign, at most [`MAX_SCALE`] fractional digits
///
/// Keeping every balance at cent scale keeps transfer arithmetic exact.
pub fn check_balance(balance: Decimal) -> Result<Decimal, MoneyError> {
    if balance.scale() > MAX_SCALE {
        return Err(MoneyError::PrecisionOverflow {
            provided: balance.scale(),
            max: MAX_SCALE,
        });
    }
    Ok(balance)
}

/// `balance + amount`, or `None` if the sum cannot be represented exactly
///
/// `Decimal` rounds instead of failing once a result needs more than 28
/// significant digits, so the sum is verified by reversing it.
pub fn exact_credit(balance: Decimal, amount: Decimal) -> Option<Decimal> {
    let sum = balance.checked_add(amount)?;
    (sum.checked_sub(amount)? == balance).then_some(sum)
}

/// `balance - amount`, or `None` if the difference cannot be represented exactly
pub fn exact_debit(balance: Decimal, amount: Decimal) -> Option<Decimal> {
    let diff = balance.checked_sub(amount)?;
    (diff.checked_add(amount)? == balance).then_some(diff)
}

// ============================================================================
// StrictDecimal: Format-Validated Decimal at Serde Layer
// ============================================================================

/// Strict format Decimal - validates format during deserialization
///
/// - Only JSON strings are accepted (JSON numbers go through f64)
/// - Rejects `.5` (must be `0.5`) and `5.` (must be `5.0` or `5`)
/// - Rejects scientific notation and a `+` prefix
/// - Rejects empty strings
///
/// Sign and scale are NOT checked here; that is business validation and
/// happens in [`check_amount`], so a negative amount is reported the same way
/// whichever layer sees it first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrictDecimal(Decimal);

impl StrictDecimal {
    /// Get the inner Decimal value
    pub fn inner(self) -> Decimal {
        self.0
    }
}

impl From<Decimal> for StrictDecimal {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl std::ops::Deref for StrictDecimal {
    type Target = Decimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StrictDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        let s = s.trim();

        if s.is_empty() {
            return Err(D::Error::custom("Amount cannot be empty"));
        }

        let unsigned = s.strip_prefix('-').unwrap_or(s);

        if unsigned.starts_with('.') {
            return Err(D::Error::custom("Invalid format: use 0.5 not .5"));
        }

        if unsigned.ends_with('.') {
            return Err(D::Error::custom("Invalid format: use 5.0 not 5."));
        }

        if s.contains('e') || s.contains('E') {
            return Err(D::Error::custom(
                "Invalid format: scientific notation not allowed",
            ));
        }

        if s.starts_with('+') {
            return Err(D::Error::custom("Invalid format: + prefix not allowed"));
        }

        let d = Decimal::from_str(s)
            .map_err(|e| D::Error::custom(format!("Invalid decimal: {}", e)))?;

        Ok(StrictDecimal(d))
    }
}

impl Serialize for StrictDecimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
