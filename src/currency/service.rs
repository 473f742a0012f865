use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::config::PipelineConfig;
use crate::errors::AppError;

/// Largest magnitude, in minor units, accepted by any money operation.
/// Mirrors the safe-integer bound of the upstream data feed; amounts beyond
/// it are rejected before arithmetic, not after.
pub const MAX_MINOR_UNITS: i64 = 9_007_199_254_740_991;

/// Exact decimal money arithmetic over integer minor units (cents).
///
/// Every other module routes its money computations through here; no raw
/// floating-point arithmetic touches currency anywhere in the crate.
pub struct CurrencyService;

impl CurrencyService {
    /// Parse a decimal string with at most 2 fractional digits into cents.
    pub fn to_minor_units(value: &str) -> Result<i64, AppError> {
        let trimmed = value.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if int_part.is_empty()
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(AppError::InvalidAmount(format!(
                "'{trimmed}' is not a valid decimal amount"
            )));
        }
        if frac_part.len() > 2 {
            return Err(AppError::InvalidAmount(format!(
                "'{trimmed}' has more than 2 fractional digits"
            )));
        }

        // All-digit input that still fails to parse can only be out of range.
        let int_units: i128 = int_part.parse::<i128>().map_err(|_| {
            AppError::Overflow(format!("'{trimmed}' exceeds the representable range"))
        })?;
        let frac_units: i128 = match frac_part.len() {
            0 => 0,
            1 => frac_part.parse::<i128>().unwrap_or(0) * 10,
            _ => frac_part.parse::<i128>().unwrap_or(0),
        };

        let mut minor = int_units
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac_units))
            .ok_or_else(|| {
                AppError::Overflow(format!("'{trimmed}' exceeds the representable range"))
            })?;
        if negative {
            minor = -minor;
        }
        Self::check_bound(minor)
    }

    /// Same conversion from the storage-boundary decimal type.
    pub fn decimal_to_minor_units(value: Decimal) -> Result<i64, AppError> {
        let scaled = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| AppError::Overflow(format!("{value} exceeds the representable range")))?;
        if !scaled.fract().is_zero() {
            return Err(AppError::InvalidAmount(format!(
                "'{value}' has more than 2 fractional digits"
            )));
        }
        let minor = scaled
            .to_i64()
            .ok_or_else(|| AppError::Overflow(format!("{value} exceeds the safe integer bound")))?;
        Self::check_bound(minor as i128)
    }

    /// Render cents as a decimal string fixed to 2 places. Round-trips
    /// `to_minor_units` exactly for every in-bound value.
    pub fn from_minor_units(minor: i64) -> String {
        let abs = minor.unsigned_abs();
        let sign = if minor < 0 { "-" } else { "" };
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    pub fn minor_units_to_decimal(minor: i64) -> Decimal {
        Decimal::new(minor, 2)
    }

    pub fn add(a: i64, b: i64) -> Result<i64, AppError> {
        Self::check_bound(a as i128 + b as i128)
    }

    pub fn subtract(a: i64, b: i64) -> Result<i64, AppError> {
        Self::check_bound(a as i128 - b as i128)
    }

    /// Money times an integer scalar.
    pub fn multiply(amount: i64, factor: i64) -> Result<i64, AppError> {
        Self::check_bound(amount as i128 * factor as i128)
    }

    pub fn compare(a: i64, b: i64) -> Ordering {
        a.cmp(&b)
    }

    /// Allocate `total` across weighted buckets: floor division per bucket,
    /// with the last bucket absorbing the rounding remainder so the outputs
    /// always sum to the input exactly.
    pub fn distribute_amount<K: Clone>(
        total: i64,
        buckets: &[(K, u32)],
    ) -> Result<Vec<(K, i64)>, AppError> {
        if total < 0 {
            return Err(AppError::InvalidAmount(
                "Cannot distribute a negative total".to_string(),
            ));
        }
        Self::check_bound(total as i128)?;

        let total_weight: i128 = buckets.iter().map(|(_, w)| *w as i128).sum();
        if total_weight == 0 {
            return Err(AppError::InvalidAmount(
                "Distribution weights must sum to more than zero".to_string(),
            ));
        }

        let mut allocated: i128 = 0;
        let mut out = Vec::with_capacity(buckets.len());
        for (i, (id, weight)) in buckets.iter().enumerate() {
            let share = if i == buckets.len() - 1 {
                total as i128 - allocated
            } else {
                (total as i128 * *weight as i128) / total_weight
            };
            allocated += share;
            out.push((id.clone(), share as i64));
        }
        Ok(out)
    }

    /// Enforce the configured transfer floor and ceiling. Independent of the
    /// arithmetic overflow bound.
    pub fn validate_transfer_amount(
        minor: i64,
        config: &PipelineConfig,
    ) -> Result<(), AppError> {
        if minor < config.min_transfer_cents {
            return Err(AppError::InvalidAmount(format!(
                "Transfer amount must be at least {}",
                Self::from_minor_units(config.min_transfer_cents)
            )));
        }
        if minor > config.max_transfer_cents {
            return Err(AppError::InvalidAmount(format!(
                "Transfer amount exceeds the maximum of {}",
                Self::from_minor_units(config.max_transfer_cents)
            )));
        }
        Ok(())
    }

    fn check_bound(minor: i128) -> Result<i64, AppError> {
        if minor.unsigned_abs() > MAX_MINOR_UNITS as u128 {
            return Err(AppError::Overflow(format!(
                "{minor} minor units exceeds the safe integer bound"
            )));
        }
        Ok(minor as i64)
    }
}
