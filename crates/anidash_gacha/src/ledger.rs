//! # Currency Ledger
//!
//! Bounds-checked add/subtract on a single balance.
//!
//! Pure functions of `(balance, amount) -> (new balance, outcome)`: nothing
//! here touches an account. Engines call these and write the result back.

use crate::error::{Currency, GachaError, GachaResult};

/// Outcome of a saturating credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Credit {
    /// Balance after the credit.
    pub balance: u64,
    /// Amount that actually landed.
    pub applied: u64,
    /// Amount discarded by the cap.
    pub clamped: u64,
}

/// Credits `amount`, saturating at `max`. Never fails.
#[inline]
#[must_use]
pub fn credit(balance: u64, amount: u64, max: u64) -> Credit {
    let target = balance.saturating_add(amount);
    let new_balance = target.min(max).max(balance.min(max));
    let applied = new_balance.saturating_sub(balance);
    Credit {
        balance: new_balance,
        applied,
        clamped: amount - applied,
    }
}

/// Credits exactly `amount`.
///
/// # Errors
///
/// Returns `BoundsViolation` if the result would exceed `max`.
pub fn credit_exact(balance: u64, amount: u64, max: u64, currency: Currency) -> GachaResult<u64> {
    match balance.checked_add(amount) {
        Some(total) if total <= max => Ok(total),
        _ => Err(GachaError::BoundsViolation(format!(
            "{currency} would exceed cap {max}: {balance} + {amount}"
        ))),
    }
}

/// Debits `amount`.
///
/// # Errors
///
/// Returns `InsufficientCurrency` if the balance would go negative.
#[inline]
pub fn debit(balance: u64, amount: u64, currency: Currency) -> GachaResult<u64> {
    balance
        .checked_sub(amount)
        .ok_or(GachaError::InsufficientCurrency {
            currency,
            required: amount,
            available: balance,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_under_cap() {
        let c = credit(10, 5, 100);
        assert_eq!(c, Credit { balance: 15, applied: 5, clamped: 0 });
    }

    #[test]
    fn test_credit_saturates() {
        let c = credit(95, 10, 100);
        assert_eq!(c.balance, 100);
        assert_eq!(c.applied, 5);
        assert_eq!(c.clamped, 5);

        let at_cap = credit(100, 10, 100);
        assert_eq!(at_cap.balance, 100);
        assert_eq!(at_cap.applied, 0);

        let overflow = credit(u64::MAX - 1, 10, u64::MAX);
        assert_eq!(overflow.balance, u64::MAX);
        assert_eq!(overflow.applied, 1);
    }

    #[test]
    fn test_debit() {
        assert_eq!(debit(10, 10, Currency::Tokens).unwrap(), 0);
        let err = debit(150, 200, Currency::Shards).unwrap_err();
        assert_eq!(
            err,
            GachaError::InsufficientCurrency {
                currency: Currency::Shards,
                required: 200,
                available: 150,
            }
        );
    }

    #[test]
    fn test_credit_exact() {
        assert_eq!(credit_exact(9, 1, 10, Currency::Tokens).unwrap(), 10);
        assert!(matches!(
            credit_exact(10, 1, 10, Currency::Tokens),
            Err(GachaError::BoundsViolation(_))
        ));
    }
}
