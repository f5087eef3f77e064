//! Withdrawal policy.
//!
//! A withdrawal is accepted when the user's KYC is approved, the amount is at
//! least the configured minimum, the balance covers it, and no non-rejected
//! withdrawal was requested within the cooldown window (30 days by default).
//! The fee is taken out of the requested amount.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::roi::BPS_DENOMINATOR;
use crate::types::KycStatus;
use crate::{CoreError, Result};

/// Default minimum withdrawal: $10.
pub const DEFAULT_MIN_AMOUNT_CENTS: i64 = 1_000;

/// Default fee: 5%.
pub const DEFAULT_FEE_BPS: i64 = 500;

/// Default cooldown between withdrawals.
pub const DEFAULT_COOLDOWN_DAYS: i64 = 30;

/// Configurable withdrawal rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalPolicy {
    pub min_amount_cents: i64,
    pub fee_bps: i64,
    pub cooldown_days: i64,
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            min_amount_cents: DEFAULT_MIN_AMOUNT_CENTS,
            fee_bps: DEFAULT_FEE_BPS,
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
        }
    }
}

/// Accepted withdrawal split into fee and payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithdrawalQuote {
    pub amount_cents: i64,
    pub fee_cents: i64,
    pub net_amount_cents: i64,
}

/// Inputs describing the requesting user at the time of the request.
#[derive(Debug, Clone, Copy)]
pub struct WithdrawalContext {
    pub balance_cents: i64,
    pub kyc_status: KycStatus,
    pub last_withdrawal_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl WithdrawalPolicy {
    /// Fee for `amount_cents`, rounded down.
    pub fn fee_for(&self, amount_cents: i64) -> Result<i64> {
        amount_cents
            .checked_mul(self.fee_bps)
            .map(|v| v / BPS_DENOMINATOR)
            .ok_or(CoreError::Overflow)
    }

    /// Earliest time a new withdrawal is allowed after one requested at `last`.
    pub fn next_eligible_at(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        last + Duration::days(self.cooldown_days)
    }

    /// Validate a request for `amount_cents` and quote the payout.
    ///
    /// Checks run in order: amount, KYC, cooldown, balance.
    pub fn check(&self, amount_cents: i64, ctx: &WithdrawalContext) -> Result<WithdrawalQuote> {
        if amount_cents <= 0 {
            return Err(CoreError::NonPositiveAmount);
        }
        if amount_cents < self.min_amount_cents {
            return Err(CoreError::BelowMinimum {
                min_cents: self.min_amount_cents,
            });
        }
        if ctx.kyc_status != KycStatus::Approved {
            return Err(CoreError::KycRequired);
        }
        if let Some(last) = ctx.last_withdrawal_at {
            let until = self.next_eligible_at(last);
            if ctx.now < until {
                return Err(CoreError::CooldownActive { until });
            }
        }
        if amount_cents > ctx.balance_cents {
            return Err(CoreError::InsufficientBalance {
                requested_cents: amount_cents,
                available_cents: ctx.balance_cents,
            });
        }

        let fee_cents = self.fee_for(amount_cents)?;
        Ok(WithdrawalQuote {
            amount_cents,
            fee_cents,
            net_amount_cents: amount_cents - fee_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn ctx() -> WithdrawalContext {
        WithdrawalContext {
            balance_cents: 50_000,
            kyc_status: KycStatus::Approved,
            last_withdrawal_at: None,
            now: now(),
        }
    }

    #[test]
    fn test_quote_takes_fee_from_amount() {
        let quote = WithdrawalPolicy::default().check(10_000, &ctx()).unwrap();
        assert_eq!(quote.fee_cents, 500);
        assert_eq!(quote.net_amount_cents, 9_500);
    }

    #[test]
    fn test_fee_rounds_down() {
        let policy = WithdrawalPolicy::default();
        assert_eq!(policy.fee_for(1_019).unwrap(), 50);
    }

    #[test]
    fn test_below_minimum() {
        assert_eq!(
            WithdrawalPolicy::default().check(999, &ctx()),
            Err(CoreError::BelowMinimum { min_cents: 1_000 })
        );
        assert_eq!(
            WithdrawalPolicy::default().check(0, &ctx()),
            Err(CoreError::NonPositiveAmount)
        );
    }

    #[test]
    fn test_kyc_required() {
        let mut c = ctx();
        c.kyc_status = KycStatus::Pending;
        assert_eq!(
            WithdrawalPolicy::default().check(5_000, &c),
            Err(CoreError::KycRequired)
        );
    }

    #[test]
    fn test_cooldown_window() {
        let policy = WithdrawalPolicy::default();
        let mut c = ctx();

        c.last_withdrawal_at = Some(now() - Duration::days(29));
        let err = policy.check(5_000, &c).unwrap_err();
        assert_eq!(
            err,
            CoreError::CooldownActive {
                until: now() + Duration::days(1)
            }
        );

        c.last_withdrawal_at = Some(now() - Duration::days(30));
        assert!(policy.check(5_000, &c).is_ok());
    }

    #[test]
    fn test_insufficient_balance() {
        assert_eq!(
            WithdrawalPolicy::default().check(60_000, &ctx()),
            Err(CoreError::InsufficientBalance {
                requested_cents: 60_000,
                available_cents: 50_000
            })
        );
    }

    #[test]
    fn test_custom_policy() {
        let policy = WithdrawalPolicy {
            min_amount_cents: 100,
            fee_bps: 0,
            cooldown_days: 0,
        };
        let mut c = ctx();
        c.last_withdrawal_at = Some(now());
        let quote = policy.check(100, &c).unwrap();
        assert_eq!(quote.net_amount_cents, 100);
    }
}
