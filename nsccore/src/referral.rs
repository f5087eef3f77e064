//! Referral commissions and referral codes.
//!
//! When a package is activated, each upline of the investor up to
//! [`MAX_LEVELS`] deep receives a share of the invested amount:
//!
//! | level | rate |
//! |-------|------|
//! | 1     | 10%  |
//! | 2     | 5%   |
//! | 3     | 3%   |
//! | 4     | 2%   |
//! | 5     | 1%   |
//! | 6     | 1%   |
//!
//! An ineligible upline (suspended, or without an active bot) is skipped but
//! keeps its level: its share is not compressed up to the next upline.

use rand::Rng;
use uuid::Uuid;

use crate::roi::BPS_DENOMINATOR;
use crate::{CoreError, Result};

/// Deepest referral level that earns commission.
pub const MAX_LEVELS: usize = 6;

/// Commission rate per level in basis points, level 1 first.
pub const LEVEL_RATES_BPS: [i64; MAX_LEVELS] = [1000, 500, 300, 200, 100, 100];

/// Length of a referral code.
pub const REFERRAL_CODE_LEN: usize = 8;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// One ancestor in the referral chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upline {
    pub user_id: Uuid,
    pub eligible: bool,
}

/// Commission owed to one upline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commission {
    pub beneficiary: Uuid,
    /// 1-based referral level.
    pub level: i32,
    pub amount_cents: i64,
}

/// Rate for a 1-based level, `None` beyond [`MAX_LEVELS`].
pub fn level_rate_bps(level: usize) -> Option<i64> {
    level.checked_sub(1).and_then(|i| LEVEL_RATES_BPS.get(i).copied())
}

/// Split `amount_cents` across `uplines`, nearest upline first.
///
/// # Errors
///
/// - [`CoreError::NonPositiveAmount`] if the amount is zero or negative
/// - [`CoreError::Overflow`] on arithmetic overflow
pub fn fan_out(amount_cents: i64, uplines: &[Upline]) -> Result<Vec<Commission>> {
    if amount_cents <= 0 {
        return Err(CoreError::NonPositiveAmount);
    }

    let mut commissions = Vec::with_capacity(uplines.len().min(MAX_LEVELS));
    for (idx, upline) in uplines.iter().take(MAX_LEVELS).enumerate() {
        if !upline.eligible {
            tracing::debug!(level = idx + 1, user = %upline.user_id, "upline not eligible, skipping");
            continue;
        }
        let amount = amount_cents
            .checked_mul(LEVEL_RATES_BPS[idx])
            .ok_or(CoreError::Overflow)?
            / BPS_DENOMINATOR;
        if amount == 0 {
            continue;
        }
        commissions.push(Commission {
            beneficiary: upline.user_id,
            level: (idx + 1) as i32,
            amount_cents: amount,
        });
    }
    Ok(commissions)
}

/// Generate a random referral code.
pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Whether `code` could have come from [`generate_referral_code`].
pub fn is_valid_referral_code(code: &str) -> bool {
    code.len() == REFERRAL_CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

/// Normalise user input (trim, uppercase) before lookup.
pub fn normalize_referral_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Vec<Upline> {
        (0..n)
            .map(|_| Upline {
                user_id: Uuid::new_v4(),
                eligible: true,
            })
            .collect()
    }

    #[test]
    fn test_rates_sum_to_22_percent() {
        assert_eq!(LEVEL_RATES_BPS.iter().sum::<i64>(), 2200);
        assert_eq!(level_rate_bps(1), Some(1000));
        assert_eq!(level_rate_bps(6), Some(100));
        assert_eq!(level_rate_bps(0), None);
        assert_eq!(level_rate_bps(7), None);
    }

    #[test]
    fn test_fan_out_full_chain() {
        let uplines = chain(6);
        let commissions = fan_out(100_000, &uplines).unwrap();
        let amounts: Vec<i64> = commissions.iter().map(|c| c.amount_cents).collect();
        assert_eq!(amounts, vec![10_000, 5_000, 3_000, 2_000, 1_000, 1_000]);
        assert_eq!(commissions[0].beneficiary, uplines[0].user_id);
        assert_eq!(commissions[5].level, 6);
    }

    #[test]
    fn test_fan_out_truncates_at_six_levels() {
        let uplines = chain(9);
        let commissions = fan_out(100_000, &uplines).unwrap();
        assert_eq!(commissions.len(), MAX_LEVELS);
        assert!(commissions.iter().all(|c| c.beneficiary != uplines[6].user_id));
    }

    #[test]
    fn test_ineligible_upline_keeps_its_level() {
        let mut uplines = chain(3);
        uplines[1].eligible = false;
        let commissions = fan_out(100_000, &uplines).unwrap();
        assert_eq!(commissions.len(), 2);
        assert_eq!(commissions[1].beneficiary, uplines[2].user_id);
        assert_eq!(commissions[1].level, 3);
        assert_eq!(commissions[1].amount_cents, 3_000);
    }

    #[test]
    fn test_small_amounts_drop_zero_commissions() {
        let commissions = fan_out(20, &chain(6)).unwrap();
        // 10% and 5% of 20 cents survive, the rest floor to zero
        assert_eq!(commissions.len(), 2);
        assert!(fan_out(0, &chain(1)).is_err());
    }

    #[test]
    fn test_fan_out_empty_chain() {
        assert!(fan_out(100_000, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_generated_codes_validate() {
        for _ in 0..50 {
            let code = generate_referral_code();
            assert!(is_valid_referral_code(&code), "bad code {code}");
        }
        assert!(!is_valid_referral_code("ABCDEFG"));
        assert!(!is_valid_referral_code("ABCDEFG0"));
        assert_eq!(normalize_referral_code("  abcd2345 "), "ABCD2345");
    }
}
