//! Monthly ROI arithmetic.
//!
//! Due dates are always computed from the activation time rather than from
//! the previous due date, so a package activated on the 31st pays on the
//! last day of short months and returns to the 31st afterwards.

use chrono::{DateTime, Months, Utc};

use crate::{CoreError, Result};

/// Basis points in 100%.
pub const BPS_DENOMINATOR: i64 = 10_000;

/// One ROI payment: `floor(amount * bps / 10000)`.
///
/// # Errors
///
/// - [`CoreError::NonPositiveAmount`] if `amount_cents <= 0`
/// - [`CoreError::Overflow`] if the product does not fit in `i64`
pub fn monthly_payout(amount_cents: i64, roi_bps: i32) -> Result<i64> {
    if amount_cents <= 0 {
        return Err(CoreError::NonPositiveAmount);
    }
    if roi_bps < 0 {
        return Err(CoreError::invalid("roi_bps", "must not be negative"));
    }
    amount_cents
        .checked_mul(roi_bps as i64)
        .map(|v| v / BPS_DENOMINATOR)
        .ok_or(CoreError::Overflow)
}

/// Total paid over `payments` months.
pub fn total_return(amount_cents: i64, roi_bps: i32, payments: i32) -> Result<i64> {
    monthly_payout(amount_cents, roi_bps)?
        .checked_mul(payments as i64)
        .ok_or(CoreError::Overflow)
}

/// Due date of payment number `payment_number` (1-based).
pub fn due_date(activated_at: DateTime<Utc>, payment_number: i32) -> Result<DateTime<Utc>> {
    if payment_number < 1 {
        return Err(CoreError::invalid("payment_number", "must be at least 1"));
    }
    activated_at
        .checked_add_months(Months::new(payment_number as u32))
        .ok_or(CoreError::Overflow)
}

/// Result of advancing a package by one payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleStep {
    /// 1-based number of the payment being made.
    pub payment_number: i32,
    /// Whether this payment is the last one.
    pub completes: bool,
}

/// Next payment for a package that has received `paid_count` of `max` payments.
///
/// # Errors
///
/// - [`CoreError::RoiScheduleComplete`] if every payment was already made
pub fn schedule_step(paid_count: i32, max: i32) -> Result<ScheduleStep> {
    if paid_count >= max {
        return Err(CoreError::RoiScheduleComplete {
            paid: paid_count,
            max,
        });
    }
    let payment_number = paid_count + 1;
    Ok(ScheduleStep {
        payment_number,
        completes: payment_number == max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::MAX_ROI_PAYMENTS;
    use chrono::TimeZone;

    #[test]
    fn test_monthly_payout_floors() {
        assert_eq!(monthly_payout(10_000, 400).unwrap(), 400);
        // $123.45 at 4% = 493.8 cents
        assert_eq!(monthly_payout(12_345, 400).unwrap(), 493);
        assert_eq!(monthly_payout(5_000_000, 800).unwrap(), 400_000);
    }

    #[test]
    fn test_monthly_payout_rejects_bad_input() {
        assert_eq!(monthly_payout(0, 400), Err(CoreError::NonPositiveAmount));
        assert!(monthly_payout(100, -1).is_err());
        assert_eq!(monthly_payout(i64::MAX, 800), Err(CoreError::Overflow));
    }

    #[test]
    fn test_total_return_over_full_schedule() {
        assert_eq!(total_return(100_000, 500, MAX_ROI_PAYMENTS).unwrap(), 60_000);
    }

    #[test]
    fn test_due_dates_clamp_without_drift() {
        let activated = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            due_date(activated, 1).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap()
        );
        assert_eq!(
            due_date(activated, 2).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap()
        );
        assert_eq!(
            due_date(activated, 12).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap()
        );
        assert!(due_date(activated, 0).is_err());
    }

    #[test]
    fn test_schedule_step_caps_at_max() {
        let first = schedule_step(0, MAX_ROI_PAYMENTS).unwrap();
        assert_eq!(first.payment_number, 1);
        assert!(!first.completes);

        let last = schedule_step(11, MAX_ROI_PAYMENTS).unwrap();
        assert_eq!(last.payment_number, 12);
        assert!(last.completes);

        assert_eq!(
            schedule_step(12, MAX_ROI_PAYMENTS),
            Err(CoreError::RoiScheduleComplete { paid: 12, max: 12 })
        );
    }
}
