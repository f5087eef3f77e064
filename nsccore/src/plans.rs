//! Investment tiers.
//!
//! A package is bought into exactly one plan. The plan fixes the monthly ROI
//! rate; the amount must fall inside the plan's range.

use serde::Serialize;

use crate::{CoreError, Result};

/// Number of monthly ROI payments a package receives before completing.
pub const MAX_ROI_PAYMENTS: i32 = 12;

/// One investment tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub code: &'static str,
    pub name: &'static str,
    pub min_cents: i64,
    pub max_cents: i64,
    pub monthly_roi_bps: i32,
}

const PLANS: [Plan; 5] = [
    Plan {
        code: "bronze",
        name: "Bronze",
        min_cents: 10_000,
        max_cents: 99_999,
        monthly_roi_bps: 400,
    },
    Plan {
        code: "silver",
        name: "Silver",
        min_cents: 100_000,
        max_cents: 499_999,
        monthly_roi_bps: 500,
    },
    Plan {
        code: "gold",
        name: "Gold",
        min_cents: 500_000,
        max_cents: 999_999,
        monthly_roi_bps: 600,
    },
    Plan {
        code: "platinum",
        name: "Platinum",
        min_cents: 1_000_000,
        max_cents: 4_999_999,
        monthly_roi_bps: 700,
    },
    Plan {
        code: "diamond",
        name: "Diamond",
        min_cents: 5_000_000,
        max_cents: 100_000_000,
        monthly_roi_bps: 800,
    },
];

/// All plans, cheapest first.
pub fn all() -> &'static [Plan] {
    &PLANS
}

/// Look a plan up by code.
pub fn find(code: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|p| p.code == code)
}

/// The plan whose range contains `amount_cents`, if any.
pub fn plan_for_amount(amount_cents: i64) -> Option<&'static Plan> {
    PLANS
        .iter()
        .find(|p| (p.min_cents..=p.max_cents).contains(&amount_cents))
}

/// Check that `amount_cents` may be invested in plan `code`.
///
/// # Errors
///
/// - [`CoreError::NonPositiveAmount`] for zero or negative amounts
/// - [`CoreError::UnknownPlan`] if no plan has that code
/// - [`CoreError::AmountOutOfRange`] if the amount is outside the plan range
pub fn validate_investment(code: &str, amount_cents: i64) -> Result<&'static Plan> {
    if amount_cents <= 0 {
        return Err(CoreError::NonPositiveAmount);
    }
    let plan = find(code).ok_or_else(|| CoreError::UnknownPlan(code.to_string()))?;
    if amount_cents < plan.min_cents || amount_cents > plan.max_cents {
        return Err(CoreError::AmountOutOfRange {
            plan: plan.code.to_string(),
            amount_cents,
            min_cents: plan.min_cents,
            max_cents: plan.max_cents,
        });
    }
    Ok(plan)
}
