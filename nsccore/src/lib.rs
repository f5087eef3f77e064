//! # nsccore
//!
//! Domain rules shared by the NSC Bot Platform server and admin client.
//!
//! Nothing in this crate touches the database or the network: it holds the
//! enums persisted as status columns, the package tiers, ROI and referral
//! arithmetic, the withdrawal policy, input validation, JWT handling,
//! password hashing and e-mail templates.
//!
//! ## Modules
//!
//! - [`types`]: status enums stored as `TEXT` columns
//! - [`plans`]: investment tiers
//! - [`roi`]: monthly payout and schedule arithmetic
//! - [`referral`]: 6-level commission fan-out and referral codes
//! - [`withdrawal`]: withdrawal policy (minimum, fee, cooldown, KYC)
//! - [`validate`]: request field validation and pagination
//! - [`token`]: access / refresh JWTs
//! - [`password`]: Argon2id password hashing and reset tokens
//! - [`email`]: notification e-mail templates

pub mod email;
pub mod password;
pub mod plans;
pub mod referral;
pub mod roi;
pub mod token;
pub mod types;
pub mod validate;
pub mod withdrawal;

use chrono::{DateTime, Utc};

/// Error type for every rule enforced in this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Amount is zero or negative.
    #[error("amount must be positive")]
    NonPositiveAmount,

    /// Arithmetic overflow.
    #[error("arithmetic overflow in amount calculation")]
    Overflow,

    /// No plan with that code.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    /// Amount outside the plan's investment range.
    #[error("amount {amount_cents} outside plan {plan} range {min_cents}..={max_cents}")]
    AmountOutOfRange {
        /// Plan code.
        plan: String,
        /// Requested amount.
        amount_cents: i64,
        /// Plan minimum.
        min_cents: i64,
        /// Plan maximum.
        max_cents: i64,
    },

    /// Package already received every ROI payment.
    #[error("package already received {paid} of {max} ROI payments")]
    RoiScheduleComplete {
        /// Payments made.
        paid: i32,
        /// Payment cap.
        max: i32,
    },

    /// Withdrawal below the configured minimum.
    #[error("withdrawal amount below minimum of {min_cents} cents")]
    BelowMinimum {
        /// Configured minimum.
        min_cents: i64,
    },

    /// Balance too low for the requested debit.
    #[error("insufficient balance: requested {requested_cents}, available {available_cents}")]
    InsufficientBalance {
        /// Requested amount.
        requested_cents: i64,
        /// Current balance.
        available_cents: i64,
    },

    /// KYC has not been approved.
    #[error("KYC verification must be approved first")]
    KycRequired,

    /// A previous withdrawal is too recent.
    #[error("withdrawal cooldown active until {until}")]
    CooldownActive {
        /// Earliest time of the next withdrawal.
        until: DateTime<Utc>,
    },

    /// Field failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },

    /// Unknown enum value read from storage or input.
    #[error("unknown {kind} value: {value}")]
    UnknownVariant {
        /// Enum name.
        kind: &'static str,
        /// Offending value.
        value: String,
    },

    /// Token could not be issued or failed validation.
    #[error("token error: {0}")]
    Token(String),

    /// Password hashing backend failure.
    #[error("password hash error: {0}")]
    PasswordHash(String),
}

impl CoreError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
