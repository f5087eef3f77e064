//! Status enums persisted as `TEXT` columns.
//!
//! Each enum round-trips through its snake_case name: `as_str()` for writes,
//! `FromStr` for reads, and serde uses the same spelling on the wire.

use serde::{Deserialize, Serialize};

use crate::CoreError;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Column / wire spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(CoreError::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    /// Account role.
    UserRole { User => "user", Admin => "admin" }
}

text_enum! {
    /// Account status. Suspended accounts cannot log in and earn no commissions.
    UserStatus { Active => "active", Suspended => "suspended" }
}

text_enum! {
    /// KYC state of a user or a submission.
    KycStatus {
        NotSubmitted => "not_submitted",
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    /// Lifecycle of an investment package.
    PackageStatus {
        Active => "active",
        Completed => "completed",
    }
}

text_enum! {
    /// Ledger entry kind. Credits are positive, debits negative.
    TransactionType {
        RoiCredit => "roi_credit",
        CommissionCredit => "commission_credit",
        WithdrawalDebit => "withdrawal_debit",
        WithdrawalRefund => "withdrawal_refund",
    }
}

text_enum! {
    /// Source of an earning.
    EarningType { Roi => "roi", ReferralCommission => "referral_commission" }
}

text_enum! {
    /// Withdrawal lifecycle: pending -> approved -> completed, or rejected.
    WithdrawalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Completed => "completed",
    }
}

text_enum! {
    /// Review state of a payment request.
    PaymentStatus { Pending => "pending", Approved => "approved", Rejected => "rejected" }
}

text_enum! {
    /// What a payment request pays for.
    PaymentPurpose { BotActivation => "bot_activation", Package => "package" }
}

text_enum! {
    /// Supported USDT networks.
    Network { Trc20 => "trc20", Bep20 => "bep20" }
}

text_enum! {
    /// In-app notification category.
    NotificationKind {
        Payment => "payment",
        Package => "package",
        Roi => "roi",
        Commission => "commission",
        Withdrawal => "withdrawal",
        Kyc => "kyc",
    }
}

impl WithdrawalStatus {
    /// Statuses an admin may move a withdrawal into from `self`.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        matches!(
            (self, next),
            (WithdrawalStatus::Pending, WithdrawalStatus::Approved)
                | (WithdrawalStatus::Pending, WithdrawalStatus::Rejected)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Completed)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Rejected)
        )
    }

    /// Whether the withdrawal still holds the user's funds or paid them out.
    pub fn counts_against_cooldown(&self) -> bool {
        !matches!(self, WithdrawalStatus::Rejected)
    }
}

impl TransactionType {
    /// Whether entries of this kind increase the balance.
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionType::WithdrawalDebit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_text_round_trip_all_variants() {
        for status in PackageStatus::ALL {
            assert_eq!(PackageStatus::from_str(status.as_str()).unwrap(), *status);
        }
        for kind in NotificationKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let err = KycStatus::from_str("maybe").unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownVariant {
                kind: "KycStatus",
                value: "maybe".to_string()
            }
        );
    }

    #[test]
    fn test_serde_uses_column_spelling() {
        let json = serde_json::to_string(&PaymentPurpose::BotActivation).unwrap();
        assert_eq!(json, "\"bot_activation\"");
        let back: Network = serde_json::from_str("\"trc20\"").unwrap();
        assert_eq!(back, Network::Trc20);
    }

    #[test]
    fn test_withdrawal_transitions() {
        use WithdrawalStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn test_rejected_withdrawal_does_not_count_against_cooldown() {
        assert!(!WithdrawalStatus::Rejected.counts_against_cooldown());
        assert!(WithdrawalStatus::Pending.counts_against_cooldown());
    }
}
