//! Balance ledger and activation workflows.
//!
//! Every function here expects to run inside a diesel transaction opened by
//! the caller. Balance changes lock the user row with `FOR UPDATE` and write
//! one `transactions` row carrying the resulting balance.

use chrono::{DateTime, Utc};
use diesel::PgConnection;
use uuid::Uuid;

use nsccore::email::{format_usd, EmailTemplate};
use nsccore::plans::{self, MAX_ROI_PAYMENTS};
use nsccore::referral::{self, Commission, Upline};
use nsccore::roi;
use nsccore::types::{
    EarningType, NotificationKind, PackageStatus, PaymentPurpose, TransactionType, UserStatus,
};
use nsccore::CoreError;

use crate::db::models::{BotActivation, Earning, Notification, Package, PaymentRequest, Transaction, User};
use crate::db::queries::{earnings, notifications, packages, users};
use crate::db::schema::bot_activations;
use crate::error::{ApiError, ApiResult};
use crate::mailer::PendingEmail;

/// Apply a signed balance change to a locked user row.
fn apply(
    conn: &mut PgConnection,
    user_id: Uuid,
    tx_type: TransactionType,
    delta_cents: i64,
    reference_id: Option<Uuid>,
    description: &str,
) -> ApiResult<Transaction> {
    let user = users::lock(conn, user_id)?;
    let balance_after = user
        .balance_cents
        .checked_add(delta_cents)
        .ok_or(CoreError::Overflow)?;
    if balance_after < 0 {
        return Err(CoreError::InsufficientBalance {
            requested_cents: -delta_cents,
            available_cents: user.balance_cents,
        }
        .into());
    }

    users::set_balance(conn, user_id, balance_after)?;
    let tx = Transaction {
        id: Uuid::new_v4(),
        user_id,
        tx_type: tx_type.as_str().to_string(),
        amount_cents: delta_cents,
        balance_after_cents: balance_after,
        reference_id,
        description: description.to_string(),
        created_at: Utc::now(),
    };
    earnings::insert_transaction(conn, &tx)?;
    tracing::debug!(
        "Ledger {} {} for {} -> balance {}",
        tx_type,
        delta_cents,
        user_id,
        balance_after
    );
    Ok(tx)
}

/// Add `amount_cents` to the user's balance
pub fn credit(
    conn: &mut PgConnection,
    user_id: Uuid,
    tx_type: TransactionType,
    amount_cents: i64,
    reference_id: Option<Uuid>,
    description: &str,
) -> ApiResult<Transaction> {
    if amount_cents <= 0 || !tx_type.is_credit() {
        return Err(ApiError::Internal(format!(
            "invalid credit of {amount_cents} as {tx_type}"
        )));
    }
    apply(conn, user_id, tx_type, amount_cents, reference_id, description)
}

/// Take `amount_cents` from the user's balance; fails if it would go negative
pub fn debit(
    conn: &mut PgConnection,
    user_id: Uuid,
    tx_type: TransactionType,
    amount_cents: i64,
    reference_id: Option<Uuid>,
    description: &str,
) -> ApiResult<Transaction> {
    if amount_cents <= 0 || tx_type.is_credit() {
        return Err(ApiError::Internal(format!(
            "invalid debit of {amount_cents} as {tx_type}"
        )));
    }
    apply(conn, user_id, tx_type, -amount_cents, reference_id, description)
}

/// Result of activating an investment package.
#[derive(Debug)]
pub struct PackageActivation {
    pub package: Package,
    pub commissions: Vec<Commission>,
    pub emails: Vec<PendingEmail>,
}

/// Create the package paid for by `payment` and pay the referral commissions.
pub fn activate_package(
    conn: &mut PgConnection,
    payment: &PaymentRequest,
    now: DateTime<Utc>,
) -> ApiResult<PackageActivation> {
    let plan_code = payment
        .plan_code
        .as_deref()
        .ok_or_else(|| ApiError::Unprocessable("payment request has no plan".to_string()))?;
    let plan = plans::validate_investment(plan_code, payment.amount_cents)?;
    let investor = users::lock(conn, payment.user_id)?;

    let package = Package {
        id: Uuid::new_v4(),
        user_id: investor.id,
        payment_request_id: payment.id,
        plan_code: plan.code.to_string(),
        amount_cents: payment.amount_cents,
        monthly_roi_bps: plan.monthly_roi_bps,
        roi_paid_count: 0,
        max_roi_payments: MAX_ROI_PAYMENTS,
        status: PackageStatus::Active.as_str().to_string(),
        activated_at: now,
        next_roi_at: Some(roi::due_date(now, 1)?),
        completed_at: None,
        created_at: now,
    };
    packages::insert(conn, &package)?;

    let mut emails = vec![PendingEmail::new(
        &investor.email,
        EmailTemplate::PackageActivated {
            name: investor.full_name.clone(),
            plan_name: plan.name.to_string(),
            amount_cents: package.amount_cents,
            monthly_roi_bps: plan.monthly_roi_bps,
        },
    )];
    notifications::insert(
        conn,
        &Notification::new(
            investor.id,
            NotificationKind::Package,
            "Package activated",
            format!(
                "Your {} package of {} is active. The first ROI payment is due in one month.",
                plan.name,
                format_usd(package.amount_cents)
            ),
        ),
    )?;

    let chain = users::upline_chain(conn, investor.id, referral::MAX_LEVELS)?;
    let uplines: Vec<Upline> = chain
        .iter()
        .map(|u| Upline {
            user_id: u.id,
            eligible: u.status == UserStatus::Active.as_str() && u.bot_active,
        })
        .collect();
    let commissions = referral::fan_out(package.amount_cents, &uplines)?;

    for commission in &commissions {
        let Some(beneficiary) = chain.iter().find(|u| u.id == commission.beneficiary) else {
            continue;
        };
        pay_commission(conn, &investor, &package, beneficiary, commission, now)?;
        emails.push(PendingEmail::new(
            &beneficiary.email,
            EmailTemplate::CommissionEarned {
                name: beneficiary.full_name.clone(),
                amount_cents: commission.amount_cents,
                level: commission.level,
            },
        ));
    }

    tracing::info!(
        "📦 Package {} ({}, {}) activated for {} with {} commission(s)",
        package.id,
        plan.code,
        package.amount_cents,
        investor.id,
        commissions.len()
    );
    Ok(PackageActivation {
        package,
        commissions,
        emails,
    })
}

fn pay_commission(
    conn: &mut PgConnection,
    investor: &User,
    package: &Package,
    beneficiary: &User,
    commission: &Commission,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    earnings::insert(
        conn,
        &Earning {
            id: Uuid::new_v4(),
            user_id: beneficiary.id,
            source_user_id: Some(investor.id),
            package_id: Some(package.id),
            earning_type: EarningType::ReferralCommission.as_str().to_string(),
            level: Some(commission.level),
            amount_cents: commission.amount_cents,
            created_at: now,
        },
    )?;
    credit(
        conn,
        beneficiary.id,
        TransactionType::CommissionCredit,
        commission.amount_cents,
        Some(package.id),
        &format!("Level {} referral commission", commission.level),
    )?;
    notifications::insert(
        conn,
        &Notification::new(
            beneficiary.id,
            NotificationKind::Commission,
            "Referral commission",
            format!(
                "You earned {} level {} commission from {}.",
                format_usd(commission.amount_cents),
                commission.level,
                investor.full_name
            ),
        ),
    )?;
    Ok(())
}

/// Unlock investing for the payer of `payment`.
pub fn activate_bot(
    conn: &mut PgConnection,
    payment: &PaymentRequest,
    now: DateTime<Utc>,
) -> ApiResult<BotActivation> {
    use diesel::prelude::*;

    let user = users::lock(conn, payment.user_id)?;
    if user.bot_active {
        return Err(ApiError::Conflict("bot already active".to_string()));
    }

    let activation = BotActivation {
        id: Uuid::new_v4(),
        user_id: user.id,
        payment_request_id: payment.id,
        fee_cents: payment.amount_cents,
        activated_at: now,
    };
    diesel::insert_into(bot_activations::table)
        .values(&activation)
        .execute(conn)?;
    users::mark_bot_active(conn, user.id, now)?;
    notifications::insert(
        conn,
        &Notification::new(
            user.id,
            NotificationKind::Payment,
            "Bot activated",
            "Your trading bot is active. You can now purchase investment packages.",
        ),
    )?;

    tracing::info!("🤖 Bot activated for {}", user.id);
    Ok(activation)
}

/// Which activation an approved payment produced.
#[derive(Debug)]
pub enum ApprovalOutcome {
    Bot(BotActivation),
    Package(PackageActivation),
}

/// Approve a pending payment request and run the activation it pays for.
///
/// A request is reviewed once; anything but `pending` is a conflict.
pub fn approve_payment(
    conn: &mut PgConnection,
    payment_id: Uuid,
    reviewer: Uuid,
    now: DateTime<Utc>,
) -> ApiResult<(PaymentRequest, ApprovalOutcome, Vec<PendingEmail>)> {
    use crate::db::queries::payments;
    use nsccore::types::PaymentStatus;

    let pending = payments::lock(conn, payment_id)?;
    if pending.status != PaymentStatus::Pending.as_str() {
        return Err(ApiError::Conflict(format!(
            "payment request already {}",
            pending.status
        )));
    }
    let payment = payments::mark_reviewed(conn, payment_id, PaymentStatus::Approved, reviewer, None, now)?;
    let payer = users::find_by_id(conn, payment.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;

    let purpose: PaymentPurpose = payment.purpose.parse()?;
    let mut emails = vec![PendingEmail::new(
        &payer.email,
        EmailTemplate::PaymentReceived {
            name: payer.full_name.clone(),
            amount_cents: payment.amount_cents,
            purpose: purpose.to_string(),
        },
    )];

    let outcome = match purpose {
        PaymentPurpose::BotActivation => ApprovalOutcome::Bot(activate_bot(conn, &payment, now)?),
        PaymentPurpose::Package => {
            let mut activation = activate_package(conn, &payment, now)?;
            emails.append(&mut activation.emails);
            ApprovalOutcome::Package(activation)
        }
    };
    Ok((payment, outcome, emails))
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::prelude::*;

    use crate::db::schema::transactions;
    use crate::db::testing;

    fn ledger_rows(conn: &mut PgConnection, user_id: Uuid) -> i64 {
        transactions::table
            .filter(transactions::user_id.eq(user_id))
            .count()
            .get_result(conn)
            .unwrap()
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_debit_cannot_overdraw() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let user = testing::user(conn, 5_000, true);

        let err = debit(conn, user.id, TransactionType::WithdrawalDebit, 5_001, None, "withdrawal").unwrap_err();
        assert!(matches!(err, ApiError::Unprocessable(_)));
        assert_eq!(testing::reload_user(conn, user.id).balance_cents, 5_000);
        assert_eq!(ledger_rows(conn, user.id), 0);

        let tx = debit(conn, user.id, TransactionType::WithdrawalDebit, 5_000, None, "withdrawal").unwrap();
        assert_eq!(tx.amount_cents, -5_000);
        assert_eq!(tx.balance_after_cents, 0);
        assert_eq!(testing::reload_user(conn, user.id).balance_cents, 0);
        assert!(debit(conn, user.id, TransactionType::WithdrawalDebit, 1, None, "withdrawal").is_err());
        assert_eq!(ledger_rows(conn, user.id), 1);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_credit_rejects_debit_types() {
        let mut db = testing::open();
        let user = testing::user(&mut db.conn, 0, true);
        let err = credit(&mut db.conn, user.id, TransactionType::WithdrawalDebit, 100, None, "bad").unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(testing::reload_user(&mut db.conn, user.id).balance_cents, 0);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_payment_approved_only_once() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let reviewer = testing::user(conn, 0, false);
        let payer = testing::user(conn, 0, false);
        let request = testing::payment(conn, payer.id, PaymentPurpose::BotActivation, 1_000, None);

        let (approved, outcome, emails) = approve_payment(conn, request.id, reviewer.id, Utc::now()).unwrap();
        assert_eq!(approved.status, "approved");
        assert_eq!(approved.reviewed_by, Some(reviewer.id));
        assert!(matches!(outcome, ApprovalOutcome::Bot(ref b) if b.fee_cents == 1_000));
        assert_eq!(emails.len(), 1);
        assert!(testing::reload_user(conn, payer.id).bot_active);

        let err = approve_payment(conn, request.id, reviewer.id, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_package_approval_pays_sponsor() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let reviewer = testing::user(conn, 0, false);
        let sponsor = testing::user(conn, 0, true);
        let investor = testing::user(conn, 0, true);
        diesel::update(crate::db::schema::users::table.find(investor.id))
            .set(crate::db::schema::users::referrer_id.eq(sponsor.id))
            .execute(conn)
            .unwrap();
        let request = testing::payment(conn, investor.id, PaymentPurpose::Package, 250_000, Some("silver"));

        let (_, outcome, _) = approve_payment(conn, request.id, reviewer.id, Utc::now()).unwrap();
        let ApprovalOutcome::Package(activation) = outcome else {
            panic!("expected a package activation");
        };
        assert_eq!(activation.package.roi_paid_count, 0);
        assert_eq!(activation.commissions.len(), 1);
        // Level 1 pays 10% of principal.
        assert_eq!(testing::reload_user(conn, sponsor.id).balance_cents, 25_000);
    }
}
