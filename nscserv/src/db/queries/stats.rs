use diesel::prelude::*;
use diesel::sql_types::{BigInt, Uuid as SqlUuid};
use serde::Serialize;
use uuid::Uuid;

use nsccore::types::{EarningType, PackageStatus};

// ==================== STATISTICS QUERIES ====================

/// Platform-wide figures for the admin dashboard
#[derive(QueryableByName, Serialize, Debug, Clone, Default)]
pub struct PlatformStats {
    #[diesel(sql_type = BigInt)]
    pub total_users: i64,
    #[diesel(sql_type = BigInt)]
    pub active_bots: i64,
    #[diesel(sql_type = BigInt)]
    pub active_packages: i64,
    #[diesel(sql_type = BigInt)]
    pub total_invested_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub total_roi_paid_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub total_commissions_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub total_withdrawn_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub total_balances_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub pending_payments: i64,
    #[diesel(sql_type = BigInt)]
    pub pending_withdrawals: i64,
    #[diesel(sql_type = BigInt)]
    pub pending_kyc: i64,
}

pub fn platform(conn: &mut PgConnection) -> QueryResult<PlatformStats> {
    diesel::sql_query(
        "SELECT
            (SELECT COUNT(*) FROM users) AS total_users,
            (SELECT COUNT(*) FROM users WHERE bot_active) AS active_bots,
            (SELECT COUNT(*) FROM packages WHERE status = 'active') AS active_packages,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM packages) AS total_invested_cents,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM roi_payments) AS total_roi_paid_cents,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM earnings
                WHERE earning_type = 'referral_commission') AS total_commissions_cents,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM withdrawals
                WHERE status = 'completed') AS total_withdrawn_cents,
            (SELECT COALESCE(SUM(balance_cents), 0)::BIGINT FROM users) AS total_balances_cents,
            (SELECT COUNT(*) FROM payment_requests WHERE status = 'pending') AS pending_payments,
            (SELECT COUNT(*) FROM withdrawals WHERE status = 'pending') AS pending_withdrawals,
            (SELECT COUNT(*) FROM kyc_submissions WHERE status = 'pending') AS pending_kyc",
    )
    .get_result(conn)
}

/// Investment figures for one user's dashboard
#[derive(QueryableByName, Serialize, Debug, Clone, Default)]
pub struct UserTotals {
    #[diesel(sql_type = BigInt)]
    pub active_packages: i64,
    #[diesel(sql_type = BigInt)]
    pub total_invested_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub total_roi_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub total_commission_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub direct_referrals: i64,
}

pub fn user(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<UserTotals> {
    diesel::sql_query(
        "SELECT
            (SELECT COUNT(*) FROM packages WHERE user_id = $1 AND status = $2) AS active_packages,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM packages
                WHERE user_id = $1) AS total_invested_cents,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM earnings
                WHERE user_id = $1 AND earning_type = $3) AS total_roi_cents,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM earnings
                WHERE user_id = $1 AND earning_type = $4) AS total_commission_cents,
            (SELECT COUNT(*) FROM users WHERE referrer_id = $1) AS direct_referrals",
    )
    .bind::<SqlUuid, _>(user_id)
    .bind::<diesel::sql_types::Text, _>(PackageStatus::Active.as_str())
    .bind::<diesel::sql_types::Text, _>(EarningType::Roi.as_str())
    .bind::<diesel::sql_types::Text, _>(EarningType::ReferralCommission.as_str())
    .get_result(conn)
}
