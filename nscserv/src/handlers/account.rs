use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nsccore::referral::{self, MAX_LEVELS};
use nsccore::types::{EarningType, Network, PaymentPurpose, PaymentStatus};
use nsccore::validate;
use nsccore::withdrawal::WithdrawalPolicy;

use crate::auth::AuthUser;
use crate::db::queries::{earnings, notifications, packages, payments, stats, users, withdrawals};
use crate::db::{DbPool, Package, PaymentRequest, Transaction, UserView};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{page_response, ListQuery};
use crate::state::AppState;

const RECENT_TRANSACTIONS: i64 = 10;
const DIRECT_REFERRALS_SHOWN: i64 = 100;

#[derive(Debug, Serialize)]
struct EarningTotal {
    earning_type: String,
    total_cents: i64,
}

#[derive(Debug, Serialize)]
struct Dashboard {
    user: UserView,
    balance_cents: i64,
    active_packages: i64,
    total_invested_cents: i64,
    total_roi_cents: i64,
    total_commission_cents: i64,
    direct_referrals: i64,
    earnings_by_type: Vec<EarningTotal>,
    packages: Vec<Package>,
    recent_transactions: Vec<Transaction>,
    unread_notifications: i64,
    next_withdrawal_at: Option<DateTime<Utc>>,
}

pub async fn me(pool: web::Data<DbPool>, user: AuthUser) -> ApiResult<HttpResponse> {
    let pool = pool.clone();
    let view = web::block(move || -> ApiResult<UserView> {
        let mut conn = pool.get()?;
        let record = users::find_by_id(&mut conn, user.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
        Ok(record.into())
    })
    .await??;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn dashboard(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    user: AuthUser,
) -> ApiResult<HttpResponse> {
    let policy: WithdrawalPolicy = state.config.withdrawal;
    let pool = pool.clone();
    let dashboard = web::block(move || -> ApiResult<Dashboard> {
        let mut conn = pool.get()?;
        let record = users::find_by_id(&mut conn, user.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
        let totals = stats::user(&mut conn, user.user_id)?;
        let earnings_by_type = earnings::totals_by_type(&mut conn, user.user_id)?
            .into_iter()
            .map(|t| EarningTotal {
                earning_type: t.earning_type,
                total_cents: t.total_cents,
            })
            .collect();
        let (recent_transactions, _) = earnings::list_transactions(
            &mut conn,
            user.user_id,
            validate::Pagination::new(Some(1), Some(RECENT_TRANSACTIONS)),
        )?;
        let next_withdrawal_at = withdrawals::last_counting_at(&mut conn, user.user_id)?
            .map(|last| policy.next_eligible_at(last))
            .filter(|at| *at > Utc::now());

        Ok(Dashboard {
            balance_cents: record.balance_cents,
            active_packages: totals.active_packages,
            total_invested_cents: totals.total_invested_cents,
            total_roi_cents: totals.total_roi_cents,
            total_commission_cents: totals.total_commission_cents,
            direct_referrals: totals.direct_referrals,
            earnings_by_type,
            packages: packages::active_for_user(&mut conn, user.user_id)?,
            recent_transactions,
            unread_notifications: notifications::unread_count(&mut conn, user.user_id)?,
            next_withdrawal_at,
            user: record.into(),
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(dashboard))
}

/// On-chain payment reference submitted by the user
#[derive(Debug, Deserialize)]
pub struct PaymentProof {
    pub network: Network,
    pub tx_hash: String,
}

/// Submit the bot activation fee for review
pub async fn activate_bot(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<PaymentProof>,
) -> ApiResult<HttpResponse> {
    let network = body.network;
    let tx_hash = validate::tx_hash(network, &body.tx_hash)?;
    let fee_cents = state.config.bot_activation_fee_cents;
    let pool = pool.clone();

    let request = web::block(move || -> ApiResult<PaymentRequest> {
        let mut conn = pool.get()?;
        let record = users::find_by_id(&mut conn, user.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
        if record.bot_active {
            return Err(ApiError::Conflict("bot already active".to_string()));
        }
        if payments::has_pending(&mut conn, user.user_id, PaymentPurpose::BotActivation)? {
            return Err(ApiError::Conflict(
                "a bot activation payment is already awaiting review".to_string(),
            ));
        }
        submit_payment(&mut conn, user.user_id, PaymentPurpose::BotActivation, fee_cents, network, tx_hash, None)
    })
    .await??;

    tracing::info!("Bot activation payment {} submitted by {}", request.id, user.user_id);
    Ok(HttpResponse::Created().json(request))
}

/// Record a pending payment request, rejecting reused transaction hashes
pub(crate) fn submit_payment(
    conn: &mut diesel::PgConnection,
    user_id: Uuid,
    purpose: PaymentPurpose,
    amount_cents: i64,
    network: Network,
    tx_hash: String,
    plan_code: Option<String>,
) -> ApiResult<PaymentRequest> {
    if payments::tx_hash_exists(conn, &tx_hash)? {
        return Err(ApiError::Conflict("transaction hash already submitted".to_string()));
    }
    let request = PaymentRequest {
        id: Uuid::new_v4(),
        user_id,
        purpose: purpose.as_str().to_string(),
        amount_cents,
        network: network.as_str().to_string(),
        tx_hash,
        plan_code,
        status: PaymentStatus::Pending.as_str().to_string(),
        review_note: None,
        reviewed_by: None,
        created_at: Utc::now(),
        reviewed_at: None,
    };
    payments::insert(conn, &request)?;
    Ok(request)
}

pub async fn list_payments(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let status = query.status::<PaymentStatus>()?;
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(payments::list(&mut conn, Some(user.user_id), status, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

pub async fn list_earnings(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let kind = query.kind::<EarningType>()?;
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(earnings::list_for_user(&mut conn, user.user_id, kind, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

pub async fn list_transactions(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(earnings::list_transactions(&mut conn, user.user_id, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

#[derive(Debug, Serialize)]
struct ReferralLevel {
    level: usize,
    rate_bps: i64,
    members: i64,
    commission_cents: i64,
}

#[derive(Debug, Serialize)]
struct DirectReferral {
    id: Uuid,
    full_name: String,
    bot_active: bool,
    joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ReferralSummary {
    referral_code: String,
    referral_link: String,
    total_commission_cents: i64,
    levels: Vec<ReferralLevel>,
    direct: Vec<DirectReferral>,
}

pub async fn referrals(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    user: AuthUser,
) -> ApiResult<HttpResponse> {
    let base_url = state.config.app_base_url.trim_end_matches('/').to_string();
    let pool = pool.clone();
    let summary = web::block(move || -> ApiResult<ReferralSummary> {
        let mut conn = pool.get()?;
        let record = users::find_by_id(&mut conn, user.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
        let counts = users::downline_counts(&mut conn, user.user_id, MAX_LEVELS)?;
        let by_level = earnings::commission_by_level(&mut conn, user.user_id)?;

        let levels: Vec<ReferralLevel> = (1..=MAX_LEVELS)
            .map(|level| ReferralLevel {
                level,
                rate_bps: referral::level_rate_bps(level).unwrap_or(0),
                members: counts.get(level - 1).copied().unwrap_or(0),
                commission_cents: by_level
                    .iter()
                    .filter(|t| t.level == Some(level as i32))
                    .map(|t| t.total_cents)
                    .sum(),
            })
            .collect();
        let direct = users::direct_referrals(&mut conn, user.user_id, DIRECT_REFERRALS_SHOWN)?
            .into_iter()
            .map(|u| DirectReferral {
                id: u.id,
                full_name: u.full_name,
                bot_active: u.bot_active,
                joined_at: u.created_at,
            })
            .collect();

        Ok(ReferralSummary {
            referral_link: format!("{}/register?ref={}", base_url, record.referral_code),
            referral_code: record.referral_code,
            total_commission_cents: by_level.iter().map(|t| t.total_cents).sum(),
            levels,
            direct,
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(summary))
}
