use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use nsccore::email::{format_usd, EmailTemplate};
use nsccore::types::{KycStatus, Network, NotificationKind, TransactionType, WithdrawalStatus};
use nsccore::validate;
use nsccore::withdrawal::WithdrawalContext;

use crate::auth::AuthUser;
use crate::db::ledger;
use crate::db::queries::{notifications, users, withdrawals};
use crate::db::{DbPool, Notification, Withdrawal};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{page_response, ListQuery};
use crate::mailer::PendingEmail;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub amount_cents: i64,
    pub network: Network,
    pub wallet_address: String,
}

pub async fn list_withdrawals(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let status = query.status::<WithdrawalStatus>()?;
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(withdrawals::list(&mut conn, Some(user.user_id), status, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

/// Request a payout; the amount leaves the balance immediately
pub async fn request_withdrawal(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<WithdrawalRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let wallet_address = validate::wallet_address(body.network, &body.wallet_address)?;
    let policy = state.config.withdrawal;
    let pool = pool.clone();

    let (withdrawal, email) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        conn.transaction::<_, ApiError, _>(|conn| {
            let record = users::lock(conn, user.user_id)?;
            let now = Utc::now();
            let quote = policy.check(
                body.amount_cents,
                &WithdrawalContext {
                    balance_cents: record.balance_cents,
                    kyc_status: record.kyc_status.parse::<KycStatus>()?,
                    last_withdrawal_at: withdrawals::last_counting_at(conn, user.user_id)?,
                    now,
                },
            )?;

            let withdrawal = Withdrawal {
                id: Uuid::new_v4(),
                user_id: user.user_id,
                amount_cents: quote.amount_cents,
                fee_cents: quote.fee_cents,
                net_amount_cents: quote.net_amount_cents,
                network: body.network.as_str().to_string(),
                wallet_address,
                status: WithdrawalStatus::Pending.as_str().to_string(),
                tx_hash: None,
                review_note: None,
                reviewed_by: None,
                created_at: now,
                reviewed_at: None,
                completed_at: None,
            };
            withdrawals::insert(conn, &withdrawal)?;
            ledger::debit(
                conn,
                user.user_id,
                TransactionType::WithdrawalDebit,
                quote.amount_cents,
                Some(withdrawal.id),
                "Withdrawal request",
            )?;
            users::set_last_withdrawal(conn, user.user_id, Some(now))?;
            notifications::insert(
                conn,
                &Notification::new(
                    user.user_id,
                    NotificationKind::Withdrawal,
                    "Withdrawal requested",
                    format!(
                        "Your withdrawal of {} ({} after fees) is awaiting review.",
                        format_usd(quote.amount_cents),
                        format_usd(quote.net_amount_cents)
                    ),
                ),
            )?;

            let email = PendingEmail::new(
                &record.email,
                EmailTemplate::WithdrawalRequested {
                    name: record.full_name.clone(),
                    amount_cents: quote.amount_cents,
                    net_amount_cents: quote.net_amount_cents,
                },
            );
            Ok((withdrawal, email))
        })
    })
    .await??;

    tracing::info!(
        "💸 Withdrawal {} of {} requested by {}",
        withdrawal.id,
        withdrawal.amount_cents,
        user.user_id
    );
    state.mailer.dispatch(vec![email]);
    Ok(HttpResponse::Created().json(withdrawal))
}
