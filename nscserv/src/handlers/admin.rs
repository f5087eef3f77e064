//! Admin endpoints under `/api/admin`.
//!
//! Every review action is audited with the acting admin and client address.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use nsccore::email::{format_usd, EmailTemplate};
use nsccore::types::{
    KycStatus, Network, NotificationKind, PaymentStatus, TransactionType, UserStatus,
    WithdrawalStatus,
};
use nsccore::validate;

use crate::auth::{client_ip, AdminUser};
use crate::db::ledger::{self, ApprovalOutcome};
use crate::db::queries::{audit, kyc, notifications, payments, sessions, stats, users, withdrawals};
use crate::db::{AuditLog, DbPool, Notification, UserView, Withdrawal};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{page_response, parse_id, ListQuery, ReviewRequest};
use crate::jobs::roi;
use crate::mailer::PendingEmail;
use crate::state::AppState;

fn audit_entry(admin: &AdminUser, req: &HttpRequest, event: &str, data: serde_json::Value) -> AuditLog {
    AuditLog::new(Some(admin.0.user_id), event, data).with_ip(client_ip(req))
}

// ==================== STATISTICS ====================

pub async fn stats(pool: web::Data<DbPool>, _admin: AdminUser) -> ApiResult<HttpResponse> {
    let pool = pool.clone();
    let stats = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(stats::platform(&mut conn)?)
    })
    .await??;
    Ok(HttpResponse::Ok().json(stats))
}

pub async fn audit_logs(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(audit::list(&mut conn, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

// ==================== USERS ====================

pub async fn list_users(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.pagination();
    let search = query.search.clone();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(users::list(&mut conn, search.as_deref(), page)?)
    })
    .await??;
    let items: Vec<UserView> = items.into_iter().map(UserView::from).collect();
    Ok(page_response(items, page, total))
}

#[derive(Debug, Deserialize)]
pub struct UserStatusRequest {
    pub status: UserStatus,
}

/// Suspend or reactivate an account; suspension revokes its sessions
pub async fn set_user_status(
    pool: web::Data<DbPool>,
    admin: AdminUser,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UserStatusRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = parse_id(&path, "user")?;
    if user_id == admin.0.user_id {
        return Err(ApiError::BadRequest("cannot change your own status".to_string()));
    }
    let status = body.status;
    let entry = audit_entry(
        &admin,
        &req,
        "user_status",
        serde_json::json!({ "user_id": user_id, "status": status }),
    );
    let pool = pool.clone();

    let user = web::block(move || -> ApiResult<UserView> {
        let mut conn = pool.get()?;
        let now = Utc::now();
        let user = conn.transaction::<_, ApiError, _>(|conn| {
            users::lock(conn, user_id)?;
            users::set_status(conn, user_id, status)?;
            if status == UserStatus::Suspended {
                let revoked = sessions::revoke_all_for_user(conn, user_id, now)?;
                tracing::info!("Revoked {} session(s) of suspended user {}", revoked, user_id);
            }
            users::find_by_id(conn, user_id)?.ok_or_else(|| ApiError::not_found("user"))
        })?;
        audit::record(&mut conn, entry);
        Ok(user.into())
    })
    .await??;

    tracing::info!("User {} set to {} by {}", user_id, status, admin.0.user_id);
    Ok(HttpResponse::Ok().json(user))
}

// ==================== PAYMENT REQUESTS ====================

pub async fn list_payments(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let status = query.status::<PaymentStatus>()?;
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(payments::list(&mut conn, None, status, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

/// Approve a payment and activate what it pays for
pub async fn approve_payment(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let payment_id = parse_id(&path, "payment")?;
    let reviewer = admin.0.user_id;
    let ip = client_ip(&req);
    let pool = pool.clone();

    let (payment, outcome, emails) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        let approved = conn.transaction::<_, ApiError, _>(|conn| {
            ledger::approve_payment(conn, payment_id, reviewer, Utc::now())
        })?;
        audit::record(
            &mut conn,
            AuditLog::new(
                Some(reviewer),
                "payment_approve",
                serde_json::json!({
                    "payment_id": payment_id,
                    "purpose": approved.0.purpose,
                    "amount_cents": approved.0.amount_cents,
                }),
            )
            .with_ip(ip),
        );
        Ok(approved)
    })
    .await??;

    state.mailer.dispatch(emails);
    let activation = match outcome {
        ApprovalOutcome::Bot(bot) => serde_json::json!({ "bot_activation": bot }),
        ApprovalOutcome::Package(pkg) => serde_json::json!({
            "package": pkg.package,
            "commissions_paid": pkg.commissions.len(),
            "commission_total_cents": pkg.commissions.iter().map(|c| c.amount_cents).sum::<i64>(),
        }),
    };
    tracing::info!("✅ Payment {} approved by {}", payment.id, reviewer);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "payment": payment,
        "activation": activation,
    })))
}

pub async fn reject_payment(
    pool: web::Data<DbPool>,
    admin: AdminUser,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<ReviewRequest>>,
) -> ApiResult<HttpResponse> {
    let payment_id = parse_id(&path, "payment")?;
    let note = body.map(|b| b.note()).transpose()?.flatten();
    let reviewer = admin.0.user_id;
    let entry = audit_entry(
        &admin,
        &req,
        "payment_reject",
        serde_json::json!({ "payment_id": payment_id, "note": note }),
    );
    let pool = pool.clone();

    let payment = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        let payment = conn.transaction::<_, ApiError, _>(|conn| {
            let pending = payments::lock(conn, payment_id)?;
            if pending.status != PaymentStatus::Pending.as_str() {
                return Err(ApiError::Conflict(format!(
                    "payment request already {}",
                    pending.status
                )));
            }
            let payment = payments::mark_reviewed(
                conn,
                payment_id,
                PaymentStatus::Rejected,
                reviewer,
                note.as_deref(),
                Utc::now(),
            )?;
            let reason = note.as_deref().map(|n| format!(" Reason: {n}")).unwrap_or_default();
            notifications::insert(
                conn,
                &Notification::new(
                    payment.user_id,
                    NotificationKind::Payment,
                    "Payment rejected",
                    format!(
                        "Your payment of {} could not be verified.{}",
                        format_usd(payment.amount_cents),
                        reason
                    ),
                ),
            )?;
            Ok(payment)
        })?;
        audit::record(&mut conn, entry);
        Ok(payment)
    })
    .await??;

    tracing::info!("Payment {} rejected by {}", payment.id, reviewer);
    Ok(HttpResponse::Ok().json(payment))
}

// ==================== WITHDRAWALS ====================

pub async fn list_withdrawals(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let status = query.status::<WithdrawalStatus>()?;
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(withdrawals::list(&mut conn, None, status, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteWithdrawalRequest {
    pub tx_hash: String,
}

/// Requested change to a withdrawal
enum WithdrawalAction {
    Approve,
    Reject(Option<String>),
    Complete(String),
}

impl WithdrawalAction {
    fn target(&self) -> WithdrawalStatus {
        match self {
            WithdrawalAction::Approve => WithdrawalStatus::Approved,
            WithdrawalAction::Reject(_) => WithdrawalStatus::Rejected,
            WithdrawalAction::Complete(_) => WithdrawalStatus::Completed,
        }
    }
}

/// Apply `action` to a withdrawal inside one transaction.
///
/// Rejection refunds the full amount and releases the cooldown.
fn transition_withdrawal(
    conn: &mut PgConnection,
    id: Uuid,
    action: &WithdrawalAction,
    reviewer: Uuid,
) -> ApiResult<(Withdrawal, PendingEmail)> {
    let current = withdrawals::lock(conn, id)?;
    let from: WithdrawalStatus = current.status.parse()?;
    let to = action.target();
    if !from.can_transition_to(to) {
        return Err(ApiError::Conflict(format!("withdrawal is {from}, cannot become {to}")));
    }

    let now = Utc::now();
    let (note, tx_hash) = match action {
        WithdrawalAction::Approve => (None, None),
        WithdrawalAction::Reject(note) => (note.as_deref(), None),
        WithdrawalAction::Complete(raw) => {
            let network: Network = current.network.parse()?;
            (None, Some(validate::tx_hash(network, raw)?))
        }
    };
    let updated = withdrawals::update_status(conn, id, to, reviewer, note, tx_hash.as_deref(), now)?;

    if to == WithdrawalStatus::Rejected {
        ledger::credit(
            conn,
            updated.user_id,
            TransactionType::WithdrawalRefund,
            updated.amount_cents,
            Some(updated.id),
            "Withdrawal rejected, amount refunded",
        )?;
        let last = withdrawals::last_counting_at(conn, updated.user_id)?;
        users::set_last_withdrawal(conn, updated.user_id, last)?;
    }

    let message = match to {
        WithdrawalStatus::Approved => format!(
            "Your withdrawal of {} was approved and will be paid shortly.",
            format_usd(updated.net_amount_cents)
        ),
        WithdrawalStatus::Rejected => format!(
            "Your withdrawal of {} was rejected and the amount returned to your balance.",
            format_usd(updated.amount_cents)
        ),
        _ => format!(
            "Your withdrawal of {} was sent to {}.",
            format_usd(updated.net_amount_cents),
            updated.wallet_address
        ),
    };
    notifications::insert(
        conn,
        &Notification::new(updated.user_id, NotificationKind::Withdrawal, "Withdrawal update", message),
    )?;

    let owner = users::find_by_id(conn, updated.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
    let email = PendingEmail::new(
        &owner.email,
        EmailTemplate::WithdrawalStatusChanged {
            name: owner.full_name,
            status: to,
            amount_cents: updated.amount_cents,
            note: updated.review_note.clone(),
        },
    );
    Ok((updated, email))
}

async fn review_withdrawal(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
    id: Uuid,
    action: WithdrawalAction,
) -> ApiResult<HttpResponse> {
    let reviewer = admin.0.user_id;
    let to = action.target();
    let entry = audit_entry(
        &admin,
        &req,
        &format!("withdrawal_{to}"),
        serde_json::json!({ "withdrawal_id": id }),
    );
    let pool = pool.clone();

    let (withdrawal, email) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        let reviewed = conn.transaction::<_, ApiError, _>(|conn| {
            transition_withdrawal(conn, id, &action, reviewer)
        })?;
        audit::record(&mut conn, entry);
        Ok(reviewed)
    })
    .await??;

    tracing::info!("Withdrawal {} {} by {}", withdrawal.id, to, reviewer);
    state.mailer.dispatch(vec![email]);
    Ok(HttpResponse::Ok().json(withdrawal))
}

pub async fn approve_withdrawal(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path, "withdrawal")?;
    review_withdrawal(pool, state, admin, req, id, WithdrawalAction::Approve).await
}

pub async fn reject_withdrawal(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<ReviewRequest>>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path, "withdrawal")?;
    let note = body.map(|b| b.note()).transpose()?.flatten();
    review_withdrawal(pool, state, admin, req, id, WithdrawalAction::Reject(note)).await
}

pub async fn complete_withdrawal(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<CompleteWithdrawalRequest>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path, "withdrawal")?;
    let tx_hash = body.into_inner().tx_hash;
    review_withdrawal(pool, state, admin, req, id, WithdrawalAction::Complete(tx_hash)).await
}

// ==================== KYC ====================

pub async fn list_kyc(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let status = query.status::<KycStatus>()?;
    let page = query.pagination();
    let pool = pool.clone();
    let (items, total) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        Ok(kyc::list(&mut conn, status, page)?)
    })
    .await??;
    Ok(page_response(items, page, total))
}

async fn review_kyc(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
    id: Uuid,
    decision: KycStatus,
    note: Option<String>,
) -> ApiResult<HttpResponse> {
    let reviewer = admin.0.user_id;
    let entry = audit_entry(
        &admin,
        &req,
        &format!("kyc_{decision}"),
        serde_json::json!({ "submission_id": id, "note": note }),
    );
    let pool = pool.clone();

    let (submission, email) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        let reviewed = conn.transaction::<_, ApiError, _>(|conn| {
            let current = kyc::lock(conn, id)?;
            if current.status != KycStatus::Pending.as_str() {
                return Err(ApiError::Conflict(format!("KYC submission already {}", current.status)));
            }
            let submission = kyc::mark_reviewed(conn, id, decision, reviewer, note.as_deref(), Utc::now())?;
            users::set_kyc_status(conn, submission.user_id, decision)?;

            let message = match decision {
                KycStatus::Approved => "Your identity is verified. Withdrawals are now available.".to_string(),
                _ => match note.as_deref() {
                    Some(n) => format!("Your KYC submission was rejected: {n}"),
                    None => "Your KYC submission was rejected. Please submit again.".to_string(),
                },
            };
            notifications::insert(
                conn,
                &Notification::new(submission.user_id, NotificationKind::Kyc, "KYC review", message),
            )?;

            let owner = users::find_by_id(conn, submission.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
            let email = PendingEmail::new(
                &owner.email,
                EmailTemplate::KycStatusChanged {
                    name: owner.full_name,
                    status: decision,
                    note: note.clone(),
                },
            );
            Ok((submission, email))
        })?;
        audit::record(&mut conn, entry);
        Ok(reviewed)
    })
    .await??;

    tracing::info!("KYC {} {} by {}", submission.id, decision, reviewer);
    state.mailer.dispatch(vec![email]);
    Ok(HttpResponse::Ok().json(submission))
}

pub async fn approve_kyc(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path, "KYC submission")?;
    review_kyc(pool, state, admin, req, id, KycStatus::Approved, None).await
}

pub async fn reject_kyc(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<ReviewRequest>>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path, "KYC submission")?;
    let note = body.map(|b| b.note()).transpose()?.flatten();
    review_kyc(pool, state, admin, req, id, KycStatus::Rejected, note).await
}

// ==================== ROI ====================

/// Trigger a ROI distribution now instead of waiting for the scheduler
pub async fn run_roi(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    admin: AdminUser,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let outcome = roi::run(
        pool.get_ref().clone(),
        state.mailer.clone(),
        state.config.roi_batch_size,
    )
    .await?;

    let entry = audit_entry(&admin, &req, "roi_run", serde_json::to_value(&outcome).unwrap_or_default());
    let pool = pool.clone();
    web::block(move || -> ApiResult<()> {
        let mut conn = pool.get()?;
        audit::record(&mut conn, entry);
        Ok(())
    })
    .await??;

    tracing::info!("ROI run triggered by {}: {:?}", admin.0.user_id, outcome);
    Ok(HttpResponse::Ok().json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::{header, StatusCode};
    use actix_web::App;
    use actix_web::test::{call_service, init_service, TestRequest};
    use chrono::Duration;
    use diesel::r2d2::{ConnectionManager, Pool};
    use nsccore::token::TokenSubject;
    use nsccore::types::UserRole;

    use crate::auth::tests::test_state;
    use crate::db::testing;

    #[actix_web::test]
    async fn test_admin_routes_reject_regular_users() {
        let state = test_state();
        let token = state
            .tokens
            .issue_access(&TokenSubject {
                user_id: Uuid::new_v4(),
                session_id: Uuid::new_v4(),
                role: UserRole::User,
            })
            .unwrap();
        let manager = ConnectionManager::<PgConnection>::new("postgres://localhost/nsc_test");
        let app = init_service(
            App::new()
                .app_data(web::Data::new(Pool::builder().build_unchecked(manager)))
                .app_data(state)
                .route("/api/admin/stats", web::get().to(stats))
                .route("/api/admin/roi/run", web::post().to(run_roi)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/api/admin/stats")
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::post().uri("/api/admin/roi/run").to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_withdrawal_action_targets() {
        assert_eq!(WithdrawalAction::Approve.target(), WithdrawalStatus::Approved);
        assert_eq!(WithdrawalAction::Reject(None).target(), WithdrawalStatus::Rejected);
        assert_eq!(
            WithdrawalAction::Complete("ab".repeat(32)).target(),
            WithdrawalStatus::Completed
        );
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_reject_refunds_and_recomputes_cooldown() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let reviewer = testing::user(conn, 0, false);
        let owner = testing::user(conn, 0, true);
        let now = testing::now();

        let paid = testing::withdrawal(conn, owner.id, 2_000, WithdrawalStatus::Completed, now - Duration::days(40));
        testing::withdrawal(conn, owner.id, 1_500, WithdrawalStatus::Rejected, now - Duration::days(5));
        let pending = testing::withdrawal(conn, owner.id, 3_000, WithdrawalStatus::Pending, now);
        users::set_last_withdrawal(conn, owner.id, Some(pending.created_at)).unwrap();

        let action = WithdrawalAction::Reject(Some("wallet mismatch".to_string()));
        let (rejected, email) = transition_withdrawal(conn, pending.id, &action, reviewer.id).unwrap();
        assert_eq!(rejected.status, "rejected");
        assert_eq!(rejected.review_note.as_deref(), Some("wallet mismatch"));
        assert_eq!(email.to, owner.email);

        let owner_now = testing::reload_user(conn, owner.id);
        assert_eq!(owner_now.balance_cents, 3_000);
        assert_eq!(owner_now.last_withdrawal_at, Some(paid.created_at));

        let err = transition_withdrawal(conn, pending.id, &action, reviewer.id).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(testing::reload_user(conn, owner.id).balance_cents, 3_000);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_reject_only_withdrawal_clears_cooldown() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let reviewer = testing::user(conn, 0, false);
        let owner = testing::user(conn, 0, true);
        let pending = testing::withdrawal(conn, owner.id, 5_000, WithdrawalStatus::Pending, testing::now());
        users::set_last_withdrawal(conn, owner.id, Some(pending.created_at)).unwrap();

        transition_withdrawal(conn, pending.id, &WithdrawalAction::Reject(None), reviewer.id).unwrap();

        let owner_now = testing::reload_user(conn, owner.id);
        assert_eq!(owner_now.balance_cents, 5_000);
        assert_eq!(owner_now.last_withdrawal_at, None);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_complete_checks_hash_against_withdrawal_network() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let reviewer = testing::user(conn, 0, false);
        let owner = testing::user(conn, 0, true);
        let pending = testing::withdrawal(conn, owner.id, 5_000, WithdrawalStatus::Pending, testing::now());

        transition_withdrawal(conn, pending.id, &WithdrawalAction::Approve, reviewer.id).unwrap();
        // A TRC20-style hash on a BEP20 withdrawal.
        let err = transition_withdrawal(conn, pending.id, &WithdrawalAction::Complete("ab".repeat(32)), reviewer.id)
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let hash = format!("0x{}", "cd".repeat(32));
        let (done, _) = transition_withdrawal(conn, pending.id, &WithdrawalAction::Complete(hash.clone()), reviewer.id)
            .unwrap();
        assert_eq!(done.status, "completed");
        assert_eq!(done.tx_hash, Some(hash));
    }
}
