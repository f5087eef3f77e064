use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use uuid::Uuid;

use nsccore::types::{PaymentPurpose, PaymentStatus};
use nsccore::validate::Pagination;

use crate::db::models::PaymentRequest;
use crate::db::schema::payment_requests;

// ==================== PAYMENT REQUEST QUERIES ====================

pub fn insert(conn: &mut PgConnection, request: &PaymentRequest) -> QueryResult<()> {
    diesel::insert_into(payment_requests::table)
        .values(request)
        .execute(conn)?;
    Ok(())
}

pub fn lock(conn: &mut PgConnection, id: Uuid) -> QueryResult<PaymentRequest> {
    payment_requests::table
        .find(id)
        .select(PaymentRequest::as_select())
        .for_update()
        .first(conn)
}

pub fn tx_hash_exists(conn: &mut PgConnection, tx_hash: &str) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        payment_requests::table.filter(payment_requests::tx_hash.eq(tx_hash)),
    ))
    .get_result(conn)
}

/// Whether the user already has a bot-activation payment awaiting review
pub fn has_pending(conn: &mut PgConnection, user_id: Uuid, purpose: PaymentPurpose) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        payment_requests::table
            .filter(payment_requests::user_id.eq(user_id))
            .filter(payment_requests::purpose.eq(purpose.as_str()))
            .filter(payment_requests::status.eq(PaymentStatus::Pending.as_str())),
    ))
    .get_result(conn)
}

pub fn mark_reviewed(
    conn: &mut PgConnection,
    id: Uuid,
    status: PaymentStatus,
    reviewer: Uuid,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> QueryResult<PaymentRequest> {
    diesel::update(payment_requests::table.find(id))
        .set((
            payment_requests::status.eq(status.as_str()),
            payment_requests::reviewed_by.eq(Some(reviewer)),
            payment_requests::review_note.eq(note),
            payment_requests::reviewed_at.eq(Some(now)),
        ))
        .returning(PaymentRequest::as_returning())
        .get_result(conn)
}

fn filtered(user_id: Option<Uuid>, status: Option<PaymentStatus>) -> payment_requests::BoxedQuery<'static, Pg> {
    let mut query = payment_requests::table.into_boxed();
    if let Some(user_id) = user_id {
        query = query.filter(payment_requests::user_id.eq(user_id));
    }
    if let Some(status) = status {
        query = query.filter(payment_requests::status.eq(status.as_str()));
    }
    query
}

/// Page of payment requests, newest first
pub fn list(
    conn: &mut PgConnection,
    user_id: Option<Uuid>,
    status: Option<PaymentStatus>,
    page: Pagination,
) -> QueryResult<(Vec<PaymentRequest>, i64)> {
    let total = filtered(user_id, status).count().get_result::<i64>(conn)?;
    let items = filtered(user_id, status)
        .select(PaymentRequest::as_select())
        .order(payment_requests::created_at.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}
