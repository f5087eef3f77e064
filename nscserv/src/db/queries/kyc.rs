use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use uuid::Uuid;

use nsccore::types::KycStatus;
use nsccore::validate::Pagination;

use crate::db::models::KycSubmission;
use crate::db::schema::kyc_submissions;

// ==================== KYC QUERIES ====================

pub fn insert(conn: &mut PgConnection, submission: &KycSubmission) -> QueryResult<()> {
    diesel::insert_into(kyc_submissions::table)
        .values(submission)
        .execute(conn)?;
    Ok(())
}

pub fn latest_for_user(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<KycSubmission>> {
    kyc_submissions::table
        .filter(kyc_submissions::user_id.eq(user_id))
        .select(KycSubmission::as_select())
        .order(kyc_submissions::created_at.desc())
        .first(conn)
        .optional()
}

pub fn lock(conn: &mut PgConnection, id: Uuid) -> QueryResult<KycSubmission> {
    kyc_submissions::table
        .find(id)
        .select(KycSubmission::as_select())
        .for_update()
        .first(conn)
}

pub fn mark_reviewed(
    conn: &mut PgConnection,
    id: Uuid,
    status: KycStatus,
    reviewer: Uuid,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> QueryResult<KycSubmission> {
    diesel::update(kyc_submissions::table.find(id))
        .set((
            kyc_submissions::status.eq(status.as_str()),
            kyc_submissions::reviewed_by.eq(Some(reviewer)),
            kyc_submissions::review_note.eq(note),
            kyc_submissions::reviewed_at.eq(Some(now)),
        ))
        .returning(KycSubmission::as_returning())
        .get_result(conn)
}

fn filtered(status: Option<KycStatus>) -> kyc_submissions::BoxedQuery<'static, Pg> {
    let mut query = kyc_submissions::table.into_boxed();
    if let Some(status) = status {
        query = query.filter(kyc_submissions::status.eq(status.as_str()));
    }
    query
}

pub fn list(
    conn: &mut PgConnection,
    status: Option<KycStatus>,
    page: Pagination,
) -> QueryResult<(Vec<KycSubmission>, i64)> {
    let total = filtered(status).count().get_result::<i64>(conn)?;
    let items = filtered(status)
        .select(KycSubmission::as_select())
        .order(kyc_submissions::created_at.asc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}
