use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use uuid::Uuid;

use nsccore::types::WithdrawalStatus;
use nsccore::validate::Pagination;

use crate::db::models::Withdrawal;
use crate::db::schema::withdrawals;

// ==================== WITHDRAWAL QUERIES ====================

pub fn insert(conn: &mut PgConnection, withdrawal: &Withdrawal) -> QueryResult<()> {
    diesel::insert_into(withdrawals::table)
        .values(withdrawal)
        .execute(conn)?;
    Ok(())
}

pub fn lock(conn: &mut PgConnection, id: Uuid) -> QueryResult<Withdrawal> {
    withdrawals::table
        .find(id)
        .select(Withdrawal::as_select())
        .for_update()
        .first(conn)
}

/// Creation time of the user's latest withdrawal that still counts against the cooldown
pub fn last_counting_at(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<DateTime<Utc>>> {
    let counting: Vec<&str> = WithdrawalStatus::ALL
        .iter()
        .filter(|s| s.counts_against_cooldown())
        .map(|s| s.as_str())
        .collect();
    withdrawals::table
        .filter(withdrawals::user_id.eq(user_id))
        .filter(withdrawals::status.eq_any(counting))
        .select(diesel::dsl::max(withdrawals::created_at))
        .first(conn)
}

/// Move a withdrawal to `status`, stamping the review or completion fields
pub fn update_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: WithdrawalStatus,
    reviewer: Uuid,
    note: Option<&str>,
    tx_hash: Option<&str>,
    now: DateTime<Utc>,
) -> QueryResult<Withdrawal> {
    let completed_at = (status == WithdrawalStatus::Completed).then_some(now);
    diesel::update(withdrawals::table.find(id))
        .set((
            withdrawals::status.eq(status.as_str()),
            withdrawals::reviewed_by.eq(Some(reviewer)),
            withdrawals::review_note.eq(note),
            withdrawals::reviewed_at.eq(Some(now)),
            withdrawals::tx_hash.eq(tx_hash),
            withdrawals::completed_at.eq(completed_at),
        ))
        .returning(Withdrawal::as_returning())
        .get_result(conn)
}

fn filtered(user_id: Option<Uuid>, status: Option<WithdrawalStatus>) -> withdrawals::BoxedQuery<'static, Pg> {
    let mut query = withdrawals::table.into_boxed();
    if let Some(user_id) = user_id {
        query = query.filter(withdrawals::user_id.eq(user_id));
    }
    if let Some(status) = status {
        query = query.filter(withdrawals::status.eq(status.as_str()));
    }
    query
}

pub fn list(
    conn: &mut PgConnection,
    user_id: Option<Uuid>,
    status: Option<WithdrawalStatus>,
    page: Pagination,
) -> QueryResult<(Vec<Withdrawal>, i64)> {
    let total = filtered(user_id, status).count().get_result::<i64>(conn)?;
    let items = filtered(user_id, status)
        .select(Withdrawal::as_select())
        .order(withdrawals::created_at.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::db::testing;

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_last_counting_ignores_rejected() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let owner = testing::user(conn, 0, true);
        let now = testing::now();
        assert_eq!(last_counting_at(conn, owner.id).unwrap(), None);

        let approved = testing::withdrawal(conn, owner.id, 2_000, WithdrawalStatus::Approved, now - Duration::days(10));
        testing::withdrawal(conn, owner.id, 2_000, WithdrawalStatus::Rejected, now - Duration::days(2));
        assert_eq!(last_counting_at(conn, owner.id).unwrap(), Some(approved.created_at));

        let pending = testing::withdrawal(conn, owner.id, 2_000, WithdrawalStatus::Pending, now);
        assert_eq!(last_counting_at(conn, owner.id).unwrap(), Some(pending.created_at));

        let (items, total) = list(conn, Some(owner.id), Some(WithdrawalStatus::Rejected), Pagination::new(None, None)).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].status, "rejected");
    }
}
