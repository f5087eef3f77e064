use diesel::pg::Pg;
use diesel::prelude::*;
use uuid::Uuid;

use nsccore::validate::Pagination;

use crate::db::models::Notification;
use crate::db::schema::notifications;

// ==================== NOTIFICATION QUERIES ====================

pub fn insert(conn: &mut PgConnection, notification: &Notification) -> QueryResult<()> {
    diesel::insert_into(notifications::table)
        .values(notification)
        .execute(conn)?;
    Ok(())
}

fn filtered(user_id: Uuid, unread_only: bool) -> notifications::BoxedQuery<'static, Pg> {
    let mut query = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .into_boxed();
    if unread_only {
        query = query.filter(notifications::is_read.eq(false));
    }
    query
}

pub fn list_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    unread_only: bool,
    page: Pagination,
) -> QueryResult<(Vec<Notification>, i64)> {
    let total = filtered(user_id, unread_only).count().get_result::<i64>(conn)?;
    let items = filtered(user_id, unread_only)
        .select(Notification::as_select())
        .order(notifications::created_at.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}

pub fn unread_count(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<i64> {
    filtered(user_id, true).count().get_result(conn)
}

/// Returns the number of rows touched; 0 when the id is not the user's
pub fn mark_read(conn: &mut PgConnection, user_id: Uuid, id: Uuid) -> QueryResult<usize> {
    diesel::update(
        notifications::table
            .find(id)
            .filter(notifications::user_id.eq(user_id)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)
}

pub fn mark_all_read(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<usize> {
    diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)
}
