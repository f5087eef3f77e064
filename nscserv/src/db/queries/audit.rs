use diesel::prelude::*;

use nsccore::validate::Pagination;

use crate::db::models::AuditLog;
use crate::db::schema::audit_logs;

// ==================== AUDIT LOG QUERIES ====================

pub fn insert(conn: &mut PgConnection, log: &AuditLog) -> QueryResult<()> {
    diesel::insert_into(audit_logs::table)
        .values(log)
        .execute(conn)?;
    Ok(())
}

/// Insert an audit row, logging instead of failing the caller
pub fn record(conn: &mut PgConnection, log: AuditLog) {
    if let Err(e) = insert(conn, &log) {
        tracing::error!("Failed to save audit log {}: {:?}", log.event_type, e);
    }
}

pub fn list(conn: &mut PgConnection, page: Pagination) -> QueryResult<(Vec<AuditLog>, i64)> {
    let total = audit_logs::table.count().get_result::<i64>(conn)?;
    let items = audit_logs::table
        .select(AuditLog::as_select())
        .order(audit_logs::created_at.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}
