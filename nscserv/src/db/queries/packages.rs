use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use nsccore::types::PackageStatus;
use nsccore::validate::Pagination;

use crate::db::models::Package;
use crate::db::schema::packages;

// ==================== PACKAGE QUERIES ====================

pub fn insert(conn: &mut PgConnection, package: &Package) -> QueryResult<()> {
    diesel::insert_into(packages::table)
        .values(package)
        .execute(conn)?;
    Ok(())
}

pub fn list_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    page: Pagination,
) -> QueryResult<(Vec<Package>, i64)> {
    let total = packages::table
        .filter(packages::user_id.eq(user_id))
        .count()
        .get_result::<i64>(conn)?;
    let items = packages::table
        .filter(packages::user_id.eq(user_id))
        .select(Package::as_select())
        .order(packages::created_at.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}

pub fn active_for_user(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<Package>> {
    packages::table
        .filter(packages::user_id.eq(user_id))
        .filter(packages::status.eq(PackageStatus::Active.as_str()))
        .select(Package::as_select())
        .order(packages::next_roi_at.asc())
        .load(conn)
}

/// Active packages due at `now`, locked and skipping rows another worker holds
pub fn lock_due(conn: &mut PgConnection, now: DateTime<Utc>, limit: i64) -> QueryResult<Vec<Package>> {
    packages::table
        .filter(packages::status.eq(PackageStatus::Active.as_str()))
        .filter(packages::next_roi_at.le(now))
        .filter(packages::roi_paid_count.lt(packages::max_roi_payments))
        .select(Package::as_select())
        .order(packages::next_roi_at.asc())
        .limit(limit)
        .for_update()
        .skip_locked()
        .load(conn)
}

/// Record one more ROI payment; `next_roi_at` of `None` completes the package
pub fn record_payout(
    conn: &mut PgConnection,
    id: Uuid,
    paid_count: i32,
    next_roi_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> QueryResult<usize> {
    let (status, completed_at) = match next_roi_at {
        Some(_) => (PackageStatus::Active, None),
        None => (PackageStatus::Completed, Some(now)),
    };
    diesel::update(packages::table.find(id))
        .set((
            packages::roi_paid_count.eq(paid_count),
            packages::next_roi_at.eq(next_roi_at),
            packages::status.eq(status.as_str()),
            packages::completed_at.eq(completed_at),
        ))
        .execute(conn)
}
