use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use uuid::Uuid;

use nsccore::referral;
use nsccore::types::{KycStatus, UserStatus};
use nsccore::validate::Pagination;

use crate::db::models::{NewUser, User};
use crate::db::schema::users;

const REFERRAL_CODE_ATTEMPTS: usize = 16;

// ==================== USER QUERIES ====================

pub fn insert(conn: &mut PgConnection, user: &NewUser) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values(user)
        .returning(User::as_returning())
        .get_result(conn)
}

pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> QueryResult<Option<User>> {
    users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn find_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::email.eq(email))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn find_by_referral_code(conn: &mut PgConnection, code: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::referral_code.eq(code))
        .select(User::as_select())
        .first(conn)
        .optional()
}

/// Lock the user row for the rest of the current transaction
pub fn lock(conn: &mut PgConnection, id: Uuid) -> QueryResult<User> {
    users::table
        .find(id)
        .select(User::as_select())
        .for_update()
        .first(conn)
}

/// Draw referral codes until one is free
pub fn unique_referral_code(conn: &mut PgConnection) -> QueryResult<String> {
    let mut code = referral::generate_referral_code();
    for _ in 0..REFERRAL_CODE_ATTEMPTS {
        if find_by_referral_code(conn, &code)?.is_none() {
            return Ok(code);
        }
        tracing::debug!("Referral code collision on {}", code);
        code = referral::generate_referral_code();
    }
    // The unique index rejects a collision on insert.
    Ok(code)
}

pub fn set_status(conn: &mut PgConnection, id: Uuid, status: UserStatus) -> QueryResult<usize> {
    diesel::update(users::table.find(id))
        .set((
            users::status.eq(status.as_str()),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

pub fn set_kyc_status(conn: &mut PgConnection, id: Uuid, status: KycStatus) -> QueryResult<usize> {
    diesel::update(users::table.find(id))
        .set((
            users::kyc_status.eq(status.as_str()),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

pub fn set_balance(conn: &mut PgConnection, id: Uuid, balance_cents: i64) -> QueryResult<usize> {
    diesel::update(users::table.find(id))
        .set((
            users::balance_cents.eq(balance_cents),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

pub fn set_last_withdrawal(
    conn: &mut PgConnection,
    id: Uuid,
    at: Option<DateTime<Utc>>,
) -> QueryResult<usize> {
    diesel::update(users::table.find(id))
        .set(users::last_withdrawal_at.eq(at))
        .execute(conn)
}

pub fn mark_bot_active(conn: &mut PgConnection, id: Uuid, at: DateTime<Utc>) -> QueryResult<usize> {
    diesel::update(users::table.find(id))
        .set((
            users::bot_active.eq(true),
            users::bot_activated_at.eq(Some(at)),
            users::updated_at.eq(at),
        ))
        .execute(conn)
}

// ==================== PASSWORD RESET QUERIES ====================

pub fn set_password_reset(
    conn: &mut PgConnection,
    id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> QueryResult<usize> {
    diesel::update(users::table.find(id))
        .set((
            users::password_reset_hash.eq(Some(token_hash)),
            users::password_reset_expires_at.eq(Some(expires_at)),
        ))
        .execute(conn)
}

/// User holding an unexpired reset token with this hash
pub fn find_by_reset_hash(
    conn: &mut PgConnection,
    token_hash: &str,
    now: DateTime<Utc>,
) -> QueryResult<Option<User>> {
    users::table
        .filter(users::password_reset_hash.eq(token_hash))
        .filter(users::password_reset_expires_at.gt(now))
        .select(User::as_select())
        .first(conn)
        .optional()
}

/// Store a new password hash and consume any pending reset token
pub fn update_password(conn: &mut PgConnection, id: Uuid, password_hash: &str) -> QueryResult<usize> {
    diesel::update(users::table.find(id))
        .set((
            users::password_hash.eq(password_hash),
            users::password_reset_hash.eq(None::<String>),
            users::password_reset_expires_at.eq(None::<DateTime<Utc>>),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

// ==================== LISTING QUERIES ====================

fn search_filter(search: Option<&str>) -> users::BoxedQuery<'static, Pg> {
    let mut query = users::table.into_boxed();
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", term.replace('%', "\\%").replace('_', "\\_"));
        query = query.filter(
            users::email
                .ilike(pattern.clone())
                .or(users::full_name.ilike(pattern.clone()))
                .or(users::referral_code.ilike(pattern)),
        );
    }
    query
}

/// Page of users, newest first, optionally matching `search`
pub fn list(
    conn: &mut PgConnection,
    search: Option<&str>,
    page: Pagination,
) -> QueryResult<(Vec<User>, i64)> {
    let total = search_filter(search).count().get_result::<i64>(conn)?;
    let items = search_filter(search)
        .select(User::as_select())
        .order(users::created_at.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}

// ==================== REFERRAL TREE QUERIES ====================

/// Ancestors of `user_id`, nearest first, at most `depth` long
pub fn upline_chain(conn: &mut PgConnection, user_id: Uuid, depth: usize) -> QueryResult<Vec<User>> {
    let mut chain: Vec<User> = Vec::with_capacity(depth);
    let mut next = users::table
        .find(user_id)
        .select(users::referrer_id)
        .first::<Option<Uuid>>(conn)?;

    while let Some(id) = next {
        if chain.len() >= depth || id == user_id || chain.iter().any(|u| u.id == id) {
            break;
        }
        let Some(upline) = find_by_id(conn, id)? else {
            break;
        };
        next = upline.referrer_id;
        chain.push(upline);
    }
    Ok(chain)
}

pub fn direct_referrals(conn: &mut PgConnection, user_id: Uuid, limit: i64) -> QueryResult<Vec<User>> {
    users::table
        .filter(users::referrer_id.eq(user_id))
        .select(User::as_select())
        .order(users::created_at.desc())
        .limit(limit)
        .load(conn)
}

/// Number of downline members on each level below `user_id`, level 1 first
pub fn downline_counts(conn: &mut PgConnection, user_id: Uuid, depth: usize) -> QueryResult<Vec<i64>> {
    let mut counts = Vec::with_capacity(depth);
    let mut frontier = vec![user_id];
    for _ in 0..depth {
        if frontier.is_empty() {
            counts.push(0);
            continue;
        }
        let next: Vec<Uuid> = users::table
            .filter(users::referrer_id.eq_any(frontier.clone()))
            .select(users::id)
            .load(conn)?;
        counts.push(next.len() as i64);
        frontier = next;
    }
    Ok(counts)
}
