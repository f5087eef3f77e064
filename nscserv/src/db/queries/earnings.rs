use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Integer, Text};
use uuid::Uuid;

use nsccore::types::EarningType;
use nsccore::validate::Pagination;

use crate::db::models::{Earning, Transaction};
use crate::db::schema::{earnings, transactions};

#[derive(QueryableByName, Debug, Clone)]
pub struct TypeTotal {
    #[diesel(sql_type = Text)]
    pub earning_type: String,
    #[diesel(sql_type = BigInt)]
    pub total_cents: i64,
}

#[derive(QueryableByName, Debug, Clone)]
pub struct LevelTotal {
    #[diesel(sql_type = Nullable<Integer>)]
    pub level: Option<i32>,
    #[diesel(sql_type = BigInt)]
    pub total_cents: i64,
}

// ==================== EARNING QUERIES ====================

pub fn insert(conn: &mut PgConnection, earning: &Earning) -> QueryResult<()> {
    diesel::insert_into(earnings::table)
        .values(earning)
        .execute(conn)?;
    Ok(())
}

fn filtered(user_id: Uuid, earning_type: Option<EarningType>) -> earnings::BoxedQuery<'static, Pg> {
    let mut query = earnings::table
        .filter(earnings::user_id.eq(user_id))
        .into_boxed();
    if let Some(kind) = earning_type {
        query = query.filter(earnings::earning_type.eq(kind.as_str()));
    }
    query
}

pub fn list_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    earning_type: Option<EarningType>,
    page: Pagination,
) -> QueryResult<(Vec<Earning>, i64)> {
    let total = filtered(user_id, earning_type).count().get_result::<i64>(conn)?;
    let items = filtered(user_id, earning_type)
        .select(Earning::as_select())
        .order(earnings::created_at.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}

pub fn totals_by_type(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<TypeTotal>> {
    diesel::sql_query(
        "SELECT earning_type, COALESCE(SUM(amount_cents), 0)::BIGINT AS total_cents
         FROM earnings WHERE user_id = $1
         GROUP BY earning_type ORDER BY earning_type",
    )
    .bind::<diesel::sql_types::Uuid, _>(user_id)
    .load(conn)
}

/// Referral commission earned by `user_id`, per level
pub fn commission_by_level(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<LevelTotal>> {
    diesel::sql_query(
        "SELECT level, COALESCE(SUM(amount_cents), 0)::BIGINT AS total_cents
         FROM earnings WHERE user_id = $1 AND earning_type = $2
         GROUP BY level ORDER BY level",
    )
    .bind::<diesel::sql_types::Uuid, _>(user_id)
    .bind::<Text, _>(EarningType::ReferralCommission.as_str())
    .load(conn)
}

// ==================== TRANSACTION QUERIES ====================

pub fn insert_transaction(conn: &mut PgConnection, tx: &Transaction) -> QueryResult<()> {
    diesel::insert_into(transactions::table)
        .values(tx)
        .execute(conn)?;
    Ok(())
}

pub fn list_transactions(
    conn: &mut PgConnection,
    user_id: Uuid,
    page: Pagination,
) -> QueryResult<(Vec<Transaction>, i64)> {
    let total = transactions::table
        .filter(transactions::user_id.eq(user_id))
        .count()
        .get_result::<i64>(conn)?;
    let items = transactions::table
        .filter(transactions::user_id.eq(user_id))
        .select(Transaction::as_select())
        .order(transactions::created_at.desc())
        .limit(page.limit)
        .offset(page.offset())
        .load(conn)?;
    Ok((items, total))
}
