//! PostgreSQL fixtures for database tests.
//!
//! Tests using these are `#[ignore]`d and need `DATABASE_URL` pointing at a
//! scratch database:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/nsc_test cargo test -p nscserv -- --ignored
//! ```
//!
//! Every [`TestDb`] works inside a transaction that is rolled back when its
//! connection closes, and tests holding one run one at a time because the ROI
//! advisory lock and `FOR UPDATE` selects are shared across connections.

use std::sync::{Mutex, MutexGuard, Once};

use chrono::{DateTime, SubsecRound, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, TestCustomizer};
use uuid::Uuid;

use nsccore::roi;
use nsccore::types::{
    KycStatus, Network, PackageStatus, PaymentPurpose, PaymentStatus, UserRole, UserStatus,
    WithdrawalStatus,
};

use crate::db::init::{self, DbPool};
use crate::db::models::{NewUser, Package, PaymentRequest, User, Withdrawal};
use crate::db::queries::{packages, payments, users, withdrawals};

static SERIAL: Mutex<()> = Mutex::new(());
static MIGRATE: Once = Once::new();

/// Connection inside a rolled-back transaction. Field order matters: the
/// connection closes before the next test may start.
pub struct TestDb {
    pub conn: PgConnection,
    _serial: MutexGuard<'static, ()>,
}

/// Plain connection to `DATABASE_URL`
pub fn connect() -> PgConnection {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must name a scratch database");
    PgConnection::establish(&url).expect("connect to DATABASE_URL")
}

pub fn open() -> TestDb {
    let serial = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    MIGRATE.call_once(|| init::migrate(&mut connect()).expect("create schema"));

    let mut conn = connect();
    conn.begin_test_transaction().expect("begin test transaction");
    TestDb { conn, _serial: serial }
}

/// One-connection pool for handler tests; nothing it writes is committed.
pub struct TestPool {
    pub pool: DbPool,
    _serial: MutexGuard<'static, ()>,
}

pub fn pool() -> TestPool {
    let serial = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    MIGRATE.call_once(|| init::migrate(&mut connect()).expect("create schema"));

    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must name a scratch database");
    let pool = Pool::builder()
        .max_size(1)
        .connection_customizer(Box::new(TestCustomizer))
        .build(ConnectionManager::<PgConnection>::new(url))
        .expect("build test pool");
    TestPool { pool, _serial: serial }
}

/// Current time at PostgreSQL precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn hex64() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn user(conn: &mut PgConnection, balance_cents: i64, bot_active: bool) -> User {
    let id = Uuid::new_v4();
    let at = now();
    let referral_code = users::unique_referral_code(conn).expect("referral code");
    users::insert(
        conn,
        &NewUser {
            id,
            email: format!("{}@nsc.test", id.simple()),
            password_hash: "$argon2id$test".to_string(),
            full_name: "Test Investor".to_string(),
            referral_code,
            referrer_id: None,
            role: UserRole::User.as_str().to_string(),
            status: UserStatus::Active.as_str().to_string(),
            kyc_status: KycStatus::Approved.as_str().to_string(),
            balance_cents,
            bot_active,
            created_at: at,
            updated_at: at,
        },
    )
    .expect("insert user")
}

pub fn payment(
    conn: &mut PgConnection,
    user_id: Uuid,
    purpose: PaymentPurpose,
    amount_cents: i64,
    plan_code: Option<&str>,
) -> PaymentRequest {
    let request = PaymentRequest {
        id: Uuid::new_v4(),
        user_id,
        purpose: purpose.as_str().to_string(),
        amount_cents,
        network: Network::Bep20.as_str().to_string(),
        tx_hash: format!("0x{}", hex64()),
        plan_code: plan_code.map(str::to_string),
        status: PaymentStatus::Pending.as_str().to_string(),
        review_note: None,
        reviewed_by: None,
        created_at: now(),
        reviewed_at: None,
    };
    payments::insert(conn, &request).expect("insert payment request");
    request
}

/// Active Silver package of 2,500 USD at 5% a month, activated at `activated_at`
pub fn package(conn: &mut PgConnection, owner: &User, activated_at: DateTime<Utc>) -> Package {
    let paid_with = payment(conn, owner.id, PaymentPurpose::Package, 250_000, Some("silver"));
    let package = Package {
        id: Uuid::new_v4(),
        user_id: owner.id,
        payment_request_id: paid_with.id,
        plan_code: "silver".to_string(),
        amount_cents: 250_000,
        monthly_roi_bps: 500,
        roi_paid_count: 0,
        max_roi_payments: nsccore::plans::MAX_ROI_PAYMENTS,
        status: PackageStatus::Active.as_str().to_string(),
        activated_at,
        next_roi_at: Some(roi::due_date(activated_at, 1).expect("first due date")),
        completed_at: None,
        created_at: activated_at,
    };
    packages::insert(conn, &package).expect("insert package");
    package
}

pub fn reload_package(conn: &mut PgConnection, id: Uuid) -> Package {
    use crate::db::schema::packages;

    packages::table
        .find(id)
        .select(Package::as_select())
        .first(conn)
        .expect("reload package")
}

pub fn reload_user(conn: &mut PgConnection, id: Uuid) -> User {
    users::find_by_id(conn, id).expect("load user").expect("user exists")
}

pub fn withdrawal(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount_cents: i64,
    status: WithdrawalStatus,
    created_at: DateTime<Utc>,
) -> Withdrawal {
    let fee_cents = amount_cents / 20;
    let withdrawal = Withdrawal {
        id: Uuid::new_v4(),
        user_id,
        amount_cents,
        fee_cents,
        net_amount_cents: amount_cents - fee_cents,
        network: Network::Bep20.as_str().to_string(),
        wallet_address: format!("0x{}", &hex64()[..40]),
        status: status.as_str().to_string(),
        tx_hash: None,
        review_note: None,
        reviewed_by: None,
        created_at,
        reviewed_at: None,
        completed_at: None,
    };
    withdrawals::insert(conn, &withdrawal).expect("insert withdrawal");
    withdrawal
}
