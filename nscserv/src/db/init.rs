// Database initialization and connection management
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{sql_query, QueryResult, RunQueryDsl};
use uuid::Uuid;

use nsccore::types::{KycStatus, UserRole, UserStatus};

use crate::config::{AdminBootstrap, AppConfig};
use crate::db::models::NewUser;
use crate::error::{ApiError, ApiResult};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Build the r2d2 pool for `DATABASE_URL`
pub fn init_pool(config: &AppConfig) -> Result<DbPool, Box<dyn std::error::Error>> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = Pool::builder()
        .max_size(config.db_pool_size)
        .build(manager)?;
    Ok(pool)
}

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        full_name TEXT NOT NULL,
        referral_code TEXT NOT NULL UNIQUE,
        referrer_id UUID REFERENCES users(id),
        role TEXT NOT NULL DEFAULT 'user',
        status TEXT NOT NULL DEFAULT 'active',
        kyc_status TEXT NOT NULL DEFAULT 'not_submitted',
        balance_cents BIGINT NOT NULL DEFAULT 0 CHECK (balance_cents >= 0),
        bot_active BOOLEAN NOT NULL DEFAULT FALSE,
        bot_activated_at TIMESTAMPTZ,
        last_withdrawal_at TIMESTAMPTZ,
        password_reset_hash TEXT,
        password_reset_expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS kyc_submissions (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        full_name TEXT NOT NULL,
        document_type TEXT NOT NULL,
        document_number TEXT NOT NULL,
        country TEXT NOT NULL,
        document_url TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        review_note TEXT,
        reviewed_by UUID REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        reviewed_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS payment_requests (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        purpose TEXT NOT NULL,
        amount_cents BIGINT NOT NULL CHECK (amount_cents > 0),
        network TEXT NOT NULL,
        tx_hash TEXT NOT NULL UNIQUE,
        plan_code TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        review_note TEXT,
        reviewed_by UUID REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        reviewed_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS bot_activations (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL UNIQUE REFERENCES users(id),
        payment_request_id UUID NOT NULL REFERENCES payment_requests(id),
        fee_cents BIGINT NOT NULL,
        activated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS packages (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        payment_request_id UUID NOT NULL UNIQUE REFERENCES payment_requests(id),
        plan_code TEXT NOT NULL,
        amount_cents BIGINT NOT NULL CHECK (amount_cents > 0),
        monthly_roi_bps INTEGER NOT NULL,
        roi_paid_count INTEGER NOT NULL DEFAULT 0,
        max_roi_payments INTEGER NOT NULL DEFAULT 12,
        status TEXT NOT NULL DEFAULT 'active',
        activated_at TIMESTAMPTZ NOT NULL,
        next_roi_at TIMESTAMPTZ,
        completed_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CHECK (roi_paid_count <= max_roi_payments)
    )",
    "CREATE TABLE IF NOT EXISTS roi_payments (
        id UUID PRIMARY KEY,
        package_id UUID NOT NULL REFERENCES packages(id),
        user_id UUID NOT NULL REFERENCES users(id),
        payment_number INTEGER NOT NULL,
        amount_cents BIGINT NOT NULL,
        paid_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (package_id, payment_number)
    )",
    "CREATE TABLE IF NOT EXISTS earnings (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        source_user_id UUID REFERENCES users(id),
        package_id UUID REFERENCES packages(id),
        earning_type TEXT NOT NULL,
        level INTEGER,
        amount_cents BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS transactions (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        tx_type TEXT NOT NULL,
        amount_cents BIGINT NOT NULL,
        balance_after_cents BIGINT NOT NULL,
        reference_id UUID,
        description TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS withdrawals (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        amount_cents BIGINT NOT NULL CHECK (amount_cents > 0),
        fee_cents BIGINT NOT NULL,
        net_amount_cents BIGINT NOT NULL,
        network TEXT NOT NULL,
        wallet_address TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        tx_hash TEXT,
        review_note TEXT,
        reviewed_by UUID REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        reviewed_at TIMESTAMPTZ,
        completed_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS notifications (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        kind TEXT NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        is_read BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        user_agent TEXT,
        ip_address TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        expires_at TIMESTAMPTZ NOT NULL,
        revoked_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS audit_logs (
        id UUID PRIMARY KEY,
        actor_id UUID,
        event_type TEXT NOT NULL,
        event_data TEXT NOT NULL,
        ip_address TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_referrer_id ON users(referrer_id)",
    "CREATE INDEX IF NOT EXISTS idx_kyc_user_id ON kyc_submissions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_kyc_status ON kyc_submissions(status)",
    "CREATE INDEX IF NOT EXISTS idx_payment_requests_user_id ON payment_requests(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_payment_requests_status ON payment_requests(status)",
    "CREATE INDEX IF NOT EXISTS idx_packages_user_id ON packages(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_packages_due ON packages(next_roi_at) WHERE status = 'active'",
    "CREATE INDEX IF NOT EXISTS idx_earnings_user_id ON earnings(user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON transactions(user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_user_id ON withdrawals(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_status ON withdrawals(status)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id, is_read)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_event_type ON audit_logs(event_type)",
];

/// Create tables and indexes. Safe to run on every start.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = pool.get()?;
    migrate(&mut conn)?;
    Ok(())
}

pub(crate) fn migrate(conn: &mut PgConnection) -> QueryResult<()> {
    for table_sql in TABLES {
        sql_query(*table_sql).execute(conn)?;
        tracing::debug!("✅ Table created/verified");
    }

    for index_sql in INDEXES {
        match sql_query(*index_sql).execute(conn) {
            Ok(_) => tracing::debug!("✅ Index created/verified"),
            Err(e) => tracing::warn!("⚠️ Index creation warning: {:?}", e),
        }
    }

    Ok(())
}

/// Create the bootstrap administrator if the e-mail is not registered yet
pub fn init_admin(pool: &DbPool, admin: &AdminBootstrap) -> ApiResult<()> {
    use crate::db::queries::users;

    let email = nsccore::validate::email(&admin.email)?;
    let mut conn = pool.get()?;

    if users::find_by_email(&mut conn, &email)?.is_some() {
        tracing::debug!("Admin account {} already present", email);
        return Ok(());
    }

    let password_hash = nsccore::password::hash_password(&admin.password)?;
    let now = Utc::now();
    let new_admin = NewUser {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash,
        full_name: "Administrator".to_string(),
        referral_code: users::unique_referral_code(&mut conn)?,
        referrer_id: None,
        role: UserRole::Admin.as_str().to_string(),
        status: UserStatus::Active.as_str().to_string(),
        kyc_status: KycStatus::Approved.as_str().to_string(),
        balance_cents: 0,
        bot_active: false,
        created_at: now,
        updated_at: now,
    };

    users::insert(&mut conn, &new_admin).map_err(|e| {
        tracing::error!("Failed to initialize admin account: {:?}", e);
        ApiError::from(e)
    })?;
    tracing::info!("Admin account initialized: {}", email);
    Ok(())
}
