// Database models for the NSC platform
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::schema::*;

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,                       // Argon2id PHC string
    pub full_name: String,
    pub referral_code: String,
    pub referrer_id: Option<Uuid>,                   // Direct sponsor (level 1 upline)
    pub role: String,                                // UserRole
    pub status: String,                              // UserStatus
    pub kyc_status: String,                          // KycStatus
    pub balance_cents: i64,
    pub bot_active: bool,
    pub bot_activated_at: Option<DateTime<Utc>>,
    pub last_withdrawal_at: Option<DateTime<Utc>>,
    pub password_reset_hash: Option<String>,         // SHA-256 of the emailed reset token
    pub password_reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub referral_code: String,
    pub referrer_id: Option<Uuid>,
    pub role: String,
    pub status: String,
    pub kyc_status: String,
    pub balance_cents: i64,
    pub bot_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = kyc_submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KycSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub document_type: String,                       // "passport", "national_id", "driving_license"
    pub document_number: String,
    pub country: String,
    pub document_url: String,
    pub status: String,                              // KycStatus
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = payment_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purpose: String,                             // PaymentPurpose
    pub amount_cents: i64,
    pub network: String,                             // Network
    pub tx_hash: String,                             // Unique across all requests
    pub plan_code: Option<String>,                   // Set for package purchases
    pub status: String,                              // PaymentStatus
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = bot_activations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BotActivation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_request_id: Uuid,
    pub fee_cents: i64,
    pub activated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Package {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_request_id: Uuid,
    pub plan_code: String,
    pub amount_cents: i64,
    pub monthly_roi_bps: i32,
    pub roi_paid_count: i32,
    pub max_roi_payments: i32,
    pub status: String,                              // PackageStatus
    pub activated_at: DateTime<Utc>,
    pub next_roi_at: Option<DateTime<Utc>>,          // Cleared once completed
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = roi_payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoiPayment {
    pub id: Uuid,
    pub package_id: Uuid,
    pub user_id: Uuid,
    pub payment_number: i32,                         // 1..=max_roi_payments
    pub amount_cents: i64,
    pub paid_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = earnings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Earning {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_user_id: Option<Uuid>,                // Investor for referral commissions
    pub package_id: Option<Uuid>,
    pub earning_type: String,                        // EarningType
    pub level: Option<i32>,                          // Referral level 1..=6
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tx_type: String,                             // TransactionType
    pub amount_cents: i64,                           // Signed: credits positive
    pub balance_after_cents: i64,
    pub reference_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = withdrawals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub fee_cents: i64,
    pub net_amount_cents: i64,
    pub network: String,                             // Network
    pub wallet_address: String,
    pub status: String,                              // WithdrawalStatus
    pub tx_hash: Option<String>,                     // Payout hash, set on completion
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,                                // NotificationKind
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: Uuid,                                    // `sid` claim of issued tokens
    pub user_id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,           // Set on logout
}

#[derive(Queryable, Selectable, Insertable, Serialize, Clone, Debug)]
#[diesel(table_name = audit_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,                      // None for unauthenticated events
    pub event_type: String,                          // "login", "payment_approve", "roi_run", ...
    pub event_data: String,                          // JSON string with event details
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(actor_id: Option<Uuid>, event_type: &str, event_data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            event_type: event_type.to_string(),
            event_data: event_data.to_string(),
            ip_address: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        kind: nsccore::types::NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.as_str().to_string(),
            title: title.into(),
            message: message.into(),
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

/// Public projection of a user row (no secrets).
#[derive(Serialize, Clone, Debug)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub referral_code: String,
    pub referrer_id: Option<Uuid>,
    pub role: String,
    pub status: String,
    pub kyc_status: String,
    pub balance_cents: i64,
    pub bot_active: bool,
    pub bot_activated_at: Option<DateTime<Utc>>,
    pub last_withdrawal_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            referral_code: u.referral_code,
            referrer_id: u.referrer_id,
            role: u.role,
            status: u.status,
            kyc_status: u.kyc_status,
            balance_cents: u.balance_cents,
            bot_active: u.bot_active,
            bot_activated_at: u.bot_activated_at,
            last_withdrawal_at: u.last_withdrawal_at,
            created_at: u.created_at,
        }
    }
}
