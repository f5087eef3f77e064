//! Scheduled ROI distribution.
//!
//! One run pays at most one installment per due package. Concurrency is left
//! to PostgreSQL: a transaction-scoped advisory lock keeps a single run
//! active across all server instances, and due packages are selected with
//! `FOR UPDATE SKIP LOCKED`. Each package is paid inside its own savepoint so
//! one failing row does not abort the batch.

use std::time::Duration;

use actix_web::web;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool};
use serde::Serialize;
use uuid::Uuid;

use nsccore::email::{format_usd, EmailTemplate};
use nsccore::roi;
use nsccore::types::{EarningType, NotificationKind, TransactionType};

use crate::db::models::{Earning, Notification, Package, RoiPayment};
use crate::db::queries::{earnings, notifications, packages, users};
use crate::db::schema::roi_payments;
use crate::db::{ledger, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::mailer::{MailerHandle, PendingEmail};

/// Advisory lock key reserved for the ROI batch ("NSC_ROI")
pub const ROI_LOCK_KEY: i64 = 0x004E_5343_5F52_4F49;

#[derive(QueryableByName)]
struct LockAcquired {
    #[diesel(sql_type = Bool)]
    acquired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoiRunReport {
    /// Packages paid in this run
    pub processed: u32,
    /// Packages that received their final payment
    pub completed: u32,
    /// Packages left for the next run after an error
    pub failed: u32,
    pub total_paid_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoiRunOutcome {
    /// Another run holds the advisory lock
    Skipped,
    Completed(RoiRunReport),
}

/// Next installment of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Installment {
    pub payment_number: i32,
    pub amount_cents: i64,
    /// `None` when this installment completes the package
    pub next_roi_at: Option<DateTime<Utc>>,
}

pub fn next_installment(package: &Package) -> ApiResult<Installment> {
    let step = roi::schedule_step(package.roi_paid_count, package.max_roi_payments)?;
    let amount_cents = roi::monthly_payout(package.amount_cents, package.monthly_roi_bps)?;
    let next_roi_at = if step.completes {
        None
    } else {
        Some(roi::due_date(package.activated_at, step.payment_number + 1)?)
    };
    Ok(Installment {
        payment_number: step.payment_number,
        amount_cents,
        next_roi_at,
    })
}

/// Pay one installment; `None` if the installment was already recorded.
fn pay_package(
    conn: &mut PgConnection,
    package: &Package,
    now: DateTime<Utc>,
) -> ApiResult<Option<(Installment, PendingEmail)>> {
    let installment = next_installment(package)?;

    let inserted = diesel::insert_into(roi_payments::table)
        .values(&RoiPayment {
            id: Uuid::new_v4(),
            package_id: package.id,
            user_id: package.user_id,
            payment_number: installment.payment_number,
            amount_cents: installment.amount_cents,
            paid_at: now,
        })
        .on_conflict((roi_payments::package_id, roi_payments::payment_number))
        .do_nothing()
        .execute(conn)?;

    packages::record_payout(
        conn,
        package.id,
        installment.payment_number,
        installment.next_roi_at,
        now,
    )?;

    if inserted == 0 {
        tracing::warn!(
            "ROI payment {} for package {} already recorded, schedule resynced",
            installment.payment_number,
            package.id
        );
        return Ok(None);
    }

    earnings::insert(
        conn,
        &Earning {
            id: Uuid::new_v4(),
            user_id: package.user_id,
            source_user_id: None,
            package_id: Some(package.id),
            earning_type: EarningType::Roi.as_str().to_string(),
            level: None,
            amount_cents: installment.amount_cents,
            created_at: now,
        },
    )?;
    ledger::credit(
        conn,
        package.user_id,
        TransactionType::RoiCredit,
        installment.amount_cents,
        Some(package.id),
        &format!(
            "ROI payment {}/{}",
            installment.payment_number, package.max_roi_payments
        ),
    )?;

    let message = match installment.next_roi_at {
        Some(_) => format!(
            "ROI payment {}/{} of {} was credited to your balance.",
            installment.payment_number,
            package.max_roi_payments,
            format_usd(installment.amount_cents)
        ),
        None => format!(
            "Final ROI payment of {} was credited. Your package is now completed.",
            format_usd(installment.amount_cents)
        ),
    };
    notifications::insert(
        conn,
        &Notification::new(package.user_id, NotificationKind::Roi, "ROI credited", message),
    )?;

    let owner = users::find_by_id(conn, package.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
    let email = PendingEmail::new(
        &owner.email,
        EmailTemplate::RoiCredited {
            name: owner.full_name,
            amount_cents: installment.amount_cents,
            payment_number: installment.payment_number,
            max_payments: package.max_roi_payments,
        },
    );
    Ok(Some((installment, email)))
}

/// Pay every package due at `now`, up to `batch_size` of them.
///
/// Returns the outcome and the e-mails to send once the transaction has
/// committed.
pub fn distribute_roi(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    batch_size: i64,
) -> ApiResult<(RoiRunOutcome, Vec<PendingEmail>)> {
    conn.transaction::<_, ApiError, _>(|conn| {
        let lock: LockAcquired = diesel::sql_query("SELECT pg_try_advisory_xact_lock($1) AS acquired")
            .bind::<BigInt, _>(ROI_LOCK_KEY)
            .get_result(conn)?;
        if !lock.acquired {
            tracing::info!("ROI run skipped: another run holds the lock");
            return Ok((RoiRunOutcome::Skipped, Vec::new()));
        }

        let due = packages::lock_due(conn, now, batch_size)?;
        let mut report = RoiRunReport::default();
        let mut emails = Vec::with_capacity(due.len());

        for package in &due {
            match conn.transaction(|conn| pay_package(conn, package, now)) {
                Ok(Some((installment, email))) => {
                    report.processed += 1;
                    report.total_paid_cents += installment.amount_cents;
                    if installment.next_roi_at.is_none() {
                        report.completed += 1;
                    }
                    emails.push(email);
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("ROI payment for package {} failed: {}", package.id, e);
                }
            }
        }

        tracing::info!(
            "💰 ROI run: {} paid, {} completed, {} failed, {} credited",
            report.processed,
            report.completed,
            report.failed,
            format_usd(report.total_paid_cents)
        );
        Ok((RoiRunOutcome::Completed(report), emails))
    })
}

/// Run one distribution on the blocking pool and send its e-mails
pub async fn run(pool: DbPool, mailer: MailerHandle, batch_size: i64) -> ApiResult<RoiRunOutcome> {
    let (outcome, emails) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        distribute_roi(&mut conn, Utc::now(), batch_size)
    })
    .await??;

    mailer.dispatch(emails);
    Ok(outcome)
}

/// Run the distribution every `interval_secs` on the actix runtime
pub fn spawn_scheduler(pool: DbPool, mailer: MailerHandle, interval_secs: u64, batch_size: i64) {
    tracing::info!("⏱️ ROI scheduler started (every {}s, batch {})", interval_secs, batch_size);
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = run(pool.clone(), mailer.clone(), batch_size).await {
                e.log();
                tracing::error!("Scheduled ROI run failed, retrying next tick");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nsccore::plans::MAX_ROI_PAYMENTS;

    use crate::db::testing;

    fn package(paid: i32) -> Package {
        let activated = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        Package {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            payment_request_id: Uuid::new_v4(),
            plan_code: "silver".to_string(),
            amount_cents: 250_000,
            monthly_roi_bps: 500,
            roi_paid_count: paid,
            max_roi_payments: MAX_ROI_PAYMENTS,
            status: "active".to_string(),
            activated_at: activated,
            next_roi_at: Some(roi::due_date(activated, paid + 1).unwrap()),
            completed_at: None,
            created_at: activated,
        }
    }

    #[test]
    fn test_first_installment() {
        let inst = next_installment(&package(0)).unwrap();
        assert_eq!(inst.payment_number, 1);
        assert_eq!(inst.amount_cents, 12_500);
        // Second payment falls on the last day of March, anchored to activation.
        assert_eq!(
            inst.next_roi_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_final_installment_completes() {
        let inst = next_installment(&package(MAX_ROI_PAYMENTS - 1)).unwrap();
        assert_eq!(inst.payment_number, MAX_ROI_PAYMENTS);
        assert_eq!(inst.next_roi_at, None);
    }

    #[test]
    fn test_no_installment_after_schedule() {
        let err = next_installment(&package(MAX_ROI_PAYMENTS)).unwrap_err();
        assert!(matches!(err, ApiError::Unprocessable(_)));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(RoiRunOutcome::Completed(RoiRunReport {
            processed: 2,
            completed: 1,
            failed: 0,
            total_paid_cents: 900,
        }))
        .unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["processed"], 2);
        assert_eq!(serde_json::to_value(RoiRunOutcome::Skipped).unwrap()["status"], "skipped");
    }

    fn paid_installments(conn: &mut PgConnection, package_id: Uuid) -> i64 {
        roi_payments::table
            .filter(roi_payments::package_id.eq(package_id))
            .count()
            .get_result(conn)
            .unwrap()
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_recorded_installment_resyncs_schedule() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let owner = testing::user(conn, 0, true);
        let activated = testing::now() - chrono::Duration::days(45);
        let pkg = testing::package(conn, &owner, activated);

        // Installment 1 recorded by an earlier run that never advanced the package.
        diesel::insert_into(roi_payments::table)
            .values(&RoiPayment {
                id: Uuid::new_v4(),
                package_id: pkg.id,
                user_id: owner.id,
                payment_number: 1,
                amount_cents: 12_500,
                paid_at: activated,
            })
            .execute(conn)
            .unwrap();

        let (outcome, emails) = distribute_roi(conn, testing::now(), 100).unwrap();
        assert!(matches!(outcome, RoiRunOutcome::Completed(_)));
        assert!(emails.iter().all(|e| e.to != owner.email));

        let pkg = testing::reload_package(conn, pkg.id);
        assert_eq!(pkg.roi_paid_count, 1);
        assert_eq!(pkg.next_roi_at, Some(roi::due_date(activated, 2).unwrap()));
        assert_eq!(paid_installments(conn, pkg.id), 1);
        assert_eq!(testing::reload_user(conn, owner.id).balance_cents, 0);

        let duplicate = diesel::insert_into(roi_payments::table)
            .values(&RoiPayment {
                id: Uuid::new_v4(),
                package_id: pkg.id,
                user_id: owner.id,
                payment_number: 1,
                amount_cents: 12_500,
                paid_at: activated,
            })
            .execute(conn);
        assert!(matches!(
            duplicate,
            Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _
            ))
        ));
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_run_skipped_while_lock_held() {
        let mut db = testing::open();
        let owner = testing::user(&mut db.conn, 0, true);
        let pkg = testing::package(&mut db.conn, &owner, testing::now() - chrono::Duration::days(45));

        let mut other = testing::connect();
        other.begin_test_transaction().unwrap();
        diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
            .bind::<BigInt, _>(ROI_LOCK_KEY)
            .execute(&mut other)
            .unwrap();

        let (outcome, emails) = distribute_roi(&mut db.conn, testing::now(), 100).unwrap();
        assert_eq!(outcome, RoiRunOutcome::Skipped);
        assert!(emails.is_empty());
        assert_eq!(testing::reload_package(&mut db.conn, pkg.id).roi_paid_count, 0);

        drop(other);
        let (outcome, _) = distribute_roi(&mut db.conn, testing::now(), 100).unwrap();
        assert!(matches!(outcome, RoiRunOutcome::Completed(ref r) if r.processed >= 1));
        assert_eq!(testing::reload_package(&mut db.conn, pkg.id).roi_paid_count, 1);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn test_package_completes_after_final_installment() {
        let mut db = testing::open();
        let conn = &mut db.conn;
        let owner = testing::user(conn, 0, true);
        let pkg = testing::package(conn, &owner, testing::now() - chrono::Duration::days(400));

        // One installment per run; the extra run must not pay a 13th.
        for _ in 0..=MAX_ROI_PAYMENTS {
            distribute_roi(conn, testing::now(), 100).unwrap();
        }

        let pkg = testing::reload_package(conn, pkg.id);
        assert_eq!(pkg.roi_paid_count, MAX_ROI_PAYMENTS);
        assert_eq!(pkg.status, "completed");
        assert_eq!(pkg.next_roi_at, None);
        assert!(pkg.completed_at.is_some());
        assert_eq!(paid_installments(conn, pkg.id), MAX_ROI_PAYMENTS as i64);
        assert_eq!(
            testing::reload_user(conn, owner.id).balance_cents,
            12_500 * MAX_ROI_PAYMENTS as i64
        );
    }
}
