use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nsccore::types::{KycStatus, NotificationKind};
use nsccore::validate;

use crate::auth::AuthUser;
use crate::db::queries::{kyc, notifications, users};
use crate::db::{DbPool, KycSubmission, Notification};
use crate::error::{ApiError, ApiResult};

const DOCUMENT_TYPES: &[&str] = &["passport", "national_id", "driving_license"];

#[derive(Debug, Deserialize)]
pub struct KycRequest {
    pub full_name: String,
    pub document_type: String,
    pub document_number: String,
    pub country: String,
    pub document_url: String,
}

#[derive(Debug, Serialize)]
struct KycView {
    status: String,
    submission: Option<KycSubmission>,
}

impl KycRequest {
    fn validate(&self, user_id: Uuid) -> ApiResult<KycSubmission> {
        let document_type = self.document_type.trim().to_ascii_lowercase();
        if !DOCUMENT_TYPES.contains(&document_type.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "document_type must be one of {}",
                DOCUMENT_TYPES.join(", ")
            )));
        }
        let document_url = validate::required_text("document_url", &self.document_url, 2048)?;
        if !(document_url.starts_with("https://") || document_url.starts_with("http://")) {
            return Err(ApiError::BadRequest("document_url must be an http(s) URL".to_string()));
        }

        Ok(KycSubmission {
            id: Uuid::new_v4(),
            user_id,
            full_name: validate::required_text("full_name", &self.full_name, 100)?,
            document_type,
            document_number: validate::required_text("document_number", &self.document_number, 64)?,
            country: validate::required_text("country", &self.country, 64)?,
            document_url,
            status: KycStatus::Pending.as_str().to_string(),
            review_note: None,
            reviewed_by: None,
            created_at: Utc::now(),
            reviewed_at: None,
        })
    }
}

pub async fn get_kyc(pool: web::Data<DbPool>, user: AuthUser) -> ApiResult<HttpResponse> {
    let pool = pool.clone();
    let view = web::block(move || -> ApiResult<KycView> {
        let mut conn = pool.get()?;
        let record = users::find_by_id(&mut conn, user.user_id)?.ok_or_else(|| ApiError::not_found("user"))?;
        Ok(KycView {
            status: record.kyc_status,
            submission: kyc::latest_for_user(&mut conn, user.user_id)?,
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(view))
}

/// Submit identity documents; allowed when nothing is pending or approved
pub async fn submit_kyc(
    pool: web::Data<DbPool>,
    user: AuthUser,
    body: web::Json<KycRequest>,
) -> ApiResult<HttpResponse> {
    let submission = body.validate(user.user_id)?;
    let pool = pool.clone();

    let submission = web::block(move || -> ApiResult<KycSubmission> {
        let mut conn = pool.get()?;
        conn.transaction::<_, ApiError, _>(|conn| {
            let record = users::lock(conn, user.user_id)?;
            match record.kyc_status.parse::<KycStatus>()? {
                KycStatus::Pending => {
                    return Err(ApiError::Conflict("KYC submission already under review".to_string()))
                }
                KycStatus::Approved => {
                    return Err(ApiError::Conflict("KYC already approved".to_string()))
                }
                KycStatus::NotSubmitted | KycStatus::Rejected => {}
            }
            kyc::insert(conn, &submission)?;
            users::set_kyc_status(conn, user.user_id, KycStatus::Pending)?;
            notifications::insert(
                conn,
                &Notification::new(
                    user.user_id,
                    NotificationKind::Kyc,
                    "KYC submitted",
                    "Your documents were received and are awaiting review.",
                ),
            )?;
            Ok(submission)
        })
    })
    .await??;

    tracing::info!("🪪 KYC submission {} from {}", submission.id, user.user_id);
    Ok(HttpResponse::Created().json(submission))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> KycRequest {
        KycRequest {
            full_name: " Ana Souza ".to_string(),
            document_type: "Passport".to_string(),
            document_number: "X1234567".to_string(),
            country: "BR".to_string(),
            document_url: "https://files.nsc.example/kyc/ana.png".to_string(),
        }
    }

    #[test]
    fn test_valid_submission() {
        let user_id = Uuid::new_v4();
        let submission = request().validate(user_id).unwrap();
        assert_eq!(submission.user_id, user_id);
        assert_eq!(submission.document_type, "passport");
        assert_eq!(submission.full_name, "Ana Souza");
        assert_eq!(submission.status, "pending");
    }

    #[test]
    fn test_rejects_unknown_document_type() {
        let mut req = request();
        req.document_type = "library_card".to_string();
        assert!(matches!(req.validate(Uuid::new_v4()), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let mut req = request();
        req.document_url = "file:///etc/passwd".to_string();
        assert!(req.validate(Uuid::new_v4()).is_err());
    }
}
