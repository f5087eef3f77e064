use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nsccore::email::EmailTemplate;
use nsccore::token::{TokenPair, TokenSubject};
use nsccore::types::{KycStatus, UserRole, UserStatus};
use nsccore::{password, referral, validate};

use crate::auth::{client_ip, AuthUser, TOKEN_COOKIE};
use crate::db::queries::{audit, sessions, users};
use crate::db::{AuditLog, DbPool, NewUser, Session, User, UserView};
use crate::error::{ApiError, ApiResult};
use crate::mailer::PendingEmail;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    user: UserView,
    #[serde(flatten)]
    tokens: TokenPair,
}

/// Request metadata stored on the session row
struct ClientInfo {
    user_agent: Option<String>,
    ip: Option<String>,
}

impl ClientInfo {
    fn from_request(req: &HttpRequest) -> Self {
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(255).collect());
        Self {
            user_agent,
            ip: client_ip(req),
        }
    }

    fn session(&self, user_id: Uuid, ttl_secs: u64) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id,
            user_agent: self.user_agent.clone(),
            ip_address: self.ip.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
            revoked_at: None,
        }
    }
}

fn token_cookie(state: &AppState, token: &str) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .secure(state.config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(state.tokens.access_ttl() as i64))
        .finish()
}

fn subject_for(user: &User, session: &Session) -> ApiResult<TokenSubject> {
    Ok(TokenSubject {
        user_id: user.id,
        session_id: session.id,
        role: user.role.parse::<UserRole>()?,
    })
}

fn ensure_active(user: &User) -> ApiResult<()> {
    if user.status == UserStatus::Suspended.as_str() {
        tracing::warn!("Rejected suspended account {}", user.id);
        return Err(ApiError::Forbidden("account suspended".to_string()));
    }
    Ok(())
}

pub async fn register(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let email = validate::email(&body.email)?;
    validate::password(&body.password)?;
    let full_name = validate::required_text("full_name", &body.full_name, 100)?;
    let referral_code = match body.referral_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let code = referral::normalize_referral_code(code);
            if !referral::is_valid_referral_code(&code) {
                return Err(ApiError::BadRequest("invalid referral code".to_string()));
            }
            Some(code)
        }
        None => None,
    };

    let client = ClientInfo::from_request(&req);
    let refresh_ttl = state.tokens.refresh_ttl();
    let pool = pool.clone();
    let (user, session) = web::block(move || -> ApiResult<_> {
        let password_hash = password::hash_password(&body.password)?;
        let mut conn = pool.get()?;
        let (user, session) = conn.transaction::<_, ApiError, _>(|conn| {
            if users::find_by_email(conn, &email)?.is_some() {
                return Err(ApiError::Conflict("email already registered".to_string()));
            }
            let referrer_id = match referral_code.as_deref() {
                Some(code) => Some(
                    users::find_by_referral_code(conn, code)?
                        .ok_or_else(|| ApiError::BadRequest("unknown referral code".to_string()))?
                        .id,
                ),
                None => None,
            };

            let now = Utc::now();
            let own_code = users::unique_referral_code(conn)?;
            let user = users::insert(
                conn,
                &NewUser {
                    id: Uuid::new_v4(),
                    email,
                    password_hash,
                    full_name,
                    referral_code: own_code,
                    referrer_id,
                    role: UserRole::User.as_str().to_string(),
                    status: UserStatus::Active.as_str().to_string(),
                    kyc_status: KycStatus::NotSubmitted.as_str().to_string(),
                    balance_cents: 0,
                    bot_active: false,
                    created_at: now,
                    updated_at: now,
                },
            )?;
            let session = client.session(user.id, refresh_ttl);
            sessions::insert(conn, &session)?;
            Ok((user, session))
        })?;
        audit::record(
            &mut conn,
            AuditLog::new(
                Some(user.id),
                "register",
                serde_json::json!({ "referrer_id": user.referrer_id }),
            )
            .with_ip(client.ip.clone()),
        );
        Ok((user, session))
    })
    .await??;

    let tokens = state.tokens.issue_pair(&subject_for(&user, &session)?)?;
    tracing::info!("👤 New user registered: {}", user.id);
    state.mailer.dispatch(vec![PendingEmail::new(
        &user.email,
        EmailTemplate::Welcome {
            name: user.full_name.clone(),
            referral_code: user.referral_code.clone(),
        },
    )]);

    Ok(HttpResponse::Created()
        .cookie(token_cookie(&state, &tokens.access_token))
        .json(AuthResponse {
            user: user.into(),
            tokens,
        }))
}

pub async fn login(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let email = body.email.trim().to_ascii_lowercase();
    let client = ClientInfo::from_request(&req);
    let refresh_ttl = state.tokens.refresh_ttl();
    let pool = pool.clone();

    let (user, session) = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        let invalid = || ApiError::Unauthorized("invalid email or password".to_string());

        let user = users::find_by_email(&mut conn, &email)?.ok_or_else(invalid)?;
        if !password::verify_password(&body.password, &user.password_hash)? {
            audit::record(
                &mut conn,
                AuditLog::new(Some(user.id), "login_failed", serde_json::json!({}))
                    .with_ip(client.ip.clone()),
            );
            return Err(invalid());
        }
        ensure_active(&user)?;

        let session = client.session(user.id, refresh_ttl);
        sessions::insert(&mut conn, &session)?;
        audit::record(
            &mut conn,
            AuditLog::new(Some(user.id), "login", serde_json::json!({ "session_id": session.id }))
                .with_ip(client.ip.clone()),
        );
        Ok((user, session))
    })
    .await??;

    let tokens = state.tokens.issue_pair(&subject_for(&user, &session)?)?;
    tracing::info!("🔐 User {} logged in", user.id);

    Ok(HttpResponse::Ok()
        .cookie(token_cookie(&state, &tokens.access_token))
        .json(AuthResponse {
            user: user.into(),
            tokens,
        }))
}

pub async fn refresh(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> ApiResult<HttpResponse> {
    let subject = state.tokens.validate_refresh(&body.refresh_token)?;
    let pool = pool.clone();

    let user = web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        sessions::find_active(&mut conn, subject.session_id, Utc::now())?
            .filter(|s| s.user_id == subject.user_id)
            .ok_or_else(|| ApiError::Unauthorized("session expired or revoked".to_string()))?;
        let user = users::find_by_id(&mut conn, subject.user_id)?
            .ok_or_else(|| ApiError::Unauthorized("account no longer exists".to_string()))?;
        ensure_active(&user)?;
        Ok(user)
    })
    .await??;

    // Role is re-read so a demotion takes effect on the next refresh.
    let access_token = state.tokens.issue_access(&TokenSubject {
        user_id: user.id,
        session_id: subject.session_id,
        role: user.role.parse()?,
    })?;
    tracing::debug!("Access token refreshed for {}", user.id);

    Ok(HttpResponse::Ok()
        .cookie(token_cookie(&state, &access_token))
        .json(serde_json::json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": state.tokens.access_ttl(),
        })))
}

pub async fn logout(
    pool: web::Data<DbPool>,
    user: AuthUser,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let ip = client_ip(&req);
    let pool = pool.clone();
    web::block(move || -> ApiResult<_> {
        let mut conn = pool.get()?;
        sessions::revoke(&mut conn, user.session_id, Utc::now())?;
        audit::record(
            &mut conn,
            AuditLog::new(Some(user.user_id), "logout", serde_json::json!({ "session_id": user.session_id }))
                .with_ip(ip),
        );
        Ok(())
    })
    .await??;

    let mut removal = Cookie::build(TOKEN_COOKIE, "").path("/").finish();
    removal.make_removal();
    Ok(HttpResponse::Ok()
        .cookie(removal)
        .json(serde_json::json!({ "message": "logged out" })))
}

pub async fn forgot_password(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordRequest>,
) -> ApiResult<HttpResponse> {
    let response = HttpResponse::Ok().json(serde_json::json!({
        "message": "if the address is registered, a reset link has been sent"
    }));
    let Ok(email) = validate::email(&body.email) else {
        return Ok(response);
    };

    let ttl_minutes = state.config.password_reset_ttl_minutes;
    let pool = pool.clone();
    let pending = web::block(move || -> ApiResult<Option<PendingEmail>> {
        let mut conn = pool.get()?;
        let Some(user) = users::find_by_email(&mut conn, &email)? else {
            tracing::debug!("Password reset requested for unknown address");
            return Ok(None);
        };
        let token = password::random_token();
        users::set_password_reset(
            &mut conn,
            user.id,
            &password::hash_token(&token),
            Utc::now() + Duration::minutes(ttl_minutes),
        )?;
        audit::record(
            &mut conn,
            AuditLog::new(Some(user.id), "password_reset_request", serde_json::json!({})),
        );
        Ok(Some(PendingEmail::new(
            &user.email,
            EmailTemplate::PasswordReset {
                name: user.full_name,
                token,
                expires_in_minutes: ttl_minutes,
            },
        )))
    })
    .await
    .map_err(ApiError::from)
    .and_then(|r| r);

    // The answer never depends on whether the address exists or the lookup failed.
    match pending {
        Ok(pending) => state.mailer.dispatch(pending.into_iter().collect()),
        Err(e) => {
            e.log();
            tracing::error!("Password reset request could not be processed");
        }
    }
    Ok(response)
}

pub async fn reset_password(
    pool: web::Data<DbPool>,
    body: web::Json<ResetPasswordRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    validate::password(&body.password)?;
    let token_hash = password::hash_token(body.token.trim());
    let pool = pool.clone();

    web::block(move || -> ApiResult<_> {
        let password_hash = password::hash_password(&body.password)?;
        let mut conn = pool.get()?;
        let now = Utc::now();
        let user = conn.transaction::<_, ApiError, _>(|conn| {
            let user = users::find_by_reset_hash(conn, &token_hash, now)?
                .ok_or_else(|| ApiError::BadRequest("invalid or expired reset token".to_string()))?;
            users::update_password(conn, user.id, &password_hash)?;
            sessions::revoke_all_for_user(conn, user.id, now)?;
            Ok(user)
        })?;
        audit::record(
            &mut conn,
            AuditLog::new(Some(user.id), "password_reset", serde_json::json!({})),
        );
        tracing::info!("Password reset for {}", user.id);
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "password updated" })))
}
