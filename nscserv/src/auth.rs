//! Request extractors for authenticated routes.
//!
//! The access token is read from `Authorization: Bearer <token>` first and
//! falls back to the `token` cookie set at login.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use uuid::Uuid;

use nsccore::types::UserRole;

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the cookie carrying the access token
pub const TOKEN_COOKIE: &str = "token";

/// Caller identified by a valid access token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub role: UserRole,
}

/// Caller holding the admin role
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

/// Access token presented with the request, if any
pub fn request_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    bearer.or_else(|| {
        req.cookie(TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?;

    let token = request_token(req)
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))?;

    let subject = state.tokens.validate_access(&token)?;
    Ok(AuthUser {
        user_id: subject.user_id,
        session_id: subject.session_id,
        role: subject.role,
    })
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).and_then(|user| {
            if user.role == UserRole::Admin {
                Ok(AdminUser(user))
            } else {
                tracing::warn!("Rejected admin request from {}", user.user_id);
                Err(ApiError::Forbidden("admin privileges required".to_string()))
            }
        }))
    }
}

/// Client address as reported by the connection info
pub fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;
    use nsccore::token::TokenSubject;

    use crate::config::AppConfig;
    use crate::mailer::MailerHandle;

    pub(crate) fn test_state() -> web::Data<AppState> {
        let config = AppConfig::from_lookup(|key: &str| match key {
            "DATABASE_URL" => Some("postgres://localhost/nsc_test".to_string()),
            "JWT_SECRET" => Some("0123456789abcdef0123456789abcdef".to_string()),
            _ => None,
        })
        .unwrap();
        let mailer = MailerHandle::from_config(None, &config.app_name, &config.app_base_url).unwrap();
        web::Data::new(AppState::new(config, mailer).unwrap())
    }

    fn token_for(state: &AppState, role: UserRole) -> (String, TokenSubject) {
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role,
        };
        (state.tokens.issue_access(&subject).unwrap(), subject)
    }

    #[actix_web::test]
    async fn test_missing_token_rejected() {
        let req = TestRequest::default().app_data(test_state()).to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[actix_web::test]
    async fn test_bearer_token_accepted() {
        let state = test_state();
        let (token, subject) = token_for(&state, UserRole::User);
        let req = TestRequest::default()
            .app_data(state)
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, subject.user_id);
        assert_eq!(user.session_id, subject.session_id);
    }

    #[actix_web::test]
    async fn test_cookie_token_accepted() {
        let state = test_state();
        let (token, subject) = token_for(&state, UserRole::User);
        let req = TestRequest::default()
            .app_data(state)
            .cookie(Cookie::new(TOKEN_COOKIE, token))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, subject.user_id);
    }

    #[actix_web::test]
    async fn test_refresh_token_not_accepted_as_access() {
        let state = test_state();
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role: UserRole::User,
        };
        let pair = state.tokens.issue_pair(&subject).unwrap();
        let req = TestRequest::default()
            .app_data(state)
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", pair.refresh_token)))
            .to_http_request();

        assert!(matches!(
            AuthUser::extract(&req).await.unwrap_err(),
            ApiError::Unauthorized(_)
        ));
    }

    #[actix_web::test]
    async fn test_admin_requires_role() {
        let state = test_state();
        let (user_token, _) = token_for(&state, UserRole::User);
        let (admin_token, _) = token_for(&state, UserRole::Admin);

        let req = TestRequest::default()
            .app_data(state.clone())
            .insert_header((header::AUTHORIZATION, format!("Bearer {user_token}")))
            .to_http_request();
        assert!(matches!(
            AdminUser::extract(&req).await.unwrap_err(),
            ApiError::Forbidden(_)
        ));

        let req = TestRequest::default()
            .app_data(state)
            .insert_header((header::AUTHORIZATION, format!("Bearer {admin_token}")))
            .to_http_request();
        assert!(AdminUser::extract(&req).await.is_ok());
    }
}
