use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UserRole;
use crate::{CoreError, Result};

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 900;
/// Default refresh token lifetime (7 days)
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 604_800;
/// Clock skew tolerated on `exp`
const LEEWAY_SECS: u64 = 30;
/// Shortest accepted HMAC secret
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims for user sessions
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,            // User id
    pub role: UserRole,
    pub sid: String,            // Session row id, revoked on logout
    pub exp: usize,
    pub iat: usize,
    pub token_type: TokenType,
}

/// Token pair response (OAuth2 pattern)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,     // "Bearer"
    pub expires_in: u64,        // seconds until access_token expires
}

/// Identity carried by a validated token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub role: UserRole,
}

/// Issues and validates HS256 session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: u64,
    refresh_ttl: u64,
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: u64, refresh_ttl: u64) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CoreError::invalid("jwt_secret", "must be at least 32 bytes"));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn access_ttl(&self) -> u64 {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> u64 {
        self.refresh_ttl
    }

    fn issue(&self, subject: &TokenSubject, token_type: TokenType, ttl: u64) -> Result<String> {
        let now = Utc::now().timestamp().max(0) as usize;

        let claims = Claims {
            sub: subject.user_id.to_string(),
            role: subject.role,
            sid: subject.session_id.to_string(),
            exp: now + ttl as usize,
            iat: now,
            token_type,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Token(e.to_string()))
    }

    /// Generate access token (short-lived)
    pub fn issue_access(&self, subject: &TokenSubject) -> Result<String> {
        self.issue(subject, TokenType::Access, self.access_ttl)
    }

    /// Generate token pair (OAuth2 pattern)
    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair> {
        let access_token = self.issue_access(subject)?;
        let refresh_token = self.issue(subject, TokenType::Refresh, self.refresh_ttl)?;
        tracing::debug!(user = %subject.user_id, session = %subject.session_id, "issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl,
        })
    }

    /// Generic token validator
    fn validate(&self, token: &str, expected: TokenType) -> Result<TokenSubject> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = LEEWAY_SECS;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!("Token validation failed for type {:?}: {:?}", expected, e);
            CoreError::Token(e.to_string())
        })?;

        if data.claims.token_type != expected {
            tracing::warn!(
                "Token type mismatch: expected {:?}, got {:?}",
                expected,
                data.claims.token_type
            );
            return Err(CoreError::Token("wrong token type".to_string()));
        }

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| CoreError::Token("malformed subject".to_string()))?;
        let session_id = Uuid::parse_str(&data.claims.sid)
            .map_err(|_| CoreError::Token("malformed session id".to_string()))?;

        Ok(TokenSubject {
            user_id,
            session_id,
            role: data.claims.role,
        })
    }

    pub fn validate_access(&self, token: &str) -> Result<TokenSubject> {
        self.validate(token, TokenType::Access)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<TokenSubject> {
        self.validate(token, TokenType::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role: UserRole::User,
        }
    }

    fn service() -> TokenService {
        TokenService::new(SECRET, DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS).unwrap()
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(TokenService::new(b"short", 60, 60).is_err());
    }

    #[test]
    fn test_pair_validates_by_type() {
        let svc = service();
        let sub = subject();
        let pair = svc.issue_pair(&sub).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, DEFAULT_ACCESS_TTL_SECS);

        assert_eq!(svc.validate_access(&pair.access_token).unwrap(), sub);
        assert_eq!(svc.validate_refresh(&pair.refresh_token).unwrap(), sub);

        assert!(svc.validate_access(&pair.refresh_token).is_err());
        assert!(svc.validate_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = service().issue_access(&subject()).unwrap();
        let other = TokenService::new(b"ffffffffffffffffffffffffffffffff", 60, 60).unwrap();
        assert!(other.validate_access(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service();
        let now = Utc::now().timestamp() as usize;
        let sub = subject();
        let claims = Claims {
            sub: sub.user_id.to_string(),
            role: sub.role,
            sid: sub.session_id.to_string(),
            exp: now - 3_600,
            iat: now - 4_500,
            token_type: TokenType::Access,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(svc.validate_access(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(service().validate_access("not.a.jwt").is_err());
    }
}
