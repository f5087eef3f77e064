use anyhow::Result;
use serde::Deserialize;
use serde_json::json;

use nsccore::token::TokenPair;
use nsccore::types::UserRole;

use crate::modules::client::ApiClient;

#[derive(Debug, Deserialize)]
struct LoginUser {
    email: String,
    role: UserRole,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: LoginUser,
    #[serde(flatten)]
    tokens: TokenPair,
}

/// Log in and print the access token for `NSC_TOKEN`
pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<()> {
    let resp: LoginResponse = client
        .post_public("auth/login", &json!({ "email": email, "password": password }))
        .await?;

    if resp.user.role != UserRole::Admin {
        tracing::warn!("{} is not an admin; admin commands will be refused", resp.user.email);
    }
    tracing::info!(
        "✅ Logged in as {} ({}), token valid for {}s",
        resp.user.email,
        resp.user.role,
        resp.tokens.expires_in
    );
    println!("export NSC_TOKEN={}", resp.tokens.access_token);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_shape() {
        let body = json!({
            "user": { "id": "7f1c", "email": "admin@nsc.test", "role": "admin", "balance_cents": 0 },
            "access_token": "a.b.c",
            "refresh_token": "d.e.f",
            "token_type": "Bearer",
            "expires_in": 900
        });
        let resp: LoginResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.user.role, UserRole::Admin);
        assert_eq!(resp.tokens.access_token, "a.b.c");
        assert_eq!(resp.tokens.expires_in, 900);
    }
}
