use anyhow::{anyhow, bail, Result};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Thin wrapper over the NSC REST API
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> reqwest::Result<Self> {
        let http = ClientBuilder::new()
            .user_agent(concat!("nscctl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn require_token(&self) -> Result<()> {
        if self.token.is_none() {
            bail!("no token: run `nscctl login` and export NSC_TOKEN, or pass --token");
        }
        Ok(())
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("request failed: Status {} - {}", status, error_message(&body)));
        }
        Ok(resp.json().await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.require_token()?;
        tracing::debug!("GET {}", path);
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.require_token()?;
        tracing::debug!("POST {}", path);
        self.send(self.request(Method::POST, path).json(body)).await
    }

    /// POST without requiring a stored token (login)
    pub async fn post_public<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }
}

/// Pull `error` out of a JSON error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:8080/", None).unwrap();
        assert_eq!(client.url("admin/stats"), "http://localhost:8080/api/admin/stats");
        assert_eq!(client.url("/auth/login"), "http://localhost:8080/api/auth/login");
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let client = ApiClient::new("http://localhost:8080", Some("  ".to_string())).unwrap();
        assert!(client.require_token().is_err());
        let client = ApiClient::new("http://localhost:8080", Some("abc".to_string())).unwrap();
        assert!(client.require_token().is_ok());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"admin access required"}"#), "admin access required");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
