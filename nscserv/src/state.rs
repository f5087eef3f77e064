use nsccore::token::TokenService;

use crate::config::AppConfig;
use crate::mailer::MailerHandle;

/// Process-wide state shared by every worker
pub struct AppState {
    pub config: AppConfig,
    pub tokens: TokenService,
    pub mailer: MailerHandle,
}

impl AppState {
    pub fn new(config: AppConfig, mailer: MailerHandle) -> Result<Self, nsccore::CoreError> {
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        )?;
        Ok(Self {
            config,
            tokens,
            mailer,
        })
    }
}
