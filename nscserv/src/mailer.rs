use std::sync::Arc;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use nsccore::email::{EmailTemplate, RenderedEmail};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("smtp transport error: {0}")]
    Transport(String),
}

/// Outbound e-mail transport
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, email: &RenderedEmail) -> Result<(), MailError>;
}

/// SMTP relay over STARTTLS
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::Address(config.from.clone()))?;

        let mut builder = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, email: &RenderedEmail) -> Result<(), MailError> {
        let recipient: Mailbox = to.parse().map_err(|_| MailError::Address(to.to_string()))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(&message)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Writes e-mails to the log instead of sending them (no SMTP configured)
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, email: &RenderedEmail) -> Result<(), MailError> {
        tracing::info!("📧 [mail disabled] to={} subject={:?}", to, email.subject);
        tracing::debug!("{}", email.text);
        Ok(())
    }
}

/// E-mail queued by a workflow, sent after its transaction commits.
#[derive(Debug, Clone)]
pub struct PendingEmail {
    pub to: String,
    pub template: EmailTemplate,
}

impl PendingEmail {
    pub fn new(to: impl Into<String>, template: EmailTemplate) -> Self {
        Self {
            to: to.into(),
            template,
        }
    }
}

/// Shared mailer plus the branding used to render templates
#[derive(Clone)]
pub struct MailerHandle {
    mailer: Arc<dyn Mailer>,
    app_name: String,
    base_url: String,
}

impl MailerHandle {
    pub fn new(mailer: Arc<dyn Mailer>, app_name: &str, base_url: &str) -> Self {
        Self {
            mailer,
            app_name: app_name.to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// SMTP when configured, otherwise the log-only mailer
    pub fn from_config(
        smtp: Option<&SmtpConfig>,
        app_name: &str,
        base_url: &str,
    ) -> Result<Self, MailError> {
        let mailer: Arc<dyn Mailer> = match smtp {
            Some(cfg) => {
                tracing::info!("SMTP mailer configured via {}:{}", cfg.host, cfg.port);
                Arc::new(SmtpMailer::new(cfg)?)
            }
            None => {
                tracing::warn!("SMTP_HOST not set, e-mails will only be logged");
                Arc::new(LogMailer)
            }
        };
        Ok(Self::new(mailer, app_name, base_url))
    }

    /// Render and send every e-mail, returning how many went out.
    ///
    /// Blocks on the transport; failures are logged and skipped.
    pub fn send_all(&self, emails: &[PendingEmail]) -> usize {
        let mut sent = 0;
        for pending in emails {
            let rendered = pending.template.render(&self.app_name, &self.base_url);
            match self.mailer.send(&pending.to, &rendered) {
                Ok(()) => sent += 1,
                Err(e) => tracing::error!("Failed to send {:?} to {}: {}", rendered.subject, pending.to, e),
            }
        }
        sent
    }

    /// Send on the blocking pool without waiting for the result
    pub fn dispatch(&self, emails: Vec<PendingEmail>) {
        if emails.is_empty() {
            return;
        }
        let handle = self.clone();
        actix_web::rt::task::spawn_blocking(move || {
            let sent = handle.send_all(&emails);
            tracing::debug!("Dispatched {}/{} e-mail(s)", sent, emails.len());
        });
    }
}
