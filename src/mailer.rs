use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::MailerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Letter {
    pub subject: String,
    pub html: String,
}

impl Letter {
    pub fn confirmation(first_name: &str, verify_url: &str, token: &str) -> Self {
        let link = format!("{verify_url}?token={token}");
        Self {
            subject: "Confirm your email".into(),
            html: format!(
                "<p>Hi {first_name},</p>\
                 <p>Please confirm your email address by following the link below.</p>\
                 <p><a href=\"{link}\">{link}</a></p>"
            ),
        }
    }

    pub fn verified(first_name: &str) -> Self {
        Self {
            subject: "Your email is confirmed".into(),
            html: format!(
                "<p>Hi {first_name},</p><p>Your email address has been confirmed. Welcome aboard!</p>"
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, letter: Letter) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    dev: bool,
}

impl SmtpMailer {
    pub fn new(cfg: &MailerConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("smtp relay")?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.password.clone()))
            .build();
        let from: Mailbox = cfg.from.parse().context("parse sender address")?;
        Ok(Self {
            transport,
            from,
            dev: cfg.dev,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, letter: Letter) -> anyhow::Result<()> {
        let recipient: Mailbox = if self.dev {
            debug!(to = %to, "dev mailer, redirecting to sender");
            self.from.clone()
        } else {
            to.parse().context("parse recipient address")?
        };

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(letter.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(letter.html)
            .context("build message")?;

        self.transport.send(message).await.context("smtp send")?;
        info!(to = %to, subject = %letter.subject, "letter sent");
        Ok(())
    }
}
