use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::{AppError, Result};

use super::{Digest, Mailer};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(AppError::Config("smtp.host is not set".to_string()));
        }
        let from = parse_mailbox("smtp.from", &config.from)?;
        let to = parse_mailbox("smtp.to", &config.to)?;

        let builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AppError::Mail(e.to_string()))?,
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| AppError::Mail(e.to_string()))?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        };
        let mut builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    if value.is_empty() {
        return Err(AppError::Config(format!("{} is not set", field)));
    }
    value
        .parse()
        .map_err(|e| AppError::Config(format!("{} is not a valid address: {}", field, e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, digest: &Digest) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(digest.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                digest.text.clone(),
                digest.html.clone(),
            ))
            .map_err(|e| AppError::Mail(e.to_string()))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| AppError::Delivery(e.to_string()))?;

        tracing::debug!("SMTP server accepted digest: {:?}", response.code());
        Ok(())
    }
}
