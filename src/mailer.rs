//! Out-of-band delivery of token plaintexts to users.
//!
//! Token plaintexts only ever leave the process inside a message body sent
//! to the account owner; nothing here writes them to the log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{MailTransport, MailerConfig, SmtpSecurity};

const SEND_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mailer misconfigured: {0}")]
    Config(String),

    #[error("invalid recipient address: {0}")]
    Address(String),

    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("mail delivery exceeded {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Email {
    Welcome {
        user_id: i32,
        activation_token: String,
        expires_in: chrono::Duration,
    },
    ActivationToken {
        activation_token: String,
        expires_in: chrono::Duration,
    },
    PasswordReset {
        password_reset_token: String,
        expires_in: chrono::Duration,
    },
}

impl Email {
    #[must_use]
    pub const fn template(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "user_welcome",
            Self::ActivationToken { .. } => "token_activation",
            Self::PasswordReset { .. } => "token_password_reset",
        }
    }

    /// The token the message carries.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Welcome {
                activation_token, ..
            }
            | Self::ActivationToken {
                activation_token, ..
            } => activation_token,
            Self::PasswordReset {
                password_reset_token,
                ..
            } => password_reset_token,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "Welcome to Cinevault!",
            Self::ActivationToken { .. } => "Activate your Cinevault account",
            Self::PasswordReset { .. } => "Reset your Cinevault password",
        }
    }

    #[must_use]
    pub fn plain_body(&self) -> String {
        match self {
            Self::Welcome {
                user_id,
                activation_token,
                expires_in,
            } => format!(
                "Hi,\n\n\
                 Thanks for signing up for a Cinevault account. We're excited to have you on board!\n\n\
                 For future reference, your user ID number is {user_id}.\n\n\
                 Please send a request to the `PUT /v1/users/activated` endpoint with the \
                 following JSON body to activate your account:\n\n\
                 {{\"token\": \"{activation_token}\"}}\n\n\
                 Please note that this is a one-time use token and it will expire in {}.\n\n\
                 Thanks,\n\nThe Cinevault Team\n",
                describe_lifetime(*expires_in)
            ),
            Self::ActivationToken {
                activation_token,
                expires_in,
            } => format!(
                "Hi,\n\n\
                 Please send a `PUT /v1/users/activated` request with the following JSON body \
                 to activate your account:\n\n\
                 {{\"token\": \"{activation_token}\"}}\n\n\
                 Please note that this is a one-time use token and it will expire in {}.\n\n\
                 Thanks,\n\nThe Cinevault Team\n",
                describe_lifetime(*expires_in)
            ),
            Self::PasswordReset {
                password_reset_token,
                expires_in,
            } => format!(
                "Hi,\n\n\
                 Please send a `PUT /v1/users/password` request with the following JSON body \
                 to set a new password:\n\n\
                 {{\"password\": \"your new password\", \"token\": \"{password_reset_token}\"}}\n\n\
                 Please note that this is a one-time use token and it will expire in {}. \
                 If you need another token please make a `POST /v1/tokens/password-reset` request.\n\n\
                 Thanks,\n\nThe Cinevault Team\n",
                describe_lifetime(*expires_in)
            ),
        }
    }
}

/// "3 days", "24 hours", "45 minutes": the largest whole unit.
fn describe_lifetime(ttl: chrono::Duration) -> String {
    const MINUTES_PER_HOUR: i64 = 60;
    const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

    let minutes = ttl.num_minutes();
    let (count, unit) = if minutes >= MINUTES_PER_DAY && minutes % MINUTES_PER_DAY == 0 {
        (minutes / MINUTES_PER_DAY, "day")
    } else if minutes >= MINUTES_PER_HOUR && minutes % MINUTES_PER_HOUR == 0 {
        (minutes / MINUTES_PER_HOUR, "hour")
    } else {
        (minutes, "minute")
    };

    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Leading characters only, enough to correlate log lines.
fn masked(token: &str) -> String {
    let shown: String = token.chars().take(4).collect();
    let hidden = token.chars().count().saturating_sub(4);
    format!("{shown}{}", "*".repeat(hidden))
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, email: &Email) -> Result<(), MailerError>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// The mailer selected by `mailer.transport`.
pub fn from_config(config: &MailerConfig) -> Result<SharedMailer, MailerError> {
    match config.transport {
        MailTransport::Smtp => {
            let mailer = SmtpMailer::new(config)?;
            info!(
                host = %config.smtp_host,
                port = config.smtp_port,
                "SMTP mailer configured"
            );
            Ok(Arc::new(mailer))
        }
        MailTransport::Log => {
            warn!("Mail transport is `log`: messages are recorded, not delivered");
            Ok(Arc::new(LogMailer::new(config.sender.clone())))
        }
    }
}

/// Sends under `timeout`. Failures are logged and swallowed: a lost email
/// must not fail the request that triggered it.
pub async fn deliver(mailer: &dyn Mailer, timeout: Duration, recipient: &str, email: &Email) {
    let outcome = match tokio::time::timeout(timeout, mailer.send(recipient, email)).await {
        Ok(result) => result,
        Err(_) => Err(MailerError::Timeout(timeout)),
    };

    match outcome {
        Ok(()) => {
            metrics::counter!("emails_sent_total", "template" => email.template()).increment(1);
        }
        Err(e) => {
            metrics::counter!("emails_failed_total", "template" => email.template()).increment(1);
            warn!(template = email.template(), error = %e, "Failed to send email");
        }
    }
}

/// Delivers over SMTP, retrying transient failures.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailerConfig) -> Result<Self, MailerError> {
        let sender: Mailbox = config.sender.parse().map_err(|e| {
            MailerError::Config(format!("invalid sender {:?}: {e}", config.sender))
        })?;

        let builder = match config.smtp_security {
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host),
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &config.smtp_host,
            )),
        }
        .map_err(|e| MailerError::Config(e.to_string()))?;

        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }

    fn message(&self, recipient: &str, email: &Email) -> Result<Message, MailerError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| MailerError::Address(format!("{recipient}: {e}")))?;

        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(email.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(email.plain_body())
            .map_err(|e| MailerError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, email: &Email) -> Result<(), MailerError> {
        let message = self.message(recipient, email)?;

        let mut attempt = 1;
        loop {
            match self.transport.send(message.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < SEND_ATTEMPTS => {
                    debug!(attempt, error = %e, "SMTP send failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(MailerError::Transport(e.to_string())),
            }
        }
    }
}

/// Records that a message would have been sent. Development only: the
/// message is not delivered and its token is masked in the log line.
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    #[must_use]
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, email: &Email) -> Result<(), MailerError> {
        info!(
            from = %self.sender,
            to = recipient,
            template = email.template(),
            subject = email.subject(),
            token = %masked(email.token()),
            "Email recorded (log transport)"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub recipient: String,
    pub email: Email,
    pub sent_at: DateTime<Utc>,
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }

    /// Most recent message delivered to `recipient`.
    pub async fn last_for(&self, recipient: &str) -> Option<SentEmail> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.recipient == recipient)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, recipient: &str, email: &Email) -> Result<(), MailerError> {
        self.sent.lock().await.push(SentEmail {
            recipient: recipient.to_string(),
            email: email.clone(),
            sent_at: Utc::now(),
        });
        Ok(())
    }
}
