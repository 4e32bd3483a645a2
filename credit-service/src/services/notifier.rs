//! Outbound tenant email.
//!
//! Sends are best-effort: the ledger spawns them after the state change has
//! committed and only logs failures.

use crate::config::SmtpConfig;
use crate::models::TenantAccount;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier not enabled")]
    NotEnabled,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("send failed: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), NotifyError>;

    fn is_enabled(&self) -> bool;
}

pub fn welcome_email(tenant: &TenantAccount) -> EmailMessage {
    let name = escape_html(&tenant.name);
    EmailMessage {
        to: tenant.email.clone(),
        subject: format!(
            "Welcome to Cawash, {}! Your Account is Pending Approval.",
            tenant.name
        ),
        body_text: format!(
            "Welcome to Cawash, {}!\n\nThank you for registering. Your account is pending approval \
             from our team. We've credited your account with {} free credits to get you started \
             as soon as you're approved.\n\nThe Cawash Team",
            tenant.name, tenant.credits
        ),
        body_html: format!(
            r#"<div style="font-family: sans-serif; padding: 20px; color: #333;">
  <h1 style="color: #005A9C;">Welcome to Cawash, {name}!</h1>
  <p>Thank you for registering. Your account is currently pending approval from our team.</p>
  <p>We've credited your account with <strong>{credits} free credits</strong> to get you started as soon as you're approved.</p>
  <p>You will receive another email once your account has been approved.</p>
  <p style="margin-top: 30px; font-size: 0.9em; color: #666;">The Cawash Team</p>
</div>"#,
            name = name,
            credits = tenant.credits
        ),
    }
}

pub fn approval_email(tenant: &TenantAccount, login_url: &str) -> EmailMessage {
    let name = escape_html(&tenant.name);
    EmailMessage {
        to: tenant.email.clone(),
        subject: "Your Cawash Account is Approved!".to_string(),
        body_text: format!(
            "Congratulations, {}!\n\nYour carwash account has been approved. Log in to your \
             dashboard at {} to set up your services and start managing your jobs.\n\nThe Cawash Team",
            tenant.name, login_url
        ),
        body_html: format!(
            r#"<div style="font-family: sans-serif; padding: 20px; color: #333;">
  <h1 style="color: #005A9C;">Congratulations, {name}!</h1>
  <p>We are thrilled to inform you that your carwash account has been approved.</p>
  <p>You can now log in to your dashboard to set up your services, add your team, and start managing your jobs.</p>
  <a href="{url}" style="display: inline-block; background-color: #007BFF; color: #ffffff; padding: 12px 25px; text-decoration: none; border-radius: 5px; margin-top: 20px; font-weight: bold;">Login to Your Dashboard</a>
  <p style="margin-top: 30px; font-size: 0.9em; color: #666;">Welcome aboard,<br>The Cawash Team</p>
</div>"#,
            name = name,
            url = escape_html(login_url)
        ),
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub struct SmtpNotifier {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self, NotifyError> {
        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Configuration(format!("Failed to create SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, email: &EmailMessage) -> Result<(), NotifyError> {
        let transport = self.transport.as_ref().ok_or(NotifyError::NotEnabled)?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| NotifyError::Configuration(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| NotifyError::InvalidRecipient(format!("{}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.body_text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.body_html.clone()),
                    ),
            )
            .map_err(|e| NotifyError::SendFailed(format!("Failed to build message: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| NotifyError::SendFailed(format!("Failed to send email: {}", e)))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// In-process notifier that records what it would have sent.
pub struct MockNotifier {
    fail: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            fail: false,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A notifier whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, email: &EmailMessage) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::SendFailed("mock notifier failure".to_string()));
        }

        self.send_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        tracing::info!(to = %email.to, subject = %email.subject, "[MOCK] Email would be sent");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
