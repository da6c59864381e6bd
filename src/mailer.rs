//! Outgoing account notifications.

use actix_web::web;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::config::SmtpSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug)]
pub struct MailError(pub String);

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "mail delivery failed: {}", self.0)
    }
}

impl std::error::Error for MailError {}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Sends `email`, logging instead of failing when delivery does not work out.
pub async fn deliver(mailer: &dyn Mailer, email: Email) {
    match mailer.send(&email).await {
        Ok(()) => log::info!("Sent \"{}\" to {}", email.subject, email.to),
        Err(e) => log::error!("Could not send \"{}\" to {}: {}", email.subject, email.to, e),
    }
}

/// Writes every message to the log. Used when no delivery backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        log::info!(
            "Email to {} | {}\n{}",
            email.to,
            email.subject,
            email.html
        );
        Ok(())
    }
}

/// Delivers HTML messages through an authenticated SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    sender: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// Validates the sender address and prepares a TLS relay transport. No
    /// connection is made until the first message goes out.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let sender = settings
            .sender_email
            .parse::<Mailbox>()
            .map_err(|e| MailError(format!("invalid sender address: {}", e)))?;
        let transport = SmtpTransport::relay(&settings.relay)
            .map_err(|e| MailError(format!("invalid SMTP relay {}: {}", settings.relay, e)))?
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self { sender, transport })
    }

    fn message(&self, email: &Email) -> Result<Message, MailError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| MailError(format!("invalid recipient {}: {}", email.to, e)))?;
        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| MailError(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let message = self.message(email)?;
        let transport = self.transport.clone();
        web::block(move || transport.send(&message))
            .await
            .map_err(|e| MailError(format!("SMTP task failed: {}", e)))?
            .map(|_| ())
            .map_err(|e| MailError(e.to_string()))
    }
}

/// Keeps sent messages in memory so they can be inspected.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The most recent message addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<Email> {
        self.sent().into_iter().rev().find(|email| email.to == to)
    }

    /// The six-digit code carried by the most recent message to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.last_to(to).and_then(|email| extract_code(&email.html))
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError("outbox lock poisoned".into()))?
            .push(email.clone());
        Ok(())
    }
}

fn extract_code(html: &str) -> Option<String> {
    let start = html.find("<strong>")? + "<strong>".len();
    let end = html[start..].find("</strong>")? + start;
    let code = &html[start..end];
    (code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())).then(|| code.to_string())
}

fn subject(text: &str) -> String {
    format!("Moner | {}", text)
}

pub fn verification_email(to: &str, username: &str, code: &str, ttl_minutes: u64) -> Email {
    Email {
        to: to.to_string(),
        subject: subject("Confirm your email"),
        html: format!(
            "<p>Hi {},</p>\
             <p>Your verification code is <strong>{}</strong>.</p>\
             <p>It expires in {} minutes.</p>",
            username, code, ttl_minutes
        ),
    }
}

pub fn password_reset_email(to: &str, username: &str, code: &str, ttl_minutes: u64) -> Email {
    Email {
        to: to.to_string(),
        subject: subject("Password reset"),
        html: format!(
            "<p>Hi {},</p>\
             <p>Use <strong>{}</strong> to sign in and choose a new password.</p>\
             <p>The code expires in {} minutes. Ignore this message if you did not ask for it.</p>",
            username, code, ttl_minutes
        ),
    }
}

pub fn welcome_email(to: &str, username: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: subject("Welcome"),
        html: format!(
            "<p>Welcome aboard, {}!</p><p>Your email address is confirmed.</p>",
            username
        ),
    }
}

pub fn password_changed_email(to: &str, username: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: subject("Your password was changed"),
        html: format!(
            "<p>Hi {},</p>\
             <p>The password for your account was just changed. \
             If this was not you, reset it right away.</p>",
            username
        ),
    }
}
