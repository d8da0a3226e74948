use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use crate::config::SmtpConfig;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_otp_email(
        &self,
        to_email: &str,
        otp: &str,
        valid_for_minutes: i64,
    ) -> Result<(), anyhow::Error>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_url: &str,
        valid_for_minutes: i64,
    ) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, anyhow::Error> {
        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().to_string(),
        );

        // 465 speaks TLS from the first byte; anything else upgrades with STARTTLS.
        let builder = if config.port == 465 {
            SmtpTransport::relay(&config.host)?
        } else {
            SmtpTransport::starttls_relay(&config.host)?
        };

        let mailer = builder
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        let from: Mailbox = format!("{} <{}>", config.from_name, config.user)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid sender address: {}", e))?;

        tracing::info!(host = %config.host, port = config.port, "Email service initialized with SMTP");

        Ok(Self { mailer, from })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: String,
        html_body: String,
    ) -> Result<(), anyhow::Error> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to_email
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid recipient address: {}", e))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email)).await?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(anyhow::anyhow!("SMTP delivery failed: {}", e))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_otp_email(
        &self,
        to_email: &str,
        otp: &str,
        valid_for_minutes: i64,
    ) -> Result<(), anyhow::Error> {
        let (plain, html) = otp_email_body(otp, valid_for_minutes);
        self.send_email(to_email, "Verify Your Email - Budget Buddy", plain, html)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_url: &str,
        valid_for_minutes: i64,
    ) -> Result<(), anyhow::Error> {
        let (plain, html) = reset_email_body(reset_url, valid_for_minutes);
        self.send_email(to_email, "Reset Your Password - Budget Buddy", plain, html)
            .await
    }
}

pub fn otp_email_body(otp: &str, valid_for_minutes: i64) -> (String, String) {
    let html = format!(
        r###"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #4F46E5;">Welcome to Budget Buddy!</h2>
  <p>Thank you for signing up. Please verify your email address by entering the code below:</p>
  <div style="background-color: #F3F4F6; padding: 20px; border-radius: 8px; text-align: center; margin: 20px 0;">
    <h1 style="color: #4F46E5; font-size: 32px; letter-spacing: 8px; margin: 0;">{otp}</h1>
  </div>
  <p style="color: #6B7280; font-size: 14px;">This code will expire in {valid_for_minutes} minutes.</p>
  <p style="color: #6B7280; font-size: 14px;">If you didn't create an account, please ignore this email.</p>
</div>"###
    );

    let plain = format!(
        "Welcome to Budget Buddy!\n\nYour verification code is {otp}\n\nThis code will expire in {valid_for_minutes} minutes. If you didn't create an account, please ignore this email."
    );

    (plain, html)
}

pub fn reset_email_body(reset_url: &str, valid_for_minutes: i64) -> (String, String) {
    let html = format!(
        r###"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #4F46E5;">Password Reset Request</h2>
  <p>We received a request to reset your Budget Buddy password. Click the button below to choose a new one:</p>
  <p style="text-align: center; margin: 30px 0;">
    <a href="{reset_url}" style="background-color: #4F46E5; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">Reset Password</a>
  </p>
  <p style="color: #6B7280; font-size: 14px;">Or copy this link into your browser: {reset_url}</p>
  <p style="color: #6B7280; font-size: 14px;">This link will expire in {valid_for_minutes} minutes. If you didn't request a reset, please ignore this email.</p>
</div>"###
    );

    let plain = format!(
        "Password Reset Request\n\nVisit the following link to choose a new password:\n\n{reset_url}\n\nThis link will expire in {valid_for_minutes} minutes. If you didn't request a reset, please ignore this email."
    );

    (plain, html)
}

/// Development sender used when SMTP is not configured. Writes the message
/// to the log instead of delivering it.
#[derive(Clone, Default)]
pub struct ConsoleEmailService;

#[async_trait]
impl EmailProvider for ConsoleEmailService {
    async fn send_otp_email(
        &self,
        to_email: &str,
        otp: &str,
        valid_for_minutes: i64,
    ) -> Result<(), anyhow::Error> {
        tracing::warn!(
            to = %to_email,
            otp = %otp,
            valid_for_minutes,
            "SMTP not configured, OTP email not delivered"
        );
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_url: &str,
        valid_for_minutes: i64,
    ) -> Result<(), anyhow::Error> {
        tracing::warn!(
            to = %to_email,
            reset_url = %reset_url,
            valid_for_minutes,
            "SMTP not configured, password reset email not delivered"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    Otp { to: String, otp: String },
    PasswordReset { to: String, reset_url: String },
}

/// Records every message and can be switched into a failing mode.
#[derive(Clone, Default)]
pub struct MockEmailService {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    failing: Arc<AtomicBool>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Most recent OTP sent to `email`.
    pub fn last_otp(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            SentEmail::Otp { to, otp } if to == email => Some(otp),
            _ => None,
        })
    }

    /// Token from the most recent reset link sent to `email`.
    pub fn last_reset_token(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            SentEmail::PasswordReset { to, reset_url } if to == email => reset_url
                .split_once("token=")
                .map(|(_, token)| token.to_string()),
            _ => None,
        })
    }

    fn record(&self, email: SentEmail) -> Result<(), anyhow::Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("mock transport is down"));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_otp_email(
        &self,
        to_email: &str,
        otp: &str,
        _valid_for_minutes: i64,
    ) -> Result<(), anyhow::Error> {
        self.record(SentEmail::Otp {
            to: to_email.to_string(),
            otp: otp.to_string(),
        })
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_url: &str,
        _valid_for_minutes: i64,
    ) -> Result<(), anyhow::Error> {
        self.record(SentEmail::PasswordReset {
            to: to_email.to_string(),
            reset_url: reset_url.to_string(),
        })
    }
}
