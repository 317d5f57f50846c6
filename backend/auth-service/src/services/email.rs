use std::sync::Arc;

use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::error::Result;
use crate::security::otp::OTP_TTL_MINUTES;

/// Outbound mail. With no SMTP host configured the service runs in disabled
/// mode: sends succeed without doing anything, which keeps local development
/// and tests free of a mail server.
#[derive(Clone)]
pub struct EmailService {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: String,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        if config.smtp_host.is_empty() {
            tracing::info!("SMTP host not configured; outbound email is disabled");
            return Ok(EmailService {
                transport: None,
                from: config.smtp_from.clone(),
            });
        }

        let mut builder = if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
        };
        builder = builder.port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(EmailService {
            transport: Some(Arc::new(builder.build())),
            from: config.smtp_from.clone(),
        })
    }

    pub async fn send_verification_email(
        &self,
        to: &str,
        username: &str,
        code: &str,
    ) -> Result<()> {
        let subject = "Please verify your email address";
        let text = format!(
            "Hi {username},\n\nYour verification code is {code}. \
             It expires in {OTP_TTL_MINUTES} minutes.\n\nIf you did not create this account, you can ignore this email."
        );
        let html = format!(
            "<p>Hi {username},</p>\
             <p>Your verification code is <strong>{code}</strong>. \
             It expires in {OTP_TTL_MINUTES} minutes.</p>\
             <p>If you did not create this account, you can ignore this email.</p>"
        );
        self.send(to, subject, text, html).await
    }

    pub async fn send_password_reset_email(
        &self,
        to: &str,
        username: &str,
        code: &str,
    ) -> Result<()> {
        let subject = "Password Reset Request";
        let text = format!(
            "Hi {username},\n\nYour password reset code is {code}. \
             It expires in {OTP_TTL_MINUTES} minutes.\n\nIf you did not request a reset, you can ignore this email."
        );
        let html = format!(
            "<p>Hi {username},</p>\
             <p>Your password reset code is <strong>{code}</strong>. \
             It expires in {OTP_TTL_MINUTES} minutes.</p>\
             <p>If you did not request a reset, you can ignore this email.</p>"
        );
        self.send(to, subject, text, html).await
    }

    async fn send(&self, to: &str, subject: &str, text: String, html: String) -> Result<()> {
        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => {
                tracing::info!(to = %mask_email(to), subject, "email disabled; skipping send");
                return Ok(());
            }
        };

        let message = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))?;

        transport.send(message).await?;
        tracing::debug!(to = %mask_email(to), subject, "email sent");
        Ok(())
    }
}

/// Log-safe rendering of a recipient address.
fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if local.chars().count() > 2 => {
            let prefix: String = local.chars().take(2).collect();
            format!("{}***@{}", prefix, domain)
        }
        Some((_, domain)) => format!("***@{}", domain),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_config() -> EmailConfig {
        EmailConfig {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_from: "no-reply@gatehouse.dev".to_string(),
            use_starttls: true,
        }
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "al***@example.com");
        assert_eq!(mask_email("ab@example.com"), "***@example.com");
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn test_disabled_mode_send_is_a_no_op() {
        let service = EmailService::new(&disabled_config()).unwrap();
        let result = tokio_test::block_on(service.send_verification_email(
            "alice@example.com",
            "alice",
            "123456",
        ));
        assert!(result.is_ok());
    }

    #[test]
    fn test_configured_transport_is_created() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: "secret".to_string(),
            smtp_from: "no-reply@gatehouse.dev".to_string(),
            use_starttls: true,
        };
        let service = EmailService::new(&config).unwrap();
        assert!(service.transport.is_some());
    }
}
