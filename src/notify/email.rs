use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{Notifier, PriceAlert};
use crate::config::SmtpConfig;
use crate::utils::error::AppError;

/// Delivers alerts over SMTP. The subscriber reference is the recipient
/// email address.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AppError::Notification(format!("Invalid SMTP relay: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| AppError::Notification(format!("Invalid from address: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn format_body(&self, alert: &PriceAlert) -> String {
        let mut body = format!("{}\n\n", alert.headline());
        if let Some(previous) = alert.previous_price {
            body.push_str(&format!("Old price: ${:.2}\n", previous));
        }
        body.push_str(&format!("New price: ${:.2}\n", alert.new_price));
        if alert.change_percent.is_finite() && alert.previous_price.is_some() {
            body.push_str(&format!("Change: {:+.2}%\n", alert.change_percent));
        }
        body.push_str(&format!("\n{}\n", alert.url));
        body
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, subscriber: &str, alert: &PriceAlert) -> Result<(), AppError> {
        let to: Mailbox = subscriber
            .parse()
            .map_err(|e| AppError::Notification(format!("Invalid recipient {}: {}", subscriber, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("Price alert: {}", alert.product_name))
            .header(ContentType::TEXT_PLAIN)
            .body(self.format_body(alert))
            .map_err(|e| AppError::Notification(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Notification(format!("SMTP send failed: {}", e)))?;

        debug!("Sent email alert to {}", subscriber);
        Ok(())
    }
}
