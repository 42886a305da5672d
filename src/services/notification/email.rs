// Transactional email through an HTTP email API (bearer key, JSON payload)

use bigdecimal::BigDecimal;
use handlebars::Handlebars;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendError(String),

    #[error("Template rendering error: {0}")]
    TemplateError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl EmailMessage {
    pub fn new(from: String, to: Vec<String>, subject: String, html: String) -> Self {
        Self {
            from,
            to,
            subject,
            html,
            text: None,
        }
    }

    pub fn with_text(mut self, text: String) -> Self {
        self.text = Some(text);
        self
    }
}

/// Something that renders into one outgoing message
pub trait EmailBuilder {
    fn build(&self, from: &str, templates: &Handlebars) -> Result<EmailMessage, EmailError>;
}

#[derive(Debug, Serialize)]
struct PaymentReceivedEmailData {
    payment_id: i32,
    amount: String,
    new_balance: String,
}

#[derive(Debug, Serialize)]
struct PayoutCreatedEmailData<'a> {
    payout_id: i32,
    amount: String,
    period: &'a str,
}

#[derive(Debug, Serialize)]
struct AdminAlertEmailData<'a> {
    subject: &'a str,
    lines: &'a [String],
}

fn render<T: Serialize>(
    templates: &Handlebars,
    name: &str,
    data: &T,
) -> Result<String, EmailError> {
    templates
        .render(name, data)
        .map_err(|e| EmailError::TemplateError(e.to_string()))
}

pub struct PaymentReceivedEmail<'a> {
    pub to_email: &'a str,
    pub payment_id: i32,
    pub amount: &'a BigDecimal,
    pub new_balance: &'a BigDecimal,
}

impl EmailBuilder for PaymentReceivedEmail<'_> {
    #[instrument(skip(self, templates))]
    fn build(&self, from: &str, templates: &Handlebars) -> Result<EmailMessage, EmailError> {
        let data = PaymentReceivedEmailData {
            payment_id: self.payment_id,
            amount: self.amount.to_string(),
            new_balance: self.new_balance.to_string(),
        };
        let html = render(templates, "payment_received", &data)?;

        let text = format!(
            "Платёж №{} на сумму {} ₽ зачислен. Текущий баланс: {} ₽",
            data.payment_id, data.amount, data.new_balance
        );

        Ok(EmailMessage::new(
            from.to_string(),
            vec![self.to_email.to_string()],
            format!("Баланс пополнен на {} ₽", data.amount),
            html,
        )
        .with_text(text))
    }
}

pub struct PayoutCreatedEmail<'a> {
    pub to_email: &'a str,
    pub payout_id: i32,
    pub amount: &'a BigDecimal,
    pub period: String,
}

impl EmailBuilder for PayoutCreatedEmail<'_> {
    #[instrument(skip(self, templates))]
    fn build(&self, from: &str, templates: &Handlebars) -> Result<EmailMessage, EmailError> {
        let data = PayoutCreatedEmailData {
            payout_id: self.payout_id,
            amount: self.amount.to_string(),
            period: &self.period,
        };
        let html = render(templates, "payout_created", &data)?;

        Ok(EmailMessage::new(
            from.to_string(),
            vec![self.to_email.to_string()],
            format!("Выплата №{} запланирована", self.payout_id),
            html,
        ))
    }
}

/// Operational alert for the back office; lines are plain text
pub struct AdminAlertEmail<'a> {
    pub to_email: &'a str,
    pub subject: &'a str,
    pub lines: &'a [String],
}

impl EmailBuilder for AdminAlertEmail<'_> {
    fn build(&self, from: &str, templates: &Handlebars) -> Result<EmailMessage, EmailError> {
        let data = AdminAlertEmailData {
            subject: self.subject,
            lines: self.lines,
        };
        let html = render(templates, "admin_alert", &data)?;

        Ok(EmailMessage::new(
            from.to_string(),
            vec![self.to_email.to_string()],
            self.subject.to_string(),
            html,
        )
        .with_text(self.lines.join("\n")))
    }
}

#[derive(Clone)]
pub struct EmailSender {
    client: Client,
    api_key: String,
    api_url: String,
    from: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl EmailSender {
    pub fn new(
        api_url: String,
        api_key: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, EmailError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmailError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            api_url,
            from,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    #[instrument(skip(self, message), fields(to = ?message.to, subject = %message.subject))]
    pub async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                info!("Email sent successfully");
                Ok(())
            },
            Ok(res) => {
                let status = res.status();
                let error_text = res
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());

                error!(
                    "Failed to send email. Status: {}, Error: {}",
                    status, error_text
                );

                if status.as_u16() == 429 {
                    Err(EmailError::RateLimitExceeded)
                } else if status.is_server_error() {
                    Err(EmailError::ServiceUnavailable)
                } else {
                    Err(EmailError::SendError(format!(
                        "Email send failed with status {}: {}",
                        status, error_text
                    )))
                }
            },
            Err(e) => Err(EmailError::SendError(format!("Network error: {}", e))),
        }
    }

    /// Retry with exponential backoff plus up to 25% jitter; rate limits are final
    pub async fn send_with_retry(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.send(message).await {
                Ok(()) => return Ok(()),
                Err(EmailError::RateLimitExceeded) => {
                    warn!("Rate limit hit, not retrying");
                    return Err(EmailError::RateLimitExceeded);
                },
                Err(e) => {
                    warn!("Email send attempt {} failed: {:?}", attempt, e);
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                },
            }
        }

        Err(last_error.unwrap_or_else(|| {
            EmailError::SendError("Failed after maximum retry attempts".to_string())
        }))
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let max_delay = Duration::from_secs(60);
        let exp = 2_u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_delay
            .checked_mul(exp)
            .unwrap_or(max_delay)
            .min(max_delay)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base = self.base_delay(attempt);
        let jitter_millis = rand::thread_rng().gen_range(0..=(base.as_millis() / 4) as u64);
        base + Duration::from_millis(jitter_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(delay: Duration) -> EmailSender {
        EmailSender::new(
            "https://email.example.test/send".to_string(),
            "key".to_string(),
            "XK Media <noreply@xk-media.ru>".to_string(),
            Duration::from_secs(10),
        )
        .unwrap()
        .with_retry_delay(delay)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let s = sender(Duration::from_secs(2));
        assert_eq!(s.base_delay(1), Duration::from_secs(2));
        assert_eq!(s.base_delay(2), Duration::from_secs(4));
        assert_eq!(s.base_delay(3), Duration::from_secs(8));
        assert_eq!(s.base_delay(50), Duration::from_secs(60));

        let huge = sender(Duration::from_secs(u32::MAX as u64));
        assert_eq!(huge.base_delay(2), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_within_quarter() {
        let s = sender(Duration::from_secs(4));
        for _ in 0..20 {
            let d = s.backoff_delay(1);
            assert!(d >= Duration::from_secs(4) && d <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_payment_email_content() {
        let templates = crate::services::notification::templates().unwrap();
        let amount = BigDecimal::from(1500);
        let balance = BigDecimal::from(2000);
        let message = PaymentReceivedEmail {
            to_email: "ads@example.com",
            payment_id: 9,
            amount: &amount,
            new_balance: &balance,
        }
        .build("noreply@xk-media.ru", &templates)
        .unwrap();

        assert_eq!(message.to, vec!["ads@example.com"]);
        assert!(message.subject.contains("1500"));
        assert!(message.html.contains("№9"));
        assert!(message.html.contains("<b>1500 ₽</b>"));
        assert!(message.text.as_deref().unwrap_or_default().contains("2000"));

        let payload = serde_json::to_value(&message).unwrap();
        assert_eq!(payload["from"], "noreply@xk-media.ru");
    }

    #[test]
    fn test_text_omitted_when_absent() {
        let templates = crate::services::notification::templates().unwrap();
        let amount = BigDecimal::from(10);
        let message = PayoutCreatedEmail {
            to_email: "venue@example.com",
            payout_id: 3,
            amount: &amount,
            period: "2025-01-01 - 2025-01-31".to_string(),
        }
        .build("noreply@xk-media.ru", &templates)
        .unwrap();

        assert!(message.html.contains("2025-01-01 - 2025-01-31"));
        let payload = serde_json::to_value(&message).unwrap();
        assert!(payload.get("text").is_none());
    }

    #[test]
    fn test_admin_alert_escapes_markup() {
        let templates = crate::services::notification::templates().unwrap();
        let lines = vec![
            "Клиент: <script>alert(1)</script>".to_string(),
            "Источник: webhook & retry".to_string(),
        ];
        let message = AdminAlertEmail {
            to_email: "admin@xk-media.ru",
            subject: "Оплата получена",
            lines: &lines,
        }
        .build("noreply@xk-media.ru", &templates)
        .unwrap();

        assert!(!message.html.contains("<script>"));
        assert!(message.html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(message.html.contains("webhook &amp; retry"));
        // The plain-text part is left as written
        assert_eq!(
            message.text.as_deref(),
            Some("Клиент: <script>alert(1)</script>\nИсточник: webhook & retry")
        );
    }

    #[test]
    fn test_unregistered_template_is_an_error() {
        let amount = BigDecimal::from(1);
        let result = PayoutCreatedEmail {
            to_email: "venue@example.com",
            payout_id: 1,
            amount: &amount,
            period: String::new(),
        }
        .build("noreply@xk-media.ru", &Handlebars::new());

        assert!(matches!(result, Err(EmailError::TemplateError(_))));
    }
}
