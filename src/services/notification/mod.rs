// Best-effort notifications: every delivery runs on its own task and a
// failure is only ever logged.

pub mod email;
pub mod telegram;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use handlebars::{Handlebars, TemplateError};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::app_config::{FeatureConfig, NotificationConfig};
use email::{AdminAlertEmail, EmailBuilder, EmailSender, PaymentReceivedEmail, PayoutCreatedEmail};
use telegram::TelegramSender;

pub use email::EmailError;
pub use telegram::TelegramError;

#[derive(Debug, Serialize)]
struct PaymentAlert<'a> {
    payment_id: i32,
    amount: String,
    email: &'a str,
    source: &'a str,
}

#[derive(Debug, Serialize)]
struct SubscriptionAlert<'a> {
    advertiser: &'a str,
    tv_name: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    price: String,
}

/// Register every email and Telegram template; values are HTML-escaped on render
pub(crate) fn templates() -> Result<Handlebars<'static>, TemplateError> {
    let mut templates = Handlebars::new();

    templates.register_template_string(
        "payment_received",
        include_str!("../../../templates/email/payment_received.html"),
    )?;
    templates.register_template_string(
        "payout_created",
        include_str!("../../../templates/email/payout_created.html"),
    )?;
    templates.register_template_string(
        "admin_alert",
        include_str!("../../../templates/email/admin_alert.html"),
    )?;
    templates.register_template_string(
        "telegram_payment_succeeded",
        include_str!("../../../templates/telegram/payment_succeeded.html"),
    )?;
    templates.register_template_string(
        "telegram_subscription_created",
        include_str!("../../../templates/telegram/subscription_created.html"),
    )?;

    Ok(templates)
}

#[derive(Clone)]
pub struct NotificationService {
    email: Option<EmailSender>,
    telegram: Option<TelegramSender>,
    admin_email: Option<String>,
    templates: Arc<Handlebars<'static>>,
}

impl NotificationService {
    /// Build the configured channels; a channel with missing credentials is skipped
    pub fn new(config: &NotificationConfig, features: &FeatureConfig) -> Self {
        if !features.enable_notifications {
            debug!("Notifications disabled");
            return Self::disabled();
        }

        let templates = match templates() {
            Ok(templates) => Arc::new(templates),
            Err(e) => {
                warn!("Notification templates failed to register: {}", e);
                return Self::disabled();
            },
        };

        let timeout = Duration::from_secs(config.timeout_seconds);

        let email = if config.email_api_key.is_empty() {
            debug!("Email channel not configured");
            None
        } else {
            let from = format!("{} <{}>", config.from_name, config.from_email);
            EmailSender::new(
                config.email_api_url.clone(),
                config.email_api_key.clone(),
                from,
                timeout,
            )
            .map_err(|e| warn!("Email channel unavailable: {}", e))
            .ok()
        };

        let telegram = if config.telegram_bot_token.is_empty() || config.telegram_chat_id.is_empty()
        {
            debug!("Telegram channel not configured");
            None
        } else {
            TelegramSender::new(
                config.telegram_api_url.clone(),
                config.telegram_bot_token.clone(),
                config.telegram_chat_id.clone(),
                timeout,
            )
            .map_err(|e| warn!("Telegram channel unavailable: {}", e))
            .ok()
        };

        let admin_email = Some(config.admin_email.clone()).filter(|e| !e.is_empty());

        Self {
            email,
            telegram,
            admin_email,
            templates,
        }
    }

    /// No channels at all; every notification is a no-op
    pub fn disabled() -> Self {
        Self {
            email: None,
            telegram: None,
            admin_email: None,
            templates: Arc::new(Handlebars::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.email.is_some() || self.telegram.is_some()
    }

    fn spawn_email<B: EmailBuilder>(&self, builder: B) {
        let Some(sender) = self.email.clone() else {
            debug!("Skipping email: channel not configured");
            return;
        };

        let message = match builder.build(sender.from_address(), &self.templates) {
            Ok(message) => message,
            Err(e) => {
                warn!("Email not rendered: {}", e);
                return;
            },
        };

        tokio::spawn(async move {
            if let Err(e) = sender.send_with_retry(&message).await {
                warn!("Email '{}' not delivered: {}", message.subject, e);
            }
        });
    }

    fn spawn_telegram<T: Serialize>(&self, template: &str, data: &T) {
        let Some(sender) = self.telegram.clone() else {
            debug!("Skipping Telegram alert: channel not configured");
            return;
        };

        let html = match self.templates.render(template, data) {
            Ok(html) => html.trim_end().to_string(),
            Err(e) => {
                warn!("Telegram alert '{}' not rendered: {}", template, e);
                return;
            },
        };

        tokio::spawn(async move {
            if let Err(e) = sender.send(&html).await {
                warn!("Telegram alert not delivered: {}", e);
            }
        });
    }

    /// Receipt to the advertiser plus an admin alert
    pub fn payment_succeeded(
        &self,
        user_email: &str,
        payment_id: i32,
        amount: &BigDecimal,
        new_balance: &BigDecimal,
        source: &str,
    ) {
        self.spawn_email(PaymentReceivedEmail {
            to_email: user_email,
            payment_id,
            amount,
            new_balance,
        });

        self.spawn_telegram(
            "telegram_payment_succeeded",
            &PaymentAlert {
                payment_id,
                amount: amount.to_string(),
                email: user_email,
                source,
            },
        );

        if let Some(admin) = self.admin_email.as_deref() {
            let lines = [
                format!("Платёж №{}: {} ₽", payment_id, amount),
                format!("Клиент: {}", user_email),
                format!("Источник: {}", source),
            ];
            self.spawn_email(AdminAlertEmail {
                to_email: admin,
                subject: "Оплата получена",
                lines: &lines,
            });
        }
    }

    pub fn subscription_created(
        &self,
        advertiser: &str,
        tv_name: &str,
        price: &BigDecimal,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) {
        self.spawn_telegram(
            "telegram_subscription_created",
            &SubscriptionAlert {
                advertiser,
                tv_name,
                start_date,
                end_date,
                price: price.to_string(),
            },
        );
    }

    pub fn payout_created(
        &self,
        venue_email: &str,
        payout_id: i32,
        amount: &BigDecimal,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) {
        self.spawn_email(PayoutCreatedEmail {
            to_email: venue_email,
            payout_id,
            amount,
            period: format!("{} - {}", period_start, period_end),
        });
    }
}
