// Admin chat alerts through the Telegram Bot API

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram rejected message: status={status} body={body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Clone)]
pub struct TelegramSender {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSender {
    pub fn new(
        api_url: String,
        bot_token: String,
        chat_id: String,
        timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            bot_token,
            chat_id,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_url.trim_end_matches('/'),
            self.bot_token
        )
    }

    /// Send an HTML-formatted message to the configured chat
    #[instrument(skip(self, html))]
    pub async fn send(&self, html: &str) -> Result<(), TelegramError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: html,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Telegram message delivered");
        Ok(())
    }
}
