// src/connectors/telegram.rs
use crate::connectors::traits::NotificationSink;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    http_client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: String, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid Telegram base url: {}", base_url))?;
        let endpoint = format!(
            "{}/bot{}/sendMessage",
            base.as_str().trim_end_matches('/'),
            token
        );

        Ok(Self {
            http_client: Client::new(),
            endpoint,
            chat_id,
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let reply: TelegramReply = self
            .http_client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            .context("Telegram request failed")?
            .json()
            .await
            .context("Malformed Telegram reply")?;

        if !reply.ok {
            bail!(
                "Telegram refused message: {}",
                reply.description.unwrap_or_default()
            );
        }
        Ok(())
    }
}
