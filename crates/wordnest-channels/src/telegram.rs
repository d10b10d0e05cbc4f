//! Telegram Bot channel: long polling + message sending via Bot API.

use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use wordnest_core::config::TelegramConfig;
use wordnest_core::error::{Result, WordNestError};
use wordnest_core::traits::Notifier;
use wordnest_core::types::{IncomingMessage, OutgoingMessage, ReplyMarkup, UserId};

const API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client. Shared between the poller and the notifier.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.config.bot_token)
    }

    /// Get updates after `offset` using long polling.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.config.poll_timeout.to_string()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| WordNestError::Channel(format!("Telegram getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| WordNestError::Channel(format!("Invalid Telegram response: {e}")))?;

        body.into_result("getUpdates").map(Option::unwrap_or_default)
    }

    /// Send a text message, optionally with a reply keyboard.
    pub async fn send_message(&self, chat_id: i64, text: &str, markup: &ReplyMarkup) -> Result<()> {
        let body = send_message_body(chat_id, text, markup);

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| WordNestError::Channel(format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| WordNestError::Channel(format!("Invalid send response: {e}")))?;

        result.into_result("sendMessage").map(|_| ())
    }

    /// Get bot info. Used at startup to verify the token.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| WordNestError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| WordNestError::Channel(format!("Invalid getMe response: {e}")))?;
        body.into_result("getMe")?
            .ok_or_else(|| WordNestError::Channel("No bot info".into()))
    }

    /// Start polling loop: returns a stream of IncomingMessages.
    /// The loop ends once the stream is dropped.
    pub fn start_polling(self: Arc<Self>) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let channel = self;
            let mut offset = 0i64;
            tracing::info!("Telegram polling loop started");

            loop {
                match channel.get_updates(offset).await {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            let Some(msg) = update.to_incoming() else {
                                continue;
                            };
                            if tx.send(msg).is_err() {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }

                if tx.is_closed() {
                    tracing::info!("Telegram polling stopped (receiver dropped)");
                    return;
                }
                tokio::time::sleep(tokio::time::Duration::from_secs(channel.config.poll_interval)).await;
            }
        });

        TelegramPollingStream { rx }
    }
}

/// JSON body for `sendMessage`. Plain text, no parse mode: lesson sentences are
/// sent verbatim.
fn send_message_body(chat_id: i64, text: &str, markup: &ReplyMarkup) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });
    match markup {
        ReplyMarkup::None => {}
        ReplyMarkup::Choices(choices) => {
            let keyboard: Vec<Vec<serde_json::Value>> = choices
                .iter()
                .map(|c| vec![serde_json::json!({ "text": c })])
                .collect();
            body["reply_markup"] = serde_json::json!({
                "keyboard": keyboard,
                "one_time_keyboard": true,
                "resize_keyboard": true,
            });
        }
        ReplyMarkup::Remove => {
            body["reply_markup"] = serde_json::json!({ "remove_keyboard": true });
        }
    }
    body
}

/// Stream of incoming Telegram messages from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<IncomingMessage>,
}

impl Stream for TelegramPollingStream {
    type Item = IncomingMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl Notifier for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        // Private chats share the user's id.
        self.send_message(message.user_id.0, &message.text, &message.markup)
            .await
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self, method: &str) -> Result<Option<T>> {
        if self.ok {
            return Ok(self.result);
        }
        Err(WordNestError::Channel(format!(
            "Telegram {method} error {}: {}",
            self.error_code.unwrap_or_default(),
            self.description.unwrap_or_default()
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

impl TelegramUpdate {
    /// Convert to a WordNest IncomingMessage. Only text from humans in private
    /// chats is accepted.
    pub fn to_incoming(&self) -> Option<IncomingMessage> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        let from = msg.from.as_ref()?;

        if from.is_bot || msg.chat.chat_type != "private" {
            return None;
        }

        Some(IncomingMessage {
            user_id: UserId(from.id),
            chat_id: msg.chat.id,
            sender_name: Some(format!(
                "{}{}",
                from.first_name,
                from.last_name
                    .as_deref()
                    .map(|l| format!(" {l}"))
                    .unwrap_or_default()
            )),
            text: text.clone(),
            timestamp: chrono::DateTime::from_timestamp(msg.date, 0).unwrap_or_else(chrono::Utc::now),
        })
    }
}
