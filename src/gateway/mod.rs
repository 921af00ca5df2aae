
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use rand::seq::SliceRandom;
use reqwest::{Client, StatusCode};
use teloxide::types::ChatId;
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Errors talking to the bot API. All of them are fatal to the poller.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request could not be sent or its response not read.
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// Endpoint that was called.
        url: Url,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// The API answered with a non-success status.
    #[error("Request to {url} returned HTTP {status}: {body}")]
    Status {
        /// Endpoint that was called.
        url: Url,
        /// Response status.
        status: StatusCode,
        /// Response body, empty if it could not be read.
        body: String,
    },
    /// An endpoint URL could not be built from the base URL.
    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// There is no sticker to send.
    #[error("The sticker pool is empty")]
    EmptyStickerPool,
}

type Result<T> = std::result::Result<T, GatewayError>;

/// The bot API operations the poller relies on.
#[automock]
#[async_trait]
pub trait BotGateway: Send + Sync {
    /// Requests updates starting at `offset` and returns the raw response body.
    async fn poll_updates(&self, offset: i64) -> Result<String>;

    /// Sends a random sticker from the pool to the chat.
    async fn send_sticker(&self, chat_id: ChatId) -> Result<()>;
}

/// [`BotGateway`] talking to the Telegram bot HTTP API.
#[derive(Clone)]
pub struct TelegramGateway {
    client: Client,
    get_updates_url: Url,
    send_sticker_url: Url,
    sticker_pool: Vec<String>,
    long_poll_timeout: u64,
}

impl TelegramGateway {
    /// Builds the HTTP client and endpoint URLs from `config`.
    pub fn new(config: &Config) -> Result<Self> {
        if config.sticker_pool.is_empty() {
            return Err(GatewayError::EmptyStickerPool);
        }

        let client = Client::builder()
            .timeout(config.request_timeout + Duration::from_secs(config.long_poll_timeout))
            .build()
            .map_err(GatewayError::Client)?;
        tracing::debug!("HTTP client built successfully.");

        Ok(Self {
            client,
            get_updates_url: config.api_base_url.join("getUpdates")?,
            send_sticker_url: config.api_base_url.join("sendSticker")?,
            sticker_pool: config.sticker_pool.clone(),
            long_poll_timeout: config.long_poll_timeout,
        })
    }

    fn poll_form(&self, offset: i64) -> Vec<(&'static str, String)> {
        let mut form = vec![("offset", offset.to_string())];
        if self.long_poll_timeout > 0 {
            form.push(("timeout", self.long_poll_timeout.to_string()));
        }
        form
    }

    fn pick_sticker(&self) -> Result<&str> {
        self.sticker_pool
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .ok_or(GatewayError::EmptyStickerPool)
    }

    fn transport_error(url: &Url) -> impl FnOnce(reqwest::Error) -> GatewayError + '_ {
        move |source| GatewayError::Transport { url: url.clone(), source }
    }
}

#[async_trait]
impl BotGateway for TelegramGateway {
    async fn poll_updates(&self, offset: i64) -> Result<String> {
        let url = &self.get_updates_url;
        tracing::debug!("Polling updates with offset {offset}");

        let resp = self
            .client
            .post(url.clone())
            .form(&self.poll_form(offset))
            .send()
            .await
            .map_err(Self::transport_error(url))?;

        // Error statuses still carry a JSON body with `ok: false`, which the
        // classifier handles.
        if !resp.status().is_success() {
            tracing::warn!("getUpdates returned HTTP {}", resp.status());
        }

        resp.text().await.map_err(Self::transport_error(url))
    }

    async fn send_sticker(&self, chat_id: ChatId) -> Result<()> {
        let url = &self.send_sticker_url;
        let sticker = self.pick_sticker()?;
        tracing::debug!("Sending sticker {sticker} to chat {chat_id}");

        let resp = self
            .client
            .post(url.clone())
            .form(&[("chat_id", chat_id.0.to_string()), ("sticker", sticker.to_string())])
            .send()
            .await
            .map_err(Self::transport_error(url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("Failed to read response text: {e}. Using empty fallback.");
                    String::new()
                }
            };
            return Err(GatewayError::Status { url: url.clone(), status, body });
        }

        Ok(())
    }
}
