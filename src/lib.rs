#![warn(missing_docs)]
//! A Telegram bot that celebrates chat activity with stickers.
//!
//! The bot polls the Bot API for updates, counts messages per group chat and
//! sends a random sticker once a chat reaches its randomly drawn message
//! threshold, when the bot is mentioned, and when it joins a chat.

/// Per-chat message counters.
pub mod chat;
/// Turning raw update batches into events.
pub mod classifier;
/// The configuration for the application.
pub mod config;
/// The client for the bot HTTP API.
pub mod gateway;
/// The polling loop dispatching events to chat counters.
pub mod poller;
/// Console status screen.
pub mod status;

use std::sync::Arc;

use crate::{
    classifier::UpdateClassifier,
    config::Config,
    gateway::TelegramGateway,
    poller::{PollerTiming, StickerPoller},
};

/// Runs the bot.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    tracing::debug!(
        "Loaded configuration with {} sticker(s), threshold range {}..={}",
        config.sticker_pool.len(),
        config.threshold_range.min(),
        config.threshold_range.max()
    );

    let gateway = Arc::new(TelegramGateway::new(&config)?);
    let classifier = UpdateClassifier::new(config.bot_id, config.bot_handle.clone());

    let mut poller = StickerPoller::new(
        gateway,
        classifier,
        config.threshold_range,
        PollerTiming {
            poll_interval: config.poll_interval,
            flush_interval: config.flush_interval,
            flush_empty_polls: config.flush_empty_polls,
        },
    );

    poller.run().await?;

    Ok(())
}
