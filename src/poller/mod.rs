
use std::{
    collections::HashMap,
    future::Future,
    io::Write,
    ops::ControlFlow,
    pin::Pin,
    sync::Arc,
    time::Duration,
};

use teloxide::types::ChatId;
use thiserror::Error;

use crate::{
    chat::{ChatState, ThresholdRange},
    classifier::{UpdateClassifier, UpdateEvent},
    gateway::{BotGateway, GatewayError},
    status::{CLEAR_SCREEN, StatusReport},
};

/// Errors that stop the poller.
#[derive(Debug, Error)]
pub enum PollerError {
    /// A fatal bot API failure.
    #[error("Failed to communicate with the bot API: {0}")]
    Gateway(#[from] GatewayError),
}

type Result<T> = std::result::Result<T, PollerError>;

/// Timing of the polling loop.
#[derive(Debug, Clone, Copy)]
pub struct PollerTiming {
    /// Delay between steady-state cycles.
    pub poll_interval: Duration,
    /// Delay between polls while flushing stale updates.
    pub flush_interval: Duration,
    /// Consecutive empty polls that end the flush.
    pub flush_empty_polls: usize,
}

/// Polls the bot API, tracks per-chat message counters and sends stickers.
pub struct StickerPoller {
    gateway: Arc<dyn BotGateway>,
    classifier: UpdateClassifier,
    threshold_range: ThresholdRange,
    timing: PollerTiming,
    // Active chats keyed by id.
    chats: HashMap<ChatId, ChatState>,
    // Offset for the next `getUpdates` request.
    cursor: i64,
}

impl StickerPoller {
    /// Create a new StickerPoller.
    pub fn new(
        gateway: Arc<dyn BotGateway>,
        classifier: UpdateClassifier,
        threshold_range: ThresholdRange,
        timing: PollerTiming,
    ) -> Self {
        Self { gateway, classifier, threshold_range, timing, chats: HashMap::new(), cursor: 0 }
    }

    /// Run the poller until Ctrl-C is pressed.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the poller until `shutdown` completes.
    ///
    /// `shutdown` is polled once before the first request and afterwards only
    /// while waiting between polls, so a cycle that has started always runs
    /// to completion.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        // Poll `shutdown` once up front so a signal listener is installed
        // before the first request goes out.
        if Self::pause(shutdown.as_mut(), Duration::ZERO).await.is_break() {
            tracing::info!("Shutdown requested before startup, exiting");
            return Ok(());
        }

        println!("Initializing...");
        if self.flush(shutdown.as_mut()).await?.is_break() {
            tracing::info!("Interrupted while flushing, exiting");
            return Ok(());
        }

        tracing::info!("Sticker poller started at offset {}", self.cursor);

        loop {
            self.poll_cycle().await?;
            self.show_status();

            if Self::pause(shutdown.as_mut(), self.timing.poll_interval).await.is_break() {
                println!("\nCtrl-C\nExiting!");
                tracing::info!("Shutdown requested, exiting");
                return Ok(());
            }
        }
    }

    /// Drains updates that piled up while the bot was offline without acting
    /// on them.
    async fn flush<F>(&mut self, mut shutdown: Pin<&mut F>) -> Result<ControlFlow<()>>
    where
        F: Future<Output = ()>,
    {
        let mut empty_polls = 0;

        while empty_polls < self.timing.flush_empty_polls {
            let events = self.poll().await?;

            if events.is_empty() {
                empty_polls += 1;
            } else {
                empty_polls = 0;
                tracing::debug!("Skipping {} stale event(s)", events.len());
            }

            for event in events {
                if let UpdateEvent::NextCursor(cursor) = event {
                    self.cursor = cursor;
                }
            }

            if Self::pause(shutdown.as_mut(), self.timing.flush_interval).await.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }

        tracing::info!("Flushed stale updates, next offset is {}", self.cursor);
        Ok(ControlFlow::Continue(()))
    }

    async fn poll(&self) -> Result<Vec<UpdateEvent>> {
        let raw = self.gateway.poll_updates(self.cursor).await?;
        Ok(self.classifier.classify(&raw))
    }

    /// Poll once and apply everything that came back.
    async fn poll_cycle(&mut self) -> Result<()> {
        let events = self.poll().await?;
        self.handle_events(events).await
    }

    async fn handle_events(&mut self, events: Vec<UpdateEvent>) -> Result<()> {
        for event in events {
            self.handle_event(event).await?;
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: UpdateEvent) -> Result<()> {
        match event {
            UpdateEvent::BotAdded(chat_id) => {
                tracing::info!("Added to chat {chat_id}");
                self.chats.insert(chat_id, ChatState::new(self.threshold_range));
                self.gateway.send_sticker(chat_id).await?;
            }
            UpdateEvent::BotRemoved(chat_id) => {
                if self.chats.remove(&chat_id).is_some() {
                    tracing::info!("Removed from chat {chat_id}");
                }
            }
            UpdateEvent::MessagesReceived { chat_id, count } => {
                let range = self.threshold_range;
                let chat = self.chats.entry(chat_id).or_insert_with(|| {
                    tracing::info!("Discovered chat {chat_id} through its messages");
                    ChatState::new(range)
                });
                chat.increment(count);

                if chat.threshold_exceeded() {
                    chat.reset();
                    tracing::debug!("Message threshold reached in chat {chat_id}");
                    self.gateway.send_sticker(chat_id).await?;
                }
            }
            UpdateEvent::NextCursor(cursor) => {
                self.cursor = cursor;
            }
            UpdateEvent::Mentioned(chat_id) => {
                tracing::debug!("Mentioned in chat {chat_id}");
                self.gateway.send_sticker(chat_id).await?;
                // The mentioning message is counted by `MessagesReceived` too.
                if let Some(chat) = self.chats.get_mut(&chat_id) {
                    chat.increment(-1);
                }
            }
        }
        Ok(())
    }

    /// Current state of all active chats.
    pub fn status_report(&self) -> StatusReport {
        StatusReport::from_chats(&self.chats)
    }

    fn show_status(&self) {
        let mut stdout = std::io::stdout().lock();
        let written = write!(stdout, "{CLEAR_SCREEN}{}", self.status_report())
            .and_then(|()| stdout.flush());
        if let Err(e) = written {
            tracing::warn!("Failed to draw status screen: {e}");
        }
    }

    /// Sleeps for `period` unless `shutdown` completes first.
    async fn pause<F>(shutdown: Pin<&mut F>, period: Duration) -> ControlFlow<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = shutdown => ControlFlow::Break(()),
            () = tokio::time::sleep(period) => ControlFlow::Continue(()),
        }
    }
}
