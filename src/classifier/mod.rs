
use std::collections::HashMap;

use serde::Deserialize;
use teloxide::types::{ChatId, UserId};
use thiserror::Error;

/// A single event extracted from a batch of updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateEvent {
    /// The bot joined the chat.
    BotAdded(ChatId),
    /// The bot left or was removed from the chat.
    BotRemoved(ChatId),
    /// `count` regular messages arrived in the chat within one batch.
    MessagesReceived {
        /// The chat the messages were sent to.
        chat_id: ChatId,
        /// Number of messages in the batch.
        count: i64,
    },
    /// At least one message in the batch contained the bot's handle.
    Mentioned(ChatId),
    /// The offset to request on the next poll.
    NextCursor(i64),
}

/// Why a batch was discarded.
#[derive(Debug, Error)]
pub(crate) enum ClassifierError {
    #[error("Failed to parse updates response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Updates request was rejected: {}", .0.as_deref().unwrap_or("no description"))]
    Rejected(Option<String>),
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<RawUpdate>,
    description: Option<String>,
}

/// One update record as returned by `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUpdate {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// The new message, if this update carries one.
    pub message: Option<RawMessage>,
}

/// The subset of a message the classifier looks at.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    /// Chat the message was sent to.
    pub chat: RawChat,
    /// User who joined the chat, for service messages.
    pub new_chat_participant: Option<RawUser>,
    /// User who left or was removed from the chat, for service messages.
    pub left_chat_participant: Option<RawUser>,
    /// Message text.
    pub text: Option<String>,
}

/// A chat reference inside a message.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChat {
    /// Chat id.
    pub id: i64,
}

/// A user reference inside a message.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    /// User id.
    pub id: u64,
}

/// Turns raw `getUpdates` responses into [`UpdateEvent`]s.
#[derive(Debug, Clone)]
pub struct UpdateClassifier {
    bot_id: UserId,
    bot_handle: String,
}

impl UpdateClassifier {
    /// Creates a classifier recognising `bot_id` and mentions of `bot_handle`.
    pub fn new(bot_id: UserId, bot_handle: impl Into<String>) -> Self {
        Self { bot_id, bot_handle: bot_handle.into() }
    }

    /// Classifies a raw response body.
    ///
    /// A response that cannot be parsed or that reports `ok: false` yields no
    /// events, so the cursor stays where it was and the same updates are
    /// requested again on the next poll.
    pub fn classify(&self, raw: &str) -> Vec<UpdateEvent> {
        match Self::decode(raw) {
            Ok(updates) => self.classify_updates(&updates),
            Err(e) => {
                tracing::warn!("Discarding updates batch: {e}");
                Vec::new()
            }
        }
    }

    fn decode(raw: &str) -> Result<Vec<RawUpdate>, ClassifierError> {
        let response: UpdatesResponse = serde_json::from_str(raw)?;
        if !response.ok {
            return Err(ClassifierError::Rejected(response.description));
        }
        Ok(response.result)
    }

    /// Classifies an already decoded batch.
    ///
    /// Events come out grouped: mentions, then membership changes in arrival
    /// order, then one aggregated message count per chat. A non-empty batch
    /// always ends with [`UpdateEvent::NextCursor`] pointing one past the
    /// highest update id seen.
    pub fn classify_updates(&self, updates: &[RawUpdate]) -> Vec<UpdateEvent> {
        let mut highest_update_id = 0;
        let mut membership = Vec::new();
        let mut message_counts: HashMap<ChatId, i64> = HashMap::new();
        let mut mentioned: HashMap<ChatId, UpdateEvent> = HashMap::new();

        for update in updates {
            if let Some(message) = &update.message {
                let chat_id = ChatId(message.chat.id);

                if self.is_bot(message.new_chat_participant.as_ref()) {
                    membership.push(UpdateEvent::BotAdded(chat_id));
                } else if self.is_bot(message.left_chat_participant.as_ref()) {
                    membership.push(UpdateEvent::BotRemoved(chat_id));
                } else {
                    *message_counts.entry(chat_id).or_insert(0) += 1;

                    if message.text.as_deref().is_some_and(|text| text.contains(&self.bot_handle))
                    {
                        mentioned.insert(chat_id, UpdateEvent::Mentioned(chat_id));
                    }
                }
            }

            highest_update_id = highest_update_id.max(update.update_id);
        }

        let mut events: Vec<UpdateEvent> = mentioned.into_values().collect();
        events.extend(membership);
        events.extend(
            message_counts
                .into_iter()
                .map(|(chat_id, count)| UpdateEvent::MessagesReceived { chat_id, count }),
        );

        if !updates.is_empty() {
            events.push(UpdateEvent::NextCursor(highest_update_id + 1));
        }

        tracing::debug!("Classified {} update(s) into {} event(s)", updates.len(), events.len());
        events
    }

    fn is_bot(&self, user: Option<&RawUser>) -> bool {
        user.is_some_and(|user| UserId(user.id) == self.bot_id)
    }
}
