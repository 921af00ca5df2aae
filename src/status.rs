use std::fmt;

use teloxide::types::ChatId;

use crate::chat::ChatState;

/// ANSI sequence that clears the terminal and moves the cursor home.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const BANNER: &str = "\
####################################
### Telegram Sticker Bot Service ###
####################################";

/// Snapshot of one chat's counter for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatStatus {
    /// Chat id.
    pub chat_id: ChatId,
    /// Messages counted since the last sticker.
    pub message_count: i64,
    /// Count at which the next sticker is sent.
    pub threshold: i64,
}

/// Snapshot of all active chats, ordered by chat id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    chats: Vec<ChatStatus>,
}

impl StatusReport {
    /// Snapshots `chats`.
    pub fn from_chats<'a>(chats: impl IntoIterator<Item = (&'a ChatId, &'a ChatState)>) -> Self {
        let mut chats: Vec<ChatStatus> = chats
            .into_iter()
            .map(|(chat_id, state)| ChatStatus {
                chat_id: *chat_id,
                message_count: state.message_count(),
                threshold: state.threshold(),
            })
            .collect();
        chats.sort_by_key(|status| status.chat_id.0);
        Self { chats }
    }

    /// Chats in the report, ordered by id.
    pub fn chats(&self) -> &[ChatStatus] {
        &self.chats
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{BANNER}\n")?;

        if self.chats.is_empty() {
            return writeln!(f, "Bot is not in any active group chat.");
        }

        writeln!(f, "Active group(s):")?;
        for chat in &self.chats {
            writeln!(
                f,
                "\t* Chat ID {}: {} messages until next sticker ({}/{})",
                chat.chat_id,
                chat.threshold - chat.message_count,
                chat.message_count,
                chat.threshold
            )?;
        }
        Ok(())
    }
}
