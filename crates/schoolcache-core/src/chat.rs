//! Chat assistant session.
//!
//! The assistant is a placeholder: every user message gets the same canned
//! reply after a short delay. Replies are scheduled as delayed tasks owned
//! by the session and are dropped if the session ends first.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::tasks::DelayedTasks;

pub const GREETING: &str = "Hi! How can I help you today?";
pub const DEMO_REPLY: &str = "Thanks for your message! This is a demo response.";

/// Delay before the assistant answers
pub const DEFAULT_REPLY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub text: String,
    pub is_user: bool,
}

impl ChatMessage {
    fn user(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_user: true,
        }
    }

    fn bot(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_user: false,
        }
    }
}

pub struct ChatSession {
    messages: Arc<watch::Sender<Vec<ChatMessage>>>,
    tasks: DelayedTasks,
    reply_delay: Duration,
}

impl ChatSession {
    pub fn new(reply_delay: Duration) -> Self {
        let (tx, _rx) = watch::channel(vec![ChatMessage::bot(GREETING)]);
        Self {
            messages: Arc::new(tx),
            tasks: DelayedTasks::new(),
            reply_delay,
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.borrow().clone()
    }

    /// Watch the transcript; the receiver wakes on every new message
    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.subscribe()
    }

    /// Add a user message and schedule the reply. Blank input is ignored and
    /// returns `false`.
    pub fn send(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.messages.send_modify(|m| m.push(ChatMessage::user(text)));

        let messages = Arc::clone(&self.messages);
        self.tasks.schedule(self.reply_delay, async move {
            messages.send_modify(|m| m.push(ChatMessage::bot(DEMO_REPLY)));
        });
        true
    }

    pub fn pending_replies(&self) -> usize {
        self.tasks.pending()
    }

    /// Drop replies that have not been delivered yet
    pub fn close(&self) {
        self.tasks.cancel_all();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_REPLY_DELAY_MS))
    }
}
