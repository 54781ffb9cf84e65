use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MessageType {
    Info,
    Warning,
    Error,
    Priority,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub content: String,
}

impl StatusMessage {
    pub fn new(message_type: MessageType, content: String) -> Self {
        StatusMessage {
            timestamp: Utc::now(),
            message_type,
            content,
        }
    }
}

/// Bounded operator log shared by the capture, render and hopper threads.
///
/// Messages are also emitted as `tracing` events so a `--log-file` keeps the
/// full history after the ring has rotated.
pub struct MessageLog {
    messages: Mutex<VecDeque<StatusMessage>>,
    max_size: usize,
}

impl MessageLog {
    pub fn new(max_size: usize) -> Self {
        MessageLog {
            messages: Mutex::new(VecDeque::with_capacity(max_size)),
            max_size,
        }
    }

    pub fn add_message(&self, message: StatusMessage) {
        match message.message_type {
            MessageType::Info => tracing::info!("{}", message.content),
            MessageType::Warning => tracing::warn!("{}", message.content),
            MessageType::Error => tracing::error!("{}", message.content),
            MessageType::Priority => tracing::info!(priority = true, "{}", message.content),
        }

        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        if messages.len() == self.max_size {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    pub fn info(&self, content: impl Into<String>) {
        self.add_message(StatusMessage::new(MessageType::Info, content.into()));
    }

    pub fn warning(&self, content: impl Into<String>) {
        self.add_message(StatusMessage::new(MessageType::Warning, content.into()));
    }

    pub fn error(&self, content: impl Into<String>) {
        self.add_message(StatusMessage::new(MessageType::Error, content.into()));
    }

    /// Newest first.
    pub fn get_recent_messages(&self, count: usize) -> Vec<StatusMessage> {
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.iter().rev().take(count).cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
