//! Effects produced by flow handlers

use super::event::{ChatId, FileRef};

/// Button of a reply keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyButton {
    pub text: String,
    pub request_contact: bool,
}

impl ReplyButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: false,
        }
    }

    pub fn contact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: true,
        }
    }
}

/// Button of an inline keyboard; `data` is the wire form of a callback action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, action: &super::CallbackAction) -> Self {
        Self {
            text: text.into(),
            data: action.to_data(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    Reply(Vec<Vec<ReplyButton>>),
    Inline(Vec<Vec<InlineButton>>),
    /// Hide a previously shown reply keyboard
    Remove,
}

impl Keyboard {
    /// One inline button per row
    pub fn inline_column(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Keyboard::Inline(buttons.into_iter().map(|b| vec![b]).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Keyboard::Reply(rows) => rows.iter().all(Vec::is_empty),
            Keyboard::Inline(rows) => rows.iter().all(Vec::is_empty),
            Keyboard::Remove => false,
        }
    }
}

/// A message for someone other than the sender of the current update.
/// Delivered through the outbox so a slow recipient never blocks a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub attachment: Option<FileRef>,
}

impl Notification {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: None,
            attachment: None,
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, file: FileRef) -> Self {
        self.attachment = Some(file);
        self
    }
}

/// Effects to be executed after the state change of a turn is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a message to the chat the update came from
    Reply {
        text: String,
        keyboard: Option<Keyboard>,
    },

    /// Send a stored photo or document to the current chat
    ReplyMedia {
        file: FileRef,
        caption: Option<String>,
    },

    /// Acknowledge the pressed inline button, optionally with a toast
    AnswerCallback { text: Option<String> },

    /// Queue a message for another user
    Notify(Notification),
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn reply_with(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::Reply {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    pub fn media(file: FileRef, caption: Option<String>) -> Self {
        Effect::ReplyMedia { file, caption }
    }

    pub fn toast(text: impl Into<String>) -> Self {
        Effect::AnswerCallback {
            text: Some(text.into()),
        }
    }

    pub fn ack() -> Self {
        Effect::AnswerCallback { text: None }
    }

    pub fn notify(notification: Notification) -> Self {
        Effect::Notify(notification)
    }
}
