//! Conversation state machine
//!
//! Flow states are a tagged union: each step carries exactly the fields
//! that step may read, so a handler can never observe data left behind by
//! an unrelated flow.

pub mod callback;
mod effect;
pub mod event;
pub mod state;

#[cfg(test)]
mod proptests;

pub use callback::{AdminAction, CallbackAction, CallbackKind, Decision};
pub use effect::{Effect, InlineButton, Keyboard, Notification, ReplyButton};
pub use event::{CallbackQuery, ChatId, Command, FileRef, IncomingMessage, MediaKind, Update, UpdateKind, UserId, UserProfile};
pub use state::{FeedbackKind, FlowState, StateName};
