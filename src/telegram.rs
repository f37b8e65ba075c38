//! Telegram Bot API transport
//!
//! Inbound updates are parsed into engine events in [`types`]; outbound
//! calls go through [`TelegramClient`], which implements the runtime's
//! `Transport` trait.

mod client;
mod error;
pub mod types;

pub use client::TelegramClient;
pub use error::TransportError;
pub use types::TgUpdate;
