//! Inbound events delivered by the chat transport

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Stable numeric identifier of a transport user
pub type UserId = i64;

/// Identifier of the chat a reply goes to
pub type ChatId = i64;

/// Profile fields the transport attaches to every event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: UserId, first_name: impl Into<String>) -> Self {
        Self {
            user_id,
            first_name: first_name.into(),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

/// How a stored file must be re-sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Document,
}

/// Transport-side reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub kind: MediaKind,
    pub file_id: String,
}

impl FileRef {
    pub fn photo(file_id: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Photo,
            file_id: file_id.into(),
        }
    }

    pub fn document(file_id: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Document,
            file_id: file_id.into(),
        }
    }
}

/// A free-form message (text, shared contact or file)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub from: UserProfile,
    pub text: Option<String>,
    /// Phone number of a contact the sender shared about themselves
    pub contact_phone: Option<String>,
    pub attachment: Option<FileRef>,
}

impl IncomingMessage {
    pub fn text(chat_id: ChatId, from: UserProfile, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            from,
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn contact(chat_id: ChatId, from: UserProfile, phone: impl Into<String>) -> Self {
        Self {
            chat_id,
            from,
            contact_phone: Some(phone.into()),
            ..Self::default()
        }
    }

    pub fn file(chat_id: ChatId, from: UserProfile, file: FileRef) -> Self {
        Self {
            chat_id,
            from,
            attachment: Some(file),
            ..Self::default()
        }
    }

    /// Trimmed, non-empty text body
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn command(&self) -> Option<Command> {
        self.text.as_deref().and_then(Command::parse)
    }
}

/// A button press on an inline keyboard
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallbackQuery {
    pub id: String,
    pub chat_id: ChatId,
    pub from: UserProfile,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(IncomingMessage),
    Callback(CallbackQuery),
    /// Anything else the transport reports (edits, joins, polls)
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
}

impl Update {
    pub fn message(update_id: i64, message: IncomingMessage) -> Self {
        Self {
            update_id,
            kind: UpdateKind::Message(message),
        }
    }

    pub fn callback(update_id: i64, query: CallbackQuery) -> Self {
        Self {
            update_id,
            kind: UpdateKind::Callback(query),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match &self.kind {
            UpdateKind::Message(m) => Some(m.from.user_id),
            UpdateKind::Callback(c) => Some(c.from.user_id),
            UpdateKind::Ignored => None,
        }
    }
}

/// Explicit slash commands; these bypass any stored flow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Cancel,
    Help,
    Menu,
}

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^/([A-Za-z_]+)(?:@[A-Za-z0-9_]+)?(?:\s.*)?$").expect("command regex is valid")
});

impl Command {
    pub const ALL: [Command; 4] = [Command::Start, Command::Cancel, Command::Help, Command::Menu];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Cancel => "cancel",
            Command::Help => "help",
            Command::Menu => "menu",
        }
    }

    /// Parse `/name`, `/name@bot` or `/name payload`; case-insensitive.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = COMMAND_RE.captures(text.trim())?;
        let name = caps.get(1)?.as_str().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("  /cancel  "), Some(Command::Cancel));
        assert_eq!(Command::parse("/START"), Some(Command::Start));
        assert_eq!(Command::parse("/start@school_desk_bot"), Some(Command::Start));
        assert_eq!(Command::parse("/start ref-42"), Some(Command::Start));
        assert_eq!(Command::parse("/menu"), Some(Command::Menu));
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse("please /start"), None);
        assert_eq!(Command::parse("/startnow"), None);
    }

    #[test]
    fn test_command_with_multiline_payload() {
        assert_eq!(Command::parse("/start hi\nthere"), Some(Command::Start));
        assert_eq!(Command::parse("/cancel\nnever mind"), Some(Command::Cancel));
        assert_eq!(Command::parse("/help@school_desk_bot line one\r\nline two"), Some(Command::Help));
    }

    #[test]
    fn test_body_trims_and_drops_empty() {
        let from = UserProfile::new(1, "A");
        assert_eq!(IncomingMessage::text(1, from.clone(), "  hi ").body(), Some("hi"));
        assert_eq!(IncomingMessage::text(1, from.clone(), "   ").body(), None);
        assert_eq!(IncomingMessage::contact(1, from, "+1").body(), None);
    }

    #[test]
    fn test_display_name() {
        let mut profile = UserProfile::new(1, "Aziza");
        assert_eq!(profile.display_name(), "Aziza");
        profile.last_name = Some("Karimova".into());
        assert_eq!(profile.display_name(), "Aziza Karimova");
    }
}
