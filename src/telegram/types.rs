//! Bot API wire types and their conversion into engine events

use crate::state_machine::{
    CallbackQuery, FileRef, IncomingMessage, Keyboard, Update, UpdateKind, UserProfile,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
pub struct TgResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
    pub parameters: Option<TgResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct TgResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    pub message: Option<TgMessage>,
    pub callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgContact {
    pub phone_number: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgPhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgDocument {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub chat: TgChat,
    pub from: Option<TgUser>,
    pub text: Option<String>,
    pub contact: Option<TgContact>,
    pub photo: Option<Vec<TgPhotoSize>>,
    pub document: Option<TgDocument>,
}

impl TgMessage {
    /// Largest photo size, or the document, attached to this message
    pub fn attachment(&self) -> Option<FileRef> {
        if let Some(best) = self
            .photo
            .as_deref()
            .and_then(|sizes| sizes.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height)))
        {
            return Some(FileRef::photo(best.file_id.clone()));
        }
        self.document
            .as_ref()
            .map(|d| FileRef::document(d.file_id.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<TgMessage>,
    pub data: Option<String>,
}

impl From<TgUser> for UserProfile {
    fn from(user: TgUser) -> Self {
        UserProfile {
            user_id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            language_code: user.language_code,
        }
    }
}

impl TgUpdate {
    /// Convert into an engine event. Anything the engine does not handle
    /// (edits, channel posts, bot senders) becomes [`UpdateKind::Ignored`].
    pub fn into_update(self) -> Update {
        let update_id = self.update_id;
        let kind = if let Some(message) = self.message {
            message_kind(message)
        } else if let Some(query) = self.callback_query {
            callback_kind(query)
        } else {
            UpdateKind::Ignored
        };
        Update { update_id, kind }
    }
}

fn message_kind(message: TgMessage) -> UpdateKind {
    let attachment = message.attachment();
    let TgMessage {
        chat,
        from,
        text,
        contact,
        ..
    } = message;
    let Some(from) = from.filter(|u| !u.is_bot) else {
        return UpdateKind::Ignored;
    };
    // Only a contact the sender shared about themselves counts
    let contact_phone = contact
        .filter(|c| c.user_id == Some(from.id))
        .map(|c| c.phone_number);

    UpdateKind::Message(IncomingMessage {
        chat_id: chat.id,
        from: from.into(),
        text,
        contact_phone,
        attachment,
    })
}

fn callback_kind(query: TgCallbackQuery) -> UpdateKind {
    let Some(data) = query.data else {
        return UpdateKind::Ignored;
    };
    let chat_id = query.message.as_ref().map_or(query.from.id, |m| m.chat.id);
    UpdateKind::Callback(CallbackQuery {
        id: query.id,
        chat_id,
        from: query.from.into(),
        data,
    })
}

/// `reply_markup` object for a keyboard
pub fn reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Reply(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| {
                            if b.request_contact {
                                json!({ "text": b.text, "request_contact": true })
                            } else {
                                json!({ "text": b.text })
                            }
                        })
                        .collect()
                })
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
        Keyboard::Inline(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.text, "callback_data": b.data }))
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
        Keyboard::Remove => json!({ "remove_keyboard": true }),
    }
}
