//! School-wide announcements

use super::{keyboards, Binding, Entry, FlowHandler, FlowResult, TurnContext, TurnResult};
use crate::i18n::{MenuButton, TextKey};
use crate::state_machine::{
    AdminAction, CallbackAction, CallbackKind, Decision, Effect, FlowState, IncomingMessage, Keyboard, Notification,
    StateName,
};
use async_trait::async_trait;

/// How many announcements a parent sees from the menu
const RECENT_LIMIT: usize = 5;

pub struct AnnouncementFlow;

impl AnnouncementFlow {
    fn confirm_prompt(ctx: &TurnContext<'_>, text: &str) -> Effect {
        Effect::reply_with(
            ctx.render(TextKey::ConfirmAnnouncement, &[("text", text)]),
            keyboards::confirm(ctx, CallbackAction::Announcement),
        )
    }

    async fn broadcast(ctx: &TurnContext<'_>, text: &str) -> FlowResult {
        let announcement = ctx.store.create_announcement(ctx.identity.user_id, text).await?;
        let recipients = ctx.store.parent_user_ids(None).await?;
        tracing::info!(
            announcement_id = announcement.id,
            recipients = recipients.len(),
            "Announcement queued"
        );

        let count = recipients.len().to_string();
        let mut notices = Vec::with_capacity(recipients.len());
        for user_id in recipients {
            let lang = ctx.recipient_lang(user_id).await?;
            let notice = ctx.localizer.render(lang, TextKey::AnnouncementNotice, &[("text", text)]);
            notices.push(Effect::notify(Notification::text(user_id, notice)));
        }

        Ok(TurnResult::clear()
            .with_effect(Effect::ack())
            .with_effect(Effect::reply_with(
                ctx.render(TextKey::AnnouncementSent, &[("count", &count)]),
                keyboards::home_for(ctx),
            ))
            .with_effects(notices))
    }
}

#[async_trait]
impl FlowHandler for AnnouncementFlow {
    fn name(&self) -> &'static str {
        "announcements"
    }

    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::ParentMenu(MenuButton::Announcements),
            Binding::State(StateName::AwaitingAnnouncementText),
            Binding::State(StateName::ConfirmingAnnouncement),
            Binding::Callback(CallbackKind::Admin(AdminAction::Announce)),
            Binding::Callback(CallbackKind::Announcement),
        ]
    }

    async fn start(&self, ctx: &TurnContext<'_>, _entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        ctx.require_parent()?;
        let items = ctx.store.recent_announcements(RECENT_LIMIT).await?;
        if items.is_empty() {
            return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::NoAnnouncements)));
        }
        let mut text = ctx.text(TextKey::RecentAnnouncements).to_string();
        for item in &items {
            text.push_str("\n\n");
            text.push_str(&item.created_at.format("%Y-%m-%d").to_string());
            text.push('\n');
            text.push_str(&item.text);
        }
        Ok(TurnResult::unchanged().with_effect(Effect::reply(text)))
    }

    async fn resume(&self, ctx: &TurnContext<'_>, state: FlowState, msg: &IncomingMessage) -> FlowResult {
        ctx.require_admin()?;
        match state {
            FlowState::AwaitingAnnouncementText => {
                let Some(text) = msg.body() else {
                    return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::TextExpected)));
                };
                Ok(TurnResult::transition(FlowState::ConfirmingAnnouncement { text: text.to_string() })
                    .with_effect(Self::confirm_prompt(ctx, text)))
            }
            FlowState::ConfirmingAnnouncement { text } => Ok(TurnResult::unchanged()
                .with_effect(ctx.reply(TextKey::UseButtons))
                .with_effect(Self::confirm_prompt(ctx, &text))),
            other => {
                tracing::warn!(state = %other.name(), "Announcement flow resumed with foreign state");
                Ok(TurnResult::clear())
            }
        }
    }

    async fn callback(&self, ctx: &TurnContext<'_>, state: Option<FlowState>, action: CallbackAction) -> FlowResult {
        ctx.require_admin()?;
        match action {
            CallbackAction::Admin(AdminAction::Announce) => Ok(TurnResult::transition(
                FlowState::AwaitingAnnouncementText,
            )
            .with_effect(Effect::ack())
            .with_effect(Effect::reply_with(ctx.text(TextKey::AskAnnouncement), Keyboard::Remove))),
            CallbackAction::Announcement(decision) => {
                let Some(FlowState::ConfirmingAnnouncement { text }) = state else {
                    return Ok(
                        TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NothingToConfirm)))
                    );
                };
                match decision {
                    Decision::Confirm => Self::broadcast(ctx, &text).await,
                    Decision::Cancel => Ok(TurnResult::clear().with_effect(Effect::ack()).with_effect(
                        Effect::reply_with(ctx.text(TextKey::Cancelled), keyboards::home_for(ctx)),
                    )),
                }
            }
            _ => Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction)))),
        }
    }
}
