//! Class timetables: admins upload, parents view

use super::{keyboards, Binding, Entry, FlowHandler, FlowResult, TurnContext, TurnResult};
use crate::i18n::{MenuButton, TextKey};
use crate::runtime::StorageError;
use crate::state_machine::{
    AdminAction, CallbackAction, CallbackKind, Effect, FlowState, IncomingMessage, Notification, StateName,
};
use async_trait::async_trait;

pub struct TimetableFlow;

#[async_trait]
impl FlowHandler for TimetableFlow {
    fn name(&self) -> &'static str {
        "timetable"
    }

    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::ParentMenu(MenuButton::Timetable),
            Binding::State(StateName::AwaitingTimetable),
            Binding::Callback(CallbackKind::Admin(AdminAction::Timetable)),
            Binding::Callback(CallbackKind::TimetableClass),
        ]
    }

    async fn start(&self, ctx: &TurnContext<'_>, _entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        let parent = ctx.require_parent()?;
        let class = match parent.class_id {
            Some(class_id) => ctx.store.class_by_id(class_id).await?,
            None => None,
        };
        let effect = match class.and_then(|c| c.timetable) {
            Some(file) => Effect::media(file, None),
            None => ctx.reply(TextKey::TimetableMissing),
        };
        Ok(TurnResult::unchanged().with_effect(effect))
    }

    async fn resume(&self, ctx: &TurnContext<'_>, state: FlowState, msg: &IncomingMessage) -> FlowResult {
        ctx.require_admin()?;
        let FlowState::AwaitingTimetable { class_id } = state else {
            tracing::warn!(state = %state.name(), "Timetable flow resumed with foreign state");
            return Ok(TurnResult::clear());
        };
        let Some(file) = msg.attachment.clone() else {
            return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::AskTimetableFile)));
        };

        match ctx.store.set_timetable(class_id, &file).await {
            Ok(()) => {}
            Err(StorageError::Missing(_)) => {
                return Ok(TurnResult::clear().with_effect(ctx.reply(TextKey::ClassNotFound)));
            }
            Err(e) => return Err(e.into()),
        }
        let class_name = ctx
            .store
            .class_by_id(class_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_default();
        tracing::info!(class_id, kind = ?file.kind, "Timetable uploaded");

        let mut notices = Vec::new();
        for user_id in ctx.store.parent_user_ids(Some(class_id)).await? {
            let lang = ctx.recipient_lang(user_id).await?;
            let text = ctx
                .localizer
                .render(lang, TextKey::TimetableUpdatedNotice, &[("class", &class_name)]);
            notices.push(Effect::notify(Notification::text(user_id, text).with_attachment(file.clone())));
        }

        Ok(TurnResult::clear()
            .with_effect(Effect::reply_with(ctx.text(TextKey::TimetableSaved), keyboards::home_for(ctx)))
            .with_effects(notices))
    }

    async fn callback(&self, ctx: &TurnContext<'_>, _state: Option<FlowState>, action: CallbackAction) -> FlowResult {
        ctx.require_admin()?;
        match action {
            CallbackAction::Admin(AdminAction::Timetable) => {
                let classes = ctx.store.classes().await?;
                let effect = if classes.is_empty() {
                    ctx.reply(TextKey::NoClassesYet)
                } else {
                    Effect::reply_with(
                        ctx.text(TextKey::ChooseTimetableClass),
                        keyboards::classes(&classes, CallbackAction::TimetableClass),
                    )
                };
                Ok(TurnResult::unchanged().with_effect(Effect::ack()).with_effect(effect))
            }
            CallbackAction::TimetableClass(class_id) => {
                if ctx.store.class_by_id(class_id).await?.is_none() {
                    return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::ClassNotFound))));
                }
                Ok(TurnResult::transition(FlowState::AwaitingTimetable { class_id })
                    .with_effect(Effect::ack())
                    .with_effect(ctx.reply(TextKey::AskTimetableFile)))
            }
            _ => Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction)))),
        }
    }
}
