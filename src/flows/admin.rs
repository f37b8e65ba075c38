//! Admin panel: classes, teachers and the feedback inbox

use super::{keyboards, Binding, Entry, FlowHandler, FlowResult, TurnContext, TurnResult};
use crate::db::{Feedback, NewTeacher};
use crate::i18n::{MenuButton, TextKey};
use crate::runtime::identity::normalize_phone;
use crate::runtime::StorageError;
use crate::state_machine::{
    AdminAction, CallbackAction, CallbackKind, Effect, FeedbackKind, FlowState, IncomingMessage, StateName,
};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// How many feedback entries the inbox shows
const INBOX_LIMIT: usize = 10;

pub struct AdminFlow;

impl AdminFlow {
    async fn class_list(ctx: &TurnContext<'_>) -> Result<Effect, StorageError> {
        let classes = ctx.store.classes().await?;
        if classes.is_empty() {
            return Ok(ctx.reply(TextKey::NoClassesYet));
        }
        Ok(Effect::reply_with(
            ctx.text(TextKey::ClassList),
            keyboards::classes(&classes, CallbackAction::DeleteClass),
        ))
    }

    async fn teacher_classes_prompt(ctx: &TurnContext<'_>, selected: &BTreeSet<i64>) -> Result<Effect, StorageError> {
        let classes = ctx.store.classes().await?;
        let keyboard = keyboards::toggles(
            classes.iter().map(|c| (c.id, c.name.as_str())),
            selected,
            CallbackAction::TeacherClassToggle,
            (ctx.text(TextKey::DoneButton), CallbackAction::TeacherClassesDone),
        );
        Ok(Effect::reply_with(ctx.text(TextKey::ChooseTeacherClasses), keyboard))
    }

    async fn inbox(ctx: &TurnContext<'_>, kind: FeedbackKind) -> Result<Effect, StorageError> {
        let items = ctx.store.recent_feedback(kind, INBOX_LIMIT).await?;
        if items.is_empty() {
            return Ok(ctx.reply(TextKey::NoFeedback));
        }
        let header = match kind {
            FeedbackKind::Complaint => TextKey::RecentComplaints,
            FeedbackKind::Proposal => TextKey::RecentProposals,
        };
        Ok(Effect::reply(format_inbox(ctx.text(header), &items)))
    }

    async fn panel_action(&self, ctx: &TurnContext<'_>, action: AdminAction) -> FlowResult {
        let result = match action {
            AdminAction::Classes => TurnResult::unchanged().with_effect(Self::class_list(ctx).await?),
            AdminAction::AddClass => {
                TurnResult::transition(FlowState::AwaitingClassName).with_effect(ctx.reply(TextKey::AskClassName))
            }
            AdminAction::AddTeacher => TurnResult::transition(FlowState::AwaitingTeacherPhone)
                .with_effect(ctx.reply(TextKey::AskTeacherPhone)),
            AdminAction::Complaints => {
                TurnResult::unchanged().with_effect(Self::inbox(ctx, FeedbackKind::Complaint).await?)
            }
            AdminAction::Proposals => {
                TurnResult::unchanged().with_effect(Self::inbox(ctx, FeedbackKind::Proposal).await?)
            }
            // Owned by the timetable and announcement flows
            AdminAction::Timetable | AdminAction::Announce => {
                TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction)))
            }
        };
        Ok(result.with_effect(Effect::ack()))
    }

    async fn delete_class(&self, ctx: &TurnContext<'_>, class_id: i64) -> FlowResult {
        if !ctx.store.delete_class(class_id).await? {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::ClassNotFound))));
        }
        tracing::info!(class_id, admin = ctx.identity.user_id, "Class deleted");
        Ok(TurnResult::unchanged()
            .with_effect(Effect::toast(ctx.text(TextKey::ClassDeleted)))
            .with_effect(Self::class_list(ctx).await?))
    }

    async fn toggle_class(&self, ctx: &TurnContext<'_>, state: Option<FlowState>, class_id: i64) -> FlowResult {
        let Some(FlowState::AwaitingTeacherClasses {
            phone,
            full_name,
            mut class_ids,
        }) = state
        else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NothingToConfirm))));
        };
        if ctx.store.class_by_id(class_id).await?.is_none() {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::ClassNotFound))));
        }
        if !class_ids.remove(&class_id) {
            class_ids.insert(class_id);
        }
        let prompt = Self::teacher_classes_prompt(ctx, &class_ids).await?;
        Ok(TurnResult::transition(FlowState::AwaitingTeacherClasses {
            phone,
            full_name,
            class_ids,
        })
        .with_effect(Effect::ack())
        .with_effect(prompt))
    }

    async fn finish_teacher(&self, ctx: &TurnContext<'_>, state: Option<FlowState>) -> FlowResult {
        let Some(FlowState::AwaitingTeacherClasses {
            phone,
            full_name,
            class_ids,
        }) = state
        else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NothingToConfirm))));
        };
        let new = NewTeacher {
            phone,
            full_name,
            class_ids: class_ids.into_iter().collect(),
        };
        match ctx.store.create_teacher(&new).await {
            Ok(teacher) => {
                tracing::info!(teacher_id = teacher.id, classes = new.class_ids.len(), "Teacher created");
                Ok(TurnResult::clear().with_effect(Effect::ack()).with_effect(Effect::reply_with(
                    ctx.render(TextKey::TeacherCreated, &[("name", &teacher.full_name)]),
                    keyboards::home_for(ctx),
                )))
            }
            Err(StorageError::Conflict(_)) => Ok(TurnResult::clear()
                .with_effect(Effect::ack())
                .with_effect(Effect::reply_with(ctx.text(TextKey::TeacherExists), keyboards::home_for(ctx)))),
            Err(e) => Err(e.into()),
        }
    }
}

fn format_inbox(header: &str, items: &[Feedback]) -> String {
    let mut out = header.to_string();
    for item in items {
        out.push_str(&format!("\n\n{} · {}", item.created_at.format("%Y-%m-%d %H:%M"), item.text));
    }
    out
}

#[async_trait]
impl FlowHandler for AdminFlow {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::Shortcut(MenuButton::AdminPanel),
            Binding::State(StateName::AwaitingClassName),
            Binding::State(StateName::AwaitingTeacherPhone),
            Binding::State(StateName::AwaitingTeacherName),
            Binding::State(StateName::AwaitingTeacherClasses),
            Binding::Callback(CallbackKind::Admin(AdminAction::Classes)),
            Binding::Callback(CallbackKind::Admin(AdminAction::AddClass)),
            Binding::Callback(CallbackKind::Admin(AdminAction::AddTeacher)),
            Binding::Callback(CallbackKind::Admin(AdminAction::Complaints)),
            Binding::Callback(CallbackKind::Admin(AdminAction::Proposals)),
            Binding::Callback(CallbackKind::DeleteClass),
            Binding::Callback(CallbackKind::TeacherClassToggle),
            Binding::Callback(CallbackKind::TeacherClassesDone),
        ]
    }

    async fn start(&self, ctx: &TurnContext<'_>, _entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        ctx.require_admin()?;
        Ok(TurnResult::clear().with_effect(Effect::reply_with(
            ctx.text(TextKey::AdminPanelTitle),
            keyboards::admin_panel(ctx),
        )))
    }

    async fn resume(&self, ctx: &TurnContext<'_>, state: FlowState, msg: &IncomingMessage) -> FlowResult {
        ctx.require_admin()?;
        match state {
            FlowState::AwaitingClassName => {
                let Some(name) = msg.body() else {
                    return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::TextExpected)));
                };
                match ctx.store.create_class(name).await {
                    Ok(class) => {
                        tracing::info!(class_id = class.id, name = %class.name, "Class created");
                        Ok(TurnResult::clear().with_effect(Effect::reply_with(
                            ctx.render(TextKey::ClassCreated, &[("class", &class.name)]),
                            keyboards::admin_panel(ctx),
                        )))
                    }
                    Err(StorageError::Conflict(_)) => Ok(TurnResult::unchanged()
                        .with_effect(Effect::reply(ctx.render(TextKey::ClassExists, &[("class", name)])))),
                    Err(e) => Err(e.into()),
                }
            }

            FlowState::AwaitingTeacherPhone => {
                let Some(phone) = msg.body().and_then(normalize_phone) else {
                    return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::InvalidPhone)));
                };
                if ctx.store.teacher_by_phone(&phone).await?.is_some() {
                    return Ok(TurnResult::clear().with_effect(Effect::reply_with(
                        ctx.text(TextKey::TeacherExists),
                        keyboards::home_for(ctx),
                    )));
                }
                Ok(TurnResult::transition(FlowState::AwaitingTeacherName { phone })
                    .with_effect(ctx.reply(TextKey::AskTeacherName)))
            }

            FlowState::AwaitingTeacherName { phone } => {
                let Some(full_name) = msg.body() else {
                    return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::TextExpected)));
                };
                let class_ids = BTreeSet::new();
                let prompt = Self::teacher_classes_prompt(ctx, &class_ids).await?;
                Ok(TurnResult::transition(FlowState::AwaitingTeacherClasses {
                    phone,
                    full_name: full_name.to_string(),
                    class_ids,
                })
                .with_effect(prompt))
            }

            FlowState::AwaitingTeacherClasses { ref class_ids, .. } => {
                let prompt = Self::teacher_classes_prompt(ctx, class_ids).await?;
                Ok(TurnResult::unchanged()
                    .with_effect(ctx.reply(TextKey::UseButtons))
                    .with_effect(prompt))
            }

            other => {
                tracing::warn!(state = %other.name(), "Admin flow resumed with foreign state");
                Ok(TurnResult::clear().with_effect(Effect::reply_with(
                    ctx.text(TextKey::AdminPanelTitle),
                    keyboards::admin_panel(ctx),
                )))
            }
        }
    }

    async fn callback(&self, ctx: &TurnContext<'_>, state: Option<FlowState>, action: CallbackAction) -> FlowResult {
        ctx.require_admin()?;
        match action {
            CallbackAction::Admin(admin_action) => self.panel_action(ctx, admin_action).await,
            CallbackAction::DeleteClass(class_id) => self.delete_class(ctx, class_id).await,
            CallbackAction::TeacherClassToggle(class_id) => self.toggle_class(ctx, state, class_id).await,
            CallbackAction::TeacherClassesDone => self.finish_teacher(ctx, state).await,
            _ => Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::{FlowError, Outcome};
    use crate::runtime::SchoolStore;
    use crate::runtime::testing::FlowFixture;

    #[tokio::test]
    async fn test_create_class_and_reject_duplicate() {
        let fixture = FlowFixture::new();
        let identity = fixture.admin(1);
        let ctx = fixture.ctx(&identity);

        let created = AdminFlow
            .resume(&ctx, FlowState::AwaitingClassName, &fixture.text(1, "5A"))
            .await
            .unwrap();
        assert_eq!(created.outcome, Outcome::Clear);

        let duplicate = AdminFlow
            .resume(&ctx, FlowState::AwaitingClassName, &fixture.text(1, "5a"))
            .await
            .unwrap();
        assert_eq!(duplicate.outcome, Outcome::Unchanged);
        assert_eq!(fixture.store.classes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_teacher_walkthrough() {
        let fixture = FlowFixture::new();
        let class = fixture.store.seed_class("7B");
        let identity = fixture.admin(1);
        let ctx = fixture.ctx(&identity);

        let named = AdminFlow
            .resume(&ctx, FlowState::AwaitingTeacherPhone, &fixture.text(1, "+998 90 555 44 33"))
            .await
            .unwrap();
        let Outcome::Transition(state) = named.outcome else {
            panic!("expected transition");
        };
        let Outcome::Transition(state) = AdminFlow
            .resume(&ctx, state, &fixture.text(1, "Dilnoza Azimova"))
            .await
            .unwrap()
            .outcome
        else {
            panic!("expected transition");
        };
        let Outcome::Transition(state) = AdminFlow
            .callback(&ctx, Some(state), CallbackAction::TeacherClassToggle(class.id))
            .await
            .unwrap()
            .outcome
        else {
            panic!("expected transition");
        };
        assert!(matches!(&state, FlowState::AwaitingTeacherClasses { class_ids, .. } if class_ids.contains(&class.id)));

        let done = AdminFlow
            .callback(&ctx, Some(state), CallbackAction::TeacherClassesDone)
            .await
            .unwrap();
        assert_eq!(done.outcome, Outcome::Clear);

        let teacher = fixture.store.teacher_by_phone("+998905554433").await.unwrap().unwrap();
        assert_eq!(teacher.full_name, "Dilnoza Azimova");
        assert_eq!(teacher.user_id, None);
        assert_eq!(fixture.store.teacher_classes(teacher.id).await.unwrap(), vec![class]);
    }

    #[tokio::test]
    async fn test_delete_missing_class() {
        let fixture = FlowFixture::new();
        let identity = fixture.admin(1);
        let ctx = fixture.ctx(&identity);

        let result = AdminFlow
            .callback(&ctx, None, CallbackAction::DeleteClass(404))
            .await
            .unwrap();
        assert_eq!(result.effects, vec![Effect::toast(ctx.text(TextKey::ClassNotFound))]);
    }

    #[tokio::test]
    async fn test_revoked_admin_is_denied_mid_flow() {
        let fixture = FlowFixture::new();
        let identity = fixture.parent(2).await;
        let ctx = fixture.ctx(&identity);

        let err = AdminFlow
            .resume(&ctx, FlowState::AwaitingClassName, &fixture.text(2, "9C"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::PermissionDenied("admin")));
    }
}
