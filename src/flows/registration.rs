//! Parent registration and language settings

use super::{keyboards, Binding, Entry, FlowError, FlowHandler, FlowResult, TurnContext, TurnResult};
use crate::db::NewParent;
use crate::i18n::{Lang, MenuButton, TextKey};
use crate::runtime::identity::{normalize_phone, Role};
use crate::runtime::StorageError;
use crate::state_machine::{CallbackAction, CallbackKind, Effect, FlowState, IncomingMessage, Keyboard, StateName};
use async_trait::async_trait;

/// First step of registration: ask for a language
pub fn begin(ctx: &TurnContext<'_>) -> TurnResult {
    TurnResult::transition(FlowState::AwaitingLanguage)
        .with_effect(Effect::reply_with(ctx.text(TextKey::ChooseLanguage), keyboards::language_picker()))
}

pub struct RegistrationFlow;

impl RegistrationFlow {
    async fn class_prompt(ctx: &TurnContext<'_>, lang: Lang, key: TextKey) -> Result<Effect, FlowError> {
        let classes = ctx.store.classes().await?;
        if classes.is_empty() {
            return Ok(Effect::reply(ctx.localizer.text(lang, TextKey::NoClassesYet)));
        }
        Ok(Effect::reply_with(
            ctx.localizer.text(lang, key),
            keyboards::classes(&classes, CallbackAction::RegistrationClass),
        ))
    }

    async fn choose_class(&self, ctx: &TurnContext<'_>, state: Option<FlowState>, class_id: i64) -> FlowResult {
        let Some(FlowState::AwaitingChildClass {
            language,
            phone,
            full_name,
            child_name,
        }) = state
        else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NothingToConfirm))));
        };
        let new = NewParent {
            user_id: ctx.identity.user_id,
            phone,
            full_name,
            child_name,
            class_id,
            language,
        };
        let parent = match ctx.store.register_parent(&new).await {
            Ok(parent) => parent,
            Err(StorageError::Missing(_)) => {
                return Ok(TurnResult::unchanged()
                    .with_effect(Effect::toast(ctx.localizer.text(language, TextKey::ClassNotFound)))
                    .with_effect(Self::class_prompt(ctx, language, TextKey::ChooseChildClass).await?));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(user_id = parent.user_id, class_id, "Parent registered");

        let mut identity = ctx.identity.clone();
        identity.parent = Some(parent);
        identity.role = identity.role.max(Role::Parent);
        let text = ctx
            .localizer
            .render(language, TextKey::RegistrationComplete, &[("name", &new.full_name)]);

        Ok(TurnResult::clear()
            .with_effect(Effect::ack())
            .with_effect(Effect::reply_with(text, keyboards::home(ctx.localizer, language, &identity))))
    }

    async fn pick_language(&self, ctx: &TurnContext<'_>, state: Option<FlowState>, lang: Lang) -> FlowResult {
        if let Some(FlowState::AwaitingLanguage) = state {
            return Ok(TurnResult::transition(FlowState::AwaitingPhone { language: lang })
                .with_effect(Effect::ack())
                .with_effect(Effect::reply_with(
                    ctx.localizer.text(lang, TextKey::AskPhone),
                    keyboards::share_phone(ctx.localizer, lang),
                )));
        }

        // Outside registration this is the language setting of a parent
        if ctx.identity.is_parent() && ctx.store.set_parent_language(ctx.identity.user_id, lang).await? {
            let mut identity = ctx.identity.clone();
            if let Some(parent) = identity.parent.as_mut() {
                parent.language = lang;
            }
            return Ok(TurnResult::unchanged().with_effect(Effect::ack()).with_effect(Effect::reply_with(
                ctx.localizer.text(lang, TextKey::LanguageSaved),
                keyboards::home(ctx.localizer, lang, &identity),
            )));
        }

        Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NothingToConfirm))))
    }
}

#[async_trait]
impl FlowHandler for RegistrationFlow {
    fn name(&self) -> &'static str {
        "registration"
    }

    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::Default(Role::Anonymous),
            Binding::ParentMenu(MenuButton::Language),
            Binding::State(StateName::AwaitingLanguage),
            Binding::State(StateName::AwaitingPhone),
            Binding::State(StateName::AwaitingFullName),
            Binding::State(StateName::AwaitingChildName),
            Binding::State(StateName::AwaitingChildClass),
            Binding::Callback(CallbackKind::Language),
            Binding::Callback(CallbackKind::RegistrationClass),
        ]
    }

    async fn start(&self, ctx: &TurnContext<'_>, entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        match entry {
            Entry::Button(MenuButton::Language) => {
                ctx.require_parent()?;
                Ok(TurnResult::unchanged().with_effect(Effect::reply_with(
                    ctx.text(TextKey::ChooseLanguage),
                    keyboards::language_picker(),
                )))
            }
            _ => Ok(begin(ctx)),
        }
    }

    async fn resume(&self, ctx: &TurnContext<'_>, state: FlowState, msg: &IncomingMessage) -> FlowResult {
        match state {
            FlowState::AwaitingLanguage => Ok(TurnResult::unchanged()
                .with_effect(Effect::reply_with(ctx.text(TextKey::UseButtons), keyboards::language_picker()))),

            FlowState::AwaitingPhone { language } => {
                let raw = msg.contact_phone.as_deref().or_else(|| msg.body());
                let Some(phone) = raw.and_then(normalize_phone) else {
                    return Ok(TurnResult::unchanged().with_effect(Effect::reply_with(
                        ctx.localizer.text(language, TextKey::InvalidPhone),
                        keyboards::share_phone(ctx.localizer, language),
                    )));
                };
                Ok(TurnResult::transition(FlowState::AwaitingFullName { language, phone }).with_effect(
                    Effect::reply_with(ctx.localizer.text(language, TextKey::AskFullName), Keyboard::Remove),
                ))
            }

            FlowState::AwaitingFullName { language, phone } => {
                let Some(full_name) = msg.body() else {
                    return Ok(TurnResult::unchanged()
                        .with_effect(Effect::reply(ctx.localizer.text(language, TextKey::TextExpected))));
                };
                Ok(TurnResult::transition(FlowState::AwaitingChildName {
                    language,
                    phone,
                    full_name: full_name.to_string(),
                })
                .with_effect(Effect::reply(ctx.localizer.text(language, TextKey::AskChildName))))
            }

            FlowState::AwaitingChildName {
                language,
                phone,
                full_name,
            } => {
                let Some(child_name) = msg.body() else {
                    return Ok(TurnResult::unchanged()
                        .with_effect(Effect::reply(ctx.localizer.text(language, TextKey::TextExpected))));
                };
                let prompt = Self::class_prompt(ctx, language, TextKey::ChooseChildClass).await?;
                Ok(TurnResult::transition(FlowState::AwaitingChildClass {
                    language,
                    phone,
                    full_name,
                    child_name: child_name.to_string(),
                })
                .with_effect(prompt))
            }

            FlowState::AwaitingChildClass { language, .. } => Ok(TurnResult::unchanged()
                .with_effect(Self::class_prompt(ctx, language, TextKey::ChooseChildClass).await?)),

            other => {
                tracing::warn!(state = %other.name(), "Registration resumed with foreign state");
                Ok(begin(ctx))
            }
        }
    }

    async fn callback(&self, ctx: &TurnContext<'_>, state: Option<FlowState>, action: CallbackAction) -> FlowResult {
        match action {
            CallbackAction::Language(lang) => self.pick_language(ctx, state, lang).await,
            CallbackAction::RegistrationClass(class_id) => self.choose_class(ctx, state, class_id).await,
            _ => Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction)))),
        }
    }
}
