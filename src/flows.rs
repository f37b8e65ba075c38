//! Flow handlers and their registry
//!
//! A handler is a strategy unit: it declares which commands, buttons,
//! states and callbacks it owns, and turns one input into a [`TurnResult`].
//! Handlers never touch the state store or the transport directly; the
//! router applies the outcome and executes the effects.

pub mod admin;
pub mod announcements;
pub mod attendance;
pub mod feedback;
pub mod grading;
pub mod keyboards;
pub mod menu;
pub mod registration;
pub mod timetable;

use crate::config::AdminAllowList;
use crate::db::{Parent, SchoolClass, Teacher};
use crate::i18n::{Lang, Localizer, MenuButton, TextKey};
use crate::runtime::identity::{Identity, Role};
use crate::runtime::{SchoolStore, StorageError};
use crate::state_machine::{
    CallbackAction, CallbackKind, ChatId, Command, Effect, FeedbackKind, FlowState, IncomingMessage, Notification, StateName,
    UserId,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// What happens to the stored state after a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Unchanged,
    Transition(FlowState),
    Clear,
}

/// Result of one handler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    pub outcome: Outcome,
    pub effects: Vec<Effect>,
}

impl TurnResult {
    pub fn unchanged() -> Self {
        Self {
            outcome: Outcome::Unchanged,
            effects: vec![],
        }
    }

    pub fn transition(state: FlowState) -> Self {
        Self {
            outcome: Outcome::Transition(state),
            effects: vec![],
        }
    }

    pub fn clear() -> Self {
        Self {
            outcome: Outcome::Clear,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The acting user no longer holds the role this step requires
    #[error("permission denied: {0} required")]
    PermissionDenied(&'static str),
}

pub type FlowResult = Result<TurnResult, FlowError>;

/// Something a handler can be reached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    Command(Command),
    /// Always-available navigation label
    Shortcut(MenuButton),
    ParentMenu(MenuButton),
    TeacherMenu(MenuButton),
    State(StateName),
    Callback(CallbackKind),
    /// Fallback turn for users whose default audience is this role
    Default(Role),
}

/// Why `start` was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Command(Command),
    Button(MenuButton),
    Default,
}

/// Everything a handler may read during one turn
pub struct TurnContext<'a> {
    pub identity: &'a Identity,
    pub chat_id: ChatId,
    pub store: &'a dyn SchoolStore,
    pub localizer: &'a Localizer,
    pub lang: Lang,
    pub admins: &'a AdminAllowList,
    pub today: NaiveDate,
}

impl TurnContext<'_> {
    pub fn text(&self, key: TextKey) -> &'static str {
        self.localizer.text(self.lang, key)
    }

    pub fn render(&self, key: TextKey, args: &[(&str, &str)]) -> String {
        self.localizer.render(self.lang, key, args)
    }

    pub fn button(&self, button: MenuButton) -> &'static str {
        self.localizer.button(self.lang, button)
    }

    /// Plain reply in the user's language
    pub fn reply(&self, key: TextKey) -> Effect {
        Effect::reply(self.text(key))
    }

    pub fn require_admin(&self) -> Result<(), FlowError> {
        if self.identity.is_admin() {
            Ok(())
        } else {
            Err(FlowError::PermissionDenied("admin"))
        }
    }

    pub fn require_teacher(&self) -> Result<&Teacher, FlowError> {
        self.identity
            .teacher
            .as_ref()
            .ok_or(FlowError::PermissionDenied("teacher"))
    }

    pub fn require_parent(&self) -> Result<&Parent, FlowError> {
        self.identity
            .parent
            .as_ref()
            .ok_or(FlowError::PermissionDenied("parent"))
    }

    /// A class the acting teacher is assigned to
    pub async fn teacher_class(&self, class_id: i64) -> Result<SchoolClass, FlowError> {
        let teacher = self.require_teacher()?;
        self.store
            .teacher_classes(teacher.id)
            .await?
            .into_iter()
            .find(|class| class.id == class_id)
            .ok_or(FlowError::PermissionDenied("class teacher"))
    }

    /// Language a notice to `user_id` should be written in
    pub async fn recipient_lang(&self, user_id: UserId) -> Result<Lang, StorageError> {
        Ok(self
            .store
            .parent_by_user(user_id)
            .await?
            .map_or(self.localizer.default_lang(), |parent| parent.language))
    }

    /// Notifications for every admin with a known chat
    pub async fn notify_admins(&self, text: &str) -> Result<Vec<Effect>, StorageError> {
        let mut recipients: Vec<_> = self.admins.user_ids().collect();
        recipients.extend(self.store.admin_user_ids().await?);
        recipients.sort_unstable();
        recipients.dedup();
        Ok(recipients
            .into_iter()
            .filter(|id| *id != self.identity.user_id)
            .map(|id| Effect::notify(Notification::text(id, text)))
            .collect())
    }
}

/// A pluggable feature flow
#[async_trait]
pub trait FlowHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn bindings(&self) -> Vec<Binding>;

    /// Entered through a command, a button or a default turn
    async fn start(&self, _ctx: &TurnContext<'_>, _entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        Ok(TurnResult::unchanged())
    }

    /// Continue the flow from its stored state
    async fn resume(&self, _ctx: &TurnContext<'_>, _state: FlowState, _msg: &IncomingMessage) -> FlowResult {
        Ok(TurnResult::unchanged())
    }

    /// Inline-button press; `state` is the user's current flow state, if any
    async fn callback(
        &self,
        ctx: &TurnContext<'_>,
        _state: Option<FlowState>,
        _action: CallbackAction,
    ) -> FlowResult {
        Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction))))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{binding:?} is bound by both {first} and {second}")]
pub struct DuplicateBinding {
    pub binding: Binding,
    pub first: &'static str,
    pub second: &'static str,
}

/// Binding table from inputs to handlers
#[derive(Default, Clone)]
pub struct FlowRegistry {
    bindings: HashMap<Binding, Arc<dyn FlowHandler>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in flow
    pub fn standard() -> Result<Self, DuplicateBinding> {
        Self::new()
            .register(Arc::new(menu::MenuFlow))?
            .register(Arc::new(registration::RegistrationFlow))?
            .register(Arc::new(feedback::FeedbackFlow::new(FeedbackKind::Complaint)))?
            .register(Arc::new(feedback::FeedbackFlow::new(FeedbackKind::Proposal)))?
            .register(Arc::new(admin::AdminFlow))?
            .register(Arc::new(timetable::TimetableFlow))?
            .register(Arc::new(announcements::AnnouncementFlow))?
            .register(Arc::new(attendance::AttendanceFlow))?
            .register(Arc::new(grading::GradingFlow))
    }

    pub fn register(mut self, handler: Arc<dyn FlowHandler>) -> Result<Self, DuplicateBinding> {
        for binding in handler.bindings() {
            if let Some(existing) = self.bindings.get(&binding) {
                return Err(DuplicateBinding {
                    binding,
                    first: existing.name(),
                    second: handler.name(),
                });
            }
            self.bindings.insert(binding, Arc::clone(&handler));
        }
        Ok(self)
    }

    pub fn lookup(&self, binding: Binding) -> Option<&dyn FlowHandler> {
        self.bindings.get(&binding).map(|handler| handler.as_ref())
    }

    pub fn has(&self, binding: Binding) -> bool {
        self.bindings.contains_key(&binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::AdminAction;

    #[test]
    fn test_standard_registry_covers_everything() {
        let registry = FlowRegistry::standard().unwrap();

        for command in Command::ALL {
            assert!(registry.has(Binding::Command(command)), "{command:?}");
        }
        for state in StateName::ALL {
            assert!(registry.has(Binding::State(state)), "{state}");
        }
        for role in [Role::Anonymous, Role::Parent, Role::Teacher, Role::Admin] {
            assert!(registry.has(Binding::Default(role)), "{role:?}");
        }
        for button in MenuButton::PARENT_MENU {
            assert!(registry.has(Binding::ParentMenu(button)), "{button:?}");
        }
        for button in MenuButton::TEACHER_MENU {
            assert!(registry.has(Binding::TeacherMenu(button)), "{button:?}");
        }
        assert!(registry.has(Binding::Shortcut(MenuButton::AdminPanel)));
        assert!(registry.has(Binding::Shortcut(MenuButton::MainMenu)));

        let kinds = [
            CallbackKind::Language,
            CallbackKind::Feedback(FeedbackKind::Complaint),
            CallbackKind::Feedback(FeedbackKind::Proposal),
            CallbackKind::RegistrationClass,
            CallbackKind::DeleteClass,
            CallbackKind::TimetableClass,
            CallbackKind::TeacherClassToggle,
            CallbackKind::TeacherClassesDone,
            CallbackKind::Announcement,
            CallbackKind::AttendanceClass,
            CallbackKind::AttendanceToggle,
            CallbackKind::AttendanceSubmit,
            CallbackKind::GradeClass,
            CallbackKind::GradeStudent,
        ];
        for kind in kinds.into_iter().chain(AdminAction::ALL.map(CallbackKind::Admin)) {
            assert!(registry.has(Binding::Callback(kind)), "{kind:?}");
        }
    }

    #[test]
    fn test_duplicate_binding_is_rejected() {
        let err = FlowRegistry::new()
            .register(Arc::new(menu::MenuFlow))
            .unwrap()
            .register(Arc::new(menu::MenuFlow))
            .err()
            .unwrap();
        assert_eq!(err.first, "menu");
        assert_eq!(err.second, "menu");
    }
}
