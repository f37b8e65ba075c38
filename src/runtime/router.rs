//! Turn routing
//!
//! For message events the precedence is fixed, highest first:
//!
//! 1. explicit commands, regardless of stored state
//! 2. always-available shortcuts (state is cleared first)
//! 3. teacher takeover: a teacher only ever sees the teacher desk
//! 4. role menu buttons the user is entitled to (state is cleared first)
//! 5. continuation of the stored flow
//! 6. the default turn for the user's audience
//!
//! [`decide`] is pure; [`Router`] does the I/O around it.

use super::identity::{Identity, IdentityResolver, Role};
use super::outbox::Outbox;
use super::state_manager::{StateError, StateManager};
use super::traits::{SchoolStore, Transport};
use crate::flows::{
    keyboards, Binding, Entry, FlowError, FlowHandler, FlowRegistry, FlowResult, Outcome, TurnContext, TurnResult,
};
use crate::i18n::{ButtonGroup, Localizer, MenuButton, TextKey};
use crate::state_machine::{
    CallbackAction, CallbackQuery, ChatId, Command, Effect, FlowState, IncomingMessage, Keyboard, MediaKind, StateName,
    Update, UpdateKind, UserId, UserProfile,
};
use std::sync::Arc;

/// What the router knows about the stored state before routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateLookup {
    Idle,
    Active(StateName),
    /// The record exists but could not be read
    Unreadable,
}

/// Inputs to the precedence rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteFacts {
    pub command: Option<Command>,
    pub button: Option<MenuButton>,
    pub role: Role,
    pub is_parent: bool,
    pub is_teacher: bool,
    pub state: StateLookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Command(Command),
    Shortcut(MenuButton),
    MenuButton(MenuButton),
    /// Resume the stored flow; `fallback` is used if its payload is unreadable
    Continue { state: StateName, fallback: Role },
    Default { audience: Role, discard_state: bool },
}

/// Audience whose default turn a user falls back to
fn default_audience(facts: &RouteFacts) -> Role {
    if facts.role == Role::Teacher {
        Role::Teacher
    } else if facts.is_parent {
        Role::Parent
    } else if facts.role == Role::Admin {
        Role::Admin
    } else {
        Role::Anonymous
    }
}

fn menu_binding(button: MenuButton) -> Binding {
    match button.group() {
        ButtonGroup::Shortcut => Binding::Shortcut(button),
        ButtonGroup::ParentMenu => Binding::ParentMenu(button),
        ButtonGroup::TeacherMenu => Binding::TeacherMenu(button),
    }
}

/// Apply the precedence rules to one message event
pub fn decide(facts: &RouteFacts, registry: &FlowRegistry) -> Route {
    let discard_state = facts.state != StateLookup::Idle;

    if let Some(command) = facts.command {
        if registry.has(Binding::Command(command)) {
            return Route::Command(command);
        }
    }

    if let Some(button) = facts.button {
        if button.group() == ButtonGroup::Shortcut && registry.has(Binding::Shortcut(button)) {
            return Route::Shortcut(button);
        }
    }

    if facts.role == Role::Teacher {
        if let Some(button) = facts.button {
            if button.group() == ButtonGroup::TeacherMenu && registry.has(Binding::TeacherMenu(button)) {
                return Route::MenuButton(button);
            }
        }
        if let StateLookup::Active(state) = facts.state {
            if state.audience() == Role::Teacher && registry.has(Binding::State(state)) {
                return Route::Continue {
                    state,
                    fallback: Role::Teacher,
                };
            }
        }
        return Route::Default {
            audience: Role::Teacher,
            discard_state,
        };
    }

    if let Some(button) = facts.button {
        let entitled = match button.group() {
            ButtonGroup::ParentMenu => facts.is_parent,
            ButtonGroup::TeacherMenu => facts.is_teacher,
            ButtonGroup::Shortcut => false,
        };
        if entitled && registry.has(menu_binding(button)) {
            return Route::MenuButton(button);
        }
    }

    if let StateLookup::Active(state) = facts.state {
        if registry.has(Binding::State(state)) {
            return Route::Continue {
                state,
                fallback: default_audience(facts),
            };
        }
    }

    Route::Default {
        audience: default_audience(facts),
        discard_state,
    }
}

/// Resolves identity, routes, runs the handler and applies its result
pub struct Router {
    registry: FlowRegistry,
    states: StateManager,
    store: Arc<dyn SchoolStore>,
    transport: Arc<dyn Transport>,
    identities: IdentityResolver,
    localizer: Localizer,
    outbox: Outbox,
}

impl Router {
    pub fn new(
        registry: FlowRegistry,
        states: StateManager,
        store: Arc<dyn SchoolStore>,
        transport: Arc<dyn Transport>,
        identities: IdentityResolver,
        localizer: Localizer,
        outbox: Outbox,
    ) -> Self {
        Self {
            registry,
            states,
            store,
            transport,
            identities,
            localizer,
            outbox,
        }
    }

    /// Run one turn to completion. Never fails: every error ends in a reply.
    pub async fn handle(&self, update: Update) {
        match update.kind {
            UpdateKind::Message(message) => self.handle_message(message).await,
            UpdateKind::Callback(query) => self.handle_callback(query).await,
            UpdateKind::Ignored => {}
        }
    }

    fn context<'a>(&'a self, identity: &'a Identity, chat_id: ChatId) -> TurnContext<'a> {
        TurnContext {
            identity,
            chat_id,
            store: self.store.as_ref(),
            localizer: &self.localizer,
            lang: identity.lang(self.localizer.default_lang()),
            admins: self.identities.admins(),
            today: chrono::Local::now().date_naive(),
        }
    }

    async fn resolve(&self, profile: &UserProfile, contact: Option<&str>) -> Option<Identity> {
        match self.identities.resolve(self.store.as_ref(), profile, contact).await {
            Ok(identity) => {
                tracing::debug!(role = identity.role.as_str(), "Identity resolved");
                Some(identity)
            }
            Err(e) => {
                tracing::error!(error = %e, "Identity resolution failed");
                None
            }
        }
    }

    async fn handle_message(&self, message: IncomingMessage) {
        let user_id = message.from.user_id;
        let Some(identity) = self.resolve(&message.from, message.contact_phone.as_deref()).await else {
            let lang = Identity::anonymous(message.from.clone()).lang(self.localizer.default_lang());
            self.send(message.chat_id, self.localizer.text(lang, TextKey::TemporaryFailure), None)
                .await;
            return;
        };
        let ctx = self.context(&identity, message.chat_id);

        let state = match self.states.get(user_id).await {
            Ok(None) => StateLookup::Idle,
            Ok(Some(name)) => StateLookup::Active(name),
            Err(e) => {
                tracing::warn!(error = %e, "Stored state unreadable");
                StateLookup::Unreadable
            }
        };
        let command = message.command();
        let facts = RouteFacts {
            command,
            button: if command.is_none() {
                message.text.as_deref().and_then(|t| self.localizer.match_button(t))
            } else {
                None
            },
            role: identity.role,
            is_parent: identity.is_parent(),
            is_teacher: identity.is_teacher(),
            state,
        };
        let route = decide(&facts, &self.registry);
        tracing::debug!(?route, ?state, "Route decided");

        let result = self.run_route(&ctx, route, &message).await;
        self.finish(&ctx, result, None).await;
    }

    fn handler(&self, binding: Binding) -> Option<&dyn FlowHandler> {
        let handler = self.registry.lookup(binding);
        if handler.is_none() {
            tracing::warn!(?binding, "No handler bound");
        }
        handler
    }

    async fn run_route(&self, ctx: &TurnContext<'_>, route: Route, message: &IncomingMessage) -> FlowResult {
        let user_id = ctx.identity.user_id;
        match route {
            Route::Command(command) => match self.handler(Binding::Command(command)) {
                Some(handler) => handler.start(ctx, Entry::Command(command), message).await,
                None => Ok(TurnResult::unchanged()),
            },
            Route::Shortcut(button) | Route::MenuButton(button) => {
                self.discard_state(user_id).await;
                match self.handler(menu_binding(button)) {
                    Some(handler) => handler.start(ctx, Entry::Button(button), message).await,
                    None => Ok(TurnResult::unchanged()),
                }
            }
            Route::Continue { state, fallback } => match self.states.get_payload(user_id).await {
                Ok(payload) => match self.handler(Binding::State(state)) {
                    Some(handler) => handler.resume(ctx, payload, message).await,
                    None => self.run_default(ctx, fallback, true, message).await,
                },
                Err(e) => {
                    tracing::warn!(%state, error = %e, "Flow payload unreadable, falling back");
                    self.run_default(ctx, fallback, true, message).await
                }
            },
            Route::Default {
                audience,
                discard_state,
            } => self.run_default(ctx, audience, discard_state, message).await,
        }
    }

    async fn run_default(
        &self,
        ctx: &TurnContext<'_>,
        audience: Role,
        discard_state: bool,
        message: &IncomingMessage,
    ) -> FlowResult {
        if discard_state {
            self.discard_state(ctx.identity.user_id).await;
        }
        match self.handler(Binding::Default(audience)) {
            Some(handler) => handler.start(ctx, Entry::Default, message).await,
            None => Ok(TurnResult::unchanged()),
        }
    }

    /// Best-effort clear before a fresh entry point
    async fn discard_state(&self, user_id: UserId) {
        if let Err(e) = self.states.clear(user_id).await {
            tracing::warn!(error = %e, "Failed to clear state");
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) {
        let user_id = query.from.user_id;
        let Some(identity) = self.resolve(&query.from, None).await else {
            let lang = Identity::anonymous(query.from.clone()).lang(self.localizer.default_lang());
            self.answer(&query.id, Some(self.localizer.text(lang, TextKey::TemporaryFailure)))
                .await;
            return;
        };
        let ctx = self.context(&identity, query.chat_id);

        let unknown = || TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction)));
        let result = match query.data.parse::<CallbackAction>() {
            Err(e) => {
                tracing::debug!(data = %query.data, error = %e, "Unrecognized callback");
                Ok(unknown())
            }
            Ok(action) => match self.handler(Binding::Callback(action.kind())) {
                None => Ok(unknown()),
                Some(handler) => {
                    let state = match self.states.get_payload(user_id).await {
                        Ok(state) => Some(state),
                        Err(StateError::NotFound(_)) => None,
                        Err(e) => {
                            tracing::warn!(error = %e, "Stored state unreadable, treating as idle");
                            self.discard_state(user_id).await;
                            None
                        }
                    };
                    tracing::debug!(?action, state = ?state.as_ref().map(FlowState::name), "Callback");
                    handler.callback(&ctx, state, action).await
                }
            },
        };
        self.finish(&ctx, result, Some(&query.id)).await;
    }

    /// Apply the outcome, then execute the effects
    async fn finish(&self, ctx: &TurnContext<'_>, result: FlowResult, callback_id: Option<&str>) {
        let user_id = ctx.identity.user_id;
        let turn = match result {
            Ok(turn) => turn,
            Err(FlowError::PermissionDenied(required)) => {
                tracing::info!(required, role = ctx.identity.role.as_str(), "Permission denied");
                TurnResult::clear().with_effect(Effect::reply_with(
                    ctx.text(TextKey::PermissionDenied),
                    keyboards::home_for(ctx),
                ))
            }
            Err(FlowError::Storage(e)) => {
                tracing::error!(error = %e, "Turn aborted by storage failure");
                TurnResult::clear().with_effect(ctx.reply(TextKey::TemporaryFailure))
            }
        };

        let written = match &turn.outcome {
            Outcome::Unchanged => Ok(()),
            Outcome::Transition(state) => {
                tracing::debug!(state = %state.name(), "Transition");
                self.states.set(user_id, state).await
            }
            Outcome::Clear => self.states.clear(user_id).await,
        };

        let mut effects = turn.effects;
        if let Err(e) = written {
            tracing::error!(error = %e, "Failed to persist state");
            self.discard_state(user_id).await;
            // Replies describe a step that was not saved
            effects.retain(|effect| matches!(effect, Effect::Notify(_) | Effect::AnswerCallback { .. }));
            effects.push(ctx.reply(TextKey::TemporaryFailure));
        }
        self.execute(ctx.chat_id, effects, callback_id).await;
    }

    async fn execute(&self, chat_id: ChatId, effects: Vec<Effect>, callback_id: Option<&str>) {
        if let Some(callback_id) = callback_id {
            let toast = effects.iter().find_map(|effect| match effect {
                Effect::AnswerCallback { text: Some(text) } => Some(text.as_str()),
                _ => None,
            });
            self.answer(callback_id, toast).await;
        }

        let mut queued = 0usize;
        for effect in effects {
            match effect {
                Effect::Reply { text, keyboard } => self.send(chat_id, &text, keyboard.as_ref()).await,
                Effect::ReplyMedia { file, caption } => {
                    let sent = match file.kind {
                        MediaKind::Photo => self.transport.send_photo(chat_id, &file, caption.as_deref()).await,
                        MediaKind::Document => {
                            self.transport
                                .send_document(chat_id, &file, caption.as_deref())
                                .await
                        }
                    };
                    if let Err(e) = sent {
                        tracing::warn!(chat_id, error = %e, kind = ?e.kind, "Failed to send media");
                    }
                }
                Effect::AnswerCallback { .. } => {}
                Effect::Notify(notification) => {
                    if self.outbox.enqueue(notification) {
                        queued += 1;
                    }
                }
            }
        }
        if queued > 0 {
            tracing::info!(queued, "Notifications queued");
        }
    }

    async fn send(&self, chat_id: ChatId, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(e) = self.transport.send_message(chat_id, text, keyboard).await {
            tracing::warn!(chat_id, error = %e, kind = ?e.kind, "Failed to send reply");
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.transport.answer_callback(callback_id, text).await {
            tracing::warn!(callback_id, error = %e, "Failed to answer callback");
        }
    }
}
