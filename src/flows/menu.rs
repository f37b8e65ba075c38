//! Commands, the main menu and the per-role default turns

use super::{keyboards, registration, Binding, Entry, FlowHandler, FlowResult, TurnContext, TurnResult};
use crate::i18n::{MenuButton, TextKey};
use crate::runtime::identity::Role;
use crate::state_machine::{Command, Effect, IncomingMessage};
use async_trait::async_trait;

pub struct MenuFlow;

impl MenuFlow {
    fn greeting(ctx: &TurnContext<'_>) -> Effect {
        let identity = ctx.identity;
        let text = match identity.role {
            Role::Admin => ctx.text(TextKey::GreetingAdmin).to_string(),
            Role::Teacher => {
                let name = identity.teacher.as_ref().map_or("", |t| t.full_name.as_str());
                ctx.render(TextKey::GreetingTeacher, &[("name", name)])
            }
            Role::Parent | Role::Anonymous => {
                let name = identity.parent.as_ref().map_or("", |p| p.full_name.as_str());
                ctx.render(TextKey::GreetingParent, &[("name", name)])
            }
        };
        Effect::reply_with(text, keyboards::home_for(ctx))
    }

    fn help(ctx: &TurnContext<'_>) -> Effect {
        let key = match ctx.identity.role {
            Role::Admin => TextKey::HelpAdmin,
            Role::Teacher => TextKey::HelpTeacher,
            Role::Parent => TextKey::HelpParent,
            Role::Anonymous => TextKey::HelpGuest,
        };
        ctx.reply(key)
    }

    fn menu(ctx: &TurnContext<'_>) -> Effect {
        Effect::reply_with(ctx.text(TextKey::ChooseMenuItem), keyboards::home_for(ctx))
    }
}

#[async_trait]
impl FlowHandler for MenuFlow {
    fn name(&self) -> &'static str {
        "menu"
    }

    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::Command(Command::Start),
            Binding::Command(Command::Cancel),
            Binding::Command(Command::Help),
            Binding::Command(Command::Menu),
            Binding::Shortcut(MenuButton::MainMenu),
            Binding::Default(Role::Parent),
            Binding::Default(Role::Teacher),
            Binding::Default(Role::Admin),
        ]
    }

    async fn start(&self, ctx: &TurnContext<'_>, entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        let anonymous = ctx.identity.role == Role::Anonymous;
        let result = match entry {
            Entry::Command(Command::Start) if anonymous => registration::begin(ctx),
            Entry::Command(Command::Start) => TurnResult::clear().with_effect(Self::greeting(ctx)),
            Entry::Command(Command::Cancel) => TurnResult::clear()
                .with_effect(Effect::reply_with(ctx.text(TextKey::Cancelled), keyboards::home_for(ctx))),
            Entry::Command(Command::Help) => TurnResult::unchanged().with_effect(Self::help(ctx)),
            Entry::Command(Command::Menu) | Entry::Button(_) if anonymous => {
                TurnResult::clear().with_effect(Self::help(ctx))
            }
            Entry::Command(Command::Menu) | Entry::Button(_) => TurnResult::clear().with_effect(Self::menu(ctx)),
            Entry::Default => TurnResult::unchanged().with_effect(Self::menu(ctx)),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::Outcome;
    use crate::runtime::testing::FlowFixture;
    use crate::state_machine::FlowState;

    #[tokio::test]
    async fn test_start_for_anonymous_begins_registration() {
        let fixture = FlowFixture::new();
        let identity = fixture.anonymous(1);
        let ctx = fixture.ctx(&identity);

        let result = MenuFlow
            .start(&ctx, Entry::Command(Command::Start), &fixture.text(1, "/start"))
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Transition(FlowState::AwaitingLanguage));
    }

    #[tokio::test]
    async fn test_start_for_admin_parent_greets_admin() {
        let fixture = FlowFixture::new();
        let identity = fixture.admin_parent(2).await;
        let ctx = fixture.ctx(&identity);

        let result = MenuFlow
            .start(&ctx, Entry::Command(Command::Start), &fixture.text(2, "/start"))
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Clear);
        assert!(matches!(
            &result.effects[0],
            Effect::Reply { text, .. } if text == ctx.text(TextKey::GreetingAdmin)
        ));
    }

    #[tokio::test]
    async fn test_help_keeps_flow() {
        let fixture = FlowFixture::new();
        let identity = fixture.anonymous(3);
        let ctx = fixture.ctx(&identity);

        let result = MenuFlow
            .start(&ctx, Entry::Command(Command::Help), &fixture.text(3, "/help"))
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Unchanged);
    }
}
