//! Complaints and proposals from parents

use super::{keyboards, Binding, Entry, FlowHandler, FlowResult, TurnContext, TurnResult};
use crate::i18n::{MenuButton, TextKey};
use crate::state_machine::{
    CallbackAction, CallbackKind, Decision, Effect, FeedbackKind, FlowState, IncomingMessage, Keyboard, StateName,
};
use async_trait::async_trait;

/// One instance per [`FeedbackKind`]; both share the same steps
pub struct FeedbackFlow {
    kind: FeedbackKind,
}

impl FeedbackFlow {
    pub fn new(kind: FeedbackKind) -> Self {
        Self { kind }
    }

    fn button(&self) -> MenuButton {
        match self.kind {
            FeedbackKind::Complaint => MenuButton::Complaint,
            FeedbackKind::Proposal => MenuButton::Proposal,
        }
    }

    fn states(&self) -> [StateName; 2] {
        match self.kind {
            FeedbackKind::Complaint => [StateName::AwaitingComplaintText, StateName::ConfirmingComplaint],
            FeedbackKind::Proposal => [StateName::AwaitingProposalText, StateName::ConfirmingProposal],
        }
    }

    fn key(&self, complaint: TextKey, proposal: TextKey) -> TextKey {
        match self.kind {
            FeedbackKind::Complaint => complaint,
            FeedbackKind::Proposal => proposal,
        }
    }

    fn confirm_prompt(&self, ctx: &TurnContext<'_>, draft: &str) -> Effect {
        let kind = self.kind;
        Effect::reply_with(
            ctx.render(self.key(TextKey::ConfirmComplaint, TextKey::ConfirmProposal), &[("text", draft)]),
            keyboards::confirm(ctx, |decision| CallbackAction::Feedback { kind, decision }),
        )
    }

    async fn submit(&self, ctx: &TurnContext<'_>, draft: &str) -> FlowResult {
        let parent = ctx.require_parent()?;
        let feedback = ctx.store.submit_feedback(self.kind, parent.user_id, draft).await?;
        tracing::info!(
            feedback_id = feedback.id,
            kind = self.kind.as_str(),
            user_id = parent.user_id,
            "Feedback submitted"
        );

        // Admins read notices in the school's default language
        let notice = ctx.localizer.render(
            ctx.localizer.default_lang(),
            self.key(TextKey::NewComplaintNotice, TextKey::NewProposalNotice),
            &[("name", &parent.full_name), ("text", draft)],
        );
        let notices = ctx.notify_admins(&notice).await?;

        Ok(TurnResult::clear()
            .with_effect(Effect::ack())
            .with_effect(Effect::reply_with(
                ctx.text(self.key(TextKey::ComplaintSent, TextKey::ProposalSent)),
                keyboards::home_for(ctx),
            ))
            .with_effects(notices))
    }
}

#[async_trait]
impl FlowHandler for FeedbackFlow {
    fn name(&self) -> &'static str {
        match self.kind {
            FeedbackKind::Complaint => "complaint",
            FeedbackKind::Proposal => "proposal",
        }
    }

    fn bindings(&self) -> Vec<Binding> {
        let [awaiting, confirming] = self.states();
        vec![
            Binding::ParentMenu(self.button()),
            Binding::State(awaiting),
            Binding::State(confirming),
            Binding::Callback(CallbackKind::Feedback(self.kind)),
        ]
    }

    async fn start(&self, ctx: &TurnContext<'_>, _entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        ctx.require_parent()?;
        Ok(TurnResult::transition(FlowState::awaiting_feedback(self.kind)).with_effect(Effect::reply_with(
            ctx.text(self.key(TextKey::AskComplaint, TextKey::AskProposal)),
            Keyboard::Remove,
        )))
    }

    async fn resume(&self, ctx: &TurnContext<'_>, state: FlowState, msg: &IncomingMessage) -> FlowResult {
        ctx.require_parent()?;
        if let Some(draft) = state.feedback_draft(self.kind) {
            // Waiting for the confirm/cancel buttons
            return Ok(TurnResult::unchanged()
                .with_effect(ctx.reply(TextKey::UseButtons))
                .with_effect(self.confirm_prompt(ctx, draft)));
        }
        let Some(text) = msg.body() else {
            return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::TextExpected)));
        };
        Ok(TurnResult::transition(FlowState::confirming_feedback(self.kind, text.to_string()))
            .with_effect(self.confirm_prompt(ctx, text)))
    }

    async fn callback(&self, ctx: &TurnContext<'_>, state: Option<FlowState>, action: CallbackAction) -> FlowResult {
        let CallbackAction::Feedback { kind, decision } = action else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction))));
        };
        let draft = state
            .as_ref()
            .filter(|_| kind == self.kind)
            .and_then(|s| s.feedback_draft(kind));
        let Some(draft) = draft else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NothingToConfirm))));
        };

        match decision {
            Decision::Confirm => self.submit(ctx, draft).await,
            Decision::Cancel => Ok(TurnResult::clear().with_effect(Effect::ack()).with_effect(Effect::reply_with(
                ctx.text(TextKey::FeedbackDiscarded),
                keyboards::home_for(ctx),
            ))),
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
    async fn test_text_becomes_draft() {
        let fixture = FlowFixture::new();
        let identity = fixture.parent(1).await;
        let ctx = fixture.ctx(&identity);
        let flow = FeedbackFlow::new(FeedbackKind::Complaint);

        let result = flow
            .resume(&ctx, FlowState::AwaitingComplaintText, &fixture.text(1, " Broken heater "))
            .await
            .unwrap();
        assert_eq!(
            result.outcome,
            Outcome::Transition(FlowState::ConfirmingComplaint {
                draft: "Broken heater".into()
            })
        );
    }

    #[tokio::test]
    async fn test_text_while_confirming_keeps_draft() {
        let fixture = FlowFixture::new();
        let identity = fixture.parent(1).await;
        let ctx = fixture.ctx(&identity);
        let flow = FeedbackFlow::new(FeedbackKind::Proposal);

        let state = FlowState::ConfirmingProposal {
            draft: "Chess club".into(),
        };
        let result = flow.resume(&ctx, state, &fixture.text(1, "something else")).await.unwrap();
        assert_eq!(result.outcome, Outcome::Unchanged);
    }

    #[tokio::test]
    async fn test_confirm_stores_and_notifies_admins() {
        let fixture = FlowFixture::new();
        fixture.allow_admin(99);
        let identity = fixture.parent(1).await;
        let ctx = fixture.ctx(&identity);
        let flow = FeedbackFlow::new(FeedbackKind::Complaint);

        let state = FlowState::ConfirmingComplaint {
            draft: "Broken heater".into(),
        };
        let result = flow
            .callback(
                &ctx,
                Some(state),
                CallbackAction::Feedback {
                    kind: FeedbackKind::Complaint,
                    decision: Decision::Confirm,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Clear);
        let stored = fixture.store.recent_feedback(FeedbackKind::Complaint, 5).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "Broken heater");
        assert!(result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Notify(n) if n.chat_id == 99 && n.text.contains("Broken heater"))));
    }

    #[tokio::test]
    async fn test_stale_confirm_is_ignored() {
        let fixture = FlowFixture::new();
        let identity = fixture.parent(1).await;
        let ctx = fixture.ctx(&identity);
        let flow = FeedbackFlow::new(FeedbackKind::Complaint);

        let result = flow
            .callback(
                &ctx,
                None,
                CallbackAction::Feedback {
                    kind: FeedbackKind::Complaint,
                    decision: Decision::Confirm,
                },
            )
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Unchanged);
        assert!(fixture.store.recent_feedback(FeedbackKind::Complaint, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_parent_is_denied() {
        let fixture = FlowFixture::new();
        let identity = fixture.anonymous(7);
        let ctx = fixture.ctx(&identity);
        let flow = FeedbackFlow::new(FeedbackKind::Complaint);

        let err = flow
            .start(&ctx, Entry::Button(MenuButton::Complaint), &fixture.text(7, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::PermissionDenied("parent")));
    }
}
