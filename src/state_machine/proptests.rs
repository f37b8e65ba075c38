//! Property-based tests for flow state and routing
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::flows::FlowRegistry;
use crate::i18n::{Lang, MenuButton};
use crate::runtime::identity::Role;
use crate::runtime::router::{decide, Route, RouteFacts, StateLookup};
use crate::runtime::state_manager::StateManager;
use crate::runtime::testing::InMemoryStateStore;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_lang() -> impl Strategy<Value = Lang> {
    prop::sample::select(Lang::ALL.to_vec())
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop::sample::select(vec![Role::Anonymous, Role::Parent, Role::Teacher, Role::Admin])
}

fn arb_text() -> impl Strategy<Value = String> {
    // Includes quotes and non-Latin letters so payload escaping is exercised
    "[a-zA-Zа-яА-Я0-9 \"'\\\\{}]{0,40}"
}

fn arb_phone() -> impl Strategy<Value = String> {
    "\\+998[0-9]{9}"
}

fn arb_ids() -> impl Strategy<Value = BTreeSet<i64>> {
    proptest::collection::btree_set(1i64..1000, 0..6)
}

fn arb_flow_state() -> impl Strategy<Value = FlowState> {
    prop_oneof![
        Just(FlowState::AwaitingLanguage),
        arb_lang().prop_map(|language| FlowState::AwaitingPhone { language }),
        (arb_lang(), arb_phone()).prop_map(|(language, phone)| FlowState::AwaitingFullName { language, phone }),
        (arb_lang(), arb_phone(), arb_text(), arb_text()).prop_map(|(language, phone, full_name, child_name)| {
            FlowState::AwaitingChildClass {
                language,
                phone,
                full_name,
                child_name,
            }
        }),
        Just(FlowState::AwaitingComplaintText),
        arb_text().prop_map(|draft| FlowState::ConfirmingComplaint { draft }),
        arb_text().prop_map(|draft| FlowState::ConfirmingProposal { draft }),
        Just(FlowState::AwaitingClassName),
        (arb_phone(), arb_text(), arb_ids()).prop_map(|(phone, full_name, class_ids)| {
            FlowState::AwaitingTeacherClasses {
                phone,
                full_name,
                class_ids,
            }
        }),
        (1i64..1000).prop_map(|class_id| FlowState::AwaitingTimetable { class_id }),
        arb_text().prop_map(|text| FlowState::ConfirmingAnnouncement { text }),
        (1i64..1000, arb_ids()).prop_map(|(class_id, absent)| FlowState::MarkingAttendance { class_id, absent }),
        (1i64..1000, 1i64..1000).prop_map(|(class_id, student_id)| FlowState::AwaitingGrade { class_id, student_id }),
    ]
}

fn arb_state_lookup() -> impl Strategy<Value = StateLookup> {
    prop_oneof![
        Just(StateLookup::Idle),
        Just(StateLookup::Unreadable),
        prop::sample::select(StateName::ALL.to_vec()).prop_map(StateLookup::Active),
    ]
}

fn arb_facts() -> impl Strategy<Value = RouteFacts> {
    (
        proptest::option::of(prop::sample::select(Command::ALL.to_vec())),
        proptest::option::of(prop::sample::select(MenuButton::ALL.to_vec())),
        arb_role(),
        any::<bool>(),
        any::<bool>(),
        arb_state_lookup(),
    )
        .prop_map(|(command, button, role, is_parent, is_teacher, state)| RouteFacts {
            command,
            button,
            role,
            is_parent,
            is_teacher: is_teacher || role == Role::Teacher,
            state,
        })
}

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![Just(Decision::Confirm), Just(Decision::Cancel)]
}

fn arb_callback_action() -> impl Strategy<Value = CallbackAction> {
    let id = 1i64..=i64::MAX;
    prop_oneof![
        arb_lang().prop_map(CallbackAction::Language),
        (
            prop_oneof![Just(FeedbackKind::Complaint), Just(FeedbackKind::Proposal)],
            arb_decision()
        )
            .prop_map(|(kind, decision)| CallbackAction::Feedback { kind, decision }),
        id.clone().prop_map(CallbackAction::RegistrationClass),
        prop::sample::select(AdminAction::ALL.to_vec()).prop_map(CallbackAction::Admin),
        id.clone().prop_map(CallbackAction::DeleteClass),
        id.clone().prop_map(CallbackAction::TeacherClassToggle),
        Just(CallbackAction::TeacherClassesDone),
        arb_decision().prop_map(CallbackAction::Announcement),
        id.clone().prop_map(CallbackAction::AttendanceToggle),
        Just(CallbackAction::AttendanceSubmit),
        id.prop_map(CallbackAction::GradeStudent),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A stored state reads back with the same name and payload
    #[test]
    fn prop_state_round_trips(state in arb_flow_state(), user_id in 1i64..1_000_000) {
        let manager = StateManager::new(Arc::new(InMemoryStateStore::new()));
        let (name, payload) = block_on(async {
            manager.set(user_id, &state).await.unwrap();
            (manager.get(user_id).await.unwrap(), manager.get_payload(user_id).await.unwrap())
        });
        prop_assert_eq!(name, Some(state.name()));
        prop_assert_eq!(payload, state);
    }

    /// Only the most recent write is observable
    #[test]
    fn prop_last_write_wins(states in proptest::collection::vec(arb_flow_state(), 1..8)) {
        let manager = StateManager::new(Arc::new(InMemoryStateStore::new()));
        let stored = block_on(async {
            for state in &states {
                manager.set(7, state).await.unwrap();
            }
            manager.get_payload(7).await.unwrap()
        });
        prop_assert_eq!(Some(&stored), states.last());
    }

    /// Commands win over any state, button, or role
    #[test]
    fn prop_commands_take_precedence(facts in arb_facts(), command in prop::sample::select(Command::ALL.to_vec())) {
        let registry = FlowRegistry::standard().unwrap();
        let facts = RouteFacts { command: Some(command), ..facts };
        prop_assert_eq!(decide(&facts, &registry), Route::Command(command));
    }

    /// A teacher never resumes or enters a flow owned by another audience
    #[test]
    fn prop_teacher_stays_at_teacher_desk(facts in arb_facts()) {
        let registry = FlowRegistry::standard().unwrap();
        let facts = RouteFacts { command: None, role: Role::Teacher, ..facts };
        match decide(&facts, &registry) {
            Route::Continue { state, fallback } => {
                prop_assert_eq!(state.audience(), Role::Teacher);
                prop_assert_eq!(fallback, Role::Teacher);
            }
            Route::MenuButton(button) => {
                prop_assert!(MenuButton::TEACHER_MENU.contains(&button));
            }
            Route::Default { audience, .. } => prop_assert_eq!(audience, Role::Teacher),
            Route::Shortcut(_) => {}
            Route::Command(_) => return Err(TestCaseError::fail("no command was given")),
        }
    }

    /// Any non-idle state that is not resumed is discarded
    #[test]
    fn prop_default_discards_stale_state(facts in arb_facts()) {
        let registry = FlowRegistry::standard().unwrap();
        if let Route::Default { discard_state, .. } = decide(&facts, &registry) {
            prop_assert_eq!(discard_state, facts.state != StateLookup::Idle);
        }
    }

    /// The callback parser accepts or rejects any string without panicking,
    /// and whatever it accepts has a canonical encoding
    #[test]
    fn prop_callback_parser_is_total(data in "\\PC{0,40}") {
        if let Ok(action) = data.parse::<CallbackAction>() {
            prop_assert_eq!(action.to_data().parse::<CallbackAction>().ok(), Some(action));
        }
    }

    /// Encoded callbacks fit the 64-byte limit of inline button data
    #[test]
    fn prop_callback_data_is_bounded(action in arb_callback_action()) {
        let data = action.to_data();
        prop_assert!(data.len() <= 64, "{} is {} bytes", data, data.len());
        prop_assert_eq!(data.parse::<CallbackAction>().ok(), Some(action));
    }
}
