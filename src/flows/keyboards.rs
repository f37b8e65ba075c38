//! Keyboard builders shared by the flows

use super::TurnContext;
use crate::db::SchoolClass;
use crate::i18n::{Lang, Localizer, MenuButton, TextKey};
use crate::runtime::identity::{Identity, Role};
use crate::state_machine::{AdminAction, CallbackAction, Decision, InlineButton, Keyboard, ReplyButton};
use std::collections::BTreeSet;

/// Reply keyboard with every entry point the identity can use
pub fn home(localizer: &Localizer, lang: Lang, identity: &Identity) -> Keyboard {
    let label = |b: MenuButton| ReplyButton::new(localizer.button(lang, b));
    let mut rows: Vec<Vec<ReplyButton>> = Vec::new();

    if identity.is_parent() && identity.role != Role::Teacher {
        rows.extend(
            MenuButton::PARENT_MENU
                .chunks(2)
                .map(|pair| pair.iter().copied().map(label).collect()),
        );
    }
    if identity.is_teacher() {
        rows.push(MenuButton::TEACHER_MENU.into_iter().map(label).collect());
    }
    if identity.is_admin() {
        rows.push(vec![label(MenuButton::AdminPanel)]);
    }
    if rows.is_empty() {
        return Keyboard::Remove;
    }
    rows.push(vec![label(MenuButton::MainMenu)]);
    Keyboard::Reply(rows)
}

pub fn home_for(ctx: &TurnContext<'_>) -> Keyboard {
    home(ctx.localizer, ctx.lang, ctx.identity)
}

pub fn language_picker() -> Keyboard {
    Keyboard::Inline(vec![Lang::ALL
        .into_iter()
        .map(|lang| InlineButton::new(lang.native_name(), &CallbackAction::Language(lang)))
        .collect()])
}

pub fn share_phone(localizer: &Localizer, lang: Lang) -> Keyboard {
    Keyboard::Reply(vec![vec![ReplyButton::contact(
        localizer.text(lang, TextKey::SharePhoneButton),
    )]])
}

/// Confirm / cancel pair; `action` builds the callback for each decision
pub fn confirm(ctx: &TurnContext<'_>, action: impl Fn(Decision) -> CallbackAction) -> Keyboard {
    Keyboard::Inline(vec![vec![
        InlineButton::new(ctx.text(TextKey::ConfirmButton), &action(Decision::Confirm)),
        InlineButton::new(ctx.text(TextKey::CancelButton), &action(Decision::Cancel)),
    ]])
}

/// One button per class
pub fn classes(classes: &[SchoolClass], action: impl Fn(i64) -> CallbackAction) -> Keyboard {
    Keyboard::inline_column(
        classes
            .iter()
            .map(|class| InlineButton::new(class.name.clone(), &action(class.id))),
    )
}

/// Multi-select list: checked items carry a mark, plus a closing button
pub fn toggles<'a>(
    items: impl IntoIterator<Item = (i64, &'a str)>,
    selected: &BTreeSet<i64>,
    toggle: impl Fn(i64) -> CallbackAction,
    finish: (&str, CallbackAction),
) -> Keyboard {
    let mut rows: Vec<Vec<InlineButton>> = items
        .into_iter()
        .map(|(id, name)| {
            let text = if selected.contains(&id) {
                format!("✅ {name}")
            } else {
                name.to_string()
            };
            vec![InlineButton::new(text, &toggle(id))]
        })
        .collect();
    rows.push(vec![InlineButton::new(finish.0, &finish.1)]);
    Keyboard::Inline(rows)
}

pub fn admin_panel(ctx: &TurnContext<'_>) -> Keyboard {
    let key = |action: AdminAction| match action {
        AdminAction::Classes => TextKey::AdminClassesButton,
        AdminAction::AddClass => TextKey::AdminAddClassButton,
        AdminAction::AddTeacher => TextKey::AdminAddTeacherButton,
        AdminAction::Timetable => TextKey::AdminTimetableButton,
        AdminAction::Announce => TextKey::AdminAnnounceButton,
        AdminAction::Complaints => TextKey::AdminComplaintsButton,
        AdminAction::Proposals => TextKey::AdminProposalsButton,
    };
    Keyboard::inline_column(
        AdminAction::ALL
            .into_iter()
            .map(|action| InlineButton::new(ctx.text(key(action)), &CallbackAction::Admin(action))),
    )
}
