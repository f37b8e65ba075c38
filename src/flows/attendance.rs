//! Daily attendance: teachers mark absentees, parents review absences

use super::{keyboards, Binding, Entry, FlowError, FlowHandler, FlowResult, TurnContext, TurnResult};
use crate::i18n::{MenuButton, TextKey};
use crate::state_machine::{
    CallbackAction, CallbackKind, Effect, FlowState, IncomingMessage, Keyboard, Notification, StateName,
};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// How many absence dates a parent sees
const HISTORY_LIMIT: usize = 10;

pub struct AttendanceFlow;

impl AttendanceFlow {
    async fn register_keyboard(
        ctx: &TurnContext<'_>,
        class_id: i64,
        absent: &BTreeSet<i64>,
    ) -> Result<Option<Keyboard>, FlowError> {
        let students = ctx.store.students_in_class(class_id).await?;
        if students.is_empty() {
            return Ok(None);
        }
        Ok(Some(keyboards::toggles(
            students.iter().map(|s| (s.id, s.full_name.as_str())),
            absent,
            CallbackAction::AttendanceToggle,
            (ctx.text(TextKey::SubmitButton), CallbackAction::AttendanceSubmit),
        )))
    }

    async fn choose_class(ctx: &TurnContext<'_>) -> FlowResult {
        let teacher = ctx.require_teacher()?;
        let classes = ctx.store.teacher_classes(teacher.id).await?;
        if classes.is_empty() {
            return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::NoTeacherClasses)));
        }
        Ok(TurnResult::unchanged().with_effect(Effect::reply_with(
            ctx.text(TextKey::ChooseAttendanceClass),
            keyboards::classes(&classes, CallbackAction::AttendanceClass),
        )))
    }

    async fn absences(ctx: &TurnContext<'_>) -> FlowResult {
        let parent = ctx.require_parent()?;
        let dates = match parent.student_id {
            Some(student_id) => ctx.store.absences_for_student(student_id, HISTORY_LIMIT).await?,
            None => Vec::new(),
        };
        if dates.is_empty() {
            return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::NoAbsences)));
        }
        let mut text = ctx.render(TextKey::AbsenceList, &[("child", &parent.child_name)]);
        for date in dates {
            text.push_str("\n• ");
            text.push_str(&date.format("%d.%m.%Y").to_string());
        }
        Ok(TurnResult::unchanged().with_effect(Effect::reply(text)))
    }

    async fn open_register(ctx: &TurnContext<'_>, class_id: i64) -> FlowResult {
        ctx.teacher_class(class_id).await?;
        let absent = BTreeSet::new();
        let Some(keyboard) = Self::register_keyboard(ctx, class_id, &absent).await? else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NoStudents))));
        };
        Ok(TurnResult::transition(FlowState::MarkingAttendance { class_id, absent })
            .with_effect(Effect::ack())
            .with_effect(Effect::reply_with(ctx.text(TextKey::MarkAbsentees), keyboard)))
    }

    async fn toggle(ctx: &TurnContext<'_>, state: Option<FlowState>, student_id: i64) -> FlowResult {
        let Some(FlowState::MarkingAttendance { class_id, mut absent }) = state else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NothingToConfirm))));
        };
        ctx.teacher_class(class_id).await?;
        let in_class = ctx
            .store
            .student_by_id(student_id)
            .await?
            .is_some_and(|s| s.class_id == class_id);
        if !in_class {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction))));
        }
        if !absent.remove(&student_id) {
            absent.insert(student_id);
        }
        let Some(keyboard) = Self::register_keyboard(ctx, class_id, &absent).await? else {
            return Ok(TurnResult::clear().with_effect(Effect::toast(ctx.text(TextKey::NoStudents))));
        };
        Ok(TurnResult::transition(FlowState::MarkingAttendance { class_id, absent })
            .with_effect(Effect::ack())
            .with_effect(Effect::reply_with(ctx.text(TextKey::MarkAbsentees), keyboard)))
    }

    async fn submit(ctx: &TurnContext<'_>, state: Option<FlowState>) -> FlowResult {
        let Some(FlowState::MarkingAttendance { class_id, absent }) = state else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NothingToConfirm))));
        };
        let teacher = ctx.require_teacher()?;
        ctx.teacher_class(class_id).await?;

        let summary = ctx
            .store
            .record_attendance(class_id, ctx.today, &absent, teacher.id)
            .await?;
        tracing::info!(
            class_id,
            teacher_id = teacher.id,
            total = summary.total,
            absent = summary.absent.len(),
            "Attendance recorded"
        );

        let date = summary.date.format("%d.%m.%Y").to_string();
        let mut notices = Vec::new();
        for student in &summary.absent {
            let Some(parent_id) = student.parent_user_id else {
                continue;
            };
            let lang = ctx.recipient_lang(parent_id).await?;
            let text = ctx.localizer.render(
                lang,
                TextKey::AbsenceNotice,
                &[("child", &student.full_name), ("date", &date)],
            );
            notices.push(Effect::notify(Notification::text(parent_id, text)));
        }

        let saved = ctx.render(
            TextKey::AttendanceSaved,
            &[
                ("absent", &summary.absent.len().to_string()),
                ("total", &summary.total.to_string()),
            ],
        );
        Ok(TurnResult::clear()
            .with_effect(Effect::ack())
            .with_effect(Effect::reply_with(saved, keyboards::home_for(ctx)))
            .with_effects(notices))
    }
}

#[async_trait]
impl FlowHandler for AttendanceFlow {
    fn name(&self) -> &'static str {
        "attendance"
    }

    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::TeacherMenu(MenuButton::MarkAttendance),
            Binding::ParentMenu(MenuButton::Attendance),
            Binding::State(StateName::MarkingAttendance),
            Binding::Callback(CallbackKind::AttendanceClass),
            Binding::Callback(CallbackKind::AttendanceToggle),
            Binding::Callback(CallbackKind::AttendanceSubmit),
        ]
    }

    async fn start(&self, ctx: &TurnContext<'_>, entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        match entry {
            Entry::Button(MenuButton::Attendance) => Self::absences(ctx).await,
            _ => Self::choose_class(ctx).await,
        }
    }

    async fn resume(&self, ctx: &TurnContext<'_>, state: FlowState, _msg: &IncomingMessage) -> FlowResult {
        let FlowState::MarkingAttendance { class_id, ref absent } = state else {
            tracing::warn!(state = %state.name(), "Attendance flow resumed with foreign state");
            return Ok(TurnResult::clear());
        };
        ctx.teacher_class(class_id).await?;
        let Some(keyboard) = Self::register_keyboard(ctx, class_id, absent).await? else {
            return Ok(TurnResult::clear().with_effect(ctx.reply(TextKey::NoStudents)));
        };
        Ok(TurnResult::unchanged()
            .with_effect(ctx.reply(TextKey::UseButtons))
            .with_effect(Effect::reply_with(ctx.text(TextKey::MarkAbsentees), keyboard)))
    }

    async fn callback(&self, ctx: &TurnContext<'_>, state: Option<FlowState>, action: CallbackAction) -> FlowResult {
        match action {
            CallbackAction::AttendanceClass(class_id) => Self::open_register(ctx, class_id).await,
            CallbackAction::AttendanceToggle(student_id) => Self::toggle(ctx, state, student_id).await,
            CallbackAction::AttendanceSubmit => Self::submit(ctx, state).await,
            _ => Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction)))),
        }
    }
}
