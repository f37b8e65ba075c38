//! Grades: teachers enter them, parents review them

use super::{keyboards, Binding, Entry, FlowHandler, FlowResult, TurnContext, TurnResult};
use crate::db::Student;
use crate::i18n::{MenuButton, TextKey};
use crate::state_machine::{
    CallbackAction, CallbackKind, Effect, FlowState, IncomingMessage, InlineButton, Keyboard, Notification, StateName,
};
use async_trait::async_trait;

/// How many grades a parent sees
const HISTORY_LIMIT: usize = 10;

/// Parse a grade on the 1-5 scale
fn parse_grade(text: &str) -> Option<u8> {
    text.trim().parse::<u8>().ok().filter(|g| (1..=5).contains(g))
}

fn student_picker(students: &[Student]) -> Keyboard {
    Keyboard::inline_column(
        students
            .iter()
            .map(|s| InlineButton::new(s.full_name.clone(), &CallbackAction::GradeStudent(s.id))),
    )
}

pub struct GradingFlow;

impl GradingFlow {
    async fn choose_class(ctx: &TurnContext<'_>) -> FlowResult {
        let teacher = ctx.require_teacher()?;
        let classes = ctx.store.teacher_classes(teacher.id).await?;
        if classes.is_empty() {
            return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::NoTeacherClasses)));
        }
        Ok(TurnResult::unchanged().with_effect(Effect::reply_with(
            ctx.text(TextKey::ChooseGradeClass),
            keyboards::classes(&classes, CallbackAction::GradeClass),
        )))
    }

    async fn grades(ctx: &TurnContext<'_>) -> FlowResult {
        let parent = ctx.require_parent()?;
        let grades = match parent.student_id {
            Some(student_id) => ctx.store.grades_for_student(student_id, HISTORY_LIMIT).await?,
            None => Vec::new(),
        };
        if grades.is_empty() {
            return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::NoGrades)));
        }
        let mut text = ctx.render(TextKey::GradeList, &[("child", &parent.child_name)]);
        for grade in grades {
            text.push_str(&format!("\n• {}: {}", grade.created_at.format("%d.%m.%Y"), grade.value));
        }
        Ok(TurnResult::unchanged().with_effect(Effect::reply(text)))
    }

    async fn pick_class(ctx: &TurnContext<'_>, class_id: i64) -> FlowResult {
        ctx.teacher_class(class_id).await?;
        let students = ctx.store.students_in_class(class_id).await?;
        if students.is_empty() {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NoStudents))));
        }
        Ok(TurnResult::unchanged()
            .with_effect(Effect::ack())
            .with_effect(Effect::reply_with(ctx.text(TextKey::ChooseStudent), student_picker(&students))))
    }

    async fn pick_student(ctx: &TurnContext<'_>, student_id: i64) -> FlowResult {
        let Some(student) = ctx.store.student_by_id(student_id).await? else {
            return Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::NoStudents))));
        };
        ctx.teacher_class(student.class_id).await?;
        Ok(TurnResult::transition(FlowState::AwaitingGrade {
            class_id: student.class_id,
            student_id,
        })
        .with_effect(Effect::ack())
        .with_effect(Effect::reply_with(
            ctx.render(TextKey::AskGrade, &[("student", &student.full_name)]),
            Keyboard::Remove,
        )))
    }
}

#[async_trait]
impl FlowHandler for GradingFlow {
    fn name(&self) -> &'static str {
        "grading"
    }

    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::TeacherMenu(MenuButton::GradeStudents),
            Binding::ParentMenu(MenuButton::Grades),
            Binding::State(StateName::AwaitingGrade),
            Binding::Callback(CallbackKind::GradeClass),
            Binding::Callback(CallbackKind::GradeStudent),
        ]
    }

    async fn start(&self, ctx: &TurnContext<'_>, entry: Entry, _msg: &IncomingMessage) -> FlowResult {
        match entry {
            Entry::Button(MenuButton::Grades) => Self::grades(ctx).await,
            _ => Self::choose_class(ctx).await,
        }
    }

    async fn resume(&self, ctx: &TurnContext<'_>, state: FlowState, msg: &IncomingMessage) -> FlowResult {
        let FlowState::AwaitingGrade { class_id, student_id } = state else {
            tracing::warn!(state = %state.name(), "Grading flow resumed with foreign state");
            return Ok(TurnResult::clear());
        };
        let teacher = ctx.require_teacher()?;
        ctx.teacher_class(class_id).await?;

        let Some(value) = msg.body().and_then(parse_grade) else {
            return Ok(TurnResult::unchanged().with_effect(ctx.reply(TextKey::InvalidGrade)));
        };
        let student = ctx
            .store
            .student_by_id(student_id)
            .await?
            .filter(|s| s.class_id == class_id);
        let Some(student) = student else {
            return Ok(TurnResult::clear().with_effect(ctx.reply(TextKey::NoStudents)));
        };

        let grade = ctx.store.record_grade(student.id, teacher.id, value).await?;
        tracing::info!(grade_id = grade.id, student_id, teacher_id = teacher.id, "Grade recorded");

        let value = value.to_string();
        let mut result = TurnResult::clear().with_effect(Effect::reply_with(
            ctx.render(TextKey::GradeSaved, &[("student", &student.full_name), ("grade", &value)]),
            keyboards::home_for(ctx),
        ));
        if let Some(parent_id) = student.parent_user_id {
            let lang = ctx.recipient_lang(parent_id).await?;
            let notice = ctx.localizer.render(
                lang,
                TextKey::GradeNotice,
                &[("child", &student.full_name), ("grade", &value)],
            );
            result = result.with_effect(Effect::notify(Notification::text(parent_id, notice)));
        }
        Ok(result)
    }

    async fn callback(&self, ctx: &TurnContext<'_>, _state: Option<FlowState>, action: CallbackAction) -> FlowResult {
        match action {
            CallbackAction::GradeClass(class_id) => Self::pick_class(ctx, class_id).await,
            CallbackAction::GradeStudent(student_id) => Self::pick_student(ctx, student_id).await,
            _ => Ok(TurnResult::unchanged().with_effect(Effect::toast(ctx.text(TextKey::UnknownAction)))),
        }
    }
}
