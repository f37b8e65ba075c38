//! Typed callback identifiers
//!
//! Inline buttons carry a short string (`complaint:confirm`, `att_toggle:17`).
//! This module is the only place that knows the wire spelling: handlers
//! receive a [`CallbackAction`] and never slice strings themselves.

use super::state::FeedbackKind;
use crate::i18n::Lang;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Confirm,
    Cancel,
}

impl Decision {
    fn as_str(self) -> &'static str {
        match self {
            Decision::Confirm => "confirm",
            Decision::Cancel => "cancel",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "confirm" => Some(Decision::Confirm),
            "cancel" => Some(Decision::Cancel),
            _ => None,
        }
    }
}

/// Entries of the admin panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    Classes,
    AddClass,
    AddTeacher,
    Timetable,
    Announce,
    Complaints,
    Proposals,
}

impl AdminAction {
    pub const ALL: [AdminAction; 7] = [
        AdminAction::Classes,
        AdminAction::AddClass,
        AdminAction::AddTeacher,
        AdminAction::Timetable,
        AdminAction::Announce,
        AdminAction::Complaints,
        AdminAction::Proposals,
    ];

    fn as_str(self) -> &'static str {
        match self {
            AdminAction::Classes => "classes",
            AdminAction::AddClass => "add_class",
            AdminAction::AddTeacher => "add_teacher",
            AdminAction::Timetable => "timetable",
            AdminAction::Announce => "announce",
            AdminAction::Complaints => "complaints",
            AdminAction::Proposals => "proposals",
        }
    }
}

/// A decoded inline-button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Language(Lang),
    Feedback { kind: FeedbackKind, decision: Decision },
    RegistrationClass(i64),
    Admin(AdminAction),
    DeleteClass(i64),
    TimetableClass(i64),
    TeacherClassToggle(i64),
    TeacherClassesDone,
    Announcement(Decision),
    AttendanceClass(i64),
    AttendanceToggle(i64),
    AttendanceSubmit,
    GradeClass(i64),
    GradeStudent(i64),
}

/// Registry key for callback bindings: the action without its argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Language,
    Feedback(FeedbackKind),
    RegistrationClass,
    Admin(AdminAction),
    DeleteClass,
    TimetableClass,
    TeacherClassToggle,
    TeacherClassesDone,
    Announcement,
    AttendanceClass,
    AttendanceToggle,
    AttendanceSubmit,
    GradeClass,
    GradeStudent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackParseError {
    #[error("unknown callback action: {0:?}")]
    Unknown(String),
    #[error("malformed argument in callback {data:?}: {reason}")]
    MalformedArgument { data: String, reason: String },
}

impl CallbackAction {
    pub fn kind(&self) -> CallbackKind {
        match self {
            CallbackAction::Language(_) => CallbackKind::Language,
            CallbackAction::Feedback { kind, .. } => CallbackKind::Feedback(*kind),
            CallbackAction::RegistrationClass(_) => CallbackKind::RegistrationClass,
            CallbackAction::Admin(action) => CallbackKind::Admin(*action),
            CallbackAction::DeleteClass(_) => CallbackKind::DeleteClass,
            CallbackAction::TimetableClass(_) => CallbackKind::TimetableClass,
            CallbackAction::TeacherClassToggle(_) => CallbackKind::TeacherClassToggle,
            CallbackAction::TeacherClassesDone => CallbackKind::TeacherClassesDone,
            CallbackAction::Announcement(_) => CallbackKind::Announcement,
            CallbackAction::AttendanceClass(_) => CallbackKind::AttendanceClass,
            CallbackAction::AttendanceToggle(_) => CallbackKind::AttendanceToggle,
            CallbackAction::AttendanceSubmit => CallbackKind::AttendanceSubmit,
            CallbackAction::GradeClass(_) => CallbackKind::GradeClass,
            CallbackAction::GradeStudent(_) => CallbackKind::GradeStudent,
        }
    }

    /// Wire form, suitable for an inline button's callback data
    pub fn to_data(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Language(lang) => write!(f, "lang:{}", lang.code()),
            CallbackAction::Feedback { kind, decision } => {
                write!(f, "{}:{}", kind.as_str(), decision.as_str())
            }
            CallbackAction::RegistrationClass(id) => write!(f, "reg_class:{id}"),
            CallbackAction::Admin(action) => write!(f, "admin:{}", action.as_str()),
            CallbackAction::DeleteClass(id) => write!(f, "del_class:{id}"),
            CallbackAction::TimetableClass(id) => write!(f, "tt_class:{id}"),
            CallbackAction::TeacherClassToggle(id) => write!(f, "tch_class:{id}"),
            CallbackAction::TeacherClassesDone => f.write_str("tch_done"),
            CallbackAction::Announcement(decision) => write!(f, "announce:{}", decision.as_str()),
            CallbackAction::AttendanceClass(id) => write!(f, "att_class:{id}"),
            CallbackAction::AttendanceToggle(id) => write!(f, "att_toggle:{id}"),
            CallbackAction::AttendanceSubmit => f.write_str("att_submit"),
            CallbackAction::GradeClass(id) => write!(f, "grade_class:{id}"),
            CallbackAction::GradeStudent(id) => write!(f, "grade_student:{id}"),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = CallbackParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "tch_done" => return Ok(CallbackAction::TeacherClassesDone),
            "att_submit" => return Ok(CallbackAction::AttendanceSubmit),
            _ => {}
        }

        let unknown = || CallbackParseError::Unknown(data.to_string());
        let (prefix, arg) = data.split_once(':').ok_or_else(unknown)?;
        let malformed = |reason: &str| CallbackParseError::MalformedArgument {
            data: data.to_string(),
            reason: reason.to_string(),
        };
        let id = || parse_id(arg).ok_or_else(|| malformed("expected a positive id"));

        match prefix {
            "lang" => Lang::from_code(arg)
                .filter(|lang| lang.code() == arg)
                .map(CallbackAction::Language)
                .ok_or_else(|| malformed("unsupported language")),
            "complaint" | "proposal" => {
                let kind = FeedbackKind::from_str_opt(prefix).ok_or_else(unknown)?;
                let decision = Decision::parse(arg).ok_or_else(|| malformed("expected confirm or cancel"))?;
                Ok(CallbackAction::Feedback { kind, decision })
            }
            "announce" => Decision::parse(arg)
                .map(CallbackAction::Announcement)
                .ok_or_else(|| malformed("expected confirm or cancel")),
            "admin" => AdminAction::ALL
                .into_iter()
                .find(|action| action.as_str() == arg)
                .map(CallbackAction::Admin)
                .ok_or_else(|| malformed("unknown admin action")),
            "reg_class" => Ok(CallbackAction::RegistrationClass(id()?)),
            "del_class" => Ok(CallbackAction::DeleteClass(id()?)),
            "tt_class" => Ok(CallbackAction::TimetableClass(id()?)),
            "tch_class" => Ok(CallbackAction::TeacherClassToggle(id()?)),
            "att_class" => Ok(CallbackAction::AttendanceClass(id()?)),
            "att_toggle" => Ok(CallbackAction::AttendanceToggle(id()?)),
            "grade_class" => Ok(CallbackAction::GradeClass(id()?)),
            "grade_student" => Ok(CallbackAction::GradeStudent(id()?)),
            _ => Err(unknown()),
        }
    }
}

fn parse_id(arg: &str) -> Option<i64> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    arg.parse::<i64>().ok().filter(|id| *id > 0)
}
