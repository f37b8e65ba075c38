//! Localized strings and menu labels
//!
//! Handlers never reach for global tables: a [`Localizer`] is built once at
//! startup and handed to every turn.

mod catalog;

use serde::{Deserialize, Serialize};

/// Languages a user can pick during registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lang {
    En,
    Ru,
    Uz,
}

impl Lang {
    pub const ALL: [Lang; 3] = [Lang::Uz, Lang::Ru, Lang::En];

    pub fn code(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Ru => "ru",
            Lang::Uz => "uz",
        }
    }

    /// Parse a two-letter code; region suffixes like `ru-RU` are accepted.
    pub fn from_code(code: &str) -> Option<Self> {
        let base = code.split(['-', '_']).next().unwrap_or(code);
        match base.to_ascii_lowercase().as_str() {
            "en" => Some(Lang::En),
            "ru" => Some(Lang::Ru),
            "uz" => Some(Lang::Uz),
            _ => None,
        }
    }

    /// Name of the language written in that language (for the picker)
    pub fn native_name(self) -> &'static str {
        match self {
            Lang::En => "English",
            Lang::Ru => "Русский",
            Lang::Uz => "O'zbekcha",
        }
    }
}

/// Fixed keys of the message catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKey {
    // General
    TemporaryFailure,
    PermissionDenied,
    UnknownAction,
    NothingToConfirm,
    Cancelled,
    UseButtons,
    ChooseMenuItem,
    HelpGuest,
    HelpParent,
    HelpTeacher,
    HelpAdmin,
    GreetingParent,
    GreetingTeacher,
    GreetingAdmin,
    ConfirmButton,
    CancelButton,
    DoneButton,
    SubmitButton,
    TextExpected,

    // Registration and profile
    ChooseLanguage,
    LanguageSaved,
    AskPhone,
    SharePhoneButton,
    InvalidPhone,
    AskFullName,
    AskChildName,
    ChooseChildClass,
    NoClassesYet,
    ClassNotFound,
    RegistrationComplete,

    // Complaints and proposals
    AskComplaint,
    AskProposal,
    ConfirmComplaint,
    ConfirmProposal,
    ComplaintSent,
    ProposalSent,
    FeedbackDiscarded,
    NewComplaintNotice,
    NewProposalNotice,
    NoFeedback,
    RecentComplaints,
    RecentProposals,

    // Administration
    AdminPanelTitle,
    AdminClassesButton,
    AdminAddClassButton,
    AdminAddTeacherButton,
    AdminTimetableButton,
    AdminAnnounceButton,
    AdminComplaintsButton,
    AdminProposalsButton,
    ClassList,
    AskClassName,
    ClassCreated,
    ClassExists,
    ClassDeleted,
    AskTeacherPhone,
    AskTeacherName,
    ChooseTeacherClasses,
    TeacherCreated,
    TeacherExists,

    // Timetables
    ChooseTimetableClass,
    AskTimetableFile,
    TimetableSaved,
    TimetableMissing,
    TimetableUpdatedNotice,

    // Announcements
    AskAnnouncement,
    ConfirmAnnouncement,
    AnnouncementSent,
    AnnouncementNotice,
    NoAnnouncements,
    RecentAnnouncements,

    // Attendance
    ChooseAttendanceClass,
    MarkAbsentees,
    AttendanceSaved,
    AbsenceNotice,
    NoAbsences,
    AbsenceList,

    // Grading
    ChooseGradeClass,
    ChooseStudent,
    AskGrade,
    InvalidGrade,
    GradeSaved,
    GradeNotice,
    NoGrades,
    GradeList,
    NoStudents,
    NoTeacherClasses,
}

/// Reply-keyboard labels the router recognizes in free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuButton {
    AdminPanel,
    MainMenu,
    Complaint,
    Proposal,
    Timetable,
    Announcements,
    Grades,
    Attendance,
    Language,
    MarkAttendance,
    GradeStudents,
}

/// Which precedence tier a menu label belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonGroup {
    /// Always available, regardless of role or flow
    Shortcut,
    /// Registered parents only
    ParentMenu,
    /// Teachers only
    TeacherMenu,
}

impl MenuButton {
    pub const ALL: [MenuButton; 11] = [
        MenuButton::AdminPanel,
        MenuButton::MainMenu,
        MenuButton::Complaint,
        MenuButton::Proposal,
        MenuButton::Timetable,
        MenuButton::Announcements,
        MenuButton::Grades,
        MenuButton::Attendance,
        MenuButton::Language,
        MenuButton::MarkAttendance,
        MenuButton::GradeStudents,
    ];

    pub const PARENT_MENU: [MenuButton; 7] = [
        MenuButton::Complaint,
        MenuButton::Proposal,
        MenuButton::Timetable,
        MenuButton::Announcements,
        MenuButton::Grades,
        MenuButton::Attendance,
        MenuButton::Language,
    ];

    pub const TEACHER_MENU: [MenuButton; 2] = [MenuButton::MarkAttendance, MenuButton::GradeStudents];

    pub fn group(self) -> ButtonGroup {
        match self {
            MenuButton::AdminPanel | MenuButton::MainMenu => ButtonGroup::Shortcut,
            MenuButton::MarkAttendance | MenuButton::GradeStudents => ButtonGroup::TeacherMenu,
            MenuButton::Complaint
            | MenuButton::Proposal
            | MenuButton::Timetable
            | MenuButton::Announcements
            | MenuButton::Grades
            | MenuButton::Attendance
            | MenuButton::Language => ButtonGroup::ParentMenu,
        }
    }
}

/// Read-only string catalog shared by all turns
#[derive(Debug, Clone)]
pub struct Localizer {
    default_lang: Lang,
}

impl Localizer {
    pub fn new(default_lang: Lang) -> Self {
        Self { default_lang }
    }

    pub fn default_lang(&self) -> Lang {
        self.default_lang
    }

    #[allow(clippy::unused_self)]
    pub fn text(&self, lang: Lang, key: TextKey) -> &'static str {
        catalog::text(lang, key)
    }

    /// Render a catalog entry, substituting `{name}` placeholders.
    pub fn render(&self, lang: Lang, key: TextKey, args: &[(&str, &str)]) -> String {
        args.iter()
            .fold(self.text(lang, key).to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
    }

    #[allow(clippy::unused_self)]
    pub fn button(&self, lang: Lang, button: MenuButton) -> &'static str {
        catalog::button(lang, button)
    }

    /// Match free text against every menu label in every language.
    ///
    /// Labels are compared exactly after trimming; a parent who switched
    /// language mid-session may still press a button from the old keyboard.
    pub fn match_button(&self, text: &str) -> Option<MenuButton> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        MenuButton::ALL.into_iter().find(|button| {
            Lang::ALL
                .into_iter()
                .any(|lang| self.button(lang, *button) == text)
        })
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(Lang::Uz)
    }
}
