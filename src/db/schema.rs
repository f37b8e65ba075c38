//! Database schema and record types

use crate::i18n::Lang;
use crate::state_machine::{FeedbackKind, FileRef, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversation_states (
    user_id INTEGER PRIMARY KEY,
    state TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    timetable_kind TEXT,
    timetable_file_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT NOT NULL,
    class_id INTEGER NOT NULL,
    parent_user_id INTEGER,

    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id, full_name);

CREATE TABLE IF NOT EXISTS parents (
    user_id INTEGER PRIMARY KEY,
    phone TEXT NOT NULL,
    full_name TEXT NOT NULL,
    child_name TEXT NOT NULL,
    class_id INTEGER,
    student_id INTEGER,
    language TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE SET NULL,
    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_parents_class ON parents(class_id);

CREATE TABLE IF NOT EXISTS teachers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    user_id INTEGER UNIQUE,
    active BOOLEAN NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS teacher_classes (
    teacher_id INTEGER NOT NULL,
    class_id INTEGER NOT NULL,
    PRIMARY KEY (teacher_id, class_id),

    FOREIGN KEY (teacher_id) REFERENCES teachers(id) ON DELETE CASCADE,
    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS admins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER UNIQUE,
    phone TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    author_user_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feedback_kind ON feedback(kind, created_at DESC);

CREATE TABLE IF NOT EXISTS announcements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    author_user_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    student_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    present BOOLEAN NOT NULL,
    teacher_id INTEGER NOT NULL,
    PRIMARY KEY (student_id, date),

    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS grades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    teacher_id INTEGER NOT NULL,
    value INTEGER NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id, created_at DESC);
";

/// Raw conversation state row; the name is validated by the state manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    pub state: String,
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    pub user_id: UserId,
    pub phone: String,
    pub full_name: String,
    pub child_name: String,
    pub class_id: Option<i64>,
    pub student_id: Option<i64>,
    pub language: Lang,
}

/// Fields collected by the registration flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParent {
    pub user_id: UserId,
    pub phone: String,
    pub full_name: String,
    pub child_name: String,
    pub class_id: i64,
    pub language: Lang,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub phone: String,
    pub full_name: String,
    /// Set once the teacher opens the bot and shares a matching phone
    pub user_id: Option<UserId>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeacher {
    pub phone: String,
    pub full_name: String,
    pub class_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: i64,
    pub name: String,
    pub timetable: Option<FileRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub full_name: String,
    pub class_id: i64,
    pub parent_user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub kind: FeedbackKind,
    pub author_user_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub author_user_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: i64,
    pub student_id: i64,
    pub teacher_id: i64,
    pub value: u8,
    pub created_at: DateTime<Utc>,
}

/// Result of submitting one class register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceSummary {
    pub date: NaiveDate,
    pub total: usize,
    pub absent: Vec<Student>,
}
