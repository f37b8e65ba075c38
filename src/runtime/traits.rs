//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the router and flows with in-memory
//! implementations.

use crate::db::{
    Announcement, AttendanceSummary, Database, DbError, Feedback, Grade, NewParent, NewTeacher, Parent,
    SchoolClass, StoredState, Student, Teacher,
};
use crate::i18n::Lang;
use crate::state_machine::{ChatId, FeedbackKind, FileRef, Keyboard, UserId};
use crate::telegram::TransportError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Failure at the storage boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    /// A uniqueness rule rejected the write (duplicate class name, phone)
    #[error("conflicting record: {0}")]
    Conflict(String),
    /// A referenced record does not exist
    #[error("missing record: {0}")]
    Missing(String),
}

impl From<DbError> for StorageError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ClassExists(name) => StorageError::Conflict(name),
            DbError::TeacherExists(phone) => StorageError::Conflict(phone),
            DbError::ClassNotFound(id) => StorageError::Missing(format!("class {id}")),
            DbError::Sqlite(e) => StorageError::Backend(e.to_string()),
        }
    }
}

/// Storage for per-user conversation state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_state(&self, user_id: UserId) -> Result<Option<StoredState>, StorageError>;

    /// Replace the record for `user_id`; the write is atomic
    async fn save_state(&self, user_id: UserId, state: &str, payload: &str) -> Result<(), StorageError>;

    /// Deleting a missing record is not an error
    async fn delete_state(&self, user_id: UserId) -> Result<(), StorageError>;
}

/// School records read and written by the flows
#[async_trait]
pub trait SchoolStore: Send + Sync {
    // Identity
    async fn parent_by_user(&self, user_id: UserId) -> Result<Option<Parent>, StorageError>;
    async fn teacher_by_user(&self, user_id: UserId) -> Result<Option<Teacher>, StorageError>;
    async fn teacher_by_phone(&self, phone: &str) -> Result<Option<Teacher>, StorageError>;
    async fn bind_teacher(&self, teacher_id: i64, user_id: UserId) -> Result<Option<Teacher>, StorageError>;
    async fn is_listed_admin(&self, user_id: UserId, phones: &[String]) -> Result<bool, StorageError>;
    async fn admin_user_ids(&self) -> Result<Vec<UserId>, StorageError>;

    // Parents
    async fn register_parent(&self, parent: &NewParent) -> Result<Parent, StorageError>;
    async fn set_parent_language(&self, user_id: UserId, lang: Lang) -> Result<bool, StorageError>;
    async fn parent_user_ids(&self, class_id: Option<i64>) -> Result<Vec<UserId>, StorageError>;

    // Classes and teachers
    async fn classes(&self) -> Result<Vec<SchoolClass>, StorageError>;
    async fn class_by_id(&self, class_id: i64) -> Result<Option<SchoolClass>, StorageError>;
    async fn create_class(&self, name: &str) -> Result<SchoolClass, StorageError>;
    async fn delete_class(&self, class_id: i64) -> Result<bool, StorageError>;
    async fn set_timetable(&self, class_id: i64, file: &FileRef) -> Result<(), StorageError>;
    async fn create_teacher(&self, teacher: &NewTeacher) -> Result<Teacher, StorageError>;
    async fn teacher_classes(&self, teacher_id: i64) -> Result<Vec<SchoolClass>, StorageError>;

    // Students
    async fn students_in_class(&self, class_id: i64) -> Result<Vec<Student>, StorageError>;
    async fn student_by_id(&self, student_id: i64) -> Result<Option<Student>, StorageError>;

    // Feedback and announcements
    async fn submit_feedback(&self, kind: FeedbackKind, author: UserId, text: &str) -> Result<Feedback, StorageError>;
    async fn recent_feedback(&self, kind: FeedbackKind, limit: usize) -> Result<Vec<Feedback>, StorageError>;
    async fn create_announcement(&self, author: UserId, text: &str) -> Result<Announcement, StorageError>;
    async fn recent_announcements(&self, limit: usize) -> Result<Vec<Announcement>, StorageError>;

    // Attendance and grades
    async fn record_attendance(
        &self,
        class_id: i64,
        date: NaiveDate,
        absent: &BTreeSet<i64>,
        teacher_id: i64,
    ) -> Result<AttendanceSummary, StorageError>;
    async fn record_grade(&self, student_id: i64, teacher_id: i64, value: u8) -> Result<Grade, StorageError>;
    async fn grades_for_student(&self, student_id: i64, limit: usize) -> Result<Vec<Grade>, StorageError>;
    async fn absences_for_student(&self, student_id: i64, limit: usize) -> Result<Vec<NaiveDate>, StorageError>;
}

/// Outbound side of the chat transport
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    /// Acknowledge a callback; `text` is shown as a short toast
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), TransportError>;

    async fn send_photo(&self, chat_id: ChatId, file: &FileRef, caption: Option<&str>) -> Result<FileRef, TransportError>;

    async fn send_document(
        &self,
        chat_id: ChatId,
        file: &FileRef,
        caption: Option<&str>,
    ) -> Result<FileRef, TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn load_state(&self, user_id: UserId) -> Result<Option<StoredState>, StorageError> {
        (**self).load_state(user_id).await
    }

    async fn save_state(&self, user_id: UserId, state: &str, payload: &str) -> Result<(), StorageError> {
        (**self).save_state(user_id, state, payload).await
    }

    async fn delete_state(&self, user_id: UserId) -> Result<(), StorageError> {
        (**self).delete_state(user_id).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        (**self).send_message(chat_id, text, keyboard).await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id, text).await
    }

    async fn send_photo(&self, chat_id: ChatId, file: &FileRef, caption: Option<&str>) -> Result<FileRef, TransportError> {
        (**self).send_photo(chat_id, file, caption).await
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file: &FileRef,
        caption: Option<&str>,
    ) -> Result<FileRef, TransportError> {
        (**self).send_document(chat_id, file, caption).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as both state and school storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StateStore for DatabaseStorage {
    async fn load_state(&self, user_id: UserId) -> Result<Option<StoredState>, StorageError> {
        Ok(self.db.get_state(user_id)?)
    }

    async fn save_state(&self, user_id: UserId, state: &str, payload: &str) -> Result<(), StorageError> {
        Ok(self.db.put_state(user_id, state, payload)?)
    }

    async fn delete_state(&self, user_id: UserId) -> Result<(), StorageError> {
        Ok(self.db.delete_state(user_id)?)
    }
}

#[async_trait]
impl SchoolStore for DatabaseStorage {
    async fn parent_by_user(&self, user_id: UserId) -> Result<Option<Parent>, StorageError> {
        Ok(self.db.parent_by_user(user_id)?)
    }

    async fn teacher_by_user(&self, user_id: UserId) -> Result<Option<Teacher>, StorageError> {
        Ok(self.db.teacher_by_user(user_id)?)
    }

    async fn teacher_by_phone(&self, phone: &str) -> Result<Option<Teacher>, StorageError> {
        Ok(self.db.teacher_by_phone(phone)?)
    }

    async fn bind_teacher(&self, teacher_id: i64, user_id: UserId) -> Result<Option<Teacher>, StorageError> {
        Ok(self.db.bind_teacher(teacher_id, user_id)?)
    }

    async fn is_listed_admin(&self, user_id: UserId, phones: &[String]) -> Result<bool, StorageError> {
        Ok(self.db.is_listed_admin(user_id, phones)?)
    }

    async fn admin_user_ids(&self) -> Result<Vec<UserId>, StorageError> {
        Ok(self.db.admin_user_ids()?)
    }

    async fn register_parent(&self, parent: &NewParent) -> Result<Parent, StorageError> {
        Ok(self.db.register_parent(parent)?)
    }

    async fn set_parent_language(&self, user_id: UserId, lang: Lang) -> Result<bool, StorageError> {
        Ok(self.db.set_parent_language(user_id, lang)?)
    }

    async fn parent_user_ids(&self, class_id: Option<i64>) -> Result<Vec<UserId>, StorageError> {
        Ok(self.db.parent_user_ids(class_id)?)
    }

    async fn classes(&self) -> Result<Vec<SchoolClass>, StorageError> {
        Ok(self.db.list_classes()?)
    }

    async fn class_by_id(&self, class_id: i64) -> Result<Option<SchoolClass>, StorageError> {
        Ok(self.db.get_class(class_id)?)
    }

    async fn create_class(&self, name: &str) -> Result<SchoolClass, StorageError> {
        Ok(self.db.create_class(name)?)
    }

    async fn delete_class(&self, class_id: i64) -> Result<bool, StorageError> {
        Ok(self.db.delete_class(class_id)?)
    }

    async fn set_timetable(&self, class_id: i64, file: &FileRef) -> Result<(), StorageError> {
        Ok(self.db.set_timetable(class_id, file)?)
    }

    async fn create_teacher(&self, teacher: &NewTeacher) -> Result<Teacher, StorageError> {
        Ok(self.db.create_teacher(teacher)?)
    }

    async fn teacher_classes(&self, teacher_id: i64) -> Result<Vec<SchoolClass>, StorageError> {
        Ok(self.db.teacher_classes(teacher_id)?)
    }

    async fn students_in_class(&self, class_id: i64) -> Result<Vec<Student>, StorageError> {
        Ok(self.db.students_in_class(class_id)?)
    }

    async fn student_by_id(&self, student_id: i64) -> Result<Option<Student>, StorageError> {
        Ok(self.db.get_student(student_id)?)
    }

    async fn submit_feedback(&self, kind: FeedbackKind, author: UserId, text: &str) -> Result<Feedback, StorageError> {
        Ok(self.db.add_feedback(kind, author, text)?)
    }

    async fn recent_feedback(&self, kind: FeedbackKind, limit: usize) -> Result<Vec<Feedback>, StorageError> {
        Ok(self.db.recent_feedback(kind, limit)?)
    }

    async fn create_announcement(&self, author: UserId, text: &str) -> Result<Announcement, StorageError> {
        Ok(self.db.add_announcement(author, text)?)
    }

    async fn recent_announcements(&self, limit: usize) -> Result<Vec<Announcement>, StorageError> {
        Ok(self.db.recent_announcements(limit)?)
    }

    async fn record_attendance(
        &self,
        class_id: i64,
        date: NaiveDate,
        absent: &BTreeSet<i64>,
        teacher_id: i64,
    ) -> Result<AttendanceSummary, StorageError> {
        Ok(self.db.record_attendance(class_id, date, absent, teacher_id)?)
    }

    async fn record_grade(&self, student_id: i64, teacher_id: i64, value: u8) -> Result<Grade, StorageError> {
        Ok(self.db.add_grade(student_id, teacher_id, value)?)
    }

    async fn grades_for_student(&self, student_id: i64, limit: usize) -> Result<Vec<Grade>, StorageError> {
        Ok(self.db.grades_for_student(student_id, limit)?)
    }

    async fn absences_for_student(&self, student_id: i64, limit: usize) -> Result<Vec<NaiveDate>, StorageError> {
        Ok(self.db.absences_for_student(student_id, limit)?)
    }
}
