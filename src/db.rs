//! Database module for the school desk bot
//!
//! Provides persistence for conversation states and school records.

mod schema;

pub use schema::*;

use crate::i18n::Lang;
use crate::state_machine::{FeedbackKind, FileRef, MediaKind, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Class already exists: {0}")]
    ClassExists(String),
    #[error("Teacher already exists: {0}")]
    TeacherExists(String),
    #[error("Class not found: {0}")]
    ClassNotFound(i64),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Conversation State ====================

    pub fn get_state(&self, user_id: UserId) -> DbResult<Option<StoredState>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT state, payload, updated_at FROM conversation_states WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(StoredState {
                        state: row.get(0)?,
                        payload: row.get(1)?,
                        updated_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Replace the state record of a user in one statement
    pub fn put_state(&self, user_id: UserId, state: &str, payload: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO conversation_states (user_id, state, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                state = excluded.state,
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![user_id, state, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_state(&self, user_id: UserId) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM conversation_states WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }

    // ==================== Identity ====================

    pub fn parent_by_user(&self, user_id: UserId) -> DbResult<Option<Parent>> {
        let conn = self.conn.lock().unwrap();
        let parent = conn
            .query_row(
                "SELECT user_id, phone, full_name, child_name, class_id, student_id, language
                 FROM parents WHERE user_id = ?1",
                params![user_id],
                map_parent,
            )
            .optional()?;
        Ok(parent)
    }

    pub fn teacher_by_user(&self, user_id: UserId) -> DbResult<Option<Teacher>> {
        let conn = self.conn.lock().unwrap();
        let teacher = conn
            .query_row(
                "SELECT id, phone, full_name, user_id, active FROM teachers WHERE user_id = ?1",
                params![user_id],
                map_teacher,
            )
            .optional()?;
        Ok(teacher)
    }

    pub fn teacher_by_phone(&self, phone: &str) -> DbResult<Option<Teacher>> {
        let conn = self.conn.lock().unwrap();
        let teacher = conn
            .query_row(
                "SELECT id, phone, full_name, user_id, active FROM teachers WHERE phone = ?1",
                params![phone],
                map_teacher,
            )
            .optional()?;
        Ok(teacher)
    }

    /// Attach a transport user to a teacher record that has none yet.
    /// Returns the bound record, or `None` if it was already bound.
    pub fn bind_teacher(&self, teacher_id: i64, user_id: UserId) -> DbResult<Option<Teacher>> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE teachers SET user_id = ?2 WHERE id = ?1 AND user_id IS NULL",
            params![teacher_id, user_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let teacher = conn.query_row(
            "SELECT id, phone, full_name, user_id, active FROM teachers WHERE id = ?1",
            params![teacher_id],
            map_teacher,
        )?;
        Ok(Some(teacher))
    }

    /// Whether the admins table lists this user id or any of the phones
    pub fn is_listed_admin(&self, user_id: UserId, phones: &[String]) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        let by_user: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM admins WHERE user_id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        if by_user {
            return Ok(true);
        }
        let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM admins WHERE phone = ?1)")?;
        for phone in phones {
            let found: bool = stmt.query_row(params![phone], |row| row.get(0))?;
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn add_admin(&self, user_id: Option<UserId>, phone: Option<&str>) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO admins (user_id, phone) VALUES (?1, ?2)",
            params![user_id, phone],
        )?;
        Ok(())
    }

    pub fn admin_user_ids(&self) -> DbResult<Vec<UserId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT user_id FROM admins WHERE user_id IS NOT NULL ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ==================== Parents ====================

    /// Create or replace the parent record and the child it names.
    /// Re-registering moves the existing child instead of adding another.
    pub fn register_parent(&self, new: &NewParent) -> DbResult<Parent> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let class_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM classes WHERE id = ?1)",
            params![new.class_id],
            |row| row.get(0),
        )?;
        if !class_exists {
            return Err(DbError::ClassNotFound(new.class_id));
        }

        let existing_student: Option<i64> = tx
            .query_row(
                "SELECT student_id FROM parents WHERE user_id = ?1",
                params![new.user_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        let student_id = match existing_student {
            Some(id) => {
                tx.execute(
                    "UPDATE students SET full_name = ?2, class_id = ?3, parent_user_id = ?4 WHERE id = ?1",
                    params![id, new.child_name, new.class_id, new.user_id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO students (full_name, class_id, parent_user_id) VALUES (?1, ?2, ?3)",
                    params![new.child_name, new.class_id, new.user_id],
                )?;
                tx.last_insert_rowid()
            }
        };

        tx.execute(
            "INSERT INTO parents (user_id, phone, full_name, child_name, class_id, student_id, language, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id) DO UPDATE SET
                phone = excluded.phone,
                full_name = excluded.full_name,
                child_name = excluded.child_name,
                class_id = excluded.class_id,
                student_id = excluded.student_id,
                language = excluded.language",
            params![
                new.user_id,
                new.phone,
                new.full_name,
                new.child_name,
                new.class_id,
                student_id,
                new.language.code(),
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;

        Ok(Parent {
            user_id: new.user_id,
            phone: new.phone.clone(),
            full_name: new.full_name.clone(),
            child_name: new.child_name.clone(),
            class_id: Some(new.class_id),
            student_id: Some(student_id),
            language: new.language,
        })
    }

    /// Returns false when the user has no parent record
    pub fn set_parent_language(&self, user_id: UserId, lang: Lang) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE parents SET language = ?2 WHERE user_id = ?1",
            params![user_id, lang.code()],
        )?;
        Ok(changed > 0)
    }

    /// Parents of one class, or of the whole school
    pub fn parent_user_ids(&self, class_id: Option<i64>) -> DbResult<Vec<UserId>> {
        let conn = self.conn.lock().unwrap();
        let ids = match class_id {
            Some(class_id) => {
                let mut stmt =
                    conn.prepare("SELECT user_id FROM parents WHERE class_id = ?1 ORDER BY user_id")?;
                let rows = stmt.query_map(params![class_id], |row| row.get(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare("SELECT user_id FROM parents ORDER BY user_id")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(ids)
    }

    // ==================== Classes ====================

    pub fn list_classes(&self) -> DbResult<Vec<SchoolClass>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, timetable_kind, timetable_file_id FROM classes ORDER BY name COLLATE NOCASE",
        )?;
        let classes = stmt
            .query_map([], map_class)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(classes)
    }

    pub fn get_class(&self, class_id: i64) -> DbResult<Option<SchoolClass>> {
        let conn = self.conn.lock().unwrap();
        let class = conn
            .query_row(
                "SELECT id, name, timetable_kind, timetable_file_id FROM classes WHERE id = ?1",
                params![class_id],
                map_class,
            )
            .optional()?;
        Ok(class)
    }

    pub fn create_class(&self, name: &str) -> DbResult<SchoolClass> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO classes (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        );
        match result {
            Ok(_) => Ok(SchoolClass {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                timetable: None,
            }),
            Err(e) if is_unique_violation(&e) => Err(DbError::ClassExists(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns false when no such class existed
    pub fn delete_class(&self, class_id: i64) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM classes WHERE id = ?1", params![class_id])?;
        Ok(changed > 0)
    }

    pub fn set_timetable(&self, class_id: i64, file: &FileRef) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE classes SET timetable_kind = ?2, timetable_file_id = ?3 WHERE id = ?1",
            params![class_id, media_kind_str(file.kind), file.file_id],
        )?;
        if changed == 0 {
            return Err(DbError::ClassNotFound(class_id));
        }
        Ok(())
    }

    // ==================== Teachers ====================

    pub fn create_teacher(&self, new: &NewTeacher) -> DbResult<Teacher> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO teachers (phone, full_name, active, created_at) VALUES (?1, ?2, 1, ?3)",
            params![new.phone, new.full_name, Utc::now().to_rfc3339()],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(DbError::TeacherExists(new.phone.clone())),
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO teacher_classes (teacher_id, class_id)
                 SELECT ?1, id FROM classes WHERE id = ?2",
            )?;
            for class_id in &new.class_ids {
                stmt.execute(params![id, class_id])?;
            }
        }
        tx.commit()?;

        Ok(Teacher {
            id,
            phone: new.phone.clone(),
            full_name: new.full_name.clone(),
            user_id: None,
            active: true,
        })
    }

    pub fn teacher_classes(&self, teacher_id: i64) -> DbResult<Vec<SchoolClass>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.timetable_kind, c.timetable_file_id
             FROM classes c JOIN teacher_classes tc ON tc.class_id = c.id
             WHERE tc.teacher_id = ?1
             ORDER BY c.name COLLATE NOCASE",
        )?;
        let classes = stmt
            .query_map(params![teacher_id], map_class)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(classes)
    }

    // ==================== Students ====================

    pub fn students_in_class(&self, class_id: i64) -> DbResult<Vec<Student>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, full_name, class_id, parent_user_id FROM students
             WHERE class_id = ?1 ORDER BY full_name COLLATE NOCASE, id",
        )?;
        let students = stmt
            .query_map(params![class_id], map_student)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    pub fn get_student(&self, student_id: i64) -> DbResult<Option<Student>> {
        let conn = self.conn.lock().unwrap();
        let student = conn
            .query_row(
                "SELECT id, full_name, class_id, parent_user_id FROM students WHERE id = ?1",
                params![student_id],
                map_student,
            )
            .optional()?;
        Ok(student)
    }

    // ==================== Feedback & Announcements ====================

    pub fn add_feedback(&self, kind: FeedbackKind, author: UserId, text: &str) -> DbResult<Feedback> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO feedback (kind, author_user_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), author, text, now.to_rfc3339()],
        )?;
        Ok(Feedback {
            id: conn.last_insert_rowid(),
            kind,
            author_user_id: author,
            text: text.to_string(),
            created_at: now,
        })
    }

    pub fn recent_feedback(&self, kind: FeedbackKind, limit: usize) -> DbResult<Vec<Feedback>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, author_user_id, text, created_at FROM feedback
             WHERE kind = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let items = stmt
            .query_map(params![kind.as_str(), limit_param(limit)], |row| {
                Ok(Feedback {
                    id: row.get(0)?,
                    kind,
                    author_user_id: row.get(1)?,
                    text: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn add_announcement(&self, author: UserId, text: &str) -> DbResult<Announcement> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO announcements (author_user_id, text, created_at) VALUES (?1, ?2, ?3)",
            params![author, text, now.to_rfc3339()],
        )?;
        Ok(Announcement {
            id: conn.last_insert_rowid(),
            author_user_id: author,
            text: text.to_string(),
            created_at: now,
        })
    }

    pub fn recent_announcements(&self, limit: usize) -> DbResult<Vec<Announcement>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, author_user_id, text, created_at FROM announcements
             ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let items = stmt
            .query_map(params![limit_param(limit)], |row| {
                Ok(Announcement {
                    id: row.get(0)?,
                    author_user_id: row.get(1)?,
                    text: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // ==================== Attendance & Grades ====================

    /// Store one register for a class: every student is marked present
    /// unless listed in `absent`. Re-submitting the same day overwrites.
    pub fn record_attendance(
        &self,
        class_id: i64,
        date: NaiveDate,
        absent: &BTreeSet<i64>,
        teacher_id: i64,
    ) -> DbResult<AttendanceSummary> {
        let students = self.students_in_class(class_id)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let day = date.format("%Y-%m-%d").to_string();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO attendance (student_id, date, present, teacher_id) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(student_id, date) DO UPDATE SET
                    present = excluded.present,
                    teacher_id = excluded.teacher_id",
            )?;
            for student in &students {
                let present = !absent.contains(&student.id);
                stmt.execute(params![student.id, day, present, teacher_id])?;
            }
        }
        tx.commit()?;

        let total = students.len();
        let absent = students
            .into_iter()
            .filter(|s| absent.contains(&s.id))
            .collect();
        Ok(AttendanceSummary { date, total, absent })
    }

    pub fn add_grade(&self, student_id: i64, teacher_id: i64, value: u8) -> DbResult<Grade> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO grades (student_id, teacher_id, value, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![student_id, teacher_id, value, now.to_rfc3339()],
        )?;
        Ok(Grade {
            id: conn.last_insert_rowid(),
            student_id,
            teacher_id,
            value,
            created_at: now,
        })
    }

    pub fn grades_for_student(&self, student_id: i64, limit: usize) -> DbResult<Vec<Grade>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, student_id, teacher_id, value, created_at FROM grades
             WHERE student_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let grades = stmt
            .query_map(params![student_id, limit_param(limit)], |row| {
                Ok(Grade {
                    id: row.get(0)?,
                    student_id: row.get(1)?,
                    teacher_id: row.get(2)?,
                    value: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(grades)
    }

    pub fn absences_for_student(&self, student_id: i64, limit: usize) -> DbResult<Vec<NaiveDate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT date FROM attendance WHERE student_id = ?1 AND present = 0
             ORDER BY date DESC LIMIT ?2",
        )?;
        let dates = stmt
            .query_map(params![student_id, limit_param(limit)], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dates
            .iter()
            .filter_map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .collect())
    }
}

fn map_parent(row: &Row<'_>) -> rusqlite::Result<Parent> {
    let language: String = row.get(6)?;
    Ok(Parent {
        user_id: row.get(0)?,
        phone: row.get(1)?,
        full_name: row.get(2)?,
        child_name: row.get(3)?,
        class_id: row.get(4)?,
        student_id: row.get(5)?,
        language: Lang::from_code(&language).unwrap_or(Lang::Uz),
    })
}

fn map_teacher(row: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: row.get(0)?,
        phone: row.get(1)?,
        full_name: row.get(2)?,
        user_id: row.get(3)?,
        active: row.get(4)?,
    })
}

fn map_class(row: &Row<'_>) -> rusqlite::Result<SchoolClass> {
    let kind: Option<String> = row.get(2)?;
    let file_id: Option<String> = row.get(3)?;
    let timetable = match (kind.as_deref().and_then(parse_media_kind), file_id) {
        (Some(kind), Some(file_id)) => Some(FileRef { kind, file_id }),
        _ => None,
    };
    Ok(SchoolClass {
        id: row.get(0)?,
        name: row.get(1)?,
        timetable,
    })
}

fn map_student(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        full_name: row.get(1)?,
        class_id: row.get(2)?,
        parent_user_id: row.get(3)?,
    })
}

fn media_kind_str(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo",
        MediaKind::Document => "document",
    }
}

fn parse_media_kind(s: &str) -> Option<MediaKind> {
    match s {
        "photo" => Some(MediaKind::Photo),
        "document" => Some(MediaKind::Document),
        _ => None,
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
