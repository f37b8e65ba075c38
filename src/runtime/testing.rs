//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::identity::{AdminGrant, Identity, IdentityResolver, Role};
use super::outbox::{self, OutboxReceiver};
use super::router::Router;
use super::state_manager::StateManager;
use super::traits::*;
use super::Dispatcher;
use crate::config::AdminAllowList;
use crate::db::{
    Announcement, AttendanceSummary, Feedback, Grade, NewParent, NewTeacher, Parent, SchoolClass, StoredState,
    Student, Teacher,
};
use crate::flows::{FlowRegistry, TurnContext};
use crate::i18n::{Lang, Localizer};
use crate::state_machine::{
    CallbackQuery, ChatId, FeedbackKind, FileRef, IncomingMessage, Keyboard, Notification, StateName, Update,
    UserId, UserProfile,
};
use crate::telegram::TransportError;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn take_failure(slot: &Mutex<Option<String>>) -> Result<(), StorageError> {
    match slot.lock().unwrap().take() {
        Some(message) => Err(StorageError::Backend(message)),
        None => Ok(()),
    }
}

// ============================================================================
// In-Memory State Store
// ============================================================================

/// In-memory conversation state storage
#[derive(Default)]
pub struct InMemoryStateStore {
    records: Mutex<HashMap<UserId, StoredState>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record exactly as given, bypassing encoding
    pub fn insert_raw(&self, user_id: UserId, state: &str, payload: &str) {
        self.records.lock().unwrap().insert(
            user_id,
            StoredState {
                state: state.to_string(),
                payload: payload.to_string(),
                updated_at: Utc::now(),
            },
        );
    }

    /// Age a record so TTL checks see it as older
    pub fn backdate(&self, user_id: UserId, by: chrono::Duration) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&user_id) {
            record.updated_at -= by;
        }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.records.lock().unwrap().contains_key(&user_id)
    }

    pub fn state_name(&self, user_id: UserId) -> Option<String> {
        self.records.lock().unwrap().get(&user_id).map(|r| r.state.clone())
    }

    /// The next operation fails once with a backend error
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load_state(&self, user_id: UserId) -> Result<Option<StoredState>, StorageError> {
        take_failure(&self.failure)?;
        Ok(self.records.lock().unwrap().get(&user_id).cloned())
    }

    async fn save_state(&self, user_id: UserId, state: &str, payload: &str) -> Result<(), StorageError> {
        take_failure(&self.failure)?;
        self.insert_raw(user_id, state, payload);
        Ok(())
    }

    async fn delete_state(&self, user_id: UserId) -> Result<(), StorageError> {
        take_failure(&self.failure)?;
        self.records.lock().unwrap().remove(&user_id);
        Ok(())
    }
}

// ============================================================================
// In-Memory School Store
// ============================================================================

#[derive(Default)]
struct SchoolData {
    last_id: i64,
    classes: BTreeMap<i64, SchoolClass>,
    students: BTreeMap<i64, Student>,
    parents: BTreeMap<UserId, Parent>,
    teachers: BTreeMap<i64, Teacher>,
    teacher_classes: BTreeSet<(i64, i64)>,
    admin_users: BTreeSet<UserId>,
    admin_phones: BTreeSet<String>,
    feedback: Vec<Feedback>,
    announcements: Vec<Announcement>,
    /// (student, date) -> present
    attendance: BTreeMap<(i64, NaiveDate), bool>,
    grades: Vec<Grade>,
}

impl SchoolData {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn sorted_classes(&self, filter: impl Fn(&SchoolClass) -> bool) -> Vec<SchoolClass> {
        let mut classes: Vec<_> = self.classes.values().filter(|c| filter(c)).cloned().collect();
        classes.sort_by_key(|c| c.name.to_lowercase());
        classes
    }
}

/// In-memory school records with the same rules as the SQLite schema
#[derive(Default)]
pub struct InMemorySchoolStore {
    data: Mutex<SchoolData>,
    failure: Mutex<Option<String>>,
}

impl InMemorySchoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn seed_class(&self, name: &str) -> SchoolClass {
        let mut data = self.data.lock().unwrap();
        let class = SchoolClass {
            id: data.next_id(),
            name: name.to_string(),
            timetable: None,
        };
        data.classes.insert(class.id, class.clone());
        class
    }

    /// Register a parent with a child in `class_id`
    pub fn seed_parent(&self, user_id: UserId, class_id: i64, language: Lang) -> Parent {
        let new = NewParent {
            user_id,
            phone: format!("+998900{user_id:06}"),
            full_name: format!("Parent {user_id}"),
            child_name: format!("Child {user_id}"),
            class_id,
            language,
        };
        self.register(&new).unwrap()
    }

    pub fn seed_admin(&self, user_id: UserId) {
        self.data.lock().unwrap().admin_users.insert(user_id);
    }

    pub fn seed_admin_phone(&self, phone: &str) {
        self.data.lock().unwrap().admin_phones.insert(phone.to_string());
    }

    /// First class on file, creating one when the school is empty
    pub fn any_class(&self) -> SchoolClass {
        let existing = self.data.lock().unwrap().classes.values().next().cloned();
        existing.unwrap_or_else(|| self.seed_class("1A"))
    }

    fn register(&self, new: &NewParent) -> Result<Parent, StorageError> {
        let mut data = self.data.lock().unwrap();
        if !data.classes.contains_key(&new.class_id) {
            return Err(StorageError::Missing(format!("class {}", new.class_id)));
        }
        let existing = data
            .parents
            .get(&new.user_id)
            .and_then(|p| p.student_id)
            .filter(|id| data.students.contains_key(id));
        let student_id = match existing {
            Some(id) => id,
            None => data.next_id(),
        };
        data.students.insert(
            student_id,
            Student {
                id: student_id,
                full_name: new.child_name.clone(),
                class_id: new.class_id,
                parent_user_id: Some(new.user_id),
            },
        );
        let parent = Parent {
            user_id: new.user_id,
            phone: new.phone.clone(),
            full_name: new.full_name.clone(),
            child_name: new.child_name.clone(),
            class_id: Some(new.class_id),
            student_id: Some(student_id),
            language: new.language,
        };
        data.parents.insert(new.user_id, parent.clone());
        Ok(parent)
    }

    fn check(&self) -> Result<(), StorageError> {
        take_failure(&self.failure)
    }
}

#[async_trait]
impl SchoolStore for InMemorySchoolStore {
    async fn parent_by_user(&self, user_id: UserId) -> Result<Option<Parent>, StorageError> {
        self.check()?;
        Ok(self.data.lock().unwrap().parents.get(&user_id).cloned())
    }

    async fn teacher_by_user(&self, user_id: UserId) -> Result<Option<Teacher>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data.teachers.values().find(|t| t.user_id == Some(user_id)).cloned())
    }

    async fn teacher_by_phone(&self, phone: &str) -> Result<Option<Teacher>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data.teachers.values().find(|t| t.phone == phone).cloned())
    }

    async fn bind_teacher(&self, teacher_id: i64, user_id: UserId) -> Result<Option<Teacher>, StorageError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        match data.teachers.get_mut(&teacher_id) {
            Some(teacher) if teacher.user_id.is_none() => {
                teacher.user_id = Some(user_id);
                Ok(Some(teacher.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn is_listed_admin(&self, user_id: UserId, phones: &[String]) -> Result<bool, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data.admin_users.contains(&user_id) || phones.iter().any(|p| data.admin_phones.contains(p)))
    }

    async fn admin_user_ids(&self) -> Result<Vec<UserId>, StorageError> {
        self.check()?;
        Ok(self.data.lock().unwrap().admin_users.iter().copied().collect())
    }

    async fn register_parent(&self, parent: &NewParent) -> Result<Parent, StorageError> {
        self.check()?;
        self.register(parent)
    }

    async fn set_parent_language(&self, user_id: UserId, lang: Lang) -> Result<bool, StorageError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        Ok(data.parents.get_mut(&user_id).map(|p| p.language = lang).is_some())
    }

    async fn parent_user_ids(&self, class_id: Option<i64>) -> Result<Vec<UserId>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data
            .parents
            .values()
            .filter(|p| class_id.is_none() || p.class_id == class_id)
            .map(|p| p.user_id)
            .collect())
    }

    async fn classes(&self) -> Result<Vec<SchoolClass>, StorageError> {
        self.check()?;
        Ok(self.data.lock().unwrap().sorted_classes(|_| true))
    }

    async fn class_by_id(&self, class_id: i64) -> Result<Option<SchoolClass>, StorageError> {
        self.check()?;
        Ok(self.data.lock().unwrap().classes.get(&class_id).cloned())
    }

    async fn create_class(&self, name: &str) -> Result<SchoolClass, StorageError> {
        self.check()?;
        let taken = {
            let data = self.data.lock().unwrap();
            data.classes.values().any(|c| c.name.eq_ignore_ascii_case(name))
        };
        if taken {
            return Err(StorageError::Conflict(name.to_string()));
        }
        Ok(self.seed_class(name))
    }

    async fn delete_class(&self, class_id: i64) -> Result<bool, StorageError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        if data.classes.remove(&class_id).is_none() {
            return Ok(false);
        }
        let removed: BTreeSet<i64> = data
            .students
            .values()
            .filter(|s| s.class_id == class_id)
            .map(|s| s.id)
            .collect();
        data.students.retain(|id, _| !removed.contains(id));
        data.attendance.retain(|(student, _), _| !removed.contains(student));
        data.grades.retain(|g| !removed.contains(&g.student_id));
        data.teacher_classes.retain(|(_, class)| *class != class_id);
        for parent in data.parents.values_mut() {
            if parent.class_id == Some(class_id) {
                parent.class_id = None;
                parent.student_id = None;
            }
        }
        Ok(true)
    }

    async fn set_timetable(&self, class_id: i64, file: &FileRef) -> Result<(), StorageError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        let class = data
            .classes
            .get_mut(&class_id)
            .ok_or_else(|| StorageError::Missing(format!("class {class_id}")))?;
        class.timetable = Some(file.clone());
        Ok(())
    }

    async fn create_teacher(&self, teacher: &NewTeacher) -> Result<Teacher, StorageError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        if data.teachers.values().any(|t| t.phone == teacher.phone) {
            return Err(StorageError::Conflict(teacher.phone.clone()));
        }
        let record = Teacher {
            id: data.next_id(),
            phone: teacher.phone.clone(),
            full_name: teacher.full_name.clone(),
            user_id: None,
            active: true,
        };
        for class_id in &teacher.class_ids {
            if data.classes.contains_key(class_id) {
                data.teacher_classes.insert((record.id, *class_id));
            }
        }
        data.teachers.insert(record.id, record.clone());
        Ok(record)
    }

    async fn teacher_classes(&self, teacher_id: i64) -> Result<Vec<SchoolClass>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data.sorted_classes(|c| data.teacher_classes.contains(&(teacher_id, c.id))))
    }

    async fn students_in_class(&self, class_id: i64) -> Result<Vec<Student>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        let mut students: Vec<_> = data
            .students
            .values()
            .filter(|s| s.class_id == class_id)
            .cloned()
            .collect();
        students.sort_by_key(|s| (s.full_name.to_lowercase(), s.id));
        Ok(students)
    }

    async fn student_by_id(&self, student_id: i64) -> Result<Option<Student>, StorageError> {
        self.check()?;
        Ok(self.data.lock().unwrap().students.get(&student_id).cloned())
    }

    async fn submit_feedback(&self, kind: FeedbackKind, author: UserId, text: &str) -> Result<Feedback, StorageError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        let item = Feedback {
            id: data.next_id(),
            kind,
            author_user_id: author,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        data.feedback.push(item.clone());
        Ok(item)
    }

    async fn recent_feedback(&self, kind: FeedbackKind, limit: usize) -> Result<Vec<Feedback>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data
            .feedback
            .iter()
            .rev()
            .filter(|f| f.kind == kind)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_announcement(&self, author: UserId, text: &str) -> Result<Announcement, StorageError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        let item = Announcement {
            id: data.next_id(),
            author_user_id: author,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        data.announcements.push(item.clone());
        Ok(item)
    }

    async fn recent_announcements(&self, limit: usize) -> Result<Vec<Announcement>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data.announcements.iter().rev().take(limit).cloned().collect())
    }

    async fn record_attendance(
        &self,
        class_id: i64,
        date: NaiveDate,
        absent: &BTreeSet<i64>,
        _teacher_id: i64,
    ) -> Result<AttendanceSummary, StorageError> {
        let students = self.students_in_class(class_id).await?;
        let mut data = self.data.lock().unwrap();
        for student in &students {
            data.attendance.insert((student.id, date), !absent.contains(&student.id));
        }
        Ok(AttendanceSummary {
            date,
            total: students.len(),
            absent: students.into_iter().filter(|s| absent.contains(&s.id)).collect(),
        })
    }

    async fn record_grade(&self, student_id: i64, teacher_id: i64, value: u8) -> Result<Grade, StorageError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        let grade = Grade {
            id: data.next_id(),
            student_id,
            teacher_id,
            value,
            created_at: Utc::now(),
        };
        data.grades.push(grade.clone());
        Ok(grade)
    }

    async fn grades_for_student(&self, student_id: i64, limit: usize) -> Result<Vec<Grade>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data
            .grades
            .iter()
            .rev()
            .filter(|g| g.student_id == student_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn absences_for_student(&self, student_id: i64, limit: usize) -> Result<Vec<NaiveDate>, StorageError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        Ok(data
            .attendance
            .iter()
            .rev()
            .filter(|((student, _), present)| *student == student_id && !**present)
            .map(|((_, date), _)| *date)
            .take(limit)
            .collect())
    }
}

// ============================================================================
// Mock Transport
// ============================================================================

/// Everything the bot pushed through the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message {
        chat_id: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
    Media {
        chat_id: ChatId,
        file: FileRef,
        caption: Option<String>,
    },
}

/// Records outbound calls; queued errors are returned before recording
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Sent>>,
    failures: Mutex<VecDeque<TransportError>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call fails with `error`
    pub fn queue_error(&self, error: TransportError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts and captions delivered to one chat, in order
    pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message { chat_id, text, .. } if chat_id == chat => Some(text),
                Sent::Media { chat_id, caption, .. } if chat_id == chat => Some(caption.unwrap_or_default()),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Answer { callback_id, text } => Some((callback_id, text)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> Result<(), TransportError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.record(Sent::Message {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        })
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), TransportError> {
        self.record(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        })
    }

    async fn send_photo(&self, chat_id: ChatId, file: &FileRef, caption: Option<&str>) -> Result<FileRef, TransportError> {
        self.record(Sent::Media {
            chat_id,
            file: file.clone(),
            caption: caption.map(str::to_string),
        })?;
        Ok(file.clone())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file: &FileRef,
        caption: Option<&str>,
    ) -> Result<FileRef, TransportError> {
        self.send_photo(chat_id, file, caption).await
    }
}

// ============================================================================
// Flow Fixture
// ============================================================================

/// Builds identities and turn contexts for calling handlers directly
pub struct FlowFixture {
    pub store: Arc<InMemorySchoolStore>,
    pub localizer: Localizer,
    pub admins: AdminAllowList,
    pub today: NaiveDate,
}

impl FlowFixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemorySchoolStore::new()),
            localizer: Localizer::new(Lang::En),
            admins: AdminAllowList::default(),
            today: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        }
    }

    pub fn profile(user_id: UserId) -> UserProfile {
        UserProfile::new(user_id, format!("User {user_id}"))
    }

    pub fn text(&self, user_id: UserId, text: &str) -> IncomingMessage {
        IncomingMessage::text(user_id, Self::profile(user_id), text)
    }

    pub fn ctx<'a>(&'a self, identity: &'a Identity) -> TurnContext<'a> {
        TurnContext {
            identity,
            chat_id: identity.user_id,
            store: self.store.as_ref(),
            localizer: &self.localizer,
            lang: identity.lang(self.localizer.default_lang()),
            admins: &self.admins,
            today: self.today,
        }
    }

    /// Admin known to the store, so it also receives admin notices
    pub fn allow_admin(&self, user_id: UserId) {
        self.store.seed_admin(user_id);
    }

    /// Resolve whatever the store currently says about `user_id`
    pub async fn identity(&self, user_id: UserId) -> Identity {
        IdentityResolver::new(self.admins.clone())
            .resolve(self.store.as_ref(), &Self::profile(user_id), None)
            .await
            .unwrap()
    }

    pub fn anonymous(&self, user_id: UserId) -> Identity {
        Identity::anonymous(Self::profile(user_id))
    }

    pub fn admin(&self, user_id: UserId) -> Identity {
        Identity {
            role: Role::Admin,
            admin: Some(AdminGrant::UserId),
            ..self.anonymous(user_id)
        }
    }

    pub async fn parent(&self, user_id: UserId) -> Identity {
        let class = self.store.any_class();
        self.store.seed_parent(user_id, class.id, Lang::En);
        self.identity(user_id).await
    }

    pub async fn admin_parent(&self, user_id: UserId) -> Identity {
        let mut identity = self.parent(user_id).await;
        identity.role = Role::Admin;
        identity.admin = Some(AdminGrant::UserId);
        identity
    }

    /// Teacher bound to `user_id` and assigned to `class_ids`
    pub async fn teacher(&self, user_id: UserId, class_ids: &[i64]) -> Identity {
        let teacher = self
            .store
            .create_teacher(&NewTeacher {
                phone: format!("+998970{user_id:06}"),
                full_name: format!("Teacher {user_id}"),
                class_ids: class_ids.to_vec(),
            })
            .await
            .unwrap();
        self.store.bind_teacher(teacher.id, user_id).await.unwrap();
        self.identity(user_id).await
    }
}

// ============================================================================
// Test Bot
// ============================================================================

/// Full stack over in-memory stores: dispatcher, router and every flow
pub struct TestBot {
    pub store: Arc<InMemorySchoolStore>,
    pub states: Arc<InMemoryStateStore>,
    pub transport: Arc<MockTransport>,
    pub localizer: Localizer,
    pub dispatcher: Dispatcher,
    outbox: Mutex<OutboxReceiver>,
    next_update: AtomicI64,
}

impl TestBot {
    pub fn new() -> Self {
        Self::with_admins(AdminAllowList::default())
    }

    pub fn with_admins(admins: AdminAllowList) -> Self {
        Self::build(admins, None)
    }

    /// Bot whose stored states expire after `ttl`
    pub fn with_state_ttl(admins: AdminAllowList, ttl: Duration) -> Self {
        Self::build(admins, Some(ttl))
    }

    fn build(admins: AdminAllowList, state_ttl: Option<Duration>) -> Self {
        let store = Arc::new(InMemorySchoolStore::new());
        let states = Arc::new(InMemoryStateStore::new());
        let transport = Arc::new(MockTransport::new());
        let localizer = Localizer::new(Lang::En);
        let (outbox, outbox_rx) = outbox::channel();

        let router = Router::new(
            FlowRegistry::standard().unwrap(),
            StateManager::new(states.clone()).with_ttl(state_ttl),
            store.clone(),
            transport.clone(),
            IdentityResolver::new(admins),
            localizer.clone(),
            outbox,
        );
        let dispatcher = Dispatcher::new(Arc::new(router), Duration::from_secs(60));

        Self {
            store,
            states,
            transport,
            localizer,
            dispatcher,
            outbox: Mutex::new(outbox_rx),
            next_update: AtomicI64::new(1),
        }
    }

    fn update_id(&self) -> i64 {
        self.next_update.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn deliver(&self, message: IncomingMessage) {
        let update = Update::message(self.update_id(), message);
        self.dispatcher.dispatch_and_wait(update).await.unwrap();
    }

    pub async fn send_text(&self, user_id: UserId, text: &str) {
        self.deliver(IncomingMessage::text(user_id, FlowFixture::profile(user_id), text))
            .await;
    }

    pub async fn send_contact(&self, user_id: UserId, phone: &str) {
        self.deliver(IncomingMessage::contact(user_id, FlowFixture::profile(user_id), phone))
            .await;
    }

    pub async fn send_file(&self, user_id: UserId, file: FileRef) {
        self.deliver(IncomingMessage::file(user_id, FlowFixture::profile(user_id), file))
            .await;
    }

    /// Press an inline button carrying `data`
    pub async fn press(&self, user_id: UserId, data: &str) {
        let update_id = self.update_id();
        let query = CallbackQuery {
            id: format!("cb-{update_id}"),
            chat_id: user_id,
            from: FlowFixture::profile(user_id),
            data: data.to_string(),
        };
        self.dispatcher
            .dispatch_and_wait(Update::callback(update_id, query))
            .await
            .unwrap();
    }

    pub fn last_text(&self, chat: ChatId) -> Option<String> {
        self.transport.texts_to(chat).pop()
    }

    /// Stored state name for `user_id`, if any
    pub fn state(&self, user_id: UserId) -> Option<StateName> {
        self.states.state_name(user_id).and_then(|s| s.parse().ok())
    }

    /// Drain notifications queued for other users
    pub fn notifications(&self) -> Vec<Notification> {
        let mut rx = self.outbox.lock().unwrap();
        let mut out = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            out.push(notification);
        }
        out
    }

    pub fn text(&self, key: crate::i18n::TextKey) -> &'static str {
        self.localizer.text(Lang::En, key)
    }
}
