//! Per-turn role resolution
//!
//! Roles are looked up fresh on every turn and never stored in flow state:
//! an admin removed from the allow-list loses access on their next message.

use super::traits::{SchoolStore, StorageError};
use crate::config::AdminAllowList;
use crate::db::{Parent, Teacher};
use crate::i18n::Lang;
use crate::state_machine::{UserId, UserProfile};

/// Acting role, ordered by priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Anonymous,
    Parent,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Anonymous => "anonymous",
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

/// Where an admin grant came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminGrant {
    UserId,
    Phone(String),
    Record,
}

/// Everything known about the sender of the current event
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: UserId,
    pub profile: UserProfile,
    pub role: Role,
    pub admin: Option<AdminGrant>,
    pub teacher: Option<Teacher>,
    pub parent: Option<Parent>,
}

impl Identity {
    pub fn anonymous(profile: UserProfile) -> Self {
        Self {
            user_id: profile.user_id,
            profile,
            role: Role::Anonymous,
            admin: None,
            teacher: None,
            parent: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.admin.is_some()
    }

    pub fn is_teacher(&self) -> bool {
        self.teacher.is_some()
    }

    pub fn is_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Preferred language: the parent's choice, then the client locale
    pub fn lang(&self, default: Lang) -> Lang {
        self.parent
            .as_ref()
            .map(|p| p.language)
            .or_else(|| self.profile.language_code.as_deref().and_then(Lang::from_code))
            .unwrap_or(default)
    }
}

/// Strip formatting from a phone number, keeping a leading `+`.
/// Returns `None` when too few or too many digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if !(7..=15).contains(&digits.len()) {
        return None;
    }
    if trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')')))
    {
        return None;
    }
    Some(format!("+{digits}"))
}

#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    admins: AdminAllowList,
}

impl IdentityResolver {
    pub fn new(admins: AdminAllowList) -> Self {
        Self { admins }
    }

    pub fn admins(&self) -> &AdminAllowList {
        &self.admins
    }

    /// Resolve the role of `profile`. A contact shared in this event can
    /// bind an active teacher record that no user has claimed yet.
    pub async fn resolve(
        &self,
        store: &dyn SchoolStore,
        profile: &UserProfile,
        contact_phone: Option<&str>,
    ) -> Result<Identity, StorageError> {
        let user_id = profile.user_id;
        let contact = contact_phone.and_then(normalize_phone);

        let parent = store.parent_by_user(user_id).await?;

        let mut teacher = store.teacher_by_user(user_id).await?;
        if teacher.is_none() {
            if let Some(phone) = &contact {
                teacher = self.bind_by_phone(store, user_id, phone).await?;
            }
        }
        let teacher = teacher.filter(|t| t.active);

        let mut phones: Vec<String> = Vec::new();
        phones.extend(contact);
        phones.extend(parent.as_ref().and_then(|p| normalize_phone(&p.phone)));
        phones.extend(teacher.as_ref().and_then(|t| normalize_phone(&t.phone)));
        phones.sort();
        phones.dedup();

        let admin = if self.admins.contains_user(user_id) {
            Some(AdminGrant::UserId)
        } else if let Some(phone) = phones.iter().find(|p| self.admins.contains_phone(p)) {
            Some(AdminGrant::Phone(phone.clone()))
        } else if store.is_listed_admin(user_id, &phones).await? {
            Some(AdminGrant::Record)
        } else {
            None
        };

        let role = if admin.is_some() {
            Role::Admin
        } else if teacher.is_some() {
            Role::Teacher
        } else if parent.is_some() {
            Role::Parent
        } else {
            Role::Anonymous
        };

        Ok(Identity {
            user_id,
            profile: profile.clone(),
            role,
            admin,
            teacher,
            parent,
        })
    }

    async fn bind_by_phone(
        &self,
        store: &dyn SchoolStore,
        user_id: UserId,
        phone: &str,
    ) -> Result<Option<Teacher>, StorageError> {
        let Some(candidate) = store.teacher_by_phone(phone).await? else {
            return Ok(None);
        };
        if candidate.user_id.is_some() || !candidate.active {
            return Ok(None);
        }
        let bound = store.bind_teacher(candidate.id, user_id).await?;
        if let Some(teacher) = &bound {
            tracing::info!(user_id, teacher_id = teacher.id, "Teacher record bound to user");
        }
        Ok(bound)
    }
}
