//! Typed access to the per-user conversation state

use super::traits::{StateStore, StorageError};
use crate::db::StoredState;
use crate::state_machine::{FlowState, StateName, UserId};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no conversation state for user {0}")]
    NotFound(UserId),
    #[error("unknown state name {0:?}")]
    UnknownState(String),
    #[error("payload for {state} does not decode: {reason}")]
    Decode { state: StateName, reason: String },
    #[error("payload for {state} does not encode: {reason}")]
    Encode { state: StateName, reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Wrapper over a [`StateStore`] that speaks [`FlowState`] instead of
/// strings. Name and payload are written together, so a reader can never
/// observe the name of one step with the fields of another.
#[derive(Clone)]
pub struct StateManager {
    store: Arc<dyn StateStore>,
    ttl: Option<Duration>,
}

impl StateManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store, ttl: None }
    }

    /// Records older than `ttl` read as idle and are removed on access
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Stored record, or `None` when idle. An expired record is deleted
    /// and reads as idle.
    async fn load(&self, user_id: UserId) -> Result<Option<StoredState>, StateError> {
        let Some(stored) = self.store.load_state(user_id).await? else {
            return Ok(None);
        };

        if let Some(ttl) = self.ttl {
            let age = Utc::now().signed_duration_since(stored.updated_at);
            if age.to_std().is_ok_and(|age| age > ttl) {
                tracing::debug!(user_id, state = %stored.state, "Conversation state expired");
                self.store.delete_state(user_id).await?;
                return Ok(None);
            }
        }
        Ok(Some(stored))
    }

    /// Current state name; `None` when the user is idle.
    pub async fn get(&self, user_id: UserId) -> Result<Option<StateName>, StateError> {
        let Some(stored) = self.load(user_id).await? else {
            return Ok(None);
        };
        stored
            .state
            .parse::<StateName>()
            .map(Some)
            .map_err(StateError::UnknownState)
    }

    /// Full state with its payload; fails with `NotFound` when idle.
    pub async fn get_payload(&self, user_id: UserId) -> Result<FlowState, StateError> {
        let stored = self.load(user_id).await?.ok_or(StateError::NotFound(user_id))?;
        let name = stored
            .state
            .parse::<StateName>()
            .map_err(StateError::UnknownState)?;

        let mut value: serde_json::Value =
            serde_json::from_str(&stored.payload).map_err(|e| StateError::Decode {
                state: name,
                reason: e.to_string(),
            })?;
        // The stored name is authoritative for the variant tag
        match value.as_object_mut() {
            Some(obj) => {
                obj.insert("state".into(), serde_json::Value::String(name.as_str().into()));
            }
            None => {
                return Err(StateError::Decode {
                    state: name,
                    reason: "payload is not an object".into(),
                })
            }
        }

        serde_json::from_value(value).map_err(|e| StateError::Decode {
            state: name,
            reason: e.to_string(),
        })
    }

    /// Replace the user's state (last write wins)
    pub async fn set(&self, user_id: UserId, state: &FlowState) -> Result<(), StateError> {
        let name = state.name();
        let payload = serde_json::to_string(state).map_err(|e| StateError::Encode {
            state: name,
            reason: e.to_string(),
        })?;
        self.store.save_state(user_id, name.as_str(), &payload).await?;
        tracing::debug!(user_id, state = %name, "Conversation state set");
        Ok(())
    }

    /// Idempotent
    pub async fn clear(&self, user_id: UserId) -> Result<(), StateError> {
        self.store.delete_state(user_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Lang;
    use crate::runtime::testing::InMemoryStateStore;
    use std::collections::BTreeSet;

    fn manager() -> (StateManager, Arc<InMemoryStateStore>) {
        let store = Arc::new(InMemoryStateStore::new());
        (StateManager::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_missing_record_is_idle() {
        let (states, _) = manager();
        assert_eq!(states.get(1).await, Ok(None));
        assert_eq!(states.get_payload(1).await, Err(StateError::NotFound(1)));
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let (states, _) = manager();
        let state = FlowState::AwaitingChildName {
            language: Lang::En,
            phone: "+998901234567".into(),
            full_name: "Olga Ivanova".into(),
        };
        states.set(5, &state).await.unwrap();

        assert_eq!(states.get(5).await, Ok(Some(StateName::AwaitingChildName)));
        assert_eq!(states.get_payload(5).await, Ok(state));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (states, _) = manager();
        states.set(5, &FlowState::AwaitingClassName).await.unwrap();
        states.clear(5).await.unwrap();
        states.clear(5).await.unwrap();
        assert_eq!(states.get(5).await, Ok(None));
    }

    #[tokio::test]
    async fn test_unknown_name_surfaces() {
        let (states, store) = manager();
        store.insert_raw(9, "awaiting_rocket_launch", "{}");
        assert_eq!(
            states.get(9).await,
            Err(StateError::UnknownState("awaiting_rocket_launch".into()))
        );
    }

    #[tokio::test]
    async fn test_mismatched_payload_fails_to_decode() {
        let (states, store) = manager();
        store.insert_raw(9, "marking_attendance", r#"{"draft":"hello"}"#);
        assert!(matches!(
            states.get_payload(9).await,
            Err(StateError::Decode {
                state: StateName::MarkingAttendance,
                ..
            })
        ));

        store.insert_raw(9, "marking_attendance", "[1,2]");
        assert!(matches!(states.get_payload(9).await, Err(StateError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_stored_name_wins_over_payload_tag() {
        let (states, store) = manager();
        store.insert_raw(4, "marking_attendance", r#"{"state":"awaiting_grade","class_id":3}"#);
        assert_eq!(
            states.get_payload(4).await,
            Ok(FlowState::MarkingAttendance {
                class_id: 3,
                absent: BTreeSet::new()
            })
        );
    }

    #[tokio::test]
    async fn test_expired_state_reads_idle_and_is_removed() {
        let store = Arc::new(InMemoryStateStore::new());
        let states = StateManager::new(store.clone()).with_ttl(Some(Duration::from_secs(60)));

        states.set(3, &FlowState::AwaitingAnnouncementText).await.unwrap();
        store.backdate(3, chrono::Duration::minutes(5));

        assert_eq!(states.get(3).await, Ok(None));
        assert!(!store.contains(3));
    }

    #[tokio::test]
    async fn test_expired_payload_is_not_found() {
        let store = Arc::new(InMemoryStateStore::new());
        let states = StateManager::new(store.clone()).with_ttl(Some(Duration::from_secs(60)));

        let draft = FlowState::ConfirmingComplaint {
            draft: "Heating is off".into(),
        };
        states.set(4, &draft).await.unwrap();
        assert_eq!(states.get_payload(4).await, Ok(draft));

        store.backdate(4, chrono::Duration::hours(5));
        assert_eq!(states.get_payload(4).await, Err(StateError::NotFound(4)));
        assert!(!store.contains(4));
    }

    #[test]
    fn test_encode_and_decode_errors_are_distinct() {
        let encode = StateError::Encode {
            state: StateName::AwaitingGrade,
            reason: "key must be a string".into(),
        };
        assert_eq!(
            encode.to_string(),
            "payload for awaiting_grade does not encode: key must be a string"
        );
        assert_ne!(
            encode,
            StateError::Decode {
                state: StateName::AwaitingGrade,
                reason: "key must be a string".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let (states, store) = manager();
        store.fail_next("disk on fire");
        assert!(matches!(states.get(1).await, Err(StateError::Storage(_))));
        assert_eq!(states.get(1).await, Ok(None));
    }
}
