//! # quill-sessions
//!
//! In-process session bookkeeping for embedding servers and adapters.
//!
//! A [`Session`] ties an id to at most one [`ConversationManager`], either
//! bound eagerly or deferred to a conversation id that the embedder opens
//! later. The [`SessionRegistry`] is a plain in-memory map: nothing here is
//! persisted, a restarted process starts from an empty registry and the
//! conversation directories on disk remain the source of truth.

#![deny(unsafe_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use quill_core::errors::{QuillError, Result};
use quill_store::manager::ConversationManager;

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// One client session.
#[derive(Debug)]
pub struct Session {
    id: String,
    /// Conversation to open later, when no manager is bound yet.
    conversation_id: Option<String>,
    manager: Option<ConversationManager>,
    active: bool,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation_id: None,
            manager: None,
            active: true,
            created_at: now,
            last_activity: now,
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deferred conversation id, when no manager is bound.
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Record a conversation id to open later.
    pub fn defer_conversation(&mut self, conversation_id: impl Into<String>) {
        self.conversation_id = Some(conversation_id.into());
    }

    /// Bind an opened manager, clearing any deferred id.
    pub fn bind(&mut self, manager: ConversationManager) {
        self.conversation_id = None;
        self.manager = Some(manager);
    }

    /// The bound manager, if any.
    #[must_use]
    pub fn manager(&self) -> Option<&ConversationManager> {
        self.manager.as_ref()
    }

    /// Mutable access to the bound manager.
    pub fn manager_mut(&mut self) -> Option<&mut ConversationManager> {
        self.manager.as_mut()
    }

    /// Take the bound manager out, e.g. to close it.
    pub fn take_manager(&mut self) -> Option<ConversationManager> {
        self.manager.take()
    }

    /// Whether the session accepts new turns.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Flip the active flag.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last activity time.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Stamp activity now.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    #[cfg(test)]
    fn backdate(&mut self, minutes: i64) {
        self.last_activity = Utc::now() - Duration::minutes(minutes);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory session map, keyed by session id.
///
/// Rebuilt empty each process; see the module docs.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<String, Session>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session.
    ///
    /// With `id = None` a UUIDv7 id is generated, which cannot collide.
    /// An explicit id that already exists is an error, never a silent
    /// replacement.
    pub fn create(&mut self, id: Option<String>) -> Result<&mut Session> {
        let id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
        if self.sessions.contains_key(&id) {
            return Err(QuillError::Session(format!("session already exists: {id}")));
        }
        info!(session = %id, "session created");
        Ok(self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id)))
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Look up a session mutably.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Remove a session, returning it for teardown.
    pub fn remove(&mut self, id: &str) -> Option<Session> {
        let removed = self.sessions.remove(id);
        if removed.is_some() {
            info!(session = %id, "session removed");
        }
        removed
    }

    /// All sessions, ordered by id.
    pub fn list(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` when no sessions exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stamp activity on a session.
    pub fn touch(&mut self, id: &str) -> Result<()> {
        let session = self
            .get_mut(id)
            .ok_or_else(|| QuillError::Session(format!("unknown session: {id}")))?;
        session.touch();
        Ok(())
    }

    /// Remove and return every session idle longer than `max_age_minutes`.
    pub fn cleanup_inactive(&mut self, max_age_minutes: i64) -> Vec<Session> {
        let cutoff = Utc::now() - Duration::minutes(max_age_minutes);
        let stale: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.last_activity < cutoff)
            .map(|s| s.id.clone())
            .collect();

        let mut removed = Vec::with_capacity(stale.len());
        for id in stale {
            debug!(session = %id, "session expired");
            if let Some(session) = self.sessions.remove(&id) {
                removed.push(session);
            }
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "cleaned up inactive sessions");
        }
        removed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use quill_store::manager::ManagerOptions;

    #[test]
    fn create_with_explicit_id() {
        let mut registry = SessionRegistry::new();
        let session = registry.create(Some("alpha".into())).unwrap();
        assert_eq!(session.id(), "alpha");
        assert!(session.is_active());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut registry = SessionRegistry::new();
        let _ = registry.create(Some("alpha".into())).unwrap();
        let err = registry.create(Some("alpha".into())).unwrap_err();
        assert!(matches!(err, QuillError::Session(_)));
        assert!(err.to_string().contains("alpha"));
        // the original session is untouched
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut registry = SessionRegistry::new();
        let a = registry.create(None).unwrap().id().to_string();
        let b = registry.create(None).unwrap().id().to_string();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn touch_advances_last_activity() {
        let mut registry = SessionRegistry::new();
        let _ = registry.create(Some("s".into())).unwrap();
        registry.get_mut("s").unwrap().backdate(10);
        let before = registry.get("s").unwrap().last_activity();

        registry.touch("s").unwrap();
        assert!(registry.get("s").unwrap().last_activity() > before);
    }

    #[test]
    fn touch_unknown_session_errors() {
        let mut registry = SessionRegistry::new();
        assert!(matches!(
            registry.touch("ghost").unwrap_err(),
            QuillError::Session(_)
        ));
    }

    #[test]
    fn cleanup_removes_only_stale_sessions() {
        let mut registry = SessionRegistry::new();
        let _ = registry.create(Some("old".into())).unwrap();
        let _ = registry.create(Some("fresh".into())).unwrap();
        registry.get_mut("old").unwrap().backdate(120);

        let removed = registry.cleanup_inactive(60);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id(), "old");
        assert!(registry.get("old").is_none());
        assert!(registry.get("fresh").is_some());
    }

    #[test]
    fn cleanup_on_fresh_registry_removes_nothing() {
        let mut registry = SessionRegistry::new();
        let _ = registry.create(None).unwrap();
        assert!(registry.cleanup_inactive(60).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn deferred_conversation_id_clears_on_bind() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = SessionRegistry::new();
        let session = registry.create(Some("s".into())).unwrap();

        session.defer_conversation("chat-42");
        assert_eq!(session.conversation_id(), Some("chat-42"));
        assert!(session.manager().is_none());

        let manager = ConversationManager::open(
            dir.path().join("chat-42"),
            ManagerOptions {
                lock: false,
                ..ManagerOptions::default()
            },
        )
        .unwrap();
        session.bind(manager);
        assert!(session.conversation_id().is_none());
        assert!(session.manager().is_some());
    }

    #[test]
    fn take_manager_leaves_session_unbound() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = SessionRegistry::new();
        let session = registry.create(Some("s".into())).unwrap();
        let manager = ConversationManager::open(
            dir.path(),
            ManagerOptions {
                lock: false,
                ..ManagerOptions::default()
            },
        )
        .unwrap();
        session.bind(manager);

        let taken = session.take_manager();
        assert!(taken.is_some());
        assert!(session.manager().is_none());
    }

    #[test]
    fn list_is_ordered_by_id() {
        let mut registry = SessionRegistry::new();
        let _ = registry.create(Some("b".into())).unwrap();
        let _ = registry.create(Some("a".into())).unwrap();
        let ids: Vec<&str> = registry.list().map(Session::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
