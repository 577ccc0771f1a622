//! Process-wide in-memory session store.
//!
//! The store is the single shared mutable resource of the runtime: it owns
//! every finalized [`ConversationState`] and its [`SessionRecord`], keyed by
//! session id. The orchestrator holds no conversation state of its own —
//! each turn reloads from here, so nothing leaks between sessions except
//! through this map.
//!
//! Alongside the finalized slot there is an in-flight checkpoint slot the
//! runner can write between stages; a checkpoint left behind with
//! `processed == false` marks a turn that never finished. Checkpoints are
//! never what `load_state` or `history` return.
//!
//! Concurrency: all methods are safe to call from multiple tasks (interior
//! `RwLock`), but a turn's load → run → finalize sequence is deliberately
//! not serialized per session. Two concurrent turns on the same session id
//! both load the same prior state and the second finalize wins
//! (last-writer-wins). Callers needing per-session ordering must serialize
//! externally.
//!
//! Nothing here survives a process restart, and no background expiry task
//! runs — see [`SessionStore::purge_expired`] for the explicit TTL sweep.

use crate::Message;
use crate::agent::state::{ConversationState, SessionRecord};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

struct SessionEntry {
    state: ConversationState,
    record: SessionRecord,
}

/// In-memory map from session id to the latest finalized conversation.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    inflight: RwLock<HashMap<String, ConversationState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Finalized state ────────────────────────────────────────────

    /// Latest finalized state for a session, if any.
    pub fn load_state(&self, session_id: &str) -> Option<ConversationState> {
        self.read_sessions()
            .get(session_id)
            .map(|e| e.state.clone())
    }

    /// Persist a finished turn: upsert the record, replace the stored state,
    /// and drop any in-flight checkpoint. Returns the updated record.
    ///
    /// `message_count` is derived from the state (one per user message), so
    /// re-finalizing the same state is idempotent.
    pub fn finalize(&self, state: &ConversationState) -> SessionRecord {
        let now = Utc::now();
        let mut sessions = self.write_sessions();

        let record = match sessions.get_mut(&state.session_id) {
            Some(entry) => {
                entry.record.message_count = state.user_message_count();
                entry.record.user_type = state.user_type.clone();
                entry.record.updated_at = now;
                entry.state = state.clone();
                entry.record.clone()
            }
            None => {
                let mut record = SessionRecord::new(&state.session_id, &state.user_type);
                record.message_count = state.user_message_count();
                record.created_at = now;
                record.updated_at = now;
                sessions.insert(
                    state.session_id.clone(),
                    SessionEntry {
                        state: state.clone(),
                        record: record.clone(),
                    },
                );
                record
            }
        };
        drop(sessions);

        self.write_inflight().remove(&state.session_id);
        debug!(
            "finalized session {} (turns={})",
            record.session_id, record.message_count
        );
        record
    }

    /// Metadata record for a session, if any.
    pub fn record(&self, session_id: &str) -> Option<SessionRecord> {
        self.read_sessions()
            .get(session_id)
            .map(|e| e.record.clone())
    }

    /// Full message history of a session. Empty for unknown ids — never an
    /// error.
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.read_sessions()
            .get(session_id)
            .map(|e| e.state.messages.clone())
            .unwrap_or_default()
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.read_sessions().contains_key(session_id)
    }

    /// Remove a session and any checkpoint. Idempotent: clearing an absent
    /// session returns `false` and is a success.
    pub fn clear(&self, session_id: &str) -> bool {
        let removed = self.write_sessions().remove(session_id).is_some();
        self.write_inflight().remove(session_id);
        if removed {
            debug!("cleared session {session_id}");
        }
        removed
    }

    /// Number of finalized sessions.
    pub fn len(&self) -> usize {
        self.read_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_sessions().is_empty()
    }

    // ── In-flight checkpoints ──────────────────────────────────────

    /// Save a mid-turn checkpoint. Overwrites any previous checkpoint for
    /// the same session; does not affect the finalized slot.
    pub fn save_inflight(&self, state: ConversationState) {
        self.write_inflight()
            .insert(state.session_id.clone(), state);
    }

    /// The in-flight checkpoint for a session, if one was left behind.
    pub fn inflight(&self, session_id: &str) -> Option<ConversationState> {
        self.read_inflight().get(session_id).cloned()
    }

    // ── Expiry ─────────────────────────────────────────────────────

    /// Remove sessions idle longer than `ttl_secs`. Returns how many were
    /// removed. This is the only expiry mechanism — there is no background
    /// reaper, callers decide when to sweep.
    pub fn purge_expired(&self, ttl_secs: u64) -> usize {
        self.purge_expired_at(Utc::now(), ttl_secs)
    }

    /// Expiry sweep against an explicit clock, for deterministic tests.
    pub fn purge_expired_at(&self, now: DateTime<Utc>, ttl_secs: u64) -> usize {
        let ttl = TimeDelta::seconds(ttl_secs as i64);
        let mut sessions = self.write_sessions();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, e)| now - e.record.updated_at > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        drop(sessions);

        let mut inflight = self.write_inflight();
        for id in &expired {
            inflight.remove(id);
        }
        if !expired.is_empty() {
            debug!("purged {} expired session(s)", expired.len());
        }
        expired.len()
    }

    // ── Lock helpers ───────────────────────────────────────────────
    //
    // A poisoned lock means another thread panicked mid-write; the map
    // contents are still plain data, so continue with them rather than
    // poisoning every future turn.

    fn read_sessions(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_sessions(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_inflight(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ConversationState>> {
        self.inflight.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_inflight(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ConversationState>> {
        self.inflight.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn finalized_state(session_id: &str, turns: usize) -> ConversationState {
        let mut state = ConversationState::new(session_id, "customer");
        state.messages.push(Message::system("rules"));
        for i in 0..turns {
            state.messages.push(Message::user(format!("q{i}")));
            state.messages.push(Message::assistant(format!("a{i}")));
        }
        state.processed = true;
        state
    }

    #[test]
    fn finalize_creates_record_and_state() {
        let store = SessionStore::new();
        let record = store.finalize(&finalized_state("s1", 1));

        assert_eq!(record.session_id, "s1");
        assert_eq!(record.message_count, 1);
        assert!(store.exists("s1"));
        assert_eq!(store.history("s1").len(), 3);
    }

    #[test]
    fn finalize_updates_existing_record() {
        let store = SessionStore::new();
        let first = store.finalize(&finalized_state("s1", 1));
        let second = store.finalize(&finalized_state("s1", 2));

        assert_eq!(second.message_count, 2);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn finalize_tracks_persona_switch() {
        let store = SessionStore::new();
        store.finalize(&finalized_state("s1", 1));

        let mut state = finalized_state("s1", 2);
        state.user_type = "manager".into();
        let record = store.finalize(&state);
        assert_eq!(record.user_type, "manager");
    }

    #[test]
    fn unknown_session_reads_are_empty_not_errors() {
        let store = SessionStore::new();
        assert!(store.load_state("nope").is_none());
        assert!(store.record("nope").is_none());
        assert!(store.history("nope").is_empty());
        assert!(!store.exists("nope"));
    }

    #[test]
    fn clear_is_idempotent() {
        let store = SessionStore::new();
        store.finalize(&finalized_state("s1", 1));

        assert!(store.clear("s1"));
        assert!(!store.exists("s1"));
        assert!(!store.clear("s1"));
        assert!(!store.clear("never-seen"));
    }

    #[test]
    fn inflight_checkpoint_is_separate_from_finalized_state() {
        let store = SessionStore::new();
        store.finalize(&finalized_state("s1", 1));

        let mut midturn = finalized_state("s1", 2);
        midturn.processed = false;
        store.save_inflight(midturn);

        // The visible state is still the finalized one.
        assert_eq!(store.history("s1").len(), 3);
        let checkpoint = store.inflight("s1").unwrap();
        assert!(!checkpoint.processed);
    }

    #[test]
    fn finalize_drops_inflight_checkpoint() {
        let store = SessionStore::new();
        let mut midturn = finalized_state("s1", 1);
        midturn.processed = false;
        store.save_inflight(midturn);

        store.finalize(&finalized_state("s1", 1));
        assert!(store.inflight("s1").is_none());
    }

    #[test]
    fn purge_removes_only_stale_sessions() {
        let store = SessionStore::new();
        store.finalize(&finalized_state("old", 1));
        store.finalize(&finalized_state("fresh", 1));

        // "fresh" was updated now; sweep from one hour in the future with a
        // ttl of two hours removes nothing, a ttl of 30 minutes removes both.
        let later = Utc::now() + TimeDelta::hours(1);
        assert_eq!(store.purge_expired_at(later, 7200), 0);
        assert_eq!(store.len(), 2);

        assert_eq!(store.purge_expired_at(later, 1800), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn purge_with_long_ttl_is_a_noop() {
        let store = SessionStore::new();
        store.finalize(&finalized_state("s1", 1));
        assert_eq!(store.purge_expired(86_400), 0);
        assert!(store.exists("s1"));
    }

    #[test]
    fn concurrent_finalize_last_writer_wins() {
        use std::sync::Arc;

        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();
        for turns in 1..=4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.finalize(&finalized_state("shared", turns));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // One of the writers won; the entry is consistent with exactly one
        // of the finalized states.
        let record = store.record("shared").unwrap();
        let history = store.history("shared");
        assert_eq!(history.len() as u64, 1 + record.message_count * 2);
    }
}
