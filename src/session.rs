//! Per-browser display state for the server-rendered page.
//!
//! Each browser gets an opaque id in a cookie; the store maps it to the last
//! [`SessionDisplayState`]. Credentials never live here.

use lru::LruCache;
use parking_lot::Mutex;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::actions::SessionDisplayState;

pub const SESSION_COOKIE: &str = "wordcraftSession";
const DEFAULT_CAPACITY: usize = 4096;
const SESSION_ID_LEN: usize = 24;

/// Bounded, least-recently-used map of session id to display state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<LruCache<String, SessionDisplayState>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SessionStore {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// State for `session_id`, or a fresh idle state for unknown ids.
    pub fn load(&self, session_id: &str) -> SessionDisplayState {
        self.inner
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn save(&self, session_id: &str, state: SessionDisplayState) {
        self.inner.lock().put(session_id.to_string(), state);
    }

    /// Drops whatever the session was showing; the next load starts idle.
    pub fn forget(&self, session_id: &str) {
        self.inner.lock().pop(session_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accepts only ids this module could have issued.
pub fn is_valid_session_id(candidate: &str) -> bool {
    candidate.len() == SESSION_ID_LEN && candidate.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}
