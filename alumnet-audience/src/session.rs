//! Per-session identifier
//!
//! Created at most once per browsing session and reused verbatim afterwards.
//! When storage cannot hold it, the id lives in memory for this page
//! instance only.

use rand::Rng;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::preference::PreferenceStore;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_RANDOM_LEN: usize = 9;

/// Generate a fresh id: `session_<unix-millis>_<9 lowercase alphanumerics>`
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_RANDOM_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    let millis = alumnet_common::time::unix_millis(alumnet_common::time::now());
    format!("session_{}_{}", millis, suffix)
}

/// Obtains or lazily creates the session id
pub struct SessionIdentity {
    store: PreferenceStore,
    cached: Mutex<Option<String>>,
}

impl SessionIdentity {
    pub fn new(store: PreferenceStore) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    /// Lookup order: cached value, session key, the `sessionId` of a stored
    /// preference, then a newly generated id.
    pub fn get_or_create(&self) -> String {
        let mut cached = match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match self.store.read_session_id() {
            Ok(Some(id)) => {
                debug!(session_id = %id, "Reusing stored session id");
                id
            }
            Ok(None) => self.adopt_or_generate(),
            Err(e) => {
                warn!(error = %e, "Session id unreadable, generating a new one");
                self.persist(generate_session_id(), "generated")
            }
        };

        *cached = Some(id.clone());
        id
    }

    fn adopt_or_generate(&self) -> String {
        match self.store.read() {
            Ok(Some(pref)) if !pref.session_id.trim().is_empty() => {
                self.persist(pref.session_id, "adopted from stored preference")
            }
            _ => self.persist(generate_session_id(), "generated"),
        }
    }

    fn persist(&self, id: String, origin: &str) -> String {
        match self.store.write_session_id(&id) {
            Ok(()) => debug!(session_id = %id, "Session id {}", origin),
            Err(e) => warn!(
                error = %e,
                session_id = %id,
                "Could not persist session id, keeping it in memory only"
            ),
        }
        id
    }
}
