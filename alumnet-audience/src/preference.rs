//! Persisted audience preference
//!
//! The only writer of the preference record. Newest write wins; there is no
//! merge and this subsystem never deletes the record.

use std::sync::Arc;
use tracing::debug;

use crate::error::StorageResult;
use crate::storage::{Storage, PREFERENCE_KEY, SESSION_ID_KEY};
use crate::types::AudiencePreference;

/// Default age after which a stored preference stops counting as a signal
pub const DEFAULT_PREFERENCE_TTL_DAYS: i64 = 30;

/// Reads and writes the preference record and the session id key
#[derive(Clone)]
pub struct PreferenceStore {
    storage: Arc<dyn Storage>,
    ttl: Option<chrono::Duration>,
}

impl PreferenceStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            ttl: Some(chrono::Duration::days(DEFAULT_PREFERENCE_TTL_DAYS)),
        }
    }

    /// Override expiry; `None` keeps records forever
    pub fn with_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Stored record, if any
    ///
    /// A missing or unparseable record is `Ok(None)`. Only an unreachable
    /// backend is an error.
    pub fn read(&self) -> StorageResult<Option<AudiencePreference>> {
        let Some(raw) = self.storage.get_item(PREFERENCE_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str::<AudiencePreference>(&raw) {
            Ok(pref) => Ok(Some(pref)),
            Err(e) => {
                debug!(error = %e, "Ignoring malformed stored audience preference");
                Ok(None)
            }
        }
    }

    /// Stored record unless it is older than the TTL
    pub fn read_fresh(&self) -> StorageResult<Option<AudiencePreference>> {
        let Some(pref) = self.read()? else {
            return Ok(None);
        };

        if let Some(ttl) = self.ttl {
            let now = alumnet_common::time::now();
            if let Some(age) = alumnet_common::time::age_of(pref.timestamp, now) {
                if age > ttl {
                    debug!(
                        age_days = age.num_days(),
                        "Stored audience preference expired"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(pref))
    }

    /// Serialize and overwrite the stored record
    pub fn write(&self, pref: &AudiencePreference) -> StorageResult<()> {
        let raw = serde_json::to_string(pref)?;
        self.storage.set_item(PREFERENCE_KEY, &raw)?;
        debug!(audience = %pref.audience, source = %pref.source, "Stored audience preference");
        Ok(())
    }

    pub(crate) fn read_session_id(&self) -> StorageResult<Option<String>> {
        Ok(self
            .storage
            .get_item(SESSION_ID_KEY)?
            .filter(|id| !id.trim().is_empty()))
    }

    pub(crate) fn write_session_id(&self, session_id: &str) -> StorageResult<()> {
        self.storage.set_item(SESSION_ID_KEY, session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryStorage;
    use alumnet_common::events::{AudienceType, ResolutionSource};

    fn store() -> (Arc<MemoryStorage>, PreferenceStore) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), PreferenceStore::new(storage))
    }

    fn manual(audience: AudienceType) -> AudiencePreference {
        AudiencePreference::new(audience, ResolutionSource::Manual, "s")
    }

    #[test]
    fn test_round_trip() {
        let (_, store) = store();
        let pref = AudiencePreference::new(
            AudienceType::Institutional,
            ResolutionSource::Manual,
            "session_1_abc",
        );

        store.write(&pref).unwrap();
        let read = store.read().unwrap().expect("record should exist");

        assert_eq!(read.audience, pref.audience);
        assert_eq!(read.source, pref.source);
        assert_eq!(read.session_id, pref.session_id);
        assert_eq!(read.timestamp.timestamp(), pref.timestamp.timestamp());
    }

    #[test]
    fn test_write_stores_expected_json() {
        let (storage, store) = store();
        store.write(&manual(AudienceType::Institutional)).unwrap();

        let raw = storage.get_item(PREFERENCE_KEY).unwrap().unwrap();
        assert!(raw.contains(r#""type":"institutional""#));
        assert!(raw.contains(r#""sessionId":"s""#));
    }

    #[test]
    fn test_newest_write_wins() {
        let (_, store) = store();
        store.write(&manual(AudienceType::Institutional)).unwrap();
        store
            .write(&AudiencePreference::new(
                AudienceType::Individual,
                ResolutionSource::AutoDetected,
                "s",
            ))
            .unwrap();

        let read = store.read().unwrap().unwrap();
        assert_eq!(read.audience, AudienceType::Individual);
        assert_eq!(read.source, ResolutionSource::AutoDetected);
    }

    #[test]
    fn test_absent_and_malformed_records_read_as_none() {
        let (storage, store) = store();
        assert_eq!(store.read().unwrap(), None);

        for raw in ["{not json", r#"{"type":"enterprise"}"#, "null", ""] {
            storage.set_item(PREFERENCE_KEY, raw).unwrap();
            assert_eq!(store.read().unwrap(), None, "raw {raw:?}");
        }
    }

    #[test]
    fn test_unavailable_storage_is_an_error() {
        let store = PreferenceStore::new(Arc::new(MemoryStorage::unavailable()));
        assert!(matches!(store.read(), Err(StorageError::Unavailable(_))));

        let pref = manual(AudienceType::Individual);
        assert!(store.write(&pref).is_err());
    }

    #[test]
    fn test_quota_exceeded_write_is_an_error() {
        let store = PreferenceStore::new(Arc::new(MemoryStorage::with_quota(8)));
        let pref = manual(AudienceType::Individual);
        assert!(matches!(store.write(&pref), Err(StorageError::QuotaExceeded { .. })));
    }

    #[test]
    fn test_expired_record_is_not_fresh() {
        let (_, store) = store();
        let mut pref = manual(AudienceType::Institutional);
        pref.timestamp -= chrono::Duration::days(DEFAULT_PREFERENCE_TTL_DAYS + 1);
        store.write(&pref).unwrap();

        assert!(store.read().unwrap().is_some());
        assert_eq!(store.read_fresh().unwrap(), None);

        let forever = store.clone().with_ttl(None);
        assert!(forever.read_fresh().unwrap().is_some());
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let (_, store) = store();
        let mut pref = manual(AudienceType::Individual);
        pref.timestamp += chrono::Duration::hours(2);
        store.write(&pref).unwrap();

        assert!(store.read_fresh().unwrap().is_some());
    }

    #[test]
    fn test_blank_session_id_reads_as_none() {
        let (storage, store) = store();
        storage.set_item(SESSION_ID_KEY, "  ").unwrap();
        assert_eq!(store.read_session_id().unwrap(), None);

        store.write_session_id("session_1_abc").unwrap();
        assert_eq!(store.read_session_id().unwrap().as_deref(), Some("session_1_abc"));
    }
}
