//! Signal collection
//!
//! Reads candidate signals from the page environment and the stored
//! preference. Read-only: nothing here writes storage or changes state.
//! A source that fails is logged and left out; the remaining signals are
//! still returned.

use alumnet_common::events::AudienceType;
use std::sync::Arc;
use tracing::debug;

use crate::preference::PreferenceStore;
use crate::referrer::{ReferrerClass, ReferrerClassifier};
use crate::types::DetectionSignal;

/// Name of the query parameter carrying an explicit audience
pub const AUDIENCE_PARAM: &str = "audience";

/// Failure reading a value from the host page
#[derive(Debug, thiserror::Error)]
#[error("Page environment unavailable: {0}")]
pub struct EnvironmentError(pub String);

/// Read access to the host page
pub trait PageEnvironment: Send + Sync {
    /// Current page URL (absolute, or just the query string)
    fn location(&self) -> Result<Option<String>, EnvironmentError>;

    /// Document referrer; empty or `None` when the visit was direct
    fn referrer(&self) -> Result<Option<String>, EnvironmentError>;
}

/// Fixed environment values, captured once per page load
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    pub location: Option<String>,
    pub referrer: Option<String>,
}

impl StaticEnvironment {
    pub fn new(location: Option<String>, referrer: Option<String>) -> Self {
        Self { location, referrer }
    }
}

impl PageEnvironment for StaticEnvironment {
    fn location(&self) -> Result<Option<String>, EnvironmentError> {
        Ok(self.location.clone())
    }

    fn referrer(&self) -> Result<Option<String>, EnvironmentError> {
        Ok(self.referrer.clone())
    }
}

/// Collects detection signals for one resolution pass
#[derive(Clone)]
pub struct SignalReader {
    environment: Arc<dyn PageEnvironment>,
    store: PreferenceStore,
    classifier: ReferrerClassifier,
}

impl SignalReader {
    pub fn new(
        environment: Arc<dyn PageEnvironment>,
        store: PreferenceStore,
        classifier: ReferrerClassifier,
    ) -> Self {
        Self {
            environment,
            store,
            classifier,
        }
    }

    /// Signals in source order: URL parameter, stored preference, referrer
    pub fn collect(&self) -> Vec<DetectionSignal> {
        let signals: Vec<DetectionSignal> = [
            self.url_param_signal(),
            self.stored_preference_signal(),
            self.referrer_signal(),
        ]
        .into_iter()
        .flatten()
        .collect();

        debug!(count = signals.len(), ?signals, "Collected audience signals");
        signals
    }

    fn url_param_signal(&self) -> Option<DetectionSignal> {
        let location = match self.environment.location() {
            Ok(location) => location?,
            Err(e) => {
                debug!(error = %e, "URL unavailable, skipping url_param signal");
                return None;
            }
        };

        let value = query_param(&location, AUDIENCE_PARAM)?;
        match AudienceType::from_wire(&value) {
            Some(audience) => Some(DetectionSignal::url_param(audience)),
            None => {
                debug!(value = %value, "Ignoring unrecognized audience parameter");
                None
            }
        }
    }

    fn stored_preference_signal(&self) -> Option<DetectionSignal> {
        match self.store.read_fresh() {
            Ok(pref) => pref.map(|p| DetectionSignal::stored_preference(p.audience)),
            Err(e) => {
                debug!(error = %e, "Stored preference unavailable, skipping signal");
                None
            }
        }
    }

    fn referrer_signal(&self) -> Option<DetectionSignal> {
        let referrer = match self.environment.referrer() {
            Ok(referrer) => referrer?,
            Err(e) => {
                debug!(error = %e, "Referrer unavailable, skipping referrer signal");
                return None;
            }
        };

        // A neutral referrer is no evidence at all, not evidence for `individual`
        match self.classifier.classify(&referrer) {
            ReferrerClass::Institutional => Some(DetectionSignal::institutional_referrer()),
            ReferrerClass::Neutral => None,
        }
    }
}

/// First value of `name` in the query string of `location`
///
/// Accepts a full URL or a bare query string (with or without `?`).
/// Keys and values are percent-decoded with `+` read as a space.
pub fn query_param(location: &str, name: &str) -> Option<String> {
    let without_fragment = location.split('#').next().unwrap_or_default();
    let query = match without_fragment.split_once('?') {
        Some((_, query)) => query,
        None if !without_fragment.contains("://") => without_fragment,
        None => return None,
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| percent_decode(key) == name)
        .map(|(_, value)| percent_decode(value))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
