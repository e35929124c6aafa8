//! Persisted record and ephemeral signal types

use alumnet_common::events::{AudienceType, ResolutionSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence of an explicit `audience` URL parameter
pub const URL_PARAM_CONFIDENCE: f64 = 1.0;
/// Confidence of a previously stored preference
pub const STORED_PREFERENCE_CONFIDENCE: f64 = 0.9;
/// Confidence of an institutional-leaning referrer
pub const REFERRER_CONFIDENCE: f64 = 0.6;

/// Persisted audience preference
///
/// Stored as JSON with keys `type`, `timestamp`, `source`, `sessionId`.
/// `timestamp` is set when the record is built for a write, never backdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudiencePreference {
    #[serde(rename = "type")]
    pub audience: AudienceType,
    pub timestamp: DateTime<Utc>,
    pub source: ResolutionSource,
    pub session_id: String,
}

impl AudiencePreference {
    /// Build a record stamped with the current time
    pub fn new(
        audience: AudienceType,
        source: ResolutionSource,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            audience,
            timestamp: alumnet_common::time::now(),
            source,
            session_id: session_id.into(),
        }
    }
}

/// Where a detection signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOrigin {
    UrlParam,
    Referrer,
    StoredPreference,
}

impl SignalOrigin {
    /// Tie-break rank when confidences are equal (higher wins)
    pub(crate) fn tie_break_rank(&self) -> u8 {
        match self {
            SignalOrigin::UrlParam => 2,
            SignalOrigin::StoredPreference => 1,
            SignalOrigin::Referrer => 0,
        }
    }
}

impl std::fmt::Display for SignalOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalOrigin::UrlParam => write!(f, "url_param"),
            SignalOrigin::Referrer => write!(f, "referrer"),
            SignalOrigin::StoredPreference => write!(f, "stored_preference"),
        }
    }
}

/// One piece of weak evidence about the visitor's audience
///
/// Created fresh on every resolution pass and dropped once folded into a
/// decision; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSignal {
    pub candidate: AudienceType,
    confidence: f64,
    pub origin: SignalOrigin,
}

impl DetectionSignal {
    /// Confidence is clamped to `[0, 1]`; NaN counts as zero.
    pub fn new(candidate: AudienceType, confidence: f64, origin: SignalOrigin) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            candidate,
            confidence,
            origin,
        }
    }

    pub fn url_param(candidate: AudienceType) -> Self {
        Self::new(candidate, URL_PARAM_CONFIDENCE, SignalOrigin::UrlParam)
    }

    pub fn stored_preference(candidate: AudienceType) -> Self {
        Self::new(candidate, STORED_PREFERENCE_CONFIDENCE, SignalOrigin::StoredPreference)
    }

    pub fn institutional_referrer() -> Self {
        Self::new(AudienceType::Institutional, REFERRER_CONFIDENCE, SignalOrigin::Referrer)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}
