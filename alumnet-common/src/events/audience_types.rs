//! Audience value types
//!
//! Shared by the selector and by any page widget that reacts to
//! `homepage:audience-changed`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// Visitor persona the page renders for
///
/// Only two values exist. "Not yet resolved" is a selector phase, never a
/// third member of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceType {
    /// Individual alumnus
    Individual,
    /// Institutional administrator
    Institutional,
}

impl AudienceType {
    /// Both audiences in display order
    pub const ALL: [AudienceType; 2] = [AudienceType::Individual, AudienceType::Institutional];

    /// Wire value used in URLs, storage and events
    pub fn as_str(&self) -> &'static str {
        match self {
            AudienceType::Individual => "individual",
            AudienceType::Institutional => "institutional",
        }
    }

    /// Exact match against the wire value; anything else is `None`
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "individual" => Some(AudienceType::Individual),
            "institutional" => Some(AudienceType::Institutional),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudienceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudienceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AudienceType::from_wire(s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown audience type: {s:?}")))
    }
}

/// Why a given audience value was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Visitor clicked or keyboard-activated an option
    Manual,
    /// Derived from the URL parameter or the referrer
    AutoDetected,
    /// Carried over from a previously stored preference
    StoredPreference,
    /// Host-supplied default; no usable evidence
    Default,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Manual => "manual",
            ResolutionSource::AutoDetected => "auto_detected",
            ResolutionSource::StoredPreference => "stored_preference",
            ResolutionSource::Default => "default",
        }
    }
}

impl std::fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
