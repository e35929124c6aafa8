//! Audience detection and preference resolution for the homepage
//!
//! Fuses weak signals (URL parameter, referrer, stored preference) into one
//! resolved [`AudienceType`], persists it, and broadcasts changes to the
//! rest of the page.
//!
//! Component layering, leaf-first:
//! - [`referrer`]: institutional referrer heuristics
//! - [`signals`]: reads candidate signals from the page environment
//! - [`storage`] / [`preference`] / [`session`]: persisted record and session id
//! - [`resolver`]: the pure decision policy
//! - [`notify`]: bound state, component events, analytics, page events
//! - [`controller`]: orchestration and the `Detecting` lifecycle

pub mod controller;
pub mod error;
pub mod notify;
pub mod preference;
pub mod referrer;
pub mod resolver;
pub mod session;
pub mod signals;
pub mod storage;
pub mod types;

pub use alumnet_common::events::{AudienceType, ResolutionSource};
pub use controller::{AudienceSelectorController, SelectorConfig, SelectorPhase};
pub use error::{AnalyticsError, StorageError};
pub use types::{AudiencePreference, DetectionSignal, SignalOrigin};
