//! Page event types for the homepage event system
//!
//! Provides shared page-level event definitions and the EventBus that lets
//! independent widgets react to audience changes without direct coupling.

mod audience_types;

pub use audience_types::{AudienceType, ResolutionSource};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event name dispatched on the page when the resolved audience changes
pub const AUDIENCE_CHANGED_EVENT: &str = "homepage:audience-changed";

/// Page-level event types
///
/// Serialized as `{"type": <event name>, "detail": {...}}`, mirroring a DOM
/// `CustomEvent` so the payload can be forwarded to a browser shell verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum PageEvent {
    /// Resolved audience changed
    ///
    /// Triggers:
    /// - Hero/pricing/testimonial widgets: switch rendered content
    /// - Any sibling widget not wired to the selector directly
    #[serde(rename = "homepage:audience-changed")]
    AudienceChanged(AudienceChangedDetail),
}

/// Detail payload of `homepage:audience-changed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceChangedDetail {
    /// Audience after the change
    pub new_audience: AudienceType,
    /// Audience displayed before the change (None if nothing was displayed)
    pub previous_audience: Option<AudienceType>,
    /// Why the new audience was chosen
    pub source: ResolutionSource,
}

impl PageEvent {
    /// Get event name as dispatched on the page
    pub fn event_type(&self) -> &str {
        match self {
            PageEvent::AudienceChanged(_) => AUDIENCE_CHANGED_EVENT,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Page-wide event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the selector)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// # Examples
///
/// ```
/// use alumnet_common::events::{
///     AudienceChangedDetail, AudienceType, EventBus, PageEvent, ResolutionSource,
/// };
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(PageEvent::AudienceChanged(AudienceChangedDetail {
///     new_audience: AudienceType::Institutional,
///     previous_audience: Some(AudienceType::Individual),
///     source: ResolutionSource::Manual,
/// }));
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "homepage:audience-changed");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PageEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: PageEvent) -> Result<usize, broadcast::error::SendError<PageEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PageEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
