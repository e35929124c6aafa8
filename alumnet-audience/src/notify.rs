//! Change propagation
//!
//! A committed audience change fans out to four places, each best-effort:
//! the bound reactive state, component events, the host analytics sink, and
//! the page-wide `homepage:audience-changed` event.

use alumnet_common::events::{
    AudienceChangedDetail, AudienceType, EventBus, PageEvent, ResolutionSource,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::error::AnalyticsError;
use crate::types::AudiencePreference;

/// Analytics event name for audience changes
pub const ANALYTICS_EVENT_NAME: &str = "audience_change";

/// Payload sent to the host analytics dispatch function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsEvent {
    pub new_audience: AudienceType,
    pub previous_audience: Option<AudienceType>,
    pub change_source: ResolutionSource,
    pub session_id: String,
}

/// Host page analytics dispatch
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event_name: &str, event: &AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Events the selector component emits to its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum ComponentEvent {
    /// Two-way binding update for the audience prop
    #[serde(rename = "update:audience")]
    UpdateAudience(AudienceType),
    /// Richer change notification with the committed preference
    #[serde(rename = "audience-changed")]
    AudienceChanged {
        audience: AudienceType,
        preference: AudiencePreference,
    },
}

impl ComponentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentEvent::UpdateAudience(_) => "update:audience",
            ComponentEvent::AudienceChanged { .. } => "audience-changed",
        }
    }
}

/// Fans a committed change out to every listener
pub struct NotificationBus {
    state_tx: watch::Sender<AudienceType>,
    component_tx: broadcast::Sender<ComponentEvent>,
    page_events: EventBus,
    analytics: Option<Arc<dyn AnalyticsSink>>,
}

impl NotificationBus {
    pub fn new(initial: AudienceType, page_events: EventBus) -> Self {
        let (state_tx, _) = watch::channel(initial);
        let (component_tx, _) = broadcast::channel(32);
        Self {
            state_tx,
            component_tx,
            page_events,
            analytics: None,
        }
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    /// Bound audience value; updated before any event goes out
    pub fn watch_audience(&self) -> watch::Receiver<AudienceType> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_component_events(&self) -> broadcast::Receiver<ComponentEvent> {
        self.component_tx.subscribe()
    }

    pub fn page_events(&self) -> &EventBus {
        &self.page_events
    }

    pub fn publish(
        &self,
        previous: Option<AudienceType>,
        new: AudienceType,
        meta: &AudiencePreference,
    ) {
        self.state_tx.send_replace(new);

        let _ = self.component_tx.send(ComponentEvent::UpdateAudience(new));
        let _ = self.component_tx.send(ComponentEvent::AudienceChanged {
            audience: new,
            preference: meta.clone(),
        });

        if let Some(sink) = &self.analytics {
            let event = AnalyticsEvent {
                new_audience: new,
                previous_audience: previous,
                change_source: meta.source,
                session_id: meta.session_id.clone(),
            };
            if let Err(e) = sink.track(ANALYTICS_EVENT_NAME, &event) {
                warn!(error = %e, "Analytics dispatch failed for audience change");
            }
        }

        self.page_events.emit_lossy(PageEvent::AudienceChanged(AudienceChangedDetail {
            new_audience: new,
            previous_audience: previous,
            source: meta.source,
        }));

        debug!(
            previous = ?previous,
            new = %new,
            source = %meta.source,
            "Published audience change"
        );
    }
}
