//! Audience selector orchestration
//!
//! # Phases
//! `Idle → Detecting → Resolved`. A manual selection moves any phase straight
//! to `Resolved`.
//!
//! # Ordering
//! Detection runs as a spawned task that first waits out the configured
//! delay, racing a cancellation token. A manual selection cancels the token
//! and bumps a generation counter under the state lock, so a detection
//! result that arrives afterwards is discarded: the last committed choice
//! wins.
//!
//! Persisting and publishing happen after the state lock is released, so
//! analytics sinks and listeners may call back into the controller. A commit
//! overtaken by a newer change is dropped before it writes or publishes.
//!
//! # Failure
//! Nothing here returns an error to the host page. Storage failures are
//! logged and the in-memory state carries on. The `Detecting` phase is
//! cleared by a drop guard whether detection commits, is cancelled, aborted
//! or panics.

use alumnet_common::config::SelectorSettings;
use alumnet_common::events::{AudienceType, EventBus, ResolutionSource};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notify::{AnalyticsSink, ComponentEvent, NotificationBus};
use crate::preference::{PreferenceStore, DEFAULT_PREFERENCE_TTL_DAYS};
use crate::referrer::ReferrerClassifier;
use crate::resolver::{Resolution, ResolutionEngine, DEFAULT_ACCEPTANCE_THRESHOLD};
use crate::session::SessionIdentity;
use crate::signals::{PageEnvironment, SignalReader};
use crate::storage::Storage;
use crate::types::AudiencePreference;

/// Host-supplied selector props and tuning
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub default_audience: AudienceType,
    pub auto_detect: bool,
    pub show_description: bool,
    pub detection_delay: Duration,
    pub acceptance_threshold: f64,
    pub preference_ttl: Option<chrono::Duration>,
    pub referrer_keywords: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            default_audience: AudienceType::Individual,
            auto_detect: true,
            show_description: true,
            detection_delay: Duration::from_millis(500),
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            preference_ttl: Some(chrono::Duration::days(DEFAULT_PREFERENCE_TTL_DAYS)),
            referrer_keywords: Vec::new(),
        }
    }
}

impl From<&SelectorSettings> for SelectorConfig {
    fn from(settings: &SelectorSettings) -> Self {
        Self {
            default_audience: settings.default_audience,
            auto_detect: settings.auto_detect,
            show_description: settings.show_description,
            detection_delay: alumnet_common::time::millis_to_duration(settings.detection_delay_ms),
            acceptance_threshold: settings.acceptance_threshold,
            preference_ttl: match settings.preference_ttl_days {
                0 => None,
                days => Some(chrono::Duration::days(i64::from(days))),
            },
            referrer_keywords: settings.referrer_keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPhase {
    /// Not mounted yet
    Idle,
    /// Auto-detection in flight; UI shows a "detecting" indicator
    Detecting,
    /// Final for this page view
    Resolved,
}

/// Keys that activate a focused audience option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKey {
    Enter,
    Space,
    Other,
}

impl ActivationKey {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_key(key: &str) -> Self {
        match key {
            "Enter" => ActivationKey::Enter,
            " " | "Space" | "Spacebar" => ActivationKey::Space,
            _ => ActivationKey::Other,
        }
    }
}

/// One selectable option as rendered by the component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceOption {
    pub audience: AudienceType,
    pub label: &'static str,
    pub description: Option<&'static str>,
    pub selected: bool,
}

fn option_label(audience: AudienceType) -> &'static str {
    match audience {
        AudienceType::Individual => "For Alumni",
        AudienceType::Institutional => "For Institutions",
    }
}

fn option_description(audience: AudienceType) -> &'static str {
    match audience {
        AudienceType::Individual => {
            "Reconnect with classmates, find mentors and grow your network."
        }
        AudienceType::Institutional => "Engage your alumni community and measure participation.",
    }
}

struct SelectorState {
    phase: SelectorPhase,
    current: AudienceType,
    generation: u64,
    detection: Option<CancellationToken>,
}

/// Owns the resolved audience for one page view
pub struct AudienceSelectorController {
    config: SelectorConfig,
    reader: SignalReader,
    engine: ResolutionEngine,
    store: PreferenceStore,
    session: SessionIdentity,
    bus: NotificationBus,
    state: Mutex<SelectorState>,
}

impl AudienceSelectorController {
    pub fn new(
        config: SelectorConfig,
        environment: Arc<dyn PageEnvironment>,
        storage: Arc<dyn Storage>,
        page_events: EventBus,
    ) -> Self {
        let store = PreferenceStore::new(storage).with_ttl(config.preference_ttl);
        let classifier = ReferrerClassifier::with_extra_keywords(&config.referrer_keywords);
        let reader = SignalReader::new(environment, store.clone(), classifier);
        let engine = ResolutionEngine::new(config.acceptance_threshold);
        let session = SessionIdentity::new(store.clone());
        let bus = NotificationBus::new(config.default_audience, page_events);
        let state = Mutex::new(SelectorState {
            phase: SelectorPhase::Idle,
            current: config.default_audience,
            generation: 0,
            detection: None,
        });

        Self {
            config,
            reader,
            engine,
            store,
            session,
            bus,
            state,
        }
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.bus = self.bus.with_analytics(sink);
        self
    }

    pub fn current_audience(&self) -> AudienceType {
        self.lock_state().current
    }

    pub fn phase(&self) -> SelectorPhase {
        self.lock_state().phase
    }

    pub fn is_detecting(&self) -> bool {
        self.phase() == SelectorPhase::Detecting
    }

    pub fn watch_audience(&self) -> watch::Receiver<AudienceType> {
        self.bus.watch_audience()
    }

    pub fn subscribe_component_events(&self) -> broadcast::Receiver<ComponentEvent> {
        self.bus.subscribe_component_events()
    }

    pub fn page_events(&self) -> &EventBus {
        self.bus.page_events()
    }

    /// Both options in display order; descriptions only when enabled
    pub fn options(&self) -> Vec<AudienceOption> {
        let current = self.current_audience();
        AudienceType::ALL
            .iter()
            .map(|&audience| AudienceOption {
                audience,
                label: option_label(audience),
                description: self.config.show_description.then(|| option_description(audience)),
                selected: audience == current,
            })
            .collect()
    }

    /// Start the component
    ///
    /// With auto-detect enabled, enters `Detecting` and returns the handle of
    /// the scheduled detection task. Otherwise resolves to the default
    /// immediately without publishing. Mounting twice is a no-op.
    /// Must be called from within a Tokio runtime when auto-detect is on.
    pub fn mount(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut state = self.lock_state();
        if state.phase != SelectorPhase::Idle {
            debug!(phase = ?state.phase, "Audience selector already mounted");
            return None;
        }

        if !self.config.auto_detect {
            state.phase = SelectorPhase::Resolved;
            info!(audience = %state.current, "Auto-detect disabled, showing default audience");
            return None;
        }

        state.phase = SelectorPhase::Detecting;
        state.generation += 1;
        let generation = state.generation;
        let token = CancellationToken::new();
        state.detection = Some(token.clone());
        drop(state);

        debug!(
            delay_ms = self.config.detection_delay.as_millis() as u64,
            "Scheduling audience detection"
        );
        // Owned by the task future, so it fires even if the task is aborted
        // before its first poll
        let guard = DetectingGuard {
            controller: Arc::clone(self),
            generation,
        };
        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _guard = guard;
            controller.run_detection(generation, token).await;
        }))
    }

    /// Manual click on an audience option
    ///
    /// Cancels any in-flight detection. Returns `true` when the audience
    /// changed; re-selecting the displayed audience writes and emits nothing.
    pub fn select(&self, audience: AudienceType) -> bool {
        let mut state = self.lock_state();
        if let Some(token) = state.detection.take() {
            token.cancel();
            state.generation += 1;
            debug!("Manual selection cancelled in-flight audience detection");
        }
        state.phase = SelectorPhase::Resolved;

        // A commit still publishing the displayed value must not be superseded
        if state.current == audience {
            debug!(audience = %audience, "Audience already selected");
            return false;
        }

        let previous = state.current;
        state.current = audience;
        state.generation += 1;
        let generation = state.generation;
        drop(state);

        info!(previous = %previous, audience = %audience, "Audience selected manually");
        self.commit(generation, previous, audience, ResolutionSource::Manual);
        true
    }

    /// Keyboard activation on a focused option
    pub fn handle_key(&self, audience: AudienceType, key: ActivationKey) -> bool {
        match key {
            ActivationKey::Enter | ActivationKey::Space => self.select(audience),
            ActivationKey::Other => false,
        }
    }

    async fn run_detection(&self, generation: u64, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Audience detection cancelled before reading signals");
                return;
            }
            _ = tokio::time::sleep(self.config.detection_delay) => {}
        }

        let signals = self.reader.collect();
        let resolution = self.engine.resolve(&signals, self.config.default_audience);
        self.commit_detection(generation, resolution);
    }

    fn commit_detection(&self, generation: u64, resolution: Resolution) {
        let mut state = self.lock_state();
        if state.generation != generation || state.phase != SelectorPhase::Detecting {
            debug!(
                audience = %resolution.audience,
                "Discarding detection result superseded by a manual selection"
            );
            return;
        }
        state.phase = SelectorPhase::Resolved;
        state.detection = None;

        let previous = state.current;
        if resolution.source == ResolutionSource::Default && resolution.audience == previous {
            info!(audience = %previous, "No usable audience signal, keeping default");
            return;
        }

        state.current = resolution.audience;
        drop(state);

        info!(
            audience = %resolution.audience,
            source = %resolution.source,
            origin = ?resolution.winner.map(|w| w.origin),
            "Audience detected"
        );
        self.commit(generation, previous, resolution.audience, resolution.source);
    }

    /// Persist and publish outside the state lock, so listeners may read the
    /// selector back. Skipped once a newer selection has taken over.
    fn commit(
        &self,
        generation: u64,
        previous: AudienceType,
        audience: AudienceType,
        source: ResolutionSource,
    ) {
        if self.is_superseded(generation) {
            debug!(audience = %audience, "Skipping commit superseded by a newer selection");
            return;
        }

        let session_id = self.session.get_or_create();
        let pref = AudiencePreference::new(audience, source, session_id);

        // Default outcomes are not evidence and must not come back as a stored signal
        if source != ResolutionSource::Default {
            if let Err(e) = self.store.write(&pref) {
                warn!(error = %e, "Failed to persist audience preference, continuing in memory");
            }
        }

        if self.is_superseded(generation) {
            debug!(audience = %audience, "Not publishing superseded audience change");
            return;
        }
        self.bus.publish(Some(previous), audience, &pref);
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.lock_state().generation != generation
    }

    fn lock_state(&self) -> MutexGuard<'_, SelectorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Clears `Detecting` if detection ends without committing
struct DetectingGuard {
    controller: Arc<AudienceSelectorController>,
    generation: u64,
}

impl Drop for DetectingGuard {
    fn drop(&mut self) {
        let mut state = self.controller.lock_state();
        if state.generation == self.generation && state.phase == SelectorPhase::Detecting {
            state.phase = SelectorPhase::Resolved;
            state.detection = None;
            debug!(audience = %state.current, "Audience detection ended without a result");
        }
    }
}
