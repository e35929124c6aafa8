//! Audience resolution policy
//!
//! Folds a signal list into one audience and its provenance. Deterministic
//! and infallible: anything unresolvable degrades to the host default.
//!
//! Order of rules:
//! 1. A `url_param` signal wins outright (`auto_detected`).
//! 2. Otherwise the highest confidence wins; ties go to
//!    `stored_preference` over `referrer`.
//! 3. A winner below the acceptance threshold, or no signal at all, yields
//!    the default (`default`).
//! 4. A `stored_preference` winner reports `stored_preference`; any other
//!    winner reports `auto_detected`.
//!
//! Manual selections never pass through here.

use alumnet_common::events::{AudienceType, ResolutionSource};
use std::cmp::Ordering;

use crate::types::{DetectionSignal, SignalOrigin};

/// Minimum winning confidence accepted by default
///
/// Referrer-only evidence (0.6) clears this, so a referrer alone can switch
/// the displayed audience.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.5;

/// Outcome of a resolution pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub audience: AudienceType,
    pub source: ResolutionSource,
    /// Signal that decided the outcome; `None` for the default branch
    pub winner: Option<DetectionSignal>,
}

impl Resolution {
    fn fallback(default: AudienceType) -> Self {
        Self {
            audience: default,
            source: ResolutionSource::Default,
            winner: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolutionEngine {
    acceptance_threshold: f64,
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPTANCE_THRESHOLD)
    }
}

impl ResolutionEngine {
    /// Threshold is clamped to `[0, 1]`; NaN falls back to the default
    pub fn new(acceptance_threshold: f64) -> Self {
        let acceptance_threshold = if acceptance_threshold.is_nan() {
            DEFAULT_ACCEPTANCE_THRESHOLD
        } else {
            acceptance_threshold.clamp(0.0, 1.0)
        };
        Self { acceptance_threshold }
    }

    pub fn acceptance_threshold(&self) -> f64 {
        self.acceptance_threshold
    }

    pub fn resolve(&self, signals: &[DetectionSignal], default: AudienceType) -> Resolution {
        if let Some(url) = signals.iter().find(|s| s.origin == SignalOrigin::UrlParam) {
            return Resolution {
                audience: url.candidate,
                source: ResolutionSource::AutoDetected,
                winner: Some(*url),
            };
        }

        let Some(best) = signals.iter().copied().max_by(compare_strength) else {
            return Resolution::fallback(default);
        };

        if best.confidence() < self.acceptance_threshold {
            return Resolution::fallback(default);
        }

        let source = match best.origin {
            SignalOrigin::StoredPreference => ResolutionSource::StoredPreference,
            SignalOrigin::UrlParam | SignalOrigin::Referrer => ResolutionSource::AutoDetected,
        };
        Resolution {
            audience: best.candidate,
            source,
            winner: Some(best),
        }
    }
}

fn compare_strength(a: &DetectionSignal, b: &DetectionSignal) -> Ordering {
    a.confidence()
        .total_cmp(&b.confidence())
        .then_with(|| a.origin.tie_break_rank().cmp(&b.origin.tie_break_rank()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IND: AudienceType = AudienceType::Individual;
    const INST: AudienceType = AudienceType::Institutional;

    fn resolve(
        signals: &[DetectionSignal],
        default: AudienceType,
    ) -> (AudienceType, ResolutionSource) {
        let r = ResolutionEngine::default().resolve(signals, default);
        (r.audience, r.source)
    }

    #[test]
    fn test_no_signals_yields_default() {
        assert_eq!(resolve(&[], IND), (IND, ResolutionSource::Default));
        assert_eq!(resolve(&[], INST), (INST, ResolutionSource::Default));
    }

    #[test]
    fn test_url_param_always_wins() {
        for url_audience in AudienceType::ALL {
            let signals = [
                DetectionSignal::stored_preference(INST),
                DetectionSignal::institutional_referrer(),
                DetectionSignal::url_param(url_audience),
            ];
            for default in AudienceType::ALL {
                assert_eq!(
                    resolve(&signals, default),
                    (url_audience, ResolutionSource::AutoDetected)
                );
            }
        }
    }

    #[test]
    fn test_url_param_wins_even_with_low_confidence() {
        let weak_url = DetectionSignal::new(IND, 0.1, SignalOrigin::UrlParam);
        let signals = [DetectionSignal::stored_preference(INST), weak_url];
        assert_eq!(resolve(&signals, INST), (IND, ResolutionSource::AutoDetected));
    }

    #[test]
    fn test_referrer_alone_clears_threshold() {
        let signals = [DetectionSignal::institutional_referrer()];
        let r = ResolutionEngine::default().resolve(&signals, IND);
        assert_eq!((r.audience, r.source), (INST, ResolutionSource::AutoDetected));
        assert_eq!(r.winner.map(|w| w.origin), Some(SignalOrigin::Referrer));
    }

    #[test]
    fn test_stored_preference_beats_referrer_and_keeps_provenance() {
        let signals = [
            DetectionSignal::institutional_referrer(),
            DetectionSignal::stored_preference(IND),
        ];
        assert_eq!(resolve(&signals, INST), (IND, ResolutionSource::StoredPreference));
    }

    #[test]
    fn test_tie_goes_to_stored_preference() {
        let signals = [
            DetectionSignal::new(INST, 0.7, SignalOrigin::Referrer),
            DetectionSignal::new(IND, 0.7, SignalOrigin::StoredPreference),
        ];
        assert_eq!(resolve(&signals, INST), (IND, ResolutionSource::StoredPreference));

        // Order of the input list does not matter
        let reversed = [signals[1], signals[0]];
        assert_eq!(resolve(&reversed, INST), (IND, ResolutionSource::StoredPreference));
    }

    #[test]
    fn test_higher_confidence_referrer_beats_stored() {
        let signals = [
            DetectionSignal::new(IND, 0.55, SignalOrigin::StoredPreference),
            DetectionSignal::new(INST, 0.8, SignalOrigin::Referrer),
        ];
        assert_eq!(resolve(&signals, IND), (INST, ResolutionSource::AutoDetected));
    }

    #[test]
    fn test_weak_winner_falls_back_to_default() {
        let signals = [DetectionSignal::new(INST, 0.49, SignalOrigin::Referrer)];
        let r = ResolutionEngine::default().resolve(&signals, IND);
        assert_eq!((r.audience, r.source), (IND, ResolutionSource::Default));
        assert_eq!(r.winner, None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let signals = [DetectionSignal::new(INST, 0.5, SignalOrigin::Referrer)];
        assert_eq!(resolve(&signals, IND), (INST, ResolutionSource::AutoDetected));
    }

    #[test]
    fn test_stricter_threshold_rejects_referrer_only() {
        let engine = ResolutionEngine::new(0.75);
        let r = engine.resolve(&[DetectionSignal::institutional_referrer()], IND);
        assert_eq!((r.audience, r.source), (IND, ResolutionSource::Default));

        let r = engine.resolve(&[DetectionSignal::stored_preference(INST)], IND);
        assert_eq!((r.audience, r.source), (INST, ResolutionSource::StoredPreference));
    }

    #[test]
    fn test_threshold_sanitized() {
        assert_eq!(
            ResolutionEngine::new(f64::NAN).acceptance_threshold(),
            DEFAULT_ACCEPTANCE_THRESHOLD
        );
        assert_eq!(ResolutionEngine::new(2.0).acceptance_threshold(), 1.0);
        assert_eq!(ResolutionEngine::new(-1.0).acceptance_threshold(), 0.0);
    }
}
