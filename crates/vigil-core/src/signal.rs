use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SourceError;

/// Which sensing modality produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Camera,
    Screen,
}

/// Classifier-side status candidate, before priority resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCandidate {
    Present,
    Away,
    Gadget,
    ScreenDistraction,
    Unknown,
}

/// One normalized classifier observation.
///
/// Built only by the signal-source adapters below; read-only afterwards.
/// A new poll supersedes the previous signal from the same source, it never
/// mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignal {
    pub source: SignalKind,
    pub observed_at: DateTime<Utc>,
    pub candidate: StatusCandidate,
    pub confidence: f64,
    pub detail: Option<String>,
}

/// One captured camera frame, opaque to the engine.
#[derive(Debug, Clone)]
pub struct Frame(pub Vec<u8>);

/// Structured result of one vision-classifier call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionObservation {
    pub person_present: bool,
    pub gadget_active: bool,
    pub gadget_confidence: f64,
    pub distraction_label: Option<String>,
}

/// Structured result of one screen/blocklist probe. Purely local, no network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenObservation {
    pub is_blocked: bool,
    pub category: Option<String>,
    pub source_identifier: String,
}

/// Produces camera frames for the vision classifier.
#[async_trait]
pub trait CameraFeed: Send + Sync {
    /// Grab one frame.
    ///
    /// # Errors
    ///
    /// `SourceError::Permission` when camera access is revoked,
    /// `SourceError::Transient` for recoverable capture failures.
    async fn grab(&self) -> Result<Frame, SourceError>;
}

/// Black-box vision classification service.
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    /// Classify one frame.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` on network failure or unparseable output.
    async fn classify(&self, frame: &Frame) -> Result<VisionObservation, SourceError>;
}

/// Local screen/window-activity matcher.
#[async_trait]
pub trait ScreenProbe: Send + Sync {
    /// Check the active window/URL against the blocklist.
    ///
    /// # Errors
    ///
    /// `SourceError::Permission` when window information is inaccessible.
    async fn observe(&self) -> Result<ScreenObservation, SourceError>;
}

/// A polling adapter around one classifier, yielding normalized signals.
#[async_trait]
pub trait SignalSource: Send + Sync {
    fn kind(&self) -> SignalKind;

    /// Run one classifier round-trip and normalize the result.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` instead of raising past the loop boundary.
    async fn poll(&self) -> Result<RawSignal, SourceError>;
}

/// Camera-backed signal source: grabs a frame, classifies it, and maps the
/// structured result onto a status candidate.
pub struct CameraSource {
    feed: Arc<dyn CameraFeed>,
    classifier: Arc<dyn VisionClassifier>,
}

impl CameraSource {
    #[must_use]
    pub fn new(feed: Arc<dyn CameraFeed>, classifier: Arc<dyn VisionClassifier>) -> Self {
        Self { feed, classifier }
    }
}

#[async_trait]
impl SignalSource for CameraSource {
    fn kind(&self) -> SignalKind {
        SignalKind::Camera
    }

    async fn poll(&self) -> Result<RawSignal, SourceError> {
        let frame = self.feed.grab().await?;
        let obs = self.classifier.classify(&frame).await?;

        if !obs.gadget_confidence.is_finite() || !(0.0..=1.0).contains(&obs.gadget_confidence) {
            return Err(SourceError::Malformed(format!(
                "gadget_confidence out of range: {}",
                obs.gadget_confidence
            )));
        }

        let (candidate, confidence) = if !obs.person_present {
            (StatusCandidate::Away, 1.0)
        } else if obs.gadget_active {
            (StatusCandidate::Gadget, obs.gadget_confidence)
        } else {
            (StatusCandidate::Present, 1.0)
        };

        log::debug!("camera observation: {candidate:?} (confidence {confidence:.2})");

        Ok(RawSignal {
            source: SignalKind::Camera,
            observed_at: Utc::now(),
            candidate,
            confidence,
            detail: obs.distraction_label,
        })
    }
}

/// Screen-backed signal source: asks the blocklist matcher about the active
/// window and maps a block hit onto a distraction candidate.
pub struct ScreenSource {
    probe: Arc<dyn ScreenProbe>,
}

impl ScreenSource {
    #[must_use]
    pub fn new(probe: Arc<dyn ScreenProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl SignalSource for ScreenSource {
    fn kind(&self) -> SignalKind {
        SignalKind::Screen
    }

    async fn poll(&self) -> Result<RawSignal, SourceError> {
        let obs = self.probe.observe().await?;

        let (candidate, detail) = if obs.is_blocked {
            let label = distraction_label(&obs.source_identifier);
            log::debug!("screen distraction: {label}");
            (StatusCandidate::ScreenDistraction, Some(label))
        } else {
            (StatusCandidate::Present, None)
        };

        Ok(RawSignal {
            source: SignalKind::Screen,
            observed_at: Utc::now(),
            candidate,
            confidence: 1.0,
            detail,
        })
    }
}

/// Format a blocklist match for display, e.g. "Website: example.com" or
/// "App: Steam". Long sources are truncated to keep menu-bar labels short.
#[must_use]
pub fn distraction_label(source_identifier: &str) -> String {
    const WEBSITE_INDICATORS: [&str; 16] = [
        ".com", ".org", ".net", ".edu", ".gov", ".io", ".co", ".tv", ".gg", ".app", ".dev", ".me",
        ".info", ".biz", ".xyz", "://",
    ];
    const MAX_CHARS: usize = 18;

    let source = if source_identifier.is_empty() {
        "Unknown"
    } else {
        source_identifier
    };
    let lower = source.to_lowercase();
    let is_website = WEBSITE_INDICATORS.iter().any(|ind| lower.contains(ind));
    let prefix = if is_website { "Website" } else { "App" };

    if source.chars().count() > MAX_CHARS {
        let truncated: String = source.chars().take(MAX_CHARS).collect();
        format!("{prefix}: {truncated}...")
    } else {
        format!("{prefix}: {source}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFeed;

    #[async_trait]
    impl CameraFeed for FixedFeed {
        async fn grab(&self) -> Result<Frame, SourceError> {
            Ok(Frame(vec![0u8; 4]))
        }
    }

    struct FixedVision(VisionObservation);

    #[async_trait]
    impl VisionClassifier for FixedVision {
        async fn classify(&self, _frame: &Frame) -> Result<VisionObservation, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct FixedScreen(ScreenObservation);

    #[async_trait]
    impl ScreenProbe for FixedScreen {
        async fn observe(&self) -> Result<ScreenObservation, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn camera_source(obs: VisionObservation) -> CameraSource {
        CameraSource::new(Arc::new(FixedFeed), Arc::new(FixedVision(obs)))
    }

    #[tokio::test]
    async fn camera_maps_absence_to_away() {
        let source = camera_source(VisionObservation {
            person_present: false,
            gadget_active: false,
            gadget_confidence: 0.0,
            distraction_label: None,
        });
        let signal = source.poll().await.unwrap();
        assert_eq!(signal.candidate, StatusCandidate::Away);
        assert_eq!(signal.source, SignalKind::Camera);
    }

    #[tokio::test]
    async fn camera_maps_gadget_with_confidence() {
        let source = camera_source(VisionObservation {
            person_present: true,
            gadget_active: true,
            gadget_confidence: 0.85,
            distraction_label: Some("phone".into()),
        });
        let signal = source.poll().await.unwrap();
        assert_eq!(signal.candidate, StatusCandidate::Gadget);
        assert!((signal.confidence - 0.85).abs() < f64::EPSILON);
        assert_eq!(signal.detail.as_deref(), Some("phone"));
    }

    #[tokio::test]
    async fn camera_rejects_out_of_range_confidence() {
        let source = camera_source(VisionObservation {
            person_present: true,
            gadget_active: true,
            gadget_confidence: 3.5,
            distraction_label: None,
        });
        assert!(matches!(
            source.poll().await,
            Err(SourceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn screen_maps_block_to_distraction() {
        let source = ScreenSource::new(Arc::new(FixedScreen(ScreenObservation {
            is_blocked: true,
            category: Some("video_streaming".into()),
            source_identifier: "youtube.com".into(),
        })));
        let signal = source.poll().await.unwrap();
        assert_eq!(signal.candidate, StatusCandidate::ScreenDistraction);
        assert_eq!(signal.detail.as_deref(), Some("Website: youtube.com"));
    }

    #[test]
    fn label_distinguishes_websites_from_apps() {
        assert_eq!(distraction_label("youtube.com"), "Website: youtube.com");
        assert_eq!(distraction_label("Steam"), "App: Steam");
        assert_eq!(distraction_label(""), "App: Unknown");
    }

    #[test]
    fn label_truncates_long_sources() {
        let label = distraction_label("averyverylongwindowtitlehere.example.com");
        assert_eq!(label, "Website: averyverylongwindo...");
    }
}
