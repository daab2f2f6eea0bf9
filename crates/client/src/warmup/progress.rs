//! Foreground view of a warm-up session.

use super::messages::{DownloadPhase, WarmUpEvent};

/// Share of overall progress owned by the already-loaded application.
pub const WEIGHT_APP: u32 = 30;
pub const WEIGHT_PICTURES: u32 = 40;
pub const WEIGHT_TTS: u32 = 30;

/// Folds coordinator events into a weighted overall percentage and a list
/// of failed downloads.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    pictures: u8,
    tts: u8,
    complete: bool,
    advisories: Vec<String>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &WarmUpEvent) {
        match event {
            WarmUpEvent::Progress { phase, percentage, .. } => self.set_phase(*phase, *percentage),
            WarmUpEvent::PhaseComplete { phase } => self.set_phase(*phase, 100),
            WarmUpEvent::AllComplete => self.complete = true,
            WarmUpEvent::Error { phase, error } => {
                tracing::debug!(%phase, error = %error, "warm-up advisory");
                self.advisories.push(error.clone());
            }
        }
    }

    fn set_phase(&mut self, phase: DownloadPhase, percentage: u8) {
        match phase {
            DownloadPhase::Pictures => self.pictures = percentage.min(100),
            DownloadPhase::Tts => self.tts = percentage.min(100),
        }
    }

    /// Weighted overall progress, 100 once everything completed.
    pub fn overall(&self) -> u8 {
        if self.complete {
            return 100;
        }
        let weighted = WEIGHT_APP * 100 + WEIGHT_PICTURES * u32::from(self.pictures) + WEIGHT_TTS * u32::from(self.tts);
        ((weighted as f64) / 100.0).round() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn advisories(&self) -> &[String] {
        &self.advisories
    }

    /// Status line for the loading screen.
    pub fn status(&self) -> &'static str {
        if self.complete {
            "Ready"
        } else if self.tts > 0 {
            "Downloading voice models"
        } else if self.pictures > 0 {
            "Downloading pictures"
        } else {
            "Loading application"
        }
    }

    /// A single notice summarising every failed download, if any.
    pub fn notice(&self) -> Option<String> {
        match self.advisories.len() {
            0 => None,
            1 => Some(format!("1 resource could not be downloaded: {}", self.advisories[0])),
            n => Some(format!("{n} resources could not be downloaded: {}", self.advisories.join("; "))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(phase: DownloadPhase, percentage: u8) -> WarmUpEvent {
        WarmUpEvent::Progress { phase, downloaded: 0, total: 0, percentage }
    }

    #[test]
    fn test_weights_sum_to_100() {
        assert_eq!(WEIGHT_APP + WEIGHT_PICTURES + WEIGHT_TTS, 100);
    }

    #[test]
    fn test_overall_weighting() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.overall(), 30);

        tracker.apply(&progress(DownloadPhase::Pictures, 50));
        assert_eq!(tracker.overall(), 50);

        tracker.apply(&WarmUpEvent::PhaseComplete { phase: DownloadPhase::Pictures });
        assert_eq!(tracker.overall(), 70);

        tracker.apply(&progress(DownloadPhase::Tts, 50));
        assert_eq!(tracker.overall(), 85);
        assert_eq!(tracker.status(), "Downloading voice models");

        tracker.apply(&WarmUpEvent::AllComplete);
        assert_eq!(tracker.overall(), 100);
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_errors_aggregate_into_one_notice() {
        let mut tracker = ProgressTracker::new();
        assert!(tracker.notice().is_none());

        for url in ["/a.svg", "/b.svg"] {
            tracker.apply(&WarmUpEvent::Error { phase: DownloadPhase::Pictures, error: format!("{url} offline") });
        }

        assert_eq!(tracker.advisories().len(), 2);
        assert_eq!(tracker.notice().unwrap(), "2 resources could not be downloaded: /a.svg offline; /b.svg offline");
    }
}
