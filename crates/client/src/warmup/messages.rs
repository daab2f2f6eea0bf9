use std::fmt;

use serde::{Deserialize, Serialize};

/// Download phase of a warm-up session. Pictures always run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadPhase {
    Pictures,
    Tts,
}

impl fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadPhase::Pictures => f.write_str("pictures"),
            DownloadPhase::Tts => f.write_str("tts"),
        }
    }
}

/// Foreground to coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarmUpCommand {
    #[serde(rename_all = "camelCase")]
    StartDownloads {
        #[serde(default)]
        picture_urls: Vec<String>,
        #[serde(default)]
        tts_model_urls: Vec<String>,
    },
    Cancel,
}

/// Coordinator to foreground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarmUpEvent {
    Progress { phase: DownloadPhase, downloaded: usize, total: usize, percentage: u8 },
    PhaseComplete { phase: DownloadPhase },
    AllComplete,
    Error { phase: DownloadPhase, error: String },
}

/// Per-phase attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseProgress {
    pub phase: DownloadPhase,
    pub downloaded: usize,
    pub total: usize,
}

impl PhaseProgress {
    pub fn new(phase: DownloadPhase, total: usize) -> Self {
        Self { phase, downloaded: 0, total }
    }

    /// Count one attempt, successful or not.
    pub fn record_attempt(&mut self) {
        self.downloaded = (self.downloaded + 1).min(self.total);
    }

    /// `round(downloaded / total * 100)`; an empty phase is complete.
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.downloaded as f64 / self.total as f64) * 100.0).round() as u8
    }

    pub fn event(&self) -> WarmUpEvent {
        WarmUpEvent::Progress {
            phase: self.phase,
            downloaded: self.downloaded,
            total: self.total,
            percentage: self.percentage(),
        }
    }
}
