//! First-launch cache warm-up.
//!
//! The coordinator downloads the picture library and the TTS models in the
//! background, reporting progress as [`WarmUpEvent`]s. The foreground folds
//! those into a weighted percentage with [`ProgressTracker`].

pub mod coordinator;
pub mod messages;
pub mod progress;

pub use coordinator::{WarmUpHandle, WarmUpState};
pub use messages::{DownloadPhase, PhaseProgress, WarmUpCommand, WarmUpEvent};
pub use progress::ProgressTracker;
