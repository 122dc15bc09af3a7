// Runestone device: artifact detection, scanning, the quiz and the backend
// client a device uses to reveal its fragment.

pub mod catalog;
pub mod client;
pub mod detector;
pub mod hunt;
pub mod quiz;
pub mod scanner;

pub use catalog::{Artifact, ARTIFACTS};
pub use client::{ClientError, CompletionOutcome, TeamClient};
pub use detector::{ArtifactDetector, DetectionEvent, Peer, Progress};
pub use hunt::{run_hunt, HuntError, HuntOutcome, HuntSettings};
pub use quiz::{Question, QuizError, QuizRun, QUIZ};
pub use scanner::{
    select_scan_source, RadioScanSource, ScanError, ScanSession, ScanSource, SelectedSource,
    SimulatedScanSource,
};
