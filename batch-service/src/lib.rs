//! Sequential bulk submission with randomized pacing, cooperative
//! cancellation and an in-memory progress store.

pub mod delay;
pub mod orchestrator;
pub mod progress;

pub use delay::{sample_delay_secs, DelayRange};
pub use orchestrator::{BatchOrchestrator, BatchRun, PostSubmitter, ProgressEvent};
pub use progress::{BatchProgress, CancelFlag, PostFailure, PostSuccess, ProgressStore, RunStatus};
