mod celebration;
mod coordinator;
mod engine;
mod lock;
mod progress;
mod service;
mod synthesis;

// Public API of the session subsystem.
pub use crate::error::EngineError;
pub use celebration::Celebration;
pub use coordinator::{
    CompletionCoordinator, CompletionState, FinishMode, PARTIAL_FINISH_FLOOR, Transition,
};
pub use engine::{SessionEngine, SessionUpdate};
pub use lock::SessionLockManager;
pub use progress::ProgressTracker;
pub use service::WorkoutSessionService;
pub use synthesis::{RecordSynthesizer, SynthesisOutcome, SynthesisRequest, build_set_records};
