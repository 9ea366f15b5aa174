#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod persistence;
pub mod sessions;
pub mod submission;

pub use workout_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, EngineError, SubmissionError};
pub use persistence::WriteQueue;
pub use sessions::{
    Celebration, CompletionState, FinishMode, PARTIAL_FINISH_FLOOR, SessionEngine, SessionUpdate,
    SynthesisOutcome, WorkoutSessionService,
};
pub use submission::{
    HttpSubmissionBackend, HttpSubmissionConfig, LocalSubmissionBackend, SubmissionBackend,
};
