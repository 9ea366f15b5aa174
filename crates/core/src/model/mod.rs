mod day;
mod exercise;
mod ids;
mod lock;
mod planned;
mod progress;
mod record;

pub use day::{DayError, DayNumber, MAX_DAY_NUMBER};
pub use exercise::{DayPlan, ExerciseAssignment};
pub use ids::{
    CategoryId, DayReference, ExerciseId, ParseIdError, SessionRecordId, TemplateId, UserId,
};
pub use lock::SessionLock;
pub use planned::{PlannedValue, leading_integer};
pub use progress::{ExerciseProgress, exercise_percentage, overall_progress, rounded_percentage};
pub use record::{PerSetRepLog, RecordError, SessionRecord, SessionSetRecord};
