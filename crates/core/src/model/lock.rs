use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DayNumber, TemplateId};

/// Marks a `(template, day)` session as in progress.
///
/// At most one lock may exist per template at a time; `started_at` becomes
/// the start time of the session record when the day is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLock {
    pub template_id: TemplateId,
    pub day_number: DayNumber,
    pub started_at: DateTime<Utc>,
}

impl SessionLock {
    #[must_use]
    pub fn new(template_id: TemplateId, day_number: DayNumber, started_at: DateTime<Utc>) -> Self {
        Self {
            template_id,
            day_number,
            started_at,
        }
    }
}
