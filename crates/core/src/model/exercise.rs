use serde::{Deserialize, Serialize};

use crate::model::{CategoryId, DayNumber, DayReference, ExerciseId, PlannedValue, TemplateId};

/// One prescribed exercise of a routine day, as served by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseAssignment {
    pub id: ExerciseId,
    pub day_number: DayNumber,
    pub planned_sets: u32,
    pub planned_value: PlannedValue,
    pub category_id: Option<CategoryId>,
}

impl ExerciseAssignment {
    #[must_use]
    pub fn new(
        id: ExerciseId,
        day_number: DayNumber,
        planned_sets: u32,
        planned_value: impl Into<PlannedValue>,
    ) -> Self {
        Self {
            id,
            day_number,
            planned_sets,
            planned_value: planned_value.into(),
            category_id: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// The ordered exercise list for one `(template, day)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPlan {
    pub template_id: TemplateId,
    pub day_number: DayNumber,
    /// Backend id of the day; session records cannot be filed without it.
    pub day_reference: Option<DayReference>,
    pub exercises: Vec<ExerciseAssignment>,
}

impl DayPlan {
    #[must_use]
    pub fn total_planned_sets(&self) -> u64 {
        self.exercises
            .iter()
            .map(|exercise| u64::from(exercise.planned_sets))
            .sum()
    }

    #[must_use]
    pub fn exercise(&self, id: ExerciseId) -> Option<&ExerciseAssignment> {
        self.exercises.iter().find(|exercise| exercise.id == id)
    }
}
