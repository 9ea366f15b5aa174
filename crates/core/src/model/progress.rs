use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{ExerciseAssignment, ExerciseId};

/// Completed-set count for one exercise in the live session.
///
/// Entries only exist while `completed_sets > 0`; an exercise with no entry
/// has zero completed sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseProgress {
    pub exercise_id: ExerciseId,
    pub completed_sets: u32,
    pub is_completed: bool,
    pub last_updated: DateTime<Utc>,
}

impl ExerciseProgress {
    /// Build an entry with `completed_sets` clamped to `planned_sets`.
    #[must_use]
    pub fn new(
        exercise_id: ExerciseId,
        completed_sets: u32,
        planned_sets: u32,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let completed_sets = completed_sets.min(planned_sets);
        Self {
            exercise_id,
            completed_sets,
            is_completed: planned_sets > 0 && completed_sets >= planned_sets,
            last_updated,
        }
    }
}

/// Whole-number percentage of `done` over `total`, rounding halves up.
///
/// Returns 0 when `total` is 0.
#[must_use]
pub fn rounded_percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    let pct = (done * 200 + total) / (total * 2);
    u8::try_from(pct).unwrap_or(100)
}

/// Share of all planned sets of the day that are complete, 0..=100.
///
/// Completed counts above an exercise's plan are capped so one exercise can
/// never make up for another.
#[must_use]
pub fn overall_progress(
    exercises: &[ExerciseAssignment],
    completed: &HashMap<ExerciseId, ExerciseProgress>,
) -> u8 {
    let (done, total) = exercises.iter().fold((0_u64, 0_u64), |(done, total), e| {
        let sets = completed
            .get(&e.id)
            .map_or(0, |p| p.completed_sets.min(e.planned_sets));
        (done + u64::from(sets), total + u64::from(e.planned_sets))
    });
    rounded_percentage(done, total)
}

/// Percentage for a single exercise, used for per-row progress bars.
#[must_use]
pub fn exercise_percentage(exercise: &ExerciseAssignment, progress: Option<&ExerciseProgress>) -> u8 {
    let done = progress.map_or(0, |p| p.completed_sets);
    rounded_percentage(u64::from(done), u64::from(exercise.planned_sets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DayNumber;
    use crate::time::fixed_now;

    fn assignment(id: u64, planned_sets: u32) -> ExerciseAssignment {
        ExerciseAssignment::new(
            ExerciseId::new(id),
            DayNumber::new(1).unwrap(),
            planned_sets,
            "10",
        )
    }

    fn progress(id: u64, sets: u32, planned: u32) -> (ExerciseId, ExerciseProgress) {
        (
            ExerciseId::new(id),
            ExerciseProgress::new(ExerciseId::new(id), sets, planned, fixed_now()),
        )
    }

    #[test]
    fn two_exercises_aggregate_by_sets_not_by_exercise() {
        let exercises = vec![assignment(1, 4), assignment(2, 6)];
        let done: HashMap<_, _> = [progress(1, 2, 4), progress(2, 3, 6)].into_iter().collect();
        assert_eq!(overall_progress(&exercises, &done), 50);
    }

    #[test]
    fn empty_day_is_zero() {
        assert_eq!(overall_progress(&[], &HashMap::new()), 0);
        let exercises = vec![assignment(1, 0), assignment(2, 0)];
        assert_eq!(overall_progress(&exercises, &HashMap::new()), 0);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(rounded_percentage(1, 8), 13); // 12.5
        assert_eq!(rounded_percentage(1, 3), 33);
        assert_eq!(rounded_percentage(2, 3), 67);
        assert_eq!(rounded_percentage(3, 3), 100);
    }

    #[test]
    fn excess_sets_are_capped_per_exercise() {
        let exercises = vec![assignment(1, 2), assignment(2, 2)];
        let mut done = HashMap::new();
        done.insert(
            ExerciseId::new(1),
            ExerciseProgress {
                exercise_id: ExerciseId::new(1),
                completed_sets: 5,
                is_completed: true,
                last_updated: fixed_now(),
            },
        );
        assert_eq!(overall_progress(&exercises, &done), 50);
    }

    #[test]
    fn new_clamps_and_flags_completion() {
        let p = ExerciseProgress::new(ExerciseId::new(1), 9, 3, fixed_now());
        assert_eq!(p.completed_sets, 3);
        assert!(p.is_completed);

        let zero_plan = ExerciseProgress::new(ExerciseId::new(1), 1, 0, fixed_now());
        assert_eq!(zero_plan.completed_sets, 0);
        assert!(!zero_plan.is_completed);
    }

    #[test]
    fn exercise_percentage_handles_missing_entry() {
        let e = assignment(1, 4);
        assert_eq!(exercise_percentage(&e, None), 0);
        let (_, p) = progress(1, 3, 4);
        assert_eq!(exercise_percentage(&e, Some(&p)), 75);
    }
}
