use crate::models::{GoalType, StudyGoal};

/// One pending store write produced by a `record` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub goal_id: String,
    pub progress: u32,
}

/// Everything one recorded activity changed: `updates` drives persistence
/// (one write per advanced goal), `completed` drives notifications.
#[derive(Debug, Clone, Default)]
pub struct RecordOutcome {
    pub updates: Vec<ProgressUpdate>,
    pub completed: Vec<StudyGoal>,
}

/// Applies one reported activity to the goal collection.
///
/// Every goal whose type matches advances by exactly 1 (a one-to-many
/// broadcast); other goals are untouched. A completion fires exactly when the
/// increment crosses the target, judged against the progress value *before*
/// the increment, so goals already at or past their target never re-fire.
/// When several goals cross in the same call, all of them appear in
/// `completed` — none is dropped.
pub fn record(goals: &mut [StudyGoal], activity: GoalType) -> RecordOutcome {
    let mut outcome = RecordOutcome::default();

    for goal in goals.iter_mut() {
        if goal.goal_type != activity {
            continue;
        }

        let previous = goal.progress;
        goal.progress += 1;

        outcome.updates.push(ProgressUpdate { goal_id: goal.id.clone(), progress: goal.progress });
        if previous < goal.target && goal.progress >= goal.target {
            outcome.completed.push(goal.clone());
        }
    }

    outcome
}
