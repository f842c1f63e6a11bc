//! The completion state machine.
//!
//! Each entry moves `Incomplete -> Completed` exactly once, and a group's
//! completions always form a contiguous prefix: day D may complete only when
//! D is the day after the last completed one (day 1 when nothing is
//! completed yet). Duplicate submissions are a success, not an error, so
//! mobile retries never surface failures or double-complete a day.
//!
//! The actual transition is a single conditional write inside the store's
//! group critical section; everything before it is advisory. Two different
//! days of one group can race past their sequencing pre-checks, but each
//! entry's own conditional write still admits exactly one winner, so no entry
//! is ever double-completed.

use crate::{
    last_completed_day, materializer, store::CasOutcome, DailyPlanEntry, Error, Exercise,
    ExerciseResult, GroupKey, PlanStore, PlanTemplate, PlanType, Result,
};
use chrono::Utc;
use uuid::Uuid;

/// How the caller identifies the entry to complete
#[derive(Clone, Debug)]
pub enum CompletionTarget {
    EntryId(Uuid),
    Position { source_plan_id: String, day: u32 },
}

/// Outcome of a completion submission
#[derive(Clone, Debug)]
pub struct CompletionOutcome {
    pub entry: DailyPlanEntry,
    /// True when the entry had already been completed by an earlier
    /// submission; `entry.completed_at` then echoes the original timestamp
    pub already_completed: bool,
}

/// Read-back attempts after a successful conditional write
const VERIFY_ATTEMPTS: u32 = 3;

/// Validate the group-level sequencing constraint
pub fn check_sequence(last_completed: u32, requested: u32) -> Result<()> {
    if requested == 0 {
        return Err(Error::Validation("Day numbers start at 1".into()));
    }
    if requested <= last_completed {
        return Err(Error::OrderViolation {
            last_completed,
            requested,
        });
    }
    if requested > last_completed + 1 {
        return Err(Error::SkippedDays {
            last_completed,
            requested,
        });
    }
    Ok(())
}

/// Merge submitted actuals into the stored exercise list.
///
/// Each result matches a stored exercise by explicit id, else by positional
/// index, else by name, in that priority. A result matching nothing fails
/// the whole submission before any state changes.
pub fn merge_results(
    stored: &[Exercise],
    results: &[ExerciseResult],
) -> Result<Vec<Exercise>> {
    let mut merged = stored.to_vec();

    for result in results {
        let idx = find_match(&merged, result).ok_or_else(|| {
            Error::ExerciseMatch(format!(
                "No stored exercise matches result (id: {:?}, index: {:?}, name: {:?})",
                result.exercise_id, result.index, result.name
            ))
        })?;

        let target = &mut merged[idx];
        if let Some(sets) = result.sets {
            target.sets = sets;
        }
        if let Some(reps) = result.reps {
            target.reps = reps;
        }
        if let Some(weight) = result.weight {
            target.weight = Some(weight);
        }
        if let Some(minutes) = result.minutes {
            target.minutes = minutes;
        }
        if let Some(ref notes) = result.notes {
            target.notes = Some(notes.clone());
        }
    }

    Ok(merged)
}

fn find_match(stored: &[Exercise], result: &ExerciseResult) -> Option<usize> {
    if let Some(ref id) = result.exercise_id {
        return stored.iter().position(|e| e.id.as_deref() == Some(id));
    }
    if let Some(index) = result.index {
        return (index < stored.len()).then_some(index);
    }
    if let Some(ref name) = result.name {
        return stored.iter().position(|e| &e.name == name);
    }
    None
}

/// Submit a completion for one day of one group.
///
/// When the target is a (source, day) position with no materialized entry and
/// a template is available, the day is lazily materialized first, but only
/// after the sequencing constraint passes; otherwise the submission fails
/// closed.
pub fn submit_completion(
    store: &PlanStore,
    user_id: &str,
    plan_type: PlanType,
    target: &CompletionTarget,
    results: &[ExerciseResult],
    template: Option<&PlanTemplate>,
) -> Result<CompletionOutcome> {
    let (key, day, entry) = resolve_target(store, user_id, plan_type, target, template)?;

    // Retries of an already-completed day short-circuit here
    if entry.is_completed {
        tracing::info!(
            "Day {} of plan {} already completed; idempotent response",
            day,
            key.source_plan_id
        );
        return Ok(CompletionOutcome {
            entry,
            already_completed: true,
        });
    }

    // Re-validate sequencing against the current group state. A concurrent
    // completion of a different day can still slip between this read and the
    // conditional write below; the write guards the entry, not the sequence.
    let current = store.load_group(&key)?;
    check_sequence(last_completed_day(&current), day)?;

    let merged = merge_results(&entry.exercises, results)?;

    let outcome = store.complete_entry(&key, day, &merged, Utc::now())?;
    let (completed_entry, already_completed) = match outcome {
        CasOutcome::Applied(e) => (e, false),
        // A concurrent duplicate won the write; resolve to idempotent success
        CasOutcome::AlreadyCompleted(e) => (e, true),
    };

    if !already_completed {
        verify_completed(store, &key, day);
    }

    Ok(CompletionOutcome {
        entry: completed_entry,
        already_completed,
    })
}

fn resolve_target(
    store: &PlanStore,
    user_id: &str,
    plan_type: PlanType,
    target: &CompletionTarget,
    template: Option<&PlanTemplate>,
) -> Result<(GroupKey, u32, DailyPlanEntry)> {
    match target {
        CompletionTarget::EntryId(id) => {
            let (key, entry) = store.find_entry(user_id, *id)?.ok_or_else(|| {
                Error::NotFound(format!("No entry {} for user {}", id, user_id))
            })?;
            Ok((key, entry.day_number, entry))
        }
        CompletionTarget::Position {
            source_plan_id,
            day,
        } => {
            let key = GroupKey::new(user_id, source_plan_id.clone(), plan_type);
            let entries = store.load_group(&key)?;

            if let Some(entry) = entries.iter().find(|e| e.day_number == *day) {
                return Ok((key, *day, entry.clone()));
            }

            // Absent entry: lazily materialize, but only when the sequencing
            // constraint would allow completing it
            let Some(template) = template else {
                return Err(Error::NotFound(format!(
                    "No entry for day {} in plan {} and no template to materialize from",
                    day, source_plan_id
                )));
            };
            check_sequence(last_completed_day(&entries), *day)?;

            let materialized =
                materializer::materialize_next(store, template, &key)?.ok_or_else(|| {
                    Error::NotFound(format!(
                        "Template '{}' has no day {}",
                        template.name, day
                    ))
                })?;
            if materialized.day_number != *day {
                return Err(Error::NotFound(format!(
                    "Template '{}' has no day {}",
                    template.name, day
                )));
            }
            Ok((key, *day, materialized))
        }
    }
}

/// Read back the flipped entry, retrying the read a bounded number of times.
///
/// A successful conditional write is authoritative; a read that momentarily
/// disagrees is retried, never the write.
fn verify_completed(store: &PlanStore, key: &GroupKey, day: u32) {
    for attempt in 1..=VERIFY_ATTEMPTS {
        match store.load_group(key) {
            Ok(entries) => {
                if entries
                    .iter()
                    .any(|e| e.day_number == day && e.is_completed)
                {
                    return;
                }
                tracing::debug!(
                    "Verify read {} of {} does not show day {} completed yet",
                    attempt,
                    VERIFY_ATTEMPTS,
                    day
                );
            }
            Err(e) => {
                tracing::debug!("Verify read {} failed: {}", attempt, e);
            }
        }
    }
    tracing::warn!(
        "Read-back never observed day {} completed; trusting the conditional write",
        day
    );
}
