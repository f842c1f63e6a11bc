//! Lazy creation and sync of per-day entries from a plan template.
//!
//! Entries exist on demand: the first sync bulk-creates the whole plan, later
//! syncs only touch days above the last completed day, and `next_entry` can
//! synthesize an unsaved entry when the materialized horizon runs out before
//! the template does.

use crate::{
    last_completed_day, store::SyncOutcome, DailyPlanEntry, Error, GroupKey, PlanStore,
    PlanTemplate, Result,
};
use uuid::Uuid;

/// Convert a template into a fully numbered entry list for one group.
///
/// Template days with no exercises are skipped with a warning and do not
/// consume a day number, so materialized numbering stays gapless.
pub fn build_entries(template: &PlanTemplate, key: &GroupKey) -> Result<Vec<DailyPlanEntry>> {
    let errors = template.validate();
    if !errors.is_empty() {
        return Err(Error::Validation(format!(
            "Invalid template '{}': {}",
            template.name,
            errors.join("; ")
        )));
    }

    let mut entries = Vec::with_capacity(template.days.len());
    let mut day_number = 0u32;

    for (i, day) in template.days.iter().enumerate() {
        if day.exercises.is_empty() {
            tracing::warn!(
                "Template '{}' day {} has no exercises; skipping",
                template.name,
                i + 1
            );
            continue;
        }

        day_number += 1;
        entries.push(DailyPlanEntry {
            id: Uuid::new_v4(),
            user_id: key.user_id.clone(),
            day_number,
            plan_type: key.plan_type,
            source_plan_id: key.source_plan_id.clone(),
            category: template.category.clone(),
            level: template.level.clone(),
            exercises: day.exercises.clone(),
            is_completed: false,
            completed_at: None,
            transient: false,
        });
    }

    Ok(entries)
}

/// Materialize (or re-sync) a template into the store.
///
/// First call for a group bulk-creates every day; later calls re-read the
/// template and only insert or replace entries above the last completed day.
pub fn materialize(
    store: &PlanStore,
    template: &PlanTemplate,
    key: &GroupKey,
) -> Result<SyncOutcome> {
    let entries = build_entries(template, key)?;
    let outcome = store.apply_above_boundary(key, &entries)?;

    tracing::info!(
        "Synced template '{}' for {}: {} inserted, {} replaced, {} pruned (boundary day {})",
        template.name,
        key.user_id,
        outcome.inserted,
        outcome.replaced,
        outcome.pruned,
        outcome.boundary
    );
    Ok(outcome)
}

/// Persist the single day after the completion boundary if it is missing.
///
/// Idempotent: re-running after the day exists returns the stored entry
/// unchanged. Returns None when the template has no further days.
pub fn materialize_next(
    store: &PlanStore,
    template: &PlanTemplate,
    key: &GroupKey,
) -> Result<Option<DailyPlanEntry>> {
    let candidates = build_entries(template, key)?;

    store.with_group(key, |entries| {
        let next_day = last_completed_day(entries) + 1;

        if let Some(existing) = entries.iter().find(|e| e.day_number == next_day) {
            return Ok((Some(existing.clone()), false));
        }

        match candidates.into_iter().find(|c| c.day_number == next_day) {
            Some(candidate) => {
                tracing::debug!(
                    "Lazily materialized day {} for {}",
                    next_day,
                    key.user_id
                );
                entries.push(candidate.clone());
                Ok((Some(candidate), true))
            }
            None => Ok((None, false)),
        }
    })
}

/// The lowest-numbered incomplete entry for a group.
///
/// When nothing incomplete is materialized but the template still has days,
/// the entry for the next day is synthesized without persisting and flagged
/// transient.
pub fn next_entry(
    store: &PlanStore,
    template: Option<&PlanTemplate>,
    key: &GroupKey,
) -> Result<Option<DailyPlanEntry>> {
    let entries = store.load_group(key)?;

    if let Some(next) = entries
        .iter()
        .filter(|e| !e.is_completed)
        .min_by_key(|e| e.day_number)
    {
        return Ok(Some(next.clone()));
    }

    let Some(template) = template else {
        return Ok(None);
    };

    let next_day = last_completed_day(&entries) + 1;
    let mut candidates = build_entries(template, key)?;
    Ok(candidates
        .iter_mut()
        .find(|c| c.day_number == next_day)
        .map(|c| {
            c.transient = true;
            c.clone()
        }))
}
