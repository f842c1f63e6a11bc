//! Service facade wiring the store, journal, and aggregators together.
//!
//! `PlanService` exposes the transport-agnostic interface: fetch the current
//! day, submit a completion, read or refresh stats, sync a template, export
//! history. Completion reactions (journal append, next-day materialization,
//! stats resync) run here, after the transition, best-effort.

use crate::{
    completion::{self, CompletionOutcome, CompletionTarget},
    events::{CompletionRecorded, EventSink, JsonlJournal},
    export, last_completed_day, materializer,
    stats::{self, StatsParams},
    store::SyncOutcome,
    Config, DailyPlanEntry, Exercise, ExerciseResult, GroupKey, PlanStore, PlanTemplate,
    PlanType, Result, StatsRecord,
};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// How much history `fetch_current` returns alongside the next day
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchView {
    /// Just the next incomplete entry
    NextOnly,
    /// The next incomplete entry plus the most recently completed one
    WithLastCompleted,
    /// Every entry of the group, completed and pending
    Full,
}

/// The day-progression service over one data directory
pub struct PlanService {
    store: PlanStore,
    config: Config,
}

impl PlanService {
    pub fn new(config: Config) -> Self {
        let store = PlanStore::new(config.data.data_dir.clone());
        Self { store, config }
    }

    /// Build a service over an explicit data directory (CLI override, tests)
    pub fn with_data_dir(data_dir: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            store: PlanStore::new(data_dir),
            config,
        }
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    fn journal_path(&self) -> PathBuf {
        self.store.data_dir().join("journal").join("completions.jsonl")
    }

    fn journal_csv_path(&self) -> PathBuf {
        self.store.data_dir().join("completions.csv")
    }

    /// Materialize or re-sync a template for a group
    pub fn sync_plan(&self, template: &PlanTemplate, key: &GroupKey) -> Result<SyncOutcome> {
        materializer::materialize(&self.store, template, key)
    }

    /// Spread a flat exercise list over `days` days under the configured
    /// per-day minute cap
    pub fn distribute_template(
        &self,
        name: impl Into<String>,
        category: Option<String>,
        level: Option<String>,
        exercises: &[Exercise],
        days: u32,
    ) -> Result<PlanTemplate> {
        PlanTemplate::from_flat(
            name,
            category,
            level,
            exercises,
            days,
            self.config.distribution.daily_cap_minutes,
        )
    }

    /// The current view of a group: next incomplete day first, then whatever
    /// history the view asks for
    pub fn fetch_current(
        &self,
        key: &GroupKey,
        view: FetchView,
        template: Option<&PlanTemplate>,
    ) -> Result<Vec<DailyPlanEntry>> {
        let next = materializer::next_entry(&self.store, template, key)?;
        let entries = self.store.load_group(key)?;

        match view {
            FetchView::NextOnly => Ok(next.into_iter().collect()),
            FetchView::WithLastCompleted => {
                let last_completed = entries
                    .iter()
                    .filter(|e| e.is_completed)
                    .max_by_key(|e| e.day_number)
                    .cloned();
                Ok(next.into_iter().chain(last_completed).collect())
            }
            FetchView::Full => {
                let mut all = entries;
                if let Some(next) = next {
                    if next.transient {
                        all.push(next);
                    }
                }
                Ok(all)
            }
        }
    }

    /// Submit a day completion and run the post-completion reactions.
    ///
    /// The reactions never affect the returned outcome: a completion that
    /// committed stays committed even if the journal, the next-day
    /// materialization, or the stats resync fails.
    pub fn submit_completion(
        &self,
        user_id: &str,
        plan_type: PlanType,
        target: &CompletionTarget,
        results: &[ExerciseResult],
        template: Option<&PlanTemplate>,
    ) -> Result<CompletionOutcome> {
        let outcome = completion::submit_completion(
            &self.store,
            user_id,
            plan_type,
            target,
            results,
            template,
        )?;

        if !outcome.already_completed {
            self.react_to_completion(&outcome.entry, template);
        }

        Ok(outcome)
    }

    /// Best-effort reactions to a recorded completion
    fn react_to_completion(&self, entry: &DailyPlanEntry, template: Option<&PlanTemplate>) {
        let event = CompletionRecorded {
            entry_id: entry.id,
            user_id: entry.user_id.clone(),
            plan_type: entry.plan_type,
            source_plan_id: entry.source_plan_id.clone(),
            day_number: entry.day_number,
            completed_at: entry.completed_at.unwrap_or_else(Utc::now),
            workout_names: entry.workout_names(),
        };

        let mut journal = JsonlJournal::new(self.journal_path());
        if let Err(e) = journal.append(&event) {
            tracing::warn!("Failed to journal completion event: {}", e);
        }

        if let Some(template) = template {
            let key = GroupKey::new(
                event.user_id.clone(),
                event.source_plan_id.clone(),
                event.plan_type,
            );
            if let Err(e) = materializer::materialize_next(&self.store, template, &key) {
                tracing::warn!("Failed to materialize next day: {}", e);
            }
        }

        if let Err(e) = self.recompute_stats(&event.user_id, event.plan_type) {
            tracing::warn!("Failed to resync stats: {}", e);
        }
    }

    /// Read stats, recomputing from the completion history when asked to or
    /// when no cached record exists
    pub fn get_stats(
        &self,
        user_id: &str,
        plan_type: PlanType,
        refresh: bool,
    ) -> Result<StatsRecord> {
        if !refresh {
            if let Some(cached) = self.store.load_stats(user_id, plan_type)? {
                return Ok(cached);
            }
        }
        self.recompute_stats(user_id, plan_type)
    }

    fn recompute_stats(&self, user_id: &str, plan_type: PlanType) -> Result<StatsRecord> {
        let entries: Vec<DailyPlanEntry> = self
            .store
            .load_user_groups(user_id, Some(plan_type))?
            .into_iter()
            .flat_map(|(_, entries)| entries)
            .collect();

        let params = StatsParams::from(&self.config.stats);
        let record = stats::compute_stats(user_id, plan_type, &entries, &params, Utc::now());
        self.store.save_stats(&record)?;
        Ok(record)
    }

    /// Export a user's completed history (optionally one plan type) to CSV
    pub fn export_history(
        &self,
        user_id: &str,
        plan_type: Option<PlanType>,
        csv_path: &Path,
    ) -> Result<usize> {
        let entries: Vec<DailyPlanEntry> = self
            .store
            .load_user_groups(user_id, plan_type)?
            .into_iter()
            .flat_map(|(_, entries)| entries)
            .collect();

        export::export_completed(&entries, csv_path)
    }

    /// Roll the event journal into CSV, optionally cleaning processed files.
    ///
    /// Returns (events rolled up, processed files cleaned).
    pub fn rollup_journal(&self, cleanup: bool) -> Result<(usize, usize)> {
        let journal_path = self.journal_path();
        if !journal_path.exists() {
            return Ok((0, 0));
        }

        let rolled = export::journal_to_csv_and_archive(&journal_path, &self.journal_csv_path())?;
        let cleaned = if cleanup {
            export::cleanup_processed_journals(
                journal_path.parent().unwrap_or(self.store.data_dir()),
            )?
        } else {
            0
        };
        Ok((rolled, cleaned))
    }

    /// Count of days completed so far in a group
    pub fn completed_days(&self, key: &GroupKey) -> Result<u32> {
        Ok(last_completed_day(&self.store.load_group(key)?))
    }
}
