//! Derives the denormalized progress read-model from completion history.
//!
//! `compute_stats` is a pure function of the completed entries it is given:
//! identical history always yields an identical record, so a full recompute
//! after any data repair is always safe. Rolling windows anchor on the most
//! recent completion date rather than wall-clock time for the same reason.

use crate::{config::StatsConfig, BatchProgress, DailyPlanEntry, PlanType, StatsRecord};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Tunables for stats derivation
#[derive(Clone, Copy, Debug)]
pub struct StatsParams {
    /// Workout names recorded per date in the daily map
    pub slots_per_day: usize,
    /// Distinct completion dates feeding the recent-workouts list
    pub recent_dates: usize,
    /// Length of the weekly rolling window in days
    pub window_days: i64,
}

impl Default for StatsParams {
    fn default() -> Self {
        Self {
            slots_per_day: 2,
            recent_dates: 6,
            window_days: 7,
        }
    }
}

impl From<&StatsConfig> for StatsParams {
    fn from(cfg: &StatsConfig) -> Self {
        Self {
            slots_per_day: cfg.slots_per_day,
            recent_dates: cfg.recent_dates,
            window_days: cfg.window_days,
        }
    }
}

/// Weekly batch sizes: 12, 24, 34, 44, ...
fn weekly_batch_total(batch: u32) -> u32 {
    if batch == 0 {
        12
    } else {
        14 + 10 * batch
    }
}

/// Recompute the stats record for one (user, plan type) from its completed
/// entries. Incomplete entries are ignored.
pub fn compute_stats(
    user_id: &str,
    plan_type: PlanType,
    entries: &[DailyPlanEntry],
    params: &StatsParams,
    now: DateTime<Utc>,
) -> StatsRecord {
    let mut completed: Vec<&DailyPlanEntry> = entries
        .iter()
        .filter(|e| e.is_completed && e.completed_at.is_some())
        .collect();
    completed.sort_by_key(|e| (e.completed_at, e.day_number));

    if completed.is_empty() {
        return StatsRecord::empty(user_id, plan_type, now);
    }

    // date -> workout names; the first entry completed on a date wins
    let mut daily_workouts: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
    for entry in &completed {
        let Some(completed_at) = entry.completed_at else {
            continue;
        };
        let date = completed_at.date_naive();
        daily_workouts.entry(date).or_insert_with(|| {
            entry
                .workout_names()
                .into_iter()
                .take(params.slots_per_day)
                .collect()
        });
    }

    let dates: Vec<NaiveDate> = daily_workouts.keys().copied().collect();
    let Some(&anchor) = dates.last() else {
        return StatsRecord::empty(user_id, plan_type, now);
    };

    let longest_streak = longest_streak(&dates);

    let recent_workouts: Vec<String> = dates
        .iter()
        .rev()
        .take(params.recent_dates)
        .flat_map(|d| daily_workouts[d].clone())
        .collect();

    let weekly_progress = weekly_progress(&daily_workouts, anchor, params.window_days);
    let monthly_progress = monthly_progress(&dates, anchor);

    let total_workouts = daily_workouts.values().map(|v| v.len() as u32).sum();

    StatsRecord {
        user_id: user_id.into(),
        plan_type,
        total_workouts,
        total_days: completed.len() as u32,
        longest_streak,
        recent_workouts,
        weekly_progress,
        monthly_progress,
        daily_workouts,
        updated_at: now,
    }
}

/// Longest run of consecutive dates. A gap of exactly one day extends the
/// streak; any other gap resets it to 1.
fn longest_streak(sorted_dates: &[NaiveDate]) -> u32 {
    let mut longest = 0u32;
    let mut current = 0u32;
    let mut prev: Option<NaiveDate> = None;

    for &date in sorted_dates {
        current = match prev {
            Some(p) if date - p == Duration::days(1) => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        prev = Some(date);
    }

    longest
}

fn weekly_progress(
    daily_workouts: &BTreeMap<NaiveDate, Vec<String>>,
    anchor: NaiveDate,
    window_days: i64,
) -> BatchProgress {
    let window_start = anchor - Duration::days(window_days - 1);
    let in_window: Vec<&NaiveDate> = daily_workouts
        .keys()
        .filter(|d| **d >= window_start)
        .collect();

    let unique_days = in_window.len() as u32;
    let completed: u32 = in_window
        .iter()
        .map(|d| daily_workouts[*d].len() as u32)
        .sum();

    let mut batch = unique_days / 6;
    // Report the next batch once the active one is filled
    while completed >= weekly_batch_total(batch) {
        batch += 1;
    }
    let total = weekly_batch_total(batch);

    BatchProgress {
        batch,
        completed,
        total,
        remaining: total - completed,
    }
}

fn monthly_progress(dates: &[NaiveDate], anchor: NaiveDate) -> BatchProgress {
    let completed = dates
        .iter()
        .filter(|d| d.year() == anchor.year() && d.month() == anchor.month())
        .count() as u32;

    let batch = completed / 30;
    let total = 30 * (batch + 1);

    BatchProgress {
        batch,
        completed,
        total,
        remaining: total - completed,
    }
}
