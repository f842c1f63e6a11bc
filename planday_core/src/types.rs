//! Core domain types for the day-progression system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Plan templates and their exercises
//! - Materialized daily plan entries and their completion state
//! - Completion submissions (per-exercise results)
//! - Derived stats (streaks, batch progress)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Plan Types
// ============================================================================

/// Origin of a plan: assigned by a trainer, built manually, or AI-authored
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Assigned,
    Manual,
    AiGenerated,
}

impl PlanType {
    /// Stable name used in file paths and CLI arguments
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Assigned => "assigned",
            PlanType::Manual => "manual",
            PlanType::AiGenerated => "ai_generated",
        }
    }

    /// Parse from a CLI-style string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "assigned" => Some(PlanType::Assigned),
            "manual" => Some(PlanType::Manual),
            "ai_generated" | "ai-generated" | "ai" => Some(PlanType::AiGenerated),
            _ => None,
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Exercise Types
// ============================================================================

/// Weight prescription: a fixed load or a min/max range
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WeightSpec {
    Fixed(f64),
    Range { min: f64, max: f64 },
}

/// A single exercise within a day's plan
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default)]
    pub weight: Option<WeightSpec>,
    pub minutes: u32,
    #[serde(default = "default_exercise_type_count")]
    pub exercise_type_count: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_exercise_type_count() -> u32 {
    1
}

/// Actuals submitted for one exercise at completion time.
///
/// Matching against the stored exercise uses `exercise_id` first, then
/// `index`, then `name` (in that priority).
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ExerciseResult {
    #[serde(default)]
    pub exercise_id: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sets: Option<u32>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub weight: Option<WeightSpec>,
    #[serde(default)]
    pub minutes: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// Template Types
// ============================================================================

/// One day of a plan template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateDay {
    pub exercises: Vec<Exercise>,
}

/// Externally supplied ordered per-day exercise schedule.
///
/// Owned by the Plan Provider; the core only reads it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanTemplate {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    pub days: Vec<TemplateDay>,
}

// ============================================================================
// Entry and Group Types
// ============================================================================

/// The sequencing scope: one ordered day sequence per key.
///
/// Day ordering is strictly per (user, source plan, plan type); overlapping
/// assignments for one user never share a sequence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub user_id: String,
    pub source_plan_id: String,
    pub plan_type: PlanType,
}

impl GroupKey {
    pub fn new(
        user_id: impl Into<String>,
        source_plan_id: impl Into<String>,
        plan_type: PlanType,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            source_plan_id: source_plan_id.into(),
            plan_type,
        }
    }
}

/// The materialized, per-user, per-day record tracking completion of one
/// day's exercises.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyPlanEntry {
    pub id: Uuid,
    pub user_id: String,
    pub day_number: u32,
    pub plan_type: PlanType,
    pub source_plan_id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(deserialize_with = "crate::payload::deserialize_exercises")]
    pub exercises: Vec<Exercise>,
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Synthesized on demand, never persisted
    #[serde(skip)]
    pub transient: bool,
}

impl DailyPlanEntry {
    /// Workout names for display and stats derivation
    pub fn workout_names(&self) -> Vec<String> {
        self.exercises.iter().map(|e| e.name.clone()).collect()
    }

    /// Total planned minutes for this day
    pub fn total_minutes(&self) -> u32 {
        self.exercises.iter().map(|e| e.minutes).sum()
    }
}

/// Highest completed day number in a group (0 when nothing is completed).
///
/// Because completion forms a contiguous prefix, this is also the count of
/// completed days.
pub fn last_completed_day(entries: &[DailyPlanEntry]) -> u32 {
    entries
        .iter()
        .filter(|e| e.is_completed)
        .map(|e| e.day_number)
        .max()
        .unwrap_or(0)
}

// ============================================================================
// Stats Types
// ============================================================================

/// Progress within one weekly or monthly workout-count batch
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BatchProgress {
    pub batch: u32,
    pub completed: u32,
    pub total: u32,
    pub remaining: u32,
}

/// Derived, continuously-overwritten progress summary per (user, plan type).
///
/// Purely derived from completed entries; recomputable at any time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsRecord {
    pub user_id: String,
    pub plan_type: PlanType,
    pub daily_workouts: BTreeMap<NaiveDate, Vec<String>>,
    pub total_workouts: u32,
    pub total_days: u32,
    pub longest_streak: u32,
    pub recent_workouts: Vec<String>,
    pub weekly_progress: BatchProgress,
    pub monthly_progress: BatchProgress,
    pub updated_at: DateTime<Utc>,
}

impl StatsRecord {
    /// Zeroed record for a user with no completion history
    pub fn empty(user_id: impl Into<String>, plan_type: PlanType, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            plan_type,
            daily_workouts: BTreeMap::new(),
            total_workouts: 0,
            total_days: 0,
            longest_streak: 0,
            recent_workouts: Vec::new(),
            weekly_progress: BatchProgress {
                batch: 0,
                completed: 0,
                total: 12,
                remaining: 12,
            },
            monthly_progress: BatchProgress {
                batch: 0,
                completed: 0,
                total: 30,
                remaining: 30,
            },
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u32, completed: bool) -> DailyPlanEntry {
        DailyPlanEntry {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            day_number: day,
            plan_type: PlanType::Assigned,
            source_plan_id: "p1".into(),
            category: None,
            level: None,
            exercises: vec![],
            is_completed: completed,
            completed_at: completed.then(Utc::now),
            transient: false,
        }
    }

    #[test]
    fn test_plan_type_roundtrip() {
        for pt in [PlanType::Assigned, PlanType::Manual, PlanType::AiGenerated] {
            assert_eq!(PlanType::parse(pt.as_str()), Some(pt));
        }
        assert_eq!(PlanType::parse("unknown"), None);
    }

    #[test]
    fn test_plan_type_serde_snake_case() {
        let json = serde_json::to_string(&PlanType::AiGenerated).unwrap();
        assert_eq!(json, "\"ai_generated\"");
    }

    #[test]
    fn test_weight_spec_untagged() {
        let fixed: WeightSpec = serde_json::from_str("40.0").unwrap();
        assert_eq!(fixed, WeightSpec::Fixed(40.0));

        let range: WeightSpec = serde_json::from_str(r#"{"min": 20.0, "max": 30.0}"#).unwrap();
        assert_eq!(range, WeightSpec::Range { min: 20.0, max: 30.0 });
    }

    #[test]
    fn test_last_completed_day() {
        assert_eq!(last_completed_day(&[]), 0);

        let entries = vec![entry(1, true), entry(2, true), entry(3, false)];
        assert_eq!(last_completed_day(&entries), 2);
    }

    #[test]
    fn test_empty_stats_batches() {
        let stats = StatsRecord::empty("u1", PlanType::Manual, Utc::now());
        assert_eq!(stats.weekly_progress.total, 12);
        assert_eq!(stats.monthly_progress.total, 30);
        assert_eq!(stats.longest_streak, 0);
    }
}
