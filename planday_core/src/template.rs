//! Plan template loading and the built-in sample plan.
//!
//! Templates are authored by the external Plan Provider and consumed here as
//! JSON files. A cached sample template backs the CLI demo flow and tests.

use crate::{distribution, Error, Exercise, PlanTemplate, Result, TemplateDay, WeightSpec};
use once_cell::sync::Lazy;
use std::path::Path;

/// Cached sample template - built once and reused across all operations
static SAMPLE_TEMPLATE: Lazy<PlanTemplate> = Lazy::new(build_sample_template_internal);

/// Get a reference to the cached sample template
pub fn get_sample_template() -> &'static PlanTemplate {
    &SAMPLE_TEMPLATE
}

/// Build the sample template from scratch
///
/// **Note**: For production use, prefer `get_sample_template()` which returns
/// a cached reference. This function is retained for testing.
pub fn build_sample_template() -> PlanTemplate {
    build_sample_template_internal()
}

impl PlanTemplate {
    /// Validate the template, returning a list of problems (empty when valid)
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Template name is empty".into());
        }
        if self.days.is_empty() {
            errors.push("Template has no days".into());
        }
        if self.days.iter().all(|d| d.exercises.is_empty()) && !self.days.is_empty() {
            errors.push("Every template day is empty".into());
        }

        for (i, day) in self.days.iter().enumerate() {
            for ex in &day.exercises {
                if ex.name.trim().is_empty() {
                    errors.push(format!("Day {}: exercise with empty name", i + 1));
                }
                if ex.minutes == 0 {
                    errors.push(format!(
                        "Day {}: exercise '{}' has zero minutes",
                        i + 1,
                        ex.name
                    ));
                }
            }
        }

        errors
    }

    /// Build a template by distributing a flat exercise list over `days` days
    pub fn from_flat(
        name: impl Into<String>,
        category: Option<String>,
        level: Option<String>,
        exercises: &[Exercise],
        days: u32,
        cap_minutes: u32,
    ) -> Result<Self> {
        let subsets = distribution::distribute(exercises, days, cap_minutes)?;
        Ok(PlanTemplate {
            name: name.into(),
            category,
            level,
            days: subsets
                .into_iter()
                .map(|exercises| TemplateDay { exercises })
                .collect(),
        })
    }
}

/// Load a plan template from a JSON file
///
/// A missing file is NotFound; unparseable content is a Validation error so
/// callers can distinguish "no plan yet" from "broken plan".
pub fn load_template(path: &Path) -> Result<PlanTemplate> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "No template file at {}",
            path.display()
        )));
    }

    let contents = std::fs::read_to_string(path)?;
    let template: PlanTemplate = serde_json::from_str(&contents)
        .map_err(|e| Error::Validation(format!("Malformed template {}: {}", path.display(), e)))?;

    let errors = template.validate();
    if !errors.is_empty() {
        return Err(Error::Validation(format!(
            "Invalid template {}: {}",
            path.display(),
            errors.join("; ")
        )));
    }

    tracing::info!(
        "Loaded template '{}' ({} days) from {:?}",
        template.name,
        template.days.len(),
        path
    );
    Ok(template)
}

fn sample_exercise(
    id: &str,
    name: &str,
    sets: u32,
    reps: u32,
    weight: Option<WeightSpec>,
    minutes: u32,
) -> Exercise {
    Exercise {
        id: Some(id.into()),
        name: name.into(),
        sets,
        reps,
        weight,
        minutes,
        exercise_type_count: 1,
        notes: None,
    }
}

fn build_sample_template_internal() -> PlanTemplate {
    let exercises = vec![
        sample_exercise("goblet_squat", "Goblet Squat", 4, 10, Some(WeightSpec::Fixed(16.0)), 25),
        sample_exercise("bench_press", "Bench Press", 4, 8, Some(WeightSpec::Range { min: 40.0, max: 60.0 }), 30),
        sample_exercise("deadlift", "Deadlift", 3, 5, Some(WeightSpec::Range { min: 60.0, max: 100.0 }), 30),
        sample_exercise("plank", "Plank", 3, 1, None, 10),
        sample_exercise("row_machine", "Seated Row", 4, 12, Some(WeightSpec::Fixed(35.0)), 25),
        sample_exercise("lunges", "Walking Lunges", 3, 20, None, 20),
        sample_exercise("shoulder_press", "Shoulder Press", 4, 10, Some(WeightSpec::Fixed(20.0)), 25),
        sample_exercise("pull_up", "Pull-up", 4, 6, None, 15),
    ];

    // 10 days at the default cap exercises the same partitioner the
    // provider-facing path uses
    PlanTemplate::from_flat(
        "Sample Strength Block",
        Some("strength".into()),
        Some("intermediate".into()),
        &exercises,
        10,
        distribution::DEFAULT_DAILY_CAP_MINUTES,
    )
    .expect("sample template inputs are valid")
}
