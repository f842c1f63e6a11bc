//! Serialization adapter for stored exercise payloads.
//!
//! Historical data stores the exercise list in three shapes: a bare array,
//! `{"workouts": [...]}`, or `{"exercises": [...]}`. All reads normalize to
//! a plain `Vec<Exercise>` here so business logic never branches on shape;
//! writes always produce the bare-array form.

use crate::Exercise;
use serde::{Deserialize, Deserializer};

/// Accepted on-disk shapes for an exercise list
#[derive(Deserialize)]
#[serde(untagged)]
enum ExercisePayload {
    Bare(Vec<Exercise>),
    Workouts { workouts: Vec<Exercise> },
    Exercises { exercises: Vec<Exercise> },
}

impl From<ExercisePayload> for Vec<Exercise> {
    fn from(payload: ExercisePayload) -> Self {
        match payload {
            ExercisePayload::Bare(list) => list,
            ExercisePayload::Workouts { workouts } => workouts,
            ExercisePayload::Exercises { exercises } => exercises,
        }
    }
}

/// Deserialize any accepted payload shape into the canonical list
pub fn deserialize_exercises<'de, D>(deserializer: D) -> Result<Vec<Exercise>, D::Error>
where
    D: Deserializer<'de>,
{
    let payload = ExercisePayload::deserialize(deserializer)?;
    Ok(payload.into())
}
