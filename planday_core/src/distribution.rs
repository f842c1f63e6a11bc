//! Deterministic exercise-to-day partitioning.
//!
//! Splits a flat exercise list into per-day subsets under a per-day minute
//! budget. Day *d* starts its rotation at offset `((d-1) * slots) % n`, so
//! successive days walk the pool evenly and every exercise is reached before
//! any is repeated.

use crate::{Error, Exercise, Result};

/// Per-day minute budget used when none is configured
pub const DEFAULT_DAILY_CAP_MINUTES: u32 = 80;

/// Slots per day given the average exercise length and the cap.
///
/// Two exercises fit a day when twice the average stays within the budget;
/// otherwise the day holds one.
pub fn slots_per_day(exercises: &[Exercise], cap_minutes: u32) -> usize {
    if exercises.is_empty() {
        return 1;
    }
    let total: u32 = exercises.iter().map(|e| e.minutes).sum();
    let avg = f64::from(total) / exercises.len() as f64;
    if avg * 2.0 <= f64::from(cap_minutes) {
        2
    } else {
        1
    }
}

/// Partition `exercises` across `days` days.
///
/// Guarantees:
/// - every day holds at least one exercise (even if it alone exceeds the cap)
/// - per-day minutes stay within the cap except for that single-oversized case
/// - each exercise is selected at least `floor(days * slots / n)` times, and
///   within a day no exercise repeats until the whole pool has been used
///
/// Deterministic: the same input always produces the same partition.
pub fn distribute(
    exercises: &[Exercise],
    days: u32,
    cap_minutes: u32,
) -> Result<Vec<Vec<Exercise>>> {
    if exercises.is_empty() {
        return Err(Error::Validation(
            "Cannot distribute an empty exercise list".into(),
        ));
    }
    if days == 0 {
        return Err(Error::Validation("Day count must be at least 1".into()));
    }

    let n = exercises.len();
    let slots = slots_per_day(exercises, cap_minutes);

    tracing::debug!(
        "Distributing {} exercises over {} days ({} slots/day, cap {} min)",
        n,
        days,
        slots,
        cap_minutes
    );

    let mut plan = Vec::with_capacity(days as usize);

    for day in 1..=days {
        let start = ((day as usize - 1) * slots) % n;
        let mut picked: Vec<usize> = Vec::with_capacity(slots);
        let mut minutes = 0u32;
        let mut cursor = start;

        for _ in 0..slots {
            // Next exercise not yet used today, skipping ahead with wraparound.
            // When the pool is exhausted (pool smaller than the slot count),
            // repeats are allowed.
            let idx = (0..n)
                .map(|step| (cursor + step) % n)
                .find(|i| !picked.contains(i))
                .unwrap_or(cursor % n);

            let candidate = &exercises[idx];
            if minutes + candidate.minutes > cap_minutes {
                if picked.is_empty() {
                    // Safety floor: every day gets at least one exercise
                    tracing::warn!(
                        "Exercise '{}' alone exceeds the {} minute cap on day {}",
                        candidate.name,
                        cap_minutes,
                        day
                    );
                } else {
                    break;
                }
            }

            minutes += candidate.minutes;
            picked.push(idx);
            cursor = (idx + 1) % n;
        }

        plan.push(picked.iter().map(|&i| exercises[i].clone()).collect());
    }

    Ok(plan)
}
