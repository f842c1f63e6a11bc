//! CSV export of completion history and journal archival.
//!
//! Two consumers: `export_completed` writes a fresh CSV snapshot of completed
//! entries for external analysis, and `journal_to_csv_and_archive` rolls the
//! JSONL event journal into an append-only CSV with atomic archival of the
//! processed journal.

use crate::{events::CompletionRecorded, DailyPlanEntry, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    entry_id: String,
    user_id: String,
    plan_type: String,
    source_plan_id: String,
    day_number: u32,
    completed_at: String,
    workouts: String,
    total_minutes: Option<u32>,
}

impl From<&DailyPlanEntry> for CsvRow {
    fn from(entry: &DailyPlanEntry) -> Self {
        CsvRow {
            entry_id: entry.id.to_string(),
            user_id: entry.user_id.clone(),
            plan_type: entry.plan_type.to_string(),
            source_plan_id: entry.source_plan_id.clone(),
            day_number: entry.day_number,
            completed_at: entry
                .completed_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            workouts: entry.workout_names().join("; "),
            total_minutes: Some(entry.total_minutes()),
        }
    }
}

impl From<&CompletionRecorded> for CsvRow {
    fn from(event: &CompletionRecorded) -> Self {
        CsvRow {
            entry_id: event.entry_id.to_string(),
            user_id: event.user_id.clone(),
            plan_type: event.plan_type.to_string(),
            source_plan_id: event.source_plan_id.clone(),
            day_number: event.day_number,
            completed_at: event.completed_at.to_rfc3339(),
            workouts: event.workout_names.join("; "),
            // Events do not carry planned minutes
            total_minutes: None,
        }
    }
}

/// Write a fresh CSV snapshot of the given entries' completed subset.
///
/// Returns the number of rows written. The output file is replaced, not
/// appended.
pub fn export_completed(entries: &[DailyPlanEntry], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(csv_path)?;
    let mut count = 0;

    for entry in entries.iter().filter(|e| e.is_completed) {
        writer.serialize(CsvRow::from(entry))?;
        count += 1;
    }

    writer.flush()?;
    tracing::info!("Exported {} completed entries to {:?}", count, csv_path);
    Ok(count)
}

/// Roll up journal events into CSV and archive the journal atomically.
///
/// This function:
/// 1. Reads all events from the journal
/// 2. Appends them to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Renames the journal to .processed
/// 5. Returns the number of events processed
///
/// # Safety
/// - CSV is fsynced before the journal is renamed
/// - The journal is renamed (not deleted) to allow manual recovery if needed
pub fn journal_to_csv_and_archive(journal_path: &Path, csv_path: &Path) -> Result<usize> {
    let events = crate::events::read_events(journal_path)?;

    if events.is_empty() {
        tracing::info!("No events in journal to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Skip headers when appending to an existing file
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for event in &events {
        writer.serialize(CsvRow::from(event))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} events to CSV", events.len());

    let processed_path = journal_path.with_extension("jsonl.processed");
    std::fs::rename(journal_path, &processed_path)?;

    tracing::info!("Archived journal to {:?}", processed_path);

    Ok(events.len())
}

/// Clean up old processed journal files in the given directory
pub fn cleanup_processed_journals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(extension) = path.extension() {
            if extension == "processed" {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed processed journal: {:?}", path);
                count += 1;
            }
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed journal files", count);
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSink, JsonlJournal};
    use crate::{Exercise, PlanType};
    use chrono::Utc;
    use std::fs::File;
    use uuid::Uuid;

    fn completed_entry(day: u32) -> DailyPlanEntry {
        DailyPlanEntry {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            day_number: day,
            plan_type: PlanType::Manual,
            source_plan_id: "p1".into(),
            category: None,
            level: None,
            exercises: vec![Exercise {
                id: None,
                name: "Squat".into(),
                sets: 3,
                reps: 10,
                weight: None,
                minutes: 25,
                exercise_type_count: 1,
                notes: None,
            }],
            is_completed: true,
            completed_at: Some(Utc::now()),
            transient: false,
        }
    }

    fn test_event(day: u32) -> CompletionRecorded {
        CompletionRecorded {
            entry_id: Uuid::new_v4(),
            user_id: "u1".into(),
            plan_type: PlanType::Manual,
            source_plan_id: "p1".into(),
            day_number: day,
            completed_at: Utc::now(),
            workout_names: vec!["Squat".into()],
        }
    }

    #[test]
    fn test_export_completed_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("history.csv");

        let mut incomplete = completed_entry(3);
        incomplete.is_completed = false;
        incomplete.completed_at = None;

        let entries = vec![completed_entry(1), completed_entry(2), incomplete];
        let count = export_completed(&entries, &csv_path).unwrap();
        assert_eq!(count, 2);

        let reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(reader.into_records().count(), 2);
    }

    #[test]
    fn test_journal_rollup_creates_csv_and_archives() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("completions.jsonl");
        let csv_path = temp_dir.path().join("completions.csv");

        let mut journal = JsonlJournal::new(&journal_path);
        for day in 1..=3 {
            journal.append(&test_event(day)).unwrap();
        }

        let count = journal_to_csv_and_archive(&journal_path, &csv_path).unwrap();
        assert_eq!(count, 3);

        assert!(csv_path.exists());
        assert!(!journal_path.exists());
        assert!(journal_path.with_extension("jsonl.processed").exists());
    }

    #[test]
    fn test_journal_rollup_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("completions.jsonl");
        let csv_path = temp_dir.path().join("completions.csv");

        let mut journal = JsonlJournal::new(&journal_path);
        journal.append(&test_event(1)).unwrap();
        assert_eq!(journal_to_csv_and_archive(&journal_path, &csv_path).unwrap(), 1);

        let mut journal = JsonlJournal::new(&journal_path);
        journal.append(&test_event(2)).unwrap();
        assert_eq!(journal_to_csv_and_archive(&journal_path, &csv_path).unwrap(), 1);

        let reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(reader.into_records().count(), 2);
    }

    #[test]
    fn test_empty_journal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("empty.jsonl");
        let csv_path = temp_dir.path().join("completions.csv");

        File::create(&journal_path).unwrap();

        let count = journal_to_csv_and_archive(&journal_path, &csv_path).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_cleanup_processed_journals() {
        let temp_dir = tempfile::tempdir().unwrap();

        File::create(temp_dir.path().join("a.jsonl.processed")).unwrap();
        File::create(temp_dir.path().join("b.jsonl.processed")).unwrap();
        File::create(temp_dir.path().join("keep.jsonl")).unwrap();

        let count = cleanup_processed_journals(temp_dir.path()).unwrap();
        assert_eq!(count, 2);

        assert!(!temp_dir.path().join("a.jsonl.processed").exists());
        assert!(temp_dir.path().join("keep.jsonl").exists());
    }
}
