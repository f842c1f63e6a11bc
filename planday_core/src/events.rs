//! Completion event journal.
//!
//! Every recorded completion appends a `CompletionRecorded` event to a JSONL
//! (JSON Lines) file with file locking. The journal is an audit trail and the
//! input to CSV archival; the post-completion reactions (next-day
//! materialization, stats resync) key off the same event.

use crate::{PlanType, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Domain event: one day of one plan was completed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRecorded {
    pub entry_id: Uuid,
    pub user_id: String,
    pub plan_type: PlanType,
    pub source_plan_id: String,
    pub day_number: u32,
    pub completed_at: DateTime<Utc>,
    pub workout_names: Vec<String>,
}

/// Event sink trait for persisting completion events
pub trait EventSink {
    fn append(&mut self, event: &CompletionRecorded) -> Result<()>;
}

/// JSONL-based event sink with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a new journal sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl EventSink for JsonlJournal {
    fn append(&mut self, event: &CompletionRecorded) -> Result<()> {
        self.ensure_parent_dir()?;

        // Open file for appending
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        // Write event as JSON line
        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(event)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!(
            "Journaled completion of day {} for {}",
            event.day_number,
            event.user_id
        );
        Ok(())
    }
}

/// Read all events from a journal file.
///
/// Malformed lines are skipped with a warning so one bad write never hides
/// the rest of the history.
pub fn read_events(path: &Path) -> Result<Vec<CompletionRecorded>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut events = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<CompletionRecorded>(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!("Failed to parse event at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} events from journal", events.len());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_event(day: u32) -> CompletionRecorded {
        CompletionRecorded {
            entry_id: Uuid::new_v4(),
            user_id: "u1".into(),
            plan_type: PlanType::Assigned,
            source_plan_id: "plan-1".into(),
            day_number: day,
            completed_at: Utc::now(),
            workout_names: vec!["Squat".into(), "Bench Press".into()],
        }
    }

    #[test]
    fn test_append_and_read_single_event() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("completions.jsonl");

        let event = test_event(1);
        let entry_id = event.entry_id;

        let mut journal = JsonlJournal::new(&path);
        journal.append(&event).unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entry_id, entry_id);
        assert_eq!(events[0].day_number, 1);
    }

    #[test]
    fn test_append_multiple_events() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("completions.jsonl");

        let mut journal = JsonlJournal::new(&path);
        for day in 1..=5 {
            journal.append(&test_event(day)).unwrap();
        }

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[4].day_number, 5);
    }

    #[test]
    fn test_read_missing_journal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let events = read_events(&temp_dir.path().join("nonexistent.jsonl")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_malformed_line_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("completions.jsonl");

        let mut journal = JsonlJournal::new(&path);
        journal.append(&test_event(1)).unwrap();

        // Corrupt the middle of the file
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("{ broken json\n");
        std::fs::write(&path, contents).unwrap();
        journal.append(&test_event(2)).unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].day_number, 2);
    }
}
