//! Entry and stats persistence with file locking.
//!
//! One JSON document per (user, source plan, plan type) group of entries and
//! one per (user, plan type) stats record. Writes go through a temp file and
//! an atomic rename; a sidecar lock file serializes read-modify-write cycles
//! on a group, so the conditional completion flip inside that critical
//! section behaves as a compare-and-swap.

use crate::{
    last_completed_day, DailyPlanEntry, Error, GroupKey, PlanType, Result, StatsRecord,
};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// On-disk document for one entry group
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupDocument {
    pub user_id: String,
    pub source_plan_id: String,
    pub plan_type: PlanType,
    pub entries: Vec<DailyPlanEntry>,
}

/// Result of the conditional completion write
#[derive(Clone, Debug)]
pub enum CasOutcome {
    /// This caller flipped the entry
    Applied(DailyPlanEntry),
    /// The entry was already completed; the stored entry is echoed back
    AlreadyCompleted(DailyPlanEntry),
}

impl CasOutcome {
    pub fn entry(&self) -> &DailyPlanEntry {
        match self {
            CasOutcome::Applied(e) | CasOutcome::AlreadyCompleted(e) => e,
        }
    }
}

/// What a materialization sync changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub inserted: usize,
    pub replaced: usize,
    pub pruned: usize,
    /// Last completed day at sync time; entries at or below were untouched
    pub boundary: u32,
}

impl SyncOutcome {
    pub fn changed(&self) -> usize {
        self.inserted + self.replaced + self.pruned
    }
}

/// File-backed store for plan entries and stats records
pub struct PlanStore {
    data_dir: PathBuf,
}

impl PlanStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn group_path(&self, key: &GroupKey) -> PathBuf {
        self.data_dir
            .join("plans")
            .join(sanitize(&key.user_id))
            .join(format!(
                "{}__{}.json",
                key.plan_type.as_str(),
                sanitize(&key.source_plan_id)
            ))
    }

    fn stats_path(&self, user_id: &str, plan_type: PlanType) -> PathBuf {
        self.data_dir.join("stats").join(format!(
            "{}__{}.json",
            sanitize(user_id),
            plan_type.as_str()
        ))
    }

    /// Load a group's entries with shared locking
    ///
    /// A missing file is an empty group. A corrupt file is an error: entry
    /// documents carry completion state and must never be silently reset.
    pub fn load_group(&self, key: &GroupKey) -> Result<Vec<DailyPlanEntry>> {
        let path = self.group_path(key);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read_result = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read_result?;

        let doc: GroupDocument = serde_json::from_str(&contents).map_err(|e| {
            Error::Store(format!("Corrupt group file {}: {}", path.display(), e))
        })?;

        tracing::debug!("Loaded {} entries from {:?}", doc.entries.len(), path);
        Ok(doc.entries)
    }

    fn write_group_unlocked(&self, key: &GroupKey, entries: &[DailyPlanEntry]) -> Result<()> {
        let path = self.group_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let doc = GroupDocument {
            user_id: key.user_id.clone(),
            source_plan_id: key.source_plan_id.clone(),
            plan_type: key.plan_type,
            entries: entries.to_vec(),
        };

        // Unique temp file in the same directory for atomic rename
        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "group path missing parent")
        })?)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(&doc)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} entries to {:?}", doc.entries.len(), path);
        Ok(())
    }

    /// Run a read-modify-write cycle on a group under an exclusive lock.
    ///
    /// The closure returns the result plus a dirty flag; the document is only
    /// rewritten when dirty. The sidecar lock file survives the atomic rename
    /// of the document itself, so concurrent callers fully serialize here.
    pub fn with_group<T, F>(&self, key: &GroupKey, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<DailyPlanEntry>) -> Result<(T, bool)>,
    {
        let path = self.group_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension("json.lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock.lock_exclusive()?;

        let result = (|| {
            let mut entries = self.load_group(key)?;
            let (out, dirty) = f(&mut entries)?;
            if dirty {
                entries.sort_by_key(|e| e.day_number);
                self.write_group_unlocked(key, &entries)?;
            }
            Ok(out)
        })();

        lock.unlock()?;
        result
    }

    /// The conditional completion write.
    ///
    /// Flips `is_completed` false -> true and sets `completed_at` only if the
    /// stored entry is still incomplete. A concurrent loser observes the
    /// already-completed entry instead of an error, which is what makes
    /// duplicate submissions idempotent.
    pub fn complete_entry(
        &self,
        key: &GroupKey,
        day_number: u32,
        merged_exercises: &[crate::Exercise],
        now: DateTime<Utc>,
    ) -> Result<CasOutcome> {
        self.with_group(key, |entries| {
            let entry = entries
                .iter_mut()
                .find(|e| e.day_number == day_number)
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "No entry for day {} in plan {}",
                        day_number, key.source_plan_id
                    ))
                })?;

            if entry.is_completed {
                tracing::debug!(
                    "Day {} already completed at {:?}; idempotent outcome",
                    day_number,
                    entry.completed_at
                );
                return Ok((CasOutcome::AlreadyCompleted(entry.clone()), false));
            }

            entry.exercises = merged_exercises.to_vec();
            entry.is_completed = true;
            entry.completed_at = Some(now);

            tracing::info!(
                "Completed day {} for user {} (plan {})",
                day_number,
                key.user_id,
                key.source_plan_id
            );
            Ok((CasOutcome::Applied(entry.clone()), true))
        })
    }

    /// Insert or replace entries strictly above the last completed day.
    ///
    /// Entries at or below the boundary are never touched. Incomplete entries
    /// above the boundary that the incoming set no longer contains are pruned
    /// so the group tracks the current template.
    pub fn apply_above_boundary(
        &self,
        key: &GroupKey,
        incoming: &[DailyPlanEntry],
    ) -> Result<SyncOutcome> {
        self.with_group(key, |entries| {
            let boundary = last_completed_day(entries);
            let mut outcome = SyncOutcome {
                boundary,
                ..SyncOutcome::default()
            };

            let incoming_days: Vec<u32> = incoming
                .iter()
                .filter(|e| e.day_number > boundary)
                .map(|e| e.day_number)
                .collect();

            // Prune stale incomplete entries above the boundary
            let before = entries.len();
            entries.retain(|e| {
                e.day_number <= boundary
                    || e.is_completed
                    || incoming_days.contains(&e.day_number)
            });
            outcome.pruned = before - entries.len();

            for new_entry in incoming {
                if new_entry.day_number <= boundary {
                    continue;
                }
                match entries
                    .iter_mut()
                    .find(|e| e.day_number == new_entry.day_number)
                {
                    Some(existing) if existing.is_completed => {
                        // Completion status is never lost, whatever the
                        // template now says
                    }
                    Some(existing) => {
                        let mut replacement = new_entry.clone();
                        replacement.id = existing.id;
                        *existing = replacement;
                        outcome.replaced += 1;
                    }
                    None => {
                        entries.push(new_entry.clone());
                        outcome.inserted += 1;
                    }
                }
            }

            let dirty = outcome.changed() > 0;
            Ok((outcome, dirty))
        })
    }

    /// Locate an entry by id across all of a user's groups
    pub fn find_entry(
        &self,
        user_id: &str,
        entry_id: Uuid,
    ) -> Result<Option<(GroupKey, DailyPlanEntry)>> {
        for (key, entries) in self.load_user_groups(user_id, None)? {
            if let Some(entry) = entries.into_iter().find(|e| e.id == entry_id) {
                return Ok(Some((key, entry)));
            }
        }
        Ok(None)
    }

    /// Load all of a user's groups, optionally filtered by plan type
    pub fn load_user_groups(
        &self,
        user_id: &str,
        plan_type: Option<PlanType>,
    ) -> Result<Vec<(GroupKey, Vec<DailyPlanEntry>)>> {
        let dir = self.data_dir.join("plans").join(sanitize(user_id));
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut groups = Vec::new();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let contents = std::fs::read_to_string(&path)?;
            let doc: GroupDocument = match serde_json::from_str(&contents) {
                Ok(doc) => doc,
                Err(e) => {
                    return Err(Error::Store(format!(
                        "Corrupt group file {}: {}",
                        path.display(),
                        e
                    )))
                }
            };
            if plan_type.map_or(true, |pt| doc.plan_type == pt) {
                let key = GroupKey::new(doc.user_id, doc.source_plan_id, doc.plan_type);
                groups.push((key, doc.entries));
            }
        }

        Ok(groups)
    }

    /// Load a cached stats record.
    ///
    /// Stats are derived data, so a corrupt file logs a warning and reads as
    /// absent; the caller recomputes.
    pub fn load_stats(&self, user_id: &str, plan_type: PlanType) -> Result<Option<StatsRecord>> {
        let path = self.stats_path(user_id, plan_type);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<StatsRecord>(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(
                    "Corrupt stats file {:?}: {}. Will recompute.",
                    path,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Overwrite the stats record atomically
    pub fn save_stats(&self, record: &StatsRecord) -> Result<()> {
        let path = self.stats_path(&record.user_id, record.plan_type);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "stats path missing parent")
        })?)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(record)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved stats for {}/{}", record.user_id, record.plan_type);
        Ok(())
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Exercise;

    fn exercise(name: &str) -> Exercise {
        Exercise {
            id: None,
            name: name.into(),
            sets: 3,
            reps: 10,
            weight: None,
            minutes: 20,
            exercise_type_count: 1,
            notes: None,
        }
    }

    fn entry(key: &GroupKey, day: u32) -> DailyPlanEntry {
        DailyPlanEntry {
            id: Uuid::new_v4(),
            user_id: key.user_id.clone(),
            day_number: day,
            plan_type: key.plan_type,
            source_plan_id: key.source_plan_id.clone(),
            category: None,
            level: None,
            exercises: vec![exercise("Squat")],
            is_completed: false,
            completed_at: None,
            transient: false,
        }
    }

    fn test_key() -> GroupKey {
        GroupKey::new("u1", "plan-1", PlanType::Assigned)
    }

    #[test]
    fn test_missing_group_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());

        let entries = store.load_group(&test_key()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_insert_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());
        let key = test_key();

        let incoming: Vec<_> = (1..=3).map(|d| entry(&key, d)).collect();
        let outcome = store.apply_above_boundary(&key, &incoming).unwrap();
        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.boundary, 0);

        let loaded = store.load_group(&key).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].day_number, 1);
    }

    #[test]
    fn test_cas_applies_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());
        let key = test_key();

        store
            .apply_above_boundary(&key, &[entry(&key, 1)])
            .unwrap();

        let merged = vec![exercise("Squat")];
        let first = store
            .complete_entry(&key, 1, &merged, Utc::now())
            .unwrap();
        assert!(matches!(first, CasOutcome::Applied(_)));
        let first_completed_at = first.entry().completed_at;

        let second = store
            .complete_entry(&key, 1, &merged, Utc::now())
            .unwrap();
        match second {
            CasOutcome::AlreadyCompleted(e) => {
                assert_eq!(e.completed_at, first_completed_at);
            }
            CasOutcome::Applied(_) => panic!("second completion must not re-apply"),
        }
    }

    #[test]
    fn test_cas_unknown_day_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());
        let key = test_key();

        let result = store.complete_entry(&key, 1, &[], Utc::now());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_boundary_protects_completed_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());
        let key = test_key();

        let incoming: Vec<_> = (1..=3).map(|d| entry(&key, d)).collect();
        store.apply_above_boundary(&key, &incoming).unwrap();
        store
            .complete_entry(&key, 1, &[exercise("Squat")], Utc::now())
            .unwrap();

        // Re-sync with different exercises everywhere
        let mut resync: Vec<_> = (1..=3).map(|d| entry(&key, d)).collect();
        for e in &mut resync {
            e.exercises = vec![exercise("Burpee")];
        }
        let outcome = store.apply_above_boundary(&key, &resync).unwrap();
        assert_eq!(outcome.boundary, 1);
        assert_eq!(outcome.replaced, 2);

        let loaded = store.load_group(&key).unwrap();
        let day1 = loaded.iter().find(|e| e.day_number == 1).unwrap();
        assert!(day1.is_completed);
        assert_eq!(day1.exercises[0].name, "Squat"); // untouched
        let day2 = loaded.iter().find(|e| e.day_number == 2).unwrap();
        assert_eq!(day2.exercises[0].name, "Burpee"); // replaced
    }

    #[test]
    fn test_prune_stale_incomplete_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());
        let key = test_key();

        let incoming: Vec<_> = (1..=5).map(|d| entry(&key, d)).collect();
        store.apply_above_boundary(&key, &incoming).unwrap();

        // Template shrank to 3 days
        let shorter: Vec<_> = (1..=3).map(|d| entry(&key, d)).collect();
        let outcome = store.apply_above_boundary(&key, &shorter).unwrap();
        assert_eq!(outcome.pruned, 2);

        let loaded = store.load_group(&key).unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_corrupt_group_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());
        let key = test_key();

        store
            .apply_above_boundary(&key, &[entry(&key, 1)])
            .unwrap();
        let path = store.group_path(&key);
        std::fs::write(&path, "{ invalid json }").unwrap();

        let result = store.load_group(&key);
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[test]
    fn test_find_entry_by_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());
        let key = test_key();

        let target = entry(&key, 2);
        let target_id = target.id;
        store
            .apply_above_boundary(&key, &[entry(&key, 1), target])
            .unwrap();

        let found = store.find_entry("u1", target_id).unwrap();
        let (found_key, found_entry) = found.expect("entry should be found");
        assert_eq!(found_key, key);
        assert_eq!(found_entry.day_number, 2);

        assert!(store.find_entry("u1", Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_stats_roundtrip_and_corruption_fallback() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());

        assert!(store.load_stats("u1", PlanType::Manual).unwrap().is_none());

        let record = StatsRecord::empty("u1", PlanType::Manual, Utc::now());
        store.save_stats(&record).unwrap();
        let loaded = store.load_stats("u1", PlanType::Manual).unwrap().unwrap();
        assert_eq!(loaded.weekly_progress.total, 12);

        // Corrupt stats read as absent (recomputable)
        let path = store.stats_path("u1", PlanType::Manual);
        std::fs::write(&path, "not json").unwrap();
        assert!(store.load_stats("u1", PlanType::Manual).unwrap().is_none());
    }

    #[test]
    fn test_load_user_groups_filters_plan_type() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(temp_dir.path());

        let assigned = GroupKey::new("u1", "p1", PlanType::Assigned);
        let manual = GroupKey::new("u1", "p2", PlanType::Manual);
        store
            .apply_above_boundary(&assigned, &[entry(&assigned, 1)])
            .unwrap();
        store
            .apply_above_boundary(&manual, &[entry(&manual, 1)])
            .unwrap();

        let all = store.load_user_groups("u1", None).unwrap();
        assert_eq!(all.len(), 2);

        let only_manual = store
            .load_user_groups("u1", Some(PlanType::Manual))
            .unwrap();
        assert_eq!(only_manual.len(), 1);
        assert_eq!(only_manual[0].0.plan_type, PlanType::Manual);
    }
}
