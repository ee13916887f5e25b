//! Durable record of the slots seen by the previous check, one JSON file per category.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::PathBuf,
};

use chrono::Utc;
use log::{info, warn};
use tempfile::Builder;

use super::{
    errors::StoreError,
    models::{
        slot_model::{CheckRecord, SlotRecord, SlotSet},
        Category,
    },
};

/// Number of entries kept in the check log of a history file.
pub const MAX_CHECKS: usize = 100;

#[derive(Debug, Clone)]
pub struct SlotStore {
    dir: PathBuf,
}

impl SlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SlotStore { dir: dir.into() }
    }

    pub fn path(&self, category: Category) -> PathBuf {
        self.dir.join(format!("slot_history_{}.json", category))
    }

    /// Reads the whole history record. A missing file is a first run; an unreadable one is
    /// treated the same way, so a damaged file never stops the checks.
    pub fn load_record(&self, category: Category) -> Option<SlotRecord> {
        let path = self.path(category);
        if !path.exists() {
            info!("No slot history at {}, starting fresh", path.display());
            return None;
        }
        let record: SlotRecord = match File::open(&path)
            .map_err(StoreError::from)
            .and_then(|file| Ok(serde_json::from_reader::<_, SlotRecord>(BufReader::new(file))?))
        {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "Slot history at {} is unreadable, treating as empty: {}",
                    path.display(),
                    err
                );
                return None;
            }
        };
        if record.category != category {
            warn!(
                "Slot history at {} belongs to {}, treating as empty",
                path.display(),
                record.category
            );
            return None;
        }
        Some(record)
    }

    pub fn load(&self, category: Category) -> SlotSet {
        let slots = self
            .load_record(category)
            .map(|record| record.slot_set())
            .unwrap_or_default();
        info!("Loaded {} previous {} slots", slots.len(), category);
        slots
    }

    /// Replaces the history of `category` with `slots`, counting new slots against the record
    /// currently on disk.
    pub fn save(&self, category: Category, slots: &SlotSet) -> Result<(), StoreError> {
        let previous = self.load_record(category);
        let new_count = match &previous {
            Some(record) => slots.difference(&record.slot_set()).count(),
            None => slots.len(),
        };
        let checks = previous.map(|record| record.checks).unwrap_or_default();
        self.save_check(category, slots, new_count, checks)
    }

    /// Replaces the history of `category` with the result of a check that found `new_count`
    /// new slots. `checks` is the check log of the record loaded before the check.
    ///
    /// Every writer serializes into its own temporary file next to the target and renames it
    /// over the target, so a reader sees either the old record or the new one, also when two
    /// checks of the same category overlap.
    pub fn save_check(
        &self,
        category: Category,
        slots: &SlotSet,
        new_count: usize,
        mut checks: Vec<CheckRecord>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        checks.push(CheckRecord {
            timestamp: now,
            slot_count: slots.len(),
            new_count,
        });
        if checks.len() > MAX_CHECKS {
            checks.drain(..checks.len() - MAX_CHECKS);
        }

        let record = SlotRecord {
            category,
            updated_at: now,
            slots: slots.iter().cloned().collect(),
            checks,
        };

        fs::create_dir_all(&self.dir)?;
        let path = self.path(category);
        info!("Writing {} {} slots to {}", slots.len(), category, path.display());

        let mut tmp = Builder::new()
            .prefix(&format!("slot_history_{}.", category))
            .suffix(".json.tmp")
            .tempfile_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &record)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, thread};

    use chrono::{NaiveDate, NaiveTime};
    use tempfile::TempDir;

    use super::*;
    use crate::slot_check::models::slot_model::Slot;

    fn slot(date: &str, time: &str, label: &str) -> Slot {
        Slot {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            category: Category::Student,
            provider: None,
            location: None,
            raw_label: label.to_owned(),
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SlotStore::new(tmp.path());
        assert!(store.load(Category::Student).is_empty());
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = SlotStore::new(tmp.path().join("nested"));
        let slots = SlotSet::from([
            slot("2024-05-01", "09:00", "May 1, 2024 9:00 AM"),
            slot("2024-05-03", "14:30", "May 3, 2024 2:30 PM"),
        ]);

        store.save(Category::Student, &slots).unwrap();

        assert_eq!(store.load(Category::Student), slots);
        assert!(store.load(Category::Faculty).is_empty());
        assert_eq!(
            file_names(&tmp.path().join("nested")),
            vec!["slot_history_student.json"]
        );
    }

    #[test]
    fn corrupt_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SlotStore::new(tmp.path());
        fs::write(store.path(Category::Student), b"{\"category\": \"stud").unwrap();

        assert!(store.load(Category::Student).is_empty());
    }

    #[test]
    fn record_of_other_category_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = SlotStore::new(tmp.path());
        store
            .save(Category::Faculty, &SlotSet::from([slot("2024-05-01", "09:00", "x")]))
            .unwrap();
        fs::copy(store.path(Category::Faculty), store.path(Category::Student)).unwrap();

        assert!(store.load(Category::Student).is_empty());
    }

    #[test]
    fn check_log_counts_new_slots_and_is_capped() {
        let tmp = TempDir::new().unwrap();
        let store = SlotStore::new(tmp.path());
        let first = SlotSet::from([slot("2024-05-01", "09:00", "a")]);
        let second = SlotSet::from([
            slot("2024-05-01", "09:00", "a"),
            slot("2024-05-02", "10:00", "b"),
        ]);

        store.save(Category::Student, &first).unwrap();
        store.save(Category::Student, &second).unwrap();
        let record = store.load_record(Category::Student).unwrap();
        assert_eq!(record.checks.len(), 2);
        assert_eq!(record.checks[0].new_count, 1);
        assert_eq!(record.checks[1].slot_count, 2);
        assert_eq!(record.checks[1].new_count, 1);

        for _ in 0..MAX_CHECKS {
            store.save(Category::Student, &second).unwrap();
        }
        let record = store.load_record(Category::Student).unwrap();
        assert_eq!(record.checks.len(), MAX_CHECKS);
        assert_eq!(record.checks.last().unwrap().new_count, 0);
    }

    #[test]
    fn interrupted_save_keeps_previous_record() {
        let tmp = TempDir::new().unwrap();
        let store = SlotStore::new(tmp.path());
        let before = SlotSet::from([slot("2024-05-01", "09:00", "a")]);
        store.save(Category::Student, &before).unwrap();
        let bytes_before = fs::read(store.path(Category::Student)).unwrap();

        // a writer that crashed between writing its temporary file and the rename
        fs::write(
            tmp.path().join("slot_history_student.crashed.json.tmp"),
            b"{\"category\":\"student\",\"upd",
        )
        .unwrap();

        assert_eq!(fs::read(store.path(Category::Student)).unwrap(), bytes_before);
        assert_eq!(store.load(Category::Student), before);

        let after = SlotSet::from([slot("2024-05-03", "14:30", "b")]);
        store.save(Category::Student, &after).unwrap();
        assert_eq!(store.load(Category::Student), after);
        assert_eq!(
            file_names(tmp.path()),
            vec![
                "slot_history_student.crashed.json.tmp",
                "slot_history_student.json"
            ]
        );
    }

    #[test]
    fn save_check_uses_given_counts() {
        let tmp = TempDir::new().unwrap();
        let store = SlotStore::new(tmp.path());
        let earlier = CheckRecord {
            timestamp: Utc::now(),
            slot_count: 4,
            new_count: 4,
        };

        store
            .save_check(
                Category::Faculty,
                &SlotSet::from([slot("2024-05-01", "09:00", "a")]),
                1,
                vec![earlier.clone()],
            )
            .unwrap();

        let record = store.load_record(Category::Faculty).unwrap();
        assert_eq!(record.category, Category::Faculty);
        assert_eq!(record.checks.len(), 2);
        assert_eq!(record.checks[0], earlier);
        assert_eq!(record.checks[1].slot_count, 1);
        assert_eq!(record.checks[1].new_count, 1);
    }

    #[test]
    fn overlapping_saves_never_expose_a_torn_record() {
        let tmp = TempDir::new().unwrap();
        let store = SlotStore::new(tmp.path());
        let small = SlotSet::from([slot("2024-05-01", "09:00", "a")]);
        let large = (1..=28)
            .map(|day| slot(&format!("2024-05-{:02}", day), "14:30", "b"))
            .collect::<SlotSet>();
        store.save(Category::Student, &small).unwrap();

        thread::scope(|scope| {
            let writers = [&small, &large].map(|slots| {
                let store = &store;
                scope.spawn(move || {
                    (0..100)
                        .filter(|_| store.save(Category::Student, slots).is_err())
                        .count()
                })
            });
            let reader = scope.spawn(|| {
                (0..1000)
                    .filter(|_| {
                        let bytes = fs::read(store.path(Category::Student)).unwrap();
                        serde_json::from_slice::<SlotRecord>(&bytes).is_err()
                    })
                    .count()
            });

            for writer in writers {
                assert_eq!(writer.join().unwrap(), 0);
            }
            assert_eq!(reader.join().unwrap(), 0);
        });

        let loaded = store.load(Category::Student);
        assert!(loaded == small || loaded == large);
        assert_eq!(file_names(tmp.path()), vec!["slot_history_student.json"]);
    }
}
