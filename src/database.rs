use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::diary::Diary;
use crate::medication::MedicationEntry;
use crate::schedule::PerDateSchedule;

pub const SCHEDULE_FILE: &str = "schedule.json";
pub const MEDICATIONS_FILE: &str = "medications.json";
pub const DIARY_FILE: &str = "diary.json";
const LOCK_FILE: &str = "sonju.lock";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} is corrupted (backed up to {})", path.display(), backup.display())]
    Corrupted { path: PathBuf, backup: PathBuf },
    #[error("another sonju process is writing (remove {} if none is running)", path.display())]
    Busy { path: PathBuf },
}

/// Reads past a corrupted file as an empty value. The bad file has already
/// been backed up by the failed read, and the caller is about to overwrite it.
pub fn recover_corrupted<T: Default>(result: Result<T, StorageError>) -> Result<T, StorageError> {
    match result {
        Err(StorageError::Corrupted { path, backup }) => {
            warn!(
                "starting {} empty; the old contents are in {}",
                path.display(),
                backup.display()
            );
            Ok(T::default())
        }
        other => other,
    }
}

fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    system.process(pid).is_some()
}

/// Where the per-date schedule lives between runs.
pub trait ScheduleStore {
    /// Loads the whole schedule; empty when nothing was saved yet.
    fn read_schedule(&self) -> Result<PerDateSchedule, StorageError>;
    /// Replaces the whole saved schedule.
    fn write_schedule(&self, schedule: &PerDateSchedule) -> Result<(), StorageError>;
}

/// JSON files under one data directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

/// Held for the duration of a read-modify-write. Dropping it releases the lock.
#[derive(Debug)]
pub struct WriteLock {
    path: PathBuf,
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Takes the single-writer lock. Fails with [`StorageError::Busy`]
    /// instead of waiting when another writer holds it.
    ///
    /// The lock file records the holder's PID. A lock left behind by a
    /// process that no longer runs is removed and taken over.
    pub fn lock(&self) -> Result<WriteLock, StorageError> {
        let path = self.path(LOCK_FILE);
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Write {
            path: self.dir.clone(),
            source,
        })?;
        match self.try_lock(&path) {
            Err(StorageError::Busy { path }) if self.lock_is_stale(&path) => {
                warn!("removing stale lock {}", path.display());
                fs::remove_file(&path).map_err(|source| StorageError::Write {
                    path: path.clone(),
                    source,
                })?;
                self.try_lock(&path)
            }
            result => result,
        }
    }

    fn try_lock(&self, path: &Path) -> Result<WriteLock, StorageError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StorageError::Busy {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(StorageError::Write {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        // Own the lock before writing, so a failed write still releases it.
        let lock = WriteLock {
            path: path.to_path_buf(),
        };
        write!(file, "{}", std::process::id()).map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(lock)
    }

    /// A lock is stale only when it names a PID and that process is gone.
    /// Unreadable or empty lock files are left alone.
    fn lock_is_stale(&self, path: &Path) -> bool {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| contents.trim().parse::<u32>().ok())
            .is_some_and(|pid| !process_alive(pid))
    }

    /// Loads one JSON file.
    ///
    /// A missing file yields the default value. A file that does not parse
    /// is copied to `<file>.corrupted` and reported as
    /// [`StorageError::Corrupted`]; writers pass the result through
    /// [`recover_corrupted`] to start over from an empty value.
    fn load<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, StorageError> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(T::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| StorageError::Read {
            path: path.clone(),
            source,
        })?;

        match serde_json::from_str(&contents) {
            Ok(value) => Ok(value),
            Err(e) => {
                let backup = path.with_extension("json.corrupted");
                warn!(
                    "{} is corrupted ({}); backing it up to {}",
                    path.display(),
                    e,
                    backup.display()
                );
                if let Err(backup_err) = fs::copy(&path, &backup) {
                    warn!("failed to create backup: {}", backup_err);
                }
                Err(StorageError::Corrupted { path, backup })
            }
        }
    }

    /// Saves one JSON file atomically: write a temp file, then rename it over
    /// the target. The file is made owner-only on Unix.
    fn save<T: Serialize>(&self, file: &str, value: &T) -> Result<(), StorageError> {
        let path = self.path(file);
        let json = serde_json::to_string_pretty(value).map_err(|source| StorageError::Serialize {
            path: path.clone(),
            source,
        })?;

        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &json).map_err(|source| StorageError::Write {
            path: temp_path.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::Write { path, source });
        }

        #[cfg(unix)]
        {
            if let Ok(metadata) = fs::metadata(&path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                if let Err(e) = fs::set_permissions(&path, perms) {
                    warn!("failed to set permissions on {}: {}", path.display(), e);
                }
            }
        }

        debug!("saved {}", path.display());
        Ok(())
    }

    pub fn read_medications(&self) -> Result<Vec<MedicationEntry>, StorageError> {
        self.load(MEDICATIONS_FILE)
    }

    pub fn write_medications(&self, medications: &[MedicationEntry]) -> Result<(), StorageError> {
        self.save(MEDICATIONS_FILE, &medications)
    }

    pub fn read_diary(&self) -> Result<Diary, StorageError> {
        self.load(DIARY_FILE)
    }

    pub fn write_diary(&self, diary: &Diary) -> Result<(), StorageError> {
        self.save(DIARY_FILE, diary)
    }
}

impl ScheduleStore for JsonStore {
    fn read_schedule(&self) -> Result<PerDateSchedule, StorageError> {
        self.load(SCHEDULE_FILE)
    }

    fn write_schedule(&self, schedule: &PerDateSchedule) -> Result<(), StorageError> {
        self.save(SCHEDULE_FILE, schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diary::HealthStatus;
    use crate::time::TimeSlot;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path().join("data"));
        (dir, store)
    }

    #[test]
    fn test_missing_files_read_as_empty() {
        let (_dir, store) = store();
        assert!(store.read_schedule().unwrap().is_empty());
        assert!(store.read_medications().unwrap().is_empty());
        assert_eq!(store.read_diary().unwrap(), Diary::default());
    }

    #[test]
    fn test_schedule_survives_write_and_read() {
        let (_dir, store) = store();
        let entry = MedicationEntry::new("타이레놀", 3, 2, date(2025, 11, 9)).unwrap();
        let mut schedule = PerDateSchedule::new();
        schedule.expand(&entry).unwrap();
        schedule
            .set_checked(date(2025, 11, 9), TimeSlot::Morning, "타이레놀", true)
            .unwrap();

        store.write_schedule(&schedule).unwrap();
        assert_eq!(store.read_schedule().unwrap(), schedule);
        assert!(!store.dir().join("schedule.json.tmp").exists());

        store.write_medications(&[entry.clone()]).unwrap();
        assert_eq!(store.read_medications().unwrap(), vec![entry]);
    }

    #[test]
    fn test_diary_round_trip() {
        let (_dir, store) = store();
        let mut diary = Diary::default();
        diary.record(date(2025, 11, 9), "무릎 통증", Some(HealthStatus::Warning));
        store.write_diary(&diary).unwrap();
        assert_eq!(store.read_diary().unwrap(), diary);
    }

    #[test]
    fn test_corrupted_file_is_backed_up() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let path = store.dir().join(SCHEDULE_FILE);
        fs::write(&path, "{ not json").unwrap();

        let backup = store.dir().join("schedule.json.corrupted");
        match store.read_schedule() {
            Err(StorageError::Corrupted { path: p, backup: b }) => {
                assert_eq!(p, path);
                assert_eq!(b, backup);
            }
            other => panic!("expected a corrupted error, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{ not json");

        assert!(recover_corrupted(store.read_schedule()).unwrap().is_empty());
        assert!(recover_corrupted(store.read_medications()).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_path_is_a_read_error() {
        let (_dir, store) = store();
        // A directory where the file should be cannot be read as a string.
        fs::create_dir_all(store.dir().join(SCHEDULE_FILE)).unwrap();
        assert!(matches!(store.read_schedule(), Err(StorageError::Read { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_files_are_owner_only() {
        let (_dir, store) = store();
        store.write_schedule(&PerDateSchedule::new()).unwrap();
        let mode = fs::metadata(store.dir().join(SCHEDULE_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let (_dir, store) = store();
        let guard = store.lock().unwrap();
        assert!(matches!(store.lock(), Err(StorageError::Busy { .. })));
        drop(guard);
        assert!(store.lock().is_ok());
    }

    #[test]
    fn test_lock_records_owner_pid() {
        let (_dir, store) = store();
        let _guard = store.lock().unwrap();
        let contents = fs::read_to_string(store.dir().join(LOCK_FILE)).unwrap();
        assert_eq!(contents, std::process::id().to_string());
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_left_by_dead_process_is_taken_over() {
        let (_dir, store) = store();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();

        fs::create_dir_all(store.dir()).unwrap();
        let lock_path = store.dir().join(LOCK_FILE);
        fs::write(&lock_path, dead_pid.to_string()).unwrap();

        let guard = store.lock().unwrap();
        assert_eq!(
            fs::read_to_string(&lock_path).unwrap(),
            std::process::id().to_string()
        );
        drop(guard);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_lock_without_pid_stays_busy() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(LOCK_FILE), "").unwrap();
        assert!(matches!(store.lock(), Err(StorageError::Busy { .. })));
    }
}
