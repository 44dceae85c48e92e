//! Trigger persistence.
//!
//! The scheduler reloads its trigger set from a [`TriggerStore`] on start,
//! which is what lets scheduled publications survive a restart. Entries
//! are serialized with MessagePack.

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{JobInfo, Trigger};

/// One stored (job, trigger) pair.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PersistedTrigger {
    pub job: JobInfo,
    pub trigger: Trigger,
}

/// Durable storage for the scheduler's trigger set.
pub trait TriggerStore: Send {
    /// Read every stored trigger.
    fn load(&self) -> crate::Result<Vec<PersistedTrigger>>;

    /// Insert or replace the trigger stored under `job`'s identity.
    fn put(&mut self, job: &JobInfo, trigger: &Trigger) -> crate::Result<()>;

    /// Remove the trigger stored under `(group, name)`, if any.
    fn remove(&mut self, name: &str, group: &str) -> crate::Result<()>;
}

/// In-memory store. Triggers do not survive a restart.
///
/// Clones share the same trigger set, so a test can keep a handle to the
/// data while a scheduler instance owns the store.
#[derive(Clone, Debug, Default)]
pub struct MemoryTriggerStore {
    inner: Arc<Mutex<HashMap<(String, String), PersistedTrigger>>>,
}

impl MemoryTriggerStore {
    pub fn new() -> MemoryTriggerStore {
        MemoryTriggerStore::default()
    }
}

impl TriggerStore for MemoryTriggerStore {
    fn load(&self) -> crate::Result<Vec<PersistedTrigger>> {
        let inner = self.inner.lock().expect("trigger store lock poisoned");
        Ok(inner.values().cloned().collect())
    }

    fn put(&mut self, job: &JobInfo, trigger: &Trigger) -> crate::Result<()> {
        let mut inner = self.inner.lock()
            .expect("trigger store lock poisoned");
        inner.insert(
            (job.group.clone(), job.name.clone()),
            PersistedTrigger { job: job.clone(), trigger: *trigger },
        );
        Ok(())
    }

    fn remove(&mut self, name: &str, group: &str) -> crate::Result<()> {
        let mut inner = self.inner.lock()
            .expect("trigger store lock poisoned");
        inner.remove(&(group.to_string(), name.to_string()));
        Ok(())
    }
}

/// Store keeping one MessagePack file per trigger in a directory.
#[derive(Debug)]
pub struct FileTriggerStore {
    dir: PathBuf,
}

impl FileTriggerStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open<P>(dir: P) -> crate::Result<FileTriggerStore>
    where
        P: AsRef<Path>,
    {
        fs::create_dir_all(dir.as_ref())?;
        Ok(FileTriggerStore { dir: dir.as_ref().to_path_buf() })
    }

    fn file_for(&self, name: &str, group: &str) -> PathBuf {
        self.dir.join(format!(
            "{}@{}.job", sanitize(group), sanitize(name)))
    }
}

/// Map a job identifier to something safe in a file name.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

impl TriggerStore for FileTriggerStore {
    fn load(&self) -> crate::Result<Vec<PersistedTrigger>> {
        let mut triggers = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("job") {
                continue;
            }

            let data = fs::read(&path)?;
            match rmps::from_slice(&data) {
                Ok(trigger) => triggers.push(trigger),
                Err(err) => warn!(
                    "Skipping malformed trigger file {}: {}",
                    path.display(), err),
            }
        }

        Ok(triggers)
    }

    fn put(&mut self, job: &JobInfo, trigger: &Trigger) -> crate::Result<()> {
        let entry = PersistedTrigger {
            job: job.clone(),
            trigger: *trigger,
        };

        let mut data = Vec::new();
        entry.serialize(&mut rmps::Serializer::new(&mut data))?;

        fs::write(self.file_for(&job.name, &job.group), data)?;
        Ok(())
    }

    fn remove(&mut self, name: &str, group: &str) -> crate::Result<()> {
        match fs::remove_file(self.file_for(name, group)) {
            Ok(()) => Ok(()),
            Err(ref err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
