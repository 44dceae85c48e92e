//! In-memory content store with optimistic concurrency.
//!
//! Used by the test suite and by embedders who need the engine without a
//! real repository behind it. Sessions buffer all writes locally; `save`
//! re-validates the revision of every written handle under one lock, so a
//! transition either commits in full or observes a conflict.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::State;
use super::{
    ContentStore,
    HandleRecord,
    Session,
    StoreError,
    VariantRecord,
    VersionId,
};

#[derive(Clone, Debug)]
struct Stored {
    record: HandleRecord,
    revision: u64,
    versions: HashMap<VersionId, serde_json::Value>,
}

#[derive(Debug, Default)]
struct Inner {
    handles: HashMap<Uuid, Stored>,
    paths: HashMap<String, Uuid>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl ContentStore for MemoryStore {
    fn open(&self) -> Box<dyn Session + '_> {
        Box::new(MemorySession {
            store: self,
            touched: HashMap::new(),
        })
    }
}

/// A handle this session has written to.
#[derive(Debug)]
struct Touched {
    /// Revision observed when the handle was first written to, or `None`
    /// for handles created within this session.
    base: Option<u64>,
    /// Pending state of the handle; `None` marks a pending removal.
    stored: Option<Stored>,
}

struct MemorySession<'s> {
    store: &'s MemoryStore,
    touched: HashMap<Uuid, Touched>,
}

impl<'s> MemorySession<'s> {
    /// Bring a handle into the session's write set, recording the revision
    /// it was based on.
    fn touch(&mut self, id: Uuid) -> Result<&mut Stored, StoreError> {
        if !self.touched.contains_key(&id) {
            let inner = self.store.inner.lock().expect("store lock poisoned");
            let stored = inner.handles.get(&id)
                .cloned()
                .ok_or(StoreError::NotFound(id))?;

            self.touched.insert(id, Touched {
                base: Some(stored.revision),
                stored: Some(stored),
            });
        }

        match self.touched.get_mut(&id) {
            Some(Touched { stored: Some(stored), .. }) => Ok(stored),
            _ => Err(StoreError::NotFound(id)),
        }
    }
}

impl<'s> Session for MemorySession<'s> {
    fn handle(&mut self, id: Uuid) -> Result<HandleRecord, StoreError> {
        if let Some(touched) = self.touched.get(&id) {
            return touched.stored.as_ref()
                .map(|stored| stored.record.clone())
                .ok_or(StoreError::NotFound(id));
        }

        let inner = self.store.inner.lock().expect("store lock poisoned");
        inner.handles.get(&id)
            .map(|stored| stored.record.clone())
            .ok_or(StoreError::NotFound(id))
    }

    fn handle_at(&mut self, path: &str) -> Result<Option<Uuid>, StoreError> {
        for (id, touched) in &self.touched {
            if let Some(ref stored) = touched.stored {
                if stored.record.full_path() == path {
                    return Ok(Some(*id));
                }
            }
        }

        let inner = self.store.inner.lock().expect("store lock poisoned");
        match inner.paths.get(path) {
            // A touched handle's committed path no longer reflects this
            // session's view of it.
            Some(id) if self.touched.contains_key(id) => Ok(None),
            Some(id) => Ok(Some(*id)),
            None => Ok(None),
        }
    }

    fn create_handle(&mut self, name: &str, path: &str)
    -> Result<Uuid, StoreError> {
        let full = format!("{}/{}", path, name);

        if self.handle_at(&full)?.is_some() {
            return Err(StoreError::PathOccupied(full));
        }

        let id = Uuid::new_v4();
        self.touched.insert(id, Touched {
            base: None,
            stored: Some(Stored {
                record: HandleRecord {
                    id,
                    name: name.to_string(),
                    path: path.to_string(),
                    versions_meta: None,
                    variants: Vec::new(),
                },
                revision: 0,
                versions: HashMap::new(),
            }),
        });

        Ok(id)
    }

    fn put_variant(&mut self, id: Uuid, variant: VariantRecord)
    -> Result<(), StoreError> {
        let stored = self.touch(id)?;
        stored.record.variants.retain(|v| v.state != variant.state);
        stored.record.variants.push(variant);
        Ok(())
    }

    fn remove_variant(&mut self, id: Uuid, state: State)
    -> Result<(), StoreError> {
        let stored = self.touch(id)?;
        stored.record.variants.retain(|v| v.state != state);
        Ok(())
    }

    fn remove_handle(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.touch(id)?;
        if let Some(touched) = self.touched.get_mut(&id) {
            touched.stored = None;
        }
        Ok(())
    }

    fn move_handle(&mut self, id: Uuid, path: &str) -> Result<(), StoreError> {
        let stored = self.touch(id)?;
        stored.record.path = path.to_string();
        Ok(())
    }

    fn rename_handle(&mut self, id: Uuid, name: &str)
    -> Result<(), StoreError> {
        let stored = self.touch(id)?;
        stored.record.name = name.to_string();
        Ok(())
    }

    fn set_versions_meta(&mut self, id: Uuid, meta: Option<String>)
    -> Result<(), StoreError> {
        let stored = self.touch(id)?;
        stored.record.versions_meta = meta;
        Ok(())
    }

    fn checkin(&mut self, id: Uuid) -> Result<VersionId, StoreError> {
        let stored = self.touch(id)?;
        let content = stored.record.variant(State::Unpublished)
            .map(|v| v.content.clone())
            .ok_or(StoreError::NoSuchVariant(id, State::Unpublished))?;

        let version = Uuid::new_v4();
        stored.versions.insert(version, content);
        Ok(version)
    }

    fn version_exists(&mut self, id: Uuid, version: VersionId)
    -> Result<bool, StoreError> {
        if let Some(Touched { stored: Some(stored), .. }) = self.touched.get(&id) {
            return Ok(stored.versions.contains_key(&version));
        }

        let inner = self.store.inner.lock().expect("store lock poisoned");
        Ok(inner.handles.get(&id)
            .map(|stored| stored.versions.contains_key(&version))
            .unwrap_or(false))
    }

    fn save(&mut self) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().expect("store lock poisoned");

        // Validate everything before applying anything.
        for (id, touched) in &self.touched {
            match touched.base {
                Some(revision) => match inner.handles.get(id) {
                    Some(current) if current.revision == revision => {}
                    _ => return Err(StoreError::Conflict),
                },
                None => if inner.handles.contains_key(id) {
                    return Err(StoreError::Conflict);
                },
            }
        }

        let mut claimed = HashSet::new();
        for (id, touched) in &self.touched {
            if let Some(ref stored) = touched.stored {
                let full = stored.record.full_path();

                if !claimed.insert(full.clone()) {
                    return Err(StoreError::PathOccupied(full));
                }

                match inner.paths.get(&full) {
                    Some(other) if other != id
                        && !self.touched.contains_key(other) =>
                        return Err(StoreError::PathOccupied(full)),
                    _ => {}
                }
            }
        }

        for (id, touched) in self.touched.drain() {
            if let Some(previous) = inner.handles.remove(&id) {
                inner.paths.remove(&previous.record.full_path());
            }

            if let Some(mut stored) = touched.stored {
                stored.revision = touched.base.map(|r| r + 1).unwrap_or(1);
                inner.paths.insert(stored.record.full_path(), id);
                inner.handles.insert(id, stored);
            }
        }

        Ok(())
    }

    fn refresh(&mut self) {
        self.touched.clear();
    }
}
