//! Interface to the underlying content repository.
//!
//! The workflow engine treats the node store as an external collaborator: it
//! reads handle snapshots, issues variant-level mutations, and relies on a
//! single atomic [`Session::save`] per transition. Nothing here assumes a
//! particular wire format or storage engine.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{Availability, State};

pub mod memory;

pub use self::memory::MemoryStore;

/// Identifier of a frozen node in version history.
pub type VersionId = Uuid;

/// One physical state-specific copy of a document's content.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantRecord {
    pub state: State,
    /// Environments under which this variant is servable.
    pub availability: BTreeSet<Availability>,
    /// Principal holding an exclusive edit lock, for draft variants.
    pub owner: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by: String,
    /// Document body. The engine only ever copies and compares it.
    pub content: serde_json::Value,
}

/// Snapshot of a document handle and its variants.
#[derive(Clone, Debug, PartialEq)]
pub struct HandleRecord {
    pub id: Uuid,
    pub name: String,
    /// Path of the parent node. The full path of the handle is
    /// `{path}/{name}`.
    pub path: String,
    /// Raw serialized versions metadata, if any.
    pub versions_meta: Option<String>,
    /// At most one variant per state, except transiently during copies.
    pub variants: Vec<VariantRecord>,
}

impl HandleRecord {
    pub fn variant(&self, state: State) -> Option<&VariantRecord> {
        self.variants.iter().find(|v| v.state == state)
    }

    pub fn full_path(&self) -> String {
        format!("{}/{}", self.path, self.name)
    }
}

/// A transactional view of the content store.
///
/// Reads observe the session's own pending writes. No mutation becomes
/// visible to other sessions before [`Session::save`], which applies all of
/// them atomically or fails without applying any.
pub trait Session {
    /// Read a handle, including this session's pending changes to it.
    fn handle(&mut self, id: Uuid) -> Result<HandleRecord, StoreError>;

    /// Find the handle stored at a full path.
    fn handle_at(&mut self, path: &str) -> Result<Option<Uuid>, StoreError>;

    /// Create a new, empty handle named `name` under `path`.
    fn create_handle(&mut self, name: &str, path: &str)
        -> Result<Uuid, StoreError>;

    /// Insert or replace the variant with `variant.state`.
    fn put_variant(&mut self, id: Uuid, variant: VariantRecord)
        -> Result<(), StoreError>;

    /// Remove the variant with `state`, if present.
    fn remove_variant(&mut self, id: Uuid, state: State)
        -> Result<(), StoreError>;

    /// Remove the handle and everything it owns.
    fn remove_handle(&mut self, id: Uuid) -> Result<(), StoreError>;

    /// Re-parent the handle under `path`.
    fn move_handle(&mut self, id: Uuid, path: &str) -> Result<(), StoreError>;

    /// Change the handle's name, preserving sibling order.
    fn rename_handle(&mut self, id: Uuid, name: &str)
        -> Result<(), StoreError>;

    /// Replace the handle's serialized versions metadata.
    fn set_versions_meta(&mut self, id: Uuid, meta: Option<String>)
        -> Result<(), StoreError>;

    /// Snapshot the unpublished variant into version history, returning the
    /// id of the frozen node.
    fn checkin(&mut self, id: Uuid) -> Result<VersionId, StoreError>;

    /// Does `version` exist in the handle's version history?
    fn version_exists(&mut self, id: Uuid, version: VersionId)
        -> Result<bool, StoreError>;

    /// Atomically apply all mutations issued through this session.
    ///
    /// Fails with [`StoreError::Conflict`] when another session committed
    /// a conflicting write first; in that case nothing was applied.
    fn save(&mut self) -> Result<(), StoreError>;

    /// Discard all pending mutations.
    fn refresh(&mut self);
}

pub trait ContentStore: Send + Sync {
    /// Open a new transactional session.
    fn open(&self) -> Box<dyn Session + '_>;
}

#[derive(Debug, Fail)]
pub enum StoreError {
    #[fail(display = "no node with id {}", _0)]
    NotFound(Uuid),
    #[fail(display = "a node already exists at {}", _0)]
    PathOccupied(String),
    #[fail(display = "handle {} has no {} variant", _0, _1)]
    NoSuchVariant(Uuid, State),
    #[fail(display = "conflicting concurrent write detected")]
    Conflict,
}
