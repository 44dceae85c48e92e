use std::fmt;
use uuid::Uuid;

use crate::WorkflowError;
use crate::store::{HandleRecord, Session, StoreError};
use super::{
    variant::{Availability, State, Variant},
    versions::VersionsMeta,
};

/// The stable identity grouping all variants of one logical document.
///
/// `Handle` is a read-only snapshot; all mutation goes through the workflow
/// engine so that it shares per-handle serialization.
#[derive(Clone, Debug)]
pub struct Handle {
    data: HandleRecord,
}

/// State of a handle, computed from which variants are present.
///
/// This is never stored; it is recomputed from the variant set on every
/// read. A soft-depublished handle (published variant present but not
/// servable live) counts as having no published variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AggregateState {
    pub base: BaseState,
    /// A draft variant exists, regardless of the base state.
    pub being_edited: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BaseState {
    NoVariants,
    UnpublishedOnly,
    PublishedOnly,
    UnpublishedAndPublished,
}

impl BaseState {
    pub fn has_unpublished(self) -> bool {
        match self {
            BaseState::UnpublishedOnly
            | BaseState::UnpublishedAndPublished => true,
            _ => false,
        }
    }

    pub fn has_published(self) -> bool {
        match self {
            BaseState::PublishedOnly
            | BaseState::UnpublishedAndPublished => true,
            _ => false,
        }
    }
}

/// Derived read-only label describing how unpublished relates to published.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateSummary {
    /// Never published, or no longer live.
    New,
    /// Unpublished content differs from what is live.
    Changed,
    /// Live and in sync.
    Live,
}

impl fmt::Display for StateSummary {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match *self {
            StateSummary::New => "new",
            StateSummary::Changed => "changed",
            StateSummary::Live => "live",
        })
    }
}

impl Handle {
    /// Read a handle snapshot through a session.
    pub fn by_id(session: &mut dyn Session, id: Uuid)
    -> Result<Handle, FindHandleError> {
        match session.handle(id) {
            Ok(data) => Ok(Handle { data }),
            Err(StoreError::NotFound(_)) => Err(FindHandleError::NotFound),
            Err(err) => Err(FindHandleError::Store(err)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.data.id
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Path of the parent node.
    pub fn path(&self) -> &str {
        &self.data.path
    }

    pub fn variant(&self, state: State) -> Option<Variant> {
        self.data.variant(state)
            .cloned()
            .map(Variant::from_record)
    }

    /// Principal holding the draft, if a draft exists.
    pub fn draft_owner(&self) -> Option<&str> {
        self.data.variant(State::Draft)
            .and_then(|v| v.owner.as_ref())
            .map(String::as_str)
    }

    pub fn aggregate_state(&self) -> AggregateState {
        let unpublished = self.data.variant(State::Unpublished).is_some();
        let published = self.data.variant(State::Published)
            .map(|v| v.availability.contains(&Availability::Live))
            .unwrap_or(false);

        let base = match (unpublished, published) {
            (false, false) => BaseState::NoVariants,
            (true, false) => BaseState::UnpublishedOnly,
            (false, true) => BaseState::PublishedOnly,
            (true, true) => BaseState::UnpublishedAndPublished,
        };

        AggregateState {
            base,
            being_edited: self.data.variant(State::Draft).is_some(),
        }
    }

    /// Compute the state summary. Always derived, never stored.
    pub fn state_summary(&self) -> StateSummary {
        let state = self.aggregate_state();

        if !state.base.has_published() {
            return StateSummary::New;
        }

        let changed = match (
            self.data.variant(State::Unpublished),
            self.data.variant(State::Published),
        ) {
            (Some(unpublished), Some(published)) =>
                unpublished.content != published.content,
            _ => false,
        };

        if changed {
            StateSummary::Changed
        } else {
            StateSummary::Live
        }
    }

    /// Deserialize this handle's versions metadata, degrading gracefully on
    /// malformed data.
    pub fn versions_meta(&self) -> VersionsMeta {
        VersionsMeta::parse(
            self.data.versions_meta.as_ref().map(String::as_str))
    }
}

#[derive(Debug, Fail, WorkflowError)]
pub enum FindHandleError {
    /// Content store error.
    #[fail(display = "Content store error: {}", _0)]
    #[workflow(internal)]
    Store(#[cause] StoreError),
    /// No handle found matching given criteria.
    #[fail(display = "No such document")]
    #[workflow(code = "handle:not-found", class = "rejected")]
    NotFound,
}

impl_from! { for FindHandleError ;
    StoreError => |e| match e {
        StoreError::NotFound(_) => FindHandleError::NotFound,
        _ => FindHandleError::Store(e),
    }
}
