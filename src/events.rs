//! The closed vocabulary of workflow events.

use chrono::{DateTime, Utc};

/// A named event raised against a document handle.
///
/// Events are the only way external callers (UI actions, REST calls, or
/// scheduled triggers) drive the state machine. Each carries its typed
/// payload; everything else about a transition is derived from the handle's
/// current state.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkflowEvent {
    /// Obtain an editable draft of the document.
    EditObtain,
    /// Merge the draft back and release it.
    EditCommit,
    /// Discard the draft without merging.
    EditDispose,
    /// Promote the unpublished variant to published.
    Publish,
    /// Take the published variant offline.
    Depublish,
    /// Register a future publication.
    SchedulePublish { at: DateTime<Utc> },
    /// Register a future depublication.
    ScheduleDepublish { at: DateTime<Utc> },
    /// Publication re-raised by a fired trigger.
    ScheduledPublish,
    /// Depublication re-raised by a fired trigger.
    ScheduledDepublish,
    /// Remove the handle and all its variants.
    Delete,
    /// Deep-copy the document to a new handle at `target`.
    Copy { target: String },
    /// Re-parent the handle at `target`.
    Move { target: String },
    /// Change the handle's name, preserving sibling order.
    Rename { new_name: String },
}

impl WorkflowEvent {
    pub fn kind(&self) -> &'static str {
        match *self {
            WorkflowEvent::EditObtain => "edit-obtain",
            WorkflowEvent::EditCommit => "edit-commit",
            WorkflowEvent::EditDispose => "edit-dispose",
            WorkflowEvent::Publish => "publish",
            WorkflowEvent::Depublish => "depublish",
            WorkflowEvent::SchedulePublish { .. } => "schedule-publish",
            WorkflowEvent::ScheduleDepublish { .. } => "schedule-depublish",
            WorkflowEvent::ScheduledPublish => "scheduled-publish",
            WorkflowEvent::ScheduledDepublish => "scheduled-depublish",
            WorkflowEvent::Delete => "delete",
            WorkflowEvent::Copy { .. } => "copy",
            WorkflowEvent::Move { .. } => "move",
            WorkflowEvent::Rename { .. } => "rename",
        }
    }
}
