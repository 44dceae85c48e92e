//! Audit trail of applied workflow transitions.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::permissions::Principal;

/// Entity responsible for an action.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "name")]
pub enum Actor {
    /// Actions carried out automatically, such as scheduled publications.
    System,
    /// A named principal.
    Principal(String),
}

impl<'a> From<&'a Principal> for Actor {
    fn from(principal: &'a Principal) -> Actor {
        if principal == &Principal::system() {
            Actor::System
        } else {
            Actor::Principal(principal.name().to_string())
        }
    }
}

/// One applied transition.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEntry {
    pub actor: Actor,
    pub handle: Uuid,
    /// Event kind that was applied, e.g. `"publish"`.
    pub kind: &'static str,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor: Actor, handle: Uuid, kind: &'static str) -> AuditEntry {
        AuditEntry {
            actor,
            handle,
            kind,
            at: Utc::now(),
        }
    }
}

/// Destination for audit entries.
///
/// Only successfully saved transitions are recorded; rejected or rolled
/// back ones never reach the sink.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Default sink writing entries to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn record(&self, entry: AuditEntry) {
        match serde_json::to_string(&entry) {
            Ok(data) => info!(target: "redline::audit", "{}", data),
            Err(err) => error!("could not serialize audit entry: {}", err),
        }
    }
}
