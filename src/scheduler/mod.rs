//! Delayed execution of workflow events.
//!
//! The scheduler stores named jobs with triggers and invokes a registered
//! [`JobCallback`] when a trigger fires. The workflow engine talks to it
//! only through [`SchedulerService`], so tests can substitute a recording
//! double and deployments can bind a different backend.

pub mod jobs;
pub mod service;
pub mod store;

pub use self::service::{Scheduler, SchedulerHandle};
pub use self::store::{
    FileTriggerStore, MemoryTriggerStore, PersistedTrigger, TriggerStore,
};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::WorkflowError;

/// A named, durable description of what to run when a trigger fires.
///
/// Jobs are identified by `(group, name)`; scheduling a job under an
/// existing identity replaces it. The `job` field names the callback
/// class, decoupling persisted triggers from the code that handles them.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct JobInfo {
    pub name: String,
    pub group: String,
    /// Callback class to invoke, registered via
    /// [`service::RegisterJob`].
    pub job: String,
    pub attributes: HashMap<String, String>,
}

/// When, and how often, a job fires.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum Trigger {
    /// Fire once at `at`. Times already in the past fire immediately.
    Once { at: DateTime<Utc> },
    /// Fire at `start` and then every `interval`.
    Repeating {
        start: DateTime<Utc>,
        interval: Duration,
        repeat: Repeat,
    },
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum Repeat {
    Indefinitely,
    /// Fire this many times in total.
    Times(u32),
}

/// Read-only view of a firing job, handed to its callback.
pub struct JobContext<'a> {
    info: &'a JobInfo,
}

impl<'a> JobContext<'a> {
    pub(crate) fn new(info: &'a JobInfo) -> JobContext<'a> {
        JobContext { info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn group(&self) -> &str {
        &self.info.group
    }

    /// Fetch a required attribute.
    pub fn attribute(&self, name: &str) -> Result<&str, MissingAttribute> {
        self.info.attributes.get(name)
            .map(String::as_str)
            .ok_or_else(|| MissingAttribute(name.to_string()))
    }
}

#[derive(Debug, Fail)]
#[fail(display = "job is missing required attribute {:?}", _0)]
pub struct MissingAttribute(String);

/// Work to perform when a trigger fires.
///
/// Execution happens on the scheduler's thread; failures are logged and
/// do not re-arm the trigger.
pub trait JobCallback: Send + Sync {
    fn execute(&self, ctx: &JobContext) -> Result<(), failure::Error>;
}

/// The interface through which transitions register and delete triggers.
pub trait SchedulerService: Send + Sync {
    /// Schedule `job` to run per `trigger`, replacing any job already
    /// stored under the same `(group, name)`.
    fn schedule(&self, job: JobInfo, trigger: Trigger)
        -> Result<(), ScheduleError>;

    /// Delete the job named `(group, name)`. Deleting an absent job is
    /// not an error.
    fn delete(&self, name: &str, group: &str) -> Result<(), ScheduleError>;
}

#[derive(Debug, Fail, WorkflowError)]
#[fail(display = "The scheduler is not available")]
#[workflow(code = "scheduler:unavailable", class = "unavailable")]
pub struct ScheduleError;
