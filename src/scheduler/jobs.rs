//! Job callbacks binding the scheduler to the workflow engine.

use std::sync::Arc;
use uuid::Uuid;

use crate::events::WorkflowEvent;
use crate::permissions::Principal;
use crate::workflow::{DocumentWorkflow, HandleEventError};
use super::{JobCallback, JobContext};

/// Job class under which workflow triggers are scheduled.
pub const WORKFLOW_EVENT_JOB: &str = "workflow-event";

/// Callback re-raising a scheduled publication or depublication as a
/// workflow event when its trigger fires.
pub struct WorkflowEventJob {
    workflow: Arc<DocumentWorkflow>,
}

impl WorkflowEventJob {
    pub fn new(workflow: Arc<DocumentWorkflow>) -> WorkflowEventJob {
        WorkflowEventJob { workflow }
    }
}

impl JobCallback for WorkflowEventJob {
    fn execute(&self, ctx: &JobContext) -> Result<(), failure::Error> {
        let handle: Uuid = ctx.attribute("handle")?.parse()?;
        let event = match ctx.attribute("event")? {
            "publish" => WorkflowEvent::ScheduledPublish,
            "depublish" => WorkflowEvent::ScheduledDepublish,
            other => return Err(UnknownEventError(other.to_string()).into()),
        };

        match self.workflow.handle_event(handle, &Principal::system(), &event)
        {
            Ok(_) => Ok(()),
            // The document may have moved on since the trigger was set;
            // a stale trigger is dropped, not retried.
            Err(HandleEventError::Rejected(rejection)) => {
                warn!("Dropping stale {} trigger for {}: {}",
                    event.kind(), handle, rejection);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Fail)]
#[fail(display = "not a schedulable workflow event: {:?}", _0)]
pub struct UnknownEventError(String);
