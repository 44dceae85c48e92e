#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

use redline::models::{Availability, State};
use redline::permissions::{PermissionBits, Principal};
use redline::scheduler::{
    JobInfo, ScheduleError, SchedulerService, Trigger,
};
use redline::store::{ContentStore, MemoryStore, VariantRecord};
use redline::workflow::{DocumentWorkflow, Policy};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A scheduler double recording every call instead of arming timers.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    calls: Mutex<Vec<SchedulerCall>>,
    fail_next: Mutex<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerCall {
    Schedule { job: JobInfo, trigger: Trigger },
    Delete { name: String, group: String },
}

impl RecordingScheduler {
    pub fn new() -> Arc<RecordingScheduler> {
        Arc::new(RecordingScheduler::default())
    }

    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scheduled_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SchedulerCall::Schedule { job, .. } => Some(job.name),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SchedulerCall::Delete { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Make the next `schedule` call fail.
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

impl SchedulerService for RecordingScheduler {
    fn schedule(&self, job: JobInfo, trigger: Trigger)
    -> Result<(), ScheduleError> {
        if std::mem::replace(&mut *self.fail_next.lock().unwrap(), false) {
            return Err(ScheduleError);
        }
        self.calls.lock().unwrap()
            .push(SchedulerCall::Schedule { job, trigger });
        Ok(())
    }

    fn delete(&self, name: &str, group: &str) -> Result<(), ScheduleError> {
        self.calls.lock().unwrap().push(SchedulerCall::Delete {
            name: name.to_string(),
            group: group.to_string(),
        });
        Ok(())
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<RecordingScheduler>,
    pub workflow: Arc<DocumentWorkflow>,
}

pub fn fixture() -> Fixture {
    fixture_with(Policy::default())
}

pub fn fixture_with(policy: Policy) -> Fixture {
    init_logging();

    let store = Arc::new(MemoryStore::new());
    let scheduler = RecordingScheduler::new();
    let workflow = Arc::new(DocumentWorkflow::new(
        store.clone(), scheduler.clone(), policy));

    Fixture { store, scheduler, workflow }
}

/// Create a handle with a single unpublished variant.
pub fn seed_document(store: &MemoryStore, name: &str) -> Uuid {
    let mut session = store.open();
    let id = session.create_handle(name, "/content/documents").unwrap();
    session.put_variant(id, unpublished(
        serde_json::json!({ "title": name }))).unwrap();
    session.save().unwrap();
    id
}

pub fn unpublished(content: serde_json::Value) -> VariantRecord {
    VariantRecord {
        state: State::Unpublished,
        availability: [Availability::Preview].iter().cloned().collect(),
        owner: None,
        publication_date: None,
        last_modified: chrono::Utc::now(),
        last_modified_by: "seed".to_string(),
        content,
    }
}

/// A principal who can edit and copy, but not publish.
pub fn author() -> Principal {
    Principal::new(
        "alice",
        PermissionBits::EDIT_CONTENT | PermissionBits::COPY_CONTENT,
    )
}

/// A principal holding every content permission.
pub fn publisher() -> Principal {
    Principal::new("paula", PermissionBits::MANAGE_CONTENT_BITS)
}
