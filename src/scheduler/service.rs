//! Actix actor running the scheduler.
//!
//! All mutation of the trigger set goes through the actor's mailbox, which
//! makes schedule/delete/fire races impossible by construction: messages
//! are handled one at a time, in arrival order.

use actix::{
    Actor,
    Addr,
    AsyncContext,
    Context,
    Handler,
    Message,
    SpawnHandle,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{
    FileTriggerStore,
    JobCallback,
    JobContext,
    JobInfo,
    MemoryTriggerStore,
    Repeat,
    ScheduleError,
    SchedulerService,
    Trigger,
    TriggerStore,
};

/// Schedule a job, replacing any job stored under the same identity.
pub struct Schedule {
    pub job: JobInfo,
    pub trigger: Trigger,
}

impl Message for Schedule {
    type Result = ();
}

/// Delete a job. Deleting an absent job is a no-op.
pub struct Delete {
    pub name: String,
    pub group: String,
}

impl Message for Delete {
    type Result = ();
}

/// Register the callback invoked for a job class.
pub struct RegisterJob {
    pub class: String,
    pub callback: Arc<dyn JobCallback>,
}

impl Message for RegisterJob {
    type Result = ();
}

struct Entry {
    job: JobInfo,
    trigger: Trigger,
    /// How many times this trigger has fired since it was armed.
    fired: u32,
    handle: SpawnHandle,
}

/// Actix actor which owns the trigger set and fires job callbacks.
pub struct Scheduler {
    store: Box<dyn TriggerStore>,
    jobs: HashMap<String, Arc<dyn JobCallback>>,
    active: HashMap<(String, String), Entry>,
}

impl Scheduler {
    pub fn new(store: Box<dyn TriggerStore>) -> Scheduler {
        Scheduler {
            store,
            jobs: HashMap::new(),
            active: HashMap::new(),
        }
    }

    /// Build a scheduler per configuration: file-backed triggers when a
    /// store directory is configured, in-memory otherwise.
    pub fn from_config(config: &crate::config::Scheduler)
    -> crate::Result<Scheduler> {
        let store: Box<dyn TriggerStore> = match config.trigger_store {
            Some(ref dir) => Box::new(FileTriggerStore::open(dir)?),
            None => Box::new(MemoryTriggerStore::new()),
        };
        Ok(Scheduler::new(store))
    }

    /// Register a callback before the actor starts.
    pub fn with_job<C>(mut self, class: &str, callback: C) -> Scheduler
    where
        C: JobCallback + 'static,
    {
        self.jobs.insert(class.to_string(), Arc::new(callback));
        self
    }

    fn arm(
        &mut self,
        ctx: &mut Context<Self>,
        job: JobInfo,
        trigger: Trigger,
        fired: u32,
    ) {
        let next = match next_fire(&trigger, fired) {
            Some(next) => next,
            None => {
                self.unstore(&job.name, &job.group);
                return;
            }
        };

        // Fire times already in the past fire immediately.
        let delay = (next - Utc::now()).to_std()
            .unwrap_or_else(|_| Duration::from_secs(0));

        let key = (job.group.clone(), job.name.clone());
        let handle = ctx.run_later(delay, {
            let key = key.clone();
            move |act, ctx| act.fire(&key, ctx)
        });

        self.active.insert(key, Entry { job, trigger, fired, handle });
    }

    fn fire(&mut self, key: &(String, String), ctx: &mut Context<Self>) {
        let entry = match self.active.remove(key) {
            Some(entry) => entry,
            // Deleted between arming and firing.
            None => return,
        };

        match self.jobs.get(&entry.job.job) {
            Some(callback) => {
                let result = callback.execute(&JobContext::new(&entry.job));
                if let Err(err) = result {
                    error!("Job {}/{} failed: {}",
                        entry.job.group, entry.job.name, err);
                }
            }
            None => error!("No callback registered for job class {:?}",
                entry.job.job),
        }

        let fired = entry.fired + 1;
        if next_fire(&entry.trigger, fired).is_some() {
            self.arm(ctx, entry.job, entry.trigger, fired);
        } else {
            self.unstore(&entry.job.name, &entry.job.group);
        }
    }

    fn unstore(&mut self, name: &str, group: &str) {
        if let Err(err) = self.store.remove(name, group) {
            error!("Could not remove persisted trigger {}/{}: {}",
                group, name, err);
        }
    }
}

/// Compute the fire time following `fired` past fires, if any remains.
fn next_fire(trigger: &Trigger, fired: u32) -> Option<DateTime<Utc>> {
    match *trigger {
        Trigger::Once { at } => if fired == 0 { Some(at) } else { None },
        Trigger::Repeating { start, interval, repeat } => {
            let remaining = match repeat {
                Repeat::Indefinitely => true,
                Repeat::Times(times) => fired < times,
            };
            if !remaining {
                return None;
            }

            let interval = chrono::Duration::from_std(interval).ok()?;
            Some(start + interval * fired as i32)
        }
    }
}

impl Actor for Scheduler {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        match self.store.load() {
            Ok(triggers) => {
                for persisted in triggers {
                    self.arm(ctx, persisted.job, persisted.trigger, 0);
                }
            }
            Err(err) => error!("Could not load persisted triggers: {}", err),
        }
    }
}

impl Handler<Schedule> for Scheduler {
    type Result = ();

    fn handle(&mut self, msg: Schedule, ctx: &mut Self::Context) {
        let Schedule { job, trigger } = msg;

        let key = (job.group.clone(), job.name.clone());
        if let Some(old) = self.active.remove(&key) {
            ctx.cancel_future(old.handle);
        }

        if let Err(err) = self.store.put(&job, &trigger) {
            error!("Could not persist trigger {}/{}: {}",
                job.group, job.name, err);
        }

        self.arm(ctx, job, trigger, 0);
    }
}

impl Handler<Delete> for Scheduler {
    type Result = ();

    fn handle(&mut self, msg: Delete, ctx: &mut Self::Context) {
        let Delete { name, group } = msg;

        if let Some(entry) = self.active.remove(&(group.clone(), name.clone())) {
            ctx.cancel_future(entry.handle);
        }
        self.unstore(&name, &group);
    }
}

impl Handler<RegisterJob> for Scheduler {
    type Result = ();

    fn handle(&mut self, msg: RegisterJob, _: &mut Self::Context) {
        self.jobs.insert(msg.class, msg.callback);
    }
}

/// [`SchedulerService`] backed by a running scheduler actor.
///
/// `Addr` is not `Sync`, so the handle serializes access behind a mutex.
pub struct SchedulerHandle {
    addr: Mutex<Addr<Scheduler>>,
}

impl SchedulerHandle {
    pub fn new(addr: Addr<Scheduler>) -> SchedulerHandle {
        SchedulerHandle { addr: Mutex::new(addr) }
    }
}

impl SchedulerService for SchedulerHandle {
    fn schedule(&self, job: JobInfo, trigger: Trigger)
    -> Result<(), ScheduleError> {
        self.addr.lock().expect("scheduler handle poisoned")
            .try_send(Schedule { job, trigger })
            .map_err(|_| ScheduleError)
    }

    fn delete(&self, name: &str, group: &str) -> Result<(), ScheduleError> {
        self.addr.lock().expect("scheduler handle poisoned")
            .try_send(Delete {
                name: name.to_string(),
                group: group.to_string(),
            })
            .map_err(|_| ScheduleError)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use std::collections::HashMap;

    use super::*;

    fn job(name: &str) -> JobInfo {
        JobInfo {
            name: name.to_string(),
            group: "workflow".to_string(),
            job: "workflow-event".to_string(),
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn a_configured_store_directory_selects_file_backed_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triggers");

        let config = crate::config::Scheduler {
            trigger_store: Some(path.clone()),
        };
        let mut scheduler = Scheduler::from_config(&config).unwrap();
        assert!(path.is_dir());

        scheduler.store
            .put(&job("publish-1"), &Trigger::Once { at: Utc::now() })
            .unwrap();
        assert!(path.join("workflow@publish-1.job").is_file());
    }

    #[test]
    fn an_unset_store_directory_keeps_triggers_in_memory() {
        let config = crate::config::Scheduler { trigger_store: None };
        let mut scheduler = Scheduler::from_config(&config).unwrap();

        scheduler.store
            .put(&job("publish-1"), &Trigger::Once { at: Utc::now() })
            .unwrap();
        assert_eq!(scheduler.store.load().unwrap().len(), 1);
    }
}
