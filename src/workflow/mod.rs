//! The document workflow engine.
//!
//! [`DocumentWorkflow`] owns applying transitions: it serializes events per
//! handle, asks [`transition::decide`] for a plan, applies the plan's
//! effects in one store session, and commits them with a single save. A
//! failed save rolls the session back and compensates any triggers the
//! plan registered, so a handle is either fully transitioned or untouched.

pub mod transition;

pub use self::transition::{decide, Effect, Rejection, TransitionContext};

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::WorkflowError;
use crate::audit::{Actor, AuditEntry, AuditSink, LogSink};
use crate::events::WorkflowEvent;
use crate::models::{
    AggregateState, Availability, Campaign, FindHandleError, Handle, State,
    VersionsMeta,
};
use crate::permissions::{
    authorize, Operation, Principal, RequirePermissionsError,
};
use crate::scheduler::{
    jobs, JobInfo, ScheduleError, SchedulerService, Trigger,
};
use crate::store::{
    ContentStore, Session, StoreError, VariantRecord, VersionId,
};

/// Scheduler group under which workflow triggers are filed.
pub const JOB_GROUP: &str = "workflow";

/// Tunable workflow behaviour.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Policy {
    /// Remove the published variant on depublish instead of only taking it
    /// off live. Soft depublication keeps the variant around so the
    /// document can be inspected after going offline.
    #[serde(default)]
    pub hard_depublish: bool,
    /// An immediate publish cancels a pending scheduled depublication whose
    /// fire time lies strictly in the future. When both fall on the same
    /// instant the depublication wins.
    #[serde(default = "default_true")]
    pub publish_supersedes_scheduled_depublish: bool,
}

impl Default for Policy {
    fn default() -> Policy {
        Policy {
            hard_depublish: false,
            publish_supersedes_scheduled_depublish: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Result of a successfully applied transition.
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    /// Aggregate state after the transition, `None` once the handle itself
    /// was removed.
    pub state: Option<AggregateState>,
    /// Handle created by a copy.
    pub created: Option<Uuid>,
    /// Version frozen by a publish or a scheduled publication.
    pub checked_in: Option<VersionId>,
}

pub struct DocumentWorkflow {
    store: Arc<dyn ContentStore>,
    scheduler: Arc<dyn SchedulerService>,
    audit: Arc<dyn AuditSink>,
    policy: Policy,
    /// Per-handle mutexes serializing transitions, so every decision sees
    /// the state left behind by the previous transition on the same handle.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Mutations a plan performed outside the store session.
#[derive(Default)]
struct EffectState {
    checked_in: Option<VersionId>,
    created: Option<Uuid>,
    /// Triggers registered so far, as (name, group), deleted again when the
    /// transition fails to commit.
    registered: Vec<(String, String)>,
    removed: bool,
}

impl DocumentWorkflow {
    pub fn new(
        store: Arc<dyn ContentStore>,
        scheduler: Arc<dyn SchedulerService>,
        policy: Policy,
    ) -> DocumentWorkflow {
        DocumentWorkflow {
            store,
            scheduler,
            audit: Arc::new(LogSink),
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the default log-backed audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> DocumentWorkflow {
        self.audit = audit;
        self
    }

    /// Raise `event` against the handle `id` on behalf of `principal`.
    ///
    /// A rejected event leaves the handle untouched. A committed one is
    /// recorded in the audit trail.
    pub fn handle_event(
        &self,
        id: Uuid,
        principal: &Principal,
        event: &WorkflowEvent,
    ) -> Result<TransitionOutcome, HandleEventError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().expect("handle lock poisoned");

        let mut session = self.store.open();
        let handle = Handle::by_id(&mut *session, id)?;

        let effects = decide(
            &handle.aggregate_state(),
            event,
            &TransitionContext {
                principal,
                draft_owner: handle.draft_owner(),
                policy: &self.policy,
            },
        )?;

        let now = Utc::now();
        let mut tx = EffectState::default();

        for effect in &effects {
            if let Err(err) = self.apply(
                &mut *session, id, principal, now, effect, &mut tx,
            ) {
                session.refresh();
                self.compensate(&tx);
                return Err(err);
            }
        }

        if let Err(err) = session.save() {
            session.refresh();
            self.compensate(&tx);
            return Err(err.into());
        }

        drop(session);

        self.audit.record(AuditEntry::new(
            Actor::from(principal), id, event.kind()));

        let state = if tx.removed {
            self.locks.lock().expect("lock registry poisoned").remove(&id);
            None
        } else {
            let mut session = self.store.open();
            Some(Handle::by_id(&mut *session, id)?.aggregate_state())
        };

        Ok(TransitionOutcome {
            state,
            created: tx.created,
            checked_in: tx.checked_in,
        })
    }

    /// Read a handle snapshot.
    pub fn document(&self, id: Uuid) -> Result<Handle, FindHandleError> {
        let mut session = self.store.open();
        Handle::by_id(&mut *session, id)
    }

    /// Read a handle's versions metadata as stored, dangling references
    /// included.
    pub fn versions_meta(&self, id: Uuid)
    -> Result<VersionsMeta, FindHandleError> {
        Ok(self.document(id)?.versions_meta())
    }

    /// Read a handle's versions metadata with references to purged
    /// versions filtered out.
    pub fn effective_versions_meta(&self, id: Uuid)
    -> Result<VersionsMeta, FindHandleError> {
        let mut session = self.store.open();
        let record = session.handle(id)
            .map_err(FindHandleError::from)?;

        let mut meta = VersionsMeta::parse(
            record.versions_meta.as_ref().map(String::as_str));
        meta.retain_existing(|version| {
            session.version_exists(id, version).unwrap_or(false)
        });
        Ok(meta)
    }

    /// Attach or replace the campaign window.
    pub fn set_campaign(
        &self,
        id: Uuid,
        principal: &Principal,
        campaign: Campaign,
    ) -> Result<(), HandleEventError> {
        authorize(principal, Operation::Schedule)?;
        self.update_meta(id, |meta| meta.set_campaign(campaign))
    }

    pub fn remove_campaign(&self, id: Uuid, principal: &Principal)
    -> Result<(), HandleEventError> {
        authorize(principal, Operation::Schedule)?;
        self.update_meta(id, VersionsMeta::remove_campaign)
    }

    /// Attach a human label to a frozen version. Labels may reference
    /// versions later purged from history; readers filter them.
    pub fn set_version_label(
        &self,
        id: Uuid,
        principal: &Principal,
        version: VersionId,
        label: &str,
    ) -> Result<(), HandleEventError> {
        authorize(principal, Operation::Edit)?;
        self.update_meta(id, |meta| meta.set_version_label(version, label))
    }

    pub fn remove_version_label(
        &self,
        id: Uuid,
        principal: &Principal,
        version: VersionId,
    ) -> Result<(), HandleEventError> {
        authorize(principal, Operation::Edit)?;
        self.update_meta(id, |meta| meta.remove_version_label(version))
    }

    fn update_meta<F>(&self, id: Uuid, f: F) -> Result<(), HandleEventError>
    where
        F: FnOnce(&mut VersionsMeta),
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().expect("handle lock poisoned");

        let mut session = self.store.open();
        let record = session.handle(id)?;

        let mut meta = VersionsMeta::parse(
            record.versions_meta.as_ref().map(String::as_str));
        f(&mut meta);

        write_meta(&mut *session, id, &meta)?;
        session.save()?;
        Ok(())
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks.entry(id).or_default().clone()
    }

    fn apply(
        &self,
        session: &mut dyn Session,
        id: Uuid,
        principal: &Principal,
        now: DateTime<Utc>,
        effect: &Effect,
        tx: &mut EffectState,
    ) -> Result<(), HandleEventError> {
        match *effect {
            Effect::CreateDraft { from } => {
                let record = session.handle(id)?;
                let source = record.variant(from)
                    .ok_or_else(|| StoreError::NoSuchVariant(id, from))?;

                session.put_variant(id, VariantRecord {
                    state: State::Draft,
                    availability: BTreeSet::new(),
                    owner: Some(principal.name().to_string()),
                    publication_date: None,
                    last_modified: now,
                    last_modified_by: principal.name().to_string(),
                    content: source.content.clone(),
                })?;
            }

            Effect::MergeDraft => {
                let record = session.handle(id)?;
                let draft = record.variant(State::Draft)
                    .ok_or_else(||
                        StoreError::NoSuchVariant(id, State::Draft))?;
                let previous = record.variant(State::Unpublished);

                session.put_variant(id, VariantRecord {
                    state: State::Unpublished,
                    availability: previous
                        .map(|v| v.availability.clone())
                        .unwrap_or_else(preview_only),
                    owner: None,
                    publication_date: previous
                        .and_then(|v| v.publication_date),
                    last_modified: now,
                    last_modified_by: principal.name().to_string(),
                    content: draft.content.clone(),
                })?;
            }

            Effect::DiscardDraft =>
                session.remove_variant(id, State::Draft)?,

            Effect::Checkin =>
                tx.checked_in = Some(session.checkin(id)?),

            Effect::Promote => {
                let record = session.handle(id)?;
                let unpublished = record.variant(State::Unpublished)
                    .ok_or_else(||
                        StoreError::NoSuchVariant(id, State::Unpublished))?;

                session.put_variant(id, VariantRecord {
                    state: State::Published,
                    availability: live_and_preview(),
                    owner: None,
                    publication_date: Some(now),
                    last_modified: now,
                    last_modified_by: principal.name().to_string(),
                    content: unpublished.content.clone(),
                })?;
            }

            Effect::SupersedeScheduledDepublish => {
                let record = session.handle(id)?;
                let mut meta = VersionsMeta::parse(
                    record.versions_meta.as_ref().map(String::as_str));

                let pending = meta.campaign.as_ref()
                    .and_then(|campaign| campaign.publish_to);
                if let Some(to) = pending {
                    if to > now {
                        self.scheduler
                            .delete(&depublish_job(id), JOB_GROUP)?;
                        if let Some(campaign) = meta.campaign.as_mut() {
                            campaign.publish_to = None;
                        }
                        prune_campaign(&mut meta);
                        write_meta(session, id, &meta)?;
                    }
                }
            }

            Effect::ClearCampaignStart => {
                let record = session.handle(id)?;
                let mut meta = VersionsMeta::parse(
                    record.versions_meta.as_ref().map(String::as_str));

                if let Some(campaign) = meta.campaign.as_mut() {
                    campaign.publish_from = None;
                }
                prune_campaign(&mut meta);
                write_meta(session, id, &meta)?;
            }

            Effect::ClearCampaignEnd => {
                let record = session.handle(id)?;
                let mut meta = VersionsMeta::parse(
                    record.versions_meta.as_ref().map(String::as_str));

                if let Some(campaign) = meta.campaign.as_mut() {
                    campaign.publish_to = None;
                }
                prune_campaign(&mut meta);
                write_meta(session, id, &meta)?;
            }

            Effect::TakeOffline { hard } => {
                if hard {
                    session.remove_variant(id, State::Published)?;
                } else {
                    let record = session.handle(id)?;
                    let mut published = record.variant(State::Published)
                        .ok_or_else(||
                            StoreError::NoSuchVariant(id, State::Published))?
                        .clone();

                    published.availability.remove(&Availability::Live);
                    published.last_modified = now;
                    published.last_modified_by =
                        principal.name().to_string();
                    session.put_variant(id, published)?;
                }
            }

            Effect::RegisterPublishTrigger { at } => {
                let name = publish_job(id);
                self.scheduler.schedule(
                    JobInfo {
                        name: name.clone(),
                        group: JOB_GROUP.to_string(),
                        job: jobs::WORKFLOW_EVENT_JOB.to_string(),
                        attributes: job_attributes(id, "publish"),
                    },
                    Trigger::Once { at },
                )?;
                tx.registered.push((name, JOB_GROUP.to_string()));
            }

            Effect::RegisterDepublishTrigger { at } => {
                let name = depublish_job(id);
                self.scheduler.schedule(
                    JobInfo {
                        name: name.clone(),
                        group: JOB_GROUP.to_string(),
                        job: jobs::WORKFLOW_EVENT_JOB.to_string(),
                        attributes: job_attributes(id, "depublish"),
                    },
                    Trigger::Once { at },
                )?;
                tx.registered.push((name, JOB_GROUP.to_string()));
            }

            Effect::RecordCampaignStart { at } => {
                let record = session.handle(id)?;
                let mut meta = VersionsMeta::parse(
                    record.versions_meta.as_ref().map(String::as_str));

                let mut campaign = meta.campaign.take()
                    .unwrap_or_else(empty_campaign);
                campaign.publish_from = Some(at);
                if tx.checked_in.is_some() {
                    campaign.frozen_node_id = tx.checked_in;
                }
                meta.set_campaign(campaign);
                write_meta(session, id, &meta)?;
            }

            Effect::RecordCampaignEnd { at } => {
                let record = session.handle(id)?;
                let mut meta = VersionsMeta::parse(
                    record.versions_meta.as_ref().map(String::as_str));

                let mut campaign = meta.campaign.take()
                    .unwrap_or_else(empty_campaign);
                campaign.publish_to = Some(at);
                meta.set_campaign(campaign);
                write_meta(session, id, &meta)?;
            }

            Effect::CancelAllTriggers => {
                self.scheduler.delete(&publish_job(id), JOB_GROUP)?;
                self.scheduler.delete(&depublish_job(id), JOB_GROUP)?;
            }

            Effect::RemoveAllVariants => {
                for state in &[
                    State::Draft, State::Unpublished, State::Published,
                ] {
                    session.remove_variant(id, *state)?;
                }
            }

            Effect::RemoveHandle => {
                session.remove_handle(id)?;
                tx.removed = true;
            }

            Effect::DeepCopy { ref target } => {
                let record = session.handle(id)?;
                let source = record.variant(State::Unpublished)
                    .or_else(|| record.variant(State::Published))
                    .ok_or_else(||
                        StoreError::NoSuchVariant(id, State::Unpublished))?;

                // An absolute target names the full new path; a bare name
                // copies into the source's own folder.
                let (path, name) = match target.rfind('/') {
                    Some(split) =>
                        (&target[..split], &target[split + 1..]),
                    None => (record.path.as_str(), target.as_str()),
                };

                let created = session.create_handle(name, path)?;
                session.put_variant(created, VariantRecord {
                    state: State::Unpublished,
                    availability: preview_only(),
                    owner: None,
                    publication_date: None,
                    last_modified: now,
                    last_modified_by: principal.name().to_string(),
                    content: source.content.clone(),
                })?;
                tx.created = Some(created);
            }

            Effect::MoveHandle { ref target } =>
                session.move_handle(id, target)?,

            Effect::RenameHandle { ref new_name } =>
                session.rename_handle(id, new_name)?,
        }

        Ok(())
    }

    /// Undo trigger registrations of a transition that failed to commit.
    fn compensate(&self, tx: &EffectState) {
        for (name, group) in &tx.registered {
            if let Err(err) = self.scheduler.delete(name, group) {
                error!("could not undo registration of trigger {}/{}: {}",
                    group, name, err);
            }
        }
    }
}

fn publish_job(id: Uuid) -> String {
    format!("publish-{}", id)
}

fn depublish_job(id: Uuid) -> String {
    format!("depublish-{}", id)
}

fn job_attributes(id: Uuid, event: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    attributes.insert("handle".to_string(), id.to_string());
    attributes.insert("event".to_string(), event.to_string());
    attributes
}

fn empty_campaign() -> Campaign {
    Campaign {
        publish_from: None,
        publish_to: None,
        label: None,
        frozen_node_id: None,
    }
}

/// Drop the campaign once neither end of its window remains.
fn prune_campaign(meta: &mut VersionsMeta) {
    let spent = meta.campaign.as_ref()
        .map(|c| c.publish_from.is_none() && c.publish_to.is_none())
        .unwrap_or(false);
    if spent {
        meta.remove_campaign();
    }
}

fn write_meta(session: &mut dyn Session, id: Uuid, meta: &VersionsMeta)
-> Result<(), HandleEventError> {
    let raw = if meta.is_empty() {
        None
    } else {
        Some(meta.to_json().map_err(HandleEventError::Meta)?)
    };
    session.set_versions_meta(id, raw)?;
    Ok(())
}

fn preview_only() -> BTreeSet<Availability> {
    let mut set = BTreeSet::new();
    set.insert(Availability::Preview);
    set
}

fn live_and_preview() -> BTreeSet<Availability> {
    let mut set = BTreeSet::new();
    set.insert(Availability::Live);
    set.insert(Availability::Preview);
    set
}

#[derive(Debug, Fail, WorkflowError)]
pub enum HandleEventError {
    /// The state machine refused the event.
    #[fail(display = "{}", _0)]
    Rejected(#[cause] Rejection),
    /// No handle with the given id.
    #[fail(display = "No such document")]
    #[workflow(code = "handle:not-found", class = "rejected")]
    NotFound,
    /// Another transition committed first; the caller may retry.
    #[fail(display = "Concurrent modification of the document detected")]
    #[workflow(code = "workflow:concurrent-modification", class = "conflict")]
    Concurrent,
    /// Content store failure.
    #[fail(display = "Content store error: {}", _0)]
    #[workflow(internal)]
    Store(#[cause] StoreError),
    /// Scheduler failure.
    #[fail(display = "{}", _0)]
    Scheduler(#[cause] ScheduleError),
    /// Versions metadata could not be serialized.
    #[fail(display = "Could not serialize versions metadata: {}", _0)]
    #[workflow(internal)]
    Meta(#[cause] serde_json::Error),
}

impl_from! { for HandleEventError ;
    Rejection => |e| HandleEventError::Rejected(e),
    RequirePermissionsError => |e|
        HandleEventError::Rejected(Rejection::Forbidden(e)),
    ScheduleError => |e| HandleEventError::Scheduler(e),
    StoreError => |e| match e {
        StoreError::NotFound(_) => HandleEventError::NotFound,
        StoreError::Conflict => HandleEventError::Concurrent,
        _ => HandleEventError::Store(e),
    },
    FindHandleError => |e| match e {
        FindHandleError::NotFound => HandleEventError::NotFound,
        FindHandleError::Store(e) => HandleEventError::Store(e),
    }
}
