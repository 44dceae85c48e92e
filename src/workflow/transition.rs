//! The pure transition function.
//!
//! [`decide`] maps (current aggregate state, event, context) to either a
//! plan of [`Effect`]s or a [`Rejection`]. It performs no I/O and touches no
//! store; the engine in the parent module owns applying effects and their
//! atomicity. Keeping the decision pure makes the full legality table
//! testable without a store or a scheduler.

use chrono::{DateTime, Utc};

use crate::WorkflowError;
use crate::events::WorkflowEvent;
use crate::models::{AggregateState, State};
use crate::permissions::{authorize, Operation, Principal, RequirePermissionsError};
use super::Policy;

/// Inputs to a decision beyond the aggregate state itself.
pub struct TransitionContext<'a> {
    pub principal: &'a Principal,
    /// Principal holding the draft, when one exists.
    pub draft_owner: Option<&'a str>,
    pub policy: &'a Policy,
}

/// One step of a transition plan.
///
/// Effects are applied in order, against a single store session, and
/// committed with a single save. Scheduler effects are applied through the
/// scheduler service and compensated when the save fails.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Create a draft variant by copying content from `from`.
    CreateDraft { from: State },
    /// Copy the draft's content into the unpublished variant.
    MergeDraft,
    /// Remove the draft variant.
    DiscardDraft,
    /// Snapshot the unpublished variant into version history.
    Checkin,
    /// Copy the unpublished variant into a live published variant.
    Promote,
    /// Cancel a pending scheduled depublication lying strictly in the
    /// future, together with its campaign end.
    SupersedeScheduledDepublish,
    /// Drop the campaign's publication start, now that it happened.
    ClearCampaignStart,
    /// Drop the campaign's publication end, now that it happened.
    ClearCampaignEnd,
    /// Take the published variant offline. `hard` removes the variant
    /// entirely instead of clearing its live availability.
    TakeOffline { hard: bool },
    /// Register a publication trigger firing at `at`.
    RegisterPublishTrigger { at: DateTime<Utc> },
    /// Register a depublication trigger firing at `at`.
    RegisterDepublishTrigger { at: DateTime<Utc> },
    /// Record the campaign's publication start, frozen to the version
    /// checked in earlier in the same plan.
    RecordCampaignStart { at: DateTime<Utc> },
    /// Record the campaign's publication end.
    RecordCampaignEnd { at: DateTime<Utc> },
    /// Delete both workflow triggers of this handle, if present.
    CancelAllTriggers,
    /// Remove every variant of the handle.
    RemoveAllVariants,
    /// Remove the handle itself.
    RemoveHandle,
    /// Deep-copy the document's content to a new handle at `target`.
    DeepCopy { target: String },
    /// Re-parent the handle under `target`.
    MoveHandle { target: String },
    /// Change the handle's name in place.
    RenameHandle { new_name: String },
}

/// Compute the transition plan for `event` against `state`.
///
/// The permission gate comes first: a principal lacking the operation's
/// bits is rejected before any structural check, so probing for state
/// through error codes requires the permission anyway.
pub fn decide(
    state: &AggregateState,
    event: &WorkflowEvent,
    ctx: &TransitionContext,
) -> Result<Vec<Effect>, Rejection> {
    authorize(ctx.principal, operation_of(event))?;

    match *event {
        WorkflowEvent::EditObtain => {
            if state.being_edited {
                return if ctx.draft_owner == Some(ctx.principal.name()) {
                    // Re-obtaining one's own draft is a no-op, not an error.
                    Ok(vec![])
                } else {
                    Err(Rejection::DraftHeld {
                        owner: ctx.draft_owner.unwrap_or_default().to_string(),
                    })
                };
            }

            let from = if state.base.has_unpublished() {
                State::Unpublished
            } else if state.base.has_published() {
                State::Published
            } else {
                return Err(Rejection::invalid(event));
            };

            Ok(vec![Effect::CreateDraft { from }])
        }

        WorkflowEvent::EditCommit => {
            require_own_draft(state, ctx)?;
            Ok(vec![Effect::MergeDraft, Effect::DiscardDraft])
        }

        WorkflowEvent::EditDispose => {
            require_own_draft(state, ctx)?;
            Ok(vec![Effect::DiscardDraft])
        }

        WorkflowEvent::Publish => {
            if !state.base.has_unpublished() {
                return Err(Rejection::invalid(event));
            }

            let mut effects = vec![Effect::Checkin, Effect::Promote];
            if ctx.policy.publish_supersedes_scheduled_depublish {
                effects.push(Effect::SupersedeScheduledDepublish);
            }
            effects.push(Effect::ClearCampaignStart);
            Ok(effects)
        }

        WorkflowEvent::ScheduledPublish => {
            if !state.base.has_unpublished() {
                return Err(Rejection::invalid(event));
            }
            Ok(vec![
                Effect::Checkin,
                Effect::Promote,
                Effect::ClearCampaignStart,
            ])
        }

        WorkflowEvent::Depublish => {
            if !state.base.has_published() {
                return Err(Rejection::invalid(event));
            }
            Ok(vec![Effect::TakeOffline { hard: ctx.policy.hard_depublish }])
        }

        WorkflowEvent::ScheduledDepublish => {
            if !state.base.has_published() {
                return Err(Rejection::invalid(event));
            }
            Ok(vec![
                Effect::TakeOffline { hard: ctx.policy.hard_depublish },
                Effect::ClearCampaignEnd,
            ])
        }

        WorkflowEvent::SchedulePublish { at } => {
            if !state.base.has_unpublished() {
                return Err(Rejection::invalid(event));
            }
            Ok(vec![
                Effect::Checkin,
                Effect::RegisterPublishTrigger { at },
                Effect::RecordCampaignStart { at },
            ])
        }

        WorkflowEvent::ScheduleDepublish { at } => {
            if !state.base.has_published() {
                return Err(Rejection::invalid(event));
            }
            Ok(vec![
                Effect::RegisterDepublishTrigger { at },
                Effect::RecordCampaignEnd { at },
            ])
        }

        WorkflowEvent::Delete => {
            if state.being_edited
            && ctx.draft_owner != Some(ctx.principal.name()) {
                return Err(Rejection::DraftHeld {
                    owner: ctx.draft_owner.unwrap_or_default().to_string(),
                });
            }
            Ok(vec![
                Effect::CancelAllTriggers,
                Effect::RemoveAllVariants,
                Effect::RemoveHandle,
            ])
        }

        WorkflowEvent::Copy { ref target } => {
            if !state.base.has_unpublished() && !state.base.has_published() {
                return Err(Rejection::invalid(event));
            }
            Ok(vec![Effect::DeepCopy { target: target.clone() }])
        }

        WorkflowEvent::Move { ref target } =>
            Ok(vec![Effect::MoveHandle { target: target.clone() }]),

        WorkflowEvent::Rename { ref new_name } =>
            Ok(vec![Effect::RenameHandle { new_name: new_name.clone() }]),
    }
}

fn operation_of(event: &WorkflowEvent) -> Operation {
    match *event {
        WorkflowEvent::EditObtain
        | WorkflowEvent::EditCommit
        | WorkflowEvent::EditDispose => Operation::Edit,
        WorkflowEvent::Publish
        | WorkflowEvent::ScheduledPublish => Operation::Publish,
        WorkflowEvent::Depublish
        | WorkflowEvent::ScheduledDepublish => Operation::Depublish,
        WorkflowEvent::SchedulePublish { .. }
        | WorkflowEvent::ScheduleDepublish { .. } => Operation::Schedule,
        WorkflowEvent::Delete => Operation::Delete,
        WorkflowEvent::Copy { .. } => Operation::Copy,
        WorkflowEvent::Move { .. } => Operation::Move,
        WorkflowEvent::Rename { .. } => Operation::Rename,
    }
}

fn require_own_draft(state: &AggregateState, ctx: &TransitionContext)
-> Result<(), Rejection> {
    if !state.being_edited {
        return Err(Rejection::NoDraft);
    }

    match ctx.draft_owner {
        Some(owner) if owner == ctx.principal.name() => Ok(()),
        owner => Err(Rejection::NotDraftOwner {
            owner: owner.unwrap_or_default().to_string(),
        }),
    }
}

/// Why an event was refused.
///
/// A rejection leaves the handle byte-for-byte unchanged; it is the legal
/// answer of the state machine, not a fault.
#[derive(Debug, Fail, WorkflowError)]
pub enum Rejection {
    /// Principal lacks the permissions the operation requires.
    #[fail(display = "{}", _0)]
    Forbidden(#[cause] RequirePermissionsError),
    /// The event is not legal in the handle's current state.
    #[fail(display = "{} is not legal in the document's current state", _0)]
    #[workflow(code = "workflow:invalid-state", class = "rejected")]
    InvalidState(&'static str),
    /// Another principal holds the draft.
    #[fail(display = "A draft is already held by {:?}", owner)]
    #[workflow(code = "workflow:draft-held", class = "rejected")]
    DraftHeld { owner: String },
    /// The event requires a draft, but none exists.
    #[fail(display = "No draft exists for this document")]
    #[workflow(code = "workflow:no-draft", class = "rejected")]
    NoDraft,
    /// The draft is held by someone else than the acting principal.
    #[fail(display = "The draft is held by {:?}", owner)]
    #[workflow(code = "workflow:not-draft-owner", class = "rejected")]
    NotDraftOwner { owner: String },
}

impl Rejection {
    fn invalid(event: &WorkflowEvent) -> Rejection {
        Rejection::InvalidState(event.kind())
    }
}

impl_from! { for Rejection ;
    RequirePermissionsError => |e| Rejection::Forbidden(e),
}

#[cfg(test)]
mod tests {
    use crate::models::BaseState;
    use crate::permissions::PermissionBits;
    use super::*;

    fn state(base: BaseState, being_edited: bool) -> AggregateState {
        AggregateState { base, being_edited }
    }

    fn editor() -> Principal {
        Principal::new("alice", PermissionBits::all())
    }

    fn decide_for<'a>(
        st: &AggregateState,
        event: &WorkflowEvent,
        principal: &'a Principal,
        draft_owner: Option<&'a str>,
    ) -> Result<Vec<Effect>, Rejection> {
        let policy = Policy::default();
        decide(st, event, &TransitionContext {
            principal,
            draft_owner,
            policy: &policy,
        })
    }

    #[test]
    fn obtain_copies_from_unpublished_when_present() {
        let alice = editor();
        let effects = decide_for(
            &state(BaseState::UnpublishedAndPublished, false),
            &WorkflowEvent::EditObtain,
            &alice,
            None,
        ).unwrap();

        assert_eq!(effects, vec![Effect::CreateDraft {
            from: State::Unpublished,
        }]);
    }

    #[test]
    fn obtain_falls_back_to_published() {
        let alice = editor();
        let effects = decide_for(
            &state(BaseState::PublishedOnly, false),
            &WorkflowEvent::EditObtain,
            &alice,
            None,
        ).unwrap();

        assert_eq!(effects, vec![Effect::CreateDraft {
            from: State::Published,
        }]);
    }

    #[test]
    fn obtaining_own_draft_again_is_a_no_op() {
        let alice = editor();
        let effects = decide_for(
            &state(BaseState::UnpublishedOnly, true),
            &WorkflowEvent::EditObtain,
            &alice,
            Some("alice"),
        ).unwrap();

        assert!(effects.is_empty());
    }

    #[test]
    fn obtaining_a_foreign_draft_is_rejected() {
        let alice = editor();
        let rejection = decide_for(
            &state(BaseState::UnpublishedOnly, true),
            &WorkflowEvent::EditObtain,
            &alice,
            Some("bob"),
        ).unwrap_err();

        match rejection {
            Rejection::DraftHeld { owner } => assert_eq!(owner, "bob"),
            other => panic!("unexpected rejection: {:?}", other),
        }
    }

    #[test]
    fn commit_requires_the_draft_owner() {
        let alice = editor();
        let st = state(BaseState::UnpublishedOnly, true);

        assert!(decide_for(
            &st, &WorkflowEvent::EditCommit, &alice, Some("alice"),
        ).is_ok());

        match decide_for(&st, &WorkflowEvent::EditCommit, &alice, Some("bob")) {
            Err(Rejection::NotDraftOwner { owner }) =>
                assert_eq!(owner, "bob"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn commit_without_a_draft_is_rejected() {
        let alice = editor();
        match decide_for(
            &state(BaseState::UnpublishedOnly, false),
            &WorkflowEvent::EditCommit,
            &alice,
            None,
        ) {
            Err(Rejection::NoDraft) => {}
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn publish_requires_unpublished_content() {
        let alice = editor();
        match decide_for(
            &state(BaseState::NoVariants, false),
            &WorkflowEvent::Publish,
            &alice,
            None,
        ) {
            Err(Rejection::InvalidState(kind)) =>
                assert_eq!(kind, "publish"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn publish_checks_in_before_promoting() {
        let alice = editor();
        let effects = decide_for(
            &state(BaseState::UnpublishedOnly, false),
            &WorkflowEvent::Publish,
            &alice,
            None,
        ).unwrap();

        assert_eq!(effects[0], Effect::Checkin);
        assert_eq!(effects[1], Effect::Promote);
        assert!(effects.contains(&Effect::SupersedeScheduledDepublish));
    }

    #[test]
    fn publish_keeps_scheduled_depublish_when_policy_says_so() {
        let alice = editor();
        let policy = Policy {
            publish_supersedes_scheduled_depublish: false,
            ..Policy::default()
        };
        let effects = decide(
            &state(BaseState::UnpublishedOnly, false),
            &WorkflowEvent::Publish,
            &TransitionContext {
                principal: &alice,
                draft_owner: None,
                policy: &policy,
            },
        ).unwrap();

        assert!(!effects.contains(&Effect::SupersedeScheduledDepublish));
    }

    #[test]
    fn depublish_requires_a_live_published_variant() {
        let alice = editor();

        // Soft-depublished handles report no published variant, so a second
        // depublish is rejected rather than applied twice.
        match decide_for(
            &state(BaseState::UnpublishedOnly, false),
            &WorkflowEvent::Depublish,
            &alice,
            None,
        ) {
            Err(Rejection::InvalidState(_)) => {}
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn delete_is_blocked_by_a_foreign_draft() {
        let alice = editor();
        let st = state(BaseState::UnpublishedOnly, true);

        match decide_for(&st, &WorkflowEvent::Delete, &alice, Some("bob")) {
            Err(Rejection::DraftHeld { .. }) => {}
            other => panic!("unexpected decision: {:?}", other),
        }

        // Own draft does not block deletion.
        assert!(decide_for(
            &st, &WorkflowEvent::Delete, &alice, Some("alice"),
        ).is_ok());
    }

    #[test]
    fn permission_gate_comes_before_structural_checks() {
        let viewer = Principal::new("carol", PermissionBits::empty());

        // The state alone would also reject this event; the permission
        // failure must win.
        match decide_for(
            &state(BaseState::NoVariants, false),
            &WorkflowEvent::Publish,
            &viewer,
            None,
        ) {
            Err(Rejection::Forbidden(_)) => {}
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn schedule_records_the_campaign_window() {
        let alice = editor();
        let at = "2026-09-01T08:00:00Z".parse().unwrap();
        let effects = decide_for(
            &state(BaseState::UnpublishedOnly, false),
            &WorkflowEvent::SchedulePublish { at },
            &alice,
            None,
        ).unwrap();

        assert_eq!(effects, vec![
            Effect::Checkin,
            Effect::RegisterPublishTrigger { at },
            Effect::RecordCampaignStart { at },
        ]);
    }
}
