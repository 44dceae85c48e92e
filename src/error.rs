use failure::Fail;
use std::borrow::Cow;

/// Broad classification of a workflow error, telling callers how to react.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The event is not legal in the current state, or the acting principal
    /// lacks a required permission. No mutation occurred and the request is
    /// safe to retry once the state changes.
    Rejected,
    /// A conflicting concurrent writer was detected. The caller should
    /// refresh and retry the whole transition, not just the failed write.
    Conflict,
    /// A required external service could not be reached.
    Unavailable,
    /// Internal error, not intended to be reported to users in detail.
    Internal,
}

/// An error produced while processing a workflow request.
pub trait WorkflowError: Fail {
    /// Classification of this error.
    fn class(&self) -> ErrorClass;

    /// Stable machine-readable code describing this error.
    ///
    /// This code is used to identify the error outside the system, and thus
    /// should only be present for errors which are intended to be reported
    /// to the user in detail.
    fn code(&self) -> Option<Cow<'static, str>>;
}
