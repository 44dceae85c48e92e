//! The role/ACL gate.
//!
//! Every transition is gated by whether the acting principal holds the
//! permissions its operation requires. All checks go through [`authorize`],
//! which is the single integration point for an external role system.

use crate::WorkflowError;

bitflags! {
    /// Permissions allow for a fine-grained control over which workflow
    /// operations a given principal may invoke.
    pub struct PermissionBits: i32 {
        /// All bits allocated for content lifecycle permissions.
        const MANAGE_CONTENT_BITS = 0x000000ff;
        /// Permission holder can obtain, commit, and dispose drafts.
        const EDIT_CONTENT = 0x00000001;
        /// Permission holder can publish documents.
        const PUBLISH = 0x00000002;
        /// Permission holder can take documents offline.
        const DEPUBLISH = 0x00000004;
        /// Permission holder can schedule future publications and
        /// depublications.
        const SCHEDULE = 0x00000008;
        /// Permission holder can delete documents.
        const DELETE_CONTENT = 0x00000010;
        /// Permission holder can copy documents to new locations.
        const COPY_CONTENT = 0x00000020;
        /// Permission holder can move and rename documents.
        const ARRANGE_CONTENT = 0x00000040;
    }
}

impl PermissionBits {
    /// Verify that all required permissions are present.
    ///
    /// This is the same check as `self.contains(permissions)`, but returns
    /// a typed error naming the missing bits.
    pub fn require(&self, permissions: PermissionBits)
    -> Result<(), RequirePermissionsError> {
        if self.contains(permissions) {
            Ok(())
        } else {
            Err(RequirePermissionsError(permissions - *self))
        }
    }
}

/// A workflow operation, as far as the permission system is concerned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    Edit,
    Publish,
    Depublish,
    Schedule,
    Delete,
    Copy,
    Move,
    Rename,
}

impl Operation {
    /// Permission bits a principal must hold to invoke this operation.
    pub fn required_bits(self) -> PermissionBits {
        match self {
            Operation::Edit => PermissionBits::EDIT_CONTENT,
            Operation::Publish => PermissionBits::PUBLISH,
            Operation::Depublish => PermissionBits::DEPUBLISH,
            Operation::Schedule => PermissionBits::SCHEDULE,
            Operation::Delete => PermissionBits::DELETE_CONTENT,
            Operation::Copy => PermissionBits::COPY_CONTENT,
            Operation::Move | Operation::Rename =>
                PermissionBits::ARRANGE_CONTENT,
        }
    }
}

/// The entity on whose behalf a workflow event is raised.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal {
    name: String,
    permissions: PermissionBits,
}

impl Principal {
    pub fn new<N>(name: N, permissions: PermissionBits) -> Principal
    where
        N: Into<String>,
    {
        Principal {
            name: name.into(),
            permissions,
        }
    }

    /// The principal used for actions carried out automatically by the
    /// system, such as scheduled publications. It holds every permission.
    pub fn system() -> Principal {
        Principal {
            name: "system".into(),
            permissions: PermissionBits::all(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permissions(&self) -> PermissionBits {
        self.permissions
    }
}

/// Check whether `principal` may invoke `operation`.
///
/// A failure here must short-circuit a transition before any mutation.
pub fn authorize(principal: &Principal, operation: Operation)
-> Result<(), RequirePermissionsError> {
    principal.permissions().require(operation.required_bits())
}

#[derive(Debug, Fail, WorkflowError)]
#[workflow(class = "rejected", code = "workflow:insufficient-permissions")]
#[fail(display = "Missing required permissions: {:?}", _0)]
pub struct RequirePermissionsError(PermissionBits);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_principal_passes_every_gate() {
        let system = Principal::system();

        for op in &[
            Operation::Edit, Operation::Publish, Operation::Depublish,
            Operation::Schedule, Operation::Delete, Operation::Copy,
            Operation::Move, Operation::Rename,
        ] {
            assert!(authorize(&system, *op).is_ok());
        }
    }

    #[test]
    fn missing_bits_are_reported() {
        let editor = Principal::new("editor", PermissionBits::EDIT_CONTENT);

        assert!(authorize(&editor, Operation::Edit).is_ok());
        assert!(authorize(&editor, Operation::Publish).is_err());
    }
}
