//! Procedural macros for the `redline` workflow engine.

#![recursion_limit = "128"]

extern crate proc_macro;

#[macro_use] extern crate quote;
#[macro_use] extern crate synstructure;

mod workflow_error;

decl_derive!([WorkflowError, attributes(workflow)] =>
    /// Derive `WorkflowError` for an error type.
    ///
    /// Every variant must either carry a `#[workflow(...)]` attribute, naming
    /// a stable machine-readable `code` and an error `class` (`rejected`,
    /// `conflict`, or `unavailable`), or be `#[workflow(internal)]`, or have
    /// a `#[cause]` field which itself implements `WorkflowError` and to
    /// which both properties are delegated.
    workflow_error::derive_error
);
