#[macro_use] extern crate bitflags;
#[macro_use] extern crate failure;
#[macro_use] extern crate failure_derive;
#[macro_use] extern crate log;
#[macro_use] extern crate serde_derive;

pub use redline_macros::*;

pub use crate::error::{ErrorClass, WorkflowError};

#[macro_use] mod macros;

pub mod advisory;
pub mod audit;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod permissions;
pub mod scheduler;
pub mod store;
pub mod workflow;

pub type Result<T, E=failure::Error> = std::result::Result<T, E>;
