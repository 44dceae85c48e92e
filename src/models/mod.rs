pub mod handle;
pub mod variant;
pub mod versions;

pub use self::handle::{
    AggregateState,
    BaseState,
    FindHandleError,
    Handle,
    StateSummary,
};
pub use self::variant::{Availability, State, Variant};
pub use self::versions::{Campaign, VersionsMeta};
