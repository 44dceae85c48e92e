use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::store::VariantRecord;

/// Semantic state of a variant.
///
/// This is the workflow's own notion of state, not the content store's node
/// type.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Draft,
    Unpublished,
    Published,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Draft => "draft",
            State::Unpublished => "unpublished",
            State::Published => "published",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<State, ParseStateError> {
        match s {
            "draft" => Ok(State::Draft),
            "unpublished" => Ok(State::Unpublished),
            "published" => Ok(State::Published),
            _ => Err(ParseStateError(s.to_string())),
        }
    }
}

#[derive(Debug, Fail)]
#[fail(display = "not a variant state: {:?}", _0)]
pub struct ParseStateError(String);

/// An environment under which a variant can be served.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Live,
    Preview,
}

/// A typed accessor over one physical content-node variant.
///
/// `Variant` holds no cross-variant logic; everything that needs to look at
/// more than one variant lives on [`Handle`][super::Handle].
#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    data: VariantRecord,
}

impl Variant {
    /// Construct `Variant` from its store counterpart.
    pub(crate) fn from_record(data: VariantRecord) -> Variant {
        Variant { data }
    }

    pub fn state(&self) -> State {
        self.data.state
    }

    pub fn availability(&self) -> &BTreeSet<Availability> {
        &self.data.availability
    }

    /// Is this variant servable under `environment`?
    pub fn is_available(&self, environment: Availability) -> bool {
        self.data.availability.contains(&environment)
    }

    /// Replace the availability set.
    ///
    /// `None` is normalized to the empty set and never stored; callers must
    /// not rely on `None` round-tripping.
    pub fn set_availability(
        &mut self,
        availability: Option<BTreeSet<Availability>>,
    ) {
        self.data.availability = availability.unwrap_or_default();
    }

    /// Principal holding an exclusive edit lock on this variant.
    pub fn owner(&self) -> Option<&str> {
        self.data.owner.as_ref().map(String::as_str)
    }

    pub fn publication_date(&self) -> Option<DateTime<Utc>> {
        self.data.publication_date
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.data.last_modified
    }

    pub fn last_modified_by(&self) -> &str {
        &self.data.last_modified_by
    }

    pub fn content(&self) -> &serde_json::Value {
        &self.data.content
    }
}
