//! Labeled versions and scheduled campaign windows.
//!
//! `VersionsMeta` is advisory metadata attached to a handle and serialized
//! as a single JSON string property on it. It is not load-bearing for basic
//! publish/depublish, which drives the graceful-degradation policy on parse
//! failures.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::store::VersionId;

/// Version of the persisted schema. Bump when adding fields that lenient
/// JSON parsing alone cannot carry.
pub const SCHEMA_VERSION: u32 = 1;

/// A scheduled future availability window tied to a specific historical
/// version.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Frozen node this campaign refers to. May dangle if the version was
    /// purged from history; readers ignore dangling references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_node_id: Option<VersionId>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionsMeta {
    #[serde(default = "default_schema")]
    pub schema: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<Campaign>,
    /// Mapping from frozen node id to a human label.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub version_labels: BTreeMap<Uuid, String>,
}

fn default_schema() -> u32 {
    SCHEMA_VERSION
}

impl Default for VersionsMeta {
    fn default() -> VersionsMeta {
        VersionsMeta {
            schema: SCHEMA_VERSION,
            campaign: None,
            version_labels: BTreeMap::new(),
        }
    }
}

impl VersionsMeta {
    /// Deserialize the stored property.
    ///
    /// Malformed JSON degrades to the empty value with an error logged;
    /// campaign and label data is advisory and must never fail a workflow.
    pub fn parse(raw: Option<&str>) -> VersionsMeta {
        let raw = match raw {
            Some(raw) => raw,
            None => return VersionsMeta::default(),
        };

        match serde_json::from_str(raw) {
            Ok(meta) => meta,
            Err(err) => {
                error!("Malformed versions metadata, treating as empty: {}",
                    err);
                VersionsMeta::default()
            }
        }
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.campaign.is_none() && self.version_labels.is_empty()
    }

    pub fn set_campaign(&mut self, campaign: Campaign) {
        self.campaign = Some(campaign);
    }

    pub fn remove_campaign(&mut self) {
        self.campaign = None;
    }

    pub fn set_version_label<L>(&mut self, version: VersionId, label: L)
    where
        L: Into<String>,
    {
        self.version_labels.insert(version, label.into());
    }

    pub fn remove_version_label(&mut self, version: VersionId) {
        self.version_labels.remove(&version);
    }

    /// Drop entries referencing versions that no longer exist in history.
    ///
    /// Dangling references are tolerated in storage; this is for readers
    /// who want a clean view.
    pub fn retain_existing<F>(&mut self, mut exists: F)
    where
        F: FnMut(VersionId) -> bool,
    {
        if let Some(ref campaign) = self.campaign {
            if let Some(frozen) = campaign.frozen_node_id {
                if !exists(frozen) {
                    self.campaign = None;
                }
            }
        }

        self.version_labels.retain(|version, _| exists(*version));
    }
}
