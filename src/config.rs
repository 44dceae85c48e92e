use failure::Fail;
use log::LevelFilter;
use std::{collections::HashMap, fs, path::{Path, PathBuf}};
use toml;

use crate::workflow::Policy;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub scheduler: Scheduler,
    #[serde(default)]
    pub workflow: Policy,
}

impl Config {
    /// Read configuration from a TOML file.
    pub fn read<P>(path: P) -> crate::Result<Config>
    where
        P: AsRef<Path>,
    {
        let data = fs::read(path).map_err(ReadConfigurationError)?;
        toml::from_slice(&data).map_err(|e| ConfigurationError(e).into())
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Logging {
    /// Default logging level.
    #[serde(default = "default_level_filter")]
    pub level: LevelFilter,
    /// Custom filters.
    #[serde(default)]
    pub filters: HashMap<String, LevelFilter>,
}

/// Scheduler configuration, consumed by
/// [`Scheduler::from_config`](crate::scheduler::Scheduler::from_config).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Scheduler {
    /// Directory in which trigger definitions are persisted. When unset,
    /// triggers are kept in memory only and do not survive a restart.
    pub trigger_store: Option<PathBuf>,
}

#[derive(Debug, Fail)]
#[fail(display = "Cannot read configuration file")]
pub struct ReadConfigurationError(#[fail(cause)] std::io::Error);

#[derive(Debug, Fail)]
#[fail(display = "Invalid configuration: {}", _0)]
pub struct ConfigurationError(#[fail(cause)] toml::de::Error);

fn default_level_filter() -> LevelFilter {
    LevelFilter::Info
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: default_level_filter(),
            filters: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"
            [logging]
            level = "debug"
        "#).unwrap();

        let config = Config::read(file.path()).unwrap();

        assert_eq!(config.logging.level, LevelFilter::Debug);
        assert!(config.scheduler.trigger_store.is_none());
        assert!(!config.workflow.hard_depublish);
        assert!(config.workflow.publish_supersedes_scheduled_depublish);
    }

    #[test]
    fn workflow_policy_is_configurable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"
            [workflow]
            hard_depublish = true
            publish_supersedes_scheduled_depublish = false
        "#).unwrap();

        let config = Config::read(file.path()).unwrap();

        assert!(config.workflow.hard_depublish);
        assert!(!config.workflow.publish_supersedes_scheduled_depublish);
    }
}
