// src/conf.rs

//! Priority-layered configuration options
//!
//! Every option remembers the [`Priority`] of the source that last set it. A
//! write only takes effect when it comes from the same or a higher priority,
//! so a runtime override is never clobbered by a later config-file value.
//! Parsing configuration files is left to the host; the structs here
//! deserialize from any serde source.

use crate::logger::LogLevel;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

/// Default metadata expiry: 48 hours
pub const DEFAULT_METADATA_EXPIRE: i64 = 48 * 60 * 60;

/// Source priority of an option value, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Empty,
    Default,
    MainConfig,
    AutoMainConfig,
    RepoConfig,
    Plugin,
    CommandLine,
    Runtime,
}

/// A configuration value together with the priority that set it
#[derive(Debug, Clone, PartialEq)]
pub struct OptionValue<T> {
    value: T,
    priority: Priority,
}

impl<T> OptionValue<T> {
    /// Option holding its built-in default
    pub fn new(default: T) -> Self {
        Self {
            value: default,
            priority: Priority::Default,
        }
    }

    /// Option with an explicit priority
    pub fn with_priority(value: T, priority: Priority) -> Self {
        Self { value, priority }
    }

    /// Set the value if `priority` is at least the current one.
    ///
    /// Returns whether the value was applied.
    pub fn set(&mut self, priority: Priority, value: T) -> bool {
        if priority < self.priority {
            return false;
        }
        self.value = value;
        self.priority = priority;
        true
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl<T: Default> OptionValue<T> {
    /// Option with no value set yet
    pub fn empty() -> Self {
        Self {
            value: T::default(),
            priority: Priority::Empty,
        }
    }
}

impl<T: Default> Default for OptionValue<T> {
    fn default() -> Self {
        Self::empty()
    }
}

// Values read from a serde source count as main configuration.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for OptionValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(|value| Self::with_priority(value, Priority::MainConfig))
    }
}

/// Main configuration owned by a [`Base`](crate::Base)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigMain {
    pub installroot: OptionValue<PathBuf>,
    pub varsdir: OptionValue<Vec<PathBuf>>,
    pub log_level: OptionValue<LogLevel>,
    /// Seconds after which loaded repository metadata counts as expired
    pub metadata_expire: OptionValue<i64>,
}

impl Default for ConfigMain {
    fn default() -> Self {
        Self {
            installroot: OptionValue::new(PathBuf::from("/")),
            varsdir: OptionValue::new(vec![
                PathBuf::from("/etc/pkgcore/vars"),
                PathBuf::from("/etc/dnf/vars"),
            ]),
            log_level: OptionValue::new(LogLevel::Info),
            metadata_expire: OptionValue::new(DEFAULT_METADATA_EXPIRE),
        }
    }
}

/// Per-repository configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigRepo {
    pub name: OptionValue<String>,
    /// Metadata source; mandatory for loading
    pub baseurl: OptionValue<Option<String>>,
    pub enabled: OptionValue<bool>,
    /// Lower value is preferred
    pub priority: OptionValue<i32>,
    /// Falls back to the main configuration when unset
    pub metadata_expire: OptionValue<Option<i64>>,
}

impl Default for ConfigRepo {
    fn default() -> Self {
        Self {
            name: OptionValue::empty(),
            baseurl: OptionValue::empty(),
            enabled: OptionValue::new(true),
            priority: OptionValue::new(99),
            metadata_expire: OptionValue::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_layering() {
        let mut opt = OptionValue::new(10);
        assert_eq!(opt.priority(), Priority::Default);

        assert!(opt.set(Priority::Runtime, 20));
        assert!(!opt.set(Priority::MainConfig, 30));
        assert_eq!(*opt.get(), 20);

        // same priority overwrites
        assert!(opt.set(Priority::Runtime, 40));
        assert_eq!(*opt.get(), 40);
    }

    #[test]
    fn test_empty_option() {
        let mut baseurl: OptionValue<Option<String>> = OptionValue::empty();
        assert_eq!(baseurl.priority(), Priority::Empty);
        assert!(baseurl.get().is_none());

        baseurl.set(Priority::RepoConfig, Some("file:///srv/repo".to_string()));
        assert_eq!(baseurl.get().as_deref(), Some("file:///srv/repo"));
    }

    #[test]
    fn test_deserialize_main_config() {
        let config: ConfigMain =
            serde_json::from_str(r#"{"installroot": "/mnt/sysimage", "log_level": "debug"}"#)
                .unwrap();

        assert_eq!(config.installroot.get(), &PathBuf::from("/mnt/sysimage"));
        assert_eq!(config.installroot.priority(), Priority::MainConfig);
        assert_eq!(*config.log_level.get(), LogLevel::Debug);
        assert_eq!(*config.metadata_expire.get(), DEFAULT_METADATA_EXPIRE);
        assert_eq!(config.metadata_expire.priority(), Priority::Default);
    }

    #[test]
    fn test_repo_defaults() {
        let config = ConfigRepo::default();
        assert!(*config.enabled.get());
        assert_eq!(*config.priority.get(), 99);
        assert!(config.baseurl.get().is_none());
    }
}
