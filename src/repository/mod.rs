// src/repository/mod.rs

//! Repository management
//!
//! This module provides functionality for:
//! - Creating repositories in a [`RepoRegistry`]
//! - Configuring them before their metadata is loaded
//! - Loading metadata through a [`MetadataLoader`](parsers::MetadataLoader)
//! - Tracking load state and metadata expiry

pub mod parsers;
mod registry;

pub use registry::RepoRegistry;

use crate::conf::{ConfigMain, ConfigRepo, DEFAULT_METADATA_EXPIRE};
use crate::error::{Error, Result};
use crate::logger::{LogLevel, Logger};
use crate::vars::Vars;
use crate::weak_ptr::Handle;
use chrono::{DateTime, Utc};
use parsers::{MetadataLoader, PackageMetadata, RepoMetadata};
use std::fmt;
use std::sync::Arc;

/// Identifier of the repository holding installed packages
pub const SYSTEM_REPO_ID: &str = "@System";

/// Load state of a repository.
///
/// `Unloaded -> Loading -> Loaded | Failed`; a failed repository may be loaded
/// again, a loaded one only through [`Repository::reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoType {
    /// Repository of packages available for installation
    Available,
    /// Locally installed packages
    System,
}

/// Base-owned services every repository needs
#[derive(Clone)]
pub struct RepoContext {
    pub config: Handle<ConfigMain>,
    pub vars: Handle<Vars>,
    pub logger: Handle<Logger>,
    pub loader: Arc<dyn MetadataLoader>,
}

impl fmt::Debug for RepoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoContext")
            .field("config", &self.config)
            .field("vars", &self.vars)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

impl RepoContext {
    /// Log through the base logger. A logger that is gone or busy drops the message.
    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        if let Ok(mut logger) = self.logger.get_mut() {
            logger.log(level, message);
        }
    }
}

pub struct Repository {
    id: String,
    repo_type: RepoType,
    config: ConfigRepo,
    state: RepoState,
    metadata: Option<RepoMetadata>,
    loaded_at: Option<DateTime<Utc>>,
    ctx: RepoContext,
}

impl Repository {
    pub(crate) fn new(id: String, ctx: RepoContext) -> Self {
        let mut config = ConfigRepo::default();
        config.name.set(crate::conf::Priority::Default, id.clone());
        Self {
            id,
            repo_type: RepoType::Available,
            config,
            state: RepoState::Unloaded,
            metadata: None,
            loaded_at: None,
            ctx,
        }
    }

    /// The system repository has no source; its packages are inserted directly.
    pub(crate) fn new_system(ctx: RepoContext) -> Self {
        let mut repo = Self::new(SYSTEM_REPO_ID.to_string(), ctx);
        repo.repo_type = RepoType::System;
        repo.state = RepoState::Loaded;
        repo.loaded_at = Some(Utc::now());
        repo
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_type(&self) -> RepoType {
        self.repo_type
    }

    pub fn state(&self) -> RepoState {
        self.state
    }

    pub fn config(&self) -> &ConfigRepo {
        &self.config
    }

    /// Mutable configuration; rejected with [`Error::AlreadyLoaded`] once loaded
    pub fn config_mut(&mut self) -> Result<&mut ConfigRepo> {
        if self.state == RepoState::Loaded {
            return Err(Error::AlreadyLoaded(self.id.clone()));
        }
        Ok(&mut self.config)
    }

    pub fn is_enabled(&self) -> bool {
        *self.config.enabled.get()
    }

    /// When metadata was last loaded
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Metadata revision reported by the source
    pub fn revision(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.revision.as_deref())
    }

    /// Packages fetched by the last successful load
    pub fn packages(&self) -> &[PackageMetadata] {
        self.metadata
            .as_ref()
            .map(|m| m.packages.as_slice())
            .unwrap_or_default()
    }

    pub fn package_count(&self) -> usize {
        self.packages().len()
    }

    /// Fetch metadata from the configured source.
    ///
    /// Fails with [`Error::AlreadyLoaded`] when already loaded; use
    /// [`reload`](Self::reload) to fetch again. On failure the repository is
    /// left in [`RepoState::Failed`] and the loader error is returned wrapped
    /// in [`Error::RepoLoad`]. A failed load may be retried.
    pub fn load(&mut self) -> Result<()> {
        if self.state == RepoState::Loaded {
            return Err(Error::AlreadyLoaded(self.id.clone()));
        }

        self.state = RepoState::Loading;
        self.ctx
            .log(LogLevel::Debug, format!("Loading repository: {}", self.id));

        match self.fetch() {
            Ok(metadata) => {
                self.ctx.log(
                    LogLevel::Info,
                    format!(
                        "Loaded {} packages from repository {}",
                        metadata.packages.len(),
                        self.id
                    ),
                );
                self.metadata = Some(metadata);
                self.loaded_at = Some(Utc::now());
                self.state = RepoState::Loaded;
                Ok(())
            }
            Err(e) => {
                self.ctx.log(
                    LogLevel::Error,
                    format!("Failed to load repository {}: {}", self.id, e),
                );
                self.metadata = None;
                self.state = RepoState::Failed;
                Err(Error::RepoLoad {
                    repo_id: self.id.clone(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Drop loaded metadata and load again
    pub fn reload(&mut self) -> Result<()> {
        if self.repo_type == RepoType::System {
            return Err(Error::ConfigError(
                "the system repository cannot be reloaded".to_string(),
            ));
        }
        self.state = RepoState::Unloaded;
        self.metadata = None;
        self.loaded_at = None;
        self.load()
    }

    /// Whether loaded metadata is older than `metadata_expire`.
    ///
    /// Never-loaded repositories are expired; a negative expiry never expires.
    pub fn is_expired(&self) -> bool {
        let Some(loaded_at) = self.loaded_at else {
            return true;
        };
        let expire = match self.config.metadata_expire.get() {
            Some(expire) => *expire,
            None => self
                .ctx
                .config
                .with(|c| *c.metadata_expire.get())
                .unwrap_or(DEFAULT_METADATA_EXPIRE),
        };
        if expire < 0 {
            return false;
        }
        let age = Utc::now().signed_duration_since(loaded_at).num_seconds();
        age > expire
    }

    fn fetch(&self) -> Result<RepoMetadata> {
        if self.repo_type == RepoType::System {
            return Err(Error::ConfigError(
                "the system repository has no metadata source".to_string(),
            ));
        }
        let baseurl = self.config.baseurl.get().clone().ok_or_else(|| {
            Error::ConfigError(format!("baseurl is not set for repository '{}'", self.id))
        })?;
        let source = self.ctx.vars.with(|vars| vars.substitute(&baseurl))?;
        self.ctx.loader.fetch(&source)
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("id", &self.id)
            .field("repo_type", &self.repo_type)
            .field("state", &self.state)
            .field("packages", &self.package_count())
            .finish()
    }
}
