// src/packages/registry.rs

//! In-memory package registry
//!
//! Records are appended and never overwritten. The record list is shared
//! copy-on-write, so a [`PackageSnapshot`] taken before an insert keeps
//! seeing exactly the records that existed when it was taken.

use super::record::{PackageId, PackageRecord};
use crate::error::{Error, Result};
use crate::logger::LogLevel;
use crate::repository::parsers::{PackageMetadata, read_json_index};
use crate::repository::{RepoContext, RepoState, Repository, SYSTEM_REPO_ID};
use crate::weak_ptr::{Guard, Handle};
use bitflags::bitflags;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Installed-package index relative to the installroot
pub const INSTALLED_INDEX: &str = "var/lib/pkgcore/installed.json";

/// Priority given to records inserted without a repository configuration
pub const DEFAULT_PRIORITY: i32 = 99;

bitflags! {
    /// Optional metadata to take over when loading a repository
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoadRepoFlags: u32 {
        const NONE = 0;
        const USE_FILELISTS = 1 << 0;
        const USE_OTHER = 1 << 1;
        const USE_PRESTO = 1 << 2;
        const USE_UPDATEINFO = 1 << 3;
    }
}

/// Immutable view of the registry contents at one point in time
#[derive(Debug, Clone, Default)]
pub struct PackageSnapshot {
    records: Arc<Vec<Arc<PackageRecord>>>,
}

impl PackageSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: PackageId) -> Option<&Arc<PackageRecord>> {
        self.records.get(id.0)
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.records.iter()
    }
}

#[derive(Debug)]
pub struct PackageRegistry {
    guard: Guard,
    ctx: RepoContext,
    records: Arc<Vec<Arc<PackageRecord>>>,
    /// Record count per originating repository, in first-insert order
    repo_counts: IndexMap<String, usize>,
    system_repo: Option<Arc<RwLock<Repository>>>,
}

impl PackageRegistry {
    pub(crate) fn new(guard: Guard, ctx: RepoContext) -> Self {
        Self {
            guard,
            ctx,
            records: Arc::new(Vec::new()),
            repo_counts: IndexMap::new(),
            system_repo: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Repositories that contributed records, in first-insert order
    pub fn repo_ids(&self) -> impl Iterator<Item = &str> {
        self.repo_counts.keys().map(String::as_str)
    }

    pub fn count_in_repo(&self, repo_id: &str) -> usize {
        self.repo_counts.get(repo_id).copied().unwrap_or(0)
    }

    /// Append records originating from `repo_id`. Nothing is deduplicated.
    ///
    /// Returns the number of records inserted.
    pub fn insert_batch(
        &mut self,
        packages: impl IntoIterator<Item = PackageMetadata>,
        repo_id: &str,
    ) -> usize {
        self.insert(packages, repo_id, DEFAULT_PRIORITY, true)
    }

    pub(crate) fn insert(
        &mut self,
        packages: impl IntoIterator<Item = PackageMetadata>,
        repo_id: &str,
        priority: i32,
        keep_files: bool,
    ) -> usize {
        let records = Arc::make_mut(&mut self.records);
        let before = records.len();
        for meta in packages {
            let id = PackageId(records.len());
            records.push(Arc::new(PackageRecord::from_metadata(
                id, meta, repo_id, priority, keep_files,
            )));
        }
        let inserted = records.len() - before;

        *self.repo_counts.entry(repo_id.to_string()).or_insert(0) += inserted;
        debug!("Inserted {} records from {}", inserted, repo_id);
        inserted
    }

    /// Insert the packages of a loaded repository.
    ///
    /// File lists are only kept with [`LoadRepoFlags::USE_FILELISTS`].
    pub fn load_repo(&mut self, repo: &Handle<Repository>, flags: LoadRepoFlags) -> Result<usize> {
        let repo = repo.get()?;
        if repo.state() != RepoState::Loaded {
            return Err(Error::NotLoaded(repo.id().to_string()));
        }

        let unavailable = flags - LoadRepoFlags::USE_FILELISTS;
        if !unavailable.is_empty() {
            debug!(
                "Repository {}: {:?} metadata not provided by the loader",
                repo.id(),
                unavailable
            );
        }

        let priority = *repo.config().priority.get();
        let inserted = self.insert(
            repo.packages().iter().cloned(),
            repo.id(),
            priority,
            flags.contains(LoadRepoFlags::USE_FILELISTS),
        );
        self.ctx.log(
            LogLevel::Info,
            format!("Loaded {} packages from {} into the registry", inserted, repo.id()),
        );
        Ok(inserted)
    }

    /// Create the repository of installed packages.
    ///
    /// With `load_installed`, records from the installroot's installed-package
    /// index are inserted under [`SYSTEM_REPO_ID`] when the index exists. A
    /// registry has at most one system repository; a second call fails with
    /// [`Error::SystemRepoExists`].
    pub fn create_system_repo(&mut self, load_installed: bool) -> Result<Handle<Repository>> {
        if self.system_repo.is_some() {
            return Err(Error::SystemRepoExists);
        }

        let installed = if load_installed {
            let installroot = self.ctx.config.with(|c| c.installroot.get().clone())?;
            let index = installroot.join(INSTALLED_INDEX);
            if index.is_file() {
                read_json_index(&index)?.packages
            } else {
                debug!("No installed-package index at {}", index.display());
                Vec::new()
            }
        } else {
            Vec::new()
        };

        let repo = Arc::new(RwLock::new(Repository::new_system(self.ctx.clone())));
        let handle = self.guard.handle(&repo);
        self.system_repo = Some(repo);

        let count = self.insert(installed, SYSTEM_REPO_ID, DEFAULT_PRIORITY, true);
        self.ctx.log(
            LogLevel::Debug,
            format!("Created system repository with {} installed packages", count),
        );
        Ok(handle)
    }

    pub fn system_repo(&self) -> Option<Handle<Repository>> {
        self.system_repo.as_ref().map(|repo| self.guard.handle(repo))
    }

    /// Current contents; later inserts do not affect the returned view
    pub fn snapshot(&self) -> PackageSnapshot {
        PackageSnapshot {
            records: Arc::clone(&self.records),
        }
    }
}
