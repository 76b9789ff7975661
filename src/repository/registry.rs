// src/repository/registry.rs

use super::{RepoContext, RepoState, Repository, SYSTEM_REPO_ID};
use crate::error::{Error, Result};
use crate::logger::LogLevel;
use crate::weak_ptr::{Guard, Handle};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Repositories of a [`Base`](crate::Base), in creation order
#[derive(Debug)]
pub struct RepoRegistry {
    guard: Guard,
    ctx: RepoContext,
    repos: IndexMap<String, Arc<RwLock<Repository>>>,
}

impl RepoRegistry {
    pub(crate) fn new(guard: Guard, ctx: RepoContext) -> Self {
        Self {
            guard,
            ctx,
            repos: IndexMap::new(),
        }
    }

    /// Create a repository; identifiers are unique within the registry
    pub fn new_repo(&mut self, id: &str) -> Result<Handle<Repository>> {
        if id.is_empty() || id == SYSTEM_REPO_ID || id.chars().any(char::is_whitespace) {
            return Err(Error::ConfigError(format!("invalid repository id '{}'", id)));
        }
        if self.repos.contains_key(id) {
            return Err(Error::DuplicateId(id.to_string()));
        }

        let repo = Arc::new(RwLock::new(Repository::new(id.to_string(), self.ctx.clone())));
        let handle = self.guard.handle(&repo);
        self.repos.insert(id.to_string(), repo);

        self.ctx
            .log(LogLevel::Debug, format!("Created repository: {}", id));
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Result<Handle<Repository>> {
        self.repos
            .get(id)
            .map(|repo| self.guard.handle(repo))
            .ok_or_else(|| Error::NotFound(format!("repository '{}'", id)))
    }

    /// Handles to all repositories in creation order
    pub fn iter(&self) -> impl Iterator<Item = Handle<Repository>> + '_ {
        self.repos.values().map(|repo| self.guard.handle(repo))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.repos.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Load every enabled repository that is not loaded yet.
    ///
    /// Failures do not stop the remaining loads; they are returned together.
    pub fn load_enabled(&self) -> Vec<Error> {
        let mut errors = Vec::new();
        for handle in self.iter() {
            let result = handle.get_mut().and_then(|mut repo| {
                if repo.is_enabled() && repo.state() != RepoState::Loaded {
                    repo.load()
                } else {
                    Ok(())
                }
            });
            if let Err(e) = result {
                errors.push(e);
            }
        }
        errors
    }
}
