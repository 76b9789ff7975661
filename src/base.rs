// src/base.rs

//! The root object owning every subsystem
//!
//! A [`Base`] creates its configuration, logger, variables, repository
//! registry and package registry up front and hands out [`Handle`]s to
//! them. Dropping the base invalidates all of those handles before the
//! subsystems are released.

use crate::conf::ConfigMain;
use crate::error::Result;
use crate::logger::Logger;
use crate::packages::PackageRegistry;
use crate::repository::parsers::{LocalRepoLoader, MetadataLoader};
use crate::repository::{RepoContext, RepoRegistry};
use crate::vars::Vars;
use crate::weak_ptr::{Guard, Handle};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

pub struct Base {
    guard: Guard,
    config: Arc<RwLock<ConfigMain>>,
    logger: Arc<RwLock<Logger>>,
    vars: Arc<RwLock<Vars>>,
    repo_registry: Arc<RwLock<RepoRegistry>>,
    package_registry: Arc<RwLock<PackageRegistry>>,
}

impl Base {
    /// Base with default configuration reading repositories from the local filesystem
    pub fn new() -> Self {
        Self::with_config(ConfigMain::default())
    }

    pub fn with_config(config: ConfigMain) -> Self {
        Self::with_loader(config, Arc::new(LocalRepoLoader::new()))
    }

    /// Base fetching repository metadata through `loader`
    pub fn with_loader(config: ConfigMain, loader: Arc<dyn MetadataLoader>) -> Self {
        let guard = Guard::new();
        let logger = Arc::new(RwLock::new(Logger::new(*config.log_level.get())));
        let config = Arc::new(RwLock::new(config));
        let vars = Arc::new(RwLock::new(Vars::new()));

        let ctx = RepoContext {
            config: guard.handle(&config),
            vars: guard.handle(&vars),
            logger: guard.handle(&logger),
            loader,
        };
        let repo_registry = Arc::new(RwLock::new(RepoRegistry::new(guard.clone(), ctx.clone())));
        let package_registry = Arc::new(RwLock::new(PackageRegistry::new(guard.clone(), ctx)));

        debug!("Created base");
        Self {
            guard,
            config,
            logger,
            vars,
            repo_registry,
            package_registry,
        }
    }

    pub fn get_config(&self) -> Handle<ConfigMain> {
        self.guard.handle(&self.config)
    }

    pub fn get_logger(&self) -> Handle<Logger> {
        self.guard.handle(&self.logger)
    }

    pub fn get_vars(&self) -> Handle<Vars> {
        self.guard.handle(&self.vars)
    }

    pub fn get_repo_registry(&self) -> Handle<RepoRegistry> {
        self.guard.handle(&self.repo_registry)
    }

    pub fn get_package_registry(&self) -> Handle<PackageRegistry> {
        self.guard.handle(&self.package_registry)
    }

    /// Populate the variables: `arch`/`basearch` from the running machine,
    /// then the configured vars directories and the environment.
    pub fn load_vars(&self) -> Result<()> {
        let (installroot, dirs) = self
            .get_config()
            .with(|c| (c.installroot.get().clone(), c.varsdir.get().clone()))?;

        let mut vars = self.get_vars().get_mut()?;
        let arch = std::env::consts::ARCH;
        vars.set("arch", arch);
        vars.set("basearch", basearch(arch));
        vars.load(&installroot, &dirs)
    }
}

impl Default for Base {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Base {
    fn drop(&mut self) {
        self.guard.invalidate();
        debug!("Base dropped, handles invalidated");
    }
}

fn basearch(arch: &str) -> &str {
    match arch {
        "x86" | "i386" | "i586" | "i686" => "i386",
        "arm" => "armhfp",
        "powerpc64" => "ppc64",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::packages::LoadRepoFlags;
    use crate::query::{PackageQuery, QueryCmp};
    use crate::repository::parsers::PackageMetadata;

    #[test]
    fn test_handles_invalid_after_drop() {
        let base = Base::new();
        let config = base.get_config();
        let logger = base.get_logger();
        let vars = base.get_vars();
        let repos = base.get_repo_registry();
        let packages = base.get_package_registry();
        let vars_clone = vars.clone();

        assert!(config.is_valid());
        assert!(packages.is_valid());
        assert!(vars.has_same_guard(&repos));

        drop(base);

        assert!(!config.is_valid());
        assert!(!logger.is_valid());
        assert!(!vars.is_valid());
        assert!(!vars_clone.is_valid());
        assert!(!repos.is_valid());
        assert!(!packages.is_valid());
        assert!(matches!(vars.get(), Err(Error::Invalidated("Vars"))));
        assert!(repos.get_mut().err().unwrap().is_invalidated());
    }

    #[test]
    fn test_bases_are_independent() {
        let first = Base::new();
        let second = Base::new();
        let vars = second.get_vars();
        assert!(!first.get_vars().has_same_guard(&vars));

        drop(first);
        assert!(vars.is_valid());
    }

    #[test]
    fn test_vars_through_handle() {
        let base = Base::new();
        let vars = base.get_vars();

        vars.with_mut(|v| v.set("releasever", "41")).unwrap();
        let value = base
            .get_vars()
            .with(|v| v.get("releasever").map(str::to_string))
            .unwrap();
        assert_eq!(value.unwrap(), "41");
        assert!(matches!(
            vars.with(|v| v.get("missing").map(str::to_string)).unwrap(),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_load_vars_sets_arch() {
        let root = tempfile::TempDir::new().unwrap();
        let mut config = ConfigMain::default();
        config
            .installroot
            .set(crate::conf::Priority::Runtime, root.path().to_path_buf());
        let base = Base::with_config(config);

        base.load_vars().unwrap();
        let vars = base.get_vars();
        let vars = vars.get().unwrap();
        assert_eq!(vars.get("arch").unwrap(), std::env::consts::ARCH);
        assert!(vars.contains("basearch"));
    }

    #[test]
    fn test_registry_to_query_flow() {
        let base = Base::new();
        let packages = base.get_package_registry();

        packages
            .with_mut(|p| {
                p.insert_batch(
                    vec![
                        PackageMetadata::new("pkg", 0, "1.2", "3", "x86_64"),
                        PackageMetadata::new("other", 0, "1.0", "1", "noarch"),
                    ],
                    "local",
                )
            })
            .unwrap();

        let mut query = PackageQuery::new(&packages).unwrap();
        query.filter_name(&["pk*"], QueryCmp::Glob).unwrap();
        assert_eq!(query.nevras(), vec!["pkg-1.2-3.x86_64"]);

        drop(base);
        // the query keeps its own records
        assert_eq!(query.size(), 1);
        assert!(PackageQuery::new(&packages).is_err());
    }

    #[test]
    fn test_unloaded_repo_cannot_be_inserted() {
        let base = Base::new();
        let repo = base
            .get_repo_registry()
            .with_mut(|r| r.new_repo("fedora"))
            .unwrap()
            .unwrap();

        let result = base
            .get_package_registry()
            .with_mut(|p| p.load_repo(&repo, LoadRepoFlags::NONE))
            .unwrap();
        assert!(matches!(result, Err(Error::NotLoaded(_))));
    }

    #[test]
    fn test_basearch() {
        assert_eq!(basearch("i686"), "i386");
        assert_eq!(basearch("x86_64"), "x86_64");
        assert_eq!(basearch("aarch64"), "aarch64");
    }
}
