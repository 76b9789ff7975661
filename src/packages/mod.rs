// src/packages/mod.rs

//! Package records and the registry holding them
//!
//! Records enter the [`PackageRegistry`] from loaded repositories or from the
//! installed-package index, and are read back through snapshots.

mod record;
mod registry;

pub use record::{PackageId, PackageRecord};
pub use registry::{
    DEFAULT_PRIORITY, INSTALLED_INDEX, LoadRepoFlags, PackageRegistry, PackageSnapshot,
};
