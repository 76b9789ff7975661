// src/lib.rs

//! pkgcore: package management core
//!
//! A [`Base`] owns the shared subsystems of a package-management session
//! and hands out lifetime-checked handles to them.
//!
//! # Architecture
//!
//! - Weak handles: every subsystem is reached through a [`Handle`] that
//!   fails with [`Error::Invalidated`] once its `Base` is dropped
//! - Repositories: configured, then loaded through a pluggable metadata loader
//! - Package registry: append-only records with copy-on-write snapshots
//! - Queries: cumulative filters over a snapshot, with the comparison
//!   chosen per filter

pub mod base;
pub mod conf;
mod error;
pub mod logger;
pub mod packages;
pub mod query;
pub mod repository;
pub mod vars;
pub mod weak_ptr;

pub use base::Base;
pub use error::{Error, Result};
pub use packages::{LoadRepoFlags, PackageId, PackageRecord, PackageRegistry};
pub use query::{PackageQuery, QueryCmp};
pub use repository::{RepoRegistry, Repository};
pub use vars::Vars;
pub use weak_ptr::Handle;
