// src/packages/record.rs

//! Package records stored in a [`PackageRegistry`](super::PackageRegistry)

use crate::repository::SYSTEM_REPO_ID;
use crate::repository::parsers::PackageMetadata;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Position of a record in its registry; assigned in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(pub usize);

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable package entry.
///
/// Two records are equal when they have the same NEVRA and come from the same
/// repository, regardless of their registry position.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    id: PackageId,
    name: String,
    epoch: u32,
    version: String,
    release: String,
    arch: String,
    repo_id: String,
    repo_priority: i32,
    summary: Option<String>,
    description: Option<String>,
    url: Option<String>,
    location: Option<String>,
    checksum: Option<String>,
    download_size: u64,
    files: Vec<String>,
}

impl PackageRecord {
    pub(crate) fn from_metadata(
        id: PackageId,
        meta: PackageMetadata,
        repo_id: &str,
        repo_priority: i32,
        keep_files: bool,
    ) -> Self {
        Self {
            id,
            name: meta.name,
            epoch: meta.epoch,
            version: meta.version,
            release: meta.release,
            arch: meta.arch,
            repo_id: repo_id.to_string(),
            repo_priority,
            summary: meta.summary,
            description: meta.description,
            url: meta.url,
            location: meta.location,
            checksum: meta.checksum,
            download_size: meta.download_size,
            files: if keep_files { meta.files } else { Vec::new() },
        }
    }

    pub fn id(&self) -> PackageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn repo_priority(&self) -> i32 {
        self.repo_priority
    }

    /// Whether the record belongs to the system repository
    pub fn is_installed(&self) -> bool {
        self.repo_id == SYSTEM_REPO_ID
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn download_size(&self) -> u64 {
        self.download_size
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// `[epoch:]version-release`, epoch omitted when zero
    pub fn evr(&self) -> String {
        if self.epoch == 0 {
            format!("{}-{}", self.version, self.release)
        } else {
            format!("{}:{}-{}", self.epoch, self.version, self.release)
        }
    }

    /// Canonical identifier `name-[epoch:]version-release.arch`, epoch omitted when zero
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr(), self.arch)
    }

    /// `name-epoch:version-release.arch` with the epoch always present
    pub fn full_nevra(&self) -> String {
        format!(
            "{}-{}:{}-{}.{}",
            self.name, self.epoch, self.version, self.release, self.arch
        )
    }

    fn identity(&self) -> (&str, u32, &str, &str, &str, &str) {
        (
            &self.name,
            self.epoch,
            &self.version,
            &self.release,
            &self.arch,
            &self.repo_id,
        )
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nevra())
    }
}

impl PartialEq for PackageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for PackageRecord {}

impl Hash for PackageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for PackageRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nevra()
            .cmp(&other.nevra())
            .then_with(|| self.repo_id.cmp(&other.repo_id))
    }
}
