// src/repository/parsers/mod.rs

//! Repository metadata acquisition
//!
//! A [`MetadataLoader`] turns a repository source location into the list of
//! packages the repository provides. The default [`LocalRepoLoader`] reads
//! local repositories in one of two layouts:
//! - rpm-md: `repodata/repomd.xml` pointing at a (possibly compressed)
//!   `primary.xml`
//! - a flat `metadata.json` index

pub mod repomd;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the flat JSON index file
pub const JSON_INDEX: &str = "metadata.json";

/// Source of repository metadata
pub trait MetadataLoader: Send + Sync {
    /// Fetch the package list for the repository at `source`
    fn fetch(&self, source: &str) -> Result<RepoMetadata>;
}

/// Everything a repository load produces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// Metadata revision, when the source provides one
    #[serde(default)]
    pub revision: Option<String>,

    pub packages: Vec<PackageMetadata>,
}

/// Package metadata as published by a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,

    #[serde(default)]
    pub epoch: u32,

    pub version: String,

    pub release: String,

    /// Architecture (x86_64, aarch64, noarch, ...)
    pub arch: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Upstream project URL
    #[serde(default)]
    pub url: Option<String>,

    /// Package file location relative to the repository base
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub checksum: Option<String>,

    /// Compressed package size in bytes
    #[serde(default)]
    pub download_size: u64,

    /// Paths shipped by the package
    #[serde(default)]
    pub files: Vec<String>,
}

impl PackageMetadata {
    /// Create minimal package metadata
    pub fn new(name: &str, epoch: u32, version: &str, release: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            epoch,
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
            summary: None,
            description: None,
            url: None,
            location: None,
            checksum: None,
            download_size: 0,
            files: Vec::new(),
        }
    }
}

/// Loader for repositories on the local filesystem
#[derive(Debug, Default, Clone)]
pub struct LocalRepoLoader;

impl LocalRepoLoader {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a `file://` URL or plain path to a directory
    fn resolve(source: &str) -> Result<PathBuf> {
        if let Some(path) = source.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if source.contains("://") {
            return Err(Error::UnsupportedSource(source.to_string()));
        }
        Ok(PathBuf::from(source))
    }

    fn read_json_index(dir: &Path) -> Result<RepoMetadata> {
        read_json_index(&dir.join(JSON_INDEX))
    }
}

impl MetadataLoader for LocalRepoLoader {
    fn fetch(&self, source: &str) -> Result<RepoMetadata> {
        let dir = Self::resolve(source)?;
        debug!("Reading repository metadata from {}", dir.display());

        let metadata = if dir.join(repomd::REPOMD_PATH).is_file() {
            repomd::load(&dir)?
        } else if dir.join(JSON_INDEX).is_file() {
            Self::read_json_index(&dir)?
        } else {
            return Err(Error::NotFound(format!(
                "repository metadata in {}",
                dir.display()
            )));
        };

        info!(
            "Read metadata for {} packages from {}",
            metadata.packages.len(),
            dir.display()
        );
        Ok(metadata)
    }
}

/// Read a flat JSON package index
pub fn read_json_index(path: &Path) -> Result<RepoMetadata> {
    let file = File::open(path)?;
    let metadata: RepoMetadata = serde_json::from_reader(BufReader::new(file))?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_package_metadata_creation() {
        let pkg = PackageMetadata::new("test-package", 1, "1.0.0", "2", "noarch");
        assert_eq!(pkg.name, "test-package");
        assert_eq!(pkg.epoch, 1);
        assert!(pkg.files.is_empty());
    }

    #[test]
    fn test_json_index() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(JSON_INDEX),
            r#"{"packages": [
                {"name": "bash", "version": "5.2", "release": "1", "arch": "x86_64",
                 "files": ["/usr/bin/bash"]},
                {"name": "tzdata", "epoch": 2, "version": "2024a", "release": "1", "arch": "noarch"}
            ]}"#,
        )
        .unwrap();

        let source = format!("file://{}", dir.path().display());
        let metadata = LocalRepoLoader::new().fetch(&source).unwrap();

        assert_eq!(metadata.packages.len(), 2);
        assert_eq!(metadata.packages[0].files, vec!["/usr/bin/bash"]);
        assert_eq!(metadata.packages[1].epoch, 2);
        assert!(metadata.revision.is_none());
    }

    #[test]
    fn test_remote_source_unsupported() {
        let result = LocalRepoLoader::new().fetch("https://example.com/repo");
        assert!(matches!(result, Err(Error::UnsupportedSource(_))));
    }

    #[test]
    fn test_empty_dir_not_found() {
        let dir = TempDir::new().unwrap();
        let result = LocalRepoLoader::new().fetch(dir.path().to_str().unwrap());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
