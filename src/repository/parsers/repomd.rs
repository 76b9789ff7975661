// src/repository/parsers/repomd.rs

//! rpm-md repository metadata parser
//!
//! Reads `repodata/repomd.xml`, locates the primary data file, verifies its
//! checksum and parses the package list out of `primary.xml`.

use super::{PackageMetadata, RepoMetadata};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Location of the repository index relative to the repository base
pub const REPOMD_PATH: &str = "repodata/repomd.xml";

/// The primary data entry of repomd.xml
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryLocation {
    pub href: String,
    pub checksum_type: Option<String>,
    pub checksum: Option<String>,
}

/// Parsed repomd.xml
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repomd {
    pub revision: Option<String>,
    pub primary: PrimaryLocation,
}

/// Load an rpm-md repository rooted at `dir`
pub fn load(dir: &Path) -> Result<RepoMetadata> {
    let repomd_xml = fs::read_to_string(dir.join(REPOMD_PATH))?;
    let repomd = parse_repomd(&repomd_xml)?;

    let primary_path = dir.join(&repomd.primary.href);
    debug!("Reading primary metadata from {}", primary_path.display());
    let bytes = fs::read(&primary_path)?;

    match repomd.primary.checksum_type.as_deref() {
        Some("sha256") => {
            if let Some(expected) = &repomd.primary.checksum {
                verify_sha256(&bytes, expected)?;
            }
        }
        Some(other) => debug!("Skipping verification of {} checksum", other),
        None => {}
    }

    let primary_xml = decompress(&repomd.primary.href, bytes)?;
    let packages = parse_primary_xml(&primary_xml)?;

    Ok(RepoMetadata {
        revision: repomd.revision,
        packages,
    })
}

fn verify_sha256(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = format!("{:x}", Sha256::digest(bytes));
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    debug!("Checksum verified: {}", expected);
    Ok(())
}

/// Decompress primary data based on the file extension
fn decompress(location: &str, bytes: Vec<u8>) -> Result<String> {
    let decompressed = if location.ends_with(".gz") {
        let mut gz = GzDecoder::new(bytes.as_slice());
        let mut out = Vec::new();
        gz.read_to_end(&mut out)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", location, e)))?;
        out
    } else if location.ends_with(".zst") {
        zstd::decode_all(bytes.as_slice())
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", location, e)))?
    } else {
        bytes
    };

    String::from_utf8(decompressed)
        .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in {}: {}", location, e)))
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Parse repomd.xml and find the primary data entry
pub fn parse_repomd(xml: &str) -> Result<Repomd> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut current_tag = String::new();
    let mut in_primary = false;
    let mut revision = None;
    let mut href = None;
    let mut checksum_type = None;
    let mut checksum = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e))
                if in_primary && e.name().as_ref() == b"location" =>
            {
                href = attribute(&e, b"href");
            }
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match current_tag.as_str() {
                    "data" => {
                        in_primary = attribute(&e, b"type").as_deref() == Some("primary");
                    }
                    "checksum" if in_primary => checksum_type = attribute(&e, b"type"),
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::ParseError(format!("Failed to parse repomd.xml: {}", e)))?
                    .to_string();
                match current_tag.as_str() {
                    "revision" => revision = Some(text),
                    "checksum" if in_primary => checksum = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"data" {
                    in_primary = false;
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!("Failed to parse repomd.xml: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    let href = href.ok_or_else(|| {
        Error::ParseError("Could not find primary data location in repomd.xml".to_string())
    })?;

    Ok(Repomd {
        revision,
        primary: PrimaryLocation {
            href,
            checksum_type,
            checksum,
        },
    })
}

/// Parse primary.xml and extract package metadata
pub fn parse_primary_xml(xml: &str) -> Result<Vec<PackageMetadata>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut packages = Vec::new();
    let mut buf = Vec::new();

    let mut current_package: Option<PackageBuilder> = None;
    let mut current_tag = String::new();
    let mut in_format = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match current_tag.as_str() {
                    "package" => current_package = Some(PackageBuilder::default()),
                    "format" => in_format = true,
                    _ => {}
                }
                if let Some(pkg) = current_package.as_mut() {
                    pkg.read_attributes(&e, in_format);
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(pkg) = current_package.as_mut() {
                    pkg.read_attributes(&e, in_format);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(pkg) = current_package.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| {
                            Error::ParseError(format!("Failed to parse primary.xml: {}", e))
                        })?
                        .to_string();
                    match current_tag.as_str() {
                        "name" => pkg.name = Some(text),
                        "arch" => pkg.arch = Some(text),
                        "summary" => pkg.summary = Some(text),
                        "description" => pkg.description = Some(text),
                        "checksum" => pkg.checksum = Some(text),
                        "url" => pkg.url = Some(text),
                        "file" if in_format => pkg.files.push(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"package" => {
                        if let Some(builder) = current_package.take() {
                            match builder.build() {
                                Ok(pkg) => packages.push(pkg),
                                Err(e) => warn!("Skipping package in primary.xml: {}", e),
                            }
                        }
                    }
                    b"format" => in_format = false,
                    _ => {}
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!("Failed to parse primary.xml: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(packages)
}

/// Builder for constructing PackageMetadata from XML parsing
#[derive(Default)]
struct PackageBuilder {
    name: Option<String>,
    epoch: Option<String>,
    ver: Option<String>,
    rel: Option<String>,
    arch: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    url: Option<String>,
    checksum: Option<String>,
    size: Option<String>,
    location: Option<String>,
    files: Vec<String>,
}

impl PackageBuilder {
    /// Pick up attribute-carried fields; elements may be empty or have an end tag
    fn read_attributes(&mut self, e: &BytesStart, in_format: bool) {
        match e.name().as_ref() {
            b"version" if !in_format => {
                self.epoch = attribute(e, b"epoch");
                self.ver = attribute(e, b"ver");
                self.rel = attribute(e, b"rel");
            }
            b"size" => self.size = attribute(e, b"package"),
            b"location" => self.location = attribute(e, b"href"),
            _ => {}
        }
    }

    fn build(self) -> Result<PackageMetadata> {
        let name = self
            .name
            .ok_or_else(|| Error::ParseError("Missing package name".to_string()))?;
        let epoch = match self.epoch.as_deref() {
            None | Some("") => 0,
            Some(epoch) => epoch
                .parse()
                .map_err(|e| Error::ParseError(format!("Invalid epoch for {}: {}", name, e)))?,
        };
        let version = self
            .ver
            .ok_or_else(|| Error::ParseError(format!("Missing version for {}", name)))?;
        let release = self
            .rel
            .ok_or_else(|| Error::ParseError(format!("Missing release for {}", name)))?;
        let arch = self
            .arch
            .ok_or_else(|| Error::ParseError(format!("Missing arch for {}", name)))?;
        let download_size = match self.size {
            Some(size) => size
                .parse()
                .map_err(|e| Error::ParseError(format!("Invalid size for {}: {}", name, e)))?,
            None => 0,
        };

        Ok(PackageMetadata {
            name,
            epoch,
            version,
            release,
            arch,
            summary: self.summary,
            description: self.description,
            url: self.url,
            location: self.location,
            checksum: self.checksum,
            download_size,
            files: self.files,
        })
    }
}
