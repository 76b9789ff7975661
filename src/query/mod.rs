// src/query/mod.rs

//! Package queries
//!
//! A [`PackageQuery`] starts from a registry snapshot and narrows it with
//! filters. Every `filter_*` call works on what the previous filters left,
//! so filters compose as a logical AND. The comparison for a filter is
//! compiled when the filter is attached; a bad pattern or an operator the
//! filter does not support is reported right there.
//!
//! Results keep registry insertion order.

mod cmp;

pub use cmp::QueryCmp;

use crate::error::Result;
use crate::packages::{PackageId, PackageRecord, PackageRegistry, PackageSnapshot};
use crate::weak_ptr::Handle;
use cmp::{NumberMatcher, StringMatcher};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::slice;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct PackageQuery {
    /// Ordered by `PackageId`
    packages: Vec<Arc<PackageRecord>>,
}

impl PackageQuery {
    /// Query over everything the registry holds right now.
    ///
    /// Records inserted later are not visible to this query.
    pub fn new(registry: &Handle<PackageRegistry>) -> Result<Self> {
        registry.with(|r| Self::from_snapshot(&r.snapshot()))
    }

    pub fn from_snapshot(snapshot: &PackageSnapshot) -> Self {
        Self {
            packages: snapshot.iter().cloned().collect(),
        }
    }

    /// Query matching nothing; useful as the start of a union
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn contains(&self, id: PackageId) -> bool {
        self.position(id).is_ok()
    }

    /// Matching records in stable order; each call starts over
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.packages.iter(),
        }
    }

    /// Canonical identifiers of the matching records
    pub fn nevras(&self) -> Vec<String> {
        self.iter().map(PackageRecord::nevra).collect()
    }

    pub fn filter_name<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("name", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match(p.name())))
    }

    pub fn filter_arch<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("arch", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match(p.arch())))
    }

    pub fn filter_version<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("version", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match(p.version())))
    }

    pub fn filter_release<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("release", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match(p.release())))
    }

    /// Match against both the short and the epoch-qualified NEVRA
    pub fn filter_nevra<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("nevra", cmp, patterns)?;
        Ok(self.retain(|p| {
            let (nevra, full) = (p.nevra(), p.full_nevra());
            matcher.is_match_any([nevra.as_str(), full.as_str()])
        }))
    }

    pub fn filter_repo_id<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("repo_id", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match(p.repo_id())))
    }

    /// Keep packages shipping a matching path. Records loaded without file
    /// lists have no paths.
    pub fn filter_file<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("file", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match_any(p.files().iter().map(String::as_str))))
    }

    /// Records without a summary never match a positive comparison
    pub fn filter_summary<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("summary", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match_any(p.summary())))
    }

    pub fn filter_description<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("description", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match_any(p.description())))
    }

    pub fn filter_url<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("url", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match_any(p.url())))
    }

    /// Match the package file location relative to its repository
    pub fn filter_location<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let matcher = StringMatcher::new("location", cmp, patterns)?;
        Ok(self.retain(|p| matcher.is_match_any(p.location())))
    }

    pub fn filter_epoch(&mut self, epochs: &[u32], cmp: QueryCmp) -> Result<&mut Self> {
        let operands: Vec<i64> = epochs.iter().map(|&e| i64::from(e)).collect();
        let matcher = NumberMatcher::new("epoch", cmp, &operands)?;
        Ok(self.retain(|p| matcher.is_match(i64::from(p.epoch()))))
    }

    /// Compare the priority of the repository each record came from
    pub fn filter_repo_priority(
        &mut self,
        priorities: &[i32],
        cmp: QueryCmp,
    ) -> Result<&mut Self> {
        let operands: Vec<i64> = priorities.iter().map(|&p| i64::from(p)).collect();
        let matcher = NumberMatcher::new("repo_priority", cmp, &operands)?;
        Ok(self.retain(|p| matcher.is_match(i64::from(p.repo_priority()))))
    }

    /// Keep records of the system repository
    pub fn filter_installed(&mut self) -> &mut Self {
        self.retain(PackageRecord::is_installed)
    }

    /// Keep records of every repository except the system one
    pub fn filter_available(&mut self) -> &mut Self {
        self.retain(|p| !p.is_installed())
    }

    /// Keep all installed records, and for each name and arch only the
    /// available records from the best (lowest) priority repository.
    pub fn filter_priority(&mut self) -> &mut Self {
        let mut best: HashMap<(String, String), i32> = HashMap::new();
        for p in self.packages.iter().filter(|p| !p.is_installed()) {
            best.entry((p.name().to_string(), p.arch().to_string()))
                .and_modify(|b| *b = (*b).min(p.repo_priority()))
                .or_insert(p.repo_priority());
        }
        self.retain(|p| {
            p.is_installed()
                || best.get(&(p.name().to_string(), p.arch().to_string()))
                    == Some(&p.repo_priority())
        })
    }

    /// Add the records of `other` (union)
    pub fn update(&mut self, other: &PackageQuery) -> &mut Self {
        let mut merged: BTreeMap<PackageId, Arc<PackageRecord>> = self
            .packages
            .drain(..)
            .map(|p| (p.id(), p))
            .collect();
        for p in &other.packages {
            merged.entry(p.id()).or_insert_with(|| Arc::clone(p));
        }
        self.packages = merged.into_values().collect();
        self
    }

    /// Keep only records also in `other`
    pub fn intersection(&mut self, other: &PackageQuery) -> &mut Self {
        let keep = other.ids();
        self.retain(|p| keep.contains(&p.id()))
    }

    /// Drop records present in `other`
    pub fn difference(&mut self, other: &PackageQuery) -> &mut Self {
        let drop = other.ids();
        self.retain(|p| !drop.contains(&p.id()))
    }

    fn ids(&self) -> HashSet<PackageId> {
        self.packages.iter().map(|p| p.id()).collect()
    }

    fn position(&self, id: PackageId) -> std::result::Result<usize, usize> {
        self.packages.binary_search_by_key(&id, |p| p.id())
    }

    fn retain(&mut self, keep: impl Fn(&PackageRecord) -> bool) -> &mut Self {
        self.packages.retain(|p| keep(p));
        self
    }
}

/// Iterator over the records of a [`PackageQuery`]
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: slice::Iter<'a, Arc<PackageRecord>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a PackageRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Arc::as_ref)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(Arc::as_ref)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a PackageQuery {
    type Item = &'a PackageRecord;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::repository::SYSTEM_REPO_ID;
    use crate::repository::parsers::PackageMetadata;
    use crate::repository::tests::{Fixture, ScriptedLoader};
    use parking_lot::RwLock;

    /// Registry seeded with `pkg-1.2-3.x86_64`, `pkg-libs-1:1.3-4.x86_64`, `other-1.0-1.noarch`
    fn seeded(fixture: &Fixture) -> Arc<RwLock<PackageRegistry>> {
        let mut registry = PackageRegistry::new(
            fixture.guard.clone(),
            fixture.ctx(Arc::new(ScriptedLoader::default())),
        );
        let mut libs = PackageMetadata::new("pkg-libs", 1, "1.3", "4", "x86_64");
        libs.files.push("/usr/lib64/libpkg.so.1".to_string());
        registry.insert_batch(
            vec![
                PackageMetadata::new("pkg", 0, "1.2", "3", "x86_64"),
                libs,
                PackageMetadata::new("other", 0, "1.0", "1", "noarch"),
            ],
            "repomd-repo1",
        );
        Arc::new(RwLock::new(registry))
    }

    fn query(fixture: &Fixture, registry: &Arc<RwLock<PackageRegistry>>) -> PackageQuery {
        PackageQuery::new(&fixture.guard.handle(registry)).unwrap()
    }

    #[test]
    fn test_filter_name_exact() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);

        let mut q = query(&fixture, &registry);
        q.filter_name(&["pkg"], QueryCmp::Eq).unwrap();
        assert_eq!(q.size(), 1);
        assert_eq!(q.nevras(), vec!["pkg-1.2-3.x86_64"]);
    }

    #[test]
    fn test_filter_name_glob() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);

        let mut q = query(&fixture, &registry);
        q.filter_name(&["pkg*"], QueryCmp::Glob).unwrap();
        assert_eq!(q.nevras(), vec!["pkg-1.2-3.x86_64", "pkg-libs-1:1.3-4.x86_64"]);

        let mut none = query(&fixture, &registry);
        none.filter_name(&["kg*"], QueryCmp::Glob).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_filters_are_cumulative() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);

        let mut q = query(&fixture, &registry);
        q.filter_name(&["pkg*"], QueryCmp::Glob)
            .unwrap()
            .filter_epoch(&[1], QueryCmp::Eq)
            .unwrap();
        assert_eq!(q.nevras(), vec!["pkg-libs-1:1.3-4.x86_64"]);

        // "other" was already filtered out
        q.filter_name(&["other"], QueryCmp::Eq).unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn test_iteration_is_restartable() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);
        let q = query(&fixture, &registry);

        let first: Vec<_> = q.iter().map(|p| p.id()).collect();
        let second: Vec<_> = (&q).into_iter().map(|p| p.id()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![PackageId(0), PackageId(1), PackageId(2)]);
        assert_eq!(q.iter().len(), q.size());
    }

    #[test]
    fn test_snapshot_stability() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);
        let q = query(&fixture, &registry);

        for round in 0..3 {
            registry.write().insert_batch(
                vec![PackageMetadata::new("late", 0, &round.to_string(), "1", "noarch")],
                "late",
            );
            assert_eq!(q.size(), 3);
            assert!(q.iter().all(|p| p.name() != "late"));
        }
        assert_eq!(query(&fixture, &registry).size(), 6);
    }

    #[test]
    fn test_filter_nevra_and_arch() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);

        let mut q = query(&fixture, &registry);
        q.filter_nevra(&["pkg-0:1.2-3.x86_64"], QueryCmp::Eq).unwrap();
        assert_eq!(q.size(), 1);

        let mut q = query(&fixture, &registry);
        q.filter_arch(&["noarch"], QueryCmp::Neq).unwrap();
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn test_filter_file() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);

        let mut q = query(&fixture, &registry);
        q.filter_file(&["/usr/lib64/*"], QueryCmp::Glob).unwrap();
        assert_eq!(q.nevras(), vec!["pkg-libs-1:1.3-4.x86_64"]);
    }

    #[test]
    fn test_duplicate_patterns_do_not_duplicate_matches() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);

        let mut q = query(&fixture, &registry);
        q.filter_name(&["pkg", "pkg", "pk*"], QueryCmp::Glob).unwrap();
        assert_eq!(q.size(), 2);
        assert_eq!(q.iter().count(), 2);

        let mut q = query(&fixture, &registry);
        q.filter_name(&["pkg", "pkg"], QueryCmp::Eq).unwrap();
        assert_eq!(q.nevras(), vec!["pkg-1.2-3.x86_64"]);

        let mut union = q.clone();
        union.update(&q);
        assert_eq!(union.size(), 1);
    }

    #[test]
    fn test_filter_text_attributes() {
        let fixture = Fixture::new();
        let mut registry = PackageRegistry::new(
            fixture.guard.clone(),
            fixture.ctx(Arc::new(ScriptedLoader::default())),
        );
        let mut described = PackageMetadata::new("described", 0, "1.0", "1", "noarch");
        described.summary = Some("Shell tools".to_string());
        described.description = Some("A collection of shell tools".to_string());
        described.url = Some("https://example.org/tools".to_string());
        described.location = Some("Packages/d/described-1.0-1.noarch.rpm".to_string());
        registry.insert_batch(
            vec![described, PackageMetadata::new("bare", 0, "1.0", "1", "noarch")],
            "repo",
        );
        let registry = Arc::new(RwLock::new(registry));

        let mut q = query(&fixture, &registry);
        q.filter_summary(&["shell"], QueryCmp::IContains).unwrap();
        assert_eq!(q.nevras(), vec!["described-1.0-1.noarch"]);

        let mut q = query(&fixture, &registry);
        q.filter_description(&["*collection*"], QueryCmp::Glob).unwrap();
        assert_eq!(q.size(), 1);

        let mut q = query(&fixture, &registry);
        q.filter_url(&["https://"], QueryCmp::StartsWith).unwrap();
        assert_eq!(q.size(), 1);

        let mut q = query(&fixture, &registry);
        q.filter_location(&["Packages/d/*"], QueryCmp::NotGlob).unwrap();
        assert_eq!(q.nevras(), vec!["bare-1.0-1.noarch"]);
    }

    #[test]
    fn test_installed_available_and_priority() {
        let fixture = Fixture::new();
        let mut registry = PackageRegistry::new(
            fixture.guard.clone(),
            fixture.ctx(Arc::new(ScriptedLoader::default())),
        );
        let pkg = || PackageMetadata::new("pkg", 0, "1.2", "3", "x86_64");
        let only = PackageMetadata::new("only", 0, "1", "1", "noarch");
        let aarch64 = PackageMetadata::new("pkg", 0, "1.2", "3", "aarch64");
        registry.insert(vec![pkg()], SYSTEM_REPO_ID, 99, false);
        registry.insert(vec![pkg(), only], "low", 90, false);
        registry.insert(vec![pkg()], "best", 10, false);
        registry.insert(vec![aarch64], "low", 90, false);
        let registry = Arc::new(RwLock::new(registry));

        let mut installed = query(&fixture, &registry);
        installed.filter_installed();
        assert_eq!(installed.size(), 1);
        assert!(installed.iter().all(PackageRecord::is_installed));

        let mut available = query(&fixture, &registry);
        available.filter_available();
        assert_eq!(available.size(), 4);

        let mut prioritized = query(&fixture, &registry);
        prioritized.filter_priority();
        let kept: Vec<_> = prioritized
            .iter()
            .map(|p| format!("{}@{}", p.nevra(), p.repo_id()))
            .collect();
        assert_eq!(
            kept,
            vec![
                "pkg-1.2-3.x86_64@@System",
                "only-1-1.noarch@low",
                "pkg-1.2-3.x86_64@best",
                "pkg-1.2-3.aarch64@low",
            ]
        );

        let mut low = query(&fixture, &registry);
        low.filter_repo_priority(&[50], QueryCmp::Gt).unwrap();
        assert_eq!(low.size(), 4);
    }

    #[test]
    fn test_unsupported_cmp_rejected_at_attach() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);

        let mut q = query(&fixture, &registry);
        let err = q.filter_name(&["pkg"], QueryCmp::Gt).err().unwrap();
        assert!(matches!(err, Error::UnsupportedCmp { filter: "name", .. }));
        assert!(q.filter_epoch(&[0], QueryCmp::Glob).is_err());
        assert_eq!(q.size(), 3);
    }

    #[test]
    fn test_set_operations() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);

        let mut pkgs = query(&fixture, &registry);
        pkgs.filter_name(&["pkg*"], QueryCmp::Glob).unwrap();
        let mut noarch = query(&fixture, &registry);
        noarch.filter_arch(&["noarch"], QueryCmp::Eq).unwrap();

        let mut union = PackageQuery::empty();
        union.update(&noarch).update(&pkgs);
        assert_eq!(union.size(), 3);
        let ids: Vec<_> = union.iter().map(|p| p.id().0).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let mut both = query(&fixture, &registry);
        both.intersection(&pkgs);
        assert_eq!(both.size(), 2);
        assert!(both.contains(PackageId(1)));
        assert!(!both.contains(PackageId(2)));

        let mut rest = query(&fixture, &registry);
        rest.difference(&pkgs);
        assert_eq!(rest.nevras(), vec!["other-1.0-1.noarch"]);
    }

    #[test]
    fn test_query_needs_live_registry() {
        let fixture = Fixture::new();
        let registry = seeded(&fixture);
        let handle = fixture.guard.handle(&registry);

        fixture.guard.invalidate();
        assert!(PackageQuery::new(&handle).err().unwrap().is_invalidated());
    }
}
