// src/vars.rs

//! Substitution variables
//!
//! Variables are plain string pairs. They are referenced from configuration
//! values as `$name` or `${name}`.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment prefix for arbitrary variables (`DNF_VAR_<name>`)
const ENV_VAR_PREFIX: &str = "DNF_VAR_";

/// Variable store owned by a [`Base`](crate::Base)
#[derive(Debug, Default, Clone)]
pub struct Vars {
    variables: BTreeMap<String, String>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Value of a variable; a missing variable is an error, never an empty string
    pub fn get(&self, name: &str) -> Result<&str> {
        self.variables
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::NotFound(format!("variable '{}'", name)))
    }

    pub fn unset(&mut self, name: &str) -> Option<String> {
        self.variables.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Expand `$name` and `${name}` references in `text`.
    ///
    /// Unknown references and a `$` not followed by a name are left untouched.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(braced) = after.strip_prefix('{') {
                if let Some(end) = braced.find('}') {
                    let name = &braced[..end];
                    if is_var_name(name) {
                        if let Some(value) = self.variables.get(name) {
                            out.push_str(value);
                            rest = &braced[end + 1..];
                            continue;
                        }
                    }
                }
                out.push('$');
                rest = after;
                continue;
            }

            let name_len = after
                .find(|c: char| !is_var_char(c))
                .unwrap_or(after.len());
            let name = &after[..name_len];
            match self.variables.get(name) {
                Some(value) if !name.is_empty() => {
                    out.push_str(value);
                    rest = &after[name_len..];
                }
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// Load variables from `dirs` (relative to `installroot`), then from the
    /// environment.
    ///
    /// Each regular file whose name is a valid variable name defines that
    /// variable with the file's first line as its value. Later directories
    /// override earlier ones and the environment overrides all files.
    pub fn load(&mut self, installroot: &Path, dirs: &[PathBuf]) -> Result<()> {
        for dir in dirs {
            let dir = rooted(installroot, dir);
            if !dir.is_dir() {
                debug!("Skipping missing vars directory {}", dir.display());
                continue;
            }
            self.load_dir(&dir)?;
        }
        self.load_from_env();
        Ok(())
    }

    fn load_dir(&mut self, dir: &Path) -> Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !is_var_name(name) {
                warn!("Ignoring vars file with invalid name: {}", entry.path().display());
                continue;
            }
            let content = fs::read_to_string(entry.path())?;
            let value = content.lines().next().unwrap_or("");
            debug!("Loaded variable {} from {}", name, dir.display());
            self.set(name, value);
        }
        Ok(())
    }

    /// Pick up `DNF0`..`DNF9` and `DNF_VAR_<name>` from the environment
    pub fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(name) = key.strip_prefix(ENV_VAR_PREFIX) {
                if is_var_name(name) {
                    self.set(name, value);
                }
            } else if key.len() == 4
                && key.starts_with("DNF")
                && key.as_bytes()[3].is_ascii_digit()
            {
                self.set(key, value);
            }
        }
    }
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_var_char)
}

fn rooted(installroot: &Path, dir: &Path) -> PathBuf {
    match dir.strip_prefix("/") {
        Ok(relative) => installroot.join(relative),
        Err(_) => installroot.join(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_vars() -> Vars {
        let mut vars = Vars::new();
        vars.set("var1", "value123");
        vars.set("var2", "456");
        vars
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut vars = Vars::new();
        vars.set("releasever", "40");
        assert_eq!(vars.get("releasever").unwrap(), "40");

        vars.set("releasever", "41");
        assert_eq!(vars.get("releasever").unwrap(), "41");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let vars = Vars::new();
        assert!(matches!(vars.get("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_substitute() {
        let vars = sample_vars();
        assert_eq!(vars.substitute("foo$var1-bar"), "foovalue123-bar");
        assert_eq!(
            vars.substitute("$$$${var1}$var2-$nn-${nnn}"),
            "$$$value123456-$nn-${nnn}"
        );
        assert_eq!(vars.substitute("${var1"), "${var1");
        assert_eq!(vars.substitute("trailing$"), "trailing$");
    }

    #[test]
    fn test_load_dirs_later_overrides() {
        let root = TempDir::new().unwrap();
        let first = root.path().join("etc/vars");
        let second = root.path().join("etc/vars2");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("var1"), "v1\nignored\n").unwrap();
        fs::write(first.join("var42"), "first").unwrap();
        fs::write(second.join("var42"), "the answer is here").unwrap();
        fs::write(first.join("bad-name"), "x").unwrap();

        let mut vars = Vars::new();
        vars.load_dir(&first).unwrap();
        vars.load_dir(&second).unwrap();

        assert_eq!(vars.substitute("a${var1}b${var42}"), "av1bthe answer is here");
        assert!(!vars.contains("bad-name"));
    }

    #[test]
    fn test_load_uses_installroot() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("etc/pkgcore/vars");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("basearch"), "x86_64\n").unwrap();

        let mut vars = Vars::new();
        vars.load(root.path(), &[PathBuf::from("/etc/pkgcore/vars")]).unwrap();
        assert_eq!(vars.get("basearch").unwrap(), "x86_64");
    }
}
