// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pkgcore::conf::Priority;
use pkgcore::repository::RepoState;
use pkgcore::{Base, LoadRepoFlags, PackageQuery, QueryCmp};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pkgcore")]
#[command(author, version, about = "Query packages from local repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List packages matching the given filters
    Query {
        /// Repository to load, as ID=URL (file:// URL or local path)
        #[arg(long = "repo", value_name = "ID=URL")]
        repos: Vec<String>,
        /// Package name to match (repeatable)
        #[arg(long = "name")]
        names: Vec<String>,
        /// Treat names as shell globs
        #[arg(long)]
        glob: bool,
        /// Architecture to match (repeatable)
        #[arg(long = "arch")]
        arches: Vec<String>,
    },
    /// Load repositories and show their state
    Repolist {
        /// Repository to load, as ID=URL (file:// URL or local path)
        #[arg(long = "repo", value_name = "ID=URL")]
        repos: Vec<String>,
    },
}

/// Split a `--repo` argument into identifier and source
fn parse_repo_arg(arg: &str) -> Result<(String, String)> {
    let (id, url) = arg
        .split_once('=')
        .with_context(|| format!("Invalid repository '{}', expected ID=URL", arg))?;
    if id.is_empty() || url.is_empty() {
        return Err(anyhow::anyhow!(
            "Invalid repository '{}', expected ID=URL",
            arg
        ));
    }
    Ok((id.to_string(), url.to_string()))
}

/// Create a base, register the repositories and load them into the package registry
fn load_base(repos: &[String]) -> Result<Base> {
    let base = Base::new();
    base.load_vars()?;

    let repo_registry = base.get_repo_registry();
    for arg in repos {
        let (id, url) = parse_repo_arg(arg)?;
        let repo = repo_registry.get_mut()?.new_repo(&id)?;
        repo.get_mut()?
            .config_mut()?
            .baseurl
            .set(Priority::CommandLine, Some(url));
    }

    for err in repo_registry.get()?.load_enabled() {
        warn!("{}", err);
    }

    let package_registry = base.get_package_registry();
    for repo in repo_registry.get()?.iter() {
        if repo.get()?.state() != RepoState::Loaded {
            continue;
        }
        let count = package_registry
            .get_mut()?
            .load_repo(&repo, LoadRepoFlags::NONE)?;
        info!("Added {} packages", count);
    }

    Ok(base)
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Query {
            repos,
            names,
            glob,
            arches,
        }) => {
            let base = load_base(&repos)?;
            let mut query = PackageQuery::new(&base.get_package_registry())?;

            if !names.is_empty() {
                let cmp = if glob { QueryCmp::Glob } else { QueryCmp::Eq };
                query.filter_name(names.as_slice(), cmp)?;
            }
            if !arches.is_empty() {
                query.filter_arch(arches.as_slice(), QueryCmp::Eq)?;
            }

            if query.is_empty() {
                println!("No packages found.");
            } else {
                for pkg in &query {
                    println!("{}", pkg.nevra());
                }
            }
            Ok(())
        }
        Some(Commands::Repolist { repos }) => {
            let base = load_base(&repos)?;
            let repo_registry = base.get_repo_registry();
            let repo_registry = repo_registry.get()?;

            if repo_registry.is_empty() {
                println!("No repositories configured.");
                return Ok(());
            }

            println!("{:<20} {:<10} PACKAGES", "REPO ID", "STATE");
            for repo in repo_registry.iter() {
                let repo = repo.get()?;
                println!(
                    "{:<20} {:<10} {}",
                    repo.id(),
                    format!("{:?}", repo.state()),
                    repo.package_count()
                );
            }
            Ok(())
        }
        None => {
            println!("Pkgcore Package Manager v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'pkgcore --help' for usage information");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_arg() {
        assert_eq!(
            parse_repo_arg("fedora=file:///srv/fedora").unwrap(),
            ("fedora".to_string(), "file:///srv/fedora".to_string())
        );
        assert_eq!(
            parse_repo_arg("local=/srv/a=b").unwrap(),
            ("local".to_string(), "/srv/a=b".to_string())
        );
        assert!(parse_repo_arg("fedora").is_err());
        assert!(parse_repo_arg("=file:///srv").is_err());
        assert!(parse_repo_arg("fedora=").is_err());
    }

    #[test]
    fn test_cli_parses_repeated_flags() {
        let cli = Cli::parse_from([
            "pkgcore", "query", "--repo", "a=/srv/a", "--name", "pkg", "--name", "other", "--glob",
        ]);
        match cli.command {
            Some(Commands::Query {
                repos, names, glob, ..
            }) => {
                assert_eq!(repos, vec!["a=/srv/a"]);
                assert_eq!(names, vec!["pkg", "other"]);
                assert!(glob);
            }
            _ => panic!("expected query command"),
        }
    }
}
