//! minibuild - a small build tool for multi-module Java source trees
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Resolves a tree of `pom.xml` descriptors into a project graph, fetches
//! missing artifacts into the local repository and compiles the sources in
//! dependency order.
//!
//! # Configuration
//!
//! Settings come from the defaults, then `MINIBUILD_*` environment
//! variables, then the global flags below.

pub mod cmd;
pub mod reporter;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use minibuild_core::BuildConfig;
use minibuild_core::paths::normalize_repository_url;

#[derive(Debug, Parser)]
#[command(name = "minibuild")]
#[command(author, version, about = "minibuild - resolve, fetch and compile Java projects")]
pub struct Cli {
    /// Never contact remote repositories
    #[arg(long, global = true)]
    pub offline: bool,

    /// Do not download missing artifacts
    #[arg(long, global = true)]
    pub no_download: bool,

    /// Minutes before snapshot and range checks are repeated
    #[arg(long, global = true, value_name = "MINUTES")]
    pub update_interval: Option<u64>,

    /// Use only the local repository, ignoring remote ones
    #[arg(long, global = true)]
    pub ignore_repositories: bool,

    /// Local artifact repository
    #[arg(long, global = true, value_name = "DIR")]
    pub repository: Option<PathBuf>,

    /// Remote repository URL (repeatable)
    #[arg(long = "remote", global = true, value_name = "URL")]
    pub remotes: Vec<String>,

    /// Show debug logging and untruncated progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show trace logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the project tree
    Resolve {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },
    /// Print the compile classpath of a project
    Classpath {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Fetch every dependency of a project tree
    Download {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Compile a project tree with javac
    Compile {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Find projects in the subdirectories of one or more roots
    Discover {
        /// Directories whose subdirectories are scanned
        #[arg(required = true)]
        roots: Vec<PathBuf>,
        /// Subdirectory to skip (repeatable)
        #[arg(long)]
        exclude: Vec<PathBuf>,
    },
}

impl Cli {
    /// Environment configuration overlaid with the command-line flags.
    pub fn config(&self) -> BuildConfig {
        let mut config = BuildConfig::from_env();
        if self.offline {
            config.offline = true;
        }
        if self.no_download {
            config.download_automatically = false;
        }
        if self.ignore_repositories {
            config.ignore_repositories = true;
        }
        if let Some(minutes) = self.update_interval {
            config.update_interval = Duration::from_secs(minutes * 60);
        }
        if let Some(repository) = &self.repository {
            config.repository.clone_from(repository);
        }
        if !self.remotes.is_empty() {
            config.remote_repositories = self
                .remotes
                .iter()
                .map(|url| normalize_repository_url(url))
                .collect();
        }
        config.verbose = self.verbose;
        config.debug = self.debug;
        config
    }

    /// Default log filter implied by the verbosity flags.
    pub fn log_directive(&self) -> Option<&'static str> {
        if self.debug {
            Some("trace")
        } else if self.verbose {
            Some("minibuild=debug")
        } else {
            None
        }
    }
}
