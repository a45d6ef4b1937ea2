//! Subcommand implementations.

pub mod classpath;
pub mod compile;
pub mod discover;
pub mod download;
pub mod resolve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use minibuild_core::{BuildConfig, ProjectId, Workspace};

use crate::reporter::ConsoleReporter;

/// Workspace reporting to the terminal.
pub fn open_workspace(config: BuildConfig) -> Result<Workspace> {
    let verbose = config.verbose;
    tracing::debug!("Local repository: {}", config.repository.display());
    let workspace = Workspace::new(config).context("Failed to set up workspace")?;
    Ok(workspace.with_reporter(Arc::new(ConsoleReporter::new(verbose))))
}

/// Resolve the project in `dir`.
pub fn resolve_root(workspace: &mut Workspace, dir: &Path) -> Result<ProjectId> {
    workspace
        .resolve(dir)
        .with_context(|| format!("Failed to resolve {}", dir.display()))
}
