//! Discover command

use std::path::PathBuf;

use anyhow::{Context, Result};
use minibuild_core::BuildConfig;

use super::open_workspace;

/// Resolve every project found directly below `roots`.
pub fn discover(config: BuildConfig, roots: &[PathBuf], exclude: &[PathBuf]) -> Result<()> {
    let mut workspace = open_workspace(config)?;
    for root in roots {
        workspace.add_multi_project_root(root);
    }
    for dir in exclude {
        workspace.exclude_from_multi_projects(dir);
    }

    let found = workspace
        .parse_multi_projects()
        .context("Failed to discover projects")?;
    for id in found {
        let project = workspace.project(id);
        println!("{}\t{}", project.coordinate, project.directory.display());
    }
    Ok(())
}
