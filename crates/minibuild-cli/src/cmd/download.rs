//! Download command

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use minibuild_core::BuildConfig;

use super::{open_workspace, resolve_root};

/// Fetch the dependencies of every project under `dir`.
pub fn download(config: BuildConfig, dir: &Path) -> Result<()> {
    let mut workspace = open_workspace(config)?;
    let root = resolve_root(&mut workspace, dir)?;

    let mut artifacts = BTreeSet::new();
    for id in workspace.subtree(root) {
        if workspace.project(id).is_aggregator() {
            continue;
        }
        let found = workspace
            .download_dependencies(id)
            .with_context(|| format!("Failed to fetch dependencies of {}", workspace.project(id)))?;
        artifacts.extend(found.into_iter().filter(|&dep| !workspace.project(dep).build_from_source));
    }

    println!("{} artifacts available", artifacts.len());
    Ok(())
}
