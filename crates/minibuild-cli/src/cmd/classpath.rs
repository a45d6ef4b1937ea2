//! Classpath command

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use minibuild_core::BuildConfig;

use super::{open_workspace, resolve_root};

/// Print the compile classpath of the project in `dir`.
pub fn classpath(config: BuildConfig, dir: &Path) -> Result<()> {
    let mut workspace = open_workspace(config)?;
    let root = resolve_root(&mut workspace, dir)?;
    let entries = workspace
        .classpath(root)
        .with_context(|| format!("Failed to compute classpath of {}", workspace.project(root)))?;

    let joined = env::join_paths(&entries).context("Classpath entry contains a separator")?;
    println!("{}", joined.to_string_lossy());
    Ok(())
}
