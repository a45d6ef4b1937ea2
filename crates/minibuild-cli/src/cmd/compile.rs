//! Compile command

use std::path::Path;

use anyhow::Result;
use crossterm::style::Stylize;
use minibuild_core::BuildConfig;

use super::{open_workspace, resolve_root};

/// Compile every source project under `dir` with `javac`.
pub fn compile(config: BuildConfig, dir: &Path) -> Result<()> {
    let mut workspace = open_workspace(config)?;
    let root = resolve_root(&mut workspace, dir)?;

    let javac = workspace.javac();
    let compiled = workspace.compile(&[root], javac.as_ref())?;

    let projects = if compiled.len() == 1 { "project" } else { "projects" };
    println!("{} {} {projects}", "Compiled".green().bold(), compiled.len());
    Ok(())
}
