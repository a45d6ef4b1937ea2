//! Resolve command

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use crossterm::style::Stylize;
use minibuild_core::{BuildConfig, ProjectId, Workspace};
use serde::Serialize;

use super::{open_workspace, resolve_root};

/// Serialisable view of one project and its children.
#[derive(Debug, Serialize)]
pub struct ProjectNode {
    pub coordinate: String,
    pub packaging: String,
    pub directory: PathBuf,
    pub target: PathBuf,
    pub build_from_source: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_build: Option<String>,
    pub children: Vec<ProjectNode>,
}

impl ProjectNode {
    /// Tree rooted at `id`; a project already shown is not expanded again.
    pub fn build(workspace: &Workspace, id: ProjectId) -> Self {
        Self::build_from(workspace, id, &mut HashSet::new())
    }

    fn build_from(workspace: &Workspace, id: ProjectId, seen: &mut HashSet<ProjectId>) -> Self {
        seen.insert(id);
        let project = workspace.project(id);
        let implementation_build = if project.include_implementation_build {
            workspace.implementation_build(id).unwrap_or_else(|e| {
                tracing::warn!("No build revision for {project}: {e}");
                None
            })
        } else {
            None
        };
        let mut children = Vec::new();
        for &child in &project.children {
            if !seen.contains(&child) {
                children.push(Self::build_from(workspace, child, seen));
            }
        }
        Self {
            coordinate: project.coordinate.to_string(),
            packaging: project.packaging.clone(),
            directory: project.directory.clone(),
            target: project.target.clone(),
            build_from_source: project.build_from_source,
            implementation_build,
            children,
        }
    }

    fn print(&self, depth: usize) {
        let indent = "  ".repeat(depth);
        let marker = if self.build_from_source {
            "source".green().to_string()
        } else {
            self.packaging.as_str().dark_grey().to_string()
        };
        println!("{indent}{} [{marker}]", self.coordinate.as_str().bold());
        if let Some(revision) = &self.implementation_build {
            println!("{indent}  build {revision}");
        }
        for child in &self.children {
            child.print(depth + 1);
        }
    }
}

/// Print the project tree rooted at `dir`.
pub fn resolve(config: BuildConfig, dir: &Path, json: bool) -> Result<()> {
    let mut workspace = open_workspace(config)?;
    let root = resolve_root(&mut workspace, dir)?;
    let tree = ProjectNode::build(&workspace, root);

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        tree.print(0);
    }
    Ok(())
}
