//! Project nodes stored in the workspace arena.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use minibuild_schema::{AGGREGATOR_PACKAGING, Coordinate, CoordinateKey};
use serde::Serialize;

/// Index of a [`Project`] inside its [`Workspace`](crate::Workspace).
///
/// Parent links are stored as ids, so dropping a link never touches
/// ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectId(pub(crate) usize);

impl ProjectId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One buildable unit: a module, an aggregator, or a synthetic artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    /// Fully inherited and expanded coordinate.
    pub coordinate: Coordinate,
    /// Directory holding the descriptor (or the artifact, for synthetic projects).
    pub directory: PathBuf,
    /// Descriptor file, absent for synthetic projects.
    pub descriptor: Option<PathBuf>,
    /// Java sources.
    pub source_directory: PathBuf,
    /// Built archive or class directory.
    pub target: PathBuf,
    /// Inheritance parent.
    pub parent: Option<ProjectId>,
    /// Parent as declared in the descriptor.
    pub parent_coordinate: Option<Coordinate>,
    /// `project/parent/relativePath`.
    #[serde(skip)]
    pub(crate) parent_relative_path: Option<String>,
    /// Child projects in declaration order.
    pub children: Vec<ProjectId>,
    /// Declared dependencies in declaration order.
    pub dependencies: Vec<Coordinate>,
    /// `dependencyManagement` entries.
    pub managed_dependencies: Vec<Coordinate>,
    /// Properties for `${...}` expansion.
    pub properties: BTreeMap<String, String>,
    /// Repositories declared by this descriptor.
    pub repositories: Vec<String>,
    /// `project/packaging`.
    pub packaging: String,
    /// Sources live outside the artifact cache and must be compiled.
    pub build_from_source: bool,
    /// Stamp the git revision as `Implementation-Build`.
    pub include_implementation_build: bool,
    /// Registered without a descriptor.
    pub synthetic: bool,
    #[serde(skip)]
    pub(crate) source_setting: Option<String>,
    #[serde(skip)]
    pub(crate) output_setting: Option<String>,
}

impl Project {
    /// A project with no descriptor standing for an artifact at `target`.
    pub fn synthetic(coordinate: Coordinate, target: PathBuf) -> Self {
        let directory = target
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        Self {
            coordinate,
            source_directory: directory.clone(),
            directory,
            descriptor: None,
            target,
            parent: None,
            parent_coordinate: None,
            parent_relative_path: None,
            children: Vec::new(),
            dependencies: Vec::new(),
            managed_dependencies: Vec::new(),
            properties: BTreeMap::new(),
            repositories: Vec::new(),
            packaging: "jar".to_string(),
            build_from_source: false,
            include_implementation_build: false,
            synthetic: true,
            source_setting: None,
            output_setting: None,
        }
    }

    /// Cache key of the coordinate.
    pub fn key(&self) -> CoordinateKey {
        self.coordinate.key()
    }

    /// True if `packaging == pom`.
    pub fn is_aggregator(&self) -> bool {
        self.packaging == AGGREGATOR_PACKAGING
    }

    pub(crate) fn add_child(&mut self, child: ProjectId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.coordinate.fmt(f)
    }
}
