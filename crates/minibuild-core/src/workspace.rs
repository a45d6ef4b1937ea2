//! Resolution context.
//!
//! A [`Workspace`] owns every [`Project`] it has resolved, the caches that
//! make identical coordinates share one node, the multi-root discovery queue,
//! and the lazily created compiler handle. Graph building, remote lookups,
//! dependency resolution and build planning are implemented on it in their
//! own modules.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use minibuild_schema::{Coordinate, CoordinateKey, Scope};

use crate::compiler::JavacBackend;
use crate::config::BuildConfig;
use crate::error::ResolveError;
use crate::io::exec::{self, ExecError};
use crate::io::fetch::Fetcher;
use crate::paths;
use crate::project::{Project, ProjectId};
use crate::reporter::{NullReporter, Reporter};

/// Nested `${...}` references are expanded at most this many times.
const MAX_EXPANSION_DEPTH: usize = 8;

/// Process-wide resolution state.
pub struct Workspace {
    pub(crate) config: BuildConfig,
    pub(crate) projects: Vec<Project>,
    pub(crate) by_key: HashMap<CoordinateKey, ProjectId>,
    pub(crate) by_path: HashMap<(PathBuf, Option<String>), ProjectId>,
    pub(crate) fetcher: Fetcher,
    pub(crate) reporter: Arc<dyn Reporter>,
    roots: Vec<PathBuf>,
    excluded: HashSet<PathBuf>,
    javac: OnceLock<Arc<JavacBackend>>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("config", &self.config)
            .field("projects", &self.projects.len())
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Create an empty workspace.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: BuildConfig) -> Result<Self, ResolveError> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self {
            config,
            projects: Vec::new(),
            by_key: HashMap::new(),
            by_path: HashMap::new(),
            fetcher,
            reporter: Arc::new(NullReporter),
            roots: Vec::new(),
            excluded: HashSet::new(),
            javac: OnceLock::new(),
        })
    }

    /// Route progress messages to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Look up a project by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this workspace.
    pub fn project(&self, id: ProjectId) -> &Project {
        &self.projects[id.0]
    }

    /// Every resolved project with its id, in resolution order.
    pub fn projects(&self) -> impl Iterator<Item = (ProjectId, &Project)> {
        self.projects
            .iter()
            .enumerate()
            .map(|(i, p)| (ProjectId(i), p))
    }

    /// True if a project with the same key is cached.
    pub fn contains_project(&self, coordinate: &Coordinate) -> bool {
        self.by_key.contains_key(&coordinate.key())
    }

    /// The cached project for a coordinate's key.
    pub fn find(&self, coordinate: &Coordinate) -> Option<ProjectId> {
        self.by_key.get(&coordinate.key()).copied()
    }

    /// `id` followed by its children, depth first.
    pub fn subtree(&self, id: ProjectId) -> Vec<ProjectId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if out.contains(&next) {
                continue;
            }
            out.push(next);
            stack.extend(self.projects[next.0].children.iter().rev());
        }
        out
    }

    /// `id` and its ancestors, nearest first. Stops at a repeated node.
    pub(crate) fn ancestry(&self, id: ProjectId) -> Vec<ProjectId> {
        let mut chain = vec![id];
        let mut current = self.projects[id.0].parent;
        while let Some(parent) = current {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = self.projects[parent.0].parent;
        }
        chain
    }

    pub(crate) fn push_project(&mut self, project: Project) -> ProjectId {
        let id = ProjectId(self.projects.len());
        self.projects.push(project);
        id
    }

    /// Register a project for an artifact that has no descriptor.
    ///
    /// A few artifacts ship with incomplete metadata; their missing
    /// dependencies are attached here by artifact id. An existing cache entry
    /// for the same key is replaced with a warning.
    pub fn fake_project(&mut self, coordinate: Coordinate, target: PathBuf) -> ProjectId {
        let mut project = Project::synthetic(coordinate, target);
        match project.coordinate.artifact_id.as_str() {
            "ij" => {
                let tools = PathBuf::from(self.expand(None, "${java.home}/../lib/tools.jar"));
                if tools.exists() {
                    let mut dependency =
                        Coordinate::new("com.sun", "tools", "1.4.2").with_scope(Scope::System);
                    dependency.system_path = Some(tools.display().to_string());
                    project.dependencies.push(dependency);
                }
            }
            "imglib2-io" => project
                .dependencies
                .push(Coordinate::new("loci", "bio-formats", "${bio-formats.version}")),
            "jfreechart" => project
                .dependencies
                .push(Coordinate::new("jfree", "jcommon", "1.0.17")),
            _ => {}
        }

        let key = project.key();
        let id = self.push_project(project);
        if self.by_key.insert(key.clone(), id).is_some() {
            tracing::warn!("Overriding cached project {key} with synthetic one");
            self.reporter
                .warning(&format!("{key} is overridden by a synthetic project"));
        }
        id
    }

    /// Queue a directory whose subdirectories are scanned for projects.
    pub fn add_multi_project_root(&mut self, dir: &Path) {
        self.roots.push(paths::canonical_or_self(dir));
    }

    /// Skip a directory during multi-root discovery.
    pub fn exclude_from_multi_projects(&mut self, dir: &Path) {
        self.excluded.insert(paths::canonical_or_self(dir));
    }

    /// Drain the discovery queue.
    ///
    /// Roots are popped last-in first-out; each root's immediate
    /// subdirectories are visited in sorted order and every one holding a
    /// descriptor is resolved without a forced parent. A root that cannot be
    /// listed is skipped.
    ///
    /// # Errors
    ///
    /// The first resolution failure.
    pub fn parse_multi_projects(&mut self) -> Result<Vec<ProjectId>, ResolveError> {
        let mut found = Vec::new();
        while let Some(root) = self.roots.pop() {
            let entries = match fs::read_dir(&root) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!("Skipping root {}: {e}", root.display());
                    continue;
                }
            };
            let mut subdirs: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            subdirs.sort();

            for dir in subdirs {
                let dir = paths::canonical_or_self(&dir);
                if self.excluded.contains(&dir) {
                    tracing::debug!("Skipping excluded {}", dir.display());
                    continue;
                }
                let descriptor = paths::descriptor_path(&dir);
                if !descriptor.is_file() {
                    continue;
                }
                let id = self.resolve_file(&descriptor, None)?;
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        Ok(found)
    }

    /// Expand `${...}` references in `value` in the context of `project`.
    ///
    /// Unknown references are left as they are.
    pub fn expand(&self, project: Option<ProjectId>, value: &str) -> String {
        let mut current = value.to_string();
        for _ in 0..MAX_EXPANSION_DEPTH {
            if !current.contains("${") {
                break;
            }
            let next = self.substitute(project, &current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Expand every string field of a coordinate.
    pub fn expand_coordinate(&self, project: Option<ProjectId>, coordinate: &Coordinate) -> Coordinate {
        let mut expanded = coordinate.clone();
        expanded.group_id = self.expand(project, &coordinate.group_id);
        expanded.artifact_id = self.expand(project, &coordinate.artifact_id);
        expanded.version = coordinate.version.as_deref().map(|v| self.expand(project, v));
        expanded.classifier = coordinate.classifier.as_deref().map(|v| self.expand(project, v));
        expanded.system_path = coordinate.system_path.as_deref().map(|v| self.expand(project, v));
        expanded
    }

    fn substitute(&self, project: Option<ProjectId>, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let name = &after[..end];
            match self.property(project, name) {
                Some(replacement) => out.push_str(&replacement),
                None => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    fn property(&self, project: Option<ProjectId>, name: &str) -> Option<String> {
        if let Some(var) = name.strip_prefix("env.") {
            return std::env::var(var).ok();
        }
        if name == "java.home" {
            return std::env::var("JAVA_HOME").ok();
        }

        let id = project?;
        let chain = self.ancestry(id);
        for &ancestor in &chain {
            if let Some(value) = self.projects[ancestor.0].properties.get(name) {
                return Some(value.clone());
            }
        }

        let current = &self.projects[id.0];
        match name {
            "project.groupId" | "pom.groupId" | "groupId" => Some(current.coordinate.group_id.clone()),
            "project.artifactId" | "pom.artifactId" | "artifactId" => {
                Some(current.coordinate.artifact_id.clone())
            }
            "project.version" | "pom.version" | "version" => {
                current.coordinate.version().map(str::to_string)
            }
            "project.parent.version" | "parent.version" => current
                .parent
                .and_then(|p| self.projects[p.0].coordinate.version().map(str::to_string))
                .or_else(|| {
                    current
                        .parent_coordinate
                        .as_ref()
                        .and_then(|c| c.version.clone())
                }),
            "project.parent.groupId" | "parent.groupId" => current
                .parent
                .map(|p| self.projects[p.0].coordinate.group_id.clone())
                .or_else(|| current.parent_coordinate.as_ref().map(|c| c.group_id.clone())),
            "project.basedir" | "basedir" => Some(current.directory.display().to_string()),
            _ => None,
        }
    }

    /// Repositories for lookups made on behalf of `project`.
    ///
    /// Descriptor repositories along the parent chain come first, then the
    /// configured defaults.
    pub(crate) fn repositories_for(&self, project: Option<ProjectId>) -> Vec<String> {
        let mut repositories: Vec<String> = Vec::new();
        let declared = project
            .map(|id| self.ancestry(id))
            .unwrap_or_default()
            .into_iter()
            .flat_map(|id| self.projects[id.0].repositories.iter());
        for url in declared.chain(self.config.remote_repositories.iter()) {
            if !repositories.contains(url) {
                repositories.push(url.clone());
            }
        }
        repositories
    }

    /// True if `dir` lies inside the local artifact cache.
    pub(crate) fn is_in_repository(&self, dir: &Path) -> bool {
        let root = paths::canonical_or_self(&self.config.repository);
        paths::canonical_or_self(dir).starts_with(root)
    }

    /// Git revision of the checkout holding `project`, if it is in one.
    ///
    /// # Errors
    ///
    /// Fails if `git` cannot be run or exits unsuccessfully.
    pub fn implementation_build(&self, project: ProjectId) -> Result<Option<String>, ExecError> {
        let directory = &self.projects[project.0].directory;
        let Some(root) = paths::find_git_root(directory) else {
            return Ok(None);
        };
        let out = exec::run(
            Some(&root),
            Path::new("git"),
            &["rev-parse".to_string(), "HEAD".to_string()],
        )?;
        Ok(Some(out.trim().to_string()))
    }

    /// The shared `javac` backend, created on first use.
    pub fn javac(&self) -> Arc<JavacBackend> {
        Arc::clone(self.javac.get_or_init(|| Arc::new(JavacBackend::new())))
    }
}
