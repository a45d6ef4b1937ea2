//! Build ordering and the compile driver.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::compiler::{CompileBackend, CompileError};
use crate::error::ResolveError;
use crate::project::ProjectId;
use crate::workspace::Workspace;

impl Workspace {
    /// Order in which the source projects under `roots` must be compiled.
    ///
    /// Every source dependency comes before its dependents, children follow
    /// their declaration order, and each project appears once. Aggregators
    /// and cached artifacts are left out.
    ///
    /// # Errors
    ///
    /// [`ResolveError::DependencyCycle`] if source projects depend on each
    /// other in a loop, or any dependency resolution failure.
    pub fn build_plan(&mut self, roots: &[ProjectId]) -> Result<Vec<ProjectId>, ResolveError> {
        let mut plan = Vec::new();
        let mut done = HashSet::new();
        let mut visiting = HashSet::new();
        for &root in roots {
            self.plan(root, &mut plan, &mut done, &mut visiting)?;
        }
        Ok(plan)
    }

    fn plan(
        &mut self,
        id: ProjectId,
        plan: &mut Vec<ProjectId>,
        done: &mut HashSet<ProjectId>,
        visiting: &mut HashSet<ProjectId>,
    ) -> Result<(), ResolveError> {
        if done.contains(&id) {
            return Ok(());
        }
        if !visiting.insert(id) {
            return Err(ResolveError::DependencyCycle {
                coordinate: self.projects[id.0].coordinate.to_string(),
            });
        }

        let dependencies = self.resolve_dependencies(id)?.projects;
        for dependency in dependencies {
            if self.projects[dependency.0].build_from_source {
                self.plan(dependency, plan, done, visiting)?;
            }
        }

        visiting.remove(&id);
        done.insert(id);
        let project = &self.projects[id.0];
        if project.build_from_source && !project.is_aggregator() {
            plan.push(id);
        }

        for child in self.projects[id.0].children.clone() {
            self.plan(child, plan, done, visiting)?;
        }
        Ok(())
    }

    /// Compile every source project under `roots` with `backend`.
    ///
    /// Projects without any `.java` file are skipped. Returns the projects
    /// that were compiled, in order.
    ///
    /// # Errors
    ///
    /// Resolution failures, a missing dependency, or the first compiler failure.
    pub fn compile(
        &mut self,
        roots: &[ProjectId],
        backend: &dyn CompileBackend,
    ) -> Result<Vec<ProjectId>, CompileError> {
        let mut compiled = Vec::new();
        for id in self.build_plan(roots)? {
            let sources = java_sources(&self.projects[id.0].source_directory);
            if sources.is_empty() {
                tracing::debug!("{} has no sources", self.projects[id.0]);
                continue;
            }

            let classpath = self.classpath(id)?;
            let project = &self.projects[id.0];
            fs::create_dir_all(&project.target)?;
            self.reporter.compiling(&project.coordinate, sources.len());
            backend
                .compile(&sources, &classpath, &project.target)
                .map_err(|e| e.for_project(&project.coordinate.to_string()))?;
            compiled.push(id);
        }
        Ok(compiled)
    }
}

/// All `*.java` files below `dir`, sorted by path.
pub(crate) fn java_sources(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "java"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}
