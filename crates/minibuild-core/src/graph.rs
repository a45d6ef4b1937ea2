//! Project graph builder.
//!
//! Each descriptor goes through the same stages: parsed, modules expanded,
//! parent linked, target defaulted, cached. A failure anywhere rolls the
//! arena back to where that resolution started, so no partially built
//! project is ever left in a cache.

use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use minibuild_schema::Coordinate;

use crate::descriptor::Descriptor;
use crate::error::ResolveError;
use crate::paths::{self, DESCRIPTOR_FILE};
use crate::project::{Project, ProjectId};
use crate::workspace::Workspace;

const DEFAULT_SOURCE_DIRECTORY: &str = "src/main/java";

/// Caller-supplied identity stamped onto a freshly parsed project.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Stamp<'a> {
    pub(crate) classifier: Option<&'a str>,
    pub(crate) resolved_version: Option<&'a str>,
}

impl Workspace {
    /// Resolve the project in `dir` (its `pom.xml`).
    ///
    /// # Errors
    ///
    /// Any descriptor, parent or fetch failure; nothing is cached on error.
    pub fn resolve(&mut self, dir: &Path) -> Result<ProjectId, ResolveError> {
        self.resolve_file(&paths::descriptor_path(dir), None)
    }

    /// Resolve a descriptor file, optionally forcing its parent.
    ///
    /// A descriptor already reached through another edge is not parsed again.
    ///
    /// # Errors
    ///
    /// See [`Workspace::resolve`].
    pub fn resolve_file(
        &mut self,
        path: &Path,
        forced_parent: Option<ProjectId>,
    ) -> Result<ProjectId, ResolveError> {
        self.resolve_stamped(path, forced_parent, Stamp::default())
    }

    pub(crate) fn resolve_stamped(
        &mut self,
        path: &Path,
        forced_parent: Option<ProjectId>,
        stamp: Stamp<'_>,
    ) -> Result<ProjectId, ResolveError> {
        let path = path.canonicalize().map_err(|e| ResolveError::Descriptor {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let cache_key = (path.clone(), stamp.classifier.map(str::to_string));
        if let Some(&id) = self.by_path.get(&cache_key) {
            tracing::trace!("{} already parsed", path.display());
            return Ok(id);
        }

        let file = File::open(&path).map_err(|e| ResolveError::Descriptor {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        self.resolve_stream(BufReader::new(file), &path, forced_parent, stamp)
    }

    /// Resolve a descriptor read from `reader`; `path` locates the project.
    ///
    /// # Errors
    ///
    /// See [`Workspace::resolve`].
    pub(crate) fn resolve_stream<R: BufRead>(
        &mut self,
        reader: R,
        path: &Path,
        forced_parent: Option<ProjectId>,
        stamp: Stamp<'_>,
    ) -> Result<ProjectId, ResolveError> {
        let mark = self.projects.len();
        let result = self.build_project(reader, path, forced_parent, stamp);
        if let Err(e) = &result {
            tracing::debug!("Resolution of {} failed: {e}", path.display());
            self.roll_back(mark);
        }
        result
    }

    fn build_project<R: BufRead>(
        &mut self,
        reader: R,
        path: &Path,
        forced_parent: Option<ProjectId>,
        stamp: Stamp<'_>,
    ) -> Result<ProjectId, ResolveError> {
        self.reporter.parsing(path);
        tracing::debug!("Parsing {}", path.display());
        let mut descriptor = Descriptor::parse(reader, path)?;
        let modules = std::mem::take(&mut descriptor.modules);

        let id = self.register_parsed(descriptor, path, forced_parent, stamp)?;
        self.expand_modules(id, path, &modules)?;
        self.link_parent(id)?;
        self.default_target(id);
        self.cache(id);
        Ok(id)
    }

    /// Stamp, inherit, validate and register a freshly parsed descriptor.
    fn register_parsed(
        &mut self,
        descriptor: Descriptor,
        path: &Path,
        forced_parent: Option<ProjectId>,
        stamp: Stamp<'_>,
    ) -> Result<ProjectId, ResolveError> {
        let Descriptor {
            mut coordinate,
            parent,
            parent_relative_path,
            packaging,
            modules: _,
            dependencies,
            managed_dependencies,
            properties,
            repositories,
            source_directory,
            output_directory,
            include_implementation_build,
        } = descriptor;

        if let Some(classifier) = stamp.classifier {
            coordinate.classifier = Some(classifier.to_string());
        }
        if let Some(version) = stamp.resolved_version {
            coordinate.resolved_version = Some(version.to_string());
        }

        let forced = forced_parent.map(|p| &self.projects[p.0]);
        let inherited = parent
            .clone()
            .or_else(|| forced.map(|p| p.coordinate.clone()));
        if let Some(from) = &inherited {
            if coordinate.group_id.is_empty() {
                coordinate.group_id.clone_from(&from.group_id);
            }
            if coordinate.version.is_none() {
                coordinate.version.clone_from(&from.version);
            }
        }

        let missing = if coordinate.group_id.is_empty() {
            Some("groupId")
        } else if coordinate.artifact_id.is_empty() {
            Some("artifactId")
        } else if coordinate.version.as_deref().is_none_or(str::is_empty) {
            Some("version")
        } else {
            None
        };
        if let Some(field) = missing {
            return Err(ResolveError::MissingField {
                path: path.to_path_buf(),
                field,
            });
        }

        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let inherits_build_flag = forced.is_some_and(|p| p.include_implementation_build);
        let project = Project {
            coordinate,
            source_directory: directory.join(DEFAULT_SOURCE_DIRECTORY),
            directory,
            descriptor: Some(path.to_path_buf()),
            target: PathBuf::new(),
            parent: forced_parent,
            parent_coordinate: parent,
            parent_relative_path,
            children: Vec::new(),
            dependencies,
            managed_dependencies,
            properties,
            repositories,
            packaging: packaging.unwrap_or_else(|| "jar".to_string()),
            build_from_source: false,
            include_implementation_build: include_implementation_build || inherits_build_flag,
            synthetic: false,
            source_setting: source_directory,
            output_setting: output_directory,
        };

        let id = self.push_project(project);
        self.by_path.insert(
            (path.to_path_buf(), stamp.classifier.map(str::to_string)),
            id,
        );
        Ok(id)
    }

    /// Resolve each declared module with `id` as its parent.
    ///
    /// A module without a descriptor on disk yields no child. Deployed parent
    /// descriptors in the artifact cache still list their modules, whose
    /// directories only exist in the original source tree.
    fn expand_modules(
        &mut self,
        id: ProjectId,
        path: &Path,
        modules: &[String],
    ) -> Result<(), ResolveError> {
        let directory = self.projects[id.0].directory.clone();
        let in_repository = self.is_in_repository(&directory);
        for module in modules {
            let module = self.expand(Some(id), module);
            let module_dir = directory.join(&module);
            let descriptor = if module_dir.is_file() {
                module_dir
            } else {
                paths::descriptor_path(&module_dir)
            };
            if !descriptor.is_file() {
                if in_repository {
                    tracing::debug!("Ignoring module '{module}' of cached {}", path.display());
                } else {
                    tracing::warn!("Module '{module}' of {} has no {DESCRIPTOR_FILE}", path.display());
                    self.reporter.warning(&format!(
                        "module '{module}' of {} has no {DESCRIPTOR_FILE}",
                        self.projects[id.0]
                    ));
                }
                continue;
            }
            let child = self.resolve_file(&descriptor, Some(id))?;
            self.projects[id.0].add_child(child);
        }
        Ok(())
    }

    fn link_parent(&mut self, id: ProjectId) -> Result<(), ResolveError> {
        if self.projects[id.0].parent.is_some() {
            return Ok(());
        }
        let Some(declared) = self.projects[id.0].parent_coordinate.clone() else {
            return Ok(());
        };
        let declared = self.expand_coordinate(Some(id), &declared);

        let Some(parent) = self.locate_parent(id, &declared)? else {
            let hint = match self.config.download_blocker() {
                Some(reason) => format!(": {reason}"),
                None => ": not found in any remote repository".to_string(),
            };
            return Err(ResolveError::UnresolvedParent {
                coordinate: declared.to_string(),
                child: self.projects[id.0].coordinate.to_string(),
                hint,
            });
        };

        if parent == id {
            tracing::debug!("{} declares itself as parent", self.projects[id.0]);
            return Ok(());
        }
        if self.projects[parent.0].parent == Some(id) {
            // Only a project created under this resolution can point back at
            // `id`, so a roll-back discards it along with `id`.
            debug_assert!(parent.0 > id.0);
            tracing::debug!(
                "Breaking parent cycle: {} no longer inherits from {}",
                self.projects[parent.0],
                self.projects[id.0]
            );
            self.projects[parent.0].parent = None;
        }

        self.projects[id.0].parent = Some(parent);
        if self.projects[parent.0].include_implementation_build {
            self.projects[id.0].include_implementation_build = true;
        }
        // A module that became our parent stays our child only.
        if !self.projects[id.0].children.contains(&parent) {
            self.projects[parent.0].add_child(id);
        }
        Ok(())
    }

    /// Cache, then the parent directory, then the local repository, then
    /// remote repositories when downloads are enabled.
    fn locate_parent(
        &mut self,
        id: ProjectId,
        declared: &Coordinate,
    ) -> Result<Option<ProjectId>, ResolveError> {
        if let Some(&parent) = self.by_key.get(&declared.key()) {
            return Ok(Some(parent));
        }

        let project = &self.projects[id.0];
        let relative = project.parent_relative_path.as_deref().unwrap_or("..");
        let mut candidate = project.directory.join(relative);
        if !candidate.is_file() {
            candidate = paths::descriptor_path(&candidate);
        }
        if candidate.is_file() && self.descriptor_matches(&candidate, declared) {
            return self.resolve_file(&candidate, None).map(Some);
        }

        if let Some(parent) = self.find_in_repository(declared)? {
            return Ok(Some(parent));
        }

        if self.config.downloads_enabled() {
            let repositories = self.repositories_for(Some(id));
            let mut coordinate = declared.clone();
            match self.download_from(&repositories, &mut coordinate) {
                Ok(()) => return self.find_in_repository(&coordinate),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!("Could not download parent {declared}: {e}"),
            }
        }
        Ok(None)
    }

    /// Cheap check that a neighbouring descriptor is the declared parent.
    fn descriptor_matches(&self, path: &Path, declared: &Coordinate) -> bool {
        let Ok(descriptor) = Descriptor::parse_file(path) else {
            return false;
        };
        let mut coordinate = descriptor.coordinate;
        if coordinate.group_id.is_empty() {
            coordinate.group_id = descriptor.parent.map(|p| p.group_id).unwrap_or_default();
        }
        coordinate.artifact_id == declared.artifact_id && coordinate.group_id == declared.group_id
    }

    /// Resolve a coordinate from the local repository if its descriptor is there.
    pub(crate) fn find_in_repository(
        &mut self,
        coordinate: &Coordinate,
    ) -> Result<Option<ProjectId>, ResolveError> {
        let descriptor = self
            .config
            .repository
            .join(coordinate.repository_path())
            .join(coordinate.pom_name());
        if !descriptor.is_file() {
            return Ok(None);
        }
        let stamp = Stamp {
            classifier: coordinate.classifier.as_deref(),
            resolved_version: coordinate.resolved_version.as_deref(),
        };
        self.resolve_stamped(&descriptor, None, stamp).map(Some)
    }

    fn default_target(&mut self, id: ProjectId) {
        let coordinate = self.expand_coordinate(Some(id), &self.projects[id.0].coordinate);
        let source = self
            .ancestry(id)
            .into_iter()
            .find_map(|p| self.projects[p.0].source_setting.clone())
            .unwrap_or_else(|| DEFAULT_SOURCE_DIRECTORY.to_string());
        let source = self.expand(Some(id), &source);
        let output = self.projects[id.0]
            .output_setting
            .clone()
            .map(|o| self.expand(Some(id), &o));
        let in_repository = self.is_in_repository(&self.projects[id.0].directory);

        let project = &mut self.projects[id.0];
        project.source_directory = project.directory.join(source);
        project.target = match &output {
            Some(output) => project.directory.join(output),
            None => project.directory.join(coordinate.jar_name()),
        };
        project.coordinate = coordinate;

        if project.packaging == "jar" && !in_repository {
            project.build_from_source = true;
            if output.is_none() {
                project.target = project.directory.join("target").join("classes");
            }
        }
    }

    fn cache(&mut self, id: ProjectId) {
        match self.by_key.entry(self.projects[id.0].key()) {
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
            Entry::Occupied(entry) => {
                tracing::debug!(
                    "{} already cached as {}, keeping the first",
                    entry.key(),
                    entry.get()
                );
            }
        }
    }

    /// Discard every project created since `mark`.
    fn roll_back(&mut self, mark: usize) {
        if self.projects.len() <= mark {
            return;
        }
        tracing::debug!("Discarding {} partially resolved projects", self.projects.len() - mark);
        self.projects.truncate(mark);
        self.by_key.retain(|_, id| id.0 < mark);
        self.by_path.retain(|_, id| id.0 < mark);
        for project in &mut self.projects {
            project.children.retain(|child| child.0 < mark);
            if project.parent.is_some_and(|p| p.0 >= mark) {
                project.parent = None;
            }
        }
    }
}
