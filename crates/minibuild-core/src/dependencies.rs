//! Dependency lookup and transitive resolution.

use std::collections::HashSet;
use std::path::PathBuf;

use minibuild_schema::{Coordinate, CoordinateKey, Scope};
use serde::Serialize;

use crate::error::{MissingReason, ResolveError};
use crate::project::ProjectId;
use crate::workspace::Workspace;

/// Outcome of [`Workspace::resolve_dependencies`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    /// Reachable projects, dependencies before their dependents.
    pub projects: Vec<ProjectId>,
    /// Dependencies that could not be located, with the reason.
    pub missing: Vec<(Coordinate, MissingReason)>,
}

impl Resolution {
    /// Turn the first missing dependency into an error.
    ///
    /// # Errors
    ///
    /// [`ResolveError::MissingDependency`] if anything is missing.
    pub fn require_complete(self) -> Result<Vec<ProjectId>, ResolveError> {
        match self.missing.into_iter().next() {
            Some((coordinate, reason)) => Err(ResolveError::MissingDependency {
                coordinate: coordinate.to_string(),
                reason,
            }),
            None => Ok(self.projects),
        }
    }
}

impl Workspace {
    /// Declared dependencies of `project` and its ancestors, nearest wins.
    pub fn effective_dependencies(&self, project: ProjectId) -> Vec<Coordinate> {
        let mut seen: HashSet<CoordinateKey> = HashSet::new();
        let mut out = Vec::new();
        for id in self.ancestry(project) {
            for dependency in &self.projects[id.0].dependencies {
                let expanded = self.expand_coordinate(Some(id), dependency);
                if seen.insert(expanded.key()) {
                    out.push(expanded);
                }
            }
        }
        out
    }

    fn managed(&self, project: ProjectId, dependency: &Coordinate) -> Option<Coordinate> {
        let key = dependency.key();
        self.ancestry(project).into_iter().find_map(|id| {
            self.projects[id.0]
                .managed_dependencies
                .iter()
                .map(|managed| self.expand_coordinate(Some(id), managed))
                .find(|managed| managed.key() == key)
        })
    }

    /// Locate the project for one dependency edge of `requester`.
    ///
    /// A cached project with the same key always wins. Otherwise the version
    /// is completed from dependency management, `systemPath` dependencies
    /// become synthetic projects, and the local repository is consulted,
    /// downloading first when enabled and needed. Returns `None` when the
    /// dependency is simply not available.
    ///
    /// # Errors
    ///
    /// Fatal fetch errors, malformed descriptors, or a dependency that has
    /// no version at all.
    pub fn find_project(
        &mut self,
        requester: ProjectId,
        dependency: &Coordinate,
    ) -> Result<Option<ProjectId>, ResolveError> {
        let mut coordinate = self.expand_coordinate(Some(requester), dependency);
        if let Some(managed) = self.managed(requester, &coordinate) {
            if coordinate.version.is_none() {
                coordinate.version = managed.version;
            }
            if coordinate.scope == Scope::Compile {
                coordinate.scope = managed.scope;
            }
        }

        if let Some(&id) = self.by_key.get(&coordinate.key()) {
            return Ok(Some(id));
        }

        if let (Scope::System, Some(path)) = (coordinate.scope, coordinate.system_path.clone()) {
            return Ok(Some(self.fake_project(coordinate, PathBuf::from(path))));
        }

        if coordinate.version.is_none() {
            let requester = &self.projects[requester.0];
            return Err(ResolveError::Descriptor {
                path: requester.descriptor.clone().unwrap_or_default(),
                detail: format!("dependency {} has no version", coordinate.key()),
            });
        }

        let needs_remote =
            coordinate.is_snapshot() || coordinate.is_range() || !self.is_complete(&coordinate);
        if needs_remote && self.config.downloads_enabled() {
            let repositories = self.repositories_for(Some(requester));
            let mut attempt = coordinate.clone();
            match self.download_from(&repositories, &mut attempt) {
                Ok(()) => return self.find_in_repository(&attempt),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let cached = if self.resolve_version(&mut coordinate)? {
                        self.find_in_repository(&coordinate)?
                    } else {
                        None
                    };
                    let Some(id) = cached else {
                        return Err(e);
                    };
                    tracing::warn!("Could not update {coordinate}, using cached copy: {e}");
                    self.reporter.warning(&format!("using cached {coordinate}: {e}"));
                    return Ok(Some(id));
                }
            }
        }

        if !self.resolve_version(&mut coordinate)? {
            return Ok(None);
        }
        self.find_in_repository(&coordinate)
    }

    /// Every project reachable through the dependencies of `project`.
    ///
    /// Direct dependencies of any scope except `test` and `import` are
    /// followed; beyond the first edge only non-optional `compile` and
    /// `runtime` dependencies are. Projects come out dependencies first.
    ///
    /// # Errors
    ///
    /// See [`Workspace::find_project`].
    pub fn resolve_dependencies(&mut self, project: ProjectId) -> Result<Resolution, ResolveError> {
        let mut resolution = Resolution::default();
        let mut visited = HashSet::from([project]);
        self.walk(project, true, &mut visited, &mut resolution)?;
        Ok(resolution)
    }

    fn walk(
        &mut self,
        project: ProjectId,
        direct: bool,
        visited: &mut HashSet<ProjectId>,
        resolution: &mut Resolution,
    ) -> Result<(), ResolveError> {
        for dependency in self.effective_dependencies(project) {
            if matches!(dependency.scope, Scope::Test | Scope::Import) {
                continue;
            }
            if !direct && (dependency.optional || !dependency.scope.is_transitive()) {
                continue;
            }

            match self.find_project(project, &dependency)? {
                Some(id) => {
                    if visited.insert(id) {
                        self.walk(id, false, visited, resolution)?;
                        resolution.projects.push(id);
                    }
                }
                None => {
                    let reason = self
                        .config
                        .download_blocker()
                        .unwrap_or(MissingReason::NotInRepository);
                    tracing::debug!("{dependency} of {} is missing: {reason}", self.projects[project.0]);
                    resolution.missing.push((dependency, reason));
                }
            }
        }
        Ok(())
    }

    /// Output targets of every dependency of `project`, dependencies first.
    ///
    /// # Errors
    ///
    /// [`ResolveError::MissingDependency`] for the first dependency that
    /// cannot be located, naming the setting that blocked the lookup.
    pub fn classpath(&mut self, project: ProjectId) -> Result<Vec<PathBuf>, ResolveError> {
        let projects = self.resolve_dependencies(project)?.require_complete()?;
        Ok(projects
            .into_iter()
            .map(|id| &self.projects[id.0])
            .filter(|p| !p.is_aggregator())
            .map(|p| p.target.clone())
            .collect())
    }

    /// Resolve, and download where enabled, every dependency of `project`.
    ///
    /// # Errors
    ///
    /// See [`Workspace::classpath`].
    pub fn download_dependencies(&mut self, project: ProjectId) -> Result<Vec<ProjectId>, ResolveError> {
        self.resolve_dependencies(project)?.require_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::paths::DESCRIPTOR_FILE;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tmp: TempDir::new().unwrap(),
            }
        }

        fn repo(&self) -> PathBuf {
            self.tmp.path().join("repo")
        }

        fn workspace(&self, config: BuildConfig) -> Workspace {
            Workspace::new(BuildConfig {
                repository: self.repo(),
                ..config
            })
            .unwrap()
        }

        fn offline(&self) -> Workspace {
            self.workspace(BuildConfig {
                offline: true,
                ..BuildConfig::default()
            })
        }

        fn install(&self, group: &str, artifact: &str, version: &str, body: &str) {
            let dir = self.repo().join(group).join(artifact).join(version);
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join(format!("{artifact}-{version}.pom")),
                format!(
                    "<project><groupId>{group}</groupId><artifactId>{artifact}</artifactId>\
                     <version>{version}</version>{body}</project>"
                ),
            )
            .unwrap();
            fs::write(dir.join(format!("{artifact}-{version}.jar")), b"jar").unwrap();
        }

        fn project(&self, name: &str, body: &str) -> PathBuf {
            let dir = self.tmp.path().join("work").join(name);
            write_pom(&dir, name, body);
            dir
        }
    }

    fn write_pom(dir: &Path, name: &str, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(DESCRIPTOR_FILE),
            format!(
                "<project><groupId>w</groupId><artifactId>{name}</artifactId>\
                 <version>1.0</version>{body}</project>"
            ),
        )
        .unwrap();
    }

    fn dep(group: &str, artifact: &str, version: &str, extra: &str) -> String {
        format!(
            "<dependency><groupId>{group}</groupId><artifactId>{artifact}</artifactId>\
             <version>{version}</version>{extra}</dependency>"
        )
    }

    #[test]
    fn test_transitive_scopes() {
        let fx = Fixture::new();
        fx.install(
            "x",
            "lib",
            "1",
            &format!(
                "<dependencies>{}{}{}{}</dependencies>",
                dep("x", "runtime-dep", "1", "<scope>runtime</scope>"),
                dep("x", "provided-dep", "1", "<scope>provided</scope>"),
                dep("x", "optional-dep", "1", "<optional>true</optional>"),
                dep("x", "test-dep", "1", "<scope>test</scope>"),
            ),
        );
        for name in ["runtime-dep", "provided-dep", "optional-dep", "test-dep", "api"] {
            fx.install("x", name, "1", "");
        }
        let dir = fx.project(
            "app",
            &format!(
                "<dependencies>{}{}{}</dependencies>",
                dep("x", "lib", "1", ""),
                dep("x", "api", "1", "<scope>provided</scope>"),
                dep("x", "test-dep", "1", "<scope>test</scope>"),
            ),
        );

        let mut ws = fx.offline();
        let app = ws.resolve(&dir).unwrap();
        let resolution = ws.resolve_dependencies(app).unwrap();
        let names: Vec<_> = resolution
            .projects
            .iter()
            .map(|&id| ws.project(id).coordinate.artifact_id.clone())
            .collect();

        assert_eq!(names, ["runtime-dep", "lib", "api"]);
        assert!(resolution.missing.is_empty());
    }

    #[test]
    fn test_missing_dependency_reports_blocking_flag() {
        let fx = Fixture::new();
        let dir = fx.project(
            "app",
            &format!("<dependencies>{}</dependencies>", dep("x", "absent", "1", "")),
        );

        let mut ws = fx.workspace(BuildConfig {
            download_automatically: false,
            ..BuildConfig::default()
        });
        let app = ws.resolve(&dir).unwrap();
        let err = ws.classpath(app).unwrap_err();

        assert!(matches!(
            err,
            ResolveError::MissingDependency {
                reason: MissingReason::AutoDownloadDisabled,
                ..
            }
        ));
    }

    #[test]
    fn test_managed_version_and_property_expansion() {
        let fx = Fixture::new();
        fx.install("x", "lib", "2.5", "");
        let dir = fx.project(
            "app",
            &format!(
                "<properties><lib.version>2.5</lib.version></properties>\
                 <dependencyManagement><dependencies>{}</dependencies></dependencyManagement>\
                 <dependencies><dependency><groupId>x</groupId><artifactId>lib</artifactId></dependency></dependencies>",
                dep("x", "lib", "${lib.version}", ""),
            ),
        );

        let mut ws = fx.offline();
        let app = ws.resolve(&dir).unwrap();
        let classpath = ws.classpath(app).unwrap();

        assert_eq!(classpath.len(), 1);
        assert!(classpath[0].ends_with("x/lib/2.5/lib-2.5.jar"));
    }

    #[test]
    fn test_system_scope_becomes_synthetic() {
        let fx = Fixture::new();
        let jar = fx.tmp.path().join("vendor.jar");
        fs::write(&jar, b"jar").unwrap();
        let dir = fx.project(
            "app",
            &format!(
                "<dependencies>{}</dependencies>",
                dep(
                    "v",
                    "vendor",
                    "1",
                    &format!("<scope>system</scope><systemPath>{}</systemPath>", jar.display())
                ),
            ),
        );

        let mut ws = fx.offline();
        let app = ws.resolve(&dir).unwrap();
        assert_eq!(ws.classpath(app).unwrap(), vec![jar]);
        let id = ws.find(&Coordinate::new("v", "vendor", "1")).unwrap();
        assert!(ws.project(id).synthetic);
    }

    #[test]
    fn test_dependencies_inherited_from_parent() {
        let fx = Fixture::new();
        fx.install("x", "common", "1", "");
        let root = fx.tmp.path().join("work").join("root");
        write_pom(
            &root,
            "root",
            &format!(
                "<packaging>pom</packaging><modules><module>m</module></modules>\
                 <dependencies>{}</dependencies>",
                dep("x", "common", "1", "")
            ),
        );
        write_pom(&root.join("m"), "m", "");

        let mut ws = fx.offline();
        let root_id = ws.resolve(&root).unwrap();
        let m = ws.project(root_id).children[0];
        let deps = ws.effective_dependencies(m);

        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].artifact_id, "common");
    }

    #[test]
    fn test_shared_dependency_is_one_project() {
        let fx = Fixture::new();
        fx.install("x", "shared", "1", "");
        fx.install(
            "x",
            "left",
            "1",
            &format!("<dependencies>{}</dependencies>", dep("x", "shared", "1", "")),
        );
        fx.install(
            "x",
            "right",
            "1",
            &format!("<dependencies>{}</dependencies>", dep("x", "shared", "1", "")),
        );
        let dir = fx.project(
            "app",
            &format!(
                "<dependencies>{}{}</dependencies>",
                dep("x", "left", "1", ""),
                dep("x", "right", "1", "")
            ),
        );

        let mut ws = fx.offline();
        let app = ws.resolve(&dir).unwrap();
        let resolution = ws.resolve_dependencies(app).unwrap();

        assert_eq!(resolution.projects.len(), 3);
        let left = ws.find(&Coordinate::new("x", "left", "1")).unwrap();
        let right = ws.find(&Coordinate::new("x", "right", "1")).unwrap();
        let via_left = ws.find_project(left, &Coordinate::new("x", "shared", "1")).unwrap();
        let via_right = ws.find_project(right, &Coordinate::new("x", "shared", "1")).unwrap();
        assert_eq!(via_left, via_right);
    }
}
