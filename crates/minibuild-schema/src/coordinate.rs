//! Artifact coordinates.
//!
//! A [`Coordinate`] names one artifact as `group:artifact:version` with an
//! optional classifier. Its [`CoordinateKey`] leaves the version out, and the
//! repository path and file names follow the Maven layout.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::version::is_snapshot;

/// Dependency scope as declared in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Needed to compile and run (default).
    #[default]
    Compile,
    /// Needed only at runtime.
    Runtime,
    /// Supplied by the environment; compiled against but never inherited.
    Provided,
    /// Only needed by tests; never resolved for a build.
    Test,
    /// A file on disk referenced through `systemPath`.
    System,
    /// Dependency-management import.
    Import,
}

impl Scope {
    /// Parse a scope name. Unknown names fall back to [`Scope::Compile`].
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "runtime" => Self::Runtime,
            "provided" => Self::Provided,
            "test" => Self::Test,
            "system" => Self::System,
            "import" => Self::Import,
            _ => Self::Compile,
        }
    }

    /// Whether dependencies of this scope are followed past the first edge.
    pub fn is_transitive(self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }

    /// The descriptor spelling of this scope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Runtime => "runtime",
            Self::Provided => "provided",
            Self::Test => "test",
            Self::System => "system",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache identity of a coordinate: `groupId:artifactId:classifier`.
///
/// The version is deliberately excluded, so every version of an artifact
/// maps to the same key.
///
/// # Example
///
/// ```
/// use minibuild_schema::CoordinateKey;
///
/// let key = CoordinateKey::new("org.example", "lib", None);
/// assert_eq!(key.as_str(), "org.example:lib:");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordinateKey(String);

impl CoordinateKey {
    /// Build a key from its parts.
    pub fn new(group_id: &str, artifact_id: &str, classifier: Option<&str>) -> Self {
        Self(format!(
            "{group_id}:{artifact_id}:{}",
            classifier.unwrap_or_default()
        ))
    }

    /// Return the raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity and version descriptor of a project or dependency.
///
/// An empty `group_id` or `artifact_id` means "not declared yet"; the graph
/// builder fills gaps from the parent and rejects anything still empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Group, e.g. `org.example`.
    pub group_id: String,
    /// Artifact name, e.g. `lib`.
    pub artifact_id: String,
    /// Declared version: literal, `-SNAPSHOT`, timestamp, or a range like `[1.0,2.0)`.
    pub version: Option<String>,
    /// Optional classifier (`sources`, `tests`, ...).
    pub classifier: Option<String>,
    /// Concrete version chosen for a range or snapshot.
    pub resolved_version: Option<String>,
    /// Dependency scope.
    #[serde(default)]
    pub scope: Scope,
    /// Optional dependencies are never followed transitively.
    #[serde(default)]
    pub optional: bool,
    /// Path of a `system`-scoped artifact.
    pub system_path: Option<String>,
    /// Set when the artifact is known to be an aggregator (`packaging == pom`).
    #[serde(default)]
    pub packaging_is_aggregate: bool,
}

impl Coordinate {
    /// Create a coordinate. An empty version is treated as undeclared.
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let version = version.into();
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: (!version.is_empty()).then_some(version),
            ..Self::default()
        }
    }

    /// Attach a classifier.
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Set the dependency scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Cache key (`groupId:artifactId:classifier`).
    pub fn key(&self) -> CoordinateKey {
        CoordinateKey::new(
            &self.group_id,
            &self.artifact_id,
            self.classifier.as_deref(),
        )
    }

    /// The effective version: the resolved one if set, else the declared one.
    pub fn version(&self) -> Option<&str> {
        self.resolved_version
            .as_deref()
            .or(self.version.as_deref())
    }

    /// True if the declared version ends in `-SNAPSHOT`.
    pub fn is_snapshot(&self) -> bool {
        self.version.as_deref().is_some_and(is_snapshot)
    }

    /// True if the declared version is a range expression.
    pub fn is_range(&self) -> bool {
        self.version
            .as_deref()
            .is_some_and(|v| v.starts_with('[') || v.starts_with('('))
    }

    /// Pin the concrete version chosen for a snapshot or range.
    pub fn set_resolved_version(&mut self, version: impl Into<String>) {
        self.resolved_version = Some(version.into());
    }

    /// Version segment of the repository directory.
    ///
    /// Snapshots live under their symbolic version even when a timestamped
    /// build has been pinned; ranges live under the pinned version.
    pub fn directory_version(&self) -> &str {
        if self.is_snapshot() {
            self.version.as_deref().unwrap_or_default()
        } else {
            self.version().unwrap_or_default()
        }
    }

    /// `artifactId-version[-classifier]`
    pub fn file_stem(&self) -> String {
        let version = self.version().unwrap_or_default();
        match &self.classifier {
            Some(classifier) => format!("{}-{version}-{classifier}", self.artifact_id),
            None => format!("{}-{version}", self.artifact_id),
        }
    }

    /// File name of the archive, e.g. `lib-1.0.jar`.
    pub fn jar_name(&self) -> String {
        format!("{}.jar", self.file_stem())
    }

    /// File name of the descriptor, e.g. `lib-1.0.pom`. Never classified.
    pub fn pom_name(&self) -> String {
        format!(
            "{}-{}.pom",
            self.artifact_id,
            self.version().unwrap_or_default()
        )
    }

    /// Repository-relative artifact directory without version: `org/example/lib/`.
    pub fn artifact_path(&self) -> String {
        format!("{}/{}/", self.group_id.replace('.', "/"), self.artifact_id)
    }

    /// Repository-relative version directory: `org/example/lib/1.0/`.
    pub fn repository_path(&self) -> String {
        format!("{}{}/", self.artifact_path(), self.directory_version())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.group_id,
            self.artifact_id,
            self.version().unwrap_or("?")
        )?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}
