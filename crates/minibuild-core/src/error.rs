//! Resolution errors.

use std::fmt;
use std::path::PathBuf;

use minibuild_schema::RangeError;
use serde::Serialize;
use thiserror::Error;

use crate::io::fetch::FetchError;

/// Why a dependency could not be located.
///
/// The message names the setting that has to change for the lookup to
/// succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingReason {
    /// Would download, but offline mode is on.
    Offline,
    /// Remote repositories are being ignored.
    RepositoriesIgnored,
    /// Automatic download is switched off.
    AutoDownloadDisabled,
    /// Downloads were attempted but no repository has it.
    NotInRepository,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Offline => "offline mode is on (drop --offline / MINIBUILD_OFFLINE)",
            Self::RepositoriesIgnored => {
                "remote repositories are ignored (drop --ignore-repositories / MINIBUILD_REPOSITORIES=ignore)"
            }
            Self::AutoDownloadDisabled => "automatic download is disabled (drop --no-download)",
            Self::NotInRepository => "not found in any remote repository",
        })
    }
}

/// Errors raised while building the project graph or resolving dependencies.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Malformed or unreadable descriptor.
    #[error("Invalid descriptor {}: {detail}", .path.display())]
    Descriptor {
        /// Descriptor file.
        path: PathBuf,
        /// What went wrong.
        detail: String,
    },

    /// A required coordinate field is still missing after inheritance.
    #[error("{}: missing required field '{field}'", .path.display())]
    MissingField {
        /// Descriptor file.
        path: PathBuf,
        /// Field name, e.g. `version`.
        field: &'static str,
    },

    /// A declared parent could not be located locally or remotely.
    #[error("Parent not found: {coordinate} (required by {child}){hint}")]
    UnresolvedParent {
        /// The declared parent.
        coordinate: String,
        /// The project declaring it.
        child: String,
        /// Suffix telling the user what to change.
        hint: String,
    },

    /// Fetching a remote resource failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Remote metadata was readable but did not contain what was needed.
    #[error("{detail} in {url}")]
    Metadata {
        /// Metadata URL.
        url: String,
        /// What was missing.
        detail: String,
    },

    /// A version range could not be parsed.
    #[error("Invalid version range for {coordinate}: {source}")]
    Version {
        /// Offending dependency.
        coordinate: String,
        /// Parse failure.
        #[source]
        source: RangeError,
    },

    /// A dependency is neither cached nor fetchable.
    #[error("Dependency {coordinate} not found: {reason}")]
    MissingDependency {
        /// The dependency.
        coordinate: String,
        /// Which setting prevented the lookup.
        reason: MissingReason,
    },

    /// Source projects depend on each other in a loop.
    #[error("Dependency cycle through {coordinate}")]
    DependencyCycle {
        /// A project on the cycle.
        coordinate: String,
    },

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    /// Whether trying another repository is pointless.
    ///
    /// Checksum mismatches, offline refusals and local IO failures abort
    /// immediately; transport and lookup failures move on to the next source.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fetch(err) => err.is_fatal(),
            Self::Io(_) => true,
            _ => false,
        }
    }
}
