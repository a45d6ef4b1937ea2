//! Shared types for minibuild: project coordinates and the version policy.
//!
//! Everything in this crate is pure. Filesystem and network access live in
//! `minibuild-core`.

pub mod coordinate;
pub mod version;

// Re-exports
pub use coordinate::{Coordinate, CoordinateKey, Scope};
pub use version::{RangeError, VersionRange, compare_versions, is_snapshot, is_timestamp};

/// Suffix marking a symbolic snapshot version.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Packaging value that marks an aggregator project.
pub const AGGREGATOR_PACKAGING: &str = "pom";
