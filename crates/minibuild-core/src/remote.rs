//! Remote artifact resolution.
//!
//! Snapshots and version ranges are pinned to a concrete version through
//! repository metadata. A fetched metadata file is kept as a marker whose
//! modification time gates the next remote check; within the update interval
//! the marker is reused without any network traffic.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use minibuild_schema::{Coordinate, VersionRange};

use crate::descriptor::is_aggregator_file;
use crate::error::{MissingReason, ResolveError};
use crate::metadata::{
    METADATA_FILE, SNAPSHOT_MARKER, VERSION_MARKER, read_snapshot_marker, read_version_marker,
};
use crate::workspace::Workspace;

impl Workspace {
    /// Pin `coordinate` against `repository` and fetch whatever is missing.
    ///
    /// Snapshots and ranges are pinned first (reusing a fresh marker when
    /// possible). The descriptor is then downloaded, and the archive too
    /// unless the descriptor declares an aggregator. Nothing is downloaded
    /// if both are already cached.
    ///
    /// # Errors
    ///
    /// Fetch failures, unparsable ranges, or metadata naming no usable version.
    pub fn download_and_verify(
        &self,
        repository: &str,
        coordinate: &mut Coordinate,
        quiet: bool,
    ) -> Result<(), ResolveError> {
        if coordinate.is_snapshot() {
            self.pin_snapshot(repository, coordinate, quiet)?;
        } else if coordinate.is_range() {
            self.pin_range(repository, coordinate, quiet)?;
        }

        if self.is_complete(coordinate) {
            tracing::debug!("{coordinate} is already cached");
            coordinate.packaging_is_aggregate = is_aggregator_file(&self.local_pom(coordinate));
            return Ok(());
        }

        let dir = self.local_dir(coordinate);
        let base = format!("{repository}{}", coordinate.repository_path());

        let pom_url = format!("{base}{}", coordinate.pom_name());
        if !quiet {
            self.reporter.downloading(&pom_url);
        }
        let pom = self.fetcher.fetch_verified(&pom_url, &dir, None)?;
        if is_aggregator_file(&pom) {
            coordinate.packaging_is_aggregate = true;
            return Ok(());
        }

        let jar_url = format!("{base}{}", coordinate.jar_name());
        if !quiet {
            self.reporter.downloading(&jar_url);
        }
        self.fetcher.fetch_verified(&jar_url, &dir, None)?;
        Ok(())
    }

    fn pin_snapshot(
        &self,
        repository: &str,
        coordinate: &mut Coordinate,
        quiet: bool,
    ) -> Result<(), ResolveError> {
        let dir = self.local_dir(coordinate);
        let marker = dir.join(SNAPSHOT_MARKER);
        let base = coordinate.version.clone().unwrap_or_default();

        let recent = if self.is_stale(&marker) {
            None
        } else {
            read_snapshot_marker(&marker, &base)
        };
        if let Some(version) = recent {
            tracing::debug!("Snapshot {coordinate} checked recently, using {version}");
            coordinate.set_resolved_version(version);
            return Ok(());
        }

        if !quiet {
            self.reporter.checking(coordinate);
        }
        let url = format!("{repository}{}{METADATA_FILE}", coordinate.repository_path());
        self.fetcher.fetch_verified(&url, &dir, Some(SNAPSHOT_MARKER))?;
        let version =
            read_snapshot_marker(&marker, &base).ok_or_else(|| ResolveError::Metadata {
                detail: "No version found".to_string(),
                url,
            })?;
        tracing::debug!("Snapshot {coordinate} resolves to {version}");
        coordinate.set_resolved_version(version);
        Ok(())
    }

    fn pin_range(
        &self,
        repository: &str,
        coordinate: &mut Coordinate,
        quiet: bool,
    ) -> Result<(), ResolveError> {
        let range = parse_range(coordinate)?;
        let dir = self.config.repository.join(coordinate.artifact_path());
        let marker = dir.join(VERSION_MARKER);

        let cached = if self.is_stale(&marker) {
            Vec::new()
        } else {
            read_version_marker(&marker).unwrap_or_default()
        };
        if let Some(version) = range.highest(cached.iter().map(String::as_str)) {
            tracing::debug!("Range {coordinate} checked recently, using {version}");
            coordinate.set_resolved_version(version);
            return Ok(());
        }

        if !quiet {
            self.reporter.checking(coordinate);
        }
        let url = format!("{repository}{}{METADATA_FILE}", coordinate.artifact_path());
        self.fetcher.fetch_verified(&url, &dir, Some(VERSION_MARKER))?;
        let listed = read_version_marker(&marker).unwrap_or_default();
        let version = range
            .highest(listed.iter().map(String::as_str))
            .ok_or_else(|| ResolveError::Metadata {
                detail: format!("No version in {range} found"),
                url,
            })?;
        tracing::debug!("Range {coordinate} resolves to {version}");
        coordinate.set_resolved_version(version);
        Ok(())
    }

    /// Pin a snapshot or range using only the local cache.
    ///
    /// A snapshot takes the version recorded in its marker regardless of age
    /// and otherwise keeps its symbolic version. A range takes the highest
    /// locally present version directory holding a descriptor. Returns
    /// `false` if a range has no local match.
    ///
    /// # Errors
    ///
    /// An unparsable range.
    pub fn resolve_version(&self, coordinate: &mut Coordinate) -> Result<bool, ResolveError> {
        if coordinate.is_snapshot() {
            let marker = self.local_dir(coordinate).join(SNAPSHOT_MARKER);
            let base = coordinate.version.clone().unwrap_or_default();
            if let Some(version) = read_snapshot_marker(&marker, &base) {
                coordinate.set_resolved_version(version);
            }
            return Ok(true);
        }
        if !coordinate.is_range() {
            return Ok(true);
        }

        let range = parse_range(coordinate)?;
        let dir = self.config.repository.join(coordinate.artifact_path());
        let local: Vec<String> = fs::read_dir(&dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().is_dir())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .filter(|version| {
                        dir.join(version)
                            .join(format!("{}-{version}.pom", coordinate.artifact_id))
                            .is_file()
                    })
                    .collect()
            })
            .unwrap_or_default();

        match range.highest(local.iter().map(String::as_str)) {
            Some(version) => {
                tracing::debug!("Range {coordinate} satisfied locally by {version}");
                coordinate.set_resolved_version(version);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Try each repository in turn until one yields the artifact.
    ///
    /// Fatal errors abort at once; anything else moves on to the next
    /// repository, and the last such error is returned if none succeeds.
    pub(crate) fn download_from(
        &self,
        repositories: &[String],
        coordinate: &mut Coordinate,
    ) -> Result<(), ResolveError> {
        let mut last_error = None;
        for repository in repositories {
            let mut attempt = coordinate.clone();
            match self.download_and_verify(repository, &mut attempt, false) {
                Ok(()) => {
                    *coordinate = attempt;
                    return Ok(());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!("{coordinate} not available from {repository}: {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ResolveError::MissingDependency {
            coordinate: coordinate.to_string(),
            reason: MissingReason::NotInRepository,
        }))
    }

    /// Local version directory of a coordinate.
    pub(crate) fn local_dir(&self, coordinate: &Coordinate) -> PathBuf {
        self.config.repository.join(coordinate.repository_path())
    }

    fn local_pom(&self, coordinate: &Coordinate) -> PathBuf {
        self.local_dir(coordinate).join(coordinate.pom_name())
    }

    /// Descriptor cached, plus the archive unless it is an aggregator.
    pub(crate) fn is_complete(&self, coordinate: &Coordinate) -> bool {
        let pom = self.local_pom(coordinate);
        if !pom.is_file() {
            return false;
        }
        self.local_dir(coordinate).join(coordinate.jar_name()).is_file() || is_aggregator_file(&pom)
    }

    /// True if `marker` is missing or older than the update interval.
    pub(crate) fn is_stale(&self, marker: &Path) -> bool {
        let Ok(modified) = fs::metadata(marker).and_then(|m| m.modified()) else {
            return true;
        };
        SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age > self.config.update_interval)
    }
}

fn parse_range(coordinate: &Coordinate) -> Result<VersionRange, ResolveError> {
    VersionRange::parse(coordinate.version.as_deref().unwrap_or_default()).map_err(|source| {
        ResolveError::Version {
            coordinate: format!("{}:{}", coordinate.group_id, coordinate.artifact_id),
            source,
        }
    })
}
