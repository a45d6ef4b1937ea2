//! Repository metadata (`maven-metadata.xml`).
//!
//! Fetched copies are stored under marker names whose modification time
//! records the last remote check.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use minibuild_schema::SNAPSHOT_SUFFIX;

use crate::xml::{ElementEvents, XmlError, XmlEvent};

/// Remote metadata file name.
pub const METADATA_FILE: &str = "maven-metadata.xml";

/// Local copy of snapshot metadata, kept in the version directory.
pub const SNAPSHOT_MARKER: &str = "maven-metadata-snapshot.xml";

/// Local copy of artifact-level metadata, kept in the artifact directory.
pub const VERSION_MARKER: &str = "maven-metadata-version.xml";

#[derive(Default)]
struct SnapshotVersion {
    extension: Option<String>,
    classifier: Option<String>,
    value: Option<String>,
}

/// Concrete build of a snapshot described by version-level metadata.
///
/// The `jar` entry of `snapshotVersions` wins; otherwise the version is
/// assembled from `snapshot/timestamp` and `snapshot/buildNumber` on top of
/// `base_version` without its `-SNAPSHOT` suffix.
///
/// # Errors
///
/// Malformed XML.
pub fn snapshot_version<R: BufRead>(
    reader: R,
    base_version: &str,
) -> Result<Option<String>, XmlError> {
    let mut timestamp = None;
    let mut build_number = None;
    let mut entries: Vec<SnapshotVersion> = Vec::new();

    for event in ElementEvents::new(reader) {
        match event? {
            XmlEvent::Open(path) if path == "metadata/versioning/snapshotVersions/snapshotVersion" => {
                entries.push(SnapshotVersion::default());
            }
            XmlEvent::Text { path, text } => match path.as_str() {
                "metadata/versioning/snapshot/timestamp" => timestamp = Some(text),
                "metadata/versioning/snapshot/buildNumber" => build_number = Some(text),
                "metadata/versioning/snapshotVersions/snapshotVersion/extension" => {
                    if let Some(entry) = entries.last_mut() {
                        entry.extension = Some(text);
                    }
                }
                "metadata/versioning/snapshotVersions/snapshotVersion/classifier" => {
                    if let Some(entry) = entries.last_mut() {
                        entry.classifier = Some(text);
                    }
                }
                "metadata/versioning/snapshotVersions/snapshotVersion/value" => {
                    if let Some(entry) = entries.last_mut() {
                        entry.value = Some(text);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    let listed = entries.into_iter().find(|e| {
        e.extension.as_deref() == Some("jar") && e.classifier.is_none() && e.value.is_some()
    });
    if let Some(entry) = listed {
        return Ok(entry.value);
    }

    Ok(timestamp.zip(build_number).map(|(timestamp, build)| {
        let base = base_version
            .strip_suffix(SNAPSHOT_SUFFIX)
            .unwrap_or(base_version);
        format!("{base}-{timestamp}-{build}")
    }))
}

/// Every version listed by artifact-level metadata, in document order.
///
/// # Errors
///
/// Malformed XML.
pub fn versions<R: BufRead>(reader: R) -> Result<Vec<String>, XmlError> {
    let mut versions = Vec::new();
    for event in ElementEvents::new(reader) {
        match event? {
            XmlEvent::Text { path, text } if path == "metadata/versioning/versions/version" => {
                versions.push(text);
            }
            _ => {}
        }
    }
    Ok(versions)
}

/// [`snapshot_version`] read from a marker file. Unreadable markers yield `None`.
pub fn read_snapshot_marker(path: &Path, base_version: &str) -> Option<String> {
    let file = File::open(path).ok()?;
    snapshot_version(BufReader::new(file), base_version)
        .inspect_err(|e| tracing::debug!("Ignoring unreadable {}: {e}", path.display()))
        .ok()
        .flatten()
}

/// [`versions`] read from a marker file. Unreadable markers yield `None`.
pub fn read_version_marker(path: &Path) -> Option<Vec<String>> {
    let file = File::open(path).ok()?;
    versions(BufReader::new(file))
        .inspect_err(|e| tracing::debug!("Ignoring unreadable {}: {e}", path.display()))
        .ok()
}
