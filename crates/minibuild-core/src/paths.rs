use dirs::home_dir;
use std::path::{Path, PathBuf};

/// File name of a project descriptor inside a project directory.
pub const DESCRIPTOR_FILE: &str = "pom.xml";

/// Returns the default local artifact cache, or None if the user's home cannot be resolved.
pub fn try_default_repository() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".m2").join("repository"))
}

/// Returns the local artifact cache (`~/.m2/repository`).
///
/// Falls back to a relative `.m2/repository` when no home directory exists.
pub fn default_repository() -> PathBuf {
    try_default_repository().unwrap_or_else(|| PathBuf::from(".m2").join("repository"))
}

/// Descriptor path for a project directory: `<dir>/pom.xml`
pub fn descriptor_path(dir: &Path) -> PathBuf {
    dir.join(DESCRIPTOR_FILE)
}

/// Extract the final path segment of a URL.
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}

/// Make sure a repository base URL ends with exactly one `/`.
pub fn normalize_repository_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}

/// Walk up from `start` to the nearest directory containing `.git`.
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Canonicalize a path, keeping it unchanged if it does not exist yet.
pub fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
