//! Build configuration.
//!
//! Defaults are overlaid by `MINIBUILD_*` environment variables, and the CLI
//! overlays its flags on top of that.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::MissingReason;
use crate::paths;

/// Remote repository consulted when nothing else is configured.
pub const DEFAULT_REMOTE: &str = "https://repo1.maven.org/maven2/";

/// How long a snapshot or range check stays fresh: 1440 minutes.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Options recognised by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Never touch the network.
    pub offline: bool,
    /// Fetch missing artifacts and descriptors from remote repositories.
    pub download_automatically: bool,
    /// Maximum age of a snapshot or range check before it is repeated.
    pub update_interval: Duration,
    /// Treat every remote lookup as disabled while still using the local cache.
    pub ignore_repositories: bool,
    /// Log more. Has no effect on resolution.
    pub verbose: bool,
    /// Log everything. Has no effect on resolution.
    pub debug: bool,
    /// Root of the local artifact cache.
    pub repository: PathBuf,
    /// Remote repository base URLs, each ending in `/`.
    pub remote_repositories: Vec<String>,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            offline: false,
            download_automatically: true,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            ignore_repositories: false,
            verbose: false,
            debug: false,
            repository: paths::default_repository(),
            remote_repositories: vec![DEFAULT_REMOTE.to_string()],
            timeout: None,
        }
    }
}

impl BuildConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Overlay settings from an environment lookup.
    ///
    /// Recognised variables: `MINIBUILD_OFFLINE`, `MINIBUILD_REPOSITORIES`,
    /// `MINIBUILD_UPDATE_INTERVAL` (minutes), `MINIBUILD_REPOSITORY`,
    /// `MINIBUILD_REMOTE` (comma separated) and `MINIBUILD_TIMEOUT_SECS`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("MINIBUILD_OFFLINE") {
            self.offline = is_truthy(&value);
        }
        if lookup("MINIBUILD_REPOSITORIES").is_some_and(|v| v.trim() == "ignore") {
            self.ignore_repositories = true;
        }
        if let Some(value) = lookup("MINIBUILD_UPDATE_INTERVAL") {
            match value.trim().parse::<u64>() {
                Ok(minutes) => self.update_interval = Duration::from_secs(minutes * 60),
                Err(_) => tracing::warn!("Ignoring invalid update interval: {value}"),
            }
        }
        if let Some(value) = lookup("MINIBUILD_REPOSITORY").filter(|v| !v.is_empty()) {
            self.repository = PathBuf::from(value);
        }
        if let Some(value) = lookup("MINIBUILD_REMOTE") {
            let remotes: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(paths::normalize_repository_url)
                .collect();
            if !remotes.is_empty() {
                self.remote_repositories = remotes;
            }
        }
        if let Some(value) = lookup("MINIBUILD_TIMEOUT_SECS") {
            match value.trim().parse::<u64>() {
                Ok(secs) => self.timeout = Some(Duration::from_secs(secs)),
                Err(_) => tracing::warn!("Ignoring invalid timeout: {value}"),
            }
        }
    }

    /// The reason remote lookups are currently switched off, if any.
    pub fn download_blocker(&self) -> Option<MissingReason> {
        if self.offline {
            Some(MissingReason::Offline)
        } else if self.ignore_repositories {
            Some(MissingReason::RepositoriesIgnored)
        } else if !self.download_automatically {
            Some(MissingReason::AutoDownloadDisabled)
        } else {
            None
        }
    }

    /// Whether missing artifacts may be fetched.
    pub fn downloads_enabled(&self) -> bool {
        self.download_blocker().is_none()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
