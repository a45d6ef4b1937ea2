//! Reporter trait for dependency injection
//!
//! Core logic reports user-facing progress through this trait so it is not
//! coupled to any particular terminal output.

use std::path::Path;

use minibuild_schema::Coordinate;

/// Receives progress events from a [`Workspace`](crate::Workspace).
pub trait Reporter: Send + Sync {
    /// A descriptor is about to be parsed.
    fn parsing(&self, path: &Path);

    /// Remote metadata is being consulted for a snapshot or range.
    fn checking(&self, coordinate: &Coordinate);

    /// A file is being downloaded.
    fn downloading(&self, url: &str);

    /// A project is about to be compiled.
    fn compiling(&self, coordinate: &Coordinate, sources: usize);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn parsing(&self, path: &Path) {
        (**self).parsing(path);
    }
    fn checking(&self, coordinate: &Coordinate) {
        (**self).checking(coordinate);
    }
    fn downloading(&self, url: &str) {
        (**self).downloading(url);
    }
    fn compiling(&self, coordinate: &Coordinate, sources: usize) {
        (**self).compiling(coordinate, sources);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn parsing(&self, _path: &Path) {}
    fn checking(&self, _coordinate: &Coordinate) {}
    fn downloading(&self, _url: &str) {}
    fn compiling(&self, _coordinate: &Coordinate, _sources: usize) {}
    fn info(&self, _msg: &str) {}
    fn warning(&self, _msg: &str) {}
}
