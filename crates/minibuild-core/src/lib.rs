//! Core library for minibuild.
//!
//! A [`Workspace`] turns a tree of project descriptors into a linked project
//! graph, fetching missing artifacts from remote repositories into the local
//! cache and handing an ordered build plan to a [`CompileBackend`].

pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod io;
pub mod metadata;
pub mod paths;
pub mod project;
pub mod reporter;
pub mod workspace;
pub mod xml;

mod dependencies;
mod graph;
mod plan;
mod remote;

pub use compiler::{CompileBackend, CompileError, JavacBackend};
pub use config::BuildConfig;
pub use dependencies::Resolution;
pub use error::{MissingReason, ResolveError};
pub use io::exec::{Platform, quote_arg};
pub use io::fetch::{FetchError, Fetcher};
pub use project::{Project, ProjectId};
pub use reporter::{NullReporter, Reporter};
pub use workspace::Workspace;

/// User Agent string sent with every repository request
pub const USER_AGENT: &str = concat!("minibuild/", env!("CARGO_PKG_VERSION"));
