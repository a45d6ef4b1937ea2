//! Compiler backends.
//!
//! The workspace hands each backend a project's sources, its classpath and
//! an output directory. [`JavacBackend`] shells out to the JDK compiler.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use thiserror::Error;

use crate::error::ResolveError;
use crate::io::exec::{self, ExecError};

/// Errors from compiling a project.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The compiler rejected the sources.
    #[error("Compiling {project} failed:\n{detail}")]
    Failed {
        /// Project that failed, empty if not yet known.
        project: String,
        /// Compiler diagnostics.
        detail: String,
    },

    /// No compiler could be located.
    #[error("No javac found; set JAVA_HOME or put javac on PATH")]
    NoCompiler,

    /// The compiler process could not be run.
    #[error(transparent)]
    Exec(ExecError),

    /// Dependencies could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Output directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// Attach the project name to a [`CompileError::Failed`].
    #[must_use]
    pub fn for_project(self, name: &str) -> Self {
        match self {
            Self::Failed { project, detail } if project.is_empty() => Self::Failed {
                project: name.to_string(),
                detail,
            },
            other => other,
        }
    }
}

impl From<ExecError> for CompileError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::NonZero { stderr, .. } => Self::Failed {
                project: String::new(),
                detail: stderr,
            },
            spawn @ ExecError::Spawn { .. } => Self::Exec(spawn),
        }
    }
}

/// Something that turns sources into class files.
pub trait CompileBackend: Send + Sync {
    /// Compile `sources` against `classpath` into `output`.
    ///
    /// # Errors
    ///
    /// [`CompileError::Failed`] with the diagnostics if compilation fails.
    fn compile(
        &self,
        sources: &[PathBuf],
        classpath: &[PathBuf],
        output: &Path,
    ) -> Result<(), CompileError>;
}

/// Runs the `javac` executable.
///
/// The executable is located once, on first use. Invocations are serialised.
#[derive(Debug, Default)]
pub struct JavacBackend {
    javac: OnceLock<Option<PathBuf>>,
    lock: Mutex<()>,
}

impl JavacBackend {
    /// Backend that has not looked for `javac` yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of `javac`, preferring `JAVA_HOME/bin` over `PATH`.
    pub fn javac(&self) -> Option<&Path> {
        self.javac
            .get_or_init(|| {
                let found = locate_javac(env::var_os("JAVA_HOME").map(PathBuf::from).as_deref());
                match &found {
                    Some(path) => tracing::debug!("Using {}", path.display()),
                    None => tracing::warn!("javac not found"),
                }
                found
            })
            .as_deref()
    }
}

impl CompileBackend for JavacBackend {
    fn compile(
        &self,
        sources: &[PathBuf],
        classpath: &[PathBuf],
        output: &Path,
    ) -> Result<(), CompileError> {
        let javac = self.javac().ok_or(CompileError::NoCompiler)?;
        let args = javac_args(sources, classpath, output)?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        exec::run(None, javac, &args)?;
        Ok(())
    }
}

fn locate_javac(java_home: Option<&Path>) -> Option<PathBuf> {
    let name = if cfg!(windows) { "javac.exe" } else { "javac" };
    java_home
        .map(|home| home.join("bin").join(name))
        .filter(|candidate| candidate.is_file())
        .or_else(|| which::which("javac").ok())
}

fn javac_args(
    sources: &[PathBuf],
    classpath: &[PathBuf],
    output: &Path,
) -> Result<Vec<String>, CompileError> {
    let mut args = vec!["-d".to_string(), output.display().to_string()];
    if !classpath.is_empty() {
        let joined = env::join_paths(classpath).map_err(|e| CompileError::Failed {
            project: String::new(),
            detail: e.to_string(),
        })?;
        args.push("-classpath".to_string());
        args.push(joined.to_string_lossy().into_owned());
    }
    args.extend(sources.iter().map(|s| s.display().to_string()));
    Ok(args)
}
