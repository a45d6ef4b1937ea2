//! Child process helper.
//!
//! Both output pipes are drained on their own threads before waiting on the
//! child, so a chatty process cannot block on a full pipe buffer.

use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;

/// Errors from [`run`].
#[derive(Error, Debug)]
pub enum ExecError {
    /// The process could not be started.
    #[error("Failed to run {command}: {source}")]
    Spawn {
        /// Program name.
        command: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("{command} exited with {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZero {
        /// Program name.
        command: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

/// Target platform for argument quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Arguments are passed through untouched.
    Unix,
    /// Arguments are joined into a single command line.
    Windows {
        /// Running under an MSYS shell (`MSYSTEM` set).
        msys: bool,
    },
}

impl Platform {
    /// The platform this process runs on.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows {
                msys: std::env::var_os("MSYSTEM").is_some(),
            }
        } else {
            Self::Unix
        }
    }
}

/// Quote one argument for a raw command line.
///
/// Only Windows needs this: spaces and single quotes are wrapped in double
/// quotes, and a double quote becomes `\"` under MSYS or `'"'` otherwise.
///
/// ```
/// use minibuild_core::{Platform, quote_arg};
///
/// assert_eq!(quote_arg("a b", Platform::Unix), "a b");
/// assert_eq!(quote_arg("a b", Platform::Windows { msys: false }), "a\" \"b");
/// ```
pub fn quote_arg(arg: &str, platform: Platform) -> Cow<'_, str> {
    let Platform::Windows { msys } = platform else {
        return Cow::Borrowed(arg);
    };
    if !arg.contains([' ', '"', '\'']) {
        return Cow::Borrowed(arg);
    }

    let mut quoted = String::with_capacity(arg.len() + 8);
    for c in arg.chars() {
        match c {
            '"' if msys => quoted.push_str("\\\""),
            '"' => quoted.push_str("'\"'"),
            ' ' | '\'' => {
                quoted.push('"');
                quoted.push(c);
                quoted.push('"');
            }
            other => quoted.push(other),
        }
    }
    Cow::Owned(quoted)
}

/// Run `program` with `args` in `dir` and return its standard output.
///
/// # Errors
///
/// [`ExecError::Spawn`] if the process cannot start, [`ExecError::NonZero`]
/// carrying the captured standard error if it exits unsuccessfully.
pub fn run(dir: Option<&Path>, program: &Path, args: &[String]) -> Result<String, ExecError> {
    let command_name = program.display().to_string();
    let spawn_error = |source| ExecError::Spawn {
        command: command_name.clone(),
        source,
    };

    let mut command = Command::new(program);
    push_args(&mut command, args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    tracing::debug!("exec {command_name} {}", args.join(" "));

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let status = child.wait().map_err(spawn_error)?;

    let stdout = stdout.map(join).unwrap_or_default();
    let stderr = stderr.map(join).unwrap_or_default();

    if status.success() {
        Ok(stdout)
    } else {
        Err(ExecError::NonZero {
            command: command_name,
            code: status.code(),
            stderr,
        })
    }
}

#[cfg(windows)]
fn push_args(command: &mut Command, args: &[String]) {
    use std::os::windows::process::CommandExt;

    let platform = Platform::current();
    for arg in args {
        command.raw_arg(quote_arg(arg, platform).as_ref());
    }
}

#[cfg(not(windows))]
fn push_args(command: &mut Command, args: &[String]) {
    command.args(args);
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            tracing::debug!("pipe read failed: {e}");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
