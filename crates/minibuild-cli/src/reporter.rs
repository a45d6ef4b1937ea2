//! Terminal progress output.

use std::borrow::Cow;
use std::path::Path;

use crossterm::style::Stylize;
use minibuild_core::Reporter;
use minibuild_schema::Coordinate;

/// Widest progress line printed unless verbose.
pub const LINE_WIDTH: usize = 80;

/// Writes progress to standard error, one line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn line(&self, label: &str, message: &str) {
        let text = format!("{label} {message}");
        let text = if self.verbose {
            Cow::Borrowed(text.as_str())
        } else {
            fit(&text, LINE_WIDTH)
        };
        let (label, rest) = text.split_at(label.len().min(text.len()));
        eprintln!("{}{rest}", label.cyan());
    }
}

impl Reporter for ConsoleReporter {
    fn parsing(&self, path: &Path) {
        if self.verbose {
            self.line("Parsing", &path.display().to_string());
        }
    }

    fn checking(&self, coordinate: &Coordinate) {
        let what = if coordinate.is_snapshot() {
            "for new snapshot of"
        } else {
            "versions of"
        };
        self.line("Checking", &format!("{what} {coordinate}"));
    }

    fn downloading(&self, url: &str) {
        self.line("Downloading", url);
    }

    fn compiling(&self, coordinate: &Coordinate, sources: usize) {
        let files = if sources == 1 { "file" } else { "files" };
        self.line("Compiling", &format!("{coordinate} ({sources} {files})"));
    }

    fn info(&self, msg: &str) {
        eprintln!("{msg}");
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", "warning:".yellow().bold());
    }
}

/// Cut `text` to at most `width` characters, marking the cut with `...`.
pub fn fit(text: &str, width: usize) -> Cow<'_, str> {
    if text.chars().count() <= width {
        return Cow::Borrowed(text);
    }
    let keep = width.saturating_sub(3);
    let end = text.char_indices().nth(keep).map_or(text.len(), |(i, _)| i);
    Cow::Owned(format!("{}...", &text[..end]))
}
