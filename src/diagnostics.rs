//! Diagnostic sink shared by every compile stage.
//!
//! Recoverable problems are recorded and compilation keeps going with a safe
//! default, so one run surfaces as many problems as possible. Only a missing
//! top-level header or an unreadable input aborts a parse, and even those are
//! recorded here first.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Error taxonomy. Rendering does not show the kind; tests and the JSON
/// dump use it to tell problems apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Malformed directive or section nesting.
    Syntax,
    /// Name not found in its namespace.
    UnknownSymbol,
    /// Numeric value outside its declared bound.
    Range,
    /// Duplicates, dimension mismatches, stamp overlap, dangling exits.
    Structural,
    /// Input could not be read.
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub line: usize,
    pub col: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    /// `path:line:col: error: message`, with the path made absolute when possible.
    pub fn render(&self) -> String {
        let path = std::path::absolute(&self.file).unwrap_or_else(|_| self.file.clone());
        format!(
            "{}:{}:{}: error: {}",
            path.display(),
            self.line,
            self.col,
            self.message
        )
    }
}

/// Parsing aborted on an unrecoverable condition. The cause is already in the sink.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("compilation aborted: {0}")]
pub struct Aborted(pub &'static str);

/// Where recoverable problems go. Every parse/compile function takes one.
pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: Diagnostic);

    fn has_errors(&self) -> bool;
}

/// Location-bound view over a sink: all entries go to one file.
pub struct Reporter<'a> {
    sink: &'a mut dyn DiagnosticSink,
    file: PathBuf,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a mut dyn DiagnosticSink, file: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            file: file.into(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Reborrow the underlying sink, e.g. to report against another file.
    pub fn sink(&mut self) -> &mut dyn DiagnosticSink {
        &mut *self.sink
    }

    pub fn error(&mut self, kind: ErrorKind, line: usize, col: usize, message: impl Into<String>) {
        self.sink.record(Diagnostic {
            file: self.file.clone(),
            line: line.max(1),
            col: col.max(1),
            kind,
            message: message.into(),
        });
    }
}

/// Per-invocation collector. Entries keep insertion order.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    entries: Vec<Diagnostic>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn error_count(&self) -> usize {
        self.entries.len()
    }

    pub fn count_kind(&self, kind: ErrorKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn report(&self, out: &mut impl Write) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(out, "{}", entry.render())?;
        }
        Ok(())
    }

    /// Print every entry to stderr; exit with status 1 if there are any.
    pub fn report_and_exit(&self) {
        let stderr = io::stderr();
        let _ = self.report(&mut stderr.lock());
        if self.has_errors() {
            std::process::exit(1);
        }
    }
}

impl DiagnosticSink for ErrorCollector {
    fn record(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(kind = ?diagnostic.kind, line = diagnostic.line, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }
}
