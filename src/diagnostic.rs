use std::fmt;

use crate::span::Span;

/// An engine diagnostic (error or warning).
///
/// Every fallible operation in the crate reports through this type: parse
/// errors, structural errors raised while specializing, compile errors, and
/// runtime errors raised inside function bodies.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Coarse classification used by callers that need to react to a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Lexing or parsing failed.
    Syntax,
    /// A name could not be resolved, or a keyword argument names nothing.
    Name,
    /// A value had the wrong shape for an operation, or a non-function
    /// object was handed to the compiler.
    Type,
    /// The input is outside what the engine handles (no source, recursion,
    /// non-definition trees).
    Unsupported,
    /// The reassembled unit did not contain the expected definition.
    DefinitionNotFound,
    /// An error raised while executing a function body.
    Runtime,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Name => "name error",
            ErrorKind::Type => "type error",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::DefinitionNotFound => "definition not found",
            ErrorKind::Runtime => "runtime error",
        }
    }
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self::new(Severity::Error, ErrorKind::Syntax, message, span)
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self::new(Severity::Warning, ErrorKind::Syntax, message, span)
    }

    pub fn name(message: String, span: Span) -> Self {
        Self::new(Severity::Error, ErrorKind::Name, message, span)
    }

    pub fn type_error(message: String, span: Span) -> Self {
        Self::new(Severity::Error, ErrorKind::Type, message, span)
    }

    pub fn unsupported(message: String, span: Span) -> Self {
        Self::new(Severity::Error, ErrorKind::Unsupported, message, span)
    }

    pub fn runtime(message: String, span: Span) -> Self {
        Self::new(Severity::Error, ErrorKind::Runtime, message, span)
    }

    fn new(severity: Severity, kind: ErrorKind, message: String, span: Span) -> Self {
        Self {
            severity,
            kind,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Attach a location if the diagnostic does not carry one yet.
    pub fn or_span(mut self, span: Span) -> Self {
        if self.span.is_dummy() {
            self.span = span;
        }
        self
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        let start = (self.span.start as usize).min(source.len());
        let end = (self.span.end as usize).clamp(start, source.len());

        let mut report = Report::build(kind, filename, start)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, start..end))
                    .with_message(self.kind.as_str())
                    .with_color(color),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        if report
            .finish()
            .eprint((filename, Source::from(source)))
            .is_err()
        {
            eprintln!("{}", self);
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}
