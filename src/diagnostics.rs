use crate::language::token::Token;
use miette::{Diagnostic as MietteDiagnostic, Report};
use thiserror::Error;

/// Which pass produced a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Typecheck,
    Flow,
    Returns,
}

impl Phase {
    fn code(self) -> &'static str {
        match self {
            Phase::Resolve => "ember::resolve",
            Phase::Typecheck => "ember::typecheck",
            Phase::Flow => "ember::flow",
            Phase::Returns => "ember::returns",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("[line {line}] Error{location}: {message}")]
pub struct Diagnostic {
    pub phase: Phase,
    pub line: usize,
    /// ` at 'lexeme'` when the error is tied to a token, empty otherwise.
    pub location: String,
    pub message: String,
}

impl MietteDiagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(self.phase.code()))
    }
}

impl Diagnostic {
    pub fn at_line(phase: Phase, line: usize, message: impl Into<String>) -> Self {
        Self {
            phase,
            line,
            location: String::new(),
            message: message.into(),
        }
    }

    pub fn at_token(phase: Phase, token: &Token, message: impl Into<String>) -> Self {
        Self {
            phase,
            line: token.line,
            location: format!(" at '{}'", token.lexeme),
            message: message.into(),
        }
    }
}

/// Sink shared by every static pass. Reporting never fails; callers poll
/// [`Reporter::had_error`] once a pass is done.
pub trait Reporter {
    fn report(&mut self, diagnostic: Diagnostic);

    fn had_error(&self) -> bool;

    fn error_at_line(&mut self, phase: Phase, line: usize, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Diagnostic::at_line(phase, line, message));
    }

    fn error_at_token(&mut self, phase: Phase, token: &Token, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Diagnostic::at_token(phase, token, message));
    }
}

#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl Reporter for DiagnosticBag {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "diagnostic reported");
        self.diagnostics.push(diagnostic);
    }

    fn had_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

pub fn emit(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{:?}", Report::new(diagnostic.clone()));
    }
}

pub fn report_runtime_error(error: &crate::runtime::error::RuntimeError) {
    eprintln!("{:?}", Report::new(error.clone()));
}
