//! The full pipeline: resolve, run the static passes, then interpret.

use crate::diagnostics::{self, Diagnostic, DiagnosticBag, Reporter};
use crate::host::HostEnvironment;
use crate::language::{analysis, ast::Block, resolve, typecheck};
use crate::runtime::{Interpreter, RuntimeError};
use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    pub typecheck: bool,
    pub flow_analysis: bool,
    /// Interpret even when a static pass complained. Resolution errors
    /// still stop the run.
    pub run_on_static_errors: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            typecheck: true,
            flow_analysis: true,
            run_on_static_errors: false,
        }
    }
}

impl SessionOptions {
    /// Defaults overlaid with `EMBER_TYPECHECK`, `EMBER_FLOW` and
    /// `EMBER_RUN_ON_ERRORS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            typecheck: env_flag("EMBER_TYPECHECK").unwrap_or(defaults.typecheck),
            flow_analysis: env_flag("EMBER_FLOW").unwrap_or(defaults.flow_analysis),
            run_on_static_errors: env_flag("EMBER_RUN_ON_ERRORS")
                .unwrap_or(defaults.run_on_static_errors),
        }
    }

    pub fn with_typecheck(mut self, enabled: bool) -> Self {
        self.typecheck = enabled;
        self
    }

    pub fn with_flow_analysis(mut self, enabled: bool) -> Self {
        self.flow_analysis = enabled;
        self
    }

    pub fn with_run_on_static_errors(mut self, enabled: bool) -> Self {
        self.run_on_static_errors = enabled;
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    parse_flag(&value)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(value = other, "ignoring unrecognised flag value");
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub diagnostics: Vec<Diagnostic>,
    pub runtime_error: Option<RuntimeError>,
    /// Whether the interpreter was started at all.
    pub executed: bool,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty() && self.runtime_error.is_none()
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }

    /// Prints everything that went wrong to stderr.
    pub fn emit(&self) {
        diagnostics::emit(&self.diagnostics);
        if let Some(error) = &self.runtime_error {
            diagnostics::report_runtime_error(error);
        }
    }
}

pub struct Session<'h> {
    host: &'h HostEnvironment,
    options: SessionOptions,
}

impl<'h> Session<'h> {
    pub fn new(host: &'h HostEnvironment, options: SessionOptions) -> Self {
        Self { host, options }
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    #[tracing::instrument(skip_all, fields(statements = root.statements.len()))]
    pub fn run(&self, root: &Block) -> Outcome {
        let mut bag = DiagnosticBag::new();
        let script = resolve::resolve(self.host.names(), root, &mut bag);
        if bag.had_error() {
            tracing::debug!(count = bag.len(), "resolution failed");
            return Outcome {
                diagnostics: bag.into_diagnostics(),
                ..Outcome::default()
            };
        }

        if self.options.flow_analysis {
            analysis::check_assignments(&script, &mut bag);
            analysis::check_returns(&script, &mut bag);
        }
        if self.options.typecheck {
            typecheck::check(&script, self.host.types(), &mut bag);
        }
        if bag.had_error() && !self.options.run_on_static_errors {
            tracing::debug!(count = bag.len(), "static passes failed");
            return Outcome {
                diagnostics: bag.into_diagnostics(),
                ..Outcome::default()
            };
        }

        let runtime_error = Interpreter::new(self.host).interpret(&script).err();
        if let Some(error) = &runtime_error {
            tracing::debug!(%error, internal = error.is_internal(), "run failed");
        }
        Outcome {
            diagnostics: bag.into_diagnostics(),
            runtime_error,
            executed: true,
        }
    }
}
