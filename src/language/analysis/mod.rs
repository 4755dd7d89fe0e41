//! Flow passes that run over the resolved tree next to the type checker.

use crate::diagnostics::{Phase, Reporter};
use crate::language::resolved::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;

mod assignment;
mod returns;

/// Reports reads of locals and instance fields that may happen before any
/// write reaches them.
#[tracing::instrument(skip_all)]
pub fn check_assignments<R: Reporter>(script: &ResolvedScript, reporter: &mut R) {
    assignment::AssignmentChecker::new(script, reporter).check_script(script);
}

/// Reports misplaced returns and methods that mix value and empty returns.
#[tracing::instrument(skip_all)]
pub fn check_returns<R: Reporter>(script: &ResolvedScript, reporter: &mut R) {
    returns::ReturnChecker::new(reporter).check_script(script);
}
