//! Structural type inference over a resolved script.
//!
//! Every binding starts as a fresh type variable. Uses refine it through
//! subtyping constraints; a failure is reported once per attempt and checking
//! carries on.

use crate::diagnostics::Reporter;
use crate::language::{ast::Literal, resolved::*};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

mod builtins;
mod checker;
mod types;

pub use builtins::{BuiltinTypes, MethodSpec, TypeSpec};
pub use checker::Checker;
pub use types::{ConstraintFailure, Signature, TypeArena, TypeId, TypeNode};

/// Checks `script` with the host's globals typed as described by `host`.
/// Globals the host does not describe are left unconstrained.
#[tracing::instrument(skip_all)]
pub fn check<'a, R: Reporter>(
    script: &ResolvedScript,
    host: impl IntoIterator<Item = (&'a str, &'a TypeSpec)>,
    reporter: &mut R,
) {
    let mut checker = Checker::new(reporter);
    checker.check_script(script, host);
    tracing::debug!(nodes = checker.arena().len(), "type check finished");
}
