use crate::diagnostics::{Phase, Reporter};
use crate::language::resolved::MethodId;
use rustc_hash::FxHashSet;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    /// `None` for getters.
    pub params: Option<Vec<TypeId>>,
    pub result: TypeId,
}

#[derive(Clone, Debug)]
pub enum TypeNode {
    Variable {
        upper: Vec<TypeId>,
        lower: Vec<TypeId>,
    },
    Labeled {
        name: String,
        inner: TypeId,
    },
    Class(BTreeMap<MethodId, Signature>),
    /// Subtype of everything; the type of statements that do not return.
    Bottom,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Variable,
    Labeled,
    Class,
    Bottom,
}

/// One logical constraint attempt. However many times propagation re-derives
/// a failing inequality, the attempt reports at most once.
#[derive(Debug)]
pub struct ConstraintFailure {
    line: usize,
    sent: Cell<bool>,
}

impl ConstraintFailure {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            sent: Cell::new(false),
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn was_sent(&self) -> bool {
        self.sent.get()
    }

    pub fn send<R: Reporter>(&self, message: String, reporter: &mut R) {
        if self.sent.replace(true) {
            return;
        }
        tracing::debug!(line = self.line, %message, "constraint failed");
        reporter.error_at_line(Phase::Typecheck, self.line, message);
    }
}

/// Type nodes addressed by index. Cycles between nodes are ordinary index
/// references; `established` keeps `constrain` from walking them forever.
#[derive(Debug, Default)]
pub struct TypeArena {
    nodes: Vec<TypeNode>,
    established: FxHashSet<(TypeId, TypeId)>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: TypeNode) -> TypeId {
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn fresh_variable(&mut self) -> TypeId {
        self.push(TypeNode::Variable {
            upper: Vec::new(),
            lower: Vec::new(),
        })
    }

    pub fn labeled(&mut self, name: impl Into<String>, inner: TypeId) -> TypeId {
        self.push(TypeNode::Labeled {
            name: name.into(),
            inner,
        })
    }

    pub fn class(&mut self, methods: BTreeMap<MethodId, Signature>) -> TypeId {
        self.push(TypeNode::Class(methods))
    }

    pub fn bottom(&mut self) -> TypeId {
        self.push(TypeNode::Bottom)
    }

    /// Adds a method to an existing class node. Used to tie recursive
    /// built-in types together after their labels exist.
    pub fn add_method(&mut self, class: TypeId, method: MethodId, signature: Signature) {
        if let Some(TypeNode::Class(methods)) = self.nodes.get_mut(class.index()) {
            methods.insert(method, signature);
        }
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_established(&self, left: TypeId, right: TypeId) -> bool {
        self.established.contains(&(left, right))
    }

    pub fn upper_bounds(&self, id: TypeId) -> &[TypeId] {
        match self.node(id) {
            TypeNode::Variable { upper, .. } => upper,
            _ => &[],
        }
    }

    pub fn lower_bounds(&self, id: TypeId) -> &[TypeId] {
        match self.node(id) {
            TypeNode::Variable { lower, .. } => lower,
            _ => &[],
        }
    }

    fn kind(&self, id: TypeId) -> Kind {
        match self.node(id) {
            TypeNode::Variable { .. } => Kind::Variable,
            TypeNode::Labeled { .. } => Kind::Labeled,
            TypeNode::Class(_) => Kind::Class,
            TypeNode::Bottom => Kind::Bottom,
        }
    }

    pub fn describe(&self, id: TypeId) -> String {
        match self.node(id) {
            TypeNode::Labeled { name, .. } => name.clone(),
            TypeNode::Class(methods) => {
                let names: Vec<String> = methods.keys().map(ToString::to_string).collect();
                format!("{{{}}}", names.join(", "))
            }
            TypeNode::Variable { .. } => "unknown".into(),
            TypeNode::Bottom => "nothing".into(),
        }
    }

    /// Establishes `left <: right`, reporting through `failure` when the
    /// two cannot be reconciled.
    pub fn constrain<R: Reporter>(
        &mut self,
        left: TypeId,
        right: TypeId,
        failure: &ConstraintFailure,
        reporter: &mut R,
    ) {
        if left == right || !self.established.insert((left, right)) {
            return;
        }
        match (self.kind(left), self.kind(right)) {
            (Kind::Bottom, _) => {}
            (Kind::Labeled, Kind::Labeled) => {
                let (left_name, right_name) = (self.describe(left), self.describe(right));
                if left_name != right_name {
                    failure.send(
                        format!("Expected '{right_name}' but found '{left_name}'."),
                        reporter,
                    );
                }
            }
            (Kind::Class, Kind::Class) => {
                self.constrain_classes(left, left, right, failure, reporter);
            }
            (Kind::Variable, _) => {
                let lower = self.record_upper(left, right);
                for bound in lower {
                    self.constrain(bound, right, failure, reporter);
                }
            }
            (_, Kind::Variable) => {
                let upper = self.record_lower(right, left);
                for bound in upper {
                    self.constrain(left, bound, failure, reporter);
                }
            }
            (Kind::Labeled, _) => {
                let inner = match self.node(left) {
                    TypeNode::Labeled { inner, .. } => *inner,
                    _ => return,
                };
                if self.kind(inner) == Kind::Class && self.kind(right) == Kind::Class {
                    self.constrain_classes(left, inner, right, failure, reporter);
                } else {
                    self.constrain(inner, right, failure, reporter);
                }
            }
            _ => failure.send(
                format!(
                    "Expected '{}' but found '{}'.",
                    self.describe(right),
                    self.describe(left)
                ),
                reporter,
            ),
        }
    }

    /// Every method of `right` must exist on `left` with contravariant
    /// arguments and a covariant result. `shown` names `left` in messages.
    fn constrain_classes<R: Reporter>(
        &mut self,
        shown: TypeId,
        left: TypeId,
        right: TypeId,
        failure: &ConstraintFailure,
        reporter: &mut R,
    ) {
        let wanted = match self.node(right) {
            TypeNode::Class(methods) => methods.clone(),
            _ => return,
        };
        for (method, expected) in wanted {
            let offered = match self.node(left) {
                TypeNode::Class(methods) => methods.get(&method).cloned(),
                _ => None,
            };
            let Some(offered) = offered else {
                failure.send(
                    format!(
                        "'{}' does not implement '{method}'.",
                        self.describe(shown)
                    ),
                    reporter,
                );
                continue;
            };
            if let (Some(expected_params), Some(offered_params)) =
                (&expected.params, &offered.params)
            {
                for (expected_param, offered_param) in expected_params.iter().zip(offered_params) {
                    self.constrain(*expected_param, *offered_param, failure, reporter);
                }
            }
            self.constrain(offered.result, expected.result, failure, reporter);
        }
    }

    fn record_upper(&mut self, variable: TypeId, bound: TypeId) -> Vec<TypeId> {
        match &mut self.nodes[variable.index()] {
            TypeNode::Variable { upper, lower } => {
                if !upper.contains(&bound) {
                    upper.push(bound);
                }
                lower.clone()
            }
            _ => Vec::new(),
        }
    }

    fn record_lower(&mut self, variable: TypeId, bound: TypeId) -> Vec<TypeId> {
        match &mut self.nodes[variable.index()] {
            TypeNode::Variable { upper, lower } => {
                if !lower.contains(&bound) {
                    lower.push(bound);
                }
                upper.clone()
            }
            _ => Vec::new(),
        }
    }
}
