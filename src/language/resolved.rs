//! Identity-annotated program consumed by the checkers and the interpreter.

use crate::language::ast::{Literal, LogicalOp};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A storage slot: local, parameter, field, or receiver. Never reused within
/// one resolved script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(pub u32);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Overload key. `arity == None` is a getter, `Some(0)` an empty-argument call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    pub name: String,
    pub arity: Option<usize>,
}

impl MethodId {
    pub fn new(name: impl Into<String>, arity: Option<usize>) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }

    pub fn getter(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn method(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, Some(arity))
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arity {
            None => write!(f, "{}", self.name),
            Some(arity) => {
                write!(f, "{}(", self.name)?;
                for index in 0..arity {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "_")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedScript {
    pub root: ResolvedBlock,
    pub globals: BTreeMap<Identity, String>,
}

impl ResolvedScript {
    /// Every identity the script declares, mapped to its source name.
    pub fn names(&self) -> FxHashMap<Identity, String> {
        let mut names: FxHashMap<Identity, String> = self
            .globals
            .iter()
            .map(|(identity, name)| (*identity, name.clone()))
            .collect();
        collect_block_names(&self.root, &mut names);
        names
    }
}

fn collect_block_names(block: &ResolvedBlock, names: &mut FxHashMap<Identity, String>) {
    names.extend(block.names.iter().map(|(id, name)| (*id, name.clone())));
    for class in block.classes.values() {
        collect_class_names(class, names);
    }
    for statement in &block.statements {
        collect_statement_names(statement, names);
    }
}

fn collect_class_names(class: &ResolvedClass, names: &mut FxHashMap<Identity, String>) {
    names.extend(class.static_fields.iter().map(|(id, name)| (*id, name.clone())));
    names.extend(class.instance_fields.iter().map(|(id, name)| (*id, name.clone())));
    names.insert(class.this_id, "this".into());
    names.insert(class.static_this_id, "this".into());
    for method in class.all_methods() {
        names.extend(method.names.iter().map(|(id, name)| (*id, name.clone())));
        collect_block_names(&method.body, names);
    }
}

fn collect_statement_names(statement: &ResolvedStmt, names: &mut FxHashMap<Identity, String>) {
    match statement {
        ResolvedStmt::Block(block) => collect_block_names(block, names),
        ResolvedStmt::If(stmt) => {
            collect_expr_names(&stmt.condition, names);
            collect_statement_names(&stmt.then_branch, names);
            if let Some(else_branch) = &stmt.else_branch {
                collect_statement_names(else_branch, names);
            }
        }
        ResolvedStmt::While(stmt) => {
            collect_expr_names(&stmt.condition, names);
            collect_statement_names(&stmt.body, names);
        }
        ResolvedStmt::Var { initializer, .. } => {
            if let Some(initializer) = initializer {
                collect_expr_names(initializer, names);
            }
        }
        ResolvedStmt::Return { value, .. } => {
            if let Some(value) = value {
                collect_expr_names(value, names);
            }
        }
        ResolvedStmt::Expression(expr) => collect_expr_names(expr, names),
    }
}

fn collect_expr_names(expr: &ResolvedExpr, names: &mut FxHashMap<Identity, String>) {
    match expr {
        ResolvedExpr::Assign { value, .. } => collect_expr_names(value, names),
        ResolvedExpr::Call {
            receiver,
            arguments,
            ..
        } => {
            collect_expr_names(receiver, names);
            for argument in arguments.iter().flatten() {
                collect_expr_names(argument, names);
            }
        }
        ResolvedExpr::Logical { left, right, .. } => {
            collect_expr_names(left, names);
            collect_expr_names(right, names);
        }
        ResolvedExpr::Class(class) => collect_class_names(class, names),
        ResolvedExpr::Literal { .. } | ResolvedExpr::Variable { .. } => {}
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedBlock {
    pub statements: Vec<ResolvedStmt>,
    /// Locally declared names, for diagnostics only.
    pub names: FxHashMap<Identity, String>,
    /// Classes declared directly in this block, in declaration order.
    pub classes: BTreeMap<Identity, Rc<ResolvedClass>>,
}

#[derive(Clone, Debug)]
pub enum ResolvedStmt {
    Block(ResolvedBlock),
    If(ResolvedIf),
    While(ResolvedWhile),
    Var {
        identity: Identity,
        initializer: Option<ResolvedExpr>,
        line: usize,
    },
    Return {
        value: Option<ResolvedExpr>,
        line: usize,
    },
    Expression(ResolvedExpr),
}

#[derive(Clone, Debug)]
pub struct ResolvedIf {
    pub condition: ResolvedExpr,
    pub then_branch: Box<ResolvedStmt>,
    pub else_branch: Option<Box<ResolvedStmt>>,
    pub line: usize,
}

#[derive(Clone, Debug)]
pub struct ResolvedWhile {
    pub condition: ResolvedExpr,
    pub body: Box<ResolvedStmt>,
    pub line: usize,
}

#[derive(Clone, Debug)]
pub enum ResolvedExpr {
    Assign {
        target: Identity,
        value: Box<ResolvedExpr>,
        line: usize,
    },
    Call {
        receiver: Box<ResolvedExpr>,
        name: String,
        arguments: Option<Vec<ResolvedExpr>>,
        line: usize,
    },
    Literal {
        value: Literal,
        line: usize,
    },
    /// Reads of locals, fields, receivers and class names alike.
    Variable {
        identity: Identity,
        line: usize,
    },
    Logical {
        left: Box<ResolvedExpr>,
        operator: LogicalOp,
        right: Box<ResolvedExpr>,
        line: usize,
    },
    /// An anonymous class value created in place (block arguments).
    Class(Rc<ResolvedClass>),
}

impl ResolvedExpr {
    pub fn line(&self) -> usize {
        match self {
            ResolvedExpr::Assign { line, .. }
            | ResolvedExpr::Call { line, .. }
            | ResolvedExpr::Literal { line, .. }
            | ResolvedExpr::Variable { line, .. }
            | ResolvedExpr::Logical { line, .. } => *line,
            ResolvedExpr::Class(class) => class.line,
        }
    }

    pub fn method_id(&self) -> Option<MethodId> {
        match self {
            ResolvedExpr::Call {
                name, arguments, ..
            } => Some(MethodId::new(name.clone(), arguments.as_ref().map(Vec::len))),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedClass {
    pub name: String,
    pub line: usize,
    pub constructors: BTreeMap<MethodId, ResolvedMethod>,
    pub static_methods: BTreeMap<MethodId, ResolvedMethod>,
    pub methods: BTreeMap<MethodId, ResolvedMethod>,
    pub static_fields: BTreeMap<Identity, String>,
    pub instance_fields: BTreeMap<Identity, String>,
    pub this_id: Identity,
    pub static_this_id: Identity,
}

impl ResolvedClass {
    pub fn all_methods(&self) -> impl Iterator<Item = &ResolvedMethod> {
        self.constructors
            .values()
            .chain(self.static_methods.values())
            .chain(self.methods.values())
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedMethod {
    pub name: String,
    /// `None` for getters.
    pub params: Option<Vec<Identity>>,
    pub body: ResolvedBlock,
    pub names: FxHashMap<Identity, String>,
    pub line: usize,
}

impl ResolvedMethod {
    pub fn id(&self) -> MethodId {
        MethodId::new(self.name.clone(), self.params.as_ref().map(Vec::len))
    }
}
