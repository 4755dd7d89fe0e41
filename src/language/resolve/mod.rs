//! Name resolution: every variable, field and receiver reference becomes an
//! [`Identity`], and class statements become [`ResolvedClass`] values.

use crate::diagnostics::{Phase, Reporter};
use crate::language::{ast::*, resolved::*, token::Token};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::rc::Rc;

mod scopes;
#[cfg(test)]
mod tests;

use scopes::{FieldError, FieldScope, FieldSide, LexicalScope};

/// Name given to classes synthesized from block arguments.
pub const BLOCK_CLASS_NAME: &str = "Fn";

pub struct Resolver<'r, R: Reporter> {
    reporter: &'r mut R,
    next_identity: u32,
    scopes: Vec<LexicalScope>,
    field_scopes: Vec<FieldScope>,
    /// Classes whose bodies are being resolved. References from inside a
    /// class's own body do not count as uses of it.
    enclosing_classes: Vec<Identity>,
    globals: BTreeMap<Identity, String>,
}

/// Resolves `root` against the host's global names. Diagnostics go to
/// `reporter`; the returned script is always complete.
#[tracing::instrument(skip_all)]
pub fn resolve<'a, R: Reporter>(
    globals: impl IntoIterator<Item = &'a str>,
    root: &Block,
    reporter: &mut R,
) -> ResolvedScript {
    let mut resolver = Resolver::new(reporter);
    resolver.resolve_script(globals, root)
}

impl<'r, R: Reporter> Resolver<'r, R> {
    pub fn new(reporter: &'r mut R) -> Self {
        Self {
            reporter,
            next_identity: 0,
            scopes: Vec::new(),
            field_scopes: Vec::new(),
            enclosing_classes: Vec::new(),
            globals: BTreeMap::new(),
        }
    }

    pub fn resolve_script<'a>(
        &mut self,
        globals: impl IntoIterator<Item = &'a str>,
        root: &Block,
    ) -> ResolvedScript {
        self.push_scope();
        for name in globals {
            self.predeclare_global(name);
        }
        let root = self.resolve_block(&root.statements);
        self.scopes.pop();
        ResolvedScript {
            root,
            globals: std::mem::take(&mut self.globals),
        }
    }

    fn resolve_block(&mut self, statements: &[Stmt]) -> ResolvedBlock {
        self.push_scope();
        let block = self.resolve_statements(statements);
        let scope = self.pop_scope();
        ResolvedBlock {
            statements: block,
            names: scope.names,
            classes: scope.classes,
        }
    }

    /// Resolves into the current scope. Class names are declared up front so
    /// classes can refer to ones declared later in the same block.
    fn resolve_statements(&mut self, statements: &[Stmt]) -> Vec<ResolvedStmt> {
        let mut class_ids = FxHashMap::default();
        for statement in statements {
            if let Stmt::Class(decl) = statement {
                let identity = self.declare(&decl.name, true, true);
                class_ids.insert(decl.name.lexeme.clone(), identity);
            }
        }
        let mut resolved = Vec::with_capacity(statements.len());
        for statement in statements {
            if let Stmt::Class(decl) = statement {
                let Some(identity) = class_ids.get(&decl.name.lexeme).copied() else {
                    continue;
                };
                self.enclosing_classes.push(identity);
                let class = self.resolve_class(decl);
                self.enclosing_classes.pop();
                if let Some(scope) = self.scopes.last_mut() {
                    scope.classes.insert(identity, Rc::new(class));
                }
                continue;
            }
            resolved.push(self.resolve_statement(statement));
        }
        resolved
    }

    fn resolve_statement(&mut self, statement: &Stmt) -> ResolvedStmt {
        match statement {
            Stmt::Block(block) => ResolvedStmt::Block(self.resolve_block(&block.statements)),
            Stmt::If(stmt) => ResolvedStmt::If(ResolvedIf {
                condition: self.resolve_expression(&stmt.condition),
                then_branch: Box::new(self.resolve_nested(&stmt.then_branch)),
                else_branch: stmt
                    .else_branch
                    .as_ref()
                    .map(|branch| Box::new(self.resolve_nested(branch))),
                line: stmt.line,
            }),
            Stmt::While(stmt) => ResolvedStmt::While(ResolvedWhile {
                condition: self.resolve_expression(&stmt.condition),
                body: Box::new(self.resolve_nested(&stmt.body)),
                line: stmt.line,
            }),
            Stmt::Var(stmt) => {
                let identity = self.declare(&stmt.name, false, false);
                let initializer = stmt
                    .initializer
                    .as_ref()
                    .map(|expr| self.resolve_expression(expr));
                self.mark_initialized(&stmt.name.lexeme);
                ResolvedStmt::Var {
                    identity,
                    initializer,
                    line: stmt.name.line,
                }
            }
            // Classes are attached to their block by `resolve_statements`.
            Stmt::Class(_) => ResolvedStmt::Block(ResolvedBlock::default()),
            Stmt::Return(stmt) => ResolvedStmt::Return {
                value: stmt.value.as_ref().map(|expr| self.resolve_expression(expr)),
                line: stmt.keyword.line,
            },
            Stmt::Expression(expr) => ResolvedStmt::Expression(self.resolve_expression(expr)),
        }
    }

    /// Branch bodies that declare things get their own scope.
    fn resolve_nested(&mut self, statement: &Stmt) -> ResolvedStmt {
        match statement {
            Stmt::Var(_) | Stmt::Class(_) => {
                ResolvedStmt::Block(self.resolve_block(std::slice::from_ref(statement)))
            }
            other => self.resolve_statement(other),
        }
    }

    fn resolve_class(&mut self, decl: &ClassDecl) -> ResolvedClass {
        let this_id = self.fresh_identity();
        let static_this_id = self.fresh_identity();
        self.field_scopes
            .push(FieldScope::new(FieldSide::Static, static_this_id));
        let mut instance_scope = Some(FieldScope::new(FieldSide::Instance, this_id));

        let mut class = ResolvedClass {
            name: decl.name.lexeme.clone(),
            line: decl.name.line,
            constructors: BTreeMap::new(),
            static_methods: BTreeMap::new(),
            methods: BTreeMap::new(),
            static_fields: BTreeMap::new(),
            instance_fields: BTreeMap::new(),
            this_id,
            static_this_id,
        };

        for method in &decl.methods {
            let resolved = if method.kind == MethodKind::Static {
                self.resolve_method(method)
            } else {
                if let Some(scope) = instance_scope.take() {
                    self.field_scopes.push(scope);
                }
                let resolved = self.resolve_method(method);
                instance_scope = self.field_scopes.pop();
                resolved
            };
            let id = resolved.id();
            // Constructors and static methods share the metaclass's dispatch slots.
            let clashes = match method.kind {
                MethodKind::Constructor => class.static_methods.contains_key(&id),
                MethodKind::Static => class.constructors.contains_key(&id),
                MethodKind::Instance => false,
            };
            let table = match method.kind {
                MethodKind::Constructor => &mut class.constructors,
                MethodKind::Static => &mut class.static_methods,
                MethodKind::Instance => &mut class.methods,
            };
            if clashes || table.contains_key(&id) {
                self.reporter.error_at_token(
                    Phase::Resolve,
                    &method.name,
                    format!(
                        "Method '{id}' is already declared in class '{}'.",
                        decl.name.lexeme
                    ),
                );
            }
            table.insert(id, resolved);
        }

        if let Some(scope) = instance_scope {
            class.instance_fields = scope.into_identities();
        }
        if let Some(scope) = self.field_scopes.pop() {
            class.static_fields = scope.into_identities();
        }
        tracing::debug!(class = %class.name, %this_id, %static_this_id, "resolved class");
        class
    }

    fn resolve_method(&mut self, method: &MethodDecl) -> ResolvedMethod {
        self.resolve_callable(
            &method.name.lexeme,
            method.params.as_deref(),
            &method.body,
            method.name.line,
        )
    }

    fn resolve_callable(
        &mut self,
        name: &str,
        params: Option<&[Token]>,
        body: &[Stmt],
        line: usize,
    ) -> ResolvedMethod {
        self.push_scope();
        let params = params.map(|params| {
            params
                .iter()
                .map(|param| self.declare_parameter(param))
                .collect()
        });
        let body = self.resolve_block(body);
        let scope = self.pop_scope();
        ResolvedMethod {
            name: name.to_string(),
            params,
            body,
            names: scope.names,
            line,
        }
    }

    /// `{ |params| body }` becomes an anonymous class with a `new()`
    /// constructor and a `call` method. It shares the enclosing field scopes,
    /// so fields and `this` inside the block mean what they mean outside it.
    fn resolve_block_argument(&mut self, block: &BlockArgument) -> ResolvedExpr {
        let this_id = self.fresh_identity();
        let static_this_id = self.fresh_identity();
        let call = self.resolve_callable("call", Some(&block.params), &block.body, block.line);
        let constructor = ResolvedMethod {
            name: "new".into(),
            params: Some(Vec::new()),
            body: ResolvedBlock::default(),
            names: FxHashMap::default(),
            line: block.line,
        };
        let class = ResolvedClass {
            name: BLOCK_CLASS_NAME.into(),
            line: block.line,
            constructors: BTreeMap::from([(constructor.id(), constructor)]),
            static_methods: BTreeMap::new(),
            methods: BTreeMap::from([(call.id(), call)]),
            static_fields: BTreeMap::new(),
            instance_fields: BTreeMap::new(),
            this_id,
            static_this_id,
        };
        ResolvedExpr::Call {
            receiver: Box::new(ResolvedExpr::Class(Rc::new(class))),
            name: "new".into(),
            arguments: Some(Vec::new()),
            line: block.line,
        }
    }

    fn resolve_expression(&mut self, expr: &Expr) -> ResolvedExpr {
        match expr {
            Expr::Assign(assign) => {
                let target = self.resolve_assignment_target(&assign.target);
                ResolvedExpr::Assign {
                    target,
                    value: Box::new(self.resolve_expression(&assign.value)),
                    line: assign.line,
                }
            }
            Expr::Call(call) => {
                let receiver = self.resolve_expression(&call.receiver);
                let mut arguments = call.arguments.as_ref().map(|arguments| {
                    arguments
                        .iter()
                        .map(|argument| self.resolve_expression(argument))
                        .collect::<Vec<_>>()
                });
                if let Some(block) = &call.block {
                    let closure = self.resolve_block_argument(block);
                    arguments.get_or_insert_with(Vec::new).push(closure);
                }
                ResolvedExpr::Call {
                    receiver: Box::new(receiver),
                    name: call.name.lexeme.clone(),
                    arguments,
                    line: call.name.line,
                }
            }
            Expr::Literal { value, line } => ResolvedExpr::Literal {
                value: value.clone(),
                line: *line,
            },
            Expr::Variable(name) => ResolvedExpr::Variable {
                identity: self.resolve_variable(name),
                line: name.line,
            },
            Expr::Field(name) => ResolvedExpr::Variable {
                identity: self.resolve_instance_field(name),
                line: name.line,
            },
            Expr::StaticField(name) => ResolvedExpr::Variable {
                identity: self.resolve_static_field(name),
                line: name.line,
            },
            Expr::This { line } => {
                let identity = match self.receiver() {
                    Some(identity) => identity,
                    None => {
                        self.reporter.error_at_line(
                            Phase::Resolve,
                            *line,
                            "Cannot use 'this' outside of a class.",
                        );
                        self.synthesize_global("this", *line)
                    }
                };
                ResolvedExpr::Variable {
                    identity,
                    line: *line,
                }
            }
            Expr::Logical(logical) => ResolvedExpr::Logical {
                left: Box::new(self.resolve_expression(&logical.left)),
                operator: logical.operator,
                right: Box::new(self.resolve_expression(&logical.right)),
                line: logical.line,
            },
        }
    }

    fn resolve_variable(&mut self, name: &Token) -> Identity {
        self.resolve_binding(name).0
    }

    /// Returns the identity and whether it names a class.
    fn resolve_binding(&mut self, name: &Token) -> (Identity, bool) {
        match self.lookup(&name.lexeme) {
            Some(binding) => {
                if !binding.initialized {
                    self.reporter.error_at_token(
                        Phase::Resolve,
                        name,
                        format!(
                            "Variable '{}' is used in its own initializer.",
                            name.lexeme
                        ),
                    );
                }
                (binding.identity, binding.is_class)
            }
            None => {
                self.reporter.error_at_token(
                    Phase::Resolve,
                    name,
                    format!("Undeclared variable '{}'.", name.lexeme),
                );
                (self.synthesize_global(&name.lexeme, name.line), false)
            }
        }
    }

    fn resolve_instance_field(&mut self, name: &Token) -> Identity {
        match self.instance_field(name) {
            Ok(identity) => identity,
            Err(FieldError::OutsideClass) => {
                self.reporter.error_at_token(
                    Phase::Resolve,
                    name,
                    "Cannot use a field outside of a class.",
                );
                self.synthesize_global(&name.lexeme, name.line)
            }
            Err(FieldError::StaticContext) => {
                self.reporter.error_at_token(
                    Phase::Resolve,
                    name,
                    "Cannot use an instance field in a static method.",
                );
                self.synthesize_global(&name.lexeme, name.line)
            }
        }
    }

    fn resolve_static_field(&mut self, name: &Token) -> Identity {
        match self.static_field(name) {
            Some(identity) => identity,
            None => {
                self.reporter.error_at_token(
                    Phase::Resolve,
                    name,
                    "Cannot use a field outside of a class.",
                );
                self.synthesize_global(&name.lexeme, name.line)
            }
        }
    }

    fn resolve_assignment_target(&mut self, target: &Expr) -> Identity {
        match target {
            Expr::Variable(name) => {
                let (identity, is_class) = self.resolve_binding(name);
                if is_class {
                    self.reporter.error_at_token(
                        Phase::Resolve,
                        name,
                        format!("Cannot assign to class '{}'.", name.lexeme),
                    );
                }
                identity
            }
            Expr::Field(name) => self.resolve_instance_field(name),
            Expr::StaticField(name) => self.resolve_static_field(name),
            other => {
                let line = other.line();
                self.reporter
                    .error_at_line(Phase::Resolve, line, "Invalid assignment target.");
                self.resolve_expression(other);
                self.synthesize_global("<invalid>", line)
            }
        }
    }
}
