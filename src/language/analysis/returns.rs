use super::*;

enum Body {
    TopLevel,
    Constructor,
    Method { value: bool, empty: bool },
}

pub(super) struct ReturnChecker<'r, R: Reporter> {
    reporter: &'r mut R,
}

impl<'r, R: Reporter> ReturnChecker<'r, R> {
    pub(super) fn new(reporter: &'r mut R) -> Self {
        Self { reporter }
    }

    pub(super) fn check_script(&mut self, script: &ResolvedScript) {
        self.block(&script.root, &mut Body::TopLevel);
    }

    fn class(&mut self, class: &ResolvedClass) {
        for constructor in class.constructors.values() {
            self.block(&constructor.body, &mut Body::Constructor);
        }
        for method in class.static_methods.values().chain(class.methods.values()) {
            let mut body = Body::Method {
                value: false,
                empty: false,
            };
            self.block(&method.body, &mut body);
            if let Body::Method { value: true, empty } = body {
                if empty || completes_block(&method.body) {
                    self.reporter.error_at_line(
                        Phase::Returns,
                        method.line,
                        format!(
                            "Method '{}' mixes returning a value and returning nothing.",
                            method.name
                        ),
                    );
                }
            }
        }
    }

    fn block(&mut self, block: &ResolvedBlock, body: &mut Body) {
        for class in block.classes.values() {
            self.class(class);
        }
        for statement in &block.statements {
            self.statement(statement, body);
        }
    }

    fn statement(&mut self, statement: &ResolvedStmt, body: &mut Body) {
        match statement {
            ResolvedStmt::Block(block) => self.block(block, body),
            ResolvedStmt::If(stmt) => {
                self.expression(&stmt.condition);
                self.statement(&stmt.then_branch, body);
                if let Some(else_branch) = &stmt.else_branch {
                    self.statement(else_branch, body);
                }
            }
            ResolvedStmt::While(stmt) => {
                self.expression(&stmt.condition);
                self.statement(&stmt.body, body);
            }
            ResolvedStmt::Var { initializer, .. } => {
                if let Some(initializer) = initializer {
                    self.expression(initializer);
                }
            }
            ResolvedStmt::Return { value, line } => {
                if let Some(value) = value {
                    self.expression(value);
                }
                match body {
                    Body::TopLevel => self.reporter.error_at_line(
                        Phase::Returns,
                        *line,
                        "Cannot return from top-level code.",
                    ),
                    Body::Constructor if value.is_some() => self.reporter.error_at_line(
                        Phase::Returns,
                        *line,
                        "Cannot return a value from a constructor.",
                    ),
                    Body::Constructor => {}
                    Body::Method { value: found, empty } => {
                        if value.is_some() {
                            *found = true;
                        } else {
                            *empty = true;
                        }
                    }
                }
            }
            ResolvedStmt::Expression(expr) => self.expression(expr),
        }
    }

    /// Only looks for block arguments, whose bodies are methods of their own.
    fn expression(&mut self, expr: &ResolvedExpr) {
        match expr {
            ResolvedExpr::Assign { value, .. } => self.expression(value),
            ResolvedExpr::Call {
                receiver,
                arguments,
                ..
            } => {
                self.expression(receiver);
                for argument in arguments.iter().flatten() {
                    self.expression(argument);
                }
            }
            ResolvedExpr::Logical { left, right, .. } => {
                self.expression(left);
                self.expression(right);
            }
            ResolvedExpr::Class(class) => self.class(class),
            ResolvedExpr::Literal { .. } | ResolvedExpr::Variable { .. } => {}
        }
    }
}

/// Whether control can fall off the end of `block`.
fn completes_block(block: &ResolvedBlock) -> bool {
    block.statements.iter().all(completes)
}

fn completes(statement: &ResolvedStmt) -> bool {
    match statement {
        ResolvedStmt::Return { .. } => false,
        ResolvedStmt::Block(block) => completes_block(block),
        ResolvedStmt::If(stmt) => {
            completes(&stmt.then_branch)
                || stmt.else_branch.as_deref().map_or(true, completes)
        }
        // A loop may exit once its condition fails.
        ResolvedStmt::While(_) => true,
        ResolvedStmt::Var { .. } | ResolvedStmt::Expression(_) => true,
    }
}
