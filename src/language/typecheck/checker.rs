use super::*;

pub struct Checker<'r, R: Reporter> {
    arena: TypeArena,
    reporter: &'r mut R,
    builtins: BuiltinTypes,
    bindings: FxHashMap<Identity, TypeId>,
    bottom: TypeId,
}

/// The two receiver variables of a class: its metaclass and its instances.
#[derive(Clone, Copy)]
struct ClassTypes {
    statics: TypeId,
    instances: TypeId,
}

impl<'r, R: Reporter> Checker<'r, R> {
    pub fn new(reporter: &'r mut R) -> Self {
        let mut arena = TypeArena::new();
        let builtins = BuiltinTypes::install(&mut arena);
        let bottom = arena.bottom();
        Self {
            arena,
            reporter,
            builtins,
            bindings: FxHashMap::default(),
            bottom,
        }
    }

    pub fn arena(&self) -> &TypeArena {
        &self.arena
    }

    pub fn check_script<'a>(
        &mut self,
        script: &ResolvedScript,
        host: impl IntoIterator<Item = (&'a str, &'a TypeSpec)>,
    ) {
        let host: FxHashMap<&str, &TypeSpec> = host.into_iter().collect();
        for (identity, name) in &script.globals {
            let ty = match host.get(name.as_str()) {
                Some(spec) => self.builtins.intern(&mut self.arena, spec),
                None => self.arena.fresh_variable(),
            };
            self.bindings.insert(*identity, ty);
        }
        self.check_block(&script.root);
    }

    fn constrain(&mut self, left: TypeId, right: TypeId, line: usize) {
        let failure = ConstraintFailure::new(line);
        self.arena
            .constrain(left, right, &failure, &mut *self.reporter);
    }

    fn binding_type(&mut self, identity: Identity) -> TypeId {
        if let Some(ty) = self.bindings.get(&identity) {
            return *ty;
        }
        let ty = self.arena.fresh_variable();
        self.bindings.insert(identity, ty);
        ty
    }

    fn check_block(&mut self, block: &ResolvedBlock) -> TypeId {
        let mut declared = Vec::with_capacity(block.classes.len());
        for (identity, class) in &block.classes {
            let types = self.declare_class(class);
            self.bindings.insert(*identity, types.statics);
            declared.push((class, types));
        }
        for (class, types) in declared {
            self.check_class(class, types);
        }
        let join = self.arena.fresh_variable();
        for statement in &block.statements {
            let returned = self.check_statement(statement);
            self.constrain(returned, join, statement_line(statement));
        }
        join
    }

    fn declare_class(&mut self, class: &ResolvedClass) -> ClassTypes {
        let types = ClassTypes {
            statics: self.binding_type(class.static_this_id),
            instances: self.binding_type(class.this_id),
        };
        tracing::trace!(
            class = %class.name,
            statics = %types.statics,
            instances = %types.instances,
            "declared class types"
        );
        types
    }

    /// Builds the structural shapes of a class from its declarations and
    /// lets them flow into the receiver variables, so uses of `this` are
    /// checked against the class's eventual method set.
    fn check_class(&mut self, class: &ResolvedClass, types: ClassTypes) {
        let mut instance_shape = BTreeMap::new();
        for (id, method) in &class.methods {
            instance_shape.insert(id.clone(), self.check_method(method));
        }
        let mut static_shape = BTreeMap::new();
        for (id, method) in &class.static_methods {
            static_shape.insert(id.clone(), self.check_method(method));
        }
        // Constructors take the slot on a clash, as dispatch does.
        for (id, method) in &class.constructors {
            let signature = self.check_method(method);
            self.constrain(types.instances, signature.result, method.line);
            self.constrain(signature.result, types.instances, method.line);
            static_shape.insert(id.clone(), signature);
        }
        let instance_shape = self.arena.class(instance_shape);
        let static_shape = self.arena.class(static_shape);
        tracing::debug!(
            class = %class.name,
            instance = %self.arena.describe(instance_shape),
            statics = %self.arena.describe(static_shape),
            "class shapes"
        );
        self.constrain(instance_shape, types.instances, class.line);
        self.constrain(static_shape, types.statics, class.line);
    }

    fn check_method(&mut self, method: &ResolvedMethod) -> Signature {
        let params = method.params.as_ref().map(|params| {
            params
                .iter()
                .map(|param| self.binding_type(*param))
                .collect()
        });
        let result = self.arena.fresh_variable();
        let body = self.check_block(&method.body);
        self.constrain(body, result, method.line);
        Signature { params, result }
    }

    /// The type a statement yields when it returns; bottom when it cannot.
    fn check_statement(&mut self, statement: &ResolvedStmt) -> TypeId {
        match statement {
            ResolvedStmt::Block(block) => self.check_block(block),
            ResolvedStmt::If(stmt) => {
                self.check_condition(&stmt.condition);
                let then_type = self.check_statement(&stmt.then_branch);
                let else_type = match &stmt.else_branch {
                    Some(branch) => self.check_statement(branch),
                    None => self.bottom,
                };
                let join = self.arena.fresh_variable();
                self.constrain(then_type, join, stmt.line);
                self.constrain(else_type, join, stmt.line);
                join
            }
            ResolvedStmt::While(stmt) => {
                self.check_condition(&stmt.condition);
                let body_type = self.check_statement(&stmt.body);
                let join = self.arena.fresh_variable();
                self.constrain(body_type, join, stmt.line);
                self.constrain(self.bottom, join, stmt.line);
                join
            }
            ResolvedStmt::Var {
                identity,
                initializer,
                line,
            } => {
                let variable = self.binding_type(*identity);
                if let Some(initializer) = initializer {
                    let value = self.check_expression(initializer);
                    self.constrain(value, variable, *line);
                }
                self.bottom
            }
            ResolvedStmt::Return { value, .. } => match value {
                Some(value) => self.check_expression(value),
                None => self.arena.fresh_variable(),
            },
            ResolvedStmt::Expression(expr) => {
                self.check_expression(expr);
                self.bottom
            }
        }
    }

    fn check_condition(&mut self, condition: &ResolvedExpr) {
        let ty = self.check_expression(condition);
        self.constrain(ty, self.builtins.boolean, condition.line());
    }

    fn check_expression(&mut self, expr: &ResolvedExpr) -> TypeId {
        match expr {
            ResolvedExpr::Assign {
                target,
                value,
                line,
            } => {
                let value = self.check_expression(value);
                let target = self.binding_type(*target);
                self.constrain(value, target, *line);
                value
            }
            ResolvedExpr::Call {
                receiver,
                name,
                arguments,
                line,
            } => {
                let receiver = self.check_expression(receiver);
                let actuals: Option<Vec<TypeId>> = arguments.as_ref().map(|arguments| {
                    arguments
                        .iter()
                        .map(|argument| self.check_expression(argument))
                        .collect()
                });
                let params: Option<Vec<TypeId>> = actuals
                    .as_ref()
                    .map(|actuals| actuals.iter().map(|_| self.arena.fresh_variable()).collect());
                let result = self.arena.fresh_variable();
                let method = MethodId::new(name.clone(), params.as_ref().map(Vec::len));
                let wanted = self.arena.class(BTreeMap::from([(
                    method,
                    Signature {
                        params: params.clone(),
                        result,
                    },
                )]));
                self.constrain(receiver, wanted, *line);
                if let (Some(actuals), Some(params)) = (actuals, params) {
                    for (actual, param) in actuals.into_iter().zip(params) {
                        self.constrain(actual, param, *line);
                    }
                }
                result
            }
            ResolvedExpr::Literal { value, .. } => match value {
                Literal::Number(_) => self.builtins.number,
                Literal::String(_) => self.builtins.string,
                Literal::Bool(_) => self.builtins.boolean,
                Literal::Nil => self.arena.fresh_variable(),
            },
            ResolvedExpr::Variable { identity, .. } => self.binding_type(*identity),
            ResolvedExpr::Logical {
                left, right, line, ..
            } => {
                let left = self.check_expression(left);
                self.constrain(left, self.builtins.boolean, *line);
                let right = self.check_expression(right);
                self.constrain(right, self.builtins.boolean, *line);
                self.arena.fresh_variable()
            }
            ResolvedExpr::Class(class) => {
                let types = self.declare_class(class);
                self.check_class(class, types);
                types.statics
            }
        }
    }
}

fn statement_line(statement: &ResolvedStmt) -> usize {
    match statement {
        ResolvedStmt::Block(_) => 0,
        ResolvedStmt::If(stmt) => stmt.line,
        ResolvedStmt::While(stmt) => stmt.line,
        ResolvedStmt::Var { line, .. } | ResolvedStmt::Return { line, .. } => *line,
        ResolvedStmt::Expression(expr) => expr.line(),
    }
}
