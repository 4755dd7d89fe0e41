use crate::host::HostEnvironment;
use crate::language::{ast::LogicalOp, resolved::*};
use crate::runtime::{
    builtins::BuiltinClasses,
    environment::Environment,
    error::{RuntimeError, RuntimeErrorKind, RuntimeResult},
    value::{ClassObject, Instance, Value},
};
use rustc_hash::FxHashMap;
use std::rc::Rc;

pub struct Interpreter {
    host: FxHashMap<String, Value>,
    builtins: BuiltinClasses,
}

/// How a statement finished. `Return` unwinds to the nearest method body.
enum Flow {
    Normal,
    Return(Value, usize),
}

impl Interpreter {
    pub fn new(host: &HostEnvironment) -> Self {
        Self {
            host: host
                .entries()
                .iter()
                .map(|entry| (entry.name.clone(), entry.value.clone()))
                .collect(),
            builtins: BuiltinClasses::new(),
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn interpret(&mut self, script: &ResolvedScript) -> RuntimeResult<()> {
        let globals = Environment::new();
        for (identity, name) in &script.globals {
            let value = self.host.get(name).cloned().unwrap_or(Value::Null);
            globals.declare(*identity, value);
        }
        match self.execute_block(&script.root, &globals)? {
            Flow::Normal => Ok(()),
            Flow::Return(_, line) => Err(RuntimeError::new(
                line,
                RuntimeErrorKind::ReturnOutsideMethod,
            )),
        }
    }

    /// Dispatches `name` on `receiver` by exact (name, arity). `None`
    /// arguments is getter access.
    pub fn call(
        &mut self,
        receiver: &Value,
        name: &str,
        arguments: Option<Vec<Value>>,
        line: usize,
    ) -> RuntimeResult<Value> {
        let method = MethodId::new(name, arguments.as_ref().map(Vec::len));
        match receiver {
            Value::Class(class) => {
                if let Some(constructor) = class.decl.constructors.get(&method) {
                    return self.instantiate(class, constructor, arguments, line);
                }
                if let Some(body) = class.decl.static_methods.get(&method) {
                    return self.invoke(body, &class.statics, arguments);
                }
            }
            Value::Instance(instance) => {
                if let Some(body) = instance.class.decl.methods.get(&method) {
                    return self.invoke(body, &instance.env, arguments);
                }
            }
            Value::Host(host) => {
                if let Some(native) = host.lookup(&method) {
                    let arguments = arguments.unwrap_or_default();
                    return native(&arguments).map_err(|kind| RuntimeError::new(line, kind));
                }
            }
            value => {
                let native = self
                    .builtins
                    .for_value(value)
                    .and_then(|class| class.lookup(&method));
                if let Some(native) = native {
                    let arguments = arguments.unwrap_or_default();
                    return native(value, &arguments).map_err(|kind| RuntimeError::new(line, kind));
                }
            }
        }
        tracing::debug!(receiver = %receiver.class_name(), %method, line, "dispatch miss");
        Err(RuntimeError::new(
            line,
            RuntimeErrorKind::MethodNotImplemented {
                class: receiver.class_name(),
                method: method.to_string(),
            },
        ))
    }

    fn create_class(&mut self, decl: &Rc<ResolvedClass>, env: &Environment) -> Rc<ClassObject> {
        let statics = env.child();
        for field in decl.static_fields.keys() {
            statics.declare(*field, Value::Null);
        }
        let class = Rc::new(ClassObject {
            name: decl.name.clone(),
            decl: decl.clone(),
            statics: statics.clone(),
        });
        statics.declare(decl.static_this_id, Value::Class(class.clone()));
        tracing::debug!(class = %decl.name, "created class");
        class
    }

    /// Instance environments hang off the class's static environment, so
    /// instance methods see static fields and everything the class closed over.
    fn instantiate(
        &mut self,
        class: &Rc<ClassObject>,
        constructor: &ResolvedMethod,
        arguments: Option<Vec<Value>>,
        line: usize,
    ) -> RuntimeResult<Value> {
        let env = class.statics.child();
        for field in class.decl.instance_fields.keys() {
            env.declare(*field, Value::Null);
        }
        let instance = Rc::new(Instance {
            class: class.clone(),
            env: env.clone(),
        });
        env.declare(class.decl.this_id, Value::Instance(instance.clone()));
        tracing::trace!(class = %class.name, line, "instantiating");
        self.invoke(constructor, &env, arguments)?;
        Ok(Value::Instance(instance))
    }

    fn invoke(
        &mut self,
        method: &ResolvedMethod,
        env: &Environment,
        arguments: Option<Vec<Value>>,
    ) -> RuntimeResult<Value> {
        let frame = env.child();
        if let (Some(params), Some(arguments)) = (&method.params, arguments) {
            for (param, argument) in params.iter().zip(arguments) {
                frame.declare(*param, argument);
            }
        }
        match self.execute_block(&method.body, &frame)? {
            Flow::Normal => Ok(Value::Null),
            Flow::Return(value, _) => Ok(value),
        }
    }

    fn execute_block(&mut self, block: &ResolvedBlock, env: &Environment) -> RuntimeResult<Flow> {
        let env = env.child();
        for (identity, decl) in &block.classes {
            let class = self.create_class(decl, &env);
            env.declare(*identity, Value::Class(class));
        }
        for statement in &block.statements {
            match self.execute(statement, &env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, statement: &ResolvedStmt, env: &Environment) -> RuntimeResult<Flow> {
        match statement {
            ResolvedStmt::Block(block) => self.execute_block(block, env),
            ResolvedStmt::If(stmt) => {
                if self.condition(&stmt.condition, env)? {
                    self.execute(&stmt.then_branch, env)
                } else if let Some(else_branch) = &stmt.else_branch {
                    self.execute(else_branch, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            ResolvedStmt::While(stmt) => {
                while self.condition(&stmt.condition, env)? {
                    match self.execute(&stmt.body, env)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            ResolvedStmt::Var {
                identity,
                initializer,
                ..
            } => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer, env)?,
                    None => Value::Null,
                };
                env.declare(*identity, value);
                Ok(Flow::Normal)
            }
            ResolvedStmt::Return { value, line } => {
                let value = match value {
                    Some(value) => self.evaluate(value, env)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value, *line))
            }
            ResolvedStmt::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn condition(&mut self, condition: &ResolvedExpr, env: &Environment) -> RuntimeResult<bool> {
        match self.evaluate(condition, env)? {
            Value::Bool(value) => Ok(value),
            Value::Null => Err(RuntimeError::new(
                condition.line(),
                RuntimeErrorKind::NullCondition,
            )),
            _ => Err(RuntimeError::new(
                condition.line(),
                RuntimeErrorKind::NonBooleanCondition,
            )),
        }
    }

    fn evaluate(&mut self, expr: &ResolvedExpr, env: &Environment) -> RuntimeResult<Value> {
        match expr {
            ResolvedExpr::Assign {
                target,
                value,
                line,
            } => {
                let value = self.evaluate(value, env)?;
                env.assign(*target, value.clone())
                    .map_err(|kind| RuntimeError::new(*line, kind))?;
                Ok(value)
            }
            ResolvedExpr::Call {
                receiver,
                name,
                arguments,
                line,
            } => {
                let receiver = self.evaluate(receiver, env)?;
                let arguments = match arguments {
                    Some(arguments) => Some(
                        arguments
                            .iter()
                            .map(|argument| self.evaluate(argument, env))
                            .collect::<RuntimeResult<Vec<_>>>()?,
                    ),
                    None => None,
                };
                self.call(&receiver, name, arguments, *line)
            }
            ResolvedExpr::Literal { value, .. } => Ok(Value::from(value)),
            ResolvedExpr::Variable { identity, line } => env
                .get(*identity)
                .map_err(|kind| RuntimeError::new(*line, kind)),
            ResolvedExpr::Logical {
                left,
                operator,
                right,
                line,
            } => {
                let Value::Bool(left) = self.evaluate(left, env)? else {
                    return Err(RuntimeError::new(*line, RuntimeErrorKind::LogicalOperand));
                };
                let short_circuit = match operator {
                    LogicalOp::And => !left,
                    LogicalOp::Or => left,
                };
                if short_circuit {
                    return Ok(Value::Bool(left));
                }
                match self.evaluate(right, env)? {
                    Value::Bool(right) => Ok(Value::Bool(right)),
                    _ => Err(RuntimeError::new(*line, RuntimeErrorKind::LogicalOperand)),
                }
            }
            ResolvedExpr::Class(decl) => Ok(Value::Class(self.create_class(decl, env))),
        }
    }
}
