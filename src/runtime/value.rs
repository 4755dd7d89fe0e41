use crate::language::{ast::Literal, resolved::MethodId, resolved::ResolvedClass};
use crate::runtime::{environment::Environment, error::NativeResult};
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(i64),
    String(Rc<str>),
    /// A class metaobject: constructors and static methods.
    Class(Rc<ClassObject>),
    Instance(Rc<Instance>),
    Host(Rc<HostObject>),
}

impl Value {
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Value::String(text.into())
    }

    /// Name used when dispatch fails.
    pub fn class_name(&self) -> String {
        match self {
            Value::Null => "Null".into(),
            Value::Bool(_) => "Boolean".into(),
            Value::Number(_) => "Number".into(),
            Value::String(_) => "String".into(),
            Value::Class(class) => format!("{} metaclass", class.name),
            Value::Instance(instance) => instance.class.name.clone(),
            Value::Host(host) => host.name.clone(),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Number(value) => Value::Number(*value),
            Literal::String(text) => Value::string(text.as_str()),
            Literal::Bool(value) => Value::Bool(*value),
            Literal::Nil => Value::Null,
        }
    }
}

/// Values compare by content; objects compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(value) => write!(f, "{value}"),
            Value::String(text) => write!(f, "{text}"),
            Value::Class(class) => write!(f, "{}", class.name),
            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),
            Value::Host(host) => write!(f, "{}", host.name),
        }
    }
}

pub struct ClassObject {
    pub name: String,
    pub decl: Rc<ResolvedClass>,
    /// Static fields and the static receiver.
    pub statics: Environment,
}

impl fmt::Debug for ClassObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassObject")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub struct Instance {
    pub class: Rc<ClassObject>,
    /// Instance fields and the instance receiver.
    pub env: Environment,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .finish_non_exhaustive()
    }
}

pub type HostMethod = Rc<dyn Fn(&[Value]) -> NativeResult>;

/// An object supplied by the embedding host, dispatched through its own table.
pub struct HostObject {
    name: String,
    methods: FxHashMap<MethodId, HostMethod>,
}

impl HostObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: FxHashMap::default(),
        }
    }

    pub fn method(
        mut self,
        name: &str,
        arity: usize,
        body: impl Fn(&[Value]) -> NativeResult + 'static,
    ) -> Self {
        self.methods
            .insert(MethodId::method(name, arity), Rc::new(body));
        self
    }

    pub fn getter(mut self, name: &str, body: impl Fn() -> NativeResult + 'static) -> Self {
        self.methods
            .insert(MethodId::getter(name), Rc::new(move |_: &[Value]| body()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookup(&self, method: &MethodId) -> Option<HostMethod> {
        self.methods.get(method).cloned()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<String> = self.methods.keys().map(ToString::to_string).collect();
        methods.sort();
        f.debug_struct("HostObject")
            .field("name", &self.name)
            .field("methods", &methods)
            .finish()
    }
}
