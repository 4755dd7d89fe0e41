//! Globals supplied by the embedding host: a runtime value and a structural
//! type description per name.

use crate::language::typecheck::{MethodSpec, TypeSpec};
use crate::runtime::{
    error::RuntimeErrorKind,
    value::{HostObject, Value},
};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Where built-in output goes.
pub type SharedOutput = Rc<RefCell<dyn Write>>;

#[derive(Clone, Debug)]
pub struct HostEntry {
    pub name: String,
    pub value: Value,
    pub ty: TypeSpec,
}

#[derive(Clone, Debug, Default)]
pub struct HostEnvironment {
    entries: Vec<HostEntry>,
}

impl HostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry every script gets: `System.print(_)` and `System.print`.
    pub fn standard(output: SharedOutput) -> Self {
        let line_output = output.clone();
        let system = HostObject::new("System")
            .method("print", 1, move |args| {
                let value = args.first().cloned().unwrap_or(Value::Null);
                write_line(&line_output, &value.to_string())?;
                Ok(value)
            })
            .getter("print", move || {
                write_line(&output, "")?;
                Ok(Value::Null)
            });
        let ty = TypeSpec::Class(vec![
            MethodSpec::method("print", vec![TypeSpec::Any], TypeSpec::Any),
            MethodSpec::getter("print", TypeSpec::Any),
        ]);
        let mut host = Self::new();
        host.define("System", Value::Host(Rc::new(system)), ty);
        host
    }

    /// Adds a global, replacing any earlier one of the same name.
    pub fn define(&mut self, name: impl Into<String>, value: Value, ty: TypeSpec) -> &mut Self {
        let entry = HostEntry {
            name: name.into(),
            value,
            ty,
        };
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn types(&self) -> impl Iterator<Item = (&str, &TypeSpec)> {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), &entry.ty))
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.clone())
    }
}

fn write_line(output: &SharedOutput, text: &str) -> Result<(), RuntimeErrorKind> {
    let mut sink = output.borrow_mut();
    writeln!(sink, "{text}")
        .and_then(|_| sink.flush())
        .map_err(|err| RuntimeErrorKind::Host {
            message: format!("Failed to write output: {err}"),
        })
}
