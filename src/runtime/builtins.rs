//! Native method tables for the value classes.

use crate::language::resolved::MethodId;
use crate::runtime::{
    error::{NativeResult, RuntimeErrorKind},
    value::Value,
};
use rustc_hash::FxHashMap;

pub type NativeFn = fn(&Value, &[Value]) -> NativeResult;

pub struct BuiltinClass {
    name: &'static str,
    methods: FxHashMap<MethodId, NativeFn>,
}

impl BuiltinClass {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            methods: FxHashMap::default(),
        }
    }

    fn method(mut self, name: &str, arity: usize, body: NativeFn) -> Self {
        self.methods.insert(MethodId::method(name, arity), body);
        self
    }

    fn getter(mut self, name: &str, body: NativeFn) -> Self {
        self.methods.insert(MethodId::getter(name), body);
        self
    }

    /// `toString`, `==(_)` and `!=(_)`, which every value class offers.
    fn with_common(self) -> Self {
        self.getter("toString", to_string)
            .method("==", 1, equals)
            .method("!=", 1, not_equals)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn lookup(&self, method: &MethodId) -> Option<NativeFn> {
        self.methods.get(method).copied()
    }
}

pub struct BuiltinClasses {
    number: BuiltinClass,
    string: BuiltinClass,
    boolean: BuiltinClass,
    null: BuiltinClass,
}

impl Default for BuiltinClasses {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinClasses {
    pub fn new() -> Self {
        let number = BuiltinClass::new("Number")
            .method("+", 1, |l, r| arithmetic(l, r, "+", i64::checked_add))
            .method("-", 1, |l, r| arithmetic(l, r, "-", i64::checked_sub))
            .method("*", 1, |l, r| arithmetic(l, r, "*", i64::checked_mul))
            .method("/", 1, |l, r| division(l, r, "/", i64::checked_div))
            .method("%", 1, |l, r| division(l, r, "%", i64::checked_rem))
            .method("<", 1, |l, r| comparison(l, r, "<", |a, b| a < b))
            .method("<=", 1, |l, r| comparison(l, r, "<=", |a, b| a <= b))
            .method(">", 1, |l, r| comparison(l, r, ">", |a, b| a > b))
            .method(">=", 1, |l, r| comparison(l, r, ">=", |a, b| a >= b))
            .getter("-", |receiver, _| {
                let value = as_number(receiver, "-")?;
                value
                    .checked_neg()
                    .map(Value::Number)
                    .ok_or(RuntimeErrorKind::Overflow)
            })
            .getter("abs", |receiver, _| {
                let value = as_number(receiver, "abs")?;
                value
                    .checked_abs()
                    .map(Value::Number)
                    .ok_or(RuntimeErrorKind::Overflow)
            })
            .with_common();

        let string = BuiltinClass::new("String")
            .method("+", 1, |receiver, args| {
                let left = as_string(receiver, "+")?;
                match args.first() {
                    Some(Value::String(right)) => Ok(Value::string(format!("{left}{right}"))),
                    _ => Err(RuntimeErrorKind::RightOperandString),
                }
            })
            .getter("count", |receiver, _| {
                let text = as_string(receiver, "count")?;
                i64::try_from(text.chars().count())
                    .map(Value::Number)
                    .map_err(|_| RuntimeErrorKind::Overflow)
            })
            .with_common();

        let boolean = BuiltinClass::new("Boolean")
            .getter("!", |receiver, _| match receiver {
                Value::Bool(value) => Ok(Value::Bool(!value)),
                _ => Err(foreign("!")),
            })
            .with_common();

        let null = BuiltinClass::new("Null").with_common();

        Self {
            number,
            string,
            boolean,
            null,
        }
    }

    /// The table for a value class; `None` for objects that carry their own.
    pub fn for_value(&self, value: &Value) -> Option<&BuiltinClass> {
        match value {
            Value::Number(_) => Some(&self.number),
            Value::String(_) => Some(&self.string),
            Value::Bool(_) => Some(&self.boolean),
            Value::Null => Some(&self.null),
            Value::Class(_) | Value::Instance(_) | Value::Host(_) => None,
        }
    }
}

fn foreign(method: &str) -> RuntimeErrorKind {
    RuntimeErrorKind::ForeignReceiver {
        method: method.to_string(),
    }
}

fn as_number(receiver: &Value, method: &str) -> Result<i64, RuntimeErrorKind> {
    match receiver {
        Value::Number(value) => Ok(*value),
        _ => Err(foreign(method)),
    }
}

fn as_string<'v>(receiver: &'v Value, method: &str) -> Result<&'v str, RuntimeErrorKind> {
    match receiver {
        Value::String(text) => Ok(text),
        _ => Err(foreign(method)),
    }
}

fn operands(
    receiver: &Value,
    args: &[Value],
    method: &str,
) -> Result<(i64, i64), RuntimeErrorKind> {
    let left = as_number(receiver, method)?;
    match args.first() {
        Some(Value::Number(right)) => Ok((left, *right)),
        _ => Err(RuntimeErrorKind::RightOperandNumber),
    }
}

fn arithmetic(
    receiver: &Value,
    args: &[Value],
    method: &str,
    op: fn(i64, i64) -> Option<i64>,
) -> NativeResult {
    let (left, right) = operands(receiver, args, method)?;
    op(left, right)
        .map(Value::Number)
        .ok_or(RuntimeErrorKind::Overflow)
}

fn division(
    receiver: &Value,
    args: &[Value],
    method: &str,
    op: fn(i64, i64) -> Option<i64>,
) -> NativeResult {
    let (left, right) = operands(receiver, args, method)?;
    if right == 0 {
        return Err(RuntimeErrorKind::DivisionByZero);
    }
    op(left, right)
        .map(Value::Number)
        .ok_or(RuntimeErrorKind::Overflow)
}

fn comparison(
    receiver: &Value,
    args: &[Value],
    method: &str,
    op: fn(i64, i64) -> bool,
) -> NativeResult {
    let (left, right) = operands(receiver, args, method)?;
    Ok(Value::Bool(op(left, right)))
}

fn to_string(receiver: &Value, _: &[Value]) -> NativeResult {
    match receiver {
        Value::String(_) => Ok(receiver.clone()),
        other => Ok(Value::string(other.to_string())),
    }
}

fn equals(receiver: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(args.first() == Some(receiver)))
}

fn not_equals(receiver: &Value, args: &[Value]) -> NativeResult {
    Ok(Value::Bool(args.first() != Some(receiver)))
}
