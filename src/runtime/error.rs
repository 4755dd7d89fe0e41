use crate::language::resolved::Identity;
use miette::Diagnostic;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// What a native method reports; the interpreter attaches the call's line.
pub type NativeResult = Result<crate::runtime::value::Value, RuntimeErrorKind>;

#[derive(Clone, Debug, Error, Diagnostic, PartialEq, Eq)]
#[error("[line {line}] Runtime error: {kind}")]
#[diagnostic(code(ember::runtime))]
pub struct RuntimeError {
    pub line: usize,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    pub fn new(line: usize, kind: RuntimeErrorKind) -> Self {
        Self { line, kind }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn is_internal(&self) -> bool {
        self.kind.is_internal()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    #[error("'{class}' does not implement '{method}'.")]
    MethodNotImplemented { class: String, method: String },
    #[error("Right operand must be a number.")]
    RightOperandNumber,
    #[error("Right operand must be a string.")]
    RightOperandString,
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("Arithmetic overflow.")]
    Overflow,
    #[error("Condition cannot be null.")]
    NullCondition,
    #[error("Condition must have type Boolean.")]
    NonBooleanCondition,
    #[error("Operands of a logical operator must be booleans.")]
    LogicalOperand,
    #[error("{message}")]
    Host { message: String },
    #[error("Undefined variable {identity}.")]
    UndefinedVariable { identity: Identity },
    #[error("Return escaped the top level.")]
    ReturnOutsideMethod,
    #[error("Built-in method '{method}' received a foreign receiver.")]
    ForeignReceiver { method: String },
}

impl RuntimeErrorKind {
    /// Internal failures mean an earlier pass let an inconsistent tree through.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            RuntimeErrorKind::UndefinedVariable { .. }
                | RuntimeErrorKind::ReturnOutsideMethod
                | RuntimeErrorKind::ForeignReceiver { .. }
        )
    }
}
