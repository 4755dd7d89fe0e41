pub mod builtins;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod value;


pub use error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
pub use interpreter::Interpreter;
pub use value::Value;
