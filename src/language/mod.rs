pub mod analysis;
pub mod ast;
pub mod resolve;
pub mod resolved;
pub mod token;
pub mod typecheck;
