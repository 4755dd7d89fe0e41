#![allow(clippy::collapsible_if)]

pub mod diagnostics;
pub mod host;
pub mod language;
pub mod runtime;
pub mod session;

pub use host::HostEnvironment;
pub use session::{Outcome, Session, SessionOptions};

#[cfg(test)]
mod tests;
