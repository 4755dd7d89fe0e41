use crate::language::resolved::Identity;
use crate::runtime::{error::RuntimeErrorKind, value::Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Frame {
    bindings: RefCell<FxHashMap<Identity, Value>>,
    parent: Option<Environment>,
}

/// One activation's bindings plus a link to the scope it was created in.
/// Cloning shares the frame.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Environment>) -> Self {
        Self {
            frame: Rc::new(Frame {
                bindings: RefCell::new(FxHashMap::default()),
                parent,
            }),
        }
    }

    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    pub fn declare(&self, identity: Identity, value: Value) {
        self.frame.bindings.borrow_mut().insert(identity, value);
    }

    pub fn assign(&self, identity: Identity, value: Value) -> Result<(), RuntimeErrorKind> {
        let mut current = Some(self);
        while let Some(env) = current {
            if let Some(slot) = env.frame.bindings.borrow_mut().get_mut(&identity) {
                *slot = value;
                return Ok(());
            }
            current = env.frame.parent.as_ref();
        }
        Err(RuntimeErrorKind::UndefinedVariable { identity })
    }

    pub fn get(&self, identity: Identity) -> Result<Value, RuntimeErrorKind> {
        let mut current = Some(self);
        while let Some(env) = current {
            if let Some(value) = env.frame.bindings.borrow().get(&identity) {
                return Ok(value.clone());
            }
            current = env.frame.parent.as_ref();
        }
        Err(RuntimeErrorKind::UndefinedVariable { identity })
    }

    pub fn contains_local(&self, identity: Identity) -> bool {
        self.frame.bindings.borrow().contains_key(&identity)
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.frame.parent.as_ref();
        while let Some(env) = current {
            depth += 1;
            current = env.frame.parent.as_ref();
        }
        depth
    }
}

// Frames can reach themselves through `this`, so never print bindings.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.frame.bindings.borrow().len())
            .field("depth", &self.depth())
            .finish()
    }
}
