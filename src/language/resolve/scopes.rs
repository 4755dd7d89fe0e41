use super::*;

#[derive(Clone, Debug)]
pub(super) struct Binding {
    pub identity: Identity,
    pub token: Token,
    pub initialized: bool,
    pub used: bool,
    pub is_class: bool,
    pub report_unused: bool,
}

#[derive(Default)]
pub(super) struct LexicalScope {
    bindings: FxHashMap<String, Binding>,
    order: Vec<String>,
    pub names: FxHashMap<Identity, String>,
    pub classes: BTreeMap<Identity, Rc<ResolvedClass>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum FieldSide {
    Static,
    Instance,
}

/// Field names seen so far on one side of a class, plus that side's receiver.
pub(super) struct FieldScope {
    pub side: FieldSide,
    pub receiver: Identity,
    pub fields: BTreeMap<String, Identity>,
}

impl FieldScope {
    pub fn new(side: FieldSide, receiver: Identity) -> Self {
        Self {
            side,
            receiver,
            fields: BTreeMap::new(),
        }
    }

    pub fn into_identities(self) -> BTreeMap<Identity, String> {
        self.fields
            .into_iter()
            .map(|(name, identity)| (identity, name))
            .collect()
    }
}

impl<R: Reporter> Resolver<'_, R> {
    pub(super) fn fresh_identity(&mut self) -> Identity {
        let identity = Identity(self.next_identity);
        self.next_identity += 1;
        identity
    }

    pub(super) fn push_scope(&mut self) {
        self.scopes.push(LexicalScope::default());
    }

    /// Pops the innermost scope, reporting every declaration nobody referenced.
    pub(super) fn pop_scope(&mut self) -> LexicalScope {
        let mut scope = self.scopes.pop().unwrap_or_default();
        for name in std::mem::take(&mut scope.order) {
            let Some(binding) = scope.bindings.get(&name) else {
                continue;
            };
            if binding.used || !binding.report_unused {
                continue;
            }
            let kind = if binding.is_class { "Class" } else { "Variable" };
            self.reporter.error_at_token(
                Phase::Resolve,
                &binding.token,
                format!("{kind} '{}' is defined, but never used.", binding.token.lexeme),
            );
        }
        scope
    }

    pub(super) fn declare(&mut self, token: &Token, is_class: bool, initialized: bool) -> Identity {
        let identity = self.fresh_identity();
        let duplicate = self
            .scopes
            .last()
            .is_some_and(|scope| scope.bindings.contains_key(&token.lexeme));
        if duplicate {
            self.reporter.error_at_token(
                Phase::Resolve,
                token,
                format!("'{}' is already declared in this scope.", token.lexeme),
            );
        }
        tracing::trace!(name = %token.lexeme, %identity, "declared");
        if let Some(scope) = self.scopes.last_mut() {
            if !duplicate {
                scope.order.push(token.lexeme.clone());
            }
            scope.names.insert(identity, token.lexeme.clone());
            scope.bindings.insert(
                token.lexeme.clone(),
                Binding {
                    identity,
                    token: token.clone(),
                    initialized,
                    used: false,
                    is_class,
                    report_unused: true,
                },
            );
        }
        identity
    }

    /// Parameters never count as unused.
    pub(super) fn declare_parameter(&mut self, token: &Token) -> Identity {
        let identity = self.declare(token, false, true);
        if let Some(binding) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.bindings.get_mut(&token.lexeme))
        {
            binding.report_unused = false;
        }
        identity
    }

    pub(super) fn mark_initialized(&mut self, name: &str) {
        if let Some(binding) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.bindings.get_mut(name))
        {
            binding.initialized = true;
        }
    }

    /// Walks the scope stack innermost first and marks the hit as used,
    /// unless it names a class whose body is being resolved.
    pub(super) fn lookup(&mut self, name: &str) -> Option<Binding> {
        let enclosing = &self.enclosing_classes;
        self.scopes.iter_mut().rev().find_map(|scope| {
            scope.bindings.get_mut(name).map(|binding| {
                if !(binding.is_class && enclosing.contains(&binding.identity)) {
                    binding.used = true;
                }
                binding.clone()
            })
        })
    }

    /// Plugs a hole left by an error with a global slot so later passes never
    /// see a dangling identity.
    pub(super) fn synthesize_global(&mut self, name: &str, line: usize) -> Identity {
        let identity = self.fresh_identity();
        tracing::debug!(name, %identity, "synthesized global");
        self.globals.insert(identity, name.to_string());
        if let Some(global) = self.scopes.first_mut() {
            global.bindings.insert(
                name.to_string(),
                Binding {
                    identity,
                    token: Token::new(name, line),
                    initialized: true,
                    used: true,
                    is_class: false,
                    report_unused: false,
                },
            );
        }
        identity
    }

    pub(super) fn predeclare_global(&mut self, name: &str) {
        let identity = self.fresh_identity();
        self.globals.insert(identity, name.to_string());
        if let Some(global) = self.scopes.first_mut() {
            global.bindings.insert(
                name.to_string(),
                Binding {
                    identity,
                    token: Token::new(name, 0),
                    initialized: true,
                    used: false,
                    is_class: false,
                    report_unused: false,
                },
            );
        }
    }

    pub(super) fn static_field(&mut self, token: &Token) -> Option<Identity> {
        let index = self
            .field_scopes
            .iter()
            .rposition(|scope| scope.side == FieldSide::Static)?;
        Some(self.field_in(index, &token.lexeme))
    }

    pub(super) fn instance_field(&mut self, token: &Token) -> Result<Identity, FieldError> {
        let Some(index) = self.field_scopes.len().checked_sub(1) else {
            return Err(FieldError::OutsideClass);
        };
        if self.field_scopes[index].side == FieldSide::Static {
            return Err(FieldError::StaticContext);
        }
        Ok(self.field_in(index, &token.lexeme))
    }

    fn field_in(&mut self, index: usize, name: &str) -> Identity {
        if let Some(identity) = self.field_scopes[index].fields.get(name) {
            return *identity;
        }
        let identity = self.fresh_identity();
        tracing::trace!(field = name, %identity, "allocated field");
        self.field_scopes[index]
            .fields
            .insert(name.to_string(), identity);
        identity
    }

    pub(super) fn receiver(&self) -> Option<Identity> {
        self.field_scopes.last().map(|scope| scope.receiver)
    }
}

pub(super) enum FieldError {
    OutsideClass,
    StaticContext,
}
