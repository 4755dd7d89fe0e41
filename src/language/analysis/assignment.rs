use super::*;

/// What calling a method does to instance fields, relative to its caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Summary {
    /// Fields read before the method itself assigns them.
    requires: FxHashSet<Identity>,
    /// Fields assigned on every path out of the method.
    assigns: FxHashSet<Identity>,
}

#[derive(Clone, Debug)]
struct State {
    assigned: FxHashSet<Identity>,
    reachable: bool,
}

impl State {
    fn entry(assigned: FxHashSet<Identity>) -> Self {
        Self {
            assigned,
            reachable: true,
        }
    }

    fn unreachable() -> Self {
        Self {
            assigned: FxHashSet::default(),
            reachable: false,
        }
    }

    /// Keeps what holds on both paths.
    fn join(&mut self, other: State) {
        match (self.reachable, other.reachable) {
            (_, false) => {}
            (false, true) => *self = other,
            (true, true) => self.assigned.retain(|id| other.assigned.contains(id)),
        }
    }
}

/// One body being walked: what it tracks and how it treats failures.
struct Body<'s> {
    locals: FxHashSet<Identity>,
    fields: FxHashSet<Identity>,
    this_id: Option<Identity>,
    summaries: Option<&'s FxHashMap<MethodId, Summary>>,
    /// `Some` while summarizing: field reads are collected, nothing is reported.
    requires: Option<FxHashSet<Identity>>,
    exit: Option<State>,
}

impl<'s> Body<'s> {
    fn plain(block: &ResolvedBlock) -> Self {
        Self {
            locals: locals_of(block),
            fields: FxHashSet::default(),
            this_id: None,
            summaries: None,
            requires: None,
            exit: None,
        }
    }

    fn instance(
        block: &ResolvedBlock,
        class: &ResolvedClass,
        fields: &FxHashSet<Identity>,
        summaries: &'s FxHashMap<MethodId, Summary>,
        summarizing: bool,
    ) -> Self {
        Self {
            locals: locals_of(block),
            fields: fields.clone(),
            this_id: Some(class.this_id),
            summaries: Some(summaries),
            requires: summarizing.then(FxHashSet::default),
            exit: None,
        }
    }

    fn summarizing(&self) -> bool {
        self.requires.is_some()
    }
}

pub(super) struct AssignmentChecker<'r, R: Reporter> {
    reporter: &'r mut R,
    names: FxHashMap<Identity, String>,
    classes: FxHashMap<Identity, Rc<ResolvedClass>>,
    captures: FxHashMap<*const ResolvedClass, Rc<FxHashSet<Identity>>>,
    analyzed: FxHashSet<*const ResolvedClass>,
    reported: FxHashSet<(usize, Identity)>,
}

impl<'r, R: Reporter> AssignmentChecker<'r, R> {
    pub(super) fn new(script: &ResolvedScript, reporter: &'r mut R) -> Self {
        Self {
            reporter,
            names: script.names(),
            classes: FxHashMap::default(),
            captures: FxHashMap::default(),
            analyzed: FxHashSet::default(),
            reported: FxHashSet::default(),
        }
    }

    pub(super) fn check_script(&mut self, script: &ResolvedScript) {
        let mut body = Body::plain(&script.root);
        self.run_body(&mut body, &script.root, FxHashSet::default());
    }

    /// Walks a whole body and returns what is assigned on every way out.
    fn run_body(
        &mut self,
        body: &mut Body<'_>,
        block: &ResolvedBlock,
        entry: FxHashSet<Identity>,
    ) -> FxHashSet<Identity> {
        let mut state = State::entry(entry);
        self.block(body, block, &mut state);
        let mut exit = body.exit.take().unwrap_or_else(State::unreachable);
        exit.join(state);
        if exit.reachable {
            exit.assigned
        } else {
            body.fields.clone()
        }
    }

    fn class(&mut self, class: &Rc<ResolvedClass>) {
        if !self.analyzed.insert(Rc::as_ptr(class)) {
            return;
        }
        let fields: FxHashSet<Identity> = class.instance_fields.keys().copied().collect();
        let summaries = self.summarize(class, &fields);

        let mut constructed: Option<FxHashSet<Identity>> = None;
        for constructor in class.constructors.values() {
            let assigns = self.summarize_body(class, &fields, &summaries, constructor).assigns;
            constructed = Some(match constructed {
                None => assigns,
                Some(mut all) => {
                    all.retain(|id| assigns.contains(id));
                    all
                }
            });
        }
        let constructed = constructed.unwrap_or_else(|| fields.clone());
        tracing::trace!(class = %class.name, constructed = constructed.len(), "field summaries");

        for constructor in class.constructors.values() {
            let mut body = Body::instance(&constructor.body, class, &fields, &summaries, false);
            self.run_body(&mut body, &constructor.body, FxHashSet::default());
        }
        for method in class.methods.values() {
            let mut body = Body::instance(&method.body, class, &fields, &summaries, false);
            self.run_body(&mut body, &method.body, constructed.clone());
        }
        for method in class.static_methods.values() {
            let mut body = Body::plain(&method.body);
            self.run_body(&mut body, &method.body, FxHashSet::default());
        }
    }

    /// Fixed point over the instance methods. Requirements only grow and
    /// assignments only shrink, so the loop settles.
    fn summarize(
        &mut self,
        class: &ResolvedClass,
        fields: &FxHashSet<Identity>,
    ) -> FxHashMap<MethodId, Summary> {
        let mut summaries: FxHashMap<MethodId, Summary> = class
            .methods
            .keys()
            .map(|id| {
                let summary = Summary {
                    requires: FxHashSet::default(),
                    assigns: fields.clone(),
                };
                (id.clone(), summary)
            })
            .collect();
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for (id, method) in &class.methods {
                let computed = self.summarize_body(class, fields, &summaries, method);
                let Some(current) = summaries.get(id) else {
                    continue;
                };
                let next = Summary {
                    requires: current.requires.union(&computed.requires).copied().collect(),
                    assigns: current
                        .assigns
                        .intersection(&computed.assigns)
                        .copied()
                        .collect(),
                };
                if next != *current {
                    summaries.insert(id.clone(), next);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        tracing::trace!(class = %class.name, rounds, "method summaries settled");
        summaries
    }

    fn summarize_body(
        &mut self,
        class: &ResolvedClass,
        fields: &FxHashSet<Identity>,
        summaries: &FxHashMap<MethodId, Summary>,
        method: &ResolvedMethod,
    ) -> Summary {
        let mut body = Body::instance(&method.body, class, fields, summaries, true);
        let mut assigns = self.run_body(&mut body, &method.body, FxHashSet::default());
        assigns.retain(|id| fields.contains(id));
        Summary {
            requires: body.requires.unwrap_or_default(),
            assigns,
        }
    }

    fn block(&mut self, body: &mut Body<'_>, block: &ResolvedBlock, state: &mut State) {
        self.enter(block);
        if !body.summarizing() {
            for class in block.classes.values() {
                self.class(class);
            }
        }
        for statement in &block.statements {
            self.statement(body, statement, state);
        }
    }

    /// Class names become known as their block is entered.
    fn enter(&mut self, block: &ResolvedBlock) {
        for (identity, class) in &block.classes {
            self.classes.insert(*identity, class.clone());
        }
    }

    fn statement(&mut self, body: &mut Body<'_>, statement: &ResolvedStmt, state: &mut State) {
        match statement {
            ResolvedStmt::Block(block) => self.block(body, block, state),
            ResolvedStmt::If(stmt) => {
                self.expression(body, &stmt.condition, state);
                let mut otherwise = state.clone();
                self.statement(body, &stmt.then_branch, state);
                if let Some(else_branch) = &stmt.else_branch {
                    self.statement(body, else_branch, &mut otherwise);
                }
                state.join(otherwise);
            }
            ResolvedStmt::While(stmt) => {
                self.expression(body, &stmt.condition, state);
                // The body may never run; its writes do not outlive it.
                let mut pass = state.clone();
                self.statement(body, &stmt.body, &mut pass);
            }
            ResolvedStmt::Var {
                identity,
                initializer,
                ..
            } => match initializer {
                Some(initializer) => {
                    self.expression(body, initializer, state);
                    state.assigned.insert(*identity);
                }
                None => {
                    state.assigned.remove(identity);
                }
            },
            ResolvedStmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.expression(body, value, state);
                }
                match body.exit.as_mut() {
                    Some(exit) => exit.join(state.clone()),
                    None => body.exit = Some(state.clone()),
                }
                state.reachable = false;
            }
            ResolvedStmt::Expression(expr) => self.expression(body, expr, state),
        }
    }

    fn expression(&mut self, body: &mut Body<'_>, expr: &ResolvedExpr, state: &mut State) {
        match expr {
            ResolvedExpr::Assign { target, value, .. } => {
                self.expression(body, value, state);
                state.assigned.insert(*target);
            }
            ResolvedExpr::Call {
                receiver,
                arguments,
                line,
                ..
            } => {
                self.expression(body, receiver, state);
                for argument in arguments.iter().flatten() {
                    self.expression(body, argument, state);
                }
                if let ResolvedExpr::Variable { identity, .. } = receiver.as_ref() {
                    if Some(*identity) == body.this_id {
                        self.apply_summary(body, expr, state, *line);
                    }
                }
            }
            ResolvedExpr::Literal { .. } => {}
            ResolvedExpr::Variable { identity, line } => {
                self.read(body, state, *identity, *line);
                if let Some(class) = self.classes.get(identity).cloned() {
                    self.produce(body, state, &class, *line);
                }
            }
            ResolvedExpr::Logical { left, right, .. } => {
                self.expression(body, left, state);
                let mut rhs = state.clone();
                self.expression(body, right, &mut rhs);
            }
            ResolvedExpr::Class(class) => {
                if !body.summarizing() {
                    self.class(class);
                }
                self.produce(body, state, class, class.line);
            }
        }
    }

    /// `this.m(...)`: the callee's requirements are read here, its writes land here.
    fn apply_summary(
        &mut self,
        body: &mut Body<'_>,
        call: &ResolvedExpr,
        state: &mut State,
        line: usize,
    ) {
        let summaries = body.summaries;
        let Some(summary) = call
            .method_id()
            .and_then(|id| summaries.and_then(|summaries| summaries.get(&id)))
        else {
            return;
        };
        for field in &summary.requires {
            self.read(body, state, *field, line);
        }
        if state.reachable {
            state.assigned.extend(summary.assigns.iter().copied());
        }
    }

    /// Producing a class value requires everything its methods read from outside.
    fn produce(
        &mut self,
        body: &mut Body<'_>,
        state: &State,
        class: &Rc<ResolvedClass>,
        line: usize,
    ) {
        let captured = self.captures(class);
        for identity in captured.iter() {
            self.read(body, state, *identity, line);
        }
    }

    fn read(&mut self, body: &mut Body<'_>, state: &State, identity: Identity, line: usize) {
        if !state.reachable || state.assigned.contains(&identity) {
            return;
        }
        if body.fields.contains(&identity) {
            match body.requires.as_mut() {
                Some(requires) => {
                    requires.insert(identity);
                }
                None => self.report(line, identity, "Field"),
            }
        } else if body.locals.contains(&identity) && !body.summarizing() {
            self.report(line, identity, "Variable");
        }
    }

    fn report(&mut self, line: usize, identity: Identity, kind: &str) {
        if !self.reported.insert((line, identity)) {
            return;
        }
        let name = self
            .names
            .get(&identity)
            .map(String::as_str)
            .unwrap_or("?");
        self.reporter.error_at_line(
            Phase::Flow,
            line,
            format!("{kind} '{name}' is used before being assigned."),
        );
    }

    /// Identities a class's methods read that live outside the class.
    fn captures(&mut self, class: &Rc<ResolvedClass>) -> Rc<FxHashSet<Identity>> {
        let key = Rc::as_ptr(class);
        if let Some(found) = self.captures.get(&key) {
            return found.clone();
        }
        // Self-reference sees the empty set while this one is in progress.
        self.captures.insert(key, Rc::default());

        let mut declared: FxHashSet<Identity> = class
            .static_fields
            .keys()
            .chain(class.instance_fields.keys())
            .copied()
            .collect();
        declared.insert(class.this_id);
        declared.insert(class.static_this_id);
        let mut reads = FxHashSet::default();
        for method in class.all_methods() {
            declared.extend(method.params.iter().flatten().copied());
            self.collect_block(&method.body, &mut reads, &mut declared);
        }
        reads.retain(|id| !declared.contains(id));

        let captured = Rc::new(reads);
        self.captures.insert(key, captured.clone());
        captured
    }

    fn collect_block(
        &mut self,
        block: &ResolvedBlock,
        reads: &mut FxHashSet<Identity>,
        declared: &mut FxHashSet<Identity>,
    ) {
        self.enter(block);
        declared.extend(block.names.keys().copied());
        for class in block.classes.values() {
            reads.extend(self.captures(class).iter().copied());
        }
        for statement in &block.statements {
            self.collect_statement(statement, reads, declared);
        }
    }

    fn collect_statement(
        &mut self,
        statement: &ResolvedStmt,
        reads: &mut FxHashSet<Identity>,
        declared: &mut FxHashSet<Identity>,
    ) {
        match statement {
            ResolvedStmt::Block(block) => self.collect_block(block, reads, declared),
            ResolvedStmt::If(stmt) => {
                self.collect_expression(&stmt.condition, reads);
                self.collect_statement(&stmt.then_branch, reads, declared);
                if let Some(else_branch) = &stmt.else_branch {
                    self.collect_statement(else_branch, reads, declared);
                }
            }
            ResolvedStmt::While(stmt) => {
                self.collect_expression(&stmt.condition, reads);
                self.collect_statement(&stmt.body, reads, declared);
            }
            ResolvedStmt::Var { initializer, .. } => {
                if let Some(initializer) = initializer {
                    self.collect_expression(initializer, reads);
                }
            }
            ResolvedStmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.collect_expression(value, reads);
                }
            }
            ResolvedStmt::Expression(expr) => self.collect_expression(expr, reads),
        }
    }

    fn collect_expression(&mut self, expr: &ResolvedExpr, reads: &mut FxHashSet<Identity>) {
        match expr {
            ResolvedExpr::Assign { value, .. } => self.collect_expression(value, reads),
            ResolvedExpr::Call {
                receiver,
                arguments,
                ..
            } => {
                self.collect_expression(receiver, reads);
                for argument in arguments.iter().flatten() {
                    self.collect_expression(argument, reads);
                }
            }
            ResolvedExpr::Literal { .. } => {}
            ResolvedExpr::Variable { identity, .. } => {
                reads.insert(*identity);
                if let Some(class) = self.classes.get(identity).cloned() {
                    reads.extend(self.captures(&class).iter().copied());
                }
            }
            ResolvedExpr::Logical { left, right, .. } => {
                self.collect_expression(left, reads);
                self.collect_expression(right, reads);
            }
            ResolvedExpr::Class(class) => reads.extend(self.captures(class).iter().copied()),
        }
    }
}

/// `var` identities of a body, not counting nested class bodies.
fn locals_of(block: &ResolvedBlock) -> FxHashSet<Identity> {
    fn visit(statement: &ResolvedStmt, locals: &mut FxHashSet<Identity>) {
        match statement {
            ResolvedStmt::Block(block) => {
                for nested in &block.statements {
                    visit(nested, locals);
                }
            }
            ResolvedStmt::If(stmt) => {
                visit(&stmt.then_branch, locals);
                if let Some(else_branch) = &stmt.else_branch {
                    visit(else_branch, locals);
                }
            }
            ResolvedStmt::While(stmt) => visit(&stmt.body, locals),
            ResolvedStmt::Var { identity, .. } => {
                locals.insert(*identity);
            }
            ResolvedStmt::Return { .. } | ResolvedStmt::Expression(_) => {}
        }
    }

    let mut locals = FxHashSet::default();
    for statement in &block.statements {
        visit(statement, &mut locals);
    }
    locals
}
