use super::*;
use crate::diagnostics::DiagnosticBag;
use proptest::prelude::*;

fn resolve_all(statements: Vec<Stmt>) -> (ResolvedScript, Vec<String>) {
    let mut bag = DiagnosticBag::new();
    let script = resolve(["System"], &Block::new(statements, 1), &mut bag);
    (script, bag.messages())
}

fn errors(statements: Vec<Stmt>) -> Vec<String> {
    resolve_all(statements).1
}

fn print(value: Expr, line: usize) -> Stmt {
    Stmt::expr(Expr::call(
        Expr::variable("System", line),
        "print",
        vec![value],
        line,
    ))
}

fn var_identity(statement: &ResolvedStmt) -> Identity {
    match statement {
        ResolvedStmt::Var { identity, .. } => *identity,
        other => panic!("expected a declaration, got {other:?}"),
    }
}

fn printed_identity(statement: &ResolvedStmt) -> Identity {
    match statement {
        ResolvedStmt::Expression(ResolvedExpr::Call {
            arguments: Some(arguments),
            ..
        }) => match arguments.as_slice() {
            [ResolvedExpr::Variable { identity, .. }] => *identity,
            other => panic!("expected one variable argument, got {other:?}"),
        },
        other => panic!("expected a print call, got {other:?}"),
    }
}

#[test]
fn unused_locals_are_reported_once() {
    assert_eq!(
        errors(vec![Stmt::var("x", Some(Expr::number(1, 1)), 1)]),
        vec!["[line 1] Error at 'x': Variable 'x' is defined, but never used.".to_string()]
    );
}

#[test]
fn unused_classes_are_reported() {
    assert_eq!(
        errors(vec![Stmt::class("Ghost", vec![], 3)]),
        vec!["[line 3] Error at 'Ghost': Class 'Ghost' is defined, but never used.".to_string()]
    );
}

#[test]
fn parameters_and_host_globals_are_never_unused() {
    let (_, errors) = resolve_all(vec![
        Stmt::class(
            "Echo",
            vec![MethodDecl::static_method("run", &["ignored"], vec![], 2)],
            1,
        ),
        Stmt::expr(Expr::call(
            Expr::variable("Echo", 3),
            "run",
            vec![Expr::nil(3)],
            3,
        )),
    ]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn reading_a_variable_in_its_own_initializer_is_reported() {
    assert_eq!(
        errors(vec![Stmt::var("x", Some(Expr::variable("x", 1)), 1)]),
        vec!["[line 1] Error at 'x': Variable 'x' is used in its own initializer.".to_string()]
    );
}

#[test]
fn undeclared_names_are_reported_once_and_become_globals() {
    let (script, errors) = resolve_all(vec![
        print(Expr::variable("missing", 1), 1),
        print(Expr::variable("missing", 2), 2),
    ]);
    assert_eq!(
        errors,
        vec!["[line 1] Error at 'missing': Undeclared variable 'missing'.".to_string()]
    );
    let first = printed_identity(&script.root.statements[0]);
    let second = printed_identity(&script.root.statements[1]);
    assert_eq!(first, second);
    assert_eq!(script.globals.get(&first).map(String::as_str), Some("missing"));
}

#[test]
fn redeclaring_in_the_same_scope_is_reported() {
    assert_eq!(
        errors(vec![
            Stmt::var("x", Some(Expr::number(1, 1)), 1),
            Stmt::var("x", Some(Expr::number(2, 2)), 2),
            print(Expr::variable("x", 3), 3),
        ]),
        vec!["[line 2] Error at 'x': 'x' is already declared in this scope.".to_string()]
    );
}

#[test]
fn inner_declarations_shadow_outer_ones() {
    let (script, errors) = resolve_all(vec![
        Stmt::var("x", Some(Expr::number(1, 1)), 1),
        Stmt::block(
            vec![
                Stmt::var("x", Some(Expr::number(2, 2)), 2),
                print(Expr::variable("x", 3), 3),
            ],
            2,
        ),
        print(Expr::variable("x", 4), 4),
    ]);
    assert!(errors.is_empty(), "{errors:?}");
    let outer = var_identity(&script.root.statements[0]);
    let ResolvedStmt::Block(inner) = &script.root.statements[1] else {
        panic!("expected a block");
    };
    let shadow = var_identity(&inner.statements[0]);
    assert_ne!(outer, shadow);
    assert_eq!(printed_identity(&inner.statements[1]), shadow);
    assert_eq!(printed_identity(&script.root.statements[2]), outer);
}

#[test]
fn misplaced_receivers_and_fields_are_reported() {
    assert_eq!(
        errors(vec![
            print(Expr::this(1), 1),
            print(Expr::field("_x", 2), 2),
            print(Expr::static_field("__y", 3), 3),
        ]),
        vec![
            "[line 1] Error: Cannot use 'this' outside of a class.".to_string(),
            "[line 2] Error at '_x': Cannot use a field outside of a class.".to_string(),
            "[line 3] Error at '__y': Cannot use a field outside of a class.".to_string(),
        ]
    );
}

#[test]
fn static_methods_cannot_reach_instance_fields() {
    let errors = errors(vec![
        Stmt::class(
            "Counter",
            vec![MethodDecl::static_getter(
                "peek",
                vec![Stmt::ret(Some(Expr::field("_count", 2)), 2)],
                2,
            )],
            1,
        ),
        print(Expr::getter(Expr::variable("Counter", 3), "peek", 3), 3),
    ]);
    assert_eq!(
        errors,
        vec![
            "[line 2] Error at '_count': Cannot use an instance field in a static method."
                .to_string()
        ]
    );
}

#[test]
fn fields_share_one_identity_per_class_side() {
    let (script, errors) = resolve_all(vec![
        Stmt::class(
            "Counter",
            vec![
                MethodDecl::constructor(
                    "new",
                    &[],
                    vec![Stmt::expr(Expr::assign(
                        Expr::field("_count", 2),
                        Expr::number(0, 2),
                    ))],
                    2,
                ),
                MethodDecl::getter("count", vec![Stmt::ret(Some(Expr::field("_count", 3)), 3)], 3),
                MethodDecl::static_getter(
                    "made",
                    vec![Stmt::ret(Some(Expr::static_field("__made", 4)), 4)],
                    4,
                ),
            ],
            1,
        ),
        print(Expr::getter(Expr::variable("Counter", 5), "made", 5), 5),
    ]);
    assert!(errors.is_empty(), "{errors:?}");
    let class = script
        .root
        .classes
        .values()
        .next()
        .expect("class is recorded on its block");
    assert_eq!(class.instance_fields.len(), 1);
    assert_eq!(class.static_fields.len(), 1);
    assert_ne!(class.this_id, class.static_this_id);
    assert!(class.constructors.contains_key(&MethodId::method("new", 0)));
    assert!(class.methods.contains_key(&MethodId::getter("count")));
    assert!(class.static_methods.contains_key(&MethodId::getter("made")));
}

#[test]
fn getters_and_methods_of_one_name_are_distinct_overloads() {
    let errors = errors(vec![
        Stmt::class(
            "Twice",
            vec![
                MethodDecl::static_getter("size", vec![], 2),
                MethodDecl::static_method("size", &[], vec![], 3),
                MethodDecl::static_method("size", &[], vec![], 4),
            ],
            1,
        ),
        Stmt::expr(Expr::getter(Expr::variable("Twice", 5), "size", 5)),
    ]);
    assert_eq!(
        errors,
        vec!["[line 4] Error at 'size': Method 'size()' is already declared in class 'Twice'."
            .to_string()]
    );
}

#[test]
fn constructors_and_static_methods_share_dispatch_slots() {
    let errors = errors(vec![
        Stmt::class(
            "Maker",
            vec![
                MethodDecl::constructor("make", &[], vec![], 2),
                MethodDecl::static_method(
                    "make",
                    &[],
                    vec![Stmt::ret(Some(Expr::number(5, 3)), 3)],
                    3,
                ),
                MethodDecl::static_method("build", &["x"], vec![], 4),
                MethodDecl::constructor("build", &["x"], vec![], 5),
            ],
            1,
        ),
        Stmt::expr(Expr::call(Expr::variable("Maker", 6), "make", vec![], 6)),
    ]);
    assert_eq!(
        errors,
        vec![
            "[line 3] Error at 'make': Method 'make()' is already declared in class 'Maker'."
                .to_string(),
            "[line 5] Error at 'build': Method 'build(_)' is already declared in class 'Maker'."
                .to_string(),
        ]
    );
}

#[test]
fn references_from_a_class_body_do_not_count_as_uses() {
    let self_only = errors(vec![Stmt::class(
        "Solo",
        vec![
            MethodDecl::static_getter(
                "make",
                vec![Stmt::ret(
                    Some(Expr::call(Expr::variable("Solo", 2), "new", vec![], 2)),
                    2,
                )],
                2,
            ),
            MethodDecl::constructor("new", &[], vec![], 3),
        ],
        1,
    )]);
    assert_eq!(
        self_only,
        vec!["[line 1] Error at 'Solo': Class 'Solo' is defined, but never used.".to_string()]
    );

    let used_outside = errors(vec![
        Stmt::class(
            "Solo",
            vec![
                MethodDecl::static_getter(
                    "make",
                    vec![Stmt::ret(
                        Some(Expr::call(Expr::variable("Solo", 2), "new", vec![], 2)),
                        2,
                    )],
                    2,
                ),
                MethodDecl::constructor("new", &[], vec![], 3),
            ],
            1,
        ),
        print(Expr::getter(Expr::variable("Solo", 4), "make", 4), 4),
    ]);
    assert!(used_outside.is_empty(), "{used_outside:?}");
}

#[test]
fn classes_may_refer_to_later_classes_in_the_same_block() {
    let errors = errors(vec![
        Stmt::class(
            "First",
            vec![MethodDecl::static_getter(
                "other",
                vec![Stmt::ret(Some(Expr::variable("Second", 2)), 2)],
                2,
            )],
            1,
        ),
        Stmt::class("Second", vec![], 3),
        print(Expr::getter(Expr::variable("First", 4), "other", 4), 4),
    ]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn classes_cannot_be_assigned() {
    let errors = errors(vec![
        Stmt::class("Fixed", vec![], 1),
        Stmt::expr(Expr::assign(Expr::variable("Fixed", 2), Expr::nil(2))),
    ]);
    assert_eq!(
        errors,
        vec!["[line 2] Error at 'Fixed': Cannot assign to class 'Fixed'.".to_string()]
    );
}

#[test]
fn block_arguments_become_callable_classes() {
    let (script, errors) = resolve_all(vec![Stmt::expr(Expr::call_with_block(
        Expr::variable("System", 1),
        "print",
        vec![],
        &["value"],
        vec![print(Expr::variable("value", 1), 1)],
        1,
    ))]);
    assert!(errors.is_empty(), "{errors:?}");
    let ResolvedStmt::Expression(ResolvedExpr::Call {
        arguments: Some(arguments),
        ..
    }) = &script.root.statements[0]
    else {
        panic!("expected a call");
    };
    let [ResolvedExpr::Call { receiver, name, .. }] = arguments.as_slice() else {
        panic!("expected the block to be the only argument");
    };
    assert_eq!(name, "new");
    let ResolvedExpr::Class(class) = receiver.as_ref() else {
        panic!("expected an anonymous class");
    };
    assert_eq!(class.name, BLOCK_CLASS_NAME);
    assert!(class.constructors.contains_key(&MethodId::method("new", 0)));
    assert!(class.methods.contains_key(&MethodId::method("call", 1)));
}

/// One declaration per nesting level, each printed before and after its
/// nested block.
fn nested(names: &[&str], line: usize) -> Vec<Stmt> {
    let Some((name, rest)) = names.split_first() else {
        return Vec::new();
    };
    vec![
        Stmt::var(name, Some(Expr::number(line as i64, line)), line),
        print(Expr::variable(name, line), line),
        Stmt::block(nested(rest, line + 1), line),
        print(Expr::variable(name, line), line),
    ]
}

fn check_nested(block: &ResolvedBlock, seen: &mut Vec<Identity>) {
    if block.statements.is_empty() {
        return;
    }
    let declared = var_identity(&block.statements[0]);
    assert!(!seen.contains(&declared), "identity {declared} reused");
    seen.push(declared);
    assert_eq!(printed_identity(&block.statements[1]), declared);
    if let ResolvedStmt::Block(inner) = &block.statements[2] {
        check_nested(inner, seen);
    }
    assert_eq!(printed_identity(&block.statements[3]), declared);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn identities_are_unique_and_reads_find_the_nearest_declaration(
        names in prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 1..8)
    ) {
        let (script, errors) = resolve_all(nested(&names, 1));
        prop_assert!(errors.is_empty(), "{:?}", errors);
        let mut seen = Vec::new();
        check_nested(&script.root, &mut seen);
        prop_assert_eq!(seen.len(), names.len());
    }
}
