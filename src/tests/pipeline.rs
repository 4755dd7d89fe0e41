use crate::diagnostics::Phase;
use crate::host::HostEnvironment;
use crate::language::ast::{Block, Expr, MethodDecl, Stmt};
use crate::session::{Outcome, Session, SessionOptions};
use std::cell::RefCell;
use std::rc::Rc;

fn run_with(options: SessionOptions, statements: Vec<Stmt>) -> (String, Outcome) {
    let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
    let host = HostEnvironment::standard(buffer.clone());
    let outcome = Session::new(&host, options).run(&Block::new(statements, 1));
    let output = String::from_utf8(buffer.borrow().clone()).expect("utf-8 output");
    (output, outcome)
}

fn run(statements: Vec<Stmt>) -> (String, Outcome) {
    run_with(SessionOptions::default(), statements)
}

fn print(value: Expr, line: usize) -> Stmt {
    Stmt::expr(Expr::call(
        Expr::variable("System", line),
        "print",
        vec![value],
        line,
    ))
}

fn one_plus_true() -> Vec<Stmt> {
    vec![print(
        Expr::binary(Expr::number(1, 1), "+", Expr::boolean(true, 1), 1),
        1,
    )]
}

fn sized_class() -> Stmt {
    Stmt::class(
        "Sized",
        vec![
            MethodDecl::constructor("new", &[], vec![], 2),
            MethodDecl::getter("size", vec![Stmt::ret(Some(Expr::number(3, 3)), 3)], 3),
        ],
        1,
    )
}

#[test]
fn prints_arithmetic() {
    let (output, outcome) = run(vec![print(
        Expr::binary(Expr::number(1, 1), "+", Expr::number(2, 1), 1),
        1,
    )]);
    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(output, "3\n");
}

#[test]
fn type_errors_stop_the_run_by_default() {
    let (output, outcome) = run(one_plus_true());
    assert!(!outcome.executed);
    assert_eq!(output, "");
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].phase, Phase::Typecheck);
    assert_eq!(
        outcome.messages(),
        vec!["[line 1] Error: Expected 'Number' but found 'Boolean'.".to_string()]
    );
}

#[test]
fn runtime_catches_what_the_checker_would() {
    let unchecked = SessionOptions::default().with_typecheck(false);
    let (output, outcome) = run_with(unchecked, one_plus_true());
    assert!(outcome.executed);
    assert_eq!(output, "");
    let error = outcome.runtime_error.expect("operand error");
    assert_eq!(error.line, 1);
    assert_eq!(
        error.to_string(),
        "[line 1] Runtime error: Right operand must be a number."
    );
}

#[test]
fn counter_class_keeps_state() {
    let (output, outcome) = run(vec![
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
                MethodDecl::method(
                    "increment",
                    &[],
                    vec![Stmt::expr(Expr::assign(
                        Expr::field("_count", 4),
                        Expr::binary(Expr::field("_count", 4), "+", Expr::number(1, 4), 4),
                    ))],
                    4,
                ),
            ],
            1,
        ),
        Stmt::var(
            "c",
            Some(Expr::call(Expr::variable("Counter", 6), "new", vec![], 6)),
            6,
        ),
        print(Expr::getter(Expr::variable("c", 7), "count", 7), 7),
        Stmt::expr(Expr::call(Expr::variable("c", 8), "increment", vec![], 8)),
        print(Expr::getter(Expr::variable("c", 9), "count", 9), 9),
    ]);
    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(output, "0\n1\n");
}

#[test]
fn while_loops_run_until_the_condition_fails() {
    let (output, outcome) = run(vec![
        Stmt::var("i", Some(Expr::number(0, 1)), 1),
        Stmt::while_loop(
            Expr::binary(Expr::variable("i", 2), "<", Expr::number(3, 2), 2),
            Stmt::block(
                vec![
                    print(Expr::variable("i", 3), 3),
                    Stmt::expr(Expr::assign(
                        Expr::variable("i", 4),
                        Expr::binary(Expr::variable("i", 4), "+", Expr::number(1, 4), 4),
                    )),
                ],
                2,
            ),
        ),
    ]);
    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(output, "0\n1\n2\n");
}

#[test]
fn unused_variables_stop_the_run() {
    let (output, outcome) = run(vec![Stmt::var("x", Some(Expr::number(1, 1)), 1)]);
    assert!(!outcome.executed);
    assert_eq!(output, "");
    assert_eq!(
        outcome.messages(),
        vec!["[line 1] Error at 'x': Variable 'x' is defined, but never used.".to_string()]
    );
}

#[test]
fn resolution_errors_stop_the_run_even_when_asked_to_continue() {
    let (output, outcome) = run_with(
        SessionOptions::default().with_run_on_static_errors(true),
        vec![
            Stmt::var("x", Some(Expr::variable("x", 1)), 1),
            print(Expr::string("after", 2), 2),
        ],
    );
    assert!(!outcome.executed);
    assert_eq!(output, "");
    assert_eq!(
        outcome.messages(),
        vec!["[line 1] Error at 'x': Variable 'x' is used in its own initializer.".to_string()]
    );
}

#[test]
fn static_errors_can_be_run_through() {
    let (output, outcome) = run_with(
        SessionOptions::default()
            .with_typecheck(false)
            .with_run_on_static_errors(true),
        vec![
            Stmt::var("x", None, 1),
            print(Expr::variable("x", 2), 2),
        ],
    );
    assert!(outcome.executed);
    assert!(outcome.runtime_error.is_none());
    assert_eq!(output, "null\n");
    assert_eq!(
        outcome.messages(),
        vec!["[line 2] Error: Variable 'x' is used before being assigned.".to_string()]
    );
}

#[test]
fn shadowed_names_resolve_to_the_nearest_declaration() {
    let (output, outcome) = run(vec![
        Stmt::var("x", Some(Expr::string("outer", 1)), 1),
        Stmt::block(
            vec![
                Stmt::var("x", Some(Expr::string("inner", 2)), 2),
                print(Expr::variable("x", 3), 3),
            ],
            2,
        ),
        print(Expr::variable("x", 4), 4),
    ]);
    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(output, "inner\nouter\n");
}

#[test]
fn getters_and_methods_dispatch_exactly() {
    let statements = || {
        vec![
            sized_class(),
            Stmt::var(
                "s",
                Some(Expr::call(Expr::variable("Sized", 5), "new", vec![], 5)),
                5,
            ),
            print(Expr::getter(Expr::variable("s", 6), "size", 6), 6),
            print(Expr::call(Expr::variable("s", 7), "size", vec![], 7), 7),
        ]
    };

    let (_, checked) = run(statements());
    assert!(!checked.executed);
    assert!(checked
        .diagnostics
        .iter()
        .all(|diagnostic| diagnostic.phase == Phase::Typecheck));
    assert!(!checked.diagnostics.is_empty());

    let options = SessionOptions::default().with_typecheck(false);
    let (output, unchecked) = run_with(options, statements());
    assert_eq!(output, "3\n");
    assert_eq!(
        unchecked.runtime_error.map(|error| error.to_string()),
        Some("[line 7] Runtime error: 'Sized' does not implement 'size()'.".to_string())
    );
}

#[test]
fn constructor_and_static_method_clashes_stop_the_run() {
    let (output, outcome) = run(vec![
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
                MethodDecl::getter("v", vec![Stmt::ret(Some(Expr::number(1, 4)), 4)], 4),
            ],
            1,
        ),
        print(
            Expr::binary(
                Expr::call(Expr::variable("Maker", 6), "make", vec![], 6),
                "+",
                Expr::number(1, 6),
                6,
            ),
            6,
        ),
    ]);
    assert!(!outcome.executed);
    assert_eq!(output, "");
    assert_eq!(
        outcome.messages(),
        vec!["[line 3] Error at 'make': Method 'make()' is already declared in class 'Maker'."
            .to_string()]
    );
}

#[test]
fn block_arguments_close_over_their_scope() {
    let (output, outcome) = run(vec![
        Stmt::class(
            "Twice",
            vec![MethodDecl::static_method(
                "run",
                &["f"],
                vec![Stmt::ret(
                    Some(Expr::binary(
                        Expr::call(Expr::variable("f", 2), "call", vec![Expr::number(1, 2)], 2),
                        "+",
                        Expr::call(Expr::variable("f", 2), "call", vec![Expr::number(2, 2)], 2),
                        2,
                    )),
                    2,
                )],
                2,
            )],
            1,
        ),
        Stmt::var("base", Some(Expr::number(10, 3)), 3),
        print(
            Expr::call_with_block(
                Expr::variable("Twice", 4),
                "run",
                vec![],
                &["n"],
                vec![Stmt::ret(
                    Some(Expr::binary(Expr::variable("n", 4), "*", Expr::variable("base", 4), 4)),
                    4,
                )],
                4,
            ),
            4,
        ),
    ]);
    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(output, "30\n");
}

#[test]
fn options_come_from_the_environment() {
    std::env::set_var("EMBER_TYPECHECK", "0");
    std::env::set_var("EMBER_RUN_ON_ERRORS", "true");
    std::env::remove_var("EMBER_FLOW");
    let options = SessionOptions::from_env();
    std::env::remove_var("EMBER_TYPECHECK");
    std::env::remove_var("EMBER_RUN_ON_ERRORS");
    assert_eq!(
        options,
        SessionOptions::default()
            .with_typecheck(false)
            .with_run_on_static_errors(true)
    );
}
