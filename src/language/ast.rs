//! Syntax tree handed over by the parser.
//!
//! Every node carries the source line it came from. The constructor helpers
//! let an embedding host build trees directly when it has its own front end.

use crate::language::token::Token;

#[derive(Clone, Debug)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub line: usize,
}

impl Block {
    pub fn new(statements: Vec<Stmt>, line: usize) -> Self {
        Self { statements, line }
    }
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Block(Block),
    If(IfStmt),
    While(WhileStmt),
    Var(VarStmt),
    Class(ClassDecl),
    Return(ReturnStmt),
    Expression(Expr),
}

#[derive(Clone, Debug)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub line: usize,
}

#[derive(Clone, Debug)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub line: usize,
}

#[derive(Clone, Debug)]
pub struct VarStmt {
    pub name: Token,
    pub initializer: Option<Expr>,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub keyword: Token,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: Token,
    pub methods: Vec<MethodDecl>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodKind {
    Constructor,
    Static,
    Instance,
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub kind: MethodKind,
    pub name: Token,
    /// `None` declares a getter.
    pub params: Option<Vec<Token>>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(i64),
    String(String),
    Bool(bool),
    Nil,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Assign(AssignExpr),
    Call(CallExpr),
    Literal { value: Literal, line: usize },
    Variable(Token),
    Field(Token),
    StaticField(Token),
    This { line: usize },
    Logical(LogicalExpr),
}

#[derive(Clone, Debug)]
pub struct AssignExpr {
    pub target: Box<Expr>,
    pub value: Box<Expr>,
    pub line: usize,
}

#[derive(Clone, Debug)]
pub struct CallExpr {
    pub receiver: Box<Expr>,
    pub name: Token,
    /// `None` is getter syntax, `Some(vec![])` is an empty argument list.
    pub arguments: Option<Vec<Expr>>,
    pub block: Option<BlockArgument>,
}

/// The `{ |a, b| ... }` trailing block of a call.
#[derive(Clone, Debug)]
pub struct BlockArgument {
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Clone, Debug)]
pub struct LogicalExpr {
    pub left: Box<Expr>,
    pub operator: LogicalOp,
    pub right: Box<Expr>,
    pub line: usize,
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Assign(assign) => assign.line,
            Expr::Call(call) => call.name.line,
            Expr::Literal { line, .. } | Expr::This { line } => *line,
            Expr::Variable(name) | Expr::Field(name) | Expr::StaticField(name) => name.line,
            Expr::Logical(logical) => logical.line,
        }
    }

    pub fn number(value: i64, line: usize) -> Self {
        Expr::Literal {
            value: Literal::Number(value),
            line,
        }
    }

    pub fn string(value: impl Into<String>, line: usize) -> Self {
        Expr::Literal {
            value: Literal::String(value.into()),
            line,
        }
    }

    pub fn boolean(value: bool, line: usize) -> Self {
        Expr::Literal {
            value: Literal::Bool(value),
            line,
        }
    }

    pub fn nil(line: usize) -> Self {
        Expr::Literal {
            value: Literal::Nil,
            line,
        }
    }

    pub fn variable(name: &str, line: usize) -> Self {
        Expr::Variable(Token::new(name, line))
    }

    pub fn field(name: &str, line: usize) -> Self {
        Expr::Field(Token::new(name, line))
    }

    pub fn static_field(name: &str, line: usize) -> Self {
        Expr::StaticField(Token::new(name, line))
    }

    pub fn this(line: usize) -> Self {
        Expr::This { line }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        let line = target.line();
        Expr::Assign(AssignExpr {
            target: Box::new(target),
            value: Box::new(value),
            line,
        })
    }

    /// `receiver.name(arguments)`
    pub fn call(receiver: Expr, name: &str, arguments: Vec<Expr>, line: usize) -> Self {
        Expr::Call(CallExpr {
            receiver: Box::new(receiver),
            name: Token::new(name, line),
            arguments: Some(arguments),
            block: None,
        })
    }

    /// `receiver.name`
    pub fn getter(receiver: Expr, name: &str, line: usize) -> Self {
        Expr::Call(CallExpr {
            receiver: Box::new(receiver),
            name: Token::new(name, line),
            arguments: None,
            block: None,
        })
    }

    /// Infix operators are single-argument calls on the left operand.
    pub fn binary(left: Expr, operator: &str, right: Expr, line: usize) -> Self {
        Expr::call(left, operator, vec![right], line)
    }

    /// `receiver.name(arguments) { |params| body }`
    pub fn call_with_block(
        receiver: Expr,
        name: &str,
        arguments: Vec<Expr>,
        params: &[&str],
        body: Vec<Stmt>,
        line: usize,
    ) -> Self {
        Expr::Call(CallExpr {
            receiver: Box::new(receiver),
            name: Token::new(name, line),
            arguments: Some(arguments),
            block: Some(BlockArgument {
                params: params.iter().map(|param| Token::new(*param, line)).collect(),
                body,
                line,
            }),
        })
    }

    pub fn and(left: Expr, right: Expr, line: usize) -> Self {
        Expr::logical(left, LogicalOp::And, right, line)
    }

    pub fn or(left: Expr, right: Expr, line: usize) -> Self {
        Expr::logical(left, LogicalOp::Or, right, line)
    }

    fn logical(left: Expr, operator: LogicalOp, right: Expr, line: usize) -> Self {
        Expr::Logical(LogicalExpr {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            line,
        })
    }
}

impl Stmt {
    pub fn var(name: &str, initializer: Option<Expr>, line: usize) -> Self {
        Stmt::Var(VarStmt {
            name: Token::new(name, line),
            initializer,
        })
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::Expression(expr)
    }

    pub fn block(statements: Vec<Stmt>, line: usize) -> Self {
        Stmt::Block(Block::new(statements, line))
    }

    pub fn if_else(condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        let line = condition.line();
        Stmt::If(IfStmt {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
            line,
        })
    }

    pub fn while_loop(condition: Expr, body: Stmt) -> Self {
        let line = condition.line();
        Stmt::While(WhileStmt {
            condition,
            body: Box::new(body),
            line,
        })
    }

    pub fn ret(value: Option<Expr>, line: usize) -> Self {
        Stmt::Return(ReturnStmt {
            keyword: Token::new("return", line),
            value,
        })
    }

    pub fn class(name: &str, methods: Vec<MethodDecl>, line: usize) -> Self {
        Stmt::Class(ClassDecl {
            name: Token::new(name, line),
            methods,
        })
    }
}

impl MethodDecl {
    fn new(
        kind: MethodKind,
        name: &str,
        params: Option<&[&str]>,
        body: Vec<Stmt>,
        line: usize,
    ) -> Self {
        Self {
            kind,
            name: Token::new(name, line),
            params: params
                .map(|params| params.iter().map(|param| Token::new(*param, line)).collect()),
            body,
        }
    }

    pub fn constructor(name: &str, params: &[&str], body: Vec<Stmt>, line: usize) -> Self {
        Self::new(MethodKind::Constructor, name, Some(params), body, line)
    }

    pub fn method(name: &str, params: &[&str], body: Vec<Stmt>, line: usize) -> Self {
        Self::new(MethodKind::Instance, name, Some(params), body, line)
    }

    pub fn getter(name: &str, body: Vec<Stmt>, line: usize) -> Self {
        Self::new(MethodKind::Instance, name, None, body, line)
    }

    pub fn static_method(name: &str, params: &[&str], body: Vec<Stmt>, line: usize) -> Self {
        Self::new(MethodKind::Static, name, Some(params), body, line)
    }

    pub fn static_getter(name: &str, body: Vec<Stmt>, line: usize) -> Self {
        Self::new(MethodKind::Static, name, None, body, line)
    }
}
