//! Syntax tree produced by the parser and walked by the interpreter.

use std::rc::Rc;

/// Declaration flavour for `var`, `let` and `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

/// Binary operators, including the short-circuiting logical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    And,
    Or,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    Typeof,
}

/// Anything that can appear on the left of `=`.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
}

/// An expression with the line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Str(Rc<str>),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Plain or compound assignment; `op` is `None` for `=`.
    Assign(Target, Option<BinaryOp>, Box<Expr>),
    /// `++x`, `x--` and friends. `delta` is +1 or -1.
    Update {
        target: Target,
        delta: f64,
        prefix: bool,
    },
}

/// A function declaration. Shared by reference once the program runs.
#[derive(Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

/// A statement with the line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Decl(DeclKind, Vec<(String, Option<Expr>)>),
    Function(Rc<FunctionDef>),
    Return(Option<Expr>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    Block(Vec<Stmt>),
    Break,
    Continue,
    Throw(Expr),
    Empty,
}

/// A parsed program: the top-level statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}
