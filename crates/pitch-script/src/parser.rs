//! Recursive-descent parser producing a [`Program`].
//!
//! Expressions use one function per precedence level, from assignment
//! (lowest) down to primary expressions. Statement parsing accepts an
//! optional semicolon after simple statements.

use std::rc::Rc;

use crate::ast::{
    BinaryOp, DeclKind, Expr, ExprKind, FunctionDef, Program, Stmt, StmtKind, Target, UnaryOp,
};
use crate::error::{ScriptError, ScriptResult};
use crate::lexer::{tokenize, Keyword, Token, TokenKind};

/// Parses `source` into a program.
pub fn parse(source: &str) -> ScriptResult<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement(true)?);
    }
    Ok(Program { body })
}

/// Guards against stack overflow on pathological nesting.
const MAX_NESTING: usize = 100;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        kind
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), TokenKind::Punct(p) if *p == punct)
    }

    fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if *k == keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> ScriptResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{punct}`")))
        }
    }

    fn expect_ident(&mut self) -> ScriptResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, wanted: &str) -> ScriptError {
        let found = match self.peek() {
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(s) => format!("string {s:?}"),
            TokenKind::Ident(name) => format!("`{name}`"),
            TokenKind::Keyword(k) => format!("keyword {k:?}").to_lowercase(),
            TokenKind::Punct(p) => format!("`{p}`"),
            TokenKind::Eof => "end of input".to_string(),
        };
        ScriptError::syntax(self.line(), format!("expected {wanted}, found {found}"))
    }

    fn enter(&mut self) -> ScriptResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ScriptError::syntax(self.line(), "nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn end_statement(&mut self) {
        self.eat_punct(";");
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn statement(&mut self, top_level: bool) -> ScriptResult<Stmt> {
        self.enter()?;
        let result = self.statement_inner(top_level);
        self.leave();
        result
    }

    fn statement_inner(&mut self, top_level: bool) -> ScriptResult<Stmt> {
        let line = self.line();
        let kind = match self.peek().clone() {
            TokenKind::Punct("{") => {
                self.pos += 1;
                StmtKind::Block(self.block_body()?)
            }
            TokenKind::Punct(";") => {
                self.pos += 1;
                StmtKind::Empty
            }
            TokenKind::Keyword(Keyword::Function) => {
                if !top_level {
                    return Err(ScriptError::syntax(
                        line,
                        "function declarations are only allowed at top level",
                    ));
                }
                self.pos += 1;
                StmtKind::Function(Rc::new(self.function_rest(line)?))
            }
            TokenKind::Keyword(kw @ (Keyword::Var | Keyword::Let | Keyword::Const)) => {
                self.pos += 1;
                let decl = self.declaration(kw)?;
                self.end_statement();
                decl
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.pos += 1;
                let value = if self.is_punct(";") || self.is_punct("}") || self.at_eof() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.end_statement();
                StmtKind::Return(value)
            }
            TokenKind::Keyword(Keyword::If) => {
                self.pos += 1;
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let then = Box::new(self.statement(false)?);
                let otherwise = if self.is_keyword(Keyword::Else) {
                    self.pos += 1;
                    Some(Box::new(self.statement(false)?))
                } else {
                    None
                };
                StmtKind::If(test, then, otherwise)
            }
            TokenKind::Keyword(Keyword::While) => {
                self.pos += 1;
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                StmtKind::While(test, Box::new(self.statement(false)?))
            }
            TokenKind::Keyword(Keyword::For) => {
                self.pos += 1;
                self.for_rest()?
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.pos += 1;
                self.end_statement();
                StmtKind::Break
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.pos += 1;
                self.end_statement();
                StmtKind::Continue
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.pos += 1;
                let value = self.expression()?;
                self.end_statement();
                StmtKind::Throw(value)
            }
            _ => {
                let expr = self.expression()?;
                self.end_statement();
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, line })
    }

    /// Parses statements up to and including the closing `}`.
    fn block_body(&mut self) -> ScriptResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.eat_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.statement(false)?);
        }
        Ok(body)
    }

    fn declaration(&mut self, kw: Keyword) -> ScriptResult<StmtKind> {
        let kind = match kw {
            Keyword::Let => DeclKind::Let,
            Keyword::Const => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let mut bindings = Vec::new();
        loop {
            let line = self.line();
            let name = self.expect_ident()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                if kind == DeclKind::Const {
                    return Err(ScriptError::syntax(
                        line,
                        format!("missing initializer in const declaration of `{name}`"),
                    ));
                }
                None
            };
            bindings.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(StmtKind::Decl(kind, bindings))
    }

    fn function_rest(&mut self, line: u32) -> ScriptResult<FunctionDef> {
        let name = self.expect_ident()?;
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.eat_punct(")") {
            loop {
                params.push(self.expect_ident()?);
                if self.eat_punct(")") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("{")?;
        let body = self.block_body()?;
        Ok(FunctionDef {
            name,
            params,
            body,
            line,
        })
    }

    fn for_rest(&mut self) -> ScriptResult<StmtKind> {
        self.expect_punct("(")?;

        let init = if self.eat_punct(";") {
            None
        } else {
            let line = self.line();
            let kind = match self.peek().clone() {
                TokenKind::Keyword(kw @ (Keyword::Var | Keyword::Let | Keyword::Const)) => {
                    self.pos += 1;
                    self.declaration(kw)?
                }
                _ => StmtKind::Expr(self.expression()?),
            };
            self.expect_punct(";")?;
            Some(Box::new(Stmt { kind, line }))
        };

        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;

        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;

        let body = Box::new(self.statement(false)?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expression(&mut self) -> ScriptResult<Expr> {
        self.enter()?;
        let result = self.assignment();
        self.leave();
        result
    }

    fn assignment(&mut self) -> ScriptResult<Expr> {
        let line = self.line();
        let lhs = self.conditional()?;

        let op = match self.peek() {
            TokenKind::Punct("=") => None,
            TokenKind::Punct("+=") => Some(BinaryOp::Add),
            TokenKind::Punct("-=") => Some(BinaryOp::Sub),
            TokenKind::Punct("*=") => Some(BinaryOp::Mul),
            TokenKind::Punct("/=") => Some(BinaryOp::Div),
            TokenKind::Punct("%=") => Some(BinaryOp::Rem),
            _ => return Ok(lhs),
        };
        self.pos += 1;

        let target = to_target(lhs)?;
        let value = self.assignment()?;
        Ok(Expr {
            kind: ExprKind::Assign(target, op, Box::new(value)),
            line,
        })
    }

    fn conditional(&mut self) -> ScriptResult<Expr> {
        let line = self.line();
        let test = self.binary(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let then = self.assignment()?;
        self.expect_punct(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr {
            kind: ExprKind::Conditional(Box::new(test), Box::new(then), Box::new(otherwise)),
            line,
        })
    }

    /// Precedence climbing over the binary operator table.
    fn binary(&mut self, min_prec: u8) -> ScriptResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let Some((op, prec)) = binary_op(self.peek()) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let line = self.line();
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = Expr {
                kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
                line,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> ScriptResult<Expr> {
        let line = self.line();
        let op = match self.peek() {
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Keyword(Keyword::Typeof) => Some(UnaryOp::Typeof),
            TokenKind::Punct(p @ ("++" | "--")) => {
                let delta = if *p == "++" { 1.0 } else { -1.0 };
                self.pos += 1;
                let operand = self.unary()?;
                return Ok(Expr {
                    kind: ExprKind::Update {
                        target: to_target(operand)?,
                        delta,
                        prefix: true,
                    },
                    line,
                });
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.pos += 1;
                self.enter()?;
                let operand = self.unary();
                self.leave();
                Ok(Expr {
                    kind: ExprKind::Unary(op, Box::new(operand?)),
                    line,
                })
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> ScriptResult<Expr> {
        let expr = self.call()?;
        let delta = match self.peek() {
            TokenKind::Punct("++") => 1.0,
            TokenKind::Punct("--") => -1.0,
            _ => return Ok(expr),
        };
        let line = expr.line;
        self.pos += 1;
        Ok(Expr {
            kind: ExprKind::Update {
                target: to_target(expr)?,
                delta,
                prefix: false,
            },
            line,
        })
    }

    fn call(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            let line = self.line();
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                expr = Expr {
                    kind: ExprKind::Member(Box::new(expr), name),
                    line,
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr {
                    kind: ExprKind::Index(Box::new(expr), Box::new(index)),
                    line,
                };
            } else if self.eat_punct("(") {
                let mut args = Vec::new();
                if !self.eat_punct(")") {
                    loop {
                        args.push(self.assignment()?);
                        if self.eat_punct(")") {
                            break;
                        }
                        self.expect_punct(",")?;
                    }
                }
                expr = Expr {
                    kind: ExprKind::Call(Box::new(expr), args),
                    line,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> ScriptResult<Expr> {
        let line = self.line();
        let kind = match self.peek().clone() {
            TokenKind::Number(n) => {
                self.pos += 1;
                ExprKind::Number(n)
            }
            TokenKind::Str(s) => {
                self.pos += 1;
                ExprKind::Str(Rc::from(s.as_str()))
            }
            TokenKind::Ident(name) => {
                self.pos += 1;
                ExprKind::Ident(name)
            }
            TokenKind::Keyword(Keyword::True) => {
                self.pos += 1;
                ExprKind::Bool(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.pos += 1;
                ExprKind::Bool(false)
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.pos += 1;
                ExprKind::Null
            }
            TokenKind::Keyword(Keyword::Undefined) => {
                self.pos += 1;
                ExprKind::Undefined
            }
            TokenKind::Punct("(") => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect_punct(")")?;
                return Ok(inner);
            }
            TokenKind::Punct("[") => {
                self.pos += 1;
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.assignment()?);
                    if !self.is_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                ExprKind::Array(items)
            }
            TokenKind::Punct("{") => {
                self.pos += 1;
                let mut fields = Vec::new();
                while !self.eat_punct("}") {
                    let key = match self.advance() {
                        TokenKind::Ident(name) => name,
                        TokenKind::Str(s) => s,
                        TokenKind::Number(n) => crate::value::format_number(n),
                        TokenKind::Keyword(_) if matches!(self.peek(), TokenKind::Punct(":")) => {
                            // Reserved words are fine as property names.
                            keyword_spelling(&self.tokens[self.pos - 1].kind)
                        }
                        _ => {
                            self.pos -= 1;
                            return Err(self.unexpected("property name"));
                        }
                    };
                    self.expect_punct(":")?;
                    fields.push((key, self.assignment()?));
                    if !self.is_punct("}") {
                        self.expect_punct(",")?;
                    }
                }
                ExprKind::Object(fields)
            }
            TokenKind::Keyword(Keyword::Function) => {
                return Err(ScriptError::syntax(
                    line,
                    "function expressions are not supported; declare the function at top level",
                ));
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr { kind, line })
    }
}

fn binary_op(token: &TokenKind) -> Option<(BinaryOp, u8)> {
    let TokenKind::Punct(p) = token else {
        return None;
    };
    Some(match *p {
        "||" => (BinaryOp::Or, 1),
        "&&" => (BinaryOp::And, 2),
        "==" => (BinaryOp::Eq, 3),
        "!=" => (BinaryOp::NotEq, 3),
        "===" => (BinaryOp::StrictEq, 3),
        "!==" => (BinaryOp::StrictNotEq, 3),
        "<" => (BinaryOp::Lt, 4),
        "<=" => (BinaryOp::Le, 4),
        ">" => (BinaryOp::Gt, 4),
        ">=" => (BinaryOp::Ge, 4),
        "+" => (BinaryOp::Add, 5),
        "-" => (BinaryOp::Sub, 5),
        "*" => (BinaryOp::Mul, 6),
        "/" => (BinaryOp::Div, 6),
        "%" => (BinaryOp::Rem, 6),
        _ => return None,
    })
}

fn to_target(expr: Expr) -> ScriptResult<Target> {
    match expr.kind {
        ExprKind::Ident(name) => Ok(Target::Ident(name)),
        ExprKind::Member(object, name) => Ok(Target::Member(object, name)),
        ExprKind::Index(object, index) => Ok(Target::Index(object, index)),
        _ => Err(ScriptError::syntax(expr.line, "invalid assignment target")),
    }
}

fn keyword_spelling(token: &TokenKind) -> String {
    match token {
        TokenKind::Keyword(k) => format!("{k:?}").to_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        let program = parse(source).unwrap();
        match &program.body[0].kind {
            StmtKind::Expr(e) => e.clone(),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    mod expression_tests {
        use super::*;

        #[test]
        fn multiplication_binds_tighter_than_addition() {
            let e = expr("1 + 2 * 3");
            let ExprKind::Binary(BinaryOp::Add, lhs, rhs) = e.kind else {
                panic!("expected addition at root");
            };
            assert_eq!(lhs.kind, ExprKind::Number(1.0));
            assert!(matches!(rhs.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
        }

        #[test]
        fn subtraction_is_left_associative() {
            let e = expr("8 - 4 - 2");
            let ExprKind::Binary(BinaryOp::Sub, lhs, _) = e.kind else {
                panic!("expected subtraction at root");
            };
            assert!(matches!(lhs.kind, ExprKind::Binary(BinaryOp::Sub, _, _)));
        }

        #[test]
        fn assignment_is_right_associative() {
            let e = expr("a = b = 1");
            let ExprKind::Assign(Target::Ident(a), None, rhs) = e.kind else {
                panic!("expected assignment");
            };
            assert_eq!(a, "a");
            assert!(matches!(rhs.kind, ExprKind::Assign(..)));
        }

        #[test]
        fn member_call_chain() {
            let e = expr("Math.atan2(y, x)");
            let ExprKind::Call(callee, args) = e.kind else {
                panic!("expected call");
            };
            assert_eq!(args.len(), 2);
            assert!(matches!(callee.kind, ExprKind::Member(_, ref name) if name == "atan2"));
        }

        #[test]
        fn object_and_array_literals() {
            let e = expr("({ a: 1, 'b': [1, 2,], if: true })");
            let ExprKind::Object(fields) = e.kind else {
                panic!("expected object");
            };
            let keys: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["a", "b", "if"]);
        }

        #[test]
        fn update_operators() {
            assert!(matches!(
                expr("i++").kind,
                ExprKind::Update { prefix: false, .. }
            ));
            assert!(matches!(
                expr("--i").kind,
                ExprKind::Update { prefix: true, .. }
            ));
        }
    }

    mod statement_tests {
        use super::*;

        #[test]
        fn function_declaration() {
            let program = parse("function strategy(ws) { return ws.t_ms; }").unwrap();
            let StmtKind::Function(def) = &program.body[0].kind else {
                panic!("expected function");
            };
            assert_eq!(def.name, "strategy");
            assert_eq!(def.params, vec!["ws".to_string()]);
        }

        #[test]
        fn for_loop_with_declaration() {
            let program = parse("for (let i = 0; i < 3; i++) { x += i; }").unwrap();
            assert!(matches!(program.body[0].kind, StmtKind::For { .. }));
        }

        #[test]
        fn semicolons_are_optional() {
            let program = parse("var a = 1\nvar b = 2\n").unwrap();
            assert_eq!(program.body.len(), 2);
        }

        #[test]
        fn nested_function_is_rejected() {
            let err = parse("function f() {\n function g() {} }").unwrap_err();
            assert!(matches!(err, ScriptError::Syntax { line: 2, .. }));
        }

        #[test]
        fn const_requires_initializer() {
            assert!(parse("const x;").is_err());
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn reports_line_of_failure() {
            let err = parse("var a = 1;\nvar b = ;").unwrap_err();
            assert!(matches!(err, ScriptError::Syntax { line: 2, .. }));
        }

        #[test]
        fn unclosed_block() {
            assert!(parse("if (x) {").is_err());
        }

        #[test]
        fn invalid_assignment_target() {
            assert!(parse("1 = 2").is_err());
        }

        #[test]
        fn deep_nesting_is_an_error_not_a_crash() {
            let source = format!("{}1{}", "(".repeat(500), ")".repeat(500));
            assert!(parse(&source).is_err());
        }
    }
}
