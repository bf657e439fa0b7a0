use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Token;
use crate::lang::node::{
    BinOp, Case, Com, ComKind, Expr, Formal, Guard, ProcDecl, Program, VarDecl,
};
use crate::lang::ty::Type;

/// Recursive-descent parser for Fun.
///
/// Consumes lexed `Spanned` tokens and produces a `Program`: global
/// variable declarations followed by procedure and function declarations.
/// Blocks are closed by `.`; `repeat` blocks are closed by `until expr`.
///
/// Comments and newlines carry no meaning and are filtered out in
/// `Parser::new`.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token, used for errors at EOF.
    last_span: Option<Span>,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        let tokens: Vec<Spanned> = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_) | Token::Newline))
            .collect();
        Parser {
            tokens,
            pos: 0,
            last_span: None,
        }
    }

    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Spanned> {
        let token = self.tokens.get(self.pos);
        if let Some(s) = token {
            self.last_span = Some(s.span);
        }
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|s| &s.token)
    }

    /// Span of the current token, falling back to the last consumed one.
    fn span(&self) -> Span {
        self.current()
            .map(|s| s.span)
            .or(self.last_span)
            .unwrap_or(Span { line: 1, col: 1 })
    }

    fn error(&self, message: &str) -> ParserError {
        let span = self.span();
        ParserError {
            message: message.to_string(),
            line: span.line,
            col: span.col,
        }
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn expect(&mut self, token: Token, context: &str) -> Result<(), ParserError> {
        if self.at(&token) {
            self.advance();
            Ok(())
        } else {
            let found = self
                .peek()
                .map_or_else(|| "end of input".to_string(), |t| format!("'{}'", t));
            Err(self.error(&format!("expected '{}' {}, found {}", token, context, found)))
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<String, ParserError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(&format!("expected identifier {}", context))),
        }
    }

    /// Parses a complete program.
    ///
    /// ```text
    /// program := var_decl* proc_decl+ EOF
    /// ```
    pub fn parse(&mut self) -> Result<Program, ParserError> {
        let mut globals = Vec::new();
        while matches!(self.peek(), Some(Token::Int | Token::BoolType)) {
            globals.push(self.parse_var_decl()?);
        }

        let mut procs = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Proc | Token::Func) => procs.push(self.parse_proc_decl()?),
                Some(Token::Eof) | None => break,
                Some(Token::Int | Token::BoolType) => {
                    return Err(self.error("variable declarations must precede procedures"));
                }
                _ => return Err(self.error("expected 'proc' or 'func'")),
            }
        }

        if procs.is_empty() {
            return Err(self.error("expected at least one procedure"));
        }

        Ok(Program { globals, procs })
    }

    fn parse_type(&mut self) -> Result<Type, ParserError> {
        let ty = match self.peek() {
            Some(Token::Int) => Type::Int,
            Some(Token::BoolType) => Type::Bool,
            _ => return Err(self.error("expected type 'int' or 'bool'")),
        };
        self.advance();
        Ok(ty)
    }

    /// ```text
    /// var_decl := type ID "=" expr
    /// ```
    fn parse_var_decl(&mut self) -> Result<VarDecl, ParserError> {
        let span = self.span();
        let ty = self.parse_type()?;
        let name = self.expect_ident("in variable declaration")?;
        self.expect(Token::Assign, "after variable name")?;
        let init = self.parse_expr()?;

        Ok(VarDecl {
            ty,
            name,
            init,
            span,
        })
    }

    /// ```text
    /// proc_decl := "proc" ID "(" formals? ")" ":" var_decl* com* "."
    ///            | "func" type ID "(" formals? ")" ":" var_decl* com* "return" expr "."
    /// ```
    fn parse_proc_decl(&mut self) -> Result<ProcDecl, ParserError> {
        let is_function = self.at(&Token::Func);
        self.advance(); // consume 'proc' / 'func'

        let result_type = if is_function {
            Some(self.parse_type()?)
        } else {
            None
        };

        let span = self.span();
        let name = self.expect_ident("after 'proc' or 'func'")?;

        self.expect(Token::LParen, "after procedure name")?;
        let mut formals = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                let ty = self.parse_type()?;
                let name = self.expect_ident("in parameter list")?;
                formals.push(Formal { ty, name });
                if !self.at(&Token::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::RParen, "after parameters")?;
        self.expect(Token::Colon, "before procedure body")?;

        let mut locals = Vec::new();
        while matches!(self.peek(), Some(Token::Int | Token::BoolType)) {
            locals.push(self.parse_var_decl()?);
        }

        let body = self.parse_coms()?;

        let result = match result_type {
            Some(ty) => {
                self.expect(Token::Return, "at end of function body")?;
                Some((ty, self.parse_expr()?))
            }
            None => None,
        };
        self.expect(Token::Dot, "to close procedure body")?;

        Ok(ProcDecl {
            name,
            formals,
            locals,
            body,
            result,
            span,
        })
    }

    /// Commands until a token that cannot start one.
    fn parse_coms(&mut self) -> Result<Vec<Com>, ParserError> {
        let mut coms = Vec::new();
        while matches!(
            self.peek(),
            Some(Token::Ident(_) | Token::If | Token::While | Token::Repeat | Token::Switch)
        ) {
            coms.push(self.parse_com()?);
        }
        Ok(coms)
    }

    fn parse_com(&mut self) -> Result<Com, ParserError> {
        let span = self.span();

        let kind = match self.peek() {
            Some(Token::Ident(_)) => {
                let name = self.expect_ident("")?;
                match self.peek() {
                    Some(Token::Assign) => {
                        self.advance();
                        let value = self.parse_expr()?;
                        ComKind::Assign { name, value }
                    }
                    Some(Token::LParen) => {
                        let args = self.parse_actuals()?;
                        ComKind::ProcCall { name, args }
                    }
                    _ => return Err(self.error("expected '=' or '(' after identifier")),
                }
            }

            Some(Token::If) => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(Token::Colon, "after 'if' condition")?;
                let then_branch = self.parse_coms()?;

                let else_branch = if self.at(&Token::Else) {
                    self.advance();
                    self.expect(Token::Colon, "after 'else'")?;
                    Some(self.parse_coms()?)
                } else {
                    None
                };
                self.expect(Token::Dot, "to close 'if'")?;

                ComKind::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }

            Some(Token::While) => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(Token::Colon, "after 'while' condition")?;
                let body = self.parse_coms()?;
                self.expect(Token::Dot, "to close 'while'")?;
                ComKind::While { cond, body }
            }

            Some(Token::Repeat) => {
                self.advance();
                self.expect(Token::Colon, "after 'repeat'")?;
                let body = self.parse_coms()?;
                self.expect(Token::Until, "to close 'repeat'")?;
                let cond = self.parse_expr()?;
                ComKind::RepeatUntil { body, cond }
            }

            Some(Token::Switch) => self.parse_switch()?,

            _ => return Err(self.error("expected command")),
        };

        Ok(Com { kind, span })
    }

    /// ```text
    /// "switch" expr ":" ("case" guard ":" com*)* "default" ":" com* "."
    /// ```
    fn parse_switch(&mut self) -> Result<ComKind, ParserError> {
        self.advance(); // consume 'switch'
        let scrutinee = self.parse_expr()?;
        self.expect(Token::Colon, "after 'switch' expression")?;

        let mut cases = Vec::new();
        while self.at(&Token::Case) {
            let span = self.span();
            self.advance();
            let guard = self.parse_guard()?;
            self.expect(Token::Colon, "after case guard")?;
            let body = self.parse_coms()?;
            cases.push(Case { guard, body, span });
        }

        self.expect(Token::Default, "after switch cases")?;
        self.expect(Token::Colon, "after 'default'")?;
        let default = self.parse_coms()?;
        self.expect(Token::Dot, "to close 'switch'")?;

        Ok(ComKind::Switch {
            scrutinee,
            cases,
            default,
        })
    }

    fn parse_guard(&mut self) -> Result<Guard, ParserError> {
        match self.peek() {
            Some(Token::Bool(b)) => {
                let b = *b;
                self.advance();
                Ok(Guard::Bool(b))
            }
            Some(Token::Integer(_) | Token::Minus) => {
                let low = self.parse_int_literal()?;
                if self.at(&Token::DotDot) {
                    self.advance();
                    let high = self.parse_int_literal()?;
                    Ok(Guard::Range { low, high })
                } else {
                    Ok(Guard::Int(low))
                }
            }
            _ => Err(self.error("expected literal or range in case guard")),
        }
    }

    /// `"-"? NUM`
    fn parse_int_literal(&mut self) -> Result<i64, ParserError> {
        let negative = self.at(&Token::Minus);
        if negative {
            self.advance();
        }

        match self.peek() {
            Some(Token::Integer(n)) => {
                let n = *n;
                self.advance();
                Ok(if negative { -n } else { n })
            }
            _ => Err(self.error("expected integer literal")),
        }
    }

    /// `"(" (expr ("," expr)*)? ")"`
    fn parse_actuals(&mut self) -> Result<Vec<Expr>, ParserError> {
        self.expect(Token::LParen, "before arguments")?;
        let mut args = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.at(&Token::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::RParen, "after arguments")?;
        Ok(args)
    }

    /// ```text
    /// expr := sum (("==" | "<" | ">") sum)?
    /// ```
    fn parse_expr(&mut self) -> Result<Expr, ParserError> {
        let lhs = self.parse_sum()?;

        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Gt) => BinOp::Gt,
            _ => return Ok(lhs),
        };
        self.advance();

        let rhs = self.parse_sum()?;
        Ok(Expr::binary(op, lhs, rhs))
    }

    fn parse_sum(&mut self) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_prim()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_prim()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_prim(&mut self) -> Result<Expr, ParserError> {
        match self.peek() {
            Some(Token::Integer(_)) => Ok(Expr::Int(self.parse_int_literal()?)),
            Some(Token::Minus) if matches!(self.peek_next(), Some(Token::Integer(_))) => {
                Ok(Expr::Int(self.parse_int_literal()?))
            }
            Some(Token::Bool(b)) => {
                let b = *b;
                self.advance();
                Ok(Expr::Bool(b))
            }
            Some(Token::Ident(_)) => {
                let name = self.expect_ident("")?;
                if self.at(&Token::LParen) {
                    let args = self.parse_actuals()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(Token::Not) => {
                self.advance();
                let inner = self.parse_prim()?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(Token::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(Token::RParen, "to close parenthesised expression")?;
                Ok(expr)
            }
            _ => Err(self.error("expected expression")),
        }
    }
}
