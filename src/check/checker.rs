use tracing::debug;

use crate::check::check_error::{CheckError, CheckErrors};
use crate::frontend::lexer::Span;
use crate::lang::node::{Com, ComKind, Expr, Guard, ProcDecl, Program, VarDecl};
use crate::lang::symbol_table::{Scope, SymbolTable};
use crate::lang::ty::Type;

/// Smallest and largest value a `LOADC` operand can carry.
const LITERAL_MIN: i64 = i16::MIN as i64;
const LITERAL_MAX: i64 = i16::MAX as i64;

/// Scope and type checker.
///
/// Walks the tree once with a `SymbolTable<Type>` and records every
/// violation instead of stopping at the first. A sub-expression that
/// already failed gets `Type::Error`, which is compatible with everything,
/// so each mistake is reported once.
#[derive(Debug, Default)]
pub struct Checker {
    errors: Vec<CheckError>,
}

/// Check a whole program.
pub fn check(program: &Program) -> Result<(), CheckErrors> {
    let mut checker = Checker::default();
    checker.check_program(program);

    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(CheckErrors(checker.errors))
    }
}

impl Checker {
    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(CheckError::at(span, message));
    }

    fn check_program(&mut self, program: &Program) {
        let mut table = SymbolTable::new();
        table.define("read", Type::mapping(Type::Void, Type::Int));
        table.define("write", Type::mapping(Type::Int, Type::Void));

        for decl in &program.globals {
            self.var_decl(&mut table, decl);
        }

        for decl in &program.procs {
            self.proc_decl(&mut table, decl);
        }

        match table.lookup("main") {
            None => self.error(Span { line: 1, col: 1 }, "no procedure 'main' declared"),
            Some(ty) if *ty != Type::mapping(Type::Void, Type::Void) => {
                let span = program
                    .procs
                    .iter()
                    .find(|p| p.name == "main")
                    .map_or(Span { line: 1, col: 1 }, |p| p.span);
                let message = format!("'main' must have type void -> void, found {}", ty);
                self.error(span, message);
            }
            Some(_) => {}
        }

        debug!(errors = self.errors.len(), "check finished");
    }

    fn var_decl(&mut self, names: &mut impl Scope<Type>, decl: &VarDecl) {
        let actual = self.expr(&*names, &decl.init, decl.span);
        self.expect_type(decl.span, &decl.ty, &actual, "initialiser");

        if !names.define(&decl.name, decl.ty.clone()) {
            self.error(decl.span, format!("'{}' is redeclared", decl.name));
        }
    }

    fn proc_decl(&mut self, table: &mut SymbolTable<Type>, decl: &ProcDecl) {
        let domain = Type::params(decl.formals.iter().map(|f| f.ty.clone()).collect());
        let range = decl
            .result
            .as_ref()
            .map_or(Type::Void, |(ty, _)| ty.clone());

        // Defined before the body so the procedure may call itself.
        if !table.define(&decl.name, Type::mapping(domain, range)) {
            self.error(decl.span, format!("'{}' is redeclared", decl.name));
        }

        let mut scope = table.enter_local();

        for formal in &decl.formals {
            if !scope.define(&formal.name, formal.ty.clone()) {
                let message = format!("parameter '{}' is redeclared", formal.name);
                self.error(decl.span, message);
            }
        }

        for local in &decl.locals {
            self.var_decl(&mut scope, local);
        }

        self.coms(&mut scope, &decl.body);

        if let Some((ty, expr)) = &decl.result {
            let actual = self.expr(&scope, expr, decl.span);
            self.expect_type(decl.span, ty, &actual, "result");
        }

        scope.exit();
    }

    fn coms(&mut self, names: &mut impl Scope<Type>, coms: &[Com]) {
        for com in coms {
            self.com(names, com);
        }
    }

    fn com(&mut self, names: &mut impl Scope<Type>, com: &Com) {
        let span = com.span;

        match &com.kind {
            ComKind::Assign { name, value } => {
                let actual = self.expr(&*names, value, span);
                match names.lookup(name).cloned() {
                    None => self.error(span, format!("'{}' is not declared", name)),
                    Some(Type::Mapping { .. }) => {
                        self.error(span, format!("cannot assign to procedure '{}'", name))
                    }
                    Some(target) => self.expect_type(span, &target, &actual, "assignment"),
                }
            }

            ComKind::ProcCall { name, args } => {
                if let Some(range) = self.call(&*names, name, args, span) {
                    if !range.equiv(&Type::Void) {
                        let message =
                            format!("'{}' returns {}; use it in an expression", name, range);
                        self.error(span, message);
                    }
                }
            }

            ComKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.condition(&*names, cond, span, "if");
                self.coms(names, then_branch);
                if let Some(else_branch) = else_branch {
                    self.coms(names, else_branch);
                }
            }

            ComKind::While { cond, body } => {
                self.condition(&*names, cond, span, "while");
                self.coms(names, body);
            }

            ComKind::RepeatUntil { body, cond } => {
                self.coms(names, body);
                self.condition(&*names, cond, span, "until");
            }

            ComKind::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let ty = self.expr(&*names, scrutinee, span);
                if !matches!(ty, Type::Int | Type::Bool | Type::Error) {
                    self.error(span, format!("cannot switch on a value of type {}", ty));
                }

                for case in cases {
                    self.guard(&ty, case.guard, case.span);
                    self.coms(names, &case.body);
                }
                self.coms(names, default);
            }
        }
    }

    fn guard(&mut self, scrutinee: &Type, guard: Guard, span: Span) {
        let ty = match guard {
            Guard::Bool(_) => Type::Bool,
            Guard::Int(value) => {
                self.literal(value, span);
                Type::Int
            }
            Guard::Range { low, high } => {
                // Encoded as `> low-1` and `< high+1`.
                if low <= LITERAL_MIN || high >= LITERAL_MAX {
                    let message = format!(
                        "range bounds must lie within {}..{}",
                        LITERAL_MIN + 1,
                        LITERAL_MAX - 1
                    );
                    self.error(span, message);
                } else if low > high {
                    self.error(span, format!("empty range {}..{}", low, high));
                }
                Type::Int
            }
        };

        if !ty.equiv(scrutinee) {
            let message = format!(
                "case guard has type {}, switch expression has type {}",
                ty, scrutinee
            );
            self.error(span, message);
        }
    }

    fn condition(&mut self, names: &impl Scope<Type>, cond: &Expr, span: Span, keyword: &str) {
        let ty = self.expr(names, cond, span);
        if !ty.equiv(&Type::Bool) {
            let message = format!("'{}' condition must be bool, found {}", keyword, ty);
            self.error(span, message);
        }
    }

    fn literal(&mut self, value: i64, span: Span) {
        if !(LITERAL_MIN..=LITERAL_MAX).contains(&value) {
            let message = format!(
                "integer literal {} does not fit in {}..{}",
                value, LITERAL_MIN, LITERAL_MAX
            );
            self.error(span, message);
        }
    }

    fn expect_type(&mut self, span: Span, expected: &Type, actual: &Type, what: &str) {
        if !actual.equiv(expected) {
            let message = format!("{} has type {}, expected {}", what, actual, expected);
            self.error(span, message);
        }
    }

    /// Check a call and return the callee's result type, or `None` if the
    /// callee itself is unusable.
    fn call(
        &mut self,
        names: &impl Scope<Type>,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> Option<Type> {
        let actuals: Vec<Type> = args.iter().map(|a| self.expr(names, a, span)).collect();

        let (domain, range) = match names.lookup(name) {
            None => {
                self.error(span, format!("'{}' is not declared", name));
                return None;
            }
            Some(Type::Mapping { domain, range }) => ((**domain).clone(), (**range).clone()),
            Some(_) => {
                self.error(span, format!("'{}' is not a procedure", name));
                return None;
            }
        };

        let formals = match domain {
            Type::Void => Vec::new(),
            Type::Sequence(types) => types,
            single => vec![single],
        };

        if formals.len() != actuals.len() {
            let message = format!(
                "'{}' expects {} argument(s), found {}",
                name,
                formals.len(),
                actuals.len()
            );
            self.error(span, message);
        } else {
            for (i, (formal, actual)) in formals.iter().zip(&actuals).enumerate() {
                if !actual.equiv(formal) {
                    let message = format!(
                        "argument {} of '{}' has type {}, expected {}",
                        i + 1,
                        name,
                        actual,
                        formal
                    );
                    self.error(span, message);
                }
            }
        }

        Some(range)
    }

    fn expr(&mut self, names: &impl Scope<Type>, expr: &Expr, span: Span) -> Type {
        match expr {
            Expr::Int(value) => {
                self.literal(*value, span);
                Type::Int
            }

            Expr::Bool(_) => Type::Bool,

            Expr::Var(name) => match names.lookup(name) {
                None => {
                    self.error(span, format!("'{}' is not declared", name));
                    Type::Error
                }
                Some(Type::Mapping { .. }) => {
                    self.error(span, format!("procedure '{}' used as a value", name));
                    Type::Error
                }
                Some(ty) => ty.clone(),
            },

            Expr::Call { name, args } => match self.call(names, name, args, span) {
                None => Type::Error,
                Some(Type::Void) => {
                    self.error(span, format!("procedure '{}' has no result", name));
                    Type::Error
                }
                Some(range) => range,
            },

            Expr::Not(inner) => {
                let ty = self.expr(names, inner, span);
                self.expect_type(span, &Type::Bool, &ty, "operand of 'not'");
                Type::Bool
            }

            Expr::Binary { op, lhs, rhs } => {
                let l = self.expr(names, lhs, span);
                let r = self.expr(names, rhs, span);

                for ty in [&l, &r] {
                    if !ty.equiv(&Type::Int) {
                        let message = format!(
                            "operand of '{}' has type {}, expected int",
                            op.symbol(),
                            ty
                        );
                        self.error(span, message);
                    }
                }

                if op.is_comparison() { Type::Bool } else { Type::Int }
            }
        }
    }
}
