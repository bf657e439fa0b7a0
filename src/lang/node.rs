//! Abstract syntax tree for Fun.
//!
//! The front end builds it, the checker validates it, and the encoder walks
//! it exactly once. Expressions carry no spans of their own; errors inside
//! an expression are reported at the enclosing command or declaration.

use crate::frontend::lexer::Span;
use crate::lang::ty::Type;

/// A whole program: global variables first, then procedures/functions.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub globals: Vec<VarDecl>,
    pub procs: Vec<ProcDecl>,
}

/// `int x = expr` / `bool b = expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ty: Type,
    pub name: String,
    pub init: Expr,
    pub span: Span,
}

/// A formal parameter: `int n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formal {
    pub ty: Type,
    pub name: String,
}

/// `proc` or `func` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcDecl {
    pub name: String,
    pub formals: Vec<Formal>,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Com>,
    /// `Some((type, expr))` for a function: declared result type and the
    /// expression after `return`.
    pub result: Option<(Type, Expr)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Com {
    pub kind: ComKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComKind {
    /// `x = expr`
    Assign { name: String, value: Expr },

    /// `p(args)`
    ProcCall { name: String, args: Vec<Expr> },

    /// `if cond: ... [else: ...] .`
    If {
        cond: Expr,
        then_branch: Vec<Com>,
        else_branch: Option<Vec<Com>>,
    },

    /// `while cond: ... .`
    While { cond: Expr, body: Vec<Com> },

    /// `repeat: ... until cond`; the body runs at least once.
    RepeatUntil { body: Vec<Com>, cond: Expr },

    /// `switch expr: case g: ... default: ... .`
    Switch {
        scrutinee: Expr,
        cases: Vec<Case>,
        default: Vec<Com>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub guard: Guard,
    pub body: Vec<Com>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Int(i64),
    Bool(bool),
    /// Inclusive on both ends.
    Range { low: i64, high: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Var(String),
    Call { name: String, args: Vec<Expr> },
    Not(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Lt | BinOp::Gt)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Eq => "==",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

/// Deepest nesting of `switch` commands in `coms`.
pub fn switch_depth(coms: &[Com]) -> usize {
    coms.iter()
        .map(|com| match &com.kind {
            ComKind::Switch { cases, default, .. } => {
                let inner = cases
                    .iter()
                    .map(|case| switch_depth(&case.body))
                    .chain(std::iter::once(switch_depth(default)))
                    .max()
                    .unwrap_or(0);
                1 + inner
            }
            ComKind::If {
                then_branch,
                else_branch,
                ..
            } => switch_depth(then_branch).max(else_branch.as_deref().map_or(0, switch_depth)),
            ComKind::While { body, .. } | ComKind::RepeatUntil { body, .. } => switch_depth(body),
            ComKind::Assign { .. } | ComKind::ProcCall { .. } => 0,
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn com(kind: ComKind) -> Com {
        Com {
            kind,
            span: Span { line: 1, col: 1 },
        }
    }

    fn switch(default: Vec<Com>) -> Com {
        com(ComKind::Switch {
            scrutinee: Expr::Int(1),
            cases: vec![],
            default,
        })
    }

    #[test]
    fn test_switch_depth_flat() {
        let body = vec![com(ComKind::Assign {
            name: "x".to_string(),
            value: Expr::Int(1),
        })];
        assert_eq!(switch_depth(&body), 0);
    }

    #[test]
    fn test_switch_depth_nested_through_loops() {
        let inner = switch(vec![]);
        let looped = com(ComKind::While {
            cond: Expr::Bool(true),
            body: vec![inner],
        });
        let outer = switch(vec![looped]);

        assert_eq!(switch_depth(&[outer, switch(vec![])]), 2);
    }

    #[test]
    fn test_binop_classification() {
        assert!(BinOp::Lt.is_comparison());
        assert!(!BinOp::Div.is_comparison());
        assert_eq!(BinOp::Eq.symbol(), "==");
    }
}
