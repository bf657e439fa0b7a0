use thiserror::Error;

use crate::frontend::lexer::Span;

/// A scope or type violation, located at the enclosing command or
/// declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{col}: {message}")]
pub struct CheckError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl CheckError {
    pub fn at(span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }
}

/// Every error found in one program, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} check error(s), first at {}", .0.len(), first_location(.0))]
pub struct CheckErrors(pub Vec<CheckError>);

fn first_location(errors: &[CheckError]) -> String {
    errors
        .first()
        .map_or_else(|| "?".to_string(), |e| format!("{}:{}", e.line, e.col))
}

impl CheckErrors {
    pub fn iter(&self) -> impl Iterator<Item = &CheckError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
