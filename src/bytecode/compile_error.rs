use thiserror::Error;

/// Failures while encoding a checked program.
///
/// Apart from `Object`, these indicate that the checker let through a tree
/// the encoder cannot handle, or that a fixed capacity was exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("compile error: internal error: '{name}' has no address")]
    Undefined { name: String },

    #[error("compile error: '{name}' is not a procedure or function")]
    NotCallable { name: String },

    #[error("compile error: program has no 'main' procedure")]
    MissingMain,

    #[error("compile error: literal {value} does not fit in a 16-bit operand")]
    LiteralOutOfRange { value: i64 },

    #[error("compile error: code image of {size} bytes reaches the reserved I/O range")]
    CodeTooLarge { size: usize },

    #[error("compile error: too many {kind} variables ({count})")]
    TooManyVariables { kind: &'static str, count: usize },

    #[error("compile error: jump placeholder at offset {offset} was never bound")]
    UnresolvedLabel { offset: usize },

    #[error("compile error: malformed object file: {0}")]
    Object(String),

    #[error("compile error: internal error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn undefined(name: &str) -> Self {
        CompileError::Undefined {
            name: name.to_string(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }
}
