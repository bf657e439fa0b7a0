use thiserror::Error;

/// Reasons a machine stops in the FAILED state.
///
/// `pc` is always the address of the instruction that failed.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("illegal instruction {byte} at code address {pc}")]
    IllegalInstruction { pc: usize, byte: u8 },

    #[error("code address {pc} is outside the code image")]
    CodeOutOfRange { pc: usize },

    #[error("{op} at code address {pc}: data address {addr} is outside the stack")]
    DataOutOfRange {
        pc: usize,
        op: &'static str,
        addr: i64,
    },

    #[error("stack overflow at code address {pc} (capacity {capacity} words)")]
    StackOverflow { pc: usize, capacity: usize },

    #[error("stack underflow at code address {pc}")]
    StackUnderflow { pc: usize },

    #[error("division by zero at code address {pc}")]
    DivisionByZero { pc: usize },

    #[error("{op} at code address {pc} has invalid operand {operand}")]
    BadOperand {
        pc: usize,
        op: &'static str,
        operand: i16,
    },

    #[error("read: expected an integer, found '{token}'")]
    InvalidInput { token: String },

    #[error("read: unexpected end of input")]
    EndOfInput,

    #[error("execution step limit exceeded ({limit})")]
    StepLimit { limit: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
