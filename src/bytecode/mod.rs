pub mod buffer;
pub mod compile_error;
pub mod disasm;
pub mod encode;
pub mod ir;
pub mod op;
pub mod verify;

pub use buffer::{CodeBuffer, Label};
pub use compile_error::CompileError;
pub use encode::Encoder;
pub use ir::{Address, CodeImage, Locale};
pub use op::Opcode;
