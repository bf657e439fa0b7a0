use std::collections::BTreeSet;

use tracing::trace;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::CodeImage;
use crate::bytecode::op::{IO_BASE, Opcode, Operand};

/// A reserved 2-byte jump operand waiting for its target.
///
/// Labels are consumed by [`CodeBuffer::bind`]; one that is dropped unbound
/// makes [`CodeBuffer::finish`] fail.
#[must_use = "a forward jump must be bound to its target"]
#[derive(Debug, PartialEq, Eq)]
pub struct Label {
    offset: usize,
}

impl Label {
    /// Offset of the jump instruction that owns this placeholder.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Append-only instruction stream with operand patching.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    code: Vec<u8>,
    unbound: BTreeSet<usize>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next emitted instruction will occupy.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Emit an instruction without operand.
    pub fn emit(&mut self, op: Opcode) {
        debug_assert_eq!(op.operand(), Operand::None, "{} takes an operand", op);
        self.code.push(op.into());
    }

    /// Emit an instruction with a signed 1-byte operand.
    pub fn emit_byte(&mut self, op: Opcode, operand: i8) {
        debug_assert_eq!(op.operand(), Operand::Byte, "{} takes no byte operand", op);
        self.code.push(op.into());
        self.code.push(operand as u8);
    }

    /// Emit an instruction with a big-endian 2-byte operand.
    pub fn emit_word(&mut self, op: Opcode, operand: i16) {
        debug_assert_eq!(op.operand(), Operand::Word, "{} takes no word operand", op);
        self.code.push(op.into());
        self.code.extend_from_slice(&operand.to_be_bytes());
    }

    /// Overwrite the word operand of the instruction at `offset`.
    pub fn patch(&mut self, offset: usize, operand: i16) {
        debug_assert!(
            Opcode::try_from(self.code[offset]).is_ok_and(|op| op.operand() == Operand::Word),
            "patching a non-word instruction at {}",
            offset
        );
        self.code[offset + 1..offset + 3].copy_from_slice(&operand.to_be_bytes());
    }

    /// Emit a branch whose target is not known yet.
    pub fn emit_jump(&mut self, op: Opcode) -> Label {
        debug_assert!(op.is_branch(), "{} is not a branch", op);
        let offset = self.current_offset();
        self.emit_word(op, 0);
        self.unbound.insert(offset);
        Label { offset }
    }

    /// Point `label` at the current offset and return that offset.
    pub fn bind(&mut self, label: Label) -> usize {
        let target = self.current_offset();
        self.bind_to(label, target);
        target
    }

    /// Point `label` at an already known offset.
    pub fn bind_to(&mut self, label: Label, target: usize) {
        trace!(jump = label.offset, target, "bind label");
        self.patch(label.offset, target as i16);
        self.unbound.remove(&label.offset);
    }

    /// Seal the buffer into an executable image.
    pub fn finish(self, main: u16) -> Result<CodeImage, CompileError> {
        if let Some(&offset) = self.unbound.first() {
            return Err(CompileError::UnresolvedLabel { offset });
        }

        if self.code.len() > IO_BASE as usize {
            return Err(CompileError::CodeTooLarge {
                size: self.code.len(),
            });
        }

        Ok(CodeImage {
            code: self.code,
            main,
        })
    }
}
