use std::collections::BTreeSet;

use thiserror::Error;

use crate::bytecode::disasm::{DecodeError, Instruction, decode};
use crate::bytecode::ir::CodeImage;
use crate::bytecode::op::{IO_BASE, Opcode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("verify error: {0}")]
    Decode(#[from] DecodeError),

    #[error("verify error: {op} at offset {offset} targets {target}, which is not an instruction")]
    BadTarget {
        offset: usize,
        op: &'static str,
        target: i16,
    },

    #[error("verify error: main entry {main} is not an instruction")]
    BadEntry { main: u16 },
}

/// Statically decode a whole image.
///
/// Checks that every byte belongs to a known instruction with complete
/// operands, that every branch lands on an instruction boundary (calls may
/// also land in the I/O range), and that `main` is a boundary.
///
/// This is a linear scan; it does not follow control flow, so unreachable
/// garbage after a HALT is still rejected.
pub fn verify(image: &CodeImage) -> Result<(), VerifyError> {
    let instrs = decode_all(&image.code)?;
    let starts: BTreeSet<usize> = instrs.iter().map(|i| i.offset).collect();

    for instr in &instrs {
        if !instr.op.is_branch() {
            continue;
        }

        let target = instr.operand.unwrap_or_default();
        let in_io = instr.op == Opcode::Call && target >= IO_BASE as i16;

        if !in_io && (target < 0 || !starts.contains(&(target as usize))) {
            return Err(VerifyError::BadTarget {
                offset: instr.offset,
                op: instr.op.mnemonic(),
                target,
            });
        }
    }

    if !image.is_empty() && !starts.contains(&(image.main as usize)) {
        return Err(VerifyError::BadEntry { main: image.main });
    }

    Ok(())
}

fn decode_all(code: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut instrs = Vec::new();
    let mut offset = 0;

    while offset < code.len() {
        let instr = decode(code, offset)?;
        offset = instr.next();
        instrs.push(instr);
    }

    Ok(instrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::buffer::CodeBuffer;
    use crate::bytecode::op::WRITE_OFFSET;

    fn image(buf: CodeBuffer, main: u16) -> CodeImage {
        buf.finish(main).unwrap()
    }

    #[test]
    fn test_valid_image() {
        let mut buf = CodeBuffer::new();
        buf.emit_word(Opcode::Call, 4);
        buf.emit(Opcode::Halt);
        buf.emit_word(Opcode::LoadC, 1);
        buf.emit_word(Opcode::Call, WRITE_OFFSET as i16);
        buf.emit_byte(Opcode::Return, 0);

        assert_eq!(verify(&image(buf, 4)), Ok(()));
    }

    #[test]
    fn test_jump_into_operand_is_rejected() {
        let mut buf = CodeBuffer::new();
        buf.emit_word(Opcode::LoadC, 1);
        buf.emit_word(Opcode::Jump, 1);

        let err = verify(&image(buf, 0)).unwrap_err();
        assert!(matches!(err, VerifyError::BadTarget { target: 1, .. }));
    }

    #[test]
    fn test_jump_into_io_range_is_rejected() {
        let mut buf = CodeBuffer::new();
        buf.emit_word(Opcode::Jump, WRITE_OFFSET as i16);

        assert!(verify(&image(buf, 0)).is_err());
    }

    #[test]
    fn test_unknown_opcode_is_rejected() {
        let img = CodeImage {
            code: vec![16, 5],
            main: 0,
        };

        let err = verify(&img).unwrap_err();
        assert_eq!(
            err,
            VerifyError::Decode(DecodeError::UnknownOpcode { offset: 1, byte: 5 })
        );
    }

    #[test]
    fn test_bad_entry() {
        let mut buf = CodeBuffer::new();
        buf.emit_word(Opcode::LoadC, 1);

        let err = verify(&image(buf, 2)).unwrap_err();
        assert_eq!(err, VerifyError::BadEntry { main: 2 });
    }
}
