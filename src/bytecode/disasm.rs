use std::collections::BTreeSet;

use thiserror::Error;

use crate::bytecode::ir::CodeImage;
use crate::bytecode::op::{IO_BASE, Opcode, Operand, READ_OFFSET, WRITE_OFFSET};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {byte} at offset {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },

    #[error("{op} at offset {offset} is missing operand bytes")]
    Truncated { offset: usize, op: Opcode },

    #[error("offset {offset} is outside the code image")]
    OutOfRange { offset: usize },
}

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub op: Opcode,
    /// Byte operands are sign-extended into the same field.
    pub operand: Option<i16>,
}

impl Instruction {
    /// Offset of the following instruction.
    pub fn next(&self) -> usize {
        self.offset + self.op.width()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operand {
            Some(operand) => write!(f, "{:6}: {:<8}{}", self.offset, self.op, operand),
            None => write!(f, "{:6}: {}", self.offset, self.op),
        }
    }
}

/// Decode the instruction starting at `offset`.
pub fn decode(code: &[u8], offset: usize) -> Result<Instruction, DecodeError> {
    let Some(&byte) = code.get(offset) else {
        return Err(DecodeError::OutOfRange { offset });
    };
    let op = Opcode::try_from(byte).map_err(|_| DecodeError::UnknownOpcode { offset, byte })?;

    let operand_bytes = code
        .get(offset + 1..offset + op.width())
        .ok_or(DecodeError::Truncated { offset, op })?;

    let operand = match op.operand() {
        Operand::None => None,
        Operand::Byte => Some(operand_bytes[0] as i8 as i16),
        Operand::Word => Some(i16::from_be_bytes([operand_bytes[0], operand_bytes[1]])),
    };

    Ok(Instruction {
        offset,
        op,
        operand,
    })
}

/// Textual form of the instruction at `offset`: `offset: MNEMONIC operand`.
///
/// Undecodable bytes are rendered as `???` rather than failing, so a trace
/// can show exactly where a machine went wrong.
pub fn show_instruction(code: &[u8], offset: usize) -> String {
    match decode(code, offset) {
        Ok(instr) => instr.to_string(),
        Err(DecodeError::UnknownOpcode { byte, .. }) => format!("{:6}: {:<8}{}", offset, "???", byte),
        Err(DecodeError::Truncated { op, .. }) => format!("{:6}: {:<8}<truncated>", offset, op),
        Err(DecodeError::OutOfRange { .. }) => format!("{:6}: <end of code>", offset),
    }
}

/// One line per instruction, walking the image by fixed instruction widths.
pub fn disassemble(code: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut offset = 0;

    while offset < code.len() {
        lines.push(show_instruction(code, offset));
        offset += match decode(code, offset) {
            Ok(instr) => instr.op.width(),
            Err(DecodeError::UnknownOpcode { .. }) => 1,
            Err(_) => code.len() - offset,
        };
    }

    lines
}

/// Print an annotated listing of a whole image.
///
/// Jump and call targets get a marker; calls into the I/O range are
/// labelled with the routine name.
pub fn print_image(image: &CodeImage) {
    let targets = collect_branch_targets(&image.code);

    println!("════════════════════════════════════════");
    println!(" object code: {} bytes, main at {}", image.len(), image.main);
    println!("════════════════════════════════════════");

    for line in annotate(&image.code, &targets) {
        println!("{}", line);
    }
}

fn annotate(code: &[u8], targets: &BTreeSet<usize>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut offset = 0;

    while offset < code.len() {
        let marker = if targets.contains(&offset) { "►" } else { " " };
        let mut line = format!("{} {}", marker, show_instruction(code, offset));

        match decode(code, offset) {
            Ok(instr) => {
                if let (Opcode::Call, Some(target)) = (instr.op, instr.operand) {
                    match target as u16 {
                        READ_OFFSET => line.push_str("   ; read"),
                        WRITE_OFFSET => line.push_str("   ; write"),
                        _ => {}
                    }
                }
                offset = instr.next();
            }
            Err(_) => {
                lines.push(line);
                break;
            }
        }

        lines.push(line);
    }

    lines
}

fn collect_branch_targets(code: &[u8]) -> BTreeSet<usize> {
    let mut targets = BTreeSet::new();
    let mut offset = 0;

    while offset < code.len() {
        let Ok(instr) = decode(code, offset) else {
            break;
        };

        if let (true, Some(target)) = (instr.op.is_branch(), instr.operand) {
            if target >= 0 && target < IO_BASE as i16 {
                targets.insert(target as usize);
            }
        }

        offset = instr.next();
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::buffer::CodeBuffer;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<u8> {
        let mut buf = CodeBuffer::new();
        buf.emit_word(Opcode::LoadC, 7);
        buf.emit_word(Opcode::StoreG, 0);
        buf.emit_word(Opcode::Call, 8);
        buf.emit(Opcode::Halt);
        buf.emit_byte(Opcode::CopyArg, 1);
        buf.emit_byte(Opcode::Return, 0);
        buf.code().to_vec()
    }

    #[test]
    fn test_one_line_per_instruction() {
        let lines = disassemble(&sample());

        assert_eq!(
            lines,
            vec![
                "     0: LOADC   7",
                "     3: STOREG  0",
                "     6: CALL    8",
                "     9: HALT",
                "    10: COPYARG 1",
                "    12: RETURN  0",
            ]
        );
    }

    #[test]
    fn test_negative_operands() {
        let mut buf = CodeBuffer::new();
        buf.emit_word(Opcode::LoadC, -300);
        buf.emit_byte(Opcode::Return, -1);

        let lines = disassemble(buf.code());
        assert_eq!(lines[0], "     0: LOADC   -300");
        assert_eq!(lines[1], "     3: RETURN  -1");
    }

    #[test]
    fn test_unknown_opcode_is_shown() {
        let lines = disassemble(&[16, 99, 16]);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("???"));
        assert!(lines[1].contains("99"));
    }

    #[test]
    fn test_truncated_operand() {
        let err = decode(&[4, 0], 0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                offset: 0,
                op: Opcode::LoadC
            }
        );

        let lines = disassemble(&[4, 0]);
        assert_eq!(lines, vec!["     0: LOADC   <truncated>"]);
    }

    #[test]
    fn test_branch_targets_skip_io() {
        let mut buf = CodeBuffer::new();
        buf.emit_word(Opcode::Call, WRITE_OFFSET as i16);
        buf.emit_word(Opcode::Jump, 0);

        let targets = collect_branch_targets(buf.code());
        assert_eq!(targets.into_iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_annotate_marks_targets_and_io() {
        let mut buf = CodeBuffer::new();
        buf.emit_word(Opcode::Call, READ_OFFSET as i16);
        buf.emit_word(Opcode::Jump, 0);

        let targets = collect_branch_targets(buf.code());
        let lines = annotate(buf.code(), &targets);

        assert!(lines[0].starts_with('►'));
        assert!(lines[0].ends_with("; read"));
        assert!(lines[1].starts_with(' '));
    }

    #[test]
    fn test_annotate_keeps_undecodable_byte() {
        let code = [16, 99, 16];
        let lines = annotate(&code, &BTreeSet::new());

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "       0: HALT");
        assert_eq!(lines[1], "       1: ???     99");
    }
}
