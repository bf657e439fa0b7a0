use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use tracing::{debug, trace};

use crate::bytecode::disasm::{DecodeError, Instruction, decode};
use crate::bytecode::ir::CodeImage;
use crate::bytecode::op::{IO_BASE, Opcode, READ_OFFSET, WRITE_OFFSET};
use crate::runtime::runtime_error::RuntimeError;

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Data stack size in words.
    pub stack_capacity: usize,
    pub max_steps: Option<usize>,
    /// Write every instruction to the output before executing it.
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_capacity: 32_768,
            max_steps: None,
            trace: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
    Failed,
}

/// Simple stack machine.
///
/// The data stack is a fixed block of `stack_capacity` words. Globals sit
/// at the bottom, addressed from 0; each call builds a frame
///
/// ```text
/// fp+0   dynamic link (caller's fp)
/// fp+1   return address
/// fp+2.. arguments, then locals
/// ```
///
/// and locals are addressed relative to `fp`. `sp` is the first free slot.
pub struct Svm {
    code: Vec<u8>,
    data: Vec<i32>,
    pc: usize,
    sp: usize,
    fp: usize,
    status: Status,
    config: VmConfig,
    /// Address of the instruction being executed.
    current: usize,
    /// Number of active (non-I/O) calls.
    depth: usize,
    steps: usize,
    /// Input words already read but not yet consumed by `read`.
    pending: VecDeque<String>,
}

impl Svm {
    pub fn new(image: &CodeImage) -> Self {
        Self::with_config(image, VmConfig::default())
    }

    pub fn with_config(image: &CodeImage, config: VmConfig) -> Self {
        Self {
            code: image.code.clone(),
            data: vec![0; config.stack_capacity],
            pc: 0,
            sp: 0,
            fp: 0,
            status: Status::Running,
            config,
            current: 0,
            depth: 0,
            steps: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn fp(&self) -> usize {
        self.fp
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Occupied part of the data stack, bottom first.
    pub fn stack(&self) -> &[i32] {
        &self.data[..self.sp]
    }

    pub fn reset(&mut self) {
        self.pc = 0;
        self.sp = 0;
        self.fp = 0;
        self.status = Status::Running;
        self.current = 0;
        self.depth = 0;
        self.steps = 0;
        self.pending.clear();
    }

    /// Run from code address 0 until HALT or a failure.
    pub fn interpret(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), RuntimeError> {
        self.reset();
        debug!(code = self.code.len(), "interpretation started");

        while self.status == Status::Running {
            if let Err(err) = self.step(input, output) {
                self.status = Status::Failed;
                debug!(pc = self.current, steps = self.steps, "machine failed: {}", err);
                return Err(err);
            }
        }

        debug!(steps = self.steps, "machine halted");
        output.flush()?;
        Ok(())
    }

    pub fn interpret_stdio(&mut self) -> Result<(), RuntimeError> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.interpret(&mut stdin.lock(), &mut stdout.lock())
    }

    /// Data stack rendered top-down, one word per line, with a rule under
    /// the dynamic link of every active frame.
    pub fn show_stack(&self) -> String {
        let links = self.frame_bases();
        let mut out = String::new();

        for slot in (0..self.sp).rev() {
            let marker = if slot == self.fp && self.depth > 0 {
                "  <- fp"
            } else {
                ""
            };
            out.push_str(&format!("{:6}: {:>11}{}\n", slot, self.data[slot], marker));
            if links.contains(&slot) {
                out.push_str("        -----------\n");
            }
        }

        out
    }

    /// Return addresses of the active calls, innermost first.
    pub fn backtrace(&self) -> Vec<usize> {
        self.frame_bases()
            .into_iter()
            .filter_map(|base| self.data.get(base + 1))
            .map(|&ra| ra as usize)
            .collect()
    }

    /// Dynamic-link slots of the active frames, innermost first.
    fn frame_bases(&self) -> Vec<usize> {
        let mut bases = Vec::with_capacity(self.depth);
        let mut fp = self.fp;

        for _ in 0..self.depth {
            if fp + 1 >= self.sp {
                break;
            }
            bases.push(fp);
            match usize::try_from(self.data[fp]) {
                Ok(link) => fp = link,
                Err(_) => break,
            }
        }

        bases
    }

    fn check_limits(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::StepLimit { limit: max });
            }
        }

        Ok(())
    }

    fn fetch(&self) -> Result<Instruction, RuntimeError> {
        decode(&self.code, self.pc).map_err(|e| match e {
            DecodeError::UnknownOpcode { offset, byte } => {
                RuntimeError::IllegalInstruction { pc: offset, byte }
            }
            DecodeError::Truncated { offset, .. } | DecodeError::OutOfRange { offset } => {
                RuntimeError::CodeOutOfRange { pc: offset }
            }
        })
    }

    fn step(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), RuntimeError> {
        self.check_limits()?;

        self.current = self.pc;
        let instr = self.fetch()?;
        trace!(sp = self.sp, fp = self.fp, "{}", instr);
        if self.config.trace {
            writeln!(output, "{}", instr)?;
        }

        self.pc = instr.next();
        let w = instr.operand.unwrap_or_default();

        match instr.op {
            Opcode::LoadG => {
                let addr = self.slot(instr.op, w as i64)?;
                self.push(self.data[addr])?;
            }
            Opcode::StoreG => {
                let value = self.pop()?;
                let addr = self.slot(instr.op, w as i64)?;
                self.data[addr] = value;
            }
            Opcode::LoadL => {
                let addr = self.slot(instr.op, self.fp as i64 + w as i64)?;
                self.push(self.data[addr])?;
            }
            Opcode::StoreL => {
                let value = self.pop()?;
                let addr = self.slot(instr.op, self.fp as i64 + w as i64)?;
                self.data[addr] = value;
            }
            Opcode::LoadC => self.push(w as i32)?,

            Opcode::Add => self.binary(i32::wrapping_add)?,
            Opcode::Sub => self.binary(i32::wrapping_sub)?,
            Opcode::Mul => self.binary(i32::wrapping_mul)?,
            Opcode::Div => {
                let w2 = self.pop()?;
                let w1 = self.pop()?;
                if w2 == 0 {
                    return Err(RuntimeError::DivisionByZero { pc: self.current });
                }
                self.push(w1.wrapping_div(w2))?;
            }

            Opcode::CmpEq => self.binary(|a, b| (a == b) as i32)?,
            Opcode::CmpLt => self.binary(|a, b| (a < b) as i32)?,
            Opcode::CmpGt => self.binary(|a, b| (a > b) as i32)?,

            Opcode::Inv => {
                let w = self.pop()?;
                self.push((w == 0) as i32)?;
            }
            Opcode::Inc => {
                let w = self.pop()?;
                self.push(w.wrapping_add(1))?;
            }

            Opcode::Halt => self.status = Status::Halted,

            Opcode::Jump => self.pc = self.target(instr.op, w)?,
            Opcode::JumpF => {
                let target = self.target(instr.op, w)?;
                if self.pop()? == 0 {
                    self.pc = target;
                }
            }
            Opcode::JumpT => {
                let target = self.target(instr.op, w)?;
                if self.pop()? != 0 {
                    self.pc = target;
                }
            }

            Opcode::Call if w >= IO_BASE as i16 => self.io_trap(w as u16, input, output)?,
            Opcode::Call => {
                let target = self.target(instr.op, w)?;
                self.push(self.fp as i32)?;
                self.push(self.pc as i32)?;
                self.fp = self.sp - 2;
                self.pc = target;
                self.depth += 1;
            }

            Opcode::Return => {
                let r = self.count(instr.op, w)?;
                let (link, ret) = self.link_words()?;
                if self.sp < self.fp + 2 + r {
                    return Err(RuntimeError::StackUnderflow { pc: self.current });
                }

                self.data.copy_within(self.sp - r..self.sp, self.fp);
                self.sp = self.fp + r;
                self.fp = link;
                self.pc = ret;
                self.depth = self.depth.saturating_sub(1);
            }

            Opcode::CopyArg => {
                let s = self.count(instr.op, w)?;
                let (link, ret) = self.link_words()?;
                if self.fp < s {
                    return Err(RuntimeError::StackUnderflow { pc: self.current });
                }

                let base = self.fp - s;
                self.data.copy_within(base..self.fp, base + 2);
                self.fp = base;
                self.data[base] = link as i32;
                self.data[base + 1] = ret as i32;
            }
        }

        Ok(())
    }

    fn push(&mut self, value: i32) -> Result<(), RuntimeError> {
        if self.sp >= self.data.len() {
            return Err(RuntimeError::StackOverflow {
                pc: self.current,
                capacity: self.data.len(),
            });
        }
        self.data[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, RuntimeError> {
        if self.sp == 0 {
            return Err(RuntimeError::StackUnderflow { pc: self.current });
        }
        self.sp -= 1;
        Ok(self.data[self.sp])
    }

    fn binary(&mut self, f: impl Fn(i32, i32) -> i32) -> Result<(), RuntimeError> {
        let w2 = self.pop()?;
        let w1 = self.pop()?;
        self.push(f(w1, w2))
    }

    /// An occupied data slot.
    fn slot(&self, op: Opcode, addr: i64) -> Result<usize, RuntimeError> {
        if addr < 0 || addr >= self.sp as i64 {
            return Err(RuntimeError::DataOutOfRange {
                pc: self.current,
                op: op.mnemonic(),
                addr,
            });
        }
        Ok(addr as usize)
    }

    fn target(&self, op: Opcode, w: i16) -> Result<usize, RuntimeError> {
        usize::try_from(w).map_err(|_| RuntimeError::BadOperand {
            pc: self.current,
            op: op.mnemonic(),
            operand: w,
        })
    }

    fn count(&self, op: Opcode, w: i16) -> Result<usize, RuntimeError> {
        self.target(op, w)
    }

    /// Dynamic link and return address of the current frame.
    fn link_words(&self) -> Result<(usize, usize), RuntimeError> {
        if self.fp + 2 > self.sp {
            return Err(RuntimeError::StackUnderflow { pc: self.current });
        }

        let link = self.data[self.fp];
        let ret = self.data[self.fp + 1];
        let link = usize::try_from(link).map_err(|_| RuntimeError::DataOutOfRange {
            pc: self.current,
            op: "link",
            addr: link as i64,
        })?;
        let ret =
            usize::try_from(ret).map_err(|_| RuntimeError::CodeOutOfRange { pc: self.current })?;

        Ok((link, ret))
    }

    fn io_trap(
        &mut self,
        routine: u16,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), RuntimeError> {
        match routine {
            READ_OFFSET => {
                write!(output, "? ")?;
                output.flush()?;
                let value = self.read_int(input)?;
                self.push(value)
            }
            WRITE_OFFSET => {
                let value = self.pop()?;
                writeln!(output, "{}", value)?;
                Ok(())
            }
            _ => Err(RuntimeError::BadOperand {
                pc: self.current,
                op: Opcode::Call.mnemonic(),
                operand: routine as i16,
            }),
        }
    }

    /// Next whitespace-delimited integer from `input`.
    fn read_int(&mut self, input: &mut dyn BufRead) -> Result<i32, RuntimeError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return token
                    .parse()
                    .map_err(|_| RuntimeError::InvalidInput { token });
            }

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Err(RuntimeError::EndOfInput);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::buffer::CodeBuffer;

    fn image(build: impl FnOnce(&mut CodeBuffer)) -> CodeImage {
        let mut buf = CodeBuffer::new();
        build(&mut buf);
        buf.finish(0).unwrap()
    }

    fn run_with_input(image: &CodeImage, input: &str) -> (Svm, Result<(), RuntimeError>, String) {
        let mut vm = Svm::new(image);
        let mut output = Vec::new();
        let result = vm.interpret(&mut input.as_bytes(), &mut output);
        (vm, result, String::from_utf8(output).unwrap())
    }

    fn run(image: &CodeImage) -> (Svm, Result<(), RuntimeError>, String) {
        run_with_input(image, "")
    }

    #[test]
    fn test_arithmetic_and_write() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 7);
            b.emit_word(Opcode::LoadC, 5);
            b.emit(Opcode::Sub);
            b.emit_word(Opcode::LoadC, 3);
            b.emit(Opcode::Mul);
            b.emit(Opcode::Inc);
            b.emit_word(Opcode::Call, WRITE_OFFSET as i16);
            b.emit_word(Opcode::LoadC, -7);
            b.emit_word(Opcode::LoadC, 2);
            b.emit(Opcode::Div);
            b.emit_word(Opcode::Call, WRITE_OFFSET as i16);
            b.emit(Opcode::Halt);
        });

        let (vm, result, out) = run(&img);
        assert!(result.is_ok());
        assert_eq!(vm.status(), Status::Halted);
        assert_eq!(out, "7\n-3\n");
        assert_eq!(vm.sp(), 0);
    }

    #[test]
    fn test_comparisons_and_inv() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 1);
            b.emit_word(Opcode::LoadC, 2);
            b.emit(Opcode::CmpLt);
            b.emit_word(Opcode::LoadC, 1);
            b.emit_word(Opcode::LoadC, 2);
            b.emit(Opcode::CmpGt);
            b.emit_word(Opcode::LoadC, 4);
            b.emit_word(Opcode::LoadC, 4);
            b.emit(Opcode::CmpEq);
            b.emit(Opcode::Inv);
            b.emit(Opcode::Halt);
        });

        let (vm, _, _) = run(&img);
        assert_eq!(vm.stack(), &[1, 0, 0]);
    }

    #[test]
    fn test_arithmetic_wraps() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, i16::MAX);
            b.emit_word(Opcode::LoadC, i16::MAX);
            b.emit(Opcode::Mul);
            b.emit_word(Opcode::LoadC, 4);
            b.emit(Opcode::Mul);
            b.emit(Opcode::Halt);
        });

        let (vm, result, _) = run(&img);
        assert!(result.is_ok());
        let expected = (i16::MAX as i32 * i16::MAX as i32).wrapping_mul(4);
        assert_eq!(vm.stack(), &[expected]);
    }

    #[test]
    fn test_division_by_zero_fails() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 1);
            b.emit_word(Opcode::LoadC, 0);
            b.emit(Opcode::Div);
            b.emit(Opcode::Halt);
        });

        let (vm, result, _) = run(&img);
        assert!(matches!(result, Err(RuntimeError::DivisionByZero { pc: 6 })));
        assert_eq!(vm.status(), Status::Failed);
    }

    #[test]
    fn test_illegal_instruction_fails() {
        let img = CodeImage {
            code: vec![5],
            main: 0,
        };

        let (vm, result, _) = run(&img);
        assert!(matches!(
            result,
            Err(RuntimeError::IllegalInstruction { pc: 0, byte: 5 })
        ));
        assert_eq!(vm.status(), Status::Failed);
    }

    #[test]
    fn test_running_off_the_end_fails() {
        let img = image(|b| b.emit_word(Opcode::LoadC, 1));

        let (_, result, _) = run(&img);
        assert!(matches!(result, Err(RuntimeError::CodeOutOfRange { pc: 3 })));
    }

    #[test]
    fn test_unoccupied_slot_is_out_of_range() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 1);
            b.emit_word(Opcode::LoadG, 1);
            b.emit(Opcode::Halt);
        });

        let (_, result, _) = run(&img);
        assert!(matches!(
            result,
            Err(RuntimeError::DataOutOfRange { addr: 1, .. })
        ));
    }

    #[test]
    fn test_underflow() {
        let img = image(|b| b.emit(Opcode::Add));

        let (_, result, _) = run(&img);
        assert!(matches!(result, Err(RuntimeError::StackUnderflow { pc: 0 })));
    }

    #[test]
    fn test_stack_overflow() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 1);
            b.emit_word(Opcode::Jump, 0);
        });
        let config = VmConfig {
            stack_capacity: 16,
            ..VmConfig::default()
        };

        let mut vm = Svm::with_config(&img, config);
        let result = vm.interpret(&mut "".as_bytes(), &mut Vec::new());
        assert!(matches!(
            result,
            Err(RuntimeError::StackOverflow { capacity: 16, .. })
        ));
        assert_eq!(vm.sp(), 16);
    }

    #[test]
    fn test_step_limit() {
        let img = image(|b| b.emit_word(Opcode::Jump, 0));
        let config = VmConfig {
            max_steps: Some(100),
            ..VmConfig::default()
        };

        let mut vm = Svm::with_config(&img, config);
        let result = vm.interpret(&mut "".as_bytes(), &mut Vec::new());
        assert!(matches!(result, Err(RuntimeError::StepLimit { limit: 100 })));
    }

    #[test]
    fn test_conditional_jumps() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 0); // 0
            b.emit_word(Opcode::JumpF, 10); // 3
            b.emit_word(Opcode::LoadC, 9); // 6
            b.emit(Opcode::Halt); // 9
            b.emit_word(Opcode::LoadC, 1); // 10
            b.emit_word(Opcode::JumpT, 9); // 13
            b.emit(Opcode::Halt); // 16
        });

        let (vm, result, _) = run(&img);
        assert!(result.is_ok());
        assert_eq!(vm.stack(), &[] as &[i32]);
        assert_eq!(vm.pc(), 10);
    }

    /// Caller pushes two arguments and calls a function that returns
    /// a - b using the argument-copy protocol.
    fn call_sub_image() -> CodeImage {
        image(|b| {
            b.emit_word(Opcode::LoadC, 99); // 0: unrelated word below the frame
            b.emit_word(Opcode::LoadC, 10); // 3
            b.emit_word(Opcode::LoadC, 4); // 6
            b.emit_word(Opcode::Call, 13); // 9
            b.emit(Opcode::Halt); // 12
            b.emit_byte(Opcode::CopyArg, 1); // 13
            b.emit_byte(Opcode::CopyArg, 1); // 15
            b.emit_word(Opcode::LoadL, 2); // 17
            b.emit_word(Opcode::LoadL, 3); // 20
            b.emit(Opcode::Sub); // 23
            b.emit_byte(Opcode::Return, 1); // 24
        })
    }

    #[test]
    fn test_frame_balance() {
        let (vm, result, _) = run(&call_sub_image());
        assert!(result.is_ok());

        // One word below the arguments before the call; a function adds one result word.
        assert_eq!(vm.stack(), &[99, 6]);
        assert_eq!(vm.fp(), 0);
    }

    #[test]
    fn test_copyarg_places_link_words_below_arguments() {
        let img = call_sub_image();
        let config = VmConfig {
            max_steps: Some(6),
            ..VmConfig::default()
        };

        // Stop right after both COPYARGs (4 setup steps + 2).
        let mut vm = Svm::with_config(&img, config);
        let result = vm.interpret(&mut "".as_bytes(), &mut Vec::new());
        assert!(matches!(result, Err(RuntimeError::StepLimit { .. })));

        assert_eq!(vm.fp(), 1);
        assert_eq!(vm.stack(), &[99, 0, 12, 10, 4]);
        assert_eq!(vm.backtrace(), vec![12]);
    }

    /// Caller pushes three arguments; the callee moves them all with a
    /// single COPYARG 3 and returns their sum.
    fn copy_three_image() -> CodeImage {
        image(|b| {
            b.emit_word(Opcode::LoadC, 10); // 0
            b.emit_word(Opcode::LoadC, 20); // 3
            b.emit_word(Opcode::LoadC, 30); // 6
            b.emit_word(Opcode::Call, 13); // 9
            b.emit(Opcode::Halt); // 12
            b.emit_byte(Opcode::CopyArg, 3); // 13
            b.emit_word(Opcode::LoadL, 2); // 15
            b.emit_word(Opcode::LoadL, 3); // 18
            b.emit(Opcode::Add); // 21
            b.emit_word(Opcode::LoadL, 4); // 22
            b.emit(Opcode::Add); // 25
            b.emit_byte(Opcode::Return, 1); // 26
        })
    }

    #[test]
    fn test_copyarg_moves_several_arguments_at_once() {
        let img = copy_three_image();
        let config = VmConfig {
            max_steps: Some(5),
            ..VmConfig::default()
        };

        let mut vm = Svm::with_config(&img, config);
        let result = vm.interpret(&mut "".as_bytes(), &mut Vec::new());
        assert!(matches!(result, Err(RuntimeError::StepLimit { .. })));

        assert_eq!(vm.fp(), 0);
        assert_eq!(vm.stack(), &[0, 12, 10, 20, 30]);
        assert_eq!(vm.backtrace(), vec![12]);

        let (vm, result, _) = run(&img);
        assert!(result.is_ok());
        assert_eq!(vm.stack(), &[60]);
        assert_eq!(vm.fp(), 0);
        assert_eq!(vm.steps(), 12);
    }

    #[test]
    fn test_copyarg_zero_leaves_frame_in_place() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 7); // 0
            b.emit_word(Opcode::Call, 7); // 3
            b.emit(Opcode::Halt); // 6
            b.emit_byte(Opcode::CopyArg, 0); // 7
            b.emit_byte(Opcode::Return, 0); // 9
        });
        let config = VmConfig {
            max_steps: Some(3),
            ..VmConfig::default()
        };

        let mut vm = Svm::with_config(&img, config);
        let result = vm.interpret(&mut "".as_bytes(), &mut Vec::new());
        assert!(matches!(result, Err(RuntimeError::StepLimit { .. })));

        assert_eq!(vm.fp(), 1);
        assert_eq!(vm.stack(), &[7, 0, 6]);

        let (vm, result, _) = run(&img);
        assert!(result.is_ok());
        assert_eq!(vm.stack(), &[7]);
        assert_eq!(vm.fp(), 0);
    }

    #[test]
    fn test_procedure_call_leaves_no_words() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 3); // 0
            b.emit_word(Opcode::Call, 7); // 3
            b.emit(Opcode::Halt); // 6
            b.emit_byte(Opcode::CopyArg, 1); // 7
            b.emit_word(Opcode::LoadL, 2); // 9
            b.emit_word(Opcode::Call, WRITE_OFFSET as i16); // 12
            b.emit_byte(Opcode::Return, 0); // 15
        });

        let (vm, result, out) = run(&img);
        assert!(result.is_ok());
        assert_eq!(out, "3\n");
        assert_eq!(vm.sp(), 0);
        assert_eq!(vm.fp(), 0);
    }

    #[test]
    fn test_read_parses_whitespace_delimited_words() {
        let img = image(|b| {
            for _ in 0..3 {
                b.emit_word(Opcode::Call, READ_OFFSET as i16);
            }
            b.emit(Opcode::Halt);
        });

        let (vm, result, out) = run_with_input(&img, "12  -4\n\n 7\n");
        assert!(result.is_ok());
        assert_eq!(vm.stack(), &[12, -4, 7]);
        assert_eq!(out, "? ? ? ");
    }

    #[test]
    fn test_read_failures() {
        let img = image(|b| {
            b.emit_word(Opcode::Call, READ_OFFSET as i16);
            b.emit(Opcode::Halt);
        });

        let (_, result, _) = run_with_input(&img, "");
        assert!(matches!(result, Err(RuntimeError::EndOfInput)));

        let (vm, result, _) = run_with_input(&img, "abc\n");
        assert!(matches!(result, Err(RuntimeError::InvalidInput { token }) if token == "abc"));
        assert_eq!(vm.status(), Status::Failed);
    }

    #[test]
    fn test_trace_writes_each_instruction() {
        let img = image(|b| {
            b.emit_word(Opcode::LoadC, 1);
            b.emit(Opcode::Halt);
        });
        let config = VmConfig {
            trace: true,
            ..VmConfig::default()
        };

        let mut vm = Svm::with_config(&img, config);
        let mut out = Vec::new();
        vm.interpret(&mut "".as_bytes(), &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "     0: LOADC   1\n     3: HALT\n"
        );
    }

    #[test]
    fn test_show_stack_separates_frames() {
        let img = call_sub_image();
        let config = VmConfig {
            max_steps: Some(6),
            ..VmConfig::default()
        };

        let mut vm = Svm::with_config(&img, config);
        let _ = vm.interpret(&mut "".as_bytes(), &mut Vec::new());

        let shown = vm.show_stack();
        let lines: Vec<&str> = shown.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("     4:"));
        assert!(lines[3].ends_with("<- fp"));
        assert_eq!(lines[4].trim(), "-----------");
        assert!(lines[5].starts_with("     0:"));
    }
}
