use tracing::debug;

use crate::bytecode::buffer::CodeBuffer;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::{Address, CodeImage, Locale};
use crate::bytecode::op::{Opcode, READ_OFFSET, WRITE_OFFSET};
use crate::lang::node::{BinOp, Com, ComKind, Expr, Guard, ProcDecl, Program, VarDecl, switch_depth};
use crate::lang::symbol_table::{Scope, SymbolTable};

/// Local offsets 0 and 1 hold the dynamic link and return address.
const FIRST_LOCAL: u16 = 2;

/// Code generator for checked Fun programs.
///
/// Layout of the produced image:
///
/// ```text
/// 0:   <global initialisers>      one pushed word per global
///      LOADC 0                    one per reserved switch slot
///      CALL  main                 patched once main is emitted
///      HALT
///      <procedures and functions, in declaration order>
/// ```
///
/// The tree must already have passed the checker. Inconsistencies it
/// should have caught surface as `CompileError`s, never as panics.
pub struct Encoder {
    code: CodeBuffer,
    addrs: SymbolTable<Address>,
    next_global: u16,
    /// Global slot holding the scrutinee of the switch at each nesting level.
    switch_slots: Vec<u16>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        let mut addrs = SymbolTable::new();
        addrs.define("read", Address::code(READ_OFFSET));
        addrs.define("write", Address::code(WRITE_OFFSET));

        Self {
            code: CodeBuffer::new(),
            addrs,
            next_global: 0,
            switch_slots: Vec::new(),
        }
    }

    pub fn encode_program(mut self, program: &Program) -> Result<CodeImage, CompileError> {
        for decl in &program.globals {
            let offset = alloc(&mut self.next_global, "global")?;
            let mut emitter = Emitter {
                code: &mut self.code,
                names: &mut self.addrs,
                switch_slots: &self.switch_slots,
                depth: 0,
            };
            emitter.var_decl(decl, Address::global(offset))?;
        }

        // Switch scrutinees live in dedicated globals reserved below the
        // first frame, one per nesting level.
        let depth = program
            .procs
            .iter()
            .map(|p| switch_depth(&p.body))
            .max()
            .unwrap_or(0);
        for _ in 0..depth {
            let slot = alloc(&mut self.next_global, "global")?;
            self.code.emit_word(Opcode::LoadC, 0);
            self.switch_slots.push(slot);
        }
        debug!(
            globals = self.next_global,
            switch_slots = depth,
            "global area laid out"
        );

        let call_main = self.code.emit_jump(Opcode::Call);
        self.code.emit(Opcode::Halt);

        for decl in &program.procs {
            self.encode_proc(decl)?;
        }

        let main = match self.addrs.lookup("main") {
            Some(Address {
                locale: Locale::Code,
                offset,
            }) => *offset,
            _ => return Err(CompileError::MissingMain),
        };
        self.code.bind_to(call_main, main as usize);

        debug!(size = self.code.current_offset(), main, "encoding finished");
        self.code.finish(main)
    }

    fn encode_proc(&mut self, decl: &ProcDecl) -> Result<(), CompileError> {
        let entry = self.code.current_offset();
        let entry = u16::try_from(entry).map_err(|_| CompileError::CodeTooLarge { size: entry })?;
        self.addrs.define(&decl.name, Address::code(entry));
        debug!(name = %decl.name, entry, "encoding procedure");

        let mut next_local = FIRST_LOCAL;
        let mut emitter = Emitter {
            code: &mut self.code,
            names: self.addrs.enter_local(),
            switch_slots: &self.switch_slots,
            depth: 0,
        };

        // Each COPYARG moves the link words below one more argument.
        for formal in &decl.formals {
            let offset = alloc(&mut next_local, "local")?;
            emitter.names.define(&formal.name, Address::local(offset));
            emitter.code.emit_byte(Opcode::CopyArg, 1);
        }

        for local in &decl.locals {
            let offset = alloc(&mut next_local, "local")?;
            emitter.var_decl(local, Address::local(offset))?;
        }

        emitter.coms(&decl.body)?;

        match &decl.result {
            Some((_, expr)) => {
                emitter.expr(expr)?;
                emitter.code.emit_byte(Opcode::Return, 1);
            }
            None => emitter.code.emit_byte(Opcode::Return, 0),
        }

        Ok(())
    }
}

fn alloc(next: &mut u16, kind: &'static str) -> Result<u16, CompileError> {
    let offset = *next;
    if offset >= i16::MAX as u16 {
        return Err(CompileError::TooManyVariables {
            kind,
            count: offset as usize + 1,
        });
    }
    *next += 1;
    Ok(offset)
}

fn literal(value: i64) -> Result<i16, CompileError> {
    i16::try_from(value).map_err(|_| CompileError::LiteralOutOfRange { value })
}

/// The LOADC operand for a range bound moved one step outward.
fn range_bound(bound: i64, step: i64) -> Result<i16, CompileError> {
    let value = bound
        .checked_add(step)
        .ok_or(CompileError::LiteralOutOfRange { value: bound })?;
    literal(value)
}

/// Emits commands and expressions against one visible scope: the global
/// table for initialisers, a local scope for procedure bodies.
struct Emitter<'a, S> {
    code: &'a mut CodeBuffer,
    names: S,
    switch_slots: &'a [u16],
    depth: usize,
}

impl<S: Scope<Address>> Emitter<'_, S> {
    fn resolve(&self, name: &str) -> Result<Address, CompileError> {
        self.names
            .lookup(name)
            .copied()
            .ok_or_else(|| CompileError::undefined(name))
    }

    /// The initialiser's value is pushed exactly where the variable lives.
    fn var_decl(&mut self, decl: &VarDecl, addr: Address) -> Result<(), CompileError> {
        self.expr(&decl.init)?;
        self.names.define(&decl.name, addr);
        Ok(())
    }

    fn coms(&mut self, coms: &[Com]) -> Result<(), CompileError> {
        for com in coms {
            self.com(com)?;
        }
        Ok(())
    }

    fn com(&mut self, com: &Com) -> Result<(), CompileError> {
        match &com.kind {
            ComKind::Assign { name, value } => {
                self.expr(value)?;
                let addr = self.resolve(name)?;
                match addr.locale {
                    Locale::Global => self.code.emit_word(Opcode::StoreG, addr.offset as i16),
                    Locale::Local => self.code.emit_word(Opcode::StoreL, addr.offset as i16),
                    Locale::Code => {
                        return Err(CompileError::internal(format!(
                            "cannot assign to procedure '{}'",
                            name
                        )));
                    }
                }
            }

            ComKind::ProcCall { name, args } => self.call(name, args)?,

            ComKind::If {
                cond,
                then_branch,
                else_branch: None,
            } => {
                self.expr(cond)?;
                let skip = self.code.emit_jump(Opcode::JumpF);
                self.coms(then_branch)?;
                self.code.bind(skip);
            }

            ComKind::If {
                cond,
                then_branch,
                else_branch: Some(else_branch),
            } => {
                self.expr(cond)?;
                let to_else = self.code.emit_jump(Opcode::JumpF);
                self.coms(then_branch)?;
                let to_exit = self.code.emit_jump(Opcode::Jump);
                self.code.bind(to_else);
                self.coms(else_branch)?;
                self.code.bind(to_exit);
            }

            ComKind::While { cond, body } => {
                let start = self.code.current_offset();
                self.expr(cond)?;
                let to_exit = self.code.emit_jump(Opcode::JumpF);
                self.coms(body)?;
                self.code.emit_word(Opcode::Jump, start as i16);
                self.code.bind(to_exit);
            }

            ComKind::RepeatUntil { body, cond } => {
                let start = self.code.current_offset();
                self.coms(body)?;
                self.expr(cond)?;
                let to_exit = self.code.emit_jump(Opcode::JumpT);
                self.code.emit_word(Opcode::Jump, start as i16);
                self.code.bind(to_exit);
            }

            ComKind::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let slot = *self.switch_slots.get(self.depth).ok_or_else(|| {
                    CompileError::internal(format!("no switch slot for depth {}", self.depth))
                })? as i16;

                self.expr(scrutinee)?;
                self.code.emit_word(Opcode::StoreG, slot);
                self.depth += 1;

                let mut exits = Vec::with_capacity(cases.len());
                for case in cases {
                    let mut next_case = Vec::with_capacity(2);

                    match case.guard {
                        Guard::Int(value) => {
                            self.code.emit_word(Opcode::LoadG, slot);
                            self.code.emit_word(Opcode::LoadC, literal(value)?);
                            self.code.emit(Opcode::CmpEq);
                            next_case.push(self.code.emit_jump(Opcode::JumpF));
                        }
                        Guard::Bool(value) => {
                            self.code.emit_word(Opcode::LoadG, slot);
                            self.code.emit_word(Opcode::LoadC, value as i16);
                            self.code.emit(Opcode::CmpEq);
                            next_case.push(self.code.emit_jump(Opcode::JumpF));
                        }
                        Guard::Range { low, high } => {
                            self.code.emit_word(Opcode::LoadG, slot);
                            self.code.emit_word(Opcode::LoadC, range_bound(low, -1)?);
                            self.code.emit(Opcode::CmpGt);
                            next_case.push(self.code.emit_jump(Opcode::JumpF));

                            self.code.emit_word(Opcode::LoadG, slot);
                            self.code.emit_word(Opcode::LoadC, range_bound(high, 1)?);
                            self.code.emit(Opcode::CmpLt);
                            next_case.push(self.code.emit_jump(Opcode::JumpF));
                        }
                    }

                    self.coms(&case.body)?;
                    exits.push(self.code.emit_jump(Opcode::Jump));

                    for label in next_case {
                        self.code.bind(label);
                    }
                }

                self.coms(default)?;

                for label in exits {
                    self.code.bind(label);
                }
                self.depth -= 1;
            }
        }

        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<(), CompileError> {
        for arg in args {
            self.expr(arg)?;
        }

        let addr = self.resolve(name)?;
        if addr.locale != Locale::Code {
            return Err(CompileError::NotCallable {
                name: name.to_string(),
            });
        }
        self.code.emit_word(Opcode::Call, addr.offset as i16);
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(value) => self.code.emit_word(Opcode::LoadC, literal(*value)?),
            Expr::Bool(value) => self.code.emit_word(Opcode::LoadC, *value as i16),

            Expr::Var(name) => {
                let addr = self.resolve(name)?;
                match addr.locale {
                    Locale::Global => self.code.emit_word(Opcode::LoadG, addr.offset as i16),
                    Locale::Local => self.code.emit_word(Opcode::LoadL, addr.offset as i16),
                    Locale::Code => {
                        return Err(CompileError::internal(format!(
                            "procedure '{}' used as a value",
                            name
                        )));
                    }
                }
            }

            Expr::Call { name, args } => self.call(name, args)?,

            Expr::Not(inner) => {
                self.expr(inner)?;
                self.code.emit(Opcode::Inv);
            }

            Expr::Binary { op, lhs, rhs } => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                self.code.emit(match op {
                    BinOp::Eq => Opcode::CmpEq,
                    BinOp::Lt => Opcode::CmpLt,
                    BinOp::Gt => Opcode::CmpGt,
                    BinOp::Add => Opcode::Add,
                    BinOp::Sub => Opcode::Sub,
                    BinOp::Mul => Opcode::Mul,
                    BinOp::Div => Opcode::Div,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::disasm::{Instruction, decode, disassemble};
    use crate::bytecode::verify::verify;
    use crate::frontend::parse;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn encode(source: &str) -> CodeImage {
        let program = parse(source).unwrap();
        Encoder::new().encode_program(&program).unwrap()
    }

    fn instructions(code: &[u8]) -> Vec<Instruction> {
        let mut instrs = Vec::new();
        let mut offset = 0;
        while offset < code.len() {
            let instr = decode(code, offset).unwrap();
            offset = instr.next();
            instrs.push(instr);
        }
        instrs
    }

    fn ops(code: &[u8]) -> Vec<Opcode> {
        instructions(code).iter().map(|i| i.op).collect()
    }

    #[test]
    fn test_while_loop_listing() {
        let image = encode(indoc! {"
            int x = 0
            proc main():
                while x < 3:
                    write(x)
                    x = x + 1
                .
            .
        "});

        assert_eq!(image.main, 7);
        assert_eq!(
            disassemble(&image.code),
            vec![
                "     0: LOADC   0",
                "     3: CALL    7",
                "     6: HALT",
                "     7: LOADG   0",
                "    10: LOADC   3",
                "    13: CMPLT",
                "    14: JUMPF   36",
                "    17: LOADG   0",
                "    20: CALL    32767",
                "    23: LOADG   0",
                "    26: LOADC   1",
                "    29: ADD",
                "    30: STOREG  0",
                "    33: JUMP    7",
                "    36: RETURN  0",
            ]
        );
    }

    #[test]
    fn test_if_else_targets() {
        let image = encode(indoc! {"
            proc main():
                if true:
                    write(1)
                else:
                    write(2)
                .
            .
        "});
        let instrs = instructions(&image.code);

        // main: LOADC 1, JUMPF else, LOADC 1, CALL write, JUMP exit,
        //       LOADC 2, CALL write, RETURN 0
        let jumpf = instrs.iter().find(|i| i.op == Opcode::JumpF).unwrap();
        let jump = instrs.iter().find(|i| i.op == Opcode::Jump).unwrap();
        let ret = instrs.iter().find(|i| i.op == Opcode::Return).unwrap();

        assert_eq!(jumpf.operand, Some(jump.next() as i16));
        assert_eq!(jump.operand, Some(ret.offset as i16));
    }

    #[test]
    fn test_if_without_else_skips_then_branch() {
        let image = encode(indoc! {"
            proc main():
                if false:
                    write(1)
                .
                write(2)
            .
        "});
        let instrs = instructions(&image.code);
        let jumpf = instrs.iter().position(|i| i.op == Opcode::JumpF).unwrap();

        // then-branch is LOADC 1, CALL write
        let after_then = instrs[jumpf + 2].next();
        assert_eq!(instrs[jumpf].operand, Some(after_then as i16));
    }

    #[test]
    fn test_repeat_until_exits_past_back_jump() {
        let image = encode(indoc! {"
            proc main():
                repeat:
                    write(1)
                until true
            .
        "});
        let instrs = instructions(&image.code);

        let jumpt = instrs.iter().find(|i| i.op == Opcode::JumpT).unwrap();
        let back = instrs.iter().find(|i| i.op == Opcode::Jump).unwrap();

        assert_eq!(back.operand, Some(image.main as i16));
        assert_eq!(jumpt.operand, Some(back.next() as i16));
    }

    #[test]
    fn test_formals_emit_one_copyarg_each() {
        let image = encode(indoc! {"
            func int add(int a, int b):
                int c = a
                return c + b
            .
            proc main():
                write(add(2, 3))
            .
        "});
        let instrs = instructions(&image.code);

        assert_eq!(
            &ops(&image.code)[2..9],
            &[
                Opcode::CopyArg,
                Opcode::CopyArg,
                Opcode::LoadL,
                Opcode::LoadL,
                Opcode::LoadL,
                Opcode::Add,
                Opcode::Return,
            ]
        );
        // a at 2, b at 3, c at 4
        assert_eq!(instrs[4].operand, Some(2));
        assert_eq!(instrs[5].operand, Some(4));
        assert_eq!(instrs[6].operand, Some(3));
        assert_eq!(instrs[8].operand, Some(1));
    }

    #[test]
    fn test_switch_arms_are_patched() {
        let image = encode(indoc! {"
            proc main():
                switch 5:
                    case 1..3:
                        write(1)
                    case 4:
                        write(2)
                    default:
                        write(3)
                .
            .
        "});
        assert_eq!(verify(&image), Ok(()));

        let instrs = instructions(&image.code);
        let ret = instrs.last().unwrap();
        assert_eq!(ret.op, Opcode::Return);

        // Every arm leaves the switch with a JUMP to its end.
        let exits: Vec<_> = instrs.iter().filter(|i| i.op == Opcode::Jump).collect();
        assert_eq!(exits.len(), 2);
        assert!(exits.iter().all(|j| j.operand == Some(ret.offset as i16)));

        // The range's two tests and the literal's test all fail forward
        // to the start of the next guard.
        let fails: Vec<_> = instrs.iter().filter(|i| i.op == Opcode::JumpF).collect();
        assert_eq!(fails.len(), 3);
        assert_eq!(fails[0].operand, fails[1].operand);
        assert_eq!(fails[0].operand, Some(exits[0].next() as i16));
        assert_eq!(fails[2].operand, Some(exits[1].next() as i16));

        let consts: Vec<_> = instrs
            .iter()
            .filter(|i| i.op == Opcode::LoadC)
            .filter_map(|i| i.operand)
            .collect();
        assert!(consts.contains(&0) && consts.contains(&4));
    }

    #[test]
    fn test_nested_switches_use_distinct_slots() {
        let image = encode(indoc! {"
            int g = 7
            proc main():
                switch g:
                    case 7:
                        switch true:
                            case true:
                                write(1)
                            default:
                        .
                    default:
                .
            .
        "});
        let instrs = instructions(&image.code);

        // g at 0, then one reserved slot per nesting level.
        assert_eq!(
            &ops(&image.code)[..4],
            &[Opcode::LoadC, Opcode::LoadC, Opcode::LoadC, Opcode::Call]
        );

        let stores: Vec<_> = instrs
            .iter()
            .filter(|i| i.op == Opcode::StoreG)
            .filter_map(|i| i.operand)
            .collect();
        assert_eq!(stores, vec![1, 2]);
    }

    #[test]
    fn test_recursive_call_targets_own_entry() {
        let image = encode(indoc! {"
            func int fact(int n):
                int r = 1
                if n > 1:
                    r = n * fact(n - 1)
                .
                return r
            .
            proc main():
                write(fact(5))
            .
        "});
        let instrs = instructions(&image.code);
        let entry = instrs[2].offset as i16;

        let calls: Vec<_> = instrs
            .iter()
            .filter(|i| i.op == Opcode::Call)
            .filter_map(|i| i.operand)
            .collect();
        assert!(calls.contains(&entry));
        assert_eq!(verify(&image), Ok(()));
    }

    #[test]
    fn test_missing_main() {
        let program = parse(indoc! {"
            proc helper():
            .
        "})
        .unwrap();

        let err = Encoder::new().encode_program(&program).unwrap_err();
        assert_eq!(err, CompileError::MissingMain);
    }

    #[test]
    fn test_oversized_literal_is_rejected() {
        let program = parse(indoc! {"
            proc main():
                write(40000)
            .
        "})
        .unwrap();

        let err = Encoder::new().encode_program(&program).unwrap_err();
        assert_eq!(err, CompileError::LiteralOutOfRange { value: 40000 });
    }

    #[test]
    fn test_range_bound_at_word_limit_is_rejected() {
        let program = parse(indoc! {"
            proc main():
                switch 1:
                    case 1..9223372036854775807:
                    default:
                .
            .
        "})
        .unwrap();

        let err = Encoder::new().encode_program(&program).unwrap_err();
        assert_eq!(err, CompileError::LiteralOutOfRange { value: i64::MAX });
    }

    #[test]
    fn test_range_bound_just_outside_word_is_rejected() {
        let program = parse(indoc! {"
            proc main():
                switch 1:
                    case 0..32767:
                    default:
                .
            .
        "})
        .unwrap();

        let err = Encoder::new().encode_program(&program).unwrap_err();
        assert_eq!(err, CompileError::LiteralOutOfRange { value: 32768 });
    }
}
