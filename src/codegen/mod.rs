//! Code emitter façade (§2 "Code emitter façade", §6 "Code
//! emitter").
//!
//! `CodeGen` models the target's primary register and runtime stack: it
//! appends target-assembly instruction lines to an append-only
//! [`CodeBuffer`] (peephole support lives there, see [`peephole`]) and
//! tracks the virtual stack pointer so every `push` has a matching
//! `pop`/`drop` (§8 property #1).
//!
//! Every method here is a thin façade over the primitive op set 
//! §6 enumerates (`push`, `add`, `get_local`, `typecast`, jumps, ...);
//! there is no lower "raw primitive" layer underneath it in this crate —
//! the façade *is* the emitter, the way cc65's `g_*` functions are both
//! the primitives and the only thing anyone calls.

pub mod instr;
pub mod peephole;

use crate::errors::CodeGenError;
use crate::types::{IntWidth, Type};
use instr::{EmitFlags, Instr};
use peephole::CodeBuffer;

/// A position in the code buffer *and* the virtual stack pointer at the
/// time it was captured (cc65's `CodeMark` snapshots `StackPtr`
/// alongside the buffer position for exactly this reason). Restoring a
/// mark via [`CodeGen::remove_code`] must undo both: a constant fold
/// that elides an already-counted `push` would otherwise leave
/// `stack_ptr` permanently elevated (§8 property #1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pos: peephole::Mark,
    stack_ptr: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn mnemonic(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        }
    }
}

#[derive(Debug, Default)]
pub struct CodeGen {
    buf: CodeBuffer,
    /// Net bytes pushed minus bytes popped on the target's runtime
    /// stack (§3.3, GLOSSARY "Virtual stack pointer").
    stack_ptr: i32,
    label_counter: u32,
}

impl CodeGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack_ptr(&self) -> i32 {
        self.stack_ptr
    }

    pub fn get_code_pos(&self) -> Mark {
        Mark { pos: self.buf.get_code_pos(), stack_ptr: self.stack_ptr }
    }

    /// Truncate the buffer back to `from.pos` and restore `stack_ptr` to
    /// what it was at capture time — the two always travel together
    /// (§4.12, §8 property #1).
    pub fn remove_code(&mut self, from: Mark) {
        self.buf.remove_code(from.pos);
        self.stack_ptr = from.stack_ptr;
    }

    pub fn remove_range(&mut self, from: Mark, to: Mark) {
        self.buf.remove_range(from.pos, to.pos);
    }

    pub fn move_code(&mut self, from: Mark, to: Mark, dest: Mark) {
        self.buf.move_code(from.pos, to.pos, dest.pos);
    }

    pub fn code_range_is_empty(&self, from: Mark, to: Mark) -> bool {
        self.buf.code_range_is_empty(from.pos, to.pos)
    }

    pub fn lines(&self) -> &[Instr] {
        self.buf.lines()
    }

    pub fn add_code_line(&mut self, text: impl Into<String>) {
        self.buf.emit(Instr::line(text));
    }

    fn emit(&mut self, text: String) {
        self.buf.emit(Instr::line(text));
    }

    // ---- value-stack primitives --------------------------------------

    /// Push the primary register onto the runtime stack.
    pub fn push(&mut self, flags: EmitFlags) {
        self.emit(format!("push{}", suffix(flags)));
        self.stack_ptr += flags.width() as i32;
    }

    /// Pop the top of the runtime stack into the primary register.
    pub fn pop(&mut self, flags: EmitFlags) {
        self.emit(format!("pop{}", suffix(flags)));
        self.stack_ptr -= flags.width() as i32;
    }

    /// Discard `n` bytes from the top of the runtime stack without
    /// loading them.
    pub fn drop(&mut self, n: u32) {
        if n > 0 {
            self.emit(format!("addysp {n}"));
        }
        self.stack_ptr -= n as i32;
    }

    /// Reserve `n` bytes of stack space (used to pre-allocate a call's
    /// whole parameter frame in one growth, §4.6).
    pub fn space(&mut self, n: u32) {
        if n > 0 {
            self.emit(format!("subysp {n}"));
        }
        self.stack_ptr += n as i32;
    }

    // ---- loads / stores -------------------------------------------------

    pub fn get_immediate(&mut self, flags: EmitFlags, value: i64) {
        self.emit(format!("ld{} #{}", suffix(flags), value));
    }

    pub fn get_local(&mut self, flags: EmitFlags, offset: i32) {
        self.emit(format!("ld{} frame+{}", suffix(flags), offset));
    }

    pub fn put_local(&mut self, flags: EmitFlags, offset: i32) {
        self.emit(format!("st{} frame+{}", suffix(flags), offset));
    }

    pub fn get_static(&mut self, flags: EmitFlags, label: &str, offset: i32) {
        self.emit(format!("ld{} {}+{}", suffix(flags), label, offset));
    }

    pub fn put_static(&mut self, flags: EmitFlags, label: &str, offset: i32) {
        self.emit(format!("st{} {}+{}", suffix(flags), label, offset));
    }

    /// Store the primary through a pointer pushed earlier onto the
    /// runtime stack (`PushAddr`, §4.7's generic compound-assignment
    /// path): the address is popped as part of the store, the way every
    /// other stack-resident operand is consumed implicitly (§8 property
    /// #1) rather than with a separate `pop`.
    pub fn put_ind(&mut self, flags: EmitFlags) {
        self.emit(format!("st{} (sp)", suffix(flags)));
        self.stack_ptr -= IntWidth::Word as i32;
    }

    /// Load through the pointer currently in the primary register
    /// (`Location::Expr`, §3.1). Leaves the runtime stack untouched —
    /// callers that need the address again afterwards (the
    /// read-modify-write half of a compound assignment) push it first
    /// and read through the still-resident primary copy.
    pub fn get_ind(&mut self, flags: EmitFlags) {
        self.emit(format!("ld{} (ax)", suffix(flags)));
    }

    pub fn get_register(&mut self, flags: EmitFlags, slot: u16) {
        self.emit(format!("ld{} zp+{}", suffix(flags), slot));
    }

    pub fn put_register(&mut self, flags: EmitFlags, slot: u16) {
        self.emit(format!("st{} zp+{}", suffix(flags), slot));
    }

    /// Load the *address* of a static/global label into the primary
    /// (address-of-rvalue materialisation for arrays, functions, and
    /// string literals, §4.3/§4.4).
    pub fn lea_static(&mut self, label: &str, offset: i32) {
        self.emit(format!("ldaw #{label}+{offset}"));
    }

    pub fn lea_local(&mut self, offset: i32) {
        self.emit(format!("leaw frame+{offset}"));
    }

    pub fn lea_register(&mut self, slot: u16) {
        self.emit(format!("leaw zp+{slot}"));
    }

    // ---- arithmetic / bitwise (lhs on the stack, rhs in primary) --------

    pub fn add(&mut self, flags: EmitFlags) {
        self.binop("add", flags, 0);
    }
    pub fn sub(&mut self, flags: EmitFlags) {
        self.binop("sub", flags, 0);
    }
    pub fn mul(&mut self, flags: EmitFlags) {
        self.binop("mul", flags, 0);
    }
    pub fn div(&mut self, flags: EmitFlags) {
        self.binop("div", flags, 0);
    }
    pub fn modulo(&mut self, flags: EmitFlags) {
        self.binop("mod", flags, 0);
    }
    pub fn and(&mut self, flags: EmitFlags) {
        self.binop("and", flags, 0);
    }
    pub fn or(&mut self, flags: EmitFlags) {
        self.binop("or", flags, 0);
    }
    pub fn xor(&mut self, flags: EmitFlags) {
        self.binop("xor", flags, 0);
    }
    pub fn asl(&mut self, flags: EmitFlags) {
        self.binop("asl", flags, 0);
    }
    pub fn asr(&mut self, flags: EmitFlags) {
        self.binop("asr", flags, 0);
    }

    /// Immediate forms of the above, used by the generator dispatcher's
    /// constant-operand peephole (§4.1 steps 2e/2f): the operand never
    /// left the constant pool for a push, so its value rides along in
    /// the instruction text instead of a stack slot.
    pub fn add_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("add", flags.with_const(), value);
    }
    pub fn sub_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("sub", flags.with_const(), value);
    }
    pub fn mul_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("mul", flags.with_const(), value);
    }
    pub fn div_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("div", flags.with_const(), value);
    }
    pub fn modulo_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("mod", flags.with_const(), value);
    }
    pub fn and_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("and", flags.with_const(), value);
    }
    pub fn or_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("or", flags.with_const(), value);
    }
    pub fn xor_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("xor", flags.with_const(), value);
    }
    pub fn asl_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("asl", flags.with_const(), value);
    }
    pub fn asr_imm(&mut self, flags: EmitFlags, value: i64) {
        self.binop("asr", flags.with_const(), value);
    }

    fn binop(&mut self, mnemonic: &str, flags: EmitFlags, value: i64) {
        if flags.is_const() {
            self.emit(format!("{}{}{} #{}", mnemonic, suffix(flags), const_suffix(flags), value));
        } else {
            self.emit(format!("{}{}{}", mnemonic, suffix(flags), const_suffix(flags)));
            // the stack-resident lhs is consumed
            self.stack_ptr -= flags.width() as i32;
        }
    }

    pub fn neg(&mut self, flags: EmitFlags) {
        self.emit(format!("neg{}", suffix(flags)));
    }

    pub fn com(&mut self, flags: EmitFlags) {
        self.emit(format!("com{}", suffix(flags)));
    }

    /// Boolean-negate the primary (`!`); sets the caller's `Tested` flag
    /// on the resulting `ExprDesc` (§4.5).
    pub fn bneg(&mut self, flags: EmitFlags) {
        self.emit(format!("bneg{}", suffix(flags)));
    }

    pub fn compare(&mut self, op: CmpOp, flags: EmitFlags) {
        self.emit(format!("cmp{}{}{}", op.mnemonic(), suffix(flags), const_suffix(flags)));
        if !flags.is_const() {
            self.stack_ptr -= flags.width() as i32;
        }
    }

    /// Immediate form: the constant operand rides in the instruction
    /// text (§4.8 const-comparison peephole).
    pub fn compare_imm(&mut self, op: CmpOp, flags: EmitFlags, value: i64) {
        self.emit(format!("cmp{}{}{} #{}", op.mnemonic(), suffix(flags), const_suffix(flags.with_const()), value));
    }

    // ---- in-place increment/decrement -----------------------------------

    pub fn inc(&mut self, flags: EmitFlags, by: i64) {
        self.emit(format!("inc{} #{}", suffix(flags), by));
    }

    pub fn dec(&mut self, flags: EmitFlags, by: i64) {
        self.emit(format!("dec{} #{}", suffix(flags), by));
    }

    // ---- compound assignment against memory, bypassing the primary -----

    pub fn addeq_static(&mut self, flags: EmitFlags, label: &str, offset: i32, value: i64) {
        self.emit(format!("addeq{} {}+{}, #{}", suffix(flags), label, offset, value));
    }
    pub fn addeq_local(&mut self, flags: EmitFlags, offset: i32, value: i64) {
        self.emit(format!("addeq{} frame+{}, #{}", suffix(flags), offset, value));
    }
    pub fn addeq_ind(&mut self, flags: EmitFlags, value: i64) {
        self.emit(format!("addeq{} (ax), #{}", suffix(flags), value));
    }
    pub fn subeq_static(&mut self, flags: EmitFlags, label: &str, offset: i32, value: i64) {
        self.emit(format!("subeq{} {}+{}, #{}", suffix(flags), label, offset, value));
    }
    pub fn subeq_local(&mut self, flags: EmitFlags, offset: i32, value: i64) {
        self.emit(format!("subeq{} frame+{}, #{}", suffix(flags), offset, value));
    }
    pub fn subeq_ind(&mut self, flags: EmitFlags, value: i64) {
        self.emit(format!("subeq{} (ax), #{}", suffix(flags), value));
    }

    // ---- conversions ------------------------------------------------------

    /// Scale the primary by `factor` (pointer arithmetic element size,
    /// §4.4/§4.7). A no-op for `factor == 1`.
    pub fn scale(&mut self, flags: EmitFlags, factor: u32) -> Result<(), CodeGenError> {
        match factor {
            0 => Err(CodeGenError::Logic("cannot scale by an element of size 0".into())),
            1 => Ok(()),
            n if n.is_power_of_two() => {
                self.emit(format!("asl{} #{}", suffix(flags), n.trailing_zeros()));
                Ok(())
            }
            n => {
                self.emit(format!("mul{} #{}", suffix(flags), n));
                Ok(())
            }
        }
    }

    /// Widen/narrow the primary from `from` to `to`, the way every
    /// usual-arithmetic-conversion site needs (§4.2).
    pub fn typeadjust(&mut self, from: &Type, to: &Type) {
        if from == to {
            return;
        }
        self.emit(format!("typeadjust {} -> {}", from, to));
    }

    /// Reinterpret-cast the primary (no conversion code, just a type
    /// relabel at the `ExprDesc` level in the caller).
    pub fn typecast(&mut self, from: &Type, to: &Type) {
        self.emit(format!("typecast {} -> {}", from, to));
    }

    /// Force the primary to a plain signed `int` (used ahead of library
    /// calls expecting that width).
    pub fn tosint(&mut self) {
        self.emit("tosint".to_string());
    }

    pub fn swap(&mut self, flags: EmitFlags) {
        self.emit(format!("swap{}", suffix(flags)));
    }

    /// Save the primary (and/or condition flags) ahead of a deferred-ops
    /// drain that must preserve it (§4.11).
    pub fn save(&mut self, flags: EmitFlags) {
        self.emit(format!("save{}", suffix(flags)));
    }

    pub fn restore(&mut self, flags: EmitFlags) {
        self.emit(format!("restore{}", suffix(flags)));
    }

    // ---- calls / jumps -----------------------------------------------------

    pub fn call(&mut self, label: &str) {
        self.emit(format!("call {label}"));
    }

    /// Call through the function pointer currently in the primary.
    pub fn callind(&mut self, flags: EmitFlags) {
        self.emit(format!("callind{}", suffix(flags)));
    }

    /// Base-pointer adjustment needed to address a variadic function's
    /// named parameters (§9 Design Notes).
    pub fn leavariadic(&mut self, fixed_args_size: u32) {
        self.emit(format!("leavariadic {fixed_args_size}"));
    }

    pub fn true_jump(&mut self, label: u32) {
        self.emit(format!("jtrue L{label}"));
    }

    pub fn false_jump(&mut self, label: u32) {
        self.emit(format!("jfalse L{label}"));
    }

    pub fn jump(&mut self, label: u32) {
        self.emit(format!("jmp L{label}"));
    }

    pub fn def_label(&mut self, label: u32) {
        self.emit(format!("L{label}:"));
    }
}

fn suffix(flags: EmitFlags) -> &'static str {
    match (flags.width(), flags.is_unsigned()) {
        (IntWidth::Byte, false) => "c",
        (IntWidth::Byte, true) => "uc",
        (IntWidth::Word, false) => "i",
        (IntWidth::Word, true) => "ui",
        (IntWidth::Long, false) => "l",
        (IntWidth::Long, true) => "ul",
    }
}

fn const_suffix(flags: EmitFlags) -> &'static str {
    if flags.is_const() { "eq" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntWidth;

    #[test]
    fn matching_push_pop_balances_stack_ptr() {
        let mut cg = CodeGen::new();
        let entry = cg.stack_ptr();
        cg.push(EmitFlags::for_width(IntWidth::Word, true));
        cg.pop(EmitFlags::for_width(IntWidth::Word, true));
        assert_eq!(cg.stack_ptr(), entry);
    }

    #[test]
    fn push_then_drop_balances_too() {
        let mut cg = CodeGen::new();
        let entry = cg.stack_ptr();
        cg.push(EmitFlags::for_width(IntWidth::Long, false));
        cg.drop(4);
        assert_eq!(cg.stack_ptr(), entry);
    }

    #[test]
    fn scale_by_one_emits_nothing() {
        let mut cg = CodeGen::new();
        let mark = cg.get_code_pos();
        cg.scale(EmitFlags::for_width(IntWidth::Word, true), 1).unwrap();
        assert!(cg.code_range_is_empty(mark, cg.get_code_pos()));
    }

    #[test]
    fn scale_by_power_of_two_uses_shift() {
        let mut cg = CodeGen::new();
        cg.scale(EmitFlags::for_width(IntWidth::Word, true), 4).unwrap();
        assert!(cg.lines().last().unwrap().0.starts_with("asl"));
    }

    #[test]
    fn scale_by_zero_is_rejected() {
        let mut cg = CodeGen::new();
        assert!(cg.scale(EmitFlags::for_width(IntWidth::Word, true), 0).is_err());
    }
}
