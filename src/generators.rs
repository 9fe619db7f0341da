//! Generator tables and the shared commutative/associative dispatcher
//! (§4.1) used by `*`, `/`, `%`, `&`, `^`, `|` and shift.

use crate::codegen::instr::EmitFlags;
use crate::constfold::{fold_binary, BinOp, FoldResult};
use crate::context::Context;
use crate::exprdesc::{ExprDesc, Location, RefType};
use crate::parser::unary::load_into_primary;
use crate::token::TokenKind;
use crate::types::{arithmetic_convert, IntWidth, Type};
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GenFlags: u8 {
        /// Consume lhs directly from the primary when rhs is constant,
        /// deleting the redundant push (§4.1 step 2f).
        const NO_PUSH = 0b001;
        /// Commutative: lhs-constant may swap roles with rhs (§4.1 step 2e).
        const COMM    = 0b010;
        /// Not defined for function-pointer operands (ordering compares).
        const NO_FUNC = 0b100;
    }
}

/// One row of a generator table: the token it fires on, its flags, and
/// the codegen emitter to call for the non-folded, non-immediate case.
pub struct Generator {
    pub token: TokenKind,
    pub op: BinOp,
    pub flags: GenFlags,
    /// Register form: lhs on the stack, rhs in the primary.
    pub emit: fn(&mut Context, EmitFlags),
    /// Immediate form: the constant operand rides in the instruction
    /// text rather than on the stack (§4.1 steps 2e/2f).
    pub emit_imm: fn(&mut Context, EmitFlags, i64),
}

pub const MULTIPLICATIVE: &[Generator] = &[
    Generator {
        token: TokenKind::Star,
        op: BinOp::Mul,
        flags: GenFlags::COMM,
        emit: |ctx, f| ctx.code.mul(f),
        emit_imm: |ctx, f, v| ctx.code.mul_imm(f, v),
    },
    Generator {
        token: TokenKind::Slash,
        op: BinOp::Div,
        flags: GenFlags::empty(),
        emit: |ctx, f| ctx.code.div(f),
        emit_imm: |ctx, f, v| ctx.code.div_imm(f, v),
    },
    Generator {
        token: TokenKind::Percent,
        op: BinOp::Mod,
        flags: GenFlags::empty(),
        emit: |ctx, f| ctx.code.modulo(f),
        emit_imm: |ctx, f, v| ctx.code.modulo_imm(f, v),
    },
];

pub const BIT_AND: &[Generator] = &[Generator {
    token: TokenKind::Amp,
    op: BinOp::And,
    flags: GenFlags::COMM,
    emit: |ctx, f| ctx.code.and(f),
    emit_imm: |ctx, f, v| ctx.code.and_imm(f, v),
}];

pub const BIT_XOR: &[Generator] = &[Generator {
    token: TokenKind::Caret,
    op: BinOp::Xor,
    flags: GenFlags::COMM,
    emit: |ctx, f| ctx.code.xor(f),
    emit_imm: |ctx, f, v| ctx.code.xor_imm(f, v),
}];

pub const BIT_OR: &[Generator] = &[Generator {
    token: TokenKind::Pipe,
    op: BinOp::Or,
    flags: GenFlags::COMM,
    emit: |ctx, f| ctx.code.or(f),
    emit_imm: |ctx, f, v| ctx.code.or_imm(f, v),
}];

pub const SHIFT: &[Generator] = &[
    Generator {
        token: TokenKind::Shl,
        op: BinOp::Shl,
        flags: GenFlags::NO_PUSH,
        emit: |ctx, f| ctx.code.asl(f),
        emit_imm: |ctx, f, v| ctx.code.asl_imm(f, v),
    },
    Generator {
        token: TokenKind::Shr,
        op: BinOp::Shr,
        flags: GenFlags::NO_PUSH,
        emit: |ctx, f| ctx.code.asr(f),
        emit_imm: |ctx, f, v| ctx.code.asr_imm(f, v),
    },
];

fn find<'t>(table: &'t [Generator], kind: &TokenKind) -> Option<&'t Generator> {
    table.iter().find(|g| &g.token == kind)
}

fn word_flags() -> EmitFlags {
    EmitFlags::for_width(IntWidth::Word, true)
}

/// Result type rule for shift: the shifted operand's own promoted type,
/// not the usual arithmetic conversion of both sides (C89 §3.3.7).
fn result_type(table_is_shift: bool, lhs: &Type, rhs: &Type) -> Type {
    if table_is_shift {
        lhs.promote()
    } else {
        arithmetic_convert(&lhs.promote(), &rhs.promote())
    }
}

/// Narrow a constant operand in `[0,255]` whose declared type is `int`
/// to `unsigned char` emitter flags, matching what the generic path's
/// adjustment logic widens back transparently (§4.1 "Small-integer
/// promotion optimisation").
fn narrowed_const_flags(ty: &Type, value: i64) -> EmitFlags {
    if matches!(ty, Type::Int { width: IntWidth::Word, signed: true }) && (0..=255).contains(&value) {
        EmitFlags::for_width(IntWidth::Byte, false).with_const()
    } else {
        flags_for(ty).with_const()
    }
}

fn flags_for(ty: &Type) -> EmitFlags {
    match ty {
        Type::Int { width, signed } => EmitFlags::for_width(*width, *signed),
        Type::Ptr { .. } => EmitFlags::for_width(IntWidth::Word, true),
        _ => EmitFlags::for_width(IntWidth::Word, true),
    }
}

/// Shared dispatcher for a precedence level backed by a generator table
/// (§4.1). `next` parses the next-higher precedence level.
pub fn dispatch(ctx: &mut Context, e: &mut ExprDesc, table: &[Generator], next: fn(&mut Context, &mut ExprDesc)) {
    let is_shift = std::ptr::eq(table, SHIFT);
    next(ctx, e);
    loop {
        let Some(gen) = find(table, &ctx.tokens.cur().kind) else { break };
        if !e.ty.is_int_class() {
            ctx.diag.error("left operand of this operator must be an integer");
        }
        ctx.tokens.advance();

        let lhs_const = e.is_const();
        let lhs_ty = e.ty.clone();
        let lhs_ival = e.ival;

        // captured before anything this iteration emits, so a full
        // constant fold (both operands constant) can roll back the
        // lhs load *and* its push in one shot, leaving no residue
        // (§8 property #1/#6).
        let fold_mark = ctx.mark();
        let mut lhs_push_mark = fold_mark;
        if !(lhs_const && gen.flags.contains(GenFlags::COMM)) {
            load_into_primary(ctx, e);
            // mark sits right before the push so a later NO_PUSH elision
            // deletes only that push, leaving lhs resident in the primary.
            lhs_push_mark = ctx.mark();
            ctx.code.push(word_flags());
        }

        let mut rhs = ExprDesc::new();
        next(ctx, &mut rhs);
        if !rhs.ty.is_int_class() {
            ctx.diag.error("right operand of this operator must be an integer");
        }

        let result_ty = result_type(is_shift, &lhs_ty, &rhs.ty);

        if lhs_const && rhs.is_const() {
            ctx.code.remove_code(fold_mark);
            match fold_binary(gen.op, lhs_ival, rhs.ival, &result_ty) {
                FoldResult::Ok(v) => {
                    *e = ExprDesc::constant(result_ty, v);
                }
                FoldResult::DivByZero => {
                    ctx.diag.error("division by zero in constant expression");
                    *e = ExprDesc::constant(result_ty, 0);
                }
            }
            continue;
        }

        if lhs_const && gen.flags.contains(GenFlags::COMM) {
            // lhs never got pushed; it becomes the constant-immediate
            // side of a swapped, non-constant-folded emission. rhs is
            // already in the primary after `next()` parsed it.
            load_into_primary(ctx, &rhs);
            (gen.emit_imm)(ctx, narrowed_const_flags(&lhs_ty, lhs_ival), lhs_ival);
            *e = ExprDesc::new();
            e.ty = result_ty;
            e.location = Location::Primary;
            e.ref_type = RefType::RValue;
            continue;
        }

        if rhs.is_const() && gen.flags.contains(GenFlags::NO_PUSH) {
            ctx.code.remove_code(lhs_push_mark);
            (gen.emit_imm)(ctx, narrowed_const_flags(&rhs.ty, rhs.ival), rhs.ival);
            *e = ExprDesc::new();
            e.ty = result_ty;
            e.location = Location::Primary;
            e.ref_type = RefType::RValue;
            continue;
        }

        // rhs now in the primary; the op consumes the pushed lhs off the
        // runtime stack directly (no separate pop needed).
        load_into_primary(ctx, &rhs);
        (gen.emit)(ctx, flags_for(&result_ty));
        *e = ExprDesc::new();
        e.ty = result_ty;
        e.location = Location::Primary;
        e.ref_type = RefType::RValue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::labels::TestLabelAllocator;
    use crate::literal::TestLiteralPool;
    use crate::symtab::{StorageClass, SymEntry, TestSymbolTable};
    use crate::token::VecTokenSource;

    fn primary_level(ctx: &mut Context, e: &mut ExprDesc) {
        crate::parser::unary::unary(ctx, e)
    }

    #[test]
    fn both_constant_folds_and_emits_no_code() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("3 * 4");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mark = ctx.mark();
        let mut e = ExprDesc::new();
        dispatch(&mut ctx, &mut e, MULTIPLICATIVE, primary_level);
        assert!(e.is_const());
        assert_eq!(e.ival, 12);
        assert!(ctx.code.code_range_is_empty(mark, ctx.mark()));
    }

    #[test]
    fn constant_lhs_on_commutative_op_swaps_and_still_loads_rhs_once() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("5 & a");
        let mut symtab = TestSymbolTable::new();
        symtab.add_local(SymEntry {
            name: "a".into(),
            ty: Type::INT,
            storage: StorageClass::Auto,
            offset: -2,
            const_value: None,
            is_const: false,
        });
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        dispatch(&mut ctx, &mut e, BIT_AND, primary_level);
        assert!(!e.is_const());
        assert_eq!(e.location, Location::Primary);
        // no push/pop pair needed since lhs never materialised before
        // the swap.
        assert!(!ctx.code.lines().iter().any(|l| l.0.starts_with("push")));
    }

    #[test]
    fn runtime_shift_by_a_constant_balances_the_stack_through_expression0() {
        // §8 property #1, regression: the NO_PUSH constant-rhs elision
        // deleted the lhs's push without restoring the stack pointer it
        // had bumped, panicking `expression0` on any `var << constant`.
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a << 2");
        let mut symtab = TestSymbolTable::new();
        symtab.add_local(SymEntry {
            name: "a".into(),
            ty: Type::INT,
            storage: StorageClass::Auto,
            offset: -2,
            const_value: None,
            is_const: false,
        });
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        crate::parser::expression0(&mut ctx, &mut e);
        assert_eq!(e.ty, Type::INT);
        assert_eq!(ctx.code.stack_ptr(), 0);
    }

    #[test]
    fn fully_constant_non_commutative_division_emits_no_residual_load() {
        // regression: the fold mark used to be captured after the lhs
        // was loaded into the primary, so folding `6 / 3` (non-
        // commutative, so the lhs load+push couldn't be skipped up
        // front) only deleted the push and left a stray load behind,
        // violating "a constant expression emits no code" (§8 #6).
        let config = Config::new();
        let mut tokens = VecTokenSource::new("6 / 3");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mark = ctx.mark();
        let mut e = ExprDesc::new();
        dispatch(&mut ctx, &mut e, MULTIPLICATIVE, primary_level);
        assert!(e.is_const());
        assert_eq!(e.ival, 2);
        assert!(ctx.code.code_range_is_empty(mark, ctx.mark()));
    }

    #[test]
    fn constant_rhs_on_no_push_shift_elides_the_lhs_push() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a << 2");
        let mut symtab = TestSymbolTable::new();
        symtab.add_local(SymEntry {
            name: "a".into(),
            ty: Type::INT,
            storage: StorageClass::Auto,
            offset: -2,
            const_value: None,
            is_const: false,
        });
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        dispatch(&mut ctx, &mut e, SHIFT, primary_level);
        assert!(!ctx.code.lines().iter().any(|l| l.0.starts_with("push")));
        assert_eq!(e.location, Location::Primary);
    }
}
