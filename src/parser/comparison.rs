//! Equality and relational levels (§4.8), including the
//! const-comparison peephole optimisations called out as individually
//! testable functions.

use crate::codegen::instr::EmitFlags;
use crate::codegen::CmpOp as EmitCmpOp;
use crate::constfold::{fold_compare, CmpOp};
use crate::context::Context;
use crate::exprdesc::{ExprDesc, Location, RefType};
use crate::parser::unary::load_into_primary;
use crate::token::TokenKind;
use crate::types::{arithmetic_convert, IntWidth, Type};

fn word() -> EmitFlags {
    EmitFlags::for_width(IntWidth::Word, true)
}

fn flags_for(ty: &Type) -> EmitFlags {
    match ty {
        Type::Int { width, signed } => EmitFlags::for_width(*width, *signed),
        _ => word(),
    }
}

/// Usual arithmetic conversion already picked the common rank; when
/// either original operand was unsigned, the comparison itself must
/// still be done unsigned even if the conversion target came out
/// signed (both operands promoted to the same signed rank but one
/// started out unsigned, e.g. `unsigned char` vs `int` never happens
/// since promotion widens to `int`, but `unsigned int` vs `int` does).
fn to_unsigned(ty: Type) -> Type {
    match ty {
        Type::Int { width, .. } => Type::Int { width, signed: false },
        other => other,
    }
}

fn to_emit_cmp(op: CmpOp) -> EmitCmpOp {
    match op {
        CmpOp::Eq => EmitCmpOp::Eq,
        CmpOp::Ne => EmitCmpOp::Ne,
        CmpOp::Lt => EmitCmpOp::Lt,
        CmpOp::Le => EmitCmpOp::Le,
        CmpOp::Gt => EmitCmpOp::Gt,
        CmpOp::Ge => EmitCmpOp::Ge,
    }
}

/// `a < 256` where `a` is an 8-bit unsigned value: the constant is
/// outside the value's possible range, so the comparison is statically
/// decidable (§4.8, §8 scenario 9).
fn range_decided(op: CmpOp, operand_ty: &Type, constant: i64) -> Option<bool> {
    if operand_ty.is_unsigned() {
        let max = match operand_ty {
            Type::Int { width: IntWidth::Byte, .. } => u8::MAX as i64,
            Type::Int { width: IntWidth::Word, .. } => u16::MAX as i64,
            _ => return None,
        };
        match op {
            CmpOp::Lt if constant > max => Some(true),
            CmpOp::Lt if constant <= 0 => Some(false),
            CmpOp::Le if constant >= max => Some(true),
            CmpOp::Gt if constant >= max => Some(false),
            CmpOp::Gt if constant < 0 => Some(true),
            CmpOp::Ge if constant > max => Some(false),
            CmpOp::Ge if constant <= 0 => Some(true),
            _ => None,
        }
    } else {
        None
    }
}

/// Unsigned `<1`, `<=0`, `>=1`, `>0` against a constant simplify to
/// equality/inequality with zero (§4.8).
fn simplify_unsigned_zero_compare(op: CmpOp, operand_ty: &Type, constant: i64) -> Option<CmpOp> {
    if !operand_ty.is_unsigned() {
        return None;
    }
    match (op, constant) {
        (CmpOp::Lt, 1) => Some(CmpOp::Eq), // unsigned < 1  <=>  == 0, compared against 0
        (CmpOp::Le, 0) => Some(CmpOp::Eq),
        (CmpOp::Ge, 1) => Some(CmpOp::Ne),
        (CmpOp::Gt, 0) => Some(CmpOp::Ne),
        _ => None,
    }
}

fn dispatch_level(
    ctx: &mut Context,
    e: &mut ExprDesc,
    ops: &[(TokenKind, CmpOp)],
    next: fn(&mut Context, &mut ExprDesc),
) {
    next(ctx, e);
    loop {
        let Some((_, op)) = ops.iter().find(|(t, _)| t == &ctx.tokens.cur().kind) else { break };
        let op = *op;
        ctx.tokens.advance();

        if matches!(e.ty, Type::Func(_)) || matches!(&e.ty, Type::Ptr{pointee,..} if pointee.is_func()) {
            if matches!(op, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge) {
                ctx.diag.error("ordering comparison of function pointers is not allowed");
            }
        }

        let lhs_const = e.is_const();
        let lhs_ty = e.ty.clone();
        let lhs_ival = e.ival;
        let lhs_is_ptr = e.ty.is_ptr();

        let lhs_mark = ctx.mark();
        if !lhs_const {
            load_into_primary(ctx, e);
            ctx.code.push(word());
        }

        let mut rhs = ExprDesc::new();
        next(ctx, &mut rhs);

        if !e.ty.is_scalar() || !rhs.ty.is_scalar() {
            ctx.diag.error("comparison requires scalar operands");
        } else if lhs_is_ptr != rhs.ty.is_ptr() && !(lhs_const && lhs_ival == 0) && !(rhs.is_const() && rhs.ival == 0) {
            ctx.diag.warning("comparison between pointer and integer");
        }

        let both_unsigned_or_ptr = !lhs_ty.is_int_class() || !rhs.ty.is_int_class() || lhs_ty.is_unsigned() || rhs.ty.is_unsigned();
        let operand_ty = if lhs_is_ptr || rhs.ty.is_ptr() {
            Type::ULONG
        } else {
            let conv = arithmetic_convert(&lhs_ty.promote(), &rhs.ty.promote());
            if both_unsigned_or_ptr { to_unsigned(conv) } else { conv }
        };

        if lhs_const && rhs.is_const() {
            ctx.code.remove_code(lhs_mark);
            let result = fold_compare(op, lhs_ival, rhs.ival, &operand_ty);
            *e = ExprDesc::constant(Type::Bool, result as i64);
            e.set_tested();
            continue;
        }

        // A known address (quasi-constant, address-of) compared against
        // the null-pointer constant is statically decidable (§4.8); any
        // other pointer vs. zero comparison falls through to runtime.
        if e.flags.contains(crate::exprdesc::ExprFlags::ADDRESS_OF) && rhs.is_const() && rhs.ival == 0 {
            ctx.code.remove_code(lhs_mark);
            let result = match op {
                CmpOp::Eq => false,
                CmpOp::Ne => true,
                CmpOp::Lt | CmpOp::Le => false,
                CmpOp::Gt | CmpOp::Ge => true,
            };
            *e = ExprDesc::constant(Type::Bool, result as i64);
            e.set_tested();
            continue;
        }

        if let Some(rc) = rhs.is_const().then_some(rhs.ival) {
            if let Some(decided) = range_decided(op, &operand_ty, rc) {
                if ctx.config.warn_const_comparison {
                    ctx.diag.warning(format!(
                        "comparison is always {} due to limited range of operand type",
                        decided
                    ));
                }
                ctx.code.remove_code(lhs_mark);
                *e = ExprDesc::constant(Type::Bool, decided as i64);
                e.set_tested();
                continue;
            }

            let effective_op = simplify_unsigned_zero_compare(op, &operand_ty, rc).unwrap_or(op);
            let effective_const = if effective_op == op { rc } else { 0 };

            ctx.code.remove_code(lhs_mark);
            load_into_primary(ctx, e);
            let cmp_flags = if matches!(lhs_ty, Type::Int { width: IntWidth::Byte, .. })
                && matches!(rhs.ty, Type::Int { width: IntWidth::Byte, .. })
                && lhs_ty.is_unsigned() == rhs.ty.is_unsigned()
            {
                flags_for(&lhs_ty)
            } else {
                flags_for(&operand_ty)
            };
            ctx.code.compare_imm(to_emit_cmp(effective_op), cmp_flags, effective_const);
            *e = ExprDesc::new();
            e.ty = Type::Bool;
            e.location = Location::Primary;
            e.ref_type = RefType::RValue;
            e.set_tested();
            continue;
        }

        load_into_primary(ctx, &rhs);
        ctx.code.compare(to_emit_cmp(op), flags_for(&operand_ty));
        *e = ExprDesc::new();
        e.ty = Type::Bool;
        e.location = Location::Primary;
        e.ref_type = RefType::RValue;
        e.set_tested();
    }
}

const EQUALITY_OPS: &[(TokenKind, CmpOp)] = &[(TokenKind::EqEq, CmpOp::Eq), (TokenKind::NotEq, CmpOp::Ne)];
const RELATIONAL_OPS: &[(TokenKind, CmpOp)] = &[
    (TokenKind::Lt, CmpOp::Lt),
    (TokenKind::Le, CmpOp::Le),
    (TokenKind::Gt, CmpOp::Gt),
    (TokenKind::Ge, CmpOp::Ge),
];

/// `hie7` — equality (§6 naming convention).
pub fn equality(ctx: &mut Context, e: &mut ExprDesc) {
    dispatch_level(ctx, e, EQUALITY_OPS, relational);
}

/// `hie8` — relational.
pub fn relational(ctx: &mut Context, e: &mut ExprDesc) {
    dispatch_level(ctx, e, RELATIONAL_OPS, crate::parser::additive::additive);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::labels::TestLabelAllocator;
    use crate::literal::TestLiteralPool;
    use crate::symtab::{StorageClass, SymEntry, TestSymbolTable};
    use crate::token::VecTokenSource;

    #[test]
    fn unsigned_char_below_256_is_always_true() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a < 256");
        let mut symtab = TestSymbolTable::new();
        symtab.add_local(SymEntry {
            name: "a".into(),
            ty: Type::UCHAR,
            storage: StorageClass::Auto,
            offset: -1,
            const_value: None,
            is_const: false,
        });
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        equality(&mut ctx, &mut e);
        assert!(e.is_const());
        assert_eq!(e.ival, 1);
        assert_eq!(ctx.diag.warning_count(), 1);
    }

    #[test]
    fn runtime_comparison_against_a_constant_balances_the_stack_through_expression0() {
        // §8 property #1, regression: the range-decided/unsigned-zero
        // peepholes deleted the pushed lhs without restoring the stack
        // pointer the push had bumped, panicking `expression0` on any
        // `var < constant`-shaped comparison.
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a < 256");
        let mut symtab = TestSymbolTable::new();
        symtab.add_local(SymEntry {
            name: "a".into(),
            ty: Type::UCHAR,
            storage: StorageClass::Auto,
            offset: -1,
            is_const: false,
            const_value: None,
        });
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        crate::parser::expression0(&mut ctx, &mut e);
        assert_eq!(e.ty, Type::Bool);
        assert_eq!(ctx.code.stack_ptr(), 0);
    }

    #[test]
    fn both_constant_folds_with_correct_signedness() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("3 < 4");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        equality(&mut ctx, &mut e);
        assert!(e.is_const());
        assert_eq!(e.ival, 1);
        assert_eq!(e.ty, Type::Bool);
    }
}
