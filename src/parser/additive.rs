//! Additive level `+`/`-` (§4.1, §4.4): bespoke rather than
//! generator-table driven because of pointer arithmetic scaling and
//! pointer-minus-pointer producing a scaled difference.

use crate::codegen::instr::EmitFlags;
use crate::constfold::{clamp_to_type, fold_binary, BinOp, FoldResult};
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

fn pointee_size(ty: &Type) -> u32 {
    match ty {
        Type::Ptr { pointee, .. } if pointee.is_complete() => pointee.size_of().max(1),
        _ => 1,
    }
}

/// `hie9` — the entry point above multiplicative/shift and below
/// relational, named per §6 so the declaration parser can reach
/// it directly for e.g. array-bound constant expressions.
pub fn additive(ctx: &mut Context, e: &mut ExprDesc) {
    crate::generators::dispatch(ctx, e, crate::generators::SHIFT, multiplicative_chain);
    loop {
        let minus = match ctx.tokens.cur().kind {
            TokenKind::Plus => false,
            TokenKind::Minus => true,
            _ => break,
        };
        ctx.tokens.advance();

        let lhs_ptr = e.ty.is_ptr();
        let lhs_const = e.is_const();
        let lhs_ty = e.ty.clone();
        let lhs_ival = e.ival;

        // `+` is commutative: a constant lhs can skip the push and fold
        // into an immediate once rhs turns out non-constant too. `-` is
        // not, so a constant lhs still needs to be materialised and
        // pushed like any other operand.
        let skip_push = lhs_const && !minus && !lhs_ptr;
        let lhs_mark = ctx.mark();
        if !skip_push {
            load_into_primary(ctx, e);
            ctx.code.push(word());
        }

        let mut rhs = ExprDesc::new();
        crate::generators::dispatch(ctx, &mut rhs, crate::generators::SHIFT, multiplicative_chain);

        let rhs_ptr = rhs.ty.is_ptr();

        if lhs_ptr && rhs_ptr {
            if minus {
                // pointer difference: scaled by the pointee size (§4.4).
                let elem = pointee_size(&lhs_ty).max(1) as i64;
                if lhs_const && rhs.is_const() {
                    ctx.code.remove_code(lhs_mark);
                    *e = ExprDesc::constant(Type::LONG, (lhs_ival - rhs.ival) / elem);
                } else {
                    load_into_primary(ctx, &rhs);
                    ctx.code.sub(word());
                    if elem != 1 {
                        ctx.code.div_imm(word(), elem);
                    }
                    *e = ExprDesc::new();
                    e.ty = Type::LONG;
                    e.location = Location::Primary;
                    e.ref_type = RefType::RValue;
                }
            } else {
                ctx.diag.error("invalid operands to binary '+': pointer plus pointer");
            }
            continue;
        }

        if lhs_ptr || rhs_ptr {
            // pointer +/- integer: scale the integer side by the
            // pointee's size before the add/sub.
            let (ptr_ty, ptr_is_lhs) = if lhs_ptr { (lhs_ty.clone(), true) } else { (rhs.ty.clone(), false) };
            let elem = pointee_size(&ptr_ty);

            if minus && !ptr_is_lhs {
                ctx.diag.error("invalid operands to binary '-': integer minus pointer");
                ctx.code.remove_code(lhs_mark);
                *e = ExprDesc::constant(Type::INT, 1);
                continue;
            }

            if lhs_const && rhs.is_const() {
                ctx.code.remove_code(lhs_mark);
                let scaled_int = if ptr_is_lhs { rhs.ival * elem as i64 } else { lhs_ival * elem as i64 };
                let base = if ptr_is_lhs { lhs_ival } else { rhs.ival };
                let result = if minus { base - scaled_int } else { base + scaled_int };
                *e = ExprDesc::constant(ptr_ty, result);
                continue;
            }

            if ptr_is_lhs {
                load_into_primary(ctx, &rhs);
                if elem != 1 {
                    let _ = ctx.code.scale(word(), elem);
                }
                if minus {
                    ctx.code.sub(word());
                } else {
                    ctx.code.add(word());
                }
            } else {
                // integer + pointer: the pushed lhs was the raw,
                // unscaled integer; scale it in place before combining
                // with the pointer (only `+` reaches here; `int - ptr`
                // is rejected below).
                ctx.code.pop(word());
                if elem != 1 {
                    let _ = ctx.code.scale(word(), elem);
                }
                ctx.code.push(word());
                load_into_primary(ctx, &rhs);
                ctx.code.add(word());
            }
            *e = ExprDesc::new();
            e.ty = ptr_ty;
            e.location = Location::Primary;
            e.ref_type = RefType::RValue;
            continue;
        }

        // plain integer arithmetic
        let result_ty = arithmetic_convert(&lhs_ty.promote(), &rhs.ty.promote());
        let op = if minus { BinOp::Sub } else { BinOp::Add };

        if lhs_const && rhs.is_const() {
            ctx.code.remove_code(lhs_mark);
            match fold_binary(op, lhs_ival, rhs.ival, &result_ty) {
                FoldResult::Ok(v) => *e = ExprDesc::constant(result_ty, v),
                FoldResult::DivByZero => unreachable!("+/- never divides"),
            }
            continue;
        }

        if lhs_const {
            // `+` only (skip_push implies !minus): no lhs push was
            // pending, so just load rhs and fold lhs in as an immediate
            // (§4.1 step 2e, commutative swap).
            load_into_primary(ctx, &rhs);
            let folded = clamp_to_type(lhs_ival as i128, &result_ty);
            ctx.code.add_imm(flags_for(&result_ty), folded);
        } else if rhs.is_const() {
            ctx.code.remove_code(lhs_mark);
            load_into_primary(ctx, e);
            let folded = clamp_to_type(rhs.ival as i128, &result_ty);
            if minus {
                ctx.code.sub_imm(flags_for(&result_ty), folded);
            } else {
                ctx.code.add_imm(flags_for(&result_ty), folded);
            }
        } else {
            load_into_primary(ctx, &rhs);
            if minus {
                ctx.code.sub(flags_for(&result_ty));
            } else {
                ctx.code.add(flags_for(&result_ty));
            }
        }
        *e = ExprDesc::new();
        e.ty = result_ty;
        e.location = Location::Primary;
        e.ref_type = RefType::RValue;
    }
}

fn multiplicative_chain(ctx: &mut Context, e: &mut ExprDesc) {
    crate::generators::dispatch(ctx, e, crate::generators::MULTIPLICATIVE, crate::parser::unary::unary);
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
    fn pure_constant_folds_with_precedence() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("3 + 4 * 5");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mark = ctx.mark();
        let mut e = ExprDesc::new();
        additive(&mut ctx, &mut e);
        assert!(e.is_const());
        assert_eq!(e.ival, 23);
        assert!(ctx.code.code_range_is_empty(mark, ctx.mark()));
    }

    #[test]
    fn runtime_lhs_plus_constant_rhs_balances_the_stack_through_expression0() {
        // §8 property #1, regression for a stack-pointer mismatch that
        // used to panic on every `var + constant` expression: the
        // constant-rhs branch deleted the lhs's push (and its load)
        // without restoring the stack pointer the push had bumped.
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a + 1");
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
    fn pointer_plus_integer_scales_by_pointee_size() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("p + 2");
        let mut symtab = TestSymbolTable::new();
        symtab.add_local(SymEntry {
            name: "p".into(),
            ty: Type::ptr_to(Type::INT),
            storage: StorageClass::Auto,
            offset: -2,
            const_value: None,
            is_const: false,
        });
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        additive(&mut ctx, &mut e);
        assert_eq!(e.ty, Type::ptr_to(Type::INT));
        assert_eq!(e.location, Location::Primary);
    }
}
