//! `?:` conditional expression (§4.10).

use crate::context::Context;
use crate::exprdesc::{ExprDesc, Location, RefType};
use crate::token::TokenKind;
use crate::types::{arithmetic_convert, Type};

fn const_truth(e: &ExprDesc) -> bool {
    e.flags.contains(crate::exprdesc::ExprFlags::ADDRESS_OF) || e.ival != 0
}

/// Unify the two branches' types and emit a type-adjustment for either
/// side that needs widening, matching §4.10's result-type table: two
/// arithmetic types convert per the usual rules, compatible pointers (or
/// one side a null-pointer constant) unify to the pointer type, `void`
/// with `void` stays `void`, identical record types pass through
/// unchanged. Anything else is an error, recovered as `int`.
fn result_type(ctx: &mut Context, lhs: &ExprDesc, rhs: &ExprDesc) -> Type {
    match (&lhs.ty, &rhs.ty) {
        (a, b) if a.is_int_class() && b.is_int_class() => arithmetic_convert(&a.promote(), &b.promote()),
        (a, b) if a.is_ptr() && b.is_ptr() => {
            if a == b {
                a.clone()
            } else if rhs.is_const() && rhs.ival == 0 {
                a.clone()
            } else if lhs.is_const() && lhs.ival == 0 {
                b.clone()
            } else {
                ctx.diag.warning("pointer type mismatch in conditional expression");
                a.clone()
            }
        }
        (Type::Ptr { .. }, b) if b.is_int_class() && rhs.is_const() && rhs.ival == 0 => lhs.ty.clone(),
        (a, Type::Ptr { .. }) if a.is_int_class() && lhs.is_const() && lhs.ival == 0 => rhs.ty.clone(),
        (Type::Void, Type::Void) => Type::Void,
        (Type::Record(a), Type::Record(b)) if std::rc::Rc::ptr_eq(a, b) => lhs.ty.clone(),
        _ => {
            ctx.diag.error("incompatible types in conditional expression branches");
            Type::INT
        }
    }
}

/// `cond ? true_branch : false_branch` (§4.10).
pub fn ternary(ctx: &mut Context, e: &mut ExprDesc, next: fn(&mut Context, &mut ExprDesc)) {
    next(ctx, e);
    if ctx.tokens.cur().kind != TokenKind::Question {
        return;
    }
    ctx.tokens.advance();

    if e.is_const() {
        let cond_true = const_truth(e);
        // constant condition: parse the taken branch live, the untaken
        // one unevaluated so its side-effect-free diagnostics still run
        // but no dead code reaches the buffer (§4.10, §8 scenario 5).
        let mut taken = ExprDesc::new();
        if cond_true {
            super::assign(ctx, &mut taken);
        } else {
            ctx.with_unevaluated(|ctx| super::assign(ctx, &mut taken));
        }
        if ctx.tokens.cur().kind != TokenKind::Colon {
            ctx.diag.error("expected ':' in conditional expression");
        } else {
            ctx.tokens.advance();
        }
        let mut other = ExprDesc::new();
        if cond_true {
            ctx.with_unevaluated(|ctx| ternary(ctx, &mut other, next));
        } else {
            ternary(ctx, &mut other, next);
        }

        let result_ty = if cond_true {
            result_type(ctx, &taken, &other)
        } else {
            result_type(ctx, &other, &taken)
        };
        *e = if cond_true { taken } else { other };
        e.ty = result_ty;
        return;
    }

    super::unary::load_into_primary(ctx, e);
    let false_label = ctx.labels.get_local_label();
    ctx.code.false_jump(false_label);

    let mut true_branch = ExprDesc::new();
    super::assign(ctx, &mut true_branch);
    if ctx.tokens.cur().kind != TokenKind::Colon {
        ctx.diag.error("expected ':' in conditional expression");
    } else {
        ctx.tokens.advance();
    }

    // §4.10: both branches must end up producing their value in the
    // primary, so loading happens before the shared join label.
    super::unary::load_into_primary(ctx, &true_branch);
    let end_label = ctx.labels.get_local_label();
    ctx.code.jump(end_label);
    ctx.labels.def_code_label(false_label);

    let mut false_branch = ExprDesc::new();
    ternary(ctx, &mut false_branch, next);
    super::unary::load_into_primary(ctx, &false_branch);
    ctx.labels.def_code_label(end_label);

    let result_ty = result_type(ctx, &true_branch, &false_branch);
    *e = ExprDesc::new();
    e.ty = result_ty;
    e.location = Location::Primary;
    e.ref_type = RefType::RValue;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::labels::TestLabelAllocator;
    use crate::literal::TestLiteralPool;
    use crate::symtab::{StorageClass, SymEntry, TestSymbolTable};
    use crate::token::VecTokenSource;

    fn entry(ctx: &mut Context, e: &mut ExprDesc) {
        ternary(ctx, e, crate::parser::logical::logor)
    }

    #[test]
    fn constant_condition_keeps_only_the_taken_branch() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("1 ? 2 : 3");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mark = ctx.mark();
        let mut e = ExprDesc::new();
        entry(&mut ctx, &mut e);
        assert!(e.is_const());
        assert_eq!(e.ival, 2);
        assert!(ctx.code.code_range_is_empty(mark, ctx.mark()));
    }

    #[test]
    fn runtime_condition_loads_both_branches_into_primary() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a ? 2 : 3");
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
        entry(&mut ctx, &mut e);
        assert_eq!(e.location, Location::Primary);
        assert_eq!(e.ty, Type::INT);
    }
}
