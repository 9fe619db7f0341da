//! `&&` / `||` short-circuit (§4.9).

use crate::codegen::instr::EmitFlags;
use crate::context::Context;
use crate::exprdesc::{ExprDesc, Location, RefType};
use crate::token::TokenKind;
use crate::types::{IntWidth, Type};

fn byte() -> EmitFlags {
    EmitFlags::for_width(IntWidth::Byte, false)
}

/// Truthiness of a compile-time constant operand (§4.9: any nonzero
/// scalar constant, including a known address, is true).
fn const_truth(e: &ExprDesc) -> bool {
    e.flags.contains(crate::exprdesc::ExprFlags::ADDRESS_OF) || e.ival != 0
}

/// Shared shape for `&&`/`||`: `is_and` picks the short-circuit sense
/// and the jump direction used while threading through the chain.
fn chain(ctx: &mut Context, e: &mut ExprDesc, token: TokenKind, is_and: bool, next: fn(&mut Context, &mut ExprDesc)) {
    next(ctx, e);
    if ctx.tokens.cur().kind != token {
        return;
    }

    // §4.9 preprocessing mode: `#if` constant expressions fold logical
    // operators purely symbolically and must never reach the codegen
    // collaborator.
    if ctx.config.preprocessing {
        preprocessing_chain(ctx, e, token, is_and, next);
        return;
    }

    let mut short_circuited = false;
    let mut decided: Option<bool> = None;
    let mut end_label: Option<u32> = None;
    let mut jump = |ctx: &mut Context, end_label: &mut Option<u32>| {
        let label = *end_label.get_or_insert_with(|| ctx.labels.get_local_label());
        if is_and {
            ctx.code.false_jump(label);
        } else {
            ctx.code.true_jump(label);
        }
    };

    if e.is_const() {
        let truth = const_truth(e);
        if truth == !is_and {
            // `&&` with a false lhs, or `||` with a true lhs: the whole
            // chain is decided; every remaining operand still has to be
            // *parsed* (for side effects on declarations/labels) but not
            // evaluated for code.
            decided = Some(truth);
            short_circuited = true;
        }
    } else {
        super::unary::load_into_primary(ctx, e);
        jump(ctx, &mut end_label);
    }

    while ctx.tokens.cur().kind == token {
        ctx.tokens.advance();
        let mut operand = ExprDesc::new();
        if short_circuited {
            ctx.with_unevaluated(|ctx| next(ctx, &mut operand));
        } else {
            next(ctx, &mut operand);
        }

        if !short_circuited {
            if operand.is_const() {
                let truth = const_truth(&operand);
                if truth == !is_and {
                    decided = Some(truth);
                    short_circuited = true;
                }
                // a true `&&` operand (or false `||` operand) falls
                // through: the chain's value still depends on whatever
                // comes after it, so nothing is emitted for it at all.
            } else {
                super::unary::load_into_primary(ctx, &operand);
                jump(ctx, &mut end_label);
            }
        }
    }

    // Only a decision reached before any runtime operand was seen (no
    // jump ever emitted) fully constant-folds; once a jump references
    // `end_label`, the result has to be materialised at runtime even if
    // a later operand settled the outcome early.
    if let (Some(truth), None) = (decided, end_label) {
        *e = ExprDesc::constant(Type::Bool, truth as i64);
        e.set_tested();
        return;
    }

    if let Some(truth) = decided {
        let label = end_label.expect("a jump was emitted, so the label exists");
        ctx.code.get_immediate(byte(), truth as i64);
        ctx.labels.def_code_label(label);
        *e = ExprDesc::new();
        e.ty = Type::Bool;
        e.location = Location::Primary;
        e.ref_type = RefType::RValue;
        e.set_tested();
        return;
    }

    // `&&`/`||` falling through means every operand was const and
    // agreed on the non-short-circuit truth value: fold the whole
    // chain, no jump was ever emitted to materialise at runtime.
    let Some(label) = end_label else {
        *e = ExprDesc::constant(Type::Bool, is_and as i64);
        e.set_tested();
        return;
    };

    // at least one operand was evaluated at runtime and reached this
    // point unresolved: the chain's value is whichever side last
    // evaluated truthy/falsy, normalised to 0/1.
    let fall_through_value = is_and as i64; // && falling through means "all true"
    let tail_label = ctx.labels.get_local_label();
    ctx.code.get_immediate(byte(), fall_through_value);
    ctx.code.jump(tail_label);
    ctx.labels.def_code_label(label);
    ctx.code.get_immediate(byte(), (!is_and) as i64);
    ctx.labels.def_code_label(tail_label);

    *e = ExprDesc::new();
    e.ty = Type::Bool;
    e.location = Location::Primary;
    e.ref_type = RefType::RValue;
    e.set_tested();
}

/// `#if`-constant-expression logical chaining: no codegen collaborator
/// may be touched, so every operand is required to fold to a constant
/// and the whole chain collapses to a single `ExprDesc::constant`.
fn preprocessing_chain(
    ctx: &mut Context,
    e: &mut ExprDesc,
    token: TokenKind,
    is_and: bool,
    next: fn(&mut Context, &mut ExprDesc),
) {
    let mut acc = if e.is_const() {
        const_truth(e)
    } else {
        ctx.diag.error("preprocessor expression is not an integer constant");
        false
    };
    let mut decided = acc == !is_and;
    while ctx.tokens.cur().kind == token {
        ctx.tokens.advance();
        let mut operand = ExprDesc::new();
        next(ctx, &mut operand);
        if decided {
            continue;
        }
        if !operand.is_const() {
            ctx.diag.error("preprocessor expression is not an integer constant");
            continue;
        }
        let truth = const_truth(&operand);
        acc = if is_and { acc && truth } else { acc || truth };
        decided = acc == !is_and;
    }
    *e = ExprDesc::constant(Type::Bool, acc as i64);
}

/// `hie4` — logical OR.
pub fn logor(ctx: &mut Context, e: &mut ExprDesc) {
    chain(ctx, e, TokenKind::PipePipe, false, logand);
}

/// `hie5` — logical AND.
pub fn logand(ctx: &mut Context, e: &mut ExprDesc) {
    chain(ctx, e, TokenKind::AmpAmp, true, super::hie6);
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
    fn false_and_short_circuits_without_evaluating_rhs_side_effects() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("0 && (a = 1)");
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
        logand(&mut ctx, &mut e);
        assert!(e.is_const());
        assert_eq!(e.ival, 0);
    }

    #[test]
    fn preprocessing_mode_never_touches_codegen() {
        let config = Config::new().with_preprocessing(true);
        let mut tokens = VecTokenSource::new("1 && 1");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mark = ctx.mark();
        let mut e = ExprDesc::new();
        logand(&mut ctx, &mut e);
        assert!(e.is_const());
        assert_eq!(e.ival, 1);
        assert!(ctx.code.code_range_is_empty(mark, ctx.mark()));
    }
}
