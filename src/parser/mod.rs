//! The precedence cascade (§4.1) and the external interface the
//! declaration/statement parser reaches into (§6): the named
//! `hie0`..`hie10` entry points, `Expression0`, `BoolExpr`,
//! `NoCodeConstExpr`/`NoCodeConstAbsIntExpr`, and `PushAddr`.
//!
//! `hie3` has no entry point of its own — the same gap exists in the
//! cascade this is modelled on — so the named levels run
//! 0, 1, 2, 4, 5, 6, 7, 8, 9, 10; bitwise xor/and sit between `hie6` and
//! `hie7` without names of their own, reached only through `hie6`.

pub mod additive;
pub mod assign;
pub mod call;
pub mod comparison;
pub mod logical;
pub mod postfix;
pub mod primary;
pub mod ternary;
pub mod unary;

pub use assign::assign;

use crate::codegen::instr::EmitFlags;
use crate::context::Context;
use crate::errors::InternalError;
use crate::exprdesc::ExprDesc;
use crate::types::{IntWidth, Type};

fn word() -> EmitFlags {
    EmitFlags::for_width(IntWidth::Word, true)
}

/// `hie0` — comma, the loosest-binding level of all (§4.1, §4.11: each
/// comma is itself a sequence point).
pub fn hie0(ctx: &mut Context, e: &mut ExprDesc) {
    assign(ctx, e);
    while ctx.tokens.cur().kind == crate::token::TokenKind::Comma {
        ctx.tokens.advance();
        ctx.do_deferred();
        // the discarded lhs may have had side effects already emitted;
        // only its value is thrown away.
        *e = ExprDesc::new();
        assign(ctx, e);
    }
}

/// `hie1` — assignment (see [`assign`]).
pub fn hie1(ctx: &mut Context, e: &mut ExprDesc) {
    assign(ctx, e)
}

/// `hie2` — ternary conditional.
pub fn hie2(ctx: &mut Context, e: &mut ExprDesc) {
    ternary::ternary(ctx, e, logical::logor)
}

/// `hie4` — logical OR.
pub fn hie4(ctx: &mut Context, e: &mut ExprDesc) {
    logical::logor(ctx, e)
}

/// `hie5` — logical AND.
pub fn hie5(ctx: &mut Context, e: &mut ExprDesc) {
    logical::logand(ctx, e)
}

/// `hie6` — bitwise OR, chaining down through the unnamed bitwise
/// xor/and levels to equality.
pub fn hie6(ctx: &mut Context, e: &mut ExprDesc) {
    crate::generators::dispatch(ctx, e, crate::generators::BIT_OR, bitxor)
}

fn bitxor(ctx: &mut Context, e: &mut ExprDesc) {
    crate::generators::dispatch(ctx, e, crate::generators::BIT_XOR, bitand)
}

fn bitand(ctx: &mut Context, e: &mut ExprDesc) {
    crate::generators::dispatch(ctx, e, crate::generators::BIT_AND, comparison::equality)
}

/// `hie7` — equality.
pub fn hie7(ctx: &mut Context, e: &mut ExprDesc) {
    comparison::equality(ctx, e)
}

/// `hie8` — relational.
pub fn hie8(ctx: &mut Context, e: &mut ExprDesc) {
    comparison::relational(ctx, e)
}

/// `hie9` — additive.
pub fn hie9(ctx: &mut Context, e: &mut ExprDesc) {
    additive::additive(ctx, e)
}

/// `hie10` — unary-and-postfix, the tightest-binding named level.
pub fn hie10(ctx: &mut Context, e: &mut ExprDesc) {
    unary::unary(ctx, e)
}

/// `Expression0` (§6): parse a full expression, load the result
/// into the primary register, and settle every deferred post-inc/dec —
/// the shape every full-expression statement boundary requires (§4.11).
pub fn expression0(ctx: &mut Context, e: &mut ExprDesc) {
    let entry = ctx.enter();
    hie0(ctx, e);
    unary::load_into_primary(ctx, e);
    ctx.do_deferred();
    ctx.check_deferred_all_done();
    ctx.leave(entry);
}

/// `BoolExpr` (§6): delegate to `func` and require the result be
/// boolean-convertible (any scalar), for contexts that will immediately
/// branch on it (`if`, `while`, the first operand of `for`'s condition).
pub fn bool_expr(ctx: &mut Context, e: &mut ExprDesc, func: fn(&mut Context, &mut ExprDesc)) {
    func(ctx, e);
    if !e.ty.is_scalar() {
        ctx.diag.error("used a non-scalar value where a boolean expression was expected");
    }
}

/// `NoCodeConstExpr` (§6): require a constant that emitted no
/// code — e.g. an array bound or a `case` label.
pub fn no_code_const_expr(ctx: &mut Context, e: &mut ExprDesc) {
    let mark = ctx.mark();
    hie2(ctx, e);
    if !e.is_const() {
        ctx.diag.error("expression is not constant");
        *e = ExprDesc::constant(e.ty.clone(), 1);
    }
    if !ctx.code.code_range_is_empty(mark, ctx.mark()) {
        ctx.diag.internal(InternalError::Invariant("constant expression emitted code".into()));
    }
}

/// `NoCodeConstAbsIntExpr` (§6): as [`no_code_const_expr`], but
/// further requires an absolute (non-relocatable) integer constant —
/// no `&global` or string-literal address is acceptable here.
pub fn no_code_const_abs_int_expr(ctx: &mut Context, e: &mut ExprDesc) {
    no_code_const_expr(ctx, e);
    if !e.ty.is_int_class() || e.flags.contains(crate::exprdesc::ExprFlags::ADDRESS_OF) {
        ctx.diag.error("expression is not an absolute integer constant");
        *e = ExprDesc::constant(Type::INT, 1);
    }
}

/// `PushAddr` (§6): push the address of an indirect (`Expr`
/// -located) lvalue so a later read-modify-write can store back through
/// it; a no-op for every other location, which is addressable by
/// name/offset without needing the runtime stack at all.
pub fn push_addr(ctx: &mut Context, e: &ExprDesc) {
    if e.location == crate::exprdesc::Location::Expr {
        ctx.code.push(word());
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

    #[test]
    fn comma_drains_deferred_ops_at_each_comma_and_keeps_the_last_value() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a++, b");
        let mut symtab = TestSymbolTable::new();
        symtab.add_local(SymEntry {
            name: "a".into(),
            ty: Type::INT,
            storage: StorageClass::Auto,
            offset: -2,
            const_value: None,
            is_const: false,
        });
        symtab.add_local(SymEntry {
            name: "b".into(),
            ty: Type::INT,
            storage: StorageClass::Auto,
            offset: -4,
            const_value: None,
            is_const: false,
        });
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        hie0(&mut ctx, &mut e);
        assert_eq!(ctx.deferred_op_count(), 0);
        assert_eq!(e.ty, Type::INT);
    }

    #[test]
    fn bitwise_precedence_chains_down_to_equality() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("1 | 2 & 3");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mark = ctx.mark();
        let mut e = ExprDesc::new();
        hie6(&mut ctx, &mut e);
        // `&` binds tighter than `|`: 1 | (2 & 3) == 3
        assert!(e.is_const());
        assert_eq!(e.ival, 3);
        assert!(ctx.code.code_range_is_empty(mark, ctx.mark()));
    }

    #[test]
    fn expression0_settles_a_post_increment_before_returning() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a++");
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
        expression0(&mut ctx, &mut e);
        assert_eq!(ctx.deferred_op_count(), 0);
        assert!(ctx.code.lines().iter().any(|l| l.0.starts_with("addeq")));
    }

    #[test]
    fn no_code_const_expr_accepts_a_folded_constant() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("2 + 2");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        no_code_const_expr(&mut ctx, &mut e);
        assert_eq!(e.ival, 4);
        assert_eq!(ctx.diag.error_count(), 0);
    }

    #[test]
    fn no_code_const_expr_rejects_a_runtime_value() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a");
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
        no_code_const_expr(&mut ctx, &mut e);
        assert_eq!(ctx.diag.error_count(), 1);
    }
}
