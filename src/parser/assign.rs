//! Assignment operators, simple and compound (§4.7).

use crate::codegen::instr::EmitFlags;
use crate::context::Context;
use crate::exprdesc::{ExprDesc, Location, RefType};
use crate::generators::Generator;
use crate::parser::unary::{load_into_primary, store};
use crate::token::TokenKind;
use crate::types::{IntWidth, Type};

fn word() -> EmitFlags {
    EmitFlags::for_width(IntWidth::Word, true)
}

fn flags_for(ty: &Type) -> EmitFlags {
    match ty {
        Type::Int { width, signed } => EmitFlags::for_width(*width, *signed),
        _ => word(),
    }
}

fn pointee_size(ty: &Type) -> i64 {
    match ty {
        Type::Ptr { pointee, .. } if pointee.is_complete() => pointee.size_of().max(1) as i64,
        _ => 1,
    }
}

enum Kind {
    Simple,
    AddSub(bool),
    Table(&'static Generator),
}

fn find(table: &'static [Generator], token: &TokenKind) -> &'static Generator {
    table.iter().find(|g| &g.token == token).expect("token already matched this table")
}

fn kind_for(token: &TokenKind) -> Option<Kind> {
    Some(match token {
        TokenKind::Assign => Kind::Simple,
        TokenKind::PlusEq => Kind::AddSub(false),
        TokenKind::MinusEq => Kind::AddSub(true),
        TokenKind::StarEq | TokenKind::SlashEq | TokenKind::PercentEq => {
            Kind::Table(find(crate::generators::MULTIPLICATIVE, token))
        }
        TokenKind::AmpEq => Kind::Table(find(crate::generators::BIT_AND, token)),
        TokenKind::CaretEq => Kind::Table(find(crate::generators::BIT_XOR, token)),
        TokenKind::PipeEq => Kind::Table(find(crate::generators::BIT_OR, token)),
        TokenKind::ShlEq | TokenKind::ShrEq => Kind::Table(find(crate::generators::SHIFT, token)),
        _ => return None,
    })
}

/// `hie1` — assignment, the loosest-binding level below the comma
/// operator. Right-associative: the rhs of any assignment is itself
/// parsed as an assignment-expression.
pub fn assign(ctx: &mut Context, e: &mut ExprDesc) {
    super::ternary::ternary(ctx, e, super::logical::logor);

    let Some(kind) = kind_for(&ctx.tokens.cur().kind) else { return };
    ctx.tokens.advance();

    if e.ref_type != RefType::LValue {
        ctx.diag.error("assignment requires an lvalue");
        return;
    }
    if e.ty.is_const_qualified() {
        ctx.diag.error("assignment to a const-qualified lvalue");
    }

    let lhs = e.clone();
    match kind {
        Kind::Simple => simple_assign(ctx, &lhs, e),
        Kind::AddSub(minus) => add_sub_assign(ctx, &lhs, minus, e),
        Kind::Table(gen) => generic_assign(ctx, &lhs, gen, e),
    }
}

/// `lhs = rhs` (§4.7): parse rhs recursively (right-associative), adjust
/// it to the lvalue's type, and store. Coercion here is limited to the
/// width/signedness conversion `typeadjust` already performs elsewhere
/// in this cascade; the broader semantic checks (struct assignability,
/// qualifier compatibility beyond `const`) live in the declaration-level
/// collaborator this delegates to.
fn simple_assign(ctx: &mut Context, lhs: &ExprDesc, e: &mut ExprDesc) {
    let mut rhs = ExprDesc::new();
    assign(ctx, &mut rhs);

    if !lhs.ty.is_scalar() && !lhs.ty.is_record() {
        ctx.diag.error("assignment to a non-scalar, non-struct/union lvalue");
    }

    load_into_primary(ctx, &rhs);
    if lhs.ty != rhs.ty {
        ctx.code.typeadjust(&rhs.ty, &lhs.ty);
    }
    store(ctx, lhs, None);
    finish(e, lhs);
}

/// Global/static/stack locations the `addeq_*`/`subeq_*` instruction
/// family can target directly by name/offset. Register, `Primary` and
/// `Expr` have no dedicated in-memory form and always take the generic
/// path below.
fn dedicated_add_sub(ctx: &mut Context, lhs: &ExprDesc, minus: bool, delta: i64) -> bool {
    let flags = flags_for(&lhs.ty);
    match &lhs.location {
        Location::Global { name, offset } | Location::Static { label: name, offset } => {
            if minus {
                ctx.code.subeq_static(flags, name, *offset, delta);
            } else {
                ctx.code.addeq_static(flags, name, *offset, delta);
            }
            true
        }
        Location::Stack(offset) => {
            if minus {
                ctx.code.subeq_local(flags, *offset, delta);
            } else {
                ctx.code.addeq_local(flags, *offset, delta);
            }
            true
        }
        _ => false,
    }
}

fn combine_add_sub(ctx: &mut Context, lhs: &ExprDesc, minus: bool, scale: i64) {
    if scale != 1 {
        let _ = ctx.code.scale(word(), scale as u32);
    }
    if minus {
        ctx.code.sub(flags_for(&lhs.ty));
    } else {
        ctx.code.add(flags_for(&lhs.ty));
    }
}

/// `+=`/`-=` (§4.7). Global/static/stack lvalues — the locations
/// `addeq_*`/`subeq_*` can target directly by name/offset — try the
/// dedicated in-memory instruction first, which only works for a
/// compile-time-constant rhs; everything else (a non-constant rhs, or
/// the lvalue sitting in a register, the primary, or behind a pointer
/// already in the primary) takes the generic push/load/combine/store
/// path, with the lvalue always materialised before rhs is parsed.
fn add_sub_assign(ctx: &mut Context, lhs: &ExprDesc, minus: bool, e: &mut ExprDesc) {
    if !lhs.ty.is_int_class() && !lhs.ty.is_ptr() {
        ctx.diag.error("compound assignment requires an integer or pointer lvalue");
    }
    let scale = pointee_size(&lhs.ty);
    let dedicated_capable = matches!(lhs.location, Location::Global { .. } | Location::Static { .. } | Location::Stack(_));

    if dedicated_capable {
        let mark = ctx.mark();
        let mut rhs = ExprDesc::new();
        assign(ctx, &mut rhs);
        if !rhs.ty.is_int_class() {
            ctx.diag.error("right operand of a compound assignment must be an integer");
        }
        if rhs.is_const() {
            // rhs folded to a constant, so parsing it emitted nothing:
            // this is a no-op truncation back to `mark`, kept for
            // symmetry with every other constant-rhs elision site.
            ctx.code.remove_code(mark);
            dedicated_add_sub(ctx, lhs, minus, rhs.ival * scale);
            finish(e, lhs);
            return;
        }
        // rhs has a runtime value and no side effect loading a
        // global/static/local lvalue could possibly reorder past: load
        // lhs now and combine.
        load_into_primary(ctx, lhs);
        ctx.code.push(flags_for(&lhs.ty));
        load_into_primary(ctx, &rhs);
        combine_add_sub(ctx, lhs, minus, scale);
        store(ctx, lhs, None);
        finish(e, lhs);
        return;
    }

    // Register / Primary / behind-a-pointer lvalue: always materialise
    // before rhs, since loading it (`Expr` dereferences a pointer that
    // may itself have side effects) must happen first.
    super::push_addr(ctx, lhs);
    load_into_primary(ctx, lhs);
    ctx.code.push(flags_for(&lhs.ty));

    let mut rhs = ExprDesc::new();
    assign(ctx, &mut rhs);
    if !rhs.ty.is_int_class() {
        ctx.diag.error("right operand of a compound assignment must be an integer");
    }

    load_into_primary(ctx, &rhs);
    combine_add_sub(ctx, lhs, minus, scale);
    store(ctx, lhs, None);
    finish(e, lhs);
}

/// `*=`, `/=`, `%=`, `&=`, `^=`, `|=`, `<<=`, `>>=` (§4.7 generic path):
/// push the lvalue's address if it's behind a pointer, load the current
/// value, push it, parse rhs, patch out the push for a constant rhs on a
/// `NoPush` row (the immediate form replaces it), otherwise load rhs and
/// emit the register form. Store the combined result back.
fn generic_assign(ctx: &mut Context, lhs: &ExprDesc, gen: &'static Generator, e: &mut ExprDesc) {
    if !lhs.ty.is_int_class() {
        ctx.diag.error("compound assignment requires an integer lvalue");
    }

    super::push_addr(ctx, lhs);
    load_into_primary(ctx, lhs);
    // marked right before the value push, so eliding it for a NO_PUSH
    // constant rhs leaves lhs resident in the primary (and any address
    // pushed above it intact).
    let value_push_mark = ctx.mark();
    ctx.code.push(flags_for(&lhs.ty));

    let mut rhs = ExprDesc::new();
    assign(ctx, &mut rhs);
    if !rhs.ty.is_int_class() {
        ctx.diag.error("right operand of a compound assignment must be an integer");
    }

    if rhs.is_const() && gen.flags.contains(crate::generators::GenFlags::NO_PUSH) {
        ctx.code.remove_code(value_push_mark);
        (gen.emit_imm)(ctx, flags_for(&lhs.ty).with_const(), rhs.ival);
        store(ctx, lhs, None);
        finish(e, lhs);
        return;
    }

    load_into_primary(ctx, &rhs);
    (gen.emit)(ctx, flags_for(&lhs.ty));
    store(ctx, lhs, None);
    finish(e, lhs);
}

fn finish(e: &mut ExprDesc, lhs: &ExprDesc) {
    *e = ExprDesc::new();
    e.ty = lhs.ty.clone();
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

    #[test]
    fn simple_assignment_stores_into_a_local() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a = 5");
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
        assign(&mut ctx, &mut e);
        assert_eq!(e.location, Location::Primary);
        assert_eq!(e.ref_type, RefType::RValue);
        assert!(ctx.code.lines().iter().any(|l| l.0.starts_with("st") && l.0.contains("frame")));
    }

    #[test]
    fn add_assign_on_a_global_uses_the_dedicated_instruction_for_a_constant_rhs() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("g += 3");
        let mut symtab = TestSymbolTable::new();
        symtab.add_global(SymEntry {
            name: "g".into(),
            ty: Type::INT,
            storage: StorageClass::Global,
            offset: 0,
            const_value: None,
            is_const: false,
        });
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        assign(&mut ctx, &mut e);
        assert!(ctx.code.lines().iter().any(|l| l.0.starts_with("addeq")));
        assert!(!ctx.code.lines().iter().any(|l| l.0.starts_with("push")));
    }

    #[test]
    fn add_assign_on_a_pointer_scales_the_constant_delta_by_pointee_size() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("p += 3");
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
        assign(&mut ctx, &mut e);
        assert!(ctx.code.lines().iter().any(|l| l.0.starts_with("addeq") && l.0.contains('6')));
    }

    #[test]
    fn multiply_assign_falls_back_to_the_generic_push_load_combine_path() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a *= b");
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
        assign(&mut ctx, &mut e);
        assert!(ctx.code.lines().iter().any(|l| l.0.starts_with("push")));
        assert!(ctx.code.lines().iter().any(|l| l.0.starts_with("mul")));
        assert_eq!(e.location, Location::Primary);
    }

    #[test]
    fn assignment_to_a_non_lvalue_is_an_error() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("1 = 2");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        assign(&mut ctx, &mut e);
        assert_eq!(ctx.diag.error_count(), 1);
    }

    #[test]
    fn assignment_is_right_associative() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("a = b = 1");
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
        assign(&mut ctx, &mut e);
        // both locals end up stored; no leftover runtime value other
        // than the rightmost assignment's.
        assert_eq!(e.ty, Type::INT);
        assert_eq!(e.location, Location::Primary);
    }
}
