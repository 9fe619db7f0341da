//! Postfix chain: `[]`, `()`, `.`, `->`, and postfix `++`/`--`
//! (§4.4, with the postfix-increment cases of §4.5).

use crate::codegen::instr::EmitFlags;
use crate::context::Context;
use crate::deferred::DeferredKind;
use crate::exprdesc::{ExprDesc, ExprFlags, Location, RefType};
use crate::parser::primary::{expect, primary};
use crate::token::TokenKind;
use crate::types::Type;

pub fn postfix(ctx: &mut Context, e: &mut ExprDesc) {
    primary(ctx, e);
    loop {
        match ctx.tokens.cur().kind {
            TokenKind::LBracket => subscript(ctx, e),
            TokenKind::LParen => super::call::call(ctx, e),
            TokenKind::Dot => member(ctx, e, false),
            TokenKind::Arrow => member(ctx, e, true),
            TokenKind::PlusPlus => {
                ctx.tokens.advance();
                postfix_step(ctx, e, DeferredKind::PostInc);
            }
            TokenKind::MinusMinus => {
                ctx.tokens.advance();
                postfix_step(ctx, e, DeferredKind::PostDec);
            }
            _ => break,
        }
    }
}

/// `E[S]` (§4.4). One side must be pointer/array class, the other
/// integer class. If the base address is quasi-constant the load is
/// delayed so an all-constant subscript folds entirely into an
/// immediate offset.
fn subscript(ctx: &mut Context, e: &mut ExprDesc) {
    ctx.tokens.advance(); // consume '['
    let elem_ty = match &e.ty {
        Type::Ptr { pointee, .. } => (**pointee).clone(),
        Type::Array { element, .. } => (**element).clone(),
        _ => {
            ctx.diag.error("subscripted value is not an array or pointer");
            Type::INT
        }
    };
    let elem_size = if elem_ty.is_complete() { elem_ty.size_of().max(1) } else { 1 };

    let base_quasi_const = e.is_quasi_const();
    if !base_quasi_const {
        crate::parser::unary::load_into_primary(ctx, e);
        ctx.code.push(EmitFlags::for_width(crate::types::IntWidth::Word, true));
    }

    let mut index = ExprDesc::new();
    crate::parser::hie0(ctx, &mut index);
    expect(ctx, &TokenKind::RBracket, "]");

    if !index.ty.is_int_class() {
        ctx.diag.error("array subscript is not an integer");
    }

    if base_quasi_const && index.is_const() {
        // entire address folds to an immediate offset
        e.ival += index.ival * elem_size as i64;
    } else if base_quasi_const {
        // The base address is statically known but not foldable into an
        // immediate (the index isn't constant): the address still has to
        // be materialised and added to the scaled index (§4.4).
        let mut base_addr = e.clone();
        base_addr.flags.insert(ExprFlags::ADDRESS_OF);
        let word = EmitFlags::for_width(crate::types::IntWidth::Word, true);

        // Special case (§4.4): char index, element size 1 -> favour a
        // single-byte add-addressing-mode by reversing operand order.
        if elem_size == 1
            && index.is_quasi_const()
            && matches!(index.ty, Type::Int { width: crate::types::IntWidth::Byte, .. })
        {
            crate::parser::unary::load_into_primary(ctx, &index);
            ctx.code.push(word);
            crate::parser::unary::load_into_primary(ctx, &base_addr);
        } else {
            crate::parser::unary::load_into_primary(ctx, &base_addr);
            ctx.code.push(word);
            crate::parser::unary::load_into_primary(ctx, &index);
            if elem_size != 1 {
                let _ = ctx.code.scale(word, elem_size);
            }
        }
        ctx.code.add(word);
        *e = ExprDesc::new();
        e.ty = elem_ty.clone();
        e.location = Location::Expr;
        e.ref_type = RefType::LValue;
    } else {
        crate::parser::unary::load_into_primary(ctx, &index);
        if elem_size != 1 {
            let _ = ctx.code.scale(EmitFlags::for_width(crate::types::IntWidth::Word, true), elem_size);
        }
        // the scaled index is in the primary; `add` consumes the pushed
        // base off the runtime stack directly (no separate pop needed).
        ctx.code.add(EmitFlags::for_width(crate::types::IntWidth::Word, true));
        *e = ExprDesc::new();
        e.ty = elem_ty;
        e.location = Location::Expr;
        e.ref_type = RefType::LValue;
    }
}

/// `.` / `->` (§4.4). `->` decays an array base first.
fn member(ctx: &mut Context, e: &mut ExprDesc, arrow: bool) {
    ctx.tokens.advance();
    let name = match ctx.tokens.cur().kind.clone() {
        TokenKind::Ident(n) => {
            ctx.tokens.advance();
            n
        }
        _ => {
            ctx.diag.error("expected a field name");
            return;
        }
    };

    let record_ty = if arrow {
        match &e.ty {
            Type::Ptr { pointee, .. } => (**pointee).clone(),
            Type::Array { element, .. } => (**element).clone(),
            other => other.clone(),
        }
    } else {
        e.ty.clone()
    };

    let Type::Record(layout) = &record_ty else {
        ctx.diag.error("member reference on a non-struct/union value");
        return;
    };

    let Some(field) = layout.field(&name) else {
        ctx.diag.error(format!("no member named '{name}' in '{record_ty}'"));
        return;
    };
    let field = field.clone();

    if !arrow && e.ref_type == RefType::RValue && e.location == Location::Primary {
        // whole struct/union sits in the primary (replacement type): the
        // field is extracted by a shift-and-mask over byte and, for
        // bit-fields, bit offset/width (§4.4).
        let shift = field.byte_offset * 8;
        if shift > 0 {
            ctx.code.asr(EmitFlags::for_width(crate::types::IntWidth::Long, true));
        }
        if let Some((bit_off, bit_width)) = field.bit_field {
            let mask = (1i64 << bit_width) - 1;
            ctx.code.get_immediate(EmitFlags::for_width(crate::types::IntWidth::Long, true), mask << bit_off);
            ctx.code.and(EmitFlags::for_width(crate::types::IntWidth::Long, true));
        }
        e.ty = field.ty;
        e.location = Location::Primary;
        e.ref_type = RefType::RValue;
        return;
    }

    // The struct is addressable: the field becomes an lvalue at
    // `base + field_offset`.
    e.ival += field.byte_offset as i64;
    e.ty = field.ty.clone();
    if field.bit_field.is_some() {
        e.flags.insert(ExprFlags::BITFIELD);
        let (bit_off, bit_width) = field.bit_field.unwrap();
        e.bit_field = Some(crate::exprdesc::BitField { bit_offset: bit_off, bit_width });
    }
    e.ref_type = RefType::LValue;
    if e.ty.is_array() {
        e.ref_type = RefType::RValue;
        e.flags.insert(ExprFlags::ADDRESS_OF);
    }
}

fn postfix_step(ctx: &mut Context, e: &mut ExprDesc, kind: DeferredKind) {
    if e.ref_type != RefType::LValue {
        ctx.diag.error("postfix increment/decrement requires an lvalue");
        return;
    }
    crate::parser::unary::load_into_primary(ctx, e);
    let snapshot = e.clone();
    ctx.deferred.push(snapshot, kind);
    e.location = Location::Primary;
    e.ref_type = RefType::RValue;
}
