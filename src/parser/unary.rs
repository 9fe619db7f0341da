//! Unary operators and `sizeof` (§4.5), plus the shared
//! `load_into_primary` / `store` primitives every higher level reuses to
//! materialise or commit an `ExprDesc`, and the deferred-op drain
//! callback (§4.11).

use crate::codegen::instr::EmitFlags;
use crate::constfold::{clamp_to_type, BinOp, FoldResult};
use crate::context::Context;
use crate::deferred::{DeferredKind, DeferredOp};
use crate::exprdesc::{ExprDesc, ExprFlags, Location, RefType};
use crate::token::TokenKind;
use crate::types::{IntWidth, Type};

fn flags_for(ty: &Type) -> EmitFlags {
    match ty {
        Type::Int { width, signed } => EmitFlags::for_width(*width, *signed),
        Type::Bool => EmitFlags::for_width(IntWidth::Byte, false),
        Type::Ptr { .. } => EmitFlags::for_width(IntWidth::Word, true),
        _ => EmitFlags::for_width(IntWidth::Word, true),
    }
}

/// Bring `e`'s value into the primary register, emitting whatever load
/// its `Location` requires. A no-op if it's already there. Constants are
/// loaded as immediates; quasi-constant locations load directly; `Expr`
/// dereferences the pointer already sitting in the primary.
pub fn load_into_primary(ctx: &mut Context, e: &ExprDesc) {
    let flags = flags_for(&e.ty);
    match &e.location {
        Location::None => ctx.code.get_immediate(flags, e.ival),
        Location::Abs(addr) => ctx.code.add_code_line(format!("ld{} ${:04x}", suffix_hint(flags), addr)),
        Location::Global { name, offset } => {
            if e.flags.contains(ExprFlags::ADDRESS_OF) {
                ctx.code.lea_static(name, *offset);
            } else {
                ctx.code.get_static(flags, name, *offset);
            }
        }
        Location::Static { label, offset } => {
            if e.flags.contains(ExprFlags::ADDRESS_OF) {
                ctx.code.lea_static(label, *offset);
            } else {
                ctx.code.get_static(flags, label, *offset);
            }
        }
        Location::Register(slot) => {
            if e.flags.contains(ExprFlags::ADDRESS_OF) {
                ctx.code.lea_register(*slot);
            } else {
                ctx.code.get_register(flags, *slot);
            }
        }
        Location::Stack(offset) => {
            if e.flags.contains(ExprFlags::ADDRESS_OF) {
                ctx.code.lea_local(*offset);
            } else {
                ctx.code.get_local(flags, *offset);
            }
        }
        Location::Primary => {}
        Location::Expr => ctx.code.get_ind(flags),
        Location::Literal(label) => ctx.code.lea_static(label, e.ival as i32),
        Location::Code(label) => ctx.code.lea_static(label, 0),
    }
}

fn suffix_hint(_flags: EmitFlags) -> &'static str {
    "a"
}

/// Commit the primary register back to the location `e` denotes, as
/// `override_ty` if given or `e.ty` otherwise (§6 `Store`).
pub fn store(ctx: &mut Context, e: &ExprDesc, override_ty: Option<&Type>) {
    let ty = override_ty.unwrap_or(&e.ty);
    let flags = flags_for(ty);
    match &e.location {
        Location::Global { name, offset } => ctx.code.put_static(flags, name, *offset),
        Location::Static { label, offset } => ctx.code.put_static(flags, label, *offset),
        Location::Register(slot) => ctx.code.put_register(flags, *slot),
        Location::Stack(offset) => ctx.code.put_local(flags, *offset),
        Location::Expr => ctx.code.put_ind(flags),
        // `__A__`/`__AX__`/`__EAX__` (§4.3): the lvalue *is* the primary
        // register, so committing it back is a no-op.
        Location::Primary => {}
        other => ctx
            .diag
            .internal(crate::errors::InternalError::UnknownLocation(format!("{other:?}"))),
    }
}

/// Emit the in-memory mutation for one drained deferred op (§4.11 drain
/// protocol). Loads the saved snapshot's address mode and applies
/// `inc`/`dec` by 1 (or the pointee size for pointer types).
pub fn emit_deferred(ctx: &mut Context, op: &DeferredOp) {
    let e = &op.target;
    let by = match &e.ty {
        Type::Ptr { pointee, .. } if pointee.is_complete() => pointee.size_of() as i64,
        _ => 1,
    };
    let flags = flags_for(&e.ty);
    match &e.location {
        Location::Global { name, offset } => match op.kind {
            DeferredKind::PostInc => ctx.code.addeq_static(flags, name, *offset, by),
            DeferredKind::PostDec => ctx.code.subeq_static(flags, name, *offset, by),
        },
        Location::Static { label, offset } => match op.kind {
            DeferredKind::PostInc => ctx.code.addeq_static(flags, label, *offset, by),
            DeferredKind::PostDec => ctx.code.subeq_static(flags, label, *offset, by),
        },
        Location::Stack(offset) => match op.kind {
            DeferredKind::PostInc => ctx.code.addeq_local(flags, *offset, by),
            DeferredKind::PostDec => ctx.code.subeq_local(flags, *offset, by),
        },
        Location::Expr => match op.kind {
            DeferredKind::PostInc => ctx.code.addeq_ind(flags, by),
            DeferredKind::PostDec => ctx.code.subeq_ind(flags, by),
        },
        other => ctx
            .diag
            .internal(crate::errors::InternalError::UnknownLocation(format!("{other:?}"))),
    }
}

/// Recognise a primitive type-name keyword sequence for `sizeof(type)`.
/// Returns `None` (and consumes nothing) if the upcoming tokens don't
/// look like a type-name, so the caller falls back to parsing an
/// expression instead.
fn try_parse_type_name(ctx: &mut Context) -> Option<Type> {
    let TokenKind::Ident(word) = ctx.tokens.cur().kind.clone() else { return None };
    let mut unsigned = false;
    let mut base = match word.as_str() {
        "void" => Type::Void,
        "char" => Type::CHAR,
        "short" => Type::SHORT,
        "int" => Type::INT,
        "long" => Type::LONG,
        "unsigned" => {
            unsigned = true;
            Type::UINT
        }
        _ => return None,
    };
    ctx.tokens.advance();
    if unsigned {
        if let TokenKind::Ident(w2) = ctx.tokens.cur().kind.clone() {
            match w2.as_str() {
                "char" => {
                    base = Type::UCHAR;
                    ctx.tokens.advance();
                }
                "short" => {
                    base = Type::USHORT;
                    ctx.tokens.advance();
                }
                "long" => {
                    base = Type::ULONG;
                    ctx.tokens.advance();
                }
                "int" => {
                    ctx.tokens.advance();
                }
                _ => {}
            }
        }
    }
    while ctx.tokens.cur().kind == TokenKind::Star {
        ctx.tokens.advance();
        base = Type::ptr_to(base);
    }
    Some(base)
}

/// `sizeof` (§4.5): the operand is parsed in unevaluated mode and only
/// its type is inspected.
fn sizeof_expr(ctx: &mut Context, e: &mut ExprDesc) {
    ctx.tokens.advance(); // consume 'sizeof'
    let ty = if ctx.tokens.cur().kind == TokenKind::LParen {
        ctx.tokens.advance();
        let ty = if let Some(ty) = try_parse_type_name(ctx) {
            ty
        } else {
            let mut operand = ExprDesc::new();
            ctx.with_unevaluated(|ctx| super::hie1(ctx, &mut operand));
            operand.ty
        };
        super::primary::expect(ctx, &TokenKind::RParen, ")");
        ty
    } else {
        let mut operand = ExprDesc::new();
        ctx.with_unevaluated(|ctx| unary(ctx, &mut operand));
        if operand.flags.contains(ExprFlags::BITFIELD) {
            ctx.diag.error("sizeof applied to a bit-field is invalid");
        }
        operand.ty
    };
    if !ty.is_complete() {
        ctx.diag.error(format!("sizeof applied to incomplete type '{ty}'"));
    }
    *e = ExprDesc::new();
    e.ty = Type::ULONG; // stand-in for size_t on this target
    e.ival = ty.size_of() as i64;
}

fn unary_minus_like(ctx: &mut Context, e: &mut ExprDesc, op: BinOp, is_not: bool) {
    let promoted = e.ty.promote();
    if e.is_const() {
        let folded = if is_not {
            !(e.ival as i128) as i64
        } else {
            match crate::constfold::fold_binary(op, 0, e.ival, &promoted) {
                FoldResult::Ok(v) => v,
                FoldResult::DivByZero => unreachable!("unary fold never divides"),
            }
        };
        e.ty = promoted.clone();
        e.ival = clamp_to_type(folded as i128, &promoted);
    } else {
        load_into_primary(ctx, e);
        let flags = flags_for(&promoted);
        if is_not {
            ctx.code.com(flags);
        } else {
            ctx.code.neg(flags);
        }
        e.ty = promoted;
        e.location = Location::Primary;
        e.ref_type = RefType::RValue;
        e.flags.remove(ExprFlags::ADDRESS_OF);
    }
}

/// Entry point for precedence level 10 ("unary-and-postfix", 
/// §6 `hie10`): prefix operators, `sizeof`, or fall through to postfix.
pub fn unary(ctx: &mut Context, e: &mut ExprDesc) {
    match ctx.tokens.cur().kind {
        TokenKind::Sizeof => sizeof_expr(ctx, e),
        TokenKind::PlusPlus | TokenKind::MinusMinus => {
            let dec = ctx.tokens.cur().kind == TokenKind::MinusMinus;
            ctx.tokens.advance();
            unary(ctx, e);
            prefix_step(ctx, e, dec);
        }
        TokenKind::Star => {
            ctx.tokens.advance();
            unary(ctx, e);
            deref(ctx, e);
        }
        TokenKind::Amp => {
            ctx.tokens.advance();
            unary(ctx, e);
            address_of(ctx, e);
        }
        TokenKind::Minus => {
            ctx.tokens.advance();
            unary(ctx, e);
            if !e.ty.is_int_class() {
                ctx.diag.error("unary '-' requires an integer operand");
            }
            unary_minus_like(ctx, e, BinOp::Sub, false);
        }
        TokenKind::Plus => {
            ctx.tokens.advance();
            unary(ctx, e);
            if !e.ty.is_int_class() {
                ctx.diag.error("unary '+' requires an integer operand");
            }
            e.ty = e.ty.promote();
        }
        TokenKind::Tilde => {
            ctx.tokens.advance();
            unary(ctx, e);
            if !e.ty.is_int_class() {
                ctx.diag.error("unary '~' requires an integer operand");
            }
            unary_minus_like(ctx, e, BinOp::Xor, true);
        }
        TokenKind::Bang => {
            ctx.tokens.advance();
            unary(ctx, e);
            logical_not(ctx, e);
        }
        _ => super::postfix::postfix(ctx, e),
    }
}

fn prefix_step(ctx: &mut Context, e: &mut ExprDesc, dec: bool) {
    if e.ref_type != RefType::LValue {
        ctx.diag.error("prefix increment/decrement requires an lvalue");
        return;
    }
    let op = DeferredOp { target: e.clone(), kind: DeferredKind::PostInc };
    if dec {
        emit_deferred(ctx, &DeferredOp { target: op.target.clone(), kind: DeferredKind::PostDec });
    } else {
        emit_deferred(ctx, &op);
    }
    load_into_primary(ctx, e);
    e.location = Location::Primary;
    e.ref_type = RefType::RValue;
}

fn deref(ctx: &mut Context, e: &mut ExprDesc) {
    match &e.ty {
        Type::Ptr { pointee, .. } => {
            let pointee = (**pointee).clone();
            if pointee.is_func() {
                // dereferencing a function (pointer) is a no-op: the
                // type system treats functions and function pointers
                // alike (§4.5).
                e.ty = pointee;
                return;
            }
            // `e`'s own quasi-constness describes where the *pointer
            // variable* lives, not the runtime address it holds — that
            // value always has to be loaded before it can be used as a
            // base address (unlike array subscripting, where the base
            // address itself is what's quasi-const).
            load_into_primary(ctx, e);
            e.ty = pointee;
            e.location = Location::Expr;
            e.ref_type = RefType::LValue;
            e.flags.remove(ExprFlags::ADDRESS_OF);
        }
        Type::Func(_) => {}
        _ => ctx.diag.error("indirection requires a pointer operand"),
    }
}

fn address_of(ctx: &mut Context, e: &mut ExprDesc) {
    if e.ref_type != RefType::LValue {
        ctx.diag.error("cannot take the address of an rvalue");
        return;
    }
    if e.flags.contains(ExprFlags::BITFIELD) {
        ctx.diag.error("cannot take the address of a bit-field");
        return;
    }
    let ty = e.ty.clone();
    e.ty = Type::ptr_to(ty);
    e.ref_type = RefType::RValue;
    e.flags.insert(ExprFlags::ADDRESS_OF);
}

fn logical_not(ctx: &mut Context, e: &mut ExprDesc) {
    if !e.ty.is_scalar() {
        ctx.diag.error("'!' requires a scalar operand");
    }
    if e.flags.contains(ExprFlags::ADDRESS_OF) {
        // the address of an object is never null (§4.5).
        *e = ExprDesc::constant(Type::INT, 0);
        return;
    }
    if e.is_const() {
        let truthy = e.ival != 0;
        *e = ExprDesc::constant(Type::INT, if truthy { 0 } else { 1 });
        return;
    }
    load_into_primary(ctx, e);
    ctx.code.bneg(flags_for(&e.ty));
    e.ty = Type::INT;
    e.location = Location::Primary;
    e.ref_type = RefType::RValue;
    e.set_tested();
}
