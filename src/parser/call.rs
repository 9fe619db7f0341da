//! Function call (§4.6).

use crate::codegen::instr::EmitFlags;
use crate::context::Context;
use crate::exprdesc::{ExprDesc, ExprFlags, Location, RefType};
use crate::parser::primary::expect;
use crate::parser::unary::load_into_primary;
use crate::token::TokenKind;
use crate::types::{FuncSig, IntWidth, Type};
use std::rc::Rc;

fn word() -> EmitFlags {
    EmitFlags::for_width(IntWidth::Word, true)
}

/// Resolve the function signature behind `e`, whether it's a direct
/// function or a function pointer.
fn sig_of(e: &ExprDesc) -> Option<Rc<FuncSig>> {
    match &e.ty {
        Type::Func(sig) => Some(sig.clone()),
        Type::Ptr { pointee, .. } => match &**pointee {
            Type::Func(sig) => Some(sig.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Fastcall-ness: the last argument passes in the primary register
/// instead of on the stack. Variadic functions are never fastcall
/// (§4.6).
fn is_fastcall(ctx: &Context, sig: &FuncSig) -> bool {
    if sig.variadic {
        return false;
    }
    if sig.fastcall {
        true
    } else {
        !ctx.config.auto_cdecl
    }
}

/// Promote an argument with no prototyped parameter type to fit the
/// variadic default-argument-promotion rules (§4.6): integer promotion
/// plus array/function decay to pointer.
fn default_argument_promote(ty: &Type) -> Type {
    let decayed = ty.decay();
    decayed.promote()
}

/// `E(args...)` (§4.6).
pub fn call(ctx: &mut Context, e: &mut ExprDesc) {
    ctx.tokens.advance(); // consume '('

    let sig = sig_of(e);
    let is_indirect = matches!(e.ty, Type::Ptr { .. });
    let known_address = !is_indirect || e.is_const() || e.is_quasi_const();

    // Load the callee's address up front only when it's an indirect call
    // through a value that isn't statically known (§4.6): it must be
    // pushed and held across argument evaluation.
    let mut callee_pushed = false;
    let mut push_mark = ctx.mark();
    if is_indirect && !known_address {
        load_into_primary(ctx, e);
        push_mark = ctx.mark();
        ctx.code.push(word());
        callee_pushed = true;
    }

    let fastcall = sig.as_ref().map(|s| is_fastcall(ctx, s)).unwrap_or(false);

    let mut args = Vec::new();
    if ctx.tokens.cur().kind != TokenKind::RParen {
        loop {
            let mut arg = ExprDesc::new();
            super::assign(ctx, &mut arg);
            args.push(arg);
            if ctx.tokens.cur().kind == TokenKind::Comma {
                ctx.tokens.advance();
                // sequence point between arguments (§4.11).
                ctx.do_deferred();
            } else {
                break;
            }
        }
    }
    expect(ctx, &TokenKind::RParen, ")");

    if callee_pushed && args.is_empty() {
        // elide the push entirely: no parameters means nothing needed
        // the callee address on the stack after all (§4.6).
        ctx.code.remove_code(push_mark);
        callee_pushed = false;
        load_into_primary(ctx, e);
    }

    // Convert each argument to its declared parameter type (when a
    // prototype exists), or apply default argument promotion for the
    // variadic tail / no-prototype case.
    let param_types: Vec<Option<Type>> = (0..args.len())
        .map(|i| sig.as_ref().and_then(|s| s.params.get(i).cloned()))
        .collect();

    let frame_resident = args.len().saturating_sub(if fastcall { 1 } else { 0 });
    let preallocate = ctx.config.prefers_preallocated_frame() && frame_resident >= 2;

    // snapshot here, not at entry, so the callee-address push/pop pair
    // (already self-balanced around the call below) isn't counted
    // against the argument frame this reclaims.
    let args_stack_mark = ctx.code.stack_ptr();

    if preallocate {
        let total: u32 = args
            .iter()
            .enumerate()
            .take(if fastcall { args.len().saturating_sub(1) } else { args.len() })
            .map(|(i, a)| arg_slot_size(a, param_types[i].as_ref()))
            .sum();
        ctx.code.space(total);
        let mut offset = 0i32;
        let last = if fastcall { args.len() - 1 } else { args.len() };
        for (i, arg) in args.iter().enumerate().take(last) {
            emit_argument(ctx, arg, param_types[i].as_ref());
            ctx.code.put_local(word(), offset);
            offset += arg_slot_size(arg, param_types[i].as_ref()) as i32;
        }
        if fastcall {
            if let Some(last_arg) = args.last() {
                emit_argument(ctx, last_arg, param_types[args.len() - 1].as_ref());
            }
        }
    } else {
        let last = if fastcall { args.len().saturating_sub(1) } else { args.len() };
        for (i, arg) in args.iter().enumerate().take(last).rev() {
            emit_argument(ctx, arg, param_types[i].as_ref());
            ctx.code.push(word());
        }
        if fastcall {
            if let Some(last_arg) = args.last() {
                emit_argument(ctx, last_arg, param_types[args.len() - 1].as_ref());
            }
        }
    }

    // bytes the caller grew the stack by for this argument frame, under
    // either strategy above — reclaimed after the call returns, since
    // neither `call` nor `callind` adjusts `stack_ptr` on the callee's
    // behalf (§4.6, §8 property #1).
    let args_bytes = (ctx.code.stack_ptr() - args_stack_mark) as u32;

    // flush deferred ops again before the call, the primary already
    // holds the ABI's last fastcall argument if applicable so it's left
    // untouched here.
    ctx.do_deferred();

    if callee_pushed {
        ctx.code.pop(word());
        ctx.code.callind(word());
    } else if is_indirect {
        load_into_primary(ctx, e);
        ctx.code.callind(word());
    } else if let Some(name) = &e.name {
        ctx.code.call(name);
    } else {
        ctx.code.callind(word());
    }

    ctx.code.drop(args_bytes);

    let ret_ty = sig.as_ref().map(|s| (*s.ret).clone()).unwrap_or(Type::INT);
    *e = ExprDesc::new();
    e.ty = ret_ty;
    e.location = Location::Primary;
    e.ref_type = RefType::RValue;
}

fn arg_slot_size(arg: &ExprDesc, param_ty: Option<&Type>) -> u32 {
    let ty = param_ty.cloned().unwrap_or_else(|| default_argument_promote(&arg.ty));
    ty.replacement_type().unwrap_or(ty).size_of().max(1)
}

/// Evaluate and load one argument, converting to its parameter type (or
/// applying default promotion), with struct/union replacement-type
/// substitution (§4.6, GLOSSARY "Replacement type").
fn emit_argument(ctx: &mut Context, arg: &ExprDesc, param_ty: Option<&Type>) {
    let target_ty = param_ty.cloned().unwrap_or_else(|| default_argument_promote(&arg.ty));
    if let Some(replacement) = target_ty.replacement_type() {
        // whole struct/union by register: load its bytes as the
        // replacement integer type instead of taking its address.
        let mut by_value = arg.clone();
        by_value.flags.remove(ExprFlags::ADDRESS_OF);
        load_into_primary(ctx, &by_value);
        let _ = replacement;
        return;
    }
    if target_ty.is_record() {
        // passed by address: load the struct's address, not its value.
        let mut addr = arg.clone();
        addr.flags.insert(ExprFlags::ADDRESS_OF);
        load_into_primary(ctx, &addr);
        return;
    }
    load_into_primary(ctx, arg);
    ctx.code.typeadjust(&arg.ty, &target_ty);
}
