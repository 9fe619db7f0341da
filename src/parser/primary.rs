//! Primary expressions (§4.3).

use crate::context::Context;
use crate::exprdesc::{ExprDesc, ExprFlags, Location, RefType};
use crate::symtab::{StorageClass, SymEntry};
use crate::token::TokenKind;
use crate::types::{FuncSig, Type};
use std::rc::Rc;

/// Parse a primary expression: the base case of the whole cascade.
pub fn primary(ctx: &mut Context, e: &mut ExprDesc) {
    *e = ExprDesc::new();
    match ctx.tokens.cur().kind.clone() {
        TokenKind::IntConst(v) => {
            e.ty = if v > i32::MAX as i64 || v < i32::MIN as i64 { Type::LONG } else { Type::INT };
            e.ival = v;
            ctx.tokens.advance();
        }
        TokenKind::CharConst(v) => {
            e.ty = Type::INT; // a char constant has type int in C
            e.ival = v;
            ctx.tokens.advance();
        }
        TokenKind::FloatConst(v) => {
            e.ty = Type::Float;
            e.fval = v;
            ctx.tokens.advance();
        }
        TokenKind::StringConst(s) => {
            let label = ctx.literals.use_literal(s.as_bytes());
            e.ty = Type::ptr_to(Type::CHAR);
            e.location = Location::Literal(label.clone());
            e.ref_type = RefType::RValue;
            e.flags.insert(ExprFlags::ADDRESS_OF);
            e.name = Some(label);
            ctx.tokens.advance();
        }
        TokenKind::LParen => {
            ctx.tokens.advance();
            crate::parser::hie0(ctx, e);
            expect(ctx, &TokenKind::RParen, ")");
        }
        TokenKind::AndAnd if ctx.config.standard.allows_label_address() => {
            ctx.tokens.advance();
            if let TokenKind::Ident(name) = ctx.tokens.cur().kind.clone() {
                ctx.tokens.advance();
                e.ty = Type::ptr_to(Type::Void);
                e.location = Location::Code(name.clone());
                e.ref_type = RefType::RValue;
                e.flags.insert(ExprFlags::ADDRESS_OF);
                e.name = Some(name);
            } else {
                ctx.diag.error("expected a label name after '&&'");
            }
        }
        TokenKind::Ident(name) => parse_identifier(ctx, e, &name),
        TokenKind::KwAsm => parse_inline_asm(ctx, e),
        _ => {
            ctx.diag.error(format!("unexpected token {:?} in expression", ctx.tokens.cur().kind));
            // safe replacement: constant int 1 (§7).
            e.ty = Type::INT;
            e.ival = 1;
        }
    }
}

fn parse_identifier(ctx: &mut Context, e: &mut ExprDesc, name: &str) {
    // Pseudo-variables for the machine's own registers (§4.3).
    match name {
        "__A__" => {
            ctx.tokens.advance();
            e.ty = Type::UCHAR;
            e.location = Location::Primary;
            e.ref_type = RefType::LValue;
            return;
        }
        "__AX__" => {
            ctx.tokens.advance();
            e.ty = Type::UINT;
            e.location = Location::Primary;
            e.ref_type = RefType::LValue;
            return;
        }
        "__EAX__" => {
            ctx.tokens.advance();
            e.ty = Type::ULONG;
            e.location = Location::Primary;
            e.ref_type = RefType::LValue;
            return;
        }
        _ => {}
    }

    let found = ctx.symtab.find(name).cloned();
    ctx.tokens.advance();
    match found {
        None => {
            if ctx.tokens.cur().kind == TokenKind::LParen {
                // implicit function declaration (§4.3)
                if ctx.config.standard.implicit_decl_is_error() {
                    ctx.diag.error(format!("implicit declaration of function '{name}'"));
                } else {
                    ctx.diag.warning(format!("implicit declaration of function '{name}'"));
                }
                let sig = FuncSig { params: vec![], variadic: true, ret: Box::new(Type::INT), fastcall: false };
                e.ty = Type::Func(Rc::new(sig));
                e.location = Location::Global { name: name.to_string(), offset: 0 };
                e.ref_type = RefType::RValue;
                e.flags.insert(ExprFlags::ADDRESS_OF);
                e.name = Some(name.to_string());
                ctx.symtab.add_global(SymEntry {
                    name: name.to_string(),
                    ty: e.ty.clone(),
                    storage: StorageClass::Function,
                    offset: 0,
                    const_value: None,
                    is_const: false,
                });
            } else {
                ctx.diag.error(format!("'{name}' undeclared"));
                e.ty = Type::INT;
                e.ival = 1;
            }
        }
        Some(sym) => place_symbol(ctx, e, &sym),
    }
}

fn place_symbol(ctx: &mut Context, e: &mut ExprDesc, sym: &SymEntry) {
    e.ty = sym.ty.clone();
    e.name = Some(sym.name.clone());
    match sym.storage {
        StorageClass::EnumConst => {
            e.location = Location::None;
            e.ref_type = RefType::RValue;
            e.ival = sym.const_value.unwrap_or(0);
        }
        StorageClass::Function => {
            e.location = Location::Global { name: sym.name.clone(), offset: 0 };
            e.ref_type = RefType::RValue;
            e.flags.insert(ExprFlags::ADDRESS_OF);
        }
        StorageClass::Auto => {
            e.location = Location::Stack(sym.offset);
            e.ref_type = RefType::LValue;
        }
        StorageClass::Register => {
            e.location = Location::Register(sym.offset as u16);
            e.ref_type = RefType::LValue;
        }
        StorageClass::Static => {
            e.location = Location::Static { label: sym.name.clone(), offset: 0 };
            e.ref_type = RefType::LValue;
        }
        StorageClass::Global => {
            e.location = Location::Global { name: sym.name.clone(), offset: 0 };
            e.ref_type = RefType::LValue;
        }
        StorageClass::VariadicParam => {
            ctx.code.leavariadic(sym.offset.unsigned_abs());
            e.location = Location::Expr;
            e.ref_type = RefType::LValue;
        }
    }
    if sym.is_const {
        // caller-visible via type checks in assignment; nothing more to
        // do here, the `const` bit lives on the symbol, not ExprDesc.
    }
    // Arrays and functions automatically become address-of rvalues
    // (§4.4 last sentence).
    if e.ty.is_array() || e.ty.is_func() {
        e.ref_type = RefType::RValue;
        e.flags.insert(ExprFlags::ADDRESS_OF);
    }
}

fn parse_inline_asm(ctx: &mut Context, e: &mut ExprDesc) {
    ctx.tokens.advance();
    expect(ctx, &TokenKind::LParen, "(");
    if let TokenKind::StringConst(text) = ctx.tokens.cur().kind.clone() {
        ctx.tokens.advance();
        ctx.code.add_code_line(text);
    } else {
        ctx.diag.error("expected a string literal in asm(...)");
    }
    expect(ctx, &TokenKind::RParen, ")");
    e.ty = Type::Void;
    e.location = Location::None;
    e.flags.insert(ExprFlags::MAY_HAVE_NO_EFFECT);
}

pub fn expect(ctx: &mut Context, kind: &TokenKind, text: &str) {
    if &ctx.tokens.cur().kind == kind {
        ctx.tokens.advance();
    } else {
        ctx.diag.error(format!("expected '{text}'"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::labels::TestLabelAllocator;
    use crate::literal::TestLiteralPool;
    use crate::symtab::TestSymbolTable;
    use crate::token::VecTokenSource;

    fn fixture<'a>(
        src: &str,
        config: &'a Config,
        tokens: &'a mut VecTokenSource,
        symtab: &'a mut TestSymbolTable,
        literals: &'a mut TestLiteralPool,
        labels: &'a mut TestLabelAllocator,
    ) -> Context<'a> {
        *tokens = VecTokenSource::new(src);
        Context::new(config, tokens, symtab, literals, labels)
    }

    #[test]
    fn integer_constant_is_a_pure_constant() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = fixture("42", &config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        primary(&mut ctx, &mut e);
        assert!(e.is_const());
        assert_eq!(e.ival, 42);
        assert_eq!(e.ty, Type::INT);
    }

    #[test]
    fn string_literal_is_address_of_rvalue() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx =
            fixture("\"hi\"", &config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        primary(&mut ctx, &mut e);
        assert!(matches!(e.location, Location::Literal(_)));
        assert!(e.flags.contains(ExprFlags::ADDRESS_OF));
        assert_eq!(e.ty, Type::ptr_to(Type::CHAR));
    }

    #[test]
    fn unknown_identifier_reports_error_and_yields_safe_value() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx =
            fixture("bogus", &config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        primary(&mut ctx, &mut e);
        assert_eq!(ctx.diag.error_count(), 1);
        assert!(e.is_const());
    }

    #[test]
    fn auto_variable_is_a_stack_lvalue() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("");
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
        let mut ctx = fixture("a", &config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mut e = ExprDesc::new();
        primary(&mut ctx, &mut e);
        assert_eq!(e.location, Location::Stack(-2));
        assert_eq!(e.ref_type, RefType::LValue);
    }
}
