//! Expression parser, type checker and code emitter for a C compiler
//! targeting a small 8-bit accumulator/register-pair machine: one
//! primary register holding up to 32 bits, a hardware stack, and
//! zero-page pseudo-register slots (§1, §GLOSSARY "Primary register").
//!
//! The crate recognises the full C expression grammar (§4.1's
//! precedence cascade, comma down to primaries), performs semantic
//! analysis (type checking, usual arithmetic conversions, lvalue/rvalue
//! discipline, pointer arithmetic scaling), folds constants, and emits
//! target-assembly instructions into an output code buffer.
//!
//! Everything outside this core — the lexer, declaration/statement
//! parser, symbol table storage, the final assembly writer — is a
//! collaborator the caller supplies through the trait objects on
//! [`context::Context`] (§6 "External interfaces"). There is no file
//! format, wire protocol or CLI here; the whole surface is intraprocess
//! function calls.
//!
//! # Example
//!
//! ```
//! use c8_exprcore::config::Config;
//! use c8_exprcore::context::Context;
//! use c8_exprcore::exprdesc::ExprDesc;
//! use c8_exprcore::labels::TestLabelAllocator;
//! use c8_exprcore::literal::TestLiteralPool;
//! use c8_exprcore::symtab::TestSymbolTable;
//! use c8_exprcore::token::VecTokenSource;
//!
//! let config = Config::new();
//! let mut tokens = VecTokenSource::new("3 + 4 * 5");
//! let mut symtab = TestSymbolTable::new();
//! let mut literals = TestLiteralPool::new();
//! let mut labels = TestLabelAllocator::new();
//! let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
//! let mut e = ExprDesc::new();
//! c8_exprcore::parser::expression0(&mut ctx, &mut e);
//! assert!(e.is_const());
//! assert_eq!(e.ival, 23);
//! ```

pub mod codegen;
pub mod config;
pub mod constfold;
pub mod context;
pub mod deferred;
pub mod diag;
pub mod errors;
pub mod exprdesc;
pub mod generators;
pub mod labels;
pub mod literal;
pub mod parser;
pub mod symtab;
pub mod token;
pub mod types;
