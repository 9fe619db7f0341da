//! Process-wide parsing context (Design Notes §9).
//!
//! The original source relies on globals (token stream, symbol table,
//! code buffer, deferred-ops queue, configuration). Here that's threaded
//! explicitly as a single `Context` passed by mutable reference into
//! every precedence-cascade function, with each external collaborator
//! behind a trait object so a host compiler can plug in its own lexer,
//! symbol table, literal pool and label allocator.

use crate::codegen::CodeGen;
use crate::codegen::Mark;
use crate::config::Config;
use crate::deferred::DeferredQueue;
use crate::diag::Diagnostics;
use crate::errors::InternalError;
use crate::labels::LabelAllocator;
use crate::literal::LiteralPool;
use crate::symtab::SymbolTable;
use crate::token::TokenSource;

pub struct Context<'a> {
    pub config: &'a Config,
    pub diag: Diagnostics,
    pub tokens: &'a mut dyn TokenSource,
    pub symtab: &'a mut dyn SymbolTable,
    pub literals: &'a mut dyn LiteralPool,
    pub labels: &'a mut dyn LabelAllocator,
    pub code: CodeGen,
    pub deferred: DeferredQueue,
    /// `true` while parsing a `sizeof` operand, a short-circuited
    /// `&&`/`||` tail operand, or the untaken branch of a
    /// constant-condition `?:` — any code emitted in this mode is rolled
    /// back via the peephole buffer once the caller is done (§9 "
    /// Unevaluated parsing").
    uneval_depth: u32,
}

impl<'a> Context<'a> {
    pub fn new(
        config: &'a Config,
        tokens: &'a mut dyn TokenSource,
        symtab: &'a mut dyn SymbolTable,
        literals: &'a mut dyn LiteralPool,
        labels: &'a mut dyn LabelAllocator,
    ) -> Self {
        Context {
            config,
            diag: Diagnostics::new(),
            tokens,
            symtab,
            literals,
            labels,
            code: CodeGen::new(),
            deferred: DeferredQueue::new(),
            uneval_depth: 0,
        }
    }

    pub fn in_unevaluated(&self) -> bool {
        self.uneval_depth > 0
    }

    /// Run `f` in unevaluated mode, rolling back whatever it emitted
    /// regardless of how it returns (§4.5 `sizeof`, §4.9 short-circuit
    /// tail operands, §4.10 the untaken constant ternary branch).
    pub fn with_unevaluated<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let mark = self.code.get_code_pos();
        self.uneval_depth += 1;
        let result = f(self);
        self.uneval_depth -= 1;
        self.code.remove_code(mark);
        result
    }

    /// Entry/exit stack-pointer invariant check every precedence
    /// function performs (§8 property #1). Call `enter()` before parsing
    /// and pass its result to `leave()` afterwards.
    pub fn enter(&self) -> i32 {
        self.code.stack_ptr()
    }

    pub fn leave(&self, entry: i32) {
        let exit = self.code.stack_ptr();
        if entry != exit {
            self.diag.internal(InternalError::StackPtrMismatch { entry, exit });
        }
    }

    /// Sequence-point handling (§4.11, GLOSSARY "Sequence point"):
    /// drain every queued post-inc/dec, oldest first.
    pub fn do_deferred(&mut self) {
        for op in self.deferred.take_all() {
            crate::parser::unary::emit_deferred(self, &op);
        }
    }

    /// Assert the queue is empty, as is required at every full-expression
    /// statement boundary (§4.11 invariant, §8 property #2). An internal
    /// error if violated.
    pub fn check_deferred_all_done(&self) {
        if !self.deferred.is_empty() {
            self.diag
                .internal(InternalError::DeferredQueueNotDrained(self.deferred.len()));
        }
    }

    pub fn deferred_op_count(&self) -> usize {
        self.deferred.len()
    }

    pub fn mark(&self) -> Mark {
        self.code.get_code_pos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::TestLabelAllocator;
    use crate::literal::TestLiteralPool;
    use crate::symtab::TestSymbolTable;
    use crate::token::VecTokenSource;

    #[test]
    fn balanced_enter_leave_does_not_panic() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("1");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let entry = ctx.enter();
        ctx.leave(entry);
    }

    #[test]
    #[should_panic(expected = "stack pointer mismatch")]
    fn unbalanced_stack_ptr_triggers_internal_error() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("1");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let entry = ctx.enter();
        ctx.code.push(crate::codegen::instr::EmitFlags::for_width(
            crate::types::IntWidth::Word,
            true,
        ));
        ctx.leave(entry);
    }

    #[test]
    fn unevaluated_parse_rolls_back_emitted_code() {
        let config = Config::new();
        let mut tokens = VecTokenSource::new("1");
        let mut symtab = TestSymbolTable::new();
        let mut literals = TestLiteralPool::new();
        let mut labels = TestLabelAllocator::new();
        let mut ctx = Context::new(&config, &mut tokens, &mut symtab, &mut literals, &mut labels);
        let mark = ctx.mark();
        ctx.with_unevaluated(|ctx| {
            ctx.code.add_code_line("lda #1");
        });
        assert!(ctx.code.code_range_is_empty(mark, ctx.mark()));
    }
}
