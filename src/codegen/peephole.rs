//! Peephole / patch buffer (§4.12).
//!
//! The emitter itself is append-only, but the parser captures named
//! positions ("marks") into the emission log to support undoing a push
//! that a later constant fold made redundant, relocating a range of
//! already-emitted instructions (used by the ternary's type-conversion
//! plumbing, §4.10), and testing whether a subexpression had any side
//! effect at all (§4.9's unevaluated short-circuit operands).
//!
//! Implemented over a plain `Vec<Instr>`: marks are just indices, so
//! capture and emptiness-test are O(1); delete/move are O(n) shifts,
//! which the Design Notes explicitly allow ("need not be cheap in
//! the worst case").

use super::instr::Instr;

/// An opaque position in the code buffer. Valid for as long as no mark
/// *before* it has been removed or moved.
pub type Mark = usize;

#[derive(Debug, Default)]
pub struct CodeBuffer {
    lines: Vec<Instr>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, instr: Instr) {
        self.lines.push(instr);
    }

    pub fn get_code_pos(&self) -> Mark {
        self.lines.len()
    }

    /// Remove everything emitted from `from` to the current end. The
    /// common case (§4.12): undo a push made redundant by a later
    /// constant fold.
    pub fn remove_code(&mut self, from: Mark) {
        self.lines.truncate(from.min(self.lines.len()));
    }

    /// Remove the closed range `[from, to)`.
    pub fn remove_range(&mut self, from: Mark, to: Mark) {
        let to = to.min(self.lines.len());
        if from >= to {
            return;
        }
        self.lines.drain(from..to);
    }

    /// Relocate the closed range `[from, to)` so it instead sits
    /// immediately before `dest`. Used by the ternary operator to move
    /// a branch's type-conversion code so it runs after the branch is
    /// selected rather than unconditionally (§4.10).
    pub fn move_code(&mut self, from: Mark, to: Mark, dest: Mark) {
        if from >= to || to > self.lines.len() {
            return;
        }
        let chunk: Vec<Instr> = self.lines.drain(from..to).collect();
        let len = chunk.len();
        // `dest` was expressed against the buffer before the removal;
        // shift it left if it was past the removed range.
        let adjusted_dest = if dest > to {
            dest - len
        } else if dest > from {
            from
        } else {
            dest
        };
        for (i, instr) in chunk.into_iter().enumerate() {
            self.lines.insert(adjusted_dest + i, instr);
        }
    }

    pub fn code_range_is_empty(&self, from: Mark, to: Mark) -> bool {
        from >= to
    }

    pub fn is_empty_since(&self, mark: Mark) -> bool {
        self.code_range_is_empty(mark, self.get_code_pos())
    }

    pub fn lines(&self) -> &[Instr] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_code_undoes_a_redundant_push() {
        let mut buf = CodeBuffer::new();
        let mark = buf.get_code_pos();
        buf.emit(Instr::line("push ax"));
        buf.emit(Instr::line("ldaw #5"));
        assert!(!buf.is_empty_since(mark));
        buf.remove_code(mark);
        assert!(buf.is_empty_since(mark));
        assert_eq!(buf.lines().len(), 0);
    }

    #[test]
    fn move_code_relocates_a_range_forward() {
        let mut buf = CodeBuffer::new();
        buf.emit(Instr::line("a"));
        let from = buf.get_code_pos();
        buf.emit(Instr::line("b"));
        buf.emit(Instr::line("c"));
        let to = buf.get_code_pos();
        buf.emit(Instr::line("d"));
        buf.emit(Instr::line("e"));
        let dest = buf.get_code_pos();
        buf.move_code(from, to, dest);
        let texts: Vec<&str> = buf.lines().iter().map(|l| l.0.as_str()).collect();
        assert_eq!(texts, vec!["a", "d", "e", "b", "c"]);
    }

    #[test]
    fn code_range_is_empty_for_degenerate_ranges() {
        let buf = CodeBuffer::new();
        assert!(buf.code_range_is_empty(3, 3));
        assert!(buf.code_range_is_empty(5, 2));
    }

    #[test]
    fn sizeof_style_unevaluated_parse_leaves_buffer_untouched() {
        // §8 testable property #6: sizeof parses E but emits no
        // residual code.
        let mut buf = CodeBuffer::new();
        let mark = buf.get_code_pos();
        buf.emit(Instr::line("lda a")); // code that would have been emitted
        buf.remove_code(mark); // unevaluated context rolls it back
        assert!(buf.is_empty_since(mark));
    }
}
