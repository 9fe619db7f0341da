//! Deferred post-increment/decrement queue (§4.11, §3.2).
//!
//! A post-`++`/`--` on an addressable lvalue doesn't save/restore the
//! primary register around the mutation; instead the mutation is queued
//! here and drained at the next sequence point, in insertion order. The
//! queue must be empty at every statement boundary (§8 property
//! #2) — a non-empty queue there is an internal compiler error, not a
//! user-facing one.

use crate::exprdesc::ExprDesc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredKind {
    PostInc,
    PostDec,
}

#[derive(Debug, Clone)]
pub struct DeferredOp {
    pub target: ExprDesc,
    pub kind: DeferredKind,
}

/// Process-wide FIFO, owned by the [`crate::context::Context`]. The
/// queue owns the `ExprDesc` snapshots it holds until drain (§5
/// "Shared-resource discipline").
#[derive(Debug, Default)]
pub struct DeferredQueue {
    ops: Vec<DeferredOp>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: ExprDesc, kind: DeferredKind) {
        self.ops.push(DeferredOp { target, kind });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Remove and return every queued op, oldest first — the drain
    /// order §4.11 requires. Callers are responsible for
    /// actually emitting the in-memory mutation for each and for any
    /// save/restore of the primary/flags around the drain.
    pub fn take_all(&mut self) -> Vec<DeferredOp> {
        std::mem::take(&mut self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exprdesc::ExprDesc;

    #[test]
    fn drains_in_insertion_order() {
        let mut q = DeferredQueue::new();
        let mut a = ExprDesc::new();
        a.ival = 1;
        let mut b = ExprDesc::new();
        b.ival = 2;
        q.push(a, DeferredKind::PostInc);
        q.push(b, DeferredKind::PostDec);
        assert_eq!(q.len(), 2);
        let drained = q.take_all();
        assert_eq!(drained[0].target.ival, 1);
        assert_eq!(drained[1].target.ival, 2);
        assert!(q.is_empty());
    }

    #[test]
    fn empty_after_construction() {
        assert!(DeferredQueue::new().is_empty());
    }
}
