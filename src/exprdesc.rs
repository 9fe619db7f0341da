//! `ExprDesc`: the pivotal "residue" value (§3.1).
//!
//! Represents what the compiler statically knows about the current
//! expression and where its value lives. No heap ownership of its own:
//! `name`/`sym`/`lval` borrow the symbol table and literal pool, whose
//! lifetimes outlive any single `ExprDesc`.

use crate::types::Type;
use bitflags::bitflags;

/// Where an expression's value currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Purely compile-time constant; no runtime storage at all.
    None,
    /// Numeric absolute address.
    Abs(u32),
    /// Named external object.
    Global { name: String, offset: i32 },
    /// Labelled static object.
    Static { label: String, offset: i32 },
    /// Zero-page register variable slot.
    Register(u16),
    /// Frame-relative offset (auto storage).
    Stack(i32),
    /// Value is sitting in the primary register right now.
    Primary,
    /// A pointer is in the primary register and the expression denotes
    /// `*primary` (dereferenced).
    Expr,
    /// Literal-pool label (address-of a string literal).
    Literal(String),
    /// Code label (function address, `&&label`).
    Code(String),
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExprFlags: u16 {
        /// The primary (or `Expr` location) holds an *address*, not a
        /// value — mutually exclusive with ordinary `Primary` value
        /// semantics on scalar types (invariant 3).
        const ADDRESS_OF       = 0b0000_0000_0001;
        /// The condition code already reflects zero/non-zero of the
        /// current value; a branch needs no further test. Cleared by
        /// any subsequent non-trivial operation (invariant 2).
        const TESTED           = 0b0000_0000_0010;
        /// The caller still needs a test emitted before branching.
        const NEEDS_TEST        = 0b0000_0000_0100;
        /// The caller requires this to collapse to a constant.
        const NEEDS_CONST       = 0b0000_0000_1000;
        /// Parsed in `sizeof`-style unevaluated context: code emitted
        /// while producing this descriptor has been rolled back.
        const UNEVAL           = 0b0000_0001_0000;
        /// This expression statement's top-level operator performs no
        /// side effect (candidate for a `warn_no_effect` diagnostic).
        const MAY_HAVE_NO_EFFECT = 0b0000_0010_0000;
        /// Descriptor denotes a bit-field member.
        const BITFIELD         = 0b0000_0100_0000;
    }
}

/// lvalue (reference, can be assigned through) vs rvalue (value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefType {
    LValue,
    RValue,
}

/// Bit-field width/offset, carried alongside `ExprFlags::BITFIELD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub bit_offset: u8,
    pub bit_width: u8,
}

/// A position pair in the code buffer bracketing whatever instructions
/// were emitted while parsing this expression (§4.12 "Peephole").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct ExprDesc {
    pub ty: Type,
    pub location: Location,
    pub ref_type: RefType,
    pub flags: ExprFlags,
    /// Integer immediate or frame/field offset.
    pub ival: i64,
    /// Floating immediate; captured, never evaluated (§1).
    pub fval: f64,
    /// Symbol name or label id, when `location` names a labelled object.
    pub name: Option<String>,
    /// Bit-field width/offset, present only when `flags` has `BITFIELD`.
    pub bit_field: Option<BitField>,
    pub code_range: Option<CodeRange>,
}

impl Default for ExprDesc {
    fn default() -> Self {
        ExprDesc {
            ty: Type::INT,
            location: Location::None,
            ref_type: RefType::RValue,
            flags: ExprFlags::empty(),
            ival: 0,
            fval: 0.0,
            name: None,
            bit_field: None,
            code_range: None,
        }
    }
}

impl ExprDesc {
    /// Fresh, zeroed descriptor — the cc65 `ED_Init` idiom, used at the
    /// start of each parse level (§3.1 Lifecycle).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(ty: Type, ival: i64) -> Self {
        ExprDesc { ty, ival, ..Self::default() }
    }

    pub fn is_const(&self) -> bool {
        matches!(self.location, Location::None)
    }

    /// Any location whose address is statically known without a load —
    /// a "quasi-constant" in the GLOSSARY, so its address-load can
    /// be delayed or elided entirely.
    pub fn is_quasi_const(&self) -> bool {
        matches!(
            self.location,
            Location::Abs(_)
                | Location::Global { .. }
                | Location::Static { .. }
                | Location::Register(_)
                | Location::Literal(_)
                | Location::Code(_)
        )
    }

    /// Is this an addressable lvalue a compound assignment or an
    /// address-in-memory increment can target directly (§4.7, §4.5)?
    pub fn is_addressable(&self) -> bool {
        self.ref_type == RefType::LValue && self.is_quasi_const_or_stack()
    }

    fn is_quasi_const_or_stack(&self) -> bool {
        self.is_quasi_const() || matches!(self.location, Location::Stack(_))
    }

    pub fn set_tested(&mut self) {
        self.flags.insert(ExprFlags::TESTED);
    }

    pub fn clear_tested(&mut self) {
        self.flags.remove(ExprFlags::TESTED);
    }

    pub fn is_tested(&self) -> bool {
        self.flags.contains(ExprFlags::TESTED)
    }

    /// Invariant 1: a pure compile-time constant is always an rvalue.
    /// Invariant 3: `ADDRESS_OF` and a bit-field never co-occur.
    /// Invariant 4: a bit-field descriptor never carries `ADDRESS_OF`.
    pub fn check_invariants(&self) -> Result<(), String> {
        if matches!(self.location, Location::None) && self.ref_type != RefType::RValue {
            return Err("constant ExprDesc must be an rvalue".into());
        }
        if self.flags.contains(ExprFlags::BITFIELD) && self.flags.contains(ExprFlags::ADDRESS_OF) {
            return Err("bit-field descriptor cannot carry ADDRESS_OF".into());
        }
        if self.flags.contains(ExprFlags::BITFIELD) != self.bit_field.is_some() {
            return Err("BITFIELD flag and bit_field payload must agree".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_descriptor_is_a_zero_rvalue_int() {
        let e = ExprDesc::new();
        assert_eq!(e.ty, Type::INT);
        assert_eq!(e.location, Location::None);
        assert_eq!(e.ref_type, RefType::RValue);
        assert!(e.is_const());
        e.check_invariants().unwrap();
    }

    #[test]
    fn global_and_static_locations_are_quasi_const() {
        let mut e = ExprDesc::new();
        e.location = Location::Global { name: "g".into(), offset: 0 };
        assert!(e.is_quasi_const());
        e.location = Location::Primary;
        assert!(!e.is_quasi_const());
    }

    #[test]
    fn bitfield_with_address_of_violates_invariant() {
        let mut e = ExprDesc::new();
        e.flags.insert(ExprFlags::BITFIELD | ExprFlags::ADDRESS_OF);
        e.bit_field = Some(BitField { bit_offset: 0, bit_width: 3 });
        assert!(e.check_invariants().is_err());
    }

    #[test]
    fn testable_property_3_valid_combinations_pass() {
        let mut e = ExprDesc::new();
        e.location = Location::Primary;
        e.ref_type = RefType::RValue;
        e.check_invariants().unwrap();
    }
}
