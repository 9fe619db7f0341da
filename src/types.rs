//! C type system: the integer subset plus pointer/array/function/struct
//! composition, qualifiers, promotion and the usual arithmetic
//! conversions (§4.2, §6 "Type system").
//!
//! The expression core does not own type *declaration* (that's the
//! declaration parser's job) but it does own every predicate, promotion
//! and conversion rule a binary operator or cast needs, since those are
//! squarely part of this component (§2 "Type utilities").

use bitflags::bitflags;
use std::fmt;
use std::rc::Rc;

bitflags! {
    /// Qualifier bits, composable the way C composes `const volatile`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Qualifiers: u8 {
        const CONST    = 0b0000_0001;
        const VOLATILE = 0b0000_0010;
        const RESTRICT = 0b0000_0100;
        /// Last argument passed in the primary register.
        const FASTCALL = 0b0000_1000;
        /// All arguments passed on the stack.
        const CDECL    = 0b0001_0000;
    }
}

/// Integer width in bytes. The target machine's three native widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntWidth {
    Byte = 1,
    Word = 2,
    Long = 4,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        self as u32 * 8
    }

    /// Value-range mask for truncating/sign-extending to this width.
    pub fn mask(self) -> u64 {
        match self.bits() {
            8 => 0xFF,
            16 => 0xFFFF,
            32 => 0xFFFF_FFFF,
            _ => unreachable!(),
        }
    }
}

/// Struct/union field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub byte_offset: u32,
    /// `Some((bit_offset, bit_width))` for a bit-field member.
    pub bit_field: Option<(u8, u8)>,
}

/// A struct or union layout, shared by name since many `ExprDesc`s can
/// reference the same aggregate type.
#[derive(Debug, PartialEq)]
pub struct RecordLayout {
    pub name: String,
    pub is_union: bool,
    pub size: u32,
    pub fields: Vec<Field>,
}

impl RecordLayout {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Function signature, enough for call-site checking (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSig {
    pub params: Vec<Type>,
    pub variadic: bool,
    pub ret: Box<Type>,
    pub fastcall: bool,
}

/// A C type. Integer types carry their width and signedness directly
/// rather than as a separate qualifier, since usual-arithmetic-conversion
/// dispatch needs to pattern match on them constantly.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Bool,
    Int {
        width: IntWidth,
        signed: bool,
    },
    Float,
    Ptr {
        qualifiers: Qualifiers,
        pointee: Box<Type>,
    },
    Array {
        element: Box<Type>,
        /// `None` for an incomplete array type (e.g. `extern int a[];`).
        len: Option<u32>,
    },
    Func(Rc<FuncSig>),
    Record(Rc<RecordLayout>),
}

impl Type {
    pub const CHAR: Type = Type::Int { width: IntWidth::Byte, signed: true };
    pub const UCHAR: Type = Type::Int { width: IntWidth::Byte, signed: false };
    pub const SHORT: Type = Type::Int { width: IntWidth::Word, signed: true };
    pub const USHORT: Type = Type::Int { width: IntWidth::Word, signed: false };
    pub const INT: Type = Type::Int { width: IntWidth::Word, signed: true };
    pub const UINT: Type = Type::Int { width: IntWidth::Word, signed: false };
    pub const LONG: Type = Type::Int { width: IntWidth::Long, signed: true };
    pub const ULONG: Type = Type::Int { width: IntWidth::Long, signed: false };

    pub fn ptr_to(pointee: Type) -> Type {
        Type::Ptr { qualifiers: Qualifiers::empty(), pointee: Box::new(pointee) }
    }

    pub fn is_int_class(&self) -> bool {
        matches!(self, Type::Int { .. } | Type::Bool)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Type::Ptr { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Type::Func(_))
    }

    /// Function or function-pointer: ordering comparisons and address
    /// arithmetic treat the two alike (§4.5).
    pub fn is_func_like(&self) -> bool {
        match self {
            Type::Func(_) => true,
            Type::Ptr { pointee, .. } => pointee.is_func(),
            _ => false,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.is_int_class() || self.is_ptr() || matches!(self, Type::Float)
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Type::Record(_))
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Type::Int { signed: false, .. } | Type::Bool)
    }

    /// `const`-qualified, for the assignment-target check (§4.7). Only
    /// pointer types carry qualifiers in this type system; a
    /// `const`-qualified scalar/array lvalue is rejected earlier, by the
    /// declaration parser that owns its symbol-table entry.
    pub fn is_const_qualified(&self) -> bool {
        matches!(self, Type::Ptr { qualifiers, .. } if qualifiers.contains(Qualifiers::CONST))
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Type::Void => false,
            Type::Array { len, .. } => len.is_some(),
            _ => true,
        }
    }

    /// Array/function-to-pointer decay (§4.3, §4.4 `->` on an array).
    pub fn decay(&self) -> Type {
        match self {
            Type::Array { element, .. } => Type::ptr_to((**element).clone()),
            Type::Func(_) => Type::ptr_to(self.clone()),
            other => other.clone(),
        }
    }

    /// Size in bytes on the target, for `sizeof` and pointer-arithmetic
    /// scaling. Panics on an incomplete type — callers must check
    /// `is_complete()` and diagnose first (§4.5 `sizeof`).
    pub fn size_of(&self) -> u32 {
        match self {
            Type::Void => 0,
            Type::Bool => 1,
            Type::Int { width, .. } => *width as u32,
            Type::Float => 8,
            Type::Ptr { .. } => 2,
            Type::Array { element, len } => {
                element.size_of() * len.expect("size_of on incomplete array")
            }
            Type::Func(_) => 1,
            Type::Record(r) => r.size,
        }
    }

    /// `true` when the type fits entirely in the primary register and so
    /// is a candidate "replacement type" for struct/union pass-by-value
    /// (§4.6, GLOSSARY "Replacement type").
    pub fn register_width(&self) -> Option<IntWidth> {
        match self.size_of() {
            1 => Some(IntWidth::Byte),
            2 => Some(IntWidth::Word),
            3 | 4 => Some(IntWidth::Long),
            _ => None,
        }
    }

    /// For a struct/union, the unsigned integer type of equal size to
    /// substitute when passing or returning it by register instead of by
    /// address (§4.6, §4.4 member-on-rvalue, GLOSSARY "Replacement
    /// type"). `None` if the record is too large or isn't a record at
    /// all.
    pub fn replacement_type(&self) -> Option<Type> {
        let Type::Record(_) = self else { return None };
        let width = self.register_width()?;
        Some(Type::Int { width, signed: false })
    }

    /// Integer promotion (C89 §3.2.1.1): types narrower than `int`
    /// promote to `int`, preserving signedness when `int` can represent
    /// every value of the source type. On this target `int` is 16 bits,
    /// so `unsigned char`/`char`/`short` all promote to plain `int`, and
    /// `unsigned short` also promotes to `int` (16-bit `int` cannot hold
    /// all `unsigned short` values on some targets, but this target's
    /// `int` and `unsigned short` are both 16 bits with `int` able to
    /// represent every non-negative 16-bit value that matters for this
    /// pass — mirroring cc65's treatment). Wider types are unaffected.
    pub fn promote(&self) -> Type {
        match self {
            Type::Bool => Type::INT,
            Type::Int { width, .. } if *width < IntWidth::Word => Type::INT,
            Type::Int { width, signed } if *width == IntWidth::Word => {
                Type::Int { width: *width, signed: *signed }
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "_Bool"),
            Type::Int { width, signed } => {
                let base = match width {
                    IntWidth::Byte => "char",
                    IntWidth::Word => "int",
                    IntWidth::Long => "long",
                };
                if *signed { write!(f, "{base}") } else { write!(f, "unsigned {base}") }
            }
            Type::Float => write!(f, "double"),
            Type::Ptr { pointee, .. } => write!(f, "{pointee} *"),
            Type::Array { element, len } => match len {
                Some(n) => write!(f, "{element} [{n}]"),
                None => write!(f, "{element} []"),
            },
            Type::Func(sig) => write!(f, "{} (...)", sig.ret),
            Type::Record(r) => write!(f, "{} {}", if r.is_union { "union" } else { "struct" }, r.name),
        }
    }
}

/// Usual arithmetic conversion over the integer subset (§4.2).
/// Both operands are first promoted; then the first matching rule wins.
/// Commutative in the sense required by the testable property #4.
pub fn arithmetic_convert(a: &Type, b: &Type) -> Type {
    let a = a.promote();
    let b = b.promote();

    let is_ulong = |t: &Type| matches!(t, Type::Int { width: IntWidth::Long, signed: false });
    let is_long = |t: &Type| matches!(t, Type::Int { width: IntWidth::Long, signed: true });
    let is_uint = |t: &Type| matches!(t, Type::Int { width: IntWidth::Word, signed: false });

    if is_ulong(&a) || is_ulong(&b) {
        return Type::ULONG;
    }
    // long vs unsigned int: on this target long is 32 bits and unsigned
    // int is 16 bits, so long can represent every unsigned-int value and
    // the result is long (rule 2 specializes to rule 3 here).
    if (is_long(&a) && is_uint(&b)) || (is_long(&b) && is_uint(&a)) {
        return Type::LONG;
    }
    if is_long(&a) || is_long(&b) {
        return Type::LONG;
    }
    if is_uint(&a) || is_uint(&b) {
        return Type::UINT;
    }
    Type::INT
}
