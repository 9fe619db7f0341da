//! The emitted instruction line and the flags word that parameterises
//! almost every emitter call (§6 "Code emitter").

use bitflags::bitflags;
use crate::types::IntWidth;

bitflags! {
    /// Flags word accompanying an emitter call: operand width,
    /// signedness, addressing-mode/location class, constness, the
    /// "force 8-bit" hint used by the small-integer promotion
    /// optimisation (§4.1), and "don't keep primary" (the result isn't
    /// needed afterwards, so the emitter may skip materialising it).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EmitFlags: u32 {
        const CHAR       = 0b0000_0000_0001;
        const INT        = 0b0000_0000_0010;
        const LONG       = 0b0000_0000_0100;
        const UNSIGNED   = 0b0000_0000_1000;
        const CONST      = 0b0000_0001_0000;
        /// Narrow a constant operand known to fit `[0,255]` to 8-bit
        /// addressing even though its declared type is wider (§4.1
        /// "Small-integer promotion optimisation").
        const FORCE_CHAR = 0b0000_0010_0000;
        /// The result of this operation will not be consumed; the
        /// emitter may elide materialising it into the primary.
        const NO_KEEP    = 0b0000_0100_0000;
        const LOC_ABS    = 0b0000_1000_0000;
        const LOC_GLOBAL = 0b0001_0000_0000;
        const LOC_STATIC = 0b0010_0000_0000;
        const LOC_REG    = 0b0100_0000_0000;
        const LOC_STACK  = 0b1000_0000_0000;
    }
}

impl EmitFlags {
    pub fn for_width(width: IntWidth, signed: bool) -> EmitFlags {
        let w = match width {
            IntWidth::Byte => EmitFlags::CHAR,
            IntWidth::Word => EmitFlags::INT,
            IntWidth::Long => EmitFlags::LONG,
        };
        if signed { w } else { w | EmitFlags::UNSIGNED }
    }

    pub fn width(self) -> IntWidth {
        if self.contains(EmitFlags::CHAR) {
            IntWidth::Byte
        } else if self.contains(EmitFlags::LONG) {
            IntWidth::Long
        } else {
            IntWidth::Word
        }
    }

    pub fn is_unsigned(self) -> bool {
        self.contains(EmitFlags::UNSIGNED)
    }

    pub fn is_const(self) -> bool {
        self.contains(EmitFlags::CONST)
    }

    pub fn with_const(self) -> EmitFlags {
        self | EmitFlags::CONST
    }
}

/// A single emitted target-assembly instruction line (mnemonic +
/// already-formatted operand text). Kept as structured text rather than
/// a decoded opcode, mirroring the final-assembly-writer boundary
/// (§1 "out of scope: ... the final assembly writer").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr(pub String);

impl Instr {
    pub fn line(text: impl Into<String>) -> Self {
        Instr(text.into())
    }
}
