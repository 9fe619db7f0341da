//! Compiler configuration.
//!
//! Mirrors the selection of global switches the expression core consults:
//! which C standard is active, whether the default calling convention is
//! `cdecl` or `fastcall`, the code-size/speed tradeoff factor used by the
//! function-call argument strategy (§4.6), and the individual warning
//! switches used by the comparison and no-effect peepholes.
//!
//! # Example
//!
//! ```
//! use c8_exprcore::config::{Config, Standard};
//!
//! let cfg = Config::new()
//!     .with_standard(Standard::C99)
//!     .with_auto_cdecl(false)
//!     .with_code_size_factor(200);
//! assert_eq!(cfg.standard, Standard::C99);
//! ```

/// Selected C dialect. `Cc65` is the vendor extension dialect (adds
/// `&&label` computed-goto addresses and a handful of pragmas); it is a
/// superset of C89.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standard {
    C89,
    C99,
    Cc65,
}

impl Standard {
    /// Whether an implicit function declaration (unknown identifier
    /// followed by `(`) is an error (C99+) or only a warning (C89/CC65).
    pub fn implicit_decl_is_error(self) -> bool {
        matches!(self, Standard::C99)
    }

    /// Whether the non-standard `&&label` computed-goto address
    /// expression (§4.3) is recognised.
    pub fn allows_label_address(self) -> bool {
        matches!(self, Standard::Cc65)
    }
}

/// Process-wide configuration switches (§6 "Config").
#[derive(Debug, Clone)]
pub struct Config {
    /// Selected C dialect.
    pub standard: Standard,
    /// Default calling convention when a function carries neither
    /// `__fastcall__` nor `__cdecl__` explicitly: `true` picks `cdecl`,
    /// `false` picks `fastcall` (last argument in the primary register).
    pub auto_cdecl: bool,
    /// Percentage, 100 = neutral. Values above 100 favour code size over
    /// speed (push-one-at-a-time argument passing); values at or below
    /// favour speed (pre-allocate the parameter frame, §4.6).
    pub code_size_factor: u32,
    /// Warn when a comparison against a constant is statically decidable
    /// from the operand's value range (§4.8, §8 scenario 9).
    pub warn_const_comparison: bool,
    /// Warn when an expression statement's top-level operator has no
    /// side effect (`MayHaveNoEffect`, §3.1).
    pub warn_no_effect: bool,
    /// Parsing inside a preprocessor `#if` constant expression: logical
    /// operators fold purely symbolically and must not emit code
    /// (§4.9).
    pub preprocessing: bool,
    /// Emit extra diagnostics useful only to compiler developers.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            standard: Standard::C89,
            auto_cdecl: true,
            code_size_factor: 100,
            warn_const_comparison: true,
            warn_no_effect: true,
            preprocessing: false,
            debug: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_standard(mut self, standard: Standard) -> Self {
        self.standard = standard;
        self
    }

    pub fn with_auto_cdecl(mut self, auto_cdecl: bool) -> Self {
        self.auto_cdecl = auto_cdecl;
        self
    }

    pub fn with_code_size_factor(mut self, factor: u32) -> Self {
        self.code_size_factor = factor;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: bool) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Whether the argument-passing strategy should pre-allocate the
    /// whole parameter frame in one stack growth rather than pushing
    /// arguments one at a time (§4.6).
    pub fn prefers_preallocated_frame(&self) -> bool {
        self.code_size_factor <= 100
    }
}
