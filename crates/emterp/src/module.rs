//! The input a lowering run consumes: a set of candidate functions with
//! already-symbolic bytecode bodies, the native (non-interpreted) sources
//! they call into, and the handful of textual markers the rewriter needs
//! to splice the generated interpreter and its trampolines into place.
//!
//! This module deliberately does not model a full source AST: the
//! upstream lowerer that turns, say, asm.js or a WASM function body into
//! [`Instr`] sequences is out of scope here, exactly as the numeric IR's
//! own construction is out of scope for the source spec this crate
//! follows.

use std::collections::HashMap;

use crate::instr::Instr;
use crate::value::{Kind, Variant};
use crate::Result;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct SourceFunction {
    pub name: String,
    /// Total register count `L` used by the body (becomes the `FUNC`
    /// header's first operand, wrapping mod 256 — 256 registers encodes
    /// as the header byte `0`, matching the original toolchain).
    pub locals: u16,
    /// Leading register count that holds incoming parameters; zero-init
    /// of the prologue starts here and runs up to `zero_init_bound`.
    pub params: u8,
    pub variant: Variant,
    pub zero_init_bound: u16,
    /// What kind of value this function returns; `RET` itself is
    /// untyped (it just hands back whatever bits sit in a register), so
    /// callers need this recorded alongside the function to know how to
    /// read the result back.
    pub return_kind: Kind,
    pub body: Vec<Instr>,
    /// Label name -> byte offset from this function's own `FUNC` opcode.
    pub labels: HashMap<String, u32>,
}

impl SourceFunction {
    /// Bytes of bytecode this function occupies, including its two-word
    /// header.
    #[must_use]
    pub fn byte_len(&self) -> u32 {
        8 + self.body.iter().map(Instr::byte_len).sum::<u32>()
    }
}

/// A function left native: its source text is copied through unchanged
/// except for `(EMTERPRETER_<name>)` markers, which the rewriter replaces
/// with a direct call when `<name>` stayed native, or with a trampoline
/// invocation when it was selected for interpretation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct NativeFunction {
    pub name: String,
    pub source: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct SourceModule {
    /// Byte address the code image is laid out after; mirrors
    /// `GLOBAL_BASE` in the original toolchain.
    pub global_base: u32,
    /// Existing static data the code image is appended after.
    pub memory_initializer: Vec<u8>,
    pub functions: Vec<SourceFunction>,
    pub native_functions: Vec<NativeFunction>,
    /// `FUNCTION_TABLE_*`-style indirect call targets, in table order;
    /// `EXTCALL`'s masked index addresses into this list.
    pub function_table: Vec<String>,
    /// Names that must remain callable from outside even if never called
    /// from an interpreted body (keeps the linker from pruning them).
    pub exports: Vec<String>,
    /// Literal text marking where generated code should be inserted, e.g.
    /// a `// ===EMTERPRETER_CODE===` comment line already present in the
    /// pre-code text.
    pub pre_code_marker: String,
}

impl SourceModule {
    pub fn function(&self, name: &str) -> Option<&SourceFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        for f in &self.functions {
            if f.locals > 256 {
                return Err(crate::Error::TooManyRegisters(f.name.clone(), u32::from(f.locals)));
            }
            if u16::from(f.params) > f.locals {
                return Err(crate::Error::TooManyParams(f.name.clone(), f.params, f.locals));
            }
        }
        Ok(())
    }
}
