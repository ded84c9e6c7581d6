#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    clippy::missing_errors_doc
)]

//! Lowers a register-machine bytecode module into a compact, 32-bit
//! aligned code image and generates the Rust source of a matching
//! stack-machine interpreter, mirroring emscripten's historical
//! `EMTERPRETIFY` size-over-speed execution tier.
//!
//! The pipeline a [`compile`] call drives:
//!
//! 1. [`blacklist`] decides which candidate functions actually become
//!    interpreted bytecode.
//! 2. [`link`] lays those functions out into one code image, interning
//!    `EXTCALL`/global-variable operand tables and resolving every
//!    address.
//! 3. [`interp::generator`] renders the Rust source of the interpreter
//!    that executes that image.
//! 4. [`rewrite`] splices both into the program's existing source.

pub mod blacklist;
pub mod error;
pub mod frame;
pub mod instr;
pub mod interp;
pub mod link;
pub mod module;
pub mod opcode;
pub mod rewrite;
pub mod value;

pub use error::{Error, Result};

use std::collections::HashSet;

use tracing::info;

use blacklist::Blacklist;
use link::LinkResult;
use module::SourceModule;
use opcode::Opcode;
use rewrite::RewriteResult;

/// End-to-end options for one lowering run, mirroring the CLI's surface:
/// an optional override for the starting memory image and any
/// module-specific additions to the default blacklist.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub extra_blacklist: Vec<String>,
    pub stack_max: Option<u32>,
    pub mem_init_override: Option<Vec<u8>>,
    /// When set, the generated interpreter gets a two-tier decode loop:
    /// opcodes at or below this one re-dispatch in a tight inner loop
    /// instead of falling back out to the full switch each time.
    pub inner_terpreter_last_opcode: Option<Opcode>,
}

pub struct CompileOutput {
    pub rewritten: RewriteResult,
    pub link: LinkResult,
    pub interpreted: HashSet<String>,
}

/// Runs the full pipeline: partition functions by blacklist, link the
/// survivors into a code image, render the interpreter, and splice both
/// into `native_text`.
pub fn compile(module: &SourceModule, native_text: &str, options: &CompileOptions) -> Result<CompileOutput> {
    module.validate()?;

    let blacklist = Blacklist::with_extra(module, options.extra_blacklist.iter().cloned())?;
    let (selected, left_native) = blacklist.partition(&module.functions);
    info!(
        selected = selected.len(),
        left_native = left_native.len(),
        "partitioned functions by blacklist"
    );

    let memory_initializer = options
        .mem_init_override
        .as_deref()
        .unwrap_or(&module.memory_initializer);
    let stack_max = options.stack_max.unwrap_or(link::DEFAULT_STACK_MAX);

    let linked = link::link(module.global_base, memory_initializer, &selected, stack_max)?;
    let interpreter_source = interp::generator::render_tiered(options.inner_terpreter_last_opcode);

    let interpreted: HashSet<String> = selected.iter().map(|f| f.name.clone()).collect();
    let rewritten = rewrite::rewrite(module, native_text, &linked, &interpreter_source, &interpreted)?;

    Ok(CompileOutput { rewritten, link: linked, interpreted })
}
