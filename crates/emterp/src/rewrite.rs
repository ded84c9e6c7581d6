//! The module rewriter: splices generated interpreter source and
//! per-function trampolines into a program's existing text.
//!
//! Native source is passed through almost verbatim. The only edits are:
//! the generated interpreter's source inserted right after
//! [`SourceModule::pre_code_marker`], and every `(EMTERPRETER_<name>)`
//! placeholder resolved to either a direct call (the function stayed
//! native) or a trampoline into the interpreter (the function was
//! selected for interpretation).

use std::collections::HashSet;

use crate::link::LinkResult;
use crate::module::SourceModule;
use crate::{Error, Result};

fn marker_for(name: &str) -> String {
    format!("(EMTERPRETER_{name})")
}

/// Renders the trampoline call text a native caller sees in place of
/// `(EMTERPRETER_<name>)` once `name` has moved into the code image.
/// The exact argument marshalling is the embedding host's job (it alone
/// knows the native calling convention); this hands it the pieces it
/// needs: the function's absolute entry address and which interpreter
/// variant to enter through.
fn trampoline_call(name: &str, link: &LinkResult, variant_is_zero: bool) -> Result<String> {
    let addr = link
        .func_offsets
        .get(name)
        .ok_or_else(|| Error::UnresolvedFuncAddr(name.to_string()))?;
    let entry = if variant_is_zero { "emterpret_z" } else { "emterpret" };
    Ok(format!("call_interpreted!({entry}, {addr}, {name})"))
}

pub struct RewriteResult {
    pub source: String,
    /// The final memory image (static data + code), ready to be written
    /// as the program's `.mem` file.
    pub mem_init: Vec<u8>,
}

/// `native_text` is the program's existing source (the "pre-code" plus
/// everything after it) with `(EMTERPRETER_<name>)` markers already in
/// place for every call site the blacklist decision could have gone
/// either way on.
pub fn rewrite(
    module: &SourceModule,
    native_text: &str,
    link: &LinkResult,
    interpreter_source: &str,
    interpreted: &HashSet<String>,
) -> Result<RewriteResult> {
    let marker_pos = native_text
        .find(&module.pre_code_marker)
        .ok_or_else(|| Error::MissingMarker(module.pre_code_marker.clone()))?;
    let insert_at = marker_pos + module.pre_code_marker.len();

    let mut out = String::with_capacity(native_text.len() + interpreter_source.len());
    out.push_str(&native_text[..insert_at]);
    out.push('\n');
    out.push_str(&format!(
        "const EMTSTACKTOP_INIT: u32 = {};\nconst EMT_STACK_MAX: u32 = {};\n",
        link.stack_start, link.stack_max
    ));
    out.push_str(interpreter_source);
    out.push_str(&native_text[insert_at..]);

    for f in &module.functions {
        let marker = marker_for(&f.name);
        if !out.contains(&marker) {
            continue;
        }
        let replacement = if interpreted.contains(&f.name) {
            trampoline_call(&f.name, link, f.variant == crate::value::Variant::Zero)?
        } else {
            f.name.clone()
        };
        out = out.replace(&marker, &replacement);
    }
    for f in &module.native_functions {
        let marker = marker_for(&f.name);
        if out.contains(&marker) {
            out = out.replace(&marker, &f.name);
        }
    }

    for name in &module.exports {
        if !out.contains(name) {
            return Err(Error::MissingMarker(format!("export {name} not reachable after rewrite")));
        }
    }

    Ok(RewriteResult { source: out, mem_init: link.final_image.clone() })
}
