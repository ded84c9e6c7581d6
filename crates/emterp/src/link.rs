//! The link/finalize pass: lays out interpreted functions into a single
//! code image, interns the `EXTCALL` and `GETGLBI`/`SETGLBI` operand
//! tables, and resolves every `Ref::FuncAddr` once all functions have a
//! known address.
//!
//! Two passes are enough. Labels resolve inline during the first pass
//! since a function's own offset is already known before its body is
//! encoded. Function addresses can't: an earlier function may call a
//! later one, so those are written as zero placeholders and patched once
//! the whole image is laid out.

use std::collections::HashMap;

use tracing::debug;

use crate::instr::Interner;
use crate::module::SourceFunction;
use crate::value::{Kind, Signature};
use crate::{Error, Result};

/// Functions are packed after any existing static data, 8-byte aligned
/// so every register frame (8 bytes/register) stays naturally aligned.
const CODE_ALIGN: u32 = 8;

/// Default budget for the interpreter's private call/value stack; the
/// CLI can override it, mirroring `EMT_STACK_MAX`.
pub const DEFAULT_STACK_MAX: u32 = 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct GlobalFuncTable {
    entries: Vec<(String, Signature)>,
    index: HashMap<(String, String), u16>,
}

impl GlobalFuncTable {
    fn intern(&mut self, name: &str, sig: &Signature) -> Result<u16> {
        let key = (name.to_string(), sig.as_code());
        if let Some(id) = self.index.get(&key) {
            return Ok(*id);
        }
        let id = self.entries.len();
        if id >= usize::from(u16::MAX) {
            return Err(Error::TooManyGlobalFuncs);
        }
        self.entries.push((name.to_string(), sig.clone()));
        self.index.insert(key, id as u16);
        Ok(id as u16)
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, Signature)] {
        &self.entries
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalVarTable {
    entries: Vec<String>,
    index: HashMap<String, u8>,
}

impl GlobalVarTable {
    fn intern(&mut self, name: &str) -> Result<u8> {
        if let Some(id) = self.index.get(name) {
            return Ok(*id);
        }
        let id = self.entries.len();
        if id >= 256 {
            return Err(Error::TooManyGlobalVars);
        }
        self.entries.push(name.to_string());
        self.index.insert(name.to_string(), id as u8);
        Ok(id as u8)
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

pub struct LinkResult {
    /// Interpreted functions' bytecode only, starting at `code_start`.
    pub code_image: Vec<u8>,
    /// Function name -> absolute address (`code_start`-relative already
    /// applied).
    pub func_offsets: HashMap<String, u32>,
    pub code_start: u32,
    pub stack_start: u32,
    pub stack_max: u32,
    pub global_funcs: GlobalFuncTable,
    pub global_vars: GlobalVarTable,
    pub actual_return_types: HashMap<String, Kind>,
    /// `memory_initializer`, 8-byte padded, followed by `code_image`,
    /// 8-byte padded. The stack region is *not* materialized here: it's a
    /// reserved range, not data.
    pub final_image: Vec<u8>,
}

struct LinkCtx<'a> {
    global_vars: GlobalVarTable,
    global_funcs: GlobalFuncTable,
    labels: &'a HashMap<String, u32>,
    func_base: u32,
}

impl Interner for LinkCtx<'_> {
    fn intern_global_var(&mut self, name: &str) -> Result<u8> {
        self.global_vars.intern(name)
    }

    fn intern_ext_call(&mut self, name: &str, sig: &Signature) -> Result<u16> {
        self.global_funcs.intern(name, sig)
    }

    fn resolve_label(&self, function: &str, label: &str) -> Result<u32> {
        self.labels
            .get(label)
            .map(|offset| self.func_base + offset)
            .ok_or_else(|| Error::UnresolvedLabel(function.to_string(), label.to_string()))
    }
}

fn pad_to(buf: &mut Vec<u8>, align: u32) {
    while buf.len() as u32 % align != 0 {
        buf.push(0);
    }
}

/// Runs the link pass over an already blacklist-filtered function list.
pub fn link(
    global_base: u32,
    memory_initializer: &[u8],
    functions: &[&SourceFunction],
    stack_max: u32,
) -> Result<LinkResult> {
    let mut image = Vec::new();
    let mut func_offsets = HashMap::new();

    // Pass 1: assign every function an offset in declaration order before
    // encoding any of them, so forward INTCALLs resolve to a real address
    // even though that function's bytes aren't written yet.
    let mut cursor = 0u32;
    for f in functions {
        func_offsets.insert(f.name.clone(), cursor);
        cursor += f.byte_len();
    }

    let mut initializer = memory_initializer.to_vec();
    pad_to(&mut initializer, CODE_ALIGN);
    let code_start = global_base + initializer.len() as u32;

    let mut global_vars = GlobalVarTable::default();
    let mut global_funcs = GlobalFuncTable::default();
    let mut all_fixups = Vec::new();
    let mut actual_return_types = HashMap::new();

    for f in functions {
        let func_base = code_start + func_offsets[&f.name];
        let header_bytes = {
            let mut h = Vec::with_capacity(8);
            h.push(crate::opcode::Opcode::FUNC as u8);
            h.push(f.locals as u8);
            h.push(f.params);
            h.push(f.variant.flag());
            h.push(f.zero_init_bound as u8);
            h.push(0);
            h.push(0);
            h.push(0);
            h
        };
        let body_start = image.len();
        image.extend_from_slice(&header_bytes);

        let mut ctx = LinkCtx {
            global_vars: std::mem::take(&mut global_vars),
            global_funcs: std::mem::take(&mut global_funcs),
            labels: &f.labels,
            func_base,
        };

        for instr in &f.body {
            for reg in instr.registers() {
                crate::frame::check_register(reg, f.locals)?;
            }
            let (bytes, fixups) = instr.encode(&f.name, &mut ctx)?;
            let instr_start = image.len();
            for (local_pos, name) in fixups {
                all_fixups.push((instr_start + local_pos, name));
            }
            image.extend_from_slice(&bytes);
        }

        global_vars = ctx.global_vars;
        global_funcs = ctx.global_funcs;

        debug!(function = %f.name, offset = func_base, len = image.len() - body_start, "linked function");

        actual_return_types.insert(f.name.clone(), f.return_kind);
    }

    // Pass 2: every function has a final address now, so FuncAddr
    // placeholders can be patched in.
    for (position, name) in all_fixups {
        let off = func_offsets
            .get(&name)
            .ok_or_else(|| Error::UnresolvedFuncAddr(name.clone()))?;
        let target = code_start + off;
        validate_target(target)?;
        image[position..position + 4].copy_from_slice(&target.to_le_bytes());
    }

    for off in func_offsets.values() {
        validate_target(code_start + off)?;
    }

    let absolute_func_offsets: HashMap<String, u32> =
        func_offsets.iter().map(|(k, v)| (k.clone(), code_start + v)).collect();

    pad_to(&mut image, CODE_ALIGN);

    let mut final_image = initializer.clone();
    final_image.extend_from_slice(&image);

    let stack_start = global_base + final_image.len() as u32;

    Ok(LinkResult {
        code_image: image,
        func_offsets: absolute_func_offsets,
        code_start,
        stack_start,
        stack_max,
        global_funcs,
        global_vars,
        actual_return_types,
        final_image,
    })
}

fn validate_target(target: u32) -> Result<()> {
    if target % 4 != 0 {
        return Err(Error::UnalignedTarget(target));
    }
    if target >= 1 << 31 {
        return Err(Error::TargetTooLarge(target));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instr;
    use crate::module::SourceFunction;
    use crate::value::Variant;
    use std::collections::HashMap as Map;

    fn leaf(name: &str, ret: u8) -> SourceFunction {
        SourceFunction {
            name: name.to_string(),
            locals: 1,
            params: 0,
            variant: Variant::Zero,
            zero_init_bound: 0,
            return_kind: crate::value::Kind::Int,
            body: vec![Instr::Ret { lx: ret }],
            labels: Map::new(),
        }
    }

    #[test]
    fn single_function_lays_out_at_code_start() {
        let f = leaf("f", 0);
        let funcs = vec![&f];
        let result = link(8, &[], &funcs, DEFAULT_STACK_MAX).unwrap();
        assert_eq!(result.code_start, 8);
        assert_eq!(result.func_offsets["f"], 8);
        assert_eq!(result.final_image.len() % 8, 0);
    }

    #[test]
    fn memory_initializer_is_padded_before_code() {
        let f = leaf("f", 0);
        let funcs = vec![&f];
        let result = link(0, &[1, 2, 3], &funcs, DEFAULT_STACK_MAX).unwrap();
        assert_eq!(result.code_start, 8);
    }

    #[test]
    fn func_header_is_written_as_two_self_contained_words() {
        let mut f = leaf("f", 0);
        f.locals = 3;
        f.params = 1;
        f.zero_init_bound = 2;
        let funcs = vec![&f];
        let result = link(0, &[], &funcs, DEFAULT_STACK_MAX).unwrap();
        let header = &result.code_image[0..8];
        assert_eq!(header[0..4], [crate::opcode::Opcode::FUNC as u8, 3, 1, Variant::Zero.flag()]);
        assert_eq!(header[4..8], [2, 0, 0, 0]);
    }

    #[test]
    fn out_of_bounds_register_is_rejected() {
        let mut f = leaf("f", 0);
        f.locals = 1;
        f.body = vec![Instr::Ret { lx: 5 }];
        let funcs = vec![&f];
        let err = link(0, &[], &funcs, DEFAULT_STACK_MAX).unwrap_err();
        assert!(matches!(err, Error::RegisterOutOfBounds(5, 1)));
    }

    #[test]
    fn forward_funcaddr_resolves_after_layout() {
        let mut caller = leaf("caller", 0);
        caller.body = vec![Instr::IntCall {
            lx: None,
            target: crate::value::Ref::FuncAddr("callee".to_string()),
            params: vec![],
        }];
        let callee = leaf("callee", 0);
        let funcs = vec![&caller, &callee];
        let result = link(0, &[], &funcs, DEFAULT_STACK_MAX).unwrap();
        let callee_addr = result.func_offsets["callee"];
        // bytes [8..12) of the image hold the patched call target: header
        // (8) + word (4) puts the address word right after.
        let patched = u32::from_le_bytes(result.code_image[8..12].try_into().unwrap());
        assert_eq!(patched, callee_addr);
    }
}
