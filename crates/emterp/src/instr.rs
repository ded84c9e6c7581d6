//! Symbolic bytecode instructions.
//!
//! Each variant groups a family of opcodes that share an operand shape
//! (e.g. all 19 integer binary ops) rather than giving every mnemonic its
//! own variant, so encode/decode stay exhaustive over a couple dozen
//! match arms instead of 139. [`Instr::encode`] lowers one instruction to
//! its final bytes, interning `EXTCALL`/`GETGLBI`/`SETGLBI` operands and
//! resolving `Ref::Label` targets as it goes; `Ref::FuncAddr` targets are
//! written as zero placeholders and patched by the linker's second pass.

use crate::error::Error;
use crate::opcode::Opcode;
use crate::value::{
    CmpOp, ConvOp, DBinOp, DCmpOp, IntBinOp, IntUnOp, Kind, LoadWidth, Ref, Sense, Signature,
    StoreWidth,
};
use crate::Result;

/// Interning tables a function's instructions populate as they're encoded.
pub trait Interner {
    fn intern_global_var(&mut self, name: &str) -> Result<u8>;
    fn intern_ext_call(&mut self, name: &str, sig: &Signature) -> Result<u16>;
    fn resolve_label(&self, function: &str, label: &str) -> Result<u32>;
}

/// A byte position within an encoded instruction's output that still holds
/// a function-address placeholder, paired with the function it names.
pub type FuncAddrFixup = (usize, String);

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    // -- register moves, int family --
    Set { lx: u8, ly: u8 },
    SetVi { lx: u8, imm: i8 },
    SetVib { lx: u8, imm: i32 },

    // -- integer arithmetic/logic --
    IntBin { op: IntBinOp, lx: u8, ly: u8, lz: u8 },
    IntBinImm { op: IntBinOp, lx: u8, ly: u8, imm: i8 },
    IntUn { op: IntUnOp, lx: u8, ly: u8 },

    // -- fused compare-and-branch --
    CmpBranch { op: CmpOp, sense: Sense, ly: u8, lz: u8, target: Ref },

    // -- double family --
    SetD { lx: u8, ly: u8 },
    SetVd { lx: u8, imm: i8 },
    SetVdi { lx: u8, imm: i32 },
    SetVdf { lx: u8, imm: f32 },
    SetVdd { lx: u8, imm: f64 },
    DBin { op: DBinOp, lx: u8, ly: u8, lz: u8 },
    NegD { lx: u8, ly: u8 },
    DCmp { op: DCmpOp, lx: u8, ly: u8, lz: u8 },
    Convert { op: ConvOp, lx: u8, ly: u8 },

    // -- memory --
    Load { width: LoadWidth, lx: u8, ly: u8 },
    Store { width: StoreWidth, lx: u8, ly: u8 },
    LoadA { width: LoadWidth, lx: u8, ly: u8, lz: u8 },
    StoreA { width: StoreWidth, lx: u8, ly: u8, lz: u8 },
    LoadAV { width: LoadWidth, lx: u8, ly: u8, imm: i8 },
    /// Asymmetric with [`Instr::LoadAV`] on purpose: the offset sits in
    /// the `ly` byte position as a raw signed immediate (not a register),
    /// and `lz` names the register holding the value to store.
    StoreAV { width: StoreWidth, lx: u8, imm: i8, lz: u8 },
    StoreC { width: StoreWidth, lx: u8, ly: u8 },

    // -- control flow --
    Br { disp: i16 },
    BrCond { sense: Sense, lx: u8, disp: i16 },
    BrA { target: Ref },
    BrCondA { sense: Sense, lx: u8, target: Ref },
    /// In-place select: `r[lx] = r[lx] ? r[ly] : r[lz]`.
    Cond { lx: u8, ly: u8, lz: u8 },
    CondD { lx: u8, ly: u8, lz: u8 },
    Switch { lx: u8, ly: u8, lz: u8, table: Vec<Ref> },
    Ret { lx: u8 },

    // -- special registers / globals --
    GetTdp { lx: u8 },
    GetTr0 { lx: u8 },
    SetTr0 { lx: u8 },
    GetGlbi { lx: u8, name: String },
    SetGlbi { lx: u8, name: String },
    GetSt { lx: u8 },
    SetSt { lx: u8 },

    // -- calls --
    /// `lx` is `None` for a void callee (the original ABI writes a dummy
    /// `-1` receiver register in that case; we just omit it).
    IntCall { lx: Option<u8>, target: Ref, params: Vec<u8> },
    ExtCall {
        lx: Option<u8>,
        name: String,
        sig: Signature,
        params: Vec<u8>,
        /// Present when the callee is a `FUNCTION_TABLE_*` indirect call;
        /// holds the register carrying the (already masked) table index.
        table_index: Option<u8>,
    },

    // -- function header --
    /// `locals`/`zero_init_bound` are the register counts mod 256 (256
    /// itself wraps to the header byte `0`), matching [`crate::module::SourceFunction`].
    Func { locals: u8, params: u8, variant: crate::value::Variant, zero_init_bound: u8 },
}

fn push_word(out: &mut Vec<u8>, op: Opcode, b1: u8, b2: u8, b3: u8) {
    out.push(op as u8);
    out.push(b1);
    out.push(b2);
    out.push(b3);
}

fn push_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

impl Instr {
    /// Number of bytes this instruction occupies once encoded. Needed
    /// up front so labels pointing past it can be resolved while a
    /// function's instructions are still being walked.
    #[must_use]
    pub fn byte_len(&self) -> u32 {
        match self {
            Instr::Set { .. }
            | Instr::SetD { .. }
            | Instr::IntBin { .. }
            | Instr::IntBinImm { .. }
            | Instr::IntUn { .. }
            | Instr::DBin { .. }
            | Instr::NegD { .. }
            | Instr::DCmp { .. }
            | Instr::Convert { .. }
            | Instr::Load { .. }
            | Instr::Store { .. }
            | Instr::LoadA { .. }
            | Instr::StoreA { .. }
            | Instr::LoadAV { .. }
            | Instr::StoreAV { .. }
            | Instr::StoreC { .. }
            | Instr::Br { .. }
            | Instr::BrCond { .. }
            | Instr::Cond { .. }
            | Instr::CondD { .. }
            | Instr::Ret { .. }
            | Instr::GetTdp { .. }
            | Instr::GetTr0 { .. }
            | Instr::SetTr0 { .. }
            | Instr::GetGlbi { .. }
            | Instr::SetGlbi { .. }
            | Instr::GetSt { .. }
            | Instr::SetSt { .. }
            | Instr::SetVi { .. }
            | Instr::SetVd { .. } => 4,

            Instr::SetVib { .. } | Instr::SetVdi { .. } | Instr::SetVdf { .. } => 8,
            Instr::SetVdd { .. } => 12,

            Instr::CmpBranch { .. } | Instr::BrA { .. } | Instr::BrCondA { .. } => 8,

            Instr::Switch { table, .. } => 4 + 4 * table.len() as u32,

            Instr::IntCall { params, .. } => 8 + round_up4(params.len()) as u32,
            Instr::ExtCall { params, .. } => 8 + round_up4(params.len()) as u32,

            Instr::Func { .. } => 8,
        }
    }

    /// A representative mnemonic, for diagnostic dumps
    /// (`EMCC_LOG_EMTERPRETER_CODE`-style output). Grouped variants report
    /// the name of their first member rather than every opcode they can
    /// lower to.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instr::Set { .. } | Instr::SetVi { .. } | Instr::SetVib { .. } => "SET",
            Instr::IntBin { op, .. } | Instr::IntBinImm { op, .. } => op.opcode().name(),
            Instr::IntUn { op, .. } => op.opcode().name(),
            Instr::CmpBranch { op, .. } => op.brt_opcode().name(),
            Instr::SetD { .. } | Instr::SetVd { .. } | Instr::SetVdi { .. } | Instr::SetVdf { .. } | Instr::SetVdd { .. } => "SETD",
            Instr::DBin { op, .. } => op.opcode().name(),
            Instr::NegD { .. } => "NEGD",
            Instr::DCmp { op, .. } => op.opcode().name(),
            Instr::Convert { op, .. } => op.opcode().name(),
            Instr::Load { width, .. } => width.opcode().name(),
            Instr::Store { width, .. } => width.opcode().name(),
            Instr::LoadA { width, .. } => width.a_opcode().name(),
            Instr::StoreA { width, .. } => width.a_opcode().name(),
            Instr::LoadAV { width, .. } => width.av_opcode().name(),
            Instr::StoreAV { width, .. } => width.av_opcode().name(),
            Instr::StoreC { width, .. } => width.c_opcode().name(),
            Instr::Br { .. } => "BR",
            Instr::BrCond { sense: Sense::OnTrue, .. } => "BRT",
            Instr::BrCond { sense: Sense::OnFalse, .. } => "BRF",
            Instr::BrA { .. } => "BRA",
            Instr::BrCondA { sense: Sense::OnTrue, .. } => "BRTA",
            Instr::BrCondA { sense: Sense::OnFalse, .. } => "BRFA",
            Instr::Cond { .. } => "COND",
            Instr::CondD { .. } => "CONDD",
            Instr::Switch { .. } => "SWITCH",
            Instr::Ret { .. } => "RET",
            Instr::GetTdp { .. } => "GETTDP",
            Instr::GetTr0 { .. } => "GETTR0",
            Instr::SetTr0 { .. } => "SETTR0",
            Instr::GetGlbi { .. } => "GETGLBI",
            Instr::SetGlbi { .. } => "SETGLBI",
            Instr::GetSt { .. } => "GETST",
            Instr::SetSt { .. } => "SETST",
            Instr::IntCall { .. } => "INTCALL",
            Instr::ExtCall { .. } => "EXTCALL",
            Instr::Func { .. } => "FUNC",
        }
    }

    /// Every register operand this instruction reads or writes, for
    /// bounds-checking against a function's declared `locals` count
    /// before linking (spec.md's per-operand register-bounds invariant).
    #[must_use]
    pub fn registers(&self) -> Vec<u8> {
        match self {
            Instr::Set { lx, ly } | Instr::SetD { lx, ly } | Instr::NegD { lx, ly } | Instr::Convert { lx, ly, .. } => {
                vec![*lx, *ly]
            }
            Instr::SetVi { lx, .. }
            | Instr::SetVib { lx, .. }
            | Instr::SetVd { lx, .. }
            | Instr::SetVdi { lx, .. }
            | Instr::SetVdf { lx, .. }
            | Instr::SetVdd { lx, .. }
            | Instr::Ret { lx }
            | Instr::GetTdp { lx }
            | Instr::GetTr0 { lx }
            | Instr::SetTr0 { lx }
            | Instr::GetGlbi { lx, .. }
            | Instr::SetGlbi { lx, .. }
            | Instr::GetSt { lx }
            | Instr::SetSt { lx } => vec![*lx],
            Instr::IntBin { lx, ly, lz, .. } | Instr::DBin { lx, ly, lz, .. } | Instr::DCmp { lx, ly, lz, .. } => {
                vec![*lx, *ly, *lz]
            }
            Instr::IntBinImm { lx, ly, .. } | Instr::IntUn { lx, ly, .. } => vec![*lx, *ly],
            Instr::CmpBranch { ly, lz, .. } => vec![*ly, *lz],
            Instr::Load { lx, ly, .. } | Instr::Store { lx, ly, .. } | Instr::StoreC { lx, ly, .. } => {
                vec![*lx, *ly]
            }
            Instr::LoadA { lx, ly, lz, .. } | Instr::StoreA { lx, ly, lz, .. } => vec![*lx, *ly, *lz],
            Instr::LoadAV { lx, ly, .. } => vec![*lx, *ly],
            Instr::StoreAV { lx, lz, .. } => vec![*lx, *lz],
            Instr::Br { .. } | Instr::BrA { .. } | Instr::Func { .. } => vec![],
            Instr::BrCond { lx, .. } | Instr::BrCondA { lx, .. } => vec![*lx],
            Instr::Cond { lx, ly, lz } | Instr::CondD { lx, ly, lz } | Instr::Switch { lx, ly, lz, .. } => {
                vec![*lx, *ly, *lz]
            }
            Instr::IntCall { lx, params, .. } => lx.into_iter().chain(params.iter().copied()).collect(),
            Instr::ExtCall { lx, params, table_index, .. } => {
                lx.into_iter().chain(table_index.into_iter()).chain(params.iter().copied()).collect()
            }
        }
    }

    /// Lower to final bytes. `function` and `code_start`/`func_start` let
    /// label references resolve to absolute addresses inline; function
    /// addresses can't be resolved yet and are written as zero words whose
    /// position is reported in the returned fixup list.
    #[allow(clippy::too_many_lines)]
    pub fn encode(
        &self,
        function: &str,
        interner: &mut dyn Interner,
    ) -> Result<(Vec<u8>, Vec<FuncAddrFixup>)> {
        let mut out = Vec::with_capacity(self.byte_len() as usize);
        let mut fixups = Vec::new();
        self.encode_into(function, interner, &mut out, &mut fixups)?;
        Ok((out, fixups))
    }

    fn encode_into(
        &self,
        function: &str,
        interner: &mut dyn Interner,
        out: &mut Vec<u8>,
        fixups: &mut Vec<FuncAddrFixup>,
    ) -> Result<()> {
        match self {
            Instr::Set { lx, ly } => push_word(out, Opcode::SET, *lx, *ly, 0),
            Instr::SetVi { lx, imm } => push_word(out, Opcode::SETVI, *lx, *imm as u8, 0),
            Instr::SetVib { lx, imm } => {
                push_word(out, Opcode::SETVIB, *lx, 0, 0);
                push_i32(out, *imm);
            }

            Instr::IntBin { op, lx, ly, lz } => push_word(out, op.opcode(), *lx, *ly, *lz),
            Instr::IntBinImm { op, lx, ly, imm } => {
                push_word(out, op.imm_opcode(), *lx, *ly, *imm as u8);
            }
            Instr::IntUn { op, lx, ly } => push_word(out, op.opcode(), *lx, *ly, 0),

            Instr::CmpBranch { op, sense, ly, lz, target } => {
                let opcode = match sense {
                    Sense::OnFalse => op.opcode(),
                    Sense::OnTrue => op.brt_opcode(),
                };
                push_word(out, opcode, *ly, *lz, 0);
                let addr = self.resolve_ref(function, interner, target, out.len(), fixups)?;
                push_u32(out, addr);
            }

            Instr::SetD { lx, ly } => push_word(out, Opcode::SETD, *lx, *ly, 0),
            Instr::SetVd { lx, imm } => push_word(out, Opcode::SETVD, *lx, *imm as u8, 0),
            Instr::SetVdi { lx, imm } => {
                push_word(out, Opcode::SETVDI, *lx, 0, 0);
                push_i32(out, *imm);
            }
            Instr::SetVdf { lx, imm } => {
                push_word(out, Opcode::SETVDF, *lx, 0, 0);
                out.extend_from_slice(&imm.to_le_bytes());
            }
            Instr::SetVdd { lx, imm } => {
                push_word(out, Opcode::SETVDD, *lx, 0, 0);
                out.extend_from_slice(&imm.to_le_bytes());
            }
            Instr::DBin { op, lx, ly, lz } => push_word(out, op.opcode(), *lx, *ly, *lz),
            Instr::NegD { lx, ly } => push_word(out, Opcode::NEGD, *lx, *ly, 0),
            Instr::DCmp { op, lx, ly, lz } => push_word(out, op.opcode(), *lx, *ly, *lz),
            Instr::Convert { op, lx, ly } => push_word(out, op.opcode(), *lx, *ly, 0),

            Instr::Load { width, lx, ly } => push_word(out, width.opcode(), *lx, *ly, 0),
            Instr::Store { width, lx, ly } => push_word(out, width.opcode(), *lx, *ly, 0),
            Instr::LoadA { width, lx, ly, lz } => push_word(out, width.a_opcode(), *lx, *ly, *lz),
            Instr::StoreA { width, lx, ly, lz } => {
                push_word(out, width.a_opcode(), *lx, *ly, *lz);
            }
            Instr::LoadAV { width, lx, ly, imm } => {
                push_word(out, width.av_opcode(), *lx, *ly, *imm as u8);
            }
            Instr::StoreAV { width, lx, imm, lz } => {
                push_word(out, width.av_opcode(), *lx, *imm as u8, *lz);
            }
            Instr::StoreC { width, lx, ly } => push_word(out, width.c_opcode(), *lx, *ly, 0),

            Instr::Br { disp } => {
                out.push(Opcode::BR as u8);
                out.push(0);
                push_i16(out, *disp);
            }
            Instr::BrCond { sense, lx, disp } => {
                let opcode = match sense {
                    Sense::OnTrue => Opcode::BRT,
                    Sense::OnFalse => Opcode::BRF,
                };
                out.push(opcode as u8);
                out.push(*lx);
                push_i16(out, *disp);
            }
            Instr::BrA { target } => {
                push_word(out, Opcode::BRA, 0, 0, 0);
                let addr = self.resolve_ref(function, interner, target, out.len(), fixups)?;
                push_u32(out, addr);
            }
            Instr::BrCondA { sense, lx, target } => {
                let opcode = match sense {
                    Sense::OnTrue => Opcode::BRTA,
                    Sense::OnFalse => Opcode::BRFA,
                };
                push_word(out, opcode, *lx, 0, 0);
                let addr = self.resolve_ref(function, interner, target, out.len(), fixups)?;
                push_u32(out, addr);
            }
            Instr::Cond { lx, ly, lz } => push_word(out, Opcode::COND, *lx, *ly, *lz),
            Instr::CondD { lx, ly, lz } => push_word(out, Opcode::CONDD, *lx, *ly, *lz),
            Instr::Switch { lx, ly, lz, table } => {
                push_word(out, Opcode::SWITCH, *lx, *ly, *lz);
                for target in table {
                    let addr = self.resolve_ref(function, interner, target, out.len(), fixups)?;
                    push_u32(out, addr);
                }
            }
            Instr::Ret { lx } => push_word(out, Opcode::RET, *lx, 0, 0),

            Instr::GetTdp { lx } => push_word(out, Opcode::GETTDP, *lx, 0, 0),
            Instr::GetTr0 { lx } => push_word(out, Opcode::GETTR0, *lx, 0, 0),
            Instr::SetTr0 { lx } => push_word(out, Opcode::SETTR0, *lx, 0, 0),
            Instr::GetGlbi { lx, name } => {
                let id = interner.intern_global_var(name)?;
                push_word(out, Opcode::GETGLBI, *lx, id, 0);
            }
            Instr::SetGlbi { lx, name } => {
                let id = interner.intern_global_var(name)?;
                push_word(out, Opcode::SETGLBI, *lx, id, 0);
            }
            Instr::GetSt { lx } => push_word(out, Opcode::GETST, *lx, 0, 0),
            Instr::SetSt { lx } => push_word(out, Opcode::SETST, *lx, 0, 0),

            Instr::IntCall { lx, target, params } => {
                if params.len() > 255 {
                    return Err(Error::TooManyCallParams(function.to_string(), params.len()));
                }
                push_word(out, Opcode::INTCALL, lx.unwrap_or(0), params.len() as u8, 0);
                let addr = self.resolve_ref(function, interner, target, out.len(), fixups)?;
                push_u32(out, addr);
                out.extend(params.iter().copied());
                pad_to_4(out);
            }
            Instr::ExtCall { lx, name, sig, params, table_index } => {
                if params.len() > 255 {
                    return Err(Error::TooManyCallParams(function.to_string(), params.len()));
                }
                let id = interner.intern_ext_call(name, sig)?;
                let receiver = if sig.ret == Kind::Void { 0 } else { lx.unwrap_or(0) };
                push_word(out, Opcode::EXTCALL, receiver, params.len() as u8, table_index.unwrap_or(0));
                push_u32(out, u32::from(id));
                out.extend(params.iter().copied());
                pad_to_4(out);
            }

            Instr::Func { locals, params, variant, zero_init_bound } => {
                push_word(out, Opcode::FUNC, *locals, *params, variant.flag());
                out.push(*zero_init_bound);
                out.push(0);
                out.push(0);
                out.push(0);
            }
        }
        Ok(())
    }

    fn resolve_ref(
        &self,
        function: &str,
        interner: &dyn Interner,
        target: &Ref,
        position: usize,
        fixups: &mut Vec<FuncAddrFixup>,
    ) -> Result<u32> {
        match target {
            Ref::Label(label) => interner.resolve_label(function, label),
            Ref::FuncAddr(name) => {
                fixups.push((position, name.clone()));
                Ok(0)
            }
        }
    }
}

fn round_up4(n: usize) -> usize {
    (n + 3) & !3
}

fn pad_to_4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Variant;
    use std::collections::HashMap;

    struct FakeInterner {
        vars: Vec<String>,
        calls: Vec<(String, Signature)>,
        labels: HashMap<(String, String), u32>,
    }

    impl Interner for FakeInterner {
        fn intern_global_var(&mut self, name: &str) -> Result<u8> {
            if let Some(i) = self.vars.iter().position(|v| v == name) {
                return Ok(i as u8);
            }
            self.vars.push(name.to_string());
            Ok((self.vars.len() - 1) as u8)
        }

        fn intern_ext_call(&mut self, name: &str, sig: &Signature) -> Result<u16> {
            if let Some(i) = self.calls.iter().position(|(n, s)| n == name && s == sig) {
                return Ok(i as u16);
            }
            self.calls.push((name.to_string(), sig.clone()));
            Ok((self.calls.len() - 1) as u16)
        }

        fn resolve_label(&self, function: &str, label: &str) -> Result<u32> {
            self.labels
                .get(&(function.to_string(), label.to_string()))
                .copied()
                .ok_or_else(|| Error::UnresolvedLabel(function.to_string(), label.to_string()))
        }
    }

    #[test]
    fn set_encodes_four_bytes() {
        let mut interner = FakeInterner { vars: vec![], calls: vec![], labels: HashMap::new() };
        let (bytes, fixups) =
            Instr::Set { lx: 3, ly: 4 }.encode("f", &mut interner).unwrap();
        assert_eq!(bytes, vec![Opcode::SET as u8, 3, 4, 0]);
        assert!(fixups.is_empty());
    }

    #[test]
    fn extcall_interns_and_pads() {
        let mut interner = FakeInterner { vars: vec![], calls: vec![], labels: HashMap::new() };
        let instr = Instr::ExtCall {
            lx: Some(1),
            name: "sinf".to_string(),
            sig: Signature::new(Kind::Double, vec![Kind::Double]),
            params: vec![7],
            table_index: None,
        };
        let (bytes, _) = instr.encode("f", &mut interner).unwrap();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(interner.calls.len(), 1);
    }

    #[test]
    fn label_target_resolves_inline() {
        let mut labels = HashMap::new();
        labels.insert(("f".to_string(), "top".to_string()), 0x40);
        let mut interner = FakeInterner { vars: vec![], calls: vec![], labels };
        let instr = Instr::BrA { target: Ref::Label("top".to_string()) };
        let (bytes, fixups) = instr.encode("f", &mut interner).unwrap();
        assert!(fixups.is_empty());
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 0x40);
    }

    #[test]
    fn funcaddr_target_is_deferred() {
        let mut interner = FakeInterner { vars: vec![], calls: vec![], labels: HashMap::new() };
        let instr = Instr::IntCall { lx: None, target: Ref::FuncAddr("g".to_string()), params: vec![] };
        let (bytes, fixups) = instr.encode("f", &mut interner).unwrap();
        assert_eq!(fixups, vec![(4, "g".to_string())]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn br_displacement_sits_in_the_upper_half() {
        let mut interner = FakeInterner { vars: vec![], calls: vec![], labels: HashMap::new() };
        let (bytes, _) = Instr::Br { disp: -12 }.encode("f", &mut interner).unwrap();
        assert_eq!(bytes[0], Opcode::BR as u8);
        assert_eq!(bytes[1], 0);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -12);
        // same layout BrCond uses for its own displacement
        let (brcond_bytes, _) =
            Instr::BrCond { sense: Sense::OnTrue, lx: 5, disp: -12 }.encode("f", &mut interner).unwrap();
        assert_eq!(&bytes[2..4], &brcond_bytes[2..4]);
    }

    #[test]
    fn func_header_second_word_has_no_opcode_byte() {
        let mut interner = FakeInterner { vars: vec![], calls: vec![], labels: HashMap::new() };
        let instr = Instr::Func { locals: 3, params: 1, variant: Variant::Zero, zero_init_bound: 2 };
        let (bytes, _) = instr.encode("f", &mut interner).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[0..4], [Opcode::FUNC as u8, 3, 1, Variant::Zero.flag()]);
        assert_eq!(bytes[4..8], [2, 0, 0, 0]);
    }
}
