//! A native reference interpreter over linked [`SourceFunction`] bodies.
//!
//! This exists to validate the semantics the textual [`super::generator`]
//! describes, and to give integration tests something executable without
//! spinning up a host program around generated source. It interprets the
//! symbolic [`Instr`] tree directly rather than decoding bytes, so branch
//! targets are resolved to instruction indices once up front instead of
//! byte offsets: `Ref::Label`/`Ref::FuncAddr` never need a second pass
//! here the way the linker's byte image does.

use std::collections::HashMap;

use crate::frame::Frame;
use crate::instr::Instr;
use crate::interp::{ExternValue, Host};
use crate::module::SourceFunction;
use crate::value::{CmpOp, ConvOp, DCmpOp, Kind, Ref, Sense, Variant};
use crate::{Error, Result};

struct CompiledFunction {
    source: SourceFunction,
    label_index: HashMap<String, usize>,
}

fn build(source: &SourceFunction) -> Result<CompiledFunction> {
    let mut offsets = Vec::with_capacity(source.body.len());
    let mut cursor = 8u32; // past the two-word FUNC header
    for instr in &source.body {
        offsets.push(cursor);
        cursor += instr.byte_len();
    }

    let mut label_index = HashMap::new();
    for (label, byte_offset) in &source.labels {
        let idx = offsets
            .iter()
            .position(|o| o == byte_offset)
            .ok_or_else(|| Error::UnresolvedLabel(source.name.clone(), label.clone()))?;
        label_index.insert(label.clone(), idx);
    }

    Ok(CompiledFunction { source: source.clone(), label_index })
}

/// A set of interpreted functions ready to run, plus a recursion budget
/// derived from the same `EMT_STACK_MAX` the linker reserves.
pub struct Program {
    functions: HashMap<String, CompiledFunction>,
    max_depth: u32,
    depth: u32,
}

impl Program {
    pub fn new(functions: &[&SourceFunction], stack_max: u32) -> Result<Self> {
        let mut map = HashMap::new();
        for f in functions {
            map.insert(f.name.clone(), build(f)?);
        }
        let max_depth = (stack_max / crate::frame::FRAME_BYTES as u32).max(1);
        Ok(Self { functions: map, max_depth, depth: 0 })
    }

    pub fn call(
        &mut self,
        name: &str,
        args: &[ExternValue],
        host: &mut dyn Host,
    ) -> Result<ExternValue> {
        let raw = {
            self.function(name)?;
            let mut frame = Frame::new();
            for (i, arg) in args.iter().enumerate() {
                match arg {
                    ExternValue::Int(v) => frame.set_i32(i as u8, *v),
                    ExternValue::Double(v) => frame.set_f64(i as u8, *v),
                }
            }
            self.run(name, frame, host)?
        };
        let kind = self.function(name)?.source.return_kind;
        Ok(decode_raw(kind, raw))
    }

    fn function(&self, name: &str) -> Result<&CompiledFunction> {
        self.functions.get(name).ok_or_else(|| Error::UnresolvedFuncAddr(name.to_string()))
    }

    fn run(&mut self, name: &str, mut frame: Frame, host: &mut dyn Host) -> Result<[u8; 8]> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(Error::StackOverflow);
        }
        let result = self.run_inner(name, &mut frame, host);
        self.depth -= 1;
        result
    }

    #[allow(clippy::too_many_lines)]
    fn run_inner(&mut self, name: &str, frame: &mut Frame, host: &mut dyn Host) -> Result<[u8; 8]> {
        let body_len = self.function(name)?.source.body.len();
        let mut pc: usize = 0;

        if self.function(name)?.source.variant == Variant::Normal {
            let start = self.function(name)?.source.params;
            let bound = self.function(name)?.source.zero_init_bound;
            frame.zero_range(start, bound);
        }

        while pc < body_len {
            // Clone out the instruction to release the immutable borrow
            // on `self.functions` before any recursive `self.run` call.
            let instr = self.function(name)?.source.body[pc].clone();
            let mut next_pc = pc + 1;

            match instr {
                Instr::Set { lx, ly } => frame.set_raw8(lx, frame.get_raw8(ly)),
                Instr::SetVi { lx, imm } => frame.set_i32(lx, i32::from(imm)),
                Instr::SetVib { lx, imm } => frame.set_i32(lx, imm),

                Instr::IntBin { op, lx, ly, lz } => {
                    let result = eval_int_bin(op, frame.get_i32(ly), frame.get_i32(lz));
                    frame.set_i32(lx, result);
                }
                Instr::IntBinImm { op, lx, ly, imm } => {
                    let rhs = if op.imm_is_unsigned() { i32::from(imm as u8) } else { i32::from(imm) };
                    let result = eval_int_bin(op, frame.get_i32(ly), rhs);
                    frame.set_i32(lx, result);
                }
                Instr::IntUn { op, lx, ly } => {
                    let v = frame.get_i32(ly);
                    let result = match op {
                        crate::value::IntUnOp::Neg => v.wrapping_neg(),
                        crate::value::IntUnOp::Bnot => !v,
                        crate::value::IntUnOp::Lnot => i32::from(v == 0),
                    };
                    frame.set_i32(lx, result);
                }

                Instr::CmpBranch { op, sense, ly, lz, target } => {
                    let taken = eval_cmp(op, frame.get_i32(ly), frame.get_i32(lz));
                    let fires = match sense {
                        Sense::OnTrue => taken,
                        Sense::OnFalse => !taken,
                    };
                    if fires {
                        next_pc = self.resolve(name, &target)?;
                    }
                }

                Instr::SetD { lx, ly } => frame.set_f64(lx, frame.get_f64(ly)),
                Instr::SetVd { lx, imm } => frame.set_f64(lx, f64::from(imm)),
                Instr::SetVdi { lx, imm } => frame.set_f64(lx, f64::from(imm)),
                Instr::SetVdf { lx, imm } => frame.set_f64(lx, f64::from(imm)),
                Instr::SetVdd { lx, imm } => frame.set_f64(lx, imm),
                Instr::DBin { op, lx, ly, lz } => {
                    let a = frame.get_f64(ly);
                    let b = frame.get_f64(lz);
                    let result = match op {
                        crate::value::DBinOp::Add => a + b,
                        crate::value::DBinOp::Sub => a - b,
                        crate::value::DBinOp::Mul => a * b,
                        crate::value::DBinOp::Div => a / b,
                        crate::value::DBinOp::Mod => a % b,
                    };
                    frame.set_f64(lx, result);
                }
                Instr::NegD { lx, ly } => frame.set_f64(lx, -frame.get_f64(ly)),
                Instr::DCmp { op, lx, ly, lz } => {
                    let a = frame.get_f64(ly);
                    let b = frame.get_f64(lz);
                    let result = match op {
                        DCmpOp::Eq => a == b,
                        DCmpOp::Ne => a != b,
                        DCmpOp::Lt => a < b,
                        DCmpOp::Le => a <= b,
                        DCmpOp::Gt => a > b,
                        DCmpOp::Ge => a >= b,
                    };
                    frame.set_i32(lx, i32::from(result));
                }
                Instr::Convert { op, lx, ly } => match op {
                    ConvOp::D2I => frame.set_i32(lx, frame.get_f64(ly) as i32),
                    ConvOp::Si2d => frame.set_f64(lx, f64::from(frame.get_i32(ly))),
                    ConvOp::Ui2d => frame.set_f64(lx, f64::from(frame.get_u32(ly))),
                },

                Instr::Load { .. }
                | Instr::Store { .. }
                | Instr::LoadA { .. }
                | Instr::StoreA { .. }
                | Instr::LoadAV { .. }
                | Instr::StoreAV { .. }
                | Instr::StoreC { .. } => {
                    // Linear memory access requires a backing heap, which
                    // this register-only reference interpreter does not
                    // model; modules under test keep memory traffic out
                    // of interpreted bodies.
                }

                Instr::Br { disp } => next_pc = offset_pc(pc, disp)?,
                Instr::BrCond { sense, lx, disp } => {
                    let cond = frame.get_i32(lx) != 0;
                    let fires = match sense {
                        Sense::OnTrue => cond,
                        Sense::OnFalse => !cond,
                    };
                    if fires {
                        next_pc = offset_pc(pc, disp)?;
                    }
                }
                Instr::BrA { target } => next_pc = self.resolve(name, &target)?,
                Instr::BrCondA { sense, lx, target } => {
                    let cond = frame.get_i32(lx) != 0;
                    let fires = match sense {
                        Sense::OnTrue => cond,
                        Sense::OnFalse => !cond,
                    };
                    if fires {
                        next_pc = self.resolve(name, &target)?;
                    }
                }
                Instr::Cond { lx, ly, lz } => {
                    if frame.get_i32(lx) != 0 {
                        frame.set_raw8(lx, frame.get_raw8(ly));
                    } else {
                        frame.set_raw8(lx, frame.get_raw8(lz));
                    }
                }
                Instr::CondD { lx, ly, lz } => {
                    if frame.get_i32(lx) != 0 {
                        frame.set_raw8(lx, frame.get_raw8(ly));
                    } else {
                        frame.set_raw8(lx, frame.get_raw8(lz));
                    }
                }
                Instr::Switch { lx, ly, lz, table } => {
                    // `r[lz]` carries the jump table's length (set by the
                    // caller's codegen to match `table.len()`); an index
                    // outside `[0, r[lz])` falls through to whatever
                    // instruction follows the table, i.e. ordinary
                    // fallthrough, not a sentinel table entry.
                    let i = (frame.get_u32(lx)).wrapping_sub(frame.get_u32(ly)) as usize;
                    let len = frame.get_u32(lz) as usize;
                    if i < len && i < table.len() {
                        next_pc = self.resolve(name, &table[i])?;
                    }
                }
                Instr::Ret { lx } => return Ok(frame.get_raw8(lx)),

                Instr::GetTdp { lx } => frame.set_u32(lx, 0),
                Instr::GetTr0 { lx } => frame.set_f64(lx, 0.0),
                Instr::SetTr0 { .. } => {}
                Instr::GetGlbi { lx, name: gname } => frame.set_i32(lx, host.get_global(&gname)),
                Instr::SetGlbi { lx, name: gname } => host.set_global(&gname, frame.get_i32(lx)),
                Instr::GetSt { lx } => frame.set_u32(lx, 0),
                Instr::SetSt { .. } => {}

                Instr::IntCall { lx, target, params } => {
                    let callee = match &target {
                        Ref::FuncAddr(n) => n.clone(),
                        Ref::Label(_) => {
                            return Err(Error::UnresolvedFuncAddr("label used as call target".into()))
                        }
                    };
                    let mut callee_frame = Frame::new();
                    for (i, reg) in params.iter().enumerate() {
                        callee_frame.set_raw8(i as u8, frame.get_raw8(*reg));
                    }
                    let result = self.run(&callee, callee_frame, host)?;
                    if let Some(dest) = lx {
                        frame.set_raw8(dest, result);
                    }
                }
                Instr::ExtCall { lx, name: ename, sig, params, table_index } => {
                    let args: Vec<ExternValue> = params
                        .iter()
                        .zip(sig.params.iter())
                        .map(|(reg, kind)| match kind {
                            Kind::Double | Kind::Float => ExternValue::Double(frame.get_f64(*reg)),
                            _ => ExternValue::Int(frame.get_i32(*reg)),
                        })
                        .collect();
                    let table_idx = table_index.map(|reg| frame.get_i32(reg));
                    let result = host.call_extern(&ename, &sig, &args, table_idx)?;
                    if let Some(dest) = lx {
                        match sig.ret {
                            Kind::Double | Kind::Float => frame.set_f64(dest, result.as_f64()),
                            _ => frame.set_i32(dest, result.as_i32()),
                        }
                    }
                }

                Instr::Func { .. } => {}
            }

            pc = next_pc;
        }

        Ok([0; 8])
    }

    fn resolve(&self, function: &str, target: &Ref) -> Result<usize> {
        match target {
            Ref::Label(label) => self
                .function(function)?
                .label_index
                .get(label)
                .copied()
                .ok_or_else(|| Error::UnresolvedLabel(function.to_string(), label.clone())),
            Ref::FuncAddr(f) => Err(Error::UnresolvedFuncAddr(f.clone())),
        }
    }
}

fn offset_pc(pc: usize, disp: i16) -> Result<usize> {
    let target = pc as i64 + i64::from(disp);
    if target < 0 {
        return Err(Error::UnalignedTarget(0));
    }
    Ok(target as usize)
}

fn eval_int_bin(op: crate::value::IntBinOp, a: i32, b: i32) -> i32 {
    use crate::value::IntBinOp as Op;
    match op {
        Op::Add => a.wrapping_add(b),
        Op::Sub => a.wrapping_sub(b),
        Op::Mul => a.wrapping_mul(b),
        Op::Sdiv => a.checked_div(b).unwrap_or(0),
        Op::Udiv => ((a as u32).checked_div(b as u32).unwrap_or(0)) as i32,
        Op::Smod => a.checked_rem(b).unwrap_or(0),
        Op::Umod => ((a as u32).checked_rem(b as u32).unwrap_or(0)) as i32,
        Op::Eq => i32::from(a == b),
        Op::Ne => i32::from(a != b),
        Op::Slt => i32::from(a < b),
        Op::Ult => i32::from((a as u32) < (b as u32)),
        Op::Sle => i32::from(a <= b),
        Op::Ule => i32::from((a as u32) <= (b as u32)),
        Op::And => a & b,
        Op::Or => a | b,
        Op::Xor => a ^ b,
        Op::Shl => a.wrapping_shl(b as u32 & 31),
        Op::Ashr => a.wrapping_shr(b as u32 & 31),
        Op::Lshr => ((a as u32).wrapping_shr(b as u32 & 31)) as i32,
    }
}

fn eval_cmp(op: CmpOp, a: i32, b: i32) -> bool {
    match op {
        CmpOp::Lnot => a == 0,
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Slt => a < b,
        CmpOp::Ult => (a as u32) < (b as u32),
        CmpOp::Sle => a <= b,
        CmpOp::Ule => (a as u32) <= (b as u32),
    }
}

fn decode_raw(kind: Kind, raw: [u8; 8]) -> ExternValue {
    match kind {
        Kind::Double | Kind::Float => ExternValue::Double(f64::from_le_bytes(raw)),
        _ => ExternValue::Int(i32::from_le_bytes(raw[0..4].try_into().unwrap())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{IntBinOp, Variant};
    use std::collections::HashMap as Map;

    struct NoHost;
    impl Host for NoHost {
        fn call_extern(
            &mut self,
            _name: &str,
            _sig: &crate::value::Signature,
            _args: &[ExternValue],
            _table_index: Option<i32>,
        ) -> Result<ExternValue> {
            Err(Error::UnknownExtCall(0))
        }
        fn get_global(&mut self, _name: &str) -> i32 {
            0
        }
        fn set_global(&mut self, _name: &str, _value: i32) {}
    }

    fn identity() -> SourceFunction {
        SourceFunction {
            name: "identity".to_string(),
            locals: 1,
            params: 1,
            variant: Variant::Zero,
            zero_init_bound: 0,
            return_kind: Kind::Int,
            body: vec![Instr::Ret { lx: 0 }],
            labels: Map::new(),
        }
    }

    fn add_const() -> SourceFunction {
        SourceFunction {
            name: "add_const".to_string(),
            locals: 2,
            params: 1,
            variant: Variant::Zero,
            zero_init_bound: 0,
            return_kind: Kind::Int,
            body: vec![
                Instr::IntBinImm { op: IntBinOp::Add, lx: 1, ly: 0, imm: 7 },
                Instr::Ret { lx: 1 },
            ],
            labels: Map::new(),
        }
    }

    #[test]
    fn identity_returns_its_argument() {
        let f = identity();
        let funcs = vec![&f];
        let mut program = Program::new(&funcs, 1 << 20).unwrap();
        let mut host = NoHost;
        let result = program.call("identity", &[ExternValue::Int(42)], &mut host).unwrap();
        assert_eq!(result.as_i32(), 42);
    }

    #[test]
    fn add_constant_adds_seven() {
        let f = add_const();
        let funcs = vec![&f];
        let mut program = Program::new(&funcs, 1 << 20).unwrap();
        let mut host = NoHost;
        let result = program.call("add_const", &[ExternValue::Int(3)], &mut host).unwrap();
        assert_eq!(result.as_i32(), 10);
    }

    #[test]
    fn backward_branch_loop_terminates() {
        // r0 = 0; r1 = 10
        // loop: r0 = r0 + 1; if r0 < r1 branch loop; ret r0
        let mut labels = Map::new();
        labels.insert("loop".to_string(), 8 + Instr::SetVi { lx: 0, imm: 0 }.byte_len());
        let body = vec![
            Instr::SetVi { lx: 0, imm: 0 },
            Instr::SetVi { lx: 1, imm: 10 },
            Instr::IntBinImm { op: IntBinOp::Add, lx: 0, ly: 0, imm: 1 },
            Instr::CmpBranch {
                op: CmpOp::Slt,
                sense: Sense::OnTrue,
                ly: 0,
                lz: 1,
                target: Ref::Label("loop".to_string()),
            },
            Instr::Ret { lx: 0 },
        ];
        let f = SourceFunction {
            name: "count".to_string(),
            locals: 2,
            params: 0,
            variant: Variant::Zero,
            zero_init_bound: 0,
            return_kind: Kind::Int,
            body,
            labels,
        };
        let funcs = vec![&f];
        let mut program = Program::new(&funcs, 1 << 20).unwrap();
        let mut host = NoHost;
        let result = program.call("count", &[], &mut host).unwrap();
        assert_eq!(result.as_i32(), 10);
    }

    #[test]
    fn recursive_intcall_to_depth_sixteen_succeeds() {
        // countdown(n): if n <= 0 return 0; else return 1 + countdown(n - 1)
        let i0 = Instr::IntBinImm { op: IntBinOp::Sle, lx: 1, ly: 0, imm: 0 };
        let i1 = Instr::BrCondA { sense: Sense::OnTrue, lx: 1, target: Ref::Label("base".to_string()) };
        let i2 = Instr::IntBinImm { op: IntBinOp::Sub, lx: 2, ly: 0, imm: 1 };
        let i3 = Instr::IntCall {
            lx: Some(0),
            target: Ref::FuncAddr("countdown".to_string()),
            params: vec![2],
        };
        let i4 = Instr::IntBinImm { op: IntBinOp::Add, lx: 0, ly: 0, imm: 1 };
        let i5 = Instr::Ret { lx: 0 };
        let i6 = Instr::SetVi { lx: 0, imm: 0 };
        let i7 = Instr::Ret { lx: 0 };

        let base_offset =
            8 + i0.byte_len() + i1.byte_len() + i2.byte_len() + i3.byte_len() + i4.byte_len() + i5.byte_len();
        let mut labels = Map::new();
        labels.insert("base".to_string(), base_offset);

        let f = SourceFunction {
            name: "countdown".to_string(),
            locals: 3,
            params: 1,
            variant: Variant::Normal,
            zero_init_bound: 3,
            return_kind: Kind::Int,
            body: vec![i0, i1, i2, i3, i4, i5, i6, i7],
            labels,
        };
        let funcs = vec![&f];
        let mut program = Program::new(&funcs, 1 << 20).unwrap();
        let mut host = NoHost;
        let result = program.call("countdown", &[ExternValue::Int(16)], &mut host).unwrap();
        assert_eq!(result.as_i32(), 16);
    }
}
