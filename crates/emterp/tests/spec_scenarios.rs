//! Black-box coverage of the six concrete scenarios against the public
//! `interp::exec` surface: build a [`SourceFunction`], run it through
//! [`Program`], check the result. No generated-source / CLI glue here —
//! that's covered separately.

use std::collections::HashMap;

use emterp::instr::Instr;
use emterp::interp::exec::Program;
use emterp::interp::{ExternValue, Host};
use emterp::module::SourceFunction;
use emterp::value::{CmpOp, IntBinOp, Kind, Ref, Sense, Signature, Variant};

struct NoHost;
impl Host for NoHost {
    fn call_extern(
        &mut self,
        _name: &str,
        _sig: &Signature,
        _args: &[ExternValue],
        _table_index: Option<i32>,
    ) -> emterp::Result<ExternValue> {
        Err(emterp::Error::UnknownExtCall(0))
    }
    fn get_global(&mut self, _name: &str) -> i32 {
        0
    }
    fn set_global(&mut self, _name: &str, _value: i32) {}
}

#[test]
fn identity_function_returns_its_argument() {
    let f = SourceFunction {
        name: "identity".to_string(),
        locals: 1,
        params: 1,
        variant: Variant::Zero,
        zero_init_bound: 0,
        return_kind: Kind::Int,
        body: vec![Instr::Ret { lx: 0 }],
        labels: HashMap::new(),
    };
    let funcs = vec![&f];
    let mut program = Program::new(&funcs, 1 << 20).unwrap();
    let mut host = NoHost;
    let result = program.call("identity", &[ExternValue::Int(7)], &mut host).unwrap();
    assert_eq!(result.as_i32(), 7);
}

#[test]
fn add_constant_wraps_around_negative_two() {
    // int f(int x) { return x + 3; }
    let f = SourceFunction {
        name: "add3".to_string(),
        locals: 2,
        params: 1,
        variant: Variant::Zero,
        zero_init_bound: 0,
        return_kind: Kind::Int,
        body: vec![
            Instr::IntBinImm { op: IntBinOp::Add, lx: 1, ly: 0, imm: 3 },
            Instr::Ret { lx: 1 },
        ],
        labels: HashMap::new(),
    };
    let funcs = vec![&f];
    let mut program = Program::new(&funcs, 1 << 20).unwrap();
    let mut host = NoHost;
    let result = program.call("add3", &[ExternValue::Int(-2_i32)], &mut host).unwrap();
    assert_eq!(result.as_i32() as u32, 0x0000_0001);
}

#[test]
fn backward_branch_terminates_the_countdown_guard() {
    // r0 = 0; r1 = 10; loop: r0 += 1; if r0 < r1 goto loop; ret r0
    let i0 = Instr::SetVi { lx: 0, imm: 0 };
    let i1 = Instr::SetVi { lx: 1, imm: 10 };
    let i2 = Instr::IntBinImm { op: IntBinOp::Add, lx: 0, ly: 0, imm: 1 };
    let i3 = Instr::CmpBranch {
        op: CmpOp::Slt,
        sense: Sense::OnTrue,
        ly: 0,
        lz: 1,
        target: Ref::Label("loop".to_string()),
    };
    let i4 = Instr::Ret { lx: 0 };

    let loop_offset = 8 + i0.byte_len() + i1.byte_len();
    let mut labels = HashMap::new();
    labels.insert("loop".to_string(), loop_offset);

    let f = SourceFunction {
        name: "count".to_string(),
        locals: 2,
        params: 0,
        variant: Variant::Zero,
        zero_init_bound: 0,
        return_kind: Kind::Int,
        body: vec![i0, i1, i2, i3, i4],
        labels,
    };
    let funcs = vec![&f];
    let mut program = Program::new(&funcs, 1 << 20).unwrap();
    let mut host = NoHost;
    let result = program.call("count", &[], &mut host).unwrap();
    assert_eq!(result.as_i32(), 10);
}

#[test]
fn switch_out_of_range_index_falls_through_to_the_default() {
    // r0 = 100 (index); r1 = 0 (base); r2 = 3 (table length).
    // i - base = 100, which is >= len, so the table is skipped entirely
    // and the instruction right after SWITCH runs: the default.
    let i0 = Instr::SetVi { lx: 0, imm: 100 };
    let i1 = Instr::SetVi { lx: 1, imm: 0 };
    let i2 = Instr::SetVi { lx: 2, imm: 3 };
    let switch = Instr::Switch {
        lx: 0,
        ly: 1,
        lz: 2,
        table: vec![
            Ref::Label("case0".to_string()),
            Ref::Label("case1".to_string()),
            Ref::Label("case2".to_string()),
        ],
    };
    let default_set = Instr::SetVi { lx: 3, imm: 42 };
    let default_ret = Instr::Ret { lx: 3 };
    let case0_set = Instr::SetVi { lx: 3, imm: 0 };
    let case0_ret = Instr::Ret { lx: 3 };
    let case1_set = Instr::SetVi { lx: 3, imm: 1 };
    let case1_ret = Instr::Ret { lx: 3 };
    let case2_set = Instr::SetVi { lx: 3, imm: 2 };
    let case2_ret = Instr::Ret { lx: 3 };

    let mut offset = 8
        + i0.byte_len()
        + i1.byte_len()
        + i2.byte_len()
        + switch.byte_len()
        + default_set.byte_len()
        + default_ret.byte_len();
    let mut labels = HashMap::new();
    labels.insert("case0".to_string(), offset);
    offset += case0_set.byte_len() + case0_ret.byte_len();
    labels.insert("case1".to_string(), offset);
    offset += case1_set.byte_len() + case1_ret.byte_len();
    labels.insert("case2".to_string(), offset);

    let f = SourceFunction {
        name: "dispatch".to_string(),
        locals: 4,
        params: 0,
        variant: Variant::Zero,
        zero_init_bound: 0,
        return_kind: Kind::Int,
        body: vec![
            i0, i1, i2, switch, default_set, default_ret, case0_set, case0_ret, case1_set, case1_ret, case2_set,
            case2_ret,
        ],
        labels,
    };
    let funcs = vec![&f];
    let mut program = Program::new(&funcs, 1 << 20).unwrap();
    let mut host = NoHost;
    let result = program.call("dispatch", &[], &mut host).unwrap();
    assert_eq!(result.as_i32(), 42, "an out-of-range index must hit the default, not any table entry");
}

#[test]
fn switch_in_range_index_reaches_its_table_entry() {
    let i0 = Instr::SetVi { lx: 0, imm: 1 };
    let i1 = Instr::SetVi { lx: 1, imm: 0 };
    let i2 = Instr::SetVi { lx: 2, imm: 3 };
    let switch = Instr::Switch {
        lx: 0,
        ly: 1,
        lz: 2,
        table: vec![
            Ref::Label("case0".to_string()),
            Ref::Label("case1".to_string()),
            Ref::Label("case2".to_string()),
        ],
    };
    let default_set = Instr::SetVi { lx: 3, imm: 42 };
    let default_ret = Instr::Ret { lx: 3 };
    let case0_set = Instr::SetVi { lx: 3, imm: 0 };
    let case0_ret = Instr::Ret { lx: 3 };
    let case1_set = Instr::SetVi { lx: 3, imm: 1 };
    let case1_ret = Instr::Ret { lx: 3 };
    let case2_set = Instr::SetVi { lx: 3, imm: 2 };
    let case2_ret = Instr::Ret { lx: 3 };

    let mut offset = 8
        + i0.byte_len()
        + i1.byte_len()
        + i2.byte_len()
        + switch.byte_len()
        + default_set.byte_len()
        + default_ret.byte_len();
    let mut labels = HashMap::new();
    labels.insert("case0".to_string(), offset);
    offset += case0_set.byte_len() + case0_ret.byte_len();
    labels.insert("case1".to_string(), offset);
    offset += case1_set.byte_len() + case1_ret.byte_len();
    labels.insert("case2".to_string(), offset);

    let f = SourceFunction {
        name: "dispatch".to_string(),
        locals: 4,
        params: 0,
        variant: Variant::Zero,
        zero_init_bound: 0,
        return_kind: Kind::Int,
        body: vec![
            i0, i1, i2, switch, default_set, default_ret, case0_set, case0_ret, case1_set, case1_ret, case2_set,
            case2_ret,
        ],
        labels,
    };
    let funcs = vec![&f];
    let mut program = Program::new(&funcs, 1 << 20).unwrap();
    let mut host = NoHost;
    let result = program.call("dispatch", &[], &mut host).unwrap();
    assert_eq!(result.as_i32(), 1);
}

#[test]
fn extcall_forwards_the_already_masked_function_table_index() {
    // A `FUNCTION_TABLE_ii` call with a 5-entry table masks its dynamic
    // index by 7 (next power of two minus one) before dispatch. That
    // masking is ordinary bytecode (ANDV) ahead of the call, not
    // something EXTCALL computes itself; this only checks the masked
    // value in the index register reaches the host unchanged.
    struct CapturingHost {
        seen_table_index: Option<i32>,
    }
    impl Host for CapturingHost {
        fn call_extern(
            &mut self,
            name: &str,
            _sig: &Signature,
            args: &[ExternValue],
            table_index: Option<i32>,
        ) -> emterp::Result<ExternValue> {
            assert_eq!(name, "FUNCTION_TABLE_ii");
            self.seen_table_index = table_index;
            Ok(ExternValue::Int(args[0].as_i32()))
        }
        fn get_global(&mut self, _name: &str) -> i32 {
            0
        }
        fn set_global(&mut self, _name: &str, _value: i32) {}
    }

    let f = SourceFunction {
        name: "call_indirect".to_string(),
        locals: 3,
        params: 1,
        variant: Variant::Zero,
        zero_init_bound: 0,
        return_kind: Kind::Int,
        body: vec![
            // r1 = raw index (13), over a 5-entry table
            Instr::SetVi { lx: 1, imm: 13 },
            // r1 &= 7 (next-pow2(5) - 1), as the caller's codegen would emit
            Instr::IntBinImm { op: IntBinOp::And, lx: 1, ly: 1, imm: 7 },
            Instr::ExtCall {
                lx: Some(2),
                name: "FUNCTION_TABLE_ii".to_string(),
                sig: Signature::new(Kind::Int, vec![Kind::Int]),
                params: vec![0],
                table_index: Some(1),
            },
            Instr::Ret { lx: 2 },
        ],
        labels: HashMap::new(),
    };
    let funcs = vec![&f];
    let mut program = Program::new(&funcs, 1 << 20).unwrap();
    let mut host = CapturingHost { seen_table_index: None };
    let result = program.call("call_indirect", &[ExternValue::Int(99)], &mut host).unwrap();
    assert_eq!(result.as_i32(), 99);
    assert_eq!(host.seen_table_index, Some(13 & 7));
}

#[test]
fn nested_intcall_recursion_to_depth_sixteen_matches_caller_order() {
    // countdown(n): if n <= 0 return 0; else return 1 + countdown(n - 1)
    let i0 = Instr::IntBinImm { op: IntBinOp::Sle, lx: 1, ly: 0, imm: 0 };
    let i1 = Instr::BrCondA { sense: Sense::OnTrue, lx: 1, target: Ref::Label("base".to_string()) };
    let i2 = Instr::IntBinImm { op: IntBinOp::Sub, lx: 2, ly: 0, imm: 1 };
    let i3 = Instr::IntCall { lx: Some(0), target: Ref::FuncAddr("countdown".to_string()), params: vec![2] };
    let i4 = Instr::IntBinImm { op: IntBinOp::Add, lx: 0, ly: 0, imm: 1 };
    let i5 = Instr::Ret { lx: 0 };
    let i6 = Instr::SetVi { lx: 0, imm: 0 };
    let i7 = Instr::Ret { lx: 0 };

    let base_offset =
        8 + i0.byte_len() + i1.byte_len() + i2.byte_len() + i3.byte_len() + i4.byte_len() + i5.byte_len();
    let mut labels = HashMap::new();
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
    // Stack budget tight enough that only correct per-frame accounting,
    // not a generously oversized default, gets depth 16 to succeed.
    let mut program = Program::new(&funcs, 64 * emterp::frame::FRAME_BYTES as u32).unwrap();
    let mut host = NoHost;
    let result = program.call("countdown", &[ExternValue::Int(16)], &mut host).unwrap();
    assert_eq!(result.as_i32(), 16);
}
