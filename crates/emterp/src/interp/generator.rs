//! Renders the textual Rust source of a stack-machine interpreter
//! equivalent to [`super::exec::Program`]'s semantics, for splicing into
//! a host program by [`crate::rewrite`].
//!
//! The original toolchain emitted two near-duplicate JS functions
//! (`emterpret`/`emterpret_z`) differing only in whether the prologue
//! allocates a fresh frame or reuses the caller's. Here that's one
//! function generic over a `const ZERO: bool`, with two zero-cost public
//! wrappers selecting it — the unification the Design Notes ask for,
//! rather than carrying the duplication forward.
//!
//! Per-opcode fragments are collected as `(opcode byte, rendered arm)`
//! pairs rather than concatenated straight into the output text, so the
//! same case table can back either the flat decode loop or the two-tier
//! one an `INNERTERPRETER_LAST_OPCODE`-style cutoff asks for: opcodes at
//! or below the cutoff get a tight inner loop that keeps re-dispatching
//! without falling back out to the full switch, trimming register
//! pressure on the hot path for the opcodes that dominate it.

use std::fmt::Write as _;

use crate::opcode::{Opcode, OPCODE_TABLE};
use crate::value::{CmpOp, ConvOp, DBinOp, DCmpOp, IntBinOp, IntUnOp, LoadWidth, StoreWidth};

const PRELUDE: &str = r#"// Generated interpreter source. Do not hand-edit: regenerate from the
// module this came from instead.
//
// The embedding host is expected to provide:
//   host_load/host_load_a/host_load_av, host_store*, host_store_c  - linear memory access;
//                                                                    register operands are
//                                                                    frame indices, not
//                                                                    resolved addresses
//   host_int_call(target, frame, params) -> i32                    - INTCALL dispatch
//   host_ext_call(id, table_index, frame, params) -> i32            - EXTCALL dispatch
//   host_get_global/host_set_global(id) -> i32                      - GETGLBI/SETGLBI
#![allow(clippy::all, unused_variables)]

#[inline]
fn rd_u8(code: &[u8], pc: u32, off: u32) -> u8 {
    code[(pc + off) as usize]
}

#[inline]
fn rd_i32(code: &[u8], pc: u32, off: u32) -> i32 {
    i32::from_le_bytes(code[(pc + off) as usize..(pc + off) as usize + 4].try_into().unwrap())
}

#[inline]
fn rd_u32(code: &[u8], pc: u32, off: u32) -> u32 {
    rd_i32(code, pc, off) as u32
}

#[inline]
fn rd_f32(code: &[u8], pc: u32, off: u32) -> f32 {
    f32::from_le_bytes(code[(pc + off) as usize..(pc + off) as usize + 4].try_into().unwrap())
}

#[inline]
fn rd_f64(code: &[u8], pc: u32, off: u32) -> f64 {
    f64::from_le_bytes(code[(pc + off) as usize..(pc + off) as usize + 8].try_into().unwrap())
}

#[inline]
fn geti(frame: &[u8], r: u8) -> i32 {
    let o = r as usize * 8;
    i32::from_le_bytes(frame[o..o + 4].try_into().unwrap())
}

#[inline]
fn setu(frame: &mut [u8], r: u8, v: u32) {
    seti(frame, r, v as i32)
}

#[inline]
fn getu(frame: &[u8], r: u8) -> u32 {
    geti(frame, r) as u32
}

#[inline]
fn seti(frame: &mut [u8], r: u8, v: i32) {
    let o = r as usize * 8;
    frame[o..o + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn getd(frame: &[u8], r: u8) -> f64 {
    let o = r as usize * 8;
    f64::from_le_bytes(frame[o..o + 8].try_into().unwrap())
}

#[inline]
fn setd(frame: &mut [u8], r: u8, v: f64) {
    let o = r as usize * 8;
    frame[o..o + 8].copy_from_slice(&v.to_le_bytes());
}

/// Runs from `pc` until a `RET`, which writes its register's raw 8 bytes
/// to `heap` at `*emtstacktop` and, for the non-`ZERO` variant, restores
/// `*emtstacktop` to the caller-supplied `sp`. The `u32` this returns is
/// just the `RET` instruction's own `pc`, a completion sentinel; callers
/// read the actual return payload back out of `heap`.
"#;

fn int_bin_ops() -> Vec<(IntBinOp, &'static str)> {
    use IntBinOp::*;
    // "{B}" stands in for the right-hand operand so the same template
    // serves both the register and the immediate form of each opcode.
    vec![
        (Add, "a.wrapping_add({B})"),
        (Sub, "a.wrapping_sub({B})"),
        (Mul, "a.wrapping_mul({B})"),
        (Sdiv, "a.checked_div({B}).unwrap_or(0)"),
        (Udiv, "((a as u32).checked_div({B} as u32).unwrap_or(0)) as i32"),
        (Smod, "a.checked_rem({B}).unwrap_or(0)"),
        (Umod, "((a as u32).checked_rem({B} as u32).unwrap_or(0)) as i32"),
        (Eq, "(a == {B}) as i32"),
        (Ne, "(a != {B}) as i32"),
        (Slt, "(a < {B}) as i32"),
        (Ult, "((a as u32) < ({B} as u32)) as i32"),
        (Sle, "(a <= {B}) as i32"),
        (Ule, "((a as u32) <= ({B} as u32)) as i32"),
        (And, "a & {B}"),
        (Or, "a | {B}"),
        (Xor, "a ^ {B}"),
        (Shl, "a.wrapping_shl({B} as u32 & 31)"),
        (Ashr, "a.wrapping_shr({B} as u32 & 31)"),
        (Lshr, "((a as u32).wrapping_shr({B} as u32 & 31)) as i32"),
    ]
}

/// One opcode's rendered match arm, tagged with its byte so callers can
/// partition the table for a tiered decode loop without re-parsing text.
type Arm = (u8, String);

fn push_arm(arms: &mut Vec<Arm>, byte: u8, text: String) {
    arms.push((byte, text));
}

fn render_int_bin(arms: &mut Vec<Arm>) {
    for (op, template) in int_bin_ops() {
        let reg_expr = template.replace("{B}", "b");
        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ let a = geti(frame, rd_u8(code, pc, 2)); let b = geti(frame, rd_u8(code, pc, 3)); let r = {}; seti(frame, rd_u8(code, pc, 1), r); pc + 4 }}",
            op.opcode() as u8,
            reg_expr,
        );
        push_arm(arms, op.opcode() as u8, s);

        let imm_decode =
            if op.imm_is_unsigned() { "rd_u8(code, pc, 3) as i32" } else { "rd_u8(code, pc, 3) as i8 as i32" };
        let imm_expr = template.replace("{B}", "imm");
        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ let a = geti(frame, rd_u8(code, pc, 2)); let imm = {}; let r = {}; seti(frame, rd_u8(code, pc, 1), r); pc + 4 }}",
            op.imm_opcode() as u8,
            imm_decode,
            imm_expr,
        );
        push_arm(arms, op.imm_opcode() as u8, s);
    }
}

fn render_int_un(arms: &mut Vec<Arm>) {
    for (op, expr) in [
        (IntUnOp::Neg, "a.wrapping_neg()"),
        (IntUnOp::Bnot, "!a"),
        (IntUnOp::Lnot, "(a == 0) as i32"),
    ] {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ let a = geti(frame, rd_u8(code, pc, 2)); let r = {}; seti(frame, rd_u8(code, pc, 1), r); pc + 4 }}",
            op.opcode() as u8,
            expr,
        );
        push_arm(arms, op.opcode() as u8, s);
    }
}

fn render_cmp_branch(arms: &mut Vec<Arm>) {
    for (op, expr) in [
        (CmpOp::Lnot, "a == 0"),
        (CmpOp::Eq, "a == b"),
        (CmpOp::Ne, "a != b"),
        (CmpOp::Slt, "a < b"),
        (CmpOp::Ult, "(a as u32) < (b as u32)"),
        (CmpOp::Sle, "a <= b"),
        (CmpOp::Ule, "(a as u32) <= (b as u32)"),
    ] {
        for (opcode, negate) in [(op.opcode(), true), (op.brt_opcode(), false)] {
            let cond = if negate { format!("!({expr})") } else { expr.to_string() };
            let mut s = String::new();
            let _ = writeln!(
                s,
                "            {} => {{ let a = geti(frame, rd_u8(code, pc, 1)); let b = geti(frame, rd_u8(code, pc, 2)); if {} {{ rd_u32(code, pc, 4) }} else {{ pc + 8 }} }}",
                opcode as u8,
                cond,
            );
            push_arm(arms, opcode as u8, s);
        }
    }
}

fn render_double_family(arms: &mut Vec<Arm>) {
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ setd(frame, rd_u8(code, pc, 1), getd(frame, rd_u8(code, pc, 2))); pc + 4 }}", Opcode::SETD as u8);
    push_arm(arms, Opcode::SETD as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ setd(frame, rd_u8(code, pc, 1), rd_u8(code, pc, 2) as i8 as f64); pc + 4 }}", Opcode::SETVD as u8);
    push_arm(arms, Opcode::SETVD as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ setd(frame, rd_u8(code, pc, 1), rd_i32(code, pc, 4) as f64); pc + 8 }}", Opcode::SETVDI as u8);
    push_arm(arms, Opcode::SETVDI as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ setd(frame, rd_u8(code, pc, 1), rd_f32(code, pc, 4) as f64); pc + 8 }}", Opcode::SETVDF as u8);
    push_arm(arms, Opcode::SETVDF as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ setd(frame, rd_u8(code, pc, 1), rd_f64(code, pc, 4)); pc + 12 }}", Opcode::SETVDD as u8);
    push_arm(arms, Opcode::SETVDD as u8, s);

    for (op, expr) in [
        (DBinOp::Add, "a + b"),
        (DBinOp::Sub, "a - b"),
        (DBinOp::Mul, "a * b"),
        (DBinOp::Div, "a / b"),
        (DBinOp::Mod, "a % b"),
    ] {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ let a = getd(frame, rd_u8(code, pc, 2)); let b = getd(frame, rd_u8(code, pc, 3)); setd(frame, rd_u8(code, pc, 1), {}); pc + 4 }}",
            op.opcode() as u8, expr,
        );
        push_arm(arms, op.opcode() as u8, s);
    }
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ let a = getd(frame, rd_u8(code, pc, 2)); setd(frame, rd_u8(code, pc, 1), -a); pc + 4 }}", Opcode::NEGD as u8);
    push_arm(arms, Opcode::NEGD as u8, s);

    for (op, expr) in [
        (DCmpOp::Eq, "a == b"),
        (DCmpOp::Ne, "a != b"),
        (DCmpOp::Lt, "a < b"),
        (DCmpOp::Le, "a <= b"),
        (DCmpOp::Gt, "a > b"),
        (DCmpOp::Ge, "a >= b"),
    ] {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ let a = getd(frame, rd_u8(code, pc, 2)); let b = getd(frame, rd_u8(code, pc, 3)); seti(frame, rd_u8(code, pc, 1), ({}) as i32); pc + 4 }}",
            op.opcode() as u8, expr,
        );
        push_arm(arms, op.opcode() as u8, s);
    }

    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ seti(frame, rd_u8(code, pc, 1), getd(frame, rd_u8(code, pc, 2)) as i32); pc + 4 }}", ConvOp::D2I.opcode() as u8);
    push_arm(arms, ConvOp::D2I.opcode() as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ setd(frame, rd_u8(code, pc, 1), geti(frame, rd_u8(code, pc, 2)) as f64); pc + 4 }}", ConvOp::Si2d.opcode() as u8);
    push_arm(arms, ConvOp::Si2d.opcode() as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ setd(frame, rd_u8(code, pc, 1), getu(frame, rd_u8(code, pc, 2)) as f64); pc + 4 }}", ConvOp::Ui2d.opcode() as u8);
    push_arm(arms, ConvOp::Ui2d.opcode() as u8, s);
}

fn render_memory(arms: &mut Vec<Arm>) {
    // Linear-memory load/store ops decode identically across widths; the
    // host glue supplies `load`/`store` closures over its own heap since
    // this crate carries no memory model of its own.
    for width in [
        LoadWidth::I8, LoadWidth::U8, LoadWidth::I16, LoadWidth::U16, LoadWidth::I32,
        LoadWidth::F64, LoadWidth::F32,
    ] {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ host_load(frame, heap, rd_u8(code, pc, 1), rd_u8(code, pc, 2), {}); pc + 4 }}",
            width.opcode() as u8, width.shift(),
        );
        push_arm(arms, width.opcode() as u8, s);

        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ host_load_a(frame, heap, rd_u8(code, pc, 1), rd_u8(code, pc, 2), rd_u8(code, pc, 3), {}); pc + 4 }}",
            width.a_opcode() as u8, width.shift(),
        );
        push_arm(arms, width.a_opcode() as u8, s);

        let mut s = String::new();
        let _ = writeln!(
            s,
            // Load takes its offset immediate from the instruction's top
            // byte (`lz` position), the base address register from `ly`.
            "            {} => {{ host_load_av(frame, heap, rd_u8(code, pc, 1), rd_u8(code, pc, 2), rd_u8(code, pc, 3) as i8, {}); pc + 4 }}",
            width.av_opcode() as u8, width.shift(),
        );
        push_arm(arms, width.av_opcode() as u8, s);
    }
    for width in [StoreWidth::I8, StoreWidth::I16, StoreWidth::I32, StoreWidth::F64, StoreWidth::F32] {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ host_store(frame, heap, rd_u8(code, pc, 1), rd_u8(code, pc, 2), {}); pc + 4 }}",
            width.opcode() as u8, width.shift(),
        );
        push_arm(arms, width.opcode() as u8, s);

        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ host_store_a(frame, heap, rd_u8(code, pc, 1), rd_u8(code, pc, 2), rd_u8(code, pc, 3), {}); pc + 4 }}",
            width.a_opcode() as u8, width.shift(),
        );
        push_arm(arms, width.a_opcode() as u8, s);

        let mut s = String::new();
        let _ = writeln!(
            s,
            // Asymmetric with load_av on purpose: the offset immediate
            // sits in the `ly` byte position, and the value to store
            // comes from the `lz` register.
            "            {} => {{ host_store_av(frame, heap, rd_u8(code, pc, 1), rd_u8(code, pc, 2) as i8, rd_u8(code, pc, 3), {}); pc + 4 }}",
            width.av_opcode() as u8, width.shift(),
        );
        push_arm(arms, width.av_opcode() as u8, s);

        let mut s = String::new();
        let _ = writeln!(
            s,
            "            {} => {{ host_store_c(frame, heap, rd_u8(code, pc, 1), rd_u8(code, pc, 2), {}); pc + 4 }}",
            width.c_opcode() as u8, width.shift(),
        );
        push_arm(arms, width.c_opcode() as u8, s);
    }
}

fn render_control(arms: &mut Vec<Arm>) {
    let mut s = String::new();
    let _ = writeln!(s, "            {} => ((pc as i64 + rd_i16(code, pc, 2) as i64) as u32),", Opcode::BR as u8);
    push_arm(arms, Opcode::BR as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => if geti(frame, rd_u8(code, pc, 1)) != 0 {{ (pc as i64 + rd_i16(code, pc, 2) as i64) as u32 }} else {{ pc + 4 }},", Opcode::BRT as u8);
    push_arm(arms, Opcode::BRT as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => if geti(frame, rd_u8(code, pc, 1)) == 0 {{ (pc as i64 + rd_i16(code, pc, 2) as i64) as u32 }} else {{ pc + 4 }},", Opcode::BRF as u8);
    push_arm(arms, Opcode::BRF as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => rd_u32(code, pc, 4),", Opcode::BRA as u8);
    push_arm(arms, Opcode::BRA as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => if geti(frame, rd_u8(code, pc, 1)) != 0 {{ rd_u32(code, pc, 4) }} else {{ pc + 8 }},", Opcode::BRTA as u8);
    push_arm(arms, Opcode::BRTA as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => if geti(frame, rd_u8(code, pc, 1)) == 0 {{ rd_u32(code, pc, 4) }} else {{ pc + 8 }},", Opcode::BRFA as u8);
    push_arm(arms, Opcode::BRFA as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ let lx = rd_u8(code, pc, 1); if geti(frame, lx) != 0 {{ let v = geti(frame, rd_u8(code, pc, 2)); seti(frame, lx, v); }} else {{ let v = geti(frame, rd_u8(code, pc, 3)); seti(frame, lx, v); }} pc + 4 }}", Opcode::COND as u8);
    push_arm(arms, Opcode::COND as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ let lx = rd_u8(code, pc, 1); if geti(frame, lx) != 0 {{ let v = getd(frame, rd_u8(code, pc, 2)); setd(frame, lx, v); }} else {{ let v = getd(frame, rd_u8(code, pc, 3)); setd(frame, lx, v); }} pc + 4 }}", Opcode::CONDD as u8);
    push_arm(arms, Opcode::CONDD as u8, s);
    let mut s = String::new();
    let _ = writeln!(
        s,
        "            {} => {{ let i = getu(frame, rd_u8(code, pc, 1)).wrapping_sub(getu(frame, rd_u8(code, pc, 2))); let len = getu(frame, rd_u8(code, pc, 3)); if i < len {{ rd_u32(code, pc, 4 + i * 4) }} else {{ pc + 4 + len * 4 }} }}",
        Opcode::SWITCH as u8,
    );
    push_arm(arms, Opcode::SWITCH as u8, s);
}

fn render_special(arms: &mut Vec<Arm>) {
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ seti(frame, rd_u8(code, pc, 1), tdp as i32); pc + 4 }}", Opcode::GETTDP as u8);
    push_arm(arms, Opcode::GETTDP as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ setd(frame, rd_u8(code, pc, 1), *tr0); pc + 4 }}", Opcode::GETTR0 as u8);
    push_arm(arms, Opcode::GETTR0 as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ *tr0 = getd(frame, rd_u8(code, pc, 1)); pc + 4 }}", Opcode::SETTR0 as u8);
    push_arm(arms, Opcode::SETTR0 as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ let v = host_get_global(rd_u8(code, pc, 2)); seti(frame, rd_u8(code, pc, 1), v); pc + 4 }}", Opcode::GETGLBI as u8);
    push_arm(arms, Opcode::GETGLBI as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ host_set_global(rd_u8(code, pc, 2), geti(frame, rd_u8(code, pc, 1))); pc + 4 }}", Opcode::SETGLBI as u8);
    push_arm(arms, Opcode::SETGLBI as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ seti(frame, rd_u8(code, pc, 1), *emtstacktop as i32); pc + 4 }}", Opcode::GETST as u8);
    push_arm(arms, Opcode::GETST as u8, s);
    let mut s = String::new();
    let _ = writeln!(s, "            {} => {{ *emtstacktop = geti(frame, rd_u8(code, pc, 1)) as u32; pc + 4 }}", Opcode::SETST as u8);
    push_arm(arms, Opcode::SETST as u8, s);
}

fn render_calls(arms: &mut Vec<Arm>) {
    let mut s = String::new();
    let _ = writeln!(
        s,
        "            {} => {{ let nparams = rd_u8(code, pc, 2) as u32; let target = rd_u32(code, pc, 4); let ret = host_int_call(target, frame, &code[(pc + 8) as usize..(pc + 8 + nparams) as usize]); seti(frame, rd_u8(code, pc, 1), ret); pc + 8 + ((nparams + 3) & !3) }}",
        Opcode::INTCALL as u8,
    );
    push_arm(arms, Opcode::INTCALL as u8, s);
    let mut s = String::new();
    let _ = writeln!(
        s,
        "            {} => {{ let nparams = rd_u8(code, pc, 2) as u32; let id = rd_u32(code, pc, 4); let ret = host_ext_call(id, rd_u8(code, pc, 3), frame, &code[(pc + 8) as usize..(pc + 8 + nparams) as usize]); seti(frame, rd_u8(code, pc, 1), ret); pc + 8 + ((nparams + 3) & !3) }}",
        Opcode::EXTCALL as u8,
    );
    push_arm(arms, Opcode::EXTCALL as u8, s);
}

fn render_move_immediate(arms: &mut Vec<Arm>) {
    let mut s = String::new();
    let _ = writeln!(
        s,
        "            {} => {{ seti(frame, rd_u8(code, pc, 1), geti(frame, rd_u8(code, pc, 2))); pc + 4 }}",
        Opcode::SET as u8,
    );
    push_arm(arms, Opcode::SET as u8, s);
    let mut s = String::new();
    let _ = writeln!(
        s,
        "            {} => {{ seti(frame, rd_u8(code, pc, 1), rd_u8(code, pc, 2) as i8 as i32); pc + 4 }}",
        Opcode::SETVI as u8,
    );
    push_arm(arms, Opcode::SETVI as u8, s);
    let mut s = String::new();
    let _ = writeln!(
        s,
        "            {} => {{ seti(frame, rd_u8(code, pc, 1), rd_i32(code, pc, 4)); pc + 8 }}",
        Opcode::SETVIB as u8,
    );
    push_arm(arms, Opcode::SETVIB as u8, s);
}

fn all_arms() -> Vec<Arm> {
    let mut arms = Vec::new();
    render_int_bin(&mut arms);
    render_int_un(&mut arms);
    render_cmp_branch(&mut arms);
    render_double_family(&mut arms);
    render_memory(&mut arms);
    render_control(&mut arms);
    render_special(&mut arms);
    render_calls(&mut arms);
    render_move_immediate(&mut arms);
    arms
}

/// Renders the complete interpreter source as Rust text, with a single
/// flat decode loop (no inner-terpreter tiering).
#[must_use]
pub fn render() -> String {
    render_tiered(None)
}

/// Renders the `RET` handling inlined ahead of the decode `match` in both
/// tiers: writes the return register's raw 8 bytes to `heap` at
/// `*emtstacktop` (spec's 64-bit return payload, lx's double-slot copied
/// verbatim since the type isn't known at this layer), restores
/// `*emtstacktop` to `sp` for the non-`ZERO` variant (the zero variant
/// never advanced it), and returns the `RET` instruction's own `pc` as a
/// completion sentinel — the actual return value lives in `heap`, not in
/// this return value, so callers only need to know the call is done.
fn render_ret_check(ret_byte: u8, indent: &str) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "{indent}if op == {ret_byte} {{");
    let _ = writeln!(s, "{indent}    let lx = rd_u8(code, pc, 1) as usize * 8;");
    let _ = writeln!(
        s,
        "{indent}    heap[*emtstacktop as usize..*emtstacktop as usize + 8].copy_from_slice(&frame[lx..lx + 8]);"
    );
    let _ = writeln!(s, "{indent}    if !ZERO {{");
    let _ = writeln!(s, "{indent}        *emtstacktop = sp;");
    let _ = writeln!(s, "{indent}    }}");
    let _ = writeln!(s, "{indent}    return pc;");
    let _ = writeln!(s, "{indent}}}");
    s
}

/// As [`render`], but when `last_inner_opcode` is set, opcodes at or
/// below it (in [`OPCODE_TABLE`] order) get a tight inner loop that keeps
/// re-dispatching without falling back out to the full switch. This
/// mirrors `INNERTERPRETER_LAST_OPCODE`: callers that care about register
/// pressure on their hottest opcodes put the cutoff just past them.
#[must_use]
pub fn render_tiered(last_inner_opcode: Option<Opcode>) -> String {
    let arms = all_arms();

    let mut out = String::new();
    out.push_str(PRELUDE);
    out.push_str("#[inline]\nfn rd_i16(code: &[u8], pc: u32, off: u32) -> i16 { i16::from_le_bytes(code[(pc+off) as usize..(pc+off) as usize+2].try_into().unwrap()) }\n\n");
    out.push_str("fn emterpret_inner<const ZERO: bool>(code: &[u8], mut pc: u32, frame: &mut [u8], heap: &mut [u8], tdp: u32, tr0: &mut f64, emtstacktop: &mut u32, sp: u32) -> u32 {\n");

    let ret_byte = Opcode::RET as u8;
    match last_inner_opcode {
        None => {
            out.push_str("    loop {\n");
            out.push_str("        let op = code[pc as usize];\n");
            out.push_str(&render_ret_check(ret_byte, "        "));
            out.push_str("        pc = match op {\n");
            for (_, arm) in &arms {
                out.push_str(arm);
            }
            out.push_str("            other => panic!(\"unhandled opcode byte {other}\"),\n");
            out.push_str("        };\n");
            out.push_str("    }\n");
        }
        Some(threshold) => {
            let t = threshold as u8;
            out.push_str("    'outer: loop {\n");
            out.push_str("        let mut op = code[pc as usize];\n");
            out.push_str(&render_ret_check(ret_byte, "        "));
            let _ = writeln!(out, "        if op <= {t} {{");
            out.push_str("            loop {\n");
            out.push_str("                pc = match op {\n");
            for (byte, arm) in &arms {
                if *byte <= t {
                    out.push_str(arm);
                }
            }
            out.push_str("                    _ => unreachable!(\"inner tier only dispatches opcodes at or below the cutoff\"),\n");
            out.push_str("                };\n");
            out.push_str("                op = code[pc as usize];\n");
            out.push_str(&render_ret_check(ret_byte, "                "));
            let _ = writeln!(out, "                if op > {t} {{ continue 'outer; }}");
            out.push_str("            }\n");
            out.push_str("        }\n");
            out.push_str("        pc = match op {\n");
            for (_, arm) in &arms {
                out.push_str(arm);
            }
            out.push_str("            other => panic!(\"unhandled opcode byte {other}\"),\n");
            out.push_str("        };\n");
            out.push_str("    }\n");
        }
    }

    out.push_str("}\n\n");
    out.push_str("pub fn emterpret(code: &[u8], pc: u32, frame: &mut [u8], heap: &mut [u8], tdp: u32, tr0: &mut f64, emtstacktop: &mut u32, sp: u32) -> u32 {\n");
    out.push_str("    emterpret_inner::<false>(code, pc, frame, heap, tdp, tr0, emtstacktop, sp)\n");
    out.push_str("}\n\n");
    out.push_str("pub fn emterpret_z(code: &[u8], pc: u32, frame: &mut [u8], heap: &mut [u8], tdp: u32, tr0: &mut f64, emtstacktop: &mut u32, sp: u32) -> u32 {\n");
    out.push_str("    emterpret_inner::<true>(code, pc, frame, heap, tdp, tr0, emtstacktop, sp)\n");
    out.push_str("}\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers_every_opcode(text: &str) {
        for op in OPCODE_TABLE {
            if *op == Opcode::FUNC {
                // The FUNC header is consumed by the caller before
                // entering the decode loop, not matched inside it.
                continue;
            }
            if *op == Opcode::RET {
                // RET is handled by its own `if` ahead of the decode
                // match, not a match arm; see assert_handles_ret below.
                continue;
            }
            let needle = format!("{} =>", *op as u8);
            assert!(text.contains(&needle), "missing case for {:?} ({})", op, *op as u8);
        }
    }

    fn assert_handles_ret(text: &str) {
        let ret_byte = Opcode::RET as u8;
        let needle = format!("if op == {ret_byte} {{");
        assert!(text.contains(&needle), "missing RET check");
        assert!(text.contains("copy_from_slice(&frame[lx..lx + 8])"), "RET must copy the register to heap");
        assert!(text.contains("*emtstacktop = sp;"), "RET must restore the stack top for the non-ZERO variant");
    }

    #[test]
    fn render_covers_every_opcode_byte() {
        let text = render();
        assert_covers_every_opcode(&text);
        assert_handles_ret(&text);
    }

    #[test]
    fn tiered_render_still_covers_every_opcode_byte() {
        // The outer switch carries the full arm set regardless of the
        // cutoff, so this holds for any threshold.
        let text = render_tiered(Some(Opcode::CONDD));
        assert_covers_every_opcode(&text);
        assert_handles_ret(&text);
    }

    #[test]
    fn tiered_render_duplicates_only_the_inner_tier() {
        let text = render_tiered(Some(Opcode::ADD));
        // ADD sits at or below the cutoff: its arm appears once for the
        // inner loop and once more in the outer catch-all switch.
        let add_needle = format!("{} =>", Opcode::ADD as u8);
        assert_eq!(text.matches(&add_needle).count(), 2);
        // SUB sits above the cutoff: only the outer switch carries it.
        let sub_needle = format!("{} =>", Opcode::SUB as u8);
        assert_eq!(text.matches(&sub_needle).count(), 1);
    }

    #[test]
    fn default_render_has_no_inner_tier_duplication() {
        let text = render();
        let add_needle = format!("{} =>", Opcode::ADD as u8);
        assert_eq!(text.matches(&add_needle).count(), 1);
    }
}
