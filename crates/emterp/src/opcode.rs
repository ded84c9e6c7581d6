//! The frozen opcode table.
//!
//! The table's order *is* the binary format: an opcode's position in
//! [`OPCODE_TABLE`] is its encoded byte. Never reorder or insert in the
//! middle of a release; only appending preserves compatibility.

/// Declares the `Opcode` enum, `OPCODE_TABLE`, and the to/from-u8 plumbing
/// from one ordered list, so the list order and the numeric encoding can
/// never drift apart.
macro_rules! opcodes {
    ($($name:ident),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name),+
        }

        pub const OPCODE_TABLE: &[Opcode] = &[$(Opcode::$name),+];

        impl Opcode {
            /// Opcodes are declared without explicit discriminants, so the
            /// enum's `as u8` value always equals its position in the list
            /// above; a table lookup is enough to invert it.
            #[must_use]
            pub fn from_u8(byte: u8) -> Option<Self> {
                OPCODE_TABLE.get(byte as usize).copied()
            }

            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name)),+
                }
            }
        }
    };
}

opcodes! {
    SET, SETVI, SETVIB,
    ADD, SUB, MUL, SDIV, UDIV, SMOD, UMOD, NEG, BNOT,
    LNOT, EQ, NE, SLT, ULT, SLE, ULE,
    AND, OR, XOR, SHL, ASHR, LSHR,
    ADDV, SUBV, MULV, SDIVV, UDIVV, SMODV, UMODV, EQV, NEV, SLTV, ULTV, SLEV, ULEV,
    ANDV, ORV, XORV, SHLV, ASHRV, LSHRV,
    LNOTBRF, EQBRF, NEBRF, SLTBRF, ULTBRF, SLEBRF, ULEBRF,
    LNOTBRT, EQBRT, NEBRT, SLTBRT, ULTBRT, SLEBRT, ULEBRT,
    SETD, SETVD, SETVDI, SETVDF, SETVDD,
    ADDD, SUBD, MULD, DIVD, MODD, NEGD, EQD, NED, LTD, LED, GTD, GED, D2I, SI2D, UI2D,
    LOAD8, LOADU8, LOAD16, LOADU16, LOAD32,
    STORE8, STORE16, STORE32,
    LOADF64, STOREF64, LOADF32, STOREF32,
    LOAD8A, LOADU8A, LOAD16A, LOADU16A, LOAD32A,
    STORE8A, STORE16A, STORE32A,
    LOADF64A, STOREF64A, LOADF32A, STOREF32A,
    LOAD8AV, LOADU8AV, LOAD16AV, LOADU16AV, LOAD32AV,
    STORE8AV, STORE16AV, STORE32AV,
    LOADF64AV, STOREF64AV, LOADF32AV, STOREF32AV,
    STORE8C, STORE16C, STORE32C, STOREF64C, STOREF32C,
    BR, BRT, BRF, BRA, BRTA, BRFA,
    COND, CONDD,
    GETTDP, GETTR0, SETTR0, GETGLBI, SETGLBI,
    INTCALL, EXTCALL,
    GETST, SETST,
    SWITCH, RET, FUNC,
}

impl TryFrom<u8> for Opcode {
    type Error = crate::Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_u8(byte).ok_or(crate::Error::UnknownOpcode(byte))
    }
}

/// `GETGLBD` (double-valued global read) is intentionally absent: the
/// original generator carried a placeholder for it in the link pass but
/// never gave it an interpreter case. We don't resolve that open question
/// here either, so the opcode stays unassigned until a case is added.
pub const GETGLBD_RESERVED: bool = true;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_has_no_duplicates_and_fits_a_byte() {
        assert!(OPCODE_TABLE.len() < 256);
        let names: HashSet<&str> = OPCODE_TABLE.iter().map(|op| op.name()).collect();
        assert_eq!(names.len(), OPCODE_TABLE.len());
    }

    #[test]
    fn byte_round_trips_through_from_u8() {
        for (i, op) in OPCODE_TABLE.iter().enumerate() {
            assert_eq!(*op as u8, i as u8);
            assert_eq!(Opcode::from_u8(i as u8), Some(*op));
        }
    }

    #[test]
    fn unknown_byte_is_none() {
        assert_eq!(Opcode::from_u8(255), None);
    }
}
