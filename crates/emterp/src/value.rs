//! Operand-level vocabulary shared by the instruction set, the linker, and
//! the interpreter generator: comparison/arithmetic op kinds, memory
//! widths, call signatures, and the unresolved-reference placeholders a
//! symbolic instruction stream carries before linking.

use crate::opcode::Opcode;

/// A value kind as seen at a call boundary or function return.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Void,
    Int,
    Double,
    Float,
}

impl Kind {
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Kind::Void => 'v',
            Kind::Int => 'i',
            Kind::Double => 'd',
            Kind::Float => 'f',
        }
    }

    pub fn from_code(c: char) -> crate::Result<Self> {
        match c {
            'v' => Ok(Kind::Void),
            'i' => Ok(Kind::Int),
            'd' => Ok(Kind::Double),
            'f' => Ok(Kind::Float),
            other => Err(crate::Error::UnknownReturnType(other.to_string())),
        }
    }
}

/// A native callee's signature: return kind followed by parameter kinds,
/// e.g. `id` is `(return int, one double param)`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub ret: Kind,
    pub params: Vec<Kind>,
}

impl Signature {
    #[must_use]
    pub fn new(ret: Kind, params: Vec<Kind>) -> Self {
        Self { ret, params }
    }

    #[must_use]
    pub fn as_code(&self) -> String {
        let mut s = String::with_capacity(1 + self.params.len());
        s.push(self.ret.code());
        s.extend(self.params.iter().map(|k| k.code()));
        s
    }

    pub fn from_code(code: &str) -> crate::Result<Self> {
        let mut chars = code.chars();
        let ret = Kind::from_code(chars.next().ok_or_else(|| {
            crate::Error::UnknownReturnType("empty signature".to_string())
        })?)?;
        let params = chars.map(Kind::from_code).collect::<crate::Result<Vec<_>>>()?;
        Ok(Self { ret, params })
    }
}

/// An unresolved placeholder in a symbolic instruction stream. The lowerer
/// that emits per-function bytecode leaves these for the link pass to fix
/// up once it knows absolute addresses.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ref {
    /// An intra-function label: resolved against that function's own
    /// `absolute_targets` map plus its assigned base address.
    Label(String),
    /// A function's entry address, used e.g. as an `INTCALL` target or a
    /// function-pointer immediate. Resolved only once every function has
    /// been assigned an offset in the code image.
    FuncAddr(String),
}

macro_rules! op_enum {
    ($name:ident { $($variant:ident => $opcode:ident),+ $(,)? }) => {
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[must_use]
            pub const fn opcode(self) -> Opcode {
                match self {
                    $($name::$variant => Opcode::$opcode),+
                }
            }
        }
    };
}

op_enum!(IntBinOp {
    Add => ADD, Sub => SUB, Mul => MUL, Sdiv => SDIV, Udiv => UDIV,
    Smod => SMOD, Umod => UMOD, Eq => EQ, Ne => NE, Slt => SLT, Ult => ULT,
    Sle => SLE, Ule => ULE, And => AND, Or => OR, Xor => XOR, Shl => SHL,
    Ashr => ASHR, Lshr => LSHR,
});

impl IntBinOp {
    #[must_use]
    pub const fn imm_opcode(self) -> Opcode {
        match self {
            IntBinOp::Add => Opcode::ADDV,
            IntBinOp::Sub => Opcode::SUBV,
            IntBinOp::Mul => Opcode::MULV,
            IntBinOp::Sdiv => Opcode::SDIVV,
            IntBinOp::Udiv => Opcode::UDIVV,
            IntBinOp::Smod => Opcode::SMODV,
            IntBinOp::Umod => Opcode::UMODV,
            IntBinOp::Eq => Opcode::EQV,
            IntBinOp::Ne => Opcode::NEV,
            IntBinOp::Slt => Opcode::SLTV,
            IntBinOp::Ult => Opcode::ULTV,
            IntBinOp::Sle => Opcode::SLEV,
            IntBinOp::Ule => Opcode::ULEV,
            IntBinOp::And => Opcode::ANDV,
            IntBinOp::Or => Opcode::ORV,
            IntBinOp::Xor => Opcode::XORV,
            IntBinOp::Shl => Opcode::SHLV,
            IntBinOp::Ashr => Opcode::ASHRV,
            IntBinOp::Lshr => Opcode::LSHRV,
        }
    }

    /// Whether the 8-bit immediate of the `*V` form is zero-extended
    /// (unsigned-flavoured ops) rather than sign-extended.
    #[must_use]
    pub const fn imm_is_unsigned(self) -> bool {
        matches!(
            self,
            IntBinOp::Udiv
                | IntBinOp::Umod
                | IntBinOp::Ult
                | IntBinOp::Ule
                | IntBinOp::Shl
                | IntBinOp::Ashr
                | IntBinOp::Lshr
        )
    }
}

op_enum!(IntUnOp {
    Neg => NEG, Bnot => BNOT, Lnot => LNOT,
});

/// The comparison family usable in a fused compare-and-branch instruction.
/// `Lnot` branches on the falsiness of `ly` alone (`lz` is unused).
op_enum!(CmpOp {
    Lnot => LNOTBRF, Eq => EQBRF, Ne => NEBRF, Slt => SLTBRF, Ult => ULTBRF,
    Sle => SLEBRF, Ule => ULEBRF,
});

impl CmpOp {
    #[must_use]
    pub const fn brt_opcode(self) -> Opcode {
        match self {
            CmpOp::Lnot => Opcode::LNOTBRT,
            CmpOp::Eq => Opcode::EQBRT,
            CmpOp::Ne => Opcode::NEBRT,
            CmpOp::Slt => Opcode::SLTBRT,
            CmpOp::Ult => Opcode::ULTBRT,
            CmpOp::Sle => Opcode::SLEBRT,
            CmpOp::Ule => Opcode::ULEBRT,
        }
    }
}

/// Which way a fused compare-and-branch or plain conditional branch fires.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sense {
    /// Branch when the condition is false.
    OnFalse,
    /// Branch when the condition is true.
    OnTrue,
}

op_enum!(DBinOp {
    Add => ADDD, Sub => SUBD, Mul => MULD, Div => DIVD, Mod => MODD,
});

op_enum!(DCmpOp {
    Eq => EQD, Ne => NED, Lt => LTD, Le => LED, Gt => GTD, Ge => GED,
});

op_enum!(ConvOp {
    D2I => D2I, Si2d => SI2D, Ui2d => UI2D,
});

/// Memory access width for loads (loads can widen with or without sign
/// extension; stores only narrow, so `StoreWidth` has no signedness).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadWidth {
    I8,
    U8,
    I16,
    U16,
    I32,
    F64,
    F32,
}

impl LoadWidth {
    #[must_use]
    pub const fn opcode(self) -> Opcode {
        match self {
            LoadWidth::I8 => Opcode::LOAD8,
            LoadWidth::U8 => Opcode::LOADU8,
            LoadWidth::I16 => Opcode::LOAD16,
            LoadWidth::U16 => Opcode::LOADU16,
            LoadWidth::I32 => Opcode::LOAD32,
            LoadWidth::F64 => Opcode::LOADF64,
            LoadWidth::F32 => Opcode::LOADF32,
        }
    }

    #[must_use]
    pub const fn a_opcode(self) -> Opcode {
        match self {
            LoadWidth::I8 => Opcode::LOAD8A,
            LoadWidth::U8 => Opcode::LOADU8A,
            LoadWidth::I16 => Opcode::LOAD16A,
            LoadWidth::U16 => Opcode::LOADU16A,
            LoadWidth::I32 => Opcode::LOAD32A,
            LoadWidth::F64 => Opcode::LOADF64A,
            LoadWidth::F32 => Opcode::LOADF32A,
        }
    }

    #[must_use]
    pub const fn av_opcode(self) -> Opcode {
        match self {
            LoadWidth::I8 => Opcode::LOAD8AV,
            LoadWidth::U8 => Opcode::LOADU8AV,
            LoadWidth::I16 => Opcode::LOAD16AV,
            LoadWidth::U16 => Opcode::LOADU16AV,
            LoadWidth::I32 => Opcode::LOAD32AV,
            LoadWidth::F64 => Opcode::LOADF64AV,
            LoadWidth::F32 => Opcode::LOADF32AV,
        }
    }

    /// log2 of the element size; also how far a byte pointer is shifted to
    /// become an element index into the typed view of linear memory.
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            LoadWidth::I8 | LoadWidth::U8 => 0,
            LoadWidth::I16 | LoadWidth::U16 => 1,
            LoadWidth::I32 | LoadWidth::F32 => 2,
            LoadWidth::F64 => 3,
        }
    }

    #[must_use]
    pub const fn is_double(self) -> bool {
        matches!(self, LoadWidth::F64 | LoadWidth::F32)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreWidth {
    I8,
    I16,
    I32,
    F64,
    F32,
}

impl StoreWidth {
    #[must_use]
    pub const fn opcode(self) -> Opcode {
        match self {
            StoreWidth::I8 => Opcode::STORE8,
            StoreWidth::I16 => Opcode::STORE16,
            StoreWidth::I32 => Opcode::STORE32,
            StoreWidth::F64 => Opcode::STOREF64,
            StoreWidth::F32 => Opcode::STOREF32,
        }
    }

    #[must_use]
    pub const fn a_opcode(self) -> Opcode {
        match self {
            StoreWidth::I8 => Opcode::STORE8A,
            StoreWidth::I16 => Opcode::STORE16A,
            StoreWidth::I32 => Opcode::STORE32A,
            StoreWidth::F64 => Opcode::STOREF64A,
            StoreWidth::F32 => Opcode::STOREF32A,
        }
    }

    #[must_use]
    pub const fn av_opcode(self) -> Opcode {
        match self {
            StoreWidth::I8 => Opcode::STORE8AV,
            StoreWidth::I16 => Opcode::STORE16AV,
            StoreWidth::I32 => Opcode::STORE32AV,
            StoreWidth::F64 => Opcode::STOREF64AV,
            StoreWidth::F32 => Opcode::STOREF32AV,
        }
    }

    #[must_use]
    pub const fn c_opcode(self) -> Opcode {
        match self {
            StoreWidth::I8 => Opcode::STORE8C,
            StoreWidth::I16 => Opcode::STORE16C,
            StoreWidth::I32 => Opcode::STORE32C,
            StoreWidth::F64 => Opcode::STOREF64C,
            StoreWidth::F32 => Opcode::STOREF32C,
        }
    }

    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            StoreWidth::I8 => 0,
            StoreWidth::I16 => 1,
            StoreWidth::I32 | StoreWidth::F32 => 2,
            StoreWidth::F64 => 3,
        }
    }

    #[must_use]
    pub const fn is_double(self) -> bool {
        matches!(self, StoreWidth::F64 | StoreWidth::F32)
    }
}

/// Which interpreter entry point a function's prologue selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Variant {
    /// Allocates a fresh frame: `EMTSTACKTOP` advances by `locals * 8`.
    Normal,
    /// Reuses the caller's current `EMTSTACKTOP` as the frame base; used
    /// for leaf functions that neither call nor spill.
    Zero,
}

impl Variant {
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            Variant::Normal => 0,
            Variant::Zero => 1,
        }
    }
}
