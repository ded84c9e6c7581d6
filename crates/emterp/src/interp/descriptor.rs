//! Per-opcode operand shape, used by [`super::generator`] to know how
//! many trailing bytes/words an opcode's case needs to consume before
//! the next instruction starts. Kept as a table rather than folded into
//! the generator's string templates so the two don't drift silently.

use crate::opcode::Opcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// Nothing past the one 4-byte word.
    Word,
    /// One extra 4-byte word (an i32/f32 immediate or a register list
    /// header whose payload is handled separately, e.g. `SETVIB`).
    WordPlusWord,
    /// Two extra 4-byte words (an f64 immediate, `SETVDD`).
    WordPlusTwoWords,
    /// One extra word carrying an absolute target (`BRA`, `BRTA`, ...).
    WordPlusTarget,
    /// One extra word carrying an absolute target, used by the fused
    /// compare-and-branch family.
    CmpBranch,
    /// A call: one target/id word, then `ly` parameter bytes padded to 4.
    Call,
    /// `lz` target words follow, one per table entry.
    Switch,
    /// The `FUNC` header: two words total.
    Func,
}

#[must_use]
pub fn shape(op: Opcode) -> OperandShape {
    use Opcode::*;
    match op {
        SETVIB | SETVDI | SETVDF => OperandShape::WordPlusWord,
        SETVDD => OperandShape::WordPlusTwoWords,
        BRA | BRTA | BRFA => OperandShape::WordPlusTarget,
        LNOTBRF | EQBRF | NEBRF | SLTBRF | ULTBRF | SLEBRF | ULEBRF | LNOTBRT | EQBRT | NEBRT
        | SLTBRT | ULTBRT | SLEBRT | ULEBRT => OperandShape::CmpBranch,
        INTCALL | EXTCALL => OperandShape::Call,
        SWITCH => OperandShape::Switch,
        FUNC => OperandShape::Func,
        _ => OperandShape::Word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OPCODE_TABLE;

    #[test]
    fn every_opcode_has_a_shape() {
        for op in OPCODE_TABLE {
            let _ = shape(*op);
        }
    }
}
