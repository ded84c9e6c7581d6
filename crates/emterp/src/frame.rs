//! The register frame model: up to 256 registers, 8 bytes each, with an
//! integer living in the low 4 bytes and a double occupying all 8. This
//! is the layout the generated interpreter's `HEAP32`/`HEAPF64` views
//! would address in the original toolchain; here it's a plain byte slice
//! the native reference interpreter in [`crate::interp::exec`] reads and
//! writes directly.

use crate::Error;

pub const MAX_REGISTERS: usize = 256;
pub const REGISTER_BYTES: usize = 8;
pub const FRAME_BYTES: usize = MAX_REGISTERS * REGISTER_BYTES;

/// A function's register file during execution. Callers allocate one per
/// active call (normal variant) or reuse the caller's (zero variant);
/// which is the `Frame`'s own concern is left to whoever owns it.
pub struct Frame {
    bytes: [u8; FRAME_BYTES],
}

impl Frame {
    #[must_use]
    pub fn new() -> Self {
        Self { bytes: [0; FRAME_BYTES] }
    }

    fn offset(reg: u8) -> usize {
        reg as usize * REGISTER_BYTES
    }

    #[must_use]
    pub fn get_i32(&self, reg: u8) -> i32 {
        let off = Self::offset(reg);
        i32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap())
    }

    pub fn set_i32(&mut self, reg: u8, value: i32) {
        let off = Self::offset(reg);
        self.bytes[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[must_use]
    pub fn get_u32(&self, reg: u8) -> u32 {
        self.get_i32(reg) as u32
    }

    pub fn set_u32(&mut self, reg: u8, value: u32) {
        self.set_i32(reg, value as i32);
    }

    #[must_use]
    pub fn get_f64(&self, reg: u8) -> f64 {
        let off = Self::offset(reg);
        f64::from_le_bytes(self.bytes[off..off + 8].try_into().unwrap())
    }

    pub fn set_f64(&mut self, reg: u8, value: f64) {
        let off = Self::offset(reg);
        self.bytes[off..off + 8].copy_from_slice(&value.to_le_bytes());
    }

    #[must_use]
    pub fn get_f32(&self, reg: u8) -> f32 {
        let off = Self::offset(reg);
        f32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap())
    }

    pub fn set_f32(&mut self, reg: u8, value: f32) {
        let off = Self::offset(reg);
        self.bytes[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[must_use]
    pub fn get_raw8(&self, reg: u8) -> [u8; 8] {
        let off = Self::offset(reg);
        self.bytes[off..off + 8].try_into().unwrap()
    }

    pub fn set_raw8(&mut self, reg: u8, value: [u8; 8]) {
        let off = Self::offset(reg);
        self.bytes[off..off + 8].copy_from_slice(&value);
    }

    /// Zeroes registers `[start, bound)`, the prologue's zero-init loop.
    pub fn zero_range(&mut self, start: u8, bound: u16) {
        let from = Self::offset(start);
        let to = (bound as usize) * REGISTER_BYTES;
        if to > from {
            self.bytes[from..to].fill(0);
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// Checked register index: every operand byte off the wire is already a
/// valid `u8`, but a frame built with fewer than 256 live registers still
/// needs bounds-checking against its function's declared `locals`.
pub fn check_register(reg: u8, locals: u16) -> crate::Result<()> {
    if u16::from(reg) >= locals.max(1) {
        return Err(Error::RegisterOutOfBounds(reg, u32::from(locals)));
    }
    Ok(())
}
