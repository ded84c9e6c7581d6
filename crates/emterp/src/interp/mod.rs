//! Two renderings of the same semantics: [`exec`] runs linked functions
//! directly for testing, and [`generator`] emits the Rust source of an
//! equivalent interpreter for splicing into a host program.

pub mod descriptor;
pub mod exec;
pub mod generator;

/// Externally observable value shapes crossing an `EXTCALL` boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExternValue {
    Int(i32),
    Double(f64),
}

impl ExternValue {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            ExternValue::Int(v) => v,
            ExternValue::Double(v) => v as i32,
        }
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            ExternValue::Int(v) => f64::from(v),
            ExternValue::Double(v) => v,
        }
    }
}

/// What an interpreted program calls out to: native functions and the
/// handful of globals reachable through `GETGLBI`/`SETGLBI`.
pub trait Host {
    /// `table_index` carries the current value of the `FUNCTION_TABLE_*`
    /// dynamic index register for an indirect `EXTCALL`, `None` for a
    /// direct one. By the time `EXTCALL` runs this value is assumed
    /// already masked to the table's size by the bytecode itself (an
    /// ordinary `ANDV` ahead of the call), not by this call.
    fn call_extern(
        &mut self,
        name: &str,
        sig: &crate::value::Signature,
        args: &[ExternValue],
        table_index: Option<i32>,
    ) -> crate::Result<ExternValue>;

    fn get_global(&mut self, name: &str) -> i32;
    fn set_global(&mut self, name: &str, value: i32);
}
