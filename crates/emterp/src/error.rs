#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("requested blacklist of {0} but it does not exist in the module")]
    UnknownBlacklistEntry(String),

    #[error("missing memory initializer file: {0}")]
    MissingMemInit(String),

    #[error("missing expected marker in pre-code: {0}")]
    MissingMarker(String),

    #[error("global id {0} out of range (max {1})")]
    GlobalIdOutOfRange(usize, usize),

    #[error("absolute target 0x{0:x} is not 4-aligned")]
    UnalignedTarget(u32),

    #[error("absolute target 0x{0:x} exceeds the 31-bit address space")]
    TargetTooLarge(u32),

    #[error("non-byte-sized value {0} in the final image at offset {1}")]
    ByteOverflow(i64, usize),

    #[error("unknown return-type token: {0}")]
    UnknownReturnType(String),

    #[error("function {0} declares {1} params but only {2} locals")]
    TooManyParams(String, u8, u16),

    #[error("function {0} exceeds the 256-register limit ({1} registers)")]
    TooManyRegisters(String, u32),

    #[error("call to {0} passes {1} parameter bytes, more than the 255-byte limit")]
    TooManyCallParams(String, usize),

    #[error("unresolved label {1} in function {0}")]
    UnresolvedLabel(String, String),

    #[error("unresolved function address: {0}")]
    UnresolvedFuncAddr(String),

    #[error("duplicate opcode mnemonic: {0}")]
    DuplicateOpcode(String),

    #[error("too many opcodes: {0} >= 256")]
    TooManyOpcodes(usize),

    #[error("unknown opcode byte: {0}")]
    UnknownOpcode(u8),

    #[error("global function table overflowed 65536 entries")]
    TooManyGlobalFuncs,

    #[error("global variable table overflowed 256 entries")]
    TooManyGlobalVars,

    #[error("interpreter stack overflow: EMTSTACKTOP would exceed EMT_STACK_MAX")]
    StackOverflow,

    #[error("unknown EXTCALL id {0}")]
    UnknownExtCall(u16),

    #[error("unknown global id {0}")]
    UnknownGlobal(u8),

    #[error("register index {0} out of bounds for frame of {1} registers")]
    RegisterOutOfBounds(u8, u32),

    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
