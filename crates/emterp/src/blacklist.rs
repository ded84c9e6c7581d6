//! Which functions are eligible to become interpreted bytecode.
//!
//! A function is skipped (left native) if its name is blacklisted, or if
//! it carries the `dynCall_` prefix used for the synthetic signature
//! trampolines the runtime generates itself. Everything else in
//! [`SourceModule::functions`] is a candidate; the caller decides whether
//! "candidate" means "always interpret" or applies some other policy on
//! top (this crate only enforces the exclusions, never an inclusion
//! list).

use std::collections::HashSet;

use crate::module::SourceModule;
use crate::{Error, Result};

const DYNCALL_PREFIX: &str = "dynCall_";

/// Functions the original toolchain never interprets: the C runtime's
/// entry/exit machinery and the setjmp/longjmp and exception-unwinding
/// helpers, none of which tolerate being paused mid-instruction inside a
/// hand-rolled stack machine.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "_malloc",
    "_free",
    "_memcpy",
    "_memmove",
    "_memset",
    "_saveSetjmp",
    "_testSetjmp",
    "_emscripten_longjmp",
    "__growWasmMemory",
];

#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    extra: HashSet<String>,
}

impl Blacklist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the default set, validating each entry actually names a
    /// function present in `module` (the CLI passes this through from a
    /// user-supplied JSON array).
    pub fn with_extra(module: &SourceModule, extra: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut set = HashSet::new();
        for name in extra {
            if module.function(&name).is_none()
                && !module.native_functions.iter().any(|f| f.name == name)
            {
                return Err(Error::UnknownBlacklistEntry(name));
            }
            set.insert(name);
        }
        Ok(Self { extra: set })
    }

    #[must_use]
    pub fn excludes(&self, name: &str) -> bool {
        DEFAULT_BLACKLIST.contains(&name) || name.starts_with(DYNCALL_PREFIX) || self.extra.contains(name)
    }

    /// Splits a module's functions into those selected for interpretation
    /// and those left native, preserving declaration order in both lists.
    #[must_use]
    pub fn partition<'a>(
        &self,
        functions: &'a [crate::module::SourceFunction],
    ) -> (Vec<&'a crate::module::SourceFunction>, Vec<&'a crate::module::SourceFunction>) {
        functions.iter().partition(|f| !self.excludes(&f.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blacklist_excludes_runtime_helpers() {
        let bl = Blacklist::new();
        assert!(bl.excludes("_malloc"));
        assert!(bl.excludes("dynCall_vi"));
        assert!(!bl.excludes("_myFunction"));
    }

    #[test]
    fn extra_entry_must_exist_in_module() {
        let module = SourceModule::default();
        let err = Blacklist::with_extra(&module, vec!["_missing".to_string()]).unwrap_err();
        assert!(matches!(err, Error::UnknownBlacklistEntry(_)));
    }
}
