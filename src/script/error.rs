//! Script fault categories
//!
//! Every fault a script can produce is mapped to one of these variants. The
//! rendered messages keep the originating category and identifier so callers
//! can pattern-match on them (e.g. a reference fault is always
//! `ReferenceError: <name> is not defined`).

/// A fault raised while parsing or executing a script.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("ReferenceError: {0} is not defined")]
    UndefinedIdentifier(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("RangeError: {0}")]
    Range(String),

    #[error("Error: script execution timed out after {0}ms")]
    Timeout(u64),

    #[error("Error: script exceeded the operation budget")]
    FuelExhausted,
}

impl ScriptError {
    /// True for faults caused by the resource caps rather than the script's
    /// own logic.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, ScriptError::Timeout(_) | ScriptError::FuelExhausted)
    }
}
