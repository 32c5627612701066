//! Runtime errors

use thiserror::Error;

use crate::runtime::value::Value;

/// Runtime result type
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Every fault the class-linking and execution engine can raise.
///
/// Faults propagate with `?` up to the host entry point; nothing in the core
/// retries or partially recovers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("wrong number of arguments for {callee}: want={expected}, got={got}")]
    ArgumentCount {
        callee: String,
        expected: usize,
        got: usize,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    ArgumentType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid argument: {0}")]
    ArgumentValue(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("register index {index} out of bounds (capacity {capacity})")]
    RegisterIndex { index: usize, capacity: usize },

    #[error("constant index {index} out of bounds (size {size})")]
    ConstantIndex { index: usize, size: usize },

    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    #[error("call stack underflow")]
    CallStackUnderflow,

    #[error("invalid operation: {0}")]
    OperationInvalid(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("duplicate member `{member}` in class {class}")]
    DuplicateMember { class: String, member: String },

    #[error("extension cycle: {}", chain.join(" -> "))]
    ExtensionCycle { chain: Vec<String> },

    #[error("unknown opcode {0}")]
    InvalidOpcode(u8),

    #[error("raised: {0}")]
    Raised(String),
}

impl RuntimeError {
    /// Stable diagnostic code reported by the host.
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::ArgumentCount { .. } => "E1000",
            RuntimeError::ArgumentType { .. } => "E1001",
            RuntimeError::ArgumentValue(_) => "E1002",
            RuntimeError::NotFound(_) => "E1003",
            RuntimeError::AlreadyExists(_) => "E1004",
            RuntimeError::RegisterIndex { .. } => "E1005",
            RuntimeError::ConstantIndex { .. } => "E1006",
            RuntimeError::AllocationFailed(_) => "E1007",
            RuntimeError::CallStackUnderflow => "E1008",
            RuntimeError::OperationInvalid(_) => "E1009",
            RuntimeError::OperationFailed(_) => "E1010",
            RuntimeError::DuplicateMember { .. } => "E1011",
            RuntimeError::ExtensionCycle { .. } => "E1012",
            RuntimeError::InvalidOpcode(_) => "E1013",
            RuntimeError::Raised(_) => "E1014",
        }
    }

    pub(crate) fn type_mismatch(expected: &'static str, found: &Value) -> Self {
        RuntimeError::ArgumentType {
            expected,
            found: found.type_name(),
        }
    }
}
