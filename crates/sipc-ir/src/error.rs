//! Error types for IR lowering and module verification.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("function '{0}' has no dispatch table entry")]
    FunctionNotFound(String),

    #[error("LLVM builder operation failed: {0}")]
    LlvmOperationFailed(String),

    #[error("module verification failed: {0}")]
    VerificationFailed(String),

    #[error("variable `{0}` has no storage slot")]
    UnboundVariable(String),

    #[error("field `{0}` is not part of the global record")]
    UnknownField(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CodeGenError>;
