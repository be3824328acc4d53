//! Driver error type.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrvError {
    #[error("failed to read '{path}': {source}")]
    ReadAst {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid AST file: {source}")]
    ParseAst {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("program has type errors")]
    TypeCheckFailed,

    #[error("code generation failed: {0}")]
    CodeGen(#[from] sipc_ir::CodeGenError),

    #[error("failed to write '{path}': {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("linking failed: {0}")]
    Link(String),
}

pub type Result<T> = std::result::Result<T, DrvError>;
