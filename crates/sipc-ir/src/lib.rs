//! sipc-ir - LLVM IR generation for SIP programs.
//!
//! `sipc-ir` lowers a raw [`sipc_ast::Program`] straight into LLVM IR using
//! [`inkwell`], independently of `sipc-sem`'s walk over the same tree - the
//! only thing it borrows from type checking is the solved
//! [`sipc_sem::TypeResults`]. There is no separate LIR or assembly stage;
//! object code and textual IR are both obtained from the resulting
//! [`inkwell::module::Module`] directly.

pub mod context;
pub mod emit;
pub mod error;
pub mod lower;
pub mod program;
pub mod types;

pub use context::CodegenContext;
pub use error::{CodeGenError, Result};
pub use program::compile;
pub use types::TypeMapper;
