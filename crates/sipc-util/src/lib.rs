//! sipc-util - core utilities shared by every stage of the sipc compiler.
//!
//! Provides string interning (`Symbol`), typed index vectors (`Idx`/`IndexVec`),
//! source locations (`Span`/`SourceMap`), definition identifiers (`DefId`), and
//! the diagnostic reporting infrastructure (`Handler`/`Diagnostic`).

pub mod def_id;
pub mod diagnostic;
pub mod error;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use def_id::{DefId, DefIdGenerator};
pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Handler, Level};
pub use error::{DiagnosticError, IndexVecError, SourceMapError, SymbolError};
pub use index_vec::{Idx, IndexVec};
pub use span::{FileId, SourceFile, SourceMap, Span};
pub use symbol::Symbol;

pub use rustc_hash::{FxHashMap, FxHashSet};
