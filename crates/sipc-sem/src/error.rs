//! Semantic-analysis error reporting (7).
//!
//! Every error kind the type checker can raise maps to one [`SemError`]
//! variant, which knows how to turn itself into a [`sipc_util::Diagnostic`].
//! Analysis stops at the first error - there is no recovery, so `sipc-sem`'s
//! public entry point returns as soon as one is produced.

use crate::types::{Type, TypeVarId};
use sipc_util::{DiagnosticBuilder, Handler, Span};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SemError {
    #[error("type conflict: expected {expected}, found {found}")]
    Conflict {
        span: Span,
        expected: Type,
        found: Type,
        reason: &'static str,
    },

    #[error("variable {var:?} occurs in its own type without a binder")]
    OccursWithoutMu { span: Span, var: TypeVarId },

    #[error("undefined name `{name}`")]
    UndefinedName { span: Span, name: String },

    #[error("`main` must take exactly the arguments it is invoked with")]
    MainArityMismatch { span: Span },

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl SemError {
    pub fn emit(&self, handler: &Handler) {
        let builder = match self {
            SemError::Conflict {
                span,
                expected,
                found,
                reason,
            } => DiagnosticBuilder::error(format!(
                "type conflict in {reason}: expected `{expected}`, found `{found}`"
            ))
            .span(*span),
            SemError::OccursWithoutMu { span, var } => DiagnosticBuilder::error(format!(
                "type variable ?{} occurs in its own solution without a recursive binder",
                var.0
            ))
            .span(*span),
            SemError::UndefinedName { span, name } => {
                DiagnosticBuilder::error(format!("undefined name `{name}`")).span(*span)
            }
            SemError::MainArityMismatch { span } => {
                DiagnosticBuilder::error("`main` has the wrong number of parameters").span(*span)
            }
            SemError::Internal(msg) => DiagnosticBuilder::error(format!("internal error: {msg}")),
        };
        builder.emit(handler);
    }
}
