//! sipc-sem - type checking for SIP programs.
//!
//! `sipc-sem` turns a raw [`sipc_ast::Program`] into a type for every node
//! (C1-C3): [`infer::ConstraintCollector`] walks the tree once, allocating a
//! type variable per node and feeding every constraint in the type table to
//! [`unify::Unifier`], which solves them with union-find as it goes. There is
//! no intermediate tree - `sipc-ir` lowers from the same raw AST
//! independently of this crate.

pub mod error;
pub mod global_record;
pub mod infer;
pub mod scope;
pub mod types;
pub mod unify;

pub use error::SemError;
pub use infer::{ConstraintCollector, TypeResults};
pub use types::{Type, TypeVarId};

use sipc_ast::Program;
use sipc_util::{DefIdGenerator, Handler};

/// Type-check `program`, reporting the first conflict (if any) through
/// `handler` and returning it as `Err` so the driver can exit non-zero.
pub fn analyze(program: &Program, handler: &Handler) -> Result<TypeResults, SemError> {
    let defs = DefIdGenerator::new();
    let collector = ConstraintCollector::new(&defs);
    match collector.analyze(program) {
        Ok(results) => Ok(results),
        Err(err) => {
            err.emit(handler);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipc_ast::{BinOp, ExprKind, ExprNode, Function, NodeId, Param, StmtKind, StmtNode};
    use sipc_util::Span;

    fn expr(id: u32, kind: ExprKind) -> ExprNode {
        ExprNode::new(NodeId(id), Span::DUMMY, kind)
    }

    fn stmt(id: u32, kind: StmtKind) -> StmtNode {
        StmtNode::new(NodeId(id), Span::DUMMY, kind)
    }

    /// `main() { return 1 + 2; }` type-checks with `main`'s body returning
    /// `int` (scenario family in 8 - straight-line arithmetic).
    #[test]
    fn arithmetic_program_type_checks() {
        let program = Program {
            functions: vec![Function {
                id: NodeId(0),
                name: "main".to_string(),
                params: vec![],
                body: vec![stmt(
                    1,
                    StmtKind::Return(expr(
                        2,
                        ExprKind::Binary {
                            op: BinOp::Add,
                            lhs: Box::new(expr(3, ExprKind::Number(1))),
                            rhs: Box::new(expr(4, ExprKind::Number(2))),
                        },
                    )),
                )],
                span: Span::DUMMY,
            }],
        };

        let handler = Handler::new();
        let result = analyze(&program, &handler);
        assert!(result.is_ok());
        assert!(!handler.has_errors());
    }

    /// `main() { return 1 + true; }` must report a type conflict (8's
    /// negative scenarios).
    #[test]
    fn mismatched_arithmetic_operand_is_rejected() {
        let program = Program {
            functions: vec![Function {
                id: NodeId(0),
                name: "main".to_string(),
                params: vec![],
                body: vec![stmt(
                    1,
                    StmtKind::Return(expr(
                        2,
                        ExprKind::Binary {
                            op: BinOp::Add,
                            lhs: Box::new(expr(3, ExprKind::Number(1))),
                            rhs: Box::new(expr(4, ExprKind::Boolean(true))),
                        },
                    )),
                )],
                span: Span::DUMMY,
            }],
        };

        let handler = Handler::new();
        let result = analyze(&program, &handler);
        assert!(result.is_err());
        assert!(handler.has_errors());
    }

    /// `var x; x = alloc 5; return *x;` - a pointer round-trip.
    #[test]
    fn alloc_and_deref_round_trip_to_int() {
        let program = Program {
            functions: vec![Function {
                id: NodeId(0),
                name: "main".to_string(),
                params: vec![],
                body: vec![
                    stmt(
                        1,
                        StmtKind::Decl {
                            names: vec![Param {
                                id: NodeId(10),
                                name: "x".to_string(),
                                span: Span::DUMMY,
                            }],
                        },
                    ),
                    stmt(
                        2,
                        StmtKind::Assign {
                            lhs: expr(11, ExprKind::Variable("x".to_string())),
                            rhs: expr(12, ExprKind::Alloc(Box::new(expr(13, ExprKind::Number(5))))),
                        },
                    ),
                    stmt(
                        3,
                        StmtKind::Return(expr(
                            14,
                            ExprKind::Deref(Box::new(expr(15, ExprKind::Variable("x".to_string())))),
                        )),
                    ),
                ],
                span: Span::DUMMY,
            }],
        };

        let handler = Handler::new();
        let results = analyze(&program, &handler).expect("should type-check");
        let x_type = results.node_types.get(&NodeId(11)).unwrap();
        assert!(matches!(x_type, Type::Ref(inner) if inner.equals(&Type::Int)));
    }
}
