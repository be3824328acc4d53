//! AST node definitions for SIP programs.
//!
//! These types describe the tree handed to the semantic analyzer and the IR
//! lowering stage; nothing in this crate parses source text. Every expression
//! and statement carries a [`NodeId`] that is stable for the lifetime of the
//! tree - the type inference engine keys its type-variable table on these ids,
//! and `E1[E2]`'s bounds check refers back to the indexing node that produced it.

use serde::{Deserialize, Serialize};
use sipc_util::{define_idx, Span};

define_idx!(NodeId);

/// A complete SIP program: an unordered bag of function definitions.
///
/// Function declaration order (the order they appear in `functions`) is
/// significant: it assigns each function its dispatch-table index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl Program {
    pub fn find_main(&self) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == "main")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: NodeId,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<StmtNode>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

/// Unary operators. `Incr`/`Decr` are the `E++`/`E--` forms; they read `E`,
/// compute `E + 1`/`E - 1`, and answer with that value (see C5 4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
    /// `#E`, array length.
    Len,
    Incr,
    Decr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExprNode {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Number(i64),
    Boolean(bool),
    /// A use of a source-level name; resolved to its declaring node by the
    /// scope resolver during constraint collection.
    Variable(String),
    Input,
    Null,
    /// `alloc E` - heap-allocates storage for `E`'s type and initializes it.
    Alloc(Box<ExprNode>),
    /// `&X` - address of a variable. SIP only allows taking the address of a
    /// bare name, never of an arbitrary expression.
    AddressOf(String),
    /// `*E`
    Deref(Box<ExprNode>),
    Binary {
        op: BinOp,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    Unary {
        op: UnOp,
        operand: Box<ExprNode>,
    },
    Ternary {
        cond: Box<ExprNode>,
        then_branch: Box<ExprNode>,
        else_branch: Box<ExprNode>,
    },
    Call {
        callee: Box<ExprNode>,
        args: Vec<ExprNode>,
    },
    /// `{f1: E1, ..., fk: Ek}` - a record literal. Fields not listed here are
    /// `AbsentField` at both the type and storage level.
    Record {
        fields: Vec<(String, ExprNode)>,
    },
    /// `E.f`
    FieldAccess {
        record: Box<ExprNode>,
        field: String,
    },
    /// `E1[E2]` - array indexing, always bounds-checked at lowering time.
    Index {
        array: Box<ExprNode>,
        index: Box<ExprNode>,
    },
    /// `[E1, ..., En]`
    ArrayLit {
        elements: Vec<ExprNode>,
    },
    /// `[L of V]` - an array of `L` copies of `V`.
    ArrayOf {
        length: Box<ExprNode>,
        value: Box<ExprNode>,
    },
}

impl ExprNode {
    pub fn new(id: NodeId, span: Span, kind: ExprKind) -> Self {
        Self { id, span, kind }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StmtNode {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    /// `var x, y, ...;`
    Decl {
        names: Vec<Param>,
    },
    /// `X = E` or `*X = E`; the LHS being a `Deref` distinguishes the two.
    Assign {
        lhs: ExprNode,
        rhs: ExprNode,
    },
    Block(Vec<StmtNode>),
    If {
        cond: ExprNode,
        then_branch: Box<StmtNode>,
        else_branch: Option<Box<StmtNode>>,
    },
    While {
        cond: ExprNode,
        body: Box<StmtNode>,
    },
    /// `for (V : L .. H by S) body`
    ForRange {
        var: Param,
        low: ExprNode,
        high: ExprNode,
        step: Option<ExprNode>,
        body: Box<StmtNode>,
    },
    /// `for (V : A) body`
    ForIter {
        var: Param,
        array: ExprNode,
        body: Box<StmtNode>,
    },
    Output(ExprNode),
    Error(ExprNode),
    Return(ExprNode),
}

impl StmtNode {
    pub fn new(id: NodeId, span: Span, kind: StmtKind) -> Self {
        Self { id, span, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_expr(kind: ExprKind) -> ExprNode {
        ExprNode::new(NodeId(0), Span::DUMMY, kind)
    }

    #[test]
    fn binop_classification() {
        assert!(BinOp::Add.is_arithmetic());
        assert!(BinOp::Lt.is_relational());
        assert!(BinOp::Eq.is_equality());
        assert!(BinOp::And.is_logical());
        assert!(!BinOp::Add.is_relational());
    }

    #[test]
    fn program_finds_main() {
        let main_fn = Function {
            id: NodeId(1),
            name: "main".to_string(),
            params: vec![],
            body: vec![],
            span: Span::DUMMY,
        };
        let program = Program {
            functions: vec![main_fn],
        };
        assert!(program.find_main().is_some());
    }

    #[test]
    fn roundtrip_json() {
        let expr = dummy_expr(ExprKind::Binary {
            op: BinOp::Add,
            lhs: Box::new(dummy_expr(ExprKind::Number(3))),
            rhs: Box::new(dummy_expr(ExprKind::Variable("x".to_string()))),
        });
        let json = serde_json::to_string(&expr).unwrap();
        let back: ExprNode = serde_json::from_str(&json).unwrap();
        match back.kind {
            ExprKind::Binary { op, .. } => assert_eq!(op, BinOp::Add),
            _ => panic!("expected binary expression"),
        }
    }
}
