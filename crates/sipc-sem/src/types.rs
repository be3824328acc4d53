//! The SIP type term model (C1).
//!
//! A [`Type`] is either a ground term (`Int`, `Bool`, `AbsentField`), a
//! compound term built from subterms (`Ref`, `Fun`, `Record`, `Array`), or a
//! placeholder that the unifier resolves (`Var`, `Alpha`, `Mu`). Terms are
//! compared structurally - `equals` - and the three free-standing operations
//! this module exists to provide are `equals`, `print` and `free_vars`.

use sipc_ast::NodeId;
use std::collections::BTreeSet;
use std::fmt;

/// Identifies a unification slot. One is allocated per AST node whose type
/// is ever queried (`Var`), plus extras for implicit intermediate terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(pub u32);

impl sipc_util::Idx for TypeVarId {
    fn from_usize(idx: usize) -> Self {
        TypeVarId(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl TypeVarId {
    pub fn from_node(node: NodeId) -> Self {
        TypeVarId(node.index() as u32)
    }
}

/// A SIP type term.
///
/// `Record` stores fields in the program's canonical field order (see
/// [`crate::global_record::FieldTable`]), not declaration order - two record
/// terms with the same field set are identical regardless of the syntactic
/// order their literal listed them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    /// The type of a record slot that a given literal never mentioned.
    AbsentField,
    Ref(Box<Type>),
    Fun(Vec<Type>, Box<Type>),
    /// Field name/type pairs, kept in canonical field order.
    Record(Vec<(String, Type)>),
    Array(Box<Type>),
    /// An as-yet-unsolved unification variable.
    Var(TypeVarId),
    /// A fresh, never-unified type variable standing for "any type" -
    /// produced when printing a term whose variable was never constrained.
    Alpha(u32),
    /// `mu a. T` - introduced when a variable's own definition is cyclic
    /// (e.g. `alloc x = x`), binding variable `a` within `body`.
    Mu(TypeVarId, Box<Type>),
}

impl Type {
    /// Structural equality, recursing into subterms. `Mu` binders are
    /// compared by their bound variable id, not by alpha-renaming - SIP
    /// source programs never observe bound variable identity, so this is
    /// sufficient for the single-pass checker here.
    pub fn equals(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Int, Type::Int) => true,
            (Type::Bool, Type::Bool) => true,
            (Type::AbsentField, Type::AbsentField) => true,
            (Type::Ref(a), Type::Ref(b)) => a.equals(b),
            (Type::Fun(ps1, r1), Type::Fun(ps2, r2)) => {
                ps1.len() == ps2.len()
                    && ps1.iter().zip(ps2.iter()).all(|(a, b)| a.equals(b))
                    && r1.equals(r2)
            }
            (Type::Record(f1), Type::Record(f2)) => {
                f1.len() == f2.len()
                    && f1
                        .iter()
                        .zip(f2.iter())
                        .all(|((n1, t1), (n2, t2))| n1 == n2 && t1.equals(t2))
            }
            (Type::Array(a), Type::Array(b)) => a.equals(b),
            (Type::Var(a), Type::Var(b)) => a == b,
            (Type::Alpha(a), Type::Alpha(b)) => a == b,
            (Type::Mu(v1, b1), Type::Mu(v2, b2)) => v1 == v2 && b1.equals(b2),
            _ => false,
        }
    }

    /// The set of unresolved `Var` ids reachable from this term. `Mu`'s own
    /// bound variable is excluded - it is not free within its body.
    pub fn free_vars(&self) -> BTreeSet<TypeVarId> {
        let mut out = BTreeSet::new();
        self.collect_free_vars(&mut out);
        out
    }

    fn collect_free_vars(&self, out: &mut BTreeSet<TypeVarId>) {
        match self {
            Type::Int | Type::Bool | Type::AbsentField | Type::Alpha(_) => {}
            Type::Ref(t) | Type::Array(t) => t.collect_free_vars(out),
            Type::Fun(params, ret) => {
                for p in params {
                    p.collect_free_vars(out);
                }
                ret.collect_free_vars(out);
            }
            Type::Record(fields) => {
                for (_, t) in fields {
                    t.collect_free_vars(out);
                }
            }
            Type::Var(v) => {
                out.insert(*v);
            }
            Type::Mu(bound, body) => {
                let mut inner = BTreeSet::new();
                body.collect_free_vars(&mut inner);
                inner.remove(bound);
                out.extend(inner);
            }
        }
    }

    /// `true` if `var` occurs free in this term - the occurs-check used by
    /// the unifier before binding `var` to a non-`Mu` term.
    pub fn contains_var(&self, var: TypeVarId) -> bool {
        self.free_vars().contains(&var)
    }

    pub fn print(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::AbsentField => write!(f, "\u{22a5}"),
            Type::Ref(t) => write!(f, "&{}", t),
            Type::Fun(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}}")
            }
            Type::Array(t) => write!(f, "[{}]", t),
            Type::Var(v) => write!(f, "?{}", v.0),
            Type::Alpha(n) => write!(f, "\u{03b1}{}", n),
            Type::Mu(v, body) => write!(f, "\u{03bc}?{}.{}", v.0, body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_is_structural() {
        let a = Type::Fun(vec![Type::Int], Box::new(Type::Bool));
        let b = Type::Fun(vec![Type::Int], Box::new(Type::Bool));
        assert!(a.equals(&b));
        let c = Type::Fun(vec![Type::Bool], Box::new(Type::Bool));
        assert!(!a.equals(&c));
    }

    #[test]
    fn free_vars_excludes_mu_binder() {
        let v = TypeVarId(1);
        let ty = Type::Mu(v, Box::new(Type::Ref(Box::new(Type::Var(v)))));
        assert!(ty.free_vars().is_empty());
    }

    #[test]
    fn free_vars_collects_nested() {
        let ty = Type::Record(vec![
            ("a".to_string(), Type::Var(TypeVarId(1))),
            ("b".to_string(), Type::Array(Box::new(Type::Var(TypeVarId(2))))),
        ]);
        let vars = ty.free_vars();
        assert_eq!(vars.len(), 2);
        assert!(vars.contains(&TypeVarId(1)));
        assert!(vars.contains(&TypeVarId(2)));
    }

    #[test]
    fn record_field_order_matters_for_equality() {
        let a = Type::Record(vec![("x".to_string(), Type::Int), ("y".to_string(), Type::Bool)]);
        let b = Type::Record(vec![("y".to_string(), Type::Bool), ("x".to_string(), Type::Int)]);
        assert!(!a.equals(&b), "record field order is part of the term");
    }
}
