//! The unifier (C3): union-find over [`TypeVarId`]s with lazy `Mu`
//! introduction for cyclic variables.
//!
//! Each equivalence class has one representative variable (chosen by the
//! tie-break rule below) and at most one non-variable term bound to it. Two
//! classes merge when a constraint equates them; merging a class that is
//! already bound to an incompatible term is a type conflict (C3's only
//! failure mode - SIP's inference never backtracks, so the first conflict
//! aborts the whole analysis, see 7).

use crate::types::{Type, TypeVarId};
use sipc_util::{Idx, IndexVec};

#[derive(Debug)]
struct ClassData {
    parent: TypeVarId,
    rank: u32,
    binding: Option<Type>,
}

#[derive(Debug)]
pub struct Unifier {
    classes: IndexVec<TypeVarId, ClassData>,
}

#[derive(Debug, Clone)]
pub enum UnifyError {
    /// Two ground/compound terms that can never agree (e.g. `int` vs `bool`,
    /// or two `Fun`s of different arity).
    Conflict { expected: Type, found: Type },
    /// A variable would have to equal a term that mentions itself, and the
    /// term isn't a bare `Var` - so no finite, non-`Mu` type exists for it.
    /// The caller retries by wrapping the bound term in `Type::Mu` instead
    /// of treating this as fatal (see `Unifier::unify`'s self-reference
    /// branch); this variant exists for callers that want to observe it.
    Occurs { var: TypeVarId, in_type: Type },
}

impl Unifier {
    pub fn new() -> Self {
        Self {
            classes: IndexVec::new(),
        }
    }

    /// Allocate a fresh, unbound variable. Callers creating one variable per
    /// AST node should allocate in a stable order (e.g. a pre-order walk)
    /// so the tie-break rule below behaves deterministically.
    pub fn fresh_var(&mut self) -> TypeVarId {
        let id = TypeVarId(self.classes.len() as u32);
        self.classes.push(ClassData {
            parent: id,
            rank: 0,
            binding: None,
        });
        id
    }

    fn find(&mut self, var: TypeVarId) -> TypeVarId {
        let parent = self.classes[var].parent;
        if parent == var {
            return var;
        }
        let root = self.find(parent);
        self.classes[var].parent = root;
        root
    }

    /// The term currently known for `var`'s equivalence class, following
    /// substitutions all the way down (so nested `Var`s inside a bound term
    /// are themselves resolved).
    pub fn resolve(&mut self, ty: &Type) -> Type {
        match ty {
            Type::Var(v) => {
                let root = self.find(*v);
                match self.classes[root].binding.clone() {
                    Some(bound) => self.resolve(&bound),
                    None => Type::Var(root),
                }
            }
            Type::Ref(t) => Type::Ref(Box::new(self.resolve(t))),
            Type::Array(t) => Type::Array(Box::new(self.resolve(t))),
            Type::Fun(params, ret) => Type::Fun(
                params.iter().map(|p| self.resolve(p)).collect(),
                Box::new(self.resolve(ret)),
            ),
            Type::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(name, t)| (name.clone(), self.resolve(t)))
                    .collect(),
            ),
            Type::Mu(v, body) => Type::Mu(*v, Box::new(self.resolve(body))),
            other => other.clone(),
        }
    }

    /// Equate `a` and `b`. Constraint collection (C2) feeds this every row
    /// of the type-constraint table as it visits the AST.
    pub fn unify(&mut self, a: &Type, b: &Type) -> Result<(), UnifyError> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (&a, &b) {
            (Type::Var(v1), Type::Var(v2)) => {
                let r1 = self.find(*v1);
                let r2 = self.find(*v2);
                if r1 == r2 {
                    return Ok(());
                }
                self.union_vars(r1, r2)
            }
            (Type::Var(v), other) | (other, Type::Var(v)) => self.bind(*v, other.clone()),
            (Type::Int, Type::Int) | (Type::Bool, Type::Bool) | (Type::AbsentField, Type::AbsentField) => {
                Ok(())
            }
            (Type::Ref(t1), Type::Ref(t2)) => self.unify(t1, t2),
            (Type::Array(t1), Type::Array(t2)) => self.unify(t1, t2),
            (Type::Fun(p1, r1), Type::Fun(p2, r2)) => {
                if p1.len() != p2.len() {
                    return Err(UnifyError::Conflict {
                        expected: a.clone(),
                        found: b.clone(),
                    });
                }
                for (x, y) in p1.iter().zip(p2.iter()) {
                    self.unify(x, y)?;
                }
                self.unify(r1, r2)
            }
            (Type::Record(f1), Type::Record(f2)) => self.unify_records(f1, f2, &a, &b),
            (Type::Mu(_, body1), Type::Mu(_, body2)) => self.unify(body1, body2),
            (Type::Mu(_, body), other) | (other, Type::Mu(_, body)) => self.unify(body, other),
            _ => Err(UnifyError::Conflict {
                expected: a.clone(),
                found: b.clone(),
            }),
        }
    }

    /// Records unify field-by-field through the ordinary `unify` - which
    /// already does the right thing for `AbsentField`: it unifies with
    /// another `AbsentField` or with an unbound variable (so a field never
    /// written in one record literal doesn't constrain the other's field
    /// type), but conflicts against a genuinely-present concrete field
    /// type, same as any other mismatched pair.
    fn unify_records(
        &mut self,
        f1: &[(String, Type)],
        f2: &[(String, Type)],
        whole1: &Type,
        whole2: &Type,
    ) -> Result<(), UnifyError> {
        if f1.len() != f2.len() {
            return Err(UnifyError::Conflict {
                expected: whole1.clone(),
                found: whole2.clone(),
            });
        }
        for ((n1, t1), (n2, t2)) in f1.iter().zip(f2.iter()) {
            if n1 != n2 {
                return Err(UnifyError::Conflict {
                    expected: whole1.clone(),
                    found: whole2.clone(),
                });
            }
            self.unify(t1, t2)?;
        }
        Ok(())
    }

    fn union_vars(&mut self, r1: TypeVarId, r2: TypeVarId) -> Result<(), UnifyError> {
        // Tie-break: the variable with the lower id (== earlier allocation,
        // == earlier declaration order) stays the representative.
        let (keep, drop) = if r1.0 <= r2.0 { (r1, r2) } else { (r2, r1) };
        let dropped_binding = self.classes[drop].binding.take();
        self.classes[drop].parent = keep;
        if self.classes[keep].rank == self.classes[drop].rank {
            self.classes[keep].rank += 1;
        }
        if let Some(bound) = dropped_binding {
            self.bind(keep, bound)?;
        }
        Ok(())
    }

    fn bind(&mut self, var: TypeVarId, term: Type) -> Result<(), UnifyError> {
        let root = self.find(var);

        if let Type::Var(other) = &term {
            let other_root = self.find(*other);
            if other_root == root {
                return Ok(());
            }
        }

        if term.contains_var(root) {
            // Self-reference: introduce a mu-type instead of failing, per
            // the `alloc x = x` case in 4.3 / 9.
            let existing = self.classes[root].binding.clone();
            let mu = Type::Mu(root, Box::new(term.clone()));
            self.classes[root].binding = Some(mu);
            if let Some(existing) = existing {
                return self.unify(&Type::Var(root), &existing);
            }
            return Ok(());
        }

        match self.classes[root].binding.clone() {
            Some(existing) => self.unify(&existing, &term),
            None => {
                self.classes[root].binding = Some(term);
                Ok(())
            }
        }
    }
}

impl Default for Unifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifies_two_vars_to_concrete_type() {
        let mut u = Unifier::new();
        let a = u.fresh_var();
        let b = u.fresh_var();
        u.unify(&Type::Var(a), &Type::Var(b)).unwrap();
        u.unify(&Type::Var(a), &Type::Int).unwrap();
        assert!(u.resolve(&Type::Var(b)).equals(&Type::Int));
    }

    #[test]
    fn conflicting_ground_types_error() {
        let mut u = Unifier::new();
        let a = u.fresh_var();
        u.unify(&Type::Var(a), &Type::Int).unwrap();
        let err = u.unify(&Type::Var(a), &Type::Bool);
        assert!(err.is_err());
    }

    #[test]
    fn self_reference_introduces_mu() {
        let mut u = Unifier::new();
        let a = u.fresh_var();
        // a = &a
        u.unify(&Type::Var(a), &Type::Ref(Box::new(Type::Var(a))))
            .unwrap();
        let resolved = u.resolve(&Type::Var(a));
        assert!(matches!(resolved, Type::Mu(_, _)));
    }

    #[test]
    fn absent_field_unifies_with_unbound_var() {
        let mut u = Unifier::new();
        let v = u.fresh_var();
        let r1 = Type::Record(vec![("x".to_string(), Type::Int), ("y".to_string(), Type::AbsentField)]);
        let r2 = Type::Record(vec![("x".to_string(), Type::Int), ("y".to_string(), Type::Var(v))]);
        assert!(u.unify(&r1, &r2).is_ok());
    }

    #[test]
    fn absent_field_conflicts_with_concrete_field() {
        let mut u = Unifier::new();
        let r1 = Type::Record(vec![("x".to_string(), Type::Int), ("y".to_string(), Type::AbsentField)]);
        let r2 = Type::Record(vec![("x".to_string(), Type::Int), ("y".to_string(), Type::Bool)]);
        assert!(u.unify(&r1, &r2).is_err());
    }

    #[test]
    fn record_width_mismatch_errors() {
        let mut u = Unifier::new();
        let r1 = Type::Record(vec![("x".to_string(), Type::Int)]);
        let r2 = Type::Record(vec![("x".to_string(), Type::Int), ("y".to_string(), Type::Int)]);
        assert!(u.unify(&r1, &r2).is_err());
    }
}
