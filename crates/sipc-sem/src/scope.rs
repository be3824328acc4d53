//! Name resolution (`astToVar(n)` in the constraint table, C2).
//!
//! SIP has no modules and no forward-declared globals beyond function names,
//! so the rib stack is shallow: one `Module` rib holding every function name,
//! one `Function` rib per call holding its parameters, and one `Block` rib
//! per nested statement block holding its `var` declarations.

use sipc_util::{DefId, Idx, IndexVec, Symbol};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RibId(pub u32);

impl Idx for RibId {
    fn from_usize(idx: usize) -> Self {
        RibId(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct Rib {
    pub bindings: HashMap<Symbol, DefId>,
    pub parent: Option<RibId>,
    pub kind: RibKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RibKind {
    Module,
    Function,
    Block,
}

pub struct ScopeTree {
    pub ribs: IndexVec<RibId, Rib>,
    pub current_rib: RibId,
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut ribs = IndexVec::new();
        let root = ribs.push(Rib {
            bindings: HashMap::new(),
            parent: None,
            kind: RibKind::Module,
        });
        Self {
            ribs,
            current_rib: root,
        }
    }

    pub fn enter_scope(&mut self, kind: RibKind) -> RibId {
        let new_rib = self.ribs.push(Rib {
            bindings: HashMap::new(),
            parent: Some(self.current_rib),
            kind,
        });
        self.current_rib = new_rib;
        new_rib
    }

    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.ribs[self.current_rib].parent {
            self.current_rib = parent;
        }
    }

    pub fn add_binding(&mut self, name: Symbol, def_id: DefId) {
        self.ribs[self.current_rib].bindings.insert(name, def_id);
    }

    /// Walk outward from the current rib, returning the nearest binding.
    /// SIP has no shadowing ambiguity to report: an inner `var` with the
    /// same name as an outer one simply shadows it, same as a nested Rust
    /// block.
    pub fn resolve(&self, name: Symbol) -> Option<DefId> {
        let mut rib_id = self.current_rib;
        loop {
            let rib = &self.ribs[rib_id];
            if let Some(&def_id) = rib.bindings.get(&name) {
                return Some(def_id);
            }
            match rib.parent {
                Some(parent) => rib_id = parent,
                None => return None,
            }
        }
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_binding_shadows_outer() {
        let mut tree = ScopeTree::new();
        let x = Symbol::intern("x");
        tree.add_binding(x, DefId(0));
        tree.enter_scope(RibKind::Block);
        tree.add_binding(x, DefId(1));
        assert_eq!(tree.resolve(x), Some(DefId(1)));
        tree.exit_scope();
        assert_eq!(tree.resolve(x), Some(DefId(0)));
    }

    #[test]
    fn unresolved_name_is_none() {
        let tree = ScopeTree::new();
        assert_eq!(tree.resolve(Symbol::intern("nowhere")), None);
    }
}
