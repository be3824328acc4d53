//! Constraint collection (C2): a single pass over the raw AST that allocates
//! one type variable per node needing one and feeds the unifier every row of
//! the type-constraint table (4.2).
//!
//! This pass and IR lowering (`sipc-ir`) are independent consumers of the
//! same [`sipc_ast::Program`] - nothing here builds an intermediate tree.

use crate::error::SemError;
use crate::global_record::FieldTable;
use crate::scope::{RibKind, ScopeTree};
use crate::types::{Type, TypeVarId};
use crate::unify::Unifier;
use sipc_ast::{
    BinOp, ExprKind, ExprNode, Function, NodeId, Param, Program, StmtKind, StmtNode, UnOp,
};
use sipc_util::{DefId, DefIdGenerator, Idx, Symbol};
use std::collections::HashMap;

/// The solved type environment handed back to `sipc-ir`.
pub struct TypeResults {
    pub node_types: HashMap<NodeId, Type>,
    pub function_order: Vec<String>,
    pub fields: FieldTable,
}

pub struct ConstraintCollector<'a> {
    unifier: Unifier,
    scopes: ScopeTree,
    defs: &'a DefIdGenerator,
    var_of_def: HashMap<DefId, TypeVarId>,
    node_var: HashMap<NodeId, TypeVarId>,
    fields: FieldTable,
    functions: HashMap<String, (DefId, TypeVarId)>,
    function_order: Vec<String>,
    current_return_var: Option<TypeVarId>,
}

impl<'a> ConstraintCollector<'a> {
    pub fn new(defs: &'a DefIdGenerator) -> Self {
        Self {
            unifier: Unifier::new(),
            scopes: ScopeTree::new(),
            defs,
            var_of_def: HashMap::new(),
            node_var: HashMap::new(),
            fields: FieldTable::new(),
            functions: HashMap::new(),
            function_order: Vec::new(),
            current_return_var: None,
        }
    }

    /// Run C2 and C3 together over a whole program: collect every
    /// constraint, unifying eagerly, stopping at the first conflict (7's
    /// propagation policy - no recovery).
    pub fn analyze(mut self, program: &Program) -> Result<TypeResults, SemError> {
        // The global record's field order must be fixed before any `Record`
        // or `FieldAccess` constraint is built, or two record terms built at
        // different points in the walk would disagree on width.
        for function in &program.functions {
            for stmt in &function.body {
                self.prescan_stmt(stmt);
            }
        }

        // Pre-declare every function so forward calls resolve.
        for function in &program.functions {
            let def_id = self.defs.next();
            let fn_var = self.fresh_var_for_node(function.id);
            self.var_of_def.insert(def_id, fn_var);
            self.functions
                .insert(function.name.clone(), (def_id, fn_var));
            self.function_order.push(function.name.clone());
            self.scopes
                .add_binding(Symbol::intern(&function.name), def_id);
        }

        for function in &program.functions {
            self.analyze_function(function)?;
        }

        let mut node_types = HashMap::new();
        for (node, var) in self.node_var.clone() {
            let ty = self.unifier.resolve(&Type::Var(var));
            node_types.insert(node, ty);
        }

        Ok(TypeResults {
            node_types,
            function_order: self.function_order,
            fields: self.fields,
        })
    }

    fn prescan_stmt(&mut self, stmt: &StmtNode) {
        match &stmt.kind {
            StmtKind::Decl { .. } => {}
            StmtKind::Assign { lhs, rhs } => {
                self.prescan_expr(lhs);
                self.prescan_expr(rhs);
            }
            StmtKind::Block(stmts) => stmts.iter().for_each(|s| self.prescan_stmt(s)),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.prescan_expr(cond);
                self.prescan_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.prescan_stmt(e);
                }
            }
            StmtKind::While { cond, body } => {
                self.prescan_expr(cond);
                self.prescan_stmt(body);
            }
            StmtKind::ForRange {
                low, high, step, body, ..
            } => {
                self.prescan_expr(low);
                self.prescan_expr(high);
                if let Some(s) = step {
                    self.prescan_expr(s);
                }
                self.prescan_stmt(body);
            }
            StmtKind::ForIter { array, body, .. } => {
                self.prescan_expr(array);
                self.prescan_stmt(body);
            }
            StmtKind::Output(e) | StmtKind::Error(e) | StmtKind::Return(e) => self.prescan_expr(e),
        }
    }

    fn prescan_expr(&mut self, expr: &ExprNode) {
        match &expr.kind {
            ExprKind::Number(_)
            | ExprKind::Boolean(_)
            | ExprKind::Variable(_)
            | ExprKind::Input
            | ExprKind::Null
            | ExprKind::AddressOf(_) => {}
            ExprKind::Alloc(e) | ExprKind::Deref(e) => self.prescan_expr(e),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.prescan_expr(lhs);
                self.prescan_expr(rhs);
            }
            ExprKind::Unary { operand, .. } => self.prescan_expr(operand),
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                self.prescan_expr(cond);
                self.prescan_expr(then_branch);
                self.prescan_expr(else_branch);
            }
            ExprKind::Call { callee, args } => {
                self.prescan_expr(callee);
                args.iter().for_each(|a| self.prescan_expr(a));
            }
            ExprKind::Record { fields } => {
                for (name, value) in fields {
                    self.fields.intern(name);
                    self.prescan_expr(value);
                }
            }
            ExprKind::FieldAccess { record, field } => {
                self.fields.intern(field);
                self.prescan_expr(record);
            }
            ExprKind::Index { array, index } => {
                self.prescan_expr(array);
                self.prescan_expr(index);
            }
            ExprKind::ArrayLit { elements } => elements.iter().for_each(|e| self.prescan_expr(e)),
            ExprKind::ArrayOf { length, value } => {
                self.prescan_expr(length);
                self.prescan_expr(value);
            }
        }
    }

    fn fresh_var_for_node(&mut self, node: NodeId) -> TypeVarId {
        if let Some(&v) = self.node_var.get(&node) {
            return v;
        }
        let v = self.unifier.fresh_var();
        self.node_var.insert(node, v);
        v
    }

    fn unify(&mut self, span: sipc_util::Span, reason: &'static str, a: &Type, b: &Type) -> Result<(), SemError> {
        self.unifier.unify(a, b).map_err(|e| match e {
            crate::unify::UnifyError::Conflict { expected, found } => SemError::Conflict {
                span,
                expected,
                found,
                reason,
            },
            crate::unify::UnifyError::Occurs { var, .. } => SemError::OccursWithoutMu { span, var },
        })
    }

    fn analyze_function(&mut self, function: &Function) -> Result<(), SemError> {
        self.scopes.enter_scope(RibKind::Function);

        let is_main = function.name == "main";
        let mut param_vars = Vec::new();
        for param in &function.params {
            let def_id = self.defs.next();
            let var = self.fresh_var_for_node(param.id);
            self.var_of_def.insert(def_id, var);
            self.scopes.add_binding(Symbol::intern(&param.name), def_id);
            // `main`'s parameters are staged from the runtime-provided input
            // array (there is no argv in the language), so they are `Int`
            // whether or not the body ever uses them.
            if is_main {
                self.unify(param.span, "main parameter", &Type::Var(var), &Type::Int)?;
            }
            param_vars.push(Type::Var(var));
        }

        let return_var = self.unifier.fresh_var();
        let previous_return = self.current_return_var.replace(return_var);

        for stmt in &function.body {
            self.analyze_stmt(stmt)?;
        }

        self.current_return_var = previous_return;

        if is_main {
            self.unify(function.span, "main return", &Type::Var(return_var), &Type::Int)?;
        }

        let (_, fn_var) = self.functions[&function.name];
        let fn_type = Type::Fun(param_vars, Box::new(Type::Var(return_var)));
        self.unify(function.span, "function declaration", &Type::Var(fn_var), &fn_type)?;

        self.scopes.exit_scope();
        Ok(())
    }

    fn analyze_stmt(&mut self, stmt: &StmtNode) -> Result<(), SemError> {
        match &stmt.kind {
            StmtKind::Decl { names } => {
                for name in names {
                    let def_id = self.defs.next();
                    let var = self.fresh_var_for_node(name.id);
                    self.var_of_def.insert(def_id, var);
                    self.scopes.add_binding(Symbol::intern(&name.name), def_id);
                }
                Ok(())
            }
            StmtKind::Assign { lhs, rhs } => {
                let rhs_ty = self.analyze_expr(rhs)?;
                match &lhs.kind {
                    ExprKind::Deref(inner) => {
                        let inner_ty = self.analyze_expr(inner)?;
                        self.unify(
                            stmt.span,
                            "pointer assignment",
                            &inner_ty,
                            &Type::Ref(Box::new(rhs_ty)),
                        )
                    }
                    _ => {
                        let lhs_ty = self.analyze_expr(lhs)?;
                        self.unify(stmt.span, "assignment", &lhs_ty, &rhs_ty)
                    }
                }
            }
            StmtKind::Block(stmts) => {
                self.scopes.enter_scope(RibKind::Block);
                for s in stmts {
                    self.analyze_stmt(s)?;
                }
                self.scopes.exit_scope();
                Ok(())
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.analyze_expr(cond)?;
                self.unify(cond.span, "if condition", &cond_ty, &Type::Bool)?;
                self.analyze_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.analyze_stmt(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                let cond_ty = self.analyze_expr(cond)?;
                self.unify(cond.span, "while condition", &cond_ty, &Type::Bool)?;
                self.analyze_stmt(body)
            }
            StmtKind::ForRange {
                var,
                low,
                high,
                step,
                body,
            } => {
                let low_ty = self.analyze_expr(low)?;
                let high_ty = self.analyze_expr(high)?;
                self.unify(low.span, "for-range bound", &low_ty, &Type::Int)?;
                self.unify(high.span, "for-range bound", &high_ty, &Type::Int)?;
                if let Some(step) = step {
                    let step_ty = self.analyze_expr(step)?;
                    self.unify(step.span, "for-range step", &step_ty, &Type::Int)?;
                }
                self.scopes.enter_scope(RibKind::Block);
                let def_id = self.defs.next();
                let var_var = self.fresh_var_for_node(var.id);
                self.var_of_def.insert(def_id, var_var);
                self.scopes.add_binding(Symbol::intern(&var.name), def_id);
                self.unify(var.span, "for-range variable", &Type::Var(var_var), &Type::Int)?;
                self.analyze_stmt(body)?;
                self.scopes.exit_scope();
                Ok(())
            }
            StmtKind::ForIter { var, array, body } => {
                let array_ty = self.analyze_expr(array)?;
                let elem_var = self.unifier.fresh_var();
                self.unify(
                    array.span,
                    "for-iter array",
                    &array_ty,
                    &Type::Array(Box::new(Type::Var(elem_var))),
                )?;
                self.scopes.enter_scope(RibKind::Block);
                let def_id = self.defs.next();
                let var_var = self.fresh_var_for_node(var.id);
                self.var_of_def.insert(def_id, var_var);
                self.scopes.add_binding(Symbol::intern(&var.name), def_id);
                self.unify(
                    var.span,
                    "for-iter variable",
                    &Type::Var(var_var),
                    &Type::Var(elem_var),
                )?;
                self.analyze_stmt(body)?;
                self.scopes.exit_scope();
                Ok(())
            }
            StmtKind::Output(e) => {
                let ty = self.analyze_expr(e)?;
                self.unify(e.span, "output", &ty, &Type::Int)
            }
            StmtKind::Error(e) => {
                let ty = self.analyze_expr(e)?;
                self.unify(e.span, "error", &ty, &Type::Int)
            }
            StmtKind::Return(e) => {
                let ty = self.analyze_expr(e)?;
                let return_var = self
                    .current_return_var
                    .expect("return outside a function body");
                self.unify(e.span, "return", &Type::Var(return_var), &ty)
            }
        }
    }

    fn analyze_expr(&mut self, expr: &ExprNode) -> Result<Type, SemError> {
        let result = match &expr.kind {
            ExprKind::Number(_) => Type::Int,
            ExprKind::Boolean(_) => Type::Bool,
            ExprKind::Variable(name) => self.resolve_variable(expr, name)?,
            ExprKind::Input => Type::Int,
            ExprKind::Null => Type::Ref(Box::new(Type::Var(self.unifier.fresh_var()))),
            ExprKind::Alloc(inner) => {
                let inner_ty = self.analyze_expr(inner)?;
                Type::Ref(Box::new(inner_ty))
            }
            ExprKind::AddressOf(name) => {
                let var_ty = self.resolve_variable(expr, name)?;
                Type::Ref(Box::new(var_ty))
            }
            ExprKind::Deref(inner) => {
                let inner_ty = self.analyze_expr(inner)?;
                let pointee = self.unifier.fresh_var();
                self.unify(
                    expr.span,
                    "dereference",
                    &inner_ty,
                    &Type::Ref(Box::new(Type::Var(pointee))),
                )?;
                Type::Var(pointee)
            }
            ExprKind::Binary { op, lhs, rhs } => self.analyze_binary(expr, *op, lhs, rhs)?,
            ExprKind::Unary { op, operand } => self.analyze_unary(expr, *op, operand)?,
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.analyze_expr(cond)?;
                self.unify(cond.span, "ternary condition", &cond_ty, &Type::Bool)?;
                let then_ty = self.analyze_expr(then_branch)?;
                let else_ty = self.analyze_expr(else_branch)?;
                self.unify(expr.span, "ternary branches", &then_ty, &else_ty)?;
                then_ty
            }
            ExprKind::Call { callee, args } => {
                let callee_ty = self.analyze_expr(callee)?;
                let mut arg_types = Vec::with_capacity(args.len());
                for a in args {
                    arg_types.push(self.analyze_expr(a)?);
                }
                let ret_var = self.unifier.fresh_var();
                self.unify(
                    expr.span,
                    "function call",
                    &callee_ty,
                    &Type::Fun(arg_types, Box::new(Type::Var(ret_var))),
                )?;
                Type::Var(ret_var)
            }
            ExprKind::Record { fields } => {
                for (name, _) in fields {
                    self.fields.intern(name);
                }
                let mut slots = vec![Type::AbsentField; self.fields.len()];
                let mut names = vec![String::new(); self.fields.len()];
                for name in self.fields.names() {
                    let idx = self.fields.index_of(name).unwrap();
                    names[idx] = name.clone();
                }
                for (name, value) in fields {
                    let idx = self.fields.index_of(name).unwrap();
                    slots[idx] = self.analyze_expr(value)?;
                }
                let record_fields: Vec<(String, Type)> = names.into_iter().zip(slots).collect();
                Type::Record(record_fields)
            }
            ExprKind::FieldAccess { record, field } => {
                let record_ty = self.analyze_expr(record)?;
                let field_var = self.unifier.fresh_var();
                self.fields.intern(field);
                let mut slots = vec![Type::AbsentField; self.fields.len()];
                let idx = self.fields.index_of(field).unwrap();
                slots[idx] = Type::Var(field_var);
                let names: Vec<String> = self.fields.names().to_vec();
                let probe = Type::Record(names.into_iter().zip(slots).collect());
                self.unify(expr.span, "field access", &record_ty, &probe)?;
                let _ = idx;
                Type::Var(field_var)
            }
            ExprKind::Index { array, index } => {
                let array_ty = self.analyze_expr(array)?;
                let index_ty = self.analyze_expr(index)?;
                self.unify(index.span, "array index", &index_ty, &Type::Int)?;
                let elem_var = self.unifier.fresh_var();
                self.unify(
                    array.span,
                    "array index target",
                    &array_ty,
                    &Type::Array(Box::new(Type::Var(elem_var))),
                )?;
                Type::Var(elem_var)
            }
            ExprKind::ArrayLit { elements } => {
                let elem_var = self.unifier.fresh_var();
                for e in elements {
                    let e_ty = self.analyze_expr(e)?;
                    self.unify(e.span, "array literal element", &Type::Var(elem_var), &e_ty)?;
                }
                Type::Array(Box::new(Type::Var(elem_var)))
            }
            ExprKind::ArrayOf { length, value } => {
                let length_ty = self.analyze_expr(length)?;
                self.unify(length.span, "array-of length", &length_ty, &Type::Int)?;
                let value_ty = self.analyze_expr(value)?;
                Type::Array(Box::new(value_ty))
            }
        };

        let node_var = self.fresh_var_for_node(expr.id);
        self.unify(expr.span, "expression", &Type::Var(node_var), &result)?;
        Ok(Type::Var(node_var))
    }

    fn analyze_binary(
        &mut self,
        expr: &ExprNode,
        op: BinOp,
        lhs: &ExprNode,
        rhs: &ExprNode,
    ) -> Result<Type, SemError> {
        let lhs_ty = self.analyze_expr(lhs)?;
        let rhs_ty = self.analyze_expr(rhs)?;

        if op.is_arithmetic() {
            self.unify(lhs.span, "arithmetic operand", &lhs_ty, &Type::Int)?;
            self.unify(rhs.span, "arithmetic operand", &rhs_ty, &Type::Int)?;
            Ok(Type::Int)
        } else if op.is_relational() {
            self.unify(lhs.span, "relational operand", &lhs_ty, &Type::Int)?;
            self.unify(rhs.span, "relational operand", &rhs_ty, &Type::Int)?;
            Ok(Type::Bool)
        } else if op.is_equality() {
            self.unify(expr.span, "equality operands", &lhs_ty, &rhs_ty)?;
            Ok(Type::Bool)
        } else {
            debug_assert!(op.is_logical());
            self.unify(lhs.span, "logical operand", &lhs_ty, &Type::Bool)?;
            self.unify(rhs.span, "logical operand", &rhs_ty, &Type::Bool)?;
            Ok(Type::Bool)
        }
    }

    fn analyze_unary(&mut self, expr: &ExprNode, op: UnOp, operand: &ExprNode) -> Result<Type, SemError> {
        let operand_ty = self.analyze_expr(operand)?;
        match op {
            UnOp::Neg | UnOp::Incr | UnOp::Decr => {
                self.unify(expr.span, "unary arithmetic", &operand_ty, &Type::Int)?;
                Ok(Type::Int)
            }
            UnOp::Not => {
                self.unify(expr.span, "logical negation", &operand_ty, &Type::Bool)?;
                Ok(Type::Bool)
            }
            UnOp::Len => Ok(Type::Int),
        }
    }

    fn resolve_variable(&mut self, expr: &ExprNode, name: &str) -> Result<Type, SemError> {
        let symbol = Symbol::intern(name);
        let def_id = self.scopes.resolve(symbol).ok_or_else(|| SemError::UndefinedName {
            span: expr.span,
            name: name.to_string(),
        })?;
        let var = *self
            .var_of_def
            .get(&def_id)
            .expect("every bound DefId has a type variable");
        Ok(Type::Var(var))
    }
}
