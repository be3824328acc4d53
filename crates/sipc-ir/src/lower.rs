//! Statement and expression lowering (C4, C5) - single-pass, straight from
//! the raw AST into LLVM IR.
//!
//! Expression lowering is controlled by a `mode` parameter rather than
//! ambient state: [`Mode::RValue`] produces the value an expression reads
//! as, [`Mode::LValue`] produces the address an assignment writes to. SIP
//! only ever assigns through a bare variable or `*E`, so `LValue` mode is
//! only implemented for [`ExprKind::Variable`] and [`ExprKind::Deref`].

use crate::context::CodegenContext;
use crate::error::{CodeGenError, Result};
use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use inkwell::values::{BasicValueEnum, FunctionValue, IntValue, PointerValue};
use inkwell::IntPredicate;
use sipc_ast::{BinOp, ExprKind, ExprNode, Function, NodeId, StmtKind, StmtNode, UnOp};
use sipc_sem::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    RValue,
    LValue,
}

pub struct FunctionLowering<'a, 'ctx> {
    cx: &'a CodegenContext<'ctx>,
    builder: Builder<'ctx>,
    function: FunctionValue<'ctx>,
    node_types: &'a HashMap<NodeId, Type>,
    /// One scope per nested block; SIP's only scoping construct is `var`
    /// declaration visibility, which this stack mirrors directly.
    scopes: Vec<HashMap<String, PointerValue<'ctx>>>,
}

impl<'a, 'ctx> FunctionLowering<'a, 'ctx> {
    pub fn new(
        cx: &'a CodegenContext<'ctx>,
        function: FunctionValue<'ctx>,
        node_types: &'a HashMap<NodeId, Type>,
    ) -> Self {
        Self {
            cx,
            builder: cx.builder(),
            function,
            node_types,
            scopes: vec![HashMap::new()],
        }
    }

    fn node_type(&self, node: NodeId) -> Type {
        self.node_types
            .get(&node)
            .cloned()
            .unwrap_or(Type::Int)
    }

    fn bind(&mut self, name: &str, slot: PointerValue<'ctx>) {
        self.scopes.last_mut().expect("scope stack is never empty").insert(name.to_string(), slot);
    }

    fn lookup(&self, name: &str) -> Result<PointerValue<'ctx>> {
        for scope in self.scopes.iter().rev() {
            if let Some(&slot) = scope.get(name) {
                return Ok(slot);
            }
        }
        Err(CodeGenError::UnboundVariable(name.to_string()))
    }

    fn alloca_for(&self, name: &str, ty: &Type) -> PointerValue<'ctx> {
        let llvm_ty = self.cx.types.map(ty);
        self.builder
            .build_alloca(llvm_ty, name)
            .expect("alloca never fails in a well-formed function")
    }

    /// `main` takes no LLVM parameters - the runtime's C entry point fills
    /// `_tip_input_array` from `argv` before calling `_tip_main`, so a
    /// formal parameter's value is a GEP-and-load into that array rather
    /// than an incoming argument (C6).
    fn load_staged_input(&self, index: usize) -> Result<BasicValueEnum<'ctx>> {
        let word = self.cx.types.word();
        let zero = word.const_int(0, false);
        let idx = word.const_int(index as u64, false);
        let elem_ptr = unsafe {
            self.builder
                .build_gep(
                    self.cx.input_staging.array_ty,
                    self.cx.input_staging.input_array.as_pointer_value(),
                    &[zero, idx],
                    "input_slot",
                )
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
        };
        Ok(self
            .builder
            .build_load(word, elem_ptr, "input")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?)
    }

    /// C4's function entry: allocate a stack slot for every parameter and
    /// store the incoming argument into it, so parameters and `var`-declared
    /// locals are both plain, mutable alloca slots.
    pub fn lower_function(mut self, function: &Function) -> Result<()> {
        let entry = self.cx.context.append_basic_block(self.function, "entry");
        self.builder.position_at_end(entry);

        let is_main = function.name == "main";
        for (i, param) in function.params.iter().enumerate() {
            let ty = self.node_type(param.id);
            let slot = self.alloca_for(&param.name, &ty);
            let arg = if is_main {
                self.load_staged_input(i)?
            } else {
                self.function
                    .get_nth_param(i as u32)
                    .expect("parameter count matches signature")
            };
            self.builder
                .build_store(slot, arg)
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
            self.bind(&param.name, slot);
        }

        for stmt in &function.body {
            self.lower_stmt(stmt)?;
        }

        // SIP functions always end in `return`; if control somehow falls off
        // the end (e.g. the original program has dead code after the last
        // return) close the block so the module still verifies.
        if self
            .builder
            .get_insert_block()
            .and_then(|b| b.get_terminator())
            .is_none()
        {
            let zero = self.cx.types.word().const_int(0, false);
            self.builder
                .build_return(Some(&zero))
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        }

        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &StmtNode) -> Result<()> {
        match &stmt.kind {
            StmtKind::Decl { names } => {
                for name in names {
                    let ty = self.node_type(name.id);
                    let slot = self.alloca_for(&name.name, &ty);
                    self.bind(&name.name, slot);
                }
                Ok(())
            }
            StmtKind::Assign { lhs, rhs } => {
                let rhs_val = self.lower_expr(rhs, Mode::RValue)?;
                let target = self.lower_expr(lhs, Mode::LValue)?;
                let ptr = target.into_pointer_value();
                self.builder
                    .build_store(ptr, rhs_val)
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
                Ok(())
            }
            StmtKind::Block(stmts) => {
                self.scopes.push(HashMap::new());
                for s in stmts {
                    self.lower_stmt(s)?;
                }
                self.scopes.pop();
                Ok(())
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref()),
            StmtKind::While { cond, body } => self.lower_while(cond, body),
            StmtKind::ForRange {
                var,
                low,
                high,
                step,
                body,
            } => self.lower_for_range(var, low, high, step.as_ref(), body),
            StmtKind::ForIter { var, array, body } => self.lower_for_iter(var, array, body),
            StmtKind::Output(e) => {
                let val = self.lower_expr(e, Mode::RValue)?;
                self.builder
                    .build_call(self.cx.intrinsics.tip_output, &[val.into()], "output")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
                Ok(())
            }
            StmtKind::Error(e) => {
                let val = self.lower_expr(e, Mode::RValue)?;
                self.builder
                    .build_call(self.cx.intrinsics.tip_error, &[val.into()], "error")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
                self.builder
                    .build_unreachable()
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
                Ok(())
            }
            StmtKind::Return(e) => {
                let val = self.lower_expr(e, Mode::RValue)?;
                self.builder
                    .build_return(Some(&val))
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
                Ok(())
            }
        }
    }

    fn lower_if(
        &mut self,
        cond: &ExprNode,
        then_branch: &StmtNode,
        else_branch: Option<&StmtNode>,
    ) -> Result<()> {
        let cond_val = self.lower_expr(cond, Mode::RValue)?.into_int_value();
        let cond_bit = self.to_i1(cond_val)?;

        let then_bb = self.append_block("if_then");
        let else_bb = self.append_block("if_else");
        let merge_bb = self.append_block("if_merge");

        self.builder
            .build_conditional_branch(cond_bit, then_bb, else_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(then_bb);
        self.lower_stmt(then_branch)?;
        self.branch_if_open(merge_bb)?;

        self.builder.position_at_end(else_bb);
        if let Some(else_branch) = else_branch {
            self.lower_stmt(else_branch)?;
        }
        self.branch_if_open(merge_bb)?;

        self.builder.position_at_end(merge_bb);
        Ok(())
    }

    fn lower_while(&mut self, cond: &ExprNode, body: &StmtNode) -> Result<()> {
        let cond_bb = self.append_block("while_cond");
        let body_bb = self.append_block("while_body");
        let exit_bb = self.append_block("while_exit");

        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(cond_bb);
        let cond_val = self.lower_expr(cond, Mode::RValue)?.into_int_value();
        let cond_bit = self.to_i1(cond_val)?;
        self.builder
            .build_conditional_branch(cond_bit, body_bb, exit_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(body_bb);
        self.lower_stmt(body)?;
        self.branch_if_open(cond_bb)?;

        self.builder.position_at_end(exit_bb);
        Ok(())
    }

    /// `for (V : L .. H by S) body` desugars to a `while` over a hidden
    /// counter, matching the block-structure prose for C4 (4.4): `V` is
    /// bound once per iteration rather than re-declared.
    fn lower_for_range(
        &mut self,
        var: &sipc_ast::Param,
        low: &ExprNode,
        high: &ExprNode,
        step: Option<&ExprNode>,
        body: &StmtNode,
    ) -> Result<()> {
        self.scopes.push(HashMap::new());
        let var_slot = self.alloca_for(&var.name, &Type::Int);
        self.bind(&var.name, var_slot);

        let low_val = self.lower_expr(low, Mode::RValue)?;
        self.builder
            .build_store(var_slot, low_val)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let high_val = self.lower_expr(high, Mode::RValue)?.into_int_value();
        let step_val = match step {
            Some(s) => self.lower_expr(s, Mode::RValue)?.into_int_value(),
            None => self.cx.types.word().const_int(1, false),
        };

        let cond_bb = self.append_block("for_cond");
        let body_bb = self.append_block("for_body");
        let exit_bb = self.append_block("for_exit");

        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(cond_bb);
        let current = self
            .builder
            .build_load(self.cx.types.word(), var_slot, "for_i")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into_int_value();
        let cond = self
            .builder
            .build_int_compare(IntPredicate::SLT, current, high_val, "for_test")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_conditional_branch(cond, body_bb, exit_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(body_bb);
        self.lower_stmt(body)?;
        if self.current_block_open() {
            let current = self
                .builder
                .build_load(self.cx.types.word(), var_slot, "for_i")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
                .into_int_value();
            let next = self
                .builder
                .build_int_add(current, step_val, "for_next")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
            self.builder
                .build_store(var_slot, next)
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        }
        self.branch_if_open(cond_bb)?;

        self.builder.position_at_end(exit_bb);
        self.scopes.pop();
        Ok(())
    }

    /// `for (V : A) body` - iterates the boxed array's `{length, data}` pair.
    fn lower_for_iter(&mut self, var: &sipc_ast::Param, array: &ExprNode, body: &StmtNode) -> Result<()> {
        let array_ty = self.node_type(array.id);
        let elem_ty = match &array_ty {
            Type::Array(elem) => (**elem).clone(),
            _ => Type::Int,
        };

        let array_ptr = self.lower_expr(array, Mode::RValue)?.into_pointer_value();
        let array_struct = self.cx.types.array_struct();
        let len_ptr = self
            .builder
            .build_struct_gep(array_struct, array_ptr, 0, "arr_len_ptr")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let data_ptr = self
            .builder
            .build_struct_gep(array_struct, array_ptr, 1, "arr_data_ptr")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let len = self
            .builder
            .build_load(self.cx.types.word(), len_ptr, "arr_len")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into_int_value();
        let data = self
            .builder
            .build_load(self.cx.types.ptr(), data_ptr, "arr_data")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into_pointer_value();

        self.scopes.push(HashMap::new());
        let index_slot = self.alloca_for("__iter_idx", &Type::Int);
        self.builder
            .build_store(index_slot, self.cx.types.word().const_int(0, false))
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let var_slot = self.alloca_for(&var.name, &elem_ty);
        self.bind(&var.name, var_slot);

        let cond_bb = self.append_block("foriter_cond");
        let body_bb = self.append_block("foriter_body");
        let exit_bb = self.append_block("foriter_exit");

        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(cond_bb);
        let idx = self
            .builder
            .build_load(self.cx.types.word(), index_slot, "iter_idx")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into_int_value();
        let cond = self
            .builder
            .build_int_compare(IntPredicate::SLT, idx, len, "iter_test")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_conditional_branch(cond, body_bb, exit_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(body_bb);
        let elem_ptr = unsafe {
            self.builder
                .build_gep(self.cx.types.word(), data, &[idx], "iter_elem_ptr")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
        };
        let elem_val = self
            .builder
            .build_load(self.cx.types.word(), elem_ptr, "iter_elem")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_store(var_slot, elem_val)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.lower_stmt(body)?;
        if self.current_block_open() {
            let idx = self
                .builder
                .build_load(self.cx.types.word(), index_slot, "iter_idx")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
                .into_int_value();
            let next = self
                .builder
                .build_int_add(idx, self.cx.types.word().const_int(1, false), "iter_next")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
            self.builder
                .build_store(index_slot, next)
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        }
        self.branch_if_open(cond_bb)?;

        self.builder.position_at_end(exit_bb);
        self.scopes.pop();
        Ok(())
    }

    fn lower_expr(&mut self, expr: &ExprNode, mode: Mode) -> Result<BasicValueEnum<'ctx>> {
        if mode == Mode::LValue {
            return self.lower_lvalue(expr);
        }

        let value = match &expr.kind {
            ExprKind::Number(n) => self.cx.types.word().const_int(*n as u64, true).into(),
            ExprKind::Boolean(b) => self.cx.types.word().const_int(*b as u64, false).into(),
            ExprKind::Variable(name) => {
                let slot = self.lookup(name)?;
                let ty = self.node_type(expr.id);
                self.builder
                    .build_load(self.cx.types.map(&ty), slot, name)
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            }
            ExprKind::Input => self
                .builder
                .build_call(self.cx.intrinsics.tip_input, &[], "input")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
                .try_as_basic_value()
                .left()
                .ok_or_else(|| CodeGenError::Internal("_tip_input returned void".into()))?,
            ExprKind::Null => self.cx.types.ptr().const_null().into(),
            ExprKind::Alloc(inner) => self.lower_alloc(inner)?,
            ExprKind::AddressOf(name) => self.lookup(name)?.into(),
            ExprKind::Deref(inner) => {
                let ptr = self.lower_expr(inner, Mode::RValue)?.into_pointer_value();
                let ty = self.node_type(expr.id);
                self.builder
                    .build_load(self.cx.types.map(&ty), ptr, "deref")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            }
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs)?,
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand)?,
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => self.lower_ternary(expr, cond, then_branch, else_branch)?,
            ExprKind::Call { callee, args } => self.lower_call(expr, callee, args)?,
            ExprKind::Record { fields } => self.lower_record(fields)?,
            ExprKind::FieldAccess { record, field } => self.lower_field_access(record, field)?,
            ExprKind::Index { array, index } => self.lower_index(array, index)?,
            ExprKind::ArrayLit { elements } => self.lower_array_lit(elements)?,
            ExprKind::ArrayOf { length, value } => self.lower_array_of(length, value)?,
        };

        Ok(value)
    }

    fn lower_lvalue(&mut self, expr: &ExprNode) -> Result<BasicValueEnum<'ctx>> {
        match &expr.kind {
            ExprKind::Variable(name) => Ok(self.lookup(name)?.into()),
            ExprKind::Deref(inner) => {
                let ptr = self.lower_expr(inner, Mode::RValue)?;
                Ok(ptr)
            }
            other => Err(CodeGenError::Internal(format!(
                "{other:?} is not an assignable expression"
            ))),
        }
    }

    fn lower_alloc(&mut self, inner: &ExprNode) -> Result<BasicValueEnum<'ctx>> {
        let inner_ty = self.node_type(inner.id);

        // `Record` and `Array` values are already a heap pointer produced by
        // `lower_record` / the array literal codegen - boxing that pointer in
        // a second calloc'd slot would just add a level of indirection no
        // other code unwraps. `alloc` on one of these is a no-op over the
        // value's own allocation.
        if matches!(inner_ty, Type::Record(_) | Type::Array(_)) {
            return self.lower_expr(inner, Mode::RValue);
        }

        let llvm_ty = self.cx.types.map(&inner_ty);
        let size = llvm_ty.size_of().ok_or_else(|| {
            CodeGenError::Internal("alloc target type has no static size".into())
        })?;
        let one = self.cx.types.word().const_int(1, false);
        let raw = self
            .builder
            .build_call(self.cx.intrinsics.calloc, &[one.into(), size.into()], "alloc")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| CodeGenError::Internal("calloc returned void".into()))?
            .into_pointer_value();

        let init = self.lower_expr(inner, Mode::RValue)?;
        self.builder
            .build_store(raw, init)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        Ok(raw.into())
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &ExprNode, rhs: &ExprNode) -> Result<BasicValueEnum<'ctx>> {
        let l = self.lower_expr(lhs, Mode::RValue)?.into_int_value();
        let r = self.lower_expr(rhs, Mode::RValue)?.into_int_value();
        let word = self.cx.types.word();

        let result = match op {
            BinOp::Add => self.builder.build_int_add(l, r, "add"),
            BinOp::Sub => self.builder.build_int_sub(l, r, "sub"),
            BinOp::Mul => self.builder.build_int_mul(l, r, "mul"),
            BinOp::Div => self.builder.build_int_signed_div(l, r, "div"),
            // Division is signed; modulus uses the unsigned remainder, a
            // quirk of the source this type checker preserves rather than
            // "fixes" (9).
            BinOp::Mod => self.builder.build_int_unsigned_rem(l, r, "mod"),
            BinOp::Lt => {
                return self.bool_from_cmp(IntPredicate::SLT, l, r);
            }
            BinOp::Le => {
                return self.bool_from_cmp(IntPredicate::SLE, l, r);
            }
            BinOp::Gt => {
                return self.bool_from_cmp(IntPredicate::SGT, l, r);
            }
            BinOp::Ge => {
                return self.bool_from_cmp(IntPredicate::SGE, l, r);
            }
            BinOp::Eq => {
                return self.bool_from_cmp(IntPredicate::EQ, l, r);
            }
            BinOp::Ne => {
                return self.bool_from_cmp(IntPredicate::NE, l, r);
            }
            BinOp::And => self.builder.build_and(l, r, "and"),
            BinOp::Or => self.builder.build_or(l, r, "or"),
        };
        let _ = word;
        Ok(result
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into())
    }

    fn bool_from_cmp(&self, pred: IntPredicate, l: IntValue<'ctx>, r: IntValue<'ctx>) -> Result<BasicValueEnum<'ctx>> {
        let cmp = self
            .builder
            .build_int_compare(pred, l, r, "cmp")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let extended = self
            .builder
            .build_int_z_extend(cmp, self.cx.types.word(), "cmp_ext")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        Ok(extended.into())
    }

    fn lower_unary(&mut self, op: UnOp, operand: &ExprNode) -> Result<BasicValueEnum<'ctx>> {
        match op {
            UnOp::Neg => {
                let v = self.lower_expr(operand, Mode::RValue)?.into_int_value();
                Ok(self
                    .builder
                    .build_int_neg(v, "neg")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
                    .into())
            }
            UnOp::Not => {
                let v = self.lower_expr(operand, Mode::RValue)?.into_int_value();
                let one = self.cx.types.word().const_int(1, false);
                Ok(self
                    .builder
                    .build_xor(v, one, "not")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
                    .into())
            }
            UnOp::Incr => {
                let v = self.lower_expr(operand, Mode::RValue)?.into_int_value();
                let one = self.cx.types.word().const_int(1, false);
                Ok(self
                    .builder
                    .build_int_add(v, one, "incr")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
                    .into())
            }
            UnOp::Decr => {
                let v = self.lower_expr(operand, Mode::RValue)?.into_int_value();
                let one = self.cx.types.word().const_int(1, false);
                Ok(self
                    .builder
                    .build_int_sub(v, one, "decr")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
                    .into())
            }
            UnOp::Len => {
                let array_ptr = self.lower_expr(operand, Mode::RValue)?.into_pointer_value();
                let array_struct = self.cx.types.array_struct();
                let len_ptr = self
                    .builder
                    .build_struct_gep(array_struct, array_ptr, 0, "len_ptr")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
                Ok(self
                    .builder
                    .build_load(self.cx.types.word(), len_ptr, "len")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?)
            }
        }
    }

    fn lower_ternary(
        &mut self,
        expr: &ExprNode,
        cond: &ExprNode,
        then_branch: &ExprNode,
        else_branch: &ExprNode,
    ) -> Result<BasicValueEnum<'ctx>> {
        let cond_val = self.lower_expr(cond, Mode::RValue)?.into_int_value();
        let cond_bit = self.to_i1(cond_val)?;

        let then_bb = self.append_block("tern_then");
        let else_bb = self.append_block("tern_else");
        let merge_bb = self.append_block("tern_merge");

        self.builder
            .build_conditional_branch(cond_bit, then_bb, else_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(then_bb);
        let then_val = self.lower_expr(then_branch, Mode::RValue)?;
        let then_end = self.builder.get_insert_block().unwrap();
        self.builder
            .build_unconditional_branch(merge_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(else_bb);
        let else_val = self.lower_expr(else_branch, Mode::RValue)?;
        let else_end = self.builder.get_insert_block().unwrap();
        self.builder
            .build_unconditional_branch(merge_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(merge_bb);
        let ty = self.node_type(expr.id);
        let phi = self
            .builder
            .build_phi(self.cx.types.map(&ty), "tern_result")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        phi.add_incoming(&[(&then_val, then_end), (&else_val, else_end)]);
        Ok(phi.as_basic_value())
    }

    fn lower_call(&mut self, expr: &ExprNode, callee: &ExprNode, args: &[ExprNode]) -> Result<BasicValueEnum<'ctx>> {
        let callee_idx = self.lower_expr(callee, Mode::RValue)?.into_int_value();

        let mut arg_vals = Vec::with_capacity(args.len());
        let mut arg_types: Vec<BasicMetadataTypeEnum> = Vec::with_capacity(args.len());
        for a in args {
            let v = self.lower_expr(a, Mode::RValue)?;
            arg_types.push(self.cx.types.map(&self.node_type(a.id)).into());
            arg_vals.push(v.into());
        }

        let ret_ty = self.node_type(expr.id);
        let fn_type = self.cx.types.map(&ret_ty).fn_type(&arg_types, false);

        let table = self
            .cx
            .module
            .get_global("sip_dispatch")
            .ok_or_else(|| CodeGenError::Internal("dispatch table not declared".into()))?;
        let table_ptr = table.as_pointer_value();
        let slot_ptr = unsafe {
            self.builder
                .build_gep(self.cx.types.ptr(), table_ptr, &[callee_idx], "dispatch_slot")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
        };
        let fn_ptr = self
            .builder
            .build_load(self.cx.types.ptr(), slot_ptr, "dispatch_fn")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into_pointer_value();

        let call = self
            .builder
            .build_indirect_call(fn_type, fn_ptr, &arg_vals, "call")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        call.try_as_basic_value()
            .left()
            .ok_or_else(|| CodeGenError::Internal("called function returned void".into()))
    }

    fn lower_record(&mut self, fields: &[(String, ExprNode)]) -> Result<BasicValueEnum<'ctx>> {
        let record_struct = self.cx.types.record_struct(self.cx.field_count);
        let size = record_struct
            .size_of()
            .ok_or_else(|| CodeGenError::Internal("record struct has no static size".into()))?;
        let one = self.cx.types.word().const_int(1, false);
        let raw = self
            .builder
            .build_call(self.cx.intrinsics.calloc, &[one.into(), size.into()], "record")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| CodeGenError::Internal("calloc returned void".into()))?
            .into_pointer_value();

        for (name, value) in fields {
            let slot = self.cx.field_slot(name)?;
            let val = self.lower_expr(value, Mode::RValue)?;
            let field_ptr = self
                .builder
                .build_struct_gep(record_struct, raw, slot as u32, name)
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
            self.builder
                .build_store(field_ptr, val)
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        }

        Ok(raw.into())
    }

    fn lower_field_access(&mut self, record: &ExprNode, field: &str) -> Result<BasicValueEnum<'ctx>> {
        let record_ptr = self.lower_expr(record, Mode::RValue)?.into_pointer_value();
        let slot = self.cx.field_slot(field)?;
        let record_struct = self.cx.types.record_struct(self.cx.field_count);
        let field_ptr = self
            .builder
            .build_struct_gep(record_struct, record_ptr, slot as u32, field)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_load(self.cx.types.word(), field_ptr, field)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))
    }

    /// `E1[E2]` - bounds-checked against the array's stored length, trapping
    /// through `_tip_error` followed by `unreachable` on failure (7's
    /// "Bounds violation" error kind).
    fn lower_index(&mut self, array: &ExprNode, index: &ExprNode) -> Result<BasicValueEnum<'ctx>> {
        let array_ptr = self.lower_expr(array, Mode::RValue)?.into_pointer_value();
        let index_val = self.lower_expr(index, Mode::RValue)?.into_int_value();
        let array_struct = self.cx.types.array_struct();

        let len_ptr = self
            .builder
            .build_struct_gep(array_struct, array_ptr, 0, "idx_len_ptr")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let data_ptr_ptr = self
            .builder
            .build_struct_gep(array_struct, array_ptr, 1, "idx_data_ptr_ptr")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let len = self
            .builder
            .build_load(self.cx.types.word(), len_ptr, "idx_len")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into_int_value();
        let data = self
            .builder
            .build_load(self.cx.types.ptr(), data_ptr_ptr, "idx_data")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into_pointer_value();

        let zero = self.cx.types.word().const_int(0, false);
        let ge_zero = self
            .builder
            .build_int_compare(IntPredicate::SGE, index_val, zero, "idx_ge0")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let lt_len = self
            .builder
            .build_int_compare(IntPredicate::SLT, index_val, len, "idx_lt_len")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let in_bounds = self
            .builder
            .build_and(ge_zero, lt_len, "idx_in_bounds")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        let ok_bb = self.append_block("idx_ok");
        let trap_bb = self.append_block("idx_trap");
        self.builder
            .build_conditional_branch(in_bounds, ok_bb, trap_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(trap_bb);
        let code = self.cx.types.word().const_int(1, true);
        self.builder
            .build_call(self.cx.intrinsics.tip_error, &[code.into()], "bounds_trap")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_unreachable()
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(ok_bb);
        let elem_ptr = unsafe {
            self.builder
                .build_gep(self.cx.types.word(), data, &[index_val], "idx_elem_ptr")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
        };
        self.builder
            .build_load(self.cx.types.word(), elem_ptr, "idx_elem")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))
    }

    fn lower_array_lit(&mut self, elements: &[ExprNode]) -> Result<BasicValueEnum<'ctx>> {
        let n = elements.len() as u64;
        let word = self.cx.types.word();
        let data = self.calloc_words(n)?;

        for (i, el) in elements.iter().enumerate() {
            let val = self.lower_expr(el, Mode::RValue)?;
            let idx = word.const_int(i as u64, false);
            let elem_ptr = unsafe {
                self.builder
                    .build_gep(word, data, &[idx], "lit_elem_ptr")
                    .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            };
            self.builder
                .build_store(elem_ptr, val)
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        }

        self.box_array(word.const_int(n, false), data)
    }

    fn lower_array_of(&mut self, length: &ExprNode, value: &ExprNode) -> Result<BasicValueEnum<'ctx>> {
        let len_val = self.lower_expr(length, Mode::RValue)?.into_int_value();
        let word = self.cx.types.word();
        let one = word.const_int(1, false);
        let data = self
            .builder
            .build_call(self.cx.intrinsics.calloc, &[len_val.into(), word.const_int(8, false).into()], "arrayof_data")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| CodeGenError::Internal("calloc returned void".into()))?
            .into_pointer_value();

        let fill_val = self.lower_expr(value, Mode::RValue)?;

        let idx_slot = self.builder.build_alloca(word, "arrayof_i").unwrap();
        self.builder
            .build_store(idx_slot, word.const_int(0, false))
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        let cond_bb = self.append_block("arrayof_cond");
        let body_bb = self.append_block("arrayof_body");
        let exit_bb = self.append_block("arrayof_exit");

        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(cond_bb);
        let i = self
            .builder
            .build_load(word, idx_slot, "i")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .into_int_value();
        let cond = self
            .builder
            .build_int_compare(IntPredicate::SLT, i, len_val, "arrayof_test")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_conditional_branch(cond, body_bb, exit_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(body_bb);
        let elem_ptr = unsafe {
            self.builder
                .build_gep(word, data, &[i], "arrayof_elem_ptr")
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
        };
        self.builder
            .build_store(elem_ptr, fill_val)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let next = self
            .builder
            .build_int_add(i, one, "arrayof_next")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_store(idx_slot, next)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        self.builder.position_at_end(exit_bb);
        self.box_array(len_val, data)
    }

    fn calloc_words(&mut self, n: u64) -> Result<PointerValue<'ctx>> {
        let word = self.cx.types.word();
        let count = word.const_int(n, false);
        let size = word.const_int(8, false);
        Ok(self
            .builder
            .build_call(self.cx.intrinsics.calloc, &[count.into(), size.into()], "array_data")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| CodeGenError::Internal("calloc returned void".into()))?
            .into_pointer_value())
    }

    fn box_array(&mut self, len: IntValue<'ctx>, data: PointerValue<'ctx>) -> Result<BasicValueEnum<'ctx>> {
        let array_struct = self.cx.types.array_struct();
        let size = array_struct
            .size_of()
            .ok_or_else(|| CodeGenError::Internal("array struct has no static size".into()))?;
        let one = self.cx.types.word().const_int(1, false);
        let boxed = self
            .builder
            .build_call(self.cx.intrinsics.calloc, &[one.into(), size.into()], "array_box")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| CodeGenError::Internal("calloc returned void".into()))?
            .into_pointer_value();

        let len_ptr = self
            .builder
            .build_struct_gep(array_struct, boxed, 0, "box_len_ptr")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_store(len_ptr, len)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        let data_ptr = self
            .builder
            .build_struct_gep(array_struct, boxed, 1, "box_data_ptr")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        self.builder
            .build_store(data_ptr, data)
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;

        Ok(boxed.into())
    }

    fn append_block(&self, name: &str) -> BasicBlock<'ctx> {
        let label = self.cx.fresh_label(name);
        self.cx.context.append_basic_block(self.function, &label)
    }

    fn current_block_open(&self) -> bool {
        self.builder
            .get_insert_block()
            .map(|b| b.get_terminator().is_none())
            .unwrap_or(false)
    }

    fn branch_if_open(&self, target: BasicBlock<'ctx>) -> Result<()> {
        if self.current_block_open() {
            self.builder
                .build_unconditional_branch(target)
                .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn to_i1(&self, v: IntValue<'ctx>) -> Result<IntValue<'ctx>> {
        let zero = self.cx.types.word().const_int(0, false);
        self.builder
            .build_int_compare(IntPredicate::NE, v, zero, "to_i1")
            .map_err(|e| CodeGenError::LlvmOperationFailed(e.to_string()))
    }
}
