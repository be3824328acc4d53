//! Program-level setup (C6, 4.6): the seven steps between a solved
//! [`TypeResults`] and a verified [`Module`] - declare the runtime
//! intrinsics, forward-declare every function so dispatch indices match
//! declaration order, build the dispatch table, emit each body, verify.

use crate::context::{declare_input_staging, declare_intrinsics, CodegenContext};
use crate::error::{CodeGenError, Result};
use crate::lower::FunctionLowering;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::BasicMetadataTypeEnum;
use inkwell::values::PointerValue;
use sipc_ast::Program;
use sipc_sem::{Type, TypeResults};
use std::collections::HashMap;

/// The LLVM symbol `main` is compiled under - there is no argv in the
/// language, so `main` takes no LLVM parameters; its SIP-declared
/// parameters are staged through `_tip_input_array` instead (see
/// `lower::FunctionLowering::lower_function`).
pub const MAIN_SYMBOL: &str = "_tip_main";

pub fn compile<'ctx>(
    context: &'ctx Context,
    module_name: &str,
    program: &Program,
    results: &TypeResults,
) -> Result<Module<'ctx>> {
    let module = context.create_module(module_name);
    let intrinsics = declare_intrinsics(context, &module);
    let main_param_count = program.find_main().map_or(0, |m| m.params.len());
    let input_staging = declare_input_staging(context, &module, main_param_count);

    let field_index: HashMap<String, usize> = results
        .fields
        .names()
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect();

    let mut cx = CodegenContext::new(context, module, intrinsics, input_staging, field_index);

    for (idx, name) in results.function_order.iter().enumerate() {
        let function = program
            .functions
            .iter()
            .find(|f| &f.name == name)
            .ok_or_else(|| CodeGenError::FunctionNotFound(name.clone()))?;

        let fn_type = results
            .node_types
            .get(&function.id)
            .cloned()
            .unwrap_or(Type::Fun(Vec::new(), Box::new(Type::Int)));
        let (param_tys, ret_ty) = match fn_type {
            Type::Fun(params, ret) => (params, *ret),
            other => {
                return Err(CodeGenError::Internal(format!(
                    "function '{name}' resolved to non-function type {other}"
                )))
            }
        };

        let is_main = name == "main";
        let llvm_fn_type = if is_main {
            cx.types.map(&ret_ty).fn_type(&[], false)
        } else {
            let param_llvm: Vec<BasicMetadataTypeEnum> =
                param_tys.iter().map(|t| cx.types.map(t).into()).collect();
            cx.types.map(&ret_ty).fn_type(&param_llvm, false)
        };
        let symbol = if is_main { MAIN_SYMBOL } else { name.as_str() };
        let fv = cx.module.add_function(symbol, llvm_fn_type, None);
        cx.functions.insert(name.clone(), (fv, idx as u64));
    }

    let ptr_ty = cx.types.ptr();
    let table_ty = ptr_ty.array_type(results.function_order.len() as u32);
    let table_global = cx.module.add_global(table_ty, None, "sip_dispatch");
    let entries: Vec<PointerValue> = results
        .function_order
        .iter()
        .map(|name| cx.functions[name].0.as_global_value().as_pointer_value())
        .collect();
    table_global.set_initializer(&ptr_ty.const_array(&entries));

    for function in &program.functions {
        let (fv, _) = cx.functions[&function.name];
        let lowering = FunctionLowering::new(&cx, fv, &results.node_types);
        lowering.lower_function(function)?;
    }

    if program.find_main().is_none() {
        synthesize_missing_main(&cx);
    }

    if let Err(msg) = cx.module.verify() {
        return Err(CodeGenError::VerificationFailed(msg.to_string()));
    }

    Ok(cx.module)
}

/// A program with no `main` still needs to produce a runnable binary - it
/// just reports the problem at run time, via `_tip_main_undefined`, rather
/// than failing to link.
fn synthesize_missing_main(cx: &CodegenContext) {
    let word = cx.types.word();
    let fn_type = word.fn_type(&[], false);
    let main_fn = cx.module.add_function(MAIN_SYMBOL, fn_type, None);
    let entry = cx.context.append_basic_block(main_fn, "entry");
    let builder = cx.builder();
    builder.position_at_end(entry);
    builder
        .build_call(cx.intrinsics.tip_main_undefined, &[], "main_undefined")
        .expect("declaring a call to an already-declared function cannot fail");
    builder
        .build_return(Some(&word.const_int(0, false)))
        .expect("returning from a fresh basic block cannot fail");
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use sipc_ast::{BinOp, ExprKind, ExprNode, Function, NodeId, StmtKind, StmtNode};
    use sipc_util::{Handler, Span};

    fn expr(id: u32, kind: ExprKind) -> ExprNode {
        ExprNode::new(NodeId(id), Span::DUMMY, kind)
    }

    fn stmt(id: u32, kind: StmtKind) -> StmtNode {
        StmtNode::new(NodeId(id), Span::DUMMY, kind)
    }

    /// `main() { return 1 + 2; }` lowers to a verifiable module with a
    /// one-entry dispatch table.
    #[test]
    fn straight_line_arithmetic_compiles() {
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
        let results = sipc_sem::analyze(&program, &handler).expect("should type-check");

        let context = Context::create();
        let module = compile(&context, "test", &program, &results).expect("should compile");
        assert!(module.get_function(MAIN_SYMBOL).is_some());
        assert!(module.get_global("sip_dispatch").is_some());
    }
}
