//! Per-compilation codegen context (5 - no shared mutable state across
//! compilations). Everything the teacher's C++ donor kept in process-wide
//! statics lives here instead, scoped to one [`crate::program::compile`]
//! call: the intrinsic function handles, the dispatch table, the field
//! index map, and the label counter used to name basic blocks.

use crate::types::TypeMapper;
use inkwell::attributes::{Attribute, AttributeLoc};
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::FunctionValue;
use std::cell::Cell;
use std::collections::HashMap;

/// The runtime collaborators every compiled module calls into (6).
pub struct Intrinsics<'ctx> {
    pub tip_input: FunctionValue<'ctx>,
    pub tip_output: FunctionValue<'ctx>,
    pub tip_error: FunctionValue<'ctx>,
    pub tip_main_undefined: FunctionValue<'ctx>,
    pub calloc: FunctionValue<'ctx>,
}

/// `_tip_num_inputs` / `_tip_input_array` - the globals `sipc-runtime`'s C
/// entry point fills from `argv` before calling `_tip_main` (C6). There is
/// no argv in the language, so `main`'s formal parameters are staged through
/// here instead of through ordinary LLVM call arguments.
pub struct InputStaging<'ctx> {
    pub num_inputs: inkwell::values::GlobalValue<'ctx>,
    pub input_array: inkwell::values::GlobalValue<'ctx>,
    pub array_ty: inkwell::types::ArrayType<'ctx>,
}

pub struct CodegenContext<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub types: TypeMapper<'ctx>,
    pub intrinsics: Intrinsics<'ctx>,
    pub input_staging: InputStaging<'ctx>,
    /// Field name -> canonical slot index in the global record struct.
    pub field_index: HashMap<String, usize>,
    pub field_count: usize,
    /// Function name -> its compiled `FunctionValue`, and its index in the
    /// dispatch table (function values are the integer index into this
    /// vec, see `@sip_dispatch` in `program.rs`).
    pub functions: HashMap<String, (FunctionValue<'ctx>, u64)>,
    label_counter: Cell<u32>,
}

impl<'ctx> CodegenContext<'ctx> {
    pub fn new(
        context: &'ctx Context,
        module: Module<'ctx>,
        intrinsics: Intrinsics<'ctx>,
        input_staging: InputStaging<'ctx>,
        field_index: HashMap<String, usize>,
    ) -> Self {
        let field_count = field_index.len();
        Self {
            context,
            module,
            types: TypeMapper::new(context),
            intrinsics,
            input_staging,
            field_index,
            field_count,
            functions: HashMap::new(),
            label_counter: Cell::new(0),
        }
    }

    pub fn builder(&self) -> Builder<'ctx> {
        self.context.create_builder()
    }

    /// A short, unique label for a new basic block (`then0`, `else0`,
    /// `loop1`, ...). Uniqueness only needs to hold within one module.
    pub fn fresh_label(&self, prefix: &str) -> String {
        let n = self.label_counter.get();
        self.label_counter.set(n + 1);
        format!("{prefix}{n}")
    }

    pub fn field_slot(&self, name: &str) -> crate::error::Result<usize> {
        self.field_index
            .get(name)
            .copied()
            .ok_or_else(|| crate::error::CodeGenError::UnknownField(name.to_string()))
    }
}

/// Declares the five runtime collaborators (6). Every SIP program links
/// against `sipc-runtime`, which defines these under the same names.
pub fn declare_intrinsics<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> Intrinsics<'ctx> {
    let word = context.i64_type();
    let ptr = context.ptr_type(inkwell::AddressSpace::default());
    let void = context.void_type();

    let tip_input = module.add_function(
        "_tip_input",
        word.fn_type(&[], false),
        Some(inkwell::module::Linkage::External),
    );
    let tip_output = module.add_function(
        "_tip_output",
        void.fn_type(&[word.into()], false),
        Some(inkwell::module::Linkage::External),
    );
    let tip_error = module.add_function(
        "_tip_error",
        void.fn_type(&[word.into()], false),
        Some(inkwell::module::Linkage::External),
    );
    let tip_main_undefined = module.add_function(
        "_tip_main_undefined",
        void.fn_type(&[], false),
        Some(inkwell::module::Linkage::External),
    );
    let calloc = module.add_function(
        "calloc",
        ptr.fn_type(&[word.into(), word.into()], false),
        Some(inkwell::module::Linkage::External),
    );
    let nounwind = context.create_enum_attribute(Attribute::get_named_enum_kind_id("nounwind"), 0);
    calloc.add_attribute(AttributeLoc::Function, nounwind);
    let noalias = context.create_enum_attribute(Attribute::get_named_enum_kind_id("noalias"), 0);
    calloc.add_attribute(AttributeLoc::Return, noalias);

    Intrinsics {
        tip_input,
        tip_output,
        tip_error,
        tip_main_undefined,
        calloc,
    }
}

/// Declares `_tip_num_inputs` (a constant) and `_tip_input_array` (sized to
/// `main`'s declared parameter count, 0 if the program has no `main`) -
/// `sipc-runtime`'s C entry point defines and fills the latter from `argv`
/// before calling `_tip_main`.
pub fn declare_input_staging<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    num_params: usize,
) -> InputStaging<'ctx> {
    let word = context.i64_type();

    let num_inputs = module.add_global(word, None, "_tip_num_inputs");
    num_inputs.set_initializer(&word.const_int(num_params as u64, false));
    num_inputs.set_constant(true);

    let array_ty = word.array_type(num_params.max(1) as u32);
    let input_array = module.add_global(array_ty, None, "_tip_input_array");
    input_array.set_initializer(&array_ty.const_zero());

    InputStaging {
        num_inputs,
        input_array,
        array_ty,
    }
}
