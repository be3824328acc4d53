//! Turning a verified [`inkwell::module::Module`] into bytes on disk -
//! textual IR, a native object file, or (for `--emit=llvm-ir`-style
//! debugging) nothing beyond what the module itself already holds.

use crate::error::{CodeGenError, Result};
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;
use std::path::Path;

/// The host target machine, configured once per process. SIP has no
/// cross-compilation story (7's Non-goals) - the binary always targets
/// whatever machine is running the compiler.
pub fn host_target_machine() -> Result<TargetMachine> {
    Target::initialize_native(&InitializationConfig::default())
        .map_err(|e| CodeGenError::Internal(format!("target init failed: {e}")))?;
    let triple = TargetMachine::get_default_triple();
    let target = Target::from_triple(&triple)
        .map_err(|e| CodeGenError::Internal(format!("unknown target triple: {e}")))?;
    target
        .create_target_machine(
            &triple,
            "generic",
            "",
            OptimizationLevel::Default,
            RelocMode::Default,
            CodeModel::Default,
        )
        .ok_or_else(|| CodeGenError::Internal("host has no matching target machine".into()))
}

pub fn write_object_file(module: &Module, machine: &TargetMachine, path: &Path) -> Result<()> {
    machine
        .write_to_file(module, FileType::Object, path)
        .map_err(|e| CodeGenError::Internal(format!("failed to write object file: {e}")))
}

pub fn print_llvm_ir(module: &Module) -> String {
    module.print_to_string().to_string()
}
