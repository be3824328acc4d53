//! sipc-drv - the compiler driver: wires `sipc-ast` -> `sipc-sem` ->
//! `sipc-ir` -> object code / a linked binary behind a single `run` entry
//! point.
//!
//! There is no lexer or parser stage here - `sipc` takes an AST directly, as
//! JSON (see [`cli::Cli::ast`]). Everything downstream of parsing - type
//! checking, codegen, emission - lives in its own crate; this one only
//! sequences them and reports failures.

pub mod cli;
pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use inkwell::context::Context;
use sipc_ast::Program;
use sipc_util::Handler;

pub use cli::{Cli, Emit};
pub use error::{DrvError, Result};

/// Run the compiler end to end for the given command line.
pub fn run(cli: Cli) -> Result<()> {
    let program = read_ast(&cli.ast)?;

    let handler = Handler::new();
    let results = match sipc_sem::analyze(&program, &handler) {
        Ok(results) => results,
        Err(err) => {
            for diag in handler.diagnostics() {
                tracing::error!("{}", diag.message);
            }
            tracing::error!("{err}");
            return Err(DrvError::TypeCheckFailed);
        }
    };

    if cli.emit == Emit::Ast {
        println!("{:#?}", program);
        return Ok(());
    }
    if cli.emit == Emit::Types {
        for (id, ty) in &results.node_types {
            println!("{id:?}: {ty}");
        }
        return Ok(());
    }

    let context = Context::create();
    let module_name = cli
        .ast
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sip");
    let module = sipc_ir::compile(&context, module_name, &program, &results)?;

    match cli.emit {
        Emit::Ast | Emit::Types => unreachable!("handled above"),
        Emit::LlvmIr => {
            let ir = sipc_ir::emit::print_llvm_ir(&module);
            match &cli.output {
                Some(path) => write_output(path, ir.as_bytes())?,
                None => print!("{ir}"),
            }
        }
        Emit::Object => {
            let machine = sipc_ir::emit::host_target_machine()?;
            let output = cli.output.clone().unwrap_or_else(|| PathBuf::from("a.o"));
            sipc_ir::emit::write_object_file(&module, &machine, &output)?;
        }
        Emit::Executable => {
            let machine = sipc_ir::emit::host_target_machine()?;
            let output = cli
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from("a.out"));
            let object_path = output.with_extension("o");
            sipc_ir::emit::write_object_file(&module, &machine, &object_path)?;
            link_executable(&object_path, &output)?;
            let _ = fs::remove_file(&object_path);
        }
    }

    Ok(())
}

fn read_ast(path: &Path) -> Result<Program> {
    let text = fs::read_to_string(path).map_err(|source| DrvError::ReadAst {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DrvError::ParseAst {
        path: path.to_path_buf(),
        source,
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|source| DrvError::WriteOutput {
        path: path.to_path_buf(),
        source,
    })
}

/// Link the emitted object file against `sipc-runtime` and the system's C
/// runtime into a standalone executable. We shell out to the system `cc`
/// rather than hand-roll a linker invocation - the exact flags for locating
/// libc and producing a runnable binary vary by platform, and `cc` already
/// knows them.
fn link_executable(object_path: &Path, output: &Path) -> Result<()> {
    let runtime = locate_runtime_staticlib()?;
    let status = Command::new("cc")
        .arg(object_path)
        .arg(&runtime)
        .arg("-o")
        .arg(output)
        .status()
        .map_err(|e| DrvError::Link(format!("failed to invoke cc: {e}")))?;

    if !status.success() {
        return Err(DrvError::Link(format!(
            "cc exited with {}",
            status
                .code()
                .map_or("signal".to_string(), |c| c.to_string())
        )));
    }
    Ok(())
}

/// Find `libsipc_runtime.a` next to the driver binary, falling back to the
/// conventional `target/<profile>/` location during development.
fn locate_runtime_staticlib() -> Result<PathBuf> {
    let candidates = [
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("libsipc_runtime.a"))),
        Some(PathBuf::from("target/debug/libsipc_runtime.a")),
        Some(PathBuf::from("target/release/libsipc_runtime.a")),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|p| p.exists())
        .ok_or_else(|| {
            DrvError::Link("could not locate libsipc_runtime.a alongside the driver".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ast_file_is_reported() {
        let err = read_ast(Path::new("/nonexistent/path/to/program.json")).unwrap_err();
        assert!(matches!(err, DrvError::ReadAst { .. }));
    }

    #[test]
    fn malformed_ast_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.json");
        fs::write(&path, b"not json").unwrap();
        let err = read_ast(&path).unwrap_err();
        assert!(matches!(err, DrvError::ParseAst { .. }));
    }
}
