//! End-to-end CLI tests: drive the `sipc` binary through `assert_cmd`
//! against small ASTs written out as temporary JSON files, the way a real
//! caller of this compiler would.

use assert_cmd::Command;
use predicates::prelude::*;
use sipc_ast::{BinOp, ExprKind, ExprNode, Function, NodeId, Param, Program, StmtKind, StmtNode};
use sipc_util::Span;
use tempfile::TempDir;

fn expr(id: u32, kind: ExprKind) -> ExprNode {
    ExprNode {
        id: NodeId(id),
        span: Span::DUMMY,
        kind,
    }
}

fn stmt(id: u32, kind: StmtKind) -> StmtNode {
    StmtNode {
        id: NodeId(id),
        span: Span::DUMMY,
        kind,
    }
}

/// `main() { return 1 + 2; }`
fn arithmetic_program() -> Program {
    Program {
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
    }
}

/// `main() { return 1 + true; }` - ill-typed.
fn ill_typed_program() -> Program {
    Program {
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
                        rhs: Box::new(expr(4, ExprKind::Boolean(true))),
                    },
                )),
            )],
            span: Span::DUMMY,
        }],
    }
}

/// `double(x) { return x + x; }` - no `main` at all.
fn missing_main_program() -> Program {
    Program {
        functions: vec![Function {
            id: NodeId(0),
            name: "double".to_string(),
            params: vec![Param {
                id: NodeId(1),
                name: "x".to_string(),
                span: Span::DUMMY,
            }],
            body: vec![stmt(
                2,
                StmtKind::Return(expr(
                    3,
                    ExprKind::Binary {
                        op: BinOp::Add,
                        lhs: Box::new(expr(4, ExprKind::Variable("x".to_string()))),
                        rhs: Box::new(expr(5, ExprKind::Variable("x".to_string()))),
                    },
                )),
            )],
            span: Span::DUMMY,
        }],
    }
}

fn write_ast(dir: &TempDir, name: &str, program: &Program) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(program).unwrap()).unwrap();
    path
}

fn sipc_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sipc"))
}

#[test]
fn test_cli_help() {
    let mut cmd = sipc_bin();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage").or(predicate::str::contains("sipc")));
}

#[test]
fn test_cli_version() {
    let mut cmd = sipc_bin();
    cmd.arg("--version");
    cmd.assert().success();
}

#[test]
fn test_cli_missing_ast_file() {
    let mut cmd = sipc_bin();
    cmd.arg("--ast").arg("/nonexistent/program.json");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("program.json"));
}

#[test]
fn test_cli_emit_types_for_arithmetic() {
    let dir = TempDir::new().unwrap();
    let ast_path = write_ast(&dir, "arithmetic.json", &arithmetic_program());

    let mut cmd = sipc_bin();
    cmd.arg("--ast").arg(&ast_path).arg("--emit").arg("types");
    cmd.assert().success();
}

#[test]
fn test_cli_emit_llvm_ir_contains_dispatch_table() {
    let dir = TempDir::new().unwrap();
    let ast_path = write_ast(&dir, "arithmetic.json", &arithmetic_program());

    let mut cmd = sipc_bin();
    cmd.arg("--ast").arg(&ast_path).arg("--emit").arg("llvm-ir");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sip_dispatch"));
}

#[test]
fn test_cli_rejects_ill_typed_program() {
    let dir = TempDir::new().unwrap();
    let ast_path = write_ast(&dir, "ill_typed.json", &ill_typed_program());

    let mut cmd = sipc_bin();
    cmd.arg("--ast").arg(&ast_path).arg("--emit").arg("types");
    cmd.assert().failure();
}

#[test]
fn test_cli_compiles_program_with_no_main() {
    let dir = TempDir::new().unwrap();
    let ast_path = write_ast(&dir, "no_main.json", &missing_main_program());

    let mut cmd = sipc_bin();
    cmd.arg("--ast").arg(&ast_path).arg("--emit").arg("llvm-ir");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("main_undefined"));
}

#[test]
fn test_cli_emit_object_writes_file() {
    let dir = TempDir::new().unwrap();
    let ast_path = write_ast(&dir, "arithmetic.json", &arithmetic_program());
    let object_path = dir.path().join("arithmetic.o");

    let mut cmd = sipc_bin();
    cmd.arg("--ast")
        .arg(&ast_path)
        .arg("--emit")
        .arg("object")
        .arg("-o")
        .arg(&object_path);
    cmd.assert().success();

    assert!(object_path.exists(), "object file should have been written");
}
