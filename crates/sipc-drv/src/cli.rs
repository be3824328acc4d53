//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// sipc - a compiler for SIP programs.
///
/// Takes a JSON-serialized AST (there is no lexer or parser here - an AST
/// file is the input) and produces a native binary, object file, or LLVM IR.
#[derive(Parser, Debug)]
#[command(name = "sipc")]
#[command(author = "Sip Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile a SIP program from its AST", long_about = None)]
pub struct Cli {
    /// Path to the program's AST, as JSON.
    #[arg(long, value_name = "FILE")]
    pub ast: PathBuf,

    /// Output file path. Defaults to `a.out` (or the emitted kind's
    /// conventional extension).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// What to produce.
    #[arg(long, value_enum, default_value_t = Emit::Executable)]
    pub emit: Emit,

    /// Enable verbose diagnostic logging.
    #[arg(short, long, global = true, env = "SIPC_VERBOSE")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// Pretty-print the parsed AST back out, mostly for sanity-checking input.
    Ast,
    /// Print every node's solved type.
    Types,
    /// Print the generated module as textual LLVM IR.
    LlvmIr,
    /// A native object file.
    Object,
    /// A linked, runnable binary (the default).
    Executable,
}
