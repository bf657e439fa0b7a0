//! Compiler and stack machine for Fun, a small imperative teaching language.
//!
//! The pipeline is
//!
//! ```text
//! source -> frontend::parse -> check::check -> bytecode::Encoder -> CodeImage -> runtime::Svm
//! ```
//!
//! Every stage reports failures as values; [`Error`] gathers them.

pub mod bytecode;
pub mod check;
pub mod frontend;
pub mod lang;
pub mod runtime;

use std::io::{BufRead, Write};

use thiserror::Error;
use tracing::debug;

use crate::bytecode::verify::VerifyError;
use crate::bytecode::{CodeImage, CompileError, Encoder};
use crate::check::CheckErrors;
use crate::frontend::SyntaxError;
use crate::runtime::{RuntimeError, Svm, VmConfig};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Check(#[from] CheckErrors),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Parse, check and encode a source text.
pub fn compile(source: &str) -> Result<CodeImage, Error> {
    let program = frontend::parse(source)?;
    debug!(
        globals = program.globals.len(),
        procs = program.procs.len(),
        "parsed"
    );

    check::check(&program)?;

    let image = Encoder::new().encode_program(&program)?;
    Ok(image)
}

/// Compile and run a source text against the given streams.
pub fn run(
    source: &str,
    config: VmConfig,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<(), Error> {
    let image = compile(source)?;
    let mut vm = Svm::with_config(&image, config);
    vm.interpret(input, output)?;
    Ok(())
}
