pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod token;
pub mod token_dumper;

use thiserror::Error;

use crate::frontend::lexer::{Lexer, LexerError};
use crate::frontend::parser::Parser;
use crate::frontend::parser_error::ParserError;
use crate::lang::node::Program;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("lexer error: {0}")]
    Lex(#[from] LexerError),

    #[error("parse error: {0}")]
    Parse(#[from] ParserError),
}

/// Lex and parse a whole source text.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens).parse()?;
    Ok(program)
}
