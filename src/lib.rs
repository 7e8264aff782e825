pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod hash;
pub mod jit;
pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod span;
pub mod specialize;
pub mod stdlib;

// Re-export the embedding API (`fastats::Module`, `fastats::Kwargs`)
pub use config::{EngineConfig, Isolation};
pub use diagnostic::{Diagnostic, ErrorKind};
pub use jit::{convert, Compiled};
pub use runtime::{Callable, Function, Module, Value};
pub use specialize::{CallGraph, Engine, KwValue, Kwargs, Outcome, Partial, Specialized};

use diagnostic::render_diagnostics;
use lexer::Lexer;
use parser::Parser;

/// Parse source, rendering any diagnostics to stderr.
pub fn parse_source(source: &str, filename: &str) -> Result<ast::File, Vec<Diagnostic>> {
    let result = parse_source_silent(source, filename);
    if let Err(errors) = &result {
        render_diagnostics(errors, filename, source);
    }
    result
}

pub fn parse_source_silent(source: &str, _filename: &str) -> Result<ast::File, Vec<Diagnostic>> {
    let (tokens, lex_errors) = Lexer::new(source, 0).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    Parser::new(tokens).parse_file()
}
