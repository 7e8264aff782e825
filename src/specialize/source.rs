//! Recovering a function's structural form from the text it was loaded from.

use crate::ast::File;
use crate::diagnostic::Diagnostic;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::runtime::{Function, Origin};

/// Re-read the item that defined `func` as a one-item unit. Spans stay
/// absolute offsets into the original file.
pub fn extract(func: &Function) -> Result<File, Diagnostic> {
    let (file, span) = match func.origin() {
        Origin::Source { file, span } => (file, *span),
        Origin::Interactive => {
            return Err(Diagnostic::unsupported(
                format!("`{}` has no source to specialize", func.name()),
                func.def().name.span,
            )
            .with_note("it was defined interactively".to_string())
            .with_help("load the definition from a file to specialize it".to_string()))
        }
    };

    let (tokens, lex_errors) =
        Lexer::new_in_range(&file.text, span.file_id, span.start as usize, span.end as usize)
            .tokenize();
    if let Some(error) = lex_errors.into_iter().next() {
        return Err(error);
    }
    Parser::new(tokens).parse_file().map_err(|errors| {
        errors.into_iter().next().unwrap_or_else(|| {
            Diagnostic::unsupported(
                format!("source of `{}` could not be re-read", func.name()),
                span,
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Item;
    use crate::config::EngineConfig;
    use crate::diagnostic::ErrorKind;
    use crate::runtime::Module;
    use crate::specialize::Engine;

    #[test]
    fn test_extract_second_definition() {
        let source = "fn a(x) { x }\n\n// doubles\n@fs\nfn b(x) {\n    2 * x\n}\n";
        let module = Module::load(&Engine::new(EngineConfig::default()), "m", source).unwrap();
        let func = module.function("b").unwrap();
        let unit = extract(&func).unwrap();
        assert_eq!(unit.items.len(), 1);
        let Item::Fn(def) = &unit.items[0].node else {
            panic!("expected a function");
        };
        assert_eq!(def.name.node, "b");
        assert!(def.has_decorator("fs"));
        assert_eq!(&source[def.name.span.start as usize..def.name.span.end as usize], "b");
    }

    #[test]
    fn test_interactive_has_no_source() {
        let module = Module::new(&Engine::new(EngineConfig::default()), "repl");
        module.eval_interactive("fn f(x) { x }").unwrap();
        let err = extract(&module.function("f").unwrap()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unsupported);
    }
}
