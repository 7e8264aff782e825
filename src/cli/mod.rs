pub mod check;
pub mod explain;
pub mod graph;
pub mod hash;
pub mod run;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use fastats::ast::Item;
use fastats::runtime::interp::eval_const;
use fastats::runtime::library;
use fastats::{Callable, Diagnostic, Engine, EngineConfig, Module, Value};

/// Options shared by every subcommand that loads a module.
#[derive(clap::Args)]
pub struct LoadArgs {
    /// Input .fst file
    pub input: PathBuf,
    /// Engine config file (default: nearest fastats.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Trace specialization passes to stderr
    #[arg(long)]
    pub debug: bool,
}

/// Build the engine for `args`: explicit config, else discovered, then
/// environment overrides.
pub fn load_engine(args: &LoadArgs) -> Arc<Engine> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::discover(args.input.parent().unwrap_or(Path::new("."))),
    };
    let mut config = match config {
        Ok(config) => config.with_env(),
        Err(e) => {
            eprintln!("error: {}", e.message);
            process::exit(1);
        }
    };
    config.debug |= args.debug;
    Engine::new(config)
}

/// Load the input module, rendering diagnostics and exiting on failure.
pub fn load_module(args: &LoadArgs) -> Module {
    if !args.input.extension().is_some_and(|e| e == "fst") {
        eprintln!("error: input must be a .fst file");
        process::exit(1);
    }
    let engine = load_engine(args);
    match Module::load_file(&engine, &args.input) {
        Ok(module) => module,
        Err(errors) => {
            let source = std::fs::read_to_string(&args.input).unwrap_or_default();
            fastats::diagnostic::render_diagnostics(
                &errors,
                &args.input.display().to_string(),
                &source,
            );
            process::exit(1);
        }
    }
}

/// Render a diagnostic raised while working with `module` and exit.
pub fn fail(module: &Module, diag: Diagnostic) -> ! {
    match module.sources().first() {
        Some(file) if !diag.span.is_dummy() => diag.render(&file.name, &file.text),
        _ => {
            eprintln!("error: {}", diag);
            for note in &diag.notes {
                eprintln!("  note: {}", note);
            }
            if let Some(help) = &diag.help {
                eprintln!("  help: {}", help);
            }
        }
    }
    process::exit(1);
}

/// Parse `name=target` overrides. A target is a global of the module or a
/// library function such as `math.tanh`.
pub fn parse_overrides(module: &Module, specs: &[String]) -> Vec<(String, Callable)> {
    let mut overrides = Vec::with_capacity(specs.len());
    for spec in specs {
        let Some((name, target)) = spec.split_once('=') else {
            eprintln!("error: override '{}' is not of the form name=target", spec);
            process::exit(1);
        };
        let callable = match target.split_once('.') {
            Some((lib, func)) => match library::lookup(lib, func) {
                Some(native) => Callable::Native(native),
                None => {
                    eprintln!("error: `{}` is not a library function", target);
                    process::exit(1);
                }
            },
            None => match module.callable(target) {
                Ok(callable) => callable,
                Err(e) => fail(module, e),
            },
        };
        overrides.push((name.trim().to_string(), callable));
    }
    overrides
}

/// Evaluate positional arguments as constant expressions in the module,
/// so `3`, `[1, 2, 3]`, and `array.arange(10)` all work.
pub fn parse_values(module: &Module, texts: &[String]) -> Vec<Value> {
    let mut values = Vec::with_capacity(texts.len());
    for text in texts {
        let source = format!("const ARG = {}", text);
        let Ok(file) = fastats::parse_source(&source, "<arg>") else {
            process::exit(1);
        };
        let value = match file.items.first().map(|item| &item.node) {
            Some(Item::Const(def)) => eval_const(&def.value, module.namespace()),
            _ => {
                eprintln!("error: cannot read argument '{}'", text);
                process::exit(1);
            }
        };
        match value {
            Ok(value) => values.push(value),
            Err(e) => {
                e.render("<arg>", &source);
                process::exit(1);
            }
        }
    }
    values
}
