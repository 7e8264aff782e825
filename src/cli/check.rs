use clap::Args;

use fastats::diagnostic::Severity;
use fastats::runtime::Global;
use fastats::{Callable, ErrorKind};

use super::{load_module, LoadArgs};

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub load: LoadArgs,
}

/// Load the module and compile every function in it. Unresolved names
/// are errors; recursive functions still run interpreted and only warn.
pub fn cmd_check(args: CheckArgs) {
    let module = load_module(&args.load);
    let mut names = module.namespace().names();
    names.sort();

    let mut functions = 0;
    let mut errors = 0;
    for name in &names {
        let func = match module.get(name) {
            Some(Global::Callable(Callable::Function(func))) => func,
            Some(Global::Callable(Callable::Gateway(gateway))) => gateway.function().clone(),
            _ => continue,
        };
        functions += 1;
        if let Err(mut e) = fastats::convert(&Callable::Function(func)) {
            if e.kind == ErrorKind::Unsupported {
                e.severity = Severity::Warning;
            } else {
                errors += 1;
            }
            match module.sources().first() {
                Some(file) => e.render(&file.name, &file.text),
                None => eprintln!("{}", e),
            }
        }
    }

    if errors > 0 {
        std::process::exit(1);
    }
    eprintln!("OK: {} ({} function(s))", args.load.input.display(), functions);
}
