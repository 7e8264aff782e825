use clap::Args;

use fastats::runtime::Global;

use super::{load_module, LoadArgs};

#[derive(Args)]
pub struct HashArgs {
    #[command(flatten)]
    pub load: LoadArgs,
    /// Print full 64-char hex hashes
    #[arg(long)]
    pub full: bool,
}

/// Print the content fingerprint of every function in the module.
pub fn cmd_hash(args: HashArgs) {
    let module = load_module(&args.load);
    let mut names = module.namespace().names();
    names.sort();

    eprintln!("Module: {} {}", module.name(), args.load.input.display());
    for name in names {
        let Some(Global::Callable(callable)) = module.get(&name) else {
            continue;
        };
        if matches!(callable, fastats::Callable::Native(_)) {
            continue;
        }
        let hash = callable.fingerprint();
        if args.full {
            println!("  {} {}", hash.to_hex(), name);
        } else {
            println!("  {} {}", hash, name);
        }
    }
}
