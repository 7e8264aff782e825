use clap::Args;

use fastats::Kwargs;

use super::{fail, load_module, parse_overrides, LoadArgs};

#[derive(Args)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub load: LoadArgs,
    /// Function to specialize
    pub function: String,
    /// Substitute the call sites named NAME with TARGET (repeatable)
    #[arg(long = "override", value_name = "NAME=TARGET")]
    pub overrides: Vec<String>,
}

/// Print the rewritten top-level definition without compiling it.
pub fn cmd_explain(args: ExplainArgs) {
    let module = load_module(&args.load);
    let gateway = match module.gateway(&args.function) {
        Ok(gateway) => gateway,
        Err(e) => fail(&module, e),
    };
    let mut kwargs = Kwargs::new();
    for (name, callable) in parse_overrides(&module, &args.overrides) {
        kwargs = kwargs.with(&name, callable);
    }
    match gateway.explain(kwargs) {
        Ok(source) => print!("{}", source),
        Err(e) => fail(&module, e),
    }
}
