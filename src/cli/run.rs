use clap::Args;

use fastats::{Kwargs, Outcome};

use super::{fail, load_module, parse_overrides, parse_values, LoadArgs};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub load: LoadArgs,
    /// Function to call
    pub function: String,
    /// Positional arguments, each a constant expression
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Substitute the call sites named NAME with TARGET (repeatable)
    #[arg(long = "override", value_name = "NAME=TARGET")]
    pub overrides: Vec<String>,
    /// Compile the specialization and describe it instead of calling it
    #[arg(long)]
    pub return_callable: bool,
}

pub fn cmd_run(args: RunArgs) {
    let module = load_module(&args.load);
    let gateway = match module.gateway(&args.function) {
        Ok(gateway) => gateway,
        Err(e) => fail(&module, e),
    };
    let values = parse_values(&module, &args.args);

    let mut kwargs = Kwargs::new().flag("return_callable", args.return_callable);
    for (name, callable) in parse_overrides(&module, &args.overrides) {
        kwargs = kwargs.with(&name, callable);
    }

    match gateway.call(&values, kwargs) {
        Ok(Outcome::Value(value)) => println!("{}", value),
        Ok(Outcome::Callable(compiled)) => {
            println!("{:?} ({} argument(s))", compiled, compiled.arity());
            for (name, hash) in compiled.callees() {
                println!("  {} {}", hash, name);
            }
        }
        Err(e) => fail(&module, e),
    }
}
