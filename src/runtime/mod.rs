//! The runtime the specializer works against: values, Function Units,
//! shared namespaces, modules, and the interpreter that runs functions
//! unspecialized.

pub mod builtins;
pub mod function;
pub mod interp;
pub mod library;
pub mod module;
pub mod namespace;
pub mod value;

pub use function::{Callable, Function, Origin, SourceFile};
pub use library::Native;
pub use module::Module;
pub use namespace::{Global, Namespace, WeakNamespace};
pub use value::Value;
