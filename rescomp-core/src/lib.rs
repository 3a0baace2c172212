pub mod compiler;
pub mod error;

pub use compiler::{BuiltResource, Compiler, CompilerContext, CompilerEvents, GenericCompiler, LogEvents, RunStatus};
pub use error::{CompileError, CompileResult, ErrorKind};
