//! JIT compilation of bytecode method bodies to native code.
//!
//! ## Architecture
//!
//! ```text
//! Cfg -> FunctionTranslator -> Cranelift IR -> JITModule -> CompiledArtifact
//! ```
//!
//! The translator reconstructs SSA form from the stack-machine bytecode,
//! the compiler verifies and defines each function, and the loader links
//! the unit and resolves every exported symbol to a process address.

mod artifact;
mod compiler;
mod loader;
mod translate;

pub use artifact::{CompiledArtifact, ResolvedMethod};
pub use compiler::JitCompiler;
