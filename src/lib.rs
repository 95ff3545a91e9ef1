//! # Presto - a JIT specializer for hot bytecode methods
//!
//! Presto translates small, numerically-pure method bodies from a
//! stack-based bytecode form into native code, then exposes the compiled
//! code back through an adapter that honors the original call interface.
//! Call sites keep invoking methods by descriptor; the bodies run as
//! native functions.
//!
//! ## Quick Start
//!
//! ```
//! use presto::{Assembler, ClassImage, Factory, MethodCode, MethodDescriptor,
//!              PrimKind, PrimValue};
//!
//! // int increment(int n) { return n + 1; }
//! let mut asm = Assembler::new();
//! asm.load(0).const_i32(1).add().ret();
//! let image = ClassImage::new("Increment")
//!     .with_method(MethodCode::new("increment", asm.finish().unwrap()));
//!
//! let descriptors = [MethodDescriptor::new(
//!     "increment", vec![PrimKind::I32], PrimKind::I32,
//! )];
//! let factory = Factory::new();
//! let adapter = factory.compile_and_create(&descriptors, &image).unwrap();
//! let result = adapter.invoke("increment", &[PrimValue::I32(41)]).unwrap();
//! assert_eq!(result, PrimValue::I32(42));
//! ```
//!
//! ## Architecture
//!
//! The pipeline runs strictly downward:
//!
//! 1. **CFG Reader** - decodes a method's bytecode stream into basic blocks
//! 2. **IR Translator** - simulates the operand stack and local slots,
//!    emitting SSA-form Cranelift IR with phi insertion at merge points
//! 3. **Native Backend** - verifies and compiles the unit (Cranelift)
//! 4. **JIT Loader** - links the unit and resolves exported symbols
//! 5. **Adapter Generator** - binds one libffi handle per method
//! 6. **Factory** - orchestrates the above, caches artifacts by image
//!    identity, and owns native-resource disposal
//!
//! Only a narrow subset of primitive-typed, branch-and-arithmetic bodies
//! is supported; anything else fails with a typed error before any native
//! code is produced.

pub mod adapter;
pub mod bytecode;
pub mod cfg;
pub mod desc;
pub mod error;
pub mod factory;
pub mod jit;
pub mod layout;
pub mod value;

pub use adapter::Adapter;
pub use bytecode::{Assembler, ClassImage, Label, MethodCode, Opcode};
pub use desc::{MethodDescriptor, PrimKind, StackKind};
pub use error::{PrestoError, PrestoResult};
pub use factory::{compile_and_create, CompiledHandle, Factory};
pub use jit::{CompiledArtifact, JitCompiler};
pub use value::PrimValue;
