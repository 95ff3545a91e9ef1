//! JIT loader: links the compiled unit and resolves exported symbols.

use cranelift_jit::JITModule;
use cranelift_module::FuncId;

use crate::desc::MethodDescriptor;
use crate::error::{PrestoError, PrestoResult};

use super::artifact::{CompiledArtifact, ResolvedMethod};

/// Finalize the unit's definitions and resolve every requested method to
/// a process address. A missing export is fatal: the artifact is unusable
/// without every method it claims to provide.
pub(crate) fn link(
    mut module: JITModule,
    compiled: Vec<(MethodDescriptor, FuncId)>,
    requested: &[MethodDescriptor],
) -> PrestoResult<CompiledArtifact> {
    module
        .finalize_definitions()
        .map_err(PrestoError::verification)?;

    let mut methods = Vec::with_capacity(compiled.len());
    for (desc, func_id) in compiled {
        let address = module.get_finalized_function(func_id) as usize;
        methods.push(ResolvedMethod::new(desc, address));
    }

    for desc in requested {
        if !methods.iter().any(|m| m.descriptor().name() == desc.name()) {
            return Err(PrestoError::symbol_not_found(desc.name()));
        }
    }

    Ok(CompiledArtifact::new(module, methods))
}
