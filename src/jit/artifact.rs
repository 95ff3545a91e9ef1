//! Compiled native code and the execution context that owns it.

use cranelift_jit::JITModule;
use rustc_hash::FxHashMap;

use crate::desc::MethodDescriptor;

/// The execution context: sole owner of the mapped native code.
///
/// # Safety
/// Once definitions are finalized the module only contains immutable
/// executable code, so it can move between and be shared across threads.
/// The mapped memory is released on drop, which the surrounding
/// refcounting delays until no adapter can still reach an address.
struct ContextHolder(Option<JITModule>);

unsafe impl Send for ContextHolder {}
unsafe impl Sync for ContextHolder {}

impl Drop for ContextHolder {
    fn drop(&mut self) {
        if let Some(module) = self.0.take() {
            // Safety: the artifact owning this holder is dropped only when
            // the last adapter sharing it is gone, so no compiled code can
            // still be executing.
            unsafe { module.free_memory() };
        }
    }
}

/// One resolved native method export.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    descriptor: MethodDescriptor,
    address: usize,
}

impl ResolvedMethod {
    pub(crate) fn new(descriptor: MethodDescriptor, address: usize) -> Self {
        ResolvedMethod {
            descriptor,
            address,
        }
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Process address of the compiled function. Valid only while the
    /// owning artifact is alive.
    pub fn address(&self) -> *const u8 {
        self.address as *const u8
    }
}

/// One resolved native address per exported method, plus the execution
/// context that must stay alive for those addresses to remain valid.
/// No two artifacts share a context.
pub struct CompiledArtifact {
    methods: FxHashMap<String, ResolvedMethod>,
    _context: ContextHolder,
}

impl CompiledArtifact {
    pub(crate) fn new(module: JITModule, methods: Vec<ResolvedMethod>) -> Self {
        let methods = methods
            .into_iter()
            .map(|m| (m.descriptor().name().to_string(), m))
            .collect();
        CompiledArtifact {
            methods,
            _context: ContextHolder(Some(module)),
        }
    }

    pub fn method(&self, name: &str) -> Option<&ResolvedMethod> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &ResolvedMethod> {
        self.methods.values()
    }
}

impl std::fmt::Debug for CompiledArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledArtifact")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
