//! Compilation factory: pipeline orchestration, artifact cache, and
//! native-resource lifecycle.
//!
//! The factory is an owned registry, not ambient global state, so
//! independent factories (for example in tests) never interfere. Cache
//! access is serialized by a mutex held across compilation: two
//! concurrent requests for the same identity cannot race to build
//! duplicate artifacts, and the second observes the first's result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::adapter::Adapter;
use crate::bytecode::ClassImage;
use crate::desc::MethodDescriptor;
use crate::error::{PrestoError, PrestoResult};
use crate::jit::{CompiledArtifact, JitCompiler};

struct FactoryEntry {
    artifact: Arc<CompiledArtifact>,
    retired: AtomicBool,
}

/// A cached compilation result. Cloning is cheap; all clones share one
/// native artifact.
#[derive(Clone)]
pub struct CompiledHandle {
    entry: Arc<FactoryEntry>,
}

impl CompiledHandle {
    /// The artifact backing this handle.
    pub fn artifact(&self) -> &Arc<CompiledArtifact> {
        &self.entry.artifact
    }

    /// Whether two handles share one underlying artifact.
    pub fn shares_artifact(&self, other: &CompiledHandle) -> bool {
        Arc::ptr_eq(&self.entry.artifact, &other.entry.artifact)
    }
}

impl std::fmt::Debug for CompiledHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledHandle")
            .field("retired", &self.entry.retired.load(Ordering::Acquire))
            .finish()
    }
}

/// Entry point and lifecycle owner of the compilation pipeline.
pub struct Factory {
    cache: Mutex<FxHashMap<String, CompiledHandle>>,
}

impl Factory {
    pub fn new() -> Self {
        Factory {
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Compile the interface's methods from the image's bytecode, or
    /// return the cached handle for this image identity.
    ///
    /// A failed compilation leaves the cache untouched.
    pub fn compile(
        &self,
        descriptors: &[MethodDescriptor],
        image: &ClassImage,
    ) -> PrestoResult<CompiledHandle> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(handle) = cache.get(image.name()) {
            return Ok(handle.clone());
        }
        let artifact = JitCompiler::new()?.compile(descriptors, image)?;
        let handle = CompiledHandle {
            entry: Arc::new(FactoryEntry {
                artifact: Arc::new(artifact),
                retired: AtomicBool::new(false),
            }),
        };
        cache.insert(image.name().to_string(), handle.clone());
        Ok(handle)
    }

    /// Construct a fresh adapter instance sharing the handle's artifact.
    ///
    /// Fails fast with `ArtifactRetired` once `teardown` has run.
    pub fn instantiate(&self, handle: &CompiledHandle) -> PrestoResult<Adapter> {
        if handle.entry.retired.load(Ordering::Acquire) {
            return Err(PrestoError::ArtifactRetired);
        }
        Adapter::bind(handle.entry.artifact.clone())
    }

    /// Compile and immediately instantiate.
    pub fn compile_and_create(
        &self,
        descriptors: &[MethodDescriptor],
        image: &ClassImage,
    ) -> PrestoResult<Adapter> {
        let handle = self.compile(descriptors, image)?;
        self.instantiate(&handle)
    }

    /// Number of cached artifacts.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Retire every cached artifact and clear the cache.
    ///
    /// Execution contexts are freed once their last strong reference is
    /// gone, so adapters created before teardown stay valid; new
    /// instantiations from previously obtained handles fail fast.
    pub fn teardown(&self) {
        let mut cache = self.cache.lock().unwrap();
        for (_, handle) in cache.drain() {
            handle.entry.retired.store(true, Ordering::Release);
        }
    }
}

impl Default for Factory {
    fn default() -> Self {
        Factory::new()
    }
}

impl Drop for Factory {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One-call convenience: compile an image against an interface and hand
/// back a callable adapter, using a throwaway factory.
pub fn compile_and_create(
    descriptors: &[MethodDescriptor],
    image: &ClassImage,
) -> PrestoResult<Adapter> {
    Factory::new().compile_and_create(descriptors, image)
}
