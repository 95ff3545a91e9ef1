//! Native backend: verifies and compiles one compilation unit.
//!
//! Wraps a Cranelift `JITModule` configured for the host target. Each
//! requested method is declared, translated, and defined with the IR
//! verifier enabled; any rejection surfaces as `ModuleVerificationFailed`
//! with the backend's diagnostic text. Compilation is atomic: a failure
//! on any method abandons the whole unit.

use cranelift_codegen::ir::{AbiParam, Signature, UserFuncName};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};

use crate::bytecode::ClassImage;
use crate::cfg;
use crate::desc::MethodDescriptor;
use crate::error::{PrestoError, PrestoResult};
use crate::layout;

use super::artifact::CompiledArtifact;
use super::loader;
use super::translate::translate_function;

/// Compiles one (interface, class image) pair into a native artifact.
pub struct JitCompiler {
    module: JITModule,
}

impl JitCompiler {
    /// Configure the backend for the host target with the fixed flag set.
    pub fn new() -> PrestoResult<Self> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("use_colocated_libcalls", "false")
            .map_err(PrestoError::verification)?;
        flag_builder
            .set("is_pic", "false")
            .map_err(PrestoError::verification)?;
        flag_builder
            .set("opt_level", "speed")
            .map_err(PrestoError::verification)?;
        flag_builder
            .set("enable_verifier", "true")
            .map_err(PrestoError::verification)?;

        let isa_builder = cranelift_native::builder().map_err(PrestoError::verification)?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(PrestoError::verification)?;

        let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        let module = JITModule::new(builder);
        Ok(JitCompiler { module })
    }

    /// Compile every interface method that has a body in the image, then
    /// hand the unit to the loader for linking and symbol resolution.
    pub fn compile(
        mut self,
        descriptors: &[MethodDescriptor],
        image: &ClassImage,
    ) -> PrestoResult<CompiledArtifact> {
        // layout support is checked before any native work begins
        for desc in descriptors {
            layout::validate(desc)?;
        }

        let mut compiled: Vec<(MethodDescriptor, FuncId)> = Vec::with_capacity(descriptors.len());
        for desc in descriptors {
            let Some(method) = image.method(desc.name()) else {
                // resolution failure is reported by the loader
                continue;
            };
            let graph = cfg::read_method(method)?;
            let sig = self.signature_for(desc)?;
            let func_id = self
                .module
                .declare_function(desc.name(), Linkage::Export, &sig)
                .map_err(PrestoError::verification)?;

            let mut ctx = self.module.make_context();
            ctx.func.signature = sig;
            ctx.func.name = UserFuncName::user(0, func_id.as_u32());
            translate_function(&mut self.module, &mut ctx.func, func_id, desc, &graph)?;

            self.module
                .define_function(func_id, &mut ctx)
                .map_err(PrestoError::verification)?;
            compiled.push((desc.clone(), func_id));
        }

        loader::link(self.module, compiled, descriptors)
    }

    fn signature_for(&self, desc: &MethodDescriptor) -> PrestoResult<Signature> {
        let mut sig = self.module.make_signature();
        for &param in desc.params() {
            let row = layout::of(param)?;
            let ty = row
                .clif
                .ok_or(PrestoError::UnsupportedLayout { kind: param })?;
            sig.params.push(AbiParam::new(ty));
        }
        if let Some(ty) = layout::of(desc.ret())?.clif {
            sig.returns.push(AbiParam::new(ty));
        }
        Ok(sig)
    }
}
