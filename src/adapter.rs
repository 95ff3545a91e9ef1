//! Adapter generation: forwarding interface calls to native addresses.
//!
//! An `Adapter` plays the role the original call interface's
//! implementation did: one typed callable handle per exported method,
//! each bound exactly once at construction time to a resolved native
//! address, invoked through libffi with the layout table's conventions.

use std::ffi::c_void;
use std::sync::Arc;

use libffi::middle::{Arg, Cif, CodePtr};
use rustc_hash::FxHashMap;

use crate::desc::{MethodDescriptor, PrimKind};
use crate::error::{PrestoError, PrestoResult};
use crate::jit::CompiledArtifact;
use crate::layout;
use crate::value::PrimValue;

/// Argument storage with a stable address for the duration of a call.
enum RawArg {
    U8(u8),
    I8(i8),
    I16(i16),
    U16(u16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl RawArg {
    fn from_value(value: &PrimValue) -> Option<RawArg> {
        let raw = match value {
            PrimValue::Bool(v) => RawArg::U8(*v as u8),
            PrimValue::I8(v) => RawArg::I8(*v),
            PrimValue::I16(v) => RawArg::I16(*v),
            PrimValue::Char(v) => RawArg::U16(*v),
            PrimValue::I32(v) => RawArg::I32(*v),
            PrimValue::I64(v) => RawArg::I64(*v),
            PrimValue::F32(v) => RawArg::F32(*v),
            PrimValue::F64(v) => RawArg::F64(*v),
            PrimValue::Void => return None,
        };
        Some(raw)
    }

    fn as_arg(&self) -> Arg {
        match self {
            RawArg::U8(v) => Arg::new(v),
            RawArg::I8(v) => Arg::new(v),
            RawArg::I16(v) => Arg::new(v),
            RawArg::U16(v) => Arg::new(v),
            RawArg::I32(v) => Arg::new(v),
            RawArg::I64(v) => Arg::new(v),
            RawArg::F32(v) => Arg::new(v),
            RawArg::F64(v) => Arg::new(v),
        }
    }
}

/// A callable handle bound to one native method.
struct BoundMethod {
    descriptor: MethodDescriptor,
    cif: Cif,
    code: CodePtr,
}

impl BoundMethod {
    fn bind(descriptor: MethodDescriptor, address: *const u8) -> PrestoResult<BoundMethod> {
        let params = descriptor
            .params()
            .iter()
            .map(|&p| layout::ffi_type(p))
            .collect::<PrestoResult<Vec<_>>>()?;
        let ret = layout::ffi_type(descriptor.ret())?;
        Ok(BoundMethod {
            descriptor,
            cif: Cif::new(params, ret),
            code: CodePtr(address as *mut c_void),
        })
    }

    fn invoke(&self, args: &[PrimValue]) -> PrestoResult<PrimValue> {
        if args.len() != self.descriptor.arity() {
            return Err(PrestoError::ArityMismatch {
                expected: self.descriptor.arity(),
                got: args.len(),
            });
        }
        let mut raw = Vec::with_capacity(args.len());
        for (value, &param) in args.iter().zip(self.descriptor.params()) {
            if value.kind() != param {
                return Err(PrestoError::type_mismatch(param, value.kind()));
            }
            let stored = RawArg::from_value(value)
                .ok_or(PrestoError::UnsupportedLayout { kind: param })?;
            raw.push(stored);
        }
        let ffi_args: Vec<Arg> = raw.iter().map(RawArg::as_arg).collect();

        // Safety: the address was resolved from the artifact this adapter
        // keeps alive, and the cif was prepared from the same descriptor
        // the function was compiled with.
        let result = unsafe {
            match self.descriptor.ret() {
                PrimKind::Void => {
                    self.cif.call::<()>(self.code, &ffi_args);
                    PrimValue::Void
                }
                PrimKind::Bool => PrimValue::Bool(self.cif.call::<u8>(self.code, &ffi_args) != 0),
                PrimKind::I8 => PrimValue::I8(self.cif.call::<i8>(self.code, &ffi_args)),
                PrimKind::I16 => PrimValue::I16(self.cif.call::<i16>(self.code, &ffi_args)),
                PrimKind::Char => PrimValue::Char(self.cif.call::<u16>(self.code, &ffi_args)),
                PrimKind::I32 => PrimValue::I32(self.cif.call::<i32>(self.code, &ffi_args)),
                PrimKind::I64 => PrimValue::I64(self.cif.call::<i64>(self.code, &ffi_args)),
                PrimKind::F32 => PrimValue::F32(self.cif.call::<f32>(self.code, &ffi_args)),
                PrimKind::F64 => PrimValue::F64(self.cif.call::<f64>(self.code, &ffi_args)),
                PrimKind::Ref => {
                    return Err(PrestoError::UnsupportedLayout {
                        kind: PrimKind::Ref,
                    })
                }
            }
        };
        Ok(result)
    }
}

/// A synthesized implementation of the call interface whose methods
/// forward to compiled native code.
///
/// Holds a strong reference to its artifact, so the execution context
/// outlives every adapter built from it.
pub struct Adapter {
    methods: FxHashMap<String, BoundMethod>,
    _artifact: Arc<CompiledArtifact>,
}

// Safety: bound handles are immutable after construction and point into
// code owned by the artifact, which the adapter keeps alive.
unsafe impl Send for Adapter {}
unsafe impl Sync for Adapter {}

impl Adapter {
    /// Bind one callable handle per exported method of the artifact.
    pub(crate) fn bind(artifact: Arc<CompiledArtifact>) -> PrestoResult<Adapter> {
        let mut methods = FxHashMap::default();
        for resolved in artifact.methods() {
            let bound = BoundMethod::bind(resolved.descriptor().clone(), resolved.address())?;
            methods.insert(resolved.descriptor().name().to_string(), bound);
        }
        Ok(Adapter {
            methods,
            _artifact: artifact,
        })
    }

    /// Invoke a compiled method by name.
    pub fn invoke(&self, name: &str, args: &[PrimValue]) -> PrestoResult<PrimValue> {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| PrestoError::symbol_not_found(name))?;
        method.invoke(args)
    }

    /// Descriptors of the methods this adapter exposes.
    pub fn descriptors(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values().map(|m| &m.descriptor)
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
