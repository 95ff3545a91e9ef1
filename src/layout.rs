//! The layout table: fixed mapping from primitive kinds to native
//! call-layout descriptors.
//!
//! Pure lookup, no state. Each row says how a kind crosses the
//! managed/native boundary: its native width, its Cranelift ABI type, the
//! operand-stack class it widens to, and the load/return conventions the
//! translator and adapter apply at that boundary. Extending this table is
//! the only supported way to add new primitive kinds.

use cranelift_codegen::ir::{self, types};
use libffi::middle::Type as FfiType;

use crate::desc::{MethodDescriptor, PrimKind, StackKind};
use crate::error::{PrestoError, PrestoResult};

/// How a parameter widens onto the operand stack at function entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadConv {
    /// Sign-extend to the 32-bit stack class.
    Sext,
    /// Zero-extend to the 32-bit stack class.
    Uext,
    /// Already a stack-class width; used as-is.
    Direct,
}

/// How a stack value narrows back at a return or call-argument boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetConv {
    /// Truncate the 32-bit stack value to the native width.
    Reduce,
    /// Returned as-is.
    Direct,
    /// No value is returned.
    Void,
}

/// One row of the layout table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeLayout {
    pub kind: PrimKind,
    /// Native width in bits (0 for void).
    pub bits: u8,
    /// ABI type in the backend's IR; `None` for void.
    pub clif: Option<ir::Type>,
    /// Operand-stack class; `None` for void.
    pub stack: Option<StackKind>,
    pub load: LoadConv,
    pub ret: RetConv,
}

/// Look up the layout row for a kind.
///
/// `Ref` has no native layout and fails with `UnsupportedLayout`.
pub fn of(kind: PrimKind) -> PrestoResult<NativeLayout> {
    let row = match kind {
        PrimKind::Bool => NativeLayout {
            kind,
            bits: 8,
            clif: Some(types::I8),
            stack: Some(StackKind::I32),
            load: LoadConv::Uext,
            ret: RetConv::Reduce,
        },
        PrimKind::I8 => NativeLayout {
            kind,
            bits: 8,
            clif: Some(types::I8),
            stack: Some(StackKind::I32),
            load: LoadConv::Sext,
            ret: RetConv::Reduce,
        },
        PrimKind::I16 => NativeLayout {
            kind,
            bits: 16,
            clif: Some(types::I16),
            stack: Some(StackKind::I32),
            load: LoadConv::Sext,
            ret: RetConv::Reduce,
        },
        PrimKind::Char => NativeLayout {
            kind,
            bits: 16,
            clif: Some(types::I16),
            stack: Some(StackKind::I32),
            load: LoadConv::Uext,
            ret: RetConv::Reduce,
        },
        PrimKind::I32 => NativeLayout {
            kind,
            bits: 32,
            clif: Some(types::I32),
            stack: Some(StackKind::I32),
            load: LoadConv::Direct,
            ret: RetConv::Direct,
        },
        PrimKind::I64 => NativeLayout {
            kind,
            bits: 64,
            clif: Some(types::I64),
            stack: Some(StackKind::I64),
            load: LoadConv::Direct,
            ret: RetConv::Direct,
        },
        PrimKind::F32 => NativeLayout {
            kind,
            bits: 32,
            clif: Some(types::F32),
            stack: Some(StackKind::F32),
            load: LoadConv::Direct,
            ret: RetConv::Direct,
        },
        PrimKind::F64 => NativeLayout {
            kind,
            bits: 64,
            clif: Some(types::F64),
            stack: Some(StackKind::F64),
            load: LoadConv::Direct,
            ret: RetConv::Direct,
        },
        PrimKind::Void => NativeLayout {
            kind,
            bits: 0,
            clif: None,
            stack: None,
            load: LoadConv::Direct,
            ret: RetConv::Void,
        },
        PrimKind::Ref => return Err(PrestoError::UnsupportedLayout { kind }),
    };
    Ok(row)
}

/// The libffi type for a kind's call layout.
pub fn ffi_type(kind: PrimKind) -> PrestoResult<FfiType> {
    let ty = match kind {
        PrimKind::Bool => FfiType::u8(),
        PrimKind::I8 => FfiType::i8(),
        PrimKind::I16 => FfiType::i16(),
        PrimKind::Char => FfiType::u16(),
        PrimKind::I32 => FfiType::i32(),
        PrimKind::I64 => FfiType::i64(),
        PrimKind::F32 => FfiType::f32(),
        PrimKind::F64 => FfiType::f64(),
        PrimKind::Void => FfiType::void(),
        PrimKind::Ref => return Err(PrestoError::UnsupportedLayout { kind }),
    };
    Ok(ty)
}

/// The IR type for an operand-stack class.
pub fn stack_clif(kind: StackKind) -> ir::Type {
    match kind {
        StackKind::I32 => types::I32,
        StackKind::I64 => types::I64,
        StackKind::F32 => types::F32,
        StackKind::F64 => types::F64,
    }
}

/// Check that every parameter and the return kind of a descriptor have a
/// native layout. Runs before any native work begins.
pub fn validate(desc: &MethodDescriptor) -> PrestoResult<()> {
    for &p in desc.params() {
        let row = of(p)?;
        if row.stack.is_none() {
            return Err(PrestoError::UnsupportedLayout { kind: p });
        }
    }
    of(desc.ret())?;
    Ok(())
}
