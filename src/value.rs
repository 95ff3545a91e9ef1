//! Typed scalar values crossing the adapter boundary.

use crate::desc::PrimKind;

/// A primitive scalar passed to or returned from a compiled method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    Char(u16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Returned by methods whose descriptor declares no return value.
    Void,
}

impl PrimValue {
    pub fn kind(&self) -> PrimKind {
        match self {
            PrimValue::Bool(_) => PrimKind::Bool,
            PrimValue::I8(_) => PrimKind::I8,
            PrimValue::I16(_) => PrimKind::I16,
            PrimValue::Char(_) => PrimKind::Char,
            PrimValue::I32(_) => PrimKind::I32,
            PrimValue::I64(_) => PrimKind::I64,
            PrimValue::F32(_) => PrimKind::F32,
            PrimValue::F64(_) => PrimKind::F64,
            PrimValue::Void => PrimKind::Void,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrimValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            PrimValue::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrimValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PrimValue::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for PrimValue {
    fn from(v: bool) -> Self {
        PrimValue::Bool(v)
    }
}

impl From<i32> for PrimValue {
    fn from(v: i32) -> Self {
        PrimValue::I32(v)
    }
}

impl From<i64> for PrimValue {
    fn from(v: i64) -> Self {
        PrimValue::I64(v)
    }
}

impl From<f64> for PrimValue {
    fn from(v: f64) -> Self {
        PrimValue::F64(v)
    }
}
