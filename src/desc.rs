//! Method descriptors: the shape of a callable unit.

use std::fmt;

/// Primitive value kinds crossing the managed/native boundary.
///
/// `Ref` names a managed object reference so that descriptors can mention
/// one; the layout table rejects it, since only primitive scalars have a
/// native call layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimKind {
    Bool,
    I8,
    I16,
    /// Unsigned 16-bit character.
    Char,
    I32,
    I64,
    F32,
    F64,
    Void,
    Ref,
}

impl PrimKind {
    /// The operand-stack kind this value widens to during translation,
    /// or `None` for kinds that never appear on the operand stack.
    pub fn stack_kind(self) -> Option<StackKind> {
        match self {
            PrimKind::Bool | PrimKind::I8 | PrimKind::I16 | PrimKind::Char | PrimKind::I32 => {
                Some(StackKind::I32)
            }
            PrimKind::I64 => Some(StackKind::I64),
            PrimKind::F32 => Some(StackKind::F32),
            PrimKind::F64 => Some(StackKind::F64),
            PrimKind::Void | PrimKind::Ref => None,
        }
    }
}

impl fmt::Display for PrimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimKind::Bool => "bool",
            PrimKind::I8 => "i8",
            PrimKind::I16 => "i16",
            PrimKind::Char => "char",
            PrimKind::I32 => "i32",
            PrimKind::I64 => "i64",
            PrimKind::F32 => "f32",
            PrimKind::F64 => "f64",
            PrimKind::Void => "void",
            PrimKind::Ref => "ref",
        };
        f.write_str(name)
    }
}

/// Width class of a value on the translation operand stack.
///
/// Sub-32-bit integer kinds are widened to `I32` during translation and
/// narrowed again at the call boundary, so the stack only ever carries
/// these four classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StackKind::I32 => "i32",
            StackKind::I64 => "i64",
            StackKind::F32 => "f32",
            StackKind::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Identifies one callable unit: name, ordered parameter kinds, return kind.
///
/// Immutable once built; derived from the call interface's method set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    name: String,
    params: Vec<PrimKind>,
    ret: PrimKind,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, params: Vec<PrimKind>, ret: PrimKind) -> Self {
        MethodDescriptor {
            name: name.into(),
            params,
            ret,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[PrimKind] {
        &self.params
    }

    pub fn ret(&self) -> PrimKind {
        self.ret
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}
