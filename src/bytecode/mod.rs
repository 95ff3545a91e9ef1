//! Stack-bytecode instruction set and method containers.
//!
//! A method body is a big-endian byte stream: one opcode byte followed by
//! that opcode's immediate operands. Branch targets are absolute byte
//! offsets into the stream. The CFG reader accepts only the straight-line
//! arithmetic / branch / local-variable subset; the remaining opcodes are
//! decodable members of the instruction set that fail translation with
//! `UnsupportedOperation`.

mod asm;

pub use asm::{Assembler, Label};

use crate::error::{PrestoError, PrestoResult};

/// Instruction opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    ConstI32 = 0x01,
    ConstI64 = 0x02,
    ConstF32 = 0x03,
    ConstF64 = 0x04,
    Load = 0x10,
    Store = 0x11,
    Inc = 0x12,
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    Div = 0x23,
    Rem = 0x24,
    Neg = 0x25,
    IfEq = 0x30,
    IfNe = 0x31,
    Goto = 0x32,
    CallSelf = 0x40,
    InvokeStatic = 0x41,
    Ret = 0x50,
    RetVoid = 0x51,
    NewObj = 0x60,
    GetField = 0x61,
    PutField = 0x62,
    ArrayLoad = 0x63,
    ArrayStore = 0x64,
    Athrow = 0x65,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        let op = match byte {
            0x01 => Opcode::ConstI32,
            0x02 => Opcode::ConstI64,
            0x03 => Opcode::ConstF32,
            0x04 => Opcode::ConstF64,
            0x10 => Opcode::Load,
            0x11 => Opcode::Store,
            0x12 => Opcode::Inc,
            0x20 => Opcode::Add,
            0x21 => Opcode::Sub,
            0x22 => Opcode::Mul,
            0x23 => Opcode::Div,
            0x24 => Opcode::Rem,
            0x25 => Opcode::Neg,
            0x30 => Opcode::IfEq,
            0x31 => Opcode::IfNe,
            0x32 => Opcode::Goto,
            0x40 => Opcode::CallSelf,
            0x41 => Opcode::InvokeStatic,
            0x50 => Opcode::Ret,
            0x51 => Opcode::RetVoid,
            0x60 => Opcode::NewObj,
            0x61 => Opcode::GetField,
            0x62 => Opcode::PutField,
            0x63 => Opcode::ArrayLoad,
            0x64 => Opcode::ArrayStore,
            0x65 => Opcode::Athrow,
            _ => return None,
        };
        Some(op)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::ConstI32 => "const_i32",
            Opcode::ConstI64 => "const_i64",
            Opcode::ConstF32 => "const_f32",
            Opcode::ConstF64 => "const_f64",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Inc => "inc",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Rem => "rem",
            Opcode::Neg => "neg",
            Opcode::IfEq => "if_eq",
            Opcode::IfNe => "if_ne",
            Opcode::Goto => "goto",
            Opcode::CallSelf => "call_self",
            Opcode::InvokeStatic => "invoke_static",
            Opcode::Ret => "ret",
            Opcode::RetVoid => "ret_void",
            Opcode::NewObj => "new_obj",
            Opcode::GetField => "get_field",
            Opcode::PutField => "put_field",
            Opcode::ArrayLoad => "array_load",
            Opcode::ArrayStore => "array_store",
            Opcode::Athrow => "athrow",
        }
    }

    /// Whether this opcode belongs to the translatable subset.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Opcode::ConstI32
                | Opcode::ConstI64
                | Opcode::ConstF32
                | Opcode::ConstF64
                | Opcode::Load
                | Opcode::Store
                | Opcode::Inc
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::IfEq
                | Opcode::IfNe
                | Opcode::Goto
                | Opcode::CallSelf
                | Opcode::Ret
                | Opcode::RetVoid
        )
    }
}

/// One method's bytecode stream.
#[derive(Debug, Clone)]
pub struct MethodCode {
    name: String,
    code: Vec<u8>,
}

impl MethodCode {
    pub fn new(name: impl Into<String>, code: Vec<u8>) -> Self {
        MethodCode {
            name: name.into(),
            code,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }
}

/// A reference implementation: an identity plus the bytecode of its
/// method bodies.
#[derive(Debug, Clone)]
pub struct ClassImage {
    name: String,
    methods: Vec<MethodCode>,
}

impl ClassImage {
    pub fn new(name: impl Into<String>) -> Self {
        ClassImage {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// The opaque identity used as the factory's cache key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_method(&mut self, method: MethodCode) {
        self.methods.push(method);
    }

    pub fn with_method(mut self, method: MethodCode) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method(&self, name: &str) -> Option<&MethodCode> {
        self.methods.iter().find(|m| m.name() == name)
    }

    pub fn methods(&self) -> &[MethodCode] {
        &self.methods
    }
}

/// Cursor over a bytecode stream. Reads fail with `InvariantViolation`
/// when an instruction is truncated.
pub(crate) struct ByteReader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(code: &'a [u8]) -> Self {
        ByteReader { code, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    pub(crate) fn read_u8(&mut self) -> PrestoResult<u8> {
        let b = self
            .code
            .get(self.pos)
            .copied()
            .ok_or_else(|| PrestoError::invariant("truncated instruction"))?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn read_i8(&mut self) -> PrestoResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub(crate) fn read_u16(&mut self) -> PrestoResult<u16> {
        let hi = self.read_u8()? as u16;
        let lo = self.read_u8()? as u16;
        Ok((hi << 8) | lo)
    }

    pub(crate) fn read_i32(&mut self) -> PrestoResult<i32> {
        let mut v = 0u32;
        for _ in 0..4 {
            v = (v << 8) | self.read_u8()? as u32;
        }
        Ok(v as i32)
    }

    pub(crate) fn read_i64(&mut self) -> PrestoResult<i64> {
        let mut v = 0u64;
        for _ in 0..8 {
            v = (v << 8) | self.read_u8()? as u64;
        }
        Ok(v as i64)
    }

    pub(crate) fn read_f32(&mut self) -> PrestoResult<f32> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    pub(crate) fn read_f64(&mut self) -> PrestoResult<f64> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes_round_trip() {
        for byte in 0..=u8::MAX {
            if let Some(op) = Opcode::from_u8(byte) {
                assert_eq!(op as u8, byte);
            }
        }
    }

    #[test]
    fn subset_membership() {
        assert!(Opcode::Add.is_supported());
        assert!(Opcode::CallSelf.is_supported());
        assert!(!Opcode::Div.is_supported());
        assert!(!Opcode::NewObj.is_supported());
    }

    #[test]
    fn reader_is_big_endian() {
        let mut r = ByteReader::new(&[0x12, 0x34]);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert!(r.at_end());
    }

    #[test]
    fn truncated_read_fails() {
        let mut r = ByteReader::new(&[0x00]);
        assert!(matches!(
            r.read_i32(),
            Err(PrestoError::InvariantViolation { .. })
        ));
    }
}
