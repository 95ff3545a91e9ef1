//! Assembler for producing method bytecode streams.
//!
//! Branch targets are absolute 16-bit offsets; forward references emit a
//! placeholder that `finish` back-patches once the label is bound.

use super::Opcode;
use crate::error::{PrestoError, PrestoResult};

/// A branch target, created before or after the code it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Builds one method's bytecode stream.
#[derive(Debug, Default)]
pub struct Assembler {
    code: Vec<u8>,
    labels: Vec<Option<u16>>,
    fixups: Vec<(usize, usize)>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler::default()
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current offset.
    pub fn bind(&mut self, label: Label) -> PrestoResult<()> {
        if self.labels[label.0].is_some() {
            return Err(PrestoError::invariant(format!(
                "label L{} bound twice",
                label.0
            )));
        }
        self.labels[label.0] = Some(self.offset()?);
        Ok(())
    }

    fn offset(&self) -> PrestoResult<u16> {
        u16::try_from(self.code.len())
            .map_err(|_| PrestoError::invariant("method body exceeds 16-bit offset range"))
    }

    pub fn const_i32(&mut self, v: i32) -> &mut Self {
        self.op(Opcode::ConstI32);
        self.code.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn const_i64(&mut self, v: i64) -> &mut Self {
        self.op(Opcode::ConstI64);
        self.code.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn const_f32(&mut self, v: f32) -> &mut Self {
        self.op(Opcode::ConstF32);
        self.code.extend_from_slice(&v.to_bits().to_be_bytes());
        self
    }

    pub fn const_f64(&mut self, v: f64) -> &mut Self {
        self.op(Opcode::ConstF64);
        self.code.extend_from_slice(&v.to_bits().to_be_bytes());
        self
    }

    pub fn load(&mut self, slot: u8) -> &mut Self {
        self.op(Opcode::Load);
        self.code.push(slot);
        self
    }

    pub fn store(&mut self, slot: u8) -> &mut Self {
        self.op(Opcode::Store);
        self.code.push(slot);
        self
    }

    pub fn inc(&mut self, slot: u8, delta: i8) -> &mut Self {
        self.op(Opcode::Inc);
        self.code.push(slot);
        self.code.push(delta as u8);
        self
    }

    pub fn add(&mut self) -> &mut Self {
        self.op(Opcode::Add);
        self
    }

    pub fn sub(&mut self) -> &mut Self {
        self.op(Opcode::Sub);
        self
    }

    pub fn mul(&mut self) -> &mut Self {
        self.op(Opcode::Mul);
        self
    }

    /// Present in the instruction set but outside the translatable subset.
    pub fn div(&mut self) -> &mut Self {
        self.op(Opcode::Div);
        self
    }

    /// Present in the instruction set but outside the translatable subset.
    pub fn new_obj(&mut self, class_index: u16) -> &mut Self {
        self.op(Opcode::NewObj);
        self.code.extend_from_slice(&class_index.to_be_bytes());
        self
    }

    pub fn if_eq(&mut self, target: Label) -> &mut Self {
        self.branch(Opcode::IfEq, target)
    }

    pub fn if_ne(&mut self, target: Label) -> &mut Self {
        self.branch(Opcode::IfNe, target)
    }

    pub fn goto(&mut self, target: Label) -> &mut Self {
        self.branch(Opcode::Goto, target)
    }

    pub fn call_self(&mut self) -> &mut Self {
        self.op(Opcode::CallSelf);
        self
    }

    pub fn ret(&mut self) -> &mut Self {
        self.op(Opcode::Ret);
        self
    }

    pub fn ret_void(&mut self) -> &mut Self {
        self.op(Opcode::RetVoid);
        self
    }

    /// Emit a raw byte. Escape hatch for streams the higher-level methods
    /// cannot produce, such as unknown opcodes.
    pub fn raw(&mut self, byte: u8) -> &mut Self {
        self.code.push(byte);
        self
    }

    fn op(&mut self, op: Opcode) {
        self.code.push(op as u8);
    }

    fn branch(&mut self, op: Opcode, target: Label) -> &mut Self {
        self.op(op);
        self.fixups.push((self.code.len(), target.0));
        self.code.extend_from_slice(&0xFFFFu16.to_be_bytes());
        self
    }

    /// Patch all branch offsets and return the finished stream.
    pub fn finish(mut self) -> PrestoResult<Vec<u8>> {
        for (pos, label) in &self.fixups {
            let offset = self.labels[*label].ok_or_else(|| {
                PrestoError::invariant(format!("label L{} referenced but never bound", label))
            })?;
            self.code[*pos..*pos + 2].copy_from_slice(&offset.to_be_bytes());
        }
        Ok(self.code)
    }
}
