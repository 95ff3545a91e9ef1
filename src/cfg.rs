//! CFG reader: decodes one method's bytecode stream into basic blocks.
//!
//! Reading is two passes over the stream. The first pass registers every
//! branch target as a forward-declared block (and validates that only the
//! supported instruction subset appears); the second pass re-walks the
//! stream and resumes emission into a pre-declared block whenever its
//! offset is reached, so a target seen before its code never produces a
//! duplicate block. Straight-line code that runs into a declared leader
//! closes the current block with an implicit jump.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::bytecode::{ByteReader, MethodCode, Opcode};
use crate::error::{PrestoError, PrestoResult};

/// Index into `Cfg::blocks`.
pub type BlockId = usize;

/// A decoded non-terminator instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Insn {
    ConstI32(i32),
    ConstI64(i64),
    ConstF32(f32),
    ConstF64(f64),
    Load(u8),
    Store(u8),
    Inc(u8, i8),
    Add,
    Sub,
    Mul,
    CallSelf,
}

/// Zero-comparison predicate of a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpZero {
    Eq,
    Ne,
}

/// The single control transfer ending a basic block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Terminator {
    Jump {
        target: BlockId,
    },
    /// Two-way branch: `taken` when the popped operand satisfies the
    /// predicate against zero, `fallthrough` otherwise.
    Branch {
        cmp: CmpZero,
        taken: BlockId,
        fallthrough: BlockId,
    },
    Ret {
        has_value: bool,
    },
}

/// A basic block: ordered instructions plus exactly one terminator.
/// Identified by the byte offset of its leader instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: u16,
    pub insns: Vec<Insn>,
    pub term: Terminator,
}

/// One method's control-flow graph: blocks in stream order plus a
/// label-to-block index.
#[derive(Debug, Clone, PartialEq)]
pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
    pub index: FxHashMap<u16, BlockId>,
}

/// Decode a method's bytecode stream into basic blocks.
pub fn read_method(method: &MethodCode) -> PrestoResult<Cfg> {
    if method.name() == "<init>" || method.name() == "<clinit>" {
        return Err(PrestoError::unsupported_member(method.name()));
    }
    if method.code().is_empty() {
        return Err(PrestoError::invariant("empty method body"));
    }
    // branch targets are 16-bit absolute offsets, so longer streams are
    // unaddressable and would truncate when labels are recorded
    if method.code().len() > u16::MAX as usize + 1 {
        return Err(PrestoError::invariant(
            "method body exceeds 16-bit offset range",
        ));
    }

    let leaders = scan_leaders(method.code())?;
    fill_blocks(method.code(), &leaders)
}

/// Pass 1: validate the instruction stream and register every branch
/// target as a forward-declared block leader.
fn scan_leaders(code: &[u8]) -> PrestoResult<BTreeSet<u16>> {
    let mut leaders = BTreeSet::new();
    let mut starts = BTreeSet::new();
    leaders.insert(0u16);

    let mut r = ByteReader::new(code);
    while !r.at_end() {
        starts.insert(r.pos() as u16);
        let op = decode_opcode(&mut r)?;
        match op {
            Opcode::ConstI32 => {
                r.read_i32()?;
            }
            Opcode::ConstI64 => {
                r.read_i64()?;
            }
            Opcode::ConstF32 => {
                r.read_f32()?;
            }
            Opcode::ConstF64 => {
                r.read_f64()?;
            }
            Opcode::Load | Opcode::Store => {
                r.read_u8()?;
            }
            Opcode::Inc => {
                r.read_u8()?;
                r.read_i8()?;
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::CallSelf => {}
            Opcode::IfEq | Opcode::IfNe => {
                leaders.insert(r.read_u16()?);
                // the fall-through successor starts its own block
                leaders.insert(r.pos() as u16);
            }
            Opcode::Goto => {
                leaders.insert(r.read_u16()?);
                leaders.insert(r.pos() as u16);
            }
            Opcode::Ret | Opcode::RetVoid => {
                leaders.insert(r.pos() as u16);
            }
            other => {
                return Err(PrestoError::unsupported_op(other.mnemonic()));
            }
        }
    }

    // drop the pseudo-leader at end-of-stream introduced by a trailing
    // terminator
    leaders.remove(&(code.len() as u16));

    for target in &leaders {
        if !starts.contains(target) {
            return Err(PrestoError::invariant(format!(
                "branch target {:#06x} is not on an instruction boundary",
                target
            )));
        }
    }

    Ok(leaders)
}

fn decode_opcode(r: &mut ByteReader<'_>) -> PrestoResult<Opcode> {
    let byte = r.read_u8()?;
    Opcode::from_u8(byte).ok_or_else(|| PrestoError::unsupported_op(format!("{:#04x}", byte)))
}

/// Pass 2: re-walk the stream, emitting into the pre-declared blocks.
fn fill_blocks(code: &[u8], leaders: &BTreeSet<u16>) -> PrestoResult<Cfg> {
    let mut index = FxHashMap::default();
    let mut blocks: Vec<BasicBlock> = Vec::with_capacity(leaders.len());
    for (i, &label) in leaders.iter().enumerate() {
        index.insert(label, i);
        blocks.push(BasicBlock {
            label,
            insns: Vec::new(),
            // placeholder until the block's terminator is decoded
            term: Terminator::Ret { has_value: false },
        });
    }
    let block_at = |offset: u16| -> PrestoResult<BlockId> {
        index
            .get(&offset)
            .copied()
            .ok_or_else(|| PrestoError::invariant(format!("no block declared at {:#06x}", offset)))
    };

    let mut r = ByteReader::new(code);
    let mut current = 0;
    let mut terminated = false;

    while !r.at_end() {
        let offset = r.pos() as u16;
        if offset != blocks[current].label || !blocks[current].insns.is_empty() || terminated {
            if let Some(&next) = index.get(&offset) {
                if !terminated {
                    // straight-line fall-through into a declared leader
                    blocks[current].term = Terminator::Jump { target: next };
                }
                current = next;
                terminated = false;
            }
        }

        let op = decode_opcode(&mut r)?;
        match op {
            Opcode::ConstI32 => blocks[current].insns.push(Insn::ConstI32(r.read_i32()?)),
            Opcode::ConstI64 => blocks[current].insns.push(Insn::ConstI64(r.read_i64()?)),
            Opcode::ConstF32 => blocks[current].insns.push(Insn::ConstF32(r.read_f32()?)),
            Opcode::ConstF64 => blocks[current].insns.push(Insn::ConstF64(r.read_f64()?)),
            Opcode::Load => blocks[current].insns.push(Insn::Load(r.read_u8()?)),
            Opcode::Store => blocks[current].insns.push(Insn::Store(r.read_u8()?)),
            Opcode::Inc => {
                let slot = r.read_u8()?;
                let delta = r.read_i8()?;
                blocks[current].insns.push(Insn::Inc(slot, delta));
            }
            Opcode::Add => blocks[current].insns.push(Insn::Add),
            Opcode::Sub => blocks[current].insns.push(Insn::Sub),
            Opcode::Mul => blocks[current].insns.push(Insn::Mul),
            Opcode::CallSelf => blocks[current].insns.push(Insn::CallSelf),
            Opcode::IfEq | Opcode::IfNe => {
                let cmp = if op == Opcode::IfEq {
                    CmpZero::Eq
                } else {
                    CmpZero::Ne
                };
                let target = r.read_u16()?;
                let next = r.pos() as u16;
                if next as usize >= code.len() {
                    return Err(PrestoError::invariant(
                        "conditional branch has no fall-through successor",
                    ));
                }
                blocks[current].term = Terminator::Branch {
                    cmp,
                    taken: block_at(target)?,
                    fallthrough: block_at(next)?,
                };
                terminated = true;
            }
            Opcode::Goto => {
                let target = r.read_u16()?;
                blocks[current].term = Terminator::Jump {
                    target: block_at(target)?,
                };
                terminated = true;
            }
            Opcode::Ret => {
                blocks[current].term = Terminator::Ret { has_value: true };
                terminated = true;
            }
            Opcode::RetVoid => {
                blocks[current].term = Terminator::Ret { has_value: false };
                terminated = true;
            }
            other => {
                return Err(PrestoError::unsupported_op(other.mnemonic()));
            }
        }
    }

    if !terminated {
        return Err(PrestoError::invariant(
            "control falls off the end of the method",
        ));
    }

    Ok(Cfg { blocks, index })
}
