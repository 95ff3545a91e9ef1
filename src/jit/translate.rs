//! Stack-machine to Cranelift IR translation.
//!
//! Each basic block is simulated with an operand stack of typed IR values
//! and a map of local-variable slots to virtual registers. Slots are
//! Cranelift frontend variables, so merge-point phi insertion is performed
//! by the frontend's SSA builder when predecessors disagree on a slot's
//! value. The operand stack is propagated along conditional-branch edges
//! and must be empty on every unconditional transfer.

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{self, types, Function, InstBuilder};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext, Variable};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Module};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::cfg::{Cfg, CmpZero, Insn, Terminator};
use crate::desc::{MethodDescriptor, StackKind};
use crate::error::{PrestoError, PrestoResult};
use crate::layout::{self, LoadConv, NativeLayout, RetConv};

/// Per-block operand stack of typed IR values.
type OperandStack = SmallVec<[(ir::Value, StackKind); 8]>;

/// A local-variable slot's virtual register.
#[derive(Clone, Copy)]
struct SlotVar {
    var: Variable,
    kind: StackKind,
}

/// Translates one method's CFG into a Cranelift function body.
pub(crate) struct FunctionTranslator<'a> {
    module: &'a mut JITModule,
    /// The in-progress function symbol, for direct self-calls.
    func_id: FuncId,
    desc: &'a MethodDescriptor,
    slots: FxHashMap<u8, SlotVar>,
    next_var: u32,
}

impl<'a> FunctionTranslator<'a> {
    fn new(module: &'a mut JITModule, func_id: FuncId, desc: &'a MethodDescriptor) -> Self {
        FunctionTranslator {
            module,
            func_id,
            desc,
            slots: FxHashMap::default(),
            next_var: 0,
        }
    }

    /// The primitive kind arithmetic in this method operates on.
    fn declared_kind(&self) -> Option<StackKind> {
        self.desc
            .ret()
            .stack_kind()
            .or_else(|| self.desc.params().iter().find_map(|p| p.stack_kind()))
    }

    fn declare_slot(
        &mut self,
        builder: &mut FunctionBuilder,
        slot: u8,
        kind: StackKind,
    ) -> PrestoResult<Variable> {
        if let Some(existing) = self.slots.get(&slot) {
            if existing.kind != kind {
                return Err(PrestoError::type_mismatch(existing.kind, kind));
            }
            return Ok(existing.var);
        }
        let var = Variable::from_u32(self.next_var);
        self.next_var += 1;
        builder.declare_var(var, layout::stack_clif(kind));
        self.slots.insert(slot, SlotVar { var, kind });
        Ok(var)
    }

    fn slot(&self, slot: u8) -> PrestoResult<SlotVar> {
        self.slots.get(&slot).copied().ok_or_else(|| {
            PrestoError::invariant(format!("load from undefined local slot {}", slot))
        })
    }

    fn insn(
        &mut self,
        builder: &mut FunctionBuilder,
        insn: &Insn,
        stack: &mut OperandStack,
    ) -> PrestoResult<()> {
        match insn {
            Insn::ConstI32(v) => {
                let val = builder.ins().iconst(types::I32, *v as i64);
                stack.push((val, StackKind::I32));
            }
            Insn::ConstI64(v) => {
                let val = builder.ins().iconst(types::I64, *v);
                stack.push((val, StackKind::I64));
            }
            Insn::ConstF32(v) => {
                let val = builder.ins().f32const(*v);
                stack.push((val, StackKind::F32));
            }
            Insn::ConstF64(v) => {
                let val = builder.ins().f64const(*v);
                stack.push((val, StackKind::F64));
            }
            Insn::Load(slot) => {
                let sv = self.slot(*slot)?;
                let val = builder.use_var(sv.var);
                stack.push((val, sv.kind));
            }
            Insn::Store(slot) => {
                let (val, kind) = pop(stack)?;
                let var = self.declare_slot(builder, *slot, kind)?;
                builder.def_var(var, val);
            }
            Insn::Inc(slot, delta) => {
                // locals are virtual registers, not addressable storage:
                // increment rewrites the slot's current value
                let sv = self.slot(*slot)?;
                if sv.kind != StackKind::I32 {
                    return Err(PrestoError::type_mismatch(StackKind::I32, sv.kind));
                }
                let val = builder.use_var(sv.var);
                let bumped = builder.ins().iadd_imm(val, *delta as i64);
                builder.def_var(sv.var, bumped);
            }
            Insn::Add | Insn::Sub | Insn::Mul => {
                let (rhs, rk) = pop(stack)?;
                let (lhs, lk) = pop(stack)?;
                if lk != rk {
                    return Err(PrestoError::type_mismatch(lk, rk));
                }
                if let Some(declared) = self.declared_kind() {
                    if lk != declared {
                        return Err(PrestoError::type_mismatch(declared, lk));
                    }
                }
                let val = match (insn, lk) {
                    (Insn::Add, StackKind::F32 | StackKind::F64) => builder.ins().fadd(lhs, rhs),
                    (Insn::Sub, StackKind::F32 | StackKind::F64) => builder.ins().fsub(lhs, rhs),
                    (Insn::Mul, StackKind::F32 | StackKind::F64) => builder.ins().fmul(lhs, rhs),
                    (Insn::Add, _) => builder.ins().iadd(lhs, rhs),
                    (Insn::Sub, _) => builder.ins().isub(lhs, rhs),
                    (Insn::Mul, _) => builder.ins().imul(lhs, rhs),
                    _ => unreachable!(),
                };
                stack.push((val, lk));
            }
            Insn::CallSelf => {
                let args = self.pop_call_args(builder, stack)?;
                let func_ref = self
                    .module
                    .declare_func_in_func(self.func_id, builder.func);
                let call = builder.ins().call(func_ref, &args);
                let ret = layout::of(self.desc.ret())?;
                if let Some(kind) = ret.stack {
                    let raw = builder.inst_results(call)[0];
                    let widened = widen(builder, raw, &ret);
                    stack.push((widened, kind));
                }
            }
        }
        Ok(())
    }

    /// Pop self-call arguments (last parameter first) and narrow each to
    /// its native parameter type, returning them in calling order.
    fn pop_call_args(
        &mut self,
        builder: &mut FunctionBuilder,
        stack: &mut OperandStack,
    ) -> PrestoResult<Vec<ir::Value>> {
        let mut args = Vec::with_capacity(self.desc.arity());
        for &param in self.desc.params().iter().rev() {
            let row = layout::of(param)?;
            let expected = row
                .stack
                .ok_or(PrestoError::UnsupportedLayout { kind: param })?;
            let (val, kind) = pop(stack)?;
            if kind != expected {
                return Err(PrestoError::type_mismatch(expected, kind));
            }
            args.push(narrow(builder, val, &row));
        }
        args.reverse();
        Ok(args)
    }

    fn terminator(
        &mut self,
        builder: &mut FunctionBuilder,
        term: &Terminator,
        blocks: &[ir::Block],
        mut stack: OperandStack,
        entries: &mut [Option<OperandStack>],
    ) -> PrestoResult<()> {
        match term {
            Terminator::Jump { target } => {
                if !stack.is_empty() {
                    return Err(PrestoError::invariant(
                        "operand stack not empty on unconditional transfer",
                    ));
                }
                propagate(entries, *target, OperandStack::new())?;
                builder.ins().jump(blocks[*target], &[]);
            }
            Terminator::Branch {
                cmp,
                taken,
                fallthrough,
            } => {
                let (val, kind) = pop(&mut stack)?;
                if kind != StackKind::I32 {
                    return Err(PrestoError::type_mismatch(StackKind::I32, kind));
                }
                let cc = match cmp {
                    CmpZero::Eq => IntCC::Equal,
                    CmpZero::Ne => IntCC::NotEqual,
                };
                let cond = builder.ins().icmp_imm(cc, val, 0);
                propagate(entries, *taken, stack.clone())?;
                propagate(entries, *fallthrough, stack)?;
                builder
                    .ins()
                    .brif(cond, blocks[*taken], &[], blocks[*fallthrough], &[]);
            }
            Terminator::Ret { has_value } => {
                let ret = layout::of(self.desc.ret())?;
                if *has_value {
                    let expected = ret.stack.ok_or_else(|| {
                        PrestoError::type_mismatch(self.desc.ret(), "a return operand")
                    })?;
                    let (val, kind) = pop(&mut stack)?;
                    if kind != expected {
                        return Err(PrestoError::type_mismatch(expected, kind));
                    }
                    if !stack.is_empty() {
                        return Err(PrestoError::invariant(
                            "operand stack not empty after return operand",
                        ));
                    }
                    let narrowed = narrow(builder, val, &ret);
                    builder.ins().return_(&[narrowed]);
                } else {
                    if ret.stack.is_some() {
                        return Err(PrestoError::type_mismatch(self.desc.ret(), "void return"));
                    }
                    if !stack.is_empty() {
                        return Err(PrestoError::invariant(
                            "operand stack not empty at void return",
                        ));
                    }
                    builder.ins().return_(&[]);
                }
            }
        }
        Ok(())
    }
}

fn pop(stack: &mut OperandStack) -> PrestoResult<(ir::Value, StackKind)> {
    stack
        .pop()
        .ok_or_else(|| PrestoError::invariant("operand stack underflow"))
}

/// Record a successor's entry stack, requiring agreement with any state
/// already recorded along another path.
fn propagate(
    entries: &mut [Option<OperandStack>],
    target: usize,
    stack: OperandStack,
) -> PrestoResult<()> {
    match &entries[target] {
        None => entries[target] = Some(stack),
        Some(existing) => {
            if *existing != stack {
                return Err(PrestoError::invariant(
                    "inconsistent operand stack at block entry",
                ));
            }
        }
    }
    Ok(())
}

/// Widen a native-width value to its operand-stack class.
fn widen(builder: &mut FunctionBuilder, val: ir::Value, row: &NativeLayout) -> ir::Value {
    match row.load {
        LoadConv::Sext => builder.ins().sextend(types::I32, val),
        LoadConv::Uext => builder.ins().uextend(types::I32, val),
        LoadConv::Direct => val,
    }
}

/// Narrow an operand-stack value back to its native width.
fn narrow(builder: &mut FunctionBuilder, val: ir::Value, row: &NativeLayout) -> ir::Value {
    match row.ret {
        RetConv::Reduce => {
            // every Reduce row carries a concrete native type
            let ty = row.clif.unwrap_or(types::I32);
            builder.ins().ireduce(ty, val)
        }
        RetConv::Direct | RetConv::Void => val,
    }
}

/// Build the Cranelift function body for one method.
pub(crate) fn translate_function(
    module: &mut JITModule,
    func: &mut Function,
    func_id: FuncId,
    desc: &MethodDescriptor,
    cfg: &Cfg,
) -> PrestoResult<()> {
    let mut builder_ctx = FunctionBuilderContext::new();
    let mut builder = FunctionBuilder::new(func, &mut builder_ctx);
    let mut tr = FunctionTranslator::new(module, func_id, desc);

    let entry = builder.create_block();
    builder.append_block_params_for_function_params(entry);
    builder.switch_to_block(entry);

    // bind parameters to slot registers, widened to their stack class
    for (i, &param) in desc.params().iter().enumerate() {
        let row = layout::of(param)?;
        let kind = row
            .stack
            .ok_or(PrestoError::UnsupportedLayout { kind: param })?;
        let raw = builder.block_params(entry)[i];
        let var = tr.declare_slot(&mut builder, i as u8, kind)?;
        let widened = widen(&mut builder, raw, &row);
        builder.def_var(var, widened);
    }

    let blocks: Vec<ir::Block> = cfg.blocks.iter().map(|_| builder.create_block()).collect();
    builder.ins().jump(blocks[0], &[]);

    let mut entries: Vec<Option<OperandStack>> = vec![None; cfg.blocks.len()];
    entries[0] = Some(OperandStack::new());

    for (i, bb) in cfg.blocks.iter().enumerate() {
        builder.switch_to_block(blocks[i]);
        if entries[i].is_none() {
            // block reached only by a backward edge, or not at all;
            // it starts from an empty stack either way
            entries[i] = Some(OperandStack::new());
        }
        let mut stack = entries[i].clone().unwrap_or_default();
        for insn in &bb.insns {
            tr.insn(&mut builder, insn, &mut stack)?;
        }
        tr.terminator(&mut builder, &bb.term, &blocks, stack, &mut entries)?;
    }

    builder.seal_all_blocks();
    builder.finalize();
    Ok(())
}
