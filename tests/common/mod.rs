//! Shared helpers for building class images and compiling single methods.

use presto::{
    Adapter, Assembler, ClassImage, Factory, MethodCode, MethodDescriptor, PrimKind,
};

#[allow(dead_code)]
pub fn descriptor(name: &str, params: &[PrimKind], ret: PrimKind) -> MethodDescriptor {
    MethodDescriptor::new(name, params.to_vec(), ret)
}

#[allow(dead_code)]
pub fn image_with(class: &str, method: &str, asm: Assembler) -> ClassImage {
    ClassImage::new(class).with_method(MethodCode::new(method, asm.finish().unwrap()))
}

/// Compile a one-method image and hand back a callable adapter.
#[allow(dead_code)]
pub fn compile_single(
    class: &str,
    method: &str,
    params: &[PrimKind],
    ret: PrimKind,
    asm: Assembler,
) -> Adapter {
    let descriptors = [descriptor(method, params, ret)];
    let image = image_with(class, method, asm);
    Factory::new()
        .compile_and_create(&descriptors, &image)
        .unwrap()
}

/// int factorial(int n) { if (n == 0) return 1; return n * factorial(n - 1); }
#[allow(dead_code)]
pub fn factorial_asm() -> Assembler {
    let mut asm = Assembler::new();
    let base = asm.new_label();
    asm.load(0).if_eq(base);
    asm.load(0).load(0).const_i32(1).sub().call_self().mul().ret();
    asm.bind(base).unwrap();
    asm.const_i32(1).ret();
    asm
}
