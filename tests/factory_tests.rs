//! Factory cache, lifecycle, and error-taxonomy tests.

mod common;

use common::{compile_single, descriptor, factorial_asm, image_with};
use presto::{
    Assembler, ClassImage, Factory, MethodCode, PrestoError, PrimKind, PrimValue,
};

#[test]
fn same_identity_shares_one_artifact() {
    let factory = Factory::new();
    let descriptors = [descriptor("factorial", &[PrimKind::I32], PrimKind::I32)];
    let image = image_with("Factorial", "factorial", factorial_asm());

    let first = factory.compile(&descriptors, &image).unwrap();
    let second = factory.compile(&descriptors, &image).unwrap();
    assert!(first.shares_artifact(&second));
    assert_eq!(factory.cached_count(), 1);
}

#[test]
fn distinct_identities_get_distinct_artifacts() {
    let factory = Factory::new();
    let descriptors = [descriptor("factorial", &[PrimKind::I32], PrimKind::I32)];
    let a = image_with("A", "factorial", factorial_asm());
    let b = image_with("B", "factorial", factorial_asm());

    let ha = factory.compile(&descriptors, &a).unwrap();
    let hb = factory.compile(&descriptors, &b).unwrap();
    assert!(!ha.shares_artifact(&hb));
    assert_eq!(factory.cached_count(), 2);
}

#[test]
fn unsupported_instruction_leaves_cache_unmodified() {
    let factory = Factory::new();
    let descriptors = [descriptor("half", &[PrimKind::I32], PrimKind::I32)];
    let mut asm = Assembler::new();
    asm.load(0).const_i32(2).div().ret();
    let image = image_with("Half", "half", asm);

    let err = factory.compile(&descriptors, &image).unwrap_err();
    assert_eq!(err, PrestoError::unsupported_op("div"));
    assert_eq!(factory.cached_count(), 0);

    // the identity is free to be compiled again with a valid body
    let mut fixed = Assembler::new();
    fixed.load(0).ret();
    let image = image_with("Half", "half", fixed);
    assert!(factory.compile(&descriptors, &image).is_ok());
}

#[test]
fn constructor_member_is_rejected() {
    let factory = Factory::new();
    let descriptors = [descriptor("<init>", &[], PrimKind::Void)];
    let mut asm = Assembler::new();
    asm.ret_void();
    let image = image_with("Ctor", "<init>", asm);

    let err = factory.compile(&descriptors, &image).unwrap_err();
    assert_eq!(err, PrestoError::unsupported_member("<init>"));
}

#[test]
fn missing_body_is_symbol_not_found() {
    let factory = Factory::new();
    let descriptors = [descriptor("absent", &[], PrimKind::Void)];
    let image = ClassImage::new("Empty");

    let err = factory.compile(&descriptors, &image).unwrap_err();
    assert_eq!(err, PrestoError::symbol_not_found("absent"));
}

#[test]
fn ref_parameter_fails_before_native_work() {
    let factory = Factory::new();
    let descriptors = [descriptor("takes_ref", &[PrimKind::Ref], PrimKind::I32)];
    let mut asm = Assembler::new();
    asm.const_i32(0).ret();
    let image = image_with("Ref", "takes_ref", asm);

    let err = factory.compile(&descriptors, &image).unwrap_err();
    assert_eq!(
        err,
        PrestoError::UnsupportedLayout {
            kind: PrimKind::Ref
        }
    );
    assert_eq!(factory.cached_count(), 0);
}

#[test]
fn mixed_width_arithmetic_is_a_type_mismatch() {
    let factory = Factory::new();
    let descriptors = [descriptor("bad", &[], PrimKind::I32)];
    let mut asm = Assembler::new();
    asm.const_i32(1).const_i64(2).add().ret();
    let image = image_with("Bad", "bad", asm);

    let err = factory.compile(&descriptors, &image).unwrap_err();
    assert!(matches!(err, PrestoError::TypeMismatch { .. }), "{:?}", err);
}

#[test]
fn leftover_operand_at_return_is_an_invariant_violation() {
    let factory = Factory::new();
    let descriptors = [descriptor("bad", &[], PrimKind::I32)];
    let mut asm = Assembler::new();
    asm.const_i32(1).const_i32(2).ret();
    let image = image_with("Leftover", "bad", asm);

    let err = factory.compile(&descriptors, &image).unwrap_err();
    assert!(
        matches!(err, PrestoError::InvariantViolation { .. }),
        "{:?}",
        err
    );
}

#[test]
fn conflicting_stack_depths_at_join_are_rejected() {
    // two paths reach the same join: one carrying a single operand, the
    // other carrying two
    let factory = Factory::new();
    let descriptors = [descriptor("bad", &[], PrimKind::I32)];
    let mut asm = Assembler::new();
    let join = asm.new_label();
    asm.const_i32(1).const_i32(0).if_eq(join);
    asm.const_i32(2).const_i32(0).if_ne(join);
    asm.add().ret();
    asm.bind(join).unwrap();
    asm.ret();
    let image = image_with("Join", "bad", asm);

    let err = factory.compile(&descriptors, &image).unwrap_err();
    assert!(
        matches!(err, PrestoError::InvariantViolation { .. }),
        "{:?}",
        err
    );
    assert_eq!(factory.cached_count(), 0);
}

#[test]
fn teardown_retires_handles_but_not_live_adapters() {
    let factory = Factory::new();
    let descriptors = [descriptor("factorial", &[PrimKind::I32], PrimKind::I32)];
    let image = image_with("Factorial", "factorial", factorial_asm());

    let handle = factory.compile(&descriptors, &image).unwrap();
    let adapter = factory.instantiate(&handle).unwrap();

    factory.teardown();
    assert_eq!(factory.cached_count(), 0);

    // new instantiation from the retired handle fails fast
    let err = factory.instantiate(&handle).unwrap_err();
    assert_eq!(err, PrestoError::ArtifactRetired);

    // the adapter created before teardown still owns its artifact
    let got = adapter.invoke("factorial", &[PrimValue::I32(5)]).unwrap();
    assert_eq!(got, PrimValue::I32(120));
}

#[test]
fn recompile_after_teardown_builds_a_fresh_artifact() {
    let factory = Factory::new();
    let descriptors = [descriptor("factorial", &[PrimKind::I32], PrimKind::I32)];
    let image = image_with("Factorial", "factorial", factorial_asm());

    let old = factory.compile(&descriptors, &image).unwrap();
    factory.teardown();
    let new = factory.compile(&descriptors, &image).unwrap();
    assert!(!old.shares_artifact(&new));

    let adapter = factory.instantiate(&new).unwrap();
    let got = adapter.invoke("factorial", &[PrimValue::I32(6)]).unwrap();
    assert_eq!(got, PrimValue::I32(720));
}

#[test]
fn arity_and_kind_checked_at_invocation() {
    let mut asm = Assembler::new();
    asm.load(0).ret();
    let adapter = compile_single("Identity", "get", &[PrimKind::I32], PrimKind::I32, asm);

    let err = adapter.invoke("get", &[]).unwrap_err();
    assert_eq!(err, PrestoError::ArityMismatch { expected: 1, got: 0 });

    let err = adapter
        .invoke("get", &[PrimValue::I64(1)])
        .unwrap_err();
    assert!(matches!(err, PrestoError::TypeMismatch { .. }));

    let err = adapter.invoke("nope", &[]).unwrap_err();
    assert_eq!(err, PrestoError::symbol_not_found("nope"));
}

#[test]
fn adapter_outlives_factory() {
    let descriptors = [descriptor("factorial", &[PrimKind::I32], PrimKind::I32)];
    let image = image_with("Factorial", "factorial", factorial_asm());
    let adapter = {
        let factory = Factory::new();
        factory.compile_and_create(&descriptors, &image).unwrap()
    };
    // the factory (and its cache) is gone; the adapter's refcount keeps
    // the execution context alive
    let got = adapter.invoke("factorial", &[PrimValue::I32(10)]).unwrap();
    assert_eq!(got, PrimValue::I32(3628800));
}

#[test]
fn unknown_opcode_byte_is_reported_by_hex() {
    let factory = Factory::new();
    let descriptors = [descriptor("weird", &[], PrimKind::Void)];
    let image = ClassImage::new("Weird").with_method(MethodCode::new("weird", vec![0xEE]));

    let err = factory.compile(&descriptors, &image).unwrap_err();
    assert_eq!(err, PrestoError::unsupported_op("0xee"));
}
