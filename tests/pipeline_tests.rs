//! End-to-end pipeline tests: bytecode in, native results out.

mod common;

use common::{compile_single, factorial_asm};
use presto::{Assembler, PrimKind, PrimValue};

#[test]
fn factorial_matches_reference() {
    let adapter = compile_single(
        "Factorial",
        "factorial",
        &[PrimKind::I32],
        PrimKind::I32,
        factorial_asm(),
    );
    let expected = [
        1, 1, 2, 6, 24, 120, 720, 5040, 40320, 362880, 3628800, 39916800,
    ];
    for (n, &want) in expected.iter().enumerate() {
        let got = adapter
            .invoke("factorial", &[PrimValue::I32(n as i32)])
            .unwrap();
        assert_eq!(got, PrimValue::I32(want), "factorial({})", n);
    }
}

#[test]
fn increment_instruction_updates_virtual_register() {
    // int increment(int n) { return ++n; }
    let mut asm = Assembler::new();
    asm.inc(0, 1).load(0).ret();
    let adapter = compile_single("Increment", "increment", &[PrimKind::I32], PrimKind::I32, asm);
    for n in [-1, 0, 1, 2] {
        let got = adapter.invoke("increment", &[PrimValue::I32(n)]).unwrap();
        assert_eq!(got, PrimValue::I32(n + 1));
    }
}

#[test]
fn four_way_partition_returns_each_literal() {
    // if (n == 0) return 10; if (n - 1 == 0) return 20;
    // if (n - 2 == 0) return 30; return 40;
    let mut asm = Assembler::new();
    let l1 = asm.new_label();
    let l2 = asm.new_label();
    let l3 = asm.new_label();
    asm.load(0).if_ne(l1).const_i32(10).ret();
    asm.bind(l1).unwrap();
    asm.load(0).const_i32(1).sub().if_ne(l2).const_i32(20).ret();
    asm.bind(l2).unwrap();
    asm.load(0).const_i32(2).sub().if_ne(l3).const_i32(30).ret();
    asm.bind(l3).unwrap();
    asm.const_i32(40).ret();
    let adapter = compile_single("Partition", "pick", &[PrimKind::I32], PrimKind::I32, asm);
    let cases = [(0, 10), (1, 20), (2, 30), (3, 40), (-5, 40), (100, 40)];
    for (n, want) in cases {
        let got = adapter.invoke("pick", &[PrimValue::I32(n)]).unwrap();
        assert_eq!(got, PrimValue::I32(want), "pick({})", n);
    }
}

#[test]
fn loop_with_backward_branch_sums() {
    // int sum(int n) { int acc = 0; while (n != 0) { acc += n; n--; } return acc; }
    let mut asm = Assembler::new();
    let top = asm.new_label();
    let done = asm.new_label();
    asm.const_i32(0).store(1);
    asm.bind(top).unwrap();
    asm.load(0).if_eq(done);
    asm.load(1).load(0).add().store(1).inc(0, -1).goto(top);
    asm.bind(done).unwrap();
    asm.load(1).ret();
    let adapter = compile_single("Sum", "sum", &[PrimKind::I32], PrimKind::I32, asm);
    for n in [0, 1, 2, 10, 100] {
        let got = adapter.invoke("sum", &[PrimValue::I32(n)]).unwrap();
        assert_eq!(got, PrimValue::I32(n * (n + 1) / 2), "sum({})", n);
    }
}

#[test]
fn void_method_completes_without_result() {
    let mut asm = Assembler::new();
    asm.ret_void();
    let adapter = compile_single("Noop", "noop", &[], PrimKind::Void, asm);
    let got = adapter.invoke("noop", &[]).unwrap();
    assert_eq!(got, PrimValue::Void);
}

#[test]
fn i32_identity_at_boundaries() {
    let mut asm = Assembler::new();
    asm.load(0).ret();
    let adapter = compile_single("RawI32", "get", &[PrimKind::I32], PrimKind::I32, asm);
    for n in [i32::MIN, -1, 0, 1, i32::MAX] {
        let got = adapter.invoke("get", &[PrimValue::I32(n)]).unwrap();
        assert_eq!(got, PrimValue::I32(n));
    }
}

#[test]
fn i64_arithmetic_at_boundaries() {
    // long twice(long n) { return n + n; }
    let mut asm = Assembler::new();
    asm.load(0).load(0).add().ret();
    let adapter = compile_single("RawI64", "twice", &[PrimKind::I64], PrimKind::I64, asm);
    for n in [i64::MIN, -1, 0, 1, i64::MAX, 0x1234_5678_9ABC_DEF0] {
        let got = adapter.invoke("twice", &[PrimValue::I64(n)]).unwrap();
        assert_eq!(got, PrimValue::I64(n.wrapping_add(n)), "twice({})", n);
    }
}

#[test]
fn i8_exhaustive_equivalence() {
    // byte poly(byte x) { return (byte) (x * 3 - 7); }
    let mut asm = Assembler::new();
    asm.load(0).const_i32(3).mul().const_i32(7).sub().ret();
    let adapter = compile_single("PolyI8", "poly", &[PrimKind::I8], PrimKind::I8, asm);
    for x in i8::MIN..=i8::MAX {
        let want = (x as i32).wrapping_mul(3).wrapping_sub(7) as i8;
        let got = adapter.invoke("poly", &[PrimValue::I8(x)]).unwrap();
        assert_eq!(got, PrimValue::I8(want), "poly({})", x);
    }
}

#[test]
fn i16_exhaustive_equivalence() {
    // short poly(short x) { return (short) (x * x + 31); }
    let mut asm = Assembler::new();
    asm.load(0).load(0).mul().const_i32(31).add().ret();
    let adapter = compile_single("PolyI16", "poly", &[PrimKind::I16], PrimKind::I16, asm);
    for x in i16::MIN..=i16::MAX {
        let want = (x as i32).wrapping_mul(x as i32).wrapping_add(31) as i16;
        let got = adapter.invoke("poly", &[PrimValue::I16(x)]).unwrap();
        assert_eq!(got, PrimValue::I16(want), "poly({})", x);
    }
}

#[test]
fn bool_return_narrows() {
    // boolean isZero(int n) { return n == 0; }
    let mut asm = Assembler::new();
    let yes = asm.new_label();
    asm.load(0).if_eq(yes).const_i32(0).ret();
    asm.bind(yes).unwrap();
    asm.const_i32(1).ret();
    let adapter = compile_single("IsZero", "test", &[PrimKind::I32], PrimKind::Bool, asm);
    let cases = [(0, true), (1, false), (-1, false), (42, false)];
    for (n, want) in cases {
        let got = adapter.invoke("test", &[PrimValue::I32(n)]).unwrap();
        assert_eq!(got, PrimValue::Bool(want), "test({})", n);
    }
}

#[test]
fn char_widens_unsigned() {
    // char bump(char c) { return (char) (c + 1); }
    let mut asm = Assembler::new();
    asm.load(0).const_i32(1).add().ret();
    let adapter = compile_single("Bump", "bump", &[PrimKind::Char], PrimKind::Char, asm);
    let cases = [(0u16, 1u16), (0x7FFF, 0x8000), (0xFFFF, 0)];
    for (c, want) in cases {
        let got = adapter.invoke("bump", &[PrimValue::Char(c)]).unwrap();
        assert_eq!(got, PrimValue::Char(want), "bump({:#x})", c);
    }
}

#[test]
fn f64_polynomial() {
    // double poly(double x) { return x * x + 0.5; }
    let mut asm = Assembler::new();
    asm.load(0).load(0).mul().const_f64(0.5).add().ret();
    let adapter = compile_single("PolyF64", "poly", &[PrimKind::F64], PrimKind::F64, asm);
    for x in [0.0, 1.0, -2.5, 1e100, -1e-100] {
        let got = adapter.invoke("poly", &[PrimValue::F64(x)]).unwrap();
        assert_eq!(got, PrimValue::F64(x * x + 0.5), "poly({})", x);
    }
}

#[test]
fn f32_arithmetic() {
    // float scale(float x) { return x * 2.0f - 1.0f; }
    let mut asm = Assembler::new();
    asm.load(0).const_f32(2.0).mul().const_f32(1.0).sub().ret();
    let adapter = compile_single("Scale", "scale", &[PrimKind::F32], PrimKind::F32, asm);
    for x in [0.0f32, 1.5, -3.25, 1e30] {
        let got = adapter.invoke("scale", &[PrimValue::F32(x)]).unwrap();
        assert_eq!(got, PrimValue::F32(x * 2.0 - 1.0), "scale({})", x);
    }
}

#[test]
fn two_parameter_method() {
    // int muladd(int a, int b) { return a * b + a; }
    let mut asm = Assembler::new();
    asm.load(0).load(1).mul().load(0).add().ret();
    let adapter = compile_single(
        "MulAdd",
        "muladd",
        &[PrimKind::I32, PrimKind::I32],
        PrimKind::I32,
        asm,
    );
    let got = adapter
        .invoke("muladd", &[PrimValue::I32(6), PrimValue::I32(7)])
        .unwrap();
    assert_eq!(got, PrimValue::I32(48));
}

#[test]
fn recursive_self_call_with_two_parameters() {
    // int gauss(int n, int acc) { if (n == 0) return acc; return gauss(n - 1, acc + n); }
    let mut asm = Assembler::new();
    let base = asm.new_label();
    asm.load(0).if_eq(base);
    asm.load(0).const_i32(1).sub();
    asm.load(1).load(0).add();
    asm.call_self().ret();
    asm.bind(base).unwrap();
    asm.load(1).ret();
    let adapter = compile_single(
        "Gauss",
        "gauss",
        &[PrimKind::I32, PrimKind::I32],
        PrimKind::I32,
        asm,
    );
    for n in [0, 1, 5, 10, 50] {
        let got = adapter
            .invoke("gauss", &[PrimValue::I32(n), PrimValue::I32(0)])
            .unwrap();
        assert_eq!(got, PrimValue::I32(n * (n + 1) / 2), "gauss({}, 0)", n);
    }
}
