//! The host value contracts, exercised across `extern "C"` calls shaped
//! like the forwarders in a generated host shim.

use std::ffi::c_char;

use bnd_luajit_host::{CStringBuffer, FloatPtr, IntPtr, Vec2, Vec4};

extern "C" fn read_int(v: *const i32) -> i32 {
    unsafe { *v }
}

extern "C" fn slider_float(v: *mut f32, min: f32, max: f32) -> bool {
    unsafe {
        let clamped = (*v).clamp(min, max);
        let changed = clamped != *v;
        *v = clamped;
        changed
    }
}

extern "C" fn input_text(buf: *mut c_char, buf_size: usize) -> bool {
    let text = b"typed";
    if text.len() >= buf_size {
        return false;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(text.as_ptr().cast::<c_char>(), buf, text.len());
        *buf.add(text.len()) = 0;
    }
    true
}

extern "C" fn vec_len_sq(v: *const f32, n: usize) -> f32 {
    let s = unsafe { std::slice::from_raw_parts(v, n) };
    s.iter().map(|c| c * c).sum()
}

#[test]
fn box_is_unchanged_by_a_reading_call() {
    let mut b = IntPtr::new(42);
    assert_eq!(read_int(b.as_mut_ptr()), 42);
    assert_eq!(b.get(), 42);
}

#[test]
fn box_reflects_a_native_write_immediately() {
    let mut b = FloatPtr::new(3.0);
    assert!(slider_float(b.as_mut_ptr(), 0.0, 1.0));
    assert_eq!(b.get(), 1.0);
    assert!(!slider_float(b.as_mut_ptr(), 0.0, 1.0));
    assert_eq!(b.get(), 1.0);
}

#[test]
fn string_buffer_round_trips_native_text() {
    let mut buf = CStringBuffer::new(32, "seed").unwrap();
    assert_eq!(buf.get().unwrap(), "seed");
    let capacity = buf.capacity();
    assert!(input_text(buf.as_mut_ptr(), capacity));
    assert_eq!(buf.get().unwrap(), "typed");
    assert_eq!(buf.as_bytes().len(), 32);
}

#[test]
fn vectors_pass_as_contiguous_floats() {
    let v = Vec4::new(1.0, 2.0, 2.0, 4.0);
    assert_eq!(vec_len_sq(v.as_ptr(), 4), 25.0);
}

#[test]
fn vector_addition_is_commutative_and_invertible() {
    let samples = [
        (Vec2::new(0.1, 0.2), Vec2::new(0.3, -0.7)),
        (Vec2::new(1e3, -1e-3), Vec2::new(-2.5, 7.25)),
        (Vec2::new(-0.0, 3.0), Vec2::new(123.456, 0.001)),
    ];
    for (a, b) in samples {
        assert_eq!(a + b, b + a);
        assert!((a + b - b).approx_eq(&a, 1e-3), "{a} {b}");
    }
}
