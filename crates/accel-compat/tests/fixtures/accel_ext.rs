//! Minimal native extension named `accel`, compiled by the `native` unit tests.
//!
//! Build with `--cfg refuse_init` to get an extension whose init hook fails.

#[no_mangle]
pub extern "C" fn accel_compat_init() -> i32 {
    if cfg!(refuse_init) {
        3
    } else {
        0
    }
}

/// Writes each input followed by its double, so it needs `2 * len` floats.
#[no_mangle]
pub unsafe extern "C" fn accel_compute(
    input: *const f32,
    len: usize,
    out: *mut f32,
    cap: usize,
) -> isize {
    let needed = 2 * len;
    if needed > cap {
        return needed as isize;
    }
    for i in 0..len {
        let x = *input.add(i);
        *out.add(2 * i) = x;
        *out.add(2 * i + 1) = 2.0 * x;
    }
    needed as isize
}

#[no_mangle]
pub extern "C" fn accel_fail(_input: *const f32, _len: usize, _out: *mut f32, _cap: usize) -> isize {
    -7
}

/// Never satisfied with the buffer it gets.
#[no_mangle]
pub extern "C" fn accel_grow(_input: *const f32, _len: usize, _out: *mut f32, cap: usize) -> isize {
    (cap + 1) as isize
}
