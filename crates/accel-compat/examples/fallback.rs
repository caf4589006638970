//! Resolve a capability and fall back to plain Rust when it is absent.
//!
//! Run with an extension directory to try the native path:
//!   ACCEL_COMPAT_PATH=/opt/ext cargo run -p accel-compat --example fallback

use accel_compat::{cumesh, CompatError};

/// Stand-in for the application's own implementation.
fn scale_fallback(xs: &[f32]) -> Vec<f32> {
    xs.iter().map(|x| x * 0.5).collect()
}

fn main() -> Result<(), CompatError> {
    let input = [1.0_f32, 2.0, 4.0];
    let mesh = cumesh()?;
    let out = match mesh.call("scale", &input) {
        Ok(out) => out,
        Err(e) if e.is_unavailable() => {
            println!("{e}");
            scale_fallback(&input)
        }
        Err(e) => return Err(e),
    };
    println!("{out:?}");
    Ok(())
}
