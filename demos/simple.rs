//! Open the first device and print its geometry and a few poses.
//!
//! Usage: cargo run --example simple

use std::time::Duration;

use visorhal::{Context, FloatProp, FloatValue, IntProp};

fn main() {
    env_logger::init();

    let ctx = Context::new();
    let count = ctx.probe();
    println!("{} device(s) found", count);

    let device = match ctx.open_device(0) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to open device: {}", e);
            std::process::exit(1);
        }
    };

    let hres = device
        .get_int(IntProp::ScreenHorizontalResolution)
        .unwrap_or(0);
    let vres = device
        .get_int(IntProp::ScreenVerticalResolution)
        .unwrap_or(0);
    println!("resolution: {}x{}", hres, vres);

    if let Ok(FloatValue::Scalar(ipd)) = device.get_float(FloatProp::EyeIpd) {
        println!("ipd:        {:.4} m", ipd);
    }
    if let Ok(FloatValue::Scalar(fov)) = device.get_float(FloatProp::LeftEyeFov) {
        println!("fov:        {:.1} deg", fov.to_degrees());
    }

    for _ in 0..10 {
        ctx.update();
        if let Ok(FloatValue::Rotation(q)) = device.get_float(FloatProp::RotationQuat) {
            println!(
                "rotation: [{:+.3}, {:+.3}, {:+.3}, {:+.3}]",
                q.x, q.y, q.z, q.w
            );
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    if let Ok(FloatValue::Matrix(mv)) = device.get_float(FloatProp::LeftEyeGlModelviewMatrix) {
        println!("left modelview (GL layout): {:?}", mv.to_cols_array());
    }

    device.close().unwrap();
}
