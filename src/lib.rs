//! # visorhal - Hardware Abstraction Layer for Head-Mounted Displays
//!
//! Unifies heterogeneous HMD vendor drivers behind one device contract.
//! Provides:
//! - Thread-safe enumeration and open/close bookkeeping for HMD hardware
//! - Per-device calibration corrections applied over raw pose readings
//! - Stereo modelview/projection matrix derivation from device geometry
//! - C FFI for integration with C/C++ renderers
//!
//! ## Quick Start
//! ```
//! use visorhal::{Context, FloatProp, FloatValue};
//!
//! let ctx = Context::new();
//! let count = ctx.probe();
//! println!("found {} device(s)", count);
//!
//! let device = ctx.open_device(0).unwrap();
//! ctx.update();
//! if let FloatValue::Rotation(q) = device.get_float(FloatProp::RotationQuat).unwrap() {
//!     println!("orientation: {:?}", q);
//! }
//! device.close().unwrap();
//! ```
//!
//! A context created with [`Context::new`] carries only the built-in
//! fallback driver; vendor drivers implementing [`Driver`] are passed to
//! [`Context::with_drivers`] in priority order.

pub mod context;
pub mod driver;
pub mod error;
pub mod ffi;
pub mod math;
pub mod null;
pub mod types;

pub use context::{Context, Device};
pub use driver::{DeviceBackend, Driver, OpenedDevice};
pub use error::HalError;
pub use null::NullDriver;
pub use types::{DeviceDescriptor, DeviceProperties, FloatProp, FloatValue, IntProp, StringProp};

/// Result type alias for visorhal operations.
pub type Result<T> = std::result::Result<T, HalError>;
