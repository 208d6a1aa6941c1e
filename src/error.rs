use crate::types::{FloatProp, IntProp};
use std::fmt;

/// Errors that can occur when interacting with the device registry or an
/// open device.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("no device with index: {0}")]
    NoSuchDevice(i64),

    #[error("no such float value type: {0:?}")]
    NoSuchFloatProperty(FloatProp),

    #[error("no such integer value type: {0:?}")]
    NoSuchIntProperty(IntProp),

    #[error("property {0:?} is not writable")]
    NotWritable(FloatProp),

    #[error("value shape does not match property {0:?}")]
    ValueMismatch(FloatProp),

    #[error("device handle is no longer registered")]
    Detached,

    #[error("driver error: {0}")]
    Driver(String),

    #[error("device error: {0}")]
    Device(String),
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &HalError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
