//! C FFI layer for visorhal.
//!
//! Provides an opaque handle-based API for C/C++ renderers. The
//! generated C header is written to `include/visorhal.h` by cbindgen.
//!
//! Every call that can fail returns a status (`-1`/null) and records a
//! message retrievable through [`vh_last_error`]. Matrix results are
//! written in the OpenGL column-major float[16] layout.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, CString};

use glam::{Quat, Vec3};

use crate::context::{Context, Device};
use crate::error::LastError;
use crate::types::{FloatProp, FloatValue, IntProp, StringProp};
use crate::HalError;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

thread_local! {
    /// Scratch storage for list strings. Overwritten by the next
    /// `vh_list_gets` call on the same thread; callers must copy if
    /// they need to retain the value.
    static LIST_STRING: RefCell<CString> = RefCell::new(CString::default());
}

/// Opaque context handle for C consumers.
pub struct VhContext(Context);

/// Opaque device handle for C consumers.
pub struct VhDevice {
    ctx: *const VhContext,
    id: u64,
}

// -- string property identifiers --
pub const VH_VENDOR: c_int = 0;
pub const VH_PRODUCT: c_int = 1;
pub const VH_PATH: c_int = 2;

// -- float property identifiers --
pub const VH_ROTATION_QUAT: c_int = 1;
pub const VH_LEFT_EYE_GL_MODELVIEW_MATRIX: c_int = 2;
pub const VH_RIGHT_EYE_GL_MODELVIEW_MATRIX: c_int = 3;
pub const VH_LEFT_EYE_GL_PROJECTION_MATRIX: c_int = 4;
pub const VH_RIGHT_EYE_GL_PROJECTION_MATRIX: c_int = 5;
pub const VH_SCREEN_HORIZONTAL_SIZE: c_int = 6;
pub const VH_SCREEN_VERTICAL_SIZE: c_int = 7;
pub const VH_LENS_HORIZONTAL_SEPARATION: c_int = 8;
pub const VH_LENS_VERTICAL_POSITION: c_int = 9;
pub const VH_LEFT_EYE_FOV: c_int = 10;
pub const VH_RIGHT_EYE_FOV: c_int = 11;
pub const VH_LEFT_EYE_ASPECT_RATIO: c_int = 12;
pub const VH_RIGHT_EYE_ASPECT_RATIO: c_int = 13;
pub const VH_EYE_IPD: c_int = 14;
pub const VH_PROJECTION_ZFAR: c_int = 15;
pub const VH_PROJECTION_ZNEAR: c_int = 16;
pub const VH_POSITION_VECTOR: c_int = 17;

// -- integer property identifiers --
pub const VH_SCREEN_HORIZONTAL_RESOLUTION: c_int = 0;
pub const VH_SCREEN_VERTICAL_RESOLUTION: c_int = 1;

fn float_prop(value: c_int) -> FloatProp {
    match value {
        VH_ROTATION_QUAT => FloatProp::RotationQuat,
        VH_LEFT_EYE_GL_MODELVIEW_MATRIX => FloatProp::LeftEyeGlModelviewMatrix,
        VH_RIGHT_EYE_GL_MODELVIEW_MATRIX => FloatProp::RightEyeGlModelviewMatrix,
        VH_LEFT_EYE_GL_PROJECTION_MATRIX => FloatProp::LeftEyeGlProjectionMatrix,
        VH_RIGHT_EYE_GL_PROJECTION_MATRIX => FloatProp::RightEyeGlProjectionMatrix,
        VH_SCREEN_HORIZONTAL_SIZE => FloatProp::ScreenHorizontalSize,
        VH_SCREEN_VERTICAL_SIZE => FloatProp::ScreenVerticalSize,
        VH_LENS_HORIZONTAL_SEPARATION => FloatProp::LensHorizontalSeparation,
        VH_LENS_VERTICAL_POSITION => FloatProp::LensVerticalPosition,
        VH_LEFT_EYE_FOV => FloatProp::LeftEyeFov,
        VH_RIGHT_EYE_FOV => FloatProp::RightEyeFov,
        VH_LEFT_EYE_ASPECT_RATIO => FloatProp::LeftEyeAspectRatio,
        VH_RIGHT_EYE_ASPECT_RATIO => FloatProp::RightEyeAspectRatio,
        VH_EYE_IPD => FloatProp::EyeIpd,
        VH_PROJECTION_ZFAR => FloatProp::ProjectionZFar,
        VH_PROJECTION_ZNEAR => FloatProp::ProjectionZNear,
        VH_POSITION_VECTOR => FloatProp::PositionVector,
        other => FloatProp::Vendor(other as u32),
    }
}

fn int_prop(value: c_int) -> IntProp {
    match value {
        VH_SCREEN_HORIZONTAL_RESOLUTION => IntProp::ScreenHorizontalResolution,
        VH_SCREEN_VERTICAL_RESOLUTION => IntProp::ScreenVerticalResolution,
        other => IntProp::Vendor(other as u32),
    }
}

unsafe fn write_value(value: &FloatValue, out: *mut f32) {
    match value {
        FloatValue::Scalar(v) => out.write(*v),
        FloatValue::Vector(v) => {
            std::ptr::copy_nonoverlapping(v.to_array().as_ptr(), out, 3);
        }
        FloatValue::Rotation(q) => {
            std::ptr::copy_nonoverlapping(q.to_array().as_ptr(), out, 4);
        }
        FloatValue::Matrix(m) => {
            std::ptr::copy_nonoverlapping(m.to_cols_array().as_ptr(), out, 16);
        }
    }
}

/// Create a device registry context.
#[no_mangle]
pub extern "C" fn vh_ctx_create() -> *mut VhContext {
    Box::into_raw(Box::new(VhContext(Context::new())))
}

/// Destroy a context, closing every device still open.
///
/// # Safety
/// `ctx` must be a pointer returned by `vh_ctx_create`, or null. Device
/// handles belonging to it must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn vh_ctx_destroy(ctx: *mut VhContext) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Rebuild the device list. Returns the number of devices found, or -1.
///
/// # Safety
/// `ctx` must be a valid context pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn vh_ctx_probe(ctx: *const VhContext) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    (*ctx).0.probe() as c_int
}

/// Tick every open device.
///
/// # Safety
/// `ctx` must be a valid context pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn vh_ctx_update(ctx: *const VhContext) {
    if !ctx.is_null() {
        (*ctx).0.update();
    }
}

/// Get a string field of a device list entry. Returns NULL for an
/// out-of-range index or an unknown field.
///
/// The returned pointer stays valid until the next `vh_list_gets` call
/// on the same thread.
///
/// # Safety
/// `ctx` must be a valid context pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn vh_list_gets(
    ctx: *const VhContext,
    index: c_int,
    field: c_int,
) -> *const c_char {
    if ctx.is_null() || index < 0 {
        return std::ptr::null();
    }
    let field = match field {
        VH_VENDOR => StringProp::Vendor,
        VH_PRODUCT => StringProp::Product,
        VH_PATH => StringProp::Path,
        _ => return std::ptr::null(),
    };
    match (*ctx).0.list_string(index as usize, field) {
        Some(s) => LIST_STRING.with(|buf| {
            let mut slot = buf.borrow_mut();
            *slot = CString::new(s).unwrap_or_default();
            slot.as_ptr()
        }),
        None => std::ptr::null(),
    }
}

/// Open the device at `index` in the current device list.
/// Returns NULL on error (check `vh_last_error`).
///
/// # Safety
/// `ctx` must be a valid context pointer, or null. The returned handle
/// must be freed with `vh_close_device` before the context is destroyed.
#[no_mangle]
pub unsafe extern "C" fn vh_open_device(ctx: *const VhContext, index: c_int) -> *mut VhDevice {
    if ctx.is_null() {
        return std::ptr::null_mut();
    }
    if index < 0 {
        LAST_ERROR.set(&HalError::NoSuchDevice(index as i64));
        return std::ptr::null_mut();
    }
    match (*ctx).0.open_device(index as usize) {
        Ok(device) => {
            let id = device.registry_id();
            Box::into_raw(Box::new(VhDevice { ctx, id }))
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            std::ptr::null_mut()
        }
    }
}

/// Close a device and free its handle. Returns 0 on success, -1 on error.
///
/// # Safety
/// `dev` must be a pointer returned by `vh_open_device`, or null, and
/// its context must still be alive.
#[no_mangle]
pub unsafe extern "C" fn vh_close_device(dev: *mut VhDevice) -> c_int {
    if dev.is_null() {
        return -1;
    }
    let dev = Box::from_raw(dev);
    let handle = Device::from_registry_id(&(*dev.ctx).0, dev.id);
    match handle.close() {
        Ok(()) => 0,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Read a float-valued property into `out`. Returns 0 on success, -1 on
/// error. Scalars write 1 float, positions 3, rotations 4 (x, y, z, w),
/// matrices 16 in GL column-major order.
///
/// # Safety
/// `dev` must be a valid device handle with a live context, or null;
/// `out` must have room for the property's value.
#[no_mangle]
pub unsafe extern "C" fn vh_device_getf(
    dev: *const VhDevice,
    prop: c_int,
    out: *mut f32,
) -> c_int {
    if dev.is_null() || out.is_null() {
        return -1;
    }
    let dev = &*dev;
    let handle = Device::from_registry_id(&(*dev.ctx).0, dev.id);
    match handle.get_float(float_prop(prop)) {
        Ok(value) => {
            write_value(&value, out);
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Write a float-valued property from `input`. Returns 0 on success, -1
/// on error. Rotations read 4 floats, positions 3, everything else 1.
///
/// # Safety
/// `dev` must be a valid device handle with a live context, or null;
/// `input` must hold the property's value.
#[no_mangle]
pub unsafe extern "C" fn vh_device_setf(
    dev: *const VhDevice,
    prop: c_int,
    input: *const f32,
) -> c_int {
    if dev.is_null() || input.is_null() {
        return -1;
    }
    let dev = &*dev;
    let prop = float_prop(prop);
    let value = match prop {
        FloatProp::RotationQuat => {
            let mut q = [0.0f32; 4];
            std::ptr::copy_nonoverlapping(input, q.as_mut_ptr(), 4);
            FloatValue::Rotation(Quat::from_array(q))
        }
        FloatProp::PositionVector => {
            let mut v = [0.0f32; 3];
            std::ptr::copy_nonoverlapping(input, v.as_mut_ptr(), 3);
            FloatValue::Vector(Vec3::from_array(v))
        }
        _ => FloatValue::Scalar(input.read()),
    };
    let handle = Device::from_registry_id(&(*dev.ctx).0, dev.id);
    match handle.set_float(prop, value) {
        Ok(()) => 0,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Read an integer-valued property into `out`. Returns 0 on success, -1
/// on error.
///
/// # Safety
/// `dev` must be a valid device handle with a live context, or null;
/// `out` must be a valid destination, or null.
#[no_mangle]
pub unsafe extern "C" fn vh_device_geti(
    dev: *const VhDevice,
    prop: c_int,
    out: *mut c_int,
) -> c_int {
    if dev.is_null() || out.is_null() {
        return -1;
    }
    let dev = &*dev;
    let handle = Device::from_registry_id(&(*dev.ctx).0, dev.id);
    match handle.get_int(int_prop(prop)) {
        Ok(value) => {
            out.write(value as c_int);
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next visorhal API call.
#[no_mangle]
pub extern "C" fn vh_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
