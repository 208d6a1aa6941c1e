//! Device registry: context lifecycle, enumeration bookkeeping, and the
//! correction/derivation layer between callers and device backends.

use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::{Quat, Vec3};

use crate::driver::{DeviceBackend, Driver};
use crate::math;
use crate::null::NullDriver;
use crate::types::{DeviceDescriptor, DeviceProperties, FloatProp, FloatValue, IntProp, StringProp};
use crate::{HalError, Result};

/// One open device as tracked by the registry.
struct ActiveDevice {
    id: u64,
    /// Position of this entry in the active sequence. Kept equal to the
    /// actual index across removals.
    idx: usize,
    props: DeviceProperties,
    rotation_correction: Quat,
    position_correction: Vec3,
    backend: Box<dyn DeviceBackend>,
}

/// Mutable registry state, guarded as a whole by the context mutex.
struct Registry {
    drivers: Vec<Box<dyn Driver>>,
    list: Vec<DeviceDescriptor>,
    active: Vec<ActiveDevice>,
    next_id: u64,
}

/// An HMD device registry.
///
/// Owns the installed drivers, the device-list snapshot of the most
/// recent probe, and every currently open device. All operations are
/// synchronous on the caller's thread; one internal mutex makes every
/// registry and device operation mutually exclusive, including device
/// close and the float property paths, so a context shared between
/// threads stays consistent.
pub struct Context {
    reg: Mutex<Registry>,
}

impl Context {
    /// Create a context with only the built-in fallback driver.
    pub fn new() -> Context {
        Context::with_drivers(Vec::new())
    }

    /// Create a context with vendor drivers installed in priority order.
    ///
    /// The fallback driver is appended last so it always has the lowest
    /// priority.
    pub fn with_drivers(mut drivers: Vec<Box<dyn Driver>>) -> Context {
        drivers.push(Box::new(NullDriver));
        Context {
            reg: Mutex::new(Registry {
                drivers,
                list: Vec::new(),
                active: Vec::new(),
                next_id: 0,
            }),
        }
    }

    fn reg(&self) -> MutexGuard<'_, Registry> {
        // State is consistent between mutations; a panicking backend
        // cannot leave a half-applied removal behind.
        self.reg.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild the device-list snapshot by asking every driver, in
    /// priority order, to append its available devices. Returns the
    /// number of devices found.
    ///
    /// The previous snapshot is discarded entirely; indices handed to
    /// [`Context::open_device`] or [`Context::list_string`] are only
    /// meaningful against the most recent probe.
    pub fn probe(&self) -> usize {
        let mut guard = self.reg();
        let reg = &mut *guard;

        reg.list.clear();
        for (i, driver) in reg.drivers.iter_mut().enumerate() {
            let before = reg.list.len();
            driver.enumerate(&mut reg.list);
            for desc in &mut reg.list[before..] {
                desc.driver = i;
            }
            log::debug!("driver {} enumerated {} device(s)", i, reg.list.len() - before);
        }

        reg.list.len()
    }

    /// Number of entries in the current device-list snapshot.
    pub fn device_count(&self) -> usize {
        self.reg().list.len()
    }

    /// Tick every open device, in the order they were opened.
    pub fn update(&self) {
        let mut guard = self.reg();
        for dev in &mut guard.active {
            dev.backend.tick();
        }
    }

    /// Copy one string field of a device list entry.
    ///
    /// Returns `None` when `index` is outside the current snapshot.
    pub fn list_string(&self, index: usize, field: StringProp) -> Option<String> {
        let guard = self.reg();
        let desc = guard.list.get(index)?;
        Some(match field {
            StringProp::Vendor => desc.vendor.clone(),
            StringProp::Product => desc.product.clone(),
            StringProp::Path => desc.path.clone(),
        })
    }

    /// Open the device at `index` in the current snapshot.
    ///
    /// The owning driver performs the open; on success the device joins
    /// the active sequence with an identity rotation correction and a
    /// zero position correction.
    pub fn open_device(&self, index: usize) -> Result<Device<'_>> {
        let mut guard = self.reg();
        let reg = &mut *guard;

        let desc = reg
            .list
            .get(index)
            .ok_or(HalError::NoSuchDevice(index as i64))?
            .clone();
        let driver = reg
            .drivers
            .get_mut(desc.driver)
            .ok_or(HalError::NoSuchDevice(index as i64))?;
        let opened = driver.open(&desc)?;

        let id = reg.next_id;
        reg.next_id += 1;

        let idx = reg.active.len();
        reg.active.push(ActiveDevice {
            id,
            idx,
            props: opened.properties,
            rotation_correction: Quat::IDENTITY,
            position_correction: Vec3::ZERO,
            backend: opened.backend,
        });

        log::info!(
            "opened {} {} (active index {})",
            desc.vendor,
            desc.product,
            idx
        );

        Ok(Device { ctx: self, id })
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::new()
    }
}

impl Drop for Context {
    /// Closes every still-open device, then releases every driver.
    fn drop(&mut self) {
        let reg = self
            .reg
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for dev in &mut reg.active {
            dev.backend.close();
        }
        reg.active.clear();
        reg.drivers.clear();
    }
}

/// Handle to an open device.
///
/// The borrow ties every handle to its context, so a context cannot be
/// torn down while handles are live. Closing consumes the handle; a
/// handle dropped without being closed leaves the device open until the
/// context itself is dropped.
pub struct Device<'a> {
    ctx: &'a Context,
    id: u64,
}

impl std::fmt::Debug for Device<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("id", &self.id).finish()
    }
}

impl<'a> Device<'a> {
    /// Read a float-valued property, with calibration corrections and
    /// matrix derivations applied.
    pub fn get_float(&self, prop: FloatProp) -> Result<FloatValue> {
        self.with_entry(|dev| dev.get_float(prop))
    }

    /// Write a float-valued property.
    ///
    /// Writable properties are the inter-pupillary distance, the
    /// near/far clip planes, and the rotation/position calibration
    /// targets; every other property fails without touching state.
    pub fn set_float(&self, prop: FloatProp, value: FloatValue) -> Result<()> {
        self.with_entry(|dev| dev.set_float(prop, value))
    }

    /// Read an integer-valued property.
    pub fn get_int(&self, prop: IntProp) -> Result<u32> {
        self.with_entry(|dev| match prop {
            IntProp::ScreenHorizontalResolution => Ok(dev.props.hres),
            IntProp::ScreenVerticalResolution => Ok(dev.props.vres),
            IntProp::Vendor(_) => Err(HalError::NoSuchIntProperty(prop)),
        })
    }

    /// Close the device, removing it from the context's active set.
    ///
    /// Later entries shift one slot left and their recorded positions
    /// follow, so the active sequence stays densely indexed.
    pub fn close(self) -> Result<()> {
        let mut guard = self.ctx.reg();
        let idx = guard
            .active
            .iter()
            .position(|d| d.id == self.id)
            .ok_or(HalError::Detached)?;

        let mut removed = guard.active.remove(idx);
        for later in &mut guard.active[idx..] {
            later.idx -= 1;
        }
        removed.backend.close();

        log::info!("closed device (was active index {})", idx);
        Ok(())
    }

    fn with_entry<T>(&self, f: impl FnOnce(&mut ActiveDevice) -> Result<T>) -> Result<T> {
        let mut guard = self.ctx.reg();
        let entry = guard
            .active
            .iter_mut()
            .find(|d| d.id == self.id)
            .ok_or(HalError::Detached)?;
        f(entry)
    }

    pub(crate) fn registry_id(&self) -> u64 {
        self.id
    }

    pub(crate) fn from_registry_id(ctx: &'a Context, id: u64) -> Device<'a> {
        Device { ctx, id }
    }
}

impl ActiveDevice {
    fn raw_rotation(&mut self) -> Result<Quat> {
        match self.backend.getf(FloatProp::RotationQuat)? {
            FloatValue::Rotation(q) => Ok(q),
            _ => Err(HalError::ValueMismatch(FloatProp::RotationQuat)),
        }
    }

    fn raw_position(&mut self) -> Result<Vec3> {
        match self.backend.getf(FloatProp::PositionVector)? {
            FloatValue::Vector(v) => Ok(v),
            _ => Err(HalError::ValueMismatch(FloatProp::PositionVector)),
        }
    }

    /// Calibration correction composed over the raw device reading.
    fn corrected_rotation(&mut self) -> Result<Quat> {
        Ok(self.rotation_correction * self.raw_rotation()?)
    }

    fn get_float(&mut self, prop: FloatProp) -> Result<FloatValue> {
        match prop {
            FloatProp::RotationQuat => self.corrected_rotation().map(FloatValue::Rotation),
            FloatProp::PositionVector => {
                Ok(FloatValue::Vector(self.raw_position()? + self.position_correction))
            }
            FloatProp::LeftEyeGlModelviewMatrix => {
                let rot = self.corrected_rotation()?;
                Ok(FloatValue::Matrix(math::eye_view_matrix(
                    rot,
                    self.props.ipd / 2.0,
                )))
            }
            FloatProp::RightEyeGlModelviewMatrix => {
                let rot = self.corrected_rotation()?;
                Ok(FloatValue::Matrix(math::eye_view_matrix(
                    rot,
                    -(self.props.ipd / 2.0),
                )))
            }
            FloatProp::LeftEyeGlProjectionMatrix => Ok(FloatValue::Matrix(self.props.proj_left)),
            FloatProp::RightEyeGlProjectionMatrix => Ok(FloatValue::Matrix(self.props.proj_right)),
            FloatProp::ScreenHorizontalSize => Ok(FloatValue::Scalar(self.props.hsize)),
            FloatProp::ScreenVerticalSize => Ok(FloatValue::Scalar(self.props.vsize)),
            FloatProp::LensHorizontalSeparation => Ok(FloatValue::Scalar(self.props.lens_sep)),
            FloatProp::LensVerticalPosition => Ok(FloatValue::Scalar(self.props.lens_vpos)),
            FloatProp::LeftEyeFov | FloatProp::RightEyeFov => {
                Ok(FloatValue::Scalar(self.props.fov))
            }
            FloatProp::LeftEyeAspectRatio | FloatProp::RightEyeAspectRatio => {
                Ok(FloatValue::Scalar(self.props.ratio))
            }
            FloatProp::EyeIpd => Ok(FloatValue::Scalar(self.props.ipd)),
            FloatProp::ProjectionZNear => Ok(FloatValue::Scalar(self.props.znear)),
            FloatProp::ProjectionZFar => Ok(FloatValue::Scalar(self.props.zfar)),
            // Vendor extensions go to the backend untouched.
            FloatProp::Vendor(_) => self.backend.getf(prop),
        }
    }

    fn set_float(&mut self, prop: FloatProp, value: FloatValue) -> Result<()> {
        match (prop, value) {
            (FloatProp::EyeIpd, FloatValue::Scalar(v)) => {
                self.props.ipd = v;
                Ok(())
            }
            (FloatProp::ProjectionZNear, FloatValue::Scalar(v)) => {
                self.props.znear = v;
                self.props.recompute_projection();
                Ok(())
            }
            (FloatProp::ProjectionZFar, FloatValue::Scalar(v)) => {
                self.props.zfar = v;
                self.props.recompute_projection();
                Ok(())
            }
            (FloatProp::RotationQuat, FloatValue::Rotation(target)) => {
                // One-shot recalibration: an immediate corrected read
                // reproduces the target.
                let raw = self.raw_rotation()?;
                self.rotation_correction = math::difference(raw, target);
                Ok(())
            }
            (FloatProp::PositionVector, FloatValue::Vector(target)) => {
                let raw = self.raw_position()?;
                self.position_correction = target - raw;
                Ok(())
            }
            (
                FloatProp::EyeIpd
                | FloatProp::ProjectionZNear
                | FloatProp::ProjectionZFar
                | FloatProp::RotationQuat
                | FloatProp::PositionVector,
                _,
            ) => Err(HalError::ValueMismatch(prop)),
            _ => Err(HalError::NotWritable(prop)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::OpenedDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Driver whose advertised device count can change between probes.
    struct ScriptedDriver {
        available: Arc<AtomicUsize>,
        pose: (Quat, Vec3),
    }

    impl ScriptedDriver {
        fn fixed(count: usize, pose: (Quat, Vec3)) -> (Box<dyn Driver>, Arc<AtomicUsize>) {
            let available = Arc::new(AtomicUsize::new(count));
            let driver = ScriptedDriver {
                available: available.clone(),
                pose,
            };
            (Box::new(driver), available)
        }
    }

    impl Driver for ScriptedDriver {
        fn enumerate(&mut self, list: &mut Vec<DeviceDescriptor>) {
            for i in 0..self.available.load(Ordering::Relaxed) {
                list.push(DeviceDescriptor::new(
                    "Test Vendor",
                    format!("Test HMD {}", i),
                    format!("/dev/test{}", i),
                ));
            }
        }

        fn open(&mut self, _desc: &DeviceDescriptor) -> Result<OpenedDevice> {
            let mut props = DeviceProperties {
                hsize: 0.14976,
                vsize: 0.0936,
                hres: 1920,
                vres: 1080,
                lens_sep: 0.0635,
                lens_vpos: 0.0468,
                fov: 90.0_f32.to_radians(),
                ratio: 16.0 / 18.0,
                ..DeviceProperties::default()
            };
            props.recompute_projection();
            Ok(OpenedDevice {
                properties: props,
                backend: Box::new(FixedPoseDevice {
                    rotation: self.pose.0,
                    position: self.pose.1,
                }),
            })
        }
    }

    /// Backend reporting a fixed raw pose, with one vendor extension.
    struct FixedPoseDevice {
        rotation: Quat,
        position: Vec3,
    }

    impl DeviceBackend for FixedPoseDevice {
        fn getf(&mut self, prop: FloatProp) -> Result<FloatValue> {
            match prop {
                FloatProp::RotationQuat => Ok(FloatValue::Rotation(self.rotation)),
                FloatProp::PositionVector => Ok(FloatValue::Vector(self.position)),
                FloatProp::Vendor(7) => Ok(FloatValue::Scalar(42.0)),
                _ => Err(HalError::NoSuchFloatProperty(prop)),
            }
        }
    }

    fn tilted() -> (Quat, Vec3) {
        (
            Quat::from_rotation_y(0.5) * Quat::from_rotation_x(-0.25),
            Vec3::new(0.1, -0.2, 0.3),
        )
    }

    fn test_context(count: usize) -> (Context, Arc<AtomicUsize>) {
        let (driver, available) = ScriptedDriver::fixed(count, tilted());
        (Context::with_drivers(vec![driver]), available)
    }

    fn assert_index_invariant(ctx: &Context) {
        let reg = ctx.reg();
        for (pos, dev) in reg.active.iter().enumerate() {
            assert_eq!(dev.idx, pos);
        }
    }

    #[test]
    fn open_close_preserves_index_invariant() {
        let (ctx, _) = test_context(4);
        assert_eq!(ctx.probe(), 5); // 4 scripted + fallback

        let a = ctx.open_device(0).unwrap();
        let b = ctx.open_device(1).unwrap();
        let c = ctx.open_device(2).unwrap();
        let d = ctx.open_device(3).unwrap();
        assert_index_invariant(&ctx);

        // Remove from the middle, the front, and the back.
        b.close().unwrap();
        assert_index_invariant(&ctx);
        a.close().unwrap();
        assert_index_invariant(&ctx);
        d.close().unwrap();
        assert_index_invariant(&ctx);

        let e = ctx.open_device(0).unwrap();
        assert_index_invariant(&ctx);
        c.close().unwrap();
        e.close().unwrap();
        assert_eq!(ctx.reg().active.len(), 0);
    }

    #[test]
    fn fallback_only_scenario() {
        let ctx = Context::new();
        assert_eq!(ctx.probe(), 1);

        let device = ctx.open_device(0).unwrap();
        assert_eq!(ctx.reg().active[0].idx, 0);

        device.close().unwrap();
        assert_eq!(ctx.reg().active.len(), 0);

        let device = ctx.open_device(0).unwrap();
        assert_eq!(ctx.reg().active[0].idx, 0);
        device.close().unwrap();
    }

    #[test]
    fn rotation_calibration_round_trips() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        let target = Quat::from_rotation_z(1.1) * Quat::from_rotation_y(-0.4);
        device
            .set_float(FloatProp::RotationQuat, FloatValue::Rotation(target))
            .unwrap();

        let read = device
            .get_float(FloatProp::RotationQuat)
            .unwrap()
            .as_rotation()
            .unwrap();
        assert!(read.dot(target).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn position_calibration_round_trips() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        let target = Vec3::new(-1.5, 0.25, 4.0);
        device
            .set_float(FloatProp::PositionVector, FloatValue::Vector(target))
            .unwrap();

        let read = device
            .get_float(FloatProp::PositionVector)
            .unwrap()
            .as_vector()
            .unwrap();
        assert!((read - target).length() < 1e-5);
    }

    #[test]
    fn corrections_start_neutral() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        let (raw_rot, raw_pos) = tilted();
        let rot = device
            .get_float(FloatProp::RotationQuat)
            .unwrap()
            .as_rotation()
            .unwrap();
        let pos = device
            .get_float(FloatProp::PositionVector)
            .unwrap()
            .as_vector()
            .unwrap();
        assert!(rot.dot(raw_rot).abs() > 1.0 - 1e-6);
        assert_eq!(pos, raw_pos);
    }

    #[test]
    fn modelview_eyes_separate_by_ipd() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        // Zero the orientation so the eye shift is the only difference.
        device
            .set_float(FloatProp::RotationQuat, FloatValue::Rotation(Quat::IDENTITY))
            .unwrap();

        let left = device
            .get_float(FloatProp::LeftEyeGlModelviewMatrix)
            .unwrap()
            .as_matrix()
            .unwrap();
        let right = device
            .get_float(FloatProp::RightEyeGlModelviewMatrix)
            .unwrap()
            .as_matrix()
            .unwrap();

        let ipd = device
            .get_float(FloatProp::EyeIpd)
            .unwrap()
            .as_scalar()
            .unwrap();
        assert!((left.w_axis.x - right.w_axis.x - ipd).abs() < 1e-6);
        assert_eq!(left.x_axis, right.x_axis);
    }

    #[test]
    fn probe_replaces_the_snapshot() {
        let (ctx, available) = test_context(3);
        assert_eq!(ctx.probe(), 4);
        assert!(ctx.list_string(2, StringProp::Product).is_some());

        available.store(0, Ordering::Relaxed);
        assert_eq!(ctx.probe(), 1); // fallback only
        assert_eq!(ctx.device_count(), 1);
        assert!(ctx.list_string(2, StringProp::Product).is_none());
        assert_eq!(
            ctx.list_string(0, StringProp::Product).unwrap(),
            "Null Device"
        );
    }

    #[test]
    fn out_of_range_access_fails_without_mutation() {
        let ctx = Context::new();
        ctx.probe();

        assert!(ctx.list_string(1, StringProp::Vendor).is_none());
        assert!(matches!(
            ctx.open_device(1),
            Err(HalError::NoSuchDevice(1))
        ));
        assert_eq!(ctx.reg().active.len(), 0);
        assert_eq!(ctx.device_count(), 1);
    }

    #[test]
    fn disallowed_float_writes_leave_state_unchanged() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        let before = device.get_float(FloatProp::LeftEyeFov).unwrap();
        let err = device
            .set_float(FloatProp::LeftEyeFov, FloatValue::Scalar(2.0))
            .unwrap_err();
        assert!(matches!(err, HalError::NotWritable(FloatProp::LeftEyeFov)));
        assert_eq!(device.get_float(FloatProp::LeftEyeFov).unwrap(), before);
    }

    #[test]
    fn mismatched_value_shape_is_rejected() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        let err = device
            .set_float(FloatProp::RotationQuat, FloatValue::Scalar(1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            HalError::ValueMismatch(FloatProp::RotationQuat)
        ));
    }

    #[test]
    fn unknown_integer_property_is_an_error() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        assert_eq!(
            device.get_int(IntProp::ScreenHorizontalResolution).unwrap(),
            1920
        );
        let err = device.get_int(IntProp::Vendor(9)).unwrap_err();
        assert_eq!(err.to_string(), "no such integer value type: Vendor(9)");
    }

    #[test]
    fn vendor_float_properties_fall_through_to_the_backend() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        let value = device.get_float(FloatProp::Vendor(7)).unwrap();
        assert_eq!(value, FloatValue::Scalar(42.0));
        assert!(device.get_float(FloatProp::Vendor(8)).is_err());
    }

    #[test]
    fn allow_listed_scalar_writes_are_visible() {
        let (ctx, _) = test_context(1);
        ctx.probe();
        let device = ctx.open_device(0).unwrap();

        device
            .set_float(FloatProp::EyeIpd, FloatValue::Scalar(0.07))
            .unwrap();
        assert_eq!(
            device.get_float(FloatProp::EyeIpd).unwrap(),
            FloatValue::Scalar(0.07)
        );

        let proj_before = device
            .get_float(FloatProp::LeftEyeGlProjectionMatrix)
            .unwrap();
        device
            .set_float(FloatProp::ProjectionZNear, FloatValue::Scalar(0.5))
            .unwrap();
        let proj_after = device
            .get_float(FloatProp::LeftEyeGlProjectionMatrix)
            .unwrap();
        assert_ne!(proj_before, proj_after);
    }

    #[test]
    fn concurrent_open_and_close_keep_the_registry_consistent() {
        let (ctx, _) = test_context(8);
        ctx.probe();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for i in 0..8 {
                        if let Ok(device) = ctx.open_device(i % 8) {
                            let _ = device.get_float(FloatProp::RotationQuat);
                            device.close().unwrap();
                        }
                    }
                });
            }
        });

        assert_index_invariant(&ctx);
        assert_eq!(ctx.reg().active.len(), 0);
    }
}
