//! Contracts implemented by vendor drivers and their devices.
//!
//! The registry never inspects a driver or device beyond these traits.
//! Transport details (USB, HID, network) stay entirely inside the
//! implementations.

use crate::types::{DeviceDescriptor, DeviceProperties, FloatProp, FloatValue, IntProp};
use crate::{HalError, Result};

/// A device opened by a driver: the properties it established plus the
/// backend the registry routes raw property access through.
pub struct OpenedDevice {
    pub properties: DeviceProperties,
    pub backend: Box<dyn DeviceBackend>,
}

/// Capability set implemented once per vendor.
///
/// Driver resources are released on drop; the registry drops all of its
/// drivers when the context is torn down.
pub trait Driver: Send {
    /// Append this driver's available devices to the enumeration list.
    ///
    /// The list is shared between drivers during a probe; implementations
    /// must append to it, never clear it.
    fn enumerate(&mut self, list: &mut Vec<DeviceDescriptor>);

    /// Open one of this driver's devices.
    ///
    /// `desc` is a descriptor this driver produced during the most recent
    /// enumeration. The returned properties should be fully established,
    /// including a [`DeviceProperties::recompute_projection`] call once
    /// the geometry fields are in place.
    fn open(&mut self, desc: &DeviceDescriptor) -> Result<OpenedDevice>;
}

/// Capability set implemented by every opened device.
///
/// The registry applies its correction layer before touching the
/// backend: only raw pose reads, vendor extension properties and
/// lifecycle calls arrive here.
pub trait DeviceBackend: Send {
    /// Read a raw, uncorrected float-valued property.
    fn getf(&mut self, prop: FloatProp) -> Result<FloatValue>;

    /// Write a float-valued property on the device itself.
    ///
    /// The registry serves every writable property from its own state;
    /// this is an escape hatch for vendor extensions.
    fn setf(&mut self, prop: FloatProp, _value: FloatValue) -> Result<()> {
        Err(HalError::NoSuchFloatProperty(prop))
    }

    /// Read an integer-valued property from the device itself.
    fn geti(&mut self, prop: IntProp) -> Result<u32> {
        Err(HalError::NoSuchIntProperty(prop))
    }

    /// Advance the device by one tick (poll transport, decode reports).
    fn tick(&mut self) {}

    /// Release device resources. Called exactly once, before drop.
    fn close(&mut self) {}
}
