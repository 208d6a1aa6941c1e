//! Always-available fallback driver.
//!
//! Enumerates one synthetic device that reports a fixed identity pose
//! and the geometry of a 7-inch 1280x800 single-panel HMD. Keeps the
//! registry exercisable without hardware and sits behind every vendor
//! driver as the lowest-priority fallback.

use glam::{Quat, Vec3};

use crate::driver::{DeviceBackend, Driver, OpenedDevice};
use crate::types::{DeviceDescriptor, DeviceProperties, FloatProp, FloatValue};
use crate::{HalError, Result};

pub struct NullDriver;

impl Driver for NullDriver {
    fn enumerate(&mut self, list: &mut Vec<DeviceDescriptor>) {
        list.push(DeviceDescriptor::new("visorhal", "Null Device", "(none)"));
    }

    fn open(&mut self, _desc: &DeviceDescriptor) -> Result<OpenedDevice> {
        let mut props = DeviceProperties {
            hsize: 0.14976,
            vsize: 0.0936,
            hres: 1280,
            vres: 800,
            lens_sep: 0.0635,
            lens_vpos: 0.0468,
            fov: 125.5144_f32.to_radians(),
            ratio: (1280.0 / 800.0) / 2.0,
            ..DeviceProperties::default()
        };
        props.recompute_projection();

        log::info!("opened null device");

        Ok(OpenedDevice {
            properties: props,
            backend: Box::new(NullDevice),
        })
    }
}

/// Synthetic device: identity orientation at the origin, forever.
struct NullDevice;

impl DeviceBackend for NullDevice {
    fn getf(&mut self, prop: FloatProp) -> Result<FloatValue> {
        match prop {
            FloatProp::RotationQuat => Ok(FloatValue::Rotation(Quat::IDENTITY)),
            FloatProp::PositionVector => Ok(FloatValue::Vector(Vec3::ZERO)),
            _ => Err(HalError::NoSuchFloatProperty(prop)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_exactly_one_device() {
        let mut list = Vec::new();
        NullDriver.enumerate(&mut list);
        NullDriver.enumerate(&mut list);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].product, "Null Device");
    }

    #[test]
    fn opens_with_projection_established() {
        let desc = DeviceDescriptor::new("visorhal", "Null Device", "(none)");
        let opened = NullDriver.open(&desc).unwrap();
        assert_eq!(opened.properties.hres, 1280);
        // recompute_projection ran: the cache is no longer the identity.
        assert_ne!(opened.properties.proj_left, glam::Mat4::IDENTITY);
    }
}
