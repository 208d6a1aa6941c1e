use glam::{Mat4, Quat, Vec3};

/// String-valued fields of a device list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringProp {
    Vendor,
    Product,
    Path,
}

/// Float-valued device properties.
///
/// Pose and matrix reads go through the registry's correction and
/// derivation layer; scalar geometry reads come from the device's
/// [`DeviceProperties`]. `Vendor` values are routed to the device
/// backend untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatProp {
    /// Absolute orientation as a unit quaternion, calibration applied.
    RotationQuat,
    /// Position in meters, calibration applied.
    PositionVector,
    LeftEyeGlModelviewMatrix,
    RightEyeGlModelviewMatrix,
    LeftEyeGlProjectionMatrix,
    RightEyeGlProjectionMatrix,
    /// Physical screen width in meters.
    ScreenHorizontalSize,
    /// Physical screen height in meters.
    ScreenVerticalSize,
    /// Distance between the lens centers in meters.
    LensHorizontalSeparation,
    /// Lens center height from the screen bottom in meters.
    LensVerticalPosition,
    LeftEyeFov,
    RightEyeFov,
    LeftEyeAspectRatio,
    RightEyeAspectRatio,
    /// Inter-pupillary distance in meters.
    EyeIpd,
    ProjectionZFar,
    ProjectionZNear,
    /// Vendor-specific extension property.
    Vendor(u32),
}

/// Integer-valued device properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntProp {
    ScreenHorizontalResolution,
    ScreenVerticalResolution,
    /// Vendor-specific extension property.
    Vendor(u32),
}

/// A dynamically typed float property value.
///
/// Matrices use the OpenGL convention: flattening with
/// [`Mat4::to_cols_array`] yields the 16-float layout a GL renderer
/// expects to load directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatValue {
    Scalar(f32),
    Vector(Vec3),
    Rotation(Quat),
    Matrix(Mat4),
}

impl FloatValue {
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            FloatValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            FloatValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_rotation(&self) -> Option<Quat> {
        match self {
            FloatValue::Rotation(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<Mat4> {
        match self {
            FloatValue::Matrix(m) => Some(*m),
            _ => None,
        }
    }
}

/// One entry of the enumeration snapshot produced by a probe.
///
/// Descriptors are immutable once produced; the next probe replaces the
/// whole snapshot, so indices into it are only meaningful until then.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub vendor: String,
    pub product: String,
    pub path: String,
    /// Index of the owning driver in the registry's driver sequence.
    /// Stamped by the registry after the driver appends its entries.
    pub(crate) driver: usize,
}

impl DeviceDescriptor {
    pub fn new(
        vendor: impl Into<String>,
        product: impl Into<String>,
        path: impl Into<String>,
    ) -> DeviceDescriptor {
        DeviceDescriptor {
            vendor: vendor.into(),
            product: product.into(),
            path: path.into(),
            driver: 0,
        }
    }
}

/// Display and optics geometry of an open device.
///
/// Drivers establish these at open; the two projection matrices are
/// cached derivations that must be refreshed with
/// [`DeviceProperties::recompute_projection`] whenever the fields they
/// depend on change.
#[derive(Debug, Clone)]
pub struct DeviceProperties {
    /// Inter-pupillary distance in meters.
    pub ipd: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Physical screen size in meters.
    pub hsize: f32,
    pub vsize: f32,
    /// Screen resolution in pixels.
    pub hres: u32,
    pub vres: u32,
    /// Distance between the lens centers in meters.
    pub lens_sep: f32,
    /// Lens center height from the screen bottom in meters.
    pub lens_vpos: f32,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Per-eye aspect ratio.
    pub ratio: f32,
    /// Cached per-eye projection matrices.
    pub proj_left: Mat4,
    pub proj_right: Mat4,
}

impl Default for DeviceProperties {
    fn default() -> DeviceProperties {
        DeviceProperties {
            ipd: 0.061,
            znear: 0.1,
            zfar: 1000.0,
            hsize: 0.0,
            vsize: 0.0,
            hres: 0,
            vres: 0,
            lens_sep: 0.0,
            lens_vpos: 0.0,
            fov: 0.0,
            ratio: 0.0,
            proj_left: Mat4::IDENTITY,
            proj_right: Mat4::IDENTITY,
        }
    }
}

impl DeviceProperties {
    /// Rebuild the cached per-eye projection matrices.
    ///
    /// The lens is not centered over each half-screen; the base
    /// perspective matrix is shifted horizontally by the normalized
    /// offset of the lens from the half-screen center, positive for the
    /// left eye and negative for the right.
    pub fn recompute_projection(&mut self) {
        let screen_center = self.hsize / 4.0;
        let lens_shift = screen_center - self.lens_sep / 2.0;
        let proj_offset = 4.0 * lens_shift / self.hsize;

        let base = Mat4::perspective_rh_gl(self.fov, self.ratio, self.znear, self.zfar);

        self.proj_left = Mat4::from_translation(Vec3::new(proj_offset, 0.0, 0.0)) * base;
        self.proj_right = Mat4::from_translation(Vec3::new(-proj_offset, 0.0, 0.0)) * base;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_props() -> DeviceProperties {
        let mut props = DeviceProperties {
            hsize: 0.14976,
            vsize: 0.0936,
            lens_sep: 0.0635,
            fov: 90.0_f32.to_radians(),
            ratio: 0.8,
            ..DeviceProperties::default()
        };
        props.recompute_projection();
        props
    }

    #[test]
    fn default_values() {
        let props = DeviceProperties::default();
        assert_eq!(props.ipd, 0.061);
        assert_eq!(props.znear, 0.1);
        assert_eq!(props.zfar, 1000.0);
    }

    #[test]
    fn projection_eyes_differ_only_in_offset_sign() {
        let props = test_props();
        let left = props.proj_left.to_cols_array();
        let right = props.proj_right.to_cols_array();

        // The lens shift lands in the third column's x component.
        for i in 0..16 {
            if i == 8 {
                assert!((left[i] + right[i]).abs() < 1e-6);
                assert!(left[i].abs() > 1e-6);
            } else {
                assert_eq!(left[i], right[i]);
            }
        }
    }

    #[test]
    fn centered_lenses_give_identical_projections() {
        let mut props = test_props();
        props.lens_sep = props.hsize / 2.0;
        props.recompute_projection();
        assert_eq!(props.proj_left, props.proj_right);
    }

    #[test]
    fn recompute_tracks_clip_planes() {
        let mut props = test_props();
        let before = props.proj_left;
        props.znear = 0.5;
        props.recompute_projection();
        assert_ne!(before, props.proj_left);
    }
}
