//! Camera model abstractions shared by every projection variant.
//!
//! Each concrete model implements the static [`CameraModel`] trait and is
//! generic over its scalar precision. The [`polymorphic`] module erases the
//! concrete type behind [`polymorphic::CameraInterface`] so heterogeneous
//! models with the same scalar can be stored and called through one handle.
//!
//! Poses are world-to-camera rigid transforms supplied on every call:
//! `forward` maps a world point into the camera frame before projecting it,
//! `inverse_at_distance` maps the lifted camera-frame point back out.

use nalgebra::{DVector, Isometry3, Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod distortion;
pub mod fisheye;
pub mod generic;
pub mod pinhole;
pub mod pinhole_disparity;
pub mod pinhole_disparity_distorted;
pub mod pinhole_distorted;
pub mod polymorphic;
pub mod spherical;

pub use distortion::RadTanDistortion;
pub use fisheye::{FisheyeModel, IdealFisheyeModel};
pub use generic::{AsymmetricDistortion, FullGenericModel, IdealGenericModel, RadialPolynomial};
pub use pinhole::PinholeModel;
pub use pinhole_disparity::PinholeDisparityModel;
pub use pinhole_disparity_distorted::PinholeDisparityDistortedModel;
pub use pinhole_distorted::PinholeDistortedModel;
pub use polymorphic::{CameraFromModel, CameraInterface};
pub use spherical::{SphericalModel, SphericalPovRayModel};

/// Image-space coordinate, not necessarily integral.
pub type Pixel<S> = Vector2<S>;
/// Rigid world-to-camera transform.
pub type Pose<S> = Isometry3<S>;

/// Upper bound on iterations for every numerical inversion in this crate.
pub const MAX_ITERATIONS: usize = 20;

/// Focal lengths and principal point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics<S> {
    pub fx: S,
    pub fy: S,
    pub cx: S,
    pub cy: S,
}

impl<S: RealField + Copy> Intrinsics<S> {
    pub fn new(fx: S, fy: S, cx: S, cy: S) -> Self {
        Intrinsics { fx, fy, cx, cy }
    }

    /// Maps a pixel onto the normalized image plane.
    pub fn normalize(&self, pixel: &Vector2<S>) -> Vector2<S> {
        Vector2::new((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy)
    }

    /// Maps a normalized image-plane coordinate back to pixels.
    pub fn denormalize(&self, normalized: &Vector2<S>) -> Vector2<S> {
        Vector2::new(
            self.fx * normalized.x + self.cx,
            self.fy * normalized.y + self.cy,
        )
    }

    fn to_vec(&self) -> Vec<S> {
        vec![self.fx, self.fy, self.cx, self.cy]
    }
}

/// Declared sensor size. Serialized as `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }
}

impl From<[u32; 2]> for Resolution {
    fn from(value: [u32; 2]) -> Self {
        Resolution::new(value[0], value[1])
    }
}

impl From<Resolution> for [u32; 2] {
    fn from(value: Resolution) -> Self {
        [value.width, value.height]
    }
}

/// Identity of a projection variant.
///
/// The variant names are the persisted tag values and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    Pinhole,
    PinholeDistorted,
    PinholeDisparity,
    PinholeDisparityDistorted,
    IdealGeneric,
    FullGeneric,
    Spherical,
    SphericalPovRay,
    Fisheye,
    IdealFisheye,
}

impl ModelType {
    pub const ALL: [ModelType; 10] = [
        ModelType::Pinhole,
        ModelType::PinholeDistorted,
        ModelType::PinholeDisparity,
        ModelType::PinholeDisparityDistorted,
        ModelType::IdealGeneric,
        ModelType::FullGeneric,
        ModelType::Spherical,
        ModelType::SphericalPovRay,
        ModelType::Fisheye,
        ModelType::IdealFisheye,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Pinhole => "Pinhole",
            ModelType::PinholeDistorted => "PinholeDistorted",
            ModelType::PinholeDisparity => "PinholeDisparity",
            ModelType::PinholeDisparityDistorted => "PinholeDisparityDistorted",
            ModelType::IdealGeneric => "IdealGeneric",
            ModelType::FullGeneric => "FullGeneric",
            ModelType::Spherical => "Spherical",
            ModelType::SphericalPovRay => "SphericalPovRay",
            ModelType::Fisheye => "Fisheye",
            ModelType::IdealFisheye => "IdealFisheye",
        }
    }

    /// Whether the optics only illuminate a disk of the sensor, so that
    /// [`CameraModel::pixel_valid_circular`] is meaningful.
    pub fn is_fov_limited(&self) -> bool {
        matches!(self, ModelType::Fisheye | ModelType::IdealFisheye)
    }

    /// Whether the model carries a disparity coordinate.
    pub fn has_disparity(&self) -> bool {
        matches!(
            self,
            ModelType::PinholeDisparity | ModelType::PinholeDisparityDistorted
        )
    }

    /// Variants whose forward and inverse laws are not mutual inverses.
    ///
    /// `SphericalPovRay` lifts pixels with POV-Ray's y-up image convention
    /// but projects with the y-down camera convention, so lifting then
    /// projecting mirrors a pixel about the principal row.
    pub fn round_trip_exempt(&self) -> bool {
        matches!(self, ModelType::SphericalPovRay)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = CameraModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .iter()
            .copied()
            .find(|model_type| model_type.as_str() == s)
            .ok_or_else(|| CameraModelError::UnknownModelType(s.to_string()))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Resolution must be non-zero, got {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("{model_type} expects {expected} parameters, got {found}")]
    ParameterCount {
        model_type: ModelType,
        expected: usize,
        found: usize,
    },
    #[error("Unknown camera model type: {0}")]
    UnknownModelType(String),
    #[error("Expected a {expected} camera description, got {found}")]
    ModelTypeMismatch {
        expected: ModelType,
        found: ModelType,
    },
    #[error("No camera description for {0}")]
    MissingCamera(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("Failed to handle JSON: {0}")]
    JsonError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CameraModelError {
    fn from(err: serde_yaml::Error) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

impl From<serde_json::Error> for CameraModelError {
    fn from(err: serde_json::Error) -> Self {
        CameraModelError::JsonError(err.to_string())
    }
}

/// Converts an `f64` constant into the model scalar.
pub(crate) fn scalar<S: RealField + Copy>(value: f64) -> S {
    nalgebra::convert(value)
}

/// Residual below which iterative inversions stop, scaled to the precision of `S`.
pub(crate) fn convergence_tolerance<S: RealField + Copy>() -> S {
    S::default_epsilon() * scalar(100.0)
}

/// Radius below which a direction is treated as lying on the optical axis.
pub(crate) fn axis_epsilon<S: RealField + Copy>() -> S {
    S::default_epsilon()
}

/// Static contract implemented by every projection variant.
///
/// Models are configured once (see [`CameraModel::from_params`] and
/// [`crate::config::ParameterProvider`]) and are read-only afterwards, so all
/// methods take `&self` and are safe to call concurrently.
///
/// None of the projection methods fail: inputs outside a model's domain
/// produce a defined but not necessarily meaningful result. Check
/// [`CameraModel::pixel_valid`] / [`CameraModel::pixel_valid_circular`]
/// before trusting a lifted point.
pub trait CameraModel: Clone + fmt::Debug + Send + Sync + Sized {
    type Scalar: RealField + Copy;

    const MODEL_TYPE: ModelType;
    /// Length of the vector accepted by [`CameraModel::from_params`].
    const PARAM_COUNT: usize;

    fn resolution(&self) -> Resolution;

    fn intrinsics(&self) -> &Intrinsics<Self::Scalar>;

    /// Applies the optical law to a point already in the camera frame.
    fn project(&self, point_c: &Point3<Self::Scalar>) -> Vector2<Self::Scalar>;

    /// Lifts a pixel to a unit-length ray in the camera frame.
    fn unproject(&self, pixel: &Vector2<Self::Scalar>) -> Vector3<Self::Scalar>;

    /// Flat parameter vector in the order accepted by [`CameraModel::from_params`].
    fn params(&self) -> DVector<Self::Scalar>;

    fn from_params(
        params: &DVector<Self::Scalar>,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError>;

    fn validate_params(&self) -> Result<(), CameraModelError>;

    /// Projects a world point seen from `pose`.
    fn forward(
        &self,
        pose: &Pose<Self::Scalar>,
        point: &Point3<Self::Scalar>,
    ) -> Vector2<Self::Scalar> {
        self.project(&(pose * point))
    }

    /// Lifts `pixel` to the point `distance` along its ray and expresses it
    /// in the world frame of `pose`.
    fn inverse_at_distance(
        &self,
        pose: &Pose<Self::Scalar>,
        pixel: &Vector2<Self::Scalar>,
        distance: Self::Scalar,
    ) -> Point3<Self::Scalar> {
        let point_c = Point3::from(self.unproject(pixel) * distance);
        pose.inverse_transform_point(&point_c)
    }

    /// `true` iff `0 <= x < width` and `0 <= y < height`.
    fn pixel_valid(&self, x: Self::Scalar, y: Self::Scalar) -> bool {
        validation::pixel_in_bounds(&self.resolution(), x, y)
    }

    /// Rectangular validity plus, for field-of-view limited optics,
    /// membership in the illuminated disk.
    fn pixel_valid_circular(&self, pixel: &Vector2<Self::Scalar>) -> bool {
        self.pixel_valid(pixel.x, pixel.y)
    }

    fn model_type(&self) -> ModelType {
        Self::MODEL_TYPE
    }
}

/// Models that carry disparity as a third image coordinate.
///
/// Disparity is `fx * baseline / depth`, the horizontal shift between the
/// pixel and its match in a rectified stereo partner `baseline` apart.
pub trait DisparityModel: CameraModel {
    fn baseline(&self) -> Self::Scalar;

    fn disparity_from_depth(&self, depth: Self::Scalar) -> Self::Scalar {
        self.intrinsics().fx * self.baseline() / depth
    }

    fn depth_from_disparity(&self, disparity: Self::Scalar) -> Self::Scalar {
        self.intrinsics().fx * self.baseline() / disparity
    }

    /// Projects a world point to `(u, v, disparity)`.
    fn forward_disparity(
        &self,
        pose: &Pose<Self::Scalar>,
        point: &Point3<Self::Scalar>,
    ) -> Vector3<Self::Scalar> {
        let point_c = pose * point;
        let pixel = self.project(&point_c);
        Vector3::new(pixel.x, pixel.y, self.disparity_from_depth(point_c.z))
    }

    /// Lifts `(u, v, disparity)` to a world point.
    fn inverse_disparity(
        &self,
        pose: &Pose<Self::Scalar>,
        pixel_disparity: &Vector3<Self::Scalar>,
    ) -> Point3<Self::Scalar> {
        let depth = self.depth_from_disparity(pixel_disparity.z);
        let ray = self.unproject(&pixel_disparity.xy());
        let point_c = Point3::from(ray * (depth / ray.z));
        pose.inverse_transform_point(&point_c)
    }
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics<S: RealField + Copy>(
        intrinsics: &Intrinsics<S>,
    ) -> Result<(), CameraModelError> {
        if !(intrinsics.fx > S::zero()) || !(intrinsics.fy > S::zero()) {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.fx.is_finite() || !intrinsics.fy.is_finite() {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }

    pub fn validate_resolution(resolution: &Resolution) -> Result<(), CameraModelError> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(CameraModelError::InvalidResolution {
                width: resolution.width,
                height: resolution.height,
            });
        }
        Ok(())
    }

    pub fn validate_finite<S: RealField + Copy>(
        name: &str,
        values: &[S],
    ) -> Result<(), CameraModelError> {
        if values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(CameraModelError::InvalidParams(format!(
                "{name} must be finite"
            )))
        }
    }

    pub fn check_param_count<S: RealField + Copy>(
        model_type: ModelType,
        params: &DVector<S>,
        expected: usize,
    ) -> Result<(), CameraModelError> {
        if params.len() != expected {
            return Err(CameraModelError::ParameterCount {
                model_type,
                expected,
                found: params.len(),
            });
        }
        Ok(())
    }

    pub fn pixel_in_bounds<S: RealField + Copy>(resolution: &Resolution, x: S, y: S) -> bool {
        let width: S = scalar(resolution.width as f64);
        let height: S = scalar(resolution.height as f64);
        x >= S::zero() && x < width && y >= S::zero() && y < height
    }
}

/// Reads the leading four entries of a parameter vector as intrinsics.
pub(crate) fn intrinsics_from_params<S: RealField + Copy>(params: &DVector<S>) -> Intrinsics<S> {
    Intrinsics::new(params[0], params[1], params[2], params[3])
}

/// Concatenates intrinsics with model-specific trailing parameters.
pub(crate) fn params_with<S: RealField + Copy>(
    intrinsics: &Intrinsics<S>,
    extra: &[S],
) -> DVector<S> {
    let mut values = intrinsics.to_vec();
    values.extend_from_slice(extra);
    DVector::from_vec(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_round_trips_through_str() {
        for model_type in ModelType::ALL {
            let parsed: ModelType = model_type.as_str().parse().unwrap();
            assert_eq!(parsed, model_type);
            assert_eq!(model_type.to_string(), model_type.as_str());
        }
        assert!(matches!(
            "Orthographic".parse::<ModelType>(),
            Err(CameraModelError::UnknownModelType(_))
        ));
    }

    #[test]
    fn test_model_type_serde_uses_tag_names() {
        let json = serde_json::to_string(&ModelType::PinholeDisparityDistorted).unwrap();
        assert_eq!(json, "\"PinholeDisparityDistorted\"");
        let back: ModelType = serde_json::from_str("\"IdealFisheye\"").unwrap();
        assert_eq!(back, ModelType::IdealFisheye);
    }

    #[test]
    fn test_model_type_classification() {
        let fov_limited: Vec<_> = ModelType::ALL
            .into_iter()
            .filter(ModelType::is_fov_limited)
            .collect();
        assert_eq!(fov_limited, vec![ModelType::Fisheye, ModelType::IdealFisheye]);

        let exempt: Vec<_> = ModelType::ALL
            .into_iter()
            .filter(ModelType::round_trip_exempt)
            .collect();
        assert_eq!(exempt, vec![ModelType::SphericalPovRay]);

        assert!(ModelType::PinholeDisparity.has_disparity());
        assert!(!ModelType::Pinhole.has_disparity());
    }

    #[test]
    fn test_resolution_serializes_as_pair() {
        let yaml = serde_yaml::to_string(&Resolution::new(752, 480)).unwrap();
        let back: Resolution = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, Resolution::new(752, 480));
        assert_eq!(serde_json::to_string(&back).unwrap(), "[752,480]");
    }

    #[test]
    fn test_pixel_in_bounds_is_half_open() {
        let resolution = Resolution::new(640, 480);
        assert!(validation::pixel_in_bounds(&resolution, 0.0, 0.0));
        assert!(validation::pixel_in_bounds(&resolution, 639.9, 479.9));
        assert!(!validation::pixel_in_bounds(&resolution, 640.0, 10.0));
        assert!(!validation::pixel_in_bounds(&resolution, 10.0, 480.0));
        assert!(!validation::pixel_in_bounds(&resolution, -0.1, 10.0));
        assert!(!validation::pixel_in_bounds(&resolution, 10.0f32, -1.0f32));
    }

    #[test]
    fn test_thresholds_scale_with_precision() {
        assert_eq!(convergence_tolerance::<f64>(), f64::EPSILON * 100.0);
        assert_eq!(convergence_tolerance::<f32>(), f32::EPSILON * 100.0);
        assert_eq!(axis_epsilon::<f64>(), f64::EPSILON);
        assert_eq!(axis_epsilon::<f32>(), f32::EPSILON);
    }

    #[test]
    fn test_validate_intrinsics() {
        let intrinsics = Intrinsics::new(500.0, 500.0, 320.0, 240.0);
        assert!(validation::validate_intrinsics(&intrinsics).is_ok());
        assert!(matches!(
            validation::validate_intrinsics(&Intrinsics::new(-1.0, 500.0, 320.0, 240.0)),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));
        assert!(matches!(
            validation::validate_intrinsics(&Intrinsics::new(500.0, 500.0, f64::NAN, 240.0)),
            Err(CameraModelError::PrincipalPointMustBeFinite)
        ));
        assert!(validation::validate_resolution(&Resolution::new(0, 480)).is_err());
    }

    #[test]
    fn test_intrinsics_normalize_denormalize() {
        let intrinsics = Intrinsics::<f64>::new(500.0, 400.0, 320.0, 240.0);
        let pixel = Vector2::new(370.0, 280.0);
        let normalized = intrinsics.normalize(&pixel);
        assert!((normalized.x - 0.1).abs() < 1e-12);
        assert!((normalized.y - 0.1).abs() < 1e-12);
        assert!((intrinsics.denormalize(&normalized) - pixel).norm() < 1e-9);
    }
}
