//! Implements the ideal Pinhole camera model.
//!
//! This module provides the [`PinholeModel`] struct, the simplest of the
//! projection variants: a central projection onto the `z = 1` plane followed
//! by the focal-length / principal-point affine map. It assumes no lens
//! distortion.

use crate::camera::{
    intrinsics_from_params, params_with, validation, CameraModel, CameraModelError, Intrinsics,
    ModelType, Resolution,
};
use log::debug;
use nalgebra::{DVector, Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Represents a Pinhole camera model.
///
/// This struct holds the intrinsic parameters (focal length, principal point)
/// and image resolution for a pinhole camera.
///
/// # Examples
///
/// ```rust
/// use camera_models::camera::pinhole::PinholeModel;
/// use camera_models::camera::{CameraModel, Intrinsics, Resolution};
/// use nalgebra::{Isometry3, Point3};
///
/// let model = PinholeModel::new(
///     Intrinsics::<f64>::new(500.0, 500.0, 320.0, 240.0),
///     Resolution::new(640, 480),
/// )
/// .unwrap();
///
/// let pixel = model.forward(&Isometry3::identity(), &Point3::new(0.1, 0.2, 1.0));
/// assert!((pixel.x - 370.0).abs() < 1e-9);
/// assert!((pixel.y - 340.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeModel<S> {
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics<S>,
    /// The resolution of the camera image, [`Resolution`] (width, height).
    pub resolution: Resolution,
}

impl<S: RealField + Copy> PinholeModel<S> {
    /// Creates a new [`PinholeModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidResolution`]
    pub fn new(
        intrinsics: Intrinsics<S>,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let model = PinholeModel {
            intrinsics,
            resolution,
        };

        model.validate_params()?;
        debug!("new pinhole model is: {:?}", model);

        Ok(model)
    }
}

/// Central projection onto the normalized image plane.
pub(crate) fn project_normalized<S: RealField + Copy>(point_c: &Point3<S>) -> Vector2<S> {
    Vector2::new(point_c.x / point_c.z, point_c.y / point_c.z)
}

/// Unit ray through a normalized image-plane coordinate.
pub(crate) fn ray_through<S: RealField + Copy>(normalized: &Vector2<S>) -> Vector3<S> {
    let r2 = normalized.x * normalized.x + normalized.y * normalized.y;
    let norm_inv = S::one() / (S::one() + r2).sqrt();

    Vector3::new(normalized.x * norm_inv, normalized.y * norm_inv, norm_inv)
}

impl<S: RealField + Copy> CameraModel for PinholeModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::Pinhole;
    const PARAM_COUNT: usize = 4;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    /// Applies the pinhole projection equations:
    /// `u = fx * X / Z + cx`
    /// `v = fy * Y / Z + cy`
    ///
    /// Points with `Z <= 0` produce a mirrored or infinite pixel.
    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        self.intrinsics.denormalize(&project_normalized(point_c))
    }

    /// Applies the inverse pinhole equations
    /// `mx = (u - cx) / fx`, `my = (v - cy) / fy`
    /// and normalizes `(mx, my, 1)`.
    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        ray_through(&self.intrinsics.normalize(pixel))
    }

    fn params(&self) -> DVector<S> {
        params_with(&self.intrinsics, &[])
    }

    /// Parameters are `fx, fy, cx, cy`.
    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        PinholeModel::new(intrinsics_from_params(params), resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_resolution(&self.resolution)?;
        Ok(())
    }
}
