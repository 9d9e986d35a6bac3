//! Distorted pinhole camera carrying disparity as a third image coordinate.
//!
//! Combines the radial-tangential image law of
//! [`crate::camera::PinholeDistortedModel`] with the disparity coordinate of
//! [`crate::camera::PinholeDisparityModel`]. Disparity is defined on the
//! undistorted geometry (`fx * baseline / z`), so it does not depend on where
//! distortion moves the pixel.

use crate::camera::distortion::RadTanDistortion;
use crate::camera::pinhole::{project_normalized, ray_through};
use crate::camera::pinhole_disparity::validate_baseline;
use crate::camera::{
    intrinsics_from_params, params_with, validation, CameraModel, CameraModelError,
    DisparityModel, Intrinsics, ModelType, Resolution,
};
use log::debug;
use nalgebra::{DVector, Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Parameter order: `fx, fy, cx, cy, baseline, k1, k2, p1, p2, k3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeDisparityDistortedModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
    pub baseline: S,
    pub distortion: RadTanDistortion<S>,
}

impl<S: RealField + Copy> PinholeDisparityDistortedModel<S> {
    /// Creates a new [`PinholeDisparityDistortedModel`].
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `baseline` - Stereo baseline, in the same unit as the lifted points.
    /// * `distortion` - Radial-tangential coefficients `k1, k2, p1, p2, k3`.
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`PinholeDisparityDistortedModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidResolution`]
    /// * [`CameraModelError::InvalidParams`] if the baseline is not positive and finite, or a
    ///   distortion coefficient is not finite.
    pub fn new(
        intrinsics: Intrinsics<S>,
        baseline: S,
        distortion: RadTanDistortion<S>,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let model = PinholeDisparityDistortedModel {
            intrinsics,
            resolution,
            baseline,
            distortion,
        };

        model.validate_params()?;
        debug!("new pinhole disparity distorted model is: {:?}", model);

        Ok(model)
    }
}

impl<S: RealField + Copy> CameraModel for PinholeDisparityDistortedModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::PinholeDisparityDistorted;
    const PARAM_COUNT: usize = 10;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        let distorted = self.distortion.distort(&project_normalized(point_c));
        self.intrinsics.denormalize(&distorted)
    }

    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        let undistorted = self.distortion.undistort(&self.intrinsics.normalize(pixel));
        ray_through(&undistorted)
    }

    fn params(&self) -> DVector<S> {
        let mut extra = vec![self.baseline];
        extra.extend_from_slice(&self.distortion.coefficients());
        params_with(&self.intrinsics, &extra)
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        let distortion = RadTanDistortion::from_slice(&params.as_slice()[5..10]);
        PinholeDisparityDistortedModel::new(
            intrinsics_from_params(params),
            params[4],
            distortion,
            resolution,
        )
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_resolution(&self.resolution)?;
        validate_baseline(self.baseline)?;
        self.distortion.validate()
    }
}

impl<S: RealField + Copy> DisparityModel for PinholeDisparityDistortedModel<S> {
    fn baseline(&self) -> S {
        self.baseline
    }
}
