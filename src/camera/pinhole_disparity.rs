//! Pinhole camera carrying disparity as a third image coordinate.
//!
//! The image-plane law is the ideal pinhole. On top of it,
//! [`DisparityModel`] exposes `(u, v, d)` projection and lifting, where
//! `d = fx * baseline / z` is the disparity a rectified stereo partner
//! `baseline` away would observe.

use crate::camera::pinhole::{project_normalized, ray_through};
use crate::camera::{
    intrinsics_from_params, params_with, validation, CameraModel, CameraModelError,
    DisparityModel, Intrinsics, ModelType, Resolution,
};
use log::debug;
use nalgebra::{DVector, Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Parameter order: `fx, fy, cx, cy, baseline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeDisparityModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
    /// Stereo baseline in scene units.
    pub baseline: S,
}

impl<S: RealField + Copy> PinholeDisparityModel<S> {
    /// Creates a new [`PinholeDisparityModel`].
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `baseline` - Stereo baseline, in the same unit as the lifted points.
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`PinholeDisparityModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidResolution`]
    /// * [`CameraModelError::InvalidParams`] if the baseline is not positive and finite.
    pub fn new(
        intrinsics: Intrinsics<S>,
        baseline: S,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let model = PinholeDisparityModel {
            intrinsics,
            resolution,
            baseline,
        };

        model.validate_params()?;
        debug!("new pinhole disparity model is: {:?}", model);

        Ok(model)
    }
}

pub(crate) fn validate_baseline<S: RealField + Copy>(baseline: S) -> Result<(), CameraModelError> {
    if !(baseline > S::zero()) || !baseline.is_finite() {
        return Err(CameraModelError::InvalidParams(
            "baseline must be positive and finite".to_string(),
        ));
    }
    Ok(())
}

impl<S: RealField + Copy> CameraModel for PinholeDisparityModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::PinholeDisparity;
    const PARAM_COUNT: usize = 5;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        self.intrinsics.denormalize(&project_normalized(point_c))
    }

    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        ray_through(&self.intrinsics.normalize(pixel))
    }

    fn params(&self) -> DVector<S> {
        params_with(&self.intrinsics, &[self.baseline])
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        PinholeDisparityModel::new(intrinsics_from_params(params), params[4], resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_resolution(&self.resolution)?;
        validate_baseline(self.baseline)
    }
}

impl<S: RealField + Copy> DisparityModel for PinholeDisparityModel<S> {
    fn baseline(&self) -> S {
        self.baseline
    }
}
