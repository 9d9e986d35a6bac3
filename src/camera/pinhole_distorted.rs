//! Implements the Pinhole camera model with radial-tangential distortion.
//!
//! [`PinholeDistortedModel`] projects like [`crate::camera::PinholeModel`]
//! and then bends the normalized coordinate with a [`RadTanDistortion`].
//! Lifting a pixel removes the distortion iteratively (bounded Newton), so
//! far outside the calibrated region the lifted ray is a best estimate only.

use crate::camera::distortion::RadTanDistortion;
use crate::camera::pinhole::{project_normalized, ray_through};
use crate::camera::{
    intrinsics_from_params, params_with, validation, CameraModel, CameraModelError, Intrinsics,
    ModelType, Resolution,
};
use log::debug;
use nalgebra::{DVector, Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pinhole camera with five OpenCV-style distortion coefficients.
///
/// Parameter order: `fx, fy, cx, cy, k1, k2, p1, p2, k3`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeDistortedModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
    pub distortion: RadTanDistortion<S>,
}

impl<S: RealField + Copy> PinholeDistortedModel<S> {
    /// Creates a new [`PinholeDistortedModel`].
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `distortion` - Radial-tangential coefficients `k1, k2, p1, p2, k3`.
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`PinholeDistortedModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidResolution`]
    /// * [`CameraModelError::InvalidParams`] if a distortion coefficient is not finite.
    pub fn new(
        intrinsics: Intrinsics<S>,
        distortion: RadTanDistortion<S>,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let model = PinholeDistortedModel {
            intrinsics,
            resolution,
            distortion,
        };

        model.validate_params()?;
        debug!("new pinhole distorted model is: {:?}", model);

        Ok(model)
    }

    /// Lifts a pixel and reports the undistortion residual in normalized units.
    pub fn unproject_with_residual(&self, pixel: &Vector2<S>) -> (Vector3<S>, S) {
        let (undistorted, residual) = self
            .distortion
            .undistort_with_residual(&self.intrinsics.normalize(pixel));
        (ray_through(&undistorted), residual)
    }
}

/// Provides a debug string representation for [`PinholeDistortedModel`].
impl<S: RealField + Copy> fmt::Debug for PinholeDistortedModel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PinholeDistortedModel [fx: {} fy: {} cx: {} cy: {} distortions: {:?} resolution: {}x{}]",
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.distortion.coefficients(),
            self.resolution.width,
            self.resolution.height,
        )
    }
}

impl<S: RealField + Copy> CameraModel for PinholeDistortedModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::PinholeDistorted;
    const PARAM_COUNT: usize = 9;

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
        self.unproject_with_residual(pixel).0
    }

    fn params(&self) -> DVector<S> {
        params_with(&self.intrinsics, &self.distortion.coefficients())
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        let distortion = RadTanDistortion::from_slice(&params.as_slice()[4..9]);
        PinholeDistortedModel::new(intrinsics_from_params(params), distortion, resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_resolution(&self.resolution)?;
        self.distortion.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;

    fn get_sample_model() -> PinholeDistortedModel<f64> {
        PinholeDistortedModel::new(
            Intrinsics::new(461.629, 460.152, 362.680, 246.049),
            RadTanDistortion::new(-0.28340811, 0.07395907, 0.00019359, 1.76187114e-05, 0.0),
            Resolution::new(752, 480),
        )
        .unwrap()
    }

    #[test]
    fn test_distorted_project_unproject() {
        let model = get_sample_model();
        let point_3d = Point3::new(0.5, -0.3, 2.0);

        let point_2d = model.project(&point_3d);
        assert!(model.pixel_valid(point_2d.x, point_2d.y));

        let (ray, residual) = model.unproject_with_residual(&point_2d);
        assert!(residual < 1e-9);
        assert_relative_eq!(ray, point_3d.coords.normalize(), epsilon = 1e-6);
    }

    #[test]
    fn test_distortion_moves_off_axis_points() {
        let model = get_sample_model();
        let ideal = model
            .intrinsics
            .denormalize(&project_normalized(&Point3::new(0.3, 0.4, 1.0)));
        let distorted = model.project(&Point3::new(0.3, 0.4, 1.0));
        // Barrel distortion pulls points towards the principal point.
        let center = Vector2::new(model.intrinsics.cx, model.intrinsics.cy);
        assert!((distorted - center).norm() < (ideal - center).norm());

        // The principal point itself is a fixed point.
        let on_axis = model.project(&Point3::new(0.0, 0.0, 4.0));
        assert_relative_eq!(on_axis, center, epsilon = 1e-12);
    }

    #[test]
    fn test_distorted_multiple_points() {
        let model = get_sample_model();
        let pose = Isometry3::translation(10.0, 20.0, 30.0);

        let test_points = vec![
            Point3::new(0.0, 0.0, 1.0),   // Center
            Point3::new(0.5, 0.0, 1.0),   // Right
            Point3::new(-0.5, 0.0, 1.0),  // Left
            Point3::new(0.0, 0.4, 1.0),   // Bottom
            Point3::new(0.3, -0.4, 1.0),  // Top-right
            Point3::new(-0.3, 0.35, 1.0), // Bottom-left
        ];

        for point_c in test_points {
            let point_w = pose.inverse_transform_point(&point_c);
            let pixel = model.forward(&pose, &point_w);
            let lifted = model.inverse_at_distance(&pose, &pixel, point_c.coords.norm());
            assert_relative_eq!(lifted, point_w, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_distorted_params_order() {
        let model = get_sample_model();
        let params = model.params();
        assert_eq!(params.len(), 9);
        assert_eq!(params[4], -0.28340811);
        assert_eq!(params[6], 0.00019359);
        assert_eq!(
            PinholeDistortedModel::from_params(&params, model.resolution).unwrap(),
            model
        );
    }

    #[test]
    fn test_distorted_rejects_non_finite_coefficients() {
        let mut params = get_sample_model().params();
        params[5] = f64::INFINITY;
        assert!(matches!(
            PinholeDistortedModel::from_params(&params, Resolution::new(752, 480)),
            Err(CameraModelError::InvalidParams(_))
        ));
    }
}
