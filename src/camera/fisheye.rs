//! Field-of-view limited fisheye camera models.
//!
//! [`FisheyeModel`] is the single-parameter FOV (arctangent) model of
//! Devernay and Faugeras:
//!
//! ```text
//! r_d = atan(2 tan(w / 2) tan(theta)) / w
//! ```
//!
//! [`IdealFisheyeModel`] is the equidistant projection `r_d = theta`.
//!
//! Both carry the full field of view `fov` of the optics. Only a disk of the
//! sensor is illuminated, so [`CameraModel::pixel_valid_circular`] also
//! requires the normalized radius of a pixel to be within the image of
//! `theta = fov / 2`.

use crate::camera::{
    axis_epsilon, intrinsics_from_params, params_with, scalar, validation, CameraModel,
    CameraModelError, Intrinsics, ModelType, Resolution,
};
use log::debug;
use nalgebra::{DVector, Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};

fn validate_fov<S: RealField + Copy>(fov: S) -> Result<(), CameraModelError> {
    if !(fov > S::zero() && fov <= S::two_pi()) {
        return Err(CameraModelError::InvalidParams(
            "fov must be in (0, 2pi]".to_string(),
        ));
    }
    Ok(())
}

/// Unit ray at `theta` from the axis, in the image direction of `normalized`
/// whose length is `radius`.
fn ray_at_angle<S: RealField + Copy>(normalized: &Vector2<S>, radius: S, theta: S) -> Vector3<S> {
    let scale = theta.sin() / radius;
    Vector3::new(normalized.x * scale, normalized.y * scale, theta.cos())
}

/// FOV fisheye model.
///
/// Parameter order: `fx, fy, cx, cy, w, fov`, both angles in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FisheyeModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
    /// Distortion parameter, the field of view of the ideal lens.
    pub w: S,
    /// Full field of view of the optics.
    pub fov: S,
}

impl<S: RealField + Copy> FisheyeModel<S> {
    /// Creates a new [`FisheyeModel`].
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `w` - Field-of-view distortion parameter, in radians.
    /// * `fov` - Full angular field of view, in radians.
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`FisheyeModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidResolution`]
    /// * [`CameraModelError::InvalidParams`] if `w` is outside `(0, pi)` or `fov` outside
    ///   `(0, 2pi]`.
    pub fn new(
        intrinsics: Intrinsics<S>,
        w: S,
        fov: S,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let model = FisheyeModel {
            intrinsics,
            resolution,
            w,
            fov,
        };

        model.validate_params()?;
        debug!("new fisheye model is: {:?}", model);

        Ok(model)
    }

    fn two_tan_half_w(&self) -> S {
        scalar::<S>(2.0) * (self.w * scalar(0.5)).tan()
    }

    /// Normalized image radius of a ray `theta` from the axis.
    pub fn radius_at(&self, theta: S) -> S {
        (self.two_tan_half_w() * theta.sin()).atan2(theta.cos()) / self.w
    }

    /// Normalized radius of the illuminated disk.
    pub fn max_image_radius(&self) -> S {
        self.radius_at(self.fov * scalar(0.5))
    }
}

impl<S: RealField + Copy> CameraModel for FisheyeModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::Fisheye;
    const PARAM_COUNT: usize = 6;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        let rho = (point_c.x * point_c.x + point_c.y * point_c.y).sqrt();
        let factor = if rho < axis_epsilon::<S>() {
            self.two_tan_half_w() / (self.w * point_c.z)
        } else {
            (self.two_tan_half_w() * rho).atan2(point_c.z) / (self.w * rho)
        };

        self.intrinsics
            .denormalize(&Vector2::new(point_c.x * factor, point_c.y * factor))
    }

    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        let normalized = self.intrinsics.normalize(pixel);
        let radius = normalized.norm();
        if radius < axis_epsilon::<S>() {
            let scale = self.w / self.two_tan_half_w();
            return Vector3::new(normalized.x * scale, normalized.y * scale, S::one()).normalize();
        }

        let angle = radius * self.w;
        let theta = angle.sin().atan2(angle.cos() * self.two_tan_half_w());
        ray_at_angle(&normalized, radius, theta)
    }

    fn pixel_valid_circular(&self, pixel: &Vector2<S>) -> bool {
        self.pixel_valid(pixel.x, pixel.y)
            && self.intrinsics.normalize(pixel).norm() <= self.max_image_radius()
    }

    fn params(&self) -> DVector<S> {
        params_with(&self.intrinsics, &[self.w, self.fov])
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        FisheyeModel::new(intrinsics_from_params(params), params[4], params[5], resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_resolution(&self.resolution)?;
        if !(self.w > S::zero() && self.w < S::pi()) {
            return Err(CameraModelError::InvalidParams(
                "w must be in (0, pi)".to_string(),
            ));
        }
        validate_fov(self.fov)
    }
}

/// Equidistant fisheye model.
///
/// Parameter order: `fx, fy, cx, cy, fov`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdealFisheyeModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
    pub fov: S,
}

impl<S: RealField + Copy> IdealFisheyeModel<S> {
    /// Creates a new [`IdealFisheyeModel`].
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `fov` - Full angular field of view, in radians.
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`IdealFisheyeModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidResolution`]
    /// * [`CameraModelError::InvalidParams`] if `fov` is outside `(0, 2pi]`.
    pub fn new(
        intrinsics: Intrinsics<S>,
        fov: S,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let model = IdealFisheyeModel {
            intrinsics,
            resolution,
            fov,
        };

        model.validate_params()?;
        debug!("new ideal fisheye model is: {:?}", model);

        Ok(model)
    }

    /// Normalized radius of the illuminated disk, `fov / 2`.
    pub fn max_image_radius(&self) -> S {
        self.fov * scalar(0.5)
    }
}

impl<S: RealField + Copy> CameraModel for IdealFisheyeModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::IdealFisheye;
    const PARAM_COUNT: usize = 5;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        let rho = (point_c.x * point_c.x + point_c.y * point_c.y).sqrt();
        let factor = if rho < axis_epsilon::<S>() {
            S::one() / point_c.z
        } else {
            rho.atan2(point_c.z) / rho
        };

        self.intrinsics
            .denormalize(&Vector2::new(point_c.x * factor, point_c.y * factor))
    }

    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        let normalized = self.intrinsics.normalize(pixel);
        let theta = normalized.norm();
        if theta < axis_epsilon::<S>() {
            return Vector3::new(normalized.x, normalized.y, S::one()).normalize();
        }
        ray_at_angle(&normalized, theta, theta)
    }

    fn pixel_valid_circular(&self, pixel: &Vector2<S>) -> bool {
        self.pixel_valid(pixel.x, pixel.y)
            && self.intrinsics.normalize(pixel).norm() <= self.max_image_radius()
    }

    fn params(&self) -> DVector<S> {
        params_with(&self.intrinsics, &[self.fov])
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        IdealFisheyeModel::new(intrinsics_from_params(params), params[4], resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_resolution(&self.resolution)?;
        validate_fov(self.fov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;

    fn get_fisheye_model() -> FisheyeModel<f64> {
        FisheyeModel::new(
            Intrinsics::new(250.0, 250.0, 319.5, 239.5),
            1.0,
            150f64.to_radians(),
            Resolution::new(640, 480),
        )
        .unwrap()
    }

    fn get_ideal_model() -> IdealFisheyeModel<f64> {
        IdealFisheyeModel::new(
            Intrinsics::new(200.0, 200.0, 319.5, 239.5),
            190f64.to_radians(),
            Resolution::new(640, 480),
        )
        .unwrap()
    }

    fn corners() -> [Vector2<f64>; 4] {
        [
            Vector2::new(0.0, 0.0),
            Vector2::new(639.0, 0.0),
            Vector2::new(0.0, 479.0),
            Vector2::new(639.0, 479.0),
        ]
    }

    #[test]
    fn test_fisheye_project_unproject() {
        let model = get_fisheye_model();
        for point in [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.2, 0.1, 1.0),
            Point3::new(-3.0, 1.0, 1.0),
        ] {
            let ray = model.unproject(&model.project(&point));
            assert_relative_eq!(ray, point.coords.normalize(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_fisheye_axis_limit_is_continuous() {
        let model = get_fisheye_model();
        let on_axis = model.project(&Point3::new(1e-20, 0.0, 1.0));
        let near_axis = model.project(&Point3::new(1e-6, 0.0, 1.0));
        assert!(on_axis.x.is_finite());
        assert_relative_eq!(on_axis, Vector2::new(319.5, 239.5), epsilon = 1e-9);
        // First-order slope 2 tan(w / 2) / w
        let slope = 2.0 * 0.5f64.tan();
        assert_relative_eq!(near_axis.x - 319.5, 250.0 * slope * 1e-6, epsilon = 1e-9);
    }

    #[test]
    fn test_fisheye_circular_boundary() {
        let model = get_fisheye_model();
        for corner in corners() {
            assert!(model.pixel_valid(corner.x, corner.y));
            assert!(!model.pixel_valid_circular(&corner));
        }
        assert!(model.pixel_valid_circular(&Vector2::new(319.5, 239.5)));
        assert!(model.pixel_valid_circular(&Vector2::new(320.0, 240.0)));

        // The rim of the disk is the image of half the field of view.
        let rim = model.radius_at(75f64.to_radians());
        assert_relative_eq!(model.max_image_radius(), rim, epsilon = 1e-12);
    }

    #[test]
    fn test_fisheye_round_trip_with_pose() {
        let model = get_fisheye_model();
        let pose = Isometry3::translation(10.0, 20.0, 30.0);
        for pixel in [
            Vector2::new(0.0, 239.0),
            Vector2::new(319.0, 0.0),
            Vector2::new(500.0, 400.0),
        ] {
            assert!(model.pixel_valid_circular(&pixel));
            let point = model.inverse_at_distance(&pose, &pixel, 1.5);
            assert_relative_eq!(model.forward(&pose, &point), pixel, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_fisheye_rejects_bad_params() {
        let intrinsics = Intrinsics::new(250.0, 250.0, 319.5, 239.5);
        let resolution = Resolution::new(640, 480);
        assert!(FisheyeModel::new(intrinsics, 0.0, 2.0, resolution).is_err());
        assert!(FisheyeModel::new(intrinsics, 4.0, 2.0, resolution).is_err());
        assert!(FisheyeModel::new(intrinsics, 1.0, -1.0, resolution).is_err());
        assert!(FisheyeModel::new(intrinsics, 1.0, 7.0, resolution).is_err());
    }

    #[test]
    fn test_ideal_fisheye_is_equidistant() {
        let model = get_ideal_model();
        let theta = 0.8f64;
        let pixel = model.project(&Point3::new(theta.sin(), 0.0, theta.cos()));
        assert_relative_eq!(pixel.x, 319.5 + 200.0 * theta, epsilon = 1e-9);
        assert_relative_eq!(pixel.y, 239.5, epsilon = 1e-12);
    }

    #[test]
    fn test_ideal_fisheye_sees_behind_the_image_plane() {
        let model = get_ideal_model();
        let point = Point3::new(1.0, 0.5, -0.05);
        let pixel = model.project(&point);
        assert!(model.pixel_valid_circular(&pixel));
        assert_relative_eq!(model.unproject(&pixel), point.coords.normalize(), epsilon = 1e-9);
    }

    #[test]
    fn test_ideal_fisheye_circular_boundary() {
        let model = get_ideal_model();
        for corner in corners() {
            assert!(!model.pixel_valid_circular(&corner));
        }
        assert!(model.pixel_valid_circular(&Vector2::new(319.5, 239.5)));
        // Left and right edge centres are inside the 190 degree disk.
        assert!(model.pixel_valid_circular(&Vector2::new(0.0, 239.5)));
        assert!(model.pixel_valid_circular(&Vector2::new(639.0, 239.5)));
    }

    #[test]
    fn test_ideal_fisheye_params_round_trip() {
        let model = get_ideal_model();
        let params = model.params();
        assert_eq!(params.len(), IdealFisheyeModel::<f64>::PARAM_COUNT);
        assert_eq!(IdealFisheyeModel::from_params(&params, model.resolution).unwrap(), model);
    }
}
