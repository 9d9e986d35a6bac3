//! Equirectangular (longitude / latitude) camera models.
//!
//! The normalized image coordinate of a direction is its longitude about the
//! camera's y axis and its latitude above the x-z plane:
//!
//! ```text
//! lon = atan2(x, z)
//! lat = atan2(y, hypot(x, z))
//! ```
//!
//! so a sensor of `width x height` with `fx = width / 2pi` and
//! `fy = height / pi` covers the full sphere.
//!
//! [`SphericalPovRayModel`] lifts pixels with the y-up image convention used
//! by POV-Ray renderings while projecting with the y-down camera convention.
//! Its forward and inverse laws therefore do not compose to the identity:
//! lifting a pixel and projecting it again mirrors it about `cy`.

use crate::camera::{
    axis_epsilon, intrinsics_from_params, params_with, validation, CameraModel, CameraModelError,
    Intrinsics, ModelType, Resolution,
};
use log::debug;
use nalgebra::{DVector, Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// `(lon, lat)` of a camera-frame direction.
fn longitude_latitude<S: RealField + Copy>(point_c: &Point3<S>) -> Vector2<S> {
    let horizontal = (point_c.x * point_c.x + point_c.z * point_c.z).sqrt();
    if horizontal < axis_epsilon::<S>() {
        // Straight up or down: longitude is arbitrary
        return Vector2::new(S::zero(), point_c.y.atan2(horizontal));
    }
    Vector2::new(point_c.x.atan2(point_c.z), point_c.y.atan2(horizontal))
}

/// Unit ray at longitude `lon` and latitude `lat`.
fn direction<S: RealField + Copy>(lon: S, lat: S) -> Vector3<S> {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    Vector3::new(cos_lat * sin_lon, sin_lat, cos_lat * cos_lon)
}

fn validate<S: RealField + Copy>(
    intrinsics: &Intrinsics<S>,
    resolution: &Resolution,
) -> Result<(), CameraModelError> {
    validation::validate_intrinsics(intrinsics)?;
    validation::validate_resolution(resolution)
}

/// Parameter order: `fx, fy, cx, cy`, with `fx` and `fy` in pixels per radian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphericalModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
}

impl<S: RealField + Copy> SphericalModel<S> {
    /// Creates a new [`SphericalModel`].
    ///
    /// `fx` is pixels per radian of longitude and `fy` pixels per radian of latitude.
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`SphericalModel`].
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
        let model = SphericalModel {
            intrinsics,
            resolution,
        };

        model.validate_params()?;
        debug!("new spherical model is: {:?}", model);

        Ok(model)
    }
}

impl<S: RealField + Copy> CameraModel for SphericalModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::Spherical;
    const PARAM_COUNT: usize = 4;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        self.intrinsics.denormalize(&longitude_latitude(point_c))
    }

    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        let angles = self.intrinsics.normalize(pixel);
        direction(angles.x, angles.y)
    }

    fn params(&self) -> DVector<S> {
        params_with(&self.intrinsics, &[])
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        SphericalModel::new(intrinsics_from_params(params), resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validate(&self.intrinsics, &self.resolution)
    }
}

/// Spherical model whose inverse follows POV-Ray's y-up image rows.
///
/// Parameter order: `fx, fy, cx, cy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphericalPovRayModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
}

impl<S: RealField + Copy> SphericalPovRayModel<S> {
    /// Creates a new [`SphericalPovRayModel`].
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`SphericalPovRayModel`].
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
        let model = SphericalPovRayModel {
            intrinsics,
            resolution,
        };

        model.validate_params()?;
        debug!("new spherical POV-Ray model is: {:?}", model);

        Ok(model)
    }
}

impl<S: RealField + Copy> CameraModel for SphericalPovRayModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::SphericalPovRay;
    const PARAM_COUNT: usize = 4;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        self.intrinsics.denormalize(&longitude_latitude(point_c))
    }

    /// Rows grow upwards: latitude is `(cy - v) / fy`.
    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        let angles = self.intrinsics.normalize(pixel);
        direction(angles.x, -angles.y)
    }

    fn params(&self) -> DVector<S> {
        params_with(&self.intrinsics, &[])
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        SphericalPovRayModel::new(intrinsics_from_params(params), resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validate(&self.intrinsics, &self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn get_intrinsics() -> Intrinsics<f64> {
        Intrinsics::new(640.0 / (2.0 * PI), 480.0 / PI, 319.5, 239.5)
    }

    fn get_sample_model() -> SphericalModel<f64> {
        SphericalModel::new(get_intrinsics(), Resolution::new(640, 480)).unwrap()
    }

    #[test]
    fn test_spherical_cardinal_directions() {
        let model = get_sample_model();
        let center = Vector2::new(319.5, 239.5);

        assert_relative_eq!(model.project(&Point3::new(0.0, 0.0, 3.0)), center, epsilon = 1e-9);

        // 90 degrees to the right is a quarter of the panorama away
        let right = model.project(&Point3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(right.x, 319.5 + 160.0, epsilon = 1e-9);

        // Looking straight down (y is down) hits the bottom edge at lat = pi/2
        let down = model.project(&Point3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(down, Vector2::new(319.5, 239.5 + 240.0), epsilon = 1e-9);
    }

    #[test]
    fn test_spherical_project_unproject() {
        let model = get_sample_model();
        for point in [
            Point3::new(0.3, -0.2, 1.0),
            Point3::new(-1.0, 0.5, -2.0),
            Point3::new(0.0, -4.0, 0.1),
        ] {
            let ray = model.unproject(&model.project(&point));
            assert_relative_eq!(ray, point.coords.normalize(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_spherical_unproject_is_unit_length() {
        let model = get_sample_model();
        let ray = model.unproject(&Vector2::new(12.0, 400.0));
        assert_relative_eq!(ray.norm(), 1.0, epsilon = 1e-12);

        let lat = (400.0 - 239.5) / (480.0 / PI);
        assert!(lat < FRAC_PI_2);
        assert_relative_eq!(ray.y, lat.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_spherical_round_trip_with_pose() {
        let model = get_sample_model();
        let pose = Isometry3::translation(10.0, 20.0, 30.0);
        for pixel in [
            Vector2::new(0.0, 0.0),
            Vector2::new(639.0, 479.0),
            Vector2::new(200.0, 17.0),
        ] {
            let point = model.inverse_at_distance(&pose, &pixel, 1.5);
            assert_relative_eq!(model.forward(&pose, &point), pixel, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pov_ray_lifting_mirrors_rows() {
        let model = SphericalPovRayModel::new(get_intrinsics(), Resolution::new(640, 480)).unwrap();
        let pose = Isometry3::translation(10.0, 20.0, 30.0);

        let pixel = Vector2::new(100.0, 50.0);
        let point = model.inverse_at_distance(&pose, &pixel, 1.5);
        let reprojected = model.forward(&pose, &point);

        assert_relative_eq!(reprojected.x, 100.0, epsilon = 1e-6);
        assert_relative_eq!(reprojected.y, 2.0 * 239.5 - 50.0, epsilon = 1e-6);

        // Rows on the principal line survive unchanged.
        let on_axis = Vector2::new(400.0, 239.5);
        let point = model.inverse_at_distance(&pose, &on_axis, 1.5);
        assert_relative_eq!(model.forward(&pose, &point), on_axis, epsilon = 1e-6);
    }

    #[test]
    fn test_pov_ray_forward_matches_spherical() {
        let spherical = get_sample_model();
        let pov_ray =
            SphericalPovRayModel::new(get_intrinsics(), Resolution::new(640, 480)).unwrap();
        let point = Point3::new(0.7, -0.4, 1.3);
        assert_eq!(pov_ray.project(&point), spherical.project(&point));
        assert_eq!(pov_ray.model_type(), ModelType::SphericalPovRay);
    }

    #[test]
    fn test_spherical_constructors_report_invalid_parameters() {
        let resolution = Resolution::new(640, 480);
        assert!(matches!(
            SphericalModel::new(Intrinsics::new(0.0, 480.0 / PI, 319.5, 239.5), resolution),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));
        assert!(matches!(
            SphericalPovRayModel::new(get_intrinsics(), Resolution::new(640, 0)),
            Err(CameraModelError::InvalidResolution {
                width: 640,
                height: 0
            })
        ));
        assert!(matches!(
            SphericalPovRayModel::new(Intrinsics::new(100.0, 100.0, f64::NAN, 239.5), resolution),
            Err(CameraModelError::PrincipalPointMustBeFinite)
        ));
    }
}
