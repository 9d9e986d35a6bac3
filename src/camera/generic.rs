//! Generic polynomial camera models after Kannala and Brandt.
//!
//! Both models map the angle `theta` between a ray and the optical axis to a
//! normalized image radius through an odd polynomial
//! `r(theta) = theta + k1 theta^3 + k2 theta^5 + k3 theta^7 + k4 theta^9`,
//! keeping the ray's azimuth `phi`. Unlike the pinhole family they stay well
//! defined up to and beyond 90 degrees off axis.
//!
//! [`FullGenericModel`] adds the asymmetric radial and tangential terms of
//! the full model:
//!
//! ```text
//! dr(theta, phi) = (l1 theta + l2 theta^3 + l3 theta^5)
//!                 (i1 cos phi + i2 sin phi + i3 cos 2phi + i4 sin 2phi)
//! dt(theta, phi) = (m1 theta + m2 theta^3 + m3 theta^5)
//!                 (j1 cos phi + j2 sin phi + j3 cos 2phi + j4 sin 2phi)
//! ```
//!
//! applied along the radial and tangential unit vectors respectively.

use crate::camera::{
    axis_epsilon, convergence_tolerance, intrinsics_from_params, params_with, validation,
    CameraModel, CameraModelError, Intrinsics, ModelType, Resolution, MAX_ITERATIONS,
};
use log::{debug, trace};
use nalgebra::{DVector, Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Odd polynomial mapping the off-axis angle to the normalized image radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialPolynomial<S> {
    pub k1: S,
    pub k2: S,
    pub k3: S,
    pub k4: S,
}

impl<S: RealField + Copy> RadialPolynomial<S> {
    pub fn new(k1: S, k2: S, k3: S, k4: S) -> Self {
        RadialPolynomial { k1, k2, k3, k4 }
    }

    pub fn coefficients(&self) -> [S; 4] {
        [self.k1, self.k2, self.k3, self.k4]
    }

    /// `r(theta)`.
    pub fn radius(&self, theta: S) -> S {
        let theta2 = theta * theta;
        let tail = self.k2 + theta2 * (self.k3 + theta2 * self.k4);
        theta * (S::one() + theta2 * (self.k1 + theta2 * tail))
    }

    /// `dr/dtheta`.
    pub fn derivative(&self, theta: S) -> S {
        let theta2 = theta * theta;
        let c3: S = crate::camera::scalar(3.0);
        let c5: S = crate::camera::scalar(5.0);
        let c7: S = crate::camera::scalar(7.0);
        let c9: S = crate::camera::scalar(9.0);
        let tail = c5 * self.k2 + theta2 * (c7 * self.k3 + theta2 * c9 * self.k4);
        S::one() + theta2 * (c3 * self.k1 + theta2 * tail)
    }

    /// One Newton step of `r(theta) = radius` starting from `theta`.
    fn newton_step(&self, theta: S, radius: S) -> S {
        let slope = self.derivative(theta);
        if slope.abs() < axis_epsilon::<S>() {
            return S::zero();
        }
        (self.radius(theta) - radius) / slope
    }

    /// Solves `r(theta) = radius` for `theta`, starting from `theta = radius`.
    ///
    /// Bounded by [`MAX_ITERATIONS`]; on non-convergence the iterate with the
    /// smallest residual is returned.
    pub fn solve_theta(&self, radius: S) -> S {
        self.solve_theta_with_residual(radius).0
    }

    /// Like [`RadialPolynomial::solve_theta`], also returning
    /// `|r(theta) - radius|` at the returned angle.
    pub fn solve_theta_with_residual(&self, radius: S) -> (S, S) {
        let tolerance = convergence_tolerance::<S>();
        let mut theta = radius;
        let mut best = (theta, (self.radius(theta) - radius).abs());

        for _ in 0..MAX_ITERATIONS {
            let step = self.newton_step(theta, radius);
            theta -= step;

            let residual = (self.radius(theta) - radius).abs();
            if residual < best.1 {
                best = (theta, residual);
            }
            if step.abs() < tolerance {
                return best;
            }
        }

        trace!(
            "radius inversion did not converge after {} iterations, r = {:?}, residual {:?}",
            MAX_ITERATIONS,
            radius,
            best.1
        );
        best
    }
}

/// Normalized image point of the symmetric model for a camera-frame point.
fn project_polar<S: RealField + Copy>(
    radial: &RadialPolynomial<S>,
    point_c: &Point3<S>,
) -> Vector2<S> {
    let rho = (point_c.x * point_c.x + point_c.y * point_c.y).sqrt();
    if rho < axis_epsilon::<S>() {
        // r(theta) ~ theta ~ rho / z near the axis
        return Vector2::new(point_c.x / point_c.z, point_c.y / point_c.z);
    }

    let theta = rho.atan2(point_c.z);
    Vector2::new(point_c.x, point_c.y) * (radial.radius(theta) / rho)
}

/// Unit ray at `theta` from the optical axis and azimuth `phi`.
fn ray_at_angle<S: RealField + Copy>(theta: S, phi: S) -> Vector3<S> {
    let sin_theta = theta.sin();
    Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), theta.cos())
}

/// Radially symmetric generic model.
///
/// Parameter order: `fx, fy, cx, cy, k1, k2, k3, k4`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdealGenericModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
    pub radial: RadialPolynomial<S>,
}

impl<S: RealField + Copy> IdealGenericModel<S> {
    /// Creates a new [`IdealGenericModel`].
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `radial` - Coefficients `k1..k4` of the odd polynomial `r(theta)`.
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`IdealGenericModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidResolution`]
    /// * [`CameraModelError::InvalidParams`] if a radial coefficient is not finite.
    pub fn new(
        intrinsics: Intrinsics<S>,
        radial: RadialPolynomial<S>,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let model = IdealGenericModel {
            intrinsics,
            resolution,
            radial,
        };

        model.validate_params()?;
        debug!("new ideal generic model is: {:?}", model);

        Ok(model)
    }
}

impl<S: RealField + Copy> CameraModel for IdealGenericModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::IdealGeneric;
    const PARAM_COUNT: usize = 8;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        self.intrinsics.denormalize(&project_polar(&self.radial, point_c))
    }

    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        let normalized = self.intrinsics.normalize(pixel);
        let radius = normalized.norm();
        if radius < axis_epsilon::<S>() {
            return Vector3::new(normalized.x, normalized.y, S::one()).normalize();
        }

        let theta = self.radial.solve_theta(radius);
        ray_at_angle(theta, normalized.y.atan2(normalized.x))
    }

    fn params(&self) -> DVector<S> {
        params_with(&self.intrinsics, &self.radial.coefficients())
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        let radial = RadialPolynomial::new(params[4], params[5], params[6], params[7]);
        IdealGenericModel::new(intrinsics_from_params(params), radial, resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_resolution(&self.resolution)?;
        validation::validate_finite("radial coefficients", &self.radial.coefficients())
    }
}

/// Asymmetric radial (`l`, `i`) and tangential (`m`, `j`) terms of the full generic model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AsymmetricDistortion<S> {
    pub l: [S; 3],
    pub i: [S; 4],
    pub m: [S; 3],
    pub j: [S; 4],
}

impl<S: RealField + Copy> AsymmetricDistortion<S> {
    pub fn new(l: [S; 3], i: [S; 4], m: [S; 3], j: [S; 4]) -> Self {
        AsymmetricDistortion { l, i, m, j }
    }

    /// Coefficients in parameter order `l1 l2 l3 i1 i2 i3 i4 m1 m2 m3 j1 j2 j3 j4`.
    pub fn coefficients(&self) -> Vec<S> {
        self.l
            .iter()
            .chain(self.i.iter())
            .chain(self.m.iter())
            .chain(self.j.iter())
            .copied()
            .collect()
    }

    fn from_slice(values: &[S]) -> Self {
        AsymmetricDistortion::new(
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5], values[6]],
            [values[7], values[8], values[9]],
            [values[10], values[11], values[12], values[13]],
        )
    }

    /// Offset in the normalized image plane for a ray at `(theta, phi)`.
    pub fn offset(&self, theta: S, phi: S) -> Vector2<S> {
        let theta2 = theta * theta;
        let odd = |c: &[S; 3]| theta * (c[0] + theta2 * (c[1] + theta2 * c[2]));

        let two = S::one() + S::one();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_2phi, cos_2phi) = (two * phi).sin_cos();
        let harmonic =
            |c: &[S; 4]| c[0] * cos_phi + c[1] * sin_phi + c[2] * cos_2phi + c[3] * sin_2phi;

        let radial = odd(&self.l) * harmonic(&self.i);
        let tangential = odd(&self.m) * harmonic(&self.j);

        Vector2::new(
            radial * cos_phi - tangential * sin_phi,
            radial * sin_phi + tangential * cos_phi,
        )
    }
}

/// Generic model with asymmetric distortion.
///
/// Parameter order: `fx, fy, cx, cy, k1, k2, k3, k4, l1, l2, l3, i1, i2, i3,
/// i4, m1, m2, m3, j1, j2, j3, j4`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullGenericModel<S> {
    pub intrinsics: Intrinsics<S>,
    pub resolution: Resolution,
    pub radial: RadialPolynomial<S>,
    pub asymmetric: AsymmetricDistortion<S>,
}

impl<S: RealField + Copy> FullGenericModel<S> {
    /// Creates a new [`FullGenericModel`].
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Focal lengths and principal point, [`Intrinsics`] (fx, fy, cx, cy).
    /// * `radial` - Coefficients `k1..k4` of the odd polynomial `r(theta)`.
    /// * `asymmetric` - The `l`, `i`, `m` and `j` terms of the asymmetric distortion.
    /// * `resolution` - Image size in pixels, [`Resolution`] (width, height).
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Self, CameraModelError>`. On success, it provides the
    /// validated [`FullGenericModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidResolution`]
    /// * [`CameraModelError::InvalidParams`] if a radial or asymmetric coefficient is not finite.
    pub fn new(
        intrinsics: Intrinsics<S>,
        radial: RadialPolynomial<S>,
        asymmetric: AsymmetricDistortion<S>,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let model = FullGenericModel {
            intrinsics,
            resolution,
            radial,
            asymmetric,
        };

        model.validate_params()?;
        debug!("new full generic model is: {:?}", model);

        Ok(model)
    }

    fn project_angles(&self, theta: S, phi: S) -> Vector2<S> {
        let (sin_phi, cos_phi) = phi.sin_cos();
        Vector2::new(cos_phi, sin_phi) * self.radial.radius(theta)
            + self.asymmetric.offset(theta, phi)
    }

    /// Recovers `(theta, phi)` for a normalized image point.
    ///
    /// Each iteration removes the asymmetric offset predicted by the current
    /// angles and takes one Newton step of the radial polynomial towards the
    /// remaining radius. Bounded by [`MAX_ITERATIONS`]; the angles with the
    /// smallest reprojection residual are returned alongside that residual.
    fn solve_angles(&self, normalized: &Vector2<S>) -> ((S, S), S) {
        let tolerance = convergence_tolerance::<S>();
        let mut theta = normalized.norm();
        let mut phi = normalized.y.atan2(normalized.x);
        let initial = (self.project_angles(theta, phi) - normalized).norm();
        let mut best = ((theta, phi), initial);

        for _ in 0..MAX_ITERATIONS {
            let symmetric = normalized - self.asymmetric.offset(theta, phi);
            phi = symmetric.y.atan2(symmetric.x);
            theta -= self.radial.newton_step(theta, symmetric.norm());

            let residual = (self.project_angles(theta, phi) - normalized).norm();
            if residual < best.1 {
                best = ((theta, phi), residual);
            }
            if best.1 < tolerance {
                return best;
            }
        }

        trace!(
            "full generic inversion did not converge after {} iterations, residual {:?} at {:?}",
            MAX_ITERATIONS,
            best.1,
            normalized
        );
        best
    }
}

impl<S: RealField + Copy> CameraModel for FullGenericModel<S> {
    type Scalar = S;

    const MODEL_TYPE: ModelType = ModelType::FullGeneric;
    const PARAM_COUNT: usize = 22;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> &Intrinsics<S> {
        &self.intrinsics
    }

    fn project(&self, point_c: &Point3<S>) -> Vector2<S> {
        let rho = (point_c.x * point_c.x + point_c.y * point_c.y).sqrt();
        if rho < axis_epsilon::<S>() {
            // Every asymmetric term vanishes with theta
            return self.intrinsics.denormalize(&project_polar(&self.radial, point_c));
        }

        let theta = rho.atan2(point_c.z);
        let phi = point_c.y.atan2(point_c.x);
        self.intrinsics.denormalize(&self.project_angles(theta, phi))
    }

    fn unproject(&self, pixel: &Vector2<S>) -> Vector3<S> {
        let normalized = self.intrinsics.normalize(pixel);
        if normalized.norm() < axis_epsilon::<S>() {
            return Vector3::new(normalized.x, normalized.y, S::one()).normalize();
        }

        let ((theta, phi), _) = self.solve_angles(&normalized);
        ray_at_angle(theta, phi)
    }

    fn params(&self) -> DVector<S> {
        let mut extra = self.radial.coefficients().to_vec();
        extra.extend(self.asymmetric.coefficients());
        params_with(&self.intrinsics, &extra)
    }

    fn from_params(params: &DVector<S>, resolution: Resolution) -> Result<Self, CameraModelError> {
        validation::check_param_count(Self::MODEL_TYPE, params, Self::PARAM_COUNT)?;
        let radial = RadialPolynomial::new(params[4], params[5], params[6], params[7]);
        let asymmetric = AsymmetricDistortion::from_slice(&params.as_slice()[8..22]);
        FullGenericModel::new(intrinsics_from_params(params), radial, asymmetric, resolution)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_resolution(&self.resolution)?;
        validation::validate_finite("radial coefficients", &self.radial.coefficients())?;
        validation::validate_finite("asymmetric coefficients", &self.asymmetric.coefficients())
    }
}
