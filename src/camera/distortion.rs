//! Radial-tangential (Brown-Conrady) lens distortion.
//!
//! Coefficients follow the OpenCV order `k1, k2, p1, p2, k3` and act on
//! normalized image-plane coordinates. Removing the distortion has no closed
//! form; [`RadTanDistortion::undistort`] runs a Newton iteration capped at
//! [`MAX_ITERATIONS`] and always returns its best estimate.

use crate::camera::{convergence_tolerance, validation, CameraModelError, MAX_ITERATIONS};
use log::trace;
use nalgebra::{Matrix2, RealField, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadTanDistortion<S> {
    pub k1: S,
    pub k2: S,
    pub p1: S,
    pub p2: S,
    pub k3: S,
}

impl<S: RealField + Copy> RadTanDistortion<S> {
    pub fn new(k1: S, k2: S, p1: S, p2: S, k3: S) -> Self {
        RadTanDistortion { k1, k2, p1, p2, k3 }
    }

    /// Reads `k1, k2, p1, p2, k3` from `values`.
    pub(crate) fn from_slice(values: &[S]) -> Self {
        RadTanDistortion::new(values[0], values[1], values[2], values[3], values[4])
    }

    pub fn coefficients(&self) -> [S; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn validate(&self) -> Result<(), CameraModelError> {
        validation::validate_finite("distortion coefficients", &self.coefficients())
    }

    /// Applies the distortion to an undistorted normalized point.
    pub fn distort(&self, point: &Vector2<S>) -> Vector2<S> {
        let two = S::one() + S::one();
        let x = point.x;
        let y = point.y;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = S::one() + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        Vector2::new(
            x * radial + two * self.p1 * x * y + self.p2 * (r2 + two * x * x),
            y * radial + self.p1 * (r2 + two * y * y) + two * self.p2 * x * y,
        )
    }

    /// Jacobian of [`RadTanDistortion::distort`] with respect to the undistorted point.
    pub fn jacobian(&self, point: &Vector2<S>) -> Matrix2<S> {
        let two: S = S::one() + S::one();
        let three = two + S::one();
        let four = two + two;
        let x = point.x;
        let y = point.y;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = S::one() + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        // d(radial)/d(r2), chained with d(r2)/dx = 2x and d(r2)/dy = 2y
        let d_radial = self.k1 + two * self.k2 * r2 + three * self.k3 * r4;
        let d_radial_dx = d_radial * two * x;
        let d_radial_dy = d_radial * two * y;

        let j00 = radial + x * d_radial_dx + two * self.p1 * y + self.p2 * (two * x + four * x);
        let j01 = x * d_radial_dy + two * self.p1 * x + self.p2 * two * y;
        let j10 = y * d_radial_dx + self.p1 * two * x + two * self.p2 * y;
        let j11 = radial + y * d_radial_dy + self.p1 * (two * y + four * y) + two * self.p2 * x;

        Matrix2::new(j00, j01, j10, j11)
    }

    /// Removes the distortion from a distorted normalized point.
    ///
    /// Non-convergence is not an error: the estimate with the smallest
    /// residual is returned. Use [`RadTanDistortion::undistort_with_residual`]
    /// when the caller needs to know how good that estimate is.
    pub fn undistort(&self, distorted: &Vector2<S>) -> Vector2<S> {
        self.undistort_with_residual(distorted).0
    }

    /// Like [`RadTanDistortion::undistort`], also returning the norm of
    /// `distort(estimate) - distorted`.
    pub fn undistort_with_residual(&self, distorted: &Vector2<S>) -> (Vector2<S>, S) {
        let tolerance = convergence_tolerance::<S>();

        // Start from the distorted point itself
        let mut point = *distorted;
        let mut error = self.distort(&point) - distorted;
        let mut best = (point, error.norm());

        for _ in 0..MAX_ITERATIONS {
            if best.1 < tolerance {
                return best;
            }

            let Some(inv_jacobian) = self.jacobian(&point).try_inverse() else {
                trace!("radial-tangential jacobian is singular at {:?}", point);
                return best;
            };

            let delta = inv_jacobian * error;
            point -= delta;
            error = self.distort(&point) - distorted;

            let residual = error.norm();
            if residual < best.1 {
                best = (point, residual);
            }
            if delta.norm() < tolerance {
                return best;
            }
        }

        trace!(
            "radial-tangential undistortion did not converge after {} iterations, residual {:?}",
            MAX_ITERATIONS,
            best.1
        );
        best
    }
}
