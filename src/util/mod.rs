//! Round-trip evaluation of camera models.
//!
//! Lifting a pixel to a fixed distance and projecting the result again must
//! land on the same pixel. The helpers here walk an image, apply each
//! model's validity predicates and summarise the reprojection error.

use crate::camera::{CameraInterface, ModelType, Pose};
use crate::geometry::{pixel_grid, sample_points};
use log::{debug, warn};
use nalgebra::{RealField, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance along each lifted ray used by the reference check.
pub const REFERENCE_DISTANCE: f64 = 1.5;
/// Largest reprojection error, in pixels, accepted by the reference check.
pub const REFERENCE_TOLERANCE: f64 = 0.5;

/// Pose used by the reference check: translation `(10, 20, 30)`, no rotation.
pub fn reference_pose<S: RealField + Copy>() -> Pose<S> {
    Pose::translation(
        nalgebra::convert(10.0),
        nalgebra::convert(20.0),
        nalgebra::convert(30.0),
    )
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionError {
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
}

impl fmt::Debug for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Projection Error [ rmse: {}, min: {}, max: {}, mean: {}, stddev: {}, median: {} ]",
            self.rmse, self.min, self.max, self.mean, self.stddev, self.median
        )
    }
}

impl ProjectionError {
    /// Summary statistics of `errors`, or `None` when there are none.
    pub fn from_errors(errors: &[f64]) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }

        let n = errors.len() as f64;
        let mean = errors.iter().sum::<f64>() / n;

        let variance: f64 = errors.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();

        let sum_squared: f64 = errors.iter().map(|x| x.powi(2)).sum::<f64>();
        let rmse = (sum_squared / n).sqrt();

        let min = errors.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = errors.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        let mut sorted_errors = errors.to_vec();
        sorted_errors.sort_by(f64::total_cmp);
        let mid = sorted_errors.len() / 2;
        let median = if sorted_errors.len() % 2 == 0 {
            (sorted_errors[mid - 1] + sorted_errors[mid]) / 2.0
        } else {
            sorted_errors[mid]
        };

        Some(ProjectionError {
            rmse,
            min,
            max,
            mean,
            stddev,
            median,
        })
    }
}

/// Outcome of lifting and reprojecting the checked pixels of one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTripReport {
    pub model_type: ModelType,
    /// Pixels that reprojected within tolerance.
    pub good: usize,
    /// Pixels that reprojected outside tolerance.
    pub bad: usize,
    /// Pixels rejected by the validity predicates.
    pub skipped: usize,
    pub tolerance: f64,
    pub errors: Option<ProjectionError>,
}

impl RoundTripReport {
    pub fn checked(&self) -> usize {
        self.good + self.bad
    }

    /// No violations and at least one checked pixel.
    pub fn passed(&self) -> bool {
        self.bad == 0 && self.good > 0
    }

    pub fn max_error(&self) -> Option<f64> {
        self.errors.as_ref().map(|errors| errors.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoundTripOutcome {
    /// The model's laws are known not to compose; nothing was evaluated.
    Exempt(ModelType),
    Checked(RoundTripReport),
}

impl RoundTripOutcome {
    /// Exempt models count as passing.
    pub fn passed(&self) -> bool {
        match self {
            RoundTripOutcome::Exempt(_) => true,
            RoundTripOutcome::Checked(report) => report.passed(),
        }
    }
}

/// Whether `pixel` is inside every validity region of `camera`.
pub fn pixel_is_checked<S, C>(camera: &C, pixel: &Vector2<S>) -> bool
where
    S: RealField + Copy,
    C: CameraInterface<S> + ?Sized,
{
    if camera.model_type().is_fov_limited() {
        camera.pixel_valid_circular(pixel)
    } else {
        camera.pixel_valid(pixel.x, pixel.y)
    }
}

/// Pixel distance between `pixel` and its lift-then-project image.
pub fn round_trip_error<S, C>(camera: &C, pose: &Pose<S>, pixel: &Vector2<S>, distance: S) -> f64
where
    S: RealField + Copy,
    C: CameraInterface<S> + ?Sized,
{
    let point = camera.inverse_at_distance(pose, pixel, distance);
    let error = (camera.forward(pose, &point) - pixel).norm();
    // Non-finite errors (NaN included) count as violations
    nalgebra::try_convert::<S, f64>(error)
        .filter(|value| value.is_finite())
        .unwrap_or(f64::INFINITY)
}

fn evaluate<S, C, I>(
    camera: &C,
    pose: &Pose<S>,
    distance: S,
    tolerance: f64,
    pixels: I,
) -> RoundTripReport
where
    S: RealField + Copy,
    C: CameraInterface<S> + ?Sized,
    I: IntoIterator<Item = Vector2<S>>,
{
    let mut errors = Vec::new();
    let mut bad = 0;
    let mut skipped = 0;

    for pixel in pixels {
        if !pixel_is_checked(camera, &pixel) {
            skipped += 1;
            continue;
        }

        let error = round_trip_error(camera, pose, &pixel, distance);
        if error > tolerance {
            bad += 1;
            debug!("{} round trip of {:?} is off by {}", camera.model_type(), pixel, error);
        }
        errors.push(error);
    }

    let report = RoundTripReport {
        model_type: camera.model_type(),
        good: errors.len() - bad,
        bad,
        skipped,
        tolerance,
        errors: ProjectionError::from_errors(&errors),
    };

    if report.bad > 0 {
        warn!(
            "{} round trip: {} of {} pixels beyond {} px, {:?}",
            report.model_type,
            report.bad,
            report.checked(),
            tolerance,
            report.errors
        );
    }

    report
}

/// Lifts and reprojects every integer pixel of the image.
pub fn round_trip_report<S, C>(
    camera: &C,
    pose: &Pose<S>,
    distance: S,
    tolerance: f64,
) -> RoundTripReport
where
    S: RealField + Copy,
    C: CameraInterface<S> + ?Sized,
{
    evaluate(camera, pose, distance, tolerance, pixel_grid(camera.resolution()))
}

/// Like [`round_trip_report`] on roughly `n` evenly spread pixels.
pub fn sampled_round_trip<S, C>(
    camera: &C,
    pose: &Pose<S>,
    distance: S,
    tolerance: f64,
    n: usize,
) -> RoundTripReport
where
    S: RealField + Copy,
    C: CameraInterface<S> + ?Sized,
{
    evaluate(camera, pose, distance, tolerance, sample_points(camera.resolution(), n))
}

/// Full-image round trip, skipping models whose laws do not compose.
pub fn check_round_trip<S, C>(
    camera: &C,
    pose: &Pose<S>,
    distance: S,
    tolerance: f64,
) -> RoundTripOutcome
where
    S: RealField + Copy,
    C: CameraInterface<S> + ?Sized,
{
    let model_type = camera.model_type();
    if model_type.round_trip_exempt() {
        debug!("{} is exempt from the round trip check", model_type);
        return RoundTripOutcome::Exempt(model_type);
    }
    RoundTripOutcome::Checked(round_trip_report(camera, pose, distance, tolerance))
}
