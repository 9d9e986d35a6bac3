//! Camera Models Library
//!
//! Projection and unprojection between 3D scene points and image pixels for
//! the camera models used by vision and SLAM pipelines:
//! - Pinhole, with and without radial-tangential distortion
//! - Pinhole with a disparity coordinate, with and without distortion
//! - Generic polynomial (ideal and full Kannala-Brandt)
//! - Spherical (equirectangular), including the POV-Ray variant
//! - Fisheye (FOV model) and ideal equidistant fisheye
//!
//! Every model is generic over its scalar precision and implements the
//! static [`CameraModel`] trait. [`CameraFromModel`] adapts any of them to
//! the object-safe [`CameraInterface`] so that different models can be used
//! interchangeably at runtime. Models are configured once from a
//! [`ParameterProvider`] and are read-only afterwards.

pub mod camera;
pub mod config;
pub mod geometry;
pub mod util;

// Re-export commonly used types
pub use camera::{
    CameraFromModel, CameraInterface, CameraModel, CameraModelError, DisparityModel, FisheyeModel,
    FullGenericModel, IdealFisheyeModel, IdealGenericModel, Intrinsics, ModelType,
    PinholeDisparityDistortedModel, PinholeDisparityModel, PinholeDistortedModel, PinholeModel,
    Resolution, SphericalModel, SphericalPovRayModel,
};

pub use config::{CameraConfig, CameraRig, DefaultParameters, ParameterProvider};
pub use util::{check_round_trip, round_trip_report, RoundTripOutcome, RoundTripReport};
