//! Camera descriptions, parameter providers and YAML / JSON persistence.
//!
//! A camera is described by its model tag, a flat intrinsics vector in the
//! model's parameter order and its resolution. Files group descriptions by
//! camera name:
//!
//! ```yaml
//! cam0:
//!   camera_model: Fisheye
//!   intrinsics: [250.0, 250.0, 319.5, 239.5, 1.0, 2.6179938779914944]
//!   rostopic: /cam0/image_raw
//!   resolution: [640, 480]
//! ```
//!
//! Models are configured exactly once from a [`ParameterProvider`] and never
//! mutated afterwards.

use crate::camera::{
    CameraFromModel, CameraInterface, CameraModel, CameraModelError, FisheyeModel,
    FullGenericModel, IdealFisheyeModel, IdealGenericModel, ModelType,
    PinholeDisparityDistortedModel, PinholeDisparityModel, PinholeDistortedModel, PinholeModel,
    Resolution, SphericalModel, SphericalPovRayModel,
};
use log::info;
use nalgebra::{DVector, RealField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fs;
use std::io::Write;

/// Name under which single-camera files store their description.
pub const DEFAULT_CAMERA_NAME: &str = "cam0";

/// Serializable description of one configured camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub camera_model: ModelType,
    pub intrinsics: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rostopic: Option<String>,
    pub resolution: Resolution,
}

impl CameraConfig {
    pub fn new(camera_model: ModelType, intrinsics: Vec<f64>, resolution: Resolution) -> Self {
        CameraConfig {
            camera_model,
            intrinsics,
            rostopic: None,
            resolution,
        }
    }

    /// Describes an already configured model.
    pub fn from_model<M>(model: &M) -> Self
    where
        M: CameraModel,
        M::Scalar: Into<f64>,
    {
        let intrinsics = model.params().iter().map(|&value| value.into()).collect();
        CameraConfig::new(M::MODEL_TYPE, intrinsics, model.resolution())
    }

    /// Intrinsics converted to the scalar `S`.
    pub fn params<S: RealField + Copy>(&self) -> DVector<S> {
        DVector::from_iterator(
            self.intrinsics.len(),
            self.intrinsics.iter().map(|&value| nalgebra::convert(value)),
        )
    }

    /// Builds the concrete model `M`, which must match the described tag.
    ///
    /// # Type Parameters
    ///
    /// * `M` - The model to configure. Its scalar decides the precision the
    ///   stored `f64` intrinsics are converted to.
    ///
    /// # Return Value
    ///
    /// Returns a `Result<M, CameraModelError>`. On success, it provides the
    /// validated model.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::ModelTypeMismatch`] if `camera_model` is not `M`'s tag.
    /// * [`CameraModelError::ParameterCount`] if `intrinsics` has the wrong length.
    /// * Any validation error of `M`'s constructor, e.g.
    ///   [`CameraModelError::FocalLengthMustBePositive`].
    pub fn configure<M: CameraModel>(&self) -> Result<M, CameraModelError> {
        if self.camera_model != M::MODEL_TYPE {
            return Err(CameraModelError::ModelTypeMismatch {
                expected: M::MODEL_TYPE,
                found: self.camera_model,
            });
        }
        M::from_params(&self.params(), self.resolution)
    }

    /// Builds the described model behind the uniform interface.
    ///
    /// # Type Parameters
    ///
    /// * `S` - Scalar precision of the built camera, `f32` or `f64`.
    ///
    /// # Return Value
    ///
    /// Returns a `Result<Box<dyn CameraInterface<S>>, CameraModelError>`. On
    /// success, it provides the model selected by `camera_model`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::ParameterCount`] if `intrinsics` does not fit the model.
    /// * Any validation error of the selected model's constructor.
    pub fn build<S: RealField + Copy>(
        &self,
    ) -> Result<Box<dyn CameraInterface<S>>, CameraModelError> {
        let camera = match self.camera_model {
            ModelType::Pinhole => CameraFromModel::boxed(self.configure::<PinholeModel<S>>()?),
            ModelType::PinholeDistorted => {
                CameraFromModel::boxed(self.configure::<PinholeDistortedModel<S>>()?)
            }
            ModelType::PinholeDisparity => {
                CameraFromModel::boxed(self.configure::<PinholeDisparityModel<S>>()?)
            }
            ModelType::PinholeDisparityDistorted => {
                CameraFromModel::boxed(self.configure::<PinholeDisparityDistortedModel<S>>()?)
            }
            ModelType::IdealGeneric => {
                CameraFromModel::boxed(self.configure::<IdealGenericModel<S>>()?)
            }
            ModelType::FullGeneric => {
                CameraFromModel::boxed(self.configure::<FullGenericModel<S>>()?)
            }
            ModelType::Spherical => CameraFromModel::boxed(self.configure::<SphericalModel<S>>()?),
            ModelType::SphericalPovRay => {
                CameraFromModel::boxed(self.configure::<SphericalPovRayModel<S>>()?)
            }
            ModelType::Fisheye => CameraFromModel::boxed(self.configure::<FisheyeModel<S>>()?),
            ModelType::IdealFisheye => {
                CameraFromModel::boxed(self.configure::<IdealFisheyeModel<S>>()?)
            }
        };
        Ok(camera)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CameraModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, CameraModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads the `cam0` entry of a camera file.
    pub fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        CameraRig::load_from_yaml(path)?.camera(DEFAULT_CAMERA_NAME).cloned()
    }

    /// Writes a camera file holding this description as `cam0`.
    pub fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        let mut rig = CameraRig::new();
        rig.insert(DEFAULT_CAMERA_NAME, self.clone());
        rig.save_to_yaml(path)
    }
}

/// Named camera descriptions, as stored in a camera file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraRig {
    cameras: BTreeMap<String, CameraConfig>,
}

impl CameraRig {
    pub fn new() -> Self {
        CameraRig::default()
    }

    pub fn insert(&mut self, name: &str, config: CameraConfig) -> Option<CameraConfig> {
        self.cameras.insert(name.to_string(), config)
    }

    pub fn camera(&self, name: &str) -> Result<&CameraConfig, CameraModelError> {
        self.cameras
            .get(name)
            .ok_or_else(|| CameraModelError::MissingCamera(name.to_string()))
    }

    pub fn cameras(&self) -> impl Iterator<Item = (&str, &CameraConfig)> {
        self.cameras.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CameraModelError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, CameraModelError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CameraModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, CameraModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let contents = fs::read_to_string(path)?;
        let rig = CameraRig::from_yaml_str(&contents)?;

        if rig.is_empty() {
            return Err(CameraModelError::YamlError(format!(
                "No cameras described in {path}"
            )));
        }

        info!("Loaded {} camera(s) from {}", rig.len(), path);
        Ok(rig)
    }

    pub fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        let yaml_string = self.to_yaml_string()?;

        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        info!("Saved {} camera(s) to {}", self.len(), path);
        Ok(())
    }
}

/// Source of camera descriptions consulted once at configuration time.
pub trait ParameterProvider {
    fn camera_config(&self, model_type: ModelType) -> Result<CameraConfig, CameraModelError>;

    /// Configures the concrete model `M` from this provider.
    fn configure<M: CameraModel>(&self) -> Result<M, CameraModelError>
    where
        Self: Sized,
    {
        self.camera_config(M::MODEL_TYPE)?.configure()
    }
}

/// Configures `M` from `provider`.
pub fn configure_model<M, P>(provider: &P) -> Result<M, CameraModelError>
where
    M: CameraModel,
    P: ParameterProvider,
{
    provider.configure()
}

/// A rig provides the first camera, by name, carrying the requested tag.
impl ParameterProvider for CameraRig {
    fn camera_config(&self, model_type: ModelType) -> Result<CameraConfig, CameraModelError> {
        self.cameras
            .values()
            .find(|config| config.camera_model == model_type)
            .cloned()
            .ok_or_else(|| CameraModelError::MissingCamera(model_type.to_string()))
    }
}

/// Reference intrinsics for a 640 x 480 sensor, one set per model.
///
/// Fisheye-family values are chosen so that the illuminated disk does not
/// cover the sensor corners.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParameters;

impl DefaultParameters {
    pub const RESOLUTION: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    pub fn intrinsics(model_type: ModelType) -> Vec<f64> {
        let width = Self::RESOLUTION.width as f64;
        let height = Self::RESOLUTION.height as f64;
        let (cx, cy) = ((width - 1.0) / 2.0, (height - 1.0) / 2.0);
        let radtan = [-0.05, 0.01, 0.001, -0.0005, 0.0];
        let generic = [300.0, 300.0, cx, cy, 0.02, -0.005, 0.0, 0.0];
        let with = |base: &[f64], extra: &[f64]| [base, extra].concat();

        match model_type {
            ModelType::Pinhole => vec![500.0, 500.0, cx, cy],
            ModelType::PinholeDistorted => with(&[500.0, 500.0, cx, cy], &radtan),
            ModelType::PinholeDisparity => vec![500.0, 500.0, cx, cy, 0.1],
            ModelType::PinholeDisparityDistorted => with(&[500.0, 500.0, cx, cy, 0.1], &radtan),
            ModelType::IdealGeneric => generic.to_vec(),
            ModelType::FullGeneric => with(
                &generic,
                &[0.002, 0.0, 0.0, 1.0, 0.5, 0.0, 0.0, 0.001, 0.0, 0.0, 0.5, 1.0, 0.0, 0.0],
            ),
            ModelType::Spherical | ModelType::SphericalPovRay => {
                vec![width / (2.0 * PI), height / PI, cx, cy]
            }
            ModelType::Fisheye => vec![250.0, 250.0, cx, cy, 1.0, 150f64.to_radians()],
            ModelType::IdealFisheye => vec![200.0, 200.0, cx, cy, 190f64.to_radians()],
        }
    }
}

impl ParameterProvider for DefaultParameters {
    fn camera_config(&self, model_type: ModelType) -> Result<CameraConfig, CameraModelError> {
        Ok(CameraConfig::new(
            model_type,
            DefaultParameters::intrinsics(model_type),
            DefaultParameters::RESOLUTION,
        ))
    }
}
