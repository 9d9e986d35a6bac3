//! Uniform runtime interface over the concrete camera models.
//!
//! [`CameraModel`] carries associated constants and constructors, so it
//! cannot be used as a trait object. [`CameraInterface`] is the object-safe
//! projection surface, and [`CameraFromModel`] adapts any concrete model to
//! it by forwarding every call unchanged. A `Vec<Box<dyn CameraInterface<f64>>>`
//! can therefore hold a pinhole and a fisheye side by side.

use crate::camera::{CameraModel, ModelType, Pose, Resolution};
use nalgebra::{Point3, RealField, Vector2};
use std::fmt;

/// Object-safe projection interface shared by every model with scalar `S`.
pub trait CameraInterface<S: RealField + Copy>: fmt::Debug + Send + Sync {
    fn forward(&self, pose: &Pose<S>, point: &Point3<S>) -> Vector2<S>;

    fn inverse_at_distance(&self, pose: &Pose<S>, pixel: &Vector2<S>, distance: S) -> Point3<S>;

    fn pixel_valid(&self, x: S, y: S) -> bool;

    fn pixel_valid_circular(&self, pixel: &Vector2<S>) -> bool;

    fn model_type(&self) -> ModelType;

    fn resolution(&self) -> Resolution;
}

/// Owns one concrete model and exposes it through [`CameraInterface`].
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFromModel<M> {
    model: M,
}

impl<M: CameraModel> CameraFromModel<M> {
    pub fn new(model: M) -> Self {
        CameraFromModel { model }
    }

    /// Wraps `model` and erases its concrete type.
    pub fn boxed(model: M) -> Box<dyn CameraInterface<M::Scalar>>
    where
        M: 'static,
    {
        Box::new(CameraFromModel::new(model))
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M: CameraModel> CameraInterface<M::Scalar> for CameraFromModel<M> {
    fn forward(&self, pose: &Pose<M::Scalar>, point: &Point3<M::Scalar>) -> Vector2<M::Scalar> {
        self.model.forward(pose, point)
    }

    fn inverse_at_distance(
        &self,
        pose: &Pose<M::Scalar>,
        pixel: &Vector2<M::Scalar>,
        distance: M::Scalar,
    ) -> Point3<M::Scalar> {
        self.model.inverse_at_distance(pose, pixel, distance)
    }

    fn pixel_valid(&self, x: M::Scalar, y: M::Scalar) -> bool {
        self.model.pixel_valid(x, y)
    }

    fn pixel_valid_circular(&self, pixel: &Vector2<M::Scalar>) -> bool {
        self.model.pixel_valid_circular(pixel)
    }

    fn model_type(&self) -> ModelType {
        self.model.model_type()
    }

    fn resolution(&self) -> Resolution {
        self.model.resolution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FisheyeModel, Intrinsics, PinholeModel};
    use nalgebra::Isometry3;

    #[test]
    fn test_adapter_forwards_verbatim() {
        let model = FisheyeModel::new(
            Intrinsics::new(250.0, 250.0, 319.5, 239.5),
            1.0,
            150f64.to_radians(),
            Resolution::new(640, 480),
        )
        .unwrap();
        let camera = CameraFromModel::new(model.clone());
        let pose = Isometry3::translation(10.0, 20.0, 30.0);
        let point = Point3::new(-9.5, -20.2, -28.0);
        let pixel = Vector2::new(17.0, 239.0);

        assert_eq!(camera.forward(&pose, &point), model.forward(&pose, &point));
        assert_eq!(
            camera.inverse_at_distance(&pose, &pixel, 1.5),
            model.inverse_at_distance(&pose, &pixel, 1.5)
        );
        assert_eq!(camera.pixel_valid(0.0, 0.0), model.pixel_valid(0.0, 0.0));
        let corner = Vector2::new(0.0, 0.0);
        assert_eq!(camera.pixel_valid_circular(&corner), model.pixel_valid_circular(&corner));
        assert_eq!(CameraInterface::model_type(&camera), ModelType::Fisheye);
        assert_eq!(camera.into_inner(), model);
    }

    #[test]
    fn test_boxed_models_share_one_collection() {
        let resolution = Resolution::new(640, 480);
        let cameras: Vec<Box<dyn CameraInterface<f64>>> = vec![
            CameraFromModel::boxed(
                PinholeModel::new(Intrinsics::new(500.0, 500.0, 319.5, 239.5), resolution).unwrap(),
            ),
            CameraFromModel::boxed(
                FisheyeModel::new(Intrinsics::new(250.0, 250.0, 319.5, 239.5), 1.0, 2.6, resolution)
                    .unwrap(),
            ),
        ];

        let types: Vec<_> = cameras.iter().map(|camera| camera.model_type()).collect();
        assert_eq!(types, vec![ModelType::Pinhole, ModelType::Fisheye]);
        assert!(cameras.iter().all(|camera| camera.resolution() == resolution));
    }
}
