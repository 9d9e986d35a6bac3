use camera_models::camera::{CameraInterface, ModelType};
use camera_models::config::{DefaultParameters, ParameterProvider};
use camera_models::util::{
    check_round_trip, reference_pose, round_trip_report, RoundTripOutcome, REFERENCE_DISTANCE,
    REFERENCE_TOLERANCE,
};
use nalgebra::{RealField, Vector2};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn default_camera<S: RealField + Copy>(model_type: ModelType) -> Box<dyn CameraInterface<S>> {
    DefaultParameters
        .camera_config(model_type)
        .unwrap()
        .build::<S>()
        .unwrap()
}

fn assert_round_trip<S: RealField + Copy>(model_type: ModelType) {
    init_logger();
    let camera = default_camera::<S>(model_type);
    let distance: S = nalgebra::convert(REFERENCE_DISTANCE);

    match check_round_trip(camera.as_ref(), &reference_pose(), distance, REFERENCE_TOLERANCE) {
        RoundTripOutcome::Checked(report) => {
            assert_eq!(
                report.bad, 0,
                "{model_type} violates the round trip: {report:?}"
            );
            assert!(report.good > 0, "{model_type} checked no pixels");
            if !model_type.is_fov_limited() {
                assert_eq!(report.skipped, 0);
            }
        }
        RoundTripOutcome::Exempt(exempt) => panic!("{exempt} unexpectedly exempt"),
    }
}

macro_rules! round_trip_tests {
    ($($name:ident => $model_type:expr),* $(,)?) => {
        mod f64_precision {
            use super::*;
            $(
                #[test]
                fn $name() {
                    assert_round_trip::<f64>($model_type);
                }
            )*
        }

        mod f32_precision {
            use super::*;
            $(
                #[test]
                fn $name() {
                    assert_round_trip::<f32>($model_type);
                }
            )*
        }
    };
}

round_trip_tests! {
    pinhole => ModelType::Pinhole,
    pinhole_distorted => ModelType::PinholeDistorted,
    pinhole_disparity => ModelType::PinholeDisparity,
    pinhole_disparity_distorted => ModelType::PinholeDisparityDistorted,
    ideal_generic => ModelType::IdealGeneric,
    full_generic => ModelType::FullGeneric,
    spherical => ModelType::Spherical,
    fisheye => ModelType::Fisheye,
    ideal_fisheye => ModelType::IdealFisheye,
}

#[test]
fn spherical_pov_ray_is_exempt() {
    init_logger();
    let camera = default_camera::<f64>(ModelType::SphericalPovRay);
    let pose = reference_pose();
    let distance = REFERENCE_DISTANCE;

    let outcome = check_round_trip(camera.as_ref(), &pose, distance, REFERENCE_TOLERANCE);
    assert_eq!(outcome, RoundTripOutcome::Exempt(ModelType::SphericalPovRay));

    // The exemption is needed: its laws mirror every off-centre row.
    let report = round_trip_report(camera.as_ref(), &pose, distance, REFERENCE_TOLERANCE);
    assert_eq!(report.good, 0);
    assert_eq!(report.bad, 640 * 480);
}

#[test]
fn exemption_is_limited_to_spherical_pov_ray() {
    let exempt: Vec<_> = ModelType::ALL
        .into_iter()
        .filter(|model_type| model_type.round_trip_exempt())
        .collect();
    assert_eq!(exempt, vec![ModelType::SphericalPovRay]);
}

#[test]
fn fisheye_family_rejects_corners_and_accepts_centre() {
    for model_type in [ModelType::Fisheye, ModelType::IdealFisheye] {
        let camera = default_camera::<f64>(model_type);
        let resolution = camera.resolution();
        let (right, bottom) = ((resolution.width - 1) as f64, (resolution.height - 1) as f64);

        for corner in [
            Vector2::new(0.0, 0.0),
            Vector2::new(right, 0.0),
            Vector2::new(0.0, bottom),
            Vector2::new(right, bottom),
        ] {
            assert!(camera.pixel_valid(corner.x, corner.y));
            assert!(!camera.pixel_valid_circular(&corner), "{model_type} accepts {corner:?}");
        }

        let centre = Vector2::new(right / 2.0, bottom / 2.0);
        assert!(camera.pixel_valid_circular(&centre));

        let camera = default_camera::<f32>(model_type);
        assert!(!camera.pixel_valid_circular(&Vector2::new(0.0f32, 0.0)));
        assert!(camera.pixel_valid_circular(&Vector2::new(320.0f32, 240.0)));
    }
}

#[test]
fn operations_are_stateless() {
    for model_type in ModelType::ALL {
        let camera = default_camera::<f64>(model_type);
        let pose = reference_pose();
        let pixel = Vector2::new(101.0, 77.0);

        let first = camera.inverse_at_distance(&pose, &pixel, 1.5);
        // Unrelated calls in between must not affect later results.
        for other in [Vector2::new(0.0, 0.0), Vector2::new(639.0, 479.0)] {
            let point = camera.inverse_at_distance(&pose, &other, 3.0);
            let _ = camera.forward(&pose, &point);
        }
        let second = camera.inverse_at_distance(&pose, &pixel, 1.5);

        assert_eq!(first, second, "{model_type} is not stateless");
        assert_eq!(camera.forward(&pose, &first), camera.forward(&pose, &second));
    }
}
