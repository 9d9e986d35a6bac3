use crate::camera::{scalar, Resolution};
use nalgebra::{RealField, Vector2};

/// Every integer pixel of the image in row-major order.
pub fn pixel_grid<S: RealField + Copy>(
    resolution: Resolution,
) -> impl Iterator<Item = Vector2<S>> {
    (0..resolution.height).flat_map(move |y| {
        (0..resolution.width).map(move |x| Vector2::new(scalar(x as f64), scalar(y as f64)))
    })
}

/// Generate a grid of sample points that are evenly distributed across the image
///
/// # Arguments
///
/// * `resolution` - The image size in pixels
/// * `n` - The approximate number of points to generate
///
/// # Returns
///
/// A vector of pixel coordinates at the centres of the grid cells
pub fn sample_points<S: RealField + Copy>(resolution: Resolution, n: usize) -> Vec<Vector2<S>> {
    let width = resolution.width as f64;
    let height = resolution.height as f64;
    if n == 0 || resolution.width == 0 || resolution.height == 0 {
        return Vec::new();
    }

    // Calculate the number of cells in each dimension
    let num_cells_x = ((n as f64 * (width / height)).sqrt().round() as usize).max(1);
    let num_cells_y = ((n as f64 * (height / width)).sqrt().round() as usize).max(1);

    // Calculate the dimensions of each cell
    let cell_width = width / num_cells_x as f64;
    let cell_height = height / num_cells_y as f64;

    let mut points = Vec::with_capacity(num_cells_x * num_cells_y);
    for i in 0..num_cells_y {
        for j in 0..num_cells_x {
            let x = (j as f64 + 0.5) * cell_width;
            let y = (i as f64 + 0.5) * cell_height;
            points.push(Vector2::new(scalar(x), scalar(y)));
        }
    }

    points
}
