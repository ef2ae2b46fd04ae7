//! Grid layout of independently placed images.
//!
//! Used when a `grid` transformation names sources that stay separate: every
//! source is translated into its own cell of a regular grid. Cells are sized by
//! the largest source so that no two sources overlap.

use super::affine::AffineTransform3D;

/// Positions `(column, row)` of `count` cells on an implicit, near-square grid,
/// filled row by row.
pub fn auto_grid_positions(count: usize) -> Vec<[i64; 2]> {
    if count == 0 {
        return Vec::new();
    }
    let columns = (count as f64).sqrt().ceil() as usize;
    (0..count)
        .map(|i| [(i % columns) as i64, (i / columns) as i64])
        .collect()
}

/// Cell size covering the largest of the given extents in x and y.
pub fn cell_size(extents: &[[f64; 3]]) -> [f64; 2] {
    extents.iter().fold([0.0, 0.0], |acc, e| {
        [acc[0].max(e[0]), acc[1].max(e[1])]
    })
}

/// Translation moving an image whose bounds start at `origin` into cell
/// `position` of a grid with the given cell size.
pub fn cell_translation(position: [i64; 2], cell: [f64; 2], origin: [f64; 3]) -> AffineTransform3D {
    AffineTransform3D::translation(
        position[0] as f64 * cell[0] - origin[0],
        position[1] as f64 * cell[1] - origin[1],
        0.0,
    )
}
