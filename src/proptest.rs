//! Strategies for property-based testing of bases and composite spaces.
use crate::element::ReferenceCell;
use crate::mesh::procedural::create_rectangular_uniform_quad_mesh_2d;
use crate::mesh::QuadMesh2d;
use ::proptest::prelude::*;
use nalgebra::{Point1, Point2, Point3, Vector2};
use std::cmp::max;

pub fn point_in_segment_ref_domain() -> impl Strategy<Value = Point1<f64>> {
    (-1.0..=1.0).prop_map(Point1::new)
}

pub fn point_in_quad_ref_domain() -> impl Strategy<Value = Point2<f64>> {
    let r = -1.0..=1.0;
    [r.clone(), r.clone()].prop_map(|[x, y]| Point2::new(x, y))
}

pub fn point_in_tri_ref_domain() -> impl Strategy<Value = Point2<f64>> {
    // Sample the unit square and fold the upper half back onto the lower triangle
    [0.0..=1.0, 0.0..=1.0].prop_map(|[mut s, mut t]| {
        if s + t > 1.0 {
            s = 1.0 - s;
            t = 1.0 - t;
        }
        Point2::new(2.0 * s - 1.0, 2.0 * t - 1.0)
    })
}

pub fn point_in_tet_ref_domain() -> impl Strategy<Value = Point3<f64>> {
    // Barycentric weights from normalized non-negative samples
    [0.0..=1.0, 0.0..=1.0, 0.0..=1.0, 0.01..=1.0].prop_map(|[a, b, c, d]| {
        let sum = a + b + c + d;
        let (s, t, u) = (b / sum, c / sum, d / sum);
        Point3::new(2.0 * s - 1.0, 2.0 * t - 1.0, 2.0 * u - 1.0)
    })
}

/// Points in the interior of the given two-dimensional reference cell.
///
/// # Panics
///
/// Panics if the cell is not two-dimensional.
pub fn point_in_ref_domain_2d(reference_cell: ReferenceCell) -> BoxedStrategy<Point2<f64>> {
    match reference_cell {
        ReferenceCell::Triangle => point_in_tri_ref_domain().boxed(),
        ReferenceCell::Quadrilateral => point_in_quad_ref_domain().boxed(),
        other => panic!("{:?} is not a two-dimensional reference cell", other),
    }
}

// Returns a strategy in which each value is a triplet (cells_per_unit, units_x, units_y)
// such that cells_per_unit^2 * units_x * units_y <= max_cells
fn rectangular_uniform_mesh_cell_distribution_strategy(
    max_cells: usize,
) -> impl Strategy<Value = (usize, usize, usize)> {
    let max_cells_per_unit = f64::floor(f64::sqrt(max_cells as f64)) as usize;
    (1..=max(1, max_cells_per_unit))
        .prop_flat_map(move |cells_per_unit| (Just(cells_per_unit), 1..=max(1, max_cells / (cells_per_unit * cells_per_unit))))
        .prop_flat_map(move |(cells_per_unit, units_x)| {
            let units_y_strategy = 1..=max(1, max_cells / (cells_per_unit * cells_per_unit * units_x));
            (Just(cells_per_unit), Just(units_x), units_y_strategy)
        })
}

/// Non-empty rectangular quad meshes with at most `max(1, max_cells)` cells.
pub fn rectangular_uniform_mesh_strategy(unit_length: f64, max_cells: usize) -> impl Strategy<Value = QuadMesh2d<f64>> {
    rectangular_uniform_mesh_cell_distribution_strategy(max_cells).prop_map(
        move |(cells_per_unit, units_x, units_y)| {
            create_rectangular_uniform_quad_mesh_2d(
                unit_length,
                units_x,
                units_y,
                cells_per_unit,
                &Vector2::new(0.0, 0.0),
            )
        },
    )
}
