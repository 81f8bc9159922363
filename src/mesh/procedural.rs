//! Basic procedural mesh generation routines.
use crate::connectivity::{Quad4Connectivity, Segment2Connectivity};
use crate::mesh::{QuadMesh2d, SegmentMesh1d, TriangleMesh2d};
use crate::nalgebra::{Point1, Point2, RealField, Vector2};

/// Generates a uniform mesh of the interval `[0, length]`.
pub fn create_uniform_segment_mesh_1d<T>(length: T, num_cells: usize) -> SegmentMesh1d<T>
where
    T: RealField + Copy,
{
    if num_cells == 0 {
        return SegmentMesh1d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }
    let num_cells_t = T::from_usize(num_cells).expect("Must be able to fit usize in T");
    let cell_size = length / num_cells_t;
    let vertices = (0..=num_cells)
        .map(|i| Point1::new(T::from_usize(i).expect("Must be able to fit usize in T") * cell_size))
        .collect();
    let cells = (0..num_cells)
        .map(|i| Segment2Connectivity([i, i + 1]))
        .collect();
    SegmentMesh1d::from_vertices_and_connectivity(vertices, cells)
}

pub fn create_unit_square_uniform_quad_mesh_2d<T>(cells_per_dim: usize) -> QuadMesh2d<T>
where
    T: RealField + Copy,
{
    create_rectangular_uniform_quad_mesh_2d(T::one(), 1, 1, cells_per_dim, &Vector2::new(T::zero(), T::one()))
}

pub fn create_unit_square_uniform_tri_mesh_2d<T>(cells_per_dim: usize) -> TriangleMesh2d<T>
where
    T: RealField + Copy,
{
    create_unit_square_uniform_quad_mesh_2d(cells_per_dim).split_into_triangles()
}

/// Generates an axis-aligned rectangular uniform mesh given a unit length,
/// dimensions as multipliers of the unit length and the number of cells per unit length.
///
/// Cells are numbered row by row, starting at the top left corner.
pub fn create_rectangular_uniform_quad_mesh_2d<T>(
    unit_length: T,
    units_x: usize,
    units_y: usize,
    cells_per_unit: usize,
    top_left: &Vector2<T>,
) -> QuadMesh2d<T>
where
    T: RealField + Copy,
{
    if cells_per_unit == 0 || units_x == 0 || units_y == 0 {
        return QuadMesh2d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let cells_per_unit_t = T::from_usize(cells_per_unit).expect("Must be able to fit usize in T");
    let cell_size = unit_length / cells_per_unit_t;
    let num_cells_x = units_x * cells_per_unit;
    let num_cells_y = units_y * cells_per_unit;

    let to_global_vertex_index = |i, j| (num_cells_x + 1) * j + i;

    let mut vertices = Vec::with_capacity((num_cells_x + 1) * (num_cells_y + 1));
    for j in 0..=num_cells_y {
        for i in 0..=num_cells_x {
            let i_as_t = T::from_usize(i).expect("Must be able to fit usize in T");
            let j_as_t = T::from_usize(j).expect("Must be able to fit usize in T");
            let v = top_left + Vector2::new(i_as_t, -j_as_t) * cell_size;
            vertices.push(Point2::from(v));
        }
    }

    let mut cells = Vec::with_capacity(num_cells_x * num_cells_y);
    for j in 0..num_cells_y {
        for i in 0..num_cells_x {
            cells.push(Quad4Connectivity([
                to_global_vertex_index(i, j + 1),
                to_global_vertex_index(i + 1, j + 1),
                to_global_vertex_index(i + 1, j),
                to_global_vertex_index(i, j),
            ]));
        }
    }

    QuadMesh2d::from_vertices_and_connectivity(vertices, cells)
}
