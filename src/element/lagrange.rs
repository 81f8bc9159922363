use crate::allocators::DimAllocator;
use crate::element::{CellBasis, CellTopology, DofIdentity, DofKey, ReferenceCell};
use crate::nalgebra::{DefaultAllocator, Dyn, MatrixViewMut, OMatrix, OPoint};
use crate::{Real, SmallDim};
use numeric_literals::replace_float_literals;

/// The signs of the quadrilateral corners, in counter-clockwise order starting at (-1, -1).
const QUAD_CORNER_SIGNS: [(f64, f64); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

fn quad_corner_signs<T: Real>(i: usize) -> (T, T) {
    let (a, b) = QUAD_CORNER_SIGNS[i];
    (
        T::from_f64(a).expect("Literal must fit in T"),
        T::from_f64(b).expect("Literal must fit in T"),
    )
}

/// Evaluates the linear (bilinear for quadrilaterals) Lagrange basis of the reference cell.
///
/// There is one basis function per vertex, associated with the vertices in the order
/// given by [`ReferenceCell::reference_vertices`].
#[rustfmt::skip]
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn populate_lagrange_basis<T, D>(reference_cell: ReferenceCell, basis_values: &mut [T], xi: &OPoint<T, D>)
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    assert_eq!(basis_values.len(), reference_cell.num_vertices(), "Incompatible slice length for basis values");
    match reference_cell {
        ReferenceCell::Segment => {
            basis_values[0] = 0.5 - 0.5 * xi[0];
            basis_values[1] = 0.5 + 0.5 * xi[0];
        }
        ReferenceCell::Triangle => {
            basis_values[0] = -0.5 * xi[0] - 0.5 * xi[1];
            basis_values[1] = 0.5 * xi[0] + 0.5;
            basis_values[2] = 0.5 * xi[1] + 0.5;
        }
        ReferenceCell::Quadrilateral => {
            for (i, phi) in basis_values.iter_mut().enumerate() {
                let (a, b) = quad_corner_signs::<T>(i);
                *phi = 0.25 * (1.0 + a * xi[0]) * (1.0 + b * xi[1]);
            }
        }
        ReferenceCell::Tetrahedron => {
            basis_values[0] = -0.5 * (1.0 + xi[0] + xi[1] + xi[2]);
            basis_values[1] = 0.5 * (1.0 + xi[0]);
            basis_values[2] = 0.5 * (1.0 + xi[1]);
            basis_values[3] = 0.5 * (1.0 + xi[2]);
        }
    }
}

/// Evaluates the reference gradients of the Lagrange basis, one column per basis function.
#[rustfmt::skip]
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn populate_lagrange_gradients<T, D>(
    reference_cell: ReferenceCell,
    mut gradients: MatrixViewMut<T, D, Dyn>,
    xi: &OPoint<T, D>,
) where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    assert_eq!(gradients.ncols(), reference_cell.num_vertices(), "Incompatible matrix shape for basis gradients");
    gradients.fill(T::zero());
    match reference_cell {
        ReferenceCell::Segment => {
            gradients[(0, 0)] = -0.5;
            gradients[(0, 1)] = 0.5;
        }
        ReferenceCell::Triangle => {
            gradients[(0, 0)] = -0.5;
            gradients[(1, 0)] = -0.5;
            gradients[(0, 1)] = 0.5;
            gradients[(1, 2)] = 0.5;
        }
        ReferenceCell::Quadrilateral => {
            for i in 0..4 {
                let (a, b) = quad_corner_signs::<T>(i);
                gradients[(0, i)] = 0.25 * a * (1.0 + b * xi[1]);
                gradients[(1, i)] = 0.25 * b * (1.0 + a * xi[0]);
            }
        }
        ReferenceCell::Tetrahedron => {
            for d in 0..3 {
                gradients[(d, 0)] = -0.5;
                gradients[(d, d + 1)] = 0.5;
            }
        }
    }
}

/// Evaluates the reference Hessians of the Lagrange basis.
///
/// Only the bilinear quadrilateral basis has non-vanishing (mixed) second derivatives.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn populate_lagrange_hessians<T, D>(
    reference_cell: ReferenceCell,
    hessians: &mut [OMatrix<T, D, D>],
    _xi: &OPoint<T, D>,
) where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    assert_eq!(hessians.len(), reference_cell.num_vertices(), "Incompatible slice length for basis Hessians");
    for hessian in hessians.iter_mut() {
        hessian.fill(T::zero());
    }
    if reference_cell == ReferenceCell::Quadrilateral {
        for (i, hessian) in hessians.iter_mut().enumerate() {
            let (a, b) = quad_corner_signs::<T>(i);
            hessian[(0, 1)] = 0.25 * a * b;
            hessian[(1, 0)] = 0.25 * a * b;
        }
    }
}

/// Linear (or bilinear) Lagrange basis with one dof per cell vertex.
///
/// The dofs are shared between all cells containing the same mesh vertex, so a single
/// instance can serve every cell of a given type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LagrangeBasis {
    reference_cell: ReferenceCell,
}

impl LagrangeBasis {
    pub fn new(reference_cell: ReferenceCell) -> Self {
        Self { reference_cell }
    }
}

impl<T, D> CellBasis<T, D> for LagrangeBasis
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn reference_cell(&self) -> ReferenceCell {
        self.reference_cell
    }

    fn num_dofs(&self) -> usize {
        self.reference_cell.num_vertices()
    }

    fn degree(&self) -> usize {
        match self.reference_cell {
            ReferenceCell::Quadrilateral => 2,
            _ => 1,
        }
    }

    fn is_lagrange(&self) -> bool {
        true
    }

    fn dof_identity(&self, cell: &CellTopology, local_dof: usize) -> DofIdentity {
        let vertex = cell
            .vertices
            .get(local_dof)
            .expect("Cell must have one vertex per Lagrange dof");
        DofIdentity::Shared(DofKey::vertex(*vertex))
    }

    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &OPoint<T, D>) {
        populate_lagrange_basis(self.reference_cell, basis_values, reference_coords)
    }

    fn populate_basis_gradients(&self, basis_gradients: MatrixViewMut<T, D, Dyn>, reference_coords: &OPoint<T, D>) {
        populate_lagrange_gradients(self.reference_cell, basis_gradients, reference_coords)
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [OMatrix<T, D, D>], reference_coords: &OPoint<T, D>) {
        populate_lagrange_hessians(self.reference_cell, basis_hessians, reference_coords)
    }
}
