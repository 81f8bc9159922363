//! Geometric transformations of cells and the real-space evaluation context.
use crate::allocators::DimAllocator;
use crate::element::{populate_lagrange_basis, populate_lagrange_gradients, ReferenceCell};
use crate::nalgebra::{DefaultAllocator, Dyn, OMatrix, OPoint, OVector};
use crate::{Real, SmallDim};
use itertools::izip;

/// The geometry of a single cell: its reference cell and the coordinates of its vertices.
///
/// The geometric transformation is the linear (bilinear for quadrilaterals) Lagrange map
/// from the reference cell to the physical cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGeometry<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    reference_cell: ReferenceCell,
    vertices: Vec<OPoint<T, D>>,
}

impl<T, D> CellGeometry<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// # Panics
    ///
    /// Panics if the number of vertices or the dimension `D` does not match the reference cell.
    pub fn from_vertices(reference_cell: ReferenceCell, vertices: Vec<OPoint<T, D>>) -> Self {
        assert_eq!(vertices.len(), reference_cell.num_vertices(), "Incompatible number of vertices");
        assert_eq!(D::dim(), reference_cell.dim(), "Only volumetric cells are supported");
        Self {
            reference_cell,
            vertices,
        }
    }

    /// The geometry of the reference cell itself, for which the transformation is the identity.
    pub fn reference(reference_cell: ReferenceCell) -> Self {
        Self::from_vertices(reference_cell, reference_cell.reference_vertices())
    }

    pub fn reference_cell(&self) -> ReferenceCell {
        self.reference_cell
    }

    pub fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    /// Maps reference coordinates to physical coordinates.
    pub fn map_reference_coords(&self, reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        let mut phi = vec![T::zero(); self.vertices.len()];
        populate_lagrange_basis(self.reference_cell, &mut phi, reference_coords);
        let mut x = OVector::<T, D>::zeros();
        for (phi_i, x_i) in izip!(&phi, &self.vertices) {
            x += &x_i.coords * *phi_i;
        }
        OPoint::from(x)
    }

    /// The Jacobian $J = \partial x / \partial \xi$ of the geometric transformation.
    pub fn reference_jacobian(&self, reference_coords: &OPoint<T, D>) -> OMatrix<T, D, D> {
        let n = self.vertices.len();
        let mut gradients = OMatrix::<T, D, Dyn>::zeros_generic(D::name(), Dyn(n));
        populate_lagrange_gradients(self.reference_cell, gradients.columns_mut(0, n), reference_coords);
        let mut jacobian = OMatrix::<T, D, D>::zeros();
        for (x_i, grad_i) in izip!(&self.vertices, gradients.column_iter()) {
            jacobian += &x_i.coords * grad_i.transpose();
        }
        jacobian
    }

    /// Builds the real-space evaluation context at the given reference coordinates.
    ///
    /// Returns `None` if the Jacobian is singular.
    pub fn mapped_point(&self, cell_index: usize, reference_coords: &OPoint<T, D>) -> Option<MappedPoint<T, D>> {
        let jacobian = self.reference_jacobian(reference_coords);
        let jacobian_inverse_transpose = jacobian.clone().try_inverse()?.transpose();
        Some(MappedPoint {
            cell_index,
            reference_coords: reference_coords.clone(),
            physical_coords: self.map_reference_coords(reference_coords),
            jacobian_determinant: jacobian.determinant(),
            jacobian,
            jacobian_inverse_transpose,
        })
    }
}

/// A point on a cell together with the geometric quantities needed to evaluate bases in
/// physical coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedPoint<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    cell_index: usize,
    reference_coords: OPoint<T, D>,
    physical_coords: OPoint<T, D>,
    jacobian: OMatrix<T, D, D>,
    jacobian_inverse_transpose: OMatrix<T, D, D>,
    jacobian_determinant: T,
}

impl<T, D> MappedPoint<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn cell_index(&self) -> usize {
        self.cell_index
    }

    pub fn reference_coords(&self) -> &OPoint<T, D> {
        &self.reference_coords
    }

    pub fn physical_coords(&self) -> &OPoint<T, D> {
        &self.physical_coords
    }

    pub fn jacobian(&self) -> &OMatrix<T, D, D> {
        &self.jacobian
    }

    pub fn jacobian_inverse_transpose(&self) -> &OMatrix<T, D, D> {
        &self.jacobian_inverse_transpose
    }

    pub fn jacobian_determinant(&self) -> T {
        self.jacobian_determinant
    }
}
