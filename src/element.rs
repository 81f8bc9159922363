//! Basis providers: the per-cell finite element bases that a composite space merges.
use crate::allocators::DimAllocator;
use crate::geometry::{CellGeometry, MappedPoint};
use crate::nalgebra::{DMatrix, DefaultAllocator, Dyn, MatrixViewMut, OMatrix, OPoint, OVector};
use crate::{Real, SmallDim};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

mod bubble;
mod function;
mod lagrange;

pub use bubble::*;
pub use function::*;
pub use lagrange::*;

/// The reference domains supported by the crate.
///
/// All reference domains are subsets of $[-1, 1]^d$. The triangle is the one defined by the
/// corners (-1, -1), (1, -1), (-1, 1), and the tetrahedron correspondingly has its corners in
/// (-1, -1, -1), (1, -1, -1), (-1, 1, -1), (-1, -1, 1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceCell {
    Segment,
    Triangle,
    Quadrilateral,
    Tetrahedron,
}

const SEGMENT_VERTICES: [[f64; 3]; 2] = [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRIANGLE_VERTICES: [[f64; 3]; 3] = [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [-1.0, 1.0, 0.0]];
const QUADRILATERAL_VERTICES: [[f64; 3]; 4] = [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]];
const TETRAHEDRON_VERTICES: [[f64; 3]; 4] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
];

impl ReferenceCell {
    /// The topological dimension of the cell.
    pub fn dim(&self) -> usize {
        match self {
            Self::Segment => 1,
            Self::Triangle | Self::Quadrilateral => 2,
            Self::Tetrahedron => 3,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_coords().len()
    }

    pub fn is_simplex(&self) -> bool {
        !matches!(self, Self::Quadrilateral)
    }

    fn vertex_coords(&self) -> &'static [[f64; 3]] {
        match self {
            Self::Segment => &SEGMENT_VERTICES,
            Self::Triangle => &TRIANGLE_VERTICES,
            Self::Quadrilateral => &QUADRILATERAL_VERTICES,
            Self::Tetrahedron => &TETRAHEDRON_VERTICES,
        }
    }

    /// The vertices of the reference domain.
    ///
    /// # Panics
    ///
    /// Panics if `D` does not coincide with the dimension of the cell.
    pub fn reference_vertices<T, D>(&self) -> Vec<OPoint<T, D>>
    where
        T: Real,
        D: SmallDim,
        DefaultAllocator: DimAllocator<T, D>,
    {
        assert_eq!(D::dim(), self.dim(), "Dimension must match reference cell dimension");
        self.vertex_coords()
            .iter()
            .map(|coords| {
                OPoint::from(OVector::<T, D>::from_fn(|i, _| {
                    T::from_f64(coords[i]).expect("Literal must fit in T")
                }))
            })
            .collect()
    }
}

/// Identifies a degree of freedom across cells and sources.
///
/// The meaning of `index` is determined by the `family`. Lagrange bases use the
/// [`VERTEX_FAMILY`](DofKey::VERTEX_FAMILY) with the mesh vertex index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DofKey {
    pub family: u32,
    pub index: usize,
}

impl DofKey {
    pub const VERTEX_FAMILY: u32 = 0;

    pub fn new(family: u32, index: usize) -> Self {
        Self { family, index }
    }

    pub fn vertex(vertex_index: usize) -> Self {
        Self::new(Self::VERTEX_FAMILY, vertex_index)
    }
}

/// How a local dof of a basis relates to dofs on other cells.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DofIdentity {
    /// The dof is shared with every cell that reports the same key, e.g. a vertex dof.
    Shared(DofKey),
    /// The dof belongs to a function with global support. The key identifies the function
    /// itself and does not depend on the cell, so the same function contributed by two
    /// different sources on the same cell carries the same key.
    Global(DofKey),
    /// The dof is private to the cell.
    CellLocal,
}

impl DofIdentity {
    pub fn key(&self) -> Option<DofKey> {
        match self {
            Self::Shared(key) | Self::Global(key) => Some(*key),
            Self::CellLocal => None,
        }
    }
}

/// Topological information about a cell, passed to basis providers when they are asked for
/// dof identities.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CellTopology<'a> {
    pub index: usize,
    pub vertices: &'a [usize],
}

impl<'a> CellTopology<'a> {
    pub fn new(index: usize, vertices: &'a [usize]) -> Self {
        Self { index, vertices }
    }
}

/// A finite element basis that can be active on a cell.
///
/// Bases are evaluated on the reference cell. Each dof occupies `target_dim` consecutive
/// entries of the value buffer, and correspondingly `target_dim` consecutive columns of the
/// gradient buffer and entries of the Hessian buffer. Gradients are stored column-wise, in
/// the same way as fenris-style element gradients.
///
/// Implementations must panic if the provided buffers do not have the expected sizes.
pub trait CellBasis<T, D>: Debug
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// The reference cell on which the basis is defined.
    fn reference_cell(&self) -> ReferenceCell;

    /// Number of dofs, i.e. basis functions.
    fn num_dofs(&self) -> usize;

    /// Number of components of each basis function.
    fn target_dim(&self) -> usize {
        1
    }

    /// The (estimated) polynomial degree of the basis.
    fn degree(&self) -> usize;

    fn is_polynomial(&self) -> bool {
        true
    }

    fn is_lagrange(&self) -> bool {
        false
    }

    /// Whether the basis is equivalent, i.e. its transformation matrix is the identity.
    fn is_equivalent(&self) -> bool {
        true
    }

    /// The identity of the given local dof on the given cell.
    fn dof_identity(&self, cell: &CellTopology, local_dof: usize) -> DofIdentity;

    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &OPoint<T, D>);

    fn populate_basis_gradients(&self, basis_gradients: MatrixViewMut<T, D, Dyn>, reference_coords: &OPoint<T, D>);

    fn populate_basis_hessians(&self, basis_hessians: &mut [OMatrix<T, D, D>], reference_coords: &OPoint<T, D>);

    /// Evaluates the basis on the real cell.
    fn populate_mapped_basis(&self, basis_values: &mut [T], point: &MappedPoint<T, D>) {
        self.populate_basis(basis_values, point.reference_coords());
    }

    /// Evaluates physical gradients $\nabla_x \phi = J^{-T} \nabla_\xi \phi$.
    fn populate_mapped_gradients(&self, mut basis_gradients: MatrixViewMut<T, D, Dyn>, point: &MappedPoint<T, D>) {
        let n = basis_gradients.ncols();
        self.populate_basis_gradients(basis_gradients.columns_mut(0, n), point.reference_coords());
        let j_inv_t = point.jacobian_inverse_transpose();
        for mut column in basis_gradients.column_iter_mut() {
            let mapped = j_inv_t * &column;
            column.copy_from(&mapped);
        }
    }

    /// Evaluates physical Hessians $J^{-T} H_\xi J^{-1}$.
    ///
    /// Second derivatives of the geometric map are neglected, so this is exact only for
    /// affine geometry.
    fn populate_mapped_hessians(&self, basis_hessians: &mut [OMatrix<T, D, D>], point: &MappedPoint<T, D>) {
        self.populate_basis_hessians(basis_hessians, point.reference_coords());
        let j_inv_t = point.jacobian_inverse_transpose();
        let j_inv = j_inv_t.transpose();
        for hessian in basis_hessians.iter_mut() {
            *hessian = j_inv_t * &*hessian * &j_inv;
        }
    }

    /// The matrix $M$ such that the real basis values are given by $M \phi$ for raw
    /// values $\phi$.
    fn transformation_matrix(&self, _geometry: &CellGeometry<T, D>) -> DMatrix<T> {
        let n = self.num_dofs() * self.target_dim();
        DMatrix::identity(n, n)
    }
}
