//! Source spaces: collections of per-cell bases that can be merged into a composite space.
use crate::allocators::DimAllocator;
use crate::element::CellBasis;
use crate::nalgebra::DefaultAllocator;
use crate::{Real, SmallDim};
use rustc_hash::FxHashSet;
use std::fmt::Debug;

/// A finite element space that may define a basis on some cells of a mesh.
pub trait SourceSpace<T, D>: Debug
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// The basis active on the given cell, or `None` if the space does not contribute there.
    ///
    /// Composite spaces identify bases by address, so a space must return the same reference
    /// for every cell on which the same basis is active.
    fn cell_basis(&self, cell_index: usize) -> Option<&dyn CellBasis<T, D>>;
}

/// A space with the same basis on every cell.
#[derive(Debug, Clone)]
pub struct UniformSpace<B> {
    basis: B,
}

impl<B> UniformSpace<B> {
    pub fn new(basis: B) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> &B {
        &self.basis
    }
}

impl<T, D, B> SourceSpace<T, D> for UniformSpace<B>
where
    T: Real,
    D: SmallDim,
    B: CellBasis<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn cell_basis(&self, _cell_index: usize) -> Option<&dyn CellBasis<T, D>> {
        Some(&self.basis)
    }
}

/// Restricts another space to a subset of cells, e.g. the region where an enrichment is
/// active.
#[derive(Debug, Clone)]
pub struct RestrictedSpace<S> {
    space: S,
    cells: FxHashSet<usize>,
}

impl<S> RestrictedSpace<S> {
    pub fn new(space: S, cells: impl IntoIterator<Item = usize>) -> Self {
        Self {
            space,
            cells: cells.into_iter().collect(),
        }
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn contains_cell(&self, cell_index: usize) -> bool {
        self.cells.contains(&cell_index)
    }

    /// Adds cells to the region.
    ///
    /// Composite spaces built on top of this space are not notified; they must be marked as
    /// stale by the caller.
    pub fn extend_cells(&mut self, cells: impl IntoIterator<Item = usize>) {
        self.cells.extend(cells);
    }
}

impl<T, D, S> SourceSpace<T, D> for RestrictedSpace<S>
where
    T: Real,
    D: SmallDim,
    S: SourceSpace<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn cell_basis(&self, cell_index: usize) -> Option<&dyn CellBasis<T, D>> {
        if self.cells.contains(&cell_index) {
            self.space.cell_basis(cell_index)
        } else {
            None
        }
    }
}
