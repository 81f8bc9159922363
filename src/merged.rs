//! Merged bases: the concatenation of several bases active on the same cell.
use crate::allocators::DimAllocator;
use crate::element::{CellBasis, CellTopology, DofIdentity, DofKey, ReferenceCell};
use crate::error::Error;
use crate::geometry::{CellGeometry, MappedPoint};
use crate::nalgebra::{DMatrix, DefaultAllocator, Dyn, MatrixViewMut, OMatrix, OPoint};
use crate::{Real, SmallDim};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;

/// Partition of a merged dof range by contributor.
///
/// The *full* range is the plain concatenation of all contributor dofs. Without linking, the
/// merged range coincides with the full range. With linking, several full dofs may be
/// represented by a single merged dof, namely the first of them in contributor order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofLayout {
    offsets: Vec<usize>,
    merged_of_full: Vec<usize>,
    representatives: Vec<usize>,
    target_dim: usize,
}

impl DofLayout {
    /// The layout of the plain concatenation of bases with the given dof counts.
    pub fn concatenated(dof_counts: &[usize], target_dim: usize) -> Self {
        let num_full: usize = dof_counts.iter().sum();
        Self::from_links(dof_counts, target_dim, (0..num_full).collect())
    }

    /// Builds a layout from the merged dof that each full dof is linked to.
    ///
    /// Merged dofs must be numbered in order of first occurrence.
    fn from_links(dof_counts: &[usize], target_dim: usize, merged_of_full: Vec<usize>) -> Self {
        let mut offsets = Vec::with_capacity(dof_counts.len() + 1);
        offsets.push(0);
        for count in dof_counts {
            offsets.push(offsets.last().unwrap() + count);
        }
        assert_eq!(merged_of_full.len(), *offsets.last().unwrap());

        let mut representatives = Vec::new();
        for (full, merged) in merged_of_full.iter().enumerate() {
            if *merged == representatives.len() {
                representatives.push(full);
            }
            assert!(*merged < representatives.len(), "Merged dofs must be numbered by first occurrence");
        }

        Self {
            offsets,
            merged_of_full,
            representatives,
            target_dim,
        }
    }

    pub fn num_contributors(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn num_full_dofs(&self) -> usize {
        self.merged_of_full.len()
    }

    pub fn num_merged_dofs(&self) -> usize {
        self.representatives.len()
    }

    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    /// Whether no dofs have been collapsed.
    pub fn is_concatenation(&self) -> bool {
        self.num_merged_dofs() == self.num_full_dofs()
    }

    /// The full dof range of the given contributor.
    pub fn contributor_dofs(&self, contributor: usize) -> Range<usize> {
        self.offsets[contributor]..self.offsets[contributor + 1]
    }

    /// The full slot range of the given contributor, i.e. its dof range scaled by the target
    /// dimension.
    pub fn contributor_slots(&self, contributor: usize) -> Range<usize> {
        let dofs = self.contributor_dofs(contributor);
        self.target_dim * dofs.start..self.target_dim * dofs.end
    }

    /// The contributor and contributor-local dof of the given full dof.
    pub fn locate(&self, full_dof: usize) -> (usize, usize) {
        assert!(full_dof < self.num_full_dofs(), "Dof index out of bounds");
        // The last offset not exceeding the dof, skipping contributors without dofs
        let contributor = self.offsets.partition_point(|offset| *offset <= full_dof) - 1;
        (contributor, full_dof - self.offsets[contributor])
    }

    /// The full dof representing the given merged dof.
    pub fn representative(&self, merged_dof: usize) -> usize {
        self.representatives[merged_dof]
    }

    /// The merged dof that the given full dof has been linked to.
    pub fn merged_dof(&self, full_dof: usize) -> usize {
        self.merged_of_full[full_dof]
    }

    /// Splits a buffer with one entry per full slot into one chunk per contributor.
    pub fn split_slots_mut<'b, X>(&self, slots: &'b mut [X]) -> Vec<&'b mut [X]> {
        assert_eq!(slots.len(), self.target_dim * self.num_full_dofs(), "Incompatible buffer length");
        let mut chunks = Vec::with_capacity(self.num_contributors());
        let mut remaining = slots;
        for contributor in 0..self.num_contributors() {
            let (chunk, rest) = remaining.split_at_mut(self.contributor_slots(contributor).len());
            chunks.push(chunk);
            remaining = rest;
        }
        chunks
    }

    /// The full slots kept in the merged range, in merged order.
    pub fn kept_slots(&self) -> impl '_ + Iterator<Item = usize> {
        let t = self.target_dim;
        self.representatives
            .iter()
            .flat_map(move |full| t * full..t * (full + 1))
    }

    /// Copies the kept slots of a full buffer into a merged buffer.
    pub fn gather<X: Clone>(&self, full: &[X], merged: &mut [X]) {
        assert_eq!(merged.len(), self.target_dim * self.num_merged_dofs(), "Incompatible buffer length");
        for (target, source) in merged.iter_mut().zip(self.kept_slots()) {
            *target = full[source].clone();
        }
    }
}

/// A basis made up of the bases of several contributors on a single cell.
///
/// The merged basis behaves like a single basis: its functions are the functions of the
/// contributors, in contributor order, and each contributor occupies a contiguous range of the
/// evaluation buffers.
///
/// With smart linking enabled, dofs of different contributors reporting the same
/// [`DofIdentity::Global`] key are collapsed into one merged dof. Linking is determined once,
/// on the cell the basis is constructed for. It is therefore unreliable for global functions
/// that are discontinuous across the boundary of a contributor's region; no attempt is made
/// to detect this.
#[derive(Debug)]
pub struct MergedBasis<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    contributors: Vec<&'a dyn CellBasis<T, D>>,
    layout: DofLayout,
    reference_cell: ReferenceCell,
    target_dim: usize,
    smart_linking: bool,
    construction_cell: usize,
}

impl<'a, T, D> MergedBasis<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Merges the given contributors.
    ///
    /// The cell is used to query dof identities when smart linking is enabled and is otherwise
    /// only kept for diagnostics.
    pub fn new(contributors: Vec<&'a dyn CellBasis<T, D>>, smart_linking: bool, cell: &CellTopology) -> Result<Self, Error> {
        let first = contributors
            .first()
            .ok_or(Error::EmptySituation { cell: cell.index })?;
        let reference_cell = first.reference_cell();
        let target_dim = first.target_dim();

        for (i, contributor) in contributors.iter().enumerate() {
            if contributor.reference_cell() != reference_cell {
                return Err(Error::StructuralMismatch {
                    cell: cell.index,
                    reason: format!(
                        "contributor {} is defined on {:?}, but contributor 0 on {:?}",
                        i,
                        contributor.reference_cell(),
                        reference_cell
                    ),
                });
            }
            if contributor.target_dim() != target_dim {
                return Err(Error::StructuralMismatch {
                    cell: cell.index,
                    reason: format!(
                        "contributor {} has target dimension {}, but contributor 0 has {}",
                        i,
                        contributor.target_dim(),
                        target_dim
                    ),
                });
            }
        }

        let dof_counts: Vec<_> = contributors.iter().map(|c| c.num_dofs()).collect();
        let layout = if smart_linking {
            let merged_of_full = link_global_dofs(&contributors, cell)?;
            DofLayout::from_links(&dof_counts, target_dim, merged_of_full)
        } else {
            DofLayout::concatenated(&dof_counts, target_dim)
        };

        Ok(Self {
            contributors,
            layout,
            reference_cell,
            target_dim,
            smart_linking,
            construction_cell: cell.index,
        })
    }

    pub fn contributors(&self) -> &[&'a dyn CellBasis<T, D>] {
        &self.contributors
    }

    pub fn num_contributors(&self) -> usize {
        self.contributors.len()
    }

    pub fn layout(&self) -> &DofLayout {
        &self.layout
    }

    pub fn is_smart_linking(&self) -> bool {
        self.smart_linking
    }

    /// The cell the basis was constructed for.
    pub fn construction_cell(&self) -> usize {
        self.construction_cell
    }

    /// The contributor owning the given merged dof, and its local dof index in the contributor.
    ///
    /// For linked dofs, the first contributor in order is reported.
    pub fn global_dof_of(&self, merged_dof: usize) -> (usize, usize) {
        self.layout.locate(self.layout.representative(merged_dof))
    }

    /// All (contributor, contributor-local dof) pairs represented by the given merged dof.
    pub fn linked_dofs(&self, merged_dof: usize) -> Vec<(usize, usize)> {
        (0..self.layout.num_full_dofs())
            .filter(|full| self.layout.merged_dof(*full) == merged_dof)
            .map(|full| self.layout.locate(full))
            .collect()
    }

    fn num_slots(&self) -> usize {
        self.target_dim * self.layout.num_merged_dofs()
    }

    /// Evaluates every contributor into its block of the output buffer, going through a full
    /// buffer if dofs have been collapsed.
    fn populate_blocks<X: Clone>(
        &self,
        output: &mut [X],
        zero: X,
        mut populate: impl FnMut(&dyn CellBasis<T, D>, &mut [X]),
    ) {
        assert_eq!(output.len(), self.num_slots(), "Incompatible buffer length");
        if self.layout.is_concatenation() {
            for (contributor, block) in self.contributors.iter().zip(self.layout.split_slots_mut(output)) {
                populate(*contributor, block);
            }
        } else {
            let mut full = vec![zero; self.target_dim * self.layout.num_full_dofs()];
            for (contributor, block) in self.contributors.iter().zip(self.layout.split_slots_mut(&mut full)) {
                populate(*contributor, block);
            }
            self.layout.gather(&full, output);
        }
    }

    /// Gradient counterpart of `populate_blocks`, where blocks are column ranges.
    fn populate_gradient_blocks(
        &self,
        mut output: MatrixViewMut<T, D, Dyn>,
        mut populate: impl FnMut(&dyn CellBasis<T, D>, MatrixViewMut<T, D, Dyn>),
    ) {
        assert_eq!(output.ncols(), self.num_slots(), "Incompatible matrix shape for basis gradients");
        if self.layout.is_concatenation() {
            for (i, contributor) in self.contributors.iter().enumerate() {
                let slots = self.layout.contributor_slots(i);
                populate(*contributor, output.columns_mut(slots.start, slots.len()));
            }
        } else {
            let num_full_slots = self.target_dim * self.layout.num_full_dofs();
            let mut full = OMatrix::<T, D, Dyn>::zeros_generic(D::name(), Dyn(num_full_slots));
            for (i, contributor) in self.contributors.iter().enumerate() {
                let slots = self.layout.contributor_slots(i);
                populate(*contributor, full.columns_mut(slots.start, slots.len()));
            }
            for (target, source) in self.layout.kept_slots().enumerate() {
                output.set_column(target, &full.column(source));
            }
        }
    }
}

/// Determines the merged dof of every full dof under smart linking.
fn link_global_dofs<'a, T, D>(
    contributors: &[&'a dyn CellBasis<T, D>],
    cell: &CellTopology,
) -> Result<Vec<usize>, Error>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut merged_of_full = Vec::new();
    let mut num_merged = 0;
    let mut global_keys: FxHashMap<DofKey, usize> = FxHashMap::default();
    let mut shared_keys: FxHashSet<DofKey> = FxHashSet::default();

    for contributor in contributors {
        let mut contributor_keys = FxHashSet::default();
        for local_dof in 0..contributor.num_dofs() {
            let merged = match contributor.dof_identity(cell, local_dof) {
                DofIdentity::Global(key) => {
                    if !contributor_keys.insert(key) || shared_keys.contains(&key) {
                        return Err(Error::UnsupportedLinking { cell: cell.index, key });
                    }
                    *global_keys.entry(key).or_insert_with(|| {
                        num_merged += 1;
                        num_merged - 1
                    })
                }
                DofIdentity::Shared(key) => {
                    if global_keys.contains_key(&key) {
                        return Err(Error::UnsupportedLinking { cell: cell.index, key });
                    }
                    shared_keys.insert(key);
                    num_merged += 1;
                    num_merged - 1
                }
                DofIdentity::CellLocal => {
                    num_merged += 1;
                    num_merged - 1
                }
            };
            merged_of_full.push(merged);
        }
    }

    Ok(merged_of_full)
}

impl<'a, T, D> CellBasis<T, D> for MergedBasis<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn reference_cell(&self) -> ReferenceCell {
        self.reference_cell
    }

    fn num_dofs(&self) -> usize {
        self.layout.num_merged_dofs()
    }

    fn target_dim(&self) -> usize {
        self.target_dim
    }

    fn degree(&self) -> usize {
        self.contributors.iter().map(|c| c.degree()).max().unwrap_or(0)
    }

    fn is_polynomial(&self) -> bool {
        self.contributors.iter().all(|c| c.is_polynomial())
    }

    fn is_lagrange(&self) -> bool {
        self.contributors.len() == 1 && self.contributors[0].is_lagrange()
    }

    fn is_equivalent(&self) -> bool {
        self.contributors.iter().all(|c| c.is_equivalent())
    }

    fn dof_identity(&self, cell: &CellTopology, local_dof: usize) -> DofIdentity {
        let (contributor, contributor_dof) = self.global_dof_of(local_dof);
        self.contributors[contributor].dof_identity(cell, contributor_dof)
    }

    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &OPoint<T, D>) {
        self.populate_blocks(basis_values, T::zero(), |basis, block| {
            basis.populate_basis(block, reference_coords)
        });
    }

    fn populate_basis_gradients(&self, basis_gradients: MatrixViewMut<T, D, Dyn>, reference_coords: &OPoint<T, D>) {
        self.populate_gradient_blocks(basis_gradients, |basis, block| {
            basis.populate_basis_gradients(block, reference_coords)
        });
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [OMatrix<T, D, D>], reference_coords: &OPoint<T, D>) {
        self.populate_blocks(basis_hessians, OMatrix::<T, D, D>::zeros(), |basis, block| {
            basis.populate_basis_hessians(block, reference_coords)
        });
    }

    fn populate_mapped_basis(&self, basis_values: &mut [T], point: &MappedPoint<T, D>) {
        self.populate_blocks(basis_values, T::zero(), |basis, block| {
            basis.populate_mapped_basis(block, point)
        });
    }

    fn populate_mapped_gradients(&self, basis_gradients: MatrixViewMut<T, D, Dyn>, point: &MappedPoint<T, D>) {
        self.populate_gradient_blocks(basis_gradients, |basis, block| {
            basis.populate_mapped_gradients(block, point)
        });
    }

    fn populate_mapped_hessians(&self, basis_hessians: &mut [OMatrix<T, D, D>], point: &MappedPoint<T, D>) {
        self.populate_blocks(basis_hessians, OMatrix::<T, D, D>::zeros(), |basis, block| {
            basis.populate_mapped_hessians(block, point)
        });
    }

    /// Block-diagonal combination of the contributor transformation matrices, restricted to
    /// the kept slots.
    fn transformation_matrix(&self, geometry: &CellGeometry<T, D>) -> DMatrix<T> {
        let num_full_slots = self.target_dim * self.layout.num_full_dofs();
        let mut full = DMatrix::zeros(num_full_slots, num_full_slots);
        for (i, contributor) in self.contributors.iter().enumerate() {
            let slots = self.layout.contributor_slots(i);
            let block = contributor.transformation_matrix(geometry);
            assert_eq!(
                block.shape(),
                (slots.len(), slots.len()),
                "Contributor transformation matrix has incompatible shape"
            );
            full.view_mut((slots.start, slots.start), (slots.len(), slots.len()))
                .copy_from(&block);
        }

        if self.layout.is_concatenation() {
            full
        } else {
            let kept: Vec<_> = self.layout.kept_slots().collect();
            DMatrix::from_fn(kept.len(), kept.len(), |i, j| full[(kept[i], kept[j])])
        }
    }
}
