//! The composite space controller.
use crate::allocators::DimAllocator;
use crate::cache::{CombinationCache, EvaluatorId};
use crate::dofs::GlobalDofMap;
use crate::element::{CellBasis, ReferenceCell};
use crate::error::Error;
use crate::merged::MergedBasis;
use crate::mesh::CellMesh;
use crate::nalgebra::{DVector, DefaultAllocator, OPoint};
use crate::space::SourceSpace;
use crate::{Real, SmallDim};
use log::{debug, warn};

/// The lifecycle state of a [`CompositeSpace`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpaceState {
    /// The cell assignments do not reflect the current configuration and must be rebuilt.
    Stale,
    /// A rebuild is in progress.
    Rebuilding,
    /// The cell assignments reflect the current configuration.
    Fresh,
}

/// Statistics of a successful rebuild.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AdaptStats {
    /// Cells with at least one contributor.
    pub assigned_cells: usize,
    /// Cells on which no source defines a basis.
    pub skipped_cells: usize,
    /// Distinct contributor lists, i.e. merged bases in the cache.
    pub num_situations: usize,
    pub num_dofs: usize,
}

/// A finite element space formed by merging several source spaces over a shared mesh.
///
/// On every cell, the bases of all sources active there are merged in source order into a
/// single [`MergedBasis`]. Cells with the same ordered list of contributors share a merged
/// basis through the [`CombinationCache`].
///
/// The space does not track changes to its sources. After modifying a source, call
/// [`mark_stale`](Self::mark_stale) and rebuild with [`adapt`](Self::adapt) or
/// [`ensure_adapted`](Self::ensure_adapted). Changes to the mesh, and being handed a different
/// mesh, are detected through the mesh id and revision.
#[derive(Debug)]
pub struct CompositeSpace<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    sources: Vec<&'a dyn SourceSpace<T, D>>,
    cache: CombinationCache<'a, T, D>,
    cell_bases: Vec<Option<EvaluatorId>>,
    dof_map: GlobalDofMap,
    state: SpaceState,
    smart_linking: bool,
    /// Id and revision of the mesh the space was last built on.
    built_on: Option<(u64, u64)>,
}

impl<'a, T, D> Default for CompositeSpace<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T, D> CompositeSpace<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// An empty space without sources, in the stale state.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cache: CombinationCache::new(),
            cell_bases: Vec::new(),
            dof_map: GlobalDofMap::default(),
            state: SpaceState::Stale,
            smart_linking: false,
            built_on: None,
        }
    }

    pub fn with_smart_linking(mut self, smart_linking: bool) -> Self {
        self.set_smart_linking(smart_linking);
        self
    }

    /// Replaces the source spaces and immediately rebuilds the space.
    pub fn set_source_spaces<M>(
        &mut self,
        mesh: &M,
        sources: impl IntoIterator<Item = &'a dyn SourceSpace<T, D>>,
    ) -> Result<AdaptStats, Error>
    where
        M: ?Sized + CellMesh<T, D>,
    {
        self.sources = sources.into_iter().collect();
        self.mark_stale();
        self.adapt(mesh)
    }

    pub fn source_spaces(&self) -> &[&'a dyn SourceSpace<T, D>] {
        &self.sources
    }

    /// Enables or disables linking of coincident global dofs on newly merged bases.
    ///
    /// Marks the space as stale.
    pub fn set_smart_linking(&mut self, smart_linking: bool) {
        self.smart_linking = smart_linking;
        self.mark_stale();
    }

    pub fn is_smart_linking(&self) -> bool {
        self.smart_linking
    }

    /// Marks the space as out of date. The existing assignments are kept until the next
    /// rebuild.
    pub fn mark_stale(&mut self) {
        self.state = SpaceState::Stale;
    }

    /// The lifecycle state of the space.
    ///
    /// This does not account for changes to the mesh. A space may be [`SpaceState::Fresh`]
    /// while being stale with respect to a modified or different mesh, see
    /// [`is_stale`](Self::is_stale).
    pub fn state(&self) -> SpaceState {
        self.state
    }

    /// Whether the space must be rebuilt before it reflects the given mesh.
    ///
    /// This is the case unless the space is fresh and was built on this mesh instance at its
    /// current revision.
    pub fn is_stale<M>(&self, mesh: &M) -> bool
    where
        M: ?Sized + CellMesh<T, D>,
    {
        self.state != SpaceState::Fresh || self.built_on != Some((mesh.mesh_id(), mesh.revision()))
    }

    /// Rebuilds the space if it is stale, returning the statistics of the rebuild if one took
    /// place.
    pub fn ensure_adapted<M>(&mut self, mesh: &M) -> Result<Option<AdaptStats>, Error>
    where
        M: ?Sized + CellMesh<T, D>,
    {
        if self.is_stale(mesh) {
            self.adapt(mesh).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Rebuilds the cell assignments, the merged bases and the global dof numbering.
    ///
    /// On error, the space is left empty and stale.
    pub fn adapt<M>(&mut self, mesh: &M) -> Result<AdaptStats, Error>
    where
        M: ?Sized + CellMesh<T, D>,
    {
        self.state = SpaceState::Rebuilding;
        match self.rebuild(mesh) {
            Ok(stats) => {
                self.state = SpaceState::Fresh;
                self.built_on = Some((mesh.mesh_id(), mesh.revision()));
                debug!(
                    "Adapted composite space: {} cells assigned, {} skipped, {} situations, {} dofs",
                    stats.assigned_cells, stats.skipped_cells, stats.num_situations, stats.num_dofs
                );
                if stats.assigned_cells == 0 {
                    warn!("No cell of the composite space has any contributing source");
                }
                Ok(stats)
            }
            Err(err) => {
                self.clear();
                Err(err)
            }
        }
    }

    fn rebuild<M>(&mut self, mesh: &M) -> Result<AdaptStats, Error>
    where
        M: ?Sized + CellMesh<T, D>,
    {
        if self.sources.is_empty() {
            return Err(Error::NoSourceSpaces);
        }

        self.cell_bases.clear();
        self.cache.clear();
        self.dof_map = GlobalDofMap::default();

        let num_cells = mesh.num_cells();
        let mut cell_bases = Vec::with_capacity(num_cells);
        let mut skipped_cells = 0;
        for cell_index in 0..num_cells {
            let contributors: Vec<&'a dyn CellBasis<T, D>> = self
                .sources
                .iter()
                .copied()
                .filter_map(|source| source.cell_basis(cell_index))
                .collect();
            if contributors.is_empty() {
                debug!("No source contributes to cell {}", cell_index);
                skipped_cells += 1;
                cell_bases.push(None);
                continue;
            }

            let (topology, mesh_cell) = mesh
                .cell_topology(cell_index)
                .zip(mesh.reference_cell(cell_index))
                .ok_or_else(|| mismatch(cell_index, "the mesh provides no topology for the cell".to_string()))?;
            if mesh_cell.dim() != D::dim() {
                return Err(mismatch(
                    cell_index,
                    format!("{:?} cells can not be embedded in dimension {}", mesh_cell, D::dim()),
                ));
            }

            let id = self
                .cache
                .get_or_create(contributors, self.smart_linking, &topology)?;
            let evaluator_cell = self.cache.get(id).map(|basis| basis.reference_cell());
            if evaluator_cell != Some(mesh_cell) {
                return Err(reference_cell_mismatch(cell_index, mesh_cell, evaluator_cell));
            }
            cell_bases.push(Some(id));
        }

        let bases: Vec<Option<&dyn CellBasis<T, D>>> = cell_bases
            .iter()
            .map(|id: &Option<EvaluatorId>| {
                id.and_then(|id| self.cache.get(id))
                    .map(|basis| basis as &dyn CellBasis<T, D>)
            })
            .collect();
        self.dof_map = GlobalDofMap::enumerate(mesh, &bases);
        self.cell_bases = cell_bases;

        Ok(AdaptStats {
            assigned_cells: num_cells - skipped_cells,
            skipped_cells,
            num_situations: self.cache.len(),
            num_dofs: self.dof_map.num_dofs(),
        })
    }

    /// Removes all cell assignments, merged bases and the dof numbering.
    ///
    /// The sources are kept and the space is left stale.
    pub fn clear(&mut self) {
        self.cell_bases.clear();
        self.cache.clear();
        self.dof_map = GlobalDofMap::default();
        self.state = SpaceState::Stale;
        self.built_on = None;
    }

    /// The merged basis assigned to the given cell, if any.
    pub fn cell_basis(&self, cell_index: usize) -> Option<&MergedBasis<'a, T, D>> {
        self.cell_evaluator(cell_index)
            .and_then(|id| self.cache.get(id))
    }

    pub fn cell_evaluator(&self, cell_index: usize) -> Option<EvaluatorId> {
        self.cell_bases.get(cell_index).copied().flatten()
    }

    pub fn num_cells(&self) -> usize {
        self.cell_bases.len()
    }

    pub fn cache(&self) -> &CombinationCache<'a, T, D> {
        &self.cache
    }

    pub fn dof_map(&self) -> &GlobalDofMap {
        &self.dof_map
    }

    pub fn num_dofs(&self) -> usize {
        self.dof_map.num_dofs()
    }

    /// Evaluates the scalar field with global coefficients `u` at the given reference
    /// coordinates of a cell.
    ///
    /// Returns `None` if the space is stale with respect to the mesh, the cell has no
    /// assigned basis, the basis is not scalar, or the cell geometry is degenerate at the
    /// given point.
    ///
    /// # Panics
    ///
    /// Panics if the length of `u` differs from the number of dofs.
    pub fn interpolate<M>(
        &self,
        mesh: &M,
        cell_index: usize,
        reference_coords: &OPoint<T, D>,
        u: &DVector<T>,
    ) -> Option<T>
    where
        M: ?Sized + CellMesh<T, D>,
    {
        assert_eq!(u.len(), self.num_dofs(), "Coefficient vector must have one entry per dof");
        if self.is_stale(mesh) {
            return None;
        }
        let basis = self.cell_basis(cell_index)?;
        if basis.target_dim() != 1 {
            return None;
        }
        let global_dofs = self.dof_map.cell_dofs(cell_index)?;
        let geometry = mesh.cell_geometry(cell_index)?;
        let point = geometry.mapped_point(cell_index, reference_coords)?;

        let mut values = DVector::zeros(basis.num_dofs());
        basis.populate_mapped_basis(values.as_mut_slice(), &point);
        if !basis.is_equivalent() {
            values = basis.transformation_matrix(&geometry) * values;
        }

        Some(
            global_dofs
                .iter()
                .zip(values.iter())
                .fold(T::zero(), |sum, (global, phi)| sum + u[*global] * *phi),
        )
    }
}

fn mismatch(cell: usize, reason: String) -> Error {
    Error::StructuralMismatch { cell, reason }
}

fn reference_cell_mismatch(cell: usize, mesh_cell: ReferenceCell, evaluator_cell: Option<ReferenceCell>) -> Error {
    mismatch(
        cell,
        format!(
            "the mesh cell is a {:?}, but its merged basis is defined on {:?}",
            mesh_cell, evaluator_cell
        ),
    )
}
