//! Global dof numbering of a composite space.
use crate::allocators::DimAllocator;
use crate::element::{CellBasis, CellTopology, DofIdentity, DofKey};
use crate::mesh::CellMesh;
use crate::nalgebra::DefaultAllocator;
use crate::{Real, SmallDim};
use fenris_nested_vec::NestedVec;
use serde::{Deserialize, Serialize};
use rustc_hash::FxHashMap;

/// Maps the local dofs of every cell to global dof indices.
///
/// Global indices are assigned in order of first appearance, iterating over cells in order.
/// Dofs with equal shared or equal global identities map to the same index wherever they
/// appear, while cell-local dofs always receive a fresh index. A shared and a global identity
/// with the same key are distinct dofs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDofMap {
    cell_dofs: NestedVec<usize>,
    assigned: Vec<bool>,
    keyed_dofs: FxHashMap<DofIdentity, usize>,
    num_dofs: usize,
}

impl GlobalDofMap {
    /// Enumerates the dofs of the given per-cell bases.
    ///
    /// `bases` holds one entry per mesh cell. Cells without a basis receive no dofs.
    pub fn enumerate<'b, T, D, M>(mesh: &M, bases: &[Option<&'b dyn CellBasis<T, D>>]) -> Self
    where
        T: Real,
        D: SmallDim,
        M: ?Sized + CellMesh<T, D>,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let mut cell_dofs = NestedVec::new();
        let mut keyed_dofs = FxHashMap::default();
        let mut num_dofs = 0;

        for (cell_index, basis) in bases.iter().enumerate() {
            let mut cell_array = cell_dofs.begin_array();
            if let Some(basis) = basis {
                let topology = mesh
                    .cell_topology(cell_index)
                    .unwrap_or(CellTopology::new(cell_index, &[]));
                for local_dof in 0..basis.num_dofs() {
                    let global_dof = match basis.dof_identity(&topology, local_dof) {
                        identity @ (DofIdentity::Shared(_) | DofIdentity::Global(_)) => {
                            *keyed_dofs.entry(identity).or_insert_with(|| {
                                num_dofs += 1;
                                num_dofs - 1
                            })
                        }
                        DofIdentity::CellLocal => {
                            num_dofs += 1;
                            num_dofs - 1
                        }
                    };
                    cell_array.push_single(global_dof);
                }
            }
        }

        Self {
            cell_dofs,
            assigned: bases.iter().map(Option::is_some).collect(),
            keyed_dofs,
            num_dofs,
        }
    }

    /// The total number of global dofs.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn num_cells(&self) -> usize {
        self.assigned.len()
    }

    pub fn num_assigned_cells(&self) -> usize {
        self.assigned.iter().filter(|assigned| **assigned).count()
    }

    pub fn is_assigned(&self, cell_index: usize) -> bool {
        self.assigned.get(cell_index).copied().unwrap_or(false)
    }

    /// The global dofs of the local dofs of the given cell, in local order.
    ///
    /// Unassigned cells have no dofs.
    pub fn cell_dofs(&self, cell_index: usize) -> Option<&[usize]> {
        self.cell_dofs.get(cell_index)
    }

    /// The global dof of the shared identity with the given key, if any cell reported it.
    pub fn global_dof_for_key(&self, key: &DofKey) -> Option<usize> {
        self.global_dof_for_identity(&DofIdentity::Shared(*key))
    }

    /// The global dof of the given identity, if any cell reported it.
    ///
    /// Cell-local identities never have a global dof associated with them.
    pub fn global_dof_for_identity(&self, identity: &DofIdentity) -> Option<usize> {
        self.keyed_dofs.get(identity).copied()
    }
}
