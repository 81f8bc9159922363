//! Meshes and the mesh interface consumed by composite spaces.
use crate::allocators::DimAllocator;
use crate::connectivity::{
    Connectivity, ConnectivityMut, Quad4Connectivity, Segment2Connectivity, Tet4Connectivity, Tri3Connectivity,
};
use crate::element::{CellTopology, ReferenceCell};
use crate::geometry::CellGeometry;
use crate::nalgebra::allocator::Allocator;
use crate::nalgebra::{DefaultAllocator, DimName, OPoint, Scalar, U1, U2, U3};
use crate::{Real, SmallDim};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub mod procedural;

/// The mesh interface required by a composite space.
///
/// Cells are identified by their index in `0 .. num_cells()`. Dependent spaces detect that
/// they are out of date through the pair of [`mesh_id`](Self::mesh_id) and
/// [`revision`](Self::revision). The id must be unique among live meshes and the revision must
/// change whenever the topology or geometry of the mesh changes.
pub trait CellMesh<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn num_cells(&self) -> usize;

    /// The reference cell of the geometric transformation of the given cell.
    fn reference_cell(&self, cell_index: usize) -> Option<ReferenceCell>;

    fn cell_vertex_indices(&self, cell_index: usize) -> Option<&[usize]>;

    fn cell_geometry(&self, cell_index: usize) -> Option<CellGeometry<T, D>>;

    fn mesh_id(&self) -> u64;

    fn revision(&self) -> u64;

    fn cell_topology(&self, cell_index: usize) -> Option<CellTopology<'_>> {
        self.cell_vertex_indices(cell_index)
            .map(|vertices| CellTopology::new(cell_index, vertices))
    }
}

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(0);

fn next_mesh_id() -> u64 {
    NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed)
}

/// Index-based data structure for conforming meshes (i.e. no hanging nodes).
///
/// Every mesh instance, including clones and deserialized meshes, receives a fresh id.
#[derive(Debug, Deserialize, Serialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Mesh<T: Scalar, D, Connectivity>
where
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    // serde's not able correctly determine the necessary trait bounds in this case,
    // so write our own
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
        deserialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
    ))]
    vertices: Vec<OPoint<T, D>>,
    #[serde(bound(
        serialize = "Connectivity: Serialize",
        deserialize = "Connectivity: Deserialize<'de>"
    ))]
    connectivity: Vec<Connectivity>,
    #[serde(skip, default = "next_mesh_id")]
    id: u64,
    #[serde(skip)]
    revision: u64,
}

impl<T, D, C> Clone for Mesh<T, D, C>
where
    T: Scalar,
    D: DimName,
    C: Clone,
    DefaultAllocator: Allocator<T, D>,
{
    fn clone(&self) -> Self {
        Self::from_vertices_and_connectivity(self.vertices.clone(), self.connectivity.clone())
    }
}

pub type Mesh1d<T, Connectivity> = Mesh<T, U1, Connectivity>;
pub type Mesh2d<T, Connectivity> = Mesh<T, U2, Connectivity>;
pub type Mesh3d<T, Connectivity> = Mesh<T, U3, Connectivity>;

pub type SegmentMesh1d<T> = Mesh1d<T, Segment2Connectivity>;
pub type TriangleMesh2d<T> = Mesh2d<T, Tri3Connectivity>;
pub type QuadMesh2d<T> = Mesh2d<T, Quad4Connectivity>;
pub type Tet4Mesh<T> = Mesh3d<T, Tet4Connectivity>;

impl<T, D, C> Mesh<T, D, C>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    /// Construct a mesh from vertices and connectivity.
    ///
    /// The connectivity is expected to only reference vertices in bounds. Cells referencing
    /// vertices out of bounds are reported as having no geometry.
    pub fn from_vertices_and_connectivity(vertices: Vec<OPoint<T, D>>, connectivity: Vec<C>) -> Self {
        Self {
            vertices,
            connectivity,
            id: next_mesh_id(),
            revision: 0,
        }
    }

    /// An id unique to this mesh instance.
    pub fn mesh_id(&self) -> u64 {
        self.id
    }

    pub fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    /// Mutable access to the vertices.
    ///
    /// Bumps the revision of the mesh.
    pub fn vertices_mut(&mut self) -> &mut [OPoint<T, D>] {
        self.revision += 1;
        &mut self.vertices
    }

    pub fn connectivity(&self) -> &[C] {
        &self.connectivity
    }

    /// Appends a cell and returns its index.
    ///
    /// Bumps the revision of the mesh.
    pub fn push_cell(&mut self, connectivity: C) -> usize {
        self.revision += 1;
        self.connectivity.push(connectivity);
        self.connectivity.len() - 1
    }

    /// The number of modifications made to the mesh since it was constructed.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl<T, D, C> Mesh<T, D, C>
where
    T: Scalar,
    D: DimName,
    C: ConnectivityMut,
    DefaultAllocator: Allocator<T, D>,
{
    /// Returns a new mesh in which only the desired cells are kept. The vertices are removed or
    /// relabeled as necessary.
    ///
    /// # Panics
    ///
    /// Panics if a cell index is out of bounds.
    pub fn keep_cells(&self, cell_indices: &[usize]) -> Self {
        let mut new_index_of_vertex = vec![None; self.vertices.len()];
        let mut new_vertices = Vec::new();
        let mut new_connectivity = Vec::with_capacity(cell_indices.len());

        for &cell_index in cell_indices {
            let mut connectivity = self.connectivity[cell_index].clone();
            for vertex_index in connectivity.vertex_indices_mut() {
                let new_index = *new_index_of_vertex[*vertex_index].get_or_insert_with(|| {
                    new_vertices.push(self.vertices[*vertex_index].clone());
                    new_vertices.len() - 1
                });
                *vertex_index = new_index;
            }
            new_connectivity.push(connectivity);
        }

        Self::from_vertices_and_connectivity(new_vertices, new_connectivity)
    }
}

impl<T> QuadMesh2d<T>
where
    T: Scalar,
{
    pub fn split_into_triangles(self) -> TriangleMesh2d<T> {
        let triangles = self
            .connectivity
            .iter()
            .flat_map(|quad| quad.split_into_triangles())
            .collect();
        TriangleMesh2d::from_vertices_and_connectivity(self.vertices, triangles)
    }
}

impl<T, D, C> CellMesh<T, D> for Mesh<T, D, C>
where
    T: Real,
    D: SmallDim,
    C: Connectivity,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    fn reference_cell(&self, cell_index: usize) -> Option<ReferenceCell> {
        self.connectivity.get(cell_index).map(|conn| conn.reference_cell())
    }

    fn cell_vertex_indices(&self, cell_index: usize) -> Option<&[usize]> {
        self.connectivity.get(cell_index).map(|conn| conn.vertex_indices())
    }

    fn cell_geometry(&self, cell_index: usize) -> Option<CellGeometry<T, D>> {
        let conn = self.connectivity.get(cell_index)?;
        let reference_cell = conn.reference_cell();
        if reference_cell.dim() != D::dim() {
            return None;
        }
        let vertices = conn
            .vertex_indices()
            .iter()
            .map(|idx| self.vertices.get(*idx).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(CellGeometry::from_vertices(reference_cell, vertices))
    }

    fn mesh_id(&self) -> u64 {
        self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}
