//! Cell connectivities: vertex indices of the cells of a mesh.
use crate::element::ReferenceCell;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

pub trait Connectivity: Clone {
    /// The reference cell which this connectivity is mapped from.
    fn reference_cell(&self) -> ReferenceCell;

    fn vertex_indices(&self) -> &[usize];
}

pub trait ConnectivityMut: Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize];
}

macro_rules! impl_connectivity {
    ($connectivity:ident, $num_vertices:expr, $reference_cell:expr) => {
        impl Connectivity for $connectivity {
            fn reference_cell(&self) -> ReferenceCell {
                $reference_cell
            }

            fn vertex_indices(&self) -> &[usize] {
                &self.0
            }
        }

        impl ConnectivityMut for $connectivity {
            fn vertex_indices_mut(&mut self) -> &mut [usize] {
                &mut self.0
            }
        }

        impl Deref for $connectivity {
            type Target = [usize; $num_vertices];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $connectivity {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

/// Connectivity for a two-node segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment2Connectivity(pub [usize; 2]);

/// Connectivity for a three-node triangle, with counter-clockwise vertex ordering.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3Connectivity(pub [usize; 3]);

/// Connectivity for a four-node quadrilateral, with counter-clockwise vertex ordering.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad4Connectivity(pub [usize; 4]);

/// Connectivity for a four-node tetrahedron.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tet4Connectivity(pub [usize; 4]);

impl_connectivity!(Segment2Connectivity, 2, ReferenceCell::Segment);
impl_connectivity!(Tri3Connectivity, 3, ReferenceCell::Triangle);
impl_connectivity!(Quad4Connectivity, 4, ReferenceCell::Quadrilateral);
impl_connectivity!(Tet4Connectivity, 4, ReferenceCell::Tetrahedron);

impl Quad4Connectivity {
    /// Splits the quadrilateral into two triangles along the diagonal between the first and
    /// third vertex.
    pub fn split_into_triangles(&self) -> [Tri3Connectivity; 2] {
        let [a, b, c, d] = self.0;
        [Tri3Connectivity([a, b, c]), Tri3Connectivity([a, c, d])]
    }
}
