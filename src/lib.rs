//! Composite finite element spaces.
//!
//! A [`CompositeSpace`](composite::CompositeSpace) merges several independently defined
//! source spaces over a shared mesh into a single logical space. On every cell, the bases of
//! all sources that are active there are concatenated into a [`MergedBasis`](merged::MergedBasis),
//! which behaves like a single finite element to the rest of the system. A typical use is to
//! combine a standard Lagrange basis with enrichment functions that only live on a sub-region
//! of the mesh.
//!
//! Merged bases are deduplicated by a [`CombinationCache`](cache::CombinationCache): all cells
//! with the same ordered set of contributing providers share one evaluator.
use nalgebra::{DimMin, DimName};

pub mod cache;
pub mod composite;
pub mod connectivity;
pub mod dofs;
pub mod element;
pub mod error;
pub mod geometry;
pub mod merged;
pub mod mesh;
pub mod space;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;

pub use fenris_traits::allocators;
pub use fenris_traits::Real;

pub use error::Error;

/// A small, fixed-size dimension.
///
/// Used as a trait alias for various traits frequently needed by generic routines.
pub trait SmallDim: DimName + DimMin<Self, Output = Self> {}

impl<D> SmallDim for D where D: DimName + DimMin<Self, Output = Self> {}
