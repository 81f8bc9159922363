use crate::allocators::DimAllocator;
use crate::element::{CellBasis, CellTopology, DofIdentity, DofKey, ReferenceCell};
use crate::nalgebra::{DefaultAllocator, Dyn, MatrixViewMut, OMatrix, OPoint, OVector};
use crate::{Real, SmallDim};
use std::fmt;
use std::fmt::{Debug, Formatter};

type ScalarFn<T, D> = Box<dyn Fn(&OPoint<T, D>) -> T>;
type GradientFn<T, D> = Box<dyn Fn(&OPoint<T, D>) -> OVector<T, D>>;
type HessianFn<T, D> = Box<dyn Fn(&OPoint<T, D>) -> OMatrix<T, D, D>>;

/// A scalar function with global support, given in reference coordinates together with its
/// derivatives.
pub struct GlobalFunction<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    key: DofKey,
    value: ScalarFn<T, D>,
    gradient: GradientFn<T, D>,
    hessian: HessianFn<T, D>,
}

impl<T, D> GlobalFunction<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(
        key: DofKey,
        value: impl Fn(&OPoint<T, D>) -> T + 'static,
        gradient: impl Fn(&OPoint<T, D>) -> OVector<T, D> + 'static,
        hessian: impl Fn(&OPoint<T, D>) -> OMatrix<T, D, D> + 'static,
    ) -> Self {
        Self {
            key,
            value: Box::new(value),
            gradient: Box::new(gradient),
            hessian: Box::new(hessian),
        }
    }

    pub fn key(&self) -> DofKey {
        self.key
    }
}

impl<T, D> Debug for GlobalFunction<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalFunction").field("key", &self.key).finish()
    }
}

/// A basis made up of functions with global support.
///
/// Every function reports a [`DofIdentity::Global`] identity, so two sources that contribute
/// the same function on a cell can be linked by a composite space with smart linking enabled.
#[derive(Debug)]
pub struct GlobalFunctionBasis<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    reference_cell: ReferenceCell,
    functions: Vec<GlobalFunction<T, D>>,
    estimated_degree: usize,
}

impl<T, D> GlobalFunctionBasis<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(reference_cell: ReferenceCell, functions: Vec<GlobalFunction<T, D>>) -> Self {
        Self {
            reference_cell,
            functions,
            estimated_degree: 1,
        }
    }

    /// Sets the degree reported for quadrature selection.
    pub fn with_estimated_degree(self, estimated_degree: usize) -> Self {
        Self {
            estimated_degree,
            ..self
        }
    }

    pub fn functions(&self) -> &[GlobalFunction<T, D>] {
        &self.functions
    }
}

impl<T, D> CellBasis<T, D> for GlobalFunctionBasis<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn reference_cell(&self) -> ReferenceCell {
        self.reference_cell
    }

    fn num_dofs(&self) -> usize {
        self.functions.len()
    }

    fn degree(&self) -> usize {
        self.estimated_degree
    }

    fn is_polynomial(&self) -> bool {
        false
    }

    fn dof_identity(&self, _cell: &CellTopology, local_dof: usize) -> DofIdentity {
        DofIdentity::Global(self.functions[local_dof].key)
    }

    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &OPoint<T, D>) {
        assert_eq!(basis_values.len(), self.functions.len(), "Incompatible slice length for basis values");
        for (phi, function) in basis_values.iter_mut().zip(&self.functions) {
            *phi = (function.value)(reference_coords);
        }
    }

    fn populate_basis_gradients(&self, mut basis_gradients: MatrixViewMut<T, D, Dyn>, reference_coords: &OPoint<T, D>) {
        assert_eq!(
            basis_gradients.ncols(),
            self.functions.len(),
            "Incompatible matrix shape for basis gradients"
        );
        for (i, function) in self.functions.iter().enumerate() {
            basis_gradients.set_column(i, &(function.gradient)(reference_coords));
        }
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [OMatrix<T, D, D>], reference_coords: &OPoint<T, D>) {
        assert_eq!(
            basis_hessians.len(),
            self.functions.len(),
            "Incompatible slice length for basis Hessians"
        );
        for (hessian, function) in basis_hessians.iter_mut().zip(&self.functions) {
            *hessian = (function.hessian)(reference_coords);
        }
    }
}
