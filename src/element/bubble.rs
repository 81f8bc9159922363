use crate::allocators::DimAllocator;
use crate::element::{populate_lagrange_basis, populate_lagrange_gradients, CellBasis, CellTopology, DofIdentity, ReferenceCell};
use crate::nalgebra::{DefaultAllocator, Dyn, MatrixViewMut, OMatrix, OPoint, OVector};
use crate::{Real, SmallDim};
use numeric_literals::replace_float_literals;

/// A factor of a product function, given by its value, gradient and Hessian at a point.
struct Factor<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    value: T,
    gradient: OVector<T, D>,
    hessian: OMatrix<T, D, D>,
}

#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn bubble_factors<T, D>(reference_cell: ReferenceCell, xi: &OPoint<T, D>) -> (T, Vec<Factor<T, D>>)
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    if reference_cell.is_simplex() {
        // On simplices the Lagrange basis coincides with the barycentric coordinates,
        // and the bubble is the scaled product of all of them
        let n = reference_cell.num_vertices();
        let mut lambda = vec![T::zero(); n];
        let mut lambda_grad = OMatrix::<T, D, Dyn>::zeros_generic(D::name(), Dyn(n));
        populate_lagrange_basis(reference_cell, &mut lambda, xi);
        populate_lagrange_gradients(reference_cell, lambda_grad.columns_mut(0, n), xi);
        let factors = lambda
            .iter()
            .zip(lambda_grad.column_iter())
            .map(|(value, gradient)| Factor {
                value: *value,
                gradient: gradient.clone_owned(),
                hessian: OMatrix::<T, D, D>::zeros(),
            })
            .collect();
        // Scale so that the bubble attains the value 1 at the barycenter
        let n_t = T::from_usize(n).expect("Must be able to fit usize in T");
        (n_t.powi(n as i32), factors)
    } else {
        let factors = (0..reference_cell.dim())
            .map(|d| {
                let mut gradient = OVector::<T, D>::zeros();
                let mut hessian = OMatrix::<T, D, D>::zeros();
                gradient[d] = -2.0 * xi[d];
                hessian[(d, d)] = -2.0;
                Factor {
                    value: 1.0 - xi[d] * xi[d],
                    gradient,
                    hessian,
                }
            })
            .collect();
        (1.0, factors)
    }
}

/// Product of all factor values except those with the given indices.
fn product_except<T, D>(factors: &[Factor<T, D>], skip: &[usize]) -> T
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    factors
        .iter()
        .enumerate()
        .filter(|(k, _)| !skip.contains(k))
        .fold(T::one(), |acc, (_, factor)| acc * factor.value)
}

/// An interior bubble function, vanishing on the boundary of the reference cell.
///
/// The bubble has a single cell-local dof and is typically used to enrich a Lagrange basis
/// on a sub-region of the mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BubbleBasis {
    reference_cell: ReferenceCell,
}

impl BubbleBasis {
    pub fn new(reference_cell: ReferenceCell) -> Self {
        Self { reference_cell }
    }
}

impl<T, D> CellBasis<T, D> for BubbleBasis
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn reference_cell(&self) -> ReferenceCell {
        self.reference_cell
    }

    fn num_dofs(&self) -> usize {
        1
    }

    fn degree(&self) -> usize {
        match self.reference_cell {
            ReferenceCell::Quadrilateral => 4,
            cell => cell.num_vertices(),
        }
    }

    fn dof_identity(&self, _cell: &CellTopology, _local_dof: usize) -> DofIdentity {
        DofIdentity::CellLocal
    }

    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &OPoint<T, D>) {
        assert_eq!(basis_values.len(), 1, "Incompatible slice length for basis values");
        let (scale, factors) = bubble_factors(self.reference_cell, reference_coords);
        basis_values[0] = scale * product_except(&factors, &[]);
    }

    fn populate_basis_gradients(&self, mut basis_gradients: MatrixViewMut<T, D, Dyn>, reference_coords: &OPoint<T, D>) {
        assert_eq!(basis_gradients.ncols(), 1, "Incompatible matrix shape for basis gradients");
        let (scale, factors) = bubble_factors(self.reference_cell, reference_coords);
        let mut gradient = OVector::<T, D>::zeros();
        for (k, factor) in factors.iter().enumerate() {
            gradient += &factor.gradient * product_except(&factors, &[k]);
        }
        basis_gradients.set_column(0, &(gradient * scale));
    }

    fn populate_basis_hessians(&self, basis_hessians: &mut [OMatrix<T, D, D>], reference_coords: &OPoint<T, D>) {
        assert_eq!(basis_hessians.len(), 1, "Incompatible slice length for basis Hessians");
        let (scale, factors) = bubble_factors(self.reference_cell, reference_coords);
        let mut hessian = OMatrix::<T, D, D>::zeros();
        for (k, factor_k) in factors.iter().enumerate() {
            hessian += &factor_k.hessian * product_except(&factors, &[k]);
            for (l, factor_l) in factors.iter().enumerate() {
                if l != k {
                    hessian += &factor_k.gradient * factor_l.gradient.transpose() * product_except(&factors, &[k, l]);
                }
            }
        }
        basis_hessians[0] = hessian * scale;
    }
}
