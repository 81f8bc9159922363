use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, OVector};

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// Central difference approximation of the gradient of a scalar function.
pub fn approximate_gradient_fd<D>(f: impl Fn(&OPoint<f64, D>) -> f64, x: &OPoint<f64, D>, h: f64) -> OVector<f64, D>
where
    D: DimName,
    DefaultAllocator: Allocator<f64, D>,
{
    OVector::<f64, D>::from_fn(|i, _| {
        let mut forward = x.clone();
        let mut backward = x.clone();
        forward[i] += h;
        backward[i] -= h;
        (f(&forward) - f(&backward)) / (2.0 * h)
    })
}
