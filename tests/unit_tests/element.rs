use fenris_composite::element::{
    BubbleBasis, CellBasis, CellTopology, DofIdentity, DofKey, GlobalFunction, GlobalFunctionBasis, LagrangeBasis,
    ReferenceCell,
};
use fenris_composite::proptest::{point_in_quad_ref_domain, point_in_tet_ref_domain, point_in_tri_ref_domain};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, Matrix2, Matrix2xX, Matrix3, Matrix3xX, Point1, Point2, Point3, Vector2, U1, U2, U3};
use proptest::prelude::*;
use util::{approximate_gradient_fd, assert_panics};

fn basis_value_2d(basis: &dyn CellBasis<f64, U2>, i: usize, xi: &Point2<f64>) -> f64 {
    let mut values = vec![0.0; basis.num_dofs()];
    basis.populate_basis(&mut values, xi);
    values[i]
}

fn basis_gradients_2d(basis: &dyn CellBasis<f64, U2>, xi: &Point2<f64>) -> Matrix2xX<f64> {
    let n = basis.num_dofs();
    let mut gradients = Matrix2xX::zeros(n);
    basis.populate_basis_gradients(gradients.columns_mut(0, n), xi);
    gradients
}

#[test]
fn reference_cell_properties() {
    assert_eq!(ReferenceCell::Segment.dim(), 1);
    assert_eq!(ReferenceCell::Triangle.dim(), 2);
    assert_eq!(ReferenceCell::Quadrilateral.dim(), 2);
    assert_eq!(ReferenceCell::Tetrahedron.dim(), 3);

    assert_eq!(ReferenceCell::Segment.num_vertices(), 2);
    assert_eq!(ReferenceCell::Triangle.num_vertices(), 3);
    assert_eq!(ReferenceCell::Quadrilateral.num_vertices(), 4);
    assert_eq!(ReferenceCell::Tetrahedron.num_vertices(), 4);

    assert!(ReferenceCell::Triangle.is_simplex());
    assert!(!ReferenceCell::Quadrilateral.is_simplex());

    let quad_vertices = ReferenceCell::Quadrilateral.reference_vertices::<f64, U2>();
    assert_eq!(
        quad_vertices,
        vec![
            Point2::new(-1.0, -1.0),
            Point2::new(1.0, -1.0),
            Point2::new(1.0, 1.0),
            Point2::new(-1.0, 1.0)
        ]
    );
}

#[test]
fn reference_vertices_panics_on_dimension_mismatch() {
    assert_panics!(ReferenceCell::Triangle.reference_vertices::<f64, U3>());
    assert_panics!(ReferenceCell::Tetrahedron.reference_vertices::<f64, U1>());
}

#[test]
fn lagrange_basis_is_nodal() {
    for reference_cell in [ReferenceCell::Triangle, ReferenceCell::Quadrilateral] {
        let lagrange = LagrangeBasis::new(reference_cell);
        let basis: &dyn CellBasis<f64, U2> = &lagrange;
        let vertices = reference_cell.reference_vertices::<f64, U2>();
        for (j, vertex) in vertices.iter().enumerate() {
            for i in 0..basis.num_dofs() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_scalar_eq!(basis_value_2d(basis, i, vertex), expected, comp = abs, tol = 1e-14);
            }
        }
    }

    let segment = LagrangeBasis::new(ReferenceCell::Segment);
    let segment: &dyn CellBasis<f64, U1> = &segment;
    let mut values = [0.0; 2];
    segment.populate_basis(&mut values, &Point1::new(-1.0));
    assert_eq!(values, [1.0, 0.0]);
    segment.populate_basis(&mut values, &Point1::new(0.5));
    assert_eq!(values, [0.25, 0.75]);
}

#[test]
fn lagrange_basis_metadata() {
    let quad = LagrangeBasis::new(ReferenceCell::Quadrilateral);
    let tri = LagrangeBasis::new(ReferenceCell::Triangle);
    let quad: &dyn CellBasis<f64, U2> = &quad;
    let tri: &dyn CellBasis<f64, U2> = &tri;

    assert_eq!(quad.num_dofs(), 4);
    assert_eq!(quad.degree(), 2);
    assert_eq!(tri.num_dofs(), 3);
    assert_eq!(tri.degree(), 1);
    assert!(quad.is_lagrange() && quad.is_polynomial() && quad.is_equivalent());
    assert_eq!(quad.target_dim(), 1);

    let vertices = [7, 3, 12, 5];
    let cell = CellTopology::new(2, &vertices);
    for (i, v) in vertices.iter().enumerate() {
        assert_eq!(quad.dof_identity(&cell, i), DofIdentity::Shared(DofKey::vertex(*v)));
    }
}

#[test]
fn lagrange_hessians() {
    let quad = LagrangeBasis::new(ReferenceCell::Quadrilateral);
    let quad: &dyn CellBasis<f64, U2> = &quad;
    let mut hessians = vec![Matrix2::repeat(3.0); 4];
    quad.populate_basis_hessians(&mut hessians, &Point2::new(0.3, -0.2));
    let expected_mixed = [0.25, -0.25, 0.25, -0.25];
    for (hessian, mixed) in hessians.iter().zip(expected_mixed) {
        assert_matrix_eq!(*hessian, Matrix2::new(0.0, mixed, mixed, 0.0), comp = abs, tol = 1e-14);
    }

    let tet = LagrangeBasis::new(ReferenceCell::Tetrahedron);
    let tet: &dyn CellBasis<f64, U3> = &tet;
    let mut hessians = vec![Matrix3::repeat(1.0); 4];
    tet.populate_basis_hessians(&mut hessians, &Point3::new(-0.5, -0.5, -0.5));
    assert!(hessians.iter().all(|h| h == &Matrix3::zeros()));
}

#[test]
fn basis_buffers_of_wrong_size_panic() {
    assert_panics!({
        let quad: &dyn CellBasis<f64, U2> = &LagrangeBasis::new(ReferenceCell::Quadrilateral);
        let mut values = vec![0.0; 3];
        quad.populate_basis(&mut values, &Point2::origin());
    });
    assert_panics!({
        let quad: &dyn CellBasis<f64, U2> = &LagrangeBasis::new(ReferenceCell::Quadrilateral);
        let mut gradients = Matrix2xX::<f64>::zeros(5);
        quad.populate_basis_gradients(gradients.columns_mut(0, 5), &Point2::origin());
    });
}

#[test]
fn bubble_is_one_at_barycenter_and_vanishes_on_vertices() {
    for reference_cell in [ReferenceCell::Triangle, ReferenceCell::Quadrilateral] {
        let bubble = BubbleBasis::new(reference_cell);
        let basis: &dyn CellBasis<f64, U2> = &bubble;
        let vertices = reference_cell.reference_vertices::<f64, U2>();
        let barycenter = vertices
            .iter()
            .fold(Vector2::zeros(), |sum, v| sum + v.coords)
            / vertices.len() as f64;

        assert_scalar_eq!(basis_value_2d(basis, 0, &barycenter.into()), 1.0, comp = abs, tol = 1e-14);
        for vertex in &vertices {
            assert_scalar_eq!(basis_value_2d(basis, 0, vertex), 0.0, comp = abs, tol = 1e-14);
        }
    }

    let tet_bubble = BubbleBasis::new(ReferenceCell::Tetrahedron);
    let tet_bubble: &dyn CellBasis<f64, U3> = &tet_bubble;
    let mut value = [0.0];
    tet_bubble.populate_basis(&mut value, &Point3::new(-0.5, -0.5, -0.5));
    assert_scalar_eq!(value[0], 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn bubble_dof_is_cell_local() {
    let bubble = BubbleBasis::new(ReferenceCell::Quadrilateral);
    let bubble: &dyn CellBasis<f64, U2> = &bubble;
    assert_eq!(bubble.num_dofs(), 1);
    assert_eq!(bubble.degree(), 4);
    assert!(!bubble.is_lagrange());
    let cell = CellTopology::new(0, &[0, 1, 2, 3]);
    assert_eq!(bubble.dof_identity(&cell, 0), DofIdentity::CellLocal);
    assert_eq!(bubble.dof_identity(&cell, 0).key(), None);
}

#[test]
fn global_function_basis_evaluates_functions() {
    let functions = vec![
        GlobalFunction::new(
            DofKey::new(1, 0),
            |p: &Point2<f64>| p.x * p.y,
            |p: &Point2<f64>| Vector2::new(p.y, p.x),
            |_: &Point2<f64>| Matrix2::new(0.0, 1.0, 1.0, 0.0),
        ),
        GlobalFunction::new(
            DofKey::new(1, 1),
            |p: &Point2<f64>| p.x * p.x,
            |p: &Point2<f64>| Vector2::new(2.0 * p.x, 0.0),
            |_: &Point2<f64>| Matrix2::new(2.0, 0.0, 0.0, 0.0),
        ),
    ];
    let basis = GlobalFunctionBasis::new(ReferenceCell::Quadrilateral, functions).with_estimated_degree(2);
    assert_eq!(basis.functions().len(), 2);
    assert_eq!(basis.functions()[1].key(), DofKey::new(1, 1));

    let basis: &dyn CellBasis<f64, U2> = &basis;
    assert_eq!(basis.degree(), 2);
    assert!(!basis.is_polynomial());
    let cell = CellTopology::new(4, &[0, 1, 2, 3]);
    assert_eq!(basis.dof_identity(&cell, 1), DofIdentity::Global(DofKey::new(1, 1)));

    let xi = Point2::new(0.5, -0.25);
    let mut values = [0.0; 2];
    basis.populate_basis(&mut values, &xi);
    assert_eq!(values, [-0.125, 0.25]);

    let gradients = basis_gradients_2d(basis, &xi);
    assert_matrix_eq!(gradients, Matrix2xX::from_columns(&[Vector2::new(-0.25, 0.5), Vector2::new(1.0, 0.0)]));

    let mut hessians = vec![Matrix2::zeros(); 2];
    basis.populate_basis_hessians(&mut hessians, &xi);
    assert_eq!(hessians[1], Matrix2::new(2.0, 0.0, 0.0, 0.0));
}

#[test]
fn default_transformation_matrix_is_identity() {
    let quad = LagrangeBasis::new(ReferenceCell::Quadrilateral);
    let quad: &dyn CellBasis<f64, U2> = &quad;
    let geometry = fenris_composite::geometry::CellGeometry::reference(ReferenceCell::Quadrilateral);
    assert_eq!(quad.transformation_matrix(&geometry), DMatrix::identity(4, 4));
}

proptest! {
    #[test]
    fn lagrange_partition_of_unity_tri(xi in point_in_tri_ref_domain()) {
        let lagrange = LagrangeBasis::new(ReferenceCell::Triangle);
        let basis: &dyn CellBasis<f64, U2> = &lagrange;
        let mut values = [0.0; 3];
        basis.populate_basis(&mut values, &xi);
        prop_assert!((values.iter().sum::<f64>() - 1.0).abs() <= 1e-12);
        prop_assert!(values.iter().all(|phi| *phi >= -1e-12));
    }

    #[test]
    fn lagrange_partition_of_unity_tet(xi in point_in_tet_ref_domain()) {
        let lagrange = LagrangeBasis::new(ReferenceCell::Tetrahedron);
        let basis: &dyn CellBasis<f64, U3> = &lagrange;
        let mut values = [0.0; 4];
        basis.populate_basis(&mut values, &xi);
        prop_assert!((values.iter().sum::<f64>() - 1.0).abs() <= 1e-12);

        let mut gradients = Matrix3xX::zeros(4);
        basis.populate_basis_gradients(gradients.columns_mut(0, 4), &xi);
        let gradient_sum = gradients.column_sum();
        prop_assert!(gradient_sum.norm() <= 1e-12);
    }

    #[test]
    fn lagrange_quad_gradients_match_finite_differences(xi in point_in_quad_ref_domain()) {
        let lagrange = LagrangeBasis::new(ReferenceCell::Quadrilateral);
        let basis: &dyn CellBasis<f64, U2> = &lagrange;
        let gradients = basis_gradients_2d(basis, &xi);
        for i in 0..4 {
            let approx = approximate_gradient_fd(|p| basis_value_2d(basis, i, p), &xi, 1e-6);
            assert_matrix_eq!(gradients.column(i), approx, comp = abs, tol = 1e-8);
        }
    }

    #[test]
    fn bubble_gradients_match_finite_differences(xi in point_in_tri_ref_domain()) {
        let bubble = BubbleBasis::new(ReferenceCell::Triangle);
        let basis: &dyn CellBasis<f64, U2> = &bubble;
        let gradient = basis_gradients_2d(basis, &xi);
        let approx = approximate_gradient_fd(|p| basis_value_2d(basis, 0, p), &xi, 1e-6);
        assert_matrix_eq!(gradient.column(0), approx, comp = abs, tol = 1e-7);
    }

    #[test]
    fn bubble_hessians_match_finite_differences(xi in point_in_quad_ref_domain()) {
        let bubble = BubbleBasis::new(ReferenceCell::Quadrilateral);
        let basis: &dyn CellBasis<f64, U2> = &bubble;
        let mut hessians = [Matrix2::zeros()];
        basis.populate_basis_hessians(&mut hessians, &xi);
        for k in 0..2 {
            let approx = approximate_gradient_fd(|p| basis_gradients_2d(basis, p)[(k, 0)], &xi, 1e-6);
            assert_matrix_eq!(hessians[0].row(k).transpose(), approx, comp = abs, tol = 1e-7);
        }
    }
}
