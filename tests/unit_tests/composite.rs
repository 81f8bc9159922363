use fenris_composite::composite::{AdaptStats, CompositeSpace, SpaceState};
use fenris_composite::element::{
    BubbleBasis, CellBasis, DofKey, GlobalFunction, GlobalFunctionBasis, LagrangeBasis, ReferenceCell,
};
use fenris_composite::mesh::procedural::create_unit_square_uniform_quad_mesh_2d;
use fenris_composite::mesh::{CellMesh, QuadMesh2d};
use fenris_composite::nalgebra::{DVector, Matrix2, Point2, Vector2, U2};
use fenris_composite::space::{RestrictedSpace, SourceSpace, UniformSpace};
use fenris_composite::Error;
use matrixcompare::assert_scalar_eq;

fn quad_lagrange_space() -> UniformSpace<LagrangeBasis> {
    UniformSpace::new(LagrangeBasis::new(ReferenceCell::Quadrilateral))
}

fn quad_bubble_region(cells: impl IntoIterator<Item = usize>) -> RestrictedSpace<UniformSpace<BubbleBasis>> {
    RestrictedSpace::new(UniformSpace::new(BubbleBasis::new(ReferenceCell::Quadrilateral)), cells)
}

fn global_function_space(key_indices: &[usize]) -> UniformSpace<GlobalFunctionBasis<f64, U2>> {
    let functions = key_indices
        .iter()
        .map(|index| {
            GlobalFunction::new(
                DofKey::new(1, *index),
                |p: &Point2<f64>| p.x,
                |_: &Point2<f64>| Vector2::new(1.0, 0.0),
                |_: &Point2<f64>| Matrix2::zeros(),
            )
        })
        .collect();
    UniformSpace::new(GlobalFunctionBasis::new(ReferenceCell::Quadrilateral, functions))
}

/// Coefficients reproducing the x coordinate through the vertex dofs, with the given
/// coefficient for all other dofs.
fn x_coordinate_coefficients(space: &CompositeSpace<f64, U2>, mesh: &QuadMesh2d<f64>, other: f64) -> DVector<f64> {
    let mut u = DVector::repeat(space.num_dofs(), other);
    for (v, vertex) in mesh.vertices().iter().enumerate() {
        let global = space
            .dof_map()
            .global_dof_for_key(&DofKey::vertex(v))
            .unwrap();
        u[global] = vertex.x;
    }
    u
}

#[test]
fn enrichment_of_single_cell() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(3);
    let lagrange = quad_lagrange_space();
    let enrichment = quad_bubble_region([4]);

    let mut space = CompositeSpace::new();
    let sources: [&dyn SourceSpace<f64, U2>; 2] = [&lagrange, &enrichment];
    let stats = space.set_source_spaces(&mesh, sources).unwrap();

    assert_eq!(
        stats,
        AdaptStats {
            assigned_cells: 9,
            skipped_cells: 0,
            num_situations: 2,
            num_dofs: 17,
        }
    );
    assert_eq!(space.state(), SpaceState::Fresh);
    assert_eq!(space.num_cells(), 9);
    assert_eq!(space.cache().len(), 2);

    let common = space.cell_evaluator(0).unwrap();
    for cell in (0..9).filter(|cell| *cell != 4) {
        assert_eq!(space.cell_evaluator(cell), Some(common));
        let basis = space.cell_basis(cell).unwrap();
        assert_eq!(basis.num_contributors(), 1);
        assert_eq!(basis.num_dofs(), 4);
    }

    let enriched = space.cell_basis(4).unwrap();
    assert_ne!(space.cell_evaluator(4), Some(common));
    assert_eq!(enriched.num_contributors(), 2);
    assert_eq!(enriched.num_dofs(), 4 + 1);

    // The bubble dof is not shared with any other cell
    let bubble_dof = space.dof_map().cell_dofs(4).unwrap()[4];
    for cell in (0..9).filter(|cell| *cell != 4) {
        assert!(!space.dof_map().cell_dofs(cell).unwrap().contains(&bubble_dof));
    }
}

#[test]
fn cells_without_contributors_are_skipped() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(3);
    let enrichment = quad_bubble_region([2, 7]);

    let mut space = CompositeSpace::new();
    let stats = space
        .set_source_spaces(&mesh, [&enrichment as &dyn SourceSpace<f64, U2>])
        .unwrap();
    assert_eq!(stats.assigned_cells, 2);
    assert_eq!(stats.skipped_cells, 7);
    assert_eq!(stats.num_situations, 1);
    assert_eq!(stats.num_dofs, 2);

    assert!(space.cell_basis(0).is_none());
    assert!(space.cell_basis(2).is_some());
    assert_eq!(space.cell_evaluator(2), space.cell_evaluator(7));
    assert!(!space.dof_map().is_assigned(0));
    assert_eq!(space.dof_map().cell_dofs(0), Some(&[][..]));
    assert_eq!(space.dof_map().num_assigned_cells(), 2);
}

#[test]
fn rebuild_is_idempotent() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(4);
    let lagrange = quad_lagrange_space();
    let enrichment = quad_bubble_region([1, 5, 6]);

    let mut space = CompositeSpace::new();
    let sources: [&dyn SourceSpace<f64, U2>; 2] = [&lagrange, &enrichment];
    let first_stats = space.set_source_spaces(&mesh, sources).unwrap();
    let assignments: Vec<_> = (0..16).map(|cell| space.cell_evaluator(cell)).collect();
    let dof_map = space.dof_map().clone();

    let second_stats = space.adapt(&mesh).unwrap();
    assert_eq!(first_stats, second_stats);
    assert_eq!(space.cache().len(), 2);
    let reassigned: Vec<_> = (0..16).map(|cell| space.cell_evaluator(cell)).collect();
    assert_eq!(assignments, reassigned);
    assert_eq!(&dof_map, space.dof_map());
}

#[test]
fn mark_stale_is_lazy() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let lagrange = quad_lagrange_space();

    let mut space = CompositeSpace::new();
    space
        .set_source_spaces(&mesh, [&lagrange as &dyn SourceSpace<f64, U2>])
        .unwrap();
    assert!(!space.is_stale(&mesh));
    assert_eq!(space.num_dofs(), 9);

    space.mark_stale();
    assert_eq!(space.state(), SpaceState::Stale);
    assert!(space.is_stale(&mesh));
    // Nothing is recomputed until the next rebuild
    assert!(space.cell_basis(0).is_some());
    assert_eq!(space.num_dofs(), 9);

    let stats = space.ensure_adapted(&mesh).unwrap();
    assert_eq!(stats.map(|stats| stats.num_dofs), Some(9));
    assert_eq!(space.state(), SpaceState::Fresh);
    assert_eq!(space.ensure_adapted(&mesh).unwrap(), None);
}

#[test]
fn mesh_changes_are_detected_by_revision() {
    let mut mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let lagrange = quad_lagrange_space();

    let mut space = CompositeSpace::new();
    space
        .set_source_spaces(&mesh, [&lagrange as &dyn SourceSpace<f64, U2>])
        .unwrap();
    assert!(!space.is_stale(&mesh));

    mesh.vertices_mut()[0].x -= 0.1;
    assert!(space.is_stale(&mesh));
    // The lifecycle state does not account for mesh changes
    assert_eq!(space.state(), SpaceState::Fresh);
    assert!(space.ensure_adapted(&mesh).unwrap().is_some());
    assert!(!space.is_stale(&mesh));
}

#[test]
fn different_mesh_at_same_revision_is_stale() {
    let small = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let large = create_unit_square_uniform_quad_mesh_2d::<f64>(4);
    assert_eq!(small.revision(), large.revision());
    let lagrange = quad_lagrange_space();

    let mut space = CompositeSpace::new();
    space
        .set_source_spaces(&small, [&lagrange as &dyn SourceSpace<f64, U2>])
        .unwrap();
    assert!(!space.is_stale(&small));
    assert!(space.is_stale(&large));

    let u = DVector::zeros(space.num_dofs());
    assert_eq!(space.interpolate(&large, 0, &Point2::origin(), &u), None);

    let stats = space.ensure_adapted(&large).unwrap().unwrap();
    assert_eq!(stats.assigned_cells, 16);
    assert_eq!(space.num_cells(), 16);
    assert_eq!(space.num_dofs(), 25);
    assert!(!space.is_stale(&large));
    assert!(space.is_stale(&small));

    // A copy of the mesh is a different mesh, even with identical contents
    let copy = large.clone();
    assert!(space.is_stale(&copy));
    let kept = large.keep_cells(&(0..16).collect::<Vec<_>>());
    assert!(space.is_stale(&kept));
}

#[test]
fn replacing_sources_by_subset_releases_removed_provider() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(3);
    let lagrange = quad_lagrange_space();
    let enrichment = quad_bubble_region([0, 4, 8]);

    let mut space = CompositeSpace::new();
    let sources: [&dyn SourceSpace<f64, U2>; 2] = [&lagrange, &enrichment];
    space.set_source_spaces(&mesh, sources).unwrap();
    assert!(space.cache().contains_provider(enrichment.space().basis()));

    let stats = space
        .set_source_spaces(&mesh, [&lagrange as &dyn SourceSpace<f64, U2>])
        .unwrap();
    assert_eq!(stats.num_situations, 1);
    assert_eq!(space.source_spaces().len(), 1);
    assert!(!space.cache().contains_provider(enrichment.space().basis()));
    assert!(space.cache().contains_provider(lagrange.basis()));
}

#[test]
fn adapt_without_sources_fails() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let lagrange = quad_lagrange_space();

    let mut space = CompositeSpace::<f64, U2>::new();
    assert_eq!(space.adapt(&mesh), Err(Error::NoSourceSpaces));
    assert_eq!(space.num_cells(), 0);

    space
        .set_source_spaces(&mesh, [&lagrange as &dyn SourceSpace<f64, U2>])
        .unwrap();
    assert_eq!(space.num_cells(), 4);

    let result = space.set_source_spaces(&mesh, Vec::new());
    assert_eq!(result, Err(Error::NoSourceSpaces));
    assert_eq!(space.state(), SpaceState::Stale);
    assert_eq!(space.num_cells(), 0);
    assert!(space.cell_basis(0).is_none());
    assert!(space.cache().is_empty());
    assert_eq!(space.num_dofs(), 0);
}

#[test]
fn reference_cell_mismatch_aborts_rebuild() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let triangles = UniformSpace::new(LagrangeBasis::new(ReferenceCell::Triangle));

    let mut space = CompositeSpace::new();
    let result = space.set_source_spaces(&mesh, [&triangles as &dyn SourceSpace<f64, U2>]);
    assert!(matches!(result, Err(Error::StructuralMismatch { cell: 0, .. })));
    assert_eq!(space.state(), SpaceState::Stale);
    assert!(space.cell_basis(0).is_none());
    assert!(space.cache().is_empty());
}

#[test]
fn smart_linking_merges_coincident_global_functions() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let first = global_function_space(&[0]);
    let second = global_function_space(&[0, 1]);
    let sources: [&dyn SourceSpace<f64, U2>; 2] = [&first, &second];

    let mut space = CompositeSpace::new();
    space.set_source_spaces(&mesh, sources).unwrap();
    assert!(!space.is_smart_linking());
    assert_eq!(space.cell_basis(0).unwrap().num_dofs(), 3);
    // Without linking, the coincident functions still share their global dof
    assert_eq!(space.dof_map().cell_dofs(0), Some(&[0, 0, 1][..]));
    assert_eq!(space.num_dofs(), 2);

    space.set_smart_linking(true);
    assert_eq!(space.state(), SpaceState::Stale);
    space.adapt(&mesh).unwrap();
    let basis = space.cell_basis(3).unwrap();
    assert!(basis.is_smart_linking());
    assert_eq!(basis.num_dofs(), 2);
    assert_eq!(space.dof_map().cell_dofs(3), Some(&[0, 1][..]));
    assert_eq!(space.num_dofs(), 2);
}

#[test]
fn unsupported_linking_aborts_rebuild() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let lagrange = quad_lagrange_space();
    let repeated = global_function_space(&[3, 3]);
    let sources: [&dyn SourceSpace<f64, U2>; 2] = [&lagrange, &repeated];

    let mut space = CompositeSpace::new().with_smart_linking(true);
    let result = space.set_source_spaces(&mesh, sources);
    assert_eq!(
        result,
        Err(Error::UnsupportedLinking {
            cell: 0,
            key: DofKey::new(1, 3)
        })
    );
    assert_eq!(space.num_cells(), 0);

    space.set_smart_linking(false);
    assert!(space.adapt(&mesh).is_ok());
}

#[test]
fn interpolation_through_merged_bases() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(3);
    let lagrange = quad_lagrange_space();
    let enrichment = quad_bubble_region([4]);

    let mut space = CompositeSpace::new();
    let sources: [&dyn SourceSpace<f64, U2>; 2] = [&lagrange, &enrichment];
    space.set_source_spaces(&mesh, sources).unwrap();

    // Bilinear Lagrange functions reproduce the x coordinate exactly
    let u = x_coordinate_coefficients(&space, &mesh, 0.0);
    for cell in 0..9 {
        let xi = Point2::new(0.3, -0.2);
        let x = mesh.cell_geometry(cell).unwrap().map_reference_coords(&xi);
        let value = space.interpolate(&mesh, cell, &xi, &u).unwrap();
        assert_scalar_eq!(value, x.x, comp = abs, tol = 1e-12);
    }

    // The bubble attains the value one at the cell center
    let u = x_coordinate_coefficients(&space, &mesh, 2.0);
    let center = space.interpolate(&mesh, 4, &Point2::origin(), &u).unwrap();
    assert_scalar_eq!(center, 0.5 + 2.0, comp = abs, tol = 1e-12);
    let corner = space
        .interpolate(&mesh, 4, &Point2::new(-1.0, -1.0), &u)
        .unwrap();
    assert_scalar_eq!(corner, 1.0 / 3.0, comp = abs, tol = 1e-12);
}

#[test]
fn interpolation_requires_fresh_assigned_cell() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let enrichment = quad_bubble_region([1]);

    let mut space = CompositeSpace::new();
    space
        .set_source_spaces(&mesh, [&enrichment as &dyn SourceSpace<f64, U2>])
        .unwrap();
    let u = DVector::repeat(1, 1.0);
    assert!(space.interpolate(&mesh, 0, &Point2::origin(), &u).is_none());
    assert!(space.interpolate(&mesh, 1, &Point2::origin(), &u).is_some());

    space.mark_stale();
    assert!(space.interpolate(&mesh, 1, &Point2::origin(), &u).is_none());
}

#[test]
fn clear_keeps_sources() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let lagrange = quad_lagrange_space();
    let enrichment = quad_bubble_region([0]);

    let mut space = CompositeSpace::new();
    let sources: [&dyn SourceSpace<f64, U2>; 2] = [&lagrange, &enrichment];
    space.set_source_spaces(&mesh, sources).unwrap();

    space.clear();
    assert_eq!(space.state(), SpaceState::Stale);
    assert_eq!(space.num_cells(), 0);
    assert!(space.cache().is_empty());
    assert_eq!(space.num_dofs(), 0);
    assert_eq!(space.source_spaces().len(), 2);

    let stats = space.ensure_adapted(&mesh).unwrap().unwrap();
    assert_eq!(stats.num_dofs, 9 + 1);
}

#[test]
fn errors_describe_offending_cell() {
    let error = Error::UnsupportedLinking {
        cell: 3,
        key: DofKey::new(1, 2),
    };
    assert_eq!(error.to_string(), "Can not link global dof (family 1, index 2) on cell 3");
    let error = Error::StructuralMismatch {
        cell: 5,
        reason: "incompatible".to_string(),
    };
    assert_eq!(error.to_string(), "Structural mismatch on cell 5: incompatible");
}
