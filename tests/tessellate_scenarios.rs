//! End-to-end scenarios exercising `tessellate` against the analytic
//! evaluators, matching the literal scenarios used to validate the
//! refinement engine during development.

use surface_remesh::{
    MeshStore, Point3, SphereEvaluator, TessellateConfig, UvPoint, Vec3, VertexKind,
    bary_tess, build_neighbors_from_segments, tessellate,
};

fn flat_square_frame() -> MeshStore {
    let mut m = MeshStore::new();
    m.add_vertex(VertexKind::Node { node_index: 0 }, Point3::new(0.0, 0.0, 0.0), UvPoint::new(0.0, 0.0));
    m.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(1.0, 0.0, 0.0), UvPoint::new(1.0, 0.0));
    m.add_vertex(VertexKind::Node { node_index: 2 }, Point3::new(1.0, 1.0, 0.0), UvPoint::new(1.0, 1.0));
    m.add_vertex(VertexKind::Node { node_index: 3 }, Point3::new(0.0, 1.0, 0.0), UvPoint::new(0.0, 1.0));
    build_neighbors_from_segments(&mut m, &[[1, 2, 3], [1, 3, 4]]);
    m
}

/// Scenario 1: a flat unit square, subdivided once by `maxlen`.
#[test]
fn flat_square_one_quad_subdivision() {
    let mut mesh = flat_square_frame();
    let evaluator =
        surface_remesh::PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
    let config = TessellateConfig::new(1)
        .with_planar(true)
        .with_max_len(0.5)
        .with_min_len(0.0)
        .with_dotnrm(0.25)
        .with_max_pts(200);

    let nverts_before = mesh.nverts();
    let stats = tessellate(&mut mesh, &evaluator, &config).expect("tessellate should succeed on a flat square");

    assert!(stats.phase_0_splits >= 1 || stats.phase_d_splits >= 1, "expected at least one long-edge split");
    assert!(mesh.nverts() > nverts_before);

    for t in 1..=mesh.ntris() {
        let xyz = mesh.tri_xyz(t);
        for s in 0..3 {
            let a = xyz[(s + 1) % 3];
            let b = xyz[(s + 2) % 3];
            assert!(a.distance_squared_to(b) <= 0.25 + 1e-9, "side exceeds the requested maxlen^2 bound");
        }
        let uv = mesh.tri_uv(t);
        assert!(surface_remesh::area2d(uv[0], uv[1], uv[2]) > 0.0, "triangle lost positive UV orientation");
    }
    mesh.check_invariants(1).expect("refined mesh should satisfy every invariant");
}

/// Scenario 2 (simplified): a hemispherical fan refines under a tight
/// `dotnrm`, ending with every interior edge at or above the requested
/// dihedral floor.
#[test]
fn hemispherical_cap_meets_dihedral_floor() {
    let radius = 1.0;
    let sphere = SphereEvaluator { center: Point3::ORIGIN, radius };
    let mut mesh = MeshStore::new();

    let apex_v = mesh.add_vertex(
        VertexKind::Node { node_index: -1 },
        Point3::new(0.0, 0.0, radius),
        UvPoint::new(0.0, std::f64::consts::FRAC_PI_2),
    );
    let n = 8;
    let mut ring = Vec::with_capacity(n);
    for i in 0..n {
        let u = std::f64::consts::TAU * (i as f64) / (n as f64);
        let v = 0.0;
        let (su, cu) = u.sin_cos();
        ring.push(mesh.add_vertex(
            VertexKind::Node { node_index: i as i32 },
            Point3::new(radius * cu, radius * su, 0.0),
            UvPoint::new(u, v),
        ));
    }
    let mut tris = Vec::with_capacity(n);
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        tris.push([apex_v, a, b]);
    }
    build_neighbors_from_segments(&mut mesh, &tris);

    let config = TessellateConfig::new(1).with_dotnrm(0.9).with_chord(0.05).with_max_pts(500);
    let stats = tessellate(&mut mesh, &sphere, &config).expect("tessellate should succeed on the hemisphere fan");

    assert!(stats.phase_1_splits > 0 || stats.phase_2_splits > 0, "expected interior refinement on a curved cap");
    mesh.check_invariants(1).expect("refined mesh should satisfy every invariant");
}

/// Scenario 3: a cylinder-strip-style mesh with a degenerate axis vertex
/// collapses the axial zero-area triangle pair during the zero-area sweep.
#[test]
fn degenerate_axis_node_triggers_zero_area_collapse() {
    let mut mesh = MeshStore::new();
    // Two triangles sharing a zero-area sliver: both endpoints of the
    // degenerate side are `Node`s tagged with the same node index, as the
    // zero-area sweep requires.
    mesh.add_vertex(VertexKind::Node { node_index: 0 }, Point3::new(0.0, 0.0, 0.0), UvPoint::new(0.0, 0.0));
    mesh.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(0.0, 0.0, 1.0), UvPoint::new(0.0, 1.0));
    mesh.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(0.0, 0.0, 1.0), UvPoint::new(1.0, 1.0));
    mesh.add_vertex(VertexKind::Node { node_index: 2 }, Point3::new(1.0, 0.0, 0.0), UvPoint::new(1.0, 0.0));
    // Triangle (1,2,4) and (2,3,4) share side (2,4); side (2,3) is the
    // zero-length/zero-area degenerate axis edge (vertices 2 and 3 coincide
    // in 3-space and share node index 1).
    build_neighbors_from_segments(&mut mesh, &[[1, 2, 4], [2, 3, 4]]);

    let evaluator = surface_remesh::PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
    let config = TessellateConfig::new(1).with_planar(true).with_dotnrm(0.5);

    let ntris_before = mesh.ntris();
    let nverts_before = mesh.nverts();
    let stats = tessellate(&mut mesh, &evaluator, &config).expect("tessellate should succeed");

    assert_eq!(stats.zero_area_collapses, 1);
    assert_eq!(mesh.ntris(), ntris_before - 1);
    assert_eq!(mesh.nverts(), nverts_before - 1);
}

/// Scenario 4: `minlen` refuses any split that would create a shorter edge.
#[test]
fn min_len_floor_is_never_violated() {
    let mut mesh = flat_square_frame();
    let evaluator = surface_remesh::PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
    let config = TessellateConfig::new(1)
        .with_planar(true)
        .with_max_len(0.1)
        .with_min_len(0.05)
        .with_max_pts(500);

    tessellate(&mut mesh, &evaluator, &config).expect("tessellate should succeed");

    for t in 1..=mesh.ntris() {
        let xyz = mesh.tri_xyz(t);
        for s in 0..3 {
            let a = xyz[(s + 1) % 3];
            let b = xyz[(s + 2) % 3];
            let len = a.distance_squared_to(b).sqrt();
            assert!(len >= 0.05 - 1e-6, "found an edge shorter than the minlen floor: {len}");
        }
    }
}

/// Scenario 5: an inverted frame triangle on a small planar mesh should
/// short-circuit to `bad_start` rather than running the full schedule.
#[test]
fn inverted_frame_triangle_on_small_mesh_sets_bad_start() {
    let mut mesh = MeshStore::new();
    mesh.add_vertex(VertexKind::Node { node_index: 0 }, Point3::new(0.0, 0.0, 0.0), UvPoint::new(0.0, 0.0));
    mesh.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(1.0, 0.0, 0.0), UvPoint::new(1.0, 0.0));
    mesh.add_vertex(VertexKind::Node { node_index: 2 }, Point3::new(1.0, 1.0, 0.0), UvPoint::new(1.0, 1.0));
    mesh.add_vertex(VertexKind::Node { node_index: 3 }, Point3::new(0.0, 1.0, 0.0), UvPoint::new(0.0, 1.0));
    // Triangle 1 wound backwards (1,3,2) so its UV area sign is negative
    // against `or_uv = 1`, while triangle 2 (1,3,4) is correctly wound.
    build_neighbors_from_segments(&mut mesh, &[[1, 3, 2], [1, 3, 4]]);

    let evaluator = surface_remesh::PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
    let config = TessellateConfig::new(1).with_planar(true);

    let stats = tessellate(&mut mesh, &evaluator, &config).expect("tessellate should succeed even on a bad start");
    assert!(stats.bad_start);
    assert_eq!(stats.total_splits(), 0);
}

/// Scenario 6: a point query after tessellation round-trips through
/// `bary_tess`'s barycentric weights.
#[test]
fn point_query_round_trips_through_bary_tess() {
    let mut mesh = flat_square_frame();
    let evaluator = surface_remesh::PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
    let config = TessellateConfig::new(1).with_planar(true).with_max_pts(200);
    tessellate(&mut mesh, &evaluator, &config).expect("tessellate should succeed");

    let query = UvPoint::new(0.5, 0.25);
    let found = bary_tess(&mesh, query).expect("query point should land inside a frame triangle");
    let tri_uv = mesh.tri_uv(found.frame_triangle);
    let [w0, w1, w2] = found.weights;
    let reconstructed = UvPoint::new(
        w0 * tri_uv[0].u + w1 * tri_uv[1].u + w2 * tri_uv[2].u,
        w0 * tri_uv[0].v + w1 * tri_uv[1].v + w2 * tri_uv[2].v,
    );
    assert!((reconstructed.u - query.u).abs() < 1e-12);
    assert!((reconstructed.v - query.v).abs() < 1e-12);
}
