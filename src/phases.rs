//! The phase driver: `tessellate` takes a frame triangulation (already
//! neighbor-stitched by [`crate::neighbors::build_neighbors_from_segments`])
//! plus a [`FaceEvaluator`] and config, and refines it in place through a
//! fixed schedule of swap/split phases.
//!
//! Structured as a sequence of named passes, each scanning the whole mesh,
//! separated by a generic "settle the mesh" swap sub-pass, with a running
//! stats struct threaded through every stage.

use crate::config::{TessellateConfig, TessellateStats};
use crate::neighbors::flip_triangle_winding;
use crate::core::{Point3, UvPoint};
use crate::error::TessellateError;
use crate::evaluator::FaceEvaluator;
use crate::mesh::{MeshStore, VertexKind};
use crate::midpoint_cache::MidpointCache;
use crate::predicates::{dot_norm, max_uv_angle, orien_tri};
use crate::quality::{Accum, ang_uv_test, area_test, diag_test};
use crate::topology::{check_or, edge_collapse, edge_swap, side_split, triangle_split};

const CUTANG: f64 = 3.10;
const DEVANG: f64 = 2.65;
const MAXORCNT: u32 = 500;
const SWAP_ROUNDS: u32 = 200;

/// Refines `mesh` in place per `config`, evaluating new vertices through
/// `evaluator`. Returns the accumulated phase statistics, or propagates an
/// allocation failure (there is none on this arena-backed store, so in
/// practice this is infallible, but the signature matches the distilled
/// spec's `Result<TessellateStats, TessellateError>`).
pub fn tessellate(
    mesh: &mut MeshStore,
    evaluator: &dyn FaceEvaluator,
    config: &TessellateConfig,
) -> Result<TessellateStats, TessellateError> {
    let mut stats = TessellateStats::default();

    derive_metrics(mesh, evaluator, config, &mut stats);
    zero_area_sweep(mesh, &mut stats);

    let mut accum = Accum::Max(0.0);
    swap_tris(
        mesh,
        config.or_uv,
        &mut stats,
        |m, t1, s, t2, acc, or_cnt| area_test(m, t1, s, t2, config.or_uv, acc, or_cnt),
        &mut accum,
    );

    mesh.capture_frame();

    if let Some(hints) = &config.quad_hints {
        if mesh.nverts() == 4 && mesh.ntris() == 2 && hints.lens == [1, 1, 1, 1] {
            if config.out_level >= 1 {
                log::debug!("quad path: recognised trivial single-quad face, returning frame unchanged");
            }
            if config.or_uv < 0 {
                flip_triangle_winding(mesh);
            }
            return Ok(stats);
        }
    }

    let bad_start = seed_marks_and_check_start(mesh, config.or_uv, config.planar, &mut stats);
    stats.bad_start = bad_start;

    let max_pts = config.resolved_max_pts(mesh.nfrvrts());

    if bad_start {
        let mut accum = Accum::Max(0.0);
        swap_tris(mesh, config.or_uv, &mut stats, |m, t1, s, t2, acc, _or_cnt| {
            crate::quality::ang_xyz_test(m, t1, s, t2, config.dotnrm, true, acc)
        }, &mut accum);
        return Ok(stats);
    }

    if config.planar {
        let mut accum = Accum::Max(0.0);
        swap_tris(mesh, config.or_uv, &mut stats, |m, t1, s, t2, acc, _or_cnt| {
            crate::quality::ang_xyz_test(m, t1, s, t2, config.dotnrm, true, acc)
        }, &mut accum);
        phase_d(mesh, config, max_pts, &mut stats);
        return Ok(stats);
    }

    phase_x(mesh, evaluator, config, &mut stats);
    phase_0(mesh, config, max_pts, &mut stats);
    phase_a(mesh, evaluator, config, max_pts, &mut stats);
    phase_b(mesh, config, max_pts, &mut stats);
    phase_c(mesh, evaluator, config, max_pts, &mut stats);
    phase_d(mesh, config, max_pts, &mut stats);
    phase_1(mesh, evaluator, config, max_pts, &mut stats);
    phase_2(mesh, evaluator, config, max_pts, &mut stats);
    phase_3(mesh, config, &mut stats);

    Ok(stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric derivation
// ─────────────────────────────────────────────────────────────────────────────

fn derive_metrics(mesh: &MeshStore, evaluator: &dyn FaceEvaluator, config: &TessellateConfig, stats: &mut TessellateStats) {
    let mut sum_du = 0.0;
    let mut sum_dv = 0.0;
    let mut devia2: f64 = 0.0;

    for v in 1..=mesh.nverts() {
        let vtx = mesh.vertex(v);
        if let Ok(point) = evaluator.evaluate(vtx.uv.u, vtx.uv.v) {
            sum_du += point.du.length();
            sum_dv += point.dv.length();
            devia2 = devia2.max(vtx.xyz.distance_squared_to(point.xyz));
        }
    }

    stats.v_over_u = if sum_du > f64::EPSILON { sum_dv / sum_du } else { 1.0 };
    stats.devia2 = devia2;

    let mut min_len2 = f64::INFINITY;
    let mut sum_len = 0.0;
    let mut nseg = 0u32;
    for seg in &mesh.segments {
        let len2 = mesh.vertex(seg.endpoints[0]).xyz.distance_squared_to(mesh.vertex(seg.endpoints[1]).xyz);
        min_len2 = min_len2.min(len2);
        sum_len += len2.sqrt();
        nseg += 1;
    }
    if nseg == 0 {
        min_len2 = 0.0;
    }
    stats.eps2 = (min_len2 / 4.0).max(config.minlen * config.minlen);
    let mean_len = if nseg > 0 { sum_len / f64::from(nseg) } else { 0.0 };
    stats.edist2 = mean_len * mean_len;
}

// ─────────────────────────────────────────────────────────────────────────────
// Zero-area sweep
// ─────────────────────────────────────────────────────────────────────────────

fn zero_area_sweep(mesh: &mut MeshStore, stats: &mut TessellateStats) {
    let mut t = 1;
    while t <= mesh.ntris() {
        let xyz = mesh.tri_xyz(t);
        let cross = (xyz[1] - xyz[0]).cross(xyz[2] - xyz[0]);
        if cross.length_squared() <= f64::EPSILON {
            let tri = *mesh.triangle(t);
            let mut collapsed = false;
            for s in 0..3 {
                let (a, b) = tri.side_endpoints(s);
                let va = mesh.vertex(a).kind;
                let vb = mesh.vertex(b).kind;
                if same_boundary_locus(va, vb) && edge_collapse(mesh, b.max(a), b.min(a), 1, &mut stats.or_cnt).is_ok() {
                    stats.zero_area_collapses += 1;
                    collapsed = true;
                    break;
                }
            }
            if !collapsed {
                t += 1;
            }
        } else {
            t += 1;
        }
    }
}

fn same_boundary_locus(a: VertexKind, b: VertexKind) -> bool {
    matches!(
        (a, b),
        (VertexKind::Node { node_index: na }, VertexKind::Node { node_index: nb }) if na == nb
    ) || matches!(
        (a, b),
        (VertexKind::EdgeInterior { edge_index: ea, .. }, VertexKind::EdgeInterior { edge_index: eb, .. }) if ea == eb
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Mark seeding
// ─────────────────────────────────────────────────────────────────────────────

/// Seeds every interior side's swap-candidate mark and reports whether the
/// mesh should short-circuit to the reduced schedule: at least one
/// mis-oriented frame triangle on a mesh that is either small (`ntris < 16`)
/// or already flagged planar.
fn seed_marks_and_check_start(mesh: &mut MeshStore, or_uv: i32, planar: bool, stats: &mut TessellateStats) -> bool {
    let mut bad_frame_triangles = 0u32;
    for t in 1..=mesh.ntris() {
        let uv = mesh.tri_uv(t);
        if orien_tri(uv[0], uv[1], uv[2]) != or_uv.signum() {
            bad_frame_triangles += 1;
            stats.or_cnt += 1;
        }
        for s in 0..3 {
            let neighbor = mesh.triangle(t).neighbors[s];
            let candidate = neighbor > 0 && check_or(mesh, t, s, or_uv, &mut stats.or_cnt);
            mesh.triangle_mut(t).set_mark_bit(s, candidate);
        }
    }
    bad_frame_triangles >= 1 && (mesh.ntris() < 16 || planar)
}

// ─────────────────────────────────────────────────────────────────────────────
// The swap loop (`swapTris`)
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the mark-driven swap loop for at most [`SWAP_ROUNDS`] rounds. `test`
/// is applied to every marked side; a `true` result performs the swap.
/// Returns the number of swaps performed.
fn swap_tris(
    mesh: &mut MeshStore,
    or_uv: i32,
    stats: &mut TessellateStats,
    test: impl Fn(&MeshStore, u32, usize, u32, &mut Accum, &mut u32) -> bool,
    accum: &mut Accum,
) -> u32 {
    let mut total = 0u32;
    for _round in 0..SWAP_ROUNDS {
        let mut any_swap = false;
        let mut t = 1;
        while t <= mesh.ntris() {
            if mesh.triangle(t).hit != 0 {
                t += 1;
                continue;
            }
            let mut touched = false;
            for s in 0..3 {
                if !mesh.triangle(t).mark_bit(s) {
                    continue;
                }
                let neighbor = mesh.triangle(t).neighbors[s];
                if neighbor <= 0 {
                    continue;
                }
                if test(mesh, t, s, neighbor as u32, accum, &mut stats.or_cnt)
                    && edge_swap(mesh, t, s, or_uv, &mut stats.or_cnt).is_ok()
                {
                    total += 1;
                    any_swap = true;
                    touched = true;
                    mesh.triangle_mut(t).hit = 0;
                    let n = neighbor as u32;
                    if n <= mesh.ntris() {
                        mesh.triangle_mut(n).hit = 0;
                    }
                    break;
                }
            }
            if !touched {
                mesh.triangle_mut(t).hit = 1;
            }
            t += 1;
        }
        if !any_swap {
            break;
        }
    }
    for t in 1..=mesh.ntris() {
        mesh.triangle_mut(t).hit = 0;
    }
    stats.total_swaps += total;
    total
}

fn settle(mesh: &mut MeshStore, config: &TessellateConfig, stats: &mut TessellateStats) {
    let mut accum = Accum::Max(0.0);
    let v_over_u = stats.v_over_u;
    swap_tris(mesh, config.or_uv, stats, |m, t1, s, t2, acc, _or_cnt| ang_uv_test(m, t1, s, t2, v_over_u, acc), &mut accum);
    let mut accum = Accum::Min(f64::INFINITY);
    swap_tris(mesh, config.or_uv, stats, |m, t1, s, t2, acc, _or_cnt| diag_test(m, t1, s, t2, v_over_u, acc), &mut accum);
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase X — opposite-normal inter-edge split
// ─────────────────────────────────────────────────────────────────────────────

fn phase_x(mesh: &mut MeshStore, evaluator: &dyn FaceEvaluator, config: &TessellateConfig, stats: &mut TessellateStats) {
    let normals = vertex_normals(mesh, evaluator);

    let mut did_split = true;
    while did_split {
        did_split = false;
        let mut t = 1;
        while t <= mesh.ntris() {
            let Some((s, _len2)) = longest_interior_side(mesh, t) else { t += 1; continue };
            let (a, b) = mesh.triangle(t).side_endpoints(s);
            let opposite = match (normals.get(a as usize - 1), normals.get(b as usize - 1)) {
                (Some(Some(na)), Some(Some(nb))) => na.dot(*nb) < -0.00001,
                _ => false,
            };
            if opposite && split_side_with_midpoint(mesh, evaluator, config, t, s, stats).is_some() {
                stats.phase_x_splits += 1;
                did_split = true;
            }
            t += 1;
        }
        if did_split {
            settle(mesh, config, stats);
        }
    }
}

fn vertex_normals(mesh: &MeshStore, evaluator: &dyn FaceEvaluator) -> Vec<Option<crate::core::Vec3>> {
    (1..=mesh.nverts())
        .map(|v| {
            let uv = mesh.vertex(v).uv;
            evaluator.evaluate(uv.u, uv.v).ok().and_then(|p| p.normal())
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 0 / D — edge-length enforcement
// ─────────────────────────────────────────────────────────────────────────────

fn phase_0(mesh: &mut MeshStore, config: &TessellateConfig, max_pts: u32, stats: &mut TessellateStats) {
    if config.maxlen <= 0.0 {
        return;
    }
    enforce_max_len(mesh, config, max_pts, 4.0 * config.maxlen * config.maxlen, stats, |s| &mut s.phase_0_splits);
}

fn phase_d(mesh: &mut MeshStore, config: &TessellateConfig, max_pts: u32, stats: &mut TessellateStats) {
    if config.maxlen <= 0.0 || stats.bad_start {
        return;
    }
    enforce_max_len(mesh, config, max_pts, config.maxlen * config.maxlen, stats, |s| &mut s.phase_d_splits);
}

fn enforce_max_len(
    mesh: &mut MeshStore,
    config: &TessellateConfig,
    max_pts: u32,
    threshold: f64,
    stats: &mut TessellateStats,
    counter: impl Fn(&mut TessellateStats) -> &mut u32,
) {
    let threshold = threshold.max(stats.devia2).max(stats.eps2);
    loop {
        if mesh.nverts() >= max_pts {
            stats.terminated_early = true;
            if config.out_level >= 1 {
                log::warn!("edge-length enforcement terminated early: vertex cap {max_pts} reached");
            }
            break;
        }
        let mut best: Option<(u32, usize, f64)> = None;
        for t in 1..=mesh.ntris() {
            for s in 0..3 {
                let (a, b) = mesh.triangle(t).side_endpoints(s);
                let len2 = mesh.vertex(a).xyz.distance_squared_to(mesh.vertex(b).xyz);
                if len2 > threshold && best.is_none_or(|(_, _, best_len2)| len2 > best_len2) {
                    best = Some((t, s, len2));
                }
            }
        }
        let Some((t, s, _)) = best else { break };
        let uv = mesh.tri_uv(t);
        let (e0, e1) = mesh.triangle(t).side_endpoints(s);
        let mid_uv = uv[(s + 1) % 3].midpoint(uv[(s + 2) % 3]);
        let xyz_mid = Point3::centroid(&[mesh.vertex(e0).xyz, mesh.vertex(e1).xyz]);
        match side_split(mesh, config.or_uv, t, s, xyz_mid, mid_uv, VertexKind::FaceInterior, config.minlen, &mut stats.or_cnt) {
            Ok(_) => *counter(stats) += 1,
            Err(_) => {
                if config.out_level >= 1 {
                    log::debug!("edge-length enforcement: side split rejected on triangle {t}, side {s}");
                }
                break;
            }
        }
        let mut accum = Accum::Max(0.0);
        swap_tris(mesh, config.or_uv, stats, |m, t1, side, t2, acc, _or_cnt| ang_uv_test(m, t1, side, t2, 1.0, acc), &mut accum);
        let mut accum2 = Accum::Min(f64::INFINITY);
        swap_tris(mesh, config.or_uv, stats, |m, t1, side, t2, acc, _or_cnt| diag_test(m, t1, side, t2, 1.0, acc), &mut accum2);

        let worst_angle = (1..=mesh.ntris())
            .map(|tt| {
                let uv = mesh.tri_uv(tt);
                max_uv_angle(uv[0], uv[1], uv[2], 1.0)
            })
            .fold(0.0_f64, f64::max);
        if worst_angle > crate::quality::MAXANG && accum2.value() < 0.0 {
            break;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase A / C — break big / uncached triangles
// ─────────────────────────────────────────────────────────────────────────────

/// A neighbour satisfies the local-concavity gate if either its dihedral dot
/// against `t` is `<= -0.9`, or flipping the shared diagonal would make the
/// neighbour's 3-D area differ from `t`'s by more than 0.1% of `t`'s area.
fn neighbor_trips_concavity_gate(mesh: &MeshStore, tri: &crate::mesh::Triangle, s: usize, area_t: f64) -> bool {
    let neighbor = tri.neighbors[s];
    if neighbor <= 0 {
        return false;
    }
    let (a, b) = tri.side_endpoints(s);
    let apex_self = mesh.vertex(tri.indices[s]).xyz;
    let other = mesh.triangle(neighbor as u32);
    let Some(p) = other.indices.iter().position(|&v| v != a && v != b) else { return false };
    let apex_other = mesh.vertex(other.indices[p]).xyz;
    let dot = dot_norm(apex_self, mesh.vertex(a).xyz, mesh.vertex(b).xyz, apex_other);
    if dot <= -0.9 {
        return true;
    }
    let other_xyz = [mesh.vertex(a).xyz, apex_other, mesh.vertex(b).xyz];
    let other_cross = (other_xyz[1] - other_xyz[0]).cross(other_xyz[2] - other_xyz[0]);
    let area_other = other_cross.length_squared().sqrt() * 0.5;
    if area_t <= f64::EPSILON {
        return false;
    }
    let relative_area = (area_other - area_t).abs() / area_t;
    relative_area > 0.001
}

fn triangle_eligible(mesh: &MeshStore, t: u32, eps2: f64) -> Option<(f64, UvPoint, Point3)> {
    let tri = *mesh.triangle(t);
    let interior_sides = tri.neighbors.iter().filter(|&&n| n > 0).count();
    if interior_sides < 2 {
        return None;
    }
    let uv = mesh.tri_uv(t);
    if max_uv_angle(uv[0], uv[1], uv[2], 1.0) > CUTANG {
        return None;
    }
    for s in 0..3 {
        let (a, b) = tri.side_endpoints(s);
        if mesh.vertex(a).xyz.distance_squared_to(mesh.vertex(b).xyz) <= eps2 {
            return None;
        }
    }
    let xyz = mesh.tri_xyz(t);
    let cross = (xyz[1] - xyz[0]).cross(xyz[2] - xyz[0]);
    let area2 = cross.length_squared();
    if area2 <= 0.0 {
        return None;
    }
    let area_t = area2.sqrt() * 0.5;
    let locally_bad = (0..3).any(|s| neighbor_trips_concavity_gate(mesh, &tri, s, area_t));
    if !locally_bad {
        return None;
    }
    let centroid_uv = UvPoint::new((uv[0].u + uv[1].u + uv[2].u) / 3.0, (uv[0].v + uv[1].v + uv[2].v) / 3.0);
    let centroid_xyz = Point3::centroid(&xyz);
    Some((area2, centroid_uv, centroid_xyz))
}

fn close_to_boundary(mesh: &MeshStore, t: u32, depth: u32) -> bool {
    let mut frontier = vec![t];
    let mut visited = std::collections::HashSet::new();
    visited.insert(t);
    for _ in 0..depth {
        let mut next = Vec::new();
        for &cur in &frontier {
            let tri = mesh.triangle(cur);
            for &n in &tri.neighbors {
                if n <= 0 {
                    return true;
                }
                let n = n as u32;
                if visited.insert(n) {
                    next.push(n);
                }
            }
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }
    false
}

fn flood_hit(mesh: &mut MeshStore, t: u32, depth: u32) {
    let mut frontier = vec![t];
    let mut visited = std::collections::HashSet::new();
    visited.insert(t);
    mesh.triangle_mut(t).hit = 1;
    for _ in 0..depth {
        let mut next = Vec::new();
        for &cur in &frontier {
            let neighbors = mesh.triangle(cur).neighbors;
            for n in neighbors {
                if n > 0 {
                    let n = n as u32;
                    if visited.insert(n) {
                        mesh.triangle_mut(n).hit = 1;
                        next.push(n);
                    }
                }
            }
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }
}

#[allow(clippy::too_many_lines)]
fn phase_a(mesh: &mut MeshStore, evaluator: &dyn FaceEvaluator, config: &TessellateConfig, max_pts: u32, stats: &mut TessellateStats) {
    let eps2 = stats.eps2;
    let mut accum = 0.0_f64;
    loop {
        if mesh.nverts() >= max_pts || stats.or_cnt >= MAXORCNT {
            stats.terminated_early = true;
            if config.out_level >= 1 {
                log::warn!("phase A terminated early: nverts={}, or_cnt={}", mesh.nverts(), stats.or_cnt);
            }
            break;
        }
        if accum > 0.866 || accum <= -1.0 {
            break;
        }

        let mut best: Option<(u32, f64, UvPoint, Point3)> = None;
        for t in 1..=mesh.ntris() {
            if mesh.triangle(t).hit != 0 {
                continue;
            }
            if let Some((area2, cuv, cxyz)) = triangle_eligible(mesh, t, eps2) {
                if best.is_none_or(|(_, best_area, _, _)| area2 > best_area) {
                    best = Some((t, area2, cuv, cxyz));
                }
            }
        }
        let Some((t, _, centroid_uv, _)) = best else { break };

        let Ok(point) = evaluator.evaluate(centroid_uv.u, centroid_uv.v) else {
            if config.out_level >= 1 {
                log::debug!("phase A: evaluator rejected centroid of triangle {t}, flooding hit region");
            }
            flood_hit(mesh, t, 6);
            continue;
        };
        let uv = mesh.tri_uv(t);
        if crate::predicates::in_tri(uv, centroid_uv, 0.0001).is_none() {
            flood_hit(mesh, t, 6);
            continue;
        }
        let xyz = mesh.tri_xyz(t);
        let mut bad = false;
        for s in 0..3 {
            let dot = dot_norm(xyz[s], xyz[(s + 1) % 3], xyz[(s + 2) % 3], point.xyz);
            if dot <= -0.98 {
                bad = true;
                break;
            }
        }
        if bad || close_to_boundary(mesh, t, 4) {
            flood_hit(mesh, t, 6);
            continue;
        }

        let before_or_cnt = stats.or_cnt;
        triangle_split(mesh, config.or_uv, t, point.xyz, centroid_uv, VertexKind::FaceInterior, &mut stats.or_cnt);
        stats.phase_a_splits += 1;
        flood_hit(mesh, t, 6);

        let mut acc = Accum::Max(0.0);
        swap_tris(
            mesh,
            config.or_uv,
            stats,
            |m, t1, s, t2, a, or_cnt| area_test(m, t1, s, t2, config.or_uv, a, or_cnt),
            &mut acc,
        );
        if stats.or_cnt > before_or_cnt {
            accum = -1.0;
        } else {
            accum = accum.max(0.9);
        }
    }
}

fn phase_c(mesh: &mut MeshStore, evaluator: &dyn FaceEvaluator, config: &TessellateConfig, max_pts: u32, stats: &mut TessellateStats) {
    let eps2 = stats.eps2;
    let mut cache = MidpointCache::create(mesh.ntris() as usize);
    loop {
        if mesh.nverts() >= max_pts {
            stats.terminated_early = true;
            if config.out_level >= 1 {
                log::warn!("phase C terminated early: vertex cap {max_pts} reached");
            }
            break;
        }
        let mut chosen: Option<(u32, UvPoint, Point3)> = None;
        for t in 1..=mesh.ntris() {
            let indices = mesh.triangle(t).indices;
            if cache.find(indices[0], indices[1], indices[2]).is_some() {
                continue;
            }
            if let Some((_, centroid_uv, _)) = triangle_eligible(mesh, t, eps2) {
                match evaluator.evaluate(centroid_uv.u, centroid_uv.v) {
                    Ok(point) => {
                        let uv = mesh.tri_uv(t);
                        if crate::predicates::in_tri(uv, centroid_uv, 0.1).is_some() {
                            chosen = Some((t, centroid_uv, point.xyz));
                            break;
                        }
                    }
                    Err(_) => {
                        if config.out_level >= 1 {
                            log::debug!("phase C: evaluator rejected centroid of triangle {t}");
                        }
                    }
                }
            }
            cache.add(indices[0], indices[1], indices[2], false, Point3::centroid(&mesh.tri_xyz(t)));
        }
        let Some((t, centroid_uv, centroid_xyz)) = chosen else { break };
        triangle_split(mesh, config.or_uv, t, centroid_xyz, centroid_uv, VertexKind::FaceInterior, &mut stats.or_cnt);
        stats.phase_c_splits += 1;

        let mut acc = Accum::Max(0.0);
        swap_tris(
            mesh,
            config.or_uv,
            stats,
            |m, t1, s, t2, a, or_cnt| area_test(m, t1, s, t2, config.or_uv, a, or_cnt),
            &mut acc,
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase B — split interior opposing edges
// ─────────────────────────────────────────────────────────────────────────────

fn phase_b(mesh: &mut MeshStore, config: &TessellateConfig, max_pts: u32, stats: &mut TessellateStats) {
    let cap = mesh.nframe().max(1) * 3;
    let mut done = 0u32;
    loop {
        if done >= cap || mesh.nverts() >= max_pts {
            if done >= cap {
                stats.terminated_early = true;
                if config.out_level >= 1 {
                    log::warn!("phase B terminated early: split cap {cap} reached");
                }
            }
            break;
        }
        let mut found = None;
        for t in 1..=mesh.ntris() {
            let tri = *mesh.triangle(t);
            let mut longest: Option<(usize, f64)> = None;
            for s in 0..3 {
                if tri.neighbors[s] <= 0 {
                    continue;
                }
                let (a, b) = tri.side_endpoints(s);
                let both_interior = mesh.vertex(a).kind.is_face_interior() && mesh.vertex(b).kind.is_face_interior();
                if !both_interior {
                    continue;
                }
                let len2 = mesh.vertex(a).xyz.distance_squared_to(mesh.vertex(b).xyz);
                if longest.is_none_or(|(_, l)| len2 > l) {
                    longest = Some((s, len2));
                }
            }
            if let Some((s, _)) = longest {
                found = Some((t, s));
                break;
            }
        }
        let Some((t, s)) = found else { break };
        if split_side_with_midpoint_simple(mesh, config, t, s, stats) {
            stats.phase_b_splits += 1;
            done += 1;
        } else {
            if config.out_level >= 1 {
                log::debug!("phase B: side split rejected on triangle {t}, side {s}");
            }
            break;
        }
        let mut accum = Accum::Max(0.0);
        swap_tris(mesh, config.or_uv, stats, |m, t1, side, t2, acc, _or_cnt| ang_uv_test(m, t1, side, t2, 1.0, acc), &mut accum);
    }
}

fn split_side_with_midpoint_simple(
    mesh: &mut MeshStore,
    config: &TessellateConfig,
    t: u32,
    s: usize,
    stats: &mut TessellateStats,
) -> bool {
    let (a, b) = mesh.triangle(t).side_endpoints(s);
    let mid_uv = mesh.vertex(a).uv.midpoint(mesh.vertex(b).uv);
    let mid_xyz = Point3::centroid(&[mesh.vertex(a).xyz, mesh.vertex(b).xyz]);
    side_split(mesh, config.or_uv, t, s, mid_xyz, mid_uv, VertexKind::FaceInterior, config.minlen, &mut stats.or_cnt).is_ok()
}

fn split_side_with_midpoint(
    mesh: &mut MeshStore,
    evaluator: &dyn FaceEvaluator,
    config: &TessellateConfig,
    t: u32,
    s: usize,
    stats: &mut TessellateStats,
) -> Option<u32> {
    let (a, b) = mesh.triangle(t).side_endpoints(s);
    let mid_uv = mesh.vertex(a).uv.midpoint(mesh.vertex(b).uv);
    let mid_xyz = match evaluator.evaluate(mid_uv.u, mid_uv.v) {
        Ok(point) => point.xyz,
        Err(_) => Point3::centroid(&[mesh.vertex(a).xyz, mesh.vertex(b).xyz]),
    };
    side_split(mesh, config.or_uv, t, s, mid_xyz, mid_uv, VertexKind::FaceInterior, config.minlen, &mut stats.or_cnt).ok()
}

fn longest_interior_side(mesh: &MeshStore, t: u32) -> Option<(usize, f64)> {
    let tri = *mesh.triangle(t);
    let mut best = None;
    for s in 0..3 {
        if tri.neighbors[s] <= 0 {
            continue;
        }
        let (a, b) = tri.side_endpoints(s);
        let len2 = mesh.vertex(a).xyz.distance_squared_to(mesh.vertex(b).xyz);
        if best.is_none_or(|(_, l)| len2 > l) {
            best = Some((s, len2));
        }
    }
    best
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 1 — facet-normal refinement
// ─────────────────────────────────────────────────────────────────────────────

fn phase_1(mesh: &mut MeshStore, evaluator: &dyn FaceEvaluator, config: &TessellateConfig, max_pts: u32, stats: &mut TessellateStats) {
    let mut cache = MidpointCache::create(mesh.ntris().max(1) as usize);
    let mut stagnant_rounds = 0u32;
    let mut best_accum = f64::NEG_INFINITY;

    loop {
        if mesh.nverts() >= max_pts {
            stats.terminated_early = true;
            if config.out_level >= 1 {
                log::warn!("phase 1 terminated early: vertex cap {max_pts} reached");
            }
            break;
        }
        let mut worst: Option<(u32, f64)> = None;
        for t in 1..=mesh.ntris() {
            let tri = *mesh.triangle(t);
            for s in 0..3 {
                let neighbor = tri.neighbors[s];
                if neighbor <= 0 {
                    continue;
                }
                let (a, b) = tri.side_endpoints(s);
                let apex_self = mesh.vertex(tri.indices[s]).xyz;
                let other = mesh.triangle(neighbor as u32);
                if let Some(p) = other.indices.iter().position(|&v| v != a && v != b) {
                    let apex_other = mesh.vertex(other.indices[p]).xyz;
                    let dot = dot_norm(apex_self, mesh.vertex(a).xyz, mesh.vertex(b).xyz, apex_other);
                    if dot < config.dotnrm - crate::quality::ANGTOL
                        && worst.is_none_or(|(_, worst_dot)| dot < worst_dot)
                    {
                        worst = Some((t, dot));
                    }
                }
            }
        }
        let Some((t, _)) = worst else { break };

        let indices = mesh.triangle(t).indices;
        let centroid_uv = {
            let uv = mesh.tri_uv(t);
            UvPoint::new((uv[0].u + uv[1].u + uv[2].u) / 3.0, (uv[0].v + uv[1].v + uv[2].v) / 3.0)
        };
        let xyz = match cache.find(indices[0], indices[1], indices[2]) {
            Some((_, cached_xyz)) => cached_xyz,
            None => evaluator
                .evaluate(centroid_uv.u, centroid_uv.v)
                .map(|p| p.xyz)
                .unwrap_or_else(|_| Point3::centroid(&mesh.tri_xyz(t))),
        };
        cache.invalidate(indices[0], indices[1], indices[2]);

        triangle_split(mesh, config.or_uv, t, xyz, centroid_uv, VertexKind::FaceInterior, &mut stats.or_cnt);
        stats.phase_1_splits += 1;

        let mut acc = Accum::Max(0.0);
        swap_tris(mesh, config.or_uv, stats, |m, t1, s, t2, a, _or_cnt| ang_uv_test(m, t1, s, t2, 1.0, a), &mut acc);
        let mut acc2 = Accum::Min(f64::INFINITY);
        swap_tris(mesh, config.or_uv, stats, |m, t1, s, t2, a, _or_cnt| diag_test(m, t1, s, t2, 1.0, a), &mut acc2);

        if acc.value() > best_accum + crate::quality::ANGTOL {
            best_accum = acc.value();
            stagnant_rounds = 0;
        } else {
            stagnant_rounds += 1;
        }
        if stagnant_rounds >= 6 {
            break;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 2 — chord-height refinement
// ─────────────────────────────────────────────────────────────────────────────

fn phase_2(mesh: &mut MeshStore, evaluator: &dyn FaceEvaluator, config: &TessellateConfig, max_pts: u32, stats: &mut TessellateStats) {
    if config.chord <= 0.0 {
        return;
    }
    let threshold = (config.chord * config.chord).max(stats.devia2);
    loop {
        if mesh.nverts() >= max_pts {
            stats.terminated_early = true;
            if config.out_level >= 1 {
                log::warn!("phase 2 terminated early: vertex cap {max_pts} reached");
            }
            break;
        }
        let mut chosen = None;
        for t in 1..=mesh.ntris() {
            let uv = mesh.tri_uv(t);
            if max_uv_angle(uv[0], uv[1], uv[2], 1.0) > DEVANG {
                continue;
            }
            let xyz = mesh.tri_xyz(t);
            let arithmetic_centroid = Point3::centroid(&xyz);
            let centroid_uv = UvPoint::new((uv[0].u + uv[1].u + uv[2].u) / 3.0, (uv[0].v + uv[1].v + uv[2].v) / 3.0);
            let Ok(point) = evaluator.evaluate(centroid_uv.u, centroid_uv.v) else {
                if config.out_level >= 1 {
                    log::debug!("phase 2: evaluator rejected centroid of triangle {t}");
                }
                continue;
            };
            if arithmetic_centroid.distance_squared_to(point.xyz) <= threshold {
                continue;
            }
            if crate::predicates::in_tri(uv, centroid_uv, 0.1).is_none() {
                continue;
            }
            let tri = mesh.triangle(t);
            let mut side_bad = false;
            for s in 0..3 {
                let neighbor = tri.neighbors[s];
                if neighbor <= 0 {
                    continue;
                }
                let (a, b) = tri.side_endpoints(s);
                let apex_self = mesh.vertex(tri.indices[s]).xyz;
                let other = mesh.triangle(neighbor as u32);
                if let Some(p) = other.indices.iter().position(|&v| v != a && v != b) {
                    let apex_other = mesh.vertex(other.indices[p]).xyz;
                    if dot_norm(apex_self, mesh.vertex(a).xyz, mesh.vertex(b).xyz, apex_other) < 0.0 {
                        side_bad = true;
                        break;
                    }
                }
            }
            if side_bad {
                continue;
            }
            let mut short_side = false;
            for s in 0..3 {
                let (a, b) = tri.side_endpoints(s);
                if mesh.vertex(a).xyz.distance_squared_to(mesh.vertex(b).xyz) <= threshold {
                    short_side = true;
                    break;
                }
            }
            if short_side {
                continue;
            }
            chosen = Some((t, centroid_uv, point.xyz));
            break;
        }
        let Some((t, centroid_uv, centroid_xyz)) = chosen else { break };
        triangle_split(mesh, config.or_uv, t, centroid_xyz, centroid_uv, VertexKind::FaceInterior, &mut stats.or_cnt);
        stats.phase_2_splits += 1;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 3 — final cleanup
// ─────────────────────────────────────────────────────────────────────────────

fn phase_3(mesh: &mut MeshStore, config: &TessellateConfig, stats: &mut TessellateStats) {
    let mut accum = Accum::Max(0.0);
    swap_tris(mesh, config.or_uv, stats, |m, t1, s, t2, acc, _or_cnt| ang_uv_test(m, t1, s, t2, 1.0, acc), &mut accum);
    let mut accum2 = Accum::Min(f64::INFINITY);
    swap_tris(mesh, config.or_uv, stats, |m, t1, s, t2, acc, _or_cnt| diag_test(m, t1, s, t2, 1.0, acc), &mut accum2);
    if config.planar {
        let mut accum3 = Accum::Max(0.0);
        swap_tris(
            mesh,
            config.or_uv,
            stats,
            |m, t1, s, t2, acc, _or_cnt| crate::quality::ang_xyz_test(m, t1, s, t2, -1.0, true, acc),
            &mut accum3,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Vec3;
    use crate::evaluator::PlaneEvaluator;
    use crate::neighbors::build_neighbors_from_segments;

    fn flat_quad_mesh() -> MeshStore {
        let mut m = MeshStore::new();
        m.add_vertex(VertexKind::Node { node_index: 0 }, Point3::new(0.0, 0.0, 0.0), UvPoint::new(0.0, 0.0));
        m.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(1.0, 0.0, 0.0), UvPoint::new(1.0, 0.0));
        m.add_vertex(VertexKind::Node { node_index: 2 }, Point3::new(1.0, 1.0, 0.0), UvPoint::new(1.0, 1.0));
        m.add_vertex(VertexKind::Node { node_index: 3 }, Point3::new(0.0, 1.0, 0.0), UvPoint::new(0.0, 1.0));
        build_neighbors_from_segments(&mut m, &[[1, 2, 3], [1, 3, 4]]);
        m
    }

    #[test]
    fn tessellate_on_a_flat_quad_preserves_invariants() {
        let mut m = flat_quad_mesh();
        let evaluator = PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let config = TessellateConfig::new(1).with_planar(true);
        let stats = tessellate(&mut m, &evaluator, &config).expect("tessellate should succeed on a flat quad");
        m.check_invariants(1).expect("refined mesh should satisfy invariants");
        assert!(stats.total_swaps >= 0);
    }

    #[test]
    fn tessellate_with_max_len_splits_long_edges() {
        let mut m = flat_quad_mesh();
        let evaluator = PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let config = TessellateConfig::new(1).with_planar(true).with_max_len(0.6).with_max_pts(200);
        let nverts_before = m.nverts();
        tessellate(&mut m, &evaluator, &config).expect("tessellate should succeed");
        assert!(m.nverts() > nverts_before);
        m.check_invariants(1).expect("refined mesh should satisfy invariants");
    }

    #[test]
    fn tessellate_recognises_trivial_quad_and_flips_orientation_when_or_uv_is_negative() {
        let mut m = flat_quad_mesh();
        let evaluator = PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let hints = crate::config::QuadHints { qparm: [0.0; 3], uvs: None, lens: [1, 1, 1, 1] };
        let config = TessellateConfig::new(-1).with_quad_hints(hints);
        let before = m.triangle(1).indices;
        tessellate(&mut m, &evaluator, &config).expect("tessellate should recognise the trivial quad path");
        assert_eq!(m.ntris(), 2);
        assert_eq!(m.nverts(), 4);
        assert_eq!(m.triangle(1).indices, [before[0], before[2], before[1]]);
    }

    #[test]
    fn derive_metrics_picks_up_frame_segment_lengths() {
        let mut m = flat_quad_mesh();
        let evaluator = PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let mut stats = TessellateStats::default();
        derive_metrics(&m, &evaluator, &TessellateConfig::new(1), &mut stats);
        assert!(stats.edist2 > 0.0);
    }
}
