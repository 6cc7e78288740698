//! The four mesh-editing primitives every phase in [`crate::phases`] is built
//! from: edge swap, triangle split, side split and edge collapse. Each one
//! takes a `&mut MeshStore`, validates its local precondition, and either
//! mutates the mesh and returns `Ok`, or leaves the mesh untouched and
//! returns an `Err` the caller is expected to treat as a local reject (never
//! propagated past the phase driver).
//!
//! Each operation walks the two triangles sharing a side and patches both
//! neighbor arrays and the far back-links, the same stitching shape used to
//! build the initial triangulation, generalised here to cover swap/split/
//! collapse instead of one-shot construction.

use crate::core::UvPoint;
use crate::error::TopologyError;
use crate::mesh::{MeshStore, VertexKind};
use crate::predicates::{area2d, orien_tri};

/// `orien_tri(a, b, c) == or_uv` against a pre-resolved `or_uv` sign.
fn matches_or_uv(a: UvPoint, b: UvPoint, c: UvPoint, or_uv: i32) -> bool {
    orien_tri(a, b, c) == or_uv.signum()
}

/// Checks that swapping the diagonal of the quad straddling `t1`'s side `s`
/// would leave both resulting triangles correctly UV-oriented, without
/// mutating anything. Used both to seed swap-candidate mark bits and, inside
/// [`edge_swap`], as the gate an actual swap must pass.
///
/// `or_cnt` is the running fault counter the phase driver uses to detect
/// sustained swap-thrashing; it is incremented once for every mismatch seen
/// here, whether or not the overall check ends up failing.
#[must_use]
pub fn check_or(mesh: &MeshStore, t1_idx: u32, s: usize, or_uv: i32, or_cnt: &mut u32) -> bool {
    let Some(plan) = SwapPlan::build(mesh, t1_idx, s) else { return false };
    let uv = |i: u32| mesh.vertex(i).uv;
    let ok1 = matches_or_uv(uv(plan.i1), uv(plan.i3), uv(plan.i0), or_uv);
    if !ok1 {
        *or_cnt += 1;
    }
    let ok2 = matches_or_uv(uv(plan.i2), uv(plan.i0), uv(plan.i3), or_uv);
    if !ok2 {
        *or_cnt += 1;
    }
    ok1 && ok2
}

/// The combinatorial data needed to perform (or merely evaluate) an edge
/// swap, derived once and shared between [`check_or`] and [`edge_swap`].
struct SwapPlan {
    t1_idx: u32,
    t2_idx: u32,
    i0: u32,
    i1: u32,
    i2: u32,
    i3: u32,
    /// Outer neighbor across edge `i0-i2` (opposite `i1` in `t1`).
    n_a: i32,
    /// Outer neighbor across edge `i0-i1` (opposite `i2` in `t1`).
    n_b: i32,
    /// Outer neighbor across edge `i2-i3` (opposite `i1` in `t2`).
    n_c: i32,
    /// Outer neighbor across edge `i1-i3` (opposite `i2` in `t2`).
    n_d: i32,
}

impl SwapPlan {
    fn build(mesh: &MeshStore, t1_idx: u32, s: usize) -> Option<Self> {
        let t1 = *mesh.triangle(t1_idx);
        let t2_raw = t1.neighbors[s];
        if t2_raw <= 0 {
            return None;
        }
        let t2_idx = t2_raw as u32;
        let t2 = *mesh.triangle(t2_idx);

        let i0 = t1.indices[s];
        let (i1, i2) = t1.side_endpoints(s);

        let sum2: i64 = t2.indices.iter().map(|&v| i64::from(v)).sum();
        let i3_signed = sum2 - i64::from(i1) - i64::from(i2);
        if i3_signed <= 0 {
            return None;
        }
        let i3 = i3_signed as u32;
        if i3 == i1 || i3 == i2 || !t2.indices.contains(&i3) {
            return None;
        }

        let n_a = t1.neighbors[(s + 1) % 3];
        let n_b = t1.neighbors[(s + 2) % 3];
        let p1 = t2.indices.iter().position(|&v| v == i1)?;
        let p2 = t2.indices.iter().position(|&v| v == i2)?;
        let n_c = t2.neighbors[p1];
        let n_d = t2.neighbors[p2];

        Some(Self { t1_idx, t2_idx, i0, i1, i2, i3, n_a, n_b, n_c, n_d })
    }
}

/// Recomputes every mark bit of `tri`, gating each side on [`check_or`] and
/// clearing the bit outright for boundary sides.
fn recompute_marks(mesh: &mut MeshStore, tri: u32, or_uv: i32, or_cnt: &mut u32) {
    for s in 0..3 {
        let valid = mesh.triangle(tri).neighbors[s] > 0 && check_or(mesh, tri, s, or_uv, or_cnt);
        mesh.triangle_mut(tri).set_mark_bit(s, valid);
    }
}

/// Swaps the diagonal of the quad straddling `t1`'s side `s`. Fails with
/// [`TopologyError::Degen`] if `s` is a boundary side, the opposite triangle
/// is degenerate, or the swap would flip either resulting triangle's UV
/// orientation away from `or_uv` (the [`check_or`] gate).
pub fn edge_swap(
    mesh: &mut MeshStore,
    t1_idx: u32,
    s: usize,
    or_uv: i32,
    or_cnt: &mut u32,
) -> Result<(), TopologyError> {
    let plan = SwapPlan::build(mesh, t1_idx, s).ok_or(TopologyError::Degen)?;
    if !check_or(mesh, t1_idx, s, or_uv, or_cnt) {
        return Err(TopologyError::Degen);
    }

    mesh.triangle_mut(plan.t1_idx).indices = [plan.i1, plan.i3, plan.i0];
    mesh.triangle_mut(plan.t1_idx).neighbors = [plan.t2_idx as i32, plan.n_b, plan.n_d];
    mesh.triangle_mut(plan.t2_idx).indices = [plan.i2, plan.i0, plan.i3];
    mesh.triangle_mut(plan.t2_idx).neighbors = [plan.t1_idx as i32, plan.n_c, plan.n_a];

    if plan.n_a > 0 {
        patch_back_link(mesh, plan.n_a as u32, plan.t1_idx, plan.t2_idx);
    }
    if plan.n_d > 0 {
        patch_back_link(mesh, plan.n_d as u32, plan.t2_idx, plan.t1_idx);
    }

    recompute_marks(mesh, plan.t1_idx, or_uv, or_cnt);
    recompute_marks(mesh, plan.t2_idx, or_uv, or_cnt);
    for outer in [plan.n_a, plan.n_b, plan.n_c, plan.n_d] {
        if outer > 0 {
            recompute_marks(mesh, outer as u32, or_uv, or_cnt);
        }
    }
    Ok(())
}

/// Rewrites `tri`'s neighbor slot that currently reads `from` to read `to`
/// instead; used after a swap or split moves which triangle owns an edge.
fn patch_back_link(mesh: &mut MeshStore, tri: u32, from: u32, to: u32) {
    if let Some(slot) = mesh.triangle(tri).side_to_neighbor(from) {
        mesh.triangle_mut(tri).neighbors[slot] = to as i32;
    }
}

/// Splits triangle `t_idx` into three by inserting a new vertex `(xyz, uv)`
/// of the given `kind` as its centroid. Reuses `t_idx`'s arena slot for one
/// of the three children and appends the other two. Returns the new
/// vertex's 1-based index.
pub fn triangle_split(
    mesh: &mut MeshStore,
    or_uv: i32,
    t_idx: u32,
    xyz: crate::core::Point3,
    uv: UvPoint,
    kind: VertexKind,
    or_cnt: &mut u32,
) -> u32 {
    let t = *mesh.triangle(t_idx);
    let [a, b, c] = t.indices;
    let [n_bc, n_ca, n_ab] = t.neighbors;

    let n = mesh.add_vertex(kind, xyz, uv);

    let tri2 = mesh.add_triangle([b, c, n]);
    let tri3 = mesh.add_triangle([c, a, n]);

    mesh.triangle_mut(t_idx).indices = [a, b, n];
    mesh.triangle_mut(t_idx).neighbors = [tri2 as i32, tri3 as i32, n_ab];

    mesh.triangle_mut(tri2).neighbors = [tri3 as i32, t_idx as i32, n_bc];
    mesh.triangle_mut(tri3).neighbors = [t_idx as i32, tri2 as i32, n_ca];

    if n_bc > 0 {
        patch_back_link(mesh, n_bc as u32, t_idx, tri2);
    }
    if n_ca > 0 {
        patch_back_link(mesh, n_ca as u32, t_idx, tri3);
    }

    for tri in [t_idx, tri2, tri3] {
        recompute_marks(mesh, tri, or_uv, or_cnt);
    }
    for outer in [n_bc, n_ca, n_ab] {
        if outer > 0 {
            recompute_marks(mesh, outer as u32, or_uv, or_cnt);
        }
    }
    n
}

/// Splits the side of `t_idx` opposite vertex-position `s` by inserting a
/// new vertex `(xyz, uv)` at its midpoint. If `t_idx`'s side `s` has an
/// interior neighbor, that triangle is split too so the mesh stays
/// conforming; a boundary side splits `t_idx` alone.
///
/// Returns `Err(RangeErr)` if the proposed midpoint would create an edge
/// shorter than `min_len` on either side of the split (when `min_len > 0.0`),
/// or if either new half of the split side falls under 1/8 of the side's
/// original length. The 1/8 rule applies unconditionally, regardless of
/// `min_len`.
#[allow(clippy::too_many_arguments)]
pub fn side_split(
    mesh: &mut MeshStore,
    or_uv: i32,
    t_idx: u32,
    s: usize,
    xyz: crate::core::Point3,
    uv: UvPoint,
    kind: VertexKind,
    min_len: f64,
    or_cnt: &mut u32,
) -> Result<u32, TopologyError> {
    let t = *mesh.triangle(t_idx);
    let apex = t.indices[s];
    let (e0, e1) = t.side_endpoints(s);
    let neighbor_raw = t.neighbors[s];

    let apex_xyz = mesh.vertex(apex).xyz;
    let half_a = (xyz - apex_xyz).length();
    let e0_xyz = mesh.vertex(e0).xyz;
    let e1_xyz = mesh.vertex(e1).xyz;
    let half0 = (xyz - e0_xyz).length();
    let half1 = (xyz - e1_xyz).length();
    if min_len > 0.0 && (half_a < min_len || half0 < min_len || half1 < min_len) {
        return Err(TopologyError::RangeErr);
    }
    let orig_len = (e1_xyz - e0_xyz).length();
    if half0 < orig_len / 8.0 || half1 < orig_len / 8.0 {
        return Err(TopologyError::RangeErr);
    }

    let n = mesh.add_vertex(kind, xyz, uv);

    // `t_idx` keeps the `e0` half: (apex, e0, n). A new triangle takes the
    // `e1` half: (apex, n, e1). The outer edge apex-e0 never moved, so its
    // neighbor back-link is untouched; apex-e1 now belongs to the new
    // triangle and its back-link must be repointed.
    let outer_e0_apex = t.neighbors[(s + 2) % 3];
    let outer_apex_e1 = t.neighbors[(s + 1) % 3];

    let tri_near_e1 = mesh.add_triangle([apex, n, e1]);
    mesh.triangle_mut(t_idx).indices = [apex, e0, n];

    if outer_apex_e1 > 0 {
        patch_back_link(mesh, outer_apex_e1 as u32, t_idx, tri_near_e1);
    }

    if neighbor_raw > 0 {
        let t2_idx = neighbor_raw as u32;
        let t2 = *mesh.triangle(t2_idx);
        let sum2: i64 = t2.indices.iter().map(|&v| i64::from(v)).sum();
        let far_signed = sum2 - i64::from(e0) - i64::from(e1);
        let far = far_signed as u32;
        let p_e0 = t2.indices.iter().position(|&v| v == e0).ok_or(TopologyError::IndexErr)?;
        let p_e1 = t2.indices.iter().position(|&v| v == e1).ok_or(TopologyError::IndexErr)?;
        let outer_far_e0 = t2.neighbors[p_e1];
        let outer_e1_far = t2.neighbors[p_e0];

        let tri2_near_e1 = mesh.add_triangle([far, e1, n]);
        mesh.triangle_mut(t2_idx).indices = [far, n, e0];

        mesh.triangle_mut(t_idx).neighbors = [t2_idx as i32, tri_near_e1 as i32, outer_e0_apex];
        mesh.triangle_mut(tri_near_e1).neighbors = [tri2_near_e1 as i32, outer_apex_e1, t_idx as i32];
        mesh.triangle_mut(t2_idx).neighbors = [t_idx as i32, outer_far_e0, tri2_near_e1 as i32];
        mesh.triangle_mut(tri2_near_e1).neighbors = [tri_near_e1 as i32, t2_idx as i32, outer_e1_far];

        if outer_e1_far > 0 {
            patch_back_link(mesh, outer_e1_far as u32, t2_idx, tri2_near_e1);
        }

        for tri in [t_idx, tri_near_e1, t2_idx, tri2_near_e1] {
            recompute_marks(mesh, tri, or_uv, or_cnt);
        }
        for outer in [outer_e0_apex, outer_apex_e1, outer_far_e0, outer_e1_far] {
            if outer > 0 {
                recompute_marks(mesh, outer as u32, or_uv, or_cnt);
            }
        }
    } else {
        mesh.triangle_mut(t_idx).neighbors = [0, tri_near_e1 as i32, outer_e0_apex];
        mesh.triangle_mut(tri_near_e1).neighbors = [0, outer_apex_e1, t_idx as i32];

        for tri in [t_idx, tri_near_e1] {
            recompute_marks(mesh, tri, or_uv, or_cnt);
        }
        for outer in [outer_e0_apex, outer_apex_e1] {
            if outer > 0 {
                recompute_marks(mesh, outer as u32, or_uv, or_cnt);
            }
        }
    }

    Ok(n)
}

/// Collapses vertex `from` onto vertex `onto`, deleting the edge between
/// them and the one or two triangles that share it. `flag == 0` requires
/// `from` to be strictly face-interior (both endpoints of every incident
/// edge interior, so the collapsing edge always has exactly two sides);
/// `flag == 1` additionally allows `from` to sit on a mesh boundary, in
/// which case the edge may have only one.
pub fn edge_collapse(
    mesh: &mut MeshStore,
    from: u32,
    onto: u32,
    flag: u8,
    or_cnt: &mut u32,
) -> Result<(), TopologyError> {
    if flag == 0 && !mesh.vertex(from).kind.is_face_interior() {
        return Err(TopologyError::Degen);
    }
    if from == onto || from <= mesh.nfrvrts() {
        return Err(TopologyError::Degen);
    }

    let incident: Vec<u32> = (1..=mesh.ntris())
        .filter(|&t| mesh.triangle(t).indices.contains(&from))
        .collect();
    let collapsing: Vec<u32> = incident.iter().copied().filter(|&t| mesh.triangle(t).indices.contains(&onto)).collect();

    if collapsing.is_empty() || collapsing.len() > 2 {
        return Err(TopologyError::Degen);
    }
    if flag == 0 && collapsing.len() != 2 {
        return Err(TopologyError::Degen);
    }

    // Re-stitch the wings of each collapsing triangle before anything moves.
    for &tri in &collapsing {
        let t = *mesh.triangle(tri);
        let p_from = t.indices.iter().position(|&v| v == from).ok_or(TopologyError::Degen)?;
        let p_onto = t.indices.iter().position(|&v| v == onto).ok_or(TopologyError::Degen)?;
        let n_fx = t.neighbors[p_onto]; // across edge (from, x)
        let n_ox = t.neighbors[p_from]; // across edge (onto, x)

        if n_fx > 0 && collapsing.contains(&(n_fx as u32)) {
            return Err(TopologyError::Degen);
        }
        if n_ox > 0 && collapsing.contains(&(n_ox as u32)) {
            return Err(TopologyError::Degen);
        }

        if n_fx > 0 {
            let target = if n_ox > 0 { n_ox } else { 0 };
            if let Some(slot) = mesh.triangle(n_fx as u32).side_to_neighbor(tri) {
                mesh.triangle_mut(n_fx as u32).neighbors[slot] = target;
            }
        }
        if n_ox > 0 {
            let target = if n_fx > 0 { n_fx } else { 0 };
            if let Some(slot) = mesh.triangle(n_ox as u32).side_to_neighbor(tri) {
                mesh.triangle_mut(n_ox as u32).neighbors[slot] = target;
            }
        }
    }

    // Every other triangle still naming `from` gets it renamed to `onto`.
    for &tri in &incident {
        if collapsing.contains(&tri) {
            continue;
        }
        for idx in &mut mesh.triangle_mut(tri).indices {
            if *idx == from {
                *idx = onto;
            }
        }
    }

    let reloc = mesh.remove_triangles_and_vertex(&collapsing, from);
    for (old, new) in reloc.moved_tris {
        mesh.relocate_triangle_index(old, new);
    }
    if let Some((old, new)) = reloc.moved_vertex {
        mesh.relocate_vertex_index(old, new);
    }

    let touched: Vec<u32> = (1..=mesh.ntris()).filter(|&t| mesh.triangle(t).indices.contains(&onto)).collect();
    for tri in touched {
        let or_uv = area2d(mesh.tri_uv(tri)[0], mesh.tri_uv(tri)[1], mesh.tri_uv(tri)[2]).signum() as i32;
        let or_uv = if or_uv == 0 { 1 } else { or_uv };
        recompute_marks(mesh, tri, or_uv, or_cnt);
    }

    Ok(())
}
