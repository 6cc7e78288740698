//! Swap quality tests. Each test inspects the quad straddling a candidate
//! edge and decides whether flipping the diagonal would improve the chosen
//! metric, updating a monotonic accumulator the phase driver uses to judge
//! whether a pass is still making progress.
//!
//! Each metric tracks a running extremum updated by every probe rather than
//! recomputed from scratch.

use crate::mesh::MeshStore;
use crate::predicates::{area2d, dot_norm, max_uv_angle, max_xyz_angle, orien_tri};
use crate::topology::check_or;

/// The minimum improvement a swap must deliver to be worth taking.
pub const ANGTOL: f64 = 1e-6;
/// Worst acceptable UV-angle (radians) for [`diag_test`] to even consider a swap.
pub const MAXANG: f64 = 3.13;

/// Tracks whether a quality test's progress accumulator is being driven
/// towards its maximum or its minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Accum {
    /// Tracks the largest value seen (used by minimisation tests, where
    /// "larger improvement" is the thing being maximised).
    Max(f64),
    /// Tracks the smallest value seen (used by [`diag_test`], a genuine
    /// maximisation of the worst-case dihedral).
    Min(f64),
}

impl Accum {
    fn observe(&mut self, value: f64) {
        match self {
            Self::Max(m) => *m = m.max(value),
            Self::Min(m) => *m = m.min(value),
        }
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::Max(m) | Self::Min(m) => *m,
        }
    }
}

/// The two candidate triangles and third vertices of the quad straddling
/// `t1`'s side `s`, resolved once and shared by every quality test.
struct Quad {
    apex1: u32,
    e0: u32,
    e1: u32,
    apex2: u32,
}

fn resolve_quad(mesh: &MeshStore, t1: u32, s: usize, t2: u32) -> Option<Quad> {
    let tri1 = *mesh.triangle(t1);
    let tri2 = *mesh.triangle(t2);
    let apex1 = tri1.indices[s];
    let (e0, e1) = tri1.side_endpoints(s);
    let sum2: i64 = tri2.indices.iter().map(|&v| i64::from(v)).sum();
    let apex2_signed = sum2 - i64::from(e0) - i64::from(e1);
    if apex2_signed <= 0 {
        return None;
    }
    let apex2 = apex2_signed as u32;
    if !tri2.indices.contains(&apex2) || apex2 == e0 || apex2 == e1 {
        return None;
    }
    Some(Quad { apex1, e0, e1, apex2 })
}

/// `areaTest`: the current quad has at least one UV-inverted half, and the
/// proposed swap yields two correctly-oriented triangles.
#[must_use]
pub fn area_test(
    mesh: &MeshStore,
    t1: u32,
    s: usize,
    t2: u32,
    or_uv: i32,
    accum: &mut Accum,
    or_cnt: &mut u32,
) -> bool {
    let Some(quad) = resolve_quad(mesh, t1, s, t2) else { return false };
    let uv = |i: u32| mesh.vertex(i).uv;

    let sign1 = orien_tri(uv(quad.apex1), uv(quad.e0), uv(quad.e1));
    let sign2 = orien_tri(uv(quad.apex2), uv(quad.e1), uv(quad.e0));
    let currently_bad = sign1 != or_uv.signum() || sign2 != or_uv.signum();
    if !currently_bad {
        return false;
    }

    let improves = check_or(mesh, t1, s, or_uv, or_cnt);
    if improves {
        accum.observe(1.0);
    }
    improves
}

/// `angUVTest`: the swap reduces the worst UV-angle across the two triangles.
#[must_use]
pub fn ang_uv_test(mesh: &MeshStore, t1: u32, s: usize, t2: u32, v_over_u: f64, accum: &mut Accum) -> bool {
    let Some(quad) = resolve_quad(mesh, t1, s, t2) else { return false };
    let uv = |i: u32| mesh.vertex(i).uv;

    let before = max_uv_angle(uv(quad.apex1), uv(quad.e0), uv(quad.e1), v_over_u)
        .max(max_uv_angle(uv(quad.apex2), uv(quad.e1), uv(quad.e0), v_over_u));
    let after = max_uv_angle(uv(quad.e0), uv(quad.apex2), uv(quad.apex1), v_over_u)
        .max(max_uv_angle(uv(quad.e1), uv(quad.apex1), uv(quad.apex2), v_over_u));

    let improvement = before - after;
    if improvement > ANGTOL {
        accum.observe(improvement);
        true
    } else {
        false
    }
}

/// `angXYZTest`: the swap reduces the worst 3-D angle, and (outside the
/// planar phase) the new diagonal's two triangles stay within `dotnrm` of
/// each other's normal.
#[must_use]
pub fn ang_xyz_test(
    mesh: &MeshStore,
    t1: u32,
    s: usize,
    t2: u32,
    dotnrm: f64,
    planar: bool,
    accum: &mut Accum,
) -> bool {
    let Some(quad) = resolve_quad(mesh, t1, s, t2) else { return false };
    let xyz = |i: u32| mesh.vertex(i).xyz;

    let before = max_xyz_angle(xyz(quad.apex1), xyz(quad.e0), xyz(quad.e1))
        .max(max_xyz_angle(xyz(quad.apex2), xyz(quad.e1), xyz(quad.e0)));
    let after = max_xyz_angle(xyz(quad.e0), xyz(quad.apex2), xyz(quad.apex1))
        .max(max_xyz_angle(xyz(quad.e1), xyz(quad.apex1), xyz(quad.apex2)));

    let improvement = before - after;
    if improvement <= ANGTOL {
        return false;
    }
    if !planar {
        let dot = dot_norm(xyz(quad.e0), xyz(quad.apex2), xyz(quad.apex1), xyz(quad.e1));
        if dot < dotnrm {
            return false;
        }
    }
    accum.observe(improvement);
    true
}

/// `diagTest`: the swap increases the minimum `dotNorm` across the shared
/// edge, so long as the worst new UV-angle stays within [`MAXANG`].
#[must_use]
pub fn diag_test(mesh: &MeshStore, t1: u32, s: usize, t2: u32, v_over_u: f64, accum: &mut Accum) -> bool {
    let Some(quad) = resolve_quad(mesh, t1, s, t2) else { return false };
    let xyz = |i: u32| mesh.vertex(i).xyz;
    let uv = |i: u32| mesh.vertex(i).uv;

    let worst_new_angle = max_uv_angle(uv(quad.e0), uv(quad.apex2), uv(quad.apex1), v_over_u)
        .max(max_uv_angle(uv(quad.e1), uv(quad.apex1), uv(quad.apex2), v_over_u));
    if worst_new_angle > MAXANG {
        return false;
    }

    let before = dot_norm(xyz(quad.apex1), xyz(quad.e0), xyz(quad.e1), xyz(quad.apex2));
    let after = dot_norm(xyz(quad.e0), xyz(quad.apex2), xyz(quad.apex1), xyz(quad.e1));

    if after - before > ANGTOL {
        accum.observe(after);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point3;
    use crate::core::UvPoint;
    use crate::mesh::VertexKind;

    fn quad() -> MeshStore {
        let mut m = MeshStore::new();
        m.add_vertex(VertexKind::Node { node_index: 0 }, Point3::new(0.0, 0.0, 0.0), UvPoint::new(0.0, 0.0));
        m.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(1.0, 0.0, 0.0), UvPoint::new(1.0, 0.0));
        m.add_vertex(VertexKind::Node { node_index: 2 }, Point3::new(1.0, 1.0, 0.0), UvPoint::new(1.0, 1.0));
        m.add_vertex(VertexKind::Node { node_index: 3 }, Point3::new(0.0, 1.0, 0.0), UvPoint::new(0.0, 1.0));
        let t1 = m.add_triangle([1, 2, 3]);
        let t2 = m.add_triangle([1, 3, 4]);
        m.triangle_mut(t1).neighbors = [0, t2 as i32, 0];
        m.triangle_mut(t2).neighbors = [0, 0, t1 as i32];
        m
    }

    #[test]
    fn ang_uv_test_fixes_a_sliver_diagonal() {
        // The 1-3 diagonal cuts a near-degenerate sliver (v1, v2, v3 almost
        // collinear); the 2-4 diagonal does not.
        let mut m = MeshStore::new();
        m.add_vertex(VertexKind::Node { node_index: 0 }, Point3::new(0.0, 0.0, 0.0), UvPoint::new(0.0, 0.0));
        m.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(1.0, 0.0, 0.0), UvPoint::new(1.0, 0.0));
        m.add_vertex(VertexKind::Node { node_index: 2 }, Point3::new(1.0, 0.01, 0.0), UvPoint::new(1.0, 0.01));
        m.add_vertex(VertexKind::Node { node_index: 3 }, Point3::new(0.0, 1.0, 0.0), UvPoint::new(0.0, 1.0));
        let t1 = m.add_triangle([1, 2, 3]);
        let t2 = m.add_triangle([1, 3, 4]);
        m.triangle_mut(t1).neighbors = [0, t2 as i32, 0];
        m.triangle_mut(t2).neighbors = [0, 0, t1 as i32];

        let mut accum = Accum::Max(0.0);
        let improved = ang_uv_test(&m, 1, 1, 2, 1.0, &mut accum);
        assert!(improved);
        assert!(accum.value() > 0.0);
    }

    #[test]
    fn area_test_ignores_already_correctly_oriented_quad() {
        let m = quad();
        let mut accum = Accum::Max(0.0);
        let mut or_cnt = 0u32;
        assert!(!area_test(&m, 1, 1, 2, 1, &mut accum, &mut or_cnt));
    }

    #[test]
    fn diag_test_rejects_swap_past_maxang() {
        let mut m = quad();
        // Drag vertex 2 far out so the alternative (2-4) diagonal would
        // create a sliver well past MAXANG.
        m.vertex_mut(2).uv = UvPoint::new(1000.0, 0.0001);
        let mut accum = Accum::Min(f64::INFINITY);
        assert!(!diag_test(&m, 1, 1, 2, 1.0, &mut accum));
    }
}
