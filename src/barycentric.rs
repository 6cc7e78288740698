//! Maps every non-frame vertex onto a frame triangle plus barycentric
//! weights in that triangle's UV, so a UV perturbation of a frame vertex can
//! be transported to every vertex the refinement added.
//!
//! Resolves a query point against a candidate set of triangles the same
//! "first hit wins, else best near-miss" way as any point-location scan.

use crate::core::UvPoint;
use crate::error::TessellateError;
use crate::mesh::MeshStore;
use crate::predicates::{Containment, in_tri_exact};

/// A non-frame vertex's home: which frame triangle it falls in, and its
/// barycentric weights there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAssignment {
    pub frame_triangle: u32,
    pub weights: [f64; 3],
}

/// Assigns every vertex beyond `nfrvrts` a frame triangle and barycentric
/// weights. Logs a warning (gated on `out_level >= 1`) and falls back to the
/// least-negative-weight triangle for any vertex no frame triangle strictly
/// contains (this can legitimately happen at floating-point-exact frame
/// boundaries).
pub fn bary_frame(mesh: &MeshStore, out_level: u8) -> Result<Vec<FrameAssignment>, TessellateError> {
    let nfrvrts = mesh.nfrvrts();
    let nframe = mesh.nframe();
    let mut assignments = Vec::with_capacity((mesh.nverts().saturating_sub(nfrvrts)) as usize);

    for v in (nfrvrts + 1)..=mesh.nverts() {
        let p = mesh.vertex(v).uv;
        let mut found: Option<FrameAssignment> = None;
        let mut best_fallback: Option<(FrameAssignment, f64)> = None;

        for ft in 1..=nframe {
            let [t0, t1, t2] = mesh.tri_uv(ft);
            let (containment, weights) = in_tri_exact(t0, t1, t2, p);
            match containment {
                Containment::Inside => {
                    found = Some(FrameAssignment { frame_triangle: ft, weights });
                    break;
                }
                Containment::Outside => {
                    let least = weights.iter().copied().fold(f64::INFINITY, f64::min);
                    if best_fallback.is_none_or(|(_, best_least)| least > best_least) {
                        best_fallback = Some((FrameAssignment { frame_triangle: ft, weights }, least));
                    }
                }
                Containment::Degenerate => {}
            }
        }

        let assignment = match found {
            Some(a) => a,
            None => {
                let (fallback, _) = best_fallback.ok_or(TessellateError::NotFound { vertex: v })?;
                if out_level >= 1 {
                    log::warn!(
                        "vertex {v} fell outside every frame triangle; using least-negative-weight fallback {}",
                        fallback.frame_triangle
                    );
                }
                fallback
            }
        };
        assignments.push(assignment);
    }

    Ok(assignments)
}

/// Point-queries the refined mesh: given a UV point, finds the frame
/// triangle containing it (same scan as [`bary_frame`]) and returns its
/// barycentric weights there. Used for the inverse sensitivity map.
#[must_use]
pub fn bary_tess(mesh: &MeshStore, p: UvPoint) -> Option<FrameAssignment> {
    let nframe = mesh.nframe();
    for ft in 1..=nframe {
        let [t0, t1, t2] = mesh.tri_uv(ft);
        let (containment, weights) = in_tri_exact(t0, t1, t2, p);
        if containment == Containment::Inside {
            return Some(FrameAssignment { frame_triangle: ft, weights });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point3;
    use crate::mesh::VertexKind;

    fn framed_quad() -> MeshStore {
        let mut m = MeshStore::new();
        m.add_vertex(VertexKind::Node { node_index: 0 }, Point3::new(0.0, 0.0, 0.0), UvPoint::new(0.0, 0.0));
        m.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(1.0, 0.0, 0.0), UvPoint::new(1.0, 0.0));
        m.add_vertex(VertexKind::Node { node_index: 2 }, Point3::new(1.0, 1.0, 0.0), UvPoint::new(1.0, 1.0));
        m.add_vertex(VertexKind::Node { node_index: 3 }, Point3::new(0.0, 1.0, 0.0), UvPoint::new(0.0, 1.0));
        let t1 = m.add_triangle([1, 2, 3]);
        let t2 = m.add_triangle([1, 3, 4]);
        m.triangle_mut(t1).neighbors = [0, t2 as i32, 0];
        m.triangle_mut(t2).neighbors = [0, 0, t1 as i32];
        m.capture_frame();
        m
    }

    #[test]
    fn bary_frame_assigns_interior_vertex_to_containing_triangle() {
        let mut m = framed_quad();
        m.add_vertex(VertexKind::FaceInterior, Point3::new(0.6, 0.3, 0.0), UvPoint::new(0.6, 0.3));
        let assignments = bary_frame(&m, 0).expect("every vertex should resolve");
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].frame_triangle, 1);
        let sum: f64 = assignments[0].weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bary_tess_finds_containing_triangle_by_point_query() {
        let m = framed_quad();
        let found = bary_tess(&m, UvPoint::new(0.1, 0.8)).expect("point should land in frame triangle 2");
        assert_eq!(found.frame_triangle, 2);
    }

    #[test]
    fn bary_tess_returns_none_outside_the_frame() {
        let m = framed_quad();
        assert!(bary_tess(&m, UvPoint::new(5.0, 5.0)).is_none());
    }
}
