//! The refiner's only outward-facing consumer hook: resampling a refined
//! mesh back onto a regular UV grid via the barycentric frame map, for
//! callers that want a grid rather than a triangle soup. This does **not**
//! fit a spline surface; that would be a different, heavier subsystem this
//! crate intentionally does not reach for.

use crate::barycentric::bary_tess;
use crate::core::{Point3, UvPoint};
use crate::mesh::MeshStore;

/// One resampled grid point: the UV it was queried at and the 3-D position
/// interpolated from the containing frame triangle's vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSample {
    pub uv: UvPoint,
    pub xyz: Point3,
}

/// Resamples `mesh` on a `u_count * v_count` regular grid over `[u_min,
/// u_max] x [v_min, v_max]`, interpolating 3-D position from each grid
/// point's containing frame triangle. Grid points outside every frame
/// triangle are skipped.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn fit_surface_from_frame(
    mesh: &MeshStore,
    u_min: f64,
    u_max: f64,
    v_min: f64,
    v_max: f64,
    u_count: u32,
    v_count: u32,
) -> Vec<GridSample> {
    if u_count < 2 || v_count < 2 {
        return Vec::new();
    }
    let mut samples = Vec::with_capacity((u_count * v_count) as usize);

    for iv in 0..v_count {
        let v = v_min + (v_max - v_min) * f64::from(iv) / f64::from(v_count - 1);
        for iu in 0..u_count {
            let u = u_min + (u_max - u_min) * f64::from(iu) / f64::from(u_count - 1);
            let uv = UvPoint::new(u, v);
            if let Some(found) = bary_tess(mesh, uv) {
                let tri = mesh.tri_xyz(found.frame_triangle);
                let [w0, w1, w2] = found.weights;
                let xyz = Point3::new(
                    w0 * tri[0].x + w1 * tri[1].x + w2 * tri[2].x,
                    w0 * tri[0].y + w1 * tri[1].y + w2 * tri[2].y,
                    w0 * tri[0].z + w1 * tri[1].z + w2 * tri[2].z,
                );
                samples.push(GridSample { uv, xyz });
            }
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexKind;

    #[test]
    fn resamples_a_flat_quad_onto_a_grid() {
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

        let samples = fit_surface_from_frame(&m, 0.0, 1.0, 0.0, 1.0, 3, 3);
        assert_eq!(samples.len(), 9);
        for s in &samples {
            assert!((s.xyz.x - s.uv.u).abs() < 1e-9);
            assert!((s.xyz.y - s.uv.v).abs() < 1e-9);
        }
    }
}
