//! Builds triangle neighbor links (and boundary segments) from a flat
//! triangle index list, the step every frame triangulation needs before the
//! refinement phases can run.
//!
//! Works for an arbitrary triangle soup, not just a mesh with known regular
//! connectivity, by hashing each side's unordered endpoint pair.

use std::collections::HashMap;

use crate::mesh::{MeshStore, Segment};

/// Appends `triangles` (flat, 1-based vertex indices, three per triangle) to
/// `mesh` and wires up every triangle's `neighbors` array by matching shared
/// undirected edges. Edges with no matching neighbor become boundary
/// [`Segment`]s. Returns the 1-based indices of the newly added triangles.
pub fn build_neighbors_from_segments(mesh: &mut MeshStore, triangles: &[[u32; 3]]) -> Vec<u32> {
    let base = mesh.ntris();
    let added: Vec<u32> = triangles.iter().map(|&ixs| mesh.add_triangle(ixs)).collect();

    let mut edge_owner: HashMap<(u32, u32), (u32, usize)> = HashMap::new();

    for &tri in &added {
        for s in 0..3 {
            let (a, b) = mesh.triangle(tri).side_endpoints(s);
            let key = if a < b { (a, b) } else { (b, a) };
            match edge_owner.remove(&key) {
                Some((other_tri, other_side)) => {
                    mesh.triangle_mut(tri).neighbors[s] = other_tri as i32;
                    mesh.triangle_mut(other_tri).neighbors[other_side] = tri as i32;
                }
                None => {
                    edge_owner.insert(key, (tri, s));
                }
            }
        }
    }

    for ((a, b), (tri, s)) in edge_owner {
        mesh.segments.push(Segment { endpoints: [a, b], neighbor: -(tri as i32 * 3 + s as i32) - 1 });
    }

    let _ = base;
    added
}

/// Reverses every triangle's winding order in place by swapping each
/// triangle's second and third vertex (and the matching neighbor slots).
/// The undirected edge set, and therefore every back-link, is unchanged by
/// this swap, so no restitching is required.
pub fn flip_triangle_winding(mesh: &mut MeshStore) {
    for t in 1..=mesh.ntris() {
        let tri = mesh.triangle_mut(t);
        tri.indices.swap(1, 2);
        tri.neighbors.swap(1, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Point3, UvPoint};
    use crate::mesh::VertexKind;

    fn quad_vertices(mesh: &mut MeshStore) {
        mesh.add_vertex(VertexKind::Node { node_index: 0 }, Point3::new(0.0, 0.0, 0.0), UvPoint::new(0.0, 0.0));
        mesh.add_vertex(VertexKind::Node { node_index: 1 }, Point3::new(1.0, 0.0, 0.0), UvPoint::new(1.0, 0.0));
        mesh.add_vertex(VertexKind::Node { node_index: 2 }, Point3::new(1.0, 1.0, 0.0), UvPoint::new(1.0, 1.0));
        mesh.add_vertex(VertexKind::Node { node_index: 3 }, Point3::new(0.0, 1.0, 0.0), UvPoint::new(0.0, 1.0));
    }

    #[test]
    fn builds_mutual_neighbor_link_across_shared_diagonal() {
        let mut m = MeshStore::new();
        quad_vertices(&mut m);
        let added = build_neighbors_from_segments(&mut m, &[[1, 2, 3], [1, 3, 4]]);
        assert_eq!(added, vec![1, 2]);
        assert_eq!(m.triangle(1).neighbors[1], 2);
        assert_eq!(m.triangle(2).neighbors[2], 1);
        m.check_invariants(1).expect("built mesh should satisfy invariants");
    }

    #[test]
    fn boundary_sides_get_no_neighbor_and_a_segment() {
        let mut m = MeshStore::new();
        quad_vertices(&mut m);
        build_neighbors_from_segments(&mut m, &[[1, 2, 3], [1, 3, 4]]);
        assert_eq!(m.triangle(1).neighbors[0], 0);
        assert_eq!(m.segments.len(), 4);
    }
}
