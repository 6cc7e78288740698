//! The mesh store: vertex/triangle/segment arenas plus the bookkeeping that
//! keeps neighbor links and frame provenance consistent.
//!
//! Vertices and triangles are addressed by 1-based index, matching the
//! convention used throughout the refinement engine (a neighbor or segment
//! slot of `<= 0` always means "boundary", never "index zero of the arena").
//! Both arenas grow via `Vec::push`, whose amortised-doubling growth already
//! gives a "grow in chunks" policy for free; there is no separate manual
//! capacity dance.

use crate::core::{Point3, UvPoint};

/// What role a vertex plays in the frame this mesh was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// A B-rep node (vertex shared by bounding edges). `node_index < 0` is
    /// the degenerate-node sentinel (e.g. a cone apex).
    Node { node_index: i32 },
    /// A point on the interior of a bounding edge.
    EdgeInterior { edge_index: u32, ordinal: u32 },
    /// A point in the face interior, created by a split.
    FaceInterior,
}

impl VertexKind {
    #[must_use]
    pub const fn is_face_interior(self) -> bool {
        matches!(self, Self::FaceInterior)
    }

    #[must_use]
    pub const fn is_degenerate_node(self) -> bool {
        matches!(self, Self::Node { node_index } if node_index < 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub xyz: Point3,
    pub uv: UvPoint,
    pub kind: VertexKind,
}

/// Per-side swap-candidate bits. Side `i` is opposite vertex `i`.
const MARK_ALL: u8 = 0b111;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// 1-based vertex indices.
    pub indices: [u32; 3],
    /// 1-based neighbor triangle indices; `<= 0` means the opposite side is
    /// a boundary segment.
    pub neighbors: [i32; 3],
    mark: u8,
    /// Transient "already visited this pass" flag used by flood fills and
    /// the swap loop's dirty/clean tracking.
    pub hit: u32,
    pub count: u32,
    /// Cached 3-D centroid, refreshed whenever the midpoint cache is live.
    pub mid: Point3,
    /// Whether `mid` lies within ray-distance of a boundary edge.
    pub close: bool,
    pub area: f64,
}

impl Triangle {
    #[must_use]
    pub fn new(indices: [u32; 3]) -> Self {
        Self {
            indices,
            neighbors: [0, 0, 0],
            mark: MARK_ALL,
            hit: 0,
            count: 0,
            mid: Point3::ORIGIN,
            close: false,
            area: 0.0,
        }
    }

    /// Ordered endpoints of side `s` (opposite vertex `s`): `(indices[(s+1)%3], indices[(s+2)%3])`.
    #[must_use]
    pub fn side_endpoints(&self, s: usize) -> (u32, u32) {
        (self.indices[(s + 1) % 3], self.indices[(s + 2) % 3])
    }

    #[must_use]
    pub const fn mark_bit(&self, side: usize) -> bool {
        self.mark & (1 << side) != 0
    }

    pub fn set_mark_bit(&mut self, side: usize, value: bool) {
        if value {
            self.mark |= 1 << side;
        } else {
            self.mark &= !(1 << side);
        }
    }

    #[must_use]
    pub const fn has_any_mark(&self) -> bool {
        self.mark != 0
    }

    /// Which side of this triangle (if any) names `tri` as neighbor.
    #[must_use]
    pub fn side_to_neighbor(&self, tri: u32) -> Option<usize> {
        self.neighbors.iter().position(|&n| n == tri as i32)
    }

    /// Index of this triangle's vertex triple, not sorted.
    #[must_use]
    pub const fn vertex_triple(&self) -> [u32; 3] {
        self.indices
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub endpoints: [u32; 2],
    /// Positive: triangle sharing this side. Non-positive: boundary sentinel.
    pub neighbor: i32,
}

#[derive(Debug, Default)]
pub struct MeshStore {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
    pub segments: Vec<Segment>,
    /// Number of vertices in the frame (index `<= nfrvrts` is read-only).
    nfrvrts: u32,
    /// Number of triangles in the frame (index `<= nframe` is read-only).
    nframe: u32,
    /// Snapshot of the frame triangulation's vertex triples, for invariant #4.
    frame_indices: Vec<[u32; 3]>,
}

impl MeshStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn nverts(&self) -> u32 {
        self.vertices.len() as u32
    }

    #[must_use]
    pub fn ntris(&self) -> u32 {
        self.triangles.len() as u32
    }

    #[must_use]
    pub fn nfrvrts(&self) -> u32 {
        self.nfrvrts
    }

    #[must_use]
    pub fn nframe(&self) -> u32 {
        self.nframe
    }

    #[must_use]
    pub fn vertex(&self, idx: u32) -> &Vertex {
        &self.vertices[idx as usize - 1]
    }

    pub fn vertex_mut(&mut self, idx: u32) -> &mut Vertex {
        &mut self.vertices[idx as usize - 1]
    }

    #[must_use]
    pub fn triangle(&self, idx: u32) -> &Triangle {
        &self.triangles[idx as usize - 1]
    }

    pub fn triangle_mut(&mut self, idx: u32) -> &mut Triangle {
        &mut self.triangles[idx as usize - 1]
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Append a vertex, returning its 1-based index.
    pub fn add_vertex(&mut self, kind: VertexKind, xyz: Point3, uv: UvPoint) -> u32 {
        self.vertices.push(Vertex { xyz, uv, kind });
        self.vertices.len() as u32
    }

    /// Append a triangle, returning its 1-based index. Neighbors start
    /// unset (`0`, i.e. boundary) and must be wired up by the caller.
    pub fn add_triangle(&mut self, indices: [u32; 3]) -> u32 {
        self.triangles.push(Triangle::new(indices));
        self.triangles.len() as u32
    }

    #[must_use]
    pub fn is_frame_triangle(&self, idx: u32) -> bool {
        idx <= self.nframe
    }

    #[must_use]
    pub fn is_frame_vertex(&self, idx: u32) -> bool {
        idx <= self.nfrvrts
    }

    /// Triangle's vertex positions in UV space.
    #[must_use]
    pub fn tri_uv(&self, idx: u32) -> [UvPoint; 3] {
        let t = self.triangle(idx);
        [
            self.vertex(t.indices[0]).uv,
            self.vertex(t.indices[1]).uv,
            self.vertex(t.indices[2]).uv,
        ]
    }

    /// Triangle's vertex positions in 3-space.
    #[must_use]
    pub fn tri_xyz(&self, idx: u32) -> [Point3; 3] {
        let t = self.triangle(idx);
        [
            self.vertex(t.indices[0]).xyz,
            self.vertex(t.indices[1]).xyz,
            self.vertex(t.indices[2]).xyz,
        ]
    }

    /// Snapshot the current triangulation as the frame: every vertex/triangle
    /// added from now on has an index strictly greater than the recorded
    /// counts (mesh invariant #4).
    pub fn capture_frame(&mut self) {
        self.nfrvrts = self.nverts();
        self.nframe = self.ntris();
        self.frame_indices = self.triangles[..self.nframe as usize]
            .iter()
            .map(|t| t.indices)
            .collect();
    }

    /// Removes one or two triangles and one vertex by swap-to-end, used by
    /// edge collapse (one collapsing triangle on a boundary edge, two for an
    /// interior edge). `doomed` are 1-based triangle indices scheduled for
    /// removal; `vertex` is the 1-based vertex index being merged away.
    /// Returns the relocations the caller must still patch neighbor/vertex
    /// links for, in the form `(old_index, new_index)` pairs, largest-first.
    pub fn remove_triangles_and_vertex(&mut self, doomed: &[u32], vertex: u32) -> CollapseRelocation {
        let mut doomed_sorted = doomed.to_vec();
        doomed_sorted.sort_unstable_by(|a, b| b.cmp(a));

        let mut moved_tris = Vec::with_capacity(doomed_sorted.len());
        for tri in doomed_sorted {
            let last = self.ntris();
            if tri != last {
                self.triangles.swap(tri as usize - 1, last as usize - 1);
                moved_tris.push((last, tri));
            }
            self.triangles.pop();
        }

        let last_vertex = self.nverts();
        let moved_vertex = if vertex != last_vertex {
            self.vertices.swap(vertex as usize - 1, last_vertex as usize - 1);
            Some((last_vertex, vertex))
        } else {
            None
        };
        self.vertices.pop();

        CollapseRelocation { moved_tris, moved_vertex }
    }

    /// Rewrites every occurrence of `old` with `new` across all triangle
    /// vertex/neighbor arrays. Used to fix up indices after a relocation
    /// during edge collapse.
    pub fn relocate_triangle_index(&mut self, old: u32, new: u32) {
        for t in &mut self.triangles {
            for n in &mut t.neighbors {
                if *n == old as i32 {
                    *n = new as i32;
                }
            }
        }
    }

    pub fn relocate_vertex_index(&mut self, old: u32, new: u32) {
        for t in &mut self.triangles {
            for i in &mut t.indices {
                if *i == old {
                    *i = new;
                }
            }
        }
    }

    /// Checks structural invariants: vertex/triangle index bounds, neighbor
    /// back-link consistency, UV-orientation sign, and frame-array
    /// immutability. Intended for tests and debug assertions, not the hot
    /// path.
    pub fn check_invariants(&self, or_uv: i32) -> Result<(), String> {
        let nverts = self.nverts();
        let ntris = self.ntris();

        for (i, t) in self.triangles.iter().enumerate() {
            let tri_idx = i as u32 + 1;
            for &v in &t.indices {
                if v == 0 || v > nverts {
                    return Err(format!("triangle {tri_idx} has out-of-bounds vertex index {v}"));
                }
            }
            for &n in &t.neighbors {
                if n > 0 && n as u32 > ntris {
                    return Err(format!("triangle {tri_idx} has out-of-bounds neighbor index {n}"));
                }
            }
            for s in 0..3 {
                let n = t.neighbors[s];
                if n > 0 {
                    let neighbor = self.triangle(n as u32);
                    let (a, b) = t.side_endpoints(s);
                    let back = neighbor.side_to_neighbor(tri_idx).ok_or_else(|| {
                        format!("triangle {n} has no back-link to {tri_idx}")
                    })?;
                    let (na, nb) = neighbor.side_endpoints(back);
                    let forward = (a, b);
                    let reverse = (b, a);
                    if (na, nb) != forward && (na, nb) != reverse {
                        return Err(format!(
                            "triangle {tri_idx} side {s} and triangle {n} side {back} endpoint mismatch"
                        ));
                    }
                }
            }
            let uv = self.tri_uv(tri_idx);
            let signed = crate::predicates::area2d(uv[0], uv[1], uv[2]);
            if f64::from(or_uv) * signed <= 0.0 {
                return Err(format!("triangle {tri_idx} has wrong UV orientation"));
            }
        }

        if self.nframe as usize <= self.triangles.len() {
            for (i, frame_tri) in self.frame_indices.iter().enumerate() {
                if &self.triangles[i].indices != frame_tri {
                    return Err(format!("frame triangle {} was mutated", i + 1));
                }
            }
        }

        Ok(())
    }
}

/// What moved during an edge-collapse compaction, so the caller can patch up
/// any stale references it was holding.
#[derive(Debug, Clone, Default)]
pub struct CollapseRelocation {
    pub moved_tris: Vec<(u32, u32)>,
    pub moved_vertex: Option<(u32, u32)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangle_quad() -> MeshStore {
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
    fn add_vertex_returns_one_based_index() {
        let mut m = MeshStore::new();
        let a = m.add_vertex(VertexKind::FaceInterior, Point3::ORIGIN, UvPoint::new(0.0, 0.0));
        let b = m.add_vertex(VertexKind::FaceInterior, Point3::ORIGIN, UvPoint::new(0.0, 0.0));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(m.nverts(), 2);
    }

    #[test]
    fn invariants_hold_on_handcrafted_quad() {
        let m = two_triangle_quad();
        m.check_invariants(1).expect("quad mesh should satisfy invariants");
    }

    #[test]
    fn capture_frame_preserves_read_only_range() {
        let mut m = two_triangle_quad();
        m.capture_frame();
        assert_eq!(m.nfrvrts(), 4);
        assert_eq!(m.nframe(), 2);
        let new_v = m.add_vertex(VertexKind::FaceInterior, Point3::ORIGIN, UvPoint::new(0.5, 0.5));
        assert!(new_v > m.nfrvrts());
    }

    #[test]
    fn side_endpoints_are_opposite_vertex() {
        let t = Triangle::new([10, 20, 30]);
        assert_eq!(t.side_endpoints(0), (20, 30));
        assert_eq!(t.side_endpoints(1), (30, 10));
        assert_eq!(t.side_endpoints(2), (10, 20));
    }

    #[test]
    fn remove_triangles_and_vertex_compacts_by_swap_to_end() {
        let mut m = two_triangle_quad();
        let reloc = m.remove_triangles_and_vertex(&[1], 4);
        assert_eq!(m.ntris(), 1);
        assert_eq!(m.nverts(), 3);
        // Triangle 2 was the last triangle, so removing triangle 1 moves it down.
        assert_eq!(reloc.moved_tris, vec![(2, 1)]);
        assert_eq!(reloc.moved_vertex, None);
    }

    #[test]
    fn mark_bits_round_trip() {
        let mut t = Triangle::new([1, 2, 3]);
        assert!(t.mark_bit(0) && t.mark_bit(1) && t.mark_bit(2));
        t.set_mark_bit(1, false);
        assert!(t.mark_bit(0));
        assert!(!t.mark_bit(1));
        assert!(t.mark_bit(2));
    }
}
