//! Geometric predicates: orientation, area, point-in-triangle, angle and
//! dihedral measures. Every quality test and topology op in this crate is
//! built on top of this module; nothing here mutates a mesh. Orientation and
//! containment tests use a plain relative-tolerance `f64` sign check rather
//! than exact arithmetic.

use crate::core::{Point3, UvPoint, Vec3};

/// Signed 2-D parallelogram area of `(a - c) x (b - c)`, i.e. twice the
/// signed area of triangle `(a, b, c)`.
#[must_use]
pub fn area2d(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    let ac = a - c;
    let bc = b - c;
    ac.u * bc.v - ac.v * bc.u
}

/// Sign of the 2-D orientation of `(a, b, c)`: positive if counter-clockwise,
/// negative if clockwise, zero if collinear.
///
/// Computed directly from [`area2d`] with a relative tolerance on the
/// result, rather than pulling in a dedicated exact-arithmetic crate.
#[must_use]
pub fn orien_tri(a: UvPoint, b: UvPoint, c: UvPoint) -> i32 {
    let area = area2d(a, b, c);
    let scale = a.u.abs().max(a.v.abs()).max(b.u.abs()).max(b.v.abs()).max(c.u.abs()).max(c.v.abs());
    let eps = 1e-14 * scale.max(1.0) * scale.max(1.0);
    if area > eps {
        1
    } else if area < -eps {
        -1
    } else {
        0
    }
}

/// Outcome of a point-in-triangle test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Inside,
    Outside,
    Degenerate,
}

/// Exact (sign-based) point-in-triangle test with normalised barycentric
/// weights. Coincident signs on all three sub-triangle orientations means
/// inside; a single zero with the other two signs matching counts as
/// "on-edge" and is reported as inside; all-zero is degenerate.
#[must_use]
pub fn in_tri_exact(t1: UvPoint, t2: UvPoint, t3: UvPoint, p: UvPoint) -> (Containment, [f64; 3]) {
    let total = area2d(t1, t2, t3);
    if total == 0.0 {
        return (Containment::Degenerate, [0.0; 3]);
    }

    let s0 = orien_tri(t2, t3, p);
    let s1 = orien_tri(t3, t1, p);
    let s2 = orien_tri(t1, t2, p);

    let signs = [s0, s1, s2];
    let nonzero: Vec<i32> = signs.iter().copied().filter(|s| *s != 0).collect();

    let w0 = area2d(t2, t3, p) / total;
    let w1 = area2d(t3, t1, p) / total;
    let w2 = area2d(t1, t2, p) / total;
    let weights = [w0, w1, w2];

    if nonzero.is_empty() {
        return (Containment::Degenerate, weights);
    }

    let all_same = nonzero.windows(2).all(|w| w[0] == w[1]);
    if all_same {
        (Containment::Inside, weights)
    } else {
        (Containment::Outside, weights)
    }
}

/// Projects `p` into triangle `t`'s local frame (Gram-Schmidt from two edges)
/// and returns barycentric weights, rejecting if any weight is `<= fuzz`.
#[must_use]
pub fn in_tri(t: [UvPoint; 3], p: UvPoint, fuzz: f64) -> Option<[f64; 3]> {
    let e1 = t[1] - t[0];
    let e2 = t[2] - t[0];
    let dp = p - t[0];

    let d11 = e1.u * e1.u + e1.v * e1.v;
    let d12 = e1.u * e2.u + e1.v * e2.v;
    let d22 = e2.u * e2.u + e2.v * e2.v;
    let d1p = e1.u * dp.u + e1.v * dp.v;
    let d2p = e2.u * dp.u + e2.v * dp.v;

    let denom = d11 * d22 - d12 * d12;
    if denom.abs() <= f64::EPSILON {
        return None;
    }

    let w1 = (d22 * d1p - d12 * d2p) / denom;
    let w2 = (d11 * d2p - d12 * d1p) / denom;
    let w0 = 1.0 - w1 - w2;

    if w0 <= fuzz || w1 <= fuzz || w2 <= fuzz {
        None
    } else {
        Some([w0, w1, w2])
    }
}

/// Squared distance from `p2` to the infinite line through `p0, p1`, in the
/// plane the three points span. Returns `1e40` when the foot of the
/// perpendicular falls outside the `[-0.01, 1.01]` parameter range along the
/// segment, and `1e20` if `p0 == p1`.
#[must_use]
pub fn get_intersect(p0: Point3, p1: Point3, p2: Point3) -> f64 {
    let d = p1 - p0;
    let len2 = d.length_squared();
    if len2 <= f64::EPSILON {
        return 1e20;
    }
    let t = (p2 - p0).dot(d) / len2;
    if !(-0.01..=1.01).contains(&t) {
        return 1e40;
    }
    let foot = p0 + d.mul_scalar(t);
    p2.distance_squared_to(foot)
}

/// Perpendicular distance from `p2` to segment `p0p1`, normalised by
/// `|p1 - p0|`. Returns `100.0` if the segment is (numerically) zero-length.
#[must_use]
pub fn ray_intersect(p0: Point3, p1: Point3, p2: Point3) -> f64 {
    let d = p1 - p0;
    let len = d.length();
    if len <= f64::EPSILON {
        return 100.0;
    }
    let t = ((p2 - p0).dot(d) / (len * len)).clamp(0.0, 1.0);
    let closest = p0 + d.mul_scalar(t);
    p2.distance_squared_to(closest).sqrt() / len
}

/// Dot product of the unit face normals of triangles `(p0, p1, p2)` and
/// `(p3, p2, p1)`, i.e. the dihedral cosine across the shared edge `p1p2`.
/// Returns `1.0` (no penalty) if either triangle is degenerate.
#[must_use]
pub fn dot_norm(p0: Point3, p1: Point3, p2: Point3, p3: Point3) -> f64 {
    let n1 = (p1 - p0).cross(p2 - p0);
    let n2 = (p2 - p3).cross(p1 - p3);
    match (n1.normalized(), n2.normalized()) {
        (Some(n1), Some(n2)) => n1.dot(n2),
        _ => 1.0,
    }
}

fn angle_at(prev: Vec3, at: Vec3, next: Vec3) -> f64 {
    let a = (prev - at).normalized();
    let b = (next - at).normalized();
    match (a, b) {
        (Some(a), Some(b)) => a.dot(b).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}

/// Maximum interior angle of a triangle measured in 3-space.
#[must_use]
pub fn max_xyz_angle(p0: Point3, p1: Point3, p2: Point3) -> f64 {
    let a0 = angle_at(p2.to_vec3(), p0.to_vec3(), p1.to_vec3());
    let a1 = angle_at(p0.to_vec3(), p1.to_vec3(), p2.to_vec3());
    let a2 = angle_at(p1.to_vec3(), p2.to_vec3(), p0.to_vec3());
    a0.max(a1).max(a2)
}

/// Maximum interior angle of a triangle in parameter space, with the `v`
/// axis scaled by `v_over_u` so that UV-angle comparisons are meaningful on
/// faces whose two parametric directions have very different metric scale.
#[must_use]
pub fn max_uv_angle(p0: UvPoint, p1: UvPoint, p2: UvPoint, v_over_u: f64) -> f64 {
    let scale = |p: UvPoint| Vec3::new(p.u, p.v * v_over_u, 0.0);
    let a0 = angle_at(scale(p2), scale(p0), scale(p1));
    let a1 = angle_at(scale(p0), scale(p1), scale(p2));
    let a2 = angle_at(scale(p1), scale(p2), scale(p0));
    a0.max(a1).max(a2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area2d_ccw_is_positive() {
        let a = UvPoint::new(0.0, 0.0);
        let b = UvPoint::new(1.0, 0.0);
        let c = UvPoint::new(0.0, 1.0);
        assert!(area2d(a, b, c) > 0.0);
    }

    #[test]
    fn orien_tri_matches_area_sign() {
        let a = UvPoint::new(0.0, 0.0);
        let b = UvPoint::new(1.0, 0.0);
        let c = UvPoint::new(0.0, 1.0);
        assert_eq!(orien_tri(a, b, c), 1);
        assert_eq!(orien_tri(a, c, b), -1);
        assert_eq!(orien_tri(a, b, UvPoint::new(2.0, 0.0)), 0);
    }

    #[test]
    fn in_tri_exact_barycentric_round_trip() {
        let t1 = UvPoint::new(0.0, 0.0);
        let t2 = UvPoint::new(4.0, 0.0);
        let t3 = UvPoint::new(0.0, 4.0);
        let (alpha, beta, gamma) = (0.2, 0.3, 0.5);
        let p = UvPoint::new(
            alpha * t1.u + beta * t2.u + gamma * t3.u,
            alpha * t1.v + beta * t2.v + gamma * t3.v,
        );
        let (containment, w) = in_tri_exact(t1, t2, t3, p);
        assert_eq!(containment, Containment::Inside);
        assert!((w[0] - alpha).abs() < 1e-12);
        assert!((w[1] - beta).abs() < 1e-12);
        assert!((w[2] - gamma).abs() < 1e-12);
    }

    #[test]
    fn in_tri_exact_outside_point() {
        let t1 = UvPoint::new(0.0, 0.0);
        let t2 = UvPoint::new(1.0, 0.0);
        let t3 = UvPoint::new(0.0, 1.0);
        let (containment, _) = in_tri_exact(t1, t2, t3, UvPoint::new(5.0, 5.0));
        assert_eq!(containment, Containment::Outside);
    }

    #[test]
    fn dot_norm_is_one_for_coplanar_quad() {
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(1.0, 1.0, 0.0);
        let p3 = Point3::new(0.0, 1.0, 0.0);
        assert!((dot_norm(p0, p1, p2, p3) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ray_intersect_zero_length_segment_is_capped() {
        let p = Point3::new(0.0, 0.0, 0.0);
        assert_eq!(ray_intersect(p, p, Point3::new(1.0, 1.0, 1.0)), 100.0);
    }

    #[test]
    fn get_intersect_outside_parameter_range_is_capped() {
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(5.0, 1.0, 0.0);
        assert_eq!(get_intersect(p0, p1, p2), 1e40);
    }

    #[test]
    fn max_xyz_angle_right_triangle() {
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(0.0, 1.0, 0.0);
        let angle = max_xyz_angle(p0, p1, p2);
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }
}
