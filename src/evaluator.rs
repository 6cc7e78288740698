//! A trait for evaluating the parametric surface underlying a face, plus
//! inverse evaluation and range queries. Narrowed to what the refiner
//! actually calls, and extended with the inverse-evaluation hook the refiner
//! needs for degenerate-node side splits.

use crate::core::{Point3, Vec3};
use crate::error::EvalError;

/// Parameter-domain bounds and periodicity, as returned by `getRange`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
    pub u_periodic: bool,
    pub v_periodic: bool,
}

/// Position, first partials, and (optional) second partials at a UV query.
/// Second derivatives are read through but not required — callers that
/// don't need curvature just ignore `duu`/`duv`/`dvv`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub xyz: Point3,
    pub du: Vec3,
    pub dv: Vec3,
    pub duu: Option<Vec3>,
    pub duv: Option<Vec3>,
    pub dvv: Option<Vec3>,
}

impl SurfacePoint {
    #[must_use]
    pub fn normal(&self) -> Option<Vec3> {
        self.du.cross(self.dv).normalized()
    }
}

/// The face-evaluator boundary. Implementations are supplied by the caller;
/// this crate only consumes them.
pub trait FaceEvaluator {
    /// Evaluates the surface at `(u, v)`.
    fn evaluate(&self, u: f64, v: f64) -> Result<SurfacePoint, EvalError>;

    /// Inverse-evaluates `xyz`, returning the closest `(u, v)` and the
    /// surface point actually found there (which may differ slightly from
    /// `xyz` if it was off-surface).
    fn inv_evaluate(&self, xyz: Point3) -> Result<([f64; 2], Point3), EvalError>;

    /// Parameter-domain bounds and periodicity.
    fn range(&self) -> ParamRange;
}

fn central_difference(
    eval: impl Fn(f64, f64) -> Point3,
    u: f64,
    v: f64,
    u_span: f64,
    v_span: f64,
) -> (Vec3, Vec3) {
    const STEP: f64 = 1e-6;
    let hu = STEP * u_span.abs().max(1.0);
    let hv = STEP * v_span.abs().max(1.0);
    let du = (eval(u + hu, v).to_vec3() - eval(u - hu, v).to_vec3()).mul_scalar(1.0 / (2.0 * hu));
    let dv = (eval(u, v + hv).to_vec3() - eval(u, v - hv).to_vec3()).mul_scalar(1.0 / (2.0 * hv));
    (du, dv)
}

/// A planar face, `origin + u * u_axis + v * v_axis`. Exists purely to drive
/// `tessellate` end-to-end in tests.
#[derive(Debug, Clone, Copy)]
pub struct PlaneEvaluator {
    pub origin: Point3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
    pub range: ParamRange,
}

impl PlaneEvaluator {
    #[must_use]
    pub fn unit_square(origin: Point3, u_axis: Vec3, v_axis: Vec3) -> Self {
        Self {
            origin,
            u_axis,
            v_axis,
            range: ParamRange { u_min: 0.0, u_max: 1.0, v_min: 0.0, v_max: 1.0, u_periodic: false, v_periodic: false },
        }
    }
}

impl FaceEvaluator for PlaneEvaluator {
    fn evaluate(&self, u: f64, v: f64) -> Result<SurfacePoint, EvalError> {
        let xyz = self.origin + self.u_axis.mul_scalar(u) + self.v_axis.mul_scalar(v);
        Ok(SurfacePoint { xyz, du: self.u_axis, dv: self.v_axis, duu: None, duv: None, dvv: None })
    }

    fn inv_evaluate(&self, xyz: Point3) -> Result<([f64; 2], Point3), EvalError> {
        let d = xyz - self.origin;
        let uu = self.u_axis.length_squared();
        let vv = self.v_axis.length_squared();
        if uu <= f64::EPSILON || vv <= f64::EPSILON {
            return Err(EvalError::Failed);
        }
        let u = d.dot(self.u_axis) / uu;
        let v = d.dot(self.v_axis) / vv;
        let on_surface = self.origin + self.u_axis.mul_scalar(u) + self.v_axis.mul_scalar(v);
        Ok(([u, v], on_surface))
    }

    fn range(&self) -> ParamRange {
        self.range
    }
}

/// A sphere of the given radius centred at the origin, parameterised by
/// longitude `u in [0, 2pi]` and latitude `v in [-pi/2, pi/2]`.
#[derive(Debug, Clone, Copy)]
pub struct SphereEvaluator {
    pub center: Point3,
    pub radius: f64,
}

impl SphereEvaluator {
    fn point(&self, u: f64, v: f64) -> Point3 {
        let (su, cu) = u.sin_cos();
        let (sv, cv) = v.sin_cos();
        self.center + Vec3::new(self.radius * cv * cu, self.radius * cv * su, self.radius * sv)
    }
}

impl FaceEvaluator for SphereEvaluator {
    fn evaluate(&self, u: f64, v: f64) -> Result<SurfacePoint, EvalError> {
        let xyz = self.point(u, v);
        let (du, dv) = central_difference(|u, v| self.point(u, v), u, v, std::f64::consts::TAU, std::f64::consts::PI);
        Ok(SurfacePoint { xyz, du, dv, duu: None, duv: None, dvv: None })
    }

    fn inv_evaluate(&self, xyz: Point3) -> Result<([f64; 2], Point3), EvalError> {
        let d = xyz - self.center;
        let len = d.length();
        if len <= f64::EPSILON {
            return Err(EvalError::Failed);
        }
        let v = (d.z / len).clamp(-1.0, 1.0).asin();
        let u = d.y.atan2(d.x);
        let u = if u < 0.0 { u + std::f64::consts::TAU } else { u };
        Ok(([u, v], self.point(u, v)))
    }

    fn range(&self) -> ParamRange {
        ParamRange {
            u_min: 0.0,
            u_max: std::f64::consts::TAU,
            v_min: -std::f64::consts::FRAC_PI_2,
            v_max: std::f64::consts::FRAC_PI_2,
            u_periodic: true,
            v_periodic: false,
        }
    }
}

/// A right circular cone with its apex at `apex`, axis `axis` (unit length
/// expected), half-angle `half_angle`, parameterised by longitude `u` and
/// axial distance `v >= 0`. `v = 0` is the degenerate apex node, exercised by
/// the zero-area-sweep / degenerate-node side-split scenarios.
#[derive(Debug, Clone, Copy)]
pub struct ConeEvaluator {
    pub apex: Point3,
    pub axis: Vec3,
    pub half_angle: f64,
}

impl ConeEvaluator {
    fn frame(&self) -> (Vec3, Vec3) {
        let axis = self.axis.normalized().unwrap_or(Vec3::new(0.0, 0.0, 1.0));
        let helper = if axis.x.abs() < 0.9 { Vec3::new(1.0, 0.0, 0.0) } else { Vec3::new(0.0, 1.0, 0.0) };
        let e1 = axis.cross(helper).normalized().unwrap_or(Vec3::new(1.0, 0.0, 0.0));
        let e2 = axis.cross(e1);
        (e1, e2)
    }

    fn point(&self, u: f64, v: f64) -> Point3 {
        let axis = self.axis.normalized().unwrap_or(Vec3::new(0.0, 0.0, 1.0));
        let (e1, e2) = self.frame();
        let r = v * self.half_angle.tan();
        let (su, cu) = u.sin_cos();
        self.apex + axis.mul_scalar(v) + e1.mul_scalar(r * cu) + e2.mul_scalar(r * su)
    }
}

impl FaceEvaluator for ConeEvaluator {
    fn evaluate(&self, u: f64, v: f64) -> Result<SurfacePoint, EvalError> {
        let xyz = self.point(u, v);
        let (du, dv) = central_difference(|u, v| self.point(u, v), u, v, std::f64::consts::TAU, v.abs().max(1.0));
        Ok(SurfacePoint { xyz, du, dv, duu: None, duv: None, dvv: None })
    }

    fn inv_evaluate(&self, xyz: Point3) -> Result<([f64; 2], Point3), EvalError> {
        let axis = self.axis.normalized().ok_or(EvalError::Failed)?;
        let (e1, e2) = self.frame();
        let d = xyz - self.apex;
        let v = d.dot(axis);
        let x1 = d.dot(e1);
        let x2 = d.dot(e2);
        let u = x2.atan2(x1);
        let u = if u < 0.0 { u + std::f64::consts::TAU } else { u };
        Ok(([u, v], self.point(u, v)))
    }

    fn range(&self) -> ParamRange {
        ParamRange { u_min: 0.0, u_max: std::f64::consts::TAU, v_min: 0.0, v_max: f64::INFINITY, u_periodic: true, v_periodic: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_evaluate_matches_linear_combination() {
        let plane = PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let p = plane.evaluate(0.25, 0.75).unwrap();
        assert_eq!(p.xyz, Point3::new(0.25, 0.75, 0.0));
    }

    #[test]
    fn plane_inv_evaluate_round_trips() {
        let plane = PlaneEvaluator::unit_square(Point3::ORIGIN, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0));
        let ([u, v], _) = plane.inv_evaluate(Point3::new(1.0, 1.5, 0.0)).unwrap();
        assert!((u - 0.5).abs() < 1e-12);
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sphere_point_has_expected_radius() {
        let sphere = SphereEvaluator { center: Point3::ORIGIN, radius: 2.0 };
        let p = sphere.evaluate(0.3, 0.2).unwrap();
        assert!((p.xyz.to_vec3().length() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cone_apex_is_degenerate_single_point() {
        let cone = ConeEvaluator { apex: Point3::ORIGIN, axis: Vec3::new(0.0, 0.0, 1.0), half_angle: 0.5 };
        let p0 = cone.evaluate(0.0, 0.0).unwrap();
        let p1 = cone.evaluate(1.5, 0.0).unwrap();
        assert_eq!(p0.xyz, Point3::ORIGIN);
        assert_eq!(p1.xyz, Point3::ORIGIN);
    }
}
