#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Adaptive surface-triangulation refinement: given a parametric face's
//! initial boundary triangulation, repeatedly swap, split, and collapse
//! triangles until the mesh tracks the underlying surface within the
//! requested tolerances.
//!
//! The entry point is [`phases::tessellate`]; everything else in this crate
//! is the machinery it is built from — a mesh store, geometric predicates,
//! the four topology primitives, the swap-quality tests, and the
//! barycentric frame map used to carry UV perturbations back through a
//! refined mesh.

pub mod barycentric;
pub mod config;
pub mod core;
pub mod error;
pub mod evaluator;
pub mod mesh;
pub mod midpoint_cache;
pub mod neighbors;
pub mod phases;
pub mod predicates;
pub mod quality;
pub mod surface_fit;
pub mod topology;

pub use barycentric::{FrameAssignment, bary_frame, bary_tess};
pub use config::{QuadHints, TessellateConfig, TessellateStats};
pub use core::{Point3, Tolerance, UvPoint, Vec3};
pub use error::{EvalError, TessellateError, TopologyError};
pub use evaluator::{ConeEvaluator, FaceEvaluator, ParamRange, PlaneEvaluator, SphereEvaluator, SurfacePoint};
pub use mesh::{CollapseRelocation, MeshStore, Segment, Triangle, Vertex, VertexKind};
pub use midpoint_cache::{AddOutcome, MidpointCache};
pub use neighbors::{build_neighbors_from_segments, flip_triangle_winding};
pub use phases::tessellate;
pub use predicates::{Containment, area2d, dot_norm, get_intersect, in_tri, in_tri_exact, max_uv_angle, max_xyz_angle, orien_tri, ray_intersect};
pub use quality::{ANGTOL, Accum, MAXANG, ang_uv_test, ang_xyz_test, area_test, diag_test};
pub use surface_fit::{GridSample, fit_surface_from_frame};
pub use topology::{check_or, edge_collapse, edge_swap, side_split, triangle_split};
