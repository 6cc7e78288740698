//! Error types for the refinement engine: one `thiserror`-derived enum per
//! subsystem rather than a single catch-all. `TopologyError` covers the
//! local-reject paths a single topology operation can hit; `EvalError` is
//! the boundary with the external surface evaluator; `TessellateError`
//! covers the two fatal paths the phase driver and barycentric mapper can
//! return.

/// Local-reject outcomes from a single topology operation (edge swap,
/// triangle split, side split, edge collapse). The phase driver catches
/// every variant here and treats it as "skip this candidate, keep going" —
/// none of them leave the mesh partially mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// Allocation failure while growing the vertex or triangle arena.
    #[error("allocation failure while growing the mesh store")]
    Malloc,
    /// Zero-area or zero-normal configuration that cannot be resolved locally.
    #[error("degenerate geometry encountered")]
    Degen,
    /// A proposed split would create a segment shorter than the 1/8-of-original rule.
    #[error("split would violate the minimum sub-edge length rule")]
    RangeErr,
    /// An index computed from triangle-vertex arithmetic (`sum - i1 - i2`) was out of bounds.
    #[error("computed vertex or triangle index out of bounds")]
    IndexErr,
}

/// Failure modes reported by the external surface evaluator boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The evaluator flagged the query as outside its valid parameter range.
    #[error("surface evaluation was extrapolated outside the valid domain")]
    Extrapol,
    /// The evaluator could not produce a result (singular Jacobian, NaN input, etc).
    #[error("surface evaluation failed")]
    Failed,
}

/// Fatal outcomes from the two public entry points, `tessellate` and `bary_frame`.
///
/// Everything else (`TopologyError`, `EvalError`) is absorbed internally as a
/// local reject; only allocation failure and "no containing frame triangle
/// found" propagate out of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TessellateError {
    /// Allocation failure while growing the mesh store.
    #[error("allocation failure while growing the mesh store")]
    Malloc,
    /// `bary_frame` could not find any frame triangle containing a vertex,
    /// even after falling back to the least-negative-barycentric-weight triangle.
    #[error("no containing frame triangle found for vertex {vertex}")]
    NotFound { vertex: u32 },
}
