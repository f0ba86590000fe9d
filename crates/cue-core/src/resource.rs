//! Evaluation configuration and the recursion-depth guard (`spec.md` §5, §6).

use std::fmt;

use crate::errors::{Bottom, ErrorCode};

/// Default numeric precision (decimal digits) for `Num` arithmetic, unless
/// overridden by [`EvalConfig`] (`spec.md` §6).
pub const DEFAULT_PRECISION: u64 = 24;

/// Default maximum nested evaluation frames (`spec.md` §5). The presence of
/// this guard signals that the evaluator lacks perfect cycle detection for
/// some adversarial inputs; it is a defensive fallback, not a correctness
/// mechanism (`spec.md` §9).
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Default cap on the number of errors [`crate::api::validate`] collects
/// before stopping (`spec.md` §6's `Validate(v, cfg)`).
pub const DEFAULT_MAX_ERROR_COUNT: usize = 100;

/// Configuration threaded explicitly through an [`crate::eval::OpContext`].
///
/// Unlike the grounding repo's `ResourceLimits` (which also tracks
/// allocation count, wall-clock time, and memory — needed because it
/// sandboxes untrusted Python execution), this evaluator is pure CPU with no
/// sandboxing goal (`spec.md` §1's non-goals), so only the recursion depth
/// guard and numeric precision survive as configurable limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    pub precision: u64,
    pub max_depth: usize,
    pub max_error_count: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            max_depth: DEFAULT_MAX_DEPTH,
            max_error_count: DEFAULT_MAX_ERROR_COUNT,
        }
    }
}

/// Error returned when a resource limit is exceeded during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum nested evaluation frames exceeded.
    Depth { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Depth { limit, depth } => {
                write!(f, "maximum evaluation depth exceeded: {depth} > {limit}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<ResourceError> for Bottom {
    fn from(error: ResourceError) -> Self {
        Bottom::new(ErrorCode::Eval, error.to_string())
    }
}

/// RAII guard incrementing/decrementing an evaluation-depth counter.
///
/// Modeled on the grounding repo's `ResourceTracker`/recursion-limit
/// bookkeeping in `resource.rs`, trimmed to the one counter this evaluator
/// needs.
#[derive(Debug)]
pub struct DepthGuard<'a> {
    depth: &'a mut usize,
}

impl<'a> DepthGuard<'a> {
    /// Enters a new evaluation frame, failing if `limit` would be exceeded.
    pub fn enter(depth: &'a mut usize, limit: usize) -> Result<Self, ResourceError> {
        if *depth >= limit {
            return Err(ResourceError::Depth { limit, depth: *depth });
        }
        *depth += 1;
        Ok(Self { depth })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        *self.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_guard_rejects_past_limit() {
        let mut depth = 0;
        let _g1 = DepthGuard::enter(&mut depth, 1).unwrap();
        assert!(DepthGuard::enter(&mut depth, 1).is_err());
    }

    #[test]
    fn depth_guard_releases_on_drop() {
        let mut depth = 0;
        {
            let _g = DepthGuard::enter(&mut depth, 1).unwrap();
            assert_eq!(depth, 1);
        }
        assert_eq!(depth, 0);
    }
}
