//! The unification engine: `OpContext` and the `Unify`/`Evaluate` entry
//! points (`spec.md` §4.2, §5).
//!
//! Realizes `spec.md` §5's "explicit work-stack rather than unbounded
//! recursion" as ordinary recursive dispatch bounded by [`resource::DepthGuard`]:
//! the native call stack *is* the work-stack, and the guard is the same
//! safety net `spec.md` §9 describes ("a defensive fallback, not a
//! correctness mechanism"). This keeps the dispatch a single large `match`
//! per `spec.md` §9's "sum-type dispatch instead of dynamic dispatch"
//! without hand-rolling a second, parallel stack machine next to the one the
//! language runtime already gives us — see `DESIGN.md`.

mod arcs;
mod binop;
mod comprehension;
mod conjuncts;
mod cycle;
mod disjunction;
mod finalize;

pub use conjuncts::unify;
pub use finalize::evaluate;

use crate::{
    adt::{env::EnvFrame, env::EnvId, vertex::Status, vertex::Vertex, vertex::VertexId},
    errors::Bottom,
    feature::{Feature, Interner},
    resource::{DepthGuard, EvalConfig, ResourceError},
};

/// The targets `Unify` may be asked to reach (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TargetStatus {
    Partial,
    EvaluatingArcs,
    Finalized,
}

impl TargetStatus {
    fn satisfied_by(self, status: Status) -> bool {
        let required = match self {
            Self::Partial => Status::Partial,
            Self::EvaluatingArcs => Status::EvaluatingArcs,
            Self::Finalized => Status::Finalized,
        };
        status >= required
    }
}

/// Owns every arena the evaluator touches: vertices, environments, the
/// label interner, and the resource configuration. Threaded explicitly
/// through every evaluator function; nothing here is global or thread-local
/// (`spec.md` §5 "No blocking I/O, no threads", `spec.md` §9).
pub struct OpContext {
    vertices: Vec<Vertex>,
    envs: Vec<EnvFrame>,
    pub interner: Interner,
    pub config: EvalConfig,
    depth: usize,
}

impl OpContext {
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        Self {
            vertices: Vec::new(),
            envs: Vec::new(),
            interner: Interner::new(),
            config,
            depth: 0,
        }
    }

    pub fn alloc_vertex(&mut self, parent: Option<VertexId>, label: Feature) -> VertexId {
        let id = VertexId(u32::try_from(self.vertices.len()).expect("vertex arena overflow"));
        self.vertices.push(Vertex::new(parent, label));
        id
    }

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0 as usize]
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id.0 as usize]
    }

    /// Allocates a synthetic, already-`Finalized` vertex wrapping a value
    /// computed out-of-band (a `for`-clause's `k`/`v`, a bulk field's bound
    /// label `X`, a memoized `let`). These never gain arcs or further
    /// conjuncts.
    pub fn alloc_finalized(&mut self, value: crate::adt::vertex::Value) -> VertexId {
        let id = self.alloc_vertex(None, Feature::INVALID);
        let vx = self.vertex_mut(id);
        vx.value = Some(value);
        vx.status = Status::Finalized;
        id
    }

    pub fn alloc_env(&mut self, frame: EnvFrame) -> EnvId {
        let id = EnvId(u32::try_from(self.envs.len()).expect("environment arena overflow"));
        self.envs.push(frame);
        id
    }

    #[must_use]
    pub fn env(&self, id: EnvId) -> &EnvFrame {
        &self.envs[id.0 as usize]
    }

    pub fn env_mut(&mut self, id: EnvId) -> &mut EnvFrame {
        &mut self.envs[id.0 as usize]
    }

    /// Enters one logical evaluation frame, failing with a resource
    /// `Bottom` if `config.max_depth` would be exceeded.
    fn enter_depth(&mut self) -> Result<DepthGuard<'_>, Bottom> {
        DepthGuard::enter(&mut self.depth, self.config.max_depth).map_err(Into::into)
    }
}

/// Snapshot of a vertex's mutable evaluation state, used to restore it after
/// a failed disjunction branch (`spec.md` §4.2.5, §5 "Disjunction
/// snapshotting": "deep copies of the mutable state only").
pub(crate) struct VertexSnapshot {
    arcs: indexmap::IndexMap<Feature, VertexId>,
    conjuncts: Vec<crate::adt::conjunct::Conjunct>,
    dispatched: Vec<bool>,
    status: Status,
    value: Option<crate::adt::vertex::Value>,
    closed: crate::closed::Acceptor,
    optional_labels: Vec<Feature>,
}

impl VertexSnapshot {
    pub(crate) fn take(v: &Vertex) -> Self {
        Self {
            arcs: v.arcs.clone(),
            conjuncts: v.conjuncts.clone(),
            dispatched: v.dispatched.clone(),
            status: v.status,
            value: v.value.clone(),
            closed: v.closed.clone(),
            optional_labels: v.optional_labels.clone(),
        }
    }

    pub(crate) fn restore(self, v: &mut Vertex) {
        v.arcs = self.arcs;
        v.conjuncts = self.conjuncts;
        v.dispatched = self.dispatched;
        v.status = self.status;
        v.value = self.value;
        v.closed = self.closed;
        v.optional_labels = self.optional_labels;
    }
}
