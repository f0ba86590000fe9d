//! Conjuncts: the `(Environment, Expr, CloseInfo)` triples that contribute
//! to a vertex's value (`spec.md` §3).

use std::rc::Rc;

use crate::adt::{env::EnvId, expr::Expr};

/// Index into a vertex's closedness canopy (see [`crate::closed`]).
///
/// Small integer ids into a per-vertex arena, so splicing one canopy into
/// another (when two structs unify) is just an id offset, and cloning a
/// canopy for a disjunction snapshot is cheap (`spec.md` §9 "Arena +
/// indices for the close-info canopy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseId(pub u32);

/// Provenance of a conjunct with respect to closedness: which canopy node
/// it was produced under. Distinct conjuncts contributed by the same
/// `StructLit` (or the same embedding, or the same definition reference)
/// share a `CloseId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseInfo {
    pub id: CloseId,
}

impl CloseInfo {
    #[must_use]
    pub fn new(id: CloseId) -> Self {
        Self { id }
    }
}

/// One value fragment contributing to a vertex.
///
/// `expr` is `Rc`-wrapped so that dereferencing a reference — which clones
/// the target's conjuncts into the referencing vertex, recursively
/// (`spec.md` §4.2.1) — never deep-copies the expression tree.
#[derive(Debug, Clone)]
pub struct Conjunct {
    pub env: EnvId,
    pub expr: Rc<Expr>,
    pub close_info: CloseInfo,
}

impl Conjunct {
    #[must_use]
    pub fn new(env: EnvId, expr: Rc<Expr>, close_info: CloseInfo) -> Self {
        Self { env, expr, close_info }
    }
}
