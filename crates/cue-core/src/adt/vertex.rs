//! The central node of the evaluated tree (`spec.md` §3).

use bigdecimal::BigDecimal;
use indexmap::IndexMap;

use crate::{
    adt::{conjunct::Conjunct, expr::BoundOp, expr::ScalarLit},
    closed::Acceptor,
    errors::Bottom,
    feature::Feature,
    kind::Kind,
};

/// Index into the flat arena of [`Vertex`]es owned by
/// [`crate::eval::OpContext`].
///
/// A vertex is exclusively owned by its parent's `arcs` map; every other
/// reference to it (from a `Conjunct`'s environment, from a disjunction
/// snapshot, from the closedness canopy) is a non-owning index, so
/// self-referential definitions never form an ownership cycle
/// (`spec.md` §3 "Lifecycle", §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId(pub u32);

/// A vertex's evaluation progress. Strictly monotonic: a status observed to
/// regress is a bug (`spec.md` §3, §8's "Monotonicity of status").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Unprocessed,
    /// Currently being dispatched. Observing a vertex at `Evaluating` from
    /// within its own dispatch is the signature of a reference cycle
    /// (`spec.md` §4.2.7).
    Evaluating,
    Partial,
    /// Descent into this vertex's arcs is in progress. Observing a vertex at
    /// `EvaluatingArcs` transitively during descent is the signature of a
    /// structural cycle (`spec.md` §4.2.7).
    EvaluatingArcs,
    Finalized,
}

/// A bound validator's comparison sense plus its fixed operand, e.g. `>3`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub op: BoundOp,
    pub operand: ScalarLit,
}

impl BoundValue {
    /// Tests a candidate scalar against this bound.
    #[must_use]
    pub fn test(&self, candidate: &ScalarLit) -> bool {
        match self.op {
            BoundOp::Matches | BoundOp::NotMatches => self.test_regex(candidate),
            BoundOp::Ne => candidate != &self.operand,
            BoundOp::Lt | BoundOp::Le | BoundOp::Gt | BoundOp::Ge => {
                let ord = match (candidate, &self.operand) {
                    (ScalarLit::Num(b), ScalarLit::Num(a)) => Some(b.cmp(a)),
                    (ScalarLit::Str(b), ScalarLit::Str(a)) => Some(b.as_ref().cmp(a.as_ref())),
                    _ => None,
                };
                ord.is_some_and(|ord| Self::test_ord(self.op, ord))
            }
        }
    }

    fn test_ord(op: BoundOp, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match op {
            BoundOp::Lt => ord == Less,
            BoundOp::Le => ord != Greater,
            BoundOp::Gt => ord == Greater,
            BoundOp::Ge => ord != Less,
            BoundOp::Ne => ord != Equal,
            BoundOp::Matches | BoundOp::NotMatches => false,
        }
    }

    fn test_regex(&self, candidate: &ScalarLit) -> bool {
        let (ScalarLit::Str(pattern), ScalarLit::Str(s)) = (&self.operand, candidate) else {
            return false;
        };
        let Ok(re) = regex::Regex::new(pattern) else {
            return false;
        };
        let found = re.is_match(s);
        if self.op == BoundOp::Matches { found } else { !found }
    }
}

/// Whether a disjunct contributes a default under `&`-combination
/// (`spec.md` §4.2.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultMark {
    IsDefault,
    NotDefault,
    MaybeDefault,
}

impl DefaultMark {
    /// The absorbing table from `spec.md` §4.2.5: `maybe∧any = any`,
    /// `notDefault∧isDefault = notDefault`, `isDefault∧isDefault = isDefault`.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::MaybeDefault, x) | (x, Self::MaybeDefault) => x,
            (Self::NotDefault, _) | (_, Self::NotDefault) => Self::NotDefault,
            (Self::IsDefault, Self::IsDefault) => Self::IsDefault,
        }
    }
}

/// One surviving arm of an unresolved disjunction.
#[derive(Debug, Clone)]
pub struct DisjunctTerm {
    pub value: Box<Value>,
    pub default: DefaultMark,
}

/// A vertex's resolved (or partially resolved) value (`spec.md` §3).
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Num(BigDecimal),
    Str(Box<str>),
    Bytes(Box<[u8]>),
    /// One or more simultaneously active bound constraints; unification of
    /// bound values accumulates here (`spec.md` §4.2.2), and a concrete
    /// scalar landing later must pass every entry.
    Bound(Vec<BoundValue>),
    /// A struct value; arcs and closedness live on the owning `Vertex`
    /// itself, not duplicated here.
    Struct,
    /// A list value; `open` is `true` if a trailing `...T` was present.
    List { open: bool },
    Top,
    BasicType(Kind),
    Disjunction(Vec<DisjunctTerm>),
    Bottom(Bottom),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Null => Kind::NULL,
            Self::Bool(_) => Kind::BOOL,
            Self::Num(n) => {
                if n.is_integer() {
                    Kind::INT
                } else {
                    Kind::FLOAT
                }
            }
            Self::Str(_) => Kind::STRING,
            Self::Bytes(_) => Kind::BYTES,
            Self::Struct => Kind::STRUCT,
            Self::List { .. } => Kind::LIST,
            Self::Top => Kind::TOP,
            Self::BasicType(k) => *k,
            Self::Bound(bounds) => bounds
                .first()
                .map(|b| match &b.operand {
                    ScalarLit::Num(_) => Kind::NUM,
                    ScalarLit::Str(_) => Kind::STRING,
                    _ => Kind::TOP,
                })
                .unwrap_or(Kind::TOP),
            Self::Disjunction(terms) => terms.iter().fold(Kind::BOTTOM, |k, t| k.union(t.value.kind())),
            Self::Bottom(_) => Kind::BOTTOM,
        }
    }

    #[must_use]
    pub fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom(_))
    }

    #[must_use]
    pub fn is_concrete(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Num(_) | Self::Str(_) | Self::Bytes(_)
        )
    }

    #[must_use]
    pub fn bottom(b: Bottom) -> Self {
        Self::Bottom(b)
    }
}

/// The central evaluated-tree node.
pub struct Vertex {
    pub parent: Option<VertexId>,
    pub label: Feature,
    /// Child arcs, insertion order (`spec.md` §3, §5).
    pub arcs: IndexMap<Feature, VertexId>,
    /// Every conjunct ever added; never removed (`spec.md` §8's
    /// "Conjunct append-only").
    pub conjuncts: Vec<Conjunct>,
    /// Parallel to `conjuncts`: whether dispatch has already expanded this
    /// conjunct (appended its sub-conjuncts/arcs). Re-running `Unify` only
    /// (re)dispatches conjuncts still marked `false`, so idempotent re-entry
    /// never duplicates struct fields or comprehension output.
    pub dispatched: Vec<bool>,
    pub status: Status,
    pub value: Option<Value>,
    pub closed: Acceptor,
    /// Labels declared optional anywhere among this vertex's conjuncts,
    /// regardless of whether a concrete arc currently exists for them
    /// (backs [`crate::api::Vertex::is_optional`]... see `crate::api`).
    pub optional_labels: Vec<Feature>,
    /// Set once descent into this vertex's arcs begins; used for structural
    /// cycle detection (`spec.md` §4.2.7).
    pub evaluating_arcs: bool,
}

impl Vertex {
    #[must_use]
    pub fn new(parent: Option<VertexId>, label: Feature) -> Self {
        Self {
            parent,
            label,
            arcs: IndexMap::new(),
            conjuncts: Vec::new(),
            dispatched: Vec::new(),
            status: Status::Unprocessed,
            value: None,
            closed: Acceptor::default(),
            optional_labels: Vec::new(),
            evaluating_arcs: false,
        }
    }

    pub fn push_conjunct(&mut self, c: Conjunct) {
        self.conjuncts.push(c);
        self.dispatched.push(false);
    }

    #[must_use]
    pub fn is_optional(&self, f: Feature) -> bool {
        self.optional_labels.contains(&f)
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}
