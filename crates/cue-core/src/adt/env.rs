//! Lexical environments: the scope chain used to resolve references
//! (`spec.md` §3).

use smallvec::SmallVec;

use crate::{
    adt::expr::LetId,
    adt::vertex::VertexId,
    feature::Feature,
};

/// Index into the flat arena of [`EnvFrame`]s owned by
/// [`crate::eval::OpContext`].
///
/// Environments are immutable once created and are shared across many
/// conjuncts (`spec.md` §9 "Environments as persistent lists"), so `EnvId`
/// is a plain `Copy` handle rather than an `Rc` — nothing ever mutates a
/// frame after it is pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub u32);

/// One frame of the lexical scope chain.
///
/// `vertex` is the scope this frame corresponds to (a [`StructLit`]'s
/// vertex, or a comprehension/let scope's synthetic vertex).  `bindings`
/// holds pattern-bound variables introduced at this frame: the `X` in
/// `[X=string]: …`, the `k`/`v` of a `for` clause, or a `let` name — each
/// resolved via [`crate::adt::expr::Expr::LabelRef`]/`FieldRef`/`LetRef`
/// with `up` counting frames from the reference site to this one.
///
/// [`StructLit`]: crate::adt::decl::StructLit
#[derive(Debug, Clone)]
pub struct EnvFrame {
    pub parent: Option<EnvId>,
    pub vertex: VertexId,
    pub bindings: SmallVec<[(Feature, VertexId); 2]>,
    /// The pattern variable bound by a bulk field (`[X=string]: …`), if this
    /// frame was created for one. Singular and unnamed because the compiler
    /// resolves `X` to [`crate::adt::expr::Expr::LabelRef`] directly rather
    /// than through the `bindings` table — there is exactly one such
    /// variable per bulk-field scope.
    pub label_binding: Option<VertexId>,
    /// Memoized `let` values, keyed by binding site (`spec.md` §3's
    /// "Environments also memoize `let` evaluations to prevent combinatorial
    /// blowup").
    pub let_cache: SmallVec<[(LetId, VertexId); 2]>,
}

impl EnvFrame {
    #[must_use]
    pub fn root(vertex: VertexId) -> Self {
        Self {
            parent: None,
            vertex,
            bindings: SmallVec::new(),
            label_binding: None,
            let_cache: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn child(parent: EnvId, vertex: VertexId) -> Self {
        Self {
            parent: Some(parent),
            vertex,
            bindings: SmallVec::new(),
            label_binding: None,
            let_cache: SmallVec::new(),
        }
    }

    pub fn bind(&mut self, label: Feature, vertex: VertexId) {
        self.bindings.push((label, vertex));
    }

    pub fn bind_label(&mut self, vertex: VertexId) {
        self.label_binding = Some(vertex);
    }

    #[must_use]
    pub fn lookup_binding(&self, label: Feature) -> Option<VertexId> {
        self.bindings
            .iter()
            .rev()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| *v)
    }

    pub fn memoize_let(&mut self, id: LetId, vertex: VertexId) {
        self.let_cache.push((id, vertex));
    }

    #[must_use]
    pub fn lookup_let(&self, id: LetId) -> Option<VertexId> {
        self.let_cache.iter().find(|(l, _)| *l == id).map(|(_, v)| *v)
    }
}
