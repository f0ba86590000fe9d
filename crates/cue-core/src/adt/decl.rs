//! Declaration nodes used by [`StructLit::decls`] (`spec.md` §3).

use std::rc::Rc;

use crate::{
    adt::{clause::Comprehension, expr::Expr},
    feature::Feature,
};

/// A regular or definition field, `label: value`. Whether `label` is a
/// definition is carried on the [`Feature`] itself (`FeatureKind::Definition`);
/// there is no separate flag here.
#[derive(Debug, Clone)]
pub struct Field {
    pub label: Feature,
    pub value: Expr,
}

/// A bulk-optional field, `[pattern]: value`, optionally binding the
/// matched label to a pattern variable (`[X=string]: value`).
///
/// `filter` evaluates to a [`crate::kind::Kind`] (most commonly a
/// `BasicType`) or a concrete scalar; a candidate label matches when its
/// string form unifies with `filter`'s value.
#[derive(Debug, Clone)]
pub struct BulkField {
    pub binds_label: bool,
    pub filter: Expr,
    pub value: Expr,
}

/// A dynamic field, `"\(key_expr)": value` — the label itself is computed.
#[derive(Debug, Clone)]
pub struct DynamicField {
    pub key: Expr,
    pub value: Expr,
}

/// One declaration inside a [`StructLit`].
#[derive(Debug, Clone)]
pub enum Decl {
    Field(Field),
    OptionalField(Field),
    BulkOptional(BulkField),
    Dynamic(DynamicField),
    /// `...T`; `T` defaults to `Expr::Top` when absent from source (`...`).
    Ellipsis(Expr),
    /// An embedded expression (`spec.md` §4.2.1: "embeddings add their
    /// expression as an additional conjunct at `v` with a new embed
    /// close-info").
    Embedding(Expr),
    Let { id: crate::adt::expr::LetId, expr: Expr },
    Comprehension(Rc<Comprehension>),
}

/// A struct literal: an ordered list of declarations.
///
/// Field order is preserved (`spec.md` §5's ordering guarantee); `decls` is
/// iterated in declaration order both for conjunct processing and for the
/// debug printer.
#[derive(Debug, Clone, Default)]
pub struct StructLit {
    pub decls: Vec<Decl>,
}

impl StructLit {
    #[must_use]
    pub fn new(decls: Vec<Decl>) -> Self {
        Self { decls }
    }
}

/// A list literal: positional elements plus an optional open tail type.
#[derive(Debug, Clone, Default)]
pub struct ListLit {
    pub elems: Vec<Expr>,
    /// `Some(T)` for a terminal `...T` (open list); `None` for a closed list.
    pub ellipsis: Option<Expr>,
}
