//! Comprehension clauses (`spec.md` §3, §4.2.6).

use std::rc::Rc;

use crate::{
    adt::{decl::StructLit, expr::Expr},
    feature::Feature,
};

/// One clause in a comprehension's clause chain.
#[derive(Debug, Clone)]
pub enum Clause {
    /// `for k, v in src { … }`. `key` is `None` for the single-variable form
    /// `for v in src`.
    For {
        key: Option<Feature>,
        val: Feature,
        src: Expr,
    },
    /// `if cond { … }`.
    If { cond: Expr },
    /// `let x = expr`, memoized per environment.
    Let { id: crate::adt::expr::LetId, name: Feature, expr: Expr },
}

/// A full comprehension: a chain of clauses terminated by a value struct
/// (`spec.md` §3's "they yield zero or more sub-structs into the enclosing
/// vertex").
#[derive(Debug, Clone)]
pub struct Comprehension {
    pub clauses: Vec<Clause>,
    pub value: Rc<StructLit>,
}
