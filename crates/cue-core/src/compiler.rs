//! Lowering pre-resolved declarations into a seeded root vertex
//! (`spec.md` §4.1).
//!
//! There is no concrete-syntax parser in this crate (`spec.md` §1 places
//! parsing out of scope), so the `Decl`/`Expr` trees arriving here already
//! carry resolved `FieldRef`/`LabelRef`/`DynamicRef`/`ImportRef`/`LetRef`
//! nodes — the external frontend that produced them is the thing doing
//! "identifier resolution by binding, not by name". What is left for this
//! module is (1) assembling one package's files into a single seed conjunct
//! on a fresh root vertex and environment, (2) the predeclared-identifier
//! table a frontend would otherwise have to invent for itself, and (3)
//! collecting `@tag` attributes into a lookup table an external
//! command-line step can use to conjoin a concrete value later.

use std::rc::Rc;

use ahash::AHashMap;
use bigdecimal::BigDecimal;

use crate::{
    adt::{
        conjunct::{CloseInfo, Conjunct},
        decl::{Decl, StructLit},
        env::EnvFrame,
        expr::{BoundOp, Expr, ScalarLit},
        vertex::VertexId,
    },
    eval::OpContext,
    feature::Feature,
    kind::Kind,
};

/// A raw `@tag(name, type=..., short=...)` attribute collected during
/// [`build`], keyed by the label of the field it annotates (`spec.md`
/// §4.1's "Tag injection").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: Box<str>,
    pub body: Box<str>,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<Box<str>>, body: impl Into<Box<str>>) -> Self {
        Self { name: name.into(), body: body.into() }
    }
}

/// One package file's worth of already-resolved declarations, the unit
/// [`build`] consumes (`spec.md` §4.1's "Inputs": "a sequence of parsed
/// file trees, each a list of declarations").
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub package: Option<Feature>,
    pub decls: Vec<Decl>,
    pub tags: Vec<(Feature, Attribute)>,
}

/// The result of [`build`]: a seeded root vertex plus the tag table
/// collected across every file.
pub struct BuildOutput {
    pub root: VertexId,
    pub tags: AHashMap<Feature, Vec<Attribute>>,
}

/// Concatenates every file's decls into one `StructLit`, in file order, and
/// seeds a fresh root vertex with it as its sole conjunct (`spec.md` §4.1's
/// "Outputs": "a root Vertex whose Conjuncts reference a single `StructLit`
/// formed by concatenating the decls of all files in the package, plus an
/// environment chain rooted at the package scope").
///
/// Ring registration and field dispatch happen later, the first time
/// [`crate::eval::unify`] processes this conjunct — `build` only seeds the
/// vertex, it does not evaluate it.
pub fn build(ctx: &mut OpContext, files: &[ParsedFile]) -> BuildOutput {
    let mut decls = Vec::new();
    let mut tags: AHashMap<Feature, Vec<Attribute>> = AHashMap::new();
    for file in files {
        decls.extend(file.decls.iter().cloned());
        for (label, attr) in &file.tags {
            tags.entry(*label).or_default().push(attr.clone());
        }
    }

    let root = ctx.alloc_vertex(None, Feature::INVALID);
    let root_env = ctx.alloc_env(EnvFrame::root(root));
    let node = ctx.vertex_mut(root).closed.alloc_node();
    let sl = Rc::new(StructLit::new(decls));
    ctx.vertex_mut(root)
        .push_conjunct(Conjunct::new(root_env, Rc::new(Expr::StructLit(sl)), CloseInfo::new(node)));

    BuildOutput { root, tags }
}

fn bound(op: BoundOp, n: BigDecimal) -> Expr {
    Expr::Bound(op, Box::new(Expr::Literal(ScalarLit::Num(n))))
}

/// Builds `int & >=lo [& <=hi]`, the shape every sized integer predeclared
/// identifier resolves to (`spec.md` §4.1's "Sized integer identifiers
/// resolve to a `BasicType` conjoined with a `BoundValue` range").
fn ranged_int(lo: Option<i64>, hi: Option<BigDecimal>) -> Expr {
    let mut e = Expr::BasicType(Kind::INT);
    if let Some(lo) = lo {
        e = Expr::unify(e, bound(BoundOp::Ge, BigDecimal::from(lo)));
    }
    if let Some(hi) = hi {
        e = Expr::unify(e, bound(BoundOp::Le, hi));
    }
    e
}

/// Resolves a predeclared identifier's source name to its ADT expression
/// (`spec.md` §4.1's predeclared-identifier bullet). An external frontend
/// calls this when lowering an identifier that is not bound in any lexical
/// scope it controls; this is the only place the crate hard-codes numeric
/// ranges (`SPEC_FULL.md` §4.1).
#[must_use]
pub fn predeclared(name: &str) -> Option<Expr> {
    Some(match name {
        "bool" => Expr::BasicType(Kind::BOOL),
        "int" => Expr::BasicType(Kind::INT),
        "float" | "float32" | "float64" => Expr::BasicType(Kind::FLOAT),
        "number" => Expr::BasicType(Kind::NUM),
        "string" => Expr::BasicType(Kind::STRING),
        "bytes" => Expr::BasicType(Kind::BYTES),
        "rune" => ranged_int(Some(0), Some(BigDecimal::from(0x0010_FFFFi64))),
        "uint" => ranged_int(Some(0), None),
        "int8" => ranged_int(Some(i64::from(i8::MIN)), Some(BigDecimal::from(i64::from(i8::MAX)))),
        "int16" => ranged_int(Some(i64::from(i16::MIN)), Some(BigDecimal::from(i64::from(i16::MAX)))),
        "int32" => ranged_int(Some(i64::from(i32::MIN)), Some(BigDecimal::from(i64::from(i32::MAX)))),
        "int64" => ranged_int(Some(i64::MIN), Some(BigDecimal::from(i64::MAX))),
        "uint8" => ranged_int(Some(0), Some(BigDecimal::from(i64::from(u8::MAX)))),
        "uint16" => ranged_int(Some(0), Some(BigDecimal::from(i64::from(u16::MAX)))),
        "uint32" => ranged_int(Some(0), Some(BigDecimal::from(i64::from(u32::MAX)))),
        "uint64" => ranged_int(Some(0), Some(BigDecimal::from(u64::MAX))),
        "_" => Expr::Top,
        "_|_" => Expr::Bottom(None),
        "null" => Expr::Literal(ScalarLit::Null),
        "true" => Expr::Literal(ScalarLit::Bool(true)),
        "false" => Expr::Literal(ScalarLit::Bool(false)),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adt::decl::Field,
        eval::{evaluate, unify, TargetStatus},
        resource::EvalConfig,
    };

    fn field(ctx: &mut OpContext, label: &str, value: Expr) -> Decl {
        Decl::Field(Field { label: Feature::string(ctx.interner.intern(label)), value })
    }

    #[test]
    fn build_concatenates_files_in_order() {
        let mut ctx = OpContext::new(EvalConfig::default());
        let a = field(&mut ctx, "a", Expr::Literal(ScalarLit::Num(BigDecimal::from(1))));
        let b = field(&mut ctx, "b", Expr::Literal(ScalarLit::Num(BigDecimal::from(2))));
        let files = [
            ParsedFile { package: None, decls: vec![a], tags: Vec::new() },
            ParsedFile { package: None, decls: vec![b], tags: Vec::new() },
        ];
        let out = build(&mut ctx, &files);
        unify(&mut ctx, out.root, TargetStatus::Finalized).unwrap();
        assert_eq!(ctx.vertex(out.root).arcs.len(), 2);
    }

    #[test]
    fn build_collects_tags_by_label() {
        let mut ctx = OpContext::new(EvalConfig::default());
        let label = Feature::string(ctx.interner.intern("env"));
        let files = [ParsedFile {
            package: None,
            decls: Vec::new(),
            tags: vec![(label, Attribute::new("tag", "env,type=string"))],
        }];
        let out = build(&mut ctx, &files);
        assert_eq!(out.tags.get(&label).map(Vec::len), Some(1));
    }

    #[test]
    fn int8_range_rejects_out_of_range_literal() {
        let mut ctx = OpContext::new(EvalConfig::default());
        let expr = predeclared("int8").expect("int8 is predeclared");
        let decls = vec![
            field(&mut ctx, "x", expr),
            field(&mut ctx, "x", Expr::Literal(ScalarLit::Num(BigDecimal::from(200)))),
        ];
        let files = [ParsedFile { package: None, decls, tags: Vec::new() }];
        let out = build(&mut ctx, &files);
        assert!(evaluate(&mut ctx, out.root).is_err());
    }

    #[test]
    fn uint_has_no_upper_bound() {
        assert!(matches!(predeclared("uint"), Some(Expr::Binary(..))));
    }

    #[test]
    fn unknown_identifier_is_not_predeclared() {
        assert!(predeclared("totallyNotAKeyword").is_none());
    }
}
