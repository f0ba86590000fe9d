//! The public surface external collaborators (a parser, a data-file
//! encoder, a CLI) are meant to call (`spec.md` §6). Everything here is a
//! thin, documented facade over `eval`/`compiler`/`closed` — no new
//! evaluation logic lives in this module.

use crate::{
    adt::{
        conjunct::Conjunct,
        vertex::{DefaultMark, Value, VertexId},
    },
    errors::Bottom,
    eval::{evaluate, unify, OpContext, TargetStatus},
    feature::Feature,
    kind::Kind,
    resource::DEFAULT_MAX_ERROR_COUNT,
};

pub use crate::compiler::{build, predeclared, Attribute, BuildOutput, ParsedFile};

/// Descends `path` from `v` without creating arcs, returning `None` the
/// moment a label is absent (`spec.md` §6's `LookupPath`).
#[must_use]
pub fn lookup_path(ctx: &OpContext, v: VertexId, path: &[Feature]) -> Option<VertexId> {
    path.iter().try_fold(v, |cur, label| ctx.vertex(cur).arcs.get(label).copied())
}

/// Settings controlling [`validate`]'s concreteness walk (`spec.md` §6's
/// `Validate(v, cfg)`).
#[derive(Debug, Clone, Copy)]
pub struct ValidateConfig {
    pub require_concrete: bool,
    pub allow_definitions: bool,
    pub allow_hidden: bool,
    pub max_error_count: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            require_concrete: false,
            allow_definitions: true,
            allow_hidden: true,
            max_error_count: DEFAULT_MAX_ERROR_COUNT,
        }
    }
}

/// Finalizes `v` and every descendant, collecting up to `cfg.max_error_count`
/// failures into one aggregated `Bottom` (`spec.md` §7's aggregation policy),
/// or `None` if the tree validates cleanly under `cfg`.
#[must_use]
pub fn validate(ctx: &mut OpContext, v: VertexId, cfg: &ValidateConfig) -> Option<Bottom> {
    let mut errors = Vec::new();
    validate_rec(ctx, v, cfg, &mut errors);
    crate::errors::summarize(errors).into_iter().reduce(Bottom::combine)
}

fn validate_rec(ctx: &mut OpContext, v: VertexId, cfg: &ValidateConfig, errors: &mut Vec<Bottom>) {
    if errors.len() >= cfg.max_error_count {
        return;
    }
    if let Err(e) = unify(ctx, v, TargetStatus::Finalized) {
        errors.push(e);
    }
    if cfg.require_concrete {
        if let Some(value) = ctx.vertex(v).value().cloned() {
            if !value.is_concrete() && !matches!(value, Value::Struct | Value::List { .. }) {
                errors.push(Bottom::incomplete("value is not concrete"));
            }
        }
    }
    let arcs: Vec<(Feature, VertexId)> = ctx.vertex(v).arcs.iter().map(|(f, id)| (*f, *id)).collect();
    for (label, child) in arcs {
        if errors.len() >= cfg.max_error_count {
            return;
        }
        if label.kind().is_definition() && !cfg.allow_definitions {
            continue;
        }
        if label.kind().is_hidden() && !cfg.allow_hidden {
            continue;
        }
        validate_rec(ctx, child, cfg, errors);
    }
}

/// `spec.md` §6's closedness-admission API: is `feature` admissible on `v`
/// under its current canopy? Pass [`Feature::INVALID`] to probe overall
/// closedness without a concrete label.
#[must_use]
pub fn accept(ctx: &OpContext, v: VertexId, feature: Feature) -> bool {
    ctx.vertex(v).closed.admit(feature, &ctx.interner)
}

/// `v.Kind()`: `Top` for a vertex with no settled value yet.
#[must_use]
pub fn kind(ctx: &OpContext, v: VertexId) -> Kind {
    ctx.vertex(v).value().map_or(Kind::TOP, Value::kind)
}

/// `v.Arcs()`, in insertion order.
#[must_use]
pub fn arcs(ctx: &OpContext, v: VertexId) -> Vec<(Feature, VertexId)> {
    ctx.vertex(v).arcs.iter().map(|(f, id)| (*f, *id)).collect()
}

/// `v.Conjuncts()`.
#[must_use]
pub fn conjuncts(ctx: &OpContext, v: VertexId) -> &[Conjunct] {
    &ctx.vertex(v).conjuncts
}

/// `v.Default()`: if `v`'s value is a disjunction with exactly one disjunct
/// marked default, a fresh finalized vertex wrapping that disjunct's value;
/// otherwise `v` unchanged.
pub fn default(ctx: &mut OpContext, v: VertexId) -> VertexId {
    let Some(Value::Disjunction(terms)) = ctx.vertex(v).value().cloned() else {
        return v;
    };
    let mut defaults = terms.iter().filter(|t| t.default == DefaultMark::IsDefault);
    match (defaults.next(), defaults.next()) {
        (Some(only), None) => ctx.alloc_finalized((*only.value).clone()),
        _ => v,
    }
}

/// `v.IsClosed()`.
#[must_use]
pub fn is_closed(ctx: &OpContext, v: VertexId) -> bool {
    ctx.vertex(v).closed.is_closed()
}

/// `v.IsOptional(feature)`.
#[must_use]
pub fn is_optional(ctx: &OpContext, v: VertexId, feature: Feature) -> bool {
    ctx.vertex(v).is_optional(feature)
}

/// `v.Equals(other)`: deep equality over concrete fields (`spec.md` §4.2.2's
/// "`==` on structs/lists is deep-equality over concrete fields").
#[must_use]
pub fn equals(ctx: &OpContext, a: VertexId, b: VertexId) -> bool {
    match (ctx.vertex(a).value(), ctx.vertex(b).value()) {
        (Some(Value::Struct), Some(Value::Struct)) => {
            let arcs_a = &ctx.vertex(a).arcs;
            let arcs_b = &ctx.vertex(b).arcs;
            arcs_a.len() == arcs_b.len()
                && arcs_a.iter().all(|(f, child_a)| arcs_b.get(f).is_some_and(|child_b| equals(ctx, *child_a, *child_b)))
        }
        (Some(Value::List { .. }), Some(Value::List { .. })) => {
            let elems_a: Vec<VertexId> = ctx.vertex(a).arcs.values().copied().collect();
            let elems_b: Vec<VertexId> = ctx.vertex(b).arcs.values().copied().collect();
            elems_a.len() == elems_b.len() && elems_a.iter().zip(&elems_b).all(|(x, y)| equals(ctx, *x, *y))
        }
        (Some(x), Some(y)) => scalar_equals(x, y),
        (None, None) => true,
        _ => false,
    }
}

fn scalar_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) | (Value::Top, Value::Top) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Num(x), Value::Num(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::BasicType(x), Value::BasicType(y)) => x == y,
        (Value::Bound(x), Value::Bound(y)) => x == y,
        (Value::Bottom(x), Value::Bottom(y)) => x == y,
        (Value::Disjunction(x), Value::Disjunction(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(tx, ty)| tx.default == ty.default && scalar_equals(&tx.value, &ty.value))
        }
        _ => false,
    }
}

/// `v.Source()`: always `None`. No concrete-syntax AST type is carried in
/// this crate (`spec.md` §1 places parsing out of scope), so there is no
/// `AstNode` to return — an external frontend that wants source positions on
/// errors attaches them to `Bottom::ErrorMessage.position` instead.
#[must_use]
pub fn source(_ctx: &OpContext, _v: VertexId) -> Option<()> {
    None
}

/// Re-exported so collaborators don't need to reach into `crate::eval`
/// directly for the two evaluation entry points named in `spec.md` §6.
pub use crate::eval::TargetStatus as Status;

pub fn drive(ctx: &mut OpContext, v: VertexId, status: Status) -> Result<(), Bottom> {
    unify(ctx, v, status)
}

pub fn finalize(ctx: &mut OpContext, v: VertexId) -> Result<Value, Bottom> {
    evaluate(ctx, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adt::decl::Field,
        compiler::{build, ParsedFile},
    };
    use bigdecimal::BigDecimal;

    fn string_field(ctx: &mut OpContext, label: &str, n: i64) -> Field {
        Field {
            label: Feature::string(ctx.interner.intern(label)),
            value: crate::adt::expr::Expr::Literal(crate::adt::expr::ScalarLit::Num(BigDecimal::from(n))),
        }
    }

    #[test]
    fn lookup_path_descends_without_creating_arcs() {
        let mut ctx = OpContext::new(crate::resource::EvalConfig::default());
        let a = string_field(&mut ctx, "a", 1);
        let files = [ParsedFile {
            package: None,
            decls: vec![crate::adt::decl::Decl::Field(a)],
            tags: Vec::new(),
        }];
        let out = build(&mut ctx, &files);
        finalize(&mut ctx, out.root).unwrap();
        let a_label = Feature::string(ctx.interner.intern("a"));
        assert!(lookup_path(&ctx, out.root, &[a_label]).is_some());
        let missing = Feature::string(ctx.interner.intern("zzz"));
        assert!(lookup_path(&ctx, out.root, &[missing]).is_none());
    }

    #[test]
    fn validate_aggregates_closedness_violations() {
        let mut ctx = OpContext::new(crate::resource::EvalConfig::default());
        let def_label = Feature::definition(ctx.interner.intern("Person"));
        let name = Feature::string(ctx.interner.intern("name"));
        let def_body = crate::adt::decl::StructLit::new(vec![crate::adt::decl::Decl::Field(Field {
            label: name,
            value: crate::adt::expr::Expr::BasicType(Kind::STRING),
        })]);
        let def = Field {
            label: def_label,
            value: crate::adt::expr::Expr::StructLit(std::rc::Rc::new(def_body)),
        };
        let extra = Feature::string(ctx.interner.intern("extra"));
        let p_body = crate::adt::decl::StructLit::new(vec![
            crate::adt::decl::Decl::Field(Field { label: name, value: crate::adt::expr::Expr::Literal(crate::adt::expr::ScalarLit::Str("a".into())) }),
            crate::adt::decl::Decl::Field(Field { label: extra, value: crate::adt::expr::Expr::Literal(crate::adt::expr::ScalarLit::Bool(true)) }),
        ]);
        let p = Field {
            label: Feature::string(ctx.interner.intern("p")),
            value: crate::adt::expr::Expr::unify(
                crate::adt::expr::Expr::FieldRef { up: 0, label: def_label },
                crate::adt::expr::Expr::StructLit(std::rc::Rc::new(p_body)),
            ),
        };
        let files = [ParsedFile {
            package: None,
            decls: vec![crate::adt::decl::Decl::Field(def), crate::adt::decl::Decl::Field(p)],
            tags: Vec::new(),
        }];
        let out = build(&mut ctx, &files);
        let result = validate(&mut ctx, out.root, &ValidateConfig::default());
        assert!(result.is_some());
    }

    #[test]
    fn equals_compares_concrete_structs_deeply() {
        let mut ctx = OpContext::new(crate::resource::EvalConfig::default());
        let a1 = string_field(&mut ctx, "a", 1);
        let a2 = string_field(&mut ctx, "a", 1);
        let f1 = build(&mut ctx, &[ParsedFile { package: None, decls: vec![crate::adt::decl::Decl::Field(a1)], tags: Vec::new() }]);
        let f2 = build(&mut ctx, &[ParsedFile { package: None, decls: vec![crate::adt::decl::Decl::Field(a2)], tags: Vec::new() }]);
        finalize(&mut ctx, f1.root).unwrap();
        finalize(&mut ctx, f2.root).unwrap();
        assert!(equals(&ctx, f1.root, f2.root));
    }
}
