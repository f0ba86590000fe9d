//! A deterministic printer for ADT expressions and evaluated vertices
//! (`spec.md` §4.3).
//!
//! Pure functions over `&Expr`/`&Vertex` (via [`OpContext`]/[`Interner`]);
//! no I/O, no hidden state. This is the ground truth golden-file format for
//! the test suite, not a runtime-load-bearing component, so it favors a
//! simple, stable shape over a pretty one: structs and lists print their
//! arcs in insertion order (never `IndexMap`'s hash order — it doesn't have
//! one — but stated explicitly because a future arc container swap must
//! preserve this), and unresolved references escape as `⟨up;label⟩` to make
//! binding depth visible.

use std::fmt::Write as _;

use crate::{
    adt::{
        decl::Decl,
        expr::{BoundOp, CallOp, Expr, InterpPart, Operator, ScalarLit, UnaryOp},
        vertex::{BoundValue, DefaultMark, DisjunctTerm, Value, VertexId},
    },
    eval::OpContext,
    feature::{Feature, FeatureKind, Interner},
};

/// Prints `v`'s currently settled value, descending into struct/list arcs
/// in insertion order.
#[must_use]
pub fn print_vertex(ctx: &OpContext, v: VertexId) -> String {
    let mut out = String::new();
    write_vertex(ctx, v, &mut out);
    out
}

/// Prints a raw (unevaluated) ADT expression, escaping lexical references
/// as `⟨up;label⟩`.
#[must_use]
pub fn print_expr(interner: &Interner, e: &Expr) -> String {
    let mut out = String::new();
    write_expr(interner, e, &mut out);
    out
}

fn write_vertex(ctx: &OpContext, v: VertexId, out: &mut String) {
    let vx = ctx.vertex(v);
    match vx.value() {
        None => out.push('_'),
        Some(Value::Struct) => write_struct_arcs(ctx, v, out),
        Some(Value::List { open }) => write_list_arcs(ctx, v, *open, out),
        Some(value) => write_value(&ctx.interner, value, out),
    }
}

fn write_struct_arcs(ctx: &OpContext, v: VertexId, out: &mut String) {
    out.push('{');
    let vx = ctx.vertex(v);
    let mut first = true;
    for (label, child) in &vx.arcs {
        if !first {
            out.push_str(", ");
        }
        first = false;
        write_label(&ctx.interner, *label, out);
        if vx.is_optional(*label) {
            out.push('?');
        }
        out.push_str(": ");
        write_vertex(ctx, *child, out);
    }
    out.push('}');
}

fn write_list_arcs(ctx: &OpContext, v: VertexId, open: bool, out: &mut String) {
    out.push('[');
    let vx = ctx.vertex(v);
    let mut first = true;
    for (_, child) in &vx.arcs {
        if !first {
            out.push_str(", ");
        }
        first = false;
        write_vertex(ctx, *child, out);
    }
    if open {
        if !first {
            out.push_str(", ");
        }
        out.push_str("...");
    }
    out.push(']');
}

fn write_label(interner: &Interner, f: Feature, out: &mut String) {
    match f.kind() {
        FeatureKind::Int => {
            let _ = write!(out, "{}", f.int_value().unwrap_or_default());
        }
        FeatureKind::String => out.push_str(&quote_if_needed(interner.resolve(f.string_id().expect("string feature")))),
        FeatureKind::Definition => {
            out.push('#');
            out.push_str(interner.resolve(f.string_id().expect("definition feature")));
        }
        FeatureKind::Hidden => {
            out.push('_');
            out.push_str(interner.resolve(f.string_id().expect("hidden feature")));
        }
        FeatureKind::HiddenDefinition => {
            out.push_str("#_");
            out.push_str(interner.resolve(f.string_id().expect("hidden-definition feature")));
        }
        FeatureKind::Invalid => out.push_str("<invalid>"),
    }
}

fn is_bare_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn quote_if_needed(s: &str) -> String {
    if is_bare_ident(s) {
        s.to_string()
    } else {
        format!("{s:?}")
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

fn write_scalar_lit(lit: &ScalarLit, out: &mut String) {
    match lit {
        ScalarLit::Null => out.push_str("null"),
        ScalarLit::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        ScalarLit::Num(n) => {
            let _ = write!(out, "{n}");
        }
        ScalarLit::Str(s) => {
            let _ = write!(out, "{s:?}");
        }
        ScalarLit::Bytes(b) => {
            let _ = write!(out, "'{}'", hex_string(b));
        }
    }
}

fn bound_op_symbol(op: BoundOp) -> &'static str {
    match op {
        BoundOp::Lt => "<",
        BoundOp::Le => "<=",
        BoundOp::Gt => ">",
        BoundOp::Ge => ">=",
        BoundOp::Ne => "!=",
        BoundOp::Matches => "=~",
        BoundOp::NotMatches => "!~",
    }
}

fn write_bound_values(bounds: &[BoundValue], out: &mut String) {
    for (i, b) in bounds.iter().enumerate() {
        if i > 0 {
            out.push_str(" & ");
        }
        out.push_str(bound_op_symbol(b.op));
        write_scalar_lit(&b.operand, out);
    }
}

fn write_disjunct_terms(interner: &Interner, terms: &[DisjunctTerm], out: &mut String) {
    for (i, t) in terms.iter().enumerate() {
        if i > 0 {
            out.push_str(" | ");
        }
        if t.default == DefaultMark::IsDefault {
            out.push('*');
        }
        write_value(interner, &t.value, out);
    }
}

/// Prints a `Value` with no vertex context. `Struct`/`List` carry no arc
/// data of their own (it lives on the owning `Vertex`), so they print as
/// bare markers here — this path is only reached for disjunction terms and
/// bound operands, which are never struct/list-shaped in practice.
fn write_value(interner: &Interner, value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Num(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Str(s) => {
            let _ = write!(out, "{s:?}");
        }
        Value::Bytes(b) => {
            let _ = write!(out, "'{}'", hex_string(b));
        }
        Value::Bound(bounds) => write_bound_values(bounds, out),
        Value::Struct => out.push_str("{...}"),
        Value::List { open } => out.push_str(if *open { "[...]" } else { "[]" }),
        Value::Top => out.push('_'),
        Value::BasicType(k) => {
            let _ = write!(out, "{k}");
        }
        Value::Disjunction(terms) => write_disjunct_terms(interner, terms, out),
        Value::Bottom(b) => {
            let _ = write!(out, "_|_({b})");
        }
    }
}

fn operator_symbol(op: Operator) -> &'static str {
    match op {
        Operator::Add => "+",
        Operator::Sub => "-",
        Operator::Mul => "*",
        Operator::Div => "/",
        Operator::Quo => "quo",
        Operator::Rem => "rem",
        Operator::DivEuclid => "div",
        Operator::ModEuclid => "mod",
        Operator::Eq => "==",
        Operator::Ne => "!=",
        Operator::Lt => "<",
        Operator::Le => "<=",
        Operator::Gt => ">",
        Operator::Ge => ">=",
        Operator::Matches => "=~",
        Operator::NotMatches => "!~",
        Operator::Unify => "&",
        Operator::Disjunct => "|",
    }
}

fn unary_op_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Plus => "+",
        UnaryOp::Not => "!",
    }
}

fn write_expr(interner: &Interner, e: &Expr, out: &mut String) {
    match e {
        Expr::Literal(lit) => write_scalar_lit(lit, out),
        Expr::Top => out.push('_'),
        Expr::Bottom(None) => out.push_str("_|_"),
        Expr::Bottom(Some(msg)) => {
            let _ = write!(out, "_|_({msg:?})");
        }
        Expr::BasicType(k) => {
            let _ = write!(out, "{k}");
        }
        Expr::Bound(op, operand) => {
            out.push_str(bound_op_symbol(*op));
            write_expr(interner, operand, out);
        }
        Expr::StructLit(sl) => {
            out.push('{');
            for (i, decl) in sl.decls.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_decl(interner, decl, out);
            }
            out.push('}');
        }
        Expr::ListLit(ll) => {
            out.push('[');
            for (i, elem) in ll.elems.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(interner, elem, out);
            }
            if let Some(tail) = &ll.ellipsis {
                if !ll.elems.is_empty() {
                    out.push_str(", ");
                }
                out.push_str("...");
                write_expr(interner, tail, out);
            }
            out.push(']');
        }
        Expr::Binary(op, a, b) => {
            write_expr(interner, a, out);
            let _ = write!(out, " {} ", operator_symbol(*op));
            write_expr(interner, b, out);
        }
        Expr::Unary(op, inner) => {
            out.push_str(unary_op_symbol(*op));
            write_expr(interner, inner, out);
        }
        Expr::Call(CallOp::Close, args) => {
            out.push_str("close(");
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(interner, a, out);
            }
            out.push(')');
        }
        Expr::Selector(base, label) => {
            write_expr(interner, base, out);
            out.push('.');
            write_label(interner, *label, out);
        }
        Expr::Index(base, idx) => {
            write_expr(interner, base, out);
            out.push('[');
            write_expr(interner, idx, out);
            out.push(']');
        }
        Expr::Slice(base, lo, hi) => {
            write_expr(interner, base, out);
            out.push('[');
            if let Some(lo) = lo {
                write_expr(interner, lo, out);
            }
            out.push(':');
            if let Some(hi) = hi {
                write_expr(interner, hi, out);
            }
            out.push(']');
        }
        Expr::Interpolation(parts) => {
            out.push('"');
            for part in parts {
                match part {
                    InterpPart::Str(s) => out.push_str(s),
                    InterpPart::Expr(e) => {
                        out.push_str("\\(");
                        write_expr(interner, e, out);
                        out.push(')');
                    }
                }
            }
            out.push('"');
        }
        Expr::Disjunction(arms) => {
            for (i, arm) in arms.iter().enumerate() {
                if i > 0 {
                    out.push_str(" | ");
                }
                if arm.marked_default {
                    out.push('*');
                }
                write_expr(interner, &arm.expr, out);
            }
        }
        Expr::Comprehension(_) => out.push_str("<comprehension>"),
        Expr::FieldRef { up, label } => {
            out.push('⟨');
            let _ = write!(out, "{up};");
            write_label(interner, *label, out);
            out.push('⟩');
        }
        Expr::LabelRef { up } => {
            let _ = write!(out, "⟨{up};$label⟩");
        }
        Expr::DynamicRef { up, expr } => {
            let _ = write!(out, "⟨{up};(");
            write_expr(interner, expr, out);
            out.push_str(")⟩");
        }
        Expr::ImportRef(label) => {
            out.push_str("import(");
            write_label(interner, *label, out);
            out.push(')');
        }
        Expr::LetRef { up, id } => {
            let _ = write!(out, "⟨{up};let{}⟩", id.0);
        }
    }
}

fn write_decl(interner: &Interner, decl: &Decl, out: &mut String) {
    match decl {
        Decl::Field(f) => {
            write_label(interner, f.label, out);
            out.push_str(": ");
            write_expr(interner, &f.value, out);
        }
        Decl::OptionalField(f) => {
            write_label(interner, f.label, out);
            out.push_str("?: ");
            write_expr(interner, &f.value, out);
        }
        Decl::BulkOptional(bf) => {
            out.push('[');
            if bf.binds_label {
                out.push_str("X=");
            }
            write_expr(interner, &bf.filter, out);
            out.push_str("]: ");
            write_expr(interner, &bf.value, out);
        }
        Decl::Dynamic(df) => {
            out.push_str("(\\(");
            write_expr(interner, &df.key, out);
            out.push_str(")): ");
            write_expr(interner, &df.value, out);
        }
        Decl::Ellipsis(ty) => {
            out.push_str("...");
            if !matches!(ty, Expr::Top) {
                write_expr(interner, ty, out);
            }
        }
        Decl::Embedding(e) => write_expr(interner, e, out),
        Decl::Let { id, expr } => {
            let _ = write!(out, "let L{} = ", id.0);
            write_expr(interner, expr, out);
        }
        Decl::Comprehension(_) => out.push_str("<comprehension>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adt::{conjunct::CloseInfo, decl::Field, env::EnvFrame},
        resource::EvalConfig,
    };
    use bigdecimal::BigDecimal;

    #[test]
    fn prints_struct_in_insertion_order() {
        let mut ctx = OpContext::new(EvalConfig::default());
        let root = ctx.alloc_vertex(None, Feature::INVALID);
        let env = ctx.alloc_env(EnvFrame::root(root));
        let node = ctx.vertex_mut(root).closed.alloc_node();
        let a = Feature::string(ctx.interner.intern("a"));
        let b = Feature::string(ctx.interner.intern("b"));
        let sl = std::rc::Rc::new(crate::adt::decl::StructLit::new(vec![
            Decl::Field(Field { label: a, value: Expr::Literal(ScalarLit::Num(BigDecimal::from(1))) }),
            Decl::Field(Field { label: b, value: Expr::Literal(ScalarLit::Num(BigDecimal::from(2))) }),
        ]));
        ctx.vertex_mut(root)
            .push_conjunct(crate::adt::conjunct::Conjunct::new(env, std::rc::Rc::new(Expr::StructLit(sl)), CloseInfo::new(node)));
        crate::eval::unify(&mut ctx, root, crate::eval::TargetStatus::Finalized).unwrap();
        assert_eq!(print_vertex(&ctx, root), "{a: 1, b: 2}");
    }

    #[test]
    fn escapes_field_reference() {
        let mut interner = Interner::new();
        let label = Feature::string(interner.intern("x"));
        let expr = Expr::FieldRef { up: 1, label };
        assert_eq!(print_expr(&interner, &expr), "⟨1;x⟩");
    }

    #[test]
    fn quotes_labels_needing_escaping(){
        let mut interner = Interner::new();
        let label = Feature::string(interner.intern("has space"));
        let mut out = String::new();
        write_label(&interner, label, &mut out);
        assert_eq!(out, "\"has space\"");
    }
}
