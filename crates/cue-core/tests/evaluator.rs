//! End-to-end tests driving the public surface (`build` → `evaluate`/`unify`)
//! over hand-built ADT trees, the way an external frontend would.

use std::rc::Rc;

use bigdecimal::BigDecimal;
use cue_core::{
    adt::{
        clause::{Clause, Comprehension},
        decl::{BulkField, Decl, DynamicField, Field, ListLit, StructLit},
        expr::{CallOp, Disjunct, Expr, InterpPart, ScalarLit},
        vertex::Value,
    },
    compiler::{build, ParsedFile},
    errors::ErrorCode,
    eval::OpContext,
    feature::Feature,
    kind::Kind,
    resource::EvalConfig,
};

fn ctx() -> OpContext {
    OpContext::new(EvalConfig::default())
}

fn lbl(ctx: &mut OpContext, s: &str) -> Feature {
    Feature::string(ctx.interner.intern(s))
}

fn def_lbl(ctx: &mut OpContext, s: &str) -> Feature {
    Feature::definition(ctx.interner.intern(s))
}

fn num(n: i64) -> Expr {
    Expr::Literal(ScalarLit::Num(BigDecimal::from(n)))
}

fn str_lit(s: &str) -> Expr {
    Expr::Literal(ScalarLit::Str(s.into()))
}

fn fref(up: u16, label: Feature) -> Expr {
    Expr::FieldRef { up, label }
}

fn field(label: Feature, value: Expr) -> Decl {
    Decl::Field(Field { label, value })
}

fn build_root(ctx: &mut OpContext, decls: Vec<Decl>) -> cue_core::VertexId {
    let files = [ParsedFile { package: None, decls, tags: Vec::new() }];
    build(ctx, &files).root
}

fn disjunct(expr: Expr, marked_default: bool) -> Disjunct {
    Disjunct { expr, marked_default }
}

fn num_terms(v: &Value) -> Vec<i64> {
    let Value::Disjunction(terms) = v else { panic!("expected a disjunction, got {v:?}") };
    terms
        .iter()
        .map(|t| match t.value.as_ref() {
            Value::Num(n) => n.to_string().parse().unwrap(),
            other => panic!("expected a numeric disjunct, got {other:?}"),
        })
        .collect()
}

/// Regression test for the bug this evaluator shipped with: `dispatch_struct_lit`
/// must open a fresh environment frame per struct literal, or a sibling
/// reference one level in resolves against the wrong vertex.
#[test]
fn nested_struct_sibling_reference_resolves_within_its_own_scope() {
    let mut ctx = ctx();
    let a = lbl(&mut ctx, "a");
    let b = lbl(&mut ctx, "b");
    let c = lbl(&mut ctx, "c");
    let inner = StructLit::new(vec![field(b, num(1)), field(c, Expr::Binary(cue_core::adt::expr::Operator::Add, Box::new(fref(0, b)), Box::new(num(1))))]);
    let root = build_root(&mut ctx, vec![field(a, Expr::StructLit(Rc::new(inner)))]);

    cue_core::evaluate(&mut ctx, root).expect("root finalizes");
    let a_v = cue_core::lookup_path(&ctx, root, &[a]).unwrap();
    let c_v = cue_core::lookup_path(&ctx, a_v, &[c]).unwrap();
    let value = cue_core::evaluate(&mut ctx, c_v).expect("c finalizes");
    assert!(matches!(value, Value::Num(n) if n == BigDecimal::from(2)));
}

#[test]
fn bound_conjunction_narrows_to_a_single_admitted_value() {
    let mut ctx = ctx();
    let port_def = def_lbl(&mut ctx, "Port");
    let x = lbl(&mut ctx, "x");

    let bound_expr = Expr::unify(
        Expr::unify(Expr::BasicType(Kind::INT), Expr::Bound(cue_core::adt::expr::BoundOp::Ge, Box::new(num(1)))),
        Expr::Bound(cue_core::adt::expr::BoundOp::Le, Box::new(num(65535))),
    );
    let decls = vec![field(port_def, bound_expr), field(x, fref(0, port_def)), field(x, num(8080))];
    let root = build_root(&mut ctx, decls);

    cue_core::evaluate(&mut ctx, root).expect("8080 satisfies the bound");
    let x_v = cue_core::lookup_path(&ctx, root, &[x]).unwrap();
    let value = cue_core::evaluate(&mut ctx, x_v).unwrap();
    assert!(matches!(value, Value::Num(n) if n == BigDecimal::from(8080)));
}

#[test]
fn bound_conjunction_rejects_an_out_of_range_value() {
    let mut ctx = ctx();
    let port_def = def_lbl(&mut ctx, "Port");
    let x = lbl(&mut ctx, "x");
    let bound_expr = Expr::unify(Expr::BasicType(Kind::INT), Expr::Bound(cue_core::adt::expr::BoundOp::Le, Box::new(num(65535))));
    let decls = vec![field(port_def, bound_expr), field(x, fref(0, port_def)), field(x, num(70000))];
    let root = build_root(&mut ctx, decls);

    assert!(cue_core::evaluate(&mut ctx, root).is_err());
}

#[test]
fn closed_definition_rejects_an_undeclared_field() {
    let mut ctx = ctx();
    let person_def = def_lbl(&mut ctx, "Person");
    let name = lbl(&mut ctx, "name");
    let extra = lbl(&mut ctx, "extra");
    let p = lbl(&mut ctx, "p");

    let def_body = StructLit::new(vec![field(name, Expr::BasicType(Kind::STRING))]);
    let p_body = StructLit::new(vec![field(name, str_lit("a")), field(extra, Expr::Literal(ScalarLit::Bool(true)))]);
    let decls = vec![
        field(person_def, Expr::StructLit(Rc::new(def_body))),
        field(p, Expr::unify(fref(0, person_def), Expr::StructLit(Rc::new(p_body)))),
    ];
    let root = build_root(&mut ctx, decls);

    assert!(cue_core::evaluate(&mut ctx, root).is_err());
}

#[test]
fn disjunction_conjunction_keeps_only_the_common_terms() {
    let mut ctx = ctx();
    let d = lbl(&mut ctx, "d");
    let left = Expr::Disjunction(vec![disjunct(num(1), false), disjunct(num(2), false), disjunct(num(3), false)]);
    let right = Expr::Disjunction(vec![disjunct(num(2), false), disjunct(num(3), false), disjunct(num(4), false)]);
    let root = build_root(&mut ctx, vec![field(d, Expr::unify(left, right))]);

    cue_core::evaluate(&mut ctx, root).expect("2 and 3 both survive");
    let d_v = cue_core::lookup_path(&ctx, root, &[d]).unwrap();
    let value = cue_core::evaluate(&mut ctx, d_v).unwrap();
    let mut terms = num_terms(&value);
    terms.sort_unstable();
    assert_eq!(terms, vec![2, 3]);
}

#[test]
fn default_mark_does_not_survive_when_its_term_is_eliminated() {
    let mut ctx = ctx();
    let d = lbl(&mut ctx, "d");
    let left = Expr::Disjunction(vec![disjunct(num(1), true), disjunct(num(2), false), disjunct(num(3), false)]);
    let right = Expr::Disjunction(vec![disjunct(num(2), false), disjunct(num(3), false)]);
    let root = build_root(&mut ctx, vec![field(d, Expr::unify(left, right))]);

    cue_core::evaluate(&mut ctx, root).unwrap();
    let d_v = cue_core::lookup_path(&ctx, root, &[d]).unwrap();
    let value = cue_core::evaluate(&mut ctx, d_v).unwrap();
    let mut terms = num_terms(&value);
    terms.sort_unstable();
    assert_eq!(terms, vec![2, 3]);
    // Neither survivor was ever the marked default, so there's nothing for
    // `default` to pick out.
    assert_eq!(cue_core::default(&mut ctx, d_v), d_v);
}

#[test]
fn default_picks_out_the_marked_disjunct() {
    let mut ctx = ctx();
    let d = lbl(&mut ctx, "d");
    let value_expr = Expr::Disjunction(vec![disjunct(num(1), true), disjunct(num(2), false), disjunct(num(3), false)]);
    let root = build_root(&mut ctx, vec![field(d, value_expr)]);

    cue_core::evaluate(&mut ctx, root).unwrap();
    let d_v = cue_core::lookup_path(&ctx, root, &[d]).unwrap();
    let picked = cue_core::default(&mut ctx, d_v);
    assert!(matches!(ctx.vertex(picked).value(), Some(Value::Num(n)) if *n == BigDecimal::from(1)));
}

#[test]
fn comprehension_yields_a_field_per_iteration() {
    let mut ctx = ctx();
    let src = lbl(&mut ctx, "src");
    let out = lbl(&mut ctx, "out");
    let i = lbl(&mut ctx, "i");
    let v = lbl(&mut ctx, "v");

    let src_list = ListLit { elems: vec![str_lit("a"), str_lit("b")], ellipsis: None };
    let body = StructLit::new(vec![Decl::Dynamic(DynamicField {
        key: Expr::Interpolation(vec![InterpPart::Expr(Box::new(fref(1, v)))]),
        value: fref(1, i),
    })]);
    let comp = Comprehension {
        clauses: vec![Clause::For { key: Some(i), val: v, src: fref(1, src) }],
        value: Rc::new(body),
    };
    let out_body = StructLit::new(vec![Decl::Comprehension(Rc::new(comp))]);
    let decls = vec![field(src, Expr::ListLit(Rc::new(src_list))), field(out, Expr::StructLit(Rc::new(out_body)))];
    let root = build_root(&mut ctx, decls);

    cue_core::evaluate(&mut ctx, root).expect("the comprehension expands cleanly");
    let a_key = lbl(&mut ctx, "a");
    let b_key = lbl(&mut ctx, "b");
    let out_v = cue_core::lookup_path(&ctx, root, &[out]).unwrap();
    let a_v = cue_core::lookup_path(&ctx, out_v, &[a_key]).unwrap();
    let b_v = cue_core::lookup_path(&ctx, out_v, &[b_key]).unwrap();
    assert!(matches!(cue_core::evaluate(&mut ctx, a_v).unwrap(), Value::Num(n) if n == BigDecimal::from(0)));
    assert!(matches!(cue_core::evaluate(&mut ctx, b_v).unwrap(), Value::Num(n) if n == BigDecimal::from(1)));
}

#[test]
fn a_field_referencing_its_own_enclosing_struct_is_a_structural_cycle() {
    let mut ctx = ctx();
    let x = lbl(&mut ctx, "x");
    let a = lbl(&mut ctx, "a");
    let b = lbl(&mut ctx, "b");

    let body = StructLit::new(vec![
        field(a, num(1)),
        field(b, Expr::Binary(cue_core::adt::expr::Operator::Eq, Box::new(fref(1, x)), Box::new(fref(1, x)))),
    ]);
    let root = build_root(&mut ctx, vec![field(x, Expr::StructLit(Rc::new(body)))]);

    let err = cue_core::evaluate(&mut ctx, root).unwrap_err();
    assert_eq!(err.code, ErrorCode::Cycle);
}

#[test]
fn a_lone_self_referencing_disjunction_arm_is_dropped_as_a_structural_cycle() {
    // list: { head: _, tail: list | null } — tail's only surviving arm is
    // null, since the `list` arm re-enters `list`'s own arc expansion.
    let mut ctx = ctx();
    let list = lbl(&mut ctx, "list");
    let head = lbl(&mut ctx, "head");
    let tail = lbl(&mut ctx, "tail");

    let body = StructLit::new(vec![
        field(head, Expr::Top),
        field(
            tail,
            Expr::Disjunction(vec![disjunct(fref(1, list), false), disjunct(Expr::Literal(ScalarLit::Null), false)]),
        ),
    ]);
    let root = build_root(&mut ctx, vec![field(list, Expr::StructLit(Rc::new(body)))]);

    assert!(matches!(cue_core::evaluate(&mut ctx, root).unwrap(), Value::Struct));
    let list_v = cue_core::lookup_path(&ctx, root, &[list]).unwrap();
    let tail_v = cue_core::lookup_path(&ctx, list_v, &[tail]).unwrap();
    assert!(matches!(cue_core::evaluate(&mut ctx, tail_v).unwrap(), Value::Null));
}

#[test]
fn structural_cycle_breaking_terminates_self_referential_recursion_at_the_data_boundary() {
    // list: { head: 1, tail: { head: 2, tail: list | null } } — the outer
    // tail is the literal inner struct (not a disjunction at all), and the
    // innermost tail's `list` arm is dropped once no more literal data is
    // left to ground it, leaving `null` as the only surviving arm.
    let mut ctx = ctx();
    let list = lbl(&mut ctx, "list");
    let head = lbl(&mut ctx, "head");
    let tail = lbl(&mut ctx, "tail");

    let inner = StructLit::new(vec![
        field(head, num(2)),
        field(
            tail,
            Expr::Disjunction(vec![disjunct(fref(2, list), false), disjunct(Expr::Literal(ScalarLit::Null), false)]),
        ),
    ]);
    let body = StructLit::new(vec![field(head, num(1)), field(tail, Expr::StructLit(Rc::new(inner)))]);
    let root = build_root(&mut ctx, vec![field(list, Expr::StructLit(Rc::new(body)))]);

    assert!(matches!(cue_core::evaluate(&mut ctx, root).unwrap(), Value::Struct));

    let list_v = cue_core::lookup_path(&ctx, root, &[list]).unwrap();
    let outer_tail_v = cue_core::lookup_path(&ctx, list_v, &[tail]).unwrap();
    let inner_head_v = cue_core::lookup_path(&ctx, outer_tail_v, &[head]).unwrap();
    let inner_tail_v = cue_core::lookup_path(&ctx, outer_tail_v, &[tail]).unwrap();

    assert!(matches!(cue_core::evaluate(&mut ctx, inner_head_v).unwrap(), Value::Num(n) if n == BigDecimal::from(2)));
    assert!(matches!(cue_core::evaluate(&mut ctx, inner_tail_v).unwrap(), Value::Null));
}

#[test]
fn bulk_pattern_rejects_a_field_of_the_wrong_type() {
    let mut ctx = ctx();
    let y = lbl(&mut ctx, "y");
    let a = lbl(&mut ctx, "a");

    let body = StructLit::new(vec![
        Decl::BulkOptional(BulkField { binds_label: false, filter: Expr::BasicType(Kind::STRING), value: Expr::BasicType(Kind::INT) }),
        field(a, str_lit("x")),
    ]);
    let root = build_root(&mut ctx, vec![field(y, Expr::StructLit(Rc::new(body)))]);

    assert!(cue_core::evaluate(&mut ctx, root).is_err());
}

#[test]
fn chained_field_references_resolve_in_declaration_order() {
    let mut ctx = ctx();
    let a = lbl(&mut ctx, "a");
    let b = lbl(&mut ctx, "b");
    let c = lbl(&mut ctx, "c");
    let decls = vec![
        field(a, num(5)),
        field(b, Expr::Binary(cue_core::adt::expr::Operator::Add, Box::new(fref(0, a)), Box::new(num(1)))),
        field(c, Expr::Binary(cue_core::adt::expr::Operator::Add, Box::new(fref(0, b)), Box::new(num(1)))),
    ];
    let root = build_root(&mut ctx, decls);

    cue_core::evaluate(&mut ctx, root).unwrap();
    let b_v = cue_core::lookup_path(&ctx, root, &[b]).unwrap();
    let c_v = cue_core::lookup_path(&ctx, root, &[c]).unwrap();
    assert!(matches!(cue_core::evaluate(&mut ctx, b_v).unwrap(), Value::Num(n) if n == BigDecimal::from(6)));
    assert!(matches!(cue_core::evaluate(&mut ctx, c_v).unwrap(), Value::Num(n) if n == BigDecimal::from(7)));
}

#[test]
fn empty_struct_finalizes_to_a_struct_value() {
    let mut ctx = ctx();
    let root = build_root(&mut ctx, Vec::new());
    let value = cue_core::evaluate(&mut ctx, root).unwrap();
    assert!(matches!(value, Value::Struct));
}

#[test]
fn close_builtin_admits_its_own_declared_fields() {
    let mut ctx = ctx();
    let y = lbl(&mut ctx, "y");
    let a = lbl(&mut ctx, "a");

    let closed_body = StructLit::new(vec![field(a, Expr::BasicType(Kind::INT))]);
    let matching_body = StructLit::new(vec![field(a, num(1))]);
    let decls = vec![
        field(y, Expr::Call(CallOp::Close, vec![Expr::StructLit(Rc::new(closed_body))])),
        field(y, Expr::StructLit(Rc::new(matching_body))),
    ];
    let root = build_root(&mut ctx, decls);

    cue_core::evaluate(&mut ctx, root).expect("a: 1 matches the closed field set");
    let y_v = cue_core::lookup_path(&ctx, root, &[y]).unwrap();
    let a_v = cue_core::lookup_path(&ctx, y_v, &[a]).unwrap();
    assert!(matches!(cue_core::evaluate(&mut ctx, a_v).unwrap(), Value::Num(n) if n == BigDecimal::from(1)));
}
