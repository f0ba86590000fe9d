//! Conjunct dispatch: classifying and expanding each conjunct on a vertex
//! (`spec.md` §4.2.1) and the top-level `Unify` entry point.

use std::rc::Rc;

use num_traits::ToPrimitive;

use crate::{
    adt::{
        conjunct::{CloseInfo, Conjunct},
        decl::{Decl, ListLit, StructLit},
        env::{EnvFrame, EnvId},
        expr::{CallOp, Expr, InterpPart, Operator},
        vertex::{BoundValue, Status, Value, VertexId},
    },
    errors::Bottom,
    eval::{arcs, binop, comprehension, disjunction, finalize, OpContext, TargetStatus},
    feature::Feature,
};

/// Drives `v` to at least `target` (`spec.md` §4.2's `Unify` contract).
///
/// Idempotent: calling it again on a vertex already at or past `target`
/// returns immediately. Re-dispatch only ever touches conjuncts still
/// marked undispatched (`Vertex::dispatched`), so repeated calls never
/// duplicate a struct's fields or a comprehension's output.
pub fn unify(ctx: &mut OpContext, v: VertexId, target: TargetStatus) -> Result<(), Bottom> {
    if target.satisfied_by(ctx.vertex(v).status) {
        return Ok(());
    }
    if crate::eval::cycle::is_reference_cycle(ctx.vertex(v).status) {
        return Err(Bottom::cycle("reference cycle: vertex re-entered while still Evaluating"));
    }
    drive(ctx, v, 0, target)
}

/// The body of [`unify`], minus its reference-cycle guard.
///
/// A disjunction arm trial (`eval::disjunction::defer`) re-dispatches its
/// own vertex from inside the `dispatch_pending` call already running on
/// it, to pick up the conjunct the arm just pushed — that is this call's
/// own nested step, not a reference looping back on itself, so the guard in
/// `unify` would reject every arm unconditionally if `defer` went through
/// the public entry point instead of this one.
///
/// `from` bounds the conjunct rescan to index `from..`: an ordinary call
/// (via `unify`) passes `0` to rescan everything undispatched, but a
/// disjunction arm trial passes the index of the conjunct the arm itself
/// just pushed, so the redrive never re-touches the disjunction conjunct
/// that triggered it — that conjunct's own dispatch is still on the call
/// stack below this one and isn't marked dispatched yet, so a rescan from
/// `0` would re-enter `disjunction::defer` on the same arms forever.
pub(crate) fn drive(ctx: &mut OpContext, v: VertexId, from: usize, target: TargetStatus) -> Result<(), Bottom> {
    if target.satisfied_by(ctx.vertex(v).status) {
        return Ok(());
    }

    let _guard = ctx.enter_depth()?;

    if ctx.vertex(v).status == Status::Unprocessed {
        ctx.vertex_mut(v).status = Status::Evaluating;
    }

    let dispatch_result = dispatch_pending(ctx, v, from);

    if ctx.vertex(v).status < Status::Partial {
        ctx.vertex_mut(v).status = Status::Partial;
    }

    if let Err(e) = &dispatch_result {
        if e.is_fatal() {
            attach_error(ctx, v, e.clone());
            return Err(e.clone());
        }
    }

    if matches!(target, TargetStatus::Partial) {
        return Ok(());
    }
    if let Err(e) = dispatch_result {
        return Err(e);
    }

    if ctx.vertex(v).status < Status::EvaluatingArcs {
        ctx.vertex_mut(v).status = Status::EvaluatingArcs;
    }
    if let Err(e) = arcs::evaluate_arcs(ctx, v) {
        if e.is_fatal() {
            attach_error(ctx, v, e.clone());
        }
        return Err(e);
    }

    if matches!(target, TargetStatus::EvaluatingArcs) {
        return Ok(());
    }

    finalize::try_finalize(ctx, v)
}

fn attach_error(ctx: &mut OpContext, v: VertexId, err: Bottom) {
    let vx = ctx.vertex_mut(v);
    let merged = match vx.value.take() {
        Some(Value::Bottom(existing)) => existing.combine(err),
        _ => err,
    };
    vx.value = Some(Value::Bottom(merged));
}

fn dispatch_pending(ctx: &mut OpContext, v: VertexId, from: usize) -> Result<(), Bottom> {
    let mut i = from;
    let mut incomplete: Option<Bottom> = None;
    loop {
        let len = ctx.vertex(v).conjuncts.len();
        if i >= len {
            break;
        }
        if ctx.vertex(v).dispatched[i] {
            i += 1;
            continue;
        }
        let conjunct = ctx.vertex(v).conjuncts[i].clone();
        match dispatch_one(ctx, v, &conjunct) {
            Ok(()) => ctx.vertex_mut(v).dispatched[i] = true,
            Err(e) if !e.is_fatal() => {
                incomplete = Some(match incomplete {
                    Some(acc) => acc.combine(e),
                    None => e,
                });
            }
            Err(e) => return Err(e),
        }
        i += 1;
    }
    incomplete.map_or(Ok(()), Err)
}

fn dispatch_one(ctx: &mut OpContext, v: VertexId, c: &Conjunct) -> Result<(), Bottom> {
    match c.expr.as_ref() {
        Expr::StructLit(sl) => dispatch_struct_lit(ctx, v, c.env, sl, c.close_info),
        Expr::ListLit(ll) => dispatch_list_lit(ctx, v, c.env, ll),
        Expr::Comprehension(comp) => comprehension::try_expand(ctx, v, c.env, comp, c.close_info),
        Expr::Binary(Operator::Unify, a, b) => {
            push_conjunct(ctx, v, c.env, Rc::new((**a).clone()), c.close_info);
            push_conjunct(ctx, v, c.env, Rc::new((**b).clone()), c.close_info);
            Ok(())
        }
        Expr::Disjunction(arms) => disjunction::defer(ctx, v, c.env, arms),
        Expr::Call(CallOp::Close, args) => {
            let inner = args.first().ok_or_else(|| Bottom::eval("close() requires one argument"))?.clone();
            let node = ctx.vertex_mut(v).closed.alloc_node();
            ctx.vertex_mut(v).closed.node_mut(node).is_closed_builtin = true;
            push_conjunct(ctx, v, c.env, Rc::new(inner), CloseInfo::new(node));
            Ok(())
        }
        Expr::FieldRef { .. }
        | Expr::LabelRef { .. }
        | Expr::DynamicRef { .. }
        | Expr::LetRef { .. }
        | Expr::ImportRef(_)
        | Expr::Selector(..)
        | Expr::Index(..) => dereference_clone(ctx, v, c.env, c.expr.as_ref(), c.close_info),
        other => {
            let value = eval_expr(ctx, c.env, other)?;
            unify_value_into(ctx, v, value)
        }
    }
}

pub(crate) fn push_conjunct(ctx: &mut OpContext, v: VertexId, env: EnvId, expr: Rc<Expr>, close_info: CloseInfo) {
    ctx.vertex_mut(v).push_conjunct(Conjunct::new(env, expr, close_info));
}

pub(crate) fn unify_value_into(ctx: &mut OpContext, v: VertexId, new_value: Value) -> Result<(), Bottom> {
    if let Value::Bottom(b) = &new_value {
        return Err(b.clone());
    }
    let merged = match ctx.vertex(v).value.clone() {
        None => new_value,
        Some(old) => binop::unify_values(old, new_value)?,
    };
    if let Value::Bottom(b) = &merged {
        return Err(b.clone());
    }
    ctx.vertex_mut(v).value = Some(merged);
    Ok(())
}

fn dispatch_struct_lit(
    ctx: &mut OpContext,
    v: VertexId,
    env: EnvId,
    sl: &Rc<StructLit>,
    close_info: CloseInfo,
) -> Result<(), Bottom> {
    unify_value_into(ctx, v, Value::Struct)?;
    ctx.vertex_mut(v).closed.register_ring(close_info.id);

    // Every StructLit opens its own scope: sibling fields resolve against
    // this frame at up=0, the enclosing scope at up=1 and beyond.
    let env = ctx.alloc_env(EnvFrame::child(env, v));

    for decl in &sl.decls {
        match decl {
            Decl::Field(f) => {
                if f.label.kind().participates_in_closedness() {
                    ctx.vertex_mut(v).closed.node_mut(close_info.id).fields.insert(f.label);
                    arcs::check_admitted(ctx, v, f.label)?;
                }
                let arc = arcs::get_or_create_arc(ctx, v, f.label);
                push_conjunct(ctx, arc, env, Rc::new(f.value.clone()), close_info);
            }
            Decl::OptionalField(f) => {
                if f.label.kind().participates_in_closedness() {
                    ctx.vertex_mut(v).closed.node_mut(close_info.id).fields.insert(f.label);
                }
                ctx.vertex_mut(v).optional_labels.push(f.label);
                if let Some(&arc) = ctx.vertex(v).arcs.get(&f.label) {
                    push_conjunct(ctx, arc, env, Rc::new(f.value.clone()), close_info);
                }
            }
            Decl::BulkOptional(bf) => {
                let filter = eval_expr(ctx, env, &bf.filter)?;
                ctx.vertex_mut(v).closed.node_mut(close_info.id).bulk_filters.push(filter.clone());
                ctx.vertex_mut(v)
                    .closed
                    .node_mut(close_info.id)
                    .bulk_rules
                    .push(crate::closed::BulkRule {
                        filter: filter.clone(),
                        value: Rc::new(bf.value.clone()),
                        env,
                        binds_label: bf.binds_label,
                    });
                arcs::apply_bulk_to_existing(ctx, v, env, &filter, bf, close_info)?;
            }
            Decl::Dynamic(df) => {
                let key = eval_expr(ctx, env, &df.key)?;
                let label = label_from_value(ctx, &key)?;
                if label.kind().participates_in_closedness() {
                    arcs::check_admitted(ctx, v, label)?;
                }
                let arc = arcs::get_or_create_arc(ctx, v, label);
                push_conjunct(ctx, arc, env, Rc::new(df.value.clone()), close_info);
            }
            Decl::Ellipsis(ty) => {
                ctx.vertex_mut(v).closed.node_mut(close_info.id).ellipsis_type = Some(Rc::new(ty.clone()));
                arcs::apply_ellipsis_to_existing(ctx, v, env, ty, close_info);
            }
            Decl::Embedding(e) => {
                let child = ctx.vertex_mut(v).closed.alloc_node();
                ctx.vertex_mut(v).closed.register_embed(close_info.id, child);
                push_conjunct(ctx, v, env, Rc::new(e.clone()), CloseInfo::new(child));
            }
            Decl::Let { id, expr } => {
                if ctx.env(env).lookup_let(*id).is_none() {
                    let let_vertex = ctx.alloc_vertex(Some(v), Feature::INVALID);
                    push_conjunct(ctx, let_vertex, env, Rc::new(expr.clone()), close_info);
                    ctx.env_mut(env).memoize_let(*id, let_vertex);
                }
            }
            Decl::Comprehension(comp) => {
                push_conjunct(ctx, v, env, Rc::new(Expr::Comprehension(comp.clone())), close_info);
            }
        }
    }
    Ok(())
}

fn dispatch_list_lit(ctx: &mut OpContext, v: VertexId, env: EnvId, ll: &Rc<ListLit>) -> Result<(), Bottom> {
    let open = ll.ellipsis.is_some();
    unify_value_into(ctx, v, Value::List { open })?;
    for (i, elem) in ll.elems.iter().enumerate() {
        let index = i64::try_from(i).expect("list index fits i64");
        let label = Feature::int(index).ok_or_else(|| Bottom::eval("list too long to index"))?;
        let node = ctx.vertex_mut(v).closed.alloc_node();
        let arc = arcs::get_or_create_arc(ctx, v, label);
        push_conjunct(ctx, arc, env, Rc::new(elem.clone()), CloseInfo::new(node));
    }
    Ok(())
}

fn label_from_value(ctx: &mut OpContext, value: &Value) -> Result<Feature, Bottom> {
    match value {
        Value::Str(s) => Ok(Feature::string(ctx.interner.intern(s))),
        _ => Err(Bottom::eval("dynamic field key must evaluate to a string")),
    }
}

fn index_from_value(value: &Value) -> Result<i64, Bottom> {
    match value {
        Value::Num(n) if n.is_integer() => n.to_i64().ok_or_else(|| Bottom::eval("index out of range")),
        _ => Err(Bottom::eval("index must evaluate to an integer")),
    }
}

/// Evaluates a value-producing expression in `env` (`spec.md` §4.2.1's
/// "unary/binary/slice/interpolation/call... applies the operator at the
/// value level" bullet, plus the scalar cases of every other expr kind).
pub(crate) fn eval_expr(ctx: &mut OpContext, env: EnvId, expr: &Expr) -> Result<Value, Bottom> {
    match expr {
        Expr::Literal(lit) => Ok(binop::scalar_to_value(lit.clone())),
        Expr::Top => Ok(Value::Top),
        Expr::Bottom(msg) => Ok(Value::Bottom(match msg {
            Some(m) => Bottom::user(m.to_string()),
            None => Bottom::eval("explicit bottom"),
        })),
        Expr::BasicType(k) => Ok(Value::BasicType(*k)),
        Expr::Bound(op, operand) => {
            let value = eval_expr(ctx, env, operand)?;
            let lit = binop::value_to_scalar_lit(&value).ok_or_else(|| Bottom::eval("bound operand must be a scalar"))?;
            Ok(Value::Bound(vec![BoundValue { op: *op, operand: lit }]))
        }
        Expr::Unary(op, inner) => {
            let value = eval_expr(ctx, env, inner)?;
            binop::eval_unary(*op, value)
        }
        Expr::Binary(op, a, b) => {
            let va = eval_expr(ctx, env, a)?;
            let vb = eval_expr(ctx, env, b)?;
            binop::eval_binary(ctx, *op, va, vb)
        }
        Expr::Call(CallOp::Close, args) => {
            let inner = args.first().ok_or_else(|| Bottom::eval("close() requires one argument"))?;
            eval_expr(ctx, env, inner)
        }
        Expr::Interpolation(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    InterpPart::Str(s) => out.push_str(s),
                    InterpPart::Expr(e) => {
                        let v = eval_expr(ctx, env, e)?;
                        out.push_str(&binop::stringify(&v)?);
                    }
                }
            }
            Ok(Value::Str(out.into_boxed_str()))
        }
        Expr::Disjunction(arms) => disjunction::eval_nested(ctx, env, arms),
        Expr::StructLit(sl) => eval_nested_struct(ctx, env, sl),
        Expr::ListLit(ll) => eval_nested_list(ctx, env, ll),
        Expr::Comprehension(_) => Err(Bottom::eval("comprehension cannot appear in value position")),
        Expr::Slice(base, lo, hi) => eval_slice(ctx, env, base, lo.as_deref(), hi.as_deref()),
        Expr::FieldRef { .. }
        | Expr::LabelRef { .. }
        | Expr::DynamicRef { .. }
        | Expr::LetRef { .. }
        | Expr::ImportRef(_)
        | Expr::Selector(..)
        | Expr::Index(..) => {
            let (target, _) = locate_reference_target(ctx, env, expr)?;
            finalize::evaluate(ctx, target)
        }
    }
}

fn eval_nested_struct(ctx: &mut OpContext, env: EnvId, sl: &Rc<StructLit>) -> Result<Value, Bottom> {
    let synth = ctx.alloc_vertex(None, Feature::INVALID);
    let node = ctx.vertex_mut(synth).closed.alloc_node();
    push_conjunct(ctx, synth, env, Rc::new(Expr::StructLit(sl.clone())), CloseInfo::new(node));
    unify(ctx, synth, TargetStatus::Finalized)?;
    Ok(ctx.vertex(synth).value.clone().unwrap_or(Value::Struct))
}

fn eval_nested_list(ctx: &mut OpContext, env: EnvId, ll: &Rc<ListLit>) -> Result<Value, Bottom> {
    let synth = ctx.alloc_vertex(None, Feature::INVALID);
    push_conjunct(ctx, synth, env, Rc::new(Expr::ListLit(ll.clone())), CloseInfo::new(ctx.vertex_mut(synth).closed.alloc_node()));
    unify(ctx, synth, TargetStatus::Finalized)?;
    Ok(ctx.vertex(synth).value.clone().unwrap_or(Value::List { open: ll.ellipsis.is_some() }))
}

/// Resolves `base` to a vertex (as a reference, or as a freshly dispatched
/// literal) and slices its arcs by position, cloning the selected arcs'
/// conjuncts into a synthetic list vertex (`spec.md` §4.2.2's slice
/// semantics operate on the list's elements, which live on arcs, not on the
/// thin [`Value::List`] marker).
fn eval_slice(ctx: &mut OpContext, env: EnvId, base: &Expr, lo: Option<&Expr>, hi: Option<&Expr>) -> Result<Value, Bottom> {
    let base_target = resolve_to_vertex(ctx, env, base)?;
    unify(ctx, base_target, TargetStatus::Finalized)?;

    let len = i64::try_from(ctx.vertex(base_target).arcs.len()).unwrap_or(i64::MAX);
    let lo_idx = lo.map(|e| eval_expr(ctx, env, e)).transpose()?.map(|v| index_from_value(&v)).transpose()?.unwrap_or(0);
    let hi_idx = hi.map(|e| eval_expr(ctx, env, e)).transpose()?.map(|v| index_from_value(&v)).transpose()?.unwrap_or(len);
    if lo_idx < 0 || hi_idx > len || lo_idx > hi_idx {
        return Err(Bottom::eval(format!("slice index out of range [{lo_idx}:{hi_idx}] of length {len}")));
    }

    let selected: Vec<Rc<Expr>> = ctx
        .vertex(base_target)
        .arcs
        .iter()
        .skip(usize::try_from(lo_idx).unwrap_or(0))
        .take(usize::try_from(hi_idx - lo_idx).unwrap_or(0))
        .map(|(_, child)| ctx.vertex(*child).conjuncts.clone())
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .map(|c| c.expr)
        .collect();

    let synth = ctx.alloc_vertex(None, Feature::INVALID);
    ctx.vertex_mut(synth).value = Some(Value::List { open: false });
    for (i, expr_rc) in selected.into_iter().enumerate() {
        let label = Feature::int(i64::try_from(i).expect("slice index fits i64")).expect("slice length fits i32");
        let node = ctx.vertex_mut(synth).closed.alloc_node();
        let arc = arcs::get_or_create_arc(ctx, synth, label);
        push_conjunct(ctx, arc, env, expr_rc, CloseInfo::new(node));
    }
    unify(ctx, synth, TargetStatus::Finalized)?;
    Ok(ctx.vertex(synth).value.clone().unwrap_or(Value::List { open: false }))
}

/// Resolves an arbitrary expression to a vertex: a reference resolves to
/// its target, a struct/list literal is dispatched onto a fresh synthetic
/// vertex (`spec.md` §4.2.6's `for`/slice both need a vertex with real arcs,
/// not the thin [`Value::List`]/[`Value::Struct`] marker).
pub(crate) fn resolve_to_vertex(ctx: &mut OpContext, env: EnvId, expr: &Expr) -> Result<VertexId, Bottom> {
    match expr {
        Expr::FieldRef { .. }
        | Expr::LabelRef { .. }
        | Expr::DynamicRef { .. }
        | Expr::LetRef { .. }
        | Expr::ImportRef(_)
        | Expr::Selector(..)
        | Expr::Index(..) => Ok(locate_reference_target(ctx, env, expr)?.0),
        Expr::ListLit(ll) => {
            let synth = ctx.alloc_vertex(None, Feature::INVALID);
            push_conjunct(ctx, synth, env, Rc::new(Expr::ListLit(ll.clone())), CloseInfo::new(ctx.vertex_mut(synth).closed.alloc_node()));
            Ok(synth)
        }
        Expr::StructLit(sl) => {
            let synth = ctx.alloc_vertex(None, Feature::INVALID);
            push_conjunct(ctx, synth, env, Rc::new(Expr::StructLit(sl.clone())), CloseInfo::new(ctx.vertex_mut(synth).closed.alloc_node()));
            Ok(synth)
        }
        _ => Err(Bottom::eval("expression does not resolve to a list or struct")),
    }
}

fn frame_at(ctx: &OpContext, env: EnvId, up: u16) -> EnvId {
    let mut cur = env;
    for _ in 0..up {
        cur = ctx.env(cur).parent.expect("reference up-count exceeds environment depth");
    }
    cur
}

/// Resolves a reference expression to the `Vertex` it denotes, and whether
/// the resolution crossed a definition boundary (closing the target per
/// `spec.md` §4.2.4).
pub(crate) fn locate_reference_target(ctx: &mut OpContext, env: EnvId, expr: &Expr) -> Result<(VertexId, bool), Bottom> {
    match expr {
        Expr::FieldRef { up, label } => {
            let frame_id = frame_at(ctx, env, *up);
            if let Some(bound) = ctx.env(frame_id).lookup_binding(*label) {
                return Ok((bound, false));
            }
            let scope_vertex = ctx.env(frame_id).vertex;
            let target = arcs::get_or_create_arc(ctx, scope_vertex, *label);
            Ok((target, label.kind().is_definition()))
        }
        Expr::LabelRef { up } => {
            let frame_id = frame_at(ctx, env, *up);
            let bound = ctx
                .env(frame_id)
                .label_binding
                .ok_or_else(|| Bottom::eval("no bound pattern label at this scope"))?;
            Ok((bound, false))
        }
        Expr::LetRef { up, id } => {
            let frame_id = frame_at(ctx, env, *up);
            let bound = ctx
                .env(frame_id)
                .lookup_let(*id)
                .ok_or_else(|| Bottom::eval("let binding not found"))?;
            Ok((bound, false))
        }
        Expr::DynamicRef { up, expr: inner } => {
            let frame_id = frame_at(ctx, env, *up);
            let value = eval_expr(ctx, env, inner)?;
            let label = label_from_value(ctx, &value)?;
            let scope_vertex = ctx.env(frame_id).vertex;
            let target = arcs::get_or_create_arc(ctx, scope_vertex, label);
            Ok((target, false))
        }
        Expr::ImportRef(_) => Err(Bottom::not_exist("import reference requires an external import resolver")),
        Expr::Selector(base, label) => {
            let (base_target, _) = locate_reference_target(ctx, env, base)?;
            unify(ctx, base_target, TargetStatus::Partial)?;
            let target = arcs::get_or_create_arc(ctx, base_target, *label);
            Ok((target, label.kind().is_definition()))
        }
        Expr::Index(base, idx) => {
            let (base_target, _) = locate_reference_target(ctx, env, base)?;
            unify(ctx, base_target, TargetStatus::Partial)?;
            let idx_value = eval_expr(ctx, env, idx)?;
            let label = match &idx_value {
                Value::Str(s) => Feature::string(ctx.interner.intern(s)),
                _ => Feature::int(index_from_value(&idx_value)?).ok_or_else(|| Bottom::eval("list index out of range"))?,
            };
            let target = arcs::get_or_create_arc(ctx, base_target, label);
            Ok((target, false))
        }
        _ => Err(Bottom::eval("expression is not a reference")),
    }
}

fn dereference_clone(ctx: &mut OpContext, v: VertexId, env: EnvId, expr: &Expr, close_info: CloseInfo) -> Result<(), Bottom> {
    let (target, is_def_ref) = locate_reference_target(ctx, env, expr)?;

    // `target` being mid-`evaluate_arcs` here means this dereference was
    // reached by descending from `target`'s own arc expansion — `target` is
    // a genuine ancestor of `v`, not merely the same named definition used
    // twice. Catching it before `unify` ever touches `target` keeps a lone
    // self-reference (`spec.md` §4.2.5's `tail: list | null`) a cheap,
    // immediate failure instead of recursing into it at all.
    if crate::eval::cycle::is_structural_cycle(ctx.vertex(target).evaluating_arcs) {
        return Err(Bottom::cycle("structural cycle: reference resolves to an ancestor still expanding its own arcs"));
    }

    unify(ctx, target, TargetStatus::Partial)?;

    let effective_close = if is_def_ref {
        let new_id = ctx.vertex_mut(v).closed.alloc_node();
        ctx.vertex_mut(v).closed.node_mut(new_id).is_def = true;
        ctx.vertex_mut(v).closed.register_ring(new_id);
        CloseInfo::new(new_id)
    } else {
        close_info
    };

    let cloned: Vec<Rc<Expr>> = ctx.vertex(target).conjuncts.iter().map(|cj| cj.expr.clone()).collect();
    for expr_rc in cloned {
        push_conjunct(ctx, v, env, expr_rc, effective_close);
    }
    Ok(())
}
