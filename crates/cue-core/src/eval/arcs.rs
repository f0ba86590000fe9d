//! Arc creation and descent: child-vertex lookup, structural-cycle
//! detection during arc evaluation (`spec.md` §4.2.7), and late-binding of
//! bulk-optional/ellipsis rules onto newly created arcs (`spec.md` §4.2.3).

use std::rc::Rc;

use crate::{
    adt::{
        conjunct::CloseInfo,
        decl::BulkField,
        env::{EnvFrame, EnvId},
        expr::Expr,
        vertex::{Value, VertexId},
    },
    closed::{value_admits_label, BulkRule},
    errors::Bottom,
    eval::{conjuncts::push_conjunct, OpContext, TargetStatus},
    feature::Feature,
};

/// Looks up `label` on `parent`'s arcs, creating a fresh child vertex if
/// absent. Every struct field, list element, and reference target passes
/// through here, so this is also where a freshly created field arc picks
/// up any bulk-optional rule already registered on `parent`'s closedness
/// canopy (`spec.md` §4.2.3: bulk patterns bind to labels regardless of
/// declaration order).
pub fn get_or_create_arc(ctx: &mut OpContext, parent: VertexId, label: Feature) -> VertexId {
    if let Some(&id) = ctx.vertex(parent).arcs.get(&label) {
        return id;
    }
    let id = ctx.alloc_vertex(Some(parent), label);
    ctx.vertex_mut(parent).arcs.insert(label, id);
    if label.kind().participates_in_closedness() {
        apply_matching_bulk_rules(ctx, parent, label, id);
    }
    id
}

/// Fails with an `EvalError` if `label` is not admissible on `v` under its
/// current closedness canopy (`spec.md` §4.2.4). Called only when a concrete
/// field is being *declared* on `v`, not when a reference merely probes for
/// one (an absent field is a `NotExistError`, not a closedness violation).
pub fn check_admitted(ctx: &OpContext, v: VertexId, label: Feature) -> Result<(), Bottom> {
    if ctx.vertex(v).closed.admit(label, &ctx.interner) {
        return Ok(());
    }
    let name = label
        .string_id()
        .map(|id| ctx.interner.resolve(id).to_string())
        .unwrap_or_else(|| "<field>".to_string());
    Err(Bottom::eval(format!("field not allowed: {name} is not permitted by a closed struct")))
}

fn bind_label_env(ctx: &mut OpContext, parent: VertexId, name: &str, rule_env: EnvId) -> EnvId {
    let bound = ctx.alloc_finalized(Value::Str(name.into()));
    let mut frame = EnvFrame::child(rule_env, parent);
    frame.bind_label(bound);
    ctx.alloc_env(frame)
}

fn apply_matching_bulk_rules(ctx: &mut OpContext, parent: VertexId, label: Feature, child: VertexId) {
    let Some(sid) = label.string_id() else { return };
    let name = ctx.interner.resolve(sid).to_string();
    let rules: Vec<BulkRule> = ctx.vertex(parent).closed.all_bulk_rules().into_iter().cloned().collect();
    for rule in rules {
        if !value_admits_label(&rule.filter, &name) {
            continue;
        }
        let child_env = if rule.binds_label {
            bind_label_env(ctx, parent, &name, rule.env)
        } else {
            rule.env
        };
        let node = ctx.vertex_mut(parent).closed.alloc_node();
        push_conjunct(ctx, child, child_env, rule.value.clone(), CloseInfo::new(node));
    }
}

/// Applies a freshly declared bulk-optional rule to every arc already
/// present on `v` (arcs created afterward pick it up through
/// [`get_or_create_arc`] instead).
pub fn apply_bulk_to_existing(
    ctx: &mut OpContext,
    v: VertexId,
    env: EnvId,
    filter: &Value,
    bf: &BulkField,
    close_info: CloseInfo,
) -> Result<(), Bottom> {
    let existing: Vec<(Feature, VertexId)> = ctx.vertex(v).arcs.iter().map(|(f, id)| (*f, *id)).collect();
    for (label, child) in existing {
        if !label.kind().participates_in_closedness() {
            continue;
        }
        let Some(sid) = label.string_id() else { continue };
        let name = ctx.interner.resolve(sid).to_string();
        if !value_admits_label(filter, &name) {
            continue;
        }
        let child_env = if bf.binds_label { bind_label_env(ctx, v, &name, env) } else { env };
        push_conjunct(ctx, child, child_env, Rc::new(bf.value.clone()), close_info);
    }
    Ok(())
}

/// Applies a freshly declared `...T` to every arc already present on `v`.
/// Arcs created afterward are, as a simplified reading of `spec.md` §4.2.3,
/// not retroactively widened by a later ellipsis — see `DESIGN.md`.
pub fn apply_ellipsis_to_existing(ctx: &mut OpContext, v: VertexId, env: EnvId, ty: &Expr, close_info: CloseInfo) {
    let existing: Vec<VertexId> = ctx.vertex(v).arcs.values().copied().collect();
    for child in existing {
        push_conjunct(ctx, child, env, Rc::new(ty.clone()), close_info);
    }
}

/// Descends into every arc of `v`, driving each to `Finalized`
/// (`spec.md` §4.2.7's arc-evaluation phase). A vertex observed with
/// `evaluating_arcs` already set marks a structural cycle: this same vertex
/// is being descended into transitively from within its own arc
/// evaluation.
pub fn evaluate_arcs(ctx: &mut OpContext, v: VertexId) -> Result<(), Bottom> {
    if crate::eval::cycle::is_structural_cycle(ctx.vertex(v).evaluating_arcs) {
        return Err(Bottom::cycle("structural cycle: vertex re-entered during arc evaluation"));
    }
    ctx.vertex_mut(v).evaluating_arcs = true;

    let children: Vec<VertexId> = ctx.vertex(v).arcs.values().copied().collect();
    let mut incomplete: Option<Bottom> = None;
    for child in children {
        match crate::eval::unify(ctx, child, TargetStatus::Finalized) {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => {
                incomplete = Some(match incomplete {
                    Some(acc) => acc.combine(e),
                    None => e,
                });
            }
            Err(e) => {
                ctx.vertex_mut(v).evaluating_arcs = false;
                return Err(e);
            }
        }
    }
    ctx.vertex_mut(v).evaluating_arcs = false;
    incomplete.map_or(Ok(()), Err)
}
