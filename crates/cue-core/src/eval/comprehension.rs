//! Comprehensions: expanding a clause chain into zero or more copies of the
//! value struct, conjoined into the enclosing vertex (`spec.md` §4.2.6).

use std::rc::Rc;

use bigdecimal::BigDecimal;

use crate::{
    adt::{
        clause::Clause,
        conjunct::CloseInfo,
        decl::StructLit,
        env::{EnvFrame, EnvId},
        expr::Expr,
        vertex::{Status, Value, VertexId},
    },
    errors::Bottom,
    eval::{
        conjuncts::{eval_expr, push_conjunct, resolve_to_vertex},
        OpContext, TargetStatus,
    },
    feature::Feature,
};

/// Entry point for a comprehension conjunct. If any clause is still
/// incomplete (its source or condition isn't concrete yet), this returns
/// the same `Incomplete`/`Cycle`-class error that keeps the owning
/// conjunct undispatched (`spec.md` §4.2.6's "leave the vertex in
/// `Partial`... to be retried").
pub fn try_expand(
    ctx: &mut OpContext,
    v: VertexId,
    env: EnvId,
    comp: &crate::adt::clause::Comprehension,
    _close_info: CloseInfo,
) -> Result<(), Bottom> {
    expand(ctx, v, env, &comp.clauses, 0, &comp.value)
}

fn expand(ctx: &mut OpContext, v: VertexId, env: EnvId, clauses: &[Clause], idx: usize, value: &Rc<StructLit>) -> Result<(), Bottom> {
    let Some(clause) = clauses.get(idx) else {
        let node = ctx.vertex_mut(v).closed.alloc_node();
        ctx.vertex_mut(v).closed.register_ring(node);
        push_conjunct(ctx, v, env, Rc::new(Expr::StructLit(value.clone())), CloseInfo::new(node));
        return Ok(());
    };

    match clause {
        Clause::If { cond } => match eval_expr(ctx, env, cond)? {
            Value::Bool(true) => expand(ctx, v, env, clauses, idx + 1, value),
            Value::Bool(false) => Ok(()),
            _ => Err(Bottom::eval("if clause condition must be a boolean")),
        },
        Clause::Let { id, name: _, expr } => {
            let let_vertex = ctx.alloc_vertex(Some(v), Feature::INVALID);
            let node = ctx.vertex_mut(v).closed.alloc_node();
            push_conjunct(ctx, let_vertex, env, Rc::new(expr.clone()), CloseInfo::new(node));
            let mut frame = EnvFrame::child(env, v);
            frame.memoize_let(*id, let_vertex);
            let child_env = ctx.alloc_env(frame);
            expand(ctx, v, child_env, clauses, idx + 1, value)
        }
        Clause::For { key, val, src } => expand_for(ctx, v, env, *key, *val, src, clauses, idx, value),
    }
}

fn expand_for(
    ctx: &mut OpContext,
    v: VertexId,
    env: EnvId,
    key: Option<Feature>,
    val: Feature,
    src: &Expr,
    clauses: &[Clause],
    idx: usize,
    value: &Rc<StructLit>,
) -> Result<(), Bottom> {
    let src_target = resolve_to_vertex(ctx, env, src)?;
    crate::eval::unify(ctx, src_target, TargetStatus::Finalized)?;

    let entries: Vec<(Feature, VertexId)> = ctx.vertex(src_target).arcs.iter().map(|(f, id)| (*f, *id)).collect();
    for (label, child) in entries {
        if ctx.vertex(child).status != Status::Finalized {
            return Err(Bottom::incomplete("for-clause source element not yet finalized"));
        }
        let mut frame = EnvFrame::child(env, v);
        frame.bind(val, child);
        if let Some(key_label) = key {
            let key_value = match label.string_id() {
                Some(sid) => Value::Str(ctx.interner.resolve(sid).to_string().into_boxed_str()),
                None => label.int_value().map_or(Value::Top, |i| Value::Num(BigDecimal::from(i64::from(i)))),
            };
            let key_vertex = ctx.alloc_finalized(key_value);
            frame.bind(key_label, key_vertex);
        }
        let child_env = ctx.alloc_env(frame);
        expand(ctx, v, child_env, clauses, idx + 1, value)?;
    }
    Ok(())
}
