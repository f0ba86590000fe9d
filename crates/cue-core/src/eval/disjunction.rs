//! Disjunction: trying each arm against a snapshot of the vertex's mutable
//! state, and default-mark combination (`spec.md` §4.2.5).

use std::rc::Rc;

use crate::{
    adt::{
        conjunct::CloseInfo,
        env::EnvId,
        expr::Disjunct,
        vertex::{DefaultMark, DisjunctTerm, Value, VertexId},
    },
    errors::{summarize_disjunction_failure, Bottom},
    eval::{
        conjuncts::{drive, eval_expr, push_conjunct, unify_value_into},
        OpContext, TargetStatus, VertexSnapshot,
    },
};

/// Tries each arm of a whole-conjunct disjunction (`x: 1 | 2`) by snapshotting
/// `v` before every attempt and restoring it after, whether the arm
/// succeeded or failed (`spec.md` §5 "Disjunction snapshotting"). Surviving
/// arms are re-applied to the restored vertex as the final step, so the
/// vertex only ever carries the disjunction's net effect, never a
/// half-applied losing arm.
pub fn defer(ctx: &mut OpContext, v: VertexId, env: EnvId, arms: &[Disjunct]) -> Result<(), Bottom> {
    let snapshot_before = VertexSnapshot::take(ctx.vertex(v));
    let mut successes: Vec<(Value, DefaultMark)> = Vec::new();
    let mut errors = Vec::new();

    for arm in arms {
        let restore_point = VertexSnapshot::take(ctx.vertex(v));
        let start = ctx.vertex(v).conjuncts.len();
        let node = ctx.vertex_mut(v).closed.alloc_node();
        push_conjunct(ctx, v, env, Rc::new(arm.expr.clone()), CloseInfo::new(node));
        match drive(ctx, v, start, TargetStatus::Finalized) {
            Ok(()) => {
                let value = ctx.vertex(v).value.clone().unwrap_or(Value::Top);
                let mark = if arm.marked_default { DefaultMark::IsDefault } else { DefaultMark::MaybeDefault };
                successes.push((value, mark));
            }
            Err(e) => errors.push(e),
        }
        restore_point.restore(ctx.vertex_mut(v));
    }

    if successes.is_empty() {
        snapshot_before.restore(ctx.vertex_mut(v));
        return Err(summarize_disjunction_failure(&errors));
    }

    snapshot_before.restore(ctx.vertex_mut(v));
    let result = collapse(successes);
    unify_value_into(ctx, v, result)
}

/// Evaluates a disjunction appearing nested inside a larger expression
/// (e.g. a list element, a call argument): each arm is evaluated
/// independently via [`eval_expr`], with no vertex to snapshot.
pub fn eval_nested(ctx: &mut OpContext, env: EnvId, arms: &[Disjunct]) -> Result<Value, Bottom> {
    let mut successes: Vec<(Value, DefaultMark)> = Vec::new();
    let mut errors = Vec::new();

    for arm in arms {
        match eval_expr(ctx, env, &arm.expr) {
            Ok(value) => {
                let mark = if arm.marked_default { DefaultMark::IsDefault } else { DefaultMark::MaybeDefault };
                successes.push((value, mark));
            }
            Err(e) => errors.push(e),
        }
    }

    if successes.is_empty() {
        return Err(summarize_disjunction_failure(&errors));
    }
    Ok(collapse(successes))
}

fn collapse(successes: Vec<(Value, DefaultMark)>) -> Value {
    if successes.len() == 1 {
        return successes.into_iter().next().expect("len checked").0;
    }
    Value::Disjunction(
        successes
            .into_iter()
            .map(|(value, default)| DisjunctTerm { value: Box::new(value), default })
            .collect(),
    )
}

