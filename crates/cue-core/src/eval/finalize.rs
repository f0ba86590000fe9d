//! Finalization: the last step of `Unify`, settling a vertex's value once
//! every conjunct has been dispatched and every arc evaluated
//! (`spec.md` §4.2.8).

use crate::{
    adt::vertex::{Status, Value, VertexId},
    errors::Bottom,
    eval::{OpContext, TargetStatus},
};

/// Settles `v`'s final value once `conjuncts::unify` has dispatched every
/// conjunct and descended into every arc. A vertex with no concrete value at
/// this point (an empty conjunct list, or one that only ever contributed
/// `Top`) finalizes to `Top` rather than failing — the emptiness itself
/// isn't an error, just an unconstrained value.
pub(crate) fn try_finalize(ctx: &mut OpContext, v: VertexId) -> Result<(), Bottom> {
    if ctx.vertex(v).status == Status::Finalized {
        return Ok(());
    }
    if let Some(Value::Bottom(b)) = ctx.vertex(v).value.clone() {
        ctx.vertex_mut(v).status = Status::Finalized;
        return Err(b);
    }
    if ctx.vertex(v).value.is_none() {
        ctx.vertex_mut(v).value = Some(Value::Top);
    }
    ctx.vertex_mut(v).status = Status::Finalized;
    Ok(())
}

/// Drives `v` to `Finalized` and returns its settled value, or the `Bottom`
/// it finalized to (`spec.md` §6's `Evaluate(v)`).
pub fn evaluate(ctx: &mut OpContext, v: VertexId) -> Result<Value, Bottom> {
    crate::eval::unify(ctx, v, TargetStatus::Finalized)?;
    match ctx.vertex(v).value.clone() {
        Some(Value::Bottom(b)) => Err(b),
        Some(value) => Ok(value),
        None => Ok(Value::Top),
    }
}
