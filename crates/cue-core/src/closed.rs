//! The closedness algebra: the `Acceptor` and its `CloseDef` canopy
//! (`spec.md` §3 "Closedness (Acceptor)", §4.2.4).
//!
//! Committing to the AND/embed-ring discipline per `spec.md` §9's Design
//! Notes ("a fresh implementation should pick one discipline and commit to
//! it; the AND-ring is more expressive... and is the recommended choice").
//! There is no parallel "CloseInfo"-flavored implementation.

use ahash::AHashSet;

use std::rc::Rc;

use crate::{
    adt::{conjunct::CloseId, env::EnvId, expr::Expr, expr::ScalarLit, vertex::Value},
    feature::{Feature, Interner},
};

/// A bulk-optional field's rule, retained so that arcs created *after* the
/// rule was registered still have its value conjoined (`spec.md` §4.2.3:
/// bulk patterns apply to every matching label, regardless of when the arc
/// is created).
#[derive(Debug, Clone)]
pub struct BulkRule {
    pub filter: Value,
    pub value: Rc<Expr>,
    pub env: EnvId,
    pub binds_label: bool,
}

/// One node in the closedness canopy: the field set, bulk patterns, and
/// openness declared by a single `StructLit` (or `close()` application, or
/// a cloned definition body) at one provenance point.
#[derive(Debug, Clone, Default)]
pub struct CloseNode {
    /// Whether this node gates admission at all. A node that is neither a
    /// definition nor `close()`-promoted is transparent: it never blocks a
    /// label, regardless of its own field set (`spec.md` §4.2.4's "If no
    /// node is IsDef/IsClosed... admit").
    pub is_def: bool,
    pub is_closed_builtin: bool,
    /// Literal field/optional labels declared at this node.
    pub fields: AHashSet<Feature>,
    /// Evaluated bulk-pattern filters (`[pattern]: T`); a label matches if
    /// any filter accepts its string form.
    pub bulk_filters: Vec<Value>,
    /// `Some(T)` if `...T` appeared among this node's declarations; `T` is
    /// conjoined into every newly admitted arc (`spec.md` §4.2.3).
    pub ellipsis_type: Option<Rc<Expr>>,
    /// Embedded structs' canopy roots, admitted disjunctively
    /// (`spec.md` §4.2.4 "Embedding").
    pub embeds: Vec<CloseId>,
    /// Bulk-optional rules declared at this node, retained for late arc
    /// creation (see [`BulkRule`]).
    pub bulk_rules: Vec<BulkRule>,
}

impl CloseNode {
    #[must_use]
    pub fn requires_closedness(&self) -> bool {
        self.is_def || self.is_closed_builtin
    }

    fn bulk_matches(&self, f: Feature, interner: &Interner) -> bool {
        let Some(sid) = f.string_id() else { return false };
        let label = interner.resolve(sid);
        self.bulk_filters.iter().any(|filter| value_admits_label(filter, label))
    }
}

/// Does an evaluated bulk-pattern filter value accept a candidate label's
/// string form? `[string]: T` (filter = `BasicType(STRING)`) accepts any
/// string label; a concrete `Value::Str` filter accepts only that exact
/// label; a bound (e.g. `[=~"^x"]: T`) tests its regex/comparison sense.
pub(crate) fn value_admits_label(filter: &Value, label: &str) -> bool {
    match filter {
        Value::Top | Value::BasicType(_) => true,
        Value::Str(s) => s.as_ref() == label,
        Value::Bound(bounds) => bounds
            .iter()
            .all(|b| b.test(&ScalarLit::Str(label.into()))),
        _ => false,
    }
}

/// A vertex's closedness acceptor: an arena of [`CloseNode`]s plus the
/// top-level AND-ring of node ids that must *all* admit a label for it to
/// be accepted (`spec.md` §3 "Closedness (Acceptor)").
#[derive(Debug, Clone, Default)]
pub struct Acceptor {
    nodes: Vec<CloseNode>,
    /// Top-level AND-ring: one entry per `StructLit`/definition-clone
    /// conjunct contributed directly to this vertex (not via embedding).
    ring: Vec<CloseId>,
}

impl Acceptor {
    /// Allocates a fresh node, returning its id. Conjunct close-infos that
    /// need a brand-new provenance group (a dereferenced definition body, a
    /// freshly embedded struct) call this.
    pub fn alloc_node(&mut self) -> CloseId {
        let id = CloseId(u32::try_from(self.nodes.len()).expect("closedness arena overflow"));
        self.nodes.push(CloseNode::default());
        id
    }

    pub fn node_mut(&mut self, id: CloseId) -> &mut CloseNode {
        &mut self.nodes[id.0 as usize]
    }

    #[must_use]
    pub fn node(&self, id: CloseId) -> &CloseNode {
        &self.nodes[id.0 as usize]
    }

    /// Registers `id` as a top-level AND-ring member (a conjunct
    /// contributed directly to this vertex, not nested under an embedding).
    pub fn register_ring(&mut self, id: CloseId) {
        if !self.ring.contains(&id) {
            self.ring.push(id);
        }
    }

    #[must_use]
    pub fn ring(&self) -> &[CloseId] {
        &self.ring
    }

    /// All bulk rules reachable from the ring, including through embeds,
    /// in no particular order.
    #[must_use]
    pub fn all_bulk_rules(&self) -> Vec<&BulkRule> {
        let mut out = Vec::new();
        let mut stack: Vec<CloseId> = self.ring.clone();
        let mut seen = AHashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = self.node(id);
            out.extend(node.bulk_rules.iter());
            stack.extend(node.embeds.iter().copied());
        }
        out
    }

    /// Registers `child` as an embed-chain alternative under `parent`
    /// (`spec.md` §4.2.4 "Embedding").
    pub fn register_embed(&mut self, parent: CloseId, child: CloseId) {
        let node = self.node_mut(parent);
        if !node.embeds.contains(&child) {
            node.embeds.push(child);
        }
    }

    fn node_admits(&self, id: CloseId, f: Feature, interner: &Interner) -> bool {
        let node = self.node(id);
        if !node.requires_closedness() {
            return true;
        }
        node.fields.contains(&f)
            || node.bulk_matches(f, interner)
            || node.ellipsis_type.is_some()
            || node.embeds.iter().any(|e| self.node_admits(*e, f, interner))
    }

    /// The admission predicate from `spec.md` §4.2.4: is label `f`
    /// admissible on this vertex?
    ///
    /// Non-string labels (hidden/definition/pattern-bound) are admitted
    /// unconditionally. [`Feature::INVALID`] probes overall closedness: it
    /// never matches a concrete field/bulk/ellipsis, so it is admitted iff
    /// no ring member requires closedness (i.e. the vertex is open).
    #[must_use]
    pub fn admit(&self, f: Feature, interner: &Interner) -> bool {
        if !f.kind().participates_in_closedness() {
            return true;
        }
        self.ring.iter().all(|&id| self.node_admits(id, f, interner))
    }

    /// `true` iff at least one top-level ring member is a definition or
    /// `close()`-promoted struct (`spec.md` §6's `v.IsClosed()`).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.ring.iter().any(|&id| self.node(id).requires_closedness())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, Interner};

    fn string_feature(interner: &mut Interner, s: &str) -> Feature {
        Feature::string(interner.intern(s))
    }

    #[test]
    fn closed_struct_rejects_undeclared_field() {
        let mut interner = Interner::new();
        let a = string_feature(&mut interner, "a");
        let b = string_feature(&mut interner, "b");

        let mut acceptor = Acceptor::default();
        let node = acceptor.alloc_node();
        acceptor.node_mut(node).is_closed_builtin = true;
        acceptor.node_mut(node).fields.insert(a);
        acceptor.register_ring(node);

        assert!(acceptor.admit(a, &interner));
        assert!(!acceptor.admit(b, &interner));
    }

    #[test]
    fn open_struct_admits_anything() {
        let mut interner = Interner::new();
        let a = string_feature(&mut interner, "a");
        let b = string_feature(&mut interner, "b");

        let mut acceptor = Acceptor::default();
        let node = acceptor.alloc_node();
        acceptor.node_mut(node).fields.insert(a);
        acceptor.register_ring(node);

        assert!(acceptor.admit(a, &interner));
        assert!(acceptor.admit(b, &interner));
        assert!(!acceptor.is_closed());
    }

    #[test]
    fn open_embedding_lifts_closed_hosts_restriction() {
        let mut interner = Interner::new();
        let a = string_feature(&mut interner, "a");
        let b = string_feature(&mut interner, "b");

        let mut acceptor = Acceptor::default();
        let host = acceptor.alloc_node();
        acceptor.node_mut(host).is_def = true;
        acceptor.node_mut(host).fields.insert(a);
        acceptor.register_ring(host);

        let embed = acceptor.alloc_node(); // open embedding, no restriction
        acceptor.register_embed(host, embed);

        assert!(acceptor.admit(a, &interner));
        assert!(acceptor.admit(b, &interner), "an open embedding admits anything disjunctively");
    }

    #[test]
    fn closed_embedding_still_gates_with_host() {
        let mut interner = Interner::new();
        let a = string_feature(&mut interner, "a");
        let c = string_feature(&mut interner, "c");

        let mut acceptor = Acceptor::default();
        let host = acceptor.alloc_node();
        acceptor.node_mut(host).is_def = true;
        acceptor.node_mut(host).fields.insert(a);
        acceptor.register_ring(host);

        let embed = acceptor.alloc_node();
        acceptor.node_mut(embed).is_def = true;
        acceptor.node_mut(embed).fields.insert(c);
        acceptor.register_embed(host, embed);

        // Neither alone admits `b`, but `c` is admitted because the closed
        // embedding admits it disjunctively.
        assert!(acceptor.admit(a, &interner));
        assert!(acceptor.admit(c, &interner));
    }
}
