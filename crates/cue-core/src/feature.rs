//! Interned labels: the `Feature` type and the string interner backing it.
//!
//! Mirrors the index-not-pointer discipline the evaluator relies on
//! everywhere else: a `Feature` is a small `Copy` value, never a borrowed
//! string, so it can sit in vertex arcs, environment bindings, and conjunct
//! close-info without any lifetime threading.

use std::fmt;

use ahash::AHashMap;
use unicode_normalization::UnicodeNormalization;

/// The kind of label a [`Feature`] carries.
///
/// Definition and hidden labels are distinguished from regular (`String`)
/// labels because they are admitted unconditionally by the closedness
/// check (see [`crate::closed`]) and are elided from iteration in data
/// modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureKind {
    /// A regular field label, e.g. `foo` or `"foo bar"`.
    String,
    /// An integer label, used for list element positions.
    Int,
    /// A definition label, `#Name`.
    Definition,
    /// A hidden label, `_name`.
    Hidden,
    /// A hidden definition label, `#_name`.
    HiddenDefinition,
    /// The `InvalidLabel` sentinel: "any label", used to probe overall
    /// closedness without a concrete field (see [`crate::closed::Acceptor::is_closed`]).
    Invalid,
}

impl FeatureKind {
    /// Regular string labels are the only ones subject to the closedness
    /// admission procedure; definitions and hidden labels bypass it.
    #[must_use]
    pub fn participates_in_closedness(self) -> bool {
        matches!(self, Self::String)
    }

    #[must_use]
    pub fn is_definition(self) -> bool {
        matches!(self, Self::Definition | Self::HiddenDefinition)
    }

    #[must_use]
    pub fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden | Self::HiddenDefinition)
    }
}

/// An interned label: string/int/definition/hidden/hidden-definition, or the
/// `InvalidLabel` sentinel.
///
/// For `String`/`Definition`/`Hidden`/`HiddenDefinition` labels, `payload` is
/// the index returned by [`Interner::intern`]. For `Int` labels, `payload` is
/// the label's integer value bit-cast from `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Feature {
    kind: FeatureKind,
    payload: u32,
}

impl Feature {
    /// The `InvalidLabel` sentinel: "any label".
    pub const INVALID: Self = Self {
        kind: FeatureKind::Invalid,
        payload: 0,
    };

    #[must_use]
    pub fn string(id: StringId) -> Self {
        Self {
            kind: FeatureKind::String,
            payload: id.0,
        }
    }

    #[must_use]
    pub fn definition(id: StringId) -> Self {
        Self {
            kind: FeatureKind::Definition,
            payload: id.0,
        }
    }

    #[must_use]
    pub fn hidden(id: StringId) -> Self {
        Self {
            kind: FeatureKind::Hidden,
            payload: id.0,
        }
    }

    #[must_use]
    pub fn hidden_definition(id: StringId) -> Self {
        Self {
            kind: FeatureKind::HiddenDefinition,
            payload: id.0,
        }
    }

    /// Creates an integer label. Returns `None` if `value` does not fit a
    /// 32-bit signed range (per `spec.md` §4.1's label-interning rule).
    #[must_use]
    pub fn int(value: i64) -> Option<Self> {
        let narrowed = i32::try_from(value).ok()?;
        Some(Self {
            kind: FeatureKind::Int,
            #[expect(clippy::cast_sign_loss, reason = "round-trips via int_value()")]
            payload: narrowed as u32,
        })
    }

    #[must_use]
    pub fn kind(self) -> FeatureKind {
        self.kind
    }

    #[must_use]
    pub fn is_invalid(self) -> bool {
        self.kind == FeatureKind::Invalid
    }

    /// Returns the backing `StringId` for string-like labels.
    #[must_use]
    pub fn string_id(self) -> Option<StringId> {
        matches!(
            self.kind,
            FeatureKind::String | FeatureKind::Definition | FeatureKind::Hidden | FeatureKind::HiddenDefinition
        )
        .then_some(StringId(self.payload))
    }

    #[must_use]
    pub fn int_value(self) -> Option<i32> {
        #[expect(clippy::cast_possible_wrap, reason = "payload was built from an i32")]
        (self.kind == FeatureKind::Int).then_some(self.payload as i32)
    }
}

/// Index into the [`Interner`]'s string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interns strings, normalizing to NFC first so that visually identical
/// labels written with different Unicode decompositions intern to the same
/// `StringId` (`spec.md` §4.1).
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, u32>,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, normalizing to NFC. Returns the existing id if already
    /// present.
    pub fn intern(&mut self, s: &str) -> StringId {
        let normalized: String = s.nfc().collect();
        if let Some(&id) = self.lookup.get(normalized.as_str()) {
            return StringId(id);
        }
        let id = u32::try_from(self.strings.len()).expect("interner overflow");
        let boxed: Box<str> = normalized.into_boxed_str();
        self.lookup.insert(boxed.clone(), id);
        self.strings.push(boxed);
        StringId(id)
    }

    #[must_use]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nfc_normalization_unifies_labels() {
        let mut interner = Interner::new();
        // "é" as a single codepoint vs. "e" + combining acute accent.
        let precomposed = interner.intern("\u{00e9}");
        let decomposed = interner.intern("e\u{0301}");
        assert_eq!(precomposed, decomposed);
    }

    #[test]
    fn int_label_rejects_out_of_range_values() {
        assert!(Feature::int(i64::from(i32::MAX)).is_some());
        assert!(Feature::int(i64::from(i32::MAX) + 1).is_none());
    }

    #[test]
    fn invalid_sentinel_bypasses_closedness() {
        assert!(!FeatureKind::Invalid.participates_in_closedness());
    }

    #[test]
    fn hidden_and_definition_labels_bypass_closedness() {
        assert!(!FeatureKind::Hidden.participates_in_closedness());
        assert!(!FeatureKind::Definition.participates_in_closedness());
        assert!(!FeatureKind::HiddenDefinition.participates_in_closedness());
        assert!(FeatureKind::String.participates_in_closedness());
    }
}
