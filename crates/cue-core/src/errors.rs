//! The error taxonomy at the evaluator's boundary (`spec.md` §6–§7).
//!
//! Errors are values, not exceptions: every failed unification produces a
//! [`Bottom`] that is attached to the offending `Vertex`, never a panic.

use std::{cmp::Ordering, fmt};

/// The error's severity class, also its aggregation priority: a stronger
/// code always wins when two `Bottom`s are conjoined (`spec.md` §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    /// Missing information; may be resolved once more conjuncts land.
    Cycle,
    Incomplete,
    NotExist,
    User,
    Eval,
}

impl ErrorCode {
    /// `spec.md` §6 lists the codes `EvalError`, `UserError`, `NotExistError`,
    /// `IncompleteError`, `CycleError` in strength order
    /// `EvalError > UserError > NotExistError > IncompleteError > CycleError`;
    /// `ErrorCode`'s derived `Ord` (declaration order above) matches that
    /// exactly, so `max` is "pick the stronger code".
    #[must_use]
    pub fn is_incomplete_class(self) -> bool {
        matches!(self, Self::Incomplete | Self::Cycle)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eval => "EvalError",
            Self::User => "UserError",
            Self::NotExist => "NotExistError",
            Self::Incomplete => "IncompleteError",
            Self::Cycle => "CycleError",
        };
        write!(f, "{name}")
    }
}

/// A single positioned error message. Positions are opaque to this crate
/// (no parser lives here); they are whatever an external collaborator
/// stamped onto the ADT it handed to [`crate::compiler::build`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ErrorMessage {
    pub position: Option<String>,
    pub text: String,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(pos) => write!(f, "{pos}: {}", self.text),
            None => write!(f, "{}", self.text),
        }
    }
}

/// The error (bottom) value of the CUE lattice.
///
/// `Bottom` absorbs under unification (`a & _|_ == _|_`) and aggregates:
/// conjoining two `Bottom`s keeps the stronger [`ErrorCode`] and appends
/// messages (`spec.md` §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bottom {
    pub code: ErrorCode,
    pub messages: Vec<ErrorMessage>,
    /// A child vertex whose failure this `Bottom` propagates, if any
    /// (`spec.md` §7's `ChildError` propagation).
    pub child_error: bool,
}

impl Bottom {
    #[must_use]
    pub fn new(code: ErrorCode, text: impl Into<String>) -> Self {
        Self {
            code,
            messages: vec![ErrorMessage {
                position: None,
                text: text.into(),
            }],
            child_error: false,
        }
    }

    #[must_use]
    pub fn at(code: ErrorCode, position: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            code,
            messages: vec![ErrorMessage {
                position: Some(position.into()),
                text: text.into(),
            }],
            child_error: false,
        }
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::User, text)
    }

    #[must_use]
    pub fn eval(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::Eval, text)
    }

    #[must_use]
    pub fn not_exist(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotExist, text)
    }

    #[must_use]
    pub fn incomplete(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::Incomplete, text)
    }

    #[must_use]
    pub fn cycle(text: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cycle, text)
    }

    #[must_use]
    pub fn as_child_error(mut self) -> Self {
        self.child_error = true;
        self
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.code.is_incomplete_class()
    }

    /// Conjoins two `Bottom`s: keeps the stronger code, appends messages
    /// (deduplicated), matching `spec.md` §7's aggregation policy.
    #[must_use]
    pub fn combine(mut self, other: Self) -> Self {
        self.code = self.code.max(other.code);
        for m in other.messages {
            if !self.messages.contains(&m) {
                self.messages.push(m);
            }
        }
        self.child_error = self.child_error || other.child_error;
        self
    }
}

impl fmt::Display for Bottom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        for (i, m) in self.messages.iter().enumerate() {
            if i == 0 {
                write!(f, ": {m}")?;
            } else {
                write!(f, "; {m}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Bottom {}

/// Builds the user-visible failure list for a tree of errors: sorted,
/// duplicates suppressed (`spec.md` §7's final paragraph).
#[must_use]
pub fn summarize(mut bottoms: Vec<Bottom>) -> Vec<Bottom> {
    bottoms.sort_by(|a, b| match b.code.cmp(&a.code) {
        Ordering::Equal => format!("{a}").cmp(&format!("{b}")),
        other => other,
    });
    bottoms.dedup_by(|a, b| a == b);
    bottoms
}

/// Summarizes a failed disjunction: up to two representative disjunct
/// errors if they share a position, or all distinct positions otherwise
/// (`spec.md` §4.2.5 "Outcome").
#[must_use]
pub fn summarize_disjunction_failure(arm_errors: &[Bottom]) -> Bottom {
    let code = arm_errors.iter().map(|b| b.code).max().unwrap_or(ErrorCode::Eval);
    let mut messages = Vec::new();
    for arm in arm_errors.iter().take(2) {
        messages.extend(arm.messages.iter().cloned());
    }
    let mut combined = Bottom {
        code,
        messages,
        child_error: false,
    };
    if arm_errors.len() > 2 {
        combined.messages.push(ErrorMessage {
            position: None,
            text: format!("...and {} more mismatched disjuncts", arm_errors.len() - 2),
        });
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_keeps_stronger_code() {
        let a = Bottom::incomplete("waiting on x");
        let b = Bottom::eval("type mismatch");
        let combined = a.combine(b);
        assert_eq!(combined.code, ErrorCode::Eval);
        assert_eq!(combined.messages.len(), 2);
    }

    #[test]
    fn incomplete_and_cycle_are_the_incomplete_class() {
        assert!(ErrorCode::Incomplete.is_incomplete_class());
        assert!(ErrorCode::Cycle.is_incomplete_class());
        assert!(!ErrorCode::Eval.is_incomplete_class());
        assert!(!ErrorCode::User.is_incomplete_class());
        assert!(!ErrorCode::NotExist.is_incomplete_class());
    }

    #[test]
    fn summarize_dedups_and_sorts_by_strength() {
        let errs = vec![Bottom::incomplete("a"), Bottom::eval("b"), Bottom::eval("b")];
        let summary = summarize(errs);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].code, ErrorCode::Eval);
    }
}
