//! Value-level operators: unification of concrete/bound/top values
//! (`spec.md` §4.2.2) and the scalar arithmetic/comparison operators.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::Zero;

use crate::{
    adt::{
        expr::{BoundOp, Operator, ScalarLit, UnaryOp},
        vertex::{BoundValue, DefaultMark, DisjunctTerm, Value},
    },
    errors::Bottom,
    eval::OpContext,
    kind::Kind,
};

pub(crate) fn scalar_to_value(lit: ScalarLit) -> Value {
    match lit {
        ScalarLit::Null => Value::Null,
        ScalarLit::Bool(b) => Value::Bool(b),
        ScalarLit::Num(n) => Value::Num(n),
        ScalarLit::Str(s) => Value::Str(s),
        ScalarLit::Bytes(b) => Value::Bytes(b),
    }
}

pub(crate) fn value_to_scalar_lit(v: &Value) -> Option<ScalarLit> {
    match v {
        Value::Null => Some(ScalarLit::Null),
        Value::Bool(b) => Some(ScalarLit::Bool(*b)),
        Value::Num(n) => Some(ScalarLit::Num(n.clone())),
        Value::Str(s) => Some(ScalarLit::Str(s.clone())),
        Value::Bytes(b) => Some(ScalarLit::Bytes(b.clone())),
        _ => None,
    }
}

/// Unifies two values (`spec.md` §4.2.2). Struct/list unification of the
/// *children* happens through arcs elsewhere; this only handles the
/// `Value` enum's own cases (scalars, bounds, `Top`, disjunctions, and the
/// thin struct/list markers).
pub fn unify_values(a: Value, b: Value) -> Result<Value, Bottom> {
    match (a, b) {
        (Value::Bottom(e), _) | (_, Value::Bottom(e)) => Err(e),
        (Value::Top, x) | (x, Value::Top) => Ok(x),
        (Value::Disjunction(terms), other) | (other, Value::Disjunction(terms)) if !matches!(other, Value::Disjunction(_)) => {
            unify_disjunction_with_plain(terms, other)
        }
        (Value::Disjunction(a_terms), Value::Disjunction(b_terms)) => unify_disjunction_pair(a_terms, b_terms),
        (Value::Struct, Value::Struct) => Ok(Value::Struct),
        (Value::List { open: oa }, Value::List { open: ob }) => Ok(Value::List { open: oa && ob }),
        (Value::BasicType(ka), Value::BasicType(kb)) => {
            let meet = ka.meet(kb);
            if meet.is_bottom() {
                Err(Bottom::eval(format!("incompatible types: {ka} and {kb}")))
            } else {
                Ok(Value::BasicType(meet))
            }
        }
        (Value::BasicType(k), scalar) | (scalar, Value::BasicType(k)) if scalar.is_concrete() => {
            if k.contains(scalar.kind()) {
                Ok(scalar)
            } else {
                Err(Bottom::eval(format!("{scalar:?} does not match type {k}")))
            }
        }
        (Value::Bound(ba), Value::Bound(bb)) => {
            let mut combined = ba;
            combined.extend(bb);
            Ok(Value::Bound(combined))
        }
        (Value::Bound(bounds), scalar) | (scalar, Value::Bound(bounds)) if scalar.is_concrete() => {
            let Some(lit) = value_to_scalar_lit(&scalar) else {
                return Err(Bottom::eval("bound requires a scalar operand"));
            };
            if bounds.iter().all(|b| b.test(&lit)) {
                Ok(scalar)
            } else {
                Err(Bottom::eval(format!("{scalar:?} violates a bound constraint")))
            }
        }
        (Value::Bound(bounds), Value::BasicType(k)) | (Value::BasicType(k), Value::Bound(bounds)) => {
            let bound_kind = bounds
                .first()
                .map(|b| match &b.operand {
                    ScalarLit::Num(_) => Kind::NUM,
                    ScalarLit::Str(_) => Kind::STRING,
                    _ => Kind::TOP,
                })
                .unwrap_or(Kind::TOP);
            if k.meet(bound_kind).is_bottom() {
                Err(Bottom::eval("bound's kind is incompatible with the basic type it is unified with"))
            } else {
                Ok(Value::Bound(bounds))
            }
        }
        (a, b) => {
            if a.is_concrete() && b.is_concrete() {
                let (la, lb) = (value_to_scalar_lit(&a), value_to_scalar_lit(&b));
                if la == lb {
                    return Ok(a);
                }
            }
            Err(Bottom::eval("conflicting values"))
        }
    }
}

fn unify_disjunction_with_plain(terms: Vec<DisjunctTerm>, other: Value) -> Result<Value, Bottom> {
    let mut survivors = Vec::new();
    for t in terms {
        if let Ok(v) = unify_values(*t.value, other.clone()) {
            survivors.push(DisjunctTerm {
                value: Box::new(v),
                default: t.default.combine(DefaultMark::MaybeDefault),
            });
        }
    }
    collapse(survivors)
}

fn unify_disjunction_pair(a_terms: Vec<DisjunctTerm>, b_terms: Vec<DisjunctTerm>) -> Result<Value, Bottom> {
    let mut survivors = Vec::new();
    for a in &a_terms {
        for b in &b_terms {
            if let Ok(v) = unify_values((*a.value).clone(), (*b.value).clone()) {
                survivors.push(DisjunctTerm {
                    value: Box::new(v),
                    default: a.default.combine(b.default),
                });
            }
        }
    }
    collapse(survivors)
}

/// Per `spec.md` §4.2.5's "Outcome": zero survivors is a failed
/// disjunction, exactly one survivor replaces the disjunction with the bare
/// value (dropping its default mark), and more than one stays a
/// disjunction.
fn collapse(survivors: Vec<DisjunctTerm>) -> Result<Value, Bottom> {
    match survivors.len() {
        0 => Err(Bottom::eval("no disjunct satisfies the unification")),
        1 => Ok(*survivors.into_iter().next().expect("len checked").value),
        _ => Ok(Value::Disjunction(survivors)),
    }
}

pub(crate) fn eval_unary(op: UnaryOp, v: Value) -> Result<Value, Bottom> {
    match (op, v) {
        (UnaryOp::Plus, Value::Num(n)) => Ok(Value::Num(n)),
        (UnaryOp::Neg, Value::Num(n)) => Ok(Value::Num(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Bound(bounds)) => Ok(Value::Bound(
            bounds
                .into_iter()
                .map(|b| BoundValue {
                    op: b.op,
                    operand: match b.operand {
                        ScalarLit::Num(n) => ScalarLit::Num(-n),
                        other => other,
                    },
                })
                .collect(),
        )),
        (_, v) => Err(Bottom::eval(format!("operator not defined for {:?}", v.kind()))),
    }
}

pub(crate) fn eval_binary(ctx: &mut OpContext, op: Operator, a: Value, b: Value) -> Result<Value, Bottom> {
    use Operator::{Add, Disjunct, Div, DivEuclid, Eq, Ge, Gt, Le, Lt, Matches, Mul, Ne, NotMatches, ModEuclid, Quo, Rem, Sub, Unify};

    match op {
        Unify => unify_values(a, b),
        Disjunct => Ok(Value::Disjunction(vec![
            DisjunctTerm { value: Box::new(a), default: DefaultMark::MaybeDefault },
            DisjunctTerm { value: Box::new(b), default: DefaultMark::MaybeDefault },
        ])),
        Add => match (a, b) {
            (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}").into_boxed_str())),
            (a, b) => numeric(a, b, |x, y| Ok(x + y)),
        },
        Sub => numeric(a, b, |x, y| Ok(x - y)),
        Mul => numeric(a, b, |x, y| Ok(x * y)),
        Div => numeric(a, b, |x, y| checked_div(x, y, ctx.config.precision)),
        Quo => int_binop(a, b, |x, y| (!y.is_zero()).then(|| x / y)),
        Rem => int_binop(a, b, |x, y| (!y.is_zero()).then(|| x % y)),
        DivEuclid => int_binop(a, b, |x, y| (!y.is_zero()).then(|| x.div_floor(y))),
        ModEuclid => int_binop(a, b, |x, y| (!y.is_zero()).then(|| x.mod_floor(y))),
        Eq => Ok(Value::Bool(values_equal(&a, &b))),
        Ne => Ok(Value::Bool(!values_equal(&a, &b))),
        Lt | Le | Gt | Ge => compare(op, &a, &b),
        Matches | NotMatches => regex_test(op, &a, &b),
    }
}

fn numeric(a: Value, b: Value, f: impl Fn(BigDecimal, BigDecimal) -> Result<BigDecimal, Bottom>) -> Result<Value, Bottom> {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => Ok(Value::Num(f(x, y)?)),
        (a, b) => Err(Bottom::eval(format!("operator requires two numbers, got {:?} and {:?}", a.kind(), b.kind()))),
    }
}

fn checked_div(x: BigDecimal, y: BigDecimal, precision: u64) -> Result<BigDecimal, Bottom> {
    if y.is_zero() {
        return Err(Bottom::eval("division by zero"));
    }
    let scale = i64::try_from(precision).unwrap_or(24);
    Ok((x / y).with_scale(scale))
}

/// `Quo`/`Rem`/`DivEuclid`/`ModEuclid` operate on the exact integer value of
/// both operands via `num_bigint::BigInt`, not a machine word, so `div`/`mod`
/// stay correct for integers wider than `i64` (`spec.md` §4.2.2).
fn to_bigint(n: &BigDecimal) -> BigInt {
    let (digits, _exponent) = n.with_scale(0).as_bigint_and_exponent();
    digits
}

fn int_binop(a: Value, b: Value, f: impl Fn(&BigInt, &BigInt) -> Option<BigInt>) -> Result<Value, Bottom> {
    let (Value::Num(x), Value::Num(y)) = (a, b) else {
        return Err(Bottom::eval("operator requires two integers"));
    };
    if !x.is_integer() || !y.is_integer() {
        return Err(Bottom::eval("operator requires two integers"));
    }
    let (xi, yi) = (to_bigint(&x), to_bigint(&y));
    let result = f(&xi, &yi).ok_or_else(|| Bottom::eval("division or remainder by zero"))?;
    Ok(Value::Num(BigDecimal::from(result)))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (value_to_scalar_lit(a), value_to_scalar_lit(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn compare(op: Operator, a: &Value, b: &Value) -> Result<Value, Bottom> {
    use std::cmp::Ordering::{Greater, Less};
    let ord = match (a, b) {
        (Value::Num(x), Value::Num(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.as_ref().cmp(y.as_ref()),
        _ => return Err(Bottom::eval("comparison requires two numbers or two strings")),
    };
    let result = match op {
        Operator::Lt => ord == Less,
        Operator::Le => ord != Greater,
        Operator::Gt => ord == Greater,
        Operator::Ge => ord != Less,
        _ => unreachable!("compare called with a non-comparison operator"),
    };
    Ok(Value::Bool(result))
}

fn regex_test(op: Operator, a: &Value, b: &Value) -> Result<Value, Bottom> {
    let (Value::Str(s), Value::Str(pattern)) = (a, b) else {
        return Err(Bottom::eval("=~/!~ require two strings"));
    };
    let re = regex::Regex::new(pattern).map_err(|e| Bottom::eval(format!("invalid regular expression: {e}")))?;
    let found = re.is_match(s);
    Ok(Value::Bool(if op == Operator::Matches { found } else { !found }))
}

pub(crate) fn stringify(v: &Value) -> Result<String, Bottom> {
    match v {
        Value::Str(s) => Ok(s.to_string()),
        Value::Num(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(Bottom::eval(format!("cannot interpolate a {:?}", other.kind()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> Value {
        Value::Num(s.parse().unwrap())
    }

    #[test]
    fn unify_top_is_identity() {
        assert!(matches!(unify_values(Value::Top, num("3")).unwrap(), Value::Num(_)));
    }

    #[test]
    fn unify_conflicting_scalars_is_bottom() {
        assert!(unify_values(num("1"), num("2")).is_err());
    }

    #[test]
    fn disjunction_distribution_narrows() {
        let a = Value::Disjunction(vec![
            DisjunctTerm { value: Box::new(num("1")), default: DefaultMark::MaybeDefault },
            DisjunctTerm { value: Box::new(num("2")), default: DefaultMark::MaybeDefault },
            DisjunctTerm { value: Box::new(num("3")), default: DefaultMark::MaybeDefault },
        ]);
        let b = Value::Disjunction(vec![
            DisjunctTerm { value: Box::new(num("2")), default: DefaultMark::MaybeDefault },
            DisjunctTerm { value: Box::new(num("3")), default: DefaultMark::MaybeDefault },
            DisjunctTerm { value: Box::new(num("4")), default: DefaultMark::MaybeDefault },
        ]);
        let result = unify_values(a, b).unwrap();
        let Value::Disjunction(terms) = result else { panic!("expected disjunction") };
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn disjunction_collapsing_to_one_drops_wrapper() {
        let a = Value::Disjunction(vec![
            DisjunctTerm { value: Box::new(num("1")), default: DefaultMark::IsDefault },
            DisjunctTerm { value: Box::new(num("2")), default: DefaultMark::MaybeDefault },
        ]);
        let result = unify_values(a, num("2")).unwrap();
        assert!(matches!(result, Value::Num(_)));
    }
}
